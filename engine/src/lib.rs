//! The Studyhall session engine: everything between the audio devices and
//! the live streaming transport. Owns the session state machine, the
//! playback timeline, capture muting, transcript assembly, recording and
//! the stage-direction protocol that steers the tutor panel.

pub mod capture;
pub mod directive;
pub mod playback;
pub mod recorder;
pub mod room;
pub mod session;
pub mod transcript;
pub mod transport;

pub use room::{DialogueMode, StudyMaterial, Tutor, TutorRole};
pub use session::{RoomSession, RoomSettings, SessionError, SessionStatus, SessionSummary, UiEvent, UiGate};
pub use transcript::{Speaker, TranscriptEntry};
