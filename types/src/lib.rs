pub mod client;
pub mod config;
pub mod server;

pub use client::{Blob, ClientMessage, Content, RealtimeInput, SetupMessage, TextPart};
pub use config::{SessionConfig, SessionConfigurator};
pub use server::{Part, ServerContent, ServerMessage, Transcription, Turn};
