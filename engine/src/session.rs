//! The session object: one live voice session per instance, owning the
//! transport handle, the capture tap, the playback timeline, the recorder
//! and the transcript. Terminal states are terminal; a new session means a
//! new `RoomSession`.

use std::time::{Duration, Instant};

use studyhall_live::LiveEvent;
use studyhall_live_types as types;
use studyhall_live_utils::audio;
use tokio::sync::{mpsc, watch};

use crate::capture::CapturePipeline;
use crate::directive::Directive;
use crate::playback::{AudioOut, PlaybackScheduler};
use crate::recorder::SessionRecorder;
use crate::room::{compose_instructions, lead_tutor, DialogueMode, StudyMaterial, Tutor};
use crate::transcript::{TranscriptAssembler, TranscriptEntry};
use crate::transport::{Connector, LiveTransport};

/// How long the continue-nudge indicator stays lit. Purely visual; the
/// directive itself is never rate-limited.
pub const NUDGE_FLASH: Duration = Duration::from_millis(500);

const OUTBOUND_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    Error,
    Ended,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Error | SessionStatus::Ended)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("audio acquisition failed: {0}")]
    Acquisition(String),
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// What the surrounding save-past-session logic receives at session end.
#[derive(Debug)]
pub struct SessionSummary {
    /// `"Speaker: text"` lines joined by newlines, System channel filtered.
    pub transcript: String,
    pub elapsed_secs: u64,
    /// Rendered WAV bytes, if a recording pass accumulated any audio.
    pub recording: Option<Vec<u8>>,
}

/// Gating state for the global keyboard shortcut: it must not fire while a
/// blocking modal is open or a text input has focus.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiGate {
    pub modal_open: bool,
    pub text_input_focused: bool,
}

impl UiGate {
    pub fn allows_shortcut(&self) -> bool {
        !self.modal_open && !self.text_input_focused
    }
}

/// UI-originated events fed into the run loop.
#[derive(Debug, Clone)]
pub enum UiEvent {
    ToggleMute,
    ToggleRecording,
    ContinueNudge,
    EnterDialogue(String, String),
    ExitDialogue,
    RaiseHand,
    LowerHand,
    SendText(String),
    End,
}

#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub tutors: Vec<Tutor>,
    pub material: StudyMaterial,
    pub voice: String,
    pub module_id: Option<String>,
    pub casual: bool,
    pub connect_timeout: Duration,
}

impl RoomSettings {
    pub fn new(tutors: Vec<Tutor>, material: StudyMaterial, voice: String) -> Self {
        Self {
            tutors,
            material,
            voice,
            module_id: None,
            casual: false,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

pub struct RoomSession<O: AudioOut> {
    settings: RoomSettings,
    status: SessionStatus,
    error: Option<SessionError>,

    transport: Option<Box<dyn LiveTransport>>,
    server_rx: Option<mpsc::Receiver<LiveEvent>>,
    outbound_rx: Option<mpsc::Receiver<types::Blob>>,

    capture: CapturePipeline,
    level_rx: watch::Receiver<f32>,
    scheduler: PlaybackScheduler<O>,
    recorder: SessionRecorder,
    transcript: TranscriptAssembler,

    dialogue: DialogueMode,
    hand_raised: bool,
    gate: UiGate,
    /// Directives issued while the connection is still opening; drained in
    /// order once the transport is up.
    pending: Vec<String>,

    started_at: Option<Instant>,
    ended_elapsed: Option<u64>,
    nudge_flash_until: Option<Instant>,
    active_speaker: Option<String>,
}

impl<O: AudioOut> RoomSession<O> {
    pub fn new(settings: RoomSettings, out: O) -> Self {
        if !(3..=6).contains(&settings.tutors.len()) {
            tracing::warn!("unusual tutor panel size: {}", settings.tutors.len());
        }
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (capture, level_rx) = CapturePipeline::new(outbound_tx);
        Self {
            settings,
            status: SessionStatus::Idle,
            error: None,
            transport: None,
            server_rx: None,
            outbound_rx: Some(outbound_rx),
            capture,
            level_rx,
            scheduler: PlaybackScheduler::new(out),
            recorder: SessionRecorder::new(),
            transcript: TranscriptAssembler::new(),
            dialogue: DialogueMode::default(),
            hand_raised: false,
            gate: UiGate::default(),
            pending: Vec::new(),
            started_at: None,
            ended_elapsed: None,
            nudge_flash_until: None,
            active_speaker: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    pub fn is_muted(&self) -> bool {
        self.capture.is_muted()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn hand_raised(&self) -> bool {
        self.hand_raised
    }

    pub fn dialogue(&self) -> &DialogueMode {
        &self.dialogue
    }

    pub fn active_speaker(&self) -> Option<&str> {
        self.active_speaker.as_deref()
    }

    pub fn transcript_entries(&self) -> &[TranscriptEntry] {
        self.transcript.entries()
    }

    /// Watch channel publishing per-frame capture RMS for the UI.
    pub fn speaking_level(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    pub fn set_gate(&mut self, gate: UiGate) {
        self.gate = gate;
    }

    pub fn nudge_flash_active(&self) -> bool {
        self.nudge_flash_until.is_some_and(|until| Instant::now() < until)
    }

    pub fn elapsed_secs(&self) -> u64 {
        if let Some(frozen) = self.ended_elapsed {
            frozen
        } else if let Some(started) = self.started_at {
            started.elapsed().as_secs()
        } else {
            0
        }
    }

    /// The system instruction as it stands right now. Re-derived reactively,
    /// but only ever transmitted at session start.
    pub fn current_instructions(&self) -> String {
        compose_instructions(
            &self.settings.tutors,
            &self.settings.material,
            &self.dialogue,
            self.settings.casual,
        )
    }

    fn lead_name(&self) -> String {
        lead_tutor(&self.settings.tutors)
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }

    /// Opens the streaming connection and brings the session up. Silent
    /// no-op unless Idle. Sessions come up muted; the caller unmutes.
    pub async fn start_session(&mut self, connector: &dyn Connector) {
        if self.status != SessionStatus::Idle {
            tracing::debug!("start ignored: session is {:?}", self.status);
            return;
        }
        self.status = SessionStatus::Connecting;

        let config = types::SessionConfig::new()
            .with_voice(&self.settings.voice)
            .with_instructions(&self.current_instructions())
            .with_input_transcription_enable()
            .with_output_transcription_enable()
            .build();

        match tokio::time::timeout(self.settings.connect_timeout, connector.connect()).await {
            Err(_) => {
                self.fail(SessionError::ConnectTimeout(self.settings.connect_timeout));
            }
            Ok(Err(e)) => {
                self.fail(SessionError::Transport(e.to_string()));
            }
            Ok(Ok((mut transport, server_rx))) => {
                if let Err(e) = transport.send_setup(config).await {
                    transport.close();
                    self.fail(SessionError::Transport(e.to_string()));
                    return;
                }
                self.finish_connect(transport, server_rx).await;
            }
        }
    }

    /// Post-handshake wiring shared by the connect path.
    async fn finish_connect(
        &mut self,
        transport: Box<dyn LiveTransport>,
        server_rx: mpsc::Receiver<LiveEvent>,
    ) {
        self.transport = Some(transport);
        self.server_rx = Some(server_rx);
        self.status = SessionStatus::Connected;
        self.started_at = Some(Instant::now());
        tracing::info!("session connected with {} tutors", self.settings.tutors.len());

        let lead = self.lead_name();
        self.issue_directive(Directive::Start { lead }).await;

        let pending = std::mem::take(&mut self.pending);
        for text in pending {
            self.deliver_text(text).await;
        }
    }

    /// Marks the session failed after device acquisition problems upstream
    /// (microphone permission, audio clock creation).
    pub fn fail_acquisition(&mut self, reason: impl Into<String>) {
        self.fail(SessionError::Acquisition(reason.into()));
    }

    fn fail(&mut self, error: SessionError) {
        tracing::error!("session failed: {}", error);
        self.ended_elapsed.get_or_insert_with(|| {
            self.started_at.map(|t| t.elapsed().as_secs()).unwrap_or(0)
        });
        self.teardown_resources();
        self.recorder.clear();
        self.status = SessionStatus::Error;
        self.error = Some(error);
    }

    fn teardown_resources(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.server_rx = None;
        self.scheduler.stop_all();
        self.capture.mute();
    }

    /// Full teardown from any state, returning the session summary for the
    /// save-past-session collaborator. Idempotent: repeated calls keep
    /// returning a summary, with the recording consumed by the first.
    pub async fn end_session(&mut self) -> SessionSummary {
        let elapsed = self.elapsed_secs();
        self.ended_elapsed.get_or_insert(elapsed);
        let recording = self.recorder.take_wav();
        self.teardown_resources();
        if self.status != SessionStatus::Error {
            self.status = SessionStatus::Ended;
        }
        SessionSummary {
            transcript: self.transcript.render_dialogue(),
            elapsed_secs: self.ended_elapsed.unwrap_or(0),
            recording,
        }
    }

    /// Forwards free text over the realtime channel. Queued while the
    /// connection is opening, silently dropped when there is no session to
    /// speak of (UI race, not an error).
    pub async fn send_text(&mut self, text: &str) {
        match self.status {
            SessionStatus::Connected => {
                self.deliver_text(text.to_string()).await;
            }
            SessionStatus::Connecting => {
                self.pending.push(text.to_string());
            }
            _ => {
                tracing::debug!("dropping text outside a live session");
            }
        }
    }

    async fn deliver_text(&mut self, text: String) {
        self.transcript.note_system(&text);
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send_text(text).await {
            self.fail(SessionError::Transport(e.to_string()));
        }
    }

    async fn issue_directive(&mut self, directive: Directive) {
        let text = directive.render();
        match self.status {
            SessionStatus::Connected => self.deliver_text(text).await,
            SessionStatus::Connecting => self.pending.push(text),
            _ => {}
        }
    }

    /// Flips the capture tap. No-op outside Connected: there is no live mic
    /// tap to flip.
    pub fn toggle_mute(&mut self) -> bool {
        if self.status == SessionStatus::Connected {
            if self.capture.is_muted() {
                self.capture.unmute();
            } else {
                self.capture.mute();
            }
        }
        self.capture.is_muted()
    }

    /// Flips recording of tutor speech. No-op outside Connected; extraction
    /// via `end_session` works regardless.
    pub fn toggle_recording(&mut self) -> bool {
        if self.status == SessionStatus::Connected {
            self.recorder.toggle()
        } else {
            self.recorder.is_recording()
        }
    }

    /// The keyboard-shortcut entry point. Debounced visually for UI
    /// feedback; every trigger that passes the gate reaches the wire.
    pub async fn continue_nudge(&mut self) {
        if self.status != SessionStatus::Connected || !self.gate.allows_shortcut() {
            return;
        }
        self.nudge_flash_until = Some(Instant::now() + NUDGE_FLASH);
        self.issue_directive(Directive::Continue).await;
    }

    /// Restricts the floor to two roster tutors. The entry directive names
    /// both and invites the first to begin.
    pub async fn enter_dialogue(&mut self, first: &str, second: &str) {
        if self.status != SessionStatus::Connected || self.dialogue.active() {
            return;
        }
        if first == second {
            tracing::warn!("dialogue mode needs two distinct tutors");
            return;
        }
        let on_roster =
            |name: &str| self.settings.tutors.iter().any(|t| t.name == name);
        if !on_roster(first) || !on_roster(second) {
            tracing::warn!("dialogue participants must be on the roster");
            return;
        }
        self.dialogue.enter(first.to_string(), second.to_string());
        self.issue_directive(Directive::EnterDialogue {
            first: first.to_string(),
            second: second.to_string(),
        })
        .await;
    }

    /// Reopens the floor. Always explicit, always announced, always via the
    /// session lead.
    pub async fn exit_dialogue(&mut self) {
        if self.status != SessionStatus::Connected || !self.dialogue.active() {
            return;
        }
        self.dialogue.exit();
        let lead = self.lead_name();
        self.issue_directive(Directive::ExitDialogue { lead }).await;
    }

    /// Raising the hand interrupts the discussion before any other model
    /// output. Flag change and directive are coupled 1:1.
    pub async fn raise_hand(&mut self) {
        if self.status != SessionStatus::Connected || self.hand_raised {
            return;
        }
        self.hand_raised = true;
        self.issue_directive(Directive::RaiseHand).await;
    }

    pub async fn lower_hand(&mut self) {
        if self.status != SessionStatus::Connected || !self.hand_raised {
            return;
        }
        self.hand_raised = false;
        self.issue_directive(Directive::LowerHand).await;
    }

    /// Feeds one raw capture frame into the tap. Dead while muted.
    pub fn ingest_capture_frame(&mut self, frame: &[f32]) {
        self.capture.ingest_frame(frame);
    }

    /// Processes one server message. A single message may carry several
    /// payloads; every one present takes effect.
    pub fn handle_server_message(&mut self, message: types::ServerMessage) {
        if message.setup_complete.is_some() {
            tracing::debug!("setup complete");
        }
        let Some(content) = message.server_content else {
            return;
        };
        if let Some(fragment) = content.input_transcription {
            self.transcript.push_user_fragment(&fragment.text);
        }
        if let Some(fragment) = content.output_transcription {
            self.transcript.push_model_fragment(&fragment.text);
        }
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(blob) = part.inline_data {
                    let samples = audio::decode(&blob.data);
                    if !samples.is_empty() {
                        self.recorder.observe(&samples);
                        self.scheduler.schedule_next(samples);
                    }
                }
            }
        }
        if content.turn_complete.unwrap_or(false) {
            self.transcript.complete_turn();
            if let Some(name) = self.transcript.last_tutor() {
                self.active_speaker = Some(name.to_string());
            }
        }
    }

    pub async fn handle_event(&mut self, event: LiveEvent) {
        match event {
            LiveEvent::Message(message) => self.handle_server_message(message),
            LiveEvent::Close { reason } => {
                tracing::info!("transport closed: {:?}", reason);
                // teardown without consuming the recorder; the final
                // end_session still gets to render any recording
                let elapsed = self.elapsed_secs();
                self.ended_elapsed.get_or_insert(elapsed);
                self.teardown_resources();
                if self.status != SessionStatus::Error {
                    self.status = SessionStatus::Ended;
                }
            }
            LiveEvent::Error(reason) => {
                self.fail(SessionError::Transport(reason));
            }
        }
    }

    async fn handle_ui(&mut self, event: UiEvent) {
        match event {
            UiEvent::ToggleMute => {
                self.toggle_mute();
            }
            UiEvent::ToggleRecording => {
                self.toggle_recording();
            }
            UiEvent::ContinueNudge => self.continue_nudge().await,
            UiEvent::EnterDialogue(first, second) => self.enter_dialogue(&first, &second).await,
            UiEvent::ExitDialogue => self.exit_dialogue().await,
            UiEvent::RaiseHand => self.raise_hand().await,
            UiEvent::LowerHand => self.lower_hand().await,
            UiEvent::SendText(text) => self.send_text(&text).await,
            UiEvent::End => {}
        }
    }

    async fn forward_media(&mut self, chunk: types::Blob) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if let Err(e) = transport.send_media(chunk).await {
            self.fail(SessionError::Transport(e.to_string()));
        }
    }

    /// Drives a connected session to completion: multiplexes server events,
    /// encoded capture frames, raw mic frames and UI events until the
    /// session leaves Connected, then tears down and returns the summary.
    pub async fn run(
        &mut self,
        mut mic_rx: mpsc::Receiver<Vec<f32>>,
        mut ui_rx: mpsc::Receiver<UiEvent>,
    ) -> SessionSummary {
        let mut server_rx = self.server_rx.take();
        let mut outbound_rx = self.outbound_rx.take();

        'session: while self.status == SessionStatus::Connected {
            let (Some(server), Some(outbound)) = (server_rx.as_mut(), outbound_rx.as_mut()) else {
                break;
            };
            tokio::select! {
                // inbound audio is latency-sensitive; drain it ahead of
                // capture frames and UI traffic
                biased;
                event = server.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => self.fail(SessionError::Transport("event stream ended".to_string())),
                },
                chunk = outbound.recv() => {
                    if let Some(chunk) = chunk {
                        self.forward_media(chunk).await;
                    }
                }
                frame = mic_rx.recv() => {
                    if let Some(frame) = frame {
                        self.ingest_capture_frame(&frame);
                    }
                }
                ui = ui_rx.recv() => match ui {
                    Some(UiEvent::End) | None => break 'session,
                    Some(event) => self.handle_ui(event).await,
                },
            }
        }
        self.end_session().await
    }

    #[cfg(test)]
    fn force_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::TutorRole;
    use crate::transport::MockLiveTransport;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct NullOut {
        started: Arc<Mutex<Vec<usize>>>,
    }

    impl AudioOut for NullOut {
        fn now(&self) -> f64 {
            0.0
        }

        fn start_at(&mut self, samples: Vec<f32>, _when: f64) -> u64 {
            let mut started = self.started.lock().unwrap();
            started.push(samples.len());
            started.len() as u64
        }

        fn stop(&mut self, _id: u64) {}
    }

    #[derive(Clone, Default)]
    struct WireLog {
        texts: Arc<Mutex<Vec<String>>>,
        media: Arc<Mutex<Vec<types::Blob>>>,
        setups: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<u32>>,
    }

    struct FakeTransport {
        log: WireLog,
    }

    #[async_trait]
    impl LiveTransport for FakeTransport {
        async fn send_setup(&mut self, config: types::SessionConfig) -> Result<()> {
            self.log
                .setups
                .lock()
                .unwrap()
                .push(serde_json::to_string(&config.into_setup()).unwrap());
            Ok(())
        }

        async fn send_media(&mut self, chunk: types::Blob) -> Result<()> {
            self.log.media.lock().unwrap().push(chunk);
            Ok(())
        }

        async fn send_text(&mut self, text: String) -> Result<()> {
            self.log.texts.lock().unwrap().push(text);
            Ok(())
        }

        fn close(&mut self) {
            *self.log.closed.lock().unwrap() += 1;
        }
    }

    struct FakeConnector {
        log: WireLog,
        // kept alive so the session's event stream never reads as closed
        server_tx: Arc<Mutex<Vec<mpsc::Sender<LiveEvent>>>>,
    }

    impl FakeConnector {
        fn new() -> Self {
            Self {
                log: WireLog::default(),
                server_tx: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn events(&self) -> mpsc::Sender<LiveEvent> {
            self.server_tx.lock().unwrap()[0].clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self) -> Result<(Box<dyn LiveTransport>, mpsc::Receiver<LiveEvent>)> {
            let (tx, rx) = mpsc::channel(32);
            self.server_tx.lock().unwrap().push(tx);
            Ok((
                Box::new(FakeTransport {
                    log: self.log.clone(),
                }),
                rx,
            ))
        }
    }

    struct HangingConnector;

    #[async_trait]
    impl Connector for HangingConnector {
        async fn connect(&self) -> Result<(Box<dyn LiveTransport>, mpsc::Receiver<LiveEvent>)> {
            std::future::pending().await
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self) -> Result<(Box<dyn LiveTransport>, mpsc::Receiver<LiveEvent>)> {
            anyhow::bail!("connection refused")
        }
    }

    fn tutor(name: &str, role: TutorRole) -> Tutor {
        Tutor {
            id: name.to_lowercase(),
            name: name.to_string(),
            gender: String::new(),
            role,
            description: format!("{} persona", name),
        }
    }

    fn settings() -> RoomSettings {
        RoomSettings::new(
            vec![
                tutor("Clara", TutorRole::Explainer),
                tutor("Rex", TutorRole::Skeptic),
                tutor("Quinn", TutorRole::QuizMaster),
            ],
            StudyMaterial {
                name: "Thermodynamics".to_string(),
                content: "entropy ".repeat(63),
            },
            "Puck".to_string(),
        )
    }

    fn session() -> RoomSession<NullOut> {
        RoomSession::new(settings(), NullOut::default())
    }

    fn content_message(content: types::ServerContent) -> types::ServerMessage {
        types::ServerMessage {
            setup_complete: None,
            server_content: Some(content),
        }
    }

    #[tokio::test]
    async fn full_session_scenario() {
        let connector = FakeConnector::new();
        let mut session = session();
        assert_eq!(session.status(), SessionStatus::Idle);

        session.start_session(&connector).await;
        assert_eq!(session.status(), SessionStatus::Connected);
        assert!(session.is_muted(), "sessions start muted");

        // setup carried the instructions, roster and voice
        let setups = connector.log.setups.lock().unwrap().clone();
        assert_eq!(setups.len(), 1);
        assert!(setups[0].contains("Clara"));
        assert!(setups[0].contains("Puck"));
        assert!(setups[0].contains("entropy"));

        // the opening directive went out and named the lead
        {
            let texts = connector.log.texts.lock().unwrap();
            assert_eq!(texts.len(), 1);
            assert!(texts[0].contains("[Session start]"));
            assert!(texts[0].contains("Clara"));
        }

        // hand-raise steers the conversation without touching status
        session.raise_hand().await;
        assert_eq!(session.status(), SessionStatus::Connected);
        assert!(session.hand_raised());

        // a combined message: fragments plus audio plus turn completion
        let pcm = audio::encode(&vec![0.25f32; 480]);
        session.handle_server_message(content_message(types::ServerContent {
            input_transcription: Some(types::Transcription {
                text: "what is entropy".to_string(),
            }),
            output_transcription: Some(types::Transcription {
                text: "Clara: a measure of disorder".to_string(),
            }),
            model_turn: Some(types::Turn {
                parts: vec![types::Part {
                    text: None,
                    inline_data: Some(types::Blob {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: pcm,
                    }),
                }],
            }),
            turn_complete: Some(true),
        }));

        assert_eq!(session.active_speaker(), Some("Clara"));

        let summary = session.end_session().await;
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(summary.transcript.contains("User: what is entropy"));
        assert!(summary.transcript.contains("Clara: a measure of disorder"));
        assert!(summary.elapsed_secs < 5);
    }

    #[tokio::test]
    async fn start_is_a_no_op_outside_idle() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;
        session.start_session(&connector).await;
        assert_eq!(connector.log.setups.lock().unwrap().len(), 1);
        assert_eq!(session.status(), SessionStatus::Connected);
    }

    #[tokio::test]
    async fn ending_twice_or_before_start_is_safe() {
        let mut session = session();
        let summary = session.end_session().await;
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(summary.transcript.is_empty());
        assert_eq!(summary.elapsed_secs, 0);

        let again = session.end_session().await;
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(again.recording.is_none());
    }

    #[tokio::test]
    async fn ended_sessions_do_not_resurrect() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.end_session().await;
        session.start_session(&connector).await;
        assert_eq!(session.status(), SessionStatus::Ended);
        assert!(connector.log.setups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hung_connect_times_out_into_error() {
        let mut session = session();
        session.settings.connect_timeout = Duration::from_millis(20);
        session.start_session(&HangingConnector).await;
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(matches!(
            session.error(),
            Some(SessionError::ConnectTimeout(_))
        ));
    }

    #[tokio::test]
    async fn refused_connect_lands_in_error() {
        let mut session = session();
        session.start_session(&RefusingConnector).await;
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(matches!(session.error(), Some(SessionError::Transport(_))));
    }

    #[tokio::test]
    async fn transport_error_event_tears_down_into_error() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;

        session
            .handle_event(LiveEvent::Error("socket reset".to_string()))
            .await;
        assert_eq!(session.status(), SessionStatus::Error);
        assert_eq!(*connector.log.closed.lock().unwrap(), 1);

        // terminal: a later end keeps the error status
        session.end_session().await;
        assert_eq!(session.status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn graceful_close_ends_the_session() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;
        session.handle_event(LiveEvent::Close { reason: None }).await;
        assert_eq!(session.status(), SessionStatus::Ended);
    }

    #[tokio::test]
    async fn mute_toggle_only_works_connected() {
        let connector = FakeConnector::new();
        let mut session = session();
        assert!(session.toggle_mute(), "no live tap to unmute yet");

        session.start_session(&connector).await;
        assert!(!session.toggle_mute());
        assert!(session.toggle_mute());
    }

    #[tokio::test]
    async fn text_is_queued_while_connecting_and_flushed_on_connect() {
        let mut session = session();
        session.force_status(SessionStatus::Connecting);
        session.send_text("first note").await;
        session.send_text("second note").await;
        assert_eq!(session.pending_len(), 2);

        let log = WireLog::default();
        let (_tx, rx) = mpsc::channel(8);
        session
            .finish_connect(Box::new(FakeTransport { log: log.clone() }), rx)
            .await;

        let texts = log.texts.lock().unwrap();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("[Session start]"));
        assert_eq!(texts[1], "first note");
        assert_eq!(texts[2], "second note");
    }

    #[tokio::test]
    async fn text_outside_a_session_is_dropped() {
        let mut session = session();
        session.send_text("lost").await;
        assert_eq!(session.pending_len(), 0);
        assert!(session.transcript_entries().is_empty());
    }

    #[tokio::test]
    async fn dialogue_mode_round_trip_emits_ordered_directives() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;

        session.enter_dialogue("Clara", "Rex").await;
        assert!(session.dialogue().active());
        assert!(session.current_instructions().contains("ACTIVE between Clara and Rex"));

        session.exit_dialogue().await;
        assert!(!session.dialogue().active());
        assert!(session.current_instructions().contains("INACTIVE"));

        let texts = connector.log.texts.lock().unwrap();
        // [0] is the session-start directive
        assert!(texts[1].contains("only Clara and Rex"));
        assert!(texts[2].contains("Clara, please reconvene"));
    }

    #[tokio::test]
    async fn dialogue_mode_rejects_unknown_or_duplicate_participants() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;

        session.enter_dialogue("Clara", "Clara").await;
        session.enter_dialogue("Clara", "Nobody").await;
        assert!(!session.dialogue().active());
        assert_eq!(connector.log.texts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn hand_raise_directives_pair_with_flag_transitions() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;

        session.raise_hand().await;
        session.raise_hand().await; // repeat: no extra directive
        session.lower_hand().await;
        assert!(!session.hand_raised());

        let texts = connector.log.texts.lock().unwrap();
        assert_eq!(texts.len(), 3);
        assert!(texts[1].contains("[Hand raised]"));
        assert!(texts[2].contains("[Hand lowered]"));
    }

    #[tokio::test]
    async fn continue_nudge_respects_the_ui_gate_but_never_rate_limits() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;

        session.set_gate(UiGate {
            modal_open: true,
            text_input_focused: false,
        });
        session.continue_nudge().await;

        session.set_gate(UiGate::default());
        session.continue_nudge().await;
        session.continue_nudge().await;
        session.continue_nudge().await;
        assert!(session.nudge_flash_active());

        let texts = connector.log.texts.lock().unwrap();
        let nudges = texts.iter().filter(|t| t.contains("[Continue]")).count();
        assert_eq!(nudges, 3, "rapid triggers all forward individually");
    }

    #[tokio::test]
    async fn recording_taps_decoded_playback_and_is_consumed_by_summary() {
        let connector = FakeConnector::new();
        let out = NullOut::default();
        let mut session = RoomSession::new(settings(), out.clone());
        session.start_session(&connector).await;

        assert!(session.toggle_recording());
        let pcm = audio::encode(&vec![0.5f32; 300]);
        session.handle_server_message(content_message(types::ServerContent {
            input_transcription: None,
            output_transcription: None,
            model_turn: Some(types::Turn {
                parts: vec![types::Part {
                    text: None,
                    inline_data: Some(types::Blob {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: pcm,
                    }),
                }],
            }),
            turn_complete: None,
        }));

        // the same decoded buffer reached the playback clock
        assert_eq!(out.started.lock().unwrap().as_slice(), &[300]);

        let summary = session.end_session().await;
        let wav = summary.recording.expect("recording accumulated");
        assert_eq!(wav.len(), 44 + 2 * 300);
    }

    #[tokio::test]
    async fn recording_toggle_is_gated_on_connected() {
        let mut session = session();
        assert!(!session.toggle_recording());
        assert!(!session.is_recording());
    }

    #[tokio::test]
    async fn acquisition_failure_surfaces_as_error() {
        let mut session = session();
        session.fail_acquisition("microphone permission denied");
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(matches!(
            session.error(),
            Some(SessionError::Acquisition(_))
        ));
    }

    #[tokio::test]
    async fn run_loop_drives_ui_events_and_returns_summary() {
        let connector = FakeConnector::new();
        let mut session = session();
        session.start_session(&connector).await;

        let (_mic_tx, mic_rx) = mpsc::channel(8);
        let (ui_tx, ui_rx) = mpsc::channel(8);

        // one real server turn through the event stream, then UI traffic
        connector
            .events()
            .send(LiveEvent::Message(content_message(types::ServerContent {
                input_transcription: None,
                output_transcription: Some(types::Transcription {
                    text: "Quinn: pop quiz!".to_string(),
                }),
                model_turn: None,
                turn_complete: Some(true),
            })))
            .await
            .unwrap();
        ui_tx.send(UiEvent::RaiseHand).await.unwrap();
        ui_tx.send(UiEvent::End).await.unwrap();

        let summary = session.run(mic_rx, ui_rx).await;
        assert_eq!(session.status(), SessionStatus::Ended);
        assert_eq!(summary.transcript, "Quinn: pop quiz!");

        let texts = connector.log.texts.lock().unwrap();
        assert!(texts.iter().any(|t| t.contains("[Hand raised]")));
    }

    #[tokio::test]
    async fn teardown_closes_the_transport_exactly_once() {
        let mut session = session();
        let mut mock = MockLiveTransport::new();
        mock.expect_send_text().returning(|_| Ok(()));
        mock.expect_close().times(1).return_const(());

        let (_tx, rx) = mpsc::channel(8);
        session.force_status(SessionStatus::Connecting);
        session.finish_connect(Box::new(mock), rx).await;
        assert_eq!(session.status(), SessionStatus::Connected);

        session.end_session().await;
        session.end_session().await;
    }
}
