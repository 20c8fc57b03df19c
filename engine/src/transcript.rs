//! Turn-by-turn transcript reconstruction from streamed text fragments.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Speaker {
    User,
    /// Stage directions and unattributable model text. Never rendered as
    /// dialogue.
    System,
    Tutor(String),
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "User"),
            Speaker::System => write!(f, "System"),
            Speaker::Tutor(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Accumulates in-flight fragments for the current turn and flushes them to
/// speaker-attributed entries on every turn-complete barrier.
#[derive(Default)]
pub struct TranscriptAssembler {
    user_buffer: String,
    model_buffer: String,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user_fragment(&mut self, text: &str) {
        self.user_buffer.push_str(text);
    }

    pub fn push_model_fragment(&mut self, text: &str) {
        self.model_buffer.push_str(text);
    }

    /// Appends a stage direction directly to the System channel.
    pub fn note_system(&mut self, text: &str) {
        self.entries.push(TranscriptEntry {
            speaker: Speaker::System,
            text: text.to_string(),
        });
    }

    /// Flushes both turn buffers. Buffers are cleared unconditionally,
    /// whether or not they held anything.
    pub fn complete_turn(&mut self) {
        let user = std::mem::take(&mut self.user_buffer);
        let model = std::mem::take(&mut self.model_buffer);

        let user = user.trim();
        if !user.is_empty() {
            self.entries.push(TranscriptEntry {
                speaker: Speaker::User,
                text: user.to_string(),
            });
        }

        let model = model.trim();
        if !model.is_empty() {
            self.entries.push(Self::attribute(model));
        }
    }

    /// Best-effort `"Name: utterance"` attribution. A model turn holding
    /// several prefixed lines is still one entry under the first name: the
    /// upstream protocol promises one speaker per turn, delivery granularity
    /// does not, and we cannot tell the difference here. Anything without a
    /// usable prefix degrades to the System channel instead of erroring.
    fn attribute(text: &str) -> TranscriptEntry {
        if let Some((name, rest)) = text.split_once(':') {
            let name = name.trim();
            let rest = rest.trim();
            if !name.is_empty() && !rest.is_empty() {
                return TranscriptEntry {
                    speaker: Speaker::Tutor(name.to_string()),
                    text: rest.to_string(),
                };
            }
        }
        TranscriptEntry {
            speaker: Speaker::System,
            text: text.to_string(),
        }
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Name of the tutor who spoke most recently, if any.
    pub fn last_tutor(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|e| match &e.speaker {
            Speaker::Tutor(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// User-facing rendering: `"Speaker: text"` lines joined by newlines,
    /// with the System channel filtered out.
    pub fn render_dialogue(&self) -> String {
        self.entries
            .iter()
            .filter(|e| e.speaker != Speaker::System)
            .map(|e| format!("{}: {}", e.speaker, e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
