//! The in-band stage-direction vocabulary.
//!
//! Conversation steering happens through short plain-text directives sent
//! over the same realtime channel as audio. Internally they are structured
//! values; only the transport boundary renders them to text. Every directive
//! is idempotent to repeat.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Session opening: the lead tutor takes charge.
    Start { lead: String },
    /// Nudge an idle panel to keep going.
    Continue,
    /// Restrict the floor to exactly two tutors; the first begins.
    EnterDialogue { first: String, second: String },
    /// Reopen the floor; the lead reconvenes the group.
    ExitDialogue { lead: String },
    /// Priority interrupt: pause before any other model output.
    RaiseHand,
    LowerHand,
}

impl Directive {
    pub fn render(&self) -> String {
        match self {
            Directive::Start { lead } => format!(
                "[Session start] Begin the study session now. {} takes charge and opens the discussion.",
                lead
            ),
            Directive::Continue => {
                "[Continue] Please continue the discussion, or ask the student a new question."
                    .to_string()
            }
            Directive::EnterDialogue { first, second } => format!(
                "[Dialogue mode] From now on only {} and {} hold the floor; everyone else stays silent. {}, please begin.",
                first, second, first
            ),
            Directive::ExitDialogue { lead } => format!(
                "[Dialogue mode over] The whole group may speak again. {}, please reconvene the discussion.",
                lead
            ),
            Directive::RaiseHand => {
                "[Hand raised] The student raised their hand. Pause the current line of discussion and yield the floor to the student."
                    .to_string()
            }
            Directive::LowerHand => {
                "[Hand lowered] The student lowered their hand. Resume the discussion."
                    .to_string()
            }
        }
    }
}
