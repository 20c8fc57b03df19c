//! Tutor roster, dialogue-mode state and the system-instruction composer.

/// One member of the tutor panel. Immutable once a session starts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tutor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub gender: String,
    pub role: TutorRole,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TutorRole {
    Explainer,
    QuizMaster,
    Skeptic,
    Summarizer,
}

impl TutorRole {
    pub fn label(&self) -> &'static str {
        match self {
            TutorRole::Explainer => "Explainer",
            TutorRole::QuizMaster => "Quiz Master",
            TutorRole::Skeptic => "Skeptic",
            TutorRole::Summarizer => "Summarizer",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StudyMaterial {
    pub name: String,
    pub content: String,
}

/// Two-tutor sub-state layered on the full group session. Holds exactly zero
/// or two participants; exiting is always explicit.
#[derive(Debug, Clone, Default)]
pub struct DialogueMode {
    participants: Option<(String, String)>,
}

impl DialogueMode {
    pub fn active(&self) -> bool {
        self.participants.is_some()
    }

    pub fn participants(&self) -> Option<(&str, &str)> {
        self.participants
            .as_ref()
            .map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn enter(&mut self, first: String, second: String) {
        self.participants = Some((first, second));
    }

    pub fn exit(&mut self) {
        self.participants = None;
    }
}

/// The session lead: the first Explainer, or failing that the first tutor.
pub fn lead_tutor(tutors: &[Tutor]) -> Option<&Tutor> {
    tutors
        .iter()
        .find(|t| t.role == TutorRole::Explainer)
        .or_else(|| tutors.first())
}

/// Builds the one-time system instruction for the panel.
///
/// Re-derived whenever the roster, material or mode flags change, but only
/// transmitted at session start; later mode changes travel as separate
/// directives so the conversational grounding is never reset.
pub fn compose_instructions(
    tutors: &[Tutor],
    material: &StudyMaterial,
    dialogue: &DialogueMode,
    casual: bool,
) -> String {
    let lead_name = lead_tutor(tutors).map(|t| t.name.as_str()).unwrap_or("the first tutor");

    let mut out = String::new();
    out.push_str("You are voicing a panel of study tutors in a live voice session.\n\n");

    out.push_str("TUTORS:\n");
    for tutor in tutors {
        if tutor.gender.is_empty() {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                tutor.name,
                tutor.role.label(),
                tutor.description
            ));
        } else {
            out.push_str(&format!(
                "- {} ({}, {}): {}\n",
                tutor.name,
                tutor.gender,
                tutor.role.label(),
                tutor.description
            ));
        }
    }

    out.push_str(&format!("\nSESSION LEAD: {}.\n", lead_name));

    out.push_str("\nGROUND RULES:\n");
    out.push_str("- Exactly one tutor speaks per turn.\n");
    out.push_str(
        "- Every utterance starts with the speaking tutor's name and a colon, e.g. \"Clara: ...\".\n",
    );
    out.push_str("- Stay in character and keep turns short enough to feel conversational.\n");
    out.push_str("- Bracketed messages like [Continue] are stage directions, not dialogue; follow them silently.\n");
    if casual {
        out.push_str("- Keep the register casual and friendly rather than formal.\n");
    }

    match dialogue.participants() {
        Some((a, b)) => {
            out.push_str(&format!(
                "\nDIALOGUE MODE: ACTIVE between {} and {}. Only these two may speak until it is lifted.\n",
                a, b
            ));
        }
        None => {
            out.push_str("\nDIALOGUE MODE: INACTIVE. The whole panel shares the floor.\n");
        }
    }

    out.push_str(&format!(
        "\nSTUDY MATERIAL ({}):\n{}\n",
        material.name, material.content
    ));

    out
}
