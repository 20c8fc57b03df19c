use crate::client::{Content, GenerationConfig, Setup, SetupMessage, SpeechConfig, TranscriptionRequest};

pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-exp";

/// Session-level configuration rendered into the one-time setup message.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    model: String,
    modalities: Vec<String>,
    voice: Option<String>,
    instructions: Option<String>,
    input_transcription: bool,
    output_transcription: bool,
}

impl SessionConfig {
    pub fn new() -> SessionConfigurator {
        SessionConfigurator::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn into_setup(self) -> SetupMessage {
        SetupMessage {
            setup: Setup {
                model: self.model,
                generation_config: GenerationConfig {
                    response_modalities: self.modalities,
                    speech_config: self.voice.as_deref().map(SpeechConfig::voice),
                },
                system_instruction: self.instructions.as_deref().map(Content::text),
                input_audio_transcription: self.input_transcription.then(TranscriptionRequest::default),
                output_audio_transcription: self.output_transcription.then(TranscriptionRequest::default),
            },
        }
    }
}

pub struct SessionConfigurator {
    config: SessionConfig,
}

impl SessionConfigurator {
    pub fn new() -> Self {
        Self {
            config: SessionConfig {
                model: DEFAULT_MODEL.to_string(),
                modalities: vec!["AUDIO".to_string()],
                voice: None,
                instructions: None,
                input_transcription: false,
                output_transcription: false,
            },
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_voice(mut self, voice: &str) -> Self {
        self.config.voice = Some(voice.to_string());
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.config.instructions = Some(instructions.to_string());
        self
    }

    pub fn with_input_transcription_enable(mut self) -> Self {
        self.config.input_transcription = true;
        self
    }

    pub fn with_output_transcription_enable(mut self) -> Self {
        self.config.output_transcription = true;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_carries_voice_and_transcription_requests() {
        let config = SessionConfig::new()
            .with_voice("Puck")
            .with_instructions("You are a tutor panel.")
            .with_input_transcription_enable()
            .with_output_transcription_enable()
            .build();
        let json = serde_json::to_string(&config.into_setup()).unwrap();
        assert!(json.contains("\"voiceName\":\"Puck\""));
        assert!(json.contains("\"inputAudioTranscription\":{}"));
        assert!(json.contains("\"outputAudioTranscription\":{}"));
        assert!(json.contains("\"responseModalities\":[\"AUDIO\"]"));
        assert!(json.contains("You are a tutor panel."));
    }

    #[test]
    fn bare_setup_omits_optional_sections() {
        let config = SessionConfig::new().build();
        let json = serde_json::to_string(&config.into_setup()).unwrap();
        assert!(json.contains(DEFAULT_MODEL));
        assert!(!json.contains("systemInstruction"));
        assert!(!json.contains("speechConfig"));
        assert!(!json.contains("AudioTranscription"));
    }
}
