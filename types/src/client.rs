//! Client-to-server messages for the live streaming channel.
//!
//! Two message families share the channel: a one-time `setup` envelope sent
//! on open, and `realtimeInput` envelopes carrying media chunks and/or
//! free text for the rest of the session.

/// MIME type for microphone audio sent to the model.
pub const AUDIO_INPUT_MIME: &str = "audio/pcm;rate=16000";

/// Envelope for the one-time session configuration message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,

    pub generation_config: GenerationConfig,

    /// System instruction text prepended to the session. Resending it later
    /// would reset conversational grounding, so it is only ever sent here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// Presence requests speech-to-text for the user's audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<TranscriptionRequest>,

    /// Presence requests speech-to-text for the model's audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<TranscriptionRequest>,
}

/// Empty marker object; its presence in the setup enables the feature.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TranscriptionRequest {}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// The modalities the model may respond with, e.g. `["AUDIO"]`.
    pub response_modalities: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

impl SpeechConfig {
    pub fn voice(name: &str) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: name.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

impl Content {
    pub fn text(text: &str) -> Self {
        Self {
            parts: vec![TextPart {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// Base64-encoded media payload tagged with its format.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    /// A microphone audio chunk in the input wire format.
    pub fn audio_input(base64_pcm16: String) -> Self {
        Self {
            mime_type: AUDIO_INPUT_MIME.to_string(),
            data: base64_pcm16,
        }
    }
}

/// Envelope for realtime media and text sent after setup.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_chunks: Option<Vec<Blob>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Anything the client can put on the wire.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Setup(SetupMessage),
    RealtimeInput(RealtimeInputMessage),
}

impl ClientMessage {
    pub fn media(chunk: Blob) -> Self {
        Self::RealtimeInput(RealtimeInputMessage {
            realtime_input: RealtimeInput {
                media_chunks: Some(vec![chunk]),
                text: None,
            },
        })
    }

    pub fn text(text: String) -> Self {
        Self::RealtimeInput(RealtimeInputMessage {
            realtime_input: RealtimeInput {
                media_chunks: None,
                text: Some(text),
            },
        })
    }
}
