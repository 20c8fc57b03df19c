//! Server-to-client messages.
//!
//! A single message may carry any combination of an input transcription
//! fragment, an output transcription fragment, model audio parts, and a
//! turn-complete marker; consumers must process every field present.

use crate::client::Blob;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<SetupComplete>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SetupComplete {}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    /// Speech-to-text fragment of what the user said.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_transcription: Option<Transcription>,

    /// Speech-to-text fragment of what the model said.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_transcription: Option<Transcription>,

    /// Model speech audio, delivered as inline base64 PCM parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_turn: Option<Turn>,

    /// Hard ordering barrier: the current turn's buffers are flushed after
    /// this and receive no further fragments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Transcription {
    pub text: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Turn {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_combined_content_message() {
        let json = r#"{
            "serverContent": {
                "outputTranscription": {"text": "Clara: Hello"},
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAA="}}]},
                "turnComplete": true
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        let content = msg.server_content.unwrap();
        assert_eq!(content.output_transcription.unwrap().text, "Clara: Hello");
        assert_eq!(content.turn_complete, Some(true));
        let turn = content.model_turn.unwrap();
        assert_eq!(turn.parts.len(), 1);
        assert!(turn.parts[0].inline_data.is_some());
        assert!(content.input_transcription.is_none());
    }

    #[test]
    fn deserializes_setup_complete() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert!(msg.setup_complete.is_some());
        assert!(msg.server_content.is_none());
    }
}
