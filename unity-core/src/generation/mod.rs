//! Generation client facade.
//!
//! One interface over the generation backend for every tool: text, chat,
//! image, image analysis, speech, reference-voice speech, and video. Backend
//! responses are normalized into [`GenerationOutput`] and every failure into a
//! [`GenerationFailure`] value.

pub mod client;
pub mod sanitize;
pub mod transport;
pub mod wire;

pub use client::GenerationClient;
pub use transport::{HttpTransport, Transport, TransportResponse};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioSampleBuffer;
use crate::error::UnityError;
use crate::media::{AspectRatio, Attachment, DataUri};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// What a request asks the backend to do. Each capability has its own ranked
/// model list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Text,
    Chat,
    Image,
    Analysis,
    Speech,
    Video,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Text,
        Capability::Chat,
        Capability::Image,
        Capability::Analysis,
        Capability::Speech,
        Capability::Video,
    ];

    /// Suffix of the `UNITY_MODELS_*` override variable.
    pub fn env_suffix(self) -> &'static str {
        match self {
            Capability::Text => "TEXT",
            Capability::Chat => "CHAT",
            Capability::Image => "IMAGE",
            Capability::Analysis => "ANALYSIS",
            Capability::Speech => "SPEECH",
            Capability::Video => "VIDEO",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Chat => "chat",
            Capability::Image => "image",
            Capability::Analysis => "analysis",
            Capability::Speech => "speech",
            Capability::Video => "video",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chat turns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One prior message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The trailing `window` turns of `history`; older turns are not sent.
pub fn history_window(history: &[ChatTurn], window: usize) -> &[ChatTurn] {
    &history[history.len().saturating_sub(window)..]
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// One generation call, discriminated by capability.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Text {
        prompt: String,
        system_instruction: Option<String>,
    },
    Chat {
        history: Vec<ChatTurn>,
        message: String,
        images: Vec<Attachment>,
        system_instruction: Option<String>,
    },
    Image {
        prompt: String,
        reference: Option<Attachment>,
        aspect_ratio: Option<AspectRatio>,
    },
    ImageAnalysis {
        prompt: String,
        image: Attachment,
    },
    Speech {
        text: String,
        voice: String,
        style: Option<String>,
    },
    SpeechFromReference {
        text: String,
        reference: Attachment,
        style: Option<String>,
    },
    Video {
        prompt: String,
        aspect_ratio: Option<AspectRatio>,
    },
}

impl GenerationRequest {
    pub fn capability(&self) -> Capability {
        match self {
            GenerationRequest::Text { .. } => Capability::Text,
            GenerationRequest::Chat { .. } => Capability::Chat,
            GenerationRequest::Image { .. } => Capability::Image,
            GenerationRequest::ImageAnalysis { .. } => Capability::Analysis,
            GenerationRequest::Speech { .. } | GenerationRequest::SpeechFromReference { .. } => {
                Capability::Speech
            }
            GenerationRequest::Video { .. } => Capability::Video,
        }
    }
}

/// Successful payload of a generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    /// Sanitized plain text.
    Text(String),
    Image(DataUri),
    /// Remote URL of the finished video.
    Video(String),
    Audio(AudioSampleBuffer),
}

/// A video operation that has not finished yet. Not playable media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVideo {
    /// Backend operation resource name, used for follow-up polls.
    pub operation: String,
}

/// Outcome of one call: exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Succeeded(GenerationOutput),
    Pending(PendingVideo),
    Failed(GenerationFailure),
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Succeeded(_))
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        match self {
            GenerationResult::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_text(self) -> Result<String, GenerationFailure> {
        match self {
            GenerationResult::Succeeded(GenerationOutput::Text(text)) => Ok(text),
            other => Err(other.into_failure("text")),
        }
    }

    pub fn into_image(self) -> Result<DataUri, GenerationFailure> {
        match self {
            GenerationResult::Succeeded(GenerationOutput::Image(uri)) => Ok(uri),
            other => Err(other.into_failure("image")),
        }
    }

    pub fn into_audio(self) -> Result<AudioSampleBuffer, GenerationFailure> {
        match self {
            GenerationResult::Succeeded(GenerationOutput::Audio(buffer)) => Ok(buffer),
            other => Err(other.into_failure("audio")),
        }
    }

    fn into_failure(self, expected: &str) -> GenerationFailure {
        match self {
            GenerationResult::Failed(failure) => failure,
            GenerationResult::Pending(pending) => GenerationFailure::from(UnityError::Decode(
                format!("expected {expected}, operation {} is still pending", pending.operation),
            )),
            GenerationResult::Succeeded(_) => GenerationFailure::from(UnityError::Decode(
                format!("expected {expected} output"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Configuration,
    Transport,
    Backend,
    Decode,
    Capacity,
    Unsupported,
    Input,
}

/// A failed call, ready to show inline to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Backend status code, when the backend answered.
    pub code: Option<u16>,
    /// Whether trying again later may succeed.
    pub retryable: bool,
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for GenerationFailure {}

impl From<UnityError> for GenerationFailure {
    fn from(err: UnityError) -> Self {
        let message = err.to_string();
        let retryable = err.is_transient();
        let (kind, code) = match err {
            UnityError::Configuration(_) => (FailureKind::Configuration, None),
            UnityError::Transport(_) => (FailureKind::Transport, None),
            UnityError::Backend { code, .. } => (FailureKind::Backend, Some(code)),
            UnityError::Decode(_) | UnityError::InvalidBuffer(_) => (FailureKind::Decode, None),
            UnityError::Capacity(_) => (FailureKind::Capacity, Some(429)),
            UnityError::Unsupported(_) => (FailureKind::Unsupported, None),
            UnityError::InvalidInput(_) => (FailureKind::Input, None),
            UnityError::Io(_) | UnityError::Other(_) => (FailureKind::Transport, None),
        };
        Self {
            kind,
            message,
            code,
            retryable,
        }
    }
}

/// Whether the client can reach the backend at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum ServiceStatus {
    Available,
    Unavailable { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_only_trailing_turns() {
        let history: Vec<ChatTurn> = (0..20).map(|i| ChatTurn::user(format!("turn {i}"))).collect();
        let window = history_window(&history, 8);
        assert_eq!(window.len(), 8);
        assert_eq!(window[0].text, "turn 12");
        assert_eq!(window[7].text, "turn 19");

        assert_eq!(history_window(&history[..3], 8).len(), 3);
        assert!(history_window(&history, 0).is_empty());
    }

    #[test]
    fn failure_conversion_sets_retry_hints() {
        let capacity = GenerationFailure::from(UnityError::Capacity("quota".into()));
        assert_eq!(capacity.kind, FailureKind::Capacity);
        assert!(capacity.retryable);

        let backend = GenerationFailure::from(UnityError::Backend {
            code: 500,
            message: "boom".into(),
        });
        assert_eq!(backend.kind, FailureKind::Backend);
        assert_eq!(backend.code, Some(500));
        assert!(!backend.retryable);

        let config = GenerationFailure::from(UnityError::Configuration("no key".into()));
        assert!(!config.retryable);
        assert!(config.message.contains("service unavailable"));
    }

    #[test]
    fn local_failures_are_not_retryable() {
        let io = GenerationFailure::from(UnityError::Io(std::io::Error::other("disk full")));
        assert!(!io.retryable);

        let other = GenerationFailure::from(UnityError::Other(anyhow::anyhow!(
            "request body did not serialize"
        )));
        assert!(!other.retryable);

        let network = GenerationFailure::from(UnityError::Transport("connection reset".into()));
        assert!(network.retryable);
    }

    #[test]
    fn typed_accessors_surface_failures() {
        let failed = GenerationResult::Failed(GenerationFailure::from(UnityError::Transport(
            "timeout".into(),
        )));
        let err = failed.into_text().unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);

        let pending = GenerationResult::Pending(PendingVideo {
            operation: "operations/1".into(),
        });
        assert!(pending.into_image().is_err());

        let ok = GenerationResult::Succeeded(GenerationOutput::Text("hi".into()));
        assert_eq!(ok.into_text().unwrap(), "hi");
    }

    #[test]
    fn request_reports_capability() {
        let request = GenerationRequest::SpeechFromReference {
            text: "hello".into(),
            reference: Attachment::new("audio/wav", vec![]),
            style: None,
        };
        assert_eq!(request.capability(), Capability::Speech);
    }

    #[test]
    fn service_status_serializes_with_state_tag() {
        let json = serde_json::to_value(ServiceStatus::Unavailable {
            reason: "API key is missing".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "unavailable");
        assert_eq!(json["reason"], "API key is missing");
    }
}
