//! Status events broadcast by `GenerationClient`.
//!
//! Every generation call walks `Idle → Requesting → {Succeeded | Failed | Pending}`
//! and each transition is published with the call's request id, so a host can
//! drive per-tool spinners and inline error text from one subscription.

use serde::{Deserialize, Serialize};

use crate::generation::Capability;

/// Emitted for every status change of a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Id of the call this event belongs to (stable across its transitions).
    pub request_id: u64,
    pub capability: Capability,
    pub status: GenerationStatus,
    /// Optional human-readable detail (model used, failure message, operation name).
    pub detail: Option<String>,
}

/// Lifecycle state of one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    /// No request issued yet.
    Idle,
    /// Request sent, waiting for the backend.
    Requesting,
    /// Terminal: a result is available.
    Succeeded,
    /// Terminal: the call failed; `detail` carries the reason.
    Failed,
    /// Video only: the operation is still running and needs a follow-up poll.
    Pending,
}

impl GenerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Succeeded | GenerationStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_event_serializes_with_camel_case_and_lowercase_status() {
        let event = GenerationEvent {
            seq: 7,
            request_id: 3,
            capability: Capability::Speech,
            status: GenerationStatus::Requesting,
            detail: Some("gemini-2.5-flash-preview-tts".into()),
        };

        let json = serde_json::to_value(&event).expect("serialize generation event");
        assert_eq!(json["seq"], 7);
        assert_eq!(json["requestId"], 3);
        assert_eq!(json["capability"], "speech");
        assert_eq!(json["status"], "requesting");
        assert_eq!(json["detail"], "gemini-2.5-flash-preview-tts");

        let round_trip: GenerationEvent =
            serde_json::from_value(json).expect("deserialize generation event");
        assert_eq!(round_trip.request_id, 3);
        assert_eq!(round_trip.status, GenerationStatus::Requesting);
    }

    #[test]
    fn status_rejects_non_lowercase_values() {
        let err = serde_json::from_str::<GenerationStatus>(r#""Pending""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(GenerationStatus::Succeeded.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
        assert!(!GenerationStatus::Pending.is_terminal());
        assert!(!GenerationStatus::Requesting.is_terminal());
        assert!(!GenerationStatus::Idle.is_terminal());
    }
}
