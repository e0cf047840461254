//! # unity-core
//!
//! Generation SDK behind the Unity creative-suite tools.
//!
//! ## Architecture
//!
//! ```text
//! tool (host) ─► GenerationClient ─► Transport (reqwest) ─► generation backend
//!                      │
//!                 wire decode ──► text / image data URI / video URL
//!                      │
//!                 PCM decode ──► AudioSampleBuffer ──► encode_wav ──► WavContainer
//!                      │
//!         broadcast::Sender<GenerationEvent>
//! ```
//!
//! Failures never escape the client as errors: every call resolves to a value
//! the caller can render.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod media;
pub mod slot;

// Convenience re-exports for downstream crates
pub use audio::wav::{encode_planar, encode_wav, WavContainer};
pub use audio::AudioSampleBuffer;
pub use config::{ClientConfig, ModelRoster};
pub use error::UnityError;
pub use events::{GenerationEvent, GenerationStatus};
pub use generation::{
    Capability, ChatRole, ChatTurn, FailureKind, GenerationClient, GenerationFailure,
    GenerationOutput, GenerationRequest, GenerationResult, PendingVideo, ServiceStatus,
};
pub use media::{AspectRatio, Attachment, DataUri};
pub use slot::{RequestTicket, ResultSlot};
