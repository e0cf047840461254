//! `GenerationClient`: the single entry point tools call.
//!
//! ## Call lifecycle
//!
//! ```text
//! execute(request)
//!     └─► Requesting           (event)
//!         └─► model[0]         ── Capacity/Unsupported ──► model[1] (once)
//!             └─► decode       → Succeeded / Failed / Pending (event)
//! ```
//!
//! No retry beyond the single fallback, no backoff. Video operations are
//! polled at a fixed interval for a bounded number of polls; when the budget
//! runs out the call resolves to `Pending` and the caller polls again later.
//!
//! `GenerationClient` is `Send + Sync`; share it behind an `Arc` across tools.

use std::future::Future;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::sanitize::clean_response;
use super::transport::{HttpTransport, Transport};
use super::wire::{
    self, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Operation,
    Part,
};
use super::{
    history_window, Capability, ChatTurn, GenerationFailure, GenerationOutput, GenerationRequest,
    GenerationResult, PendingVideo, ServiceStatus,
};
use crate::audio::{pcm, AudioSampleBuffer};
use crate::config::ClientConfig;
use crate::error::{Result, UnityError};
use crate::events::{GenerationEvent, GenerationStatus};
use crate::media::{AspectRatio, Attachment, DataUri, MAX_REFERENCE_AUDIO_BYTES};

/// Broadcast channel capacity: 256 status events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Instruction sent alongside a reference recording for voice matching.
const REFERENCE_VOICE_INSTRUCTION: &str =
    "Read the following text aloud, matching the voice, accent and timbre of the attached recording.";

pub struct GenerationClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    /// Broadcast sender for status events.
    events_tx: broadcast::Sender<GenerationEvent>,
    /// Monotonically increasing event sequence counter.
    seq: AtomicU64,
    /// Monotonically increasing call id counter.
    request_ids: AtomicU64,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenerationClient {
    /// Build a client with the HTTP transport.
    ///
    /// A missing credential does not fail construction; calls fail instead and
    /// [`GenerationClient::service_status`] reports the service as unavailable.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let (events_tx, _) = broadcast::channel(BROADCAST_CAP);
        if config.api_key.is_none() {
            warn!("no API key configured; generation service unavailable");
        }
        Self {
            config,
            transport,
            events_tx,
            seq: AtomicU64::new(0),
            request_ids: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn service_status(&self) -> ServiceStatus {
        match self.api_key() {
            Ok(_) => ServiceStatus::Available,
            Err(e) => ServiceStatus::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    /// Subscribe to status events of every call made through this client.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events_tx.subscribe()
    }

    // ── Facade operations ────────────────────────────────────────────────────

    /// Run any request. Never panics on backend behavior and never returns an
    /// error: failures come back as `GenerationResult::Failed`.
    pub async fn execute(&self, request: GenerationRequest) -> GenerationResult {
        let capability = request.capability();
        let request_id = self.request_ids.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(request_id, capability, GenerationStatus::Requesting, None);

        let result = match self.perform(request_id, &request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(request_id, %capability, error = %e, "generation failed");
                GenerationResult::Failed(GenerationFailure::from(e))
            }
        };

        let (status, detail) = match &result {
            GenerationResult::Succeeded(_) => (GenerationStatus::Succeeded, None),
            GenerationResult::Pending(p) => (GenerationStatus::Pending, Some(p.operation.clone())),
            GenerationResult::Failed(f) => (GenerationStatus::Failed, Some(f.message.clone())),
        };
        self.emit(request_id, capability, status, detail);
        result
    }

    pub async fn generate_text(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
    ) -> std::result::Result<String, GenerationFailure> {
        self.execute(GenerationRequest::Text {
            prompt: prompt.into(),
            system_instruction: system_instruction.map(str::to_string),
        })
        .await
        .into_text()
    }

    /// Multi-turn chat. Only the trailing `config.chat_window` turns of
    /// `history` are sent.
    pub async fn generate_chat(
        &self,
        history: &[ChatTurn],
        message: &str,
        images: &[Attachment],
        system_instruction: Option<&str>,
    ) -> std::result::Result<String, GenerationFailure> {
        self.execute(GenerationRequest::Chat {
            history: history.to_vec(),
            message: message.into(),
            images: images.to_vec(),
            system_instruction: system_instruction.map(str::to_string),
        })
        .await
        .into_text()
    }

    /// Generate an image, or edit `reference` when given.
    pub async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&Attachment>,
        aspect_ratio: Option<AspectRatio>,
    ) -> std::result::Result<DataUri, GenerationFailure> {
        self.execute(GenerationRequest::Image {
            prompt: prompt.into(),
            reference: reference.cloned(),
            aspect_ratio,
        })
        .await
        .into_image()
    }

    pub async fn analyze_image(
        &self,
        prompt: &str,
        image: &Attachment,
    ) -> std::result::Result<String, GenerationFailure> {
        self.execute(GenerationRequest::ImageAnalysis {
            prompt: prompt.into(),
            image: image.clone(),
        })
        .await
        .into_text()
    }

    pub async fn generate_speech(
        &self,
        text: &str,
        voice: &str,
        style: Option<&str>,
    ) -> std::result::Result<AudioSampleBuffer, GenerationFailure> {
        self.execute(GenerationRequest::Speech {
            text: text.into(),
            voice: voice.into(),
            style: style.map(str::to_string),
        })
        .await
        .into_audio()
    }

    pub async fn generate_speech_from_reference(
        &self,
        text: &str,
        reference: &Attachment,
        style: Option<&str>,
    ) -> std::result::Result<AudioSampleBuffer, GenerationFailure> {
        self.execute(GenerationRequest::SpeechFromReference {
            text: text.into(),
            reference: reference.clone(),
            style: style.map(str::to_string),
        })
        .await
        .into_audio()
    }

    /// Start a video and poll it within the configured budget.
    ///
    /// `Succeeded(Video(url))` when it finished in time, `Pending` otherwise.
    pub async fn generate_video(
        &self,
        prompt: &str,
        aspect_ratio: Option<AspectRatio>,
    ) -> GenerationResult {
        self.execute(GenerationRequest::Video {
            prompt: prompt.into(),
            aspect_ratio,
        })
        .await
    }

    /// One follow-up status check of a pending video.
    pub async fn poll_video(&self, pending: &PendingVideo) -> GenerationResult {
        let request_id = self.request_ids.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(
            request_id,
            Capability::Video,
            GenerationStatus::Requesting,
            Some(pending.operation.clone()),
        );
        let result = match self.fetch_operation(&pending.operation).await {
            Ok(op) => self.finish_operation(op, 0).await,
            Err(e) if e.is_transient() => {
                warn!(operation = pending.operation.as_str(), error = %e, "status poll failed, video pending");
                Ok(GenerationResult::Pending(pending.clone()))
            }
            Err(e) => Err(e),
        };
        let result = result.unwrap_or_else(|e| GenerationResult::Failed(e.into()));
        let (status, detail) = match &result {
            GenerationResult::Succeeded(_) => (GenerationStatus::Succeeded, None),
            GenerationResult::Pending(p) => (GenerationStatus::Pending, Some(p.operation.clone())),
            GenerationResult::Failed(f) => (GenerationStatus::Failed, Some(f.message.clone())),
        };
        self.emit(request_id, Capability::Video, status, detail);
        result
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    async fn perform(&self, request_id: u64, request: &GenerationRequest) -> Result<GenerationResult> {
        let capability = request.capability();
        match request {
            GenerationRequest::Text {
                prompt,
                system_instruction,
            } => {
                let body = GenerateContentRequest::new(vec![Content::new(
                    Some("user"),
                    vec![Part::text(prompt.as_str())],
                )])
                .with_system_instruction(system_instruction.as_deref());
                let response = self.generate_content(request_id, capability, &body).await?;
                text_output(&response)
            }
            GenerationRequest::Chat {
                history,
                message,
                images,
                system_instruction,
            } => {
                let mut contents: Vec<Content> = history_window(history, self.config.chat_window)
                    .iter()
                    .map(|turn| Content::new(Some(turn.role.as_str()), vec![Part::text(turn.text.as_str())]))
                    .collect();
                let mut parts: Vec<Part> = images.iter().map(Part::attachment).collect();
                parts.push(Part::text(message.as_str()));
                contents.push(Content::new(Some("user"), parts));

                let body = GenerateContentRequest::new(contents)
                    .with_system_instruction(system_instruction.as_deref());
                let response = self.generate_content(request_id, capability, &body).await?;
                text_output(&response)
            }
            GenerationRequest::ImageAnalysis { prompt, image } => {
                if !image.is_image() {
                    return Err(UnityError::InvalidInput(format!(
                        "analysis needs an image, got {}",
                        image.mime_type
                    )));
                }
                let body = GenerateContentRequest::new(vec![Content::new(
                    Some("user"),
                    vec![Part::attachment(image), Part::text(prompt.as_str())],
                )]);
                let response = self.generate_content(request_id, capability, &body).await?;
                text_output(&response)
            }
            GenerationRequest::Image {
                prompt,
                reference,
                aspect_ratio,
            } => {
                let mut parts: Vec<Part> = reference.iter().map(Part::attachment).collect();
                parts.push(Part::text(prompt.as_str()));
                let body = GenerateContentRequest::new(vec![Content::new(Some("user"), parts)])
                    .with_config(GenerationConfig::image(*aspect_ratio));
                let response = self.generate_content(request_id, capability, &body).await?;
                let data = response.inline_data("image/").ok_or_else(|| {
                    UnityError::Decode("response contained no image data".into())
                })?;
                Ok(GenerationResult::Succeeded(GenerationOutput::Image(DataUri::new(
                    data.mime_type.clone(),
                    data.data.clone(),
                ))))
            }
            GenerationRequest::Speech { text, voice, style } => {
                let prompt = speech_prompt(text, style.as_deref());
                let body = GenerateContentRequest::new(vec![Content::new(
                    Some("user"),
                    vec![Part::text(prompt)],
                )])
                .with_config(GenerationConfig::speech(Some(voice.as_str())));
                let response = self.generate_content(request_id, capability, &body).await?;
                audio_output(&response)
            }
            GenerationRequest::SpeechFromReference {
                text,
                reference,
                style,
            } => {
                if !reference.is_audio() {
                    return Err(UnityError::InvalidInput(format!(
                        "reference voice must be audio, got {}",
                        reference.mime_type
                    )));
                }
                if reference.bytes.len() > MAX_REFERENCE_AUDIO_BYTES {
                    return Err(UnityError::InvalidInput(
                        "reference audio is larger than 10 MB".into(),
                    ));
                }
                let prompt = format!(
                    "{REFERENCE_VOICE_INSTRUCTION}\n{}",
                    speech_prompt(text, style.as_deref())
                );
                let body = GenerateContentRequest::new(vec![Content::new(
                    Some("user"),
                    vec![Part::attachment(reference), Part::text(prompt)],
                )])
                .with_config(GenerationConfig::speech(None));
                let response = self.generate_content(request_id, capability, &body).await?;
                audio_output(&response)
            }
            GenerationRequest::Video {
                prompt,
                aspect_ratio,
            } => {
                let body = wire::video_request(prompt, *aspect_ratio);
                let body = &body;
                let op = self
                    .with_fallback(request_id, capability, |model| async move {
                        self.start_operation(&model, body).await
                    })
                    .await?;
                info!(request_id, operation = op.name.as_str(), "video operation started");
                self.finish_operation(op, self.config.video_max_polls).await
            }
        }
    }

    // ── Backend calls ────────────────────────────────────────────────────────

    /// Try the first model for `capability`; on a capacity or not-available
    /// signal, try the second exactly once.
    async fn with_fallback<T, F, Fut>(
        &self,
        request_id: u64,
        capability: Capability,
        mut attempt: F,
    ) -> Result<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let models = self.config.models.models(capability);
        let Some(primary) = models.first() else {
            return Err(UnityError::Unsupported(format!(
                "no model configured for {capability}"
            )));
        };

        debug!(request_id, %capability, model = primary.as_str(), "attempt");
        match attempt(primary.clone()).await {
            Err(e) if e.is_fallback_eligible() => {
                let Some(fallback) = models.get(1) else {
                    return Err(e);
                };
                warn!(
                    request_id,
                    %capability,
                    primary = primary.as_str(),
                    fallback = fallback.as_str(),
                    error = %e,
                    "primary model unavailable, trying fallback once"
                );
                self.emit(
                    request_id,
                    capability,
                    GenerationStatus::Requesting,
                    Some(format!("fallback to {fallback}")),
                );
                attempt(fallback.clone()).await
            }
            other => other,
        }
    }

    async fn generate_content(
        &self,
        request_id: u64,
        capability: Capability,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let payload = body.to_value()?;
        let payload = &payload;
        self.with_fallback(request_id, capability, |model| async move {
            let url = format!("{}/models/{model}:generateContent", self.config.base_url);
            self.post(&url, payload).await
        })
        .await
    }

    async fn start_operation(&self, model: &str, body: &serde_json::Value) -> Result<Operation> {
        let url = format!("{}/models/{model}:predictLongRunning", self.config.base_url);
        let op: Operation = self.post(&url, body).await?;
        if op.name.is_empty() && !op.done {
            return Err(UnityError::Decode("video operation has no name".into()));
        }
        Ok(op)
    }

    async fn fetch_operation(&self, name: &str) -> Result<Operation> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.config.base_url, name.trim_start_matches('/'));
        let response = self.transport.get_json(&url, api_key).await?;
        if !response.is_success() {
            return Err(wire::classify_failure(response.status, &response.body));
        }
        let mut op: Operation = wire::parse_success(&response.body)?;
        if op.name.is_empty() {
            op.name = name.to_string();
        }
        Ok(op)
    }

    /// Poll `op` up to `budget` times at the configured interval.
    async fn finish_operation(&self, mut op: Operation, budget: u32) -> Result<GenerationResult> {
        let mut polls = 0u32;
        loop {
            if op.done {
                if let Some(err) = op.error.as_ref() {
                    return Err(wire::classify(err.code.unwrap_or(500), Some(err)));
                }
                let uri = op.video_uri().ok_or_else(|| {
                    UnityError::Decode("video operation finished without a video URI".into())
                })?;
                return Ok(GenerationResult::Succeeded(GenerationOutput::Video(
                    uri.to_string(),
                )));
            }
            if polls >= budget {
                debug!(operation = op.name.as_str(), polls, "poll budget spent, video pending");
                return Ok(GenerationResult::Pending(PendingVideo { operation: op.name }));
            }
            tokio::time::sleep(self.config.video_poll_interval).await;
            polls += 1;
            match self.fetch_operation(&op.name).await {
                Ok(next) => op = next,
                Err(e) if e.is_transient() => {
                    warn!(operation = op.name.as_str(), error = %e, "status poll failed, video pending");
                    return Ok(GenerationResult::Pending(PendingVideo { operation: op.name }));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post<T>(&self, url: &str, body: &serde_json::Value) -> Result<T>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let api_key = self.api_key()?;
        let response = self.transport.post_json(url, api_key, body).await?;
        if !response.is_success() {
            return Err(wire::classify_failure(response.status, &response.body));
        }
        wire::parse_success(&response.body)
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            UnityError::Configuration(
                "API key is missing; set UNITY_API_KEY (or GEMINI_API_KEY)".into(),
            )
        })
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn emit(
        &self,
        request_id: u64,
        capability: Capability,
        status: GenerationStatus,
        detail: Option<String>,
    ) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.events_tx.send(GenerationEvent {
            seq,
            request_id,
            capability,
            status,
            detail,
        });
    }
}

fn speech_prompt(text: &str, style: Option<&str>) -> String {
    match style.map(str::trim).filter(|s| !s.is_empty()) {
        Some(style) => format!("{style}\n{text}"),
        None => text.to_string(),
    }
}

fn text_output(response: &GenerateContentResponse) -> Result<GenerationResult> {
    let text = response
        .text()
        .ok_or_else(|| UnityError::Decode("response contained no text".into()))?;
    Ok(GenerationResult::Succeeded(GenerationOutput::Text(
        clean_response(&text),
    )))
}

fn audio_output(response: &GenerateContentResponse) -> Result<GenerationResult> {
    let data = response
        .inline_data("audio/")
        .ok_or_else(|| UnityError::Decode("response contained no audio data".into()))?;
    let mime = data.mime_type.to_ascii_lowercase();
    if !(mime.contains("l16") || mime.contains("pcm")) {
        return Err(UnityError::Decode(format!(
            "unsupported audio encoding: {}",
            data.mime_type
        )));
    }
    let sample_rate = pcm::sample_rate_from_mime(&data.mime_type);
    let buffer = pcm::decode_pcm16_base64(&data.data, sample_rate, 1)?;
    debug!(
        sample_rate,
        frames = buffer.frame_count(),
        "decoded speech audio"
    );
    Ok(GenerationResult::Succeeded(GenerationOutput::Audio(buffer)))
}
