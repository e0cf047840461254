//! Command handlers behind the `unity` subcommands.
//!
//! Every handler returns `Result<_, String>`: the error string is what the
//! user sees inline, never a panic or a raw transport error.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use unity_core::{
    encode_wav, AspectRatio, Attachment, Capability, DataUri, GenerationFailure,
    GenerationOutput, GenerationResult, PendingVideo, RequestTicket, ServiceStatus,
};

use crate::session::ChatSession;
use crate::settings::{save_settings, RuntimeSettings};
use crate::state::AppState;
use crate::storage::{AudioVariant, HistoryPage, HistoryRecordInput, MediaKind};
use crate::tools::{
    self, ChatTool, CopyFramework, ImageMode, ScriptMode, Tool, BRAIN_IMAGE_ONLY_LABEL,
    BRAIN_IMAGE_ONLY_PROMPT, BRAND_KIT_PROMPT, CUSTOM_VOICE_LABEL, FLYER_PLAN_INSTRUCTION,
    SCRIPT_SUMMARY_INSTRUCTION,
};

/// What a tool produced, ready to print.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ToolOutput {
    Text {
        text: String,
    },
    Image {
        path: PathBuf,
        mime_type: String,
        /// Flyer design plan the image was rendered from.
        #[serde(skip_serializing_if = "Option::is_none")]
        plan: Option<String>,
    },
    Video {
        url: String,
    },
    VideoPending {
        operation: String,
    },
    Audio {
        path: PathBuf,
        duration_secs: f64,
    },
}

impl fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolOutput::Text { text } => f.write_str(text),
            ToolOutput::Image { path, plan, .. } => {
                if let Some(plan) = plan {
                    writeln!(f, "{plan}")?;
                }
                write!(f, "image saved to {}", path.display())
            }
            ToolOutput::Video { url } => write!(f, "video ready: {url}"),
            ToolOutput::VideoPending { operation } => write!(
                f,
                "video still rendering; check later with `unity video-status --operation {operation}`"
            ),
            ToolOutput::Audio {
                path,
                duration_secs,
            } => write!(f, "{duration_secs:.1}s of audio saved to {}", path.display()),
        }
    }
}

/// Inline message for a failed generation.
pub fn failure_message(failure: GenerationFailure) -> String {
    if failure.retryable {
        format!("{failure}. Please try again shortly.")
    } else {
        failure.to_string()
    }
}

fn record(kind: MediaKind, tool: Tool, prompt: &str, location: impl Into<String>) -> HistoryRecordInput {
    HistoryRecordInput {
        kind,
        tool: tool.as_str().into(),
        prompt: prompt.into(),
        location: location.into(),
        audio_variant: None,
    }
}

fn load_attachment(path: &Path) -> Result<Attachment, String> {
    Attachment::from_path(path).map_err(|e| format!("{}: {e}", path.display()))
}

fn load_image(path: &Path) -> Result<Attachment, String> {
    let attachment = load_attachment(path)?;
    if !attachment.is_image() {
        return Err(format!("{} is not an image", path.display()));
    }
    Ok(attachment)
}

fn save_image(
    state: &AppState,
    tool: Tool,
    ticket: RequestTicket,
    uri: &DataUri,
) -> Result<PathBuf, String> {
    state.ensure_current(tool, ticket)?;
    let bytes = uri.decode_bytes().map_err(|e| e.to_string())?;
    let path = state.output_path(tool, uri.extension());
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(&path, bytes).map_err(|e| e.to_string())?;
    Ok(path)
}

// ── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub service: ServiceStatus,
    pub base_url: String,
    pub models: Vec<CapabilityModels>,
    pub history_enabled: bool,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityModels {
    pub capability: Capability,
    pub models: Vec<String>,
}

pub fn get_status(state: &AppState) -> StatusReport {
    let config = state.client.config();
    let settings = state.settings.lock();
    StatusReport {
        service: state.client.service_status(),
        base_url: config.base_url.clone(),
        models: Capability::ALL
            .into_iter()
            .map(|capability| CapabilityModels {
                capability,
                models: config.models.models(capability).to_vec(),
            })
            .collect(),
        history_enabled: settings.history_enabled,
        output_dir: settings.output_dir().to_string_lossy().into_owned(),
    }
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub tool: ChatTool,
    pub message: Option<String>,
    /// Brain quick action id, used when no message is given.
    pub action: Option<String>,
    pub images: Vec<PathBuf>,
    pub framework: Option<CopyFramework>,
    pub session: Option<PathBuf>,
}

pub async fn chat(state: &AppState, request: ChatRequest) -> Result<ToolOutput, String> {
    let tool = request.tool.tool();
    let images = request
        .images
        .iter()
        .map(|p| load_image(p))
        .collect::<Result<Vec<_>, _>>()?;

    let message = match (&request.message, &request.action) {
        (Some(m), _) if !m.trim().is_empty() => m.trim().to_string(),
        (_, Some(action)) => tools::quick_action(action)
            .ok_or_else(|| format!("unknown quick action '{action}'"))?
            .to_string(),
        _ => String::new(),
    };

    let (prompt, transcript) = match (request.tool, request.framework) {
        (_, _) if message.is_empty() && images.is_empty() => {
            return Err("nothing to send: give a message or an image".into());
        }
        (ChatTool::Copywriter, Some(framework)) => (
            framework.model_prompt(&message),
            framework.transcript_text(&message),
        ),
        (ChatTool::Brain, _) if message.is_empty() => (
            BRAIN_IMAGE_ONLY_PROMPT.to_string(),
            BRAIN_IMAGE_ONLY_LABEL.to_string(),
        ),
        _ => (message.clone(), message.clone()),
    };

    let mut session = match &request.session {
        Some(path) => ChatSession::load(path, request.tool)?,
        None => ChatSession::new(request.tool),
    };

    let ticket = state.begin(tool);
    let reply = state
        .client
        .generate_chat(
            &session.turns,
            &prompt,
            &images,
            Some(request.tool.system_instruction()),
        )
        .await
        .map_err(failure_message)?;

    state.ensure_current(tool, ticket)?;
    session.push_exchange(transcript.clone(), reply.clone());
    if let Some(path) = &request.session {
        session.save(path)?;
    }

    let output = ToolOutput::Text { text: reply };
    state.publish(
        tool,
        ticket,
        &output,
        Some(record(MediaKind::Text, tool, &transcript, "chat")),
    )?;
    Ok(output)
}

// ── Text ─────────────────────────────────────────────────────────────────────

pub async fn generate_text(
    state: &AppState,
    prompt: &str,
    system: Option<&str>,
) -> Result<ToolOutput, String> {
    if prompt.trim().is_empty() {
        return Err("prompt is empty".into());
    }
    let ticket = state.begin(Tool::Text);
    let text = state
        .client
        .generate_text(prompt, system)
        .await
        .map_err(failure_message)?;
    let output = ToolOutput::Text { text };
    state.publish(
        Tool::Text,
        ticket,
        &output,
        Some(record(MediaKind::Text, Tool::Text, prompt, "text")),
    )?;
    Ok(output)
}

// ── Media studio ─────────────────────────────────────────────────────────────

pub async fn generate_image(
    state: &AppState,
    prompt: &str,
    mode: ImageMode,
    reference: Option<&Path>,
    aspect_ratio: Option<AspectRatio>,
) -> Result<ToolOutput, String> {
    if prompt.trim().is_empty() {
        return Err("prompt is empty".into());
    }
    let reference = reference.map(load_image).transpose()?;
    let aspect_ratio = aspect_ratio.unwrap_or_else(|| state.settings.lock().default_aspect_ratio());
    let tool = Tool::MediaStudio;
    let ticket = state.begin(tool);

    let (uri, plan) = match mode {
        ImageMode::Image => {
            let uri = state
                .client
                .generate_image(prompt, reference.as_ref(), Some(aspect_ratio))
                .await
                .map_err(failure_message)?;
            (uri, None)
        }
        ImageMode::Flyer => {
            let plan = state
                .client
                .generate_text(prompt, Some(FLYER_PLAN_INSTRUCTION))
                .await
                .map_err(failure_message)?;
            info!(plan = plan.as_str(), "flyer plan ready");
            let uri = state
                .client
                .generate_image(
                    &tools::flyer_render_prompt(&plan),
                    reference.as_ref(),
                    Some(aspect_ratio),
                )
                .await
                .map_err(failure_message)?;
            (uri, Some(plan))
        }
        ImageMode::Icon => {
            let uri = state
                .client
                .generate_image(&tools::icon_prompt(prompt), None, Some(AspectRatio::Square))
                .await
                .map_err(failure_message)?;
            (uri, None)
        }
    };

    let path = save_image(state, tool, ticket, &uri)?;
    let output = ToolOutput::Image {
        path: path.clone(),
        mime_type: uri.mime_type().to_string(),
        plan,
    };
    state.publish(
        tool,
        ticket,
        &output,
        Some(record(MediaKind::Image, tool, prompt, path.to_string_lossy())),
    )?;
    Ok(output)
}

pub async fn generate_video(
    state: &AppState,
    prompt: &str,
    aspect_ratio: Option<AspectRatio>,
) -> Result<ToolOutput, String> {
    if prompt.trim().is_empty() {
        return Err("prompt is empty".into());
    }
    let aspect_ratio = aspect_ratio.unwrap_or_else(|| state.settings.lock().default_aspect_ratio());
    let ticket = state.begin(Tool::MediaStudio);
    let result = state.client.generate_video(prompt, Some(aspect_ratio)).await;
    finish_video(state, Tool::MediaStudio, ticket, prompt, result)
}

pub async fn video_status(state: &AppState, operation: &str) -> Result<ToolOutput, String> {
    let operation = operation.trim();
    if operation.is_empty() {
        return Err("operation name is empty".into());
    }
    let ticket = state.begin(Tool::MediaStudio);
    let result = state
        .client
        .poll_video(&PendingVideo {
            operation: operation.to_string(),
        })
        .await;
    finish_video(state, Tool::MediaStudio, ticket, operation, result)
}

fn finish_video(
    state: &AppState,
    tool: Tool,
    ticket: RequestTicket,
    prompt: &str,
    result: GenerationResult,
) -> Result<ToolOutput, String> {
    let output = match result {
        GenerationResult::Succeeded(GenerationOutput::Video(url)) => ToolOutput::Video { url },
        GenerationResult::Pending(pending) => ToolOutput::VideoPending {
            operation: pending.operation,
        },
        GenerationResult::Succeeded(_) => return Err("backend returned no video".into()),
        GenerationResult::Failed(failure) => return Err(failure_message(failure)),
    };
    let location = match &output {
        ToolOutput::Video { url } => url.clone(),
        ToolOutput::VideoPending { operation } => operation.clone(),
        _ => String::new(),
    };
    state.publish(
        tool,
        ticket,
        &output,
        Some(record(MediaKind::Video, tool, prompt, location)),
    )?;
    Ok(output)
}

// ── Smart editor ─────────────────────────────────────────────────────────────

pub async fn edit_image(
    state: &AppState,
    image: &Path,
    preset: Option<&str>,
    prompt: Option<&str>,
    aspect_ratio: Option<AspectRatio>,
) -> Result<ToolOutput, String> {
    let (prompt, preset_ratio) = match (preset, prompt) {
        (Some(id), _) => {
            let preset = tools::edit_preset(id).ok_or_else(|| {
                let known: Vec<&str> = tools::EDIT_PRESETS.iter().map(|p| p.id).collect();
                format!("unknown preset '{id}' (known: {})", known.join(", "))
            })?;
            (preset.prompt.to_string(), preset.aspect_ratio)
        }
        (None, Some(p)) if !p.trim().is_empty() => (p.trim().to_string(), None),
        _ => return Err("give --preset or --prompt".into()),
    };
    let source = load_image(image)?;
    let tool = Tool::SmartEditor;
    let ticket = state.begin(tool);

    let uri = state
        .client
        .generate_image(&prompt, Some(&source), aspect_ratio.or(preset_ratio))
        .await
        .map_err(failure_message)?;
    let path = save_image(state, tool, ticket, &uri)?;
    let output = ToolOutput::Image {
        path: path.clone(),
        mime_type: uri.mime_type().to_string(),
        plan: None,
    };
    state.publish(
        tool,
        ticket,
        &output,
        Some(record(MediaKind::Image, tool, &prompt, path.to_string_lossy())),
    )?;
    Ok(output)
}

// ── Script to video ──────────────────────────────────────────────────────────

pub async fn script_to_media(
    state: &AppState,
    script: &str,
    mode: ScriptMode,
    aspect_ratio: Option<AspectRatio>,
) -> Result<ToolOutput, String> {
    if script.trim().is_empty() {
        return Err("script is empty".into());
    }
    let aspect_ratio = aspect_ratio.unwrap_or_else(|| state.settings.lock().default_aspect_ratio());
    let tool = Tool::ScriptToVideo;
    let ticket = state.begin(tool);

    let visual_prompt = state
        .client
        .generate_text(script, Some(SCRIPT_SUMMARY_INSTRUCTION))
        .await
        .map_err(failure_message)?;
    info!(prompt = visual_prompt.as_str(), "script summarized");

    match mode {
        ScriptMode::Image => {
            let uri = state
                .client
                .generate_image(&visual_prompt, None, Some(aspect_ratio))
                .await
                .map_err(failure_message)?;
            let path = save_image(state, tool, ticket, &uri)?;
            let output = ToolOutput::Image {
                path: path.clone(),
                mime_type: uri.mime_type().to_string(),
                plan: Some(visual_prompt.clone()),
            };
            state.publish(
                tool,
                ticket,
                &output,
                Some(record(MediaKind::Image, tool, &visual_prompt, path.to_string_lossy())),
            )?;
            Ok(output)
        }
        ScriptMode::Video => {
            let result = state
                .client
                .generate_video(&visual_prompt, Some(aspect_ratio))
                .await;
            finish_video(state, tool, ticket, &visual_prompt, result)
        }
    }
}

// ── Voice over ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct VoiceRequest {
    pub text: String,
    pub region: Option<String>,
    pub persona: Option<String>,
    pub speed: Option<u8>,
    pub pitch: Option<u8>,
    /// Reference recording to match instead of a preset voice.
    pub reference: Option<PathBuf>,
}

pub async fn voice_over(state: &AppState, request: VoiceRequest) -> Result<ToolOutput, String> {
    if request.text.trim().is_empty() {
        return Err("text is empty".into());
    }
    let (region_id, persona_id, speed, pitch) = {
        let settings = state.settings.lock();
        (
            request.region.clone().unwrap_or_else(|| settings.voice_region.clone()),
            request.persona.clone().unwrap_or_else(|| settings.voice_persona.clone()),
            request.speed.unwrap_or(settings.voice_speed).min(100),
            request.pitch.unwrap_or(settings.voice_pitch).min(100),
        )
    };
    let tool = Tool::VoiceOver;

    let (buffer, voice_label, ticket) = match &request.reference {
        Some(path) => {
            let reference = load_attachment(path)?;
            if !reference.is_audio() {
                return Err(format!("{} is not an audio file", path.display()));
            }
            let style = tools::reference_voice_style(speed, pitch);
            let ticket = state.begin(tool);
            let buffer = state
                .client
                .generate_speech_from_reference(&request.text, &reference, style.as_deref())
                .await
                .map_err(failure_message)?;
            (buffer, CUSTOM_VOICE_LABEL.to_string(), ticket)
        }
        None => {
            let region = tools::voice_region(&region_id)
                .ok_or_else(|| format!("unknown voice region '{region_id}'"))?;
            let persona = tools::voice_persona(&persona_id)
                .ok_or_else(|| format!("unknown voice persona '{persona_id}'"))?;
            let style = tools::preset_voice_style(region, persona, speed, pitch);
            let ticket = state.begin(tool);
            let buffer = state
                .client
                .generate_speech(&request.text, persona.prebuilt_voice(), Some(&style))
                .await
                .map_err(failure_message)?;
            (buffer, tools::preset_voice_label(region, persona), ticket)
        }
    };

    state.ensure_current(tool, ticket)?;
    let wav = encode_wav(&buffer);
    let path = state.output_path(tool, "wav");
    wav.write_to(&path).map_err(|e| e.to_string())?;
    info!(
        path = %path.display(),
        frames = wav.frame_count(),
        sample_rate = wav.sample_rate(),
        "voice over written"
    );

    let output = ToolOutput::Audio {
        path: path.clone(),
        duration_secs: buffer.duration_secs(),
    };
    let mut entry = record(MediaKind::Audio, tool, &request.text, path.to_string_lossy());
    entry.audio_variant = Some(AudioVariant {
        voice: voice_label,
        speed,
        pitch,
    });
    state.publish(tool, ticket, &output, Some(entry))?;
    Ok(output)
}

// ── Branding ─────────────────────────────────────────────────────────────────

pub async fn brand_kit(state: &AppState, image: &Path) -> Result<ToolOutput, String> {
    let asset = load_image(image)?;
    let tool = Tool::Branding;
    let ticket = state.begin(tool);
    let text = state
        .client
        .analyze_image(BRAND_KIT_PROMPT, &asset)
        .await
        .map_err(failure_message)?;
    let output = ToolOutput::Text { text };
    state.publish(
        tool,
        ticket,
        &output,
        Some(record(
            MediaKind::Text,
            tool,
            "Brand kit analysis",
            image.to_string_lossy(),
        )),
    )?;
    Ok(output)
}

// ── History ──────────────────────────────────────────────────────────────────

pub fn get_history(
    state: &AppState,
    page: usize,
    page_size: usize,
    query: Option<String>,
    kind: Option<MediaKind>,
) -> Result<HistoryPage, String> {
    state.store.get_history(page, page_size, query, kind)
}

pub fn delete_history(state: &AppState, ids: &[String]) -> Result<usize, String> {
    let deleted = state.store.delete_history(ids)?;
    info!(deleted, "history items deleted");
    Ok(deleted)
}

/// Export is refused unless the caller confirmed it.
pub fn export_history(state: &AppState, out: &Path, confirmed: bool) -> Result<usize, String> {
    if !confirmed {
        return Err("export cancelled".into());
    }
    let count = state.store.export_history(out)?;
    info!(count, path = %out.display(), "history exported");
    Ok(count)
}

// ── Settings ─────────────────────────────────────────────────────────────────

pub fn get_runtime_settings(state: &AppState) -> RuntimeSettings {
    state.settings.lock().runtime_settings()
}

/// Apply `key=value` assignments and persist them.
pub fn update_settings(state: &AppState, assignments: &[String]) -> Result<RuntimeSettings, String> {
    let mut settings = state.settings.lock();
    let mut updated = settings.clone();
    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{assignment}'"))?;
        updated.set_value(key, value)?;
    }
    save_settings(&state.settings_path, &updated).map_err(|e| e.to_string())?;
    *settings = updated;
    info!(count = assignments.len(), "settings updated");
    Ok(settings.runtime_settings())
}
