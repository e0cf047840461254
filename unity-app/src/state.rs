//! Application state shared by every command handler.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};
use unity_core::{GenerationClient, RequestTicket, ResultSlot};

use crate::commands::ToolOutput;
use crate::settings::AppSettings;
use crate::storage::{HistoryRecordInput, LocalStore};
use crate::tools::Tool;

/// Latest result per tool. A response that arrives after a newer request from
/// the same tool is dropped.
#[derive(Debug, Default)]
pub struct ToolSlots {
    brain: ResultSlot<ToolOutput>,
    copywriter: ResultSlot<ToolOutput>,
    text: ResultSlot<ToolOutput>,
    media_studio: ResultSlot<ToolOutput>,
    smart_editor: ResultSlot<ToolOutput>,
    script_to_video: ResultSlot<ToolOutput>,
    voice_over: ResultSlot<ToolOutput>,
    branding: ResultSlot<ToolOutput>,
}

impl ToolSlots {
    pub fn slot(&self, tool: Tool) -> &ResultSlot<ToolOutput> {
        match tool {
            Tool::Brain => &self.brain,
            Tool::Copywriter => &self.copywriter,
            Tool::Text => &self.text,
            Tool::MediaStudio => &self.media_studio,
            Tool::SmartEditor => &self.smart_editor,
            Tool::ScriptToVideo => &self.script_to_video,
            Tool::VoiceOver => &self.voice_over,
            Tool::Branding => &self.branding,
        }
    }
}

pub struct AppState {
    /// Generation facade shared by all tools.
    pub client: Arc<GenerationClient>,
    /// Persisted app settings cache.
    pub settings: Arc<Mutex<AppSettings>>,
    /// Absolute path to `settings.json`.
    pub settings_path: PathBuf,
    /// Local encrypted SQLite storage.
    pub store: Arc<LocalStore>,
    pub slots: Arc<ToolSlots>,
}

impl AppState {
    pub fn new(
        client: Arc<GenerationClient>,
        settings: AppSettings,
        settings_path: PathBuf,
        store: Arc<LocalStore>,
    ) -> Self {
        Self {
            client,
            settings: Arc::new(Mutex::new(settings)),
            settings_path,
            store,
            slots: Arc::new(ToolSlots::default()),
        }
    }

    pub fn begin(&self, tool: Tool) -> RequestTicket {
        let ticket = self.slots.slot(tool).issue();
        debug!(tool = %tool, ticket = ticket.id(), "tool request issued");
        ticket
    }

    /// Fails when a newer request of the same tool has been issued since
    /// `ticket`. Checked before any side effect of a finished call.
    pub fn ensure_current(&self, tool: Tool, ticket: RequestTicket) -> Result<(), String> {
        if self.slots.slot(tool).is_current(ticket) {
            return Ok(());
        }
        warn!(tool = %tool, ticket = ticket.id(), "stale result dropped");
        Err(format!("superseded by a newer {tool} request"))
    }

    /// Store `output` as the tool's latest result and record it in history.
    ///
    /// A superseded result is neither stored nor recorded.
    pub fn publish(
        &self,
        tool: Tool,
        ticket: RequestTicket,
        output: &ToolOutput,
        record: Option<HistoryRecordInput>,
    ) -> Result<(), String> {
        if !self.slots.slot(tool).complete(ticket, output.clone()) {
            warn!(tool = %tool, ticket = ticket.id(), "stale result dropped");
            return Err(format!("superseded by a newer {tool} request"));
        }
        if let Some(record) = record {
            if self.settings.lock().history_enabled {
                if let Err(e) = self.store.insert_history(record) {
                    warn!(tool = %tool, error = %e, "failed to record history");
                }
            }
        }
        Ok(())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.settings.lock().output_dir()
    }

    /// Fresh file path for a generated asset.
    pub fn output_path(&self, tool: Tool, extension: &str) -> PathBuf {
        self.output_dir().join(format!(
            "{}-{}-{:04x}.{extension}",
            tool.as_str(),
            Utc::now().format("%Y%m%d-%H%M%S"),
            rand::random::<u16>()
        ))
    }
}
