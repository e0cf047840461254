//! Chat transcripts persisted between `unity chat` invocations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use unity_core::ChatTurn;

use crate::tools::ChatTool;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub tool: ChatTool,
    #[serde(default)]
    pub turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(tool: ChatTool) -> Self {
        Self {
            tool,
            turns: Vec::new(),
        }
    }

    /// Load a transcript; a missing file starts a fresh session.
    ///
    /// A transcript written by the other chat tool is rejected rather than
    /// mixed into this tool's context.
    pub fn load(path: &Path, tool: ChatTool) -> Result<Self, String> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(tool)),
            Err(e) => return Err(format!("cannot read session {}: {e}", path.display())),
        };
        let session: ChatSession = serde_json::from_str(&raw)
            .map_err(|e| format!("session {} is not valid: {e}", path.display()))?;
        if session.tool != tool {
            return Err(format!(
                "session {} belongs to the {:?} tool",
                path.display(),
                session.tool
            ));
        }
        Ok(session)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    pub fn push_exchange(&mut self, user: String, model: String) {
        self.turns.push(ChatTurn::user(user));
        self.turns.push(ChatTurn::model(model));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "unity-session-test-{}-{:08x}-{name}",
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    #[test]
    fn missing_file_starts_empty() {
        let session = ChatSession::load(&temp_path("absent.json"), ChatTool::Brain).unwrap();
        assert!(session.turns.is_empty());
    }

    #[test]
    fn transcript_round_trips() {
        let path = temp_path("chat.json");
        let mut session = ChatSession::new(ChatTool::Copywriter);
        session.push_exchange("Apply AIDA: new menu".into(), "Attention...".into());
        session.save(&path).unwrap();

        let loaded = ChatSession::load(&path, ChatTool::Copywriter).unwrap();
        assert_eq!(loaded.turns, session.turns);
        assert!(ChatSession::load(&path, ChatTool::Brain).is_err());
        let _ = fs::remove_file(path);
    }
}
