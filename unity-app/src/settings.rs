//! Persistent application settings (JSON file in app data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use unity_core::AspectRatio;

use crate::tools::{voice_persona, voice_region, DEFAULT_PERSONA, DEFAULT_REGION};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Backend credential; the environment wins when both are set.
    pub api_key: Option<String>,
    pub voice_region: String,
    pub voice_persona: String,
    pub voice_speed: u8,
    pub voice_pitch: u8,
    pub aspect_ratio: String,
    pub chat_window: usize,
    pub video_max_polls: u32,
    /// Where generated media are written. `None` → `<data dir>/media`.
    pub output_dir: Option<String>,
    pub history_enabled: bool,
    pub retention_days: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            voice_region: DEFAULT_REGION.into(),
            voice_persona: DEFAULT_PERSONA.into(),
            voice_speed: 50,
            voice_pitch: 50,
            aspect_ratio: AspectRatio::Square.as_str().into(),
            chat_window: unity_core::config::DEFAULT_CHAT_WINDOW,
            video_max_polls: 30,
            output_dir: None,
            history_enabled: true,
            retention_days: 90,
        }
    }
}

/// Settings as shown to the user: the credential is reduced to a flag.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSettings {
    pub has_api_key: bool,
    pub voice_region: String,
    pub voice_persona: String,
    pub voice_speed: u8,
    pub voice_pitch: u8,
    pub aspect_ratio: String,
    pub chat_window: usize,
    pub video_max_polls: u32,
    pub output_dir: String,
    pub history_enabled: bool,
    pub retention_days: usize,
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.api_key = self
            .api_key
            .as_ref()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.voice_region = normalize_voice_region(&self.voice_region);
        self.voice_persona = normalize_voice_persona(&self.voice_persona);
        self.voice_speed = self.voice_speed.min(100);
        self.voice_pitch = self.voice_pitch.min(100);
        self.aspect_ratio = normalize_aspect_ratio(&self.aspect_ratio);
        self.chat_window = self.chat_window.clamp(1, 64);
        self.video_max_polls = self.video_max_polls.min(360);
        self.output_dir = self
            .output_dir
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.retention_days = self.retention_days.clamp(1, 3650);
    }

    pub fn default_aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio.parse().unwrap_or_default()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| app_data_dir().join("media"))
    }

    /// Apply one `key=value` assignment from the command line.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key.trim() {
            "apiKey" | "api_key" => self.api_key = Some(value.to_string()),
            "voiceRegion" | "voice_region" | "region" => {
                if voice_region(value).is_none() {
                    return Err(format!("unknown voice region '{value}'"));
                }
                self.voice_region = value.to_string();
            }
            "voicePersona" | "voice_persona" | "persona" => {
                if voice_persona(value).is_none() {
                    return Err(format!("unknown voice persona '{value}'"));
                }
                self.voice_persona = value.to_string();
            }
            "voiceSpeed" | "voice_speed" | "speed" => self.voice_speed = parse_slider(value)?,
            "voicePitch" | "voice_pitch" | "pitch" => self.voice_pitch = parse_slider(value)?,
            "aspectRatio" | "aspect_ratio" | "aspect" => {
                let ratio: AspectRatio = value.parse().map_err(|e: unity_core::UnityError| e.to_string())?;
                self.aspect_ratio = ratio.as_str().into();
            }
            "chatWindow" | "chat_window" => self.chat_window = parse_number(key, value)?,
            "videoMaxPolls" | "video_max_polls" => self.video_max_polls = parse_number(key, value)?,
            "outputDir" | "output_dir" => self.output_dir = Some(value.to_string()),
            "historyEnabled" | "history_enabled" => self.history_enabled = parse_bool(value)?,
            "retentionDays" | "retention_days" => self.retention_days = parse_number(key, value)?,
            other => return Err(format!("unknown setting '{other}'")),
        }
        self.normalize();
        Ok(())
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            has_api_key: self.api_key.is_some(),
            voice_region: self.voice_region.clone(),
            voice_persona: self.voice_persona.clone(),
            voice_speed: self.voice_speed,
            voice_pitch: self.voice_pitch,
            aspect_ratio: self.aspect_ratio.clone(),
            chat_window: self.chat_window,
            video_max_polls: self.video_max_polls,
            output_dir: self.output_dir().to_string_lossy().into_owned(),
            history_enabled: self.history_enabled,
            retention_days: self.retention_days,
        }
    }
}

pub fn normalize_voice_region(raw: &str) -> String {
    voice_region(raw)
        .map(|r| r.id)
        .unwrap_or(DEFAULT_REGION)
        .to_string()
}

pub fn normalize_voice_persona(raw: &str) -> String {
    voice_persona(raw)
        .map(|p| p.id)
        .unwrap_or(DEFAULT_PERSONA)
        .to_string()
}

pub fn normalize_aspect_ratio(raw: &str) -> String {
    raw.parse::<AspectRatio>()
        .unwrap_or_default()
        .as_str()
        .to_string()
}

fn parse_slider(raw: &str) -> Result<u8, String> {
    let value: u32 = raw
        .parse()
        .map_err(|_| format!("expected a number from 0 to 100, got '{raw}'"))?;
    Ok(value.min(100) as u8)
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{key} expects a non-negative number, got '{raw}'"))
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("expected true or false, got '{raw}'")),
    }
}

/// Seed `UNITY_*` variables the user has not set from persisted settings, so
/// `ClientConfig::from_env` sees them.
pub fn apply_runtime_env_from_settings(settings: &AppSettings) {
    let key_in_env = ["UNITY_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).is_ok_and(|v| !v.trim().is_empty()));
    if !key_in_env {
        if let Some(key) = settings.api_key.as_ref() {
            std::env::set_var("UNITY_API_KEY", key);
        }
    }
    if std::env::var("UNITY_CHAT_WINDOW").is_err() {
        std::env::set_var("UNITY_CHAT_WINDOW", settings.chat_window.to_string());
    }
    if std::env::var("UNITY_VIDEO_MAX_POLLS").is_err() {
        std::env::set_var("UNITY_VIDEO_MAX_POLLS", settings.video_max_polls.to_string());
    }
}

/// Per-user data directory holding settings, history and media.
pub fn app_data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Unity Studio")
            .join("Unity")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("unity")
    }
}

pub fn default_settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
