//! Client configuration, loaded once at startup.
//!
//! Every value has a default; the environment may override any of them. The
//! credential is the only value without a usable default: when it is absent
//! the client still builds, but reports the service as unavailable.

use std::collections::HashMap;
use std::time::Duration;

use crate::generation::Capability;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_CHAT_WINDOW: usize = 8;

/// Credential variables, checked in order.
const API_KEY_VARS: [&str; 3] = ["UNITY_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Ranked backend model identifiers per capability.
///
/// The first entry is tried first; the second is the single fallback used on
/// a capacity or not-available signal. Entries past the second are never used
/// by one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRoster {
    models: HashMap<Capability, Vec<String>>,
}

impl Default for ModelRoster {
    fn default() -> Self {
        let mut models = HashMap::new();
        let mut put = |cap: Capability, ids: &[&str]| {
            models.insert(cap, ids.iter().map(|s| s.to_string()).collect());
        };
        put(Capability::Text, &["gemini-2.5-flash", "gemini-1.5-flash"]);
        put(Capability::Chat, &["gemini-2.5-flash", "gemini-1.5-flash"]);
        put(Capability::Analysis, &["gemini-2.5-flash", "gemini-1.5-flash"]);
        put(
            Capability::Image,
            &[
                "gemini-2.5-flash-image",
                "gemini-2.0-flash-preview-image-generation",
            ],
        );
        put(
            Capability::Speech,
            &["gemini-2.5-flash-preview-tts", "gemini-2.5-pro-preview-tts"],
        );
        put(
            Capability::Video,
            &["veo-3.0-fast-generate-001", "veo-2.0-generate-001"],
        );
        Self { models }
    }
}

impl ModelRoster {
    /// Models for `capability`, best first. Empty if none configured.
    pub fn models(&self, capability: Capability) -> &[String] {
        self.models
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replace the ranked list for one capability. Blank entries are dropped.
    pub fn set(&mut self, capability: Capability, models: Vec<String>) {
        let cleaned: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        self.models.insert(capability, cleaned);
    }
}

/// Configuration for `GenerationClient`.
#[derive(Clone)]
pub struct ClientConfig {
    /// Backend credential. `None` → every call fails with a configuration error.
    pub api_key: Option<String>,
    /// Backend root URL without trailing slash.
    pub base_url: String,
    /// Per-request transport timeout. Default: 60 s.
    pub request_timeout: Duration,
    /// Prior chat turns sent with each chat call. Default: 8.
    pub chat_window: usize,
    /// Interval between video status polls. Default: 10 s.
    pub video_poll_interval: Duration,
    /// Status polls before a video call returns `Pending`.
    /// `0` returns `Pending` right after the operation starts. Default: 30.
    pub video_max_polls: u32,
    /// Ranked model identifiers per capability.
    pub models: ModelRoster,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout: Duration::from_secs(60),
            chat_window: DEFAULT_CHAT_WINDOW,
            video_poll_interval: Duration::from_secs(10),
            video_max_polls: 30,
            models: ModelRoster::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("chat_window", &self.chat_window)
            .field("video_poll_interval", &self.video_poll_interval)
            .field("video_max_polls", &self.video_max_polls)
            .field("models", &self.models)
            .finish()
    }
}

impl ClientConfig {
    /// Defaults overridden by `UNITY_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] against an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = API_KEY_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());

        if let Some(url) = lookup("UNITY_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
        {
            config.base_url = url;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "UNITY_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(window) = parse_var::<usize, _>(&lookup, "UNITY_CHAT_WINDOW") {
            config.chat_window = window;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "UNITY_VIDEO_POLL_INTERVAL_SECS") {
            config.video_poll_interval = Duration::from_secs(secs);
        }
        if let Some(polls) = parse_var::<u32, _>(&lookup, "UNITY_VIDEO_MAX_POLLS") {
            config.video_max_polls = polls;
        }

        for capability in Capability::ALL {
            let var = format!("UNITY_MODELS_{}", capability.env_suffix());
            if let Some(raw) = lookup(&var) {
                let models: Vec<String> = raw.split(',').map(str::to_string).collect();
                config.models.set(capability, models);
            }
        }

        config
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = key, value = raw.as_str(), "ignoring unparsable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::from_lookup(|_| None);
        assert!(!config.has_credential());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.chat_window, 8);
        assert_eq!(config.video_poll_interval, Duration::from_secs(10));
        assert_eq!(config.video_max_polls, 30);
        assert_eq!(config.models.models(Capability::Text).len(), 2);
    }

    #[test]
    fn api_key_falls_through_variables_in_order() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("UNITY_API_KEY", "   "),
            ("GEMINI_API_KEY", "gem-key"),
            ("GOOGLE_API_KEY", "google-key"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("gem-key"));
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("UNITY_BASE_URL", "http://localhost:8080/v1/"),
            ("UNITY_CHAT_WINDOW", "4"),
            ("UNITY_VIDEO_MAX_POLLS", "zero"),
            ("UNITY_MODELS_SPEECH", "tts-a, ,tts-b"),
        ]));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.chat_window, 4);
        assert_eq!(config.video_max_polls, 30);
        assert_eq!(
            config.models.models(Capability::Speech),
            &["tts-a".to_string(), "tts-b".to_string()]
        );
    }

    #[test]
    fn debug_output_redacts_the_credential() {
        let mut config = ClientConfig::default();
        config.api_key = Some("secret-value".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
