use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::RngCore;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::settings::app_data_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(MediaKind::Text),
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind '{other}'")),
        }
    }
}

/// Voice settings a speech clip was rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioVariant {
    pub voice: String,
    pub speed: u8,
    pub pitch: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub created_at: String,
    pub kind: MediaKind,
    pub tool: String,
    pub prompt: String,
    /// File path, remote URL, or pending operation name.
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_variant: Option<AudioVariant>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryRecordInput {
    pub kind: MediaKind,
    pub tool: String,
    pub prompt: String,
    pub location: String,
    pub audio_variant: Option<AudioVariant>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryExport<'a> {
    exported_at: String,
    items: &'a [HistoryItem],
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
    cipher: TextCipher,
}

#[derive(Debug, Clone)]
struct TextCipher {
    key: [u8; 32],
}

impl TextCipher {
    fn new(scope: &Path) -> Self {
        let username = std::env::var("USERNAME")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_default();
        let computer = std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_default();
        let material = format!(
            "{username}|{computer}|{}|unity-history-v1",
            scope.to_string_lossy()
        );
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest[..32]);
        Self { key }
    }

    fn encrypt(&self, plain: &str) -> Result<String, String> {
        if plain.is_empty() {
            return Ok(String::new());
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| e.to_string())?;
        let mut nonce_bytes = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let encrypted = cipher
            .encrypt(nonce, plain.as_bytes())
            .map_err(|e| e.to_string())?;
        let mut out = Vec::with_capacity(12 + encrypted.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&encrypted);
        Ok(BASE64.encode(out))
    }

    fn decrypt(&self, encoded: &str) -> Option<String> {
        if encoded.is_empty() {
            return Some(String::new());
        }
        let bytes = BASE64.decode(encoded).ok()?;
        if bytes.len() <= 12 {
            return None;
        }
        let (nonce_bytes, cipher_bytes) = bytes.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new_from_slice(&self.key).ok()?;
        let plain = cipher.decrypt(nonce, cipher_bytes).ok()?;
        String::from_utf8(plain).ok()
    }
}

impl LocalStore {
    pub fn default_db_path() -> PathBuf {
        app_data_dir().join("unity.db")
    }

    pub fn new(db_path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let store = Self {
            cipher: TextCipher::new(&db_path),
            db_path,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, String> {
        Connection::open(&self.db_path).map_err(|e| e.to_string())
    }

    fn init_schema(&self) -> Result<(), String> {
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS generation_history (
              id TEXT PRIMARY KEY,
              created_at INTEGER NOT NULL,
              kind TEXT NOT NULL,
              tool TEXT NOT NULL,
              prompt_enc TEXT NOT NULL,
              location TEXT NOT NULL,
              voice TEXT,
              speed INTEGER,
              pitch INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_generation_created_at ON generation_history(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_generation_kind ON generation_history(kind);
            "#,
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn prune_history(&self, retention_days: usize) -> Result<usize, String> {
        if retention_days == 0 {
            return Ok(0);
        }
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let conn = self.open()?;
        let changed = conn
            .execute(
                "DELETE FROM generation_history WHERE created_at < ?1",
                params![cutoff.timestamp()],
            )
            .map_err(|e| e.to_string())?;
        Ok(changed)
    }

    /// Store one generated item and return its id.
    pub fn insert_history(&self, input: HistoryRecordInput) -> Result<String, String> {
        self.insert_history_at(input, Utc::now().timestamp())
    }

    fn insert_history_at(&self, input: HistoryRecordInput, created_at: i64) -> Result<String, String> {
        let id = new_id("gen");
        let prompt_enc = self.cipher.encrypt(&input.prompt)?;
        let (voice, speed, pitch) = match input.audio_variant {
            Some(v) => (Some(v.voice), Some(v.speed as i64), Some(v.pitch as i64)),
            None => (None, None, None),
        };
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO generation_history
            (id, created_at, kind, tool, prompt_enc, location, voice, speed, pitch)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                id,
                created_at,
                input.kind.as_str(),
                input.tool,
                prompt_enc,
                input.location,
                voice,
                speed,
                pitch
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(id)
    }

    /// Newest first. `query` matches the decrypted prompt case-insensitively.
    pub fn get_history(
        &self,
        page: usize,
        page_size: usize,
        query: Option<String>,
        kind: Option<MediaKind>,
    ) -> Result<HistoryPage, String> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);
        let query = query
            .as_ref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        let items: Vec<HistoryItem> = self
            .load_items(5000)?
            .into_iter()
            .filter(|item| kind.map_or(true, |k| item.kind == k))
            .filter(|item| {
                query
                    .as_ref()
                    .map_or(true, |q| item.prompt.to_lowercase().contains(q))
            })
            .collect();

        let total = items.len();
        let start = (page - 1).saturating_mul(page_size);
        let end = (start + page_size).min(total);
        let paged = if start >= total {
            Vec::new()
        } else {
            items[start..end].to_vec()
        };

        Ok(HistoryPage {
            items: paged,
            total,
            page,
            page_size,
        })
    }

    /// `limit` of -1 reads every row.
    fn load_items(&self, limit: i64) -> Result<Vec<HistoryItem>, String> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, kind, tool, prompt_enc, location, voice, speed, pitch
                 FROM generation_history ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            )
            .map_err(|e| e.to_string())?;
        let mut rows = stmt
            .query(params![limit])
            .map_err(|e| e.to_string())?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().map_err(|e| e.to_string())? {
            let enc: String = row.get(4).map_err(|e| e.to_string())?;
            let Some(prompt) = self.cipher.decrypt(&enc) else {
                continue;
            };
            let kind: String = row.get(2).map_err(|e| e.to_string())?;
            let Ok(kind) = kind.parse::<MediaKind>() else {
                continue;
            };
            let voice: Option<String> = row.get(6).map_err(|e| e.to_string())?;
            let speed: Option<i64> = row.get(7).map_err(|e| e.to_string())?;
            let pitch: Option<i64> = row.get(8).map_err(|e| e.to_string())?;
            let audio_variant = voice.map(|voice| AudioVariant {
                voice,
                speed: speed.unwrap_or(50).clamp(0, 100) as u8,
                pitch: pitch.unwrap_or(50).clamp(0, 100) as u8,
            });
            items.push(HistoryItem {
                id: row.get(0).map_err(|e| e.to_string())?,
                created_at: ts_to_rfc3339(row.get::<_, i64>(1).map_err(|e| e.to_string())?),
                kind,
                tool: row.get(3).map_err(|e| e.to_string())?,
                prompt,
                location: row.get(5).map_err(|e| e.to_string())?,
                audio_variant,
            });
        }
        Ok(items)
    }

    pub fn delete_history(&self, ids: &[String]) -> Result<usize, String> {
        let conn = self.open()?;
        let mut deleted = 0usize;
        for id in ids {
            deleted += conn
                .execute("DELETE FROM generation_history WHERE id = ?1", params![id])
                .map_err(|e| e.to_string())?;
        }
        Ok(deleted)
    }

    /// Write every readable item, decrypted, as JSON. Returns the item count.
    pub fn export_history(&self, out: &Path) -> Result<usize, String> {
        let items = self.load_items(-1)?;
        let export = HistoryExport {
            exported_at: Utc::now().to_rfc3339(),
            items: &items,
        };
        let json = serde_json::to_string_pretty(&export).map_err(|e| e.to_string())?;
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(out, json).map_err(|e| e.to_string())?;
        Ok(items.len())
    }
}

fn ts_to_rfc3339(ts: i64) -> String {
    let dt: DateTime<Utc> = Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now);
    dt.to_rfc3339()
}

pub fn new_id(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{:08x}",
        Utc::now().timestamp_micros(),
        rand::random::<u32>()
    )
}
