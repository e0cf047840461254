//! Media values exchanged with tools: data URIs, binary attachments, and
//! aspect ratios.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UnityError};

/// Largest reference-audio upload accepted for voice cloning (10 MiB).
pub const MAX_REFERENCE_AUDIO_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Data URIs
// ---------------------------------------------------------------------------

/// `data:<mime>;base64,<data>`, usable directly as a rendering source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// `data` must already be base64.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        Ok(BASE64.decode(&self.data)?)
    }

    /// File extension matching the MIME type, for saving to disk.
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl FromStr for DataUri {
    type Err = UnityError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| UnityError::InvalidInput("not a data URI".into()))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| UnityError::InvalidInput("data URI has no payload".into()))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| UnityError::InvalidInput("only base64 data URIs are supported".into()))?;
        if mime_type.is_empty() {
            return Err(UnityError::InvalidInput("data URI has no MIME type".into()));
        }
        Ok(Self::new(mime_type, data))
    }
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// Binary input (reference image or audio) tagged with its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn from_data_uri(uri: &DataUri) -> Result<Self> {
        Ok(Self::new(uri.mime_type(), uri.decode_bytes()?))
    }

    /// Read a file, guessing its MIME type from the extension.
    ///
    /// # Errors
    /// `UnityError::InvalidInput` for unknown extensions, `Io` on read failure.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime_type = mime_for_extension(ext).ok_or_else(|| {
            UnityError::InvalidInput(format!("unsupported file type: {}", path.display()))
        })?;
        let bytes = std::fs::read(path)?;
        Ok(Self::new(mime_type, bytes))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> DataUri {
        DataUri::new(self.mime_type.clone(), self.to_base64())
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "ogg" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let base = mime_type.split(';').next().unwrap_or_default().trim();
    match base.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/flac" => "flac",
        "video/mp4" => "mp4",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    }
}

// ---------------------------------------------------------------------------
// Aspect ratio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AspectRatio {
    #[default]
    Square,
    Portrait3x4,
    Landscape4x3,
    Portrait9x16,
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = UnityError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.as_str() == trimmed)
            .ok_or_else(|| UnityError::InvalidInput(format!("unknown aspect ratio: {trimmed}")))
    }
}

impl Serialize for AspectRatio {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AspectRatio {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_parses_and_displays() {
        let uri: DataUri = "data:image/png;base64,iVBORw0KGgo=".parse().expect("parse");
        assert_eq!(uri.mime_type(), "image/png");
        assert_eq!(uri.data(), "iVBORw0KGgo=");
        assert_eq!(uri.extension(), "png");
        assert_eq!(uri.to_string(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[test]
    fn data_uri_rejects_non_base64_forms() {
        assert!("https://example.com/a.png".parse::<DataUri>().is_err());
        assert!("data:text/plain,hello".parse::<DataUri>().is_err());
        assert!("data:;base64,AAAA".parse::<DataUri>().is_err());
        assert!("data:image/png;base64".parse::<DataUri>().is_err());
    }

    #[test]
    fn attachment_round_trips_through_data_uri() {
        let attachment = Attachment::new("audio/wav", vec![1, 2, 3, 4]);
        let uri = attachment.to_data_uri();
        let back = Attachment::from_data_uri(&uri).expect("decode");
        assert_eq!(back, attachment);
        assert!(back.is_audio());
        assert!(!back.is_image());
    }

    #[test]
    fn attachment_from_path_guesses_mime() {
        let path = std::env::temp_dir().join(format!("unity-media-{}.JPG", std::process::id()));
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();
        let attachment = Attachment::from_path(&path).expect("read");
        let _ = std::fs::remove_file(&path);
        assert_eq!(attachment.mime_type, "image/jpeg");
        assert_eq!(attachment.bytes, vec![0xFF, 0xD8, 0xFF]);

        let unknown = std::env::temp_dir().join("unity-media.xyz");
        assert!(matches!(
            Attachment::from_path(&unknown),
            Err(UnityError::InvalidInput(_))
        ));
    }

    #[test]
    fn aspect_ratio_parses_every_variant() {
        for ratio in AspectRatio::ALL {
            assert_eq!(ratio.as_str().parse::<AspectRatio>().unwrap(), ratio);
        }
        assert!("2:1".parse::<AspectRatio>().is_err());

        let json = serde_json::to_string(&AspectRatio::Portrait9x16).unwrap();
        assert_eq!(json, r#""9:16""#);
        let back: AspectRatio = serde_json::from_str(r#""16:9""#).unwrap();
        assert_eq!(back, AspectRatio::Landscape16x9);
    }
}
