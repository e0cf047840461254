//! Backend JSON shapes and status classification.
//!
//! Requests: `{ contents, systemInstruction?, generationConfig? }` for content
//! generation, `{ instances, parameters }` for long-running video. Responses
//! are either `{ candidates: [...] }` or `{ error: { code, message, status } }`;
//! both shapes are accepted on any HTTP status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, UnityError};
use crate::media::{AspectRatio, Attachment};

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Option<&str>, parts: Vec<Part>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn attachment(attachment: &Attachment) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: attachment.mime_type.clone(),
                data: attachment.to_base64(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

// ---------------------------------------------------------------------------
// generateContent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub fn new(contents: Vec<Content>) -> Self {
        Self {
            contents,
            system_instruction: None,
            generation_config: None,
        }
    }

    /// Blank instructions are omitted.
    pub fn with_system_instruction(mut self, instruction: Option<&str>) -> Self {
        self.system_instruction = instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Content::new(None, vec![Part::text(s)]));
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| UnityError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

impl GenerationConfig {
    pub fn image(aspect_ratio: Option<AspectRatio>) -> Self {
        Self {
            response_modalities: vec!["TEXT".into(), "IMAGE".into()],
            image_config: aspect_ratio.map(|r| ImageConfig {
                aspect_ratio: r.as_str().into(),
            }),
            speech_config: None,
        }
    }

    pub fn speech(voice: Option<&str>) -> Self {
        Self {
            response_modalities: vec!["AUDIO".into()],
            image_config: None,
            speech_config: voice.map(|name| SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: name.into(),
                    },
                },
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }

    /// Concatenated text parts of the first candidate, if any are non-blank.
    pub fn text(&self) -> Option<String> {
        let joined: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// First inline payload whose MIME type starts with `prefix`.
    pub fn inline_data(&self, prefix: &str) -> Option<&InlineData> {
        self.parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.to_ascii_lowercase().starts_with(prefix))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ApiError>,
}

/// Map a backend failure onto the error taxonomy.
///
/// Quota signals (`429`, `RESOURCE_EXHAUSTED`) become `Capacity`; missing
/// models or features (`404`, `501`, `NOT_FOUND`, `UNIMPLEMENTED`) become
/// `Unsupported`; anything else is `Backend`.
pub fn classify(http_status: u16, error: Option<&ApiError>) -> UnityError {
    let code = error.and_then(|e| e.code).unwrap_or(http_status);
    let status = error
        .and_then(|e| e.status.as_deref())
        .unwrap_or_default()
        .to_ascii_uppercase();
    let message = error
        .and_then(|e| e.message.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {http_status}"));

    if code == 429 || status == "RESOURCE_EXHAUSTED" {
        UnityError::Capacity(message)
    } else if matches!(code, 404 | 501) || status == "NOT_FOUND" || status == "UNIMPLEMENTED" {
        UnityError::Unsupported(message)
    } else {
        UnityError::Backend { code, message }
    }
}

/// Classify a non-2xx answer, reading an `{error}` body when there is one.
pub fn classify_failure(http_status: u16, body: &str) -> UnityError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).unwrap_or_default();
    classify(http_status, envelope.error.as_ref())
}

/// Parse a 2xx body, turning an embedded `{error}` into an error.
pub fn parse_success<T>(body: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let value: Value = serde_json::from_str(body)
        .map_err(|e| UnityError::Decode(format!("malformed response JSON: {e}")))?;
    if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
        let api: ApiError = serde_json::from_value(err.clone()).unwrap_or_default();
        return Err(classify(api.code.unwrap_or(500), Some(&api)));
    }
    serde_json::from_value(value)
        .map_err(|e| UnityError::Decode(format!("unexpected response shape: {e}")))
}

// ---------------------------------------------------------------------------
// Long-running video
// ---------------------------------------------------------------------------

pub fn video_request(prompt: &str, aspect_ratio: Option<AspectRatio>) -> Value {
    let mut parameters = serde_json::Map::new();
    if let Some(ratio) = aspect_ratio {
        parameters.insert("aspectRatio".into(), Value::String(ratio.as_str().into()));
    }
    serde_json::json!({
        "instances": [{ "prompt": prompt }],
        "parameters": parameters,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Where finished operations put the video URI, depending on API revision.
const VIDEO_URI_POINTERS: [&str; 2] = [
    "/generateVideoResponse/generatedSamples/0/video/uri",
    "/generatedVideos/0/video/uri",
];

impl Operation {
    pub fn video_uri(&self) -> Option<&str> {
        let response = self.response.as_ref()?;
        VIDEO_URI_POINTERS
            .iter()
            .find_map(|p| response.pointer(p).and_then(Value::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case_and_skips_empty_fields() {
        let request = GenerateContentRequest::new(vec![Content::new(
            Some("user"),
            vec![
                Part::text("hello"),
                Part::attachment(&Attachment::new("image/png", vec![1, 2, 3])),
            ],
        )])
        .with_system_instruction(Some("  "))
        .with_config(GenerationConfig::image(Some(AspectRatio::Landscape16x9)));

        let json = request.to_value().unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert!(json.get("systemInstruction").is_none());
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(json["generationConfig"]["responseModalities"][1], "IMAGE");
    }

    #[test]
    fn speech_config_names_the_prebuilt_voice() {
        let json = serde_json::to_value(GenerationConfig::speech(Some("Kore"))).unwrap();
        assert_eq!(
            json["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        let json = serde_json::to_value(GenerationConfig::speech(None)).unwrap();
        assert!(json.get("speechConfig").is_none());
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}]}},
                      {"content":{"parts":[{"text":"ignored"}]}}]}"#;
        let response: GenerateContentResponse = parse_success(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello there"));
        assert!(response.inline_data("image/").is_none());
    }

    #[test]
    fn empty_candidates_have_no_text() {
        let response: GenerateContentResponse = parse_success(r#"{"candidates":[]}"#).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn classifies_quota_and_missing_models() {
        assert!(matches!(classify(429, None), UnityError::Capacity(_)));
        assert!(matches!(
            classify_failure(
                400,
                r#"{"error":{"code":400,"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#
            ),
            UnityError::Capacity(m) if m == "quota"
        ));
        assert!(matches!(classify(404, None), UnityError::Unsupported(_)));
        assert!(matches!(
            classify_failure(500, "<html>oops</html>"),
            UnityError::Backend { code: 500, .. }
        ));
    }

    #[test]
    fn error_body_on_success_status_is_an_error() {
        let err = parse_success::<GenerateContentResponse>(
            r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, UnityError::Backend { code: 503, .. }));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = parse_success::<GenerateContentResponse>("{not json").unwrap_err();
        assert!(matches!(err, UnityError::Decode(_)));
    }

    #[test]
    fn operation_finds_video_uri_in_either_layout() {
        let op: Operation = serde_json::from_str(
            r#"{"name":"operations/a","done":true,"response":{"generateVideoResponse":
               {"generatedSamples":[{"video":{"uri":"https://cdn/video.mp4"}}]}}}"#,
        )
        .unwrap();
        assert_eq!(op.video_uri(), Some("https://cdn/video.mp4"));

        let op: Operation = serde_json::from_str(
            r#"{"name":"operations/b","done":true,"response":{"generatedVideos":[{"video":{"uri":"https://cdn/b.mp4"}}]}}"#,
        )
        .unwrap();
        assert_eq!(op.video_uri(), Some("https://cdn/b.mp4"));

        let pending: Operation = serde_json::from_str(r#"{"name":"operations/c"}"#).unwrap();
        assert!(!pending.done);
        assert!(pending.video_uri().is_none());
    }

    #[test]
    fn video_request_includes_aspect_ratio_when_given() {
        let json = video_request("a cat", Some(AspectRatio::Portrait9x16));
        assert_eq!(json["instances"][0]["prompt"], "a cat");
        assert_eq!(json["parameters"]["aspectRatio"], "9:16");
        let json = video_request("a cat", None);
        assert!(json["parameters"].as_object().unwrap().is_empty());
    }
}
