//! Tool catalogue: the prompt presets, system instructions and voice market
//! each tool sends to the generation client.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unity_core::AspectRatio;

/// The user-facing tools. Each keeps its own latest result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Brain,
    Copywriter,
    Text,
    MediaStudio,
    SmartEditor,
    ScriptToVideo,
    VoiceOver,
    Branding,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Brain => "brain",
            Tool::Copywriter => "copywriter",
            Tool::Text => "text",
            Tool::MediaStudio => "media_studio",
            Tool::SmartEditor => "smart_editor",
            Tool::ScriptToVideo => "script_to_video",
            Tool::VoiceOver => "voice_over",
            Tool::Branding => "branding",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Chat tools ───────────────────────────────────────────────────────────────

pub const BRAIN_SYSTEM_INSTRUCTION: &str = "You are Unity AI Neural Core. Respond extremely fast. \
STRICTLY plain text only. NEVER use asterisks (*) or markdown. \
Format with whitespace and line breaks.";

pub const COPYWRITER_SYSTEM_INSTRUCTION: &str = "You are a Pro Content Writer and Customer Relations Expert. \
Deliver responses extremely fast in plain text. \
STRICTLY NO ASTERISKS (*) OR MARKDOWN SYMBOLS. \
Format using clean line breaks and indentation only. \
Maintain an authoritative and professional tone.";

/// Sent when the brain gets only images.
pub const BRAIN_IMAGE_ONLY_PROMPT: &str = "Analyze and extract visual text. No asterisks.";
/// Transcript label for an image-only brain message.
pub const BRAIN_IMAGE_ONLY_LABEL: &str = "Visual Neural Analysis";

/// Brain quick actions: `(id, prompt)`.
pub const BRAIN_QUICK_ACTIONS: [(&str, &str); 3] = [
    ("ocr", "Extract all text from the image. No asterisks."),
    (
        "brief",
        "Write a high-end production brief for a commercial. No markdown.",
    ),
    (
        "vfx",
        "Suggest specific VFX for a tech product reveal. Plain text only.",
    ),
];

pub fn quick_action(id: &str) -> Option<&'static str> {
    let id = id.trim();
    BRAIN_QUICK_ACTIONS
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(id))
        .map(|(_, prompt)| *prompt)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatTool {
    Brain,
    Copywriter,
}

impl ChatTool {
    pub fn tool(self) -> Tool {
        match self {
            ChatTool::Brain => Tool::Brain,
            ChatTool::Copywriter => Tool::Copywriter,
        }
    }

    pub fn system_instruction(self) -> &'static str {
        match self {
            ChatTool::Brain => BRAIN_SYSTEM_INSTRUCTION,
            ChatTool::Copywriter => COPYWRITER_SYSTEM_INSTRUCTION,
        }
    }
}

impl FromStr for ChatTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brain" | "neural" => Ok(ChatTool::Brain),
            "copywriter" | "copy" => Ok(ChatTool::Copywriter),
            other => Err(format!("unknown chat tool '{other}' (expected brain or copywriter)")),
        }
    }
}

/// Copywriting strategy applied to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyFramework {
    HookBodyCta,
    Aida,
    EnquiryResponse,
}

impl CopyFramework {
    pub fn value(self) -> &'static str {
        match self {
            CopyFramework::HookBodyCta => "Hook-Body-CTA",
            CopyFramework::Aida => "AIDA",
            CopyFramework::EnquiryResponse => "Professional Enquiry Response",
        }
    }

    /// What the model receives.
    pub fn model_prompt(self, input: &str) -> String {
        format!("Using the {} model, respond to: {input}", self.value())
    }

    /// What the transcript shows.
    pub fn transcript_text(self, input: &str) -> String {
        format!("Apply {}: {input}", self.value())
    }
}

impl FromStr for CopyFramework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "a" | "hookbodycta" | "hook" => Ok(CopyFramework::HookBodyCta),
            "b" | "aida" => Ok(CopyFramework::Aida),
            "c" | "enquiry" | "enquiryresponse" | "professionalenquiryresponse" => {
                Ok(CopyFramework::EnquiryResponse)
            }
            _ => Err(format!(
                "unknown framework '{}' (expected hook-body-cta, aida or enquiry)",
                s.trim()
            )),
        }
    }
}

// ── Media studio ─────────────────────────────────────────────────────────────

pub const FLYER_PLAN_INSTRUCTION: &str = "You are a master graphic designer. For the following flyer request, \
provide a plan in this EXACT format: Headline: [text] | Image Idea: [description] | Colors: [list] | \
Layout: [instructions]. Be brief.";

pub fn flyer_render_prompt(plan: &str) -> String {
    format!("Graphic Flyer Design based on this plan: {plan}")
}

pub fn icon_prompt(subject: &str) -> String {
    format!(
        "Professional minimal app icon for: {subject}, centered, white background, high quality vector style"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageMode {
    #[default]
    Image,
    Flyer,
    Icon,
}

impl FromStr for ImageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(ImageMode::Image),
            "flyer" => Ok(ImageMode::Flyer),
            "icon" => Ok(ImageMode::Icon),
            other => Err(format!("unknown image mode '{other}'")),
        }
    }
}

// ── Smart editor ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub prompt: &'static str,
    /// Target ratio for resize presets.
    pub aspect_ratio: Option<AspectRatio>,
}

pub const EDIT_PRESETS: [EditPreset; 6] = [
    EditPreset {
        id: "remove-watermark",
        label: "Remove Watermark (Perfect)",
        prompt: "Remove ALL watermarks, text overlays, and logos from this image. Reconstruct the underlying texture and details perfectly so no trace remains. Do not alter the main subject.",
        aspect_ratio: None,
    },
    EditPreset {
        id: "remove-background",
        label: "Remove Background (Clean)",
        prompt: "Completely remove the background and replace it with a pure white studio background. Keep the subject perfectly isolated with clean edges. Do not distort the subject.",
        aspect_ratio: None,
    },
    EditPreset {
        id: "enhance-4k",
        label: "Enhance to 4K",
        prompt: "Upscale this image to high-fidelity 4K resolution. Sharpen details, improve lighting, and remove noise without changing the composition or subject identity. Photorealistic quality.",
        aspect_ratio: None,
    },
    EditPreset {
        id: "resize-16x9",
        label: "16:9 Landscape",
        prompt: "Expand this image to 16:9 aspect ratio. Seamlessly outpaint the sides to match the existing scene and lighting.",
        aspect_ratio: Some(AspectRatio::Landscape16x9),
    },
    EditPreset {
        id: "resize-9x16",
        label: "9:16 Portrait",
        prompt: "Expand this image to 9:16 aspect ratio. Seamlessly outpaint the top and bottom to match the existing scene.",
        aspect_ratio: Some(AspectRatio::Portrait9x16),
    },
    EditPreset {
        id: "resize-1x1",
        label: "1:1 Square",
        prompt: "Crop and center this image to a perfect 1:1 square. Keep the main subject centered.",
        aspect_ratio: Some(AspectRatio::Square),
    },
];

pub fn edit_preset(id: &str) -> Option<&'static EditPreset> {
    let id = id.trim();
    EDIT_PRESETS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

// ── Script to video ──────────────────────────────────────────────────────────

pub const SCRIPT_SUMMARY_INSTRUCTION: &str = "Summarize this script into a single, highly detailed visual prompt \
suitable for an AI image/video generation model. Focus on the establishing shot, lighting, mood, and main \
subject movement. Keep it under 50 words.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptMode {
    #[default]
    Image,
    Video,
}

impl FromStr for ScriptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(ScriptMode::Image),
            "video" => Ok(ScriptMode::Video),
            other => Err(format!("unknown script mode '{other}'")),
        }
    }
}

// ── Branding ─────────────────────────────────────────────────────────────────

pub const BRAND_KIT_PROMPT: &str = "Analyze this brand logo or asset.
Generate a complete Brand Kit including:
1. Color Palette: Identify 3-5 primary hex codes and color names.
2. Typography: Recommend matching font styles (Serif, Sans-serif, etc.).
3. Tone of Voice: Describe the brand's personality (e.g., Playful, Corporate, Luxury).
4. Design Style: Keywords describing the visual aesthetic.

Format the output in clear plain text without markdown asterisks. Use capitalization and spacing for structure.";

// ── Voice market ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceRegion {
    pub id: &'static str,
    pub label: &'static str,
}

pub const VOICE_REGIONS: [VoiceRegion; 7] = [
    VoiceRegion { id: "US", label: "American English (US)" },
    VoiceRegion { id: "NG", label: "Nigerian English" },
    VoiceRegion { id: "UK", label: "British English (UK)" },
    VoiceRegion { id: "IN", label: "Indian English" },
    VoiceRegion { id: "EU", label: "European English" },
    VoiceRegion { id: "CN", label: "Chinese (Mandarin)" },
    VoiceRegion { id: "IL", label: "Hebrew (Israel)" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoicePersona {
    pub id: &'static str,
    pub label: &'static str,
    pub gender: Gender,
}

impl VoicePersona {
    /// Prebuilt backend voice for the persona's gender.
    pub fn prebuilt_voice(&self) -> &'static str {
        match self.gender {
            Gender::Male => "Fenrir",
            Gender::Female => "Kore",
        }
    }

    /// The part of the label after the dash, e.g. `Soft & Soothing`.
    pub fn tone(&self) -> &'static str {
        self.label
            .split_once('-')
            .map(|(_, tone)| tone.trim())
            .unwrap_or(self.label)
    }
}

pub const VOICE_PERSONAS: [VoicePersona; 6] = [
    VoicePersona { id: "female_soft", label: "Female - Soft & Soothing", gender: Gender::Female },
    VoicePersona { id: "female_prof", label: "Female - Professional", gender: Gender::Female },
    VoicePersona { id: "female_energetic", label: "Female - Energetic", gender: Gender::Female },
    VoicePersona { id: "male_deep", label: "Male - Deep & Authoritative", gender: Gender::Male },
    VoicePersona { id: "male_casual", label: "Male - Casual & Friendly", gender: Gender::Male },
    VoicePersona { id: "male_prof", label: "Male - Professional", gender: Gender::Male },
];

pub const DEFAULT_REGION: &str = "US";
pub const DEFAULT_PERSONA: &str = "female_prof";
/// History label for reference-voice output.
pub const CUSTOM_VOICE_LABEL: &str = "Custom Clone";

pub fn voice_region(id: &str) -> Option<&'static VoiceRegion> {
    let id = id.trim();
    VOICE_REGIONS.iter().find(|r| r.id.eq_ignore_ascii_case(id))
}

pub fn voice_persona(id: &str) -> Option<&'static VoicePersona> {
    let id = id.trim();
    VOICE_PERSONAS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Delivery adjustments for slider positions in 0..=100.
pub fn delivery_instructions(speed: u8, pitch: u8) -> Vec<&'static str> {
    let mut out = Vec::new();
    if speed > 75 {
        out.push("speak quickly");
    }
    if speed < 25 {
        out.push("speak slowly");
    }
    if pitch > 75 {
        out.push("use a high-pitched voice");
    }
    if pitch < 25 {
        out.push("use a deep voice");
    }
    out
}

/// Style instruction for a preset voice.
pub fn preset_voice_style(
    region: &VoiceRegion,
    persona: &VoicePersona,
    speed: u8,
    pitch: u8,
) -> String {
    let mut style = format!(
        "Speak in {}. Use a {} tone.",
        region.label,
        persona.tone()
    );
    let delivery = delivery_instructions(speed, pitch);
    if !delivery.is_empty() {
        style.push_str(&format!(" Also, {}.", delivery.join(" and ")));
    }
    style
}

/// Style instruction for a reference voice; `None` when the sliders are neutral.
pub fn reference_voice_style(speed: u8, pitch: u8) -> Option<String> {
    let delivery = delivery_instructions(speed, pitch);
    (!delivery.is_empty()).then(|| delivery.join(" and "))
}

pub fn preset_voice_label(region: &VoiceRegion, persona: &VoicePersona) -> String {
    format!("{} - {}", region.id, persona.label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_gender_picks_the_prebuilt_voice() {
        assert_eq!(voice_persona("male_deep").unwrap().prebuilt_voice(), "Fenrir");
        assert_eq!(voice_persona("FEMALE_SOFT").unwrap().prebuilt_voice(), "Kore");
        assert!(voice_persona("robot").is_none());
    }

    #[test]
    fn slider_thresholds_are_exclusive() {
        assert!(delivery_instructions(50, 50).is_empty());
        assert!(delivery_instructions(75, 25).is_empty());
        assert_eq!(delivery_instructions(76, 24), vec!["speak quickly", "use a deep voice"]);
        assert_eq!(delivery_instructions(0, 100), vec!["speak slowly", "use a high-pitched voice"]);
    }

    #[test]
    fn preset_style_names_language_and_tone() {
        let region = voice_region("ng").unwrap();
        let persona = voice_persona("male_casual").unwrap();
        assert_eq!(
            preset_voice_style(region, persona, 50, 50),
            "Speak in Nigerian English. Use a Casual & Friendly tone."
        );
        assert_eq!(
            preset_voice_style(region, persona, 90, 10),
            "Speak in Nigerian English. Use a Casual & Friendly tone. Also, speak quickly and use a deep voice."
        );
        assert_eq!(preset_voice_label(region, persona), "NG - Male - Casual & Friendly");
    }

    #[test]
    fn reference_style_is_absent_for_neutral_sliders() {
        assert_eq!(reference_voice_style(50, 50), None);
        assert_eq!(reference_voice_style(10, 50).as_deref(), Some("speak slowly"));
    }

    #[test]
    fn frameworks_parse_loosely_and_shape_prompts() {
        assert_eq!("Hook-Body-CTA".parse::<CopyFramework>().unwrap(), CopyFramework::HookBodyCta);
        assert_eq!("aida".parse::<CopyFramework>().unwrap(), CopyFramework::Aida);
        assert_eq!("C".parse::<CopyFramework>().unwrap(), CopyFramework::EnquiryResponse);
        assert!("haiku".parse::<CopyFramework>().is_err());

        let f = CopyFramework::Aida;
        assert_eq!(f.model_prompt("new menu"), "Using the AIDA model, respond to: new menu");
        assert_eq!(f.transcript_text("new menu"), "Apply AIDA: new menu");
    }

    #[test]
    fn resize_presets_carry_their_ratio() {
        assert_eq!(
            edit_preset("resize-9x16").unwrap().aspect_ratio,
            Some(AspectRatio::Portrait9x16)
        );
        assert_eq!(edit_preset("enhance-4k").unwrap().aspect_ratio, None);
        assert!(edit_preset("sepia").is_none());
    }

    #[test]
    fn quick_actions_resolve_by_id() {
        assert_eq!(
            quick_action("OCR"),
            Some("Extract all text from the image. No asterisks.")
        );
        assert!(quick_action("poem").is_none());
    }

    #[test]
    fn media_prompts() {
        assert!(icon_prompt("a bakery").starts_with("Professional minimal app icon for: a bakery,"));
        assert_eq!(
            flyer_render_prompt("Headline: Sale"),
            "Graphic Flyer Design based on this plan: Headline: Sale"
        );
        assert_eq!("FLYER".parse::<ImageMode>().unwrap(), ImageMode::Flyer);
        assert_eq!("video".parse::<ScriptMode>().unwrap(), ScriptMode::Video);
    }
}
