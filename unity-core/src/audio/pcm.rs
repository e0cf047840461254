//! Decode stage: base64 little-endian 16-bit PCM → [`AudioSampleBuffer`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::{AudioSampleBuffer, DEFAULT_SPEECH_SAMPLE_RATE};
use crate::error::{Result, UnityError};

/// Divisor mapping an `i16` into [-1.0, 1.0).
const PCM16_SCALE: f32 = 32_768.0;

/// Decode a base64 PCM16 payload into a de-interleaved buffer.
///
/// # Errors
/// `UnityError::Decode` on an invalid base64 alphabet or a byte length that is
/// not a whole number of frames.
pub fn decode_pcm16_base64(
    payload: &str,
    sample_rate: u32,
    channel_count: usize,
) -> Result<AudioSampleBuffer> {
    let bytes = BASE64.decode(payload.trim())?;
    decode_pcm16_bytes(&bytes, sample_rate, channel_count)
}

/// Decode raw interleaved little-endian PCM16 bytes.
pub fn decode_pcm16_bytes(
    bytes: &[u8],
    sample_rate: u32,
    channel_count: usize,
) -> Result<AudioSampleBuffer> {
    if channel_count == 0 {
        return Err(UnityError::Decode("channel count must be positive".into()));
    }
    let frame_bytes = channel_count * 2;
    if bytes.len() % frame_bytes != 0 {
        return Err(UnityError::Decode(format!(
            "truncated PCM payload: {} bytes is not a multiple of {frame_bytes}",
            bytes.len()
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let value = i16::from_le_bytes([pair[0], pair[1]]);
        channels[i % channel_count].push(value as f32 / PCM16_SCALE);
    }

    AudioSampleBuffer::new(sample_rate, channels)
        .map_err(|e| UnityError::Decode(e.to_string()))
}

/// Extract the `rate=` parameter of an audio MIME type such as
/// `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(DEFAULT_SPEECH_SAMPLE_RATE)
}
