//! Bit-exact 16-bit PCM RIFF/WAVE encoder.
//!
//! ## Layout
//!
//! | Offset | Field            | Value                          |
//! |--------|------------------|--------------------------------|
//! | 0      | `RIFF`           | tag                            |
//! | 4      | RIFF size (u32)  | file length − 8                |
//! | 8      | `WAVE`           | tag                            |
//! | 12     | `fmt `           | tag                            |
//! | 16     | chunk size (u32) | 16                             |
//! | 20     | format (u16)     | 1 (PCM)                        |
//! | 22     | channels (u16)   |                                |
//! | 24     | rate (u32)       |                                |
//! | 28     | byte rate (u32)  | rate × channels × 2            |
//! | 32     | block align (u16)| channels × 2                   |
//! | 34     | bits (u16)       | 16                             |
//! | 36     | `data`           | tag                            |
//! | 40     | data size (u32)  | frames × channels × 2          |
//! | 44     | samples          | interleaved i16 LE             |
//!
//! Samples are clamped to [-1, 1], scaled by 32767 when non-negative and by
//! 32768 when negative, then truncated toward zero.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::AudioSampleBuffer;
use crate::error::{Result, UnityError};
use crate::media::DataUri;

/// Bytes before the first sample.
pub const HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: usize = 2;

/// A complete WAV file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavContainer {
    bytes: Vec<u8>,
    sample_rate: u32,
    channel_count: u16,
}

impl WavContainer {
    pub const MIME_TYPE: &'static str = "audio/wav";

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn frame_count(&self) -> usize {
        (self.bytes.len() - HEADER_LEN) / (self.channel_count as usize * BYTES_PER_SAMPLE)
    }

    /// Interleaved sample bytes after the header.
    pub fn data(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    /// `data:audio/wav;base64,...` form for inline playback.
    pub fn to_data_uri(&self) -> DataUri {
        DataUri::new(Self::MIME_TYPE, BASE64.encode(&self.bytes))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Encode a buffer. Infallible: [`AudioSampleBuffer`] already guarantees
/// equal-length channels and a positive rate.
pub fn encode_wav(buffer: &AudioSampleBuffer) -> WavContainer {
    write_container(buffer.sample_rate(), buffer.channels())
}

/// Encode raw planar channels, validating the shape first.
///
/// # Errors
/// `UnityError::InvalidBuffer` on zero rate, no channels, more channels than
/// fit the header, or channels of differing length.
pub fn encode_planar<C: AsRef<[f32]>>(sample_rate: u32, channels: &[C]) -> Result<WavContainer> {
    if sample_rate == 0 {
        return Err(UnityError::InvalidBuffer("sample rate must be positive".into()));
    }
    if channels.is_empty() || channels.len() > u16::MAX as usize {
        return Err(UnityError::InvalidBuffer(format!(
            "unsupported channel count {}",
            channels.len()
        )));
    }
    let frames = channels[0].as_ref().len();
    if channels.iter().any(|ch| ch.as_ref().len() != frames) {
        return Err(UnityError::InvalidBuffer("channel length mismatch".into()));
    }
    Ok(write_container(sample_rate, channels))
}

/// Quantize one sample to its 16-bit PCM value.
pub fn encode_pcm16_sample(sample: f32) -> i16 {
    let clamped = (sample as f64).clamp(-1.0, 1.0);
    let scaled = if clamped >= 0.0 {
        clamped * 32_767.0
    } else {
        clamped * 32_768.0
    };
    // `as` truncates toward zero and maps NaN to 0.
    scaled as i16
}

/// Inverse of [`encode_pcm16_sample`] up to quantization error.
pub fn decode_pcm16_sample(value: i16) -> f32 {
    if value >= 0 {
        value as f32 / 32_767.0
    } else {
        value as f32 / 32_768.0
    }
}

fn write_container<C: AsRef<[f32]>>(sample_rate: u32, channels: &[C]) -> WavContainer {
    let channel_count = channels.len() as u16;
    let frames = channels.first().map(|c| c.as_ref().len()).unwrap_or(0);
    let block_align = channel_count as usize * BYTES_PER_SAMPLE;
    let data_len = frames * block_align;
    let total_len = HEADER_LEN + data_len;

    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((total_len - 8) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // PCM fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channel_count.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    let byte_rate = sample_rate.wrapping_mul(block_align as u32);
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&(block_align as u16).to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_len as u32).to_le_bytes());
    for frame in 0..frames {
        for channel in channels {
            let v = encode_pcm16_sample(channel.as_ref()[frame]);
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    WavContainer {
        bytes: out,
        sample_rate,
        channel_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn writes_canonical_stereo_header() {
        let buffer = AudioSampleBuffer::new(44_100, vec![vec![0.0; 10], vec![0.0; 10]]).unwrap();
        let wav = encode_wav(&buffer);
        let bytes = wav.as_bytes();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(bytes, 4), (bytes.len() - 8) as u32);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(bytes, 16), 16);
        assert_eq!(u16_at(bytes, 20), 1);
        assert_eq!(u16_at(bytes, 22), 2);
        assert_eq!(u32_at(bytes, 24), 44_100);
        assert_eq!(u32_at(bytes, 28), 44_100 * 2 * 2);
        assert_eq!(u16_at(bytes, 32), 4);
        assert_eq!(u16_at(bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(bytes, 40), 40);
        assert_eq!(bytes.len(), 44 + 40);
        assert_eq!(wav.frame_count(), 10);
    }

    #[test]
    fn quantizes_with_asymmetric_full_scale() {
        assert_eq!(encode_pcm16_sample(1.0), 32_767);
        assert_eq!(encode_pcm16_sample(-1.0), -32_768);
        assert_eq!(encode_pcm16_sample(0.5), 16_383);
        assert_eq!(encode_pcm16_sample(-0.5), -16_384);
        assert_eq!(encode_pcm16_sample(0.0), 0);
        assert_eq!(encode_pcm16_sample(f32::NAN), 0);
    }

    #[test]
    fn clamps_out_of_range_samples() {
        assert_eq!(encode_pcm16_sample(1.5), encode_pcm16_sample(1.0));
        assert_eq!(encode_pcm16_sample(-1.5), encode_pcm16_sample(-1.0));
        assert_eq!(encode_pcm16_sample(f32::INFINITY), 32_767);
        assert_eq!(encode_pcm16_sample(f32::NEG_INFINITY), -32_768);
    }

    #[test]
    fn interleaves_channels_in_order() {
        let left = [1.0f32, 0.0];
        let right = [-1.0f32, 0.0];
        let wav = encode_planar(8_000, &[&left[..], &right[..]]).unwrap();
        assert_eq!(&wav.data()[0..4], &[0xFF, 0x7F, 0x00, 0x80]);
        assert_eq!(&wav.data()[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn planar_rejects_mismatched_channels() {
        let err = encode_planar(8_000, &[vec![0.0f32; 3], vec![0.0f32; 2]]).unwrap_err();
        assert!(matches!(err, UnityError::InvalidBuffer(_)));

        let none: [Vec<f32>; 0] = [];
        assert!(matches!(
            encode_planar(8_000, &none),
            Err(UnityError::InvalidBuffer(_))
        ));
        assert!(matches!(
            encode_planar(0, &[vec![0.0f32]]),
            Err(UnityError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn same_input_encodes_identically() {
        let buffer = AudioSampleBuffer::mono(vec![0.25, -0.75, 0.125], 24_000).unwrap();
        assert_eq!(encode_wav(&buffer), encode_wav(&buffer));
    }

    #[test]
    fn data_uri_carries_wav_mime() {
        let buffer = AudioSampleBuffer::mono(vec![0.0], 24_000).unwrap();
        let uri = encode_wav(&buffer).to_data_uri();
        assert_eq!(uri.mime_type(), "audio/wav");
        assert!(uri.to_string().starts_with("data:audio/wav;base64,UklGR"));
    }
}
