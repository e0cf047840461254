//! In-memory PCM audio and its WAV packaging.
//!
//! Speech responses arrive as base64 little-endian 16-bit PCM. [`pcm`] turns
//! that into an [`AudioSampleBuffer`]; [`wav`] packages the buffer as a
//! RIFF/WAVE file for playback or download.

pub mod pcm;
pub mod wav;

use crate::error::{Result, UnityError};

/// Sample rate used by the speech backend when the response does not say.
pub const DEFAULT_SPEECH_SAMPLE_RATE: u32 = 24_000;

/// De-interleaved floating-point PCM at a known sample rate.
///
/// Every channel holds the same number of frames. The buffer is immutable once
/// built; construct a new one instead of editing samples in place.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioSampleBuffer {
    /// Build a buffer from per-channel sample arrays.
    ///
    /// # Errors
    /// `UnityError::InvalidBuffer` if `sample_rate` is zero, no channel is
    /// given, or the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(UnityError::InvalidBuffer("sample rate must be positive".into()));
        }
        let Some(first) = channels.first() else {
            return Err(UnityError::InvalidBuffer("at least one channel is required".into()));
        };
        let frames = first.len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != frames) {
            return Err(UnityError::InvalidBuffer(format!(
                "channel {idx} has {} frames, expected {frames}",
                ch.len()
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Single-channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(sample_rate, vec![samples])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Returns the duration of this buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Returns true if the buffer contains no frames.
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_channel_lengths() {
        let err = AudioSampleBuffer::new(24_000, vec![vec![0.0; 4], vec![0.0; 3]])
            .expect_err("mismatched channels must fail");
        assert!(matches!(err, UnityError::InvalidBuffer(_)));
    }

    #[test]
    fn rejects_zero_rate_and_empty_channel_list() {
        assert!(matches!(
            AudioSampleBuffer::mono(vec![0.1], 0),
            Err(UnityError::InvalidBuffer(_))
        ));
        assert!(matches!(
            AudioSampleBuffer::new(24_000, Vec::new()),
            Err(UnityError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn reports_shape_and_duration() {
        let buffer =
            AudioSampleBuffer::new(24_000, vec![vec![0.0; 12_000], vec![0.5; 12_000]]).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 12_000);
        assert!((buffer.duration_secs() - 0.5).abs() < 1e-9);
        assert_eq!(buffer.channel(1).map(|c| c[0]), Some(0.5));
        assert!(buffer.channel(2).is_none());
        assert!(!buffer.is_empty());
    }
}
