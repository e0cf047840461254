use std::io::Cursor;

use approx::assert_abs_diff_eq;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use unity_core::audio::pcm::decode_pcm16_base64;
use unity_core::audio::wav::{decode_pcm16_sample, encode_pcm16_sample, HEADER_LEN};
use unity_core::{encode_planar, encode_wav, AudioSampleBuffer, UnityError};

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Deterministic pseudo-random signal in [-1, 1].
fn signal(frames: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    (0..frames)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
        })
        .collect()
}

#[test]
fn speech_buffer_encodes_to_known_bytes() {
    let buffer = AudioSampleBuffer::mono(vec![0.5, -0.5, 1.0], 24_000).expect("buffer");
    let wav = encode_wav(&buffer);
    let bytes = wav.as_bytes();

    assert_eq!(bytes.len(), HEADER_LEN + 6);
    assert_eq!(&bytes[44..46], &[0xFF, 0x3F]);
    assert_eq!(&bytes[46..48], &[0x00, 0xC0]);
    assert_eq!(&bytes[48..50], &[0xFF, 0x7F]);
    assert_eq!(u32_at(bytes, 24), 24_000);
    assert_eq!(u32_at(bytes, 28), 48_000);
}

#[test]
fn decoded_payload_reencodes_within_one_step() {
    // Backend PCM: 16384, -16384, 32767. Decoding divides by 32768, so the
    // positive peak comes back one step lower.
    let payload = BASE64.encode([0x00, 0x40, 0x00, 0xC0, 0xFF, 0x7F]);
    let buffer = decode_pcm16_base64(&payload, 24_000, 1).expect("decode");
    let bytes = encode_wav(&buffer).into_bytes();

    assert_eq!(&bytes[44..46], &[0xFF, 0x3F]);
    assert_eq!(&bytes[46..48], &[0x00, 0xC0]);
    assert_eq!(&bytes[48..50], &[0xFE, 0x7F]);
}

#[test]
fn header_fields_hold_for_every_shape() {
    for channels in [1usize, 2, 6] {
        for frames in [0usize, 1, 480] {
            let planar: Vec<Vec<f32>> = (0..channels)
                .map(|c| signal(frames, c as u32 + 7))
                .collect();
            let wav = encode_planar(44_100, &planar).expect("encode");
            let bytes = wav.as_bytes();
            let data_len = frames * channels * 2;

            assert_eq!(&bytes[0..4], b"RIFF");
            assert_eq!(u32_at(bytes, 4) as usize, bytes.len() - 8);
            assert_eq!(&bytes[8..12], b"WAVE");
            assert_eq!(&bytes[12..16], b"fmt ");
            assert_eq!(u32_at(bytes, 16), 16);
            assert_eq!(u16_at(bytes, 20), 1);
            assert_eq!(u16_at(bytes, 22) as usize, channels);
            assert_eq!(u32_at(bytes, 24), 44_100);
            assert_eq!(u32_at(bytes, 28) as usize, 44_100 * channels * 2);
            assert_eq!(u16_at(bytes, 32) as usize, channels * 2);
            assert_eq!(u16_at(bytes, 34), 16);
            assert_eq!(&bytes[36..40], b"data");
            assert_eq!(u32_at(bytes, 40) as usize, data_len);
            assert_eq!(bytes.len(), HEADER_LEN + data_len);
            assert_eq!(wav.frame_count(), frames);
        }
    }
}

#[test]
fn round_trip_stays_within_one_step() {
    for channels in [1usize, 2] {
        for frames in [0usize, 1, 1000] {
            let planar: Vec<Vec<f32>> = (0..channels)
                .map(|c| signal(frames, 31 * c as u32 + frames as u32))
                .collect();
            let buffer = AudioSampleBuffer::new(16_000, planar.clone()).expect("buffer");
            let wav = encode_wav(&buffer);

            let mut reader = hound::WavReader::new(Cursor::new(wav.into_bytes())).expect("hound");
            let spec = reader.spec();
            assert_eq!(spec.channels as usize, channels);
            assert_eq!(spec.sample_rate, 16_000);
            assert_eq!(spec.bits_per_sample, 16);

            let decoded: Vec<i16> = reader
                .samples::<i16>()
                .collect::<Result<_, _>>()
                .expect("samples");
            assert_eq!(decoded.len(), frames * channels);

            for (i, value) in decoded.iter().enumerate() {
                let original = planar[i % channels][i / channels];
                // One quantization step, plus the f32 rounding of the decoded value.
                assert_abs_diff_eq!(
                    decode_pcm16_sample(*value) as f64,
                    original as f64,
                    epsilon = 1.0 / 32_767.0 + f64::from(f32::EPSILON)
                );
            }
        }
    }
}

#[test]
fn out_of_range_samples_clamp() {
    assert_eq!(encode_pcm16_sample(1.5), 32_767);
    assert_eq!(encode_pcm16_sample(-3.0), -32_768);
    assert_eq!(encode_pcm16_sample(f32::INFINITY), 32_767);

    let wav = encode_planar(8_000, &[vec![2.0f32, -2.0]]).expect("encode");
    assert_eq!(wav.data(), &[0xFF, 0x7F, 0x00, 0x80]);
}

#[test]
fn stereo_is_interleaved_left_first() {
    let wav = encode_planar(8_000, &[vec![1.0f32, 0.0], vec![-1.0, 0.0]]).expect("encode");
    assert_eq!(wav.data(), &[0xFF, 0x7F, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn mismatched_channels_are_rejected() {
    let err = encode_planar(8_000, &[vec![0.0f32; 3], vec![0.0; 2]]).unwrap_err();
    assert!(matches!(err, UnityError::InvalidBuffer(_)));
    let err = encode_planar::<Vec<f32>>(8_000, &[]).unwrap_err();
    assert!(matches!(err, UnityError::InvalidBuffer(_)));
    let err = encode_planar(0, &[vec![0.0f32]]).unwrap_err();
    assert!(matches!(err, UnityError::InvalidBuffer(_)));
}

#[test]
fn encoding_is_deterministic() {
    let buffer = AudioSampleBuffer::mono(signal(256, 3), 24_000).expect("buffer");
    assert_eq!(encode_wav(&buffer), encode_wav(&buffer));
}
