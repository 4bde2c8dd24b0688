//! Raw PCM decoding and format conversion.
//!
//! Speech arrives as signed 16-bit little-endian PCM (24 kHz mono from the
//! TTS service).  [`AudioBuffer::from_pcm16_le`] turns it into interleaved
//! `f32`; [`remix`] and [`resample`] adapt it to whatever the output device
//! asks for.

use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Decoding or playback failure.  Always recoverable from the scheduler's
/// point of view.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("no output device available")]
    NoDevice,

    #[error("audio output failed: {0}")]
    Output(String),

    #[error("playback did not finish within {0:?}")]
    Timeout(Duration),

    #[error("audio thread is gone")]
    Disconnected,
}

impl From<cpal::DefaultStreamConfigError> for PlaybackError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        PlaybackError::Output(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for PlaybackError {
    fn from(e: cpal::BuildStreamError) -> Self {
        PlaybackError::Output(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for PlaybackError {
    fn from(e: cpal::PlayStreamError) -> Self {
        PlaybackError::Output(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// AudioBuffer
// ---------------------------------------------------------------------------

/// Decoded, interleaved samples in `[-1.0, 1.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// Decode little-endian `i16` samples.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidFormat`] for a zero rate, zero channels, an odd
    /// byte count, or a sample count that is not a whole number of frames.
    pub fn from_pcm16_le(raw: &[u8], sample_rate: u32, channels: u16) -> Result<Self, PlaybackError> {
        if sample_rate == 0 {
            return Err(PlaybackError::InvalidFormat("sample rate is 0".into()));
        }
        if channels == 0 {
            return Err(PlaybackError::InvalidFormat("channel count is 0".into()));
        }
        if raw.len() % 2 != 0 {
            return Err(PlaybackError::InvalidFormat(format!(
                "{} bytes is not a whole number of 16-bit samples",
                raw.len()
            )));
        }

        let samples: Vec<f32> = raw
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0)
            .collect();

        if samples.len() % channels as usize != 0 {
            return Err(PlaybackError::InvalidFormat(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert to the given rate and channel count.
    pub fn converted(&self, sample_rate: u32, channels: u16) -> AudioBuffer {
        let remixed = remix(&self.samples, self.channels, channels);
        let samples = resample(&remixed, channels, self.sample_rate, sample_rate);
        AudioBuffer {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Multiply every sample by `gain`.
    pub fn scale(&mut self, gain: f32) {
        if (gain - 1.0).abs() > f32::EPSILON {
            for s in &mut self.samples {
                *s *= gain;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// remix
// ---------------------------------------------------------------------------

/// Change the channel count of interleaved audio.
///
/// * Same count → copy.
/// * To mono → average all channels.
/// * From mono → duplicate into every channel.
/// * Otherwise → average to mono, then duplicate.
pub fn remix(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }
    if from == 0 || to == 0 {
        return Vec::new();
    }

    let from = from as usize;
    let to = to as usize;
    samples
        .chunks_exact(from)
        .flat_map(|frame| {
            let mono = frame.iter().sum::<f32>() / from as f32;
            std::iter::repeat(mono).take(to)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample interleaved audio from `from_rate` to `to_rate` using linear
/// interpolation per channel.
///
/// * Equal rates → copy.
/// * Empty input → empty output.
pub fn resample(samples: &[f32], channels: u16, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() || channels == 0 {
        return Vec::new();
    }

    let ch = channels as usize;
    let in_frames = samples.len() / ch;
    let ratio = to_rate as f64 / from_rate as f64;
    let out_frames = (in_frames as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(out_frames * ch);

    for i in 0..out_frames {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        for c in 0..ch {
            let sample = if idx + 1 < in_frames {
                samples[idx * ch + c] * (1.0 - frac) + samples[(idx + 1) * ch + c] * frac
            } else if idx < in_frames {
                samples[idx * ch + c]
            } else {
                0.0
            };
            output.push(sample);
        }
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_full_scale_values() {
        let buf = AudioBuffer::from_pcm16_le(&pcm(&[0, 16_384, -32_768, 32_767]), 24_000, 1)
            .unwrap();
        assert_eq!(buf.samples.len(), 4);
        assert_eq!(buf.samples[0], 0.0);
        assert!((buf.samples[1] - 0.5).abs() < 1e-6);
        assert_eq!(buf.samples[2], -1.0);
        assert!(buf.samples[3] < 1.0);
    }

    #[test]
    fn one_second_at_24k_has_one_second_duration() {
        let buf = AudioBuffer::from_pcm16_le(&vec![0u8; 48_000], 24_000, 1).unwrap();
        assert_eq!(buf.frames(), 24_000);
        assert_eq!(buf.duration(), Duration::from_secs(1));
    }

    #[test]
    fn odd_byte_count_is_rejected() {
        let err = AudioBuffer::from_pcm16_le(&[0u8; 3], 24_000, 1).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidFormat(_)));
    }

    #[test]
    fn partial_frame_is_rejected() {
        let err = AudioBuffer::from_pcm16_le(&pcm(&[1, 2, 3]), 24_000, 2).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidFormat(_)));
    }

    #[test]
    fn zero_rate_or_channels_is_rejected() {
        assert!(AudioBuffer::from_pcm16_le(&[], 0, 1).is_err());
        assert!(AudioBuffer::from_pcm16_le(&[], 24_000, 0).is_err());
    }

    #[test]
    fn remix_mono_to_stereo_duplicates() {
        assert_eq!(remix(&[0.1, 0.2], 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn remix_stereo_to_mono_averages() {
        let mono = remix(&[0.5, -0.5, 0.2, 0.4], 2, 1);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.0).abs() < 1e-6);
        assert!((mono[1] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn resample_24k_to_48k_doubles_length() {
        let out = resample(&vec![0.25_f32; 240], 1, 24_000, 48_000);
        assert_eq!(out.len(), 480);
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn resample_keeps_channels_interleaved() {
        // L = 1.0, R = -1.0 throughout
        let stereo: Vec<f32> = (0..100).flat_map(|_| [1.0_f32, -1.0]).collect();
        let out = resample(&stereo, 2, 24_000, 44_100);
        assert_eq!(out.len() % 2, 0);
        assert!(out.chunks_exact(2).all(|f| f[0] == 1.0 && f[1] == -1.0));
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(resample(&input, 1, 24_000, 24_000), input);
    }

    #[test]
    fn converted_changes_rate_and_layout() {
        let buf = AudioBuffer::from_pcm16_le(&vec![0u8; 480], 24_000, 1).unwrap();
        let out = buf.converted(48_000, 2);
        assert_eq!(out.channels, 2);
        assert_eq!(out.sample_rate, 48_000);
        assert_eq!(out.frames(), 480);
    }
}
