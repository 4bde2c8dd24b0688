//! Speech playback via `cpal`.
//!
//! [`AudioPlayer`] is the seam the scheduler uses: decode raw PCM, then play
//! it and wait for it to finish.  [`CpalSpeechPlayer`] opens an output stream
//! per utterance on a blocking thread, converts the buffer to the device
//! format and resolves once the last sample has been handed to the device.

use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::pcm::{AudioBuffer, PlaybackError};

/// Extra time allowed on top of the clip length before playback is
/// considered stuck.
const PLAYBACK_GRACE: Duration = Duration::from_secs(3);

/// Lets the device drain its last buffer before the stream is dropped.
const DRAIN_DELAY: Duration = Duration::from_millis(80);

// ---------------------------------------------------------------------------
// AudioPlayer trait
// ---------------------------------------------------------------------------

/// Decode-and-play interface for short speech clips.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Decode signed 16-bit little-endian PCM.
    fn decode(
        &self,
        raw: &[u8],
        sample_rate: u32,
        channels: u16,
    ) -> Result<AudioBuffer, PlaybackError> {
        AudioBuffer::from_pcm16_le(raw, sample_rate, channels)
    }

    /// Play `buffer` and resolve when playback has ended.
    async fn play(&self, buffer: AudioBuffer) -> Result<(), PlaybackError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioPlayer>) {}
};

// ---------------------------------------------------------------------------
// CpalSpeechPlayer
// ---------------------------------------------------------------------------

/// Plays speech on the default (or a named) output device.
pub struct CpalSpeechPlayer {
    device_name: Option<String>,
    volume: f32,
}

impl CpalSpeechPlayer {
    /// `device_name` selects an output device by its exact name; `None` uses
    /// the host default.
    pub fn new(device_name: Option<String>, volume: f32) -> Self {
        Self {
            device_name,
            volume: volume.clamp(0.0, 2.0),
        }
    }
}

fn open_device(name: Option<&str>) -> Result<cpal::Device, PlaybackError> {
    let host = cpal::default_host();
    match name {
        None => host.default_output_device().ok_or(PlaybackError::NoDevice),
        Some(wanted) => host
            .output_devices()
            .map_err(|e| PlaybackError::Output(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or(PlaybackError::NoDevice),
    }
}

/// Blocking playback; runs inside `spawn_blocking` because `cpal::Stream`
/// is not `Send` on every platform.
fn play_blocking(
    device_name: Option<&str>,
    mut buffer: AudioBuffer,
    volume: f32,
) -> Result<(), PlaybackError> {
    let device = open_device(device_name)?;
    let supported = device.default_output_config()?;
    let device_rate = supported.sample_rate().0;
    let device_channels = supported.channels();
    let config: cpal::StreamConfig = supported.into();

    buffer.scale(volume);
    let clip_len = buffer.duration();
    let samples = buffer.converted(device_rate, device_channels).samples;

    let (done_tx, done_rx) = mpsc::channel::<()>();
    let mut done_tx = Some(done_tx);
    let mut pos = 0usize;

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let n = data.len().min(samples.len() - pos);
            data[..n].copy_from_slice(&samples[pos..pos + n]);
            data[n..].fill(0.0);
            pos += n;
            if pos >= samples.len() {
                if let Some(tx) = done_tx.take() {
                    let _ = tx.send(());
                }
            }
        },
        |err: cpal::StreamError| {
            log::error!("cpal output stream error: {err}");
        },
        None,
    )?;
    stream.play()?;

    let limit = clip_len + PLAYBACK_GRACE;
    match done_rx.recv_timeout(limit) {
        Ok(()) => {
            std::thread::sleep(DRAIN_DELAY);
            Ok(())
        }
        Err(mpsc::RecvTimeoutError::Timeout) => Err(PlaybackError::Timeout(limit)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(PlaybackError::Disconnected),
    }
}

#[async_trait]
impl AudioPlayer for CpalSpeechPlayer {
    async fn play(&self, buffer: AudioBuffer) -> Result<(), PlaybackError> {
        if buffer.is_empty() {
            return Ok(());
        }
        let device_name = self.device_name.clone();
        let volume = self.volume;
        tokio::task::spawn_blocking(move || play_blocking(device_name.as_deref(), buffer, volume))
            .await
            .map_err(|e| PlaybackError::Output(format!("playback task failed: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// MockAudioPlayer (test-only)
// ---------------------------------------------------------------------------


#[cfg(test)]
pub use mock::MockAudioPlayer;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_clamped() {
        assert_eq!(CpalSpeechPlayer::new(None, 5.0).volume, 2.0);
        assert_eq!(CpalSpeechPlayer::new(None, -1.0).volume, 0.0);
    }

    #[test]
    fn default_decode_uses_pcm16() {
        let player = MockAudioPlayer::new();
        let buf = player.decode(&[0, 0, 0, 64], 24_000, 1).unwrap();
        assert_eq!(buf.samples, vec![0.0, 0.5]);
        assert!(player.decode(&[0], 24_000, 1).is_err());
    }

    #[tokio::test]
    async fn empty_buffer_plays_without_a_device() {
        let player = CpalSpeechPlayer::new(Some("no such device".into()), 1.0);
        let empty = AudioBuffer {
            samples: Vec::new(),
            sample_rate: 24_000,
            channels: 1,
        };
        assert!(player.play(empty).await.is_ok());
    }

    #[tokio::test]
    async fn mock_counts_and_fails() {
        let buf = AudioBuffer::from_pcm16_le(&[0; 4], 24_000, 1).unwrap();

        let ok = MockAudioPlayer::new();
        ok.play(buf.clone()).await.unwrap();
        assert_eq!(ok.plays(), 1);

        let bad = MockAudioPlayer::failing();
        assert!(bad.play(buf).await.is_err());
        assert_eq!(bad.plays(), 0);
    }
}
