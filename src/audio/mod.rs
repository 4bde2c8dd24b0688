//! Audio output: speech clips and background music.
//!
//! # Paths
//!
//! ```text
//! TTS PCM16 bytes → AudioBuffer::from_pcm16_le → remix / resample → cpal stream
//! MusicTrack blob → rodio Decoder → Sink (dedicated audio thread)
//! ```

pub mod music;
pub mod output;
pub mod pcm;

pub use music::{MusicPlayer, RodioMusicPlayer};
pub use output::{AudioPlayer, CpalSpeechPlayer};
pub use pcm::{remix, resample, AudioBuffer, PlaybackError};

#[cfg(test)]
pub use music::MockMusicPlayer;
#[cfg(test)]
pub use output::MockAudioPlayer;
