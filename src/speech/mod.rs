//! Text-to-speech for element announcements.

pub mod synthesizer;

pub use synthesizer::{
    GeminiSynthesizer, SpeechAudio, SpeechSynthesizer, SynthesisError, UnconfiguredSynthesizer,
};

#[cfg(test)]
pub use synthesizer::MockSynthesizer;
