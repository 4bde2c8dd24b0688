//! Core `SpeechSynthesizer` trait and the Gemini TTS implementation.
//!
//! [`GeminiSynthesizer`] calls the `generateContent` endpoint with an audio
//! response modality and returns the raw PCM it gets back.  All connection
//! details come from [`TtsConfig`].

use async_trait::async_trait;
use base64::Engine as _;
use thiserror::Error;

use crate::config::TtsConfig;

// ---------------------------------------------------------------------------
// SynthesisError
// ---------------------------------------------------------------------------

/// Errors that can occur while turning text into speech.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// No API key in the config file or the configured environment variable.
    #[error("speech API key is not configured (set tts.api_key or ${0})")]
    MissingCredential(String),

    /// HTTP transport or connection error.
    #[error("speech request failed: {0}")]
    Request(String),

    #[error("speech request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("speech service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not the expected JSON shape.
    #[error("failed to parse speech response: {0}")]
    Parse(String),

    /// The response carried no inline audio.
    #[error("speech service returned no audio")]
    EmptyResponse,

    /// The inline audio was not valid base64.
    #[error("speech audio is not valid base64: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Timeout
        } else {
            SynthesisError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechAudio
// ---------------------------------------------------------------------------

/// Signed 16-bit little-endian PCM as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Async text-to-speech.
///
/// Implementors must be `Send + Sync` so they can sit behind
/// `Arc<dyn SpeechSynthesizer>` inside spawned announcement tasks.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, SynthesisError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechSynthesizer>) {}
};

// ---------------------------------------------------------------------------
// GeminiSynthesizer
// ---------------------------------------------------------------------------

/// Gemini `generateContent` TTS client.
pub struct GeminiSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
    api_key: String,
}

impl GeminiSynthesizer {
    /// Build a synthesizer, resolving the API key once.
    ///
    /// The key comes from `config.api_key` when non-empty, otherwise from
    /// the environment variable named by `config.api_key_env`.
    pub fn from_config(config: &TtsConfig) -> Result<Self, SynthesisError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(&config.api_key_env)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .ok_or_else(|| SynthesisError::MissingCredential(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// JSON body for a single-speaker TTS request.
fn request_body(config: &TtsConfig, text: &str) -> serde_json::Value {
    let prompt = if config.prompt_prefix.is_empty() {
        text.to_string()
    } else {
        format!("{} {}", config.prompt_prefix, text)
    };

    serde_json::json!({
        "contents": [ { "parts": [ { "text": prompt } ] } ],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": config.voice }
                }
            }
        }
    })
}

/// Pull the first inline audio part out of a `generateContent` response.
fn extract_audio(json: &serde_json::Value, default_rate: u32) -> Result<SpeechAudio, SynthesisError> {
    let inline = &json["candidates"][0]["content"]["parts"][0]["inlineData"];
    let data = inline["data"]
        .as_str()
        .filter(|d| !d.is_empty())
        .ok_or(SynthesisError::EmptyResponse)?;

    let pcm = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| SynthesisError::Decode(e.to_string()))?;
    if pcm.is_empty() {
        return Err(SynthesisError::EmptyResponse);
    }

    let sample_rate = inline["mimeType"]
        .as_str()
        .and_then(parse_pcm_rate)
        .unwrap_or(default_rate);

    Ok(SpeechAudio {
        pcm,
        sample_rate,
        channels: 1,
    })
}

/// `"audio/L16;codec=pcm;rate=24000"` → `Some(24000)`.
fn parse_pcm_rate(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|part| part.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

#[async_trait]
impl SpeechSynthesizer for GeminiSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SpeechAudio, SynthesisError> {
        let body = request_body(&self.config, text);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SynthesisError::Parse(e.to_string()))?;

        let audio = extract_audio(&json, self.config.sample_rate)?;
        log::debug!(
            "tts: '{}' -> {} bytes at {} Hz",
            text,
            audio.pcm.len(),
            audio.sample_rate
        );
        Ok(audio)
    }
}

// ---------------------------------------------------------------------------
// UnconfiguredSynthesizer
// ---------------------------------------------------------------------------

/// Stand-in used when no credential is available: every call fails with
/// [`SynthesisError::MissingCredential`].
pub struct UnconfiguredSynthesizer {
    env_var: String,
}

impl UnconfiguredSynthesizer {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for UnconfiguredSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<SpeechAudio, SynthesisError> {
        Err(SynthesisError::MissingCredential(self.env_var.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockSynthesizer (test-only)
// ---------------------------------------------------------------------------


#[cfg(test)]
pub use mock::MockSynthesizer;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
