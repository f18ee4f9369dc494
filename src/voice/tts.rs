//! Remote text-to-speech (TTS) client

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::profile::VoiceProfile;
use super::retry::{RetryPolicy, TimeoutPolicy, delay_for_attempt};
use crate::config::TtsConfig;
use crate::error::SynthesisError;
use crate::{Error, Result};

/// Turns chunk text into encoded audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize one chunk
    ///
    /// # Errors
    ///
    /// Returns the last failure once retries are exhausted, or
    /// [`SynthesisError::Unavailable`] if the remote path is disabled
    async fn synthesize(&self, text: &str, profile: &VoiceProfile) -> std::result::Result<Vec<u8>, SynthesisError>;
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_name: &'a str,
    rate: f32,
    pitch: f32,
    volume: f32,
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    audio_content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the remote `/tts/*` endpoint
pub struct RemoteSynthesizer {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    timeout: TimeoutPolicy,
    available: AtomicBool,
}

impl RemoteSynthesizer {
    /// Create a client for `base_url` (for example `http://localhost:8000`)
    #[must_use]
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy, timeout: TimeoutPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
            timeout,
            available: AtomicBool::new(true),
        }
    }

    /// Create a client from the `[tts]` config section
    ///
    /// A disabled config yields a client whose remote path is already off.
    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = Self::new(
            config.base_url.clone(),
            config.retry.clone(),
            config.timeout.clone(),
        );
        if !config.enabled {
            client.disable();
        }
        client
    }

    /// Endpoint base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether synthesis requests will be attempted
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Turn the remote path off for the rest of the process
    pub fn disable(&self) {
        self.available.store(false, Ordering::Relaxed);
    }

    /// Check health and voice listing once, disabling the remote path if
    /// either fails
    ///
    /// Returns whether the remote path is usable.
    pub async fn probe(&self) -> bool {
        if !self.is_available() {
            return false;
        }

        let result = async {
            self.health().await?;
            self.list_voices().await
        }
        .await;

        match result {
            Ok(voices) => {
                tracing::info!(url = %self.base_url, voices = voices.len(), "remote TTS available");
                true
            }
            Err(e) => {
                tracing::warn!(url = %self.base_url, error = %e, "remote TTS unavailable, using on-device speech");
                self.disable();
                false
            }
        }
    }

    async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/tts/health", self.base_url))
            .timeout(self.timeout.min)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Tts(format!("health check returned {}", response.status())));
        }
        Ok(())
    }

    /// Voice names offered by the endpoint
    ///
    /// Accepts a bare list, or an object with a `voices` list, whose entries
    /// are strings or objects with a `name` field.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body is not a voice list
    pub async fn list_voices(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/tts/voices", self.base_url))
            .timeout(self.timeout.min)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Tts(format!("voice listing returned {}", response.status())));
        }

        let body: serde_json::Value = response.json().await?;
        parse_voices(&body).ok_or_else(|| Error::Tts("unexpected voice listing format".to_string()))
    }

    /// Issue one synthesis request without retrying
    async fn synthesize_once(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        let request = SynthesizeRequest {
            text,
            voice_name: &profile.voice,
            rate: profile.rate,
            pitch: profile.pitch,
            volume: profile.volume,
        };

        let response = self
            .client
            .post(format!("{}/tts/synthesize", self.base_url))
            .timeout(self.timeout.for_text(text))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Network(format!("status {status}: {}", body.trim())));
        }

        let body: SynthesizeResponse = response.json().await.map_err(transport_error)?;
        if !body.success {
            return Err(SynthesisError::Rejected(
                body.error.unwrap_or_else(|| "unspecified error".to_string()),
            ));
        }

        let encoded = body
            .audio_content
            .ok_or_else(|| SynthesisError::Rejected("response carried no audio".to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SynthesisError::Rejected(format!("invalid audio encoding: {e}")))
    }
}

#[async_trait]
impl Synthesizer for RemoteSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
    ) -> std::result::Result<Vec<u8>, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }
        if !self.is_available() {
            return Err(SynthesisError::Unavailable);
        }

        let mut attempt = 0;
        loop {
            match self.synthesize_once(text, profile).await {
                Ok(audio) => {
                    tracing::debug!(attempt, bytes = audio.len(), "synthesized chunk");
                    return Ok(audio);
                }
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = delay_for_attempt(&self.retry, attempt);
                    tracing::warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "synthesis failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(attempts = attempt + 1, error = %e, "synthesis retries exhausted");
                    return Err(e);
                }
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::NetworkTimeout
    } else {
        SynthesisError::Network(e.to_string())
    }
}

fn parse_voices(body: &serde_json::Value) -> Option<Vec<String>> {
    let list = match body {
        serde_json::Value::Array(list) => list,
        serde_json::Value::Object(map) => map.get("voices")?.as_array()?,
        _ => return None,
    };

    Some(
        list.iter()
            .filter_map(|voice| match voice {
                serde_json::Value::String(name) => Some(name.clone()),
                serde_json::Value::Object(map) => {
                    map.get("name").and_then(|n| n.as_str()).map(str::to_string)
                }
                _ => None,
            })
            .collect(),
    )
}
