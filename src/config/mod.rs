//! Configuration management for Recital
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::text::DEFAULT_MAX_BYTES;
use crate::voice::{RetryPolicy, TimeoutPolicy, VoiceContext, VoiceProfiles};
use crate::{Error, Result};

/// Default remote synthesis endpoint
pub const DEFAULT_TTS_URL: &str = "http://localhost:8000";

/// Default on-device speech program
pub const DEFAULT_FALLBACK_PROGRAM: &str = "espeak-ng";

/// Recital configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Remote synthesis configuration
    pub tts: TtsConfig,

    /// Chunking and pacing
    pub playback: PlaybackSettings,

    /// On-device speech configuration
    pub fallback: FallbackConfig,

    /// Voice profile for every context
    pub voices: VoiceProfiles,
}

/// Remote synthesis configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Endpoint base URL
    pub base_url: String,

    /// Attempt the remote path at all (from `RECITAL_TTS_DISABLED` env)
    pub enabled: bool,

    /// Per-request timeout policy
    pub timeout: TimeoutPolicy,

    /// Retry policy for failed requests
    pub retry: RetryPolicy,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TTS_URL.to_string(),
            enabled: true,
            timeout: TimeoutPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// How sections are chunked and paced
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Chunk size limit in UTF-8 bytes
    pub max_chunk_bytes: usize,

    /// Pause between consecutive chunks
    pub chunk_gap: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            max_chunk_bytes: DEFAULT_MAX_BYTES,
            chunk_gap: Duration::from_millis(200),
        }
    }
}

/// On-device speech configuration
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Use on-device speech when the remote path fails
    pub enabled: bool,

    /// espeak-compatible program
    pub program: String,

    /// espeak voice
    pub voice: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: DEFAULT_FALLBACK_PROGRAM.to_string(),
            voice: "en-us".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// The file path is `path`, then `RECITAL_CONFIG`, then
    /// `~/.config/recital/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable holds an invalid value
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RECITAL_CONFIG").ok().map(PathBuf::from));
        let fc = file::load_config_file(path.as_deref());
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Layer `env` over a parsed config file over defaults
    ///
    /// # Errors
    ///
    /// Returns error if an environment variable holds an invalid value
    pub fn resolve(
        fc: file::RecitalConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let default = Self::default();

        let tts = {
            let toml_tts = fc.tts;
            let disabled = parse_env::<bool>(&env, "RECITAL_TTS_DISABLED")?;

            TtsConfig {
                base_url: env("RECITAL_TTS_URL")
                    .or(toml_tts.base_url)
                    .unwrap_or(default.tts.base_url),
                enabled: disabled
                    .map(|d| !d)
                    .or(toml_tts.enabled)
                    .unwrap_or(default.tts.enabled),
                timeout: TimeoutPolicy {
                    min: toml_tts
                        .min_timeout_ms
                        .map_or(default.tts.timeout.min, Duration::from_millis),
                    per_char: toml_tts
                        .timeout_per_char_ms
                        .map_or(default.tts.timeout.per_char, Duration::from_millis),
                },
                retry: RetryPolicy {
                    max_retries: toml_tts.max_retries.unwrap_or(default.tts.retry.max_retries),
                    base_delay: toml_tts
                        .retry_base_delay_ms
                        .map_or(default.tts.retry.base_delay, Duration::from_millis),
                    ..default.tts.retry
                },
            }
        };

        let playback = PlaybackSettings {
            max_chunk_bytes: parse_env::<usize>(&env, "RECITAL_MAX_CHUNK_BYTES")?
                .or(fc.playback.max_chunk_bytes)
                .filter(|&n| n > 0)
                .unwrap_or(default.playback.max_chunk_bytes),
            chunk_gap: fc
                .playback
                .chunk_gap_ms
                .map_or(default.playback.chunk_gap, Duration::from_millis),
        };

        let fallback = FallbackConfig {
            enabled: fc.fallback.enabled.unwrap_or(default.fallback.enabled),
            program: env("RECITAL_FALLBACK_PROGRAM")
                .or(fc.fallback.program)
                .unwrap_or(default.fallback.program),
            voice: fc.fallback.voice.unwrap_or(default.fallback.voice),
        };

        let mut voices = default.voices;
        for (name, over) in fc.voices {
            match name.parse::<VoiceContext>() {
                Ok(context) => voices.apply_override(context, over),
                Err(e) => tracing::warn!(context = %name, error = %e, "ignoring voice override"),
            }
        }

        Ok(Self {
            tts,
            playback,
            fallback,
            voices,
        })
    }
}

/// Parse an optional environment variable, treating `1`/`yes`/`on` as `true`
/// for booleans
fn parse_env<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    let Some(raw) = env(key) else {
        return Ok(None);
    };

    let normalized = match raw.trim().to_lowercase().as_str() {
        "1" | "yes" | "on" => "true".to_string(),
        "0" | "no" | "off" => "false".to_string(),
        other => other.to_string(),
    };

    // Numbers pass through the boolean aliases unchanged when they parse
    raw.trim()
        .parse()
        .or_else(|_| normalized.parse())
        .map(Some)
        .map_err(|_| Error::Config(format!("invalid value for {key}: {raw}")))
}
