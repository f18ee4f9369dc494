//! TOML configuration file loading
//!
//! Supports `~/.config/recital/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;
use crate::voice::VoiceOverride;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RecitalConfigFile {
    /// Remote synthesis endpoint
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Chunking and pacing
    #[serde(default)]
    pub playback: PlaybackFileConfig,

    /// On-device speech
    #[serde(default)]
    pub fallback: FallbackFileConfig,

    /// Per-context voice overrides, keyed by context name
    #[serde(default)]
    pub voices: HashMap<String, VoiceOverride>,
}

/// Remote synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Endpoint base URL (e.g. "http://localhost:8000")
    pub base_url: Option<String>,

    /// Attempt the remote path at all
    pub enabled: Option<bool>,

    /// Lower bound on the per-request timeout
    pub min_timeout_ms: Option<u64>,

    /// Timeout allowance per character of chunk text
    pub timeout_per_char_ms: Option<u64>,

    /// Retries after the first failed request
    pub max_retries: Option<u32>,

    /// Backoff unit, multiplied by the retry number
    pub retry_base_delay_ms: Option<u64>,
}

/// Playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackFileConfig {
    /// Chunk size limit in UTF-8 bytes
    pub max_chunk_bytes: Option<usize>,

    /// Pause between consecutive chunks
    pub chunk_gap_ms: Option<u64>,
}

/// On-device speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct FallbackFileConfig {
    pub enabled: Option<bool>,
    /// espeak-compatible program name or path
    pub program: Option<String>,
    /// espeak voice (e.g. "en-us")
    pub voice: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the contents are not valid TOML for this schema
pub fn parse_config(content: &str) -> Result<RecitalConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from `path`, or the standard path if `None`
///
/// Returns `RecitalConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> RecitalConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return RecitalConfigFile::default();
    };

    if !path.exists() {
        return RecitalConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RecitalConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RecitalConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/recital/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("recital").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let config = parse_config(
            r#"
            [tts]
            base_url = "http://tts.local:9000"
            max_retries = 4

            [voices.judge]
            rate = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.tts.base_url.as_deref(), Some("http://tts.local:9000"));
        assert_eq!(config.tts.max_retries, Some(4));
        assert_eq!(config.tts.enabled, None);
        assert_eq!(config.voices["judge"].rate, Some(0.8));
        assert!(config.playback.max_chunk_bytes.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.tts.base_url.is_none());
        assert!(config.voices.is_empty());
    }

    #[test]
    fn invalid_file_is_an_error() {
        assert!(parse_config("[tts]\nmax_retries = \"many\"").is_err());
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let config = load_config_file(Some(&path));
        assert!(config.tts.base_url.is_none());
    }

    #[test]
    fn loads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[playback]\nchunk_gap_ms = 50\n").unwrap();

        let config = load_config_file(Some(&path));
        assert_eq!(config.playback.chunk_gap_ms, Some(50));
    }
}
