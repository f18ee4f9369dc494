//! On-device speech, used when the remote endpoint cannot be reached
//!
//! The default speaker shells out to an espeak-compatible program, captures
//! its WAV output and plays it through the same [`AudioSink`] as remote
//! audio, so both paths report the same utterance lifecycle.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::playback::AudioSink;
use super::profile::VoiceProfile;
use super::utterance::Utterance;
use crate::error::SynthesisError;
use crate::text::PAUSE_TOKEN;

/// espeak speaking rate (words per minute) at rate 1.0
const BASE_WPM: f32 = 175.0;

/// Local speech synthesizer
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    /// Speak `text`, returning the running utterance
    ///
    /// # Errors
    ///
    /// Returns [`SynthesisError::FallbackUnavailable`] if local speech is
    /// unsupported or fails to start
    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<Utterance, SynthesisError>;
}

/// Speaks through an espeak-compatible command (`espeak-ng`, `espeak`)
pub struct CommandSpeaker {
    program: String,
    voice: String,
    sink: Arc<dyn AudioSink>,
}

impl CommandSpeaker {
    /// Create a speaker that runs `program` with the given espeak voice
    #[must_use]
    pub fn new(program: impl Into<String>, voice: impl Into<String>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            program: program.into(),
            voice: voice.into(),
            sink,
        }
    }

    /// Command-line arguments for one utterance; text is passed on stdin
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn args(&self, profile: &VoiceProfile) -> Vec<String> {
        let profile = profile.clone().clamped();
        let wpm = (BASE_WPM * profile.rate).round().clamp(80.0, 450.0) as u32;
        let pitch = (50.0 * profile.pitch).round().clamp(0.0, 99.0) as u32;
        let amplitude = (100.0 * profile.volume).round().clamp(0.0, 200.0) as u32;

        vec![
            "--stdout".to_string(),
            "--stdin".to_string(),
            "-m".to_string(),
            "-v".to_string(),
            self.voice.clone(),
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
        ]
    }

    async fn render(&self, text: &str, profile: &VoiceProfile) -> Result<Vec<u8>, SynthesisError> {
        let unavailable =
            |e: &dyn std::fmt::Display| SynthesisError::FallbackUnavailable(format!("{}: {e}", self.program));

        let mut child = tokio::process::Command::new(&self.program)
            .args(self.args(profile))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unavailable(&e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(ssml_text(text).as_bytes())
                .await
                .map_err(|e| unavailable(&e))?;
        }

        let output = child.wait_with_output().await.map_err(|e| unavailable(&e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(&format!("exited with {}: {}", output.status, stderr.trim())));
        }
        if output.stdout.is_empty() {
            return Err(unavailable(&"produced no audio"));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl LocalSynthesizer for CommandSpeaker {
    async fn speak(&self, text: &str, profile: &VoiceProfile) -> Result<Utterance, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyInput);
        }

        let audio = self.render(text, profile).await?;
        tracing::debug!(
            program = %self.program,
            bytes = audio.len(),
            "rendered on-device speech"
        );

        self.sink
            .start(audio.into())
            .map_err(|e| SynthesisError::FallbackUnavailable(e.to_string()))
    }
}

/// Escape markup characters for espeak's SSML mode, keeping pause markers
fn ssml_text(text: &str) -> String {
    text.split(PAUSE_TOKEN)
        .map(|part| {
            part.replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;")
        })
        .collect::<Vec<_>>()
        .join(PAUSE_TOKEN)
}

/// Stand-in used when on-device speech is turned off
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSpeaker;

#[async_trait]
impl LocalSynthesizer for DisabledSpeaker {
    async fn speak(&self, _text: &str, _profile: &VoiceProfile) -> Result<Utterance, SynthesisError> {
        Err(SynthesisError::FallbackUnavailable(
            "on-device speech is disabled".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceContext;

    struct NullSink;

    impl AudioSink for NullSink {
        fn start(&self, _clip: crate::voice::AudioClip) -> crate::Result<Utterance> {
            Err(crate::Error::Audio("no device".to_string()))
        }
    }

    fn speaker(program: &str) -> CommandSpeaker {
        CommandSpeaker::new(program, "en-us", Arc::new(NullSink))
    }

    #[test]
    fn maps_profile_onto_espeak_flags() {
        let profile = VoiceProfile {
            voice: "ignored".to_string(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        };
        let args = speaker("espeak-ng").args(&profile);
        assert_eq!(
            args,
            vec![
                "--stdout", "--stdin", "-m", "-v", "en-us", "-s", "175", "-p", "50", "-a", "100"
            ]
        );
    }

    #[test]
    fn extreme_profiles_are_clamped() {
        let profile = VoiceProfile {
            voice: String::new(),
            rate: 10.0,
            pitch: 5.0,
            volume: 0.0,
        };
        let args = speaker("espeak-ng").args(&profile);
        assert_eq!(args[6], "450");
        assert_eq!(args[8], "99");
        assert_eq!(args[10], "0");
    }

    #[test]
    fn markup_characters_are_escaped_for_ssml() {
        assert_eq!(
            ssml_text("R&D spending <break/> if x < 5 or y > 2"),
            "R&amp;D spending <break/> if x &lt; 5 or y &gt; 2"
        );
        assert_eq!(ssml_text("Plain words."), "Plain words.");
        assert_eq!(ssml_text("<break/><break/>"), "<break/><break/>");
    }

    #[tokio::test]
    async fn missing_program_is_fallback_unavailable() {
        let profile = VoiceContext::General.default_profile();
        let err = speaker("recital-no-such-speech-program")
            .speak("hello", &profile)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::FallbackUnavailable(_)));
    }

    #[tokio::test]
    async fn disabled_speaker_always_fails() {
        let profile = VoiceContext::General.default_profile();
        let err = DisabledSpeaker.speak("hello", &profile).await.unwrap_err();
        assert!(err.is_terminal());
    }
}
