//! Voice profiles per reading context

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What kind of document is being read, which selects the voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceContext {
    /// Debate transcripts
    Debate,
    /// Legislative analyses
    Analysis,
    /// Anything else
    General,
    /// Judge rulings and feedback
    Judge,
}

impl VoiceContext {
    /// Every context, in display order
    pub const ALL: [Self; 4] = [Self::Debate, Self::Analysis, Self::General, Self::Judge];

    /// Lowercase name used in config files and on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debate => "debate",
            Self::Analysis => "analysis",
            Self::General => "general",
            Self::Judge => "judge",
        }
    }

    /// Built-in profile for this context
    #[must_use]
    pub fn default_profile(self) -> VoiceProfile {
        let (voice, rate, pitch) = match self {
            Self::Debate => ("en-US-Neural2-J", 1.05, 1.0),
            Self::Analysis => ("en-US-Neural2-F", 0.95, 1.0),
            Self::General => ("en-US-Neural2-C", 1.0, 1.0),
            Self::Judge => ("en-US-Neural2-D", 0.9, 0.9),
        };
        VoiceProfile {
            voice: voice.to_string(),
            rate,
            pitch,
            volume: 1.0,
        }
    }
}

impl fmt::Display for VoiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoiceContext {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| Error::Config(format!("unknown voice context: {s}")))
    }
}

/// Voice parameters sent with every synthesis request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceProfile {
    /// Remote voice identifier
    pub voice: String,
    /// Speaking rate multiplier (0.25 to 4.0, 1.0 is normal)
    pub rate: f32,
    /// Pitch multiplier (0.0 to 2.0, 1.0 is normal)
    pub pitch: f32,
    /// Volume (0.0 to 1.0)
    pub volume: f32,
}

impl VoiceProfile {
    /// Clamp every parameter into its valid range
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            rate: self.rate.clamp(0.25, 4.0),
            pitch: self.pitch.clamp(0.0, 2.0),
            volume: self.volume.clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Partial profile used to override a built-in one
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VoiceOverride {
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
}

/// Profiles for every context, with config overrides applied
#[derive(Debug, Clone)]
pub struct VoiceProfiles {
    profiles: HashMap<VoiceContext, VoiceProfile>,
}

impl Default for VoiceProfiles {
    fn default() -> Self {
        Self {
            profiles: VoiceContext::ALL
                .into_iter()
                .map(|c| (c, c.default_profile()))
                .collect(),
        }
    }
}

impl VoiceProfiles {
    /// Merge `over` into the profile for `context`, field by field
    pub fn apply_override(&mut self, context: VoiceContext, over: VoiceOverride) {
        let base = self.get(context);
        let merged = VoiceProfile {
            voice: over.voice.unwrap_or(base.voice),
            rate: over.rate.unwrap_or(base.rate),
            pitch: over.pitch.unwrap_or(base.pitch),
            volume: over.volume.unwrap_or(base.volume),
        }
        .clamped();

        tracing::debug!(%context, voice = %merged.voice, "voice profile overridden");
        self.profiles.insert(context, merged);
    }

    /// Profile for `context`
    #[must_use]
    pub fn get(&self, context: VoiceContext) -> VoiceProfile {
        self.profiles
            .get(&context)
            .cloned()
            .unwrap_or_else(|| context.default_profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_contexts_case_insensitively() {
        assert_eq!("Debate".parse::<VoiceContext>().unwrap(), VoiceContext::Debate);
        assert_eq!(" judge ".parse::<VoiceContext>().unwrap(), VoiceContext::Judge);
        assert!("podcast".parse::<VoiceContext>().is_err());
    }

    #[test]
    fn every_context_has_a_profile() {
        let profiles = VoiceProfiles::default();
        for context in VoiceContext::ALL {
            let profile = profiles.get(context);
            assert!(!profile.voice.is_empty());
            assert!((0.25..=4.0).contains(&profile.rate));
        }
    }

    #[test]
    fn override_merges_field_by_field() {
        let mut profiles = VoiceProfiles::default();
        profiles.apply_override(
            VoiceContext::Analysis,
            VoiceOverride {
                rate: Some(1.2),
                ..VoiceOverride::default()
            },
        );

        let profile = profiles.get(VoiceContext::Analysis);
        assert!((profile.rate - 1.2).abs() < f32::EPSILON);
        assert_eq!(profile.voice, VoiceContext::Analysis.default_profile().voice);
    }

    #[test]
    fn override_is_clamped() {
        let mut profiles = VoiceProfiles::default();
        profiles.apply_override(
            VoiceContext::General,
            VoiceOverride {
                volume: Some(3.0),
                rate: Some(0.0),
                ..VoiceOverride::default()
            },
        );

        let profile = profiles.get(VoiceContext::General);
        assert!((profile.volume - 1.0).abs() < f32::EPSILON);
        assert!((profile.rate - 0.25).abs() < f32::EPSILON);
    }
}
