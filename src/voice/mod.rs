//! Voice module
//!
//! Remote synthesis with retry, on-device fallback speech, and audio output.

mod fallback;
mod playback;
mod profile;
mod retry;
mod tts;
mod utterance;

pub use fallback::{CommandSpeaker, DisabledSpeaker, LocalSynthesizer};
pub use playback::{AudioClip, AudioSink, CpalSink};
pub use profile::{VoiceContext, VoiceOverride, VoiceProfile, VoiceProfiles};
pub use retry::{RetryPolicy, TimeoutPolicy, delay_for_attempt};
pub use tts::{RemoteSynthesizer, Synthesizer};
pub use utterance::{ControlSignal, Utterance, UtteranceControl, UtteranceDriver, UtteranceEvent};
