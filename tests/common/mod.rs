//! Shared test utilities
//!
//! Scripted stand-ins for the remote synthesizer, the audio sink and the
//! on-device speaker, so players can be driven without a network or sound
//! hardware.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc, watch};

use recital::config::PlaybackSettings;
use recital::player::HandleTracker;
use recital::voice::{
    AudioClip, AudioSink, ControlSignal, LocalSynthesizer, Synthesizer, Utterance,
    UtteranceDriver, UtteranceEvent, VoiceContext, VoiceProfile,
};
use recital::{PlaybackContext, PlaybackCoordinator, PlaybackState, SectionPlayer, SynthesisError};

/// Upper bound for anything a test waits on
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How long an automatically played clip lasts
pub const CLIP_LENGTH: Duration = Duration::from_millis(5);

/// What a scripted synthesizer does with each request
#[derive(Clone)]
pub enum Behavior {
    /// Return the request text as audio bytes
    Succeed,
    /// Fail every request
    Fail(SynthesisError),
    /// Wait for the gate, then succeed
    Block(Arc<Notify>),
}

/// Remote synthesizer stand-in that records every request
pub struct ScriptedSynthesizer {
    behavior: Behavior,
    fail_containing: Option<String>,
    calls: Mutex<Vec<String>>,
    called: Notify,
}

impl ScriptedSynthesizer {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            fail_containing: None,
            calls: Mutex::new(Vec::new()),
            called: Notify::new(),
        })
    }

    /// Succeed except for text containing `needle`
    pub fn failing_on(needle: &str) -> Arc<Self> {
        Arc::new(Self {
            behavior: Behavior::Succeed,
            fail_containing: Some(needle.to_string()),
            calls: Mutex::new(Vec::new()),
            called: Notify::new(),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `n` requests have arrived
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            loop {
                let notified = self.called.notified();
                if self.calls.lock().unwrap().len() >= n {
                    return;
                }
                notified.await;
            }
        })
        .await
        .expect("synthesizer was never called");
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, text: &str, _profile: &VoiceProfile) -> Result<Vec<u8>, SynthesisError> {
        self.calls.lock().unwrap().push(text.to_string());
        self.called.notify_waiters();

        if self.fail_containing.as_deref().is_some_and(|n| text.contains(n)) {
            return Err(SynthesisError::Network("scripted failure".to_string()));
        }

        match &self.behavior {
            Behavior::Succeed => Ok(text.as_bytes().to_vec()),
            Behavior::Fail(e) => Err(e.clone()),
            Behavior::Block(gate) => {
                gate.notified().await;
                Ok(text.as_bytes().to_vec())
            }
        }
    }
}

/// Play a fake clip: ends after `length` of unpaused time, honors controls
async fn run_clip(mut driver: UtteranceDriver, length: Duration) {
    driver.emit(UtteranceEvent::Started);

    let deadline = tokio::time::sleep(length);
    tokio::pin!(deadline);
    let mut paused = driver.signal() == ControlSignal::Pause;

    loop {
        tokio::select! {
            () = &mut deadline, if !paused => {
                driver.emit(UtteranceEvent::Ended);
                return;
            }
            signal = driver.changed() => match signal {
                ControlSignal::Stop => return,
                ControlSignal::Pause => {
                    paused = true;
                    driver.emit(UtteranceEvent::Paused);
                }
                ControlSignal::Play => {
                    paused = false;
                    driver.emit(UtteranceEvent::Resumed);
                }
            },
        }
    }
}

/// How the mock sink treats clips
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Play every clip for [`CLIP_LENGTH`]
    Auto,
    /// Hand each clip's driver to the test
    Manual,
    /// Start, then report a device error
    Broken,
}

/// A clip handed to the test by a manual sink
pub struct ManualClip {
    pub clip: AudioClip,
    pub driver: UtteranceDriver,
}

/// Audio sink stand-in
pub struct MockSink {
    mode: SinkMode,
    starts: AtomicUsize,
    clips_tx: mpsc::UnboundedSender<ManualClip>,
    clips_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ManualClip>>,
}

impl MockSink {
    pub fn new(mode: SinkMode) -> Arc<Self> {
        let (clips_tx, clips_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            mode,
            starts: AtomicUsize::new(0),
            clips_tx,
            clips_rx: tokio::sync::Mutex::new(clips_rx),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Next clip started on a manual sink
    pub async fn next_clip(&self) -> ManualClip {
        let mut rx = self.clips_rx.lock().await;
        tokio::time::timeout(TEST_TIMEOUT, rx.recv())
            .await
            .expect("no clip was started")
            .expect("sink closed")
    }
}

impl AudioSink for MockSink {
    fn start(&self, clip: AudioClip) -> recital::Result<Utterance> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let (utterance, driver) = Utterance::channel();

        match self.mode {
            SinkMode::Auto => {
                tokio::spawn(run_clip(driver, CLIP_LENGTH));
            }
            SinkMode::Manual => {
                let _ = self.clips_tx.send(ManualClip { clip, driver });
            }
            SinkMode::Broken => {
                driver.emit(UtteranceEvent::Started);
                driver.emit(UtteranceEvent::Error("device unplugged".to_string()));
            }
        }

        Ok(utterance)
    }
}

/// On-device speaker stand-in
pub struct MockSpeaker {
    works: bool,
    calls: Mutex<Vec<String>>,
}

impl MockSpeaker {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            works: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self {
            works: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalSynthesizer for MockSpeaker {
    async fn speak(&self, text: &str, _profile: &VoiceProfile) -> Result<Utterance, SynthesisError> {
        self.calls.lock().unwrap().push(text.to_string());
        if !self.works {
            return Err(SynthesisError::FallbackUnavailable("no speech engine".to_string()));
        }

        let (utterance, driver) = Utterance::channel();
        tokio::spawn(run_clip(driver, CLIP_LENGTH));
        Ok(utterance)
    }
}

/// Playback context wired to the given mocks
pub fn context(
    synthesizer: Arc<ScriptedSynthesizer>,
    speaker: Arc<MockSpeaker>,
    sink: Arc<MockSink>,
    max_chunk_bytes: usize,
) -> PlaybackContext {
    PlaybackContext {
        synthesizer,
        fallback: speaker,
        sink,
        profile: VoiceContext::General.default_profile(),
        settings: PlaybackSettings {
            max_chunk_bytes,
            chunk_gap: Duration::from_millis(10),
        },
        handles: HandleTracker::new(),
    }
}

/// Coordinator wired to the given mocks
pub fn coordinator(
    synthesizer: Arc<ScriptedSynthesizer>,
    speaker: Arc<MockSpeaker>,
    sink: Arc<MockSink>,
) -> PlaybackCoordinator {
    PlaybackCoordinator::new(context(synthesizer, speaker, sink, 3000))
}

/// Wait until `player` reaches `state`
pub async fn wait_for_state(player: &SectionPlayer, state: PlaybackState) {
    wait_for_status(player.subscribe(), state).await;
}

/// Wait until a status channel reports `state`
pub async fn wait_for_status(mut rx: watch::Receiver<recital::PlayerStatus>, state: PlaybackState) {
    tokio::time::timeout(TEST_TIMEOUT, rx.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("player never reached {state:?}"))
        .expect("player dropped");
}
