//! Section playback
//!
//! A [`SectionPlayer`] drives one section through
//! `Idle -> Loading -> Playing <-> Paused`, synthesizing and playing its
//! chunks one at a time. Stopping is allowed from any state and always
//! returns the player to `Idle`; late results from the stopped session are
//! discarded.
//!
//! Each play attempt runs as a spawned task raced against the session's
//! [`StopFlag`], so stopping drops any in-flight request, retry backoff or
//! inter-chunk wait at once.

mod coordinator;
mod resource;
mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

pub use coordinator::PlaybackCoordinator;
pub use resource::{AudioHandle, HandleTracker};
pub use session::{PlaybackSession, StopFlag};

use crate::config::PlaybackSettings;
use crate::error::SynthesisError;
use crate::text::{Section, plan, prepare_for_speech};
use crate::voice::{AudioSink, LocalSynthesizer, Synthesizer, Utterance, UtteranceControl, VoiceProfile};

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    /// Planning and synthesizing the first chunk
    Loading,
    Playing,
    Paused,
}

/// Observable player status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    /// Terminal error from the last session, cleared when a new one starts
    pub error: Option<SynthesisError>,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            error: None,
        }
    }
}

/// Snapshot of a section's playback, as reported to UI collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStatus {
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_loading: bool,
}

impl From<&PlayerStatus> for SectionStatus {
    fn from(status: &PlayerStatus) -> Self {
        Self {
            is_playing: status.state == PlaybackState::Playing,
            is_paused: status.state == PlaybackState::Paused,
            is_loading: status.state == PlaybackState::Loading,
        }
    }
}

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Started,
    Paused,
    Resumed,
    /// Still loading; nothing changed
    Ignored,
}

/// Collaborators shared by every player of a document
pub struct PlaybackContext {
    pub synthesizer: Arc<dyn Synthesizer>,
    pub fallback: Arc<dyn LocalSynthesizer>,
    pub sink: Arc<dyn AudioSink>,
    pub profile: VoiceProfile,
    pub settings: PlaybackSettings,
    pub handles: HandleTracker,
}

/// State of the session currently owned by a player
struct ActiveSession {
    stop: StopFlag,
    utterance: Option<UtteranceControl>,
    audio: Option<AudioHandle>,
    paused: bool,
}

impl ActiveSession {
    /// Halt output and release the held clip
    fn release(&mut self) {
        if let Some(utterance) = self.utterance.take() {
            utterance.stop();
        }
        self.audio = None;
    }
}

struct Shared {
    section: Section,
    context: Arc<PlaybackContext>,
    status: watch::Sender<PlayerStatus>,
    slot: Mutex<Option<ActiveSession>>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> PlaybackState {
        self.status.borrow().state
    }

    /// Publish a new state; callers hold the slot lock
    fn publish(&self, state: PlaybackState, error: Option<SynthesisError>) {
        let previous = self.status.send_replace(PlayerStatus { state, error });
        if previous.state != state {
            tracing::debug!(
                section = %self.section.header,
                from = ?previous.state,
                to = ?state,
                "player state changed"
            );
        }
    }

    /// Run `f` on the active session if it is still the one `stop` belongs to
    fn with_session<R>(&self, stop: &StopFlag, f: impl FnOnce(&Self, &mut ActiveSession) -> R) -> Option<R> {
        let mut slot = self.slot();
        match slot.as_mut() {
            Some(active) if active.stop.same_as(stop) && !stop.is_stopped() => Some(f(self, active)),
            _ => None,
        }
    }
}

/// Plays one section, chunk by chunk
///
/// Requires a Tokio runtime. Dropping the player stops it.
pub struct SectionPlayer {
    shared: Arc<Shared>,
}

impl SectionPlayer {
    #[must_use]
    pub fn new(section: Section, context: Arc<PlaybackContext>) -> Self {
        let (status, _) = watch::channel(PlayerStatus::default());
        Self {
            shared: Arc::new(Shared {
                section,
                context,
                status,
                slot: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn section(&self) -> &Section {
        &self.shared.section
    }

    /// Start a new session; only valid from `Idle`
    ///
    /// Returns whether a session was started.
    pub fn play(&self) -> bool {
        let stop = StopFlag::new();
        {
            let mut slot = self.shared.slot();
            if slot.is_some() {
                tracing::debug!(section = %self.shared.section.header, "play ignored, player busy");
                return false;
            }
            *slot = Some(ActiveSession {
                stop: stop.clone(),
                utterance: None,
                audio: None,
                paused: false,
            });
            self.shared.publish(PlaybackState::Loading, None);
        }

        tracing::info!(section = %self.shared.section.header, "playing section");
        tokio::spawn(run_session(Arc::clone(&self.shared), stop));
        true
    }

    /// Pause output; only valid from `Playing`
    pub fn pause(&self) -> bool {
        let mut slot = self.shared.slot();
        let Some(active) = slot.as_mut() else {
            return false;
        };
        if self.shared.state() != PlaybackState::Playing {
            return false;
        }

        active.paused = true;
        if let Some(utterance) = &active.utterance {
            utterance.pause();
        }
        self.shared.publish(PlaybackState::Paused, None);
        true
    }

    /// Resume output; only valid from `Paused`
    pub fn resume(&self) -> bool {
        let mut slot = self.shared.slot();
        let Some(active) = slot.as_mut() else {
            return false;
        };
        if self.shared.state() != PlaybackState::Paused {
            return false;
        }

        active.paused = false;
        if let Some(utterance) = &active.utterance {
            utterance.resume();
        }
        self.shared.publish(PlaybackState::Playing, None);
        true
    }

    /// End the current session from any non-idle state
    ///
    /// The held clip is released before this returns.
    pub fn stop(&self) -> bool {
        let mut active = {
            let mut slot = self.shared.slot();
            let Some(active) = slot.take() else {
                return false;
            };
            active.stop.stop();
            self.shared.publish(PlaybackState::Idle, None);
            active
        };

        active.release();
        tracing::info!(section = %self.shared.section.header, "stopped section");
        true
    }

    /// Start if idle, pause if playing, resume if paused
    pub fn toggle(&self) -> ToggleAction {
        match self.shared.state() {
            PlaybackState::Idle if self.play() => ToggleAction::Started,
            PlaybackState::Playing if self.pause() => ToggleAction::Paused,
            PlaybackState::Paused if self.resume() => ToggleAction::Resumed,
            _ => ToggleAction::Ignored,
        }
    }

    #[must_use]
    pub fn status(&self) -> PlayerStatus {
        self.shared.status.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Watch status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PlayerStatus> {
        self.shared.status.subscribe()
    }

    /// Resolve once the player is `Idle`, returning the final status
    pub async fn wait_until_idle(&self) -> PlayerStatus {
        wait_for_idle(self.subscribe()).await
    }
}

impl Drop for SectionPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resolve once `rx` reports `Idle`
pub(crate) async fn wait_for_idle(mut rx: watch::Receiver<PlayerStatus>) -> PlayerStatus {
    let result = rx.wait_for(|s| s.state == PlaybackState::Idle).await.map(|s| PlayerStatus::clone(&s));
    result.unwrap_or_default()
}

/// Spawned body of one play attempt
async fn run_session(shared: Arc<Shared>, stop: StopFlag) {
    let result = tokio::select! {
        biased;
        () = stop.stopped() => None,
        result = drive(&shared, &stop) => Some(result),
    };
    finish(&shared, &stop, result);
}

/// Plan the section and play every chunk in order
async fn drive(shared: &Shared, stop: &StopFlag) -> Result<(), SynthesisError> {
    let section = &shared.section;
    let settings = &shared.context.settings;

    let text = prepare_for_speech(&section.spoken_text());
    let chunks = plan(&text, settings.max_chunk_bytes);
    if chunks.is_empty() {
        return Err(SynthesisError::EmptyInput);
    }

    let mut session = PlaybackSession::new(section.id, chunks, stop.clone());
    tracing::debug!(
        section = %section.header,
        section_id = %session.section_id(),
        chunks = session.len(),
        "planned section"
    );

    while let Some(chunk) = session.current() {
        let index = session.current_index();
        tracing::debug!(
            section = %section.header,
            chunk = index,
            bytes = chunk.byte_len(),
            "playing chunk"
        );
        play_chunk(shared, stop, chunk.text()).await?;

        if !session.advance() {
            break;
        }

        tokio::time::sleep(settings.chunk_gap).await;

        // Don't start the next chunk while paused between chunks
        let mut status = shared.status.subscribe();
        let _ = status.wait_for(|s| s.state != PlaybackState::Paused).await;
    }

    tracing::info!(section = %section.header, chunks = session.len(), "section complete");
    Ok(())
}

/// Play one chunk, remote first, then on-device
async fn play_chunk(shared: &Shared, stop: &StopFlag, text: &str) -> Result<(), SynthesisError> {
    let context = &shared.context;

    if let Some(mut utterance) = start_remote(shared, stop, text).await {
        let outcome = utterance.finished().await;
        release(shared, stop);
        match outcome {
            Ok(()) => return Ok(()),
            Err(e) => tracing::warn!(
                section = %shared.section.header,
                error = %e,
                "remote audio failed, retrying chunk with on-device speech"
            ),
        }
    }

    let mut utterance = context.fallback.speak(text, &context.profile).await?;
    install(shared, stop, &utterance, None);

    let outcome = utterance.finished().await;
    release(shared, stop);
    outcome.map_err(SynthesisError::FallbackUnavailable)
}

/// Synthesize remotely and start the clip, or `None` to fall back
async fn start_remote(shared: &Shared, stop: &StopFlag, text: &str) -> Option<Utterance> {
    let context = &shared.context;

    let audio = match context.synthesizer.synthesize(text, &context.profile).await {
        Ok(audio) => audio,
        Err(e) => {
            tracing::info!(
                section = %shared.section.header,
                error = %e,
                "remote synthesis failed, using on-device speech"
            );
            return None;
        }
    };

    let handle = context.handles.acquire(audio);
    match context.sink.start(handle.clip()) {
        Ok(utterance) => {
            install(shared, stop, &utterance, Some(handle));
            Some(utterance)
        }
        Err(e) => {
            tracing::warn!(
                section = %shared.section.header,
                error = %e,
                "failed to start remote audio, using on-device speech"
            );
            None
        }
    }
}

/// Make `utterance` the session's active output
///
/// A stale session gets its utterance halted and its clip released instead.
fn install(shared: &Shared, stop: &StopFlag, utterance: &Utterance, audio: Option<AudioHandle>) {
    let control = utterance.control();
    let installed = shared.with_session(stop, |shared, active| {
        if active.paused {
            control.pause();
        }
        active.release();
        active.utterance = Some(control.clone());
        active.audio = audio;

        let state = if active.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        shared.publish(state, None);
    });

    if installed.is_none() {
        control.stop();
    }
}

/// Drop the finished utterance and its clip
fn release(shared: &Shared, stop: &StopFlag) {
    shared.with_session(stop, |_, active| {
        active.utterance = None;
        active.audio = None;
    });
}

/// Return to `Idle` unless `stop` already did
fn finish(shared: &Shared, stop: &StopFlag, result: Option<Result<(), SynthesisError>>) {
    let mut slot = shared.slot();
    if !slot.as_ref().is_some_and(|active| active.stop.same_as(stop)) {
        return;
    }
    let Some(mut active) = slot.take() else {
        return;
    };
    active.release();

    let error = match result {
        _ if stop.is_stopped() => None,
        None | Some(Ok(())) => None,
        Some(Err(SynthesisError::EmptyInput)) => {
            tracing::debug!(section = %shared.section.header, "nothing to play");
            None
        }
        Some(Err(e)) => {
            tracing::error!(section = %shared.section.header, error = %e, "section playback failed");
            Some(e)
        }
    };

    shared.publish(PlaybackState::Idle, error);
}
