//! Registry of section players for the loaded document

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::{PlaybackContext, PlayerStatus, SectionPlayer, SectionStatus, ToggleAction, wait_for_idle};
use crate::document::Document;
use crate::error::SynthesisError;
use crate::text::{Section, SectionId, find_by_header};
use crate::{Error, Result};

/// Owns every [`SectionPlayer`] of one document
///
/// Players are created on first use and only ever driven through their
/// public operations. Dropping the coordinator stops everything.
pub struct PlaybackCoordinator {
    context: Arc<PlaybackContext>,
    sections: RwLock<Vec<Section>>,
    players: Mutex<HashMap<SectionId, SectionPlayer>>,
    /// Bumped by every `stop_all`, so sequential readers notice it
    generation: AtomicU64,
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new(context: PlaybackContext) -> Self {
        Self {
            context: Arc::new(context),
            sections: RwLock::new(Vec::new()),
            players: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    fn players(&self) -> MutexGuard<'_, HashMap<SectionId, SectionPlayer>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the loaded document, stopping all playback first
    ///
    /// Returns the number of sections.
    pub fn load(&self, document: &Document) -> usize {
        self.stop_all();

        let sections = document.sections();
        let count = sections.len();
        *self.sections.write().unwrap_or_else(PoisonError::into_inner) = sections;

        tracing::info!(title = document.title(), sections = count, "loaded document");
        count
    }

    /// Sections of the loaded document, in order
    #[must_use]
    pub fn sections(&self) -> Vec<Section> {
        self.sections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First section, in document order, whose header matches `query`
    #[must_use]
    pub fn section_by_header(&self, query: &str) -> Option<Section> {
        let sections = self.sections.read().unwrap_or_else(PoisonError::into_inner);
        find_by_header(&sections, query).cloned()
    }

    fn section(&self, id: SectionId) -> Result<Section> {
        self.sections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("section {id}")))
    }

    /// Run `f` on the player for `id`, creating it if needed
    fn with_player<R>(&self, id: SectionId, f: impl FnOnce(&SectionPlayer) -> R) -> Result<R> {
        let section = self.section(id)?;
        let mut players = self.players();
        let player = players
            .entry(id)
            .or_insert_with(|| SectionPlayer::new(section, Arc::clone(&self.context)));
        Ok(f(player))
    }

    /// Start playing a section; ignored unless it is idle
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no loaded section has this id
    pub fn play(&self, id: SectionId) -> Result<bool> {
        self.with_player(id, SectionPlayer::play)
    }

    /// Pause a playing section
    pub fn pause(&self, id: SectionId) -> bool {
        self.players().get(&id).is_some_and(SectionPlayer::pause)
    }

    /// Resume a paused section
    pub fn resume(&self, id: SectionId) -> bool {
        self.players().get(&id).is_some_and(SectionPlayer::resume)
    }

    /// Stop a section
    pub fn stop(&self, id: SectionId) -> bool {
        self.players().get(&id).is_some_and(SectionPlayer::stop)
    }

    /// Playback flags for a section; unknown sections are idle
    #[must_use]
    pub fn status(&self, id: SectionId) -> SectionStatus {
        self.player_status(id)
            .map(|status| SectionStatus::from(&status))
            .unwrap_or_default()
    }

    /// Full status for a section with a player
    #[must_use]
    pub fn player_status(&self, id: SectionId) -> Option<PlayerStatus> {
        self.players().get(&id).map(SectionPlayer::status)
    }

    /// Toggle the section whose header matches `query`
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no header matches
    pub fn play_by_header(&self, query: &str) -> Result<ToggleAction> {
        let section = self
            .section_by_header(query)
            .ok_or_else(|| Error::NotFound(format!("no section matching \"{query}\"")))?;

        let action = self.with_player(section.id, SectionPlayer::toggle)?;
        tracing::debug!(section = %section.header, ?action, "toggled section by header");
        Ok(action)
    }

    /// Resolve once the section is idle, returning its final status
    pub async fn wait_until_idle(&self, id: SectionId) -> PlayerStatus {
        let rx = self.players().get(&id).map(SectionPlayer::subscribe);
        match rx {
            Some(rx) => wait_for_idle(rx).await,
            None => PlayerStatus::default(),
        }
    }

    /// Play every section in order, each after the previous finishes
    ///
    /// Stops early if [`stop_all`](Self::stop_all) is called. Returns the
    /// sections that ended with an error; other sections still play.
    pub async fn play_all_in_order(&self) -> Vec<(Section, SynthesisError)> {
        let generation = self.generation.load(Ordering::Acquire);
        let mut failures = Vec::new();

        for section in self.sections() {
            if self.generation.load(Ordering::Acquire) != generation {
                break;
            }
            match self.play(section.id) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::debug!(error = %e, "section vanished, stopping");
                    break;
                }
            }

            let status = self.wait_until_idle(section.id).await;
            if let Some(error) = status.error {
                tracing::warn!(section = %section.header, error = %error, "section failed, continuing");
                failures.push((section, error));
            }
        }

        failures
    }

    /// Stop every player and clear the registry
    ///
    /// Returns how many players were stopped while active.
    pub fn stop_all(&self) -> usize {
        self.generation.fetch_add(1, Ordering::AcqRel);

        let players: Vec<SectionPlayer> = self.players().drain().map(|(_, p)| p).collect();
        let stopped = players.iter().filter(|p| p.stop()).count();
        drop(players);

        if stopped > 0 {
            tracing::info!(stopped, live_handles = self.live_handles(), "stopped all sections");
        }
        stopped
    }

    /// Synthesized clips currently held by any player
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.context.handles.live()
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.stop_all();
    }
}
