//! Per-section playback session state

use std::sync::Arc;

use tokio::sync::watch;

use crate::text::{Chunk, SectionId};

/// Cancellation flag for one session
///
/// Once stopped it never resets; a new session gets a new flag.
#[derive(Debug, Clone)]
pub struct StopFlag {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the session stopped and wake every waiter
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the session is stopped
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once stopped
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Whether both flags belong to the same session
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

/// Chunk queue and position for one section's playback attempt
#[derive(Debug)]
pub struct PlaybackSession {
    section_id: SectionId,
    chunks: Vec<Chunk>,
    current_index: usize,
    stop: StopFlag,
}

impl PlaybackSession {
    #[must_use]
    pub const fn new(section_id: SectionId, chunks: Vec<Chunk>, stop: StopFlag) -> Self {
        Self {
            section_id,
            chunks,
            current_index: 0,
            stop,
        }
    }

    #[must_use]
    pub const fn section_id(&self) -> SectionId {
        self.section_id
    }

    /// Chunk to play now, or `None` when finished or stopped
    #[must_use]
    pub fn current(&self) -> Option<&Chunk> {
        if self.stop.is_stopped() {
            return None;
        }
        self.chunks.get(self.current_index)
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Move to the next chunk; returns whether one remains
    pub fn advance(&mut self) -> bool {
        if self.current_index < self.chunks.len() {
            self.current_index += 1;
        }
        self.current().is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
