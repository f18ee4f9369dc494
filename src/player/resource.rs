//! Scoped ownership of synthesized audio
//!
//! Every successful remote synthesis yields one [`AudioHandle`]. Dropping the
//! handle releases the clip, so each exit path of a session releases it
//! exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::voice::AudioClip;

#[derive(Debug, Default)]
struct Counters {
    live: AtomicUsize,
    issued: AtomicU64,
}

/// Issues audio handles and counts the ones still alive
#[derive(Debug, Clone, Default)]
pub struct HandleTracker {
    counters: Arc<Counters>,
}

impl HandleTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a synthesized clip
    #[must_use]
    pub fn acquire(&self, audio: Vec<u8>) -> AudioHandle {
        let id = self.counters.issued.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters.live.fetch_add(1, Ordering::AcqRel);

        tracing::trace!(handle = id, bytes = audio.len(), "acquired audio handle");

        AudioHandle {
            id,
            audio: audio.into(),
            counters: Arc::clone(&self.counters),
        }
    }

    /// Handles acquired and not yet released
    #[must_use]
    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::Acquire)
    }

    /// Handles acquired since the tracker was created
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.counters.issued.load(Ordering::Relaxed)
    }
}

/// One synthesized clip, released on drop
#[derive(Debug)]
pub struct AudioHandle {
    id: u64,
    audio: AudioClip,
    counters: Arc<Counters>,
}

impl AudioHandle {
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Shared view of the clip for an audio sink
    #[must_use]
    pub fn clip(&self) -> AudioClip {
        Arc::clone(&self.audio)
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(handle = self.id, "released audio handle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_releases_exactly_once() {
        let tracker = HandleTracker::new();
        let a = tracker.acquire(vec![1, 2, 3]);
        let b = tracker.acquire(vec![4]);
        assert_eq!(tracker.live(), 2);
        assert_eq!(tracker.issued(), 2);

        drop(a);
        assert_eq!(tracker.live(), 1);
        drop(b);
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.issued(), 2);
    }

    #[test]
    fn clip_outlives_nothing_but_the_bytes() {
        let tracker = HandleTracker::new();
        let handle = tracker.acquire(vec![7, 8]);
        let clip = handle.clip();
        drop(handle);

        assert_eq!(tracker.live(), 0);
        assert_eq!(&clip[..], &[7, 8]);
    }
}
