//! Handles for one piece of audio or speech in flight
//!
//! An [`Utterance`] pairs a control handle (pause, resume, stop) with a
//! stream of lifecycle events from whatever is producing the sound. The
//! producing side holds the matching [`UtteranceDriver`].
//!
//! Dropping every control handle stops the utterance.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

/// Requested playback state, set by the owner of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Play,
    Pause,
    Stop,
}

/// Lifecycle events emitted by an utterance's producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started,
    Paused,
    Resumed,
    Ended,
    Error(String),
}

/// Cloneable pause/resume/stop handle
#[derive(Debug, Clone)]
pub struct UtteranceControl {
    tx: Arc<watch::Sender<ControlSignal>>,
}

impl UtteranceControl {
    /// Pause output
    pub fn pause(&self) {
        self.send(ControlSignal::Pause);
    }

    /// Resume paused output
    pub fn resume(&self) {
        self.send(ControlSignal::Play);
    }

    /// Halt output; a stopped utterance never restarts
    pub fn stop(&self) {
        self.send(ControlSignal::Stop);
    }

    /// Current requested state
    #[must_use]
    pub fn signal(&self) -> ControlSignal {
        *self.tx.borrow()
    }

    fn send(&self, signal: ControlSignal) {
        self.tx.send_if_modified(|current| {
            if *current == ControlSignal::Stop || *current == signal {
                return false;
            }
            *current = signal;
            true
        });
    }
}

/// Owner side of an utterance
#[derive(Debug)]
pub struct Utterance {
    control: UtteranceControl,
    events: mpsc::UnboundedReceiver<UtteranceEvent>,
}

impl Utterance {
    /// Create a connected utterance and driver pair
    #[must_use]
    pub fn channel() -> (Self, UtteranceDriver) {
        let (control_tx, control_rx) = watch::channel(ControlSignal::Play);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let utterance = Self {
            control: UtteranceControl {
                tx: Arc::new(control_tx),
            },
            events: events_rx,
        };
        let driver = UtteranceDriver {
            control: control_rx,
            events: events_tx,
        };

        (utterance, driver)
    }

    /// Control handle for this utterance
    #[must_use]
    pub fn control(&self) -> UtteranceControl {
        self.control.clone()
    }

    /// Wait for the utterance to end
    ///
    /// # Errors
    ///
    /// Returns the producer's error message, or a generic one if the producer
    /// went away without reporting an end
    pub async fn finished(&mut self) -> Result<(), String> {
        loop {
            match self.events.recv().await {
                Some(UtteranceEvent::Ended) => return Ok(()),
                Some(UtteranceEvent::Error(e)) => return Err(e),
                Some(event) => tracing::trace!(?event, "utterance event"),
                None => return Err("audio output ended without completing".to_string()),
            }
        }
    }
}

/// Producer side of an utterance
#[derive(Debug)]
pub struct UtteranceDriver {
    control: watch::Receiver<ControlSignal>,
    events: mpsc::UnboundedSender<UtteranceEvent>,
}

impl UtteranceDriver {
    /// Report a lifecycle event; ignored if the owner is gone
    pub fn emit(&self, event: UtteranceEvent) {
        let _ = self.events.send(event);
    }

    /// Current requested state; `Stop` once every control handle is dropped
    #[must_use]
    pub fn signal(&self) -> ControlSignal {
        if self.control.has_changed().is_err() {
            return ControlSignal::Stop;
        }
        *self.control.borrow()
    }

    /// Wait for the requested state to change
    pub async fn changed(&mut self) -> ControlSignal {
        if self.control.changed().await.is_err() {
            return ControlSignal::Stop;
        }
        *self.control.borrow_and_update()
    }
}
