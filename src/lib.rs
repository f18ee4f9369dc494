//! Recital - Section-by-section speech playback for long markdown documents
//!
//! This library provides the chunking-and-playback engine:
//! - Markdown cleanup and prosodic pause markers
//! - Sectioning at second-level headings
//! - Byte-bounded chunk planning
//! - Remote synthesis with retry, and on-device fallback speech
//! - Per-section players and a coordinator that owns them
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Document                         │
//! │      normalize  │  segment  │  plan (per section)    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Playback Coordinator                   │
//! │   SectionPlayer  │  SectionPlayer  │  ...            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Voice                           │
//! │   Remote TTS (retry)  │  On-device speech  │  Audio  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod player;
pub mod text;
pub mod voice;

pub use config::Config;
pub use document::Document;
pub use error::{Error, Result, SynthesisError};
pub use player::{
    PlaybackContext, PlaybackCoordinator, PlaybackState, PlayerStatus, SectionPlayer,
    SectionStatus, ToggleAction,
};
pub use text::{Chunk, Section, SectionId};
pub use voice::{VoiceContext, VoiceProfile};
