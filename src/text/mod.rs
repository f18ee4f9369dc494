//! Text pipeline: markdown cleanup, sectioning, and chunk planning
//!
//! Raw markdown is segmented into sections first; each section's spoken
//! text is normalized and pause-annotated only when it starts playing.

pub mod chunking;
pub mod heading;
pub mod normalize;
pub mod segment;

pub use chunking::{Chunk, DEFAULT_MAX_BYTES, plan};
pub use normalize::{PAUSE_TOKEN, add_pauses, normalize, prepare_for_speech};
pub use segment::{INTRODUCTION, Section, SectionId, find_by_header, segment};
