//! # scdloop-edit
//!
//! Reads and writes loop points of SCD game-audio containers.
//!
//! Each codec stores its loop one of two ways:
//!
//! - PCM, ADPCM and MPEG streams keep byte offsets in two fields of the
//!   sound entry. Writing patches those fields in place.
//! - Vorbis streams keep sample positions as `LOOPSTART`/`LOOPEND` tags in
//!   the Ogg comment header. Writing re-encodes the comment, repaginates the
//!   header pages and fixes every size and offset that moved.
//!
//! Every write snapshots the file, builds the new image in memory and
//! renames it over the original. Any failure restores the snapshot, so a
//! caller never sees a half-written file. One write per file may be in
//! flight at a time; a second gets [`LoopError::Busy`].
//!
//! ## Example
//!
//! ```no_run
//! use scdloop_edit::LoopPointManager;
//!
//! let manager = LoopPointManager::default();
//! let report = manager.read("bgm_field.scd")?;
//! println!("{} at {} Hz", report.codec, report.sample_rate);
//!
//! let outcome = manager.write("bgm_field.scd", 44_100, report.total_samples)?;
//! println!("wrote via {}, size changed by {}", outcome.strategy, outcome.size_delta);
//! # Ok::<(), scdloop_edit::LoopError>(())
//! ```

mod error;
pub mod gate;
pub mod locator;
mod manager;
pub mod patch;
mod points;
pub mod rewrite;
pub mod transaction;

pub use error::{LoopError, Result};
pub use gate::{WriteGate, WriteState};
pub use manager::{EditOptions, LoopEdit, LoopPointManager};
pub use points::{LoopPoints, LoopReport, WriteOutcome};
pub use transaction::{FaultPlan, FaultPoint};

pub use scdloop_format::{CodecId, CodecStrategy, LoopUnit, StreamMetadata};
