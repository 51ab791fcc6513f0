//! scdloop-format: SCD container parsing and embedded bitstream codecs
//!
//! This crate understands the on-disk layout of SCD game-audio containers and
//! the nested bitstreams some codecs embed in them. It never writes to disk;
//! callers get byte offsets and decoded structures and decide what to mutate.
//!
//! # Modules
//!
//! - `scd` - Container header, offset tables, sound entry, endianness resolution
//! - `codec` - Codec ids and their loop persistence strategy
//! - `ogg` - Ogg page parsing, packet assembly, pagination and CRC
//! - `vorbis` - Vorbis identification and comment header codecs
//! - `mpeg` - MPEG audio frame header parsing
//!
//! # Layout
//!
//! ```text
//! 0x00            "SEDB" "SSCF" version endian-flag header-size file-size
//! header_size     tables block: counts + table offsets
//! sound table     u32 offsets of sound entries
//! sound entry     0x20 bytes: size, channels, rate, codec, loop start/end, extradata size
//! extradata       codec sub-header (WAVEFORMATEX, Vorbis sub-header + header pages)
//! stream data     encoded audio
//! ```

pub mod codec;
pub mod error;
pub mod mpeg;
pub mod ogg;
pub mod scd;
pub mod vorbis;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use codec::{classify, CodecId, CodecStrategy, LoopUnit};
pub use error::{Error, Result};
pub use scd::{Endian, ScdBuilder, ScdFile, StreamMetadata};
