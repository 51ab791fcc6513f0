//! Ogg bitstream framing.
//!
//! Page layout (all fields little-endian):
//!
//! ```text
//! 0x00  "OggS"               capture pattern
//! 0x04  u8   version         always 0
//! 0x05  u8   header type     0x01 continued, 0x02 first page, 0x04 last page
//! 0x06  u64  granule position
//! 0x0E  u32  serial number
//! 0x12  u32  page sequence number
//! 0x16  u32  CRC-32 of the whole page with this field zeroed
//! 0x1A  u8   segment count
//! 0x1B  [u8] segment table (lacing values)
//! ```
//!
//! A packet ends at the first lacing value below 255.

mod packet;
mod page;
mod paginate;

pub use packet::{collect_packets, take_packets, Packet};
pub use page::{checksum, read_pages, OggPage};
pub use paginate::{paginate, set_sequence, PageParams};

/// Capture pattern at the start of every page.
pub const CAPTURE_PATTERN: [u8; 4] = *b"OggS";
/// Fixed part of the page header.
pub const PAGE_HEADER_SIZE: usize = 27;
/// Maximum lacing values per page.
pub const MAX_SEGMENTS: usize = 255;
/// Granule position of a page on which no packet ends.
pub const NO_GRANULE: u64 = u64::MAX;

pub const FLAG_CONTINUED: u8 = 0x01;
pub const FLAG_BOS: u8 = 0x02;
pub const FLAG_EOS: u8 = 0x04;

pub(crate) const SEQUENCE_OFFSET: usize = 0x12;
pub(crate) const CHECKSUM_OFFSET: usize = 0x16;
