//! SCD container parsing.
//!
//! An SCD file carries one or more sound entries. Each entry is a fixed
//! 0x20-byte metadata block followed by codec extradata and the encoded
//! stream. The same layout is stored either little- or big-endian; the
//! reader works out which by checking that the decoded fields make sense.

mod builder;
mod reader;

pub use builder::ScdBuilder;
pub use reader::resolve_endian;

use crate::codec::CodecId;
use crate::Result;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// `SEDB` signature at offset 0.
pub const SCD_MAGIC: [u8; 4] = *b"SEDB";
/// `SSCF` sub-signature at offset 4.
pub const SSCF_MAGIC: [u8; 4] = *b"SSCF";

/// Offset of the advisory endian flag byte.
pub const ENDIAN_FLAG_OFFSET: usize = 0x0C;
/// Offset of the u16 header size (start of the tables block).
pub const HEADER_SIZE_OFFSET: usize = 0x0E;
/// Offset of the u32 total file size.
pub const FILE_SIZE_OFFSET: usize = 0x10;
/// Default header size written by encoders.
pub const DEFAULT_HEADER_SIZE: u16 = 0x30;
/// Size of the tables block that follows the header.
pub const TABLES_SIZE: usize = 0x10;
/// Size of the tables block when it also carries the table1 and aux table
/// pointers.
pub const EXTENDED_TABLES_SIZE: usize = 0x20;
/// Size of a sound entry metadata block.
pub const SOUND_ENTRY_SIZE: usize = 0x20;

/// Field offsets inside the tables block.
pub mod tables {
    pub const TABLE0_COUNT: usize = 0x00;
    pub const TABLE1_COUNT: usize = 0x02;
    pub const SOUND_COUNT: usize = 0x04;
    pub const TABLE0_OFFSET: usize = 0x08;
    pub const SOUND_TABLE_OFFSET: usize = 0x0C;
    pub const TABLE1_OFFSET: usize = 0x10;
    pub const AUX_TABLE_OFFSET: usize = 0x18;
}

/// Field offsets inside a sound entry.
pub mod entry {
    pub const STREAM_SIZE: usize = 0x00;
    pub const CHANNELS: usize = 0x04;
    pub const SAMPLE_RATE: usize = 0x08;
    pub const CODEC: usize = 0x0C;
    pub const LOOP_START: usize = 0x10;
    pub const LOOP_END: usize = 0x14;
    pub const EXTRADATA_SIZE: usize = 0x18;
    pub const AUX_COUNT: usize = 0x1C;
}

/// Byte order of the container fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Interpretation suggested by the flag byte at 0x0C.
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0x01 {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Value of the flag byte for this byte order.
    pub fn flag(&self) -> u8 {
        match self {
            Self::Little => 0x00,
            Self::Big => 0x01,
        }
    }

    /// The opposite byte order.
    pub fn swapped(&self) -> Self {
        match self {
            Self::Little => Self::Big,
            Self::Big => Self::Little,
        }
    }

    pub fn read_u16(&self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = data.get(offset..offset.checked_add(2)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_u32(&self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn u16_bytes(&self, value: u16) -> [u8; 2] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(&self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }

    /// Overwrite a u32 field in place. Returns `false` if it does not fit.
    pub fn write_u32(&self, data: &mut [u8], offset: usize, value: u32) -> bool {
        match offset
            .checked_add(4)
            .and_then(|end| data.get_mut(offset..end))
        {
            Some(slot) => {
                slot.copy_from_slice(&self.u32_bytes(value));
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Little => f.write_str("little-endian"),
            Self::Big => f.write_str("big-endian"),
        }
    }
}

/// Fixed container header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScdHeader {
    /// Container version.
    pub version: u32,
    /// Advisory endian flag as stored.
    pub endian_flag: u8,
    /// SSCF version byte.
    pub sscf_version: u8,
    /// Offset of the tables block.
    pub header_size: u16,
    /// Declared total file size.
    pub file_size: u32,
}

/// Offset tables block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    /// Absolute offset of the tables block.
    pub offset: usize,
    pub table0_count: u16,
    pub table1_count: u16,
    pub sound_count: u16,
    /// Offset of table 0 (0 when absent).
    pub table0_offset: u32,
    /// Offset of the sound entry offset table.
    pub sound_table_offset: u32,
    /// Offset of table 1. 0 when absent or the block is not extended.
    pub table1_offset: u32,
    /// Offset of the aux table. 0 when absent or the block is not extended.
    pub aux_table_offset: u32,
}

impl TableHeader {
    /// Absolute offset of the table0 pointer field.
    pub fn table0_pointer(&self) -> usize {
        self.offset + tables::TABLE0_OFFSET
    }

    /// Absolute offset of the sound table pointer field.
    pub fn sound_table_pointer(&self) -> usize {
        self.offset + tables::SOUND_TABLE_OFFSET
    }

    pub fn table1_pointer(&self) -> usize {
        self.offset + tables::TABLE1_OFFSET
    }

    pub fn aux_table_pointer(&self) -> usize {
        self.offset + tables::AUX_TABLE_OFFSET
    }
}

/// Read-only description of the first sound entry's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamMetadata {
    /// Codec of the stream.
    pub codec: CodecId,
    /// Channel count.
    pub channels: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Absolute offset of the sound entry (metadata block).
    pub entry_offset: u32,
    /// Declared stream data size in bytes.
    pub stream_size: u32,
    /// Declared extradata size in bytes.
    pub extradata_size: u32,
    /// Auxiliary chunk count.
    pub aux_count: u32,
    /// Raw loop start field (bytes into stream data).
    pub loop_start_bytes: u32,
    /// Raw loop end field (bytes into stream data).
    pub loop_end_bytes: u32,
}

impl StreamMetadata {
    /// Absolute offset of the extradata.
    pub fn extradata_offset(&self) -> usize {
        self.entry_offset as usize + SOUND_ENTRY_SIZE
    }

    /// Absolute offset of the stream data.
    pub fn stream_offset(&self) -> usize {
        self.extradata_offset() + self.extradata_size as usize
    }

    /// Absolute byte range of the extradata.
    pub fn extradata_range(&self) -> Range<usize> {
        self.extradata_offset()..self.stream_offset()
    }

    /// Absolute byte range of the stream data.
    pub fn stream_range(&self) -> Range<usize> {
        self.stream_offset()..self.stream_offset() + self.stream_size as usize
    }

    /// Extradata plus stream data: everything the codec owns.
    pub fn payload_range(&self) -> Range<usize> {
        self.extradata_offset()..self.stream_range().end
    }

    /// Absolute offset of a field inside the sound entry.
    pub fn field(&self, relative: usize) -> usize {
        self.entry_offset as usize + relative
    }
}

/// An SCD container loaded into memory.
///
/// Opened per operation; holds the full byte image so every offset the
/// parser hands out can be checked against it.
#[derive(Debug, Clone)]
pub struct ScdFile {
    path: Option<PathBuf>,
    data: Vec<u8>,
    endian: Endian,
    header: ScdHeader,
    tables: TableHeader,
    entry_offsets: Vec<u32>,
    metadata: StreamMetadata,
}

impl ScdFile {
    /// Read and parse an SCD file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut file = Self::from_bytes(data)?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Parse an SCD image already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let parsed = reader::parse(&data)?;
        Ok(Self {
            path: None,
            data,
            endian: parsed.endian,
            header: parsed.header,
            tables: parsed.tables,
            entry_offsets: parsed.entry_offsets,
            metadata: parsed.metadata,
        })
    }

    /// Path the file was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The full byte image.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the byte image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Resolved byte order.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn header(&self) -> &ScdHeader {
        &self.header
    }

    pub fn tables(&self) -> &TableHeader {
        &self.tables
    }

    /// Absolute offsets of every sound entry.
    pub fn entry_offsets(&self) -> &[u32] {
        &self.entry_offsets
    }

    /// Metadata of the first sound entry.
    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn extradata(&self) -> &[u8] {
        &self.data[self.metadata.extradata_range()]
    }

    pub fn stream(&self) -> &[u8] {
        &self.data[self.metadata.stream_range()]
    }
}
