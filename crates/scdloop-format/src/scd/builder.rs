//! SCD container builder.

use super::{
    entry, tables, Endian, DEFAULT_HEADER_SIZE, FILE_SIZE_OFFSET, HEADER_SIZE_OFFSET, SCD_MAGIC,
    SOUND_ENTRY_SIZE, SSCF_MAGIC, TABLES_SIZE,
};
use crate::codec::CodecId;
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Builds a single-entry SCD container.
///
/// The sound entry is placed at `entry_offset` (default: right after the
/// tables block) and the sound entry offset table is appended after the
/// stream data, 16-byte aligned.
#[derive(Debug, Clone)]
pub struct ScdBuilder {
    endian: Endian,
    version: u32,
    codec: CodecId,
    channels: u32,
    sample_rate: u32,
    loop_start_bytes: u32,
    loop_end_bytes: u32,
    entry_offset: Option<u32>,
    aux_count: u32,
    extradata: Vec<u8>,
    stream: Vec<u8>,
}

impl ScdBuilder {
    /// Create a builder for a little-endian version 3 container.
    pub fn new(codec: CodecId, channels: u32, sample_rate: u32) -> Self {
        Self {
            endian: Endian::Little,
            version: 3,
            codec,
            channels,
            sample_rate,
            loop_start_bytes: 0,
            loop_end_bytes: 0,
            entry_offset: None,
            aux_count: 0,
            extradata: Vec::new(),
            stream: Vec::new(),
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Place the sound entry at a fixed offset.
    pub fn entry_offset(mut self, offset: u32) -> Self {
        self.entry_offset = Some(offset);
        self
    }

    /// Raw loop byte fields.
    pub fn loop_bytes(mut self, start: u32, end: u32) -> Self {
        self.loop_start_bytes = start;
        self.loop_end_bytes = end;
        self
    }

    pub fn extradata(mut self, extradata: Vec<u8>) -> Self {
        self.extradata = extradata;
        self
    }

    pub fn stream(mut self, stream: Vec<u8>) -> Self {
        self.stream = stream;
        self
    }

    /// Serialize the container.
    pub fn build(self) -> Result<Vec<u8>> {
        let tables_offset = DEFAULT_HEADER_SIZE as usize;
        let min_entry = tables_offset + TABLES_SIZE;
        let entry_offset = self.entry_offset.map_or(min_entry, |o| o as usize);
        if entry_offset < min_entry {
            return Err(Error::invalid_format(format!(
                "sound entry offset {entry_offset:#x} overlaps the header"
            )));
        }

        let extradata_size = fits_u32(self.extradata.len(), "extradata size")?;
        let stream_size = fits_u32(self.stream.len(), "stream size")?;

        let payload_end = entry_offset + SOUND_ENTRY_SIZE + self.extradata.len() + self.stream.len();
        let sound_table_offset = align16(payload_end);
        let total = sound_table_offset + 4;
        let file_size = fits_u32(total, "file size")?;

        let e = self.endian;
        let mut buf = BytesMut::with_capacity(total);

        buf.put_slice(&SCD_MAGIC);
        buf.put_slice(&SSCF_MAGIC);
        buf.put_slice(&e.u32_bytes(self.version));
        buf.put_u8(e.flag());
        buf.put_u8(0x04);
        debug_assert_eq!(buf.len(), HEADER_SIZE_OFFSET);
        buf.put_slice(&e.u16_bytes(DEFAULT_HEADER_SIZE));
        debug_assert_eq!(buf.len(), FILE_SIZE_OFFSET);
        buf.put_slice(&e.u32_bytes(file_size));
        buf.put_bytes(0, tables_offset - buf.len());

        // Tables block
        let mut block = [0u8; TABLES_SIZE];
        block[tables::SOUND_COUNT..tables::SOUND_COUNT + 2].copy_from_slice(&e.u16_bytes(1));
        block[tables::SOUND_TABLE_OFFSET..tables::SOUND_TABLE_OFFSET + 4]
            .copy_from_slice(&e.u32_bytes(sound_table_offset as u32));
        buf.put_slice(&block);
        buf.put_bytes(0, entry_offset - buf.len());

        // Sound entry
        let mut meta = [0u8; SOUND_ENTRY_SIZE];
        for (field, value) in [
            (entry::STREAM_SIZE, stream_size),
            (entry::CHANNELS, self.channels),
            (entry::SAMPLE_RATE, self.sample_rate),
            (entry::CODEC, self.codec.raw() as u32),
            (entry::LOOP_START, self.loop_start_bytes),
            (entry::LOOP_END, self.loop_end_bytes),
            (entry::EXTRADATA_SIZE, extradata_size),
            (entry::AUX_COUNT, self.aux_count),
        ] {
            meta[field..field + 4].copy_from_slice(&e.u32_bytes(value));
        }
        buf.put_slice(&meta);
        buf.put_slice(&self.extradata);
        buf.put_slice(&self.stream);
        buf.put_bytes(0, sound_table_offset - buf.len());

        buf.put_slice(&e.u32_bytes(entry_offset as u32));

        Ok(buf.to_vec())
    }
}

fn align16(value: usize) -> usize {
    (value + 15) & !15
}

fn fits_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::overflow(format!("{what} {value} exceeds u32")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scd::ScdFile;

    #[test]
    fn test_build_and_parse() {
        let data = ScdBuilder::new(CodecId::MsAdpcm, 2, 44_100)
            .entry_offset(0x40)
            .loop_bytes(0x100, 0x800)
            .extradata(vec![0xAA; 0x32])
            .stream(vec![0x11; 0x1000])
            .build()
            .unwrap();

        let file = ScdFile::from_bytes(data).unwrap();
        let meta = file.metadata();
        assert_eq!(meta.entry_offset, 0x40);
        assert_eq!(meta.codec, CodecId::MsAdpcm);
        assert_eq!(meta.extradata_size, 0x32);
        assert_eq!(meta.stream_size, 0x1000);
        assert_eq!(meta.loop_start_bytes, 0x100);
        assert_eq!(meta.loop_end_bytes, 0x800);
        assert_eq!(meta.stream_offset(), 0x40 + 0x20 + 0x32);
        assert_eq!(file.header().file_size as usize, file.data().len());
        assert!(file.extradata().iter().all(|&b| b == 0xAA));
        assert!(file.stream().iter().all(|&b| b == 0x11));
    }

    #[test]
    fn test_sound_table_is_aligned() {
        let data = ScdBuilder::new(CodecId::Pcm16, 1, 22_050)
            .stream(vec![0; 3])
            .build()
            .unwrap();
        let file = ScdFile::from_bytes(data).unwrap();
        assert_eq!(file.tables().sound_table_offset % 16, 0);
        assert_eq!(file.entry_offsets(), &[0x40]);
    }

    #[test]
    fn test_entry_overlapping_header_rejected() {
        let result = ScdBuilder::new(CodecId::Pcm16, 1, 22_050)
            .entry_offset(0x20)
            .build();
        assert!(result.is_err());
    }
}
