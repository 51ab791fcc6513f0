//! SCD header parsing with endianness resolution.

use super::{
    entry, tables, Endian, ScdHeader, StreamMetadata, TableHeader, ENDIAN_FLAG_OFFSET,
    EXTENDED_TABLES_SIZE, FILE_SIZE_OFFSET, HEADER_SIZE_OFFSET, SCD_MAGIC, SOUND_ENTRY_SIZE,
    SSCF_MAGIC, TABLES_SIZE,
};
use crate::codec::CodecId;
use crate::{Error, Result};

/// Sample rates outside this range are not audio.
const PLAUSIBLE_SAMPLE_RATES: std::ops::RangeInclusive<u32> = 4_000..=192_000;
const MAX_CHANNELS: u32 = 16;
/// Header sizes beyond this are never produced by encoders.
const MAX_HEADER_SIZE: u16 = 0x400;

pub(super) struct Parsed {
    pub endian: Endian,
    pub header: ScdHeader,
    pub tables: TableHeader,
    pub entry_offsets: Vec<u32>,
    pub metadata: StreamMetadata,
}

/// Outcome of reading the layout under one byte order.
enum Candidate {
    Plausible(Parsed),
    Implausible(String),
    Truncated(Error),
}

/// Parse an SCD image, resolving its byte order.
pub(super) fn parse(data: &[u8]) -> Result<Parsed> {
    if data.len() < 8 || data[0..4] != SCD_MAGIC || data[4..8] != SSCF_MAGIC {
        return Err(Error::invalid_format("missing SEDB/SSCF signature"));
    }

    let endian = resolve_endian(data)?;
    let parsed = match read_layout(data, endian) {
        Candidate::Plausible(parsed) => parsed,
        Candidate::Implausible(reason) => return Err(Error::invalid_format(reason)),
        Candidate::Truncated(err) => return Err(err),
    };

    check_declared_sizes(data, &parsed)?;

    tracing::debug!(
        endian = %parsed.endian,
        codec = %parsed.metadata.codec,
        channels = parsed.metadata.channels,
        sample_rate = parsed.metadata.sample_rate,
        entry_offset = parsed.metadata.entry_offset,
        "Parsed SCD container"
    );

    Ok(parsed)
}

/// Work out which byte order yields a self-consistent header.
///
/// Both interpretations are tried. A candidate is plausible when its offsets
/// land inside the file and the first sound entry has an audible sample rate
/// and a sane channel count. When both are plausible the flag byte decides.
pub fn resolve_endian(data: &[u8]) -> Result<Endian> {
    let hinted = Endian::from_flag(data.get(ENDIAN_FLAG_OFFSET).copied().unwrap_or(0));

    let first = read_layout(data, hinted);
    let second = read_layout(data, hinted.swapped());

    match (first, second) {
        (Candidate::Plausible(_), Candidate::Plausible(_)) => {
            tracing::debug!(endian = %hinted, "Both byte orders plausible, using flag byte");
            Ok(hinted)
        }
        (Candidate::Plausible(_), _) => Ok(hinted),
        (_, Candidate::Plausible(_)) => {
            tracing::warn!(
                flag = %hinted,
                resolved = %hinted.swapped(),
                "Endian flag disagrees with header contents"
            );
            Ok(hinted.swapped())
        }
        (Candidate::Truncated(err), _) | (_, Candidate::Truncated(err)) => Err(err),
        (Candidate::Implausible(a), Candidate::Implausible(b)) => Err(Error::invalid_format(
            format!("no self-consistent byte order ({hinted}: {a}; {}: {b})", hinted.swapped()),
        )),
    }
}

fn read_layout(data: &[u8], endian: Endian) -> Candidate {
    let have = data.len() as u64;

    let header_size = match endian.read_u16(data, HEADER_SIZE_OFFSET) {
        Some(size) => size,
        None => {
            return Candidate::Truncated(Error::truncated("header", 0x10, have));
        }
    };
    if !(FILE_SIZE_OFFSET as u16 + 4..=MAX_HEADER_SIZE).contains(&header_size) {
        return Candidate::Implausible(format!("header size {header_size:#x}"));
    }

    let tables_offset = header_size as usize;
    let tables_end = tables_offset + TABLES_SIZE;
    if tables_end > data.len() {
        return Candidate::Truncated(Error::truncated("tables block", tables_end as u64, have));
    }

    // Bounds were checked above, so these reads cannot miss.
    let read16 = |off: usize| endian.read_u16(data, off).unwrap_or(0);
    let read32 = |off: usize| endian.read_u32(data, off).unwrap_or(0);

    let header = ScdHeader {
        version: read32(0x08),
        endian_flag: data[ENDIAN_FLAG_OFFSET],
        sscf_version: data[0x0D],
        header_size,
        file_size: read32(FILE_SIZE_OFFSET),
    };

    let mut table_header = TableHeader {
        offset: tables_offset,
        table0_count: read16(tables_offset + tables::TABLE0_COUNT),
        table1_count: read16(tables_offset + tables::TABLE1_COUNT),
        sound_count: read16(tables_offset + tables::SOUND_COUNT),
        table0_offset: read32(tables_offset + tables::TABLE0_OFFSET),
        sound_table_offset: read32(tables_offset + tables::SOUND_TABLE_OFFSET),
        table1_offset: 0,
        aux_table_offset: 0,
    };

    if table_header.sound_count == 0 {
        return Candidate::Implausible("no sound entries".to_string());
    }

    let sound_table = table_header.sound_table_offset as u64;
    let sound_table_end = sound_table + 4 * table_header.sound_count as u64;
    if sound_table < tables_end as u64 {
        return Candidate::Implausible(format!("sound table at {sound_table:#x} overlaps header"));
    }
    if sound_table_end > have {
        return Candidate::Truncated(Error::truncated("sound table", sound_table_end, have));
    }

    let entry_offsets: Vec<u32> = (0..table_header.sound_count as usize)
        .map(|i| read32(sound_table as usize + i * 4))
        .collect();

    let entry_offset = entry_offsets[0];
    if (entry_offset as usize) < tables_end {
        return Candidate::Implausible(format!("sound entry at {entry_offset:#x} overlaps header"));
    }
    // The extended pointers only exist when nothing else starts inside them.
    let extended_end = tables_offset + EXTENDED_TABLES_SIZE;
    let first_data = [
        entry_offset,
        table_header.sound_table_offset,
        table_header.table0_offset,
    ]
    .into_iter()
    .filter(|&offset| offset != 0)
    .min()
    .unwrap_or(entry_offset);
    if extended_end <= first_data as usize {
        table_header.table1_offset = read32(tables_offset + tables::TABLE1_OFFSET);
        table_header.aux_table_offset = read32(tables_offset + tables::AUX_TABLE_OFFSET);
    }

    let entry_end = entry_offset as u64 + SOUND_ENTRY_SIZE as u64;
    if entry_end > have {
        return Candidate::Truncated(Error::truncated("sound entry", entry_end, have));
    }

    let base = entry_offset as usize;
    let metadata = StreamMetadata {
        codec: CodecId::from_raw(read32(base + entry::CODEC) as i32),
        channels: read32(base + entry::CHANNELS),
        sample_rate: read32(base + entry::SAMPLE_RATE),
        entry_offset,
        stream_size: read32(base + entry::STREAM_SIZE),
        extradata_size: read32(base + entry::EXTRADATA_SIZE),
        aux_count: read32(base + entry::AUX_COUNT),
        loop_start_bytes: read32(base + entry::LOOP_START),
        loop_end_bytes: read32(base + entry::LOOP_END),
    };

    if metadata.channels == 0 || metadata.channels > MAX_CHANNELS {
        return Candidate::Implausible(format!("{} channels", metadata.channels));
    }
    if !PLAUSIBLE_SAMPLE_RATES.contains(&metadata.sample_rate) {
        return Candidate::Implausible(format!("sample rate {} Hz", metadata.sample_rate));
    }

    Candidate::Plausible(Parsed {
        endian,
        header,
        tables: table_header,
        entry_offsets,
        metadata,
    })
}

fn check_declared_sizes(data: &[u8], parsed: &Parsed) -> Result<()> {
    let have = data.len() as u64;

    let declared = parsed.header.file_size as u64;
    if declared > have {
        return Err(Error::truncated("file", declared, have));
    }

    let meta = &parsed.metadata;
    let payload_end = meta.extradata_offset() as u64
        + meta.extradata_size as u64
        + meta.stream_size as u64;
    if payload_end > have {
        return Err(Error::truncated("stream data", payload_end, have));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scd::ScdBuilder;

    fn pcm_container(endian: Endian) -> Vec<u8> {
        ScdBuilder::new(CodecId::Pcm16, 2, 44_100)
            .endian(endian)
            .stream(vec![0u8; 4 * 1000])
            .build()
            .unwrap()
    }

    #[test]
    fn test_rejects_missing_magic() {
        let mut data = pcm_container(Endian::Little);
        data[0] = b'X';
        assert!(matches!(parse(&data), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_resolves_both_byte_orders() {
        let le = parse(&pcm_container(Endian::Little)).unwrap();
        let be = parse(&pcm_container(Endian::Big)).unwrap();

        assert_eq!(le.endian, Endian::Little);
        assert_eq!(be.endian, Endian::Big);
        assert_eq!(le.metadata, be.metadata);
    }

    #[test]
    fn test_wrong_flag_resolved_by_plausibility() {
        let mut data = pcm_container(Endian::Big);
        data[ENDIAN_FLAG_OFFSET] = Endian::Little.flag();

        let parsed = parse(&data).unwrap();
        assert_eq!(parsed.endian, Endian::Big);
        assert_eq!(parsed.metadata.sample_rate, 44_100);
    }

    #[test]
    fn test_truncated_stream_data() {
        let mut data = pcm_container(Endian::Little);
        data.truncate(data.len() - 100);
        assert!(matches!(parse(&data), Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_truncated_before_entry() {
        let data = pcm_container(Endian::Little);
        let cut = &data[..0x48];
        assert!(matches!(parse(cut), Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_extended_table_pointers() {
        let short = parse(&pcm_container(Endian::Little)).unwrap();
        assert_eq!((short.tables.table1_offset, short.tables.aux_table_offset), (0, 0));

        let mut data = ScdBuilder::new(CodecId::Pcm16, 2, 44_100)
            .endian(Endian::Big)
            .entry_offset(0x60)
            .stream(vec![0u8; 64])
            .build()
            .unwrap();
        let tables = 0x30;
        data[tables + tables::TABLE1_OFFSET..tables + tables::TABLE1_OFFSET + 4]
            .copy_from_slice(&Endian::Big.u32_bytes(0x50));
        data[tables + tables::AUX_TABLE_OFFSET..tables + tables::AUX_TABLE_OFFSET + 4]
            .copy_from_slice(&Endian::Big.u32_bytes(0x58));

        let parsed = parse(&data).unwrap();
        assert_eq!(parsed.tables.table1_offset, 0x50);
        assert_eq!(parsed.tables.aux_table_offset, 0x58);
    }

    #[test]
    fn test_implausible_sample_rate() {
        let data = ScdBuilder::new(CodecId::Pcm16, 2, 1_000)
            .stream(vec![0u8; 64])
            .build()
            .unwrap();
        assert!(matches!(parse(&data), Err(Error::InvalidFormat(_))));
    }
}
