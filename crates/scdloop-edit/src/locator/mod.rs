//! Locating where a container keeps its loop points.
//!
//! Header-patch codecs keep byte offsets in two fixed fields of the sound
//! entry. Vorbis keeps sample positions as tags in the comment header of the
//! embedded Ogg stream, which has to be found by walking pages inside the
//! sound entry's payload.

mod layout;

pub use layout::SampleLayout;

use crate::{LoopError, Result};
use scdloop_format::ogg::{read_pages, take_packets, OggPage, CAPTURE_PATTERN};
use scdloop_format::scd::entry;
use scdloop_format::vorbis::{
    check_header, VorbisComment, VorbisIdent, PACKET_SETUP, VORBIS_SUBHEADER_SIZE,
};
use scdloop_format::{CodecId, ScdFile, StreamMetadata};
use std::ops::Range;

const VORBIS_ENCRYPTION: usize = 0x02;
const VORBIS_SEEK_TABLE_SIZE: usize = 0x10;
const VORBIS_HEADER_SIZE: usize = 0x14;

/// Absolute offsets of the two header loop fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFields {
    pub start: usize,
    pub end: usize,
}

impl HeaderFields {
    pub fn of(meta: &StreamMetadata) -> Self {
        Self {
            start: meta.field(entry::LOOP_START),
            end: meta.field(entry::LOOP_END),
        }
    }
}

/// The sub-header SCD puts in front of Vorbis extradata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VorbisSubHeader {
    /// Absolute offset (start of the extradata).
    pub offset: usize,
    /// 0 when the payload is stored in the clear.
    pub encryption: u8,
    pub seek_table_size: u32,
    /// Bytes of Ogg header pages following the seek table.
    pub header_size: u32,
}

impl VorbisSubHeader {
    /// Read the sub-header, if the extradata is large enough to hold one.
    pub fn read(file: &ScdFile) -> Option<Self> {
        let extradata = file.extradata();
        if extradata.len() < VORBIS_SUBHEADER_SIZE {
            return None;
        }
        let endian = file.endian();
        Some(Self {
            offset: file.metadata().extradata_offset(),
            encryption: extradata[VORBIS_ENCRYPTION],
            seek_table_size: endian.read_u32(extradata, VORBIS_SEEK_TABLE_SIZE)?,
            header_size: endian.read_u32(extradata, VORBIS_HEADER_SIZE)?,
        })
    }

    /// Absolute offset of the header size field.
    pub fn header_size_field(&self) -> usize {
        self.offset + VORBIS_HEADER_SIZE
    }

    /// Where the Ogg header pages should start.
    pub fn pages_offset(&self) -> usize {
        self.offset + VORBIS_SUBHEADER_SIZE + self.seek_table_size as usize
    }
}

/// An audio page and the samples that finish on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// Absolute offset of the page.
    pub offset: usize,
    pub start_sample: u64,
    pub end_sample: u64,
}

/// Where the comment header of an embedded Vorbis stream lives.
#[derive(Debug, Clone)]
pub struct CommentLocation {
    pub sub_header: Option<VorbisSubHeader>,
    /// Every page of the stream, in order.
    pub pages: Vec<OggPage>,
    /// Indices into `pages` of the pages holding the comment and setup packets.
    pub header_pages: Range<usize>,
    pub ident: VorbisIdent,
    pub comment: VorbisComment,
    pub setup: Vec<u8>,
    pub serial: u32,
    /// Granule position of the last page that has one.
    pub total_samples: u64,
}

impl CommentLocation {
    /// Absolute byte range covered by the comment and setup pages.
    pub fn header_range(&self) -> Range<usize> {
        let first = &self.pages[self.header_pages.start];
        let last = &self.pages[self.header_pages.end - 1];
        first.offset..last.range().end
    }

    /// Sample spans of the audio pages.
    pub fn audio_spans(&self) -> Vec<PageSpan> {
        let mut spans = Vec::new();
        let mut previous = 0u64;
        for page in &self.pages[self.header_pages.end..] {
            let Some(granule) = page.granule_position() else {
                continue;
            };
            let end = granule.max(previous);
            spans.push(PageSpan {
                offset: page.offset,
                start_sample: previous,
                end_sample: end,
            });
            previous = end;
        }
        spans
    }

    /// Byte offset, relative to the stream data, of the audio page that
    /// holds `sample`. Positions at or past the end map to `stream_size`.
    pub fn stream_offset_of(&self, sample: u64, meta: &StreamMetadata) -> u64 {
        let stream_offset = meta.stream_offset();
        self.audio_spans()
            .iter()
            .find(|span| span.end_sample > sample)
            .map(|span| span.offset.saturating_sub(stream_offset) as u64)
            .unwrap_or(meta.stream_size as u64)
    }
}

fn find_stream_start(file: &ScdFile, sub_header: Option<&VorbisSubHeader>) -> Result<usize> {
    let data = file.data();
    let payload = file.metadata().payload_range();

    if let Some(expected) = sub_header.map(VorbisSubHeader::pages_offset) {
        if payload.contains(&expected) && data[expected..].starts_with(&CAPTURE_PATTERN) {
            return Ok(expected);
        }
        tracing::debug!(
            expected,
            "No Ogg page after Vorbis seek table, scanning payload"
        );
    }

    data[payload.clone()]
        .windows(CAPTURE_PATTERN.len())
        .position(|w| w == CAPTURE_PATTERN)
        .map(|pos| payload.start + pos)
        .ok_or_else(|| LoopError::corrupt("no Ogg page inside the sound entry payload"))
}

/// Walk the embedded Ogg stream and decode its Vorbis headers.
///
/// Only bytes inside the first sound entry's payload are examined. Every
/// page checksum is verified.
pub fn locate_comment(file: &ScdFile) -> Result<CommentLocation> {
    let meta = file.metadata();
    let data = file.data();

    let sub_header = VorbisSubHeader::read(file);
    if let Some(sub) = sub_header.filter(|sub| sub.encryption != 0) {
        return Err(LoopError::unsupported_codec(
            CodecId::Vorbis,
            format!("encrypted Vorbis payload (type {})", sub.encryption),
        ));
    }

    let start = find_stream_start(file, sub_header.as_ref())?;
    let pages = read_pages(data, start, meta.payload_range().end)?;
    let Some(first) = pages.first() else {
        return Err(LoopError::corrupt("empty Ogg stream"));
    };
    if !first.is_bos() {
        return Err(LoopError::corrupt("first Ogg page is not a stream start"));
    }

    let serial = first.serial;
    for page in &pages {
        page.verify(data)?;
        if page.serial != serial {
            return Err(LoopError::corrupt(format!(
                "page {} belongs to stream {:#x}, expected {serial:#x}",
                page.sequence, page.serial
            )));
        }
    }

    let packets = take_packets(data, &pages, 3)?;
    let [ident, comment, setup] = packets.as_slice() else {
        return Err(LoopError::corrupt("Ogg stream ends before the Vorbis headers"));
    };

    let ident_info = VorbisIdent::parse(&ident.data)?;
    if comment.first_page != ident.last_page + 1 {
        return Err(LoopError::corrupt(
            "Vorbis identification header does not end its page",
        ));
    }
    let decoded = VorbisComment::decode(&comment.data)?;
    check_header(&setup.data, PACKET_SETUP)?;

    let header_pages = comment.first_page..setup.last_page + 1;
    let packet_ends: usize = pages[header_pages.clone()]
        .iter()
        .map(|p| p.segments.iter().filter(|&&s| s < 255).count())
        .sum();
    let setup_ends_page = pages[setup.last_page]
        .segments
        .last()
        .is_some_and(|&s| s < 255);
    if packet_ends != 2 || !setup_ends_page {
        return Err(LoopError::corrupt(
            "Vorbis setup header shares its last page with audio data",
        ));
    }

    if ident_info.sample_rate != meta.sample_rate {
        tracing::warn!(
            container = meta.sample_rate,
            stream = ident_info.sample_rate,
            "Vorbis sample rate disagrees with the sound entry"
        );
    }

    let total_samples = pages
        .iter()
        .rev()
        .find_map(OggPage::granule_position)
        .unwrap_or(0);

    tracing::debug!(
        pages = pages.len(),
        header_pages = ?header_pages,
        comment_len = comment.data.len(),
        total_samples,
        "Located Vorbis comment header"
    );

    Ok(CommentLocation {
        sub_header,
        header_pages,
        ident: ident_info,
        comment: decoded,
        setup: setup.data.clone(),
        serial,
        total_samples,
        pages,
    })
}
