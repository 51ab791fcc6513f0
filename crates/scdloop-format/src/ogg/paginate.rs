//! Laying packets out on Ogg pages.

use super::{
    checksum, CAPTURE_PATTERN, CHECKSUM_OFFSET, FLAG_CONTINUED, MAX_SEGMENTS, NO_GRANULE,
    SEQUENCE_OFFSET,
};
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Stream parameters for freshly built pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub serial: u32,
    /// Sequence number of the first page produced.
    pub first_sequence: u32,
    /// Extra header flags for the first page (e.g. beginning of stream).
    pub first_flags: u8,
    /// Granule position of pages on which a packet ends.
    pub granule: u64,
}

struct Segment<'a> {
    data: &'a [u8],
    starts_packet: bool,
    ends_packet: bool,
}

fn lace<'a>(packets: &[&'a [u8]]) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    for packet in packets {
        let full = packet.len() / 255;
        for i in 0..full {
            segments.push(Segment {
                data: &packet[i * 255..(i + 1) * 255],
                starts_packet: i == 0,
                ends_packet: false,
            });
        }
        // A packet always ends with a lacing value below 255, possibly 0.
        segments.push(Segment {
            data: &packet[full * 255..],
            starts_packet: full == 0,
            ends_packet: true,
        });
    }
    segments
}

/// Lay packets out on consecutive pages, starting a fresh page.
///
/// Pages are filled up to 255 lacing values, so a packet longer than one
/// page continues on the next page with the continuation flag set. Pages on
/// which no packet finishes carry the "no granule" marker.
pub fn paginate(packets: &[&[u8]], params: &PageParams) -> Result<Vec<Vec<u8>>> {
    let segments = lace(packets);
    let mut pages = Vec::with_capacity(segments.len() / MAX_SEGMENTS + 1);
    let mut sequence = params.first_sequence;

    for (index, chunk) in segments.chunks(MAX_SEGMENTS).enumerate() {
        let mut header_type = if chunk[0].starts_packet { 0 } else { FLAG_CONTINUED };
        if index == 0 {
            header_type |= params.first_flags;
        }
        let granule = if chunk.iter().any(|s| s.ends_packet) {
            params.granule
        } else {
            NO_GRANULE
        };

        pages.push(encode_page(header_type, granule, params.serial, sequence, chunk));
        sequence = sequence
            .checked_add(1)
            .ok_or_else(|| Error::overflow("Ogg page sequence number"))?;
    }

    Ok(pages)
}

fn encode_page(
    header_type: u8,
    granule: u64,
    serial: u32,
    sequence: u32,
    segments: &[Segment<'_>],
) -> Vec<u8> {
    let body_len: usize = segments.iter().map(|s| s.data.len()).sum();
    let mut buf = BytesMut::with_capacity(27 + segments.len() + body_len);

    buf.put_slice(&CAPTURE_PATTERN);
    buf.put_u8(0);
    buf.put_u8(header_type);
    buf.put_u64_le(granule);
    buf.put_u32_le(serial);
    buf.put_u32_le(sequence);
    buf.put_u32_le(0); // checksum placeholder
    buf.put_u8(segments.len() as u8);
    for segment in segments {
        buf.put_u8(segment.data.len() as u8);
    }
    for segment in segments {
        buf.put_slice(segment.data);
    }

    let crc = checksum(&buf);
    buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
    buf.to_vec()
}

/// Renumber a serialized page in place and refresh its checksum.
pub fn set_sequence(page: &mut [u8], sequence: u32) {
    page[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 4].copy_from_slice(&sequence.to_le_bytes());
    let crc = checksum(page);
    page[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogg::{collect_packets, read_pages};

    const PARAMS: PageParams = PageParams {
        serial: 7,
        first_sequence: 1,
        first_flags: 0,
        granule: 0,
    };

    #[test]
    fn test_packet_of_exact_multiple_gets_zero_terminator() {
        let packet = vec![1u8; 510];
        let pages = paginate(&[&packet], &PARAMS).unwrap();
        let data = pages.concat();
        let parsed = read_pages(&data, 0, data.len()).unwrap();
        assert_eq!(parsed[0].segments, vec![255, 255, 0]);
    }

    #[test]
    fn test_large_packet_spans_continuation_pages() {
        let packet: Vec<u8> = (0..70_000u32).map(|i| i as u8).collect();
        let setup = vec![5u8; 100];
        let pages = paginate(&[&packet, &setup], &PARAMS).unwrap();
        assert_eq!(pages.len(), 2);

        let data = pages.concat();
        let parsed = read_pages(&data, 0, data.len()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].segments.len(), 255);
        assert!(!parsed[0].is_continued());
        assert_eq!(parsed[0].granule, NO_GRANULE);
        assert!(parsed[1].is_continued());
        assert_eq!(parsed[1].granule, 0);
        assert_eq!(parsed[1].sequence, 2);
        for page in &parsed {
            page.verify(&data).unwrap();
        }

        let packets = collect_packets(&data, &parsed).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data, packet);
        assert_eq!(packets[1].data, setup);
    }

    #[test]
    fn test_sequence_overflow() {
        let params = PageParams {
            first_sequence: u32::MAX,
            ..PARAMS
        };
        let big = vec![0u8; 255 * 255 + 10];
        assert!(matches!(
            paginate(&[&big], &params),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_set_sequence_keeps_checksum_valid() {
        let mut page = paginate(&[&[3u8; 40][..]], &PARAMS).unwrap().remove(0);
        set_sequence(&mut page, 42);
        let parsed = read_pages(&page, 0, page.len()).unwrap();
        assert_eq!(parsed[0].sequence, 42);
        parsed[0].verify(&page).unwrap();
    }
}
