//! Ogg page parsing and checksums.

use super::{
    CAPTURE_PATTERN, CHECKSUM_OFFSET, FLAG_BOS, FLAG_CONTINUED, FLAG_EOS, NO_GRANULE,
    PAGE_HEADER_SIZE, SEQUENCE_OFFSET,
};
use crate::{Error, Result};
use crc::{Algorithm, Crc};
use std::ops::Range;

/// CRC-32 as used by Ogg: polynomial 0x04C11DB7, no reflection, zero init.
const OGG_CRC_ALGORITHM: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0x04c1_1db7,
    init: 0,
    refin: false,
    refout: false,
    xorout: 0,
    check: 0x89a1_897f,
    residue: 0,
};

static OGG_CRC: Crc<u32> = Crc::<u32>::new(&OGG_CRC_ALGORITHM);

/// Compute the checksum of a serialized page, treating the CRC field as zero.
pub fn checksum(page: &[u8]) -> u32 {
    let mut digest = OGG_CRC.digest();
    if page.len() < CHECKSUM_OFFSET + 4 {
        digest.update(page);
        return digest.finalize();
    }
    digest.update(&page[..CHECKSUM_OFFSET]);
    digest.update(&[0u8; 4]);
    digest.update(&page[CHECKSUM_OFFSET + 4..]);
    digest.finalize()
}

/// A parsed Ogg page located inside a larger buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    /// Absolute offset of the capture pattern.
    pub offset: usize,
    pub header_type: u8,
    pub granule: u64,
    pub serial: u32,
    pub sequence: u32,
    pub checksum: u32,
    /// Lacing values.
    pub segments: Vec<u8>,
}

impl OggPage {
    /// Parse the page starting at `offset`, never reading at or past `limit`.
    pub fn parse(data: &[u8], offset: usize, limit: usize) -> Result<Self> {
        let limit = limit.min(data.len());
        let fixed_end = offset + PAGE_HEADER_SIZE;
        if fixed_end > limit {
            return Err(Error::corrupt(format!(
                "page header at {offset:#x} runs past the payload"
            )));
        }

        let header = &data[offset..fixed_end];
        if header[..4] != CAPTURE_PATTERN {
            return Err(Error::corrupt(format!(
                "missing Ogg capture pattern at {offset:#x}"
            )));
        }
        if header[4] != 0 {
            return Err(Error::corrupt(format!(
                "unknown Ogg stream structure version {} at {offset:#x}",
                header[4]
            )));
        }

        let segment_count = header[26] as usize;
        let table_end = fixed_end + segment_count;
        if table_end > limit {
            return Err(Error::corrupt(format!(
                "segment table at {offset:#x} runs past the payload"
            )));
        }

        let le32 = |at: usize| {
            u32::from_le_bytes([header[at], header[at + 1], header[at + 2], header[at + 3]])
        };
        let page = Self {
            offset,
            header_type: header[5],
            granule: u64::from_le_bytes([
                header[6], header[7], header[8], header[9], header[10], header[11], header[12],
                header[13],
            ]),
            serial: le32(0x0E),
            sequence: le32(SEQUENCE_OFFSET),
            checksum: le32(CHECKSUM_OFFSET),
            segments: data[fixed_end..table_end].to_vec(),
        };

        if offset + page.len() > limit {
            return Err(Error::corrupt(format!(
                "page body at {offset:#x} runs past the payload"
            )));
        }

        Ok(page)
    }

    /// Header length including the segment table.
    pub fn header_len(&self) -> usize {
        PAGE_HEADER_SIZE + self.segments.len()
    }

    /// Body length (sum of lacing values).
    pub fn body_len(&self) -> usize {
        self.segments.iter().map(|&s| s as usize).sum()
    }

    /// Total serialized length.
    pub fn len(&self) -> usize {
        self.header_len() + self.body_len()
    }

    /// Absolute byte range of the whole page.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }

    /// Absolute byte range of the body.
    pub fn body_range(&self) -> Range<usize> {
        self.offset + self.header_len()..self.offset + self.len()
    }

    pub fn is_continued(&self) -> bool {
        self.header_type & FLAG_CONTINUED != 0
    }

    pub fn is_bos(&self) -> bool {
        self.header_type & FLAG_BOS != 0
    }

    pub fn is_eos(&self) -> bool {
        self.header_type & FLAG_EOS != 0
    }

    /// Whether any packet finishes on this page.
    pub fn has_packet_end(&self) -> bool {
        self.segments.iter().any(|&s| s < 255)
    }

    /// Granule position, or `None` for the "no packet ends here" marker.
    pub fn granule_position(&self) -> Option<u64> {
        (self.granule != NO_GRANULE).then_some(self.granule)
    }

    /// Recompute the checksum from the bytes in `data` and compare.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let actual = checksum(&data[self.range()]);
        if actual != self.checksum {
            return Err(Error::corrupt(format!(
                "page {} at {:#x}: checksum {:#010x} != stored {:#010x}",
                self.sequence, self.offset, actual, self.checksum
            )));
        }
        Ok(())
    }
}

/// Read consecutive pages in `start..end`.
///
/// Stops quietly at the first position that does not hold a capture
/// pattern (trailing padding); a page whose header or body is cut off by
/// `end` is an error.
pub fn read_pages(data: &[u8], start: usize, end: usize) -> Result<Vec<OggPage>> {
    let end = end.min(data.len());
    let mut pages = Vec::new();
    let mut pos = start;

    while pos + 4 <= end && data[pos..pos + 4] == CAPTURE_PATTERN {
        let page = OggPage::parse(data, pos, end)?;
        pos += page.len();
        pages.push(page);
    }

    if pos < end && data[pos..end].iter().any(|&b| b != 0) {
        tracing::debug!(
            offset = pos,
            trailing = end - pos,
            "Non-page bytes after embedded Ogg stream"
        );
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogg::{paginate, PageParams};

    #[test]
    fn test_crc_check_value() {
        let mut digest = OGG_CRC.digest();
        digest.update(b"123456789");
        assert_eq!(digest.finalize(), 0x89a1_897f);
    }

    fn header_page() -> Vec<u8> {
        let params = PageParams {
            serial: 0x1234,
            first_sequence: 0,
            first_flags: FLAG_BOS,
            granule: 0,
        };
        let pages = paginate(&[&[7u8; 30][..], &[9u8; 600][..]], &params).unwrap();
        pages.concat()
    }

    #[test]
    fn test_read_pages_and_verify() {
        let mut data = vec![0u8; 5];
        data.extend(header_page());
        data.extend([0u8; 8]);

        let pages = read_pages(&data, 5, data.len()).unwrap();
        assert_eq!(pages.len(), 1);
        let page = &pages[0];
        assert!(page.is_bos());
        assert_eq!(page.serial, 0x1234);
        assert_eq!(page.body_len(), 630);
        page.verify(&data).unwrap();
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut data = header_page();
        let pages = read_pages(&data, 0, data.len()).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(pages[0].verify(&data).is_err());
    }

    #[test]
    fn test_page_cut_by_limit() {
        let data = header_page();
        let err = read_pages(&data, 0, data.len() - 1).unwrap_err();
        assert!(matches!(err, Error::CorruptStream(_)));
    }
}
