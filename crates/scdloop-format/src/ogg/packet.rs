//! Packet reassembly from parsed pages.

use super::OggPage;
use crate::{Error, Result};

/// A reassembled packet and the pages it was spread over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
    /// Index (into the page slice) of the page where the packet starts.
    pub first_page: usize,
    /// Index of the page where the packet ends.
    pub last_page: usize,
}

/// Reassemble every complete packet carried by `pages`.
pub fn collect_packets(data: &[u8], pages: &[OggPage]) -> Result<Vec<Packet>> {
    take_packets(data, pages, usize::MAX)
}

/// Reassemble at most `limit` packets from the start of `pages`.
///
/// The first page must begin a packet. A page that continues a packet must
/// follow one that left a packet open, and vice versa.
pub fn take_packets(data: &[u8], pages: &[OggPage], limit: usize) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    let mut pending: Option<(usize, Vec<u8>)> = None;

    for (index, page) in pages.iter().enumerate() {
        match (&pending, page.is_continued()) {
            (None, true) => {
                return Err(Error::corrupt(format!(
                    "page {} continues a packet that never started",
                    page.sequence
                )))
            }
            (Some(_), false) => {
                return Err(Error::corrupt(format!(
                    "page {} starts fresh while a packet is still open",
                    page.sequence
                )))
            }
            _ => {}
        }

        let mut pos = page.body_range().start;
        for &lacing in &page.segments {
            let len = lacing as usize;
            let (_, buf) = pending.get_or_insert_with(|| (index, Vec::new()));
            buf.extend_from_slice(&data[pos..pos + len]);
            pos += len;

            if lacing < 255 {
                if let Some((first_page, bytes)) = pending.take() {
                    packets.push(Packet {
                        data: bytes,
                        first_page,
                        last_page: index,
                    });
                }
                if packets.len() == limit {
                    return Ok(packets);
                }
            }
        }
    }

    if let Some((first_page, buf)) = pending {
        tracing::debug!(
            first_page,
            partial_len = buf.len(),
            "Ogg stream ends inside a packet"
        );
    }

    Ok(packets)
}
