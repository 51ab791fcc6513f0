//! MPEG audio frame header parsing.
//!
//! Only the first frame header matters here: it fixes the bitrate, sample
//! rate and samples per frame that turn loop byte offsets into sample
//! positions for constant-bitrate streams.

use crate::{Error, Result};

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// Decoded MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegFrameHeader {
    pub version: MpegVersion,
    /// Layer 1, 2 or 3.
    pub layer: u8,
    /// Bitrate in bits per second.
    pub bitrate: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    pub channels: u32,
    pub padding: bool,
}

const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];

const BITRATES_V2: [[u32; 15]; 2] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44_100, 48_000, 32_000],
    [22_050, 24_000, 16_000],
    [11_025, 12_000, 8_000],
];

impl MpegFrameHeader {
    /// Parse a 4-byte frame header.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::corrupt("MPEG frame header truncated"))?;

        if header[0] != 0xFF || header[1] & 0xE0 != 0xE0 {
            return Err(Error::corrupt("MPEG frame sync not found"));
        }

        let version = match (header[1] >> 3) & 0x03 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return Err(Error::corrupt("reserved MPEG version")),
        };

        let layer = match (header[1] >> 1) & 0x03 {
            0b01 => 3,
            0b10 => 2,
            0b11 => 1,
            _ => return Err(Error::corrupt("reserved MPEG layer")),
        };

        let bitrate_index = (header[2] >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return Err(Error::unsupported("free-format or invalid MPEG bitrate"));
        }
        let kbps = match version {
            MpegVersion::Mpeg1 => BITRATES_V1[layer as usize - 1][bitrate_index],
            _ => BITRATES_V2[if layer == 1 { 0 } else { 1 }][bitrate_index],
        };

        let rate_index = ((header[2] >> 2) & 0x03) as usize;
        if rate_index == 3 {
            return Err(Error::corrupt("reserved MPEG sample rate"));
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => SAMPLE_RATES[0][rate_index],
            MpegVersion::Mpeg2 => SAMPLE_RATES[1][rate_index],
            MpegVersion::Mpeg25 => SAMPLE_RATES[2][rate_index],
        };

        Ok(Self {
            version,
            layer,
            bitrate: kbps * 1000,
            sample_rate,
            channels: if header[3] >> 6 == 0b11 { 1 } else { 2 },
            padding: (header[2] >> 1) & 0x01 == 1,
        })
    }

    /// Samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (1, _) => 384,
            (2, _) => 1152,
            (_, MpegVersion::Mpeg1) => 1152,
            _ => 576,
        }
    }

    /// Frame length in bytes, including the padding slot.
    pub fn frame_len(&self) -> usize {
        let spf = self.samples_per_frame() as u64;
        let base = spf * self.bitrate as u64 / (8 * self.sample_rate as u64);
        let slot = if self.layer == 1 { 4 } else { 1 };
        let base = if self.layer == 1 { base / 4 * 4 } else { base };
        (base + if self.padding { slot } else { 0 }) as usize
    }
}

/// Find and parse the first frame header in a stream.
///
/// Accepts the first sync whose successor frame also syncs (or that ends
/// exactly at the end of the data), so stray 0xFF bytes are skipped.
pub fn find_first_frame(data: &[u8]) -> Option<(usize, MpegFrameHeader)> {
    let mut pos = 0;
    while pos + 4 <= data.len() {
        if data[pos] == 0xFF {
            if let Ok(header) = MpegFrameHeader::parse(&data[pos..]) {
                let next = pos + header.frame_len();
                if next == data.len()
                    || data.get(next..).is_some_and(|rest| MpegFrameHeader::parse(rest).is_ok())
                {
                    return Some((pos, header));
                }
            }
        }
        pos += 1;
    }
    None
}
