//! Vorbis header packets.
//!
//! Every Vorbis header packet starts with a type byte followed by the six
//! ASCII bytes `vorbis`. Type 1 is identification, 3 is comment, 5 is setup.

mod comment;

pub use comment::{VorbisComment, LOOP_END, LOOP_LENGTH, LOOP_START};

use crate::{Error, Result};

/// Signature following the packet type byte.
pub const SIGNATURE: [u8; 6] = *b"vorbis";

pub const PACKET_IDENT: u8 = 0x01;
pub const PACKET_COMMENT: u8 = 0x03;
pub const PACKET_SETUP: u8 = 0x05;

/// Size of the sub-header SCD puts in front of Vorbis extradata.
pub const VORBIS_SUBHEADER_SIZE: usize = 0x20;

/// Check that `packet` is a Vorbis header of the given type.
pub fn check_header(packet: &[u8], packet_type: u8) -> Result<()> {
    if packet.len() < 7 || packet[0] != packet_type || packet[1..7] != SIGNATURE {
        return Err(Error::corrupt(format!(
            "expected Vorbis header packet type {packet_type}"
        )));
    }
    Ok(())
}

/// Decoded identification header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VorbisIdent {
    pub version: u32,
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_nominal: i32,
}

impl VorbisIdent {
    /// Parse an identification packet.
    pub fn parse(packet: &[u8]) -> Result<Self> {
        check_header(packet, PACKET_IDENT)?;
        if packet.len() < 30 {
            return Err(Error::corrupt("Vorbis identification header truncated"));
        }
        let le32 = |at: usize| {
            u32::from_le_bytes([packet[at], packet[at + 1], packet[at + 2], packet[at + 3]])
        };

        let ident = Self {
            version: le32(7),
            channels: packet[11],
            sample_rate: le32(12),
            bitrate_nominal: le32(20) as i32,
        };
        if ident.version != 0 || ident.channels == 0 || ident.sample_rate == 0 {
            return Err(Error::corrupt(format!(
                "invalid Vorbis identification: version {}, {} channels, {} Hz",
                ident.version, ident.channels, ident.sample_rate
            )));
        }
        Ok(ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident_packet(channels: u8, rate: u32) -> Vec<u8> {
        let mut p = vec![PACKET_IDENT];
        p.extend_from_slice(&SIGNATURE);
        p.extend_from_slice(&0u32.to_le_bytes());
        p.push(channels);
        p.extend_from_slice(&rate.to_le_bytes());
        p.extend_from_slice(&0i32.to_le_bytes());
        p.extend_from_slice(&128_000i32.to_le_bytes());
        p.extend_from_slice(&0i32.to_le_bytes());
        p.push(0xB8);
        p.push(0x01);
        p
    }

    #[test]
    fn test_parse_ident() {
        let ident = VorbisIdent::parse(&ident_packet(2, 44_100)).unwrap();
        assert_eq!(ident.channels, 2);
        assert_eq!(ident.sample_rate, 44_100);
        assert_eq!(ident.bitrate_nominal, 128_000);
    }

    #[test]
    fn test_wrong_packet_type() {
        let mut packet = ident_packet(2, 44_100);
        packet[0] = PACKET_COMMENT;
        assert!(matches!(
            VorbisIdent::parse(&packet),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(VorbisIdent::parse(&ident_packet(2, 0)).is_err());
    }
}
