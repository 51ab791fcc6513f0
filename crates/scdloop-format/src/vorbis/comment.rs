//! Vorbis comment header codec.
//!
//! ```text
//! u8   0x03, "vorbis"
//! u32  vendor length, vendor bytes
//! u32  comment count
//!      repeated: u32 length, "KEY=value" bytes
//! u8   framing bit (must be set)
//! ```

use super::{check_header, PACKET_COMMENT, SIGNATURE};
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

pub const LOOP_START: &str = "LOOPSTART";
pub const LOOP_END: &str = "LOOPEND";
pub const LOOP_LENGTH: &str = "LOOPLENGTH";

/// A decoded comment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VorbisComment {
    pub vendor: Vec<u8>,
    /// Raw `KEY=value` entries in stored order.
    pub fields: Vec<Vec<u8>>,
    /// Bytes stored after the framing bit, kept verbatim.
    pub trailing: Vec<u8>,
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "Vorbis comment {what} at {} overruns the packet ({len} bytes)",
                    self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn key_of(field: &[u8]) -> &[u8] {
    match field.iter().position(|&b| b == b'=') {
        Some(eq) => &field[..eq],
        None => field,
    }
}

fn u32_len(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::overflow(format!("Vorbis comment {what} of {len} bytes")))
}

impl VorbisComment {
    /// An empty comment header with the given vendor string.
    pub fn new(vendor: impl Into<Vec<u8>>) -> Self {
        Self {
            vendor: vendor.into(),
            fields: Vec::new(),
            trailing: Vec::new(),
        }
    }

    /// Decode a comment packet.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        check_header(packet, PACKET_COMMENT)?;
        let mut cursor = Cursor {
            data: packet,
            pos: 7,
        };

        let vendor_len = cursor.u32("vendor length")? as usize;
        let vendor = cursor.take(vendor_len, "vendor")?.to_vec();

        let count = cursor.u32("field count")? as usize;
        // Each field needs at least its length prefix.
        if count > (packet.len() - cursor.pos) / 4 {
            return Err(Error::corrupt(format!(
                "Vorbis comment claims {count} fields in a {}-byte packet",
                packet.len()
            )));
        }

        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let len = cursor.u32("field length")? as usize;
            fields.push(cursor.take(len, "field")?.to_vec());
        }

        let framing = cursor.take(1, "framing bit")?[0];
        if framing & 0x01 == 0 {
            return Err(Error::corrupt("Vorbis comment framing bit not set"));
        }

        Ok(Self {
            vendor,
            fields,
            trailing: packet[cursor.pos..].to_vec(),
        })
    }

    /// Encode back into a packet.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body: usize = self.fields.iter().map(|f| 4 + f.len()).sum();
        let mut buf =
            BytesMut::with_capacity(7 + 4 + self.vendor.len() + 4 + body + 1 + self.trailing.len());

        buf.put_u8(PACKET_COMMENT);
        buf.put_slice(&SIGNATURE);
        buf.put_u32_le(u32_len(self.vendor.len(), "vendor")?);
        buf.put_slice(&self.vendor);
        buf.put_u32_le(u32_len(self.fields.len(), "field count")?);
        for field in &self.fields {
            buf.put_u32_le(u32_len(field.len(), "field")?);
            buf.put_slice(field);
        }
        buf.put_u8(0x01);
        buf.put_slice(&self.trailing);

        Ok(buf.to_vec())
    }

    /// Value of the first field whose key matches, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find_map(|f| {
                let name = key_of(f);
                (name.eq_ignore_ascii_case(key.as_bytes()) && name.len() < f.len())
                    .then(|| &f[name.len() + 1..])
            })
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    /// Remove every field whose key matches. Returns how many were removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.fields.len();
        self.fields
            .retain(|f| !key_of(f).eq_ignore_ascii_case(key.as_bytes()));
        before - self.fields.len()
    }

    /// Append a `KEY=value` field.
    pub fn push(&mut self, key: &str, value: impl std::fmt::Display) {
        self.fields.push(format!("{key}={value}").into_bytes());
    }

    /// Loop positions in samples, if both ends are tagged.
    ///
    /// `LOOPEND` wins over `LOOPLENGTH` when both are present.
    pub fn loop_points(&self) -> Option<(u64, u64)> {
        let number = |key: &str| {
            let raw = self.get(key)?;
            match raw.trim().parse::<u64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key, value = raw, "Ignoring non-numeric loop tag");
                    None
                }
            }
        };

        let start = number(LOOP_START)?;
        let end = number(LOOP_END).or_else(|| number(LOOP_LENGTH)?.checked_add(start))?;
        Some((start, end))
    }

    /// Drop all loop tags. Returns whether anything was removed.
    pub fn clear_loop(&mut self) -> bool {
        let removed = self.remove(LOOP_START) + self.remove(LOOP_END) + self.remove(LOOP_LENGTH);
        removed > 0
    }

    /// Replace any loop tags with `LOOPSTART`/`LOOPEND`.
    pub fn set_loop(&mut self, start: u64, end: u64) {
        self.clear_loop();
        self.push(LOOP_START, start);
        self.push(LOOP_END, end);
    }
}
