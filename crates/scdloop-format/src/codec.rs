//! Codec identification and loop persistence strategy.

use crate::{Error, Result};

/// Codec stored in an SCD sound entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecId {
    /// Signed 16-bit PCM in container byte order.
    Pcm16,
    /// PlayStation 4-bit ADPCM, 16-byte frames.
    PsAdpcm,
    /// Ogg Vorbis.
    Vorbis,
    /// MPEG audio (layer I/II/III).
    Mpeg,
    /// Microsoft ADPCM.
    MsAdpcm,
    /// Anything else, including the -1 dummy entry.
    Other(i32),
}

impl CodecId {
    pub const RAW_PCM16: i32 = 0x01;
    pub const RAW_PS_ADPCM: i32 = 0x03;
    pub const RAW_VORBIS: i32 = 0x06;
    pub const RAW_MPEG: i32 = 0x07;
    pub const RAW_MS_ADPCM: i32 = 0x0C;

    /// Map the raw codec field to a codec id.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            Self::RAW_PCM16 => Self::Pcm16,
            Self::RAW_PS_ADPCM => Self::PsAdpcm,
            Self::RAW_VORBIS => Self::Vorbis,
            Self::RAW_MPEG => Self::Mpeg,
            Self::RAW_MS_ADPCM => Self::MsAdpcm,
            other => Self::Other(other),
        }
    }

    /// The raw value stored in the sound entry.
    pub fn raw(&self) -> i32 {
        match self {
            Self::Pcm16 => Self::RAW_PCM16,
            Self::PsAdpcm => Self::RAW_PS_ADPCM,
            Self::Vorbis => Self::RAW_VORBIS,
            Self::Mpeg => Self::RAW_MPEG,
            Self::MsAdpcm => Self::RAW_MS_ADPCM,
            Self::Other(raw) => *raw,
        }
    }

    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pcm16 => "PCM16",
            Self::PsAdpcm => "PS-ADPCM",
            Self::Vorbis => "Vorbis",
            Self::Mpeg => "MPEG",
            Self::MsAdpcm => "MS-ADPCM",
            Self::Other(_) => "unknown",
        }
    }

    /// Whether this codec has a loop persistence strategy.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "unknown ({raw:#x})"),
            known => write!(f, "{} ({:#x})", known.name(), known.raw()),
        }
    }
}

/// How a codec family persists its loop points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecStrategy {
    /// Two fixed 32-bit byte-offset fields in the sound entry.
    HeaderPatch,
    /// Loop tags inside the comment packet of the embedded bitstream.
    EmbeddedComment,
}

impl CodecStrategy {
    /// Unit of the values this strategy persists.
    pub fn unit(&self) -> LoopUnit {
        match self {
            Self::HeaderPatch => LoopUnit::Bytes,
            Self::EmbeddedComment => LoopUnit::Samples,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderPatch => "header-patch",
            Self::EmbeddedComment => "embedded-comment",
        }
    }
}

impl std::fmt::Display for CodecStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit a loop position is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopUnit {
    /// Sample frames from stream start.
    Samples,
    /// Byte offsets into the stream data.
    Bytes,
}

/// Select the loop persistence strategy for a codec.
pub fn classify(codec: CodecId) -> Result<CodecStrategy> {
    match codec {
        CodecId::Pcm16 | CodecId::PsAdpcm | CodecId::MsAdpcm | CodecId::Mpeg => {
            Ok(CodecStrategy::HeaderPatch)
        }
        CodecId::Vorbis => Ok(CodecStrategy::EmbeddedComment),
        CodecId::Other(raw) => Err(Error::UnsupportedCodec(raw)),
    }
}
