//! Sample position to byte offset conversion for header-patch codecs.

use crate::{LoopError, Result};
use scdloop_format::mpeg::{find_first_frame, MpegFrameHeader};
use scdloop_format::{CodecId, ScdFile};

/// PS-ADPCM frame: 16 bytes per channel carrying 28 samples.
const PS_FRAME_BYTES: u64 = 16;
const PS_FRAME_SAMPLES: u64 = 28;

/// MS-ADPCM block header bytes per channel that carry no nibbles.
///
/// The real header is 7 bytes per channel: predictor (1), delta (2) and two
/// stored samples (2 + 2). The two stored samples count toward the block,
/// so `(align - 7c) * 2 / c + 2` samples per block equals
/// `(align - 6c) * 2 / c`, and the byte arithmetic below uses the 6.
const MS_HEADER_PER_CHANNEL: u64 = 6;
/// Offset of the block align field in the WAVEFORMATEX extradata.
const MS_BLOCK_ALIGN_OFFSET: usize = 0x0C;

/// How samples map onto bytes of the stream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    Pcm16 {
        channels: u64,
    },
    PsAdpcm {
        channels: u64,
    },
    MsAdpcm {
        channels: u64,
        block_align: u64,
    },
    /// Constant-bitrate MPEG. Frame `k` starts at
    /// `first_frame + floor(k * spf * bitrate / (8 * rate))`.
    Mpeg {
        first_frame: u64,
        samples_per_frame: u64,
        bitrate: u64,
        sample_rate: u64,
    },
}

impl SampleLayout {
    /// Derive the layout of a header-patch codec's stream.
    pub fn for_file(file: &ScdFile) -> Result<Self> {
        let meta = file.metadata();
        let channels = meta.channels as u64;

        match meta.codec {
            CodecId::Pcm16 => Ok(Self::Pcm16 { channels }),
            CodecId::PsAdpcm => Ok(Self::PsAdpcm { channels }),
            CodecId::MsAdpcm => {
                let block_align = file
                    .endian()
                    .read_u16(file.extradata(), MS_BLOCK_ALIGN_OFFSET)
                    .ok_or_else(|| {
                        LoopError::corrupt(format!(
                            "MS-ADPCM extradata of {} bytes has no block align",
                            meta.extradata_size
                        ))
                    })? as u64;
                if block_align <= MS_HEADER_PER_CHANNEL * channels
                    || Self::ms_samples_per_block(channels, block_align) == 0
                {
                    return Err(LoopError::corrupt(format!(
                        "MS-ADPCM block align {block_align} too small for {channels} channels"
                    )));
                }
                Ok(Self::MsAdpcm {
                    channels,
                    block_align,
                })
            }
            CodecId::Mpeg => {
                let (offset, frame) = find_first_frame(file.stream())
                    .ok_or_else(|| LoopError::corrupt("no MPEG frame header in stream data"))?;
                Ok(Self::mpeg(offset as u64, &frame))
            }
            other => Err(LoopError::unsupported_codec(
                other,
                "loop points are not stored as header byte offsets",
            )),
        }
    }

    fn mpeg(first_frame: u64, frame: &MpegFrameHeader) -> Self {
        Self::Mpeg {
            first_frame,
            samples_per_frame: frame.samples_per_frame() as u64,
            bitrate: frame.bitrate as u64,
            sample_rate: frame.sample_rate as u64,
        }
    }

    fn ms_samples_per_block(channels: u64, block_align: u64) -> u64 {
        (block_align - MS_HEADER_PER_CHANNEL * channels) * 2 / channels
    }

    /// Smallest step between positions that map to whole bytes.
    ///
    /// For MS-ADPCM with an odd channel count the step restarts at every
    /// block boundary, so use [`SampleLayout::is_aligned`] for the exact rule.
    pub fn granularity(&self) -> u64 {
        match *self {
            Self::Pcm16 { .. } => 1,
            Self::PsAdpcm { .. } => PS_FRAME_SAMPLES,
            Self::MsAdpcm { channels, .. } => {
                if channels % 2 == 0 {
                    1
                } else {
                    2
                }
            }
            Self::Mpeg {
                samples_per_frame, ..
            } => samples_per_frame,
        }
    }

    /// Whether `samples` maps to an exact byte offset.
    pub fn is_aligned(&self, samples: u64) -> bool {
        match *self {
            Self::Pcm16 { .. } => true,
            Self::PsAdpcm { .. } => samples % PS_FRAME_SAMPLES == 0,
            Self::MsAdpcm {
                channels,
                block_align,
            } => {
                let within = samples % Self::ms_samples_per_block(channels, block_align);
                within * channels % 2 == 0
            }
            Self::Mpeg {
                samples_per_frame, ..
            } => samples % samples_per_frame == 0,
        }
    }

    /// Byte offset into the stream data of an aligned sample position.
    pub fn samples_to_bytes(&self, samples: u64, codec: CodecId) -> Result<u64> {
        if !self.is_aligned(samples) {
            return Err(LoopError::Unaligned {
                position: samples,
                granularity: self.granularity(),
                codec,
            });
        }

        let bytes = match *self {
            Self::Pcm16 { channels } => samples as u128 * channels as u128 * 2,
            Self::PsAdpcm { channels } => {
                (samples / PS_FRAME_SAMPLES) as u128 * PS_FRAME_BYTES as u128 * channels as u128
            }
            Self::MsAdpcm {
                channels,
                block_align,
            } => {
                let per_block = Self::ms_samples_per_block(channels, block_align);
                let (blocks, within) = (samples / per_block, samples % per_block);
                let partial = if within > 0 {
                    MS_HEADER_PER_CHANNEL * channels + within * channels / 2
                } else {
                    0
                };
                blocks as u128 * block_align as u128 + partial as u128
            }
            Self::Mpeg {
                first_frame,
                samples_per_frame,
                bitrate,
                sample_rate,
            } => {
                let frame = (samples / samples_per_frame) as u128;
                let a = samples_per_frame as u128 * bitrate as u128;
                let b = 8 * sample_rate as u128;
                first_frame as u128 + frame * a / b
            }
        };

        u64::try_from(bytes)
            .map_err(|_| LoopError::overflow(format!("byte offset of sample {samples}")))
    }

    /// Sample position of a byte offset into the stream data.
    ///
    /// Exact inverse of [`SampleLayout::samples_to_bytes`] on aligned
    /// positions; other offsets round the way decoders count them.
    pub fn bytes_to_samples(&self, bytes: u64) -> u64 {
        match *self {
            Self::Pcm16 { channels } => bytes / (2 * channels),
            Self::PsAdpcm { channels } => bytes / (PS_FRAME_BYTES * channels) * PS_FRAME_SAMPLES,
            Self::MsAdpcm {
                channels,
                block_align,
            } => {
                let per_block = Self::ms_samples_per_block(channels, block_align);
                let header = MS_HEADER_PER_CHANNEL * channels;
                let rest = bytes % block_align;
                let partial = if rest > header {
                    (rest - header) * 2 / channels
                } else {
                    0
                };
                bytes / block_align * per_block + partial
            }
            Self::Mpeg {
                first_frame,
                samples_per_frame,
                bitrate,
                sample_rate,
            } => {
                let a = samples_per_frame as u128 * bitrate as u128;
                let b = 8 * sample_rate as u128;
                let offset = bytes.saturating_sub(first_frame) as u128;
                let frames = (offset * b).div_ceil(a);
                (frames * samples_per_frame as u128).min(u64::MAX as u128) as u64
            }
        }
    }

    /// Decoded length of a stream of `stream_size` bytes.
    pub fn total_samples(&self, stream_size: u64) -> u64 {
        match *self {
            Self::Mpeg {
                first_frame,
                samples_per_frame,
                bitrate,
                sample_rate,
            } => {
                let a = samples_per_frame as u128 * bitrate as u128;
                let b = 8 * sample_rate as u128;
                // Frames whose first byte lies inside the data, i.e. all
                // frames ending at or before `stream_size`.
                let offset = stream_size.saturating_sub(first_frame) as u128;
                let frames = ((offset + 1) * b).div_ceil(a) - 1;
                (frames * samples_per_frame as u128).min(u64::MAX as u128) as u64
            }
            _ => self.bytes_to_samples(stream_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scdloop_format::mpeg::MpegFrameHeader;

    fn assert_exact(layout: SampleLayout, total: u64) {
        let mut checked = 0;
        for samples in 0..=total {
            if !layout.is_aligned(samples) {
                assert!(layout.samples_to_bytes(samples, CodecId::Pcm16).is_err());
                continue;
            }
            let bytes = layout.samples_to_bytes(samples, CodecId::Pcm16).unwrap();
            assert_eq!(
                layout.bytes_to_samples(bytes),
                samples,
                "{layout:?}: {samples} -> {bytes}"
            );
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_pcm16() {
        let layout = SampleLayout::Pcm16 { channels: 2 };
        assert_eq!(layout.samples_to_bytes(1000, CodecId::Pcm16).unwrap(), 4000);
        assert_eq!(layout.total_samples(4 * 44_100), 44_100);
        assert_exact(layout, 5_000);
    }

    #[test]
    fn test_ps_adpcm() {
        let layout = SampleLayout::PsAdpcm { channels: 2 };
        assert_eq!(layout.granularity(), 28);
        assert_eq!(layout.samples_to_bytes(56, CodecId::PsAdpcm).unwrap(), 64);
        assert!(matches!(
            layout.samples_to_bytes(30, CodecId::PsAdpcm),
            Err(LoopError::Unaligned { granularity: 28, .. })
        ));
        assert_exact(layout, 10_000);
    }

    #[test]
    fn test_ms_adpcm_stereo() {
        let layout = SampleLayout::MsAdpcm {
            channels: 2,
            block_align: 0x800,
        };
        // (2048 - 12) * 2 / 2 = 2036 samples per block
        assert_eq!(layout.samples_to_bytes(2036, CodecId::MsAdpcm).unwrap(), 2048);
        assert_eq!(
            layout.samples_to_bytes(1000, CodecId::MsAdpcm).unwrap(),
            12 + 1000
        );
        assert_eq!(
            layout.samples_to_bytes(50_000, CodecId::MsAdpcm).unwrap(),
            24 * 2048 + 12 + (50_000 - 24 * 2036)
        );
        assert_exact(layout, 3 * 2036 + 7);
    }

    #[test]
    fn test_ms_adpcm_odd_channels() {
        let mono = SampleLayout::MsAdpcm {
            channels: 1,
            block_align: 0x100,
        };
        assert_eq!(mono.granularity(), 2);
        assert!(!mono.is_aligned(3));
        assert_exact(mono, 2_000);

        let three = SampleLayout::MsAdpcm {
            channels: 3,
            block_align: 0x201,
        };
        assert_exact(three, 2_000);
    }

    #[test]
    fn test_ms_adpcm_partial_block_header_only() {
        let layout = SampleLayout::MsAdpcm {
            channels: 2,
            block_align: 0x800,
        };
        // Offsets inside the block header decode no samples yet.
        assert_eq!(layout.bytes_to_samples(2048 + 5), 2036);
    }

    #[test]
    fn test_mpeg() {
        let frame = MpegFrameHeader::parse(&[0xFF, 0xFB, 0x90, 0x00]).unwrap();
        let layout = SampleLayout::mpeg(0, &frame);
        assert_eq!(layout.granularity(), 1152);
        // 1152 * 128000 / 352800 = 417.96 bytes per frame
        assert_eq!(layout.samples_to_bytes(1152 * 10, CodecId::Mpeg).unwrap(), 4179);
        assert_eq!(layout.bytes_to_samples(4179), 1152 * 10);
        assert_exact(layout, 1152 * 300);

        let shifted = SampleLayout::mpeg(32, &frame);
        assert_eq!(shifted.samples_to_bytes(0, CodecId::Mpeg).unwrap(), 32);
        assert_eq!(shifted.bytes_to_samples(32 + 4179), 1152 * 10);
    }

    #[test]
    fn test_mpeg_total_samples() {
        let frame = MpegFrameHeader::parse(&[0xFF, 0xFB, 0x90, 0x00]).unwrap();
        let layout = SampleLayout::mpeg(0, &frame);
        let size = layout.samples_to_bytes(1152 * 20, CodecId::Mpeg).unwrap();
        assert_eq!(size, 8359);
        assert_eq!(layout.total_samples(size), 1152 * 20);
        assert_eq!(layout.total_samples(size - 1), 1152 * 19);
    }
}
