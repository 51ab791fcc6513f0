//! Fixture builders for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream crates that need realistic SCD files on disk.

use crate::codec::CodecId;
use crate::mpeg::MpegFrameHeader;
use crate::ogg::{paginate, PageParams, FLAG_BOS, FLAG_EOS};
use crate::scd::{Endian, ScdBuilder};
use crate::vorbis::{
    VorbisComment, PACKET_IDENT, PACKET_SETUP, SIGNATURE, VORBIS_SUBHEADER_SIZE,
};
use crate::Result;

/// Builds an SCD holding an Ogg Vorbis stream.
///
/// The identification, comment and setup headers go on their own pages,
/// followed by audio pages that each carry one packet and end on a granule
/// `samples_per_page` further along. Header pages sit in the extradata
/// after the Vorbis sub-header unless [`VorbisFixture::headers_in_stream`]
/// is used.
#[derive(Debug, Clone)]
pub struct VorbisFixture {
    endian: Endian,
    channels: u8,
    sample_rate: u32,
    comment: VorbisComment,
    setup_len: usize,
    audio_pages: usize,
    samples_per_page: u64,
    audio_packet_len: usize,
    seek_table_len: usize,
    encryption: u8,
    headers_in_stream: bool,
    serial: u32,
    loop_bytes: (u32, u32),
    entry_offset: Option<u32>,
}

impl VorbisFixture {
    /// 8 audio pages of 11025 samples: 88200 samples in total.
    pub fn new(channels: u8, sample_rate: u32) -> Self {
        Self {
            endian: Endian::Little,
            channels,
            sample_rate,
            comment: VorbisComment::new(&b"Xiph.Org libVorbis I 20150105 (scdloop)"[..]),
            setup_len: 3000,
            audio_pages: 8,
            samples_per_page: 11_025,
            audio_packet_len: 400,
            seek_table_len: 0x10,
            encryption: 0,
            headers_in_stream: false,
            serial: 0x5CD1_0001,
            loop_bytes: (0, 0),
            entry_offset: None,
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn comment(mut self, comment: VorbisComment) -> Self {
        self.comment = comment;
        self
    }

    /// Length of the setup packet.
    pub fn setup_len(mut self, len: usize) -> Self {
        self.setup_len = len;
        self
    }

    pub fn audio(mut self, pages: usize, samples_per_page: u64) -> Self {
        self.audio_pages = pages;
        self.samples_per_page = samples_per_page;
        self
    }

    pub fn encryption(mut self, kind: u8) -> Self {
        self.encryption = kind;
        self
    }

    /// Put the header pages at the start of the stream data and leave the
    /// extradata empty.
    pub fn headers_in_stream(mut self) -> Self {
        self.headers_in_stream = true;
        self
    }

    /// Raw header loop fields.
    pub fn loop_bytes(mut self, start: u32, end: u32) -> Self {
        self.loop_bytes = (start, end);
        self
    }

    /// Place the sound entry at `offset` instead of right after the tables.
    pub fn entry_offset(mut self, offset: u32) -> Self {
        self.entry_offset = Some(offset);
        self
    }

    pub fn total_samples(&self) -> u64 {
        self.audio_pages as u64 * self.samples_per_page
    }

    /// Ident, comment and setup packets.
    pub fn header_packets(&self) -> Result<[Vec<u8>; 3]> {
        let mut ident = vec![PACKET_IDENT];
        ident.extend_from_slice(&SIGNATURE);
        ident.extend_from_slice(&0u32.to_le_bytes());
        ident.push(self.channels);
        ident.extend_from_slice(&self.sample_rate.to_le_bytes());
        ident.extend_from_slice(&0i32.to_le_bytes());
        ident.extend_from_slice(&128_000i32.to_le_bytes());
        ident.extend_from_slice(&0i32.to_le_bytes());
        ident.push(0xB8);
        ident.push(0x01);

        let mut setup = vec![PACKET_SETUP];
        setup.extend_from_slice(&SIGNATURE);
        setup.extend((0..self.setup_len.saturating_sub(7)).map(|i| (i * 31 % 251) as u8));

        Ok([ident, self.comment.encode()?, setup])
    }

    /// Serialized header pages and audio pages.
    pub fn pages(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let [ident, comment, setup] = self.header_packets()?;
        let mut params = PageParams {
            serial: self.serial,
            first_sequence: 0,
            first_flags: FLAG_BOS,
            granule: 0,
        };

        let mut headers = paginate(&[&ident], &params)?.concat();
        params.first_sequence = 1;
        params.first_flags = 0;
        let rest = paginate(&[&comment, &setup], &params)?;
        let mut sequence = 1 + rest.len() as u32;
        headers.extend(rest.concat());

        let mut audio = Vec::new();
        for page in 0..self.audio_pages {
            let packet: Vec<u8> = (0..self.audio_packet_len)
                .map(|i| (i + page * 7) as u8)
                .collect();
            let params = PageParams {
                serial: self.serial,
                first_sequence: sequence,
                first_flags: if page + 1 == self.audio_pages { FLAG_EOS } else { 0 },
                granule: (page as u64 + 1) * self.samples_per_page,
            };
            let pages = paginate(&[&packet], &params)?;
            sequence += pages.len() as u32;
            audio.extend(pages.concat());
        }

        Ok((headers, audio))
    }

    /// Build the container.
    pub fn build(&self) -> Result<Vec<u8>> {
        let (headers, audio) = self.pages()?;
        let e = self.endian;

        let (extradata, stream) = if self.headers_in_stream {
            let mut stream = headers;
            stream.extend(audio);
            (Vec::new(), stream)
        } else {
            let mut extradata = vec![0u8; VORBIS_SUBHEADER_SIZE];
            extradata[0..2].copy_from_slice(&e.u16_bytes(0x0200));
            extradata[0x02] = self.encryption;
            extradata[0x10..0x14].copy_from_slice(&e.u32_bytes(self.seek_table_len as u32));
            extradata[0x14..0x18].copy_from_slice(&e.u32_bytes(headers.len() as u32));
            extradata.extend(std::iter::repeat(0u8).take(self.seek_table_len));
            extradata.extend(headers);
            (extradata, audio)
        };

        let builder = ScdBuilder::new(CodecId::Vorbis, self.channels as u32, self.sample_rate)
            .endian(e)
            .loop_bytes(self.loop_bytes.0, self.loop_bytes.1)
            .extradata(extradata)
            .stream(stream);
        match self.entry_offset {
            Some(offset) => builder.entry_offset(offset).build(),
            None => builder.build(),
        }
    }
}

/// WAVEFORMATEX extradata for an MS-ADPCM stream.
pub fn ms_adpcm_extradata(
    endian: Endian,
    channels: u16,
    sample_rate: u32,
    block_align: u16,
) -> Vec<u8> {
    const COEFS: [(i16, i16); 7] = [
        (256, 0),
        (512, -256),
        (0, 0),
        (192, 64),
        (240, 0),
        (460, -208),
        (392, -232),
    ];
    let samples_per_block = (block_align - 6 * channels) * 2 / channels;
    let avg_bytes = sample_rate * block_align as u32 / samples_per_block as u32;

    let mut out = Vec::with_capacity(0x32);
    out.extend_from_slice(&endian.u16_bytes(0x0002));
    out.extend_from_slice(&endian.u16_bytes(channels));
    out.extend_from_slice(&endian.u32_bytes(sample_rate));
    out.extend_from_slice(&endian.u32_bytes(avg_bytes));
    out.extend_from_slice(&endian.u16_bytes(block_align));
    out.extend_from_slice(&endian.u16_bytes(4));
    out.extend_from_slice(&endian.u16_bytes(32));
    out.extend_from_slice(&endian.u16_bytes(samples_per_block));
    out.extend_from_slice(&endian.u16_bytes(COEFS.len() as u16));
    for (a, b) in COEFS {
        out.extend_from_slice(&endian.u16_bytes(a as u16));
        out.extend_from_slice(&endian.u16_bytes(b as u16));
    }
    out
}

/// A constant-bitrate MPEG stream of `frames` frames built from `header`.
///
/// Padding bits are set on the frames that need the extra slot, so frame
/// `k` starts exactly at `floor(k * spf * bitrate / (8 * rate))`.
pub fn mpeg_stream(header: [u8; 4], frames: usize) -> Result<Vec<u8>> {
    let parsed = MpegFrameHeader::parse(&header)?;
    let a = parsed.samples_per_frame() as u64 * parsed.bitrate as u64;
    let b = 8 * parsed.sample_rate as u64;

    let mut out = Vec::new();
    for k in 0..frames as u64 {
        let len = ((k + 1) * a / b - k * a / b) as usize;
        let base = (a / b) as usize;
        let mut frame = vec![0u8; len];
        frame[..4].copy_from_slice(&header);
        if len > base {
            frame[2] |= 0x02;
        } else {
            frame[2] &= !0x02;
        }
        for (i, byte) in frame[4..].iter_mut().enumerate() {
            *byte = (i as u64 + k) as u8;
        }
        out.extend(frame);
    }
    Ok(out)
}

/// Deterministic filler for PCM and PS-ADPCM streams.
pub fn filler(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 13 + 7) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpeg::find_first_frame;
    use crate::ogg::read_pages;
    use crate::scd::ScdFile;

    #[test]
    fn test_vorbis_fixture_layout() {
        let fixture = VorbisFixture::new(2, 44_100);
        let file = ScdFile::from_bytes(fixture.build().unwrap()).unwrap();
        let meta = file.metadata();
        assert_eq!(meta.codec, CodecId::Vorbis);

        let extradata = file.extradata();
        let header_size = u32::from_le_bytes(extradata[0x14..0x18].try_into().unwrap()) as usize;
        assert_eq!(extradata.len(), VORBIS_SUBHEADER_SIZE + 0x10 + header_size);

        let data = file.data();
        let first_page = meta.extradata_offset() + VORBIS_SUBHEADER_SIZE + 0x10;
        let pages = read_pages(data, first_page, meta.stream_range().end).unwrap();
        assert_eq!(pages.len(), 2 + 8);
        assert!(pages[0].is_bos());
        assert!(pages.last().unwrap().is_eos());
        assert_eq!(pages.last().unwrap().granule, 88_200);
        for page in &pages {
            page.verify(data).unwrap();
        }
    }

    #[test]
    fn test_ms_adpcm_extradata_block_align() {
        let extradata = ms_adpcm_extradata(Endian::Big, 2, 44_100, 0x800);
        assert_eq!(extradata.len(), 0x32);
        assert_eq!(Endian::Big.read_u16(&extradata, 0x0C), Some(0x800));
    }

    #[test]
    fn test_mpeg_stream_frame_positions() {
        let stream = mpeg_stream([0xFF, 0xFB, 0x90, 0x00], 20).unwrap();
        // 1152 * 128000 / (8 * 44100) bytes per frame on average
        assert_eq!(stream.len(), (20u64 * 1152 * 128_000 / 352_800) as usize);
        let (pos, _) = find_first_frame(&stream).unwrap();
        assert_eq!(pos, 0);
        let k = 7u64;
        let at = (k * 1152 * 128_000 / 352_800) as usize;
        assert!(MpegFrameHeader::parse(&stream[at..]).is_ok());
    }
}
