//! Comment header rewriting for embedded Vorbis streams.
//!
//! The comment and setup packets are laid out on fresh pages and spliced
//! over the old header pages. When the page count changes the following
//! pages are renumbered; when the byte length changes every size field and
//! every offset that points past the splice is shifted.

use crate::locator::{locate_comment, CommentLocation, HeaderFields};
use crate::patch::patch_loop_fields;
use crate::transaction::{FaultPlan, FaultPoint};
use crate::{LoopError, Result};
use scdloop_format::ogg::{paginate, set_sequence, PageParams};
use scdloop_format::scd::{entry, FILE_SIZE_OFFSET};
use scdloop_format::{Endian, ScdFile, StreamMetadata};
use std::ops::Range;

/// Change to apply to the loop tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentEdit {
    /// Replace any loop tags with these sample positions.
    Set { start: u64, end: u64 },
    /// Remove all loop tags.
    Clear,
}

/// A rewritten container image.
#[derive(Debug)]
pub struct Rewrite {
    pub image: Vec<u8>,
    /// New length minus old length.
    pub size_delta: i64,
    /// Header pages before and after.
    pub pages: (usize, usize),
}

/// Which size field covers the header pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Extradata,
    Stream,
}

impl Region {
    fn of(range: &Range<usize>, meta: &StreamMetadata) -> Result<Self> {
        let stream = meta.stream_offset();
        if range.start >= meta.extradata_offset() && range.end <= stream {
            Ok(Self::Extradata)
        } else if range.start >= stream {
            Ok(Self::Stream)
        } else {
            Err(LoopError::corrupt(
                "Vorbis header pages straddle extradata and stream data",
            ))
        }
    }
}

/// Rewrite the loop tags of the embedded comment header.
///
/// With `sync_header` the sound entry's loop byte fields are pointed at the
/// audio pages holding the new loop positions (or zeroed on clear).
pub fn rewrite_comment(
    file: &ScdFile,
    location: &CommentLocation,
    edit: CommentEdit,
    sync_header: bool,
    faults: &FaultPlan,
) -> Result<Rewrite> {
    let meta = file.metadata();
    let data = file.data();

    let mut comment = location.comment.clone();
    match edit {
        CommentEdit::Set { start, end } => comment.set_loop(start, end),
        CommentEdit::Clear => {
            comment.clear_loop();
        }
    }
    let packet = comment.encode()?;

    let old_range = location.header_range();
    let region = Region::of(&old_range, meta)?;
    let params = PageParams {
        serial: location.serial,
        first_sequence: location.pages[location.header_pages.start].sequence,
        first_flags: 0,
        granule: 0,
    };
    let new_pages = paginate(&[&packet, &location.setup], &params)?;
    let new_bytes = new_pages.concat();

    let size_delta = new_bytes.len() as i64 - old_range.len() as i64;
    let page_shift = new_pages.len() as i64 - location.header_pages.len() as i64;

    let mut image = Vec::with_capacity((data.len() as i64 + size_delta.max(0)) as usize);
    image.extend_from_slice(&data[..old_range.start]);
    image.extend_from_slice(&new_bytes);
    faults.check(FaultPoint::AfterPartialMutation)?;
    image.extend_from_slice(&data[old_range.end..]);

    if page_shift != 0 {
        renumber_pages(&mut image, location, size_delta, page_shift)?;
    }
    if size_delta != 0 {
        let fixups = Fixups {
            endian: file.endian(),
            edit_at: old_range.start,
            delta: size_delta,
        };
        fixups.apply(&mut image, file, location, region)?;
    }

    tracing::debug!(
        old_pages = location.header_pages.len(),
        new_pages = new_pages.len(),
        size_delta,
        ?region,
        "Rewrote Vorbis comment header"
    );

    if sync_header {
        image = sync_header_fields(image, edit)?;
    }

    Ok(Rewrite {
        image,
        size_delta,
        pages: (location.header_pages.len(), new_pages.len()),
    })
}

/// Renumber every page after the header pages and refresh its checksum.
fn renumber_pages(
    image: &mut [u8],
    location: &CommentLocation,
    size_delta: i64,
    page_shift: i64,
) -> Result<()> {
    for page in &location.pages[location.header_pages.end..] {
        let sequence = u32::try_from(page.sequence as i64 + page_shift)
            .map_err(|_| LoopError::overflow("Ogg page sequence number"))?;
        let offset = (page.offset as i64 + size_delta) as usize;
        set_sequence(&mut image[offset..offset + page.len()], sequence);
    }
    Ok(())
}

/// Container fields that move or grow with the header pages.
struct Fixups {
    endian: Endian,
    /// Absolute offset of the splice in the old image.
    edit_at: usize,
    delta: i64,
}

impl Fixups {
    fn apply(
        &self,
        image: &mut [u8],
        file: &ScdFile,
        location: &CommentLocation,
        region: Region,
    ) -> Result<()> {
        let meta = file.metadata();

        self.grow(image, FILE_SIZE_OFFSET, "file size")?;
        match region {
            Region::Extradata => {
                self.grow(image, meta.field(entry::EXTRADATA_SIZE), "extradata size")?;
                if let Some(sub) = &location.sub_header {
                    self.grow(image, sub.header_size_field(), "Vorbis header size")?;
                }
            }
            Region::Stream => {
                self.grow(image, meta.field(entry::STREAM_SIZE), "stream size")?;
                // Loop fields are relative to the stream data, which now
                // holds the splice.
                let edit_in_stream = (self.edit_at - meta.stream_offset()) as u64;
                let fields = HeaderFields::of(meta);
                for field in [fields.start, fields.end] {
                    let value = self.read(image, field)?;
                    if value as u64 > edit_in_stream {
                        self.grow(image, field, "loop offset")?;
                    }
                }
            }
        }

        let tables = file.tables();
        if tables.table0_offset != 0 {
            let table0 = self.moved(tables.table0_offset);
            self.shift_offset_table(image, table0, tables.table0_count as usize)?;
            if self.points_past(tables.table0_offset) {
                self.grow(image, tables.table0_pointer(), "table0 offset")?;
            }
        }
        let sound_table = self.moved(tables.sound_table_offset);
        self.shift_offset_table(image, sound_table, tables.sound_count as usize)?;
        if self.points_past(tables.sound_table_offset) {
            self.grow(image, tables.sound_table_pointer(), "sound table offset")?;
        }
        if tables.table1_offset != 0 {
            let table1 = self.moved(tables.table1_offset);
            self.shift_offset_table(image, table1, tables.table1_count as usize)?;
            if self.points_past(tables.table1_offset) {
                self.grow(image, tables.table1_pointer(), "table1 offset")?;
            }
        }
        if tables.aux_table_offset != 0 && self.points_past(tables.aux_table_offset) {
            self.grow(image, tables.aux_table_pointer(), "aux table offset")?;
        }

        Ok(())
    }

    fn points_past(&self, offset: u32) -> bool {
        offset as usize > self.edit_at
    }

    /// Where an old absolute offset ends up in the new image.
    fn moved(&self, offset: u32) -> usize {
        if self.points_past(offset) {
            (offset as i64 + self.delta) as usize
        } else {
            offset as usize
        }
    }

    fn shift_offset_table(&self, image: &mut [u8], at: usize, count: usize) -> Result<()> {
        for i in 0..count {
            let slot = at + 4 * i;
            if self.points_past(self.read(image, slot)?) {
                self.grow(image, slot, "entry offset")?;
            }
        }
        Ok(())
    }

    fn read(&self, image: &[u8], offset: usize) -> Result<u32> {
        self.endian
            .read_u32(image, offset)
            .ok_or_else(|| LoopError::corrupt(format!("field at {offset:#x} is past the end")))
    }

    fn grow(&self, image: &mut [u8], offset: usize, what: &str) -> Result<()> {
        let old = self.read(image, offset)?;
        let new = u32::try_from(old as i64 + self.delta)
            .map_err(|_| LoopError::overflow(format!("{what} {old} + {}", self.delta)))?;
        self.endian.write_u32(image, offset, new);
        Ok(())
    }
}

/// Point the header loop fields at the audio pages holding the loop.
fn sync_header_fields(image: Vec<u8>, edit: CommentEdit) -> Result<Vec<u8>> {
    let file = ScdFile::from_bytes(image)?;
    let meta = file.metadata();
    let (start, end) = match edit {
        CommentEdit::Set { start, end } => {
            let location = locate_comment(&file)?;
            (
                location.stream_offset_of(start, meta),
                location.stream_offset_of(end, meta),
            )
        }
        CommentEdit::Clear => (0, 0),
    };

    let endian = file.endian();
    let fields = HeaderFields::of(meta);
    let mut image = file.into_bytes();
    patch_loop_fields(&mut image, endian, fields, start, end, &FaultPlan::none())?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scdloop_format::ogg::read_pages;
    use scdloop_format::testing::VorbisFixture;
    use scdloop_format::vorbis::VorbisComment;
    use scdloop_format::Endian;

    fn located(data: Vec<u8>) -> (ScdFile, CommentLocation) {
        let file = ScdFile::from_bytes(data).unwrap();
        let location = locate_comment(&file).unwrap();
        (file, location)
    }

    /// A comment that fills the header page almost to the segment limit.
    fn crowded_comment() -> VorbisComment {
        let mut comment = VorbisComment::new(&b"v"[..]);
        // 17 bytes of framing + 8 bytes of field overhead + 61925 = 61950
        comment.push("PAD", "x".repeat(61_925));
        assert_eq!(comment.encode().unwrap().len(), 61_950);
        comment
    }

    #[test]
    fn test_set_loop_tags() {
        let (file, location) = located(VorbisFixture::new(2, 44_100).build().unwrap());
        let rewrite = rewrite_comment(
            &file,
            &location,
            CommentEdit::Set { start: 0, end: 88_200 },
            false,
            &FaultPlan::none(),
        )
        .unwrap();

        // "LOOPSTART=0" and "LOOPEND=88200" with their length prefixes
        assert_eq!(rewrite.size_delta, 15 + 17);
        assert_eq!(rewrite.pages, (1, 1));
        assert_eq!(
            rewrite.image.len() as i64,
            file.data().len() as i64 + rewrite.size_delta
        );

        let (new_file, new_location) = located(rewrite.image);
        assert_eq!(new_location.comment.get("LOOPSTART"), Some("0"));
        assert_eq!(new_location.comment.get("LOOPEND"), Some("88200"));
        assert_eq!(new_location.total_samples, 88_200);
        assert_eq!(
            new_file.metadata().extradata_size as i64,
            file.metadata().extradata_size as i64 + rewrite.size_delta
        );
        assert_eq!(new_file.stream(), file.stream());
        assert_eq!(
            new_location.sub_header.unwrap().header_size as i64,
            location.sub_header.unwrap().header_size as i64 + rewrite.size_delta
        );
    }

    #[test]
    fn test_growth_past_page_capacity_adds_page() {
        let fixture = VorbisFixture::new(2, 44_100).comment(crowded_comment());
        let (file, location) = located(fixture.build().unwrap());
        assert_eq!(location.header_pages.len(), 1);

        let rewrite = rewrite_comment(
            &file,
            &location,
            CommentEdit::Set {
                start: 11_025,
                end: 66_150,
            },
            false,
            &FaultPlan::none(),
        )
        .unwrap();
        assert_eq!(rewrite.pages, (1, 2));

        let (new_file, new_location) = located(rewrite.image);
        assert_eq!(new_location.header_pages.len(), 2);
        assert!(new_location.pages[2].is_continued());
        for (i, page) in new_location.pages.iter().enumerate() {
            assert_eq!(page.sequence, i as u32);
            page.verify(new_file.data()).unwrap();
        }
        assert_eq!(new_location.comment.loop_points(), Some((11_025, 66_150)));
        assert_eq!(new_location.total_samples, 88_200);
    }

    #[test]
    fn test_clear_shrinks_back() {
        let mut tagged = VorbisComment::new(&b"v"[..]);
        tagged.push("LoopStart", 100);
        tagged.push("LoopEnd", 200);
        let fixture = VorbisFixture::new(2, 44_100).comment(tagged);
        let (file, location) = located(fixture.build().unwrap());

        let rewrite =
            rewrite_comment(&file, &location, CommentEdit::Clear, true, &FaultPlan::none())
                .unwrap();
        assert!(rewrite.size_delta < 0);

        let (new_file, new_location) = located(rewrite.image);
        assert_eq!(new_location.comment.loop_points(), None);
        assert_eq!(new_file.metadata().loop_start_bytes, 0);
        assert_eq!(new_file.metadata().loop_end_bytes, 0);
    }

    #[test]
    fn test_headers_in_stream_update_stream_size() {
        let fixture = VorbisFixture::new(2, 44_100)
            .endian(Endian::Big)
            .headers_in_stream();
        let (file, location) = located(fixture.build().unwrap());

        let rewrite = rewrite_comment(
            &file,
            &location,
            CommentEdit::Set { start: 0, end: 44_100 },
            false,
            &FaultPlan::none(),
        )
        .unwrap();
        let (new_file, _) = located(rewrite.image);
        assert_eq!(new_file.metadata().extradata_size, 0);
        assert_eq!(
            new_file.metadata().stream_size as i64,
            file.metadata().stream_size as i64 + rewrite.size_delta
        );
        assert_eq!(
            new_file.tables().sound_table_offset as i64,
            file.tables().sound_table_offset as i64 + rewrite.size_delta
        );
        assert_eq!(
            new_file.header().file_size as usize,
            new_file.data().len()
        );
    }

    #[test]
    fn test_extended_table_pointers_follow_the_splice() {
        let mut data = VorbisFixture::new(2, 44_100)
            .entry_offset(0x50)
            .build()
            .unwrap();
        let file = ScdFile::from_bytes(data.clone()).unwrap();
        let tables = file.tables().clone();
        let trailing = tables.sound_table_offset;
        // Table 1 shares the trailing offset table; the aux pointer sits
        // past the splice too.
        Endian::Little.write_u32(&mut data, tables.table1_pointer(), trailing);
        Endian::Little.write_u32(&mut data, tables.aux_table_pointer(), trailing);
        data[tables.offset + 0x02..tables.offset + 0x04]
            .copy_from_slice(&Endian::Little.u16_bytes(1));

        let (file, location) = located(data);
        assert_eq!(file.tables().table1_offset, trailing);
        let rewrite = rewrite_comment(
            &file,
            &location,
            CommentEdit::Set { start: 0, end: 88_200 },
            false,
            &FaultPlan::none(),
        )
        .unwrap();

        let (new_file, _) = located(rewrite.image);
        let moved = (trailing as i64 + rewrite.size_delta) as u32;
        let new_tables = new_file.tables();
        assert_eq!(new_tables.sound_table_offset, moved);
        assert_eq!(new_tables.table1_offset, moved);
        assert_eq!(new_tables.aux_table_offset, moved);
        // The entry itself sits before the splice.
        assert_eq!(new_file.entry_offsets(), &[0x50]);
    }

    #[test]
    fn test_sync_points_header_at_pages() {
        let (file, location) = located(VorbisFixture::new(2, 44_100).build().unwrap());
        let rewrite = rewrite_comment(
            &file,
            &location,
            CommentEdit::Set {
                start: 22_050,
                end: 88_200,
            },
            true,
            &FaultPlan::none(),
        )
        .unwrap();

        let (new_file, _) = located(rewrite.image);
        let meta = new_file.metadata();
        let pages = read_pages(new_file.data(), meta.stream_offset(), meta.stream_range().end)
            .unwrap();
        // Third audio page starts at sample 22050.
        assert_eq!(
            meta.loop_start_bytes as usize,
            pages[2].offset - meta.stream_offset()
        );
        assert_eq!(meta.loop_end_bytes, meta.stream_size);
    }

    #[test]
    fn test_fault_leaves_source_untouched() {
        let original = VorbisFixture::new(2, 44_100).build().unwrap();
        let (file, location) = located(original.clone());
        let err = rewrite_comment(
            &file,
            &location,
            CommentEdit::Set { start: 0, end: 10 },
            true,
            &FaultPlan::at(FaultPoint::AfterPartialMutation),
        )
        .unwrap_err();
        assert!(matches!(err, LoopError::Io(_)));
        assert_eq!(file.data(), original.as_slice());
    }
}
