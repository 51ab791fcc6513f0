//! In-place header field patching.

use crate::locator::HeaderFields;
use crate::transaction::{FaultPlan, FaultPoint};
use crate::{LoopError, Result};
use scdloop_format::Endian;

/// Overwrite the two loop fields of the sound entry.
///
/// Both values are byte offsets into the stream data. The image never
/// changes size.
pub fn patch_loop_fields(
    image: &mut [u8],
    endian: Endian,
    fields: HeaderFields,
    start_bytes: u64,
    end_bytes: u64,
    faults: &FaultPlan,
) -> Result<()> {
    let start = field_value(start_bytes, "loop start")?;
    let end = field_value(end_bytes, "loop end")?;

    write_field(image, endian, fields.start, start)?;
    faults.check(FaultPoint::AfterPartialMutation)?;
    write_field(image, endian, fields.end, end)?;

    tracing::debug!(
        start_field = fields.start,
        end_field = fields.end,
        start,
        end,
        "Patched header loop fields"
    );
    Ok(())
}

fn field_value(bytes: u64, what: &str) -> Result<u32> {
    u32::try_from(bytes)
        .map_err(|_| LoopError::overflow(format!("{what} byte offset {bytes} exceeds u32")))
}

fn write_field(image: &mut [u8], endian: Endian, offset: usize, value: u32) -> Result<()> {
    if endian.write_u32(image, offset, value) {
        Ok(())
    } else {
        Err(LoopError::Truncated {
            what: "loop field",
            need: offset as u64 + 4,
            have: image.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: HeaderFields = HeaderFields { start: 4, end: 8 };

    #[test]
    fn test_patch_big_endian() {
        let mut image = vec![0xEEu8; 16];
        patch_loop_fields(
            &mut image,
            Endian::Big,
            FIELDS,
            0x0102_0304,
            0x0A0B_0C0D,
            &FaultPlan::none(),
        )
        .unwrap();
        assert_eq!(&image[..4], &[0xEE; 4]);
        assert_eq!(&image[4..8], &[1, 2, 3, 4]);
        assert_eq!(&image[8..12], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&image[12..], &[0xEE; 4]);
    }

    #[test]
    fn test_overflow_rejected_before_writing() {
        let mut image = vec![0u8; 16];
        let err = patch_loop_fields(
            &mut image,
            Endian::Little,
            FIELDS,
            0,
            u32::MAX as u64 + 1,
            &FaultPlan::none(),
        )
        .unwrap_err();
        assert!(matches!(err, LoopError::Overflow(_)));
        assert!(image.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fault_after_first_field() {
        let mut image = vec![0u8; 16];
        let faults = FaultPlan::at(FaultPoint::AfterPartialMutation);
        assert!(patch_loop_fields(&mut image, Endian::Little, FIELDS, 7, 9, &faults).is_err());
        assert_eq!(image[4], 7);
        assert_eq!(image[8], 0);
    }

    #[test]
    fn test_field_past_end() {
        let mut image = vec![0u8; 10];
        let err = patch_loop_fields(
            &mut image,
            Endian::Little,
            FIELDS,
            1,
            2,
            &FaultPlan::none(),
        )
        .unwrap_err();
        assert!(matches!(err, LoopError::Truncated { need: 12, .. }));
    }
}
