//! Loop positions and operation reports.

use scdloop_format::{CodecId, CodecStrategy, LoopUnit};

/// A loop start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopPoints {
    pub start: u64,
    pub end: u64,
    pub unit: LoopUnit,
    /// `end > start` and both lie within the stream.
    pub valid: bool,
}

impl LoopPoints {
    /// Sample positions, validated against the stream length.
    pub fn samples(start: u64, end: u64, total_samples: u64) -> Self {
        Self {
            start,
            end,
            unit: LoopUnit::Samples,
            valid: start < end && end <= total_samples,
        }
    }

    /// Loop length in the points' unit, zero when invalid.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LoopReport {
    pub codec: CodecId,
    /// `None` for codecs without a loop persistence strategy.
    pub strategy: Option<CodecStrategy>,
    pub sample_rate: u32,
    pub channels: u32,
    /// Zero when the codec is not understood.
    pub total_samples: u64,
    /// `None` when the file carries no loop.
    pub loop_points: Option<LoopPoints>,
    /// Raw header loop fields (bytes into stream data).
    pub header_bytes: (u32, u32),
}

/// Result of a successful write or clear.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WriteOutcome {
    pub strategy: CodecStrategy,
    /// New file size minus old file size.
    pub size_delta: i64,
    /// Loop now stored in the file, `None` after a clear.
    pub loop_points: Option<LoopPoints>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        assert!(LoopPoints::samples(0, 100, 100).valid);
        assert!(!LoopPoints::samples(0, 101, 100).valid);
        assert!(!LoopPoints::samples(50, 50, 100).valid);
        assert!(!LoopPoints::samples(60, 50, 100).valid);
    }

    #[test]
    fn test_len() {
        assert_eq!(LoopPoints::samples(10, 40, 100).len(), 30);
        assert!(LoopPoints::samples(60, 50, 100).is_empty());
    }
}
