//! The loop point facade.

use crate::gate::{GateGuard, WriteGate, WriteState};
use crate::locator::{locate_comment, CommentLocation, HeaderFields, SampleLayout};
use crate::patch::patch_loop_fields;
use crate::points::{LoopPoints, LoopReport, WriteOutcome};
use crate::rewrite::{rewrite_comment, CommentEdit};
use crate::transaction::{FaultPlan, Transaction};
use crate::{LoopError, Result};
use scdloop_format::{classify, CodecStrategy, ScdFile, StreamMetadata};
use std::path::Path;

/// Behaviour switches for mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    /// After rewriting Vorbis loop tags, also point the sound entry's loop
    /// byte fields at the matching audio pages.
    pub sync_vorbis_header: bool,
    /// Keep the sibling backup file when a write is rolled back.
    pub keep_backup_on_failure: bool,
    pub faults: FaultPlan,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            sync_vorbis_header: true,
            keep_backup_on_failure: false,
            faults: FaultPlan::none(),
        }
    }
}

/// Requested change to a file's loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEdit {
    Set { start: u64, end: u64 },
    Clear,
}

impl From<LoopEdit> for CommentEdit {
    fn from(edit: LoopEdit) -> Self {
        match edit {
            LoopEdit::Set { start, end } => CommentEdit::Set { start, end },
            LoopEdit::Clear => CommentEdit::Clear,
        }
    }
}

/// A validated edit, ready to apply.
enum Prepared {
    Header {
        fields: HeaderFields,
        start_bytes: u64,
        end_bytes: u64,
    },
    Comment {
        location: Box<CommentLocation>,
    },
}

impl Prepared {
    fn strategy(&self) -> CodecStrategy {
        match self {
            Self::Header { .. } => CodecStrategy::HeaderPatch,
            Self::Comment { .. } => CodecStrategy::EmbeddedComment,
        }
    }
}

/// Reads and writes loop points of SCD files.
///
/// Holds only options and a handle to the process-wide write gate, so it is
/// cheap to build per call. Each operation opens the file, works on an
/// in-memory image and drops everything before returning.
#[derive(Debug, Clone)]
pub struct LoopPointManager {
    options: EditOptions,
    gate: WriteGate,
}

impl Default for LoopPointManager {
    fn default() -> Self {
        Self::new(EditOptions::default())
    }
}

impl LoopPointManager {
    pub fn new(options: EditOptions) -> Self {
        Self::with_gate(options, WriteGate::global())
    }

    /// Use a private gate instead of the process-wide one.
    pub fn with_gate(options: EditOptions, gate: WriteGate) -> Self {
        Self { options, gate }
    }

    pub fn options(&self) -> &EditOptions {
        &self.options
    }

    pub fn gate(&self) -> &WriteGate {
        &self.gate
    }

    /// Identify the stream without interpreting loop data. Succeeds for
    /// codecs that have no loop strategy.
    pub fn inspect(&self, path: impl AsRef<Path>) -> Result<StreamMetadata> {
        let file = ScdFile::open(path)?;
        Ok(file.metadata().clone())
    }

    /// Read the loop stored in a file. Never writes.
    ///
    /// A codec without a loop strategy still yields a report, with no
    /// strategy and no loop. Other failures are reported as container
    /// errors: a damaged embedded stream makes the file unreadable as far
    /// as loops are concerned.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<LoopReport> {
        let file = ScdFile::open(path)?;
        report(&file).map_err(as_read_error)
    }

    /// Store a loop, in samples, using the codec's persistence strategy.
    pub fn write(&self, path: impl AsRef<Path>, start: u64, end: u64) -> Result<WriteOutcome> {
        self.apply(path.as_ref(), LoopEdit::Set { start, end })
    }

    /// Remove any loop from a file.
    pub fn clear(&self, path: impl AsRef<Path>) -> Result<WriteOutcome> {
        self.apply(path.as_ref(), LoopEdit::Clear)
    }

    fn apply(&self, path: &Path, edit: LoopEdit) -> Result<WriteOutcome> {
        // Reject bad requests before claiming the file.
        self.prepare(&ScdFile::open(path)?, edit)?;

        let guard = self.gate.enter(path)?;
        let mut tx = Transaction::begin(
            path,
            self.options.keep_backup_on_failure,
            self.options.faults,
        )?;

        match self.mutate(&mut tx, &guard, edit) {
            Ok(outcome) => {
                guard.advance(WriteState::Committed);
                tracing::info!(
                    path = %path.display(),
                    strategy = %outcome.strategy,
                    size_delta = outcome.size_delta,
                    "Loop points written"
                );
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Write failed, rolling back");
                let restored = tx.rollback();
                guard.advance(WriteState::RolledBack);
                restored?;
                Err(LoopError::WriteFailed {
                    path: path.to_path_buf(),
                    source: Box::new(err),
                })
            }
        }
    }

    fn mutate(
        &self,
        tx: &mut Transaction,
        guard: &GateGuard,
        edit: LoopEdit,
    ) -> Result<WriteOutcome> {
        // Plan again against the snapshot: the file may have changed since
        // validation.
        let file = ScdFile::from_bytes(tx.snapshot().to_vec())?;
        let prepared = self.prepare(&file, edit)?;
        let strategy = prepared.strategy();

        guard.advance(WriteState::Mutating);
        let (image, size_delta) = match prepared {
            Prepared::Header {
                fields,
                start_bytes,
                end_bytes,
            } => {
                let mut image = file.data().to_vec();
                patch_loop_fields(
                    &mut image,
                    file.endian(),
                    fields,
                    start_bytes,
                    end_bytes,
                    tx.faults(),
                )?;
                (image, 0)
            }
            Prepared::Comment { location } => {
                let rewrite = rewrite_comment(
                    &file,
                    &location,
                    edit.into(),
                    self.options.sync_vorbis_header,
                    tx.faults(),
                )?;
                (rewrite.image, rewrite.size_delta)
            }
        };

        let loop_points = verify_image(&file, image.clone(), edit)?;
        tx.commit(&image)?;

        Ok(WriteOutcome {
            strategy,
            size_delta,
            loop_points,
        })
    }

    /// Classify the codec and validate the request against the stream.
    fn prepare(&self, file: &ScdFile, edit: LoopEdit) -> Result<Prepared> {
        let meta = file.metadata();
        match classify(meta.codec)? {
            CodecStrategy::HeaderPatch => {
                let layout = SampleLayout::for_file(file)?;
                let (start_bytes, end_bytes) = match edit {
                    LoopEdit::Set { start, end } => {
                        check_range(start, end, layout.total_samples(meta.stream_size as u64))?;
                        (
                            layout.samples_to_bytes(start, meta.codec)?,
                            layout.samples_to_bytes(end, meta.codec)?,
                        )
                    }
                    LoopEdit::Clear => (0, 0),
                };
                Ok(Prepared::Header {
                    fields: HeaderFields::of(meta),
                    start_bytes,
                    end_bytes,
                })
            }
            CodecStrategy::EmbeddedComment => {
                let location = locate_comment(file)?;
                if let LoopEdit::Set { start, end } = edit {
                    check_range(start, end, location.total_samples)?;
                }
                Ok(Prepared::Comment {
                    location: Box::new(location),
                })
            }
        }
    }
}

fn check_range(start: u64, end: u64, total: u64) -> Result<()> {
    if start < end && end <= total {
        Ok(())
    } else {
        Err(LoopError::InvalidRange { start, end, total })
    }
}

/// Loop report for a parsed file.
fn report(file: &ScdFile) -> Result<LoopReport> {
    let meta = file.metadata();
    let header_bytes = (meta.loop_start_bytes, meta.loop_end_bytes);

    if !meta.codec.is_known() {
        tracing::debug!(codec = %meta.codec, "No loop strategy, reporting identification only");
        return Ok(LoopReport {
            codec: meta.codec,
            strategy: None,
            sample_rate: meta.sample_rate,
            channels: meta.channels,
            total_samples: 0,
            loop_points: None,
            header_bytes,
        });
    }

    let (strategy, total_samples, loop_points) = match classify(meta.codec)? {
        CodecStrategy::HeaderPatch => {
            let layout = SampleLayout::for_file(file)?;
            let total = layout.total_samples(meta.stream_size as u64);
            let points = (header_bytes != (0, 0)).then(|| {
                LoopPoints::samples(
                    layout.bytes_to_samples(meta.loop_start_bytes as u64),
                    layout.bytes_to_samples(meta.loop_end_bytes as u64),
                    total,
                )
            });
            (CodecStrategy::HeaderPatch, total, points)
        }
        CodecStrategy::EmbeddedComment => {
            let location = locate_comment(file)?;
            let total = location.total_samples;
            let points = location
                .comment
                .loop_points()
                .map(|(start, end)| LoopPoints::samples(start, end, total));
            (CodecStrategy::EmbeddedComment, total, points)
        }
    };

    Ok(LoopReport {
        codec: meta.codec,
        strategy: Some(strategy),
        sample_rate: meta.sample_rate,
        channels: meta.channels,
        total_samples,
        loop_points,
        header_bytes,
    })
}

/// Check that a new image parses and reads back the requested loop with
/// an unchanged stream length.
fn verify_image(before: &ScdFile, image: Vec<u8>, edit: LoopEdit) -> Result<Option<LoopPoints>> {
    let expected_total = report(before)?.total_samples;
    let after = report(&ScdFile::from_bytes(image)?)?;

    if after.total_samples != expected_total {
        return Err(LoopError::corrupt(format!(
            "stream length changed from {expected_total} to {} samples",
            after.total_samples
        )));
    }

    let stored = after.loop_points.map(|p| (p.start, p.end));
    let wanted = match edit {
        LoopEdit::Set { start, end } => Some((start, end)),
        LoopEdit::Clear => None,
    };
    if stored != wanted {
        return Err(LoopError::corrupt(format!(
            "loop reads back as {stored:?}, expected {wanted:?}"
        )));
    }

    Ok(after.loop_points)
}

/// Reads only fail with container-level errors. An encrypted Vorbis
/// payload is one: its codec is known but its stream cannot be parsed.
fn as_read_error(err: LoopError) -> LoopError {
    match err {
        LoopError::CorruptStream(_) | LoopError::Overflow(_) | LoopError::UnsupportedCodec { .. } => {
            LoopError::Format(err.to_string())
        }
        other => other,
    }
}
