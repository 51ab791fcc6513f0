//! Error types for scdloop-edit.

use scdloop_format::CodecId;
use std::io;
use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, LoopError>;

/// Errors surfaced by loop-point operations.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// Not an SCD container, or no self-consistent header.
    #[error("not a valid SCD container: {0}")]
    Format(String),

    /// A declared size or offset points past the end of the file.
    #[error("truncated container: {what} needs {need} bytes, file has {have}")]
    Truncated {
        what: &'static str,
        need: u64,
        have: u64,
    },

    /// The codec has no loop persistence strategy.
    #[error("unsupported codec {codec:#x}: {detail}")]
    UnsupportedCodec { codec: i32, detail: String },

    /// The embedded bitstream is damaged.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// A rewritten value no longer fits its field.
    #[error("overflow: {0}")]
    Overflow(String),

    /// Requested loop range is empty or outside the stream.
    #[error("invalid loop range {start}..{end}: stream has {total} samples")]
    InvalidRange { start: u64, end: u64, total: u64 },

    /// Requested position cannot be represented exactly by the codec.
    #[error("sample {position} is not on a {granularity}-sample boundary for {codec}")]
    Unaligned {
        position: u64,
        granularity: u64,
        codec: CodecId,
    },

    /// Another write to the same file is in progress.
    #[error("{} is busy with another write", path.display())]
    Busy { path: PathBuf },

    /// A mutation failed and the file was restored.
    #[error("write to {} failed: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        source: Box<LoopError>,
    },

    /// A mutation failed and restoring the file failed too.
    #[error(
        "restoring {} failed: {source}; original bytes kept in {}",
        path.display(),
        backup.display()
    )]
    RollbackFailed {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LoopError {
    /// Create an unsupported codec error.
    pub fn unsupported_codec(codec: CodecId, detail: impl Into<String>) -> Self {
        Self::UnsupportedCodec {
            codec: codec.raw(),
            detail: detail.into(),
        }
    }

    /// Create a corrupt stream error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptStream(msg.into())
    }

    /// Create an overflow error.
    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::Overflow(msg.into())
    }

    /// Whether the file on disk still holds its original bytes.
    ///
    /// Only a failed restore leaves that in doubt; its backup path says where
    /// the original bytes went.
    pub fn file_unchanged(&self) -> bool {
        !matches!(self, Self::RollbackFailed { .. })
    }

    /// The innermost cause, looking through `WriteFailed`.
    pub fn root_cause(&self) -> &LoopError {
        match self {
            Self::WriteFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Message for end users, stating whether the file was left untouched.
    pub fn user_message(&self) -> String {
        if self.file_unchanged() {
            format!("{self}; the original file is unchanged")
        } else {
            self.to_string()
        }
    }
}

impl From<scdloop_format::Error> for LoopError {
    fn from(err: scdloop_format::Error) -> Self {
        use scdloop_format::Error as F;
        match err {
            F::Io(e) => Self::Io(e),
            F::InvalidFormat(msg) => Self::Format(msg),
            F::Truncated { what, need, have } => Self::Truncated { what, need, have },
            F::UnsupportedCodec(codec) => Self::UnsupportedCodec {
                codec,
                detail: "no loop persistence strategy for this codec".to_string(),
            },
            F::CorruptStream(msg) => Self::CorruptStream(msg),
            F::Overflow(msg) => Self::Overflow(msg),
            F::Unsupported(msg) => Self::CorruptStream(format!("unsupported stream feature: {msg}")),
        }
    }
}
