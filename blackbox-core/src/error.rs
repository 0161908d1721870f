//! Error types for segment indexing and index persistence

use thiserror::Error;

/// Errors reported by a [`FrameDecoder`](crate::frame::FrameDecoder).
///
/// These are produced by the external frame decoder and surfaced verbatim by
/// the directory builder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Log header could not be parsed
    #[error("Invalid log header: {0}")]
    Header(String),

    /// A field the directory builder needs is not defined by the header
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Frame stream could not be decoded
    #[error("Frame decode failed at offset {offset}: {reason}")]
    Frame { offset: usize, reason: String },
}

/// Errors that can occur when building, saving or restoring a log index
#[derive(Error, Debug)]
pub enum IndexError {
    /// Decoding a segment failed; the whole build is abandoned
    #[error("Segment {segment} could not be decoded: {source}")]
    Decode {
        segment: usize,
        #[source]
        source: DecodeError,
    },

    /// A saved directory is malformed
    #[error("Malformed saved index: {0}")]
    Encoding(String),

    /// Saved index text is not valid JSON for the expected shape
    #[error("Saved index is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A saved index holds a different number of directories than the log has segments
    #[error("Saved index has {actual} directories but the log has {expected} segments")]
    SegmentCountMismatch { expected: usize, actual: usize },

    /// Directories were already built or restored for this index
    #[error("Intraframe directories are already present")]
    AlreadyBuilt,

    /// Index configuration is unusable
    #[error("Invalid index configuration: {0}")]
    Config(String),
}
