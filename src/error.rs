// manet-pcap-stats/src/error.rs
use std::path::PathBuf;

use thiserror::Error;

use crate::collector::Dataset;

/// Failure to open a capture or read its global header.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PCAP parse error: {0}")]
    Pcap(#[from] pcap_file::PcapError),
}

/// Failure to read a single record from an otherwise readable capture.
#[derive(Debug, Error)]
#[error("record {index}: {message}")]
pub struct DecodeError {
    /// One-based position of the record in the capture.
    pub index: u32,
    pub message: String,
}

/// Per-file failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture file {} is unreadable: {reason}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        reason: SourceError,
    },
}

impl CaptureError {
    pub fn path(&self) -> &PathBuf {
        match self {
            CaptureError::FileUnreadable { path, .. } => path,
        }
    }
}

/// Returned by the collector when running with [`FailurePolicy::Halt`].
///
/// [`FailurePolicy::Halt`]: crate::collector::FailurePolicy::Halt
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("collection halted after {} file(s): {source}", .completed.rows.len())]
    Halted {
        /// Rows computed before the failing file, untouched.
        completed: Dataset,
        #[source]
        source: CaptureError,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
