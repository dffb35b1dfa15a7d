use std::{io, path::PathBuf};

use thiserror::Error;

use crate::document::DocumentId;

/// Failure to acquire bytes from an input source.
///
/// Source failures stop ingestion for the affected document only; anything
/// already parsed stays usable.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    #[error("source {} no longer exists", path.display())]
    Gone { path: PathBuf },
    #[error("stream closed unexpectedly")]
    Disconnected,
}

/// Violated precondition of [`IncrementalParser::resume_from`].
///
/// [`IncrementalParser::resume_from`]: crate::IncrementalParser::resume_from
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeError {
    #[error("end offset {end} is beyond the buffer length {len}")]
    BeyondBuffer { end: usize, len: usize },
    #[error("end offset {end} regresses behind parsed offset {parsed}")]
    Regressed { end: usize, parsed: usize },
}

#[derive(Error, Debug)]
pub enum PagerError {
    #[error("no open document with id {0}")]
    UnknownDocument(DocumentId),
    #[error("no registered format named {0:?}")]
    UnknownFormat(String),
    #[error(transparent)]
    Source(#[from] SourceError),
}
