//! Incremental, resumable styled-text parsing for a live-tail text pager.
//!
//! Raw bytes arrive in arbitrary chunks into a [`RawBuffer`]. A
//! [`FormatRegistry`] decides which [`FormatDescriptor`] reads them, and an
//! [`IncrementalParser`] turns them into [`StyledRun`]s, committing output
//! only at unit boundaries so that the result never depends on how the input
//! was split. [`TailWatch`] feeds growing files; the [`Pager`] event loop
//! ties documents, sources and scheduled parse slices together.
//!
//! ```rust
//! use tailpage::{FormatDescriptor, FormatKind, IncrementalParser, ParserOptions, RawBuffer};
//!
//! let mut parser = IncrementalParser::with_format(
//!     ParserOptions::default(),
//!     FormatDescriptor::builtin(FormatKind::Plain),
//! );
//! let mut buffer = RawBuffer::from("line one\nline tw");
//! parser.resume_from(&buffer, buffer.len()).unwrap();
//! assert_eq!(tailpage::plain_text(parser.committed()), "line one\n");
//!
//! buffer.extend_from_slice(b"o\n");
//! parser.resume_from(&buffer, buffer.len()).unwrap();
//! assert_eq!(tailpage::plain_text(parser.committed()), "line one\nline two\n");
//! ```

#![allow(missing_docs)]

mod buffer;
mod checkpoint;
mod document;
mod error;
mod format;
mod options;
mod pager;
mod parser;
mod styled;
mod tail;

#[cfg(test)]
mod tests;

pub use buffer::RawBuffer;
pub use checkpoint::Checkpoint;
pub use document::{
    Document, DocumentEvent, DocumentId, IngestStatus, Ingested, StatusSummary,
};
pub use error::{PagerError, ResumeError, SourceError};
pub use format::{
    Detection, FormatDescriptor, FormatKind, FormatRegistry, Sample, Selection,
};
pub use options::{DetectOptions, PagerOptions, ParserOptions, TailOptions};
pub use pager::{Pager, PumpReport};
pub use parser::{Continuation, IncrementalParser, ParseProgress, ParseSummary, ParserStats};
#[cfg(any(test, feature = "fuzzing"))]
pub use parser::{parse_all, parse_split};
pub use styled::{
    AttributeKey, AttributeValue, Attributes, Color, StyledRun, plain_text, render_runs,
};
pub use tail::{
    ChunkStream, FileSource, PollOutcome, ReaderStream, SizedSource, SourceSize, StreamChunk,
    TailWatch,
};
