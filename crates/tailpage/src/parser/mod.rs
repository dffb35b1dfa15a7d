//! Incremental, resumable conversion of raw bytes into styled runs.
//!
//! Overview
//! - The parser reads ranges of a [`RawBuffer`] it does not own and appends
//!   [`StyledRun`]s to its output. Input is consumed one unit at a time; a
//!   unit is a line, a forced split of a line longer than
//!   `ParserOptions::max_unit_bytes`, or the final bytes once the buffer is
//!   complete.
//! - Two checkpoints are tracked. `last` is the confirmed resume point: every
//!   run before it is committed and never changes. `next` is where the
//!   current slice has got to; it moves with every [`emit`] and becomes
//!   `last` on [`checkpoint`].
//! - A unit whose terminator has not arrived yet is still parsed and emitted,
//!   then discarded by [`retract_trailing`] at the end of the slice. The next
//!   [`resume_from`] derives it again from `last`, so the committed output
//!   never depends on where chunk boundaries fell.
//! - Once the buffer is complete and fully parsed, the format gets one chance
//!   to flush constructs left open (an unterminated tag) as text that
//!   consumes no bytes.
//!
//! Slices
//! - [`resume_from`] stops starting new units once `slice_bytes` have been
//!   consumed in the current call and returns a [`Continuation`]. The token
//!   carries the parser's generation; [`reset`] bumps the generation, so a
//!   continuation scheduled before a format change or teardown becomes a
//!   no-op when it runs.
//! - Format state that spans units (the current SGR style, open markup tags)
//!   is snapshotted at each checkpoint and restored on retract.
//!
//! [`emit`]: IncrementalParser::emit
//! [`checkpoint`]: IncrementalParser::checkpoint
//! [`retract_trailing`]: IncrementalParser::retract_trailing
//! [`resume_from`]: IncrementalParser::resume_from
//! [`reset`]: IncrementalParser::reset

pub(crate) mod unit;

#[cfg(test)]
mod tests;

use bstr::ByteSlice;
use tracing::{debug, trace};

use crate::{
    buffer::RawBuffer,
    checkpoint::Checkpoint,
    error::ResumeError,
    format::{FormatDescriptor, FormatState},
    options::ParserOptions,
    styled::{Attributes, StyledRun},
};
use unit::UnitWriter;

/// Result of one call to [`IncrementalParser::resume_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseProgress {
    /// Everything up to the requested end offset has been parsed; at most a
    /// trailing partial unit was held back.
    Complete,
    /// The slice bound was reached first. Run the continuation to go on.
    Suspended(Continuation),
    /// No format has been chosen yet; nothing was parsed.
    AwaitingFormat,
}

/// Token for resuming a suspended parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    generation: u64,
}

impl Continuation {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Counters over the lifetime of a parser, reset by [`IncrementalParser::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Calls to `resume_from` that got past the precondition checks.
    pub resumes: usize,
    /// Slices that ended because of the slice bound.
    pub suspensions: usize,
    /// Units that were emitted and then retracted.
    pub retracted_units: usize,
    pub checkpoints: usize,
}

#[derive(Debug, Clone)]
pub struct IncrementalParser {
    options: ParserOptions,
    format: Option<FormatDescriptor>,
    last: Checkpoint,
    next: Checkpoint,
    /// Number of runs covered by `last`.
    committed_runs: usize,
    runs: Vec<StyledRun>,
    state: FormatState,
    committed_state: FormatState,
    /// Highest end offset requested and not yet reached.
    pending_limit: usize,
    /// End-of-input flush has run.
    finished: bool,
    generation: u64,
    stats: ParserStats,
}

impl IncrementalParser {
    /// A parser with no format; it parses nothing until one is set.
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            format: None,
            last: Checkpoint::START,
            next: Checkpoint::START,
            committed_runs: 0,
            runs: Vec::new(),
            state: FormatState::Stateless,
            committed_state: FormatState::Stateless,
            pending_limit: 0,
            finished: false,
            generation: 0,
            stats: ParserStats::default(),
        }
    }

    #[must_use]
    pub fn with_format(options: ParserOptions, format: FormatDescriptor) -> Self {
        let mut parser = Self::new(options);
        parser.reset(Some(format));
        parser
    }

    #[must_use]
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    #[must_use]
    pub fn format(&self) -> Option<&FormatDescriptor> {
        self.format.as_ref()
    }

    /// Last confirmed checkpoint.
    #[must_use]
    pub fn last(&self) -> Checkpoint {
        self.last
    }

    /// Provisional checkpoint of the slice in progress.
    #[must_use]
    pub fn next(&self) -> Checkpoint {
        self.next
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Runs at or before the last checkpoint. Never changes except by
    /// growing, until [`reset`](Self::reset).
    #[must_use]
    pub fn committed(&self) -> &[StyledRun] {
        &self.runs[..self.committed_runs]
    }

    /// Whether an earlier call stopped short of the end it was asked for.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_limit > self.next.byte_offset
    }

    /// Discards all output and restarts from offset zero under `format`.
    ///
    /// Outstanding continuations are invalidated.
    pub fn reset(&mut self, format: Option<FormatDescriptor>) {
        debug!(
            format = format.as_ref().map(FormatDescriptor::name),
            generation = self.generation + 1,
            "parser reset"
        );
        self.state = format
            .as_ref()
            .map_or(FormatState::Stateless, |f| f.kind().initial_state());
        self.committed_state = self.state.clone();
        self.format = format;
        self.last = Checkpoint::START;
        self.next = Checkpoint::START;
        self.committed_runs = 0;
        self.runs.clear();
        self.pending_limit = 0;
        self.finished = false;
        self.generation += 1;
        self.stats = ParserStats::default();
    }

    /// Appends a run produced by `consumed` source bytes.
    ///
    /// Empty `text` only advances the byte offset. Callers must account for
    /// source bytes in order, without gaps or overlap.
    pub fn emit(&mut self, text: &str, attributes: Attributes, consumed: usize) {
        self.next.byte_offset += consumed;
        if text.is_empty() {
            return;
        }
        self.next.text_position += text.chars().count();
        self.runs.push(StyledRun::new(text, attributes));
    }

    /// Confirms everything up to `offset`.
    ///
    /// Takes effect only when `offset` is exactly where `next` stands;
    /// returns whether it did.
    pub fn checkpoint(&mut self, offset: usize) -> bool {
        if self.next.byte_offset != offset {
            debug!(
                offset,
                next = self.next.byte_offset,
                "checkpoint ignored, offset is not at a unit boundary"
            );
            return false;
        }
        debug_assert!(self.next.dominates(&self.last));
        self.last = self.next;
        self.committed_runs = self.runs.len();
        self.committed_state.clone_from(&self.state);
        self.stats.checkpoints += 1;
        true
    }

    /// Rolls `next` back to `last`, dropping runs emitted since.
    pub fn retract_trailing(&mut self) {
        if self.next == self.last && self.runs.len() == self.committed_runs {
            return;
        }
        trace!(
            from = self.next.byte_offset,
            to = self.last.byte_offset,
            "retracting trailing partial unit"
        );
        self.runs.truncate(self.committed_runs);
        self.next = self.last;
        self.state.clone_from(&self.committed_state);
        self.stats.retracted_units += 1;
    }

    /// Parses newly available bytes up to `end_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ResumeError`] when `end_offset` is beyond the buffer or
    /// behind what has already been parsed. Parser state is untouched in
    /// that case.
    pub fn resume_from(
        &mut self,
        buffer: &RawBuffer,
        end_offset: usize,
    ) -> Result<ParseProgress, ResumeError> {
        if end_offset > buffer.len() {
            return Err(ResumeError::BeyondBuffer {
                end: end_offset,
                len: buffer.len(),
            });
        }
        if end_offset < self.next.byte_offset {
            return Err(ResumeError::Regressed {
                end: end_offset,
                parsed: self.next.byte_offset,
            });
        }
        self.pending_limit = self.pending_limit.max(end_offset).min(buffer.len());
        let Some(kind) = self.format.as_ref().map(FormatDescriptor::kind) else {
            return Ok(ParseProgress::AwaitingFormat);
        };
        self.stats.resumes += 1;

        let end = self.pending_limit;
        let start = self.next.byte_offset;
        let budget = self.options.slice_bytes.max(1);
        let max_unit = self.options.max_unit_bytes.max(1);
        let mut suspended = false;

        while self.next.byte_offset < end {
            let unit_start = self.next.byte_offset;
            if unit_start - start >= budget {
                suspended = true;
                break;
            }
            let available = buffer.range(unit_start, end);
            let (unit_len, terminated) = match available.find_byte(b'\n') {
                Some(nl) if nl < max_unit => (nl + 1, true),
                _ if available.len() >= max_unit => (max_unit, true),
                _ => {
                    let at_eof = buffer.is_complete() && end == buffer.len();
                    (available.len(), at_eof)
                }
            };
            let unit = &available[..unit_len];

            let mut writer = UnitWriter::new();
            kind.parse_unit(&mut self.state, unit, &mut writer);
            for (text, attributes, consumed) in writer.drain() {
                self.emit(&text, attributes, consumed);
            }
            debug_assert_eq!(self.next.byte_offset, unit_start + unit_len);

            if !terminated {
                break;
            }
            self.checkpoint(unit_start + unit_len);
        }

        if !suspended
            && !self.finished
            && buffer.is_complete()
            && self.next.byte_offset == buffer.len()
        {
            let mut writer = UnitWriter::new();
            kind.finish_input(&mut self.state, &mut writer);
            for (text, attributes, _) in writer.drain() {
                self.emit(&text, attributes, 0);
            }
            self.checkpoint(buffer.len());
            self.finished = true;
        }

        self.retract_trailing();
        trace!(
            start,
            end,
            committed = self.last.byte_offset,
            suspended,
            "parse slice finished"
        );
        if suspended {
            self.stats.suspensions += 1;
            Ok(ParseProgress::Suspended(Continuation {
                generation: self.generation,
            }))
        } else {
            self.pending_limit = self.next.byte_offset;
            Ok(ParseProgress::Complete)
        }
    }

    /// Runs a continuation returned by an earlier slice.
    ///
    /// Returns `None` when the token is stale: the parser was reset since,
    /// or a later call already reached the pending end.
    ///
    /// # Errors
    ///
    /// Propagates [`ResumeError`] from [`resume_from`](Self::resume_from).
    pub fn continue_with(
        &mut self,
        buffer: &RawBuffer,
        continuation: Continuation,
    ) -> Result<Option<ParseProgress>, ResumeError> {
        if continuation.generation != self.generation {
            trace!(
                stale = continuation.generation,
                current = self.generation,
                "dropping stale continuation"
            );
            return Ok(None);
        }
        if !self.has_pending() {
            return Ok(None);
        }
        let end = self.pending_limit;
        self.resume_from(buffer, end).map(Some)
    }

    /// Drives slices until the parser stops asking for more.
    ///
    /// Convenience for callers without an event loop (tests, batch tools).
    ///
    /// # Errors
    ///
    /// Propagates [`ResumeError`] from [`resume_from`](Self::resume_from).
    pub fn resume_to_end(
        &mut self,
        buffer: &RawBuffer,
        end_offset: usize,
    ) -> Result<ParseProgress, ResumeError> {
        let mut progress = self.resume_from(buffer, end_offset)?;
        while let ParseProgress::Suspended(continuation) = progress {
            progress = self
                .continue_with(buffer, continuation)?
                .unwrap_or(ParseProgress::Complete);
        }
        Ok(progress)
    }

    /// Status of the parse for display.
    #[must_use]
    pub fn summary(&self) -> ParseSummary<'_> {
        ParseSummary {
            format: self.format.as_ref().map(FormatDescriptor::name),
            confirmed_bytes: self.last.byte_offset,
            confirmed_text: self.last.text_position,
        }
    }
}

/// Format name and confirmed progress of a parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseSummary<'a> {
    pub format: Option<&'a str>,
    pub confirmed_bytes: usize,
    pub confirmed_text: usize,
}

/// Parses `bytes` as complete input in one pass.
#[cfg(any(test, feature = "fuzzing"))]
#[must_use]
pub fn parse_all(format: FormatDescriptor, options: ParserOptions, bytes: &[u8]) -> Vec<StyledRun> {
    let buffer = RawBuffer::complete_from(bytes);
    let mut parser = IncrementalParser::with_format(options, format);
    let _ = parser.resume_to_end(&buffer, buffer.len());
    parser.committed().to_vec()
}

/// Parses `bytes` by growing the buffer through `splits` (chunk lengths,
/// taken modulo what is left), then completes the input.
#[cfg(any(test, feature = "fuzzing"))]
#[must_use]
pub fn parse_split(
    format: FormatDescriptor,
    options: ParserOptions,
    bytes: &[u8],
    splits: &[usize],
) -> Vec<StyledRun> {
    let mut buffer = RawBuffer::new();
    let mut parser = IncrementalParser::with_format(options, format);
    let mut fed = 0;
    for split in splits {
        let remaining = bytes.len() - fed;
        if remaining == 0 {
            break;
        }
        let size = 1 + split % remaining;
        buffer.extend_from_slice(&bytes[fed..fed + size]);
        fed += size;
        let _ = parser.resume_to_end(&buffer, buffer.len());
    }
    buffer.extend_from_slice(&bytes[fed..]);
    buffer.mark_complete();
    let _ = parser.resume_to_end(&buffer, buffer.len());
    parser.committed().to_vec()
}
