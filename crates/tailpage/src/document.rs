use core::fmt;

use tracing::{debug, info, warn};

use crate::{
    buffer::RawBuffer,
    checkpoint::Checkpoint,
    error::SourceError,
    format::{FormatDescriptor, FormatRegistry, Sample, Selection},
    options::ParserOptions,
    parser::{Continuation, IncrementalParser, ParseProgress},
    styled::StyledRun,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where ingestion of a document's source stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStatus {
    /// Reading what the source already holds.
    Loading,
    /// Caught up; watching for growth.
    Following,
    /// The whole input has been received.
    Complete,
    /// Reading failed; what was parsed stays available.
    Failed(String),
    /// The followed source was removed.
    Detached,
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStatus::Loading => f.write_str("loading"),
            IngestStatus::Following => f.write_str("following"),
            IngestStatus::Complete => f.write_str("complete"),
            IngestStatus::Failed(reason) => write!(f, "failed: {reason}"),
            IngestStatus::Detached => f.write_str("source removed"),
        }
    }
}

/// Notifications for the presentation layer, drained with
/// [`Document::take_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// The current format was decided or changed; output restarts.
    FormatChanged { format: String },
    /// The last checkpoint advanced.
    ContentExtended { committed: Checkpoint },
    /// The source shrank and everything was dropped.
    Discontinuity,
    StatusChanged(IngestStatus),
}

/// What a call that fed the parser achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ingested {
    pub end_offset: usize,
    pub progress: ParseProgress,
}

/// Status line material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub format: Option<String>,
    pub unparseable: bool,
    pub confirmed_bytes: usize,
    pub confirmed_text: usize,
    pub received_bytes: usize,
    pub status: IngestStatus,
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.format, self.unparseable) {
            (Some(name), false) => write!(f, "{name}")?,
            (Some(name), true) => write!(f, "{name} (unrecognised input)")?,
            (None, _) => f.write_str("detecting format")?,
        }
        write!(
            f,
            ", {} of {} bytes, {} chars, {}",
            self.confirmed_bytes, self.received_bytes, self.confirmed_text, self.status
        )
    }
}

/// One open input: its raw bytes, its parser and the format policy.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    title: String,
    buffer: RawBuffer,
    parser: IncrementalParser,
    applicable: Vec<FormatDescriptor>,
    /// The user chose the format; detection no longer runs.
    pinned: bool,
    /// The detection window is full or the input complete.
    detection_settled: bool,
    unparseable: bool,
    status: IngestStatus,
    events: Vec<DocumentEvent>,
}

impl Document {
    #[must_use]
    pub fn new(id: DocumentId, title: impl Into<String>, options: ParserOptions) -> Self {
        Self {
            id,
            title: title.into(),
            buffer: RawBuffer::new(),
            parser: IncrementalParser::new(options),
            applicable: Vec::new(),
            pinned: false,
            detection_settled: false,
            unparseable: false,
            status: IngestStatus::Loading,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn buffer(&self) -> &RawBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn parser(&self) -> &IncrementalParser {
        &self.parser
    }

    /// Committed output, for rendering.
    #[must_use]
    pub fn committed(&self) -> &[StyledRun] {
        self.parser.committed()
    }

    /// Formats that matched the latest detection sample.
    #[must_use]
    pub fn applicable_formats(&self) -> &[FormatDescriptor] {
        &self.applicable
    }

    #[must_use]
    pub fn current_format(&self) -> Option<&FormatDescriptor> {
        self.parser.format()
    }

    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    #[must_use]
    pub fn status(&self) -> &IngestStatus {
        &self.status
    }

    pub fn take_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    /// Appends bytes received from the source and parses them.
    pub fn append(&mut self, registry: &FormatRegistry, bytes: &[u8]) -> Ingested {
        self.buffer.extend_from_slice(bytes);
        self.new_bytes_available(registry, self.buffer.len())
    }

    /// Bytes up to `up_to` are in the buffer: settle the format if needed and
    /// resume parsing.
    pub fn new_bytes_available(&mut self, registry: &FormatRegistry, up_to: usize) -> Ingested {
        if !self.pinned {
            self.detect(registry);
        }
        self.resume(up_to)
    }

    fn resume(&mut self, up_to: usize) -> Ingested {
        let before = self.parser.last();
        let progress = match self.parser.resume_from(&self.buffer, up_to) {
            Ok(progress) => progress,
            Err(err) => {
                warn!(document = %self.id, %err, "resume rejected");
                ParseProgress::Complete
            }
        };
        self.note_progress(before);
        Ingested {
            end_offset: up_to,
            progress,
        }
    }

    fn detect(&mut self, registry: &FormatRegistry) {
        if self.detection_settled {
            return;
        }
        let window = registry.options().max_sample;
        let bytes = self.buffer.range(0, window);
        let sample = if self.buffer.is_complete() {
            Sample::complete(bytes)
        } else {
            Sample::partial(bytes)
        };
        self.applicable = registry.applicable_formats(sample);
        self.detection_settled = self.buffer.is_complete() || self.buffer.len() >= window;
        match registry.select(sample) {
            Selection::Decided(format) => self.adopt(format, false),
            Selection::Unparseable(format) => self.adopt(format, true),
            Selection::Deferred => {
                debug!(document = %self.id, len = bytes.len(), "format detection deferred");
            }
        }
    }

    /// Switches to `format` unless it is already current.
    fn adopt(&mut self, format: FormatDescriptor, unparseable: bool) {
        self.unparseable = unparseable;
        if self.parser.format() == Some(&format) {
            return;
        }
        info!(
            document = %self.id,
            from = self.parser.format().map(FormatDescriptor::name),
            to = format.name(),
            "format selected"
        );
        self.events.push(DocumentEvent::FormatChanged {
            format: format.name().to_owned(),
        });
        self.parser.reset(Some(format));
    }

    /// Pins `format` and reparses everything under it.
    pub fn format_override(&mut self, format: FormatDescriptor) -> Ingested {
        info!(document = %self.id, format = format.name(), "format overridden");
        self.pinned = true;
        self.unparseable = false;
        self.events.push(DocumentEvent::FormatChanged {
            format: format.name().to_owned(),
        });
        self.parser.reset(Some(format));
        self.resume(self.buffer.len())
    }

    /// Runs a continuation scheduled after a suspended slice. Stale tokens
    /// do nothing and return `None`.
    pub fn continue_parse(&mut self, continuation: Continuation) -> Option<Ingested> {
        let before = self.parser.last();
        match self.parser.continue_with(&self.buffer, continuation) {
            Ok(Some(progress)) => {
                self.note_progress(before);
                Some(Ingested {
                    end_offset: self.buffer.len(),
                    progress,
                })
            }
            Ok(None) => None,
            Err(err) => {
                warn!(document = %self.id, %err, "continuation rejected");
                None
            }
        }
    }

    /// The source shrank or was replaced: start over from offset zero.
    pub fn discontinuity(&mut self) {
        info!(document = %self.id, dropped = self.buffer.len(), "source discontinuity");
        self.buffer.clear();
        let format = if self.pinned {
            self.parser.format().cloned()
        } else {
            None
        };
        self.parser.reset(format);
        self.applicable.clear();
        self.detection_settled = false;
        self.unparseable = false;
        self.events.push(DocumentEvent::Discontinuity);
    }

    /// No more bytes will arrive; the trailing unit is committed.
    pub fn finish_input(&mut self, registry: &FormatRegistry) -> Ingested {
        self.buffer.mark_complete();
        self.set_status(IngestStatus::Complete);
        self.new_bytes_available(registry, self.buffer.len())
    }

    pub fn fail(&mut self, err: &SourceError) {
        warn!(document = %self.id, %err, "ingestion stopped");
        self.set_status(IngestStatus::Failed(err.to_string()));
    }

    /// Marks the source as gone. Parsed content stays.
    pub fn detach(&mut self) {
        info!(document = %self.id, "source detached");
        self.set_status(IngestStatus::Detached);
    }

    pub fn set_status(&mut self, status: IngestStatus) {
        if self.status != status {
            self.status = status.clone();
            self.events.push(DocumentEvent::StatusChanged(status));
        }
    }

    #[must_use]
    pub fn status_summary(&self) -> StatusSummary {
        let summary = self.parser.summary();
        StatusSummary {
            format: summary.format.map(str::to_owned),
            unparseable: self.unparseable,
            confirmed_bytes: summary.confirmed_bytes,
            confirmed_text: summary.confirmed_text,
            received_bytes: self.buffer.len(),
            status: self.status.clone(),
        }
    }

    /// Tears the document down. Continuations still queued for it find no
    /// document and are dropped.
    pub fn close(self) {
        debug!(document = %self.id, title = %self.title, "document closed");
    }

    fn note_progress(&mut self, before: Checkpoint) {
        let now = self.parser.last();
        if now != before && now.byte_offset > 0 {
            self.events
                .push(DocumentEvent::ContentExtended { committed: now });
        }
    }
}
