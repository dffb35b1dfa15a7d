//! Single-threaded event loop over open documents.
//!
//! The [`Pager`] owns the format registry and every [`Document`]. Nothing
//! runs on its own: the caller invokes [`Pager::pump`] from its loop, and each
//! pump fires due tail polls, drains stream chunks that reader threads have
//! delivered, then runs queued parse continuations round-robin until none are
//! left. A continuation is keyed by document id and carries the parser
//! generation it was issued for, so one outliving its document or a format
//! change is dropped without touching anything.

use std::{
    collections::{BTreeMap, VecDeque},
    io::Read,
    path::Path,
    time::Instant,
};

use tracing::{debug, info, trace, warn};

use crate::{
    document::{Document, DocumentEvent, DocumentId, IngestStatus, Ingested},
    error::{PagerError, SourceError},
    format::{FormatDescriptor, FormatKind, FormatRegistry},
    options::PagerOptions,
    parser::{Continuation, ParseProgress},
    tail::{ChunkStream, FileSource, PollOutcome, ReaderStream, SizedSource, StreamChunk, TailWatch},
};

/// Upper bound on one read of a stream source.
const STREAM_CHUNK: usize = 16 * 1024;

enum Source {
    Sized {
        source: Box<dyn SizedSource>,
        watch: TailWatch,
        follow: bool,
        /// `None` means due on the next pump.
        next_poll: Option<Instant>,
    },
    Stream(Box<dyn ChunkStream>),
}

struct Slot {
    document: Document,
    /// Dropped once the source is exhausted, gone or failed.
    source: Option<Source>,
}

/// Work done by one [`Pager::pump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    pub polls: usize,
    pub chunks: usize,
    pub slices: usize,
    /// Continuations dropped because their document closed or reset.
    pub stale: usize,
}

pub struct Pager {
    options: PagerOptions,
    registry: FormatRegistry,
    documents: BTreeMap<DocumentId, Slot>,
    tasks: VecDeque<(DocumentId, Continuation)>,
    next_id: u64,
}

impl core::fmt::Debug for Pager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pager")
            .field("registry", &self.registry)
            .field("documents", &self.documents.len())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl Pager {
    /// Builds the registry from the built-in formats and the priority
    /// overrides in `options`.
    #[must_use]
    pub fn new(options: PagerOptions) -> Self {
        let mut registry = FormatRegistry::with_builtin(options.detect);
        for (name, priority) in &options.priorities {
            if !registry.set_priority(name, *priority) {
                warn!(format = %name, "priority override for unknown format ignored");
            }
        }
        Self {
            options,
            registry,
            documents: BTreeMap::new(),
            tasks: VecDeque::new(),
            next_id: 1,
        }
    }

    #[must_use]
    pub fn options(&self) -> &PagerOptions {
        &self.options
    }

    #[must_use]
    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    fn insert(&mut self, title: String, source: Source) -> DocumentId {
        let id = DocumentId(self.next_id);
        self.next_id += 1;
        info!(document = %id, %title, "document opened");
        let document = Document::new(id, title, self.options.parser);
        self.documents.insert(
            id,
            Slot {
                document,
                source: Some(source),
            },
        );
        id
    }

    /// Opens a sized source. It is read on the next pump; with `follow` it
    /// keeps being polled afterwards.
    pub fn open_source(
        &mut self,
        title: impl Into<String>,
        source: Box<dyn SizedSource>,
        follow: bool,
    ) -> DocumentId {
        let watch = TailWatch::new(self.options.tail.poll_interval);
        self.insert(
            title.into(),
            Source::Sized {
                source,
                watch,
                follow,
                next_poll: None,
            },
        )
    }

    /// Opens a file on disk.
    ///
    /// # Errors
    ///
    /// The file cannot be opened.
    pub fn open_file(
        &mut self,
        path: impl AsRef<Path>,
        follow: bool,
    ) -> Result<DocumentId, PagerError> {
        let path = path.as_ref();
        let source = FileSource::open(path)?;
        Ok(self.open_source(path.display().to_string(), Box::new(source), follow))
    }

    /// Opens a pipe or other unsized reader, read on a background thread.
    pub fn open_stream<R: Read + Send + 'static>(
        &mut self,
        title: impl Into<String>,
        reader: R,
    ) -> DocumentId {
        let stream = ReaderStream::spawn(reader, STREAM_CHUNK);
        self.open_chunk_stream(title, Box::new(stream))
    }

    pub fn open_chunk_stream(
        &mut self,
        title: impl Into<String>,
        stream: Box<dyn ChunkStream>,
    ) -> DocumentId {
        self.insert(title.into(), Source::Stream(stream))
    }

    #[must_use]
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id).map(|slot| &slot.document)
    }

    pub fn document_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.documents.keys().copied()
    }

    /// Looks a format up by name, including the literal fallback.
    fn resolve_format(&self, name: &str) -> Option<FormatDescriptor> {
        self.registry.find(name).cloned().or_else(|| {
            let literal = FormatDescriptor::builtin(FormatKind::Literal);
            literal.is_named(name).then_some(literal)
        })
    }

    /// Pins a document to the named format and reparses it.
    ///
    /// # Errors
    ///
    /// Unknown document or format name.
    pub fn override_format(&mut self, id: DocumentId, name: &str) -> Result<(), PagerError> {
        let format = self
            .resolve_format(name)
            .ok_or_else(|| PagerError::UnknownFormat(name.to_owned()))?;
        let slot = self
            .documents
            .get_mut(&id)
            .ok_or(PagerError::UnknownDocument(id))?;
        let ingested = slot.document.format_override(format);
        schedule(&mut self.tasks, id, ingested);
        Ok(())
    }

    /// Closes a document. Its source and tail watch go with it; queued
    /// continuations become no-ops.
    ///
    /// # Errors
    ///
    /// Unknown document.
    pub fn close(&mut self, id: DocumentId) -> Result<(), PagerError> {
        let slot = self
            .documents
            .remove(&id)
            .ok_or(PagerError::UnknownDocument(id))?;
        slot.document.close();
        Ok(())
    }

    /// Drains pending events from every document.
    pub fn take_signals(&mut self) -> Vec<(DocumentId, DocumentEvent)> {
        let mut out = Vec::new();
        for (id, slot) in &mut self.documents {
            out.extend(slot.document.take_events().into_iter().map(|e| (*id, e)));
        }
        out
    }

    /// Whether any document still has a source that can deliver bytes.
    #[must_use]
    pub fn has_live_sources(&self) -> bool {
        self.documents.values().any(|slot| slot.source.is_some())
    }

    /// Whether continuations are waiting to run.
    #[must_use]
    pub fn has_queued_work(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Earliest time a tail poll is due. `Some(now)`-or-earlier values mean
    /// a poll is already overdue.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.documents
            .values()
            .filter_map(|slot| match &slot.source {
                Some(Source::Sized { next_poll, .. }) => *next_poll,
                _ => None,
            })
            .min()
    }

    /// Runs everything that is due at `now`: source polls, then one slice
    /// for each document that was queued when the call started.
    ///
    /// Continuations produced during the call stay queued for the next one,
    /// so a large backlog never holds the caller for more than a slice per
    /// document.
    pub fn pump(&mut self, now: Instant) -> PumpReport {
        let mut report = PumpReport::default();
        let queued = self.tasks.len();
        for (id, slot) in &mut self.documents {
            let Some(source) = slot.source.as_mut() else {
                continue;
            };
            let finished = match source {
                Source::Sized {
                    source,
                    watch,
                    follow,
                    next_poll,
                } => {
                    if next_poll.is_some_and(|due| due > now) {
                        continue;
                    }
                    report.polls += 1;
                    let finished = poll_sized(
                        *id,
                        source.as_mut(),
                        watch,
                        *follow,
                        &mut slot.document,
                        &self.registry,
                        &mut self.tasks,
                    );
                    *next_poll = Some(now + watch.poll_interval());
                    finished
                }
                Source::Stream(stream) => drain_stream(
                    *id,
                    stream.as_mut(),
                    &mut slot.document,
                    &self.registry,
                    &mut self.tasks,
                    &mut report,
                ),
            };
            if finished {
                slot.source = None;
            }
        }

        for _ in 0..queued {
            let Some((id, continuation)) = self.tasks.pop_front() else {
                break;
            };
            let Some(slot) = self.documents.get_mut(&id) else {
                trace!(document = %id, "continuation for closed document dropped");
                report.stale += 1;
                continue;
            };
            match slot.document.continue_parse(continuation) {
                Some(ingested) => {
                    report.slices += 1;
                    schedule(&mut self.tasks, id, ingested);
                }
                None => report.stale += 1,
            }
        }
        report
    }
}

/// Queues a suspended parse, keeping at most one entry per document.
fn schedule(tasks: &mut VecDeque<(DocumentId, Continuation)>, id: DocumentId, ingested: Ingested) {
    let ParseProgress::Suspended(continuation) = ingested.progress else {
        return;
    };
    match tasks.iter_mut().find(|(queued, _)| *queued == id) {
        Some(entry) => entry.1 = continuation,
        None => tasks.push_back((id, continuation)),
    }
}

/// Polls one sized source; returns whether it is done for good.
fn poll_sized(
    id: DocumentId,
    source: &mut dyn SizedSource,
    watch: &mut TailWatch,
    follow: bool,
    document: &mut Document,
    registry: &FormatRegistry,
    tasks: &mut VecDeque<(DocumentId, Continuation)>,
) -> bool {
    match watch.poll(source, document, registry) {
        Ok(outcome) => {
            match outcome {
                PollOutcome::Grew { ingested, .. }
                | PollOutcome::Truncated { ingested, .. }
                | PollOutcome::Replaced { ingested, .. } => {
                    schedule(tasks, id, ingested);
                }
                PollOutcome::Unchanged => {}
            }
            if follow {
                document.set_status(IngestStatus::Following);
                false
            } else {
                let ingested = document.finish_input(registry);
                schedule(tasks, id, ingested);
                true
            }
        }
        Err(SourceError::Gone { path }) => {
            debug!(document = %id, path = %path.display(), "followed source removed");
            document.detach();
            true
        }
        Err(err) => {
            document.fail(&err);
            true
        }
    }
}

/// Feeds every chunk that has arrived; returns whether the stream ended.
fn drain_stream(
    id: DocumentId,
    stream: &mut dyn ChunkStream,
    document: &mut Document,
    registry: &FormatRegistry,
    tasks: &mut VecDeque<(DocumentId, Continuation)>,
    report: &mut PumpReport,
) -> bool {
    loop {
        match stream.try_next() {
            Ok(StreamChunk::Data(bytes)) => {
                report.chunks += 1;
                let ingested = document.append(registry, &bytes);
                schedule(tasks, id, ingested);
            }
            Ok(StreamChunk::Pending) => return false,
            Ok(StreamChunk::End) => {
                let ingested = document.finish_input(registry);
                schedule(tasks, id, ingested);
                return true;
            }
            Err(err) => {
                document.fail(&err);
                return true;
            }
        }
    }
}
