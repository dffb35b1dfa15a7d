//! Growth detection for live input sources.
//!
//! Sized sources (files) are polled: [`TailWatch::poll`] compares the current
//! size with the last observed one and hands the new bytes to the document.
//! Streams without a size (pipes) push chunks instead; [`ReaderStream`] reads
//! on its own thread and only ever sends owned chunks over a channel, so the
//! buffer and parser are touched from the loop thread alone.

use std::{
    fs::{self, File, Metadata},
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::Duration,
};

use tracing::{debug, warn};

use crate::{
    document::{Document, Ingested},
    error::SourceError,
    format::FormatRegistry,
};

/// A source whose current length can be queried and read at any offset.
pub trait SizedSource {
    /// Current length in bytes, and whether the source now names different
    /// content than at the previous call.
    ///
    /// # Errors
    ///
    /// [`SourceError::Gone`] once the source has been removed.
    fn size(&mut self) -> Result<SourceSize, SourceError>;

    /// Appends up to `len` bytes starting at `offset` to `out`, returning how
    /// many were read. Fewer than `len` means the source ended early.
    ///
    /// # Errors
    ///
    /// Any I/O failure.
    fn read_at(&mut self, offset: u64, len: usize, out: &mut Vec<u8>)
    -> Result<usize, SourceError>;
}

/// Result of [`SizedSource::size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSize {
    pub len: u64,
    /// The source was swapped for another one (e.g. a file renamed over
    /// the watched path). Earlier bytes no longer belong to it.
    pub replaced: bool,
}

impl SourceSize {
    #[must_use]
    pub fn same(len: u64) -> Self {
        Self {
            len,
            replaced: false,
        }
    }
}

/// A source that delivers chunks as they become available.
pub trait ChunkStream {
    /// Next chunk if one has arrived, without blocking.
    ///
    /// # Errors
    ///
    /// The stream failed; no more chunks will come.
    fn try_next(&mut self) -> Result<StreamChunk, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Data(Vec<u8>),
    /// Nothing new yet.
    Pending,
    End,
}

/// A file on disk.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    identity: Option<FileIdentity>,
}

/// Device and inode of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
fn identity(meta: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;

    Some(FileIdentity {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

#[cfg(not(unix))]
fn identity(_meta: &Metadata) -> Option<FileIdentity> {
    None
}

impl FileSource {
    /// # Errors
    ///
    /// The file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| not_found_as_gone(e, &path))?;
        let identity = identity(&file.metadata()?);
        Ok(Self {
            path,
            file,
            identity,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn not_found_as_gone(err: io::Error, path: &Path) -> SourceError {
    if err.kind() == io::ErrorKind::NotFound {
        SourceError::Gone {
            path: path.to_path_buf(),
        }
    } else {
        SourceError::Io(err)
    }
}

impl SizedSource for FileSource {
    fn size(&mut self) -> Result<SourceSize, SourceError> {
        // Stat the path, not the handle: a deleted or replaced file must be
        // noticed even though our handle keeps the old inode alive.
        let meta = fs::metadata(&self.path).map_err(|e| not_found_as_gone(e, &self.path))?;
        let current = identity(&meta);
        if current == self.identity {
            return Ok(SourceSize::same(meta.len()));
        }
        debug!(path = %self.path.display(), "path now names a different file, reopening");
        let file = File::open(&self.path).map_err(|e| not_found_as_gone(e, &self.path))?;
        let meta = file.metadata()?;
        self.identity = identity(&meta);
        self.file = file;
        Ok(SourceSize {
            len: meta.len(),
            replaced: true,
        })
    }

    fn read_at(
        &mut self,
        offset: u64,
        len: usize,
        out: &mut Vec<u8>,
    ) -> Result<usize, SourceError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let before = out.len();
        (&mut self.file).take(len as u64).read_to_end(out)?;
        Ok(out.len() - before)
    }
}

/// Reads any [`Read`] on a background thread and forwards chunks.
#[derive(Debug)]
pub struct ReaderStream {
    rx: Receiver<io::Result<Vec<u8>>>,
    ended: bool,
}

impl ReaderStream {
    /// Spawns the reader thread. `chunk` bounds the size of each read.
    #[must_use]
    pub fn spawn<R: Read + Send + 'static>(mut reader: R, chunk: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        let chunk = chunk.max(1);
        thread::spawn(move || {
            let mut buf = vec![0u8; chunk];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(Ok(Vec::new()));
                        return;
                    }
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                }
            }
        });
        Self { rx, ended: false }
    }
}

impl ChunkStream for ReaderStream {
    fn try_next(&mut self) -> Result<StreamChunk, SourceError> {
        if self.ended {
            return Ok(StreamChunk::End);
        }
        match self.rx.try_recv() {
            Ok(Ok(bytes)) if bytes.is_empty() => {
                self.ended = true;
                Ok(StreamChunk::End)
            }
            Ok(Ok(bytes)) => Ok(StreamChunk::Data(bytes)),
            Ok(Err(e)) => {
                self.ended = true;
                Err(SourceError::Io(e))
            }
            Err(TryRecvError::Empty) => Ok(StreamChunk::Pending),
            Err(TryRecvError::Disconnected) => {
                self.ended = true;
                Err(SourceError::Disconnected)
            }
        }
    }
}

/// What one poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// New bytes `from..to` were appended and handed to the parser.
    Grew {
        from: u64,
        to: u64,
        ingested: Ingested,
    },
    Unchanged,
    /// The source shrank; everything was dropped and re-read from zero.
    Truncated { to: u64, ingested: Ingested },
    /// The source was swapped for a different one; everything was dropped
    /// and the new source read from zero.
    Replaced { to: u64, ingested: Ingested },
}

/// Size-watching state for one sized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailWatch {
    last_observed_size: u64,
    poll_interval: Duration,
}

impl TailWatch {
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            last_observed_size: 0,
            poll_interval,
        }
    }

    #[must_use]
    pub fn last_observed_size(&self) -> u64 {
        self.last_observed_size
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Checks `source` for growth and feeds new bytes into `document`.
    ///
    /// A shrunk or replaced source restarts the document from offset zero.
    ///
    /// # Errors
    ///
    /// Source failures. The read happens before the document is touched, so
    /// on error the document is left as it was before the poll.
    pub fn poll(
        &mut self,
        source: &mut dyn SizedSource,
        document: &mut Document,
        registry: &FormatRegistry,
    ) -> Result<PollOutcome, SourceError> {
        let SourceSize { len: size, replaced } = source.size()?;
        if size == self.last_observed_size && !replaced {
            return Ok(PollOutcome::Unchanged);
        }
        let truncated = !replaced && size < self.last_observed_size;
        let restart = replaced || truncated;
        if restart {
            debug!(
                was = self.last_observed_size,
                now = size,
                replaced,
                "source shrank or was replaced, re-reading from the start"
            );
        }

        let from = if restart { 0 } else { self.last_observed_size };
        let wanted = usize::try_from(size - from).unwrap_or(usize::MAX);
        let mut delta = Vec::with_capacity(wanted.min(1 << 20));
        let read = source.read_at(from, wanted, &mut delta)?;
        if read < wanted {
            warn!(wanted, read, "short read, source changed while reading");
        }
        if restart {
            document.discontinuity();
        }
        let to = from + read as u64;
        self.last_observed_size = to;
        let ingested = document.append(registry, &delta);
        Ok(if replaced {
            PollOutcome::Replaced { to, ingested }
        } else if truncated {
            PollOutcome::Truncated { to, ingested }
        } else {
            PollOutcome::Grew { from, to, ingested }
        })
    }
}
