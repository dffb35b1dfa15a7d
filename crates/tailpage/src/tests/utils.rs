use crate::{SourceError, SourceSize, tail::SizedSource};

/// In-memory growable source that records every read.
#[derive(Debug, Default)]
pub(crate) struct MemorySource {
    pub(crate) data: Vec<u8>,
    pub(crate) reads: Vec<(u64, usize)>,
    pub(crate) gone: bool,
    /// Set by [`MemorySource::swap`]; reported once by `size`.
    pub(crate) swapped: bool,
    /// Makes every `read_at` fail.
    pub(crate) broken: bool,
}

impl MemorySource {
    pub(crate) fn grow(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub(crate) fn replace(&mut self, bytes: &[u8]) {
        self.data = bytes.to_vec();
    }

    /// Replaces the content with that of a different source.
    pub(crate) fn swap(&mut self, bytes: &[u8]) {
        self.replace(bytes);
        self.swapped = true;
    }
}

impl SizedSource for MemorySource {
    fn size(&mut self) -> Result<SourceSize, SourceError> {
        if self.gone {
            return Err(SourceError::Gone {
                path: "memory".into(),
            });
        }
        Ok(SourceSize {
            len: self.data.len() as u64,
            replaced: std::mem::take(&mut self.swapped),
        })
    }

    fn read_at(
        &mut self,
        offset: u64,
        len: usize,
        out: &mut Vec<u8>,
    ) -> Result<usize, SourceError> {
        if self.broken {
            return Err(SourceError::Io(std::io::Error::other("read failed")));
        }
        let start = usize::try_from(offset).unwrap().min(self.data.len());
        let end = (start + len).min(self.data.len());
        out.extend_from_slice(&self.data[start..end]);
        self.reads.push((offset, end - start));
        Ok(end - start)
    }
}

/// `len` bytes of newline-terminated filler lines.
pub(crate) fn lines(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| if i % 10 == 9 { b'\n' } else { b'a' + (i % 26) as u8 })
        .collect()
}
