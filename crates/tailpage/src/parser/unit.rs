//! Per-unit span accumulation.
//!
//! Format bodies describe a unit as a sequence of spans, each tagged with the
//! unit-relative source offset it ends at. The parser replays the spans
//! through [`IncrementalParser::emit`](super::IncrementalParser::emit) so
//! that every emitted run advances the byte offset by exactly the bytes that
//! produced it.

use crate::styled::Attributes;

#[derive(Debug)]
struct Span {
    text: String,
    attributes: Attributes,
    src_end: usize,
}

#[derive(Debug, Default)]
pub(crate) struct UnitWriter {
    spans: Vec<Span>,
    end: usize,
}

impl UnitWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends `text`, produced by source bytes up to `src_end`. Adjacent
    /// spans with equal attributes are merged.
    pub(crate) fn push_str(&mut self, text: &str, attributes: &Attributes, src_end: usize) {
        debug_assert!(src_end >= self.end, "span offsets must not regress");
        self.end = self.end.max(src_end);
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.attributes == *attributes => {
                last.text.push_str(text);
                last.src_end = self.end;
            }
            _ => self.spans.push(Span {
                text: text.to_owned(),
                attributes: attributes.clone(),
                src_end: self.end,
            }),
        }
    }

    pub(crate) fn push_char(&mut self, c: char, attributes: &Attributes, src_end: usize) {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp), attributes, src_end);
    }

    /// Marks bytes up to `src_end` as consumed without producing text.
    pub(crate) fn skip(&mut self, src_end: usize) {
        self.end = self.end.max(src_end);
    }

    /// Yields `(text, attributes, consumed_bytes)` in order. A final entry
    /// with empty text accounts for trailing invisible bytes.
    pub(crate) fn drain(self) -> impl Iterator<Item = (String, Attributes, usize)> {
        let end = self.end;
        let mut prev = 0;
        let mut out: Vec<(String, Attributes, usize)> = self
            .spans
            .into_iter()
            .map(|span| {
                let consumed = span.src_end - prev;
                prev = span.src_end;
                (span.text, span.attributes, consumed)
            })
            .collect();
        if end > prev {
            out.push((String::new(), Attributes::new(), end - prev));
        }
        out.into_iter()
    }
}

/// Splits a unit into its body and the length of its line terminator
/// (`\n` or `\r\n`).
pub(crate) fn split_terminator(unit: &[u8]) -> (&[u8], usize) {
    match unit {
        [body @ .., b'\r', b'\n'] => (body, 2),
        [body @ .., b'\n'] => (body, 1),
        _ => (unit, 0),
    }
}

/// Caret notation for a C0 control character or DEL.
pub(crate) fn caret(c: char) -> Option<[char; 2]> {
    match c {
        '\u{0}'..='\u{1f}' => Some(['^', char::from(b'@' + c as u8)]),
        '\u{7f}' => Some(['^', '?']),
        _ => None,
    }
}
