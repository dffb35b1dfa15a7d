//! Input formats and the priority-ordered registry that detects them.
//!
//! Every format is one variant of [`FormatKind`] and provides two things:
//! - a pure detector over a byte [`Sample`] answering [`Detection::Match`],
//!   [`Detection::NoMatch`] or [`Detection::InsufficientData`], safe to call
//!   again as the sample grows;
//! - a parsing body that turns one unit (a line, a forced split of a runaway
//!   line, or the tail at end of input) into styled spans.
//!
//! A [`FormatDescriptor`] names a kind and gives it a priority. The
//! [`FormatRegistry`] keeps descriptors sorted by descending priority with
//! registration order as tie-break, and answers which descriptors claim a
//! sample. Picking the current format from those answers is document policy.

mod ansi;
mod markup;
mod overstrike;
mod plain;

#[cfg(test)]
mod tests;

use core::fmt;
use std::borrow::Cow;

use bstr::ByteSlice;

pub(crate) use markup::MarkupState;

use crate::{
    options::DetectOptions,
    parser::unit::{UnitWriter, split_terminator},
    styled::Attributes,
};

/// Verdict of a detector over a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detection {
    Match,
    NoMatch,
    /// The sample is too short to decide; ask again once more bytes exist.
    InsufficientData,
}

/// Leading bytes of an input handed to detectors.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Sample<'a> {
    bytes: &'a [u8],
    complete: bool,
}

impl<'a> Sample<'a> {
    /// A sample of input that may still grow.
    #[must_use]
    pub fn partial(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            complete: false,
        }
    }

    /// A sample that will not grow any further, either because the input
    /// ended or because the detection window is full.
    #[must_use]
    pub fn complete(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            complete: true,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// `InsufficientData` while the sample can grow, `NoMatch` otherwise.
    pub(crate) fn undecided(&self) -> Detection {
        if self.complete {
            Detection::NoMatch
        } else {
            Detection::InsufficientData
        }
    }
}

impl fmt::Debug for Sample<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("bytes", &self.bytes.as_bstr())
            .field("complete", &self.complete)
            .finish()
    }
}

/// The fixed set of formats this crate can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FormatKind {
    /// Unstyled text. Matches anything.
    Plain,
    /// Text with ANSI SGR color and attribute escapes.
    Ansi,
    /// Backspace overstrike as produced by `nroff` for man pages.
    Overstrike,
    /// HTML-like tagged text.
    Markup,
    /// Fallback when nothing claims the input: control bytes are shown in
    /// caret notation. Never answers `Match`.
    Literal,
}

impl FormatKind {
    pub const BUILTIN: [FormatKind; 4] = [
        FormatKind::Plain,
        FormatKind::Ansi,
        FormatKind::Overstrike,
        FormatKind::Markup,
    ];

    /// Short lowercase name accepted wherever a format is named by the user.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            FormatKind::Plain => "plain",
            FormatKind::Ansi => "ansi",
            FormatKind::Overstrike => "overstrike",
            FormatKind::Markup => "markup",
            FormatKind::Literal => "literal",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            FormatKind::Plain => "Plain Text",
            FormatKind::Ansi => "ANSI Color",
            FormatKind::Overstrike => "Man Page",
            FormatKind::Markup => "Markup",
            FormatKind::Literal => "Literal",
        }
    }

    #[must_use]
    pub fn default_priority(self) -> i32 {
        match self {
            FormatKind::Plain => 0,
            FormatKind::Markup => 10,
            FormatKind::Overstrike => 20,
            FormatKind::Ansi => 30,
            FormatKind::Literal => i32::MIN,
        }
    }

    /// Runs this kind's detector. Pure in `sample`.
    #[must_use]
    pub fn detect(self, sample: Sample<'_>) -> Detection {
        match self {
            FormatKind::Plain => Detection::Match,
            FormatKind::Ansi => ansi::detect(sample),
            FormatKind::Overstrike => overstrike::detect(sample),
            FormatKind::Markup => markup::detect(sample),
            FormatKind::Literal => Detection::NoMatch,
        }
    }

    pub(crate) fn initial_state(self) -> FormatState {
        match self {
            FormatKind::Ansi => FormatState::Ansi(Attributes::new()),
            FormatKind::Markup => FormatState::Markup(MarkupState::default()),
            FormatKind::Plain | FormatKind::Overstrike | FormatKind::Literal => {
                FormatState::Stateless
            }
        }
    }

    /// Parses one unit into `w`.
    pub(crate) fn parse_unit(self, state: &mut FormatState, unit: &[u8], w: &mut UnitWriter) {
        let (body, terminator) = split_terminator(unit);
        match (self, state) {
            (FormatKind::Plain, _) => plain::parse_body(body, w),
            (FormatKind::Literal, _) => plain::parse_body_literal(body, w),
            (FormatKind::Overstrike, _) => overstrike::parse_body(body, w),
            (FormatKind::Ansi, FormatState::Ansi(style)) => ansi::parse_body(style, body, w),
            (FormatKind::Markup, FormatState::Markup(m)) => m.parse_body(body, w),
            (kind, state) => {
                // State always comes from `initial_state`; a mismatch means
                // the caller swapped formats without a reset.
                debug_assert!(false, "state {state:?} does not belong to {kind:?}");
                *state = kind.initial_state();
                plain::parse_body_literal(body, w);
            }
        }
        if terminator > 0 {
            w.push_str("\n", &Attributes::new(), unit.len());
        }
        w.skip(unit.len());
    }

    /// Flushes constructs still open when the input ends. Consumes no bytes.
    pub(crate) fn finish_input(self, state: &mut FormatState, w: &mut UnitWriter) {
        if let (FormatKind::Markup, FormatState::Markup(m)) = (self, state) {
            m.finish(w);
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Parse state a format carries from one unit to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) enum FormatState {
    #[default]
    Stateless,
    /// Current SGR style.
    Ansi(Attributes),
    Markup(MarkupState),
}

/// A named, prioritized format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    name: Cow<'static, str>,
    priority: i32,
    kind: FormatKind,
}

impl FormatDescriptor {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>, priority: i32, kind: FormatKind) -> Self {
        Self {
            name: name.into(),
            priority,
            kind,
        }
    }

    /// The descriptor for `kind` with its stock name and priority.
    #[must_use]
    pub fn builtin(kind: FormatKind) -> Self {
        Self::new(kind.display_name(), kind.default_priority(), kind)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    #[must_use]
    pub fn detect(&self, sample: Sample<'_>) -> Detection {
        self.kind.detect(sample)
    }

    /// Whether `name` refers to this descriptor, by display name or kind
    /// slug, ignoring ASCII case.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.kind.slug().eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Outcome of applying the default selection policy to a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The highest-priority match; final for this sample.
    Decided(FormatDescriptor),
    /// Some detector needs more bytes before the choice is final.
    Deferred,
    /// Nothing matched; the input is shown as literal text.
    Unparseable(FormatDescriptor),
}

#[derive(Debug, Clone)]
struct Entry {
    descriptor: FormatDescriptor,
    seq: usize,
}

/// Ordered set of [`FormatDescriptor`]s.
///
/// Built once at start-up and handed to documents by reference.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    entries: Vec<Entry>,
    next_seq: usize,
    options: DetectOptions,
}

impl FormatRegistry {
    #[must_use]
    pub fn new(options: DetectOptions) -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
            options,
        }
    }

    /// A registry holding every builtin format at its stock priority.
    #[must_use]
    pub fn with_builtin(options: DetectOptions) -> Self {
        let mut registry = Self::new(options);
        for kind in FormatKind::BUILTIN {
            registry.register(FormatDescriptor::builtin(kind));
        }
        registry
    }

    #[must_use]
    pub fn options(&self) -> &DetectOptions {
        &self.options
    }

    /// Adds `descriptor`. A descriptor with the same name replaces the
    /// existing one but keeps its registration slot for tie-breaking.
    pub fn register(&mut self, descriptor: FormatDescriptor) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.name == descriptor.name)
        {
            entry.descriptor = descriptor;
        } else {
            self.entries.push(Entry {
                descriptor,
                seq: self.next_seq,
            });
            self.next_seq += 1;
        }
        self.entries
            .sort_by(|a, b| b.descriptor.priority.cmp(&a.descriptor.priority).then(a.seq.cmp(&b.seq)));
    }

    /// Changes the priority of the descriptor called `name`. Returns `false`
    /// when no such descriptor is registered.
    pub fn set_priority(&mut self, name: &str, priority: i32) -> bool {
        let Some(found) = self.find(name).cloned() else {
            return false;
        };
        self.register(FormatDescriptor { priority, ..found });
        true
    }

    /// Descriptors in priority order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&FormatDescriptor> {
        self.descriptors().find(|d| d.is_named(name))
    }

    /// The descriptor used when nothing matches: a registered plain format,
    /// else [`FormatKind::Literal`].
    #[must_use]
    pub fn fallback(&self) -> (FormatDescriptor, bool) {
        match self.descriptors().find(|d| d.kind == FormatKind::Plain) {
            Some(plain) => (plain.clone(), true),
            None => (FormatDescriptor::builtin(FormatKind::Literal), false),
        }
    }

    /// Clamps `sample` to the detection window and applies the minimum
    /// sample rule.
    fn window<'a>(&self, sample: Sample<'a>) -> Sample<'a> {
        if sample.bytes.len() >= self.options.max_sample {
            Sample::complete(&sample.bytes[..self.options.max_sample])
        } else {
            sample
        }
    }

    /// Every descriptor's verdict on `sample`, in priority order.
    #[must_use]
    pub fn verdicts(&self, sample: Sample<'_>) -> Vec<(&FormatDescriptor, Detection)> {
        let sample = self.window(sample);
        let short = !sample.complete && sample.bytes.len() < self.options.min_sample;
        self.descriptors()
            .map(|d| {
                let verdict = match d.detect(sample) {
                    Detection::NoMatch if short => Detection::InsufficientData,
                    v => v,
                };
                (d, verdict)
            })
            .collect()
    }

    /// Descriptors answering `Match`, highest priority first.
    #[must_use]
    pub fn applicable_formats(&self, sample: Sample<'_>) -> Vec<FormatDescriptor> {
        self.verdicts(sample)
            .into_iter()
            .filter(|(_, v)| *v == Detection::Match)
            .map(|(d, _)| d.clone())
            .collect()
    }

    /// True when no descriptor needs more data to decide on `sample`.
    #[must_use]
    pub fn detection_complete(&self, sample: Sample<'_>) -> bool {
        self.verdicts(sample)
            .iter()
            .all(|(_, v)| *v != Detection::InsufficientData)
    }

    /// Default policy: the highest-priority match once detection is
    /// complete, the fallback when nothing matches.
    ///
    /// A match that outranks every undecided descriptor is final even while
    /// lower-priority detectors still want more data.
    #[must_use]
    pub fn select(&self, sample: Sample<'_>) -> Selection {
        for (descriptor, verdict) in self.verdicts(sample) {
            match verdict {
                Detection::Match => return Selection::Decided(descriptor.clone()),
                Detection::InsufficientData => return Selection::Deferred,
                Detection::NoMatch => {}
            }
        }
        match self.fallback() {
            (plain, true) => Selection::Decided(plain),
            (literal, false) => Selection::Unparseable(literal),
        }
    }
}
