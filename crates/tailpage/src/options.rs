use std::{collections::BTreeMap, time::Duration};

/// Configuration options for the incremental parser.
///
/// # Examples
///
/// ```rust
/// use tailpage::{IncrementalParser, ParserOptions};
///
/// let parser = IncrementalParser::new(ParserOptions {
///     slice_bytes: 4096,
///     ..Default::default()
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserOptions {
    /// Upper bound on the number of bytes parsed by one call to
    /// `resume_from` before it yields back to the caller.
    ///
    /// The bound is checked between units, so a slice always finishes the
    /// unit it started. A value of zero is treated as one.
    ///
    /// # Default
    ///
    /// `65536`
    pub slice_bytes: usize,

    /// Length at which an unterminated unit is split.
    ///
    /// Without this a runaway line with no newline would be re-parsed and
    /// chomped on every resume. The split point depends only on the unit's
    /// start offset, so incremental and batch parsing still agree.
    ///
    /// # Default
    ///
    /// `1048576`
    pub max_unit_bytes: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            slice_bytes: 64 * 1024,
            max_unit_bytes: 1024 * 1024,
        }
    }
}

/// Configuration options for format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectOptions {
    /// Minimum sample length for a `NoMatch` verdict to count as final.
    ///
    /// Shorter samples of input that is still growing turn every `NoMatch`
    /// into `InsufficientData`.
    ///
    /// # Default
    ///
    /// `64`
    pub min_sample: usize,

    /// Number of leading bytes handed to detectors.
    ///
    /// Once the input is at least this long the detection verdict can no
    /// longer change.
    ///
    /// # Default
    ///
    /// `8192`
    pub max_sample: usize,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            min_sample: 64,
            max_sample: 8 * 1024,
        }
    }
}

/// Configuration options for tail-watching sized sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TailOptions {
    /// Interval between size checks of a followed file.
    ///
    /// # Default
    ///
    /// one second
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub poll_interval: Duration,

    /// Whether sized sources stay watched after the initial read.
    ///
    /// # Default
    ///
    /// `false`
    pub follow: bool,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            follow: false,
        }
    }
}

/// Options for a [`Pager`](crate::Pager) and every document it opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PagerOptions {
    pub parser: ParserOptions,
    pub detect: DetectOptions,
    pub tail: TailOptions,
    /// Priority overrides by format name, applied when the registry is
    /// built.
    pub priorities: BTreeMap<String, i32>,
}

#[cfg(feature = "serde")]
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
