use core::fmt;
use std::collections::BTreeMap;

/// Display attribute carried by a [`StyledRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeKey {
    Bold,
    Dim,
    Italic,
    Underline,
    Reverse,
    Monospace,
    Foreground,
    Background,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Color {
    /// One of the 256 indexed terminal colors; 0-15 are the classic palette.
    Indexed(u8),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeValue {
    On,
    Color(Color),
    Text(String),
}

/// Ordered mapping from attribute keys to values.
///
/// The empty mapping is plain, unstyled text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Attributes(BTreeMap<AttributeKey, AttributeValue>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: AttributeKey, value: AttributeValue) -> Self {
        self.0.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_flag(self, key: AttributeKey) -> Self {
        self.with(key, AttributeValue::On)
    }

    pub fn set(&mut self, key: AttributeKey, value: AttributeValue) {
        self.0.insert(key, value);
    }

    /// Sets or clears a flag attribute.
    pub fn toggle(&mut self, key: AttributeKey, on: bool) {
        if on {
            self.0.insert(key, AttributeValue::On);
        } else {
            self.0.remove(&key);
        }
    }

    pub fn remove(&mut self, key: AttributeKey) {
        self.0.remove(&key);
    }

    #[must_use]
    pub fn get(&self, key: AttributeKey) -> Option<&AttributeValue> {
        self.0.get(&key)
    }

    #[must_use]
    pub fn contains(&self, key: AttributeKey) -> bool {
        self.0.contains_key(&key)
    }

    #[must_use]
    pub fn color(&self, key: AttributeKey) -> Option<Color> {
        match self.0.get(&key) {
            Some(AttributeValue::Color(c)) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &AttributeValue)> {
        self.0.iter()
    }
}

/// A span of text with the attributes it is displayed with.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StyledRun {
    pub text: String,
    pub attributes: Attributes,
}

impl StyledRun {
    #[must_use]
    pub fn new(text: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }

    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Attributes::new())
    }

    /// Length of the run in text positions (chars).
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Compact single-line rendering used by snapshot tests and diagnostics:
/// unstyled runs print as-is, styled runs as `[text]{key,key=value}`.
impl fmt::Display for StyledRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attributes.is_empty() {
            return f.write_str(&self.text);
        }
        write!(f, "[{}]{{", self.text)?;
        for (i, (key, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match value {
                AttributeValue::On => write!(f, "{key:?}")?,
                AttributeValue::Color(Color::Indexed(n)) => write!(f, "{key:?}={n}")?,
                AttributeValue::Color(Color::Rgb(r, g, b)) => {
                    write!(f, "{key:?}=#{r:02x}{g:02x}{b:02x}")?;
                }
                AttributeValue::Text(t) => write!(f, "{key:?}={t}")?,
            }
        }
        f.write_str("}")
    }
}

/// Concatenates the text of `runs`, ignoring attributes.
#[must_use]
pub fn plain_text(runs: &[StyledRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// Renders `runs` with the [`StyledRun`] display form.
#[must_use]
pub fn render_runs(runs: &[StyledRun]) -> String {
    use core::fmt::Write;

    let mut out = String::new();
    for run in runs {
        let _ = write!(out, "{run}");
    }
    out
}
