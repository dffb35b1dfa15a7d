//! Pager options from an optional JSON file plus command-line overrides.
//!
//! Every field of the file is optional; missing ones keep their defaults.
//!
//! ```json
//! {
//!   "parser": { "slice_bytes": 65536, "max_unit_bytes": 1048576 },
//!   "detect": { "min_sample": 64, "max_sample": 8192 },
//!   "tail": { "poll_interval": 1000, "follow": true },
//!   "priorities": { "plain": 5 }
//! }
//! ```

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use tailpage::PagerOptions;
use tracing::debug;

/// Flags that take precedence over the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub follow: bool,
    pub poll_ms: Option<u64>,
    pub slice_bytes: Option<usize>,
}

pub fn load(path: Option<&Path>) -> Result<PagerOptions> {
    let Some(path) = path else {
        return Ok(PagerOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let options = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    debug!(path = %path.display(), ?options, "config loaded");
    Ok(options)
}

pub fn apply(options: &mut PagerOptions, overrides: Overrides) {
    if overrides.follow {
        options.tail.follow = true;
    }
    if let Some(ms) = overrides.poll_ms {
        options.tail.poll_interval = Duration::from_millis(ms);
    }
    if let Some(bytes) = overrides.slice_bytes {
        options.parser.slice_bytes = bytes;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        assert_eq!(load(None).unwrap(), PagerOptions::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tail": {{"poll_interval": 250}}, "priorities": {{"plain": 50}}}}"#
        )
        .unwrap();
        let options = load(Some(file.path())).unwrap();
        assert_eq!(options.tail.poll_interval, Duration::from_millis(250));
        assert!(!options.tail.follow);
        assert_eq!(options.parser, tailpage::ParserOptions::default());
        assert_eq!(options.priorities.get("plain"), Some(&50));
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("parsing config"));
    }

    #[test]
    fn flags_override_file_values() {
        let mut options = PagerOptions::default();
        apply(
            &mut options,
            Overrides {
                follow: true,
                poll_ms: Some(20),
                slice_bytes: Some(4096),
            },
        );
        assert!(options.tail.follow);
        assert_eq!(options.tail.poll_interval, Duration::from_millis(20));
        assert_eq!(options.parser.slice_bytes, 4096);
    }
}
