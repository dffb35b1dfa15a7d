//! Writes committed runs to the terminal as they are committed.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{self, Attribute, ContentStyle, Print, PrintStyledContent, StyledContent},
};
use tailpage::{AttributeKey, AttributeValue, Attributes, Color, DocumentEvent, StyledRun};

fn terminal_color(color: Color) -> style::Color {
    match color {
        Color::Indexed(n) => style::Color::AnsiValue(n),
        Color::Rgb(r, g, b) => style::Color::Rgb { r, g, b },
    }
}

fn content_style(attributes: &Attributes) -> ContentStyle {
    let mut out = ContentStyle::new();
    for (key, value) in attributes.iter() {
        match (key, value) {
            (AttributeKey::Bold, _) => out.attributes.set(Attribute::Bold),
            (AttributeKey::Dim, _) => out.attributes.set(Attribute::Dim),
            (AttributeKey::Italic, _) => out.attributes.set(Attribute::Italic),
            (AttributeKey::Underline, _) => out.attributes.set(Attribute::Underlined),
            (AttributeKey::Reverse, _) => out.attributes.set(Attribute::Reverse),
            (AttributeKey::Foreground, AttributeValue::Color(c)) => {
                out.foreground_color = Some(terminal_color(*c));
            }
            (AttributeKey::Background, AttributeValue::Color(c)) => {
                out.background_color = Some(terminal_color(*c));
            }
            _ => {}
        }
    }
    out
}

/// Writes `runs`, styled when `color` is set.
pub fn write_runs<W: Write>(out: &mut W, runs: &[StyledRun], color: bool) -> io::Result<()> {
    for run in runs {
        if !color || run.attributes.is_empty() {
            queue!(out, Print(&run.text))?;
            continue;
        }
        let link = match run.attributes.get(AttributeKey::Link) {
            Some(AttributeValue::Text(uri)) => Some(uri),
            _ => None,
        };
        if let Some(uri) = link {
            queue!(out, Print(format!("\x1b]8;;{uri}\x1b\\")))?;
        }
        let styled = StyledContent::new(content_style(&run.attributes), run.text.as_str());
        queue!(out, PrintStyledContent(styled))?;
        if link.is_some() {
            queue!(out, Print("\x1b]8;;\x1b\\"))?;
        }
    }
    Ok(())
}

/// Tracks how much of a document has been written out.
#[derive(Debug)]
pub struct View {
    color: bool,
    shown: usize,
    restart: Option<String>,
}

impl View {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            shown: 0,
            restart: None,
        }
    }

    /// Output restarts from the top after a format change or truncation.
    pub fn note(&mut self, event: &DocumentEvent) {
        match event {
            DocumentEvent::FormatChanged { format } => {
                self.restart = Some(format!("shown as {format}"));
            }
            DocumentEvent::Discontinuity => self.restart = Some("source truncated".to_owned()),
            DocumentEvent::ContentExtended { .. } | DocumentEvent::StatusChanged(_) => {}
        }
    }

    /// Writes runs committed since the last call.
    pub fn flush<W: Write>(&mut self, out: &mut W, runs: &[StyledRun]) -> io::Result<()> {
        if let Some(reason) = self.restart.take() {
            if self.shown > 0 {
                writeln!(out)?;
                writeln!(out, "--- {reason} ---")?;
            }
            self.shown = 0;
        }
        let start = self.shown.min(runs.len());
        write_runs(out, &runs[start..], self.color)?;
        self.shown = runs.len();
        out.flush()
    }
}
