use bstr::ByteSlice;

use super::{Detection, Sample};
use crate::{
    parser::unit::UnitWriter,
    styled::{AttributeKey, AttributeValue, Attributes, Color},
};

/// Matches when the first non-whitespace byte opens a tag.
pub(super) fn detect(sample: Sample<'_>) -> Detection {
    let bytes = sample.bytes();
    let Some(start) = bytes.iter().position(|b| !b.is_ascii_whitespace()) else {
        return sample.undecided();
    };
    if bytes[start] != b'<' {
        return Detection::NoMatch;
    }
    match bytes.get(start + 1) {
        Some(b) if b.is_ascii_alphabetic() || matches!(b, b'!' | b'?' | b'/') => Detection::Match,
        Some(_) => Detection::NoMatch,
        None => sample.undecided(),
    }
}

/// Tag nesting and in-progress constructs carried between units.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MarkupState {
    /// Raw text of a tag opened but not yet closed.
    open_tag: Option<String>,
    in_comment: bool,
    bold: u16,
    italic: u16,
    underline: u16,
    mono: u16,
    heading: u16,
    /// One entry per open `<a>`; anchors without `href` hold `None`.
    links: Vec<Option<String>>,
}

impl MarkupState {
    fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.toggle(AttributeKey::Bold, self.bold > 0 || self.heading > 0);
        attributes.toggle(AttributeKey::Italic, self.italic > 0);
        let href = self.links.iter().rev().flatten().next();
        attributes.toggle(AttributeKey::Underline, self.underline > 0 || href.is_some());
        attributes.toggle(AttributeKey::Monospace, self.mono > 0);
        if let Some(href) = href {
            attributes.set(AttributeKey::Link, AttributeValue::Text(href.clone()));
            attributes.set(AttributeKey::Foreground, AttributeValue::Color(Color::Indexed(4)));
        }
        attributes
    }

    pub(crate) fn parse_body(&mut self, body: &[u8], w: &mut UnitWriter) {
        let mut at = 0;
        while at < body.len() {
            if self.in_comment {
                match body[at..].find("-->") {
                    Some(found) => {
                        self.in_comment = false;
                        at += found + 3;
                        w.skip(at);
                    }
                    None => {
                        w.skip(body.len());
                        return;
                    }
                }
                continue;
            }
            if let Some(tag) = self.open_tag.as_mut() {
                match body[at..].find_byte(b'>') {
                    Some(found) => {
                        tag.push_str(&body[at..at + found].to_str_lossy());
                        let tag = self.open_tag.take().unwrap_or_default();
                        self.close_tag(&tag);
                        at += found + 1;
                        w.skip(at);
                    }
                    None => {
                        tag.push_str(&body[at..].to_str_lossy());
                        tag.push(' ');
                        w.skip(body.len());
                        at = body.len();
                    }
                }
                continue;
            }
            let Some(found) = body[at..].find_byteset(b"<&") else {
                w.push_str(&body[at..].to_str_lossy(), &self.attributes(), body.len());
                break;
            };
            let special = at + found;
            if special > at {
                w.push_str(&body[at..special].to_str_lossy(), &self.attributes(), special);
            }
            at = special;
            if body[at] == b'&' {
                at = self.entity(body, at, w);
            } else if body[at + 1..].starts_with(b"!--") {
                self.in_comment = true;
                at += 4;
                w.skip(at);
            } else if body
                .get(at + 1)
                .is_none_or(|b| b.is_ascii_alphabetic() || matches!(b, b'!' | b'?' | b'/'))
            {
                self.open_tag = Some(String::new());
                at += 1;
                w.skip(at);
            } else {
                w.push_str("<", &self.attributes(), at + 1);
                at += 1;
            }
        }
    }

    /// Input ended inside a tag: show what was swallowed.
    pub(crate) fn finish(&mut self, w: &mut UnitWriter) {
        if let Some(tag) = self.open_tag.take() {
            let text = format!("<{}", tag.trim_end());
            w.push_str(&text, &Attributes::new(), 0);
        }
    }

    /// Decodes the entity starting at `body[at] == b'&'`; returns the offset
    /// after it.
    fn entity(&self, body: &[u8], at: usize, w: &mut UnitWriter) -> usize {
        let window = &body[at + 1..body.len().min(at + 12)];
        if let Some(semi) = window.find_byte(b';') {
            if let Some(c) = decode_entity(&window[..semi]) {
                let end = at + 1 + semi + 1;
                w.push_char(c, &self.attributes(), end);
                return end;
            }
        }
        w.push_str("&", &self.attributes(), at + 1);
        at + 1
    }

    fn close_tag(&mut self, raw: &str) {
        let raw = raw.trim();
        let (closing, rest) = match raw.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let name_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let name = rest[..name_len].to_ascii_lowercase();
        if !closing && rest.ends_with('/') {
            return;
        }
        let counter = match name.as_str() {
            "b" | "strong" => &mut self.bold,
            "i" | "em" | "cite" | "var" => &mut self.italic,
            "u" | "ins" => &mut self.underline,
            "code" | "pre" | "tt" | "kbd" | "samp" => &mut self.mono,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => &mut self.heading,
            "a" => {
                if closing {
                    self.links.pop();
                } else {
                    self.links.push(attribute(&rest[name_len..], "href"));
                }
                return;
            }
            _ => return,
        };
        *counter = if closing {
            counter.saturating_sub(1)
        } else {
            counter.saturating_add(1)
        };
    }
}

fn decode_entity(name: &[u8]) -> Option<char> {
    match name {
        b"lt" => Some('<'),
        b"gt" => Some('>'),
        b"amp" => Some('&'),
        b"quot" => Some('"'),
        b"apos" => Some('\''),
        b"nbsp" => Some('\u{a0}'),
        [b'#', b'x' | b'X', hex @ ..] => u32::from_str_radix(hex.to_str().ok()?, 16)
            .ok()
            .and_then(char::from_u32),
        [b'#', dec @ ..] => dec.to_str().ok()?.parse().ok().and_then(char::from_u32),
        _ => None,
    }
}

/// Value of `name="..."`, `name='...'` or `name=bare` in a tag's attribute
/// text.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let mut search = 0;
    while let Some(found) = lower[search..].find(name) {
        let start = search + found;
        search = start + name.len();
        let preceded = start == 0 || lower.as_bytes()[start - 1].is_ascii_whitespace();
        let rest = attrs[search..].trim_start();
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };
        if !preceded {
            continue;
        }
        let value = value.trim_start();
        return Some(match value.chars().next() {
            Some(q @ ('"' | '\'')) => value[1..].split(q).next().unwrap_or("").to_owned(),
            _ => value
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or("")
                .to_owned(),
        });
    }
    None
}
