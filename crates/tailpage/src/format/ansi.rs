use bstr::ByteSlice;

use super::{Detection, Sample};
use crate::{
    parser::unit::UnitWriter,
    styled::{AttributeKey, AttributeValue, Attributes, Color},
};

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Matches on the first complete SGR sequence.
pub(super) fn detect(sample: Sample<'_>) -> Detection {
    let bytes = sample.bytes();
    let mut at = 0;
    while let Some(found) = bytes[at..].find_byte(ESC) {
        let start = at + found;
        match csi(&bytes[start..]) {
            Escape::Csi { final_byte: b'm', .. } => return Detection::Match,
            Escape::Truncated if !sample.is_complete() => return Detection::InsufficientData,
            _ => at = start + 1,
        }
    }
    Detection::NoMatch
}

#[derive(Debug, PartialEq, Eq)]
enum Escape<'a> {
    /// `ESC [ params intermediates final`.
    Csi {
        params: &'a [u8],
        final_byte: u8,
        len: usize,
    },
    /// `ESC ] payload (BEL | ESC \)`.
    Osc { payload: &'a [u8], len: usize },
    /// Two- or three-byte escape with no payload we care about.
    Short { len: usize },
    /// The input ends inside the sequence.
    Truncated,
    /// Not a sequence we recognise.
    Malformed,
}

/// Classifies the escape sequence at the start of `bytes` (which begins with
/// `ESC`).
fn csi(bytes: &[u8]) -> Escape<'_> {
    debug_assert_eq!(bytes.first(), Some(&ESC));
    match bytes.get(1) {
        None => Escape::Truncated,
        Some(b'[') => {
            let rest = &bytes[2..];
            let params_len = rest
                .iter()
                .position(|b| !(0x30..=0x3f).contains(b))
                .unwrap_or(rest.len());
            let inter_len = rest[params_len..]
                .iter()
                .position(|b| !(0x20..=0x2f).contains(b))
                .unwrap_or(rest.len() - params_len);
            match rest.get(params_len + inter_len) {
                None => Escape::Truncated,
                Some(&b) if (0x40..=0x7e).contains(&b) => Escape::Csi {
                    params: &rest[..params_len],
                    final_byte: b,
                    len: 2 + params_len + inter_len + 1,
                },
                Some(_) => Escape::Malformed,
            }
        }
        Some(b']') => {
            let rest = &bytes[2..];
            for (i, &b) in rest.iter().enumerate() {
                if b == BEL {
                    return Escape::Osc {
                        payload: &rest[..i],
                        len: 2 + i + 1,
                    };
                }
                if b == ESC {
                    return match rest.get(i + 1) {
                        Some(b'\\') => Escape::Osc {
                            payload: &rest[..i],
                            len: 2 + i + 2,
                        },
                        Some(_) => Escape::Malformed,
                        None => Escape::Truncated,
                    };
                }
            }
            Escape::Truncated
        }
        Some(b'(' | b')' | b'*' | b'+') => match bytes.get(2) {
            Some(_) => Escape::Short { len: 3 },
            None => Escape::Truncated,
        },
        Some(b'=' | b'>' | b'7' | b'8' | b'M' | b'c') => Escape::Short { len: 2 },
        Some(_) => Escape::Malformed,
    }
}

pub(super) fn parse_body(style: &mut Attributes, body: &[u8], w: &mut UnitWriter) {
    let mut at = 0;
    while at < body.len() {
        let Some(found) = body[at..].find_byte(ESC) else {
            push_text(style, &body[at..], body.len(), w);
            return;
        };
        let start = at + found;
        push_text(style, &body[at..start], start, w);
        match csi(&body[start..]) {
            Escape::Csi {
                params,
                final_byte,
                len,
            } => {
                if final_byte == b'm' {
                    apply_sgr(style, params);
                }
                w.skip(start + len);
                at = start + len;
            }
            Escape::Osc { payload, len } => {
                apply_osc(style, payload);
                w.skip(start + len);
                at = start + len;
            }
            Escape::Short { len } => {
                w.skip(start + len);
                at = start + len;
            }
            // Units end at line boundaries, so a sequence cut off here is
            // garbage rather than something still arriving.
            Escape::Truncated | Escape::Malformed => {
                w.push_str("^[", &Attributes::new(), start + 1);
                at = start + 1;
            }
        }
    }
}

fn push_text(style: &Attributes, text: &[u8], src_end: usize, w: &mut UnitWriter) {
    if !text.is_empty() {
        w.push_str(&text.to_str_lossy(), style, src_end);
    }
}

fn apply_osc(style: &mut Attributes, payload: &[u8]) {
    // OSC 8 ; params ; uri  opens a hyperlink, an empty uri closes it.
    let Some(rest) = payload.strip_prefix(b"8;") else {
        return;
    };
    let Some(sep) = rest.find_byte(b';') else {
        return;
    };
    let uri = &rest[sep + 1..];
    if uri.is_empty() {
        style.remove(AttributeKey::Link);
    } else {
        style.set(
            AttributeKey::Link,
            AttributeValue::Text(uri.to_str_lossy().into_owned()),
        );
    }
}

fn apply_sgr(style: &mut Attributes, params: &[u8]) {
    // Private-mode sequences (`ESC [ ? ... m`) are not SGR.
    if params.first().is_some_and(|b| (0x3c..=0x3f).contains(b)) {
        return;
    }
    let codes: Vec<u16> = params
        .split(|b| *b == b';' || *b == b':')
        .map(|p| p.to_str().ok().and_then(|s| s.parse().ok()).unwrap_or(0))
        .collect();
    let mut codes = codes.into_iter();
    while let Some(code) = codes.next() {
        match code {
            0 => *style = Attributes::new(),
            1 => style.toggle(AttributeKey::Bold, true),
            2 => style.toggle(AttributeKey::Dim, true),
            3 => style.toggle(AttributeKey::Italic, true),
            4 => style.toggle(AttributeKey::Underline, true),
            7 => style.toggle(AttributeKey::Reverse, true),
            22 => {
                style.remove(AttributeKey::Bold);
                style.remove(AttributeKey::Dim);
            }
            23 => style.remove(AttributeKey::Italic),
            24 => style.remove(AttributeKey::Underline),
            27 => style.remove(AttributeKey::Reverse),
            30..=37 => set_color(style, AttributeKey::Foreground, code - 30),
            38 => extended(style, AttributeKey::Foreground, &mut codes),
            39 => style.remove(AttributeKey::Foreground),
            40..=47 => set_color(style, AttributeKey::Background, code - 40),
            48 => extended(style, AttributeKey::Background, &mut codes),
            49 => style.remove(AttributeKey::Background),
            90..=97 => set_color(style, AttributeKey::Foreground, code - 90 + 8),
            100..=107 => set_color(style, AttributeKey::Background, code - 100 + 8),
            _ => {}
        }
    }
}

fn set_color(style: &mut Attributes, key: AttributeKey, index: u16) {
    let index = u8::try_from(index).unwrap_or(u8::MAX);
    style.set(key, AttributeValue::Color(Color::Indexed(index)));
}

/// `38;5;n` and `38;2;r;g;b` (and the `48` background forms).
fn extended(style: &mut Attributes, key: AttributeKey, codes: &mut impl Iterator<Item = u16>) {
    let byte = |c: Option<u16>| c.and_then(|c| u8::try_from(c).ok());
    match codes.next() {
        Some(5) => {
            if let Some(n) = byte(codes.next()) {
                style.set(key, AttributeValue::Color(Color::Indexed(n)));
            }
        }
        Some(2) => {
            let (r, g, b) = (byte(codes.next()), byte(codes.next()), byte(codes.next()));
            if let (Some(r), Some(g), Some(b)) = (r, g, b) {
                style.set(key, AttributeValue::Color(Color::Rgb(r, g, b)));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sequences() {
        assert_eq!(
            csi(b"\x1b[1;31mX"),
            Escape::Csi {
                params: b"1;31",
                final_byte: b'm',
                len: 7
            }
        );
        assert_eq!(csi(b"\x1b[1;3"), Escape::Truncated);
        assert_eq!(csi(b"\x1b"), Escape::Truncated);
        assert_eq!(csi(b"\x1bZ"), Escape::Malformed);
        assert_eq!(
            csi(b"\x1b]8;;http://x\x1b\\rest"),
            Escape::Osc {
                payload: b"8;;http://x",
                len: 15
            }
        );
        assert_eq!(csi(b"\x1b(B"), Escape::Short { len: 3 });
    }

    #[test]
    fn sgr_resets_and_extended_colors() {
        let mut style = Attributes::new();
        apply_sgr(&mut style, b"1;38;5;208;48;2;1;2;3");
        assert!(style.contains(AttributeKey::Bold));
        assert_eq!(
            style.color(AttributeKey::Foreground),
            Some(Color::Indexed(208))
        );
        assert_eq!(
            style.color(AttributeKey::Background),
            Some(Color::Rgb(1, 2, 3))
        );
        apply_sgr(&mut style, b"22;39");
        assert!(!style.contains(AttributeKey::Bold));
        assert_eq!(style.color(AttributeKey::Foreground), None);
        apply_sgr(&mut style, b"");
        assert!(style.is_empty());
    }
}
