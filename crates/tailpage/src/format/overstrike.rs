use bstr::ByteSlice;

use super::{Detection, Sample};
use crate::{
    parser::unit::UnitWriter,
    styled::{AttributeKey, Attributes},
};

const BS: u8 = 0x08;

/// Matches `X\bX` (bold) or `_\bX` (underline) anywhere in the sample.
pub(super) fn detect(sample: Sample<'_>) -> Detection {
    let bytes = sample.bytes();
    let hit = bytes.windows(3).any(|w| {
        w[1] == BS && w[0] != BS && w[2] != BS && (w[0] == w[2] || w[0] == b'_') && w[2] > b' '
    });
    if hit {
        Detection::Match
    } else if bytes.ends_with(&[BS]) || bytes.len() >= 2 && bytes[bytes.len() - 2] == BS {
        sample.undecided()
    } else {
        Detection::NoMatch
    }
}

pub(super) fn parse_body(body: &[u8], w: &mut UnitWriter) {
    let chars: Vec<(usize, usize, char)> = body.char_indices().collect();
    let plain = Attributes::new();
    let mut i = 0;
    while i < chars.len() {
        let (_, end, c) = chars[i];
        if c == '\u{8}' {
            // Nothing to strike over.
            w.push_str("^H", &plain, end);
            i += 1;
            continue;
        }
        let mut shown = c;
        let mut bold = false;
        let mut underline = false;
        let mut last_end = end;
        while let (Some(&(_, _, '\u{8}')), Some(&(_, struck_end, struck))) =
            (chars.get(i + 1), chars.get(i + 2))
        {
            if struck == '\u{8}' {
                break;
            }
            if struck == shown {
                bold = true;
            } else if shown == '_' {
                underline = true;
                shown = struck;
            } else if struck == '_' {
                underline = true;
            } else {
                shown = struck;
            }
            last_end = struck_end;
            i += 2;
        }
        let mut attributes = Attributes::new();
        attributes.toggle(AttributeKey::Bold, bold);
        attributes.toggle(AttributeKey::Underline, underline);
        w.push_char(shown, &attributes, last_end);
        i += 1;
    }
}
