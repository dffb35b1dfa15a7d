use bstr::ByteSlice;

use crate::{
    parser::unit::{UnitWriter, caret},
    styled::Attributes,
};

pub(super) fn parse_body(body: &[u8], w: &mut UnitWriter) {
    w.push_str(&body.to_str_lossy(), &Attributes::new(), body.len());
}

/// Like [`parse_body`] but control characters other than tab are spelled
/// out, so binary input cannot drive the terminal.
pub(super) fn parse_body_literal(body: &[u8], w: &mut UnitWriter) {
    let plain = Attributes::new();
    for (_, end, c) in body.char_indices() {
        match caret(c) {
            Some(spelled) if c != '\t' => {
                for s in spelled {
                    w.push_char(s, &plain, end);
                }
            }
            _ => w.push_char(c, &plain, end),
        }
    }
}
