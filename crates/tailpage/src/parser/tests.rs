use super::*;
use crate::{
    format::{FormatDescriptor, FormatKind},
    styled::{AttributeKey, plain_text, render_runs},
};

fn plain_parser() -> IncrementalParser {
    IncrementalParser::with_format(
        ParserOptions::default(),
        FormatDescriptor::builtin(FormatKind::Plain),
    )
}

fn texts(runs: &[StyledRun]) -> Vec<&str> {
    runs.iter().map(|r| r.text.as_str()).collect()
}

#[test]
fn unterminated_line_is_held_back_until_its_newline() {
    let mut parser = plain_parser();
    let mut buffer = RawBuffer::from("line one\nline tw");

    let progress = parser.resume_from(&buffer, buffer.len()).unwrap();
    assert_eq!(progress, ParseProgress::Complete);
    assert_eq!(plain_text(parser.committed()), "line one\n");
    assert_eq!(parser.last(), Checkpoint::new(9, 9));
    assert_eq!(parser.next(), parser.last());
    assert_eq!(parser.stats().retracted_units, 1);

    buffer.extend_from_slice(b"o\n");
    parser.resume_from(&buffer, buffer.len()).unwrap();
    assert_eq!(texts(parser.committed()), ["line one\n", "line two\n"]);
    assert_eq!(parser.last(), Checkpoint::new(18, 18));
}

#[test]
fn retracted_unit_is_rederived_identically() {
    let input = b"\x1b[1mbold \x1b[32mgreen\x1b[0m tail\n";
    let ansi = FormatDescriptor::builtin(FormatKind::Ansi);
    let whole = parse_all(ansi.clone(), ParserOptions::default(), input);

    let mut parser = IncrementalParser::with_format(ParserOptions::default(), ansi);
    let mut buffer = RawBuffer::new();
    buffer.extend_from_slice(&input[..12]);
    parser.resume_from(&buffer, buffer.len()).unwrap();
    assert!(parser.committed().is_empty());
    buffer.extend_from_slice(&input[12..]);
    buffer.mark_complete();
    parser.resume_from(&buffer, buffer.len()).unwrap();

    assert_eq!(parser.committed(), whole.as_slice());
    assert_eq!(
        render_runs(&whole),
        "[bold ]{Bold}[green]{Bold,Foreground=2} tail\n"
    );
}

#[test]
fn final_unterminated_unit_commits_at_eof() {
    let mut parser = plain_parser();
    let mut buffer = RawBuffer::from("a\nb");
    parser.resume_from(&buffer, 3).unwrap();
    assert_eq!(plain_text(parser.committed()), "a\n");

    buffer.mark_complete();
    parser.resume_from(&buffer, 3).unwrap();
    assert_eq!(plain_text(parser.committed()), "a\nb");
    assert_eq!(parser.last(), Checkpoint::new(3, 3));
}

#[test]
fn slice_bound_suspends_between_units() {
    let mut parser = IncrementalParser::with_format(
        ParserOptions {
            slice_bytes: 4,
            ..Default::default()
        },
        FormatDescriptor::builtin(FormatKind::Plain),
    );
    let buffer = RawBuffer::from("aa\nbb\ncc\n");

    let progress = parser.resume_from(&buffer, buffer.len()).unwrap();
    let ParseProgress::Suspended(continuation) = progress else {
        panic!("expected suspension, got {progress:?}");
    };
    assert_eq!(texts(parser.committed()), ["aa\n", "bb\n"]);
    assert!(parser.has_pending());

    let progress = parser.continue_with(&buffer, continuation).unwrap();
    assert_eq!(progress, Some(ParseProgress::Complete));
    assert_eq!(texts(parser.committed()), ["aa\n", "bb\n", "cc\n"]);
    assert!(!parser.has_pending());

    // Nothing left to do: the token is spent.
    assert_eq!(parser.continue_with(&buffer, continuation).unwrap(), None);
    assert_eq!(parser.stats().suspensions, 1);
}

#[test]
fn reset_invalidates_scheduled_continuation() {
    let mut parser = IncrementalParser::with_format(
        ParserOptions {
            slice_bytes: 1,
            ..Default::default()
        },
        FormatDescriptor::builtin(FormatKind::Plain),
    );
    let buffer = RawBuffer::from("x\ny\n");
    let ParseProgress::Suspended(continuation) = parser.resume_from(&buffer, 4).unwrap() else {
        panic!("expected suspension");
    };
    parser.reset(Some(FormatDescriptor::builtin(FormatKind::Overstrike)));
    assert_ne!(continuation.generation(), parser.generation());
    assert_eq!(parser.continue_with(&buffer, continuation).unwrap(), None);
    assert!(parser.committed().is_empty());
    assert_eq!(parser.last(), Checkpoint::START);
}

#[test]
fn runaway_line_is_split_at_the_unit_limit() {
    let mut parser = IncrementalParser::with_format(
        ParserOptions {
            max_unit_bytes: 4,
            ..Default::default()
        },
        FormatDescriptor::builtin(FormatKind::Plain),
    );
    let mut buffer = RawBuffer::from("abcdefghij");
    parser.resume_from(&buffer, buffer.len()).unwrap();
    assert_eq!(texts(parser.committed()), ["abcd", "efgh"]);

    buffer.extend_from_slice(b"\n");
    parser.resume_from(&buffer, buffer.len()).unwrap();
    assert_eq!(texts(parser.committed()), ["abcd", "efgh", "ij\n"]);
}

#[test]
fn invalid_utf8_degrades_to_replacement_characters() {
    let runs = parse_all(
        FormatDescriptor::builtin(FormatKind::Plain),
        ParserOptions::default(),
        b"ok \xff\xfe done\n",
    );
    assert_eq!(plain_text(&runs), "ok \u{fffd}\u{fffd} done\n");
}

#[test]
fn literal_spells_control_characters() {
    let runs = parse_all(
        FormatDescriptor::builtin(FormatKind::Literal),
        ParserOptions::default(),
        b"\x1b[1mx\x07\tend",
    );
    assert_eq!(plain_text(&runs), "^[[1mx^G\tend");
}

#[test]
fn malformed_escape_passes_through_literally() {
    let runs = parse_all(
        FormatDescriptor::builtin(FormatKind::Ansi),
        ParserOptions::default(),
        b"a\x1bZb\x1b[31\n",
    );
    assert_eq!(plain_text(&runs), "a^[Zb^[[31\n");
}

#[test]
fn markup_state_spans_lines() {
    let input = b"<b>bold\ntext</b> plain <!-- hidden\nstill -->shown &amp; <a href=\"u\">link</a>\n";
    let runs = parse_all(
        FormatDescriptor::builtin(FormatKind::Markup),
        ParserOptions::default(),
        input,
    );
    assert_eq!(
        render_runs(&runs),
        "[bold]{Bold}\n[text]{Bold} plain \nshown & [link]{Underline,Foreground=4,Link=u}\n"
    );
}

#[test]
fn unclosed_tag_at_eof_is_shown() {
    let runs = parse_all(
        FormatDescriptor::builtin(FormatKind::Markup),
        ParserOptions::default(),
        b"x <broken\nstill",
    );
    assert_eq!(plain_text(&runs), "x \n<broken still");
}

#[test]
fn preconditions_are_reported_not_panicked() {
    let mut parser = plain_parser();
    let buffer = RawBuffer::from("abc\ndef\n");
    assert_eq!(
        parser.resume_from(&buffer, 9),
        Err(ResumeError::BeyondBuffer { end: 9, len: 8 })
    );
    parser.resume_from(&buffer, 8).unwrap();
    assert_eq!(
        parser.resume_from(&buffer, 4),
        Err(ResumeError::Regressed { end: 4, parsed: 8 })
    );
    assert_eq!(plain_text(parser.committed()), "abc\ndef\n");
}

#[test]
fn no_format_means_no_parsing() {
    let mut parser = IncrementalParser::new(ParserOptions::default());
    let buffer = RawBuffer::from("abc\n");
    assert_eq!(
        parser.resume_from(&buffer, 4),
        Ok(ParseProgress::AwaitingFormat)
    );
    assert!(parser.committed().is_empty());
    assert_eq!(parser.summary().format, None);
}

#[test]
fn manual_emit_checkpoint_and_chomp() {
    let mut parser = plain_parser();
    let bold = Attributes::new().with_flag(AttributeKey::Bold);
    parser.emit("ab", bold.clone(), 2);
    assert!(!parser.checkpoint(1));
    assert!(parser.checkpoint(2));
    parser.emit("", Attributes::new(), 3);
    parser.emit("cd", Attributes::new(), 2);
    assert_eq!(parser.next(), Checkpoint::new(7, 4));
    parser.retract_trailing();
    assert_eq!(parser.next(), Checkpoint::new(2, 2));
    assert_eq!(parser.committed(), [StyledRun::new("ab", bold)]);
}

#[test]
fn checkpoints_never_move_backwards() {
    let input = b"one\ntwo\r\nthree\nfour";
    let mut parser = plain_parser();
    let mut buffer = RawBuffer::new();
    let mut seen = vec![parser.last()];
    for byte in input {
        buffer.extend_from_slice(&[*byte]);
        parser.resume_from(&buffer, buffer.len()).unwrap();
        seen.push(parser.last());
    }
    buffer.mark_complete();
    parser.resume_from(&buffer, buffer.len()).unwrap();
    seen.push(parser.last());
    assert!(seen.windows(2).all(|w| w[1].dominates(&w[0])));
    assert_eq!(parser.last(), Checkpoint::new(input.len(), 18));
    assert_eq!(plain_text(parser.committed()), "one\ntwo\nthree\nfour");
}
