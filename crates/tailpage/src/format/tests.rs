use rstest::rstest;

use super::*;

fn names(formats: &[FormatDescriptor]) -> Vec<&str> {
    formats.iter().map(FormatDescriptor::name).collect()
}

fn scenario_registry() -> FormatRegistry {
    let mut registry = FormatRegistry::new(DetectOptions::default());
    registry.register(FormatDescriptor::new("PlainText", 0, FormatKind::Plain));
    registry.register(FormatDescriptor::new("MarkedUp", 10, FormatKind::Markup));
    registry
}

#[test]
fn markup_sample_orders_by_priority() {
    let registry = scenario_registry();
    let applicable = registry.applicable_formats(Sample::partial(b"<html>"));
    assert_eq!(names(&applicable), ["MarkedUp", "PlainText"]);
}

#[test]
fn registration_order_breaks_ties() {
    let mut registry = FormatRegistry::new(DetectOptions::default());
    registry.register(FormatDescriptor::new("first", 5, FormatKind::Plain));
    registry.register(FormatDescriptor::new("second", 5, FormatKind::Plain));
    registry.register(FormatDescriptor::new("low", 1, FormatKind::Plain));
    registry.register(FormatDescriptor::new("high", 9, FormatKind::Plain));
    let all = registry.applicable_formats(Sample::complete(b"x"));
    assert_eq!(names(&all), ["high", "first", "second", "low"]);
}

#[test]
fn reregistering_changes_order() {
    let mut registry = scenario_registry();
    registry.register(FormatDescriptor::new("PlainText", 20, FormatKind::Plain));
    assert_eq!(registry.len(), 2);
    let applicable = registry.applicable_formats(Sample::partial(b"<html>"));
    assert_eq!(names(&applicable), ["PlainText", "MarkedUp"]);

    assert!(registry.set_priority("plaintext", -1));
    assert!(!registry.set_priority("missing", 3));
    let applicable = registry.applicable_formats(Sample::partial(b"<html>"));
    assert_eq!(names(&applicable), ["MarkedUp", "PlainText"]);
}

#[test]
fn equal_priority_keeps_original_slot_on_reregister() {
    let mut registry = FormatRegistry::new(DetectOptions::default());
    registry.register(FormatDescriptor::new("a", 1, FormatKind::Plain));
    registry.register(FormatDescriptor::new("b", 1, FormatKind::Plain));
    registry.register(FormatDescriptor::new("a", 1, FormatKind::Plain));
    let order: Vec<_> = registry.descriptors().map(FormatDescriptor::name).collect();
    assert_eq!(order, ["a", "b"]);
}

#[rstest]
#[case::sgr(FormatKind::Ansi, b"x \x1b[1;31mred\x1b[0m", false, Detection::Match)]
#[case::sgr_truncated(FormatKind::Ansi, b"x \x1b[1;3", false, Detection::InsufficientData)]
#[case::sgr_truncated_eof(FormatKind::Ansi, b"x \x1b[1;3", true, Detection::NoMatch)]
#[case::csi_not_sgr(FormatKind::Ansi, b"\x1b[2Jclear", false, Detection::NoMatch)]
#[case::no_escape(FormatKind::Ansi, b"hello", false, Detection::NoMatch)]
#[case::bold(FormatKind::Overstrike, b"N\x08NAME", false, Detection::Match)]
#[case::underline(FormatKind::Overstrike, b"_\x08x", false, Detection::Match)]
#[case::trailing_bs(FormatKind::Overstrike, b"N\x08", false, Detection::InsufficientData)]
#[case::trailing_bs_eof(FormatKind::Overstrike, b"N\x08", true, Detection::NoMatch)]
#[case::plain_text(FormatKind::Overstrike, b"NAME", false, Detection::NoMatch)]
#[case::html(FormatKind::Markup, b"  <html>", false, Detection::Match)]
#[case::doctype(FormatKind::Markup, b"<!DOCTYPE html>", false, Detection::Match)]
#[case::lone_lt(FormatKind::Markup, b"\n<", false, Detection::InsufficientData)]
#[case::blank(FormatKind::Markup, b"   ", false, Detection::InsufficientData)]
#[case::blank_eof(FormatKind::Markup, b"   ", true, Detection::NoMatch)]
#[case::comparison(FormatKind::Markup, b"< 3", false, Detection::NoMatch)]
#[case::prose(FormatKind::Markup, b"text <b>", false, Detection::NoMatch)]
#[case::plain(FormatKind::Plain, b"", false, Detection::Match)]
#[case::literal(FormatKind::Literal, b"anything", true, Detection::NoMatch)]
fn detector_verdicts(
    #[case] kind: FormatKind,
    #[case] bytes: &[u8],
    #[case] complete: bool,
    #[case] expected: Detection,
) {
    let sample = if complete {
        Sample::complete(bytes)
    } else {
        Sample::partial(bytes)
    };
    assert_eq!(kind.detect(sample), expected);
    // Detectors are pure: asking again gives the same answer.
    assert_eq!(kind.detect(sample), expected);
}

#[test]
fn short_growing_samples_are_inconclusive() {
    let registry = FormatRegistry::with_builtin(DetectOptions {
        min_sample: 16,
        max_sample: 64,
    });
    assert!(!registry.detection_complete(Sample::partial(b"short")));
    assert_eq!(registry.select(Sample::partial(b"short")), Selection::Deferred);

    assert!(registry.detection_complete(Sample::complete(b"short")));
    assert_eq!(
        registry.select(Sample::complete(b"short")),
        Selection::Decided(FormatDescriptor::builtin(FormatKind::Plain))
    );

    let long = b"a plain line of text that is long enough\n";
    assert!(registry.detection_complete(Sample::partial(long)));
}

#[test]
fn high_priority_match_decides_early() {
    let registry = FormatRegistry::with_builtin(DetectOptions::default());
    let selection = registry.select(Sample::partial(b"\x1b[32mok"));
    assert_eq!(
        selection,
        Selection::Decided(FormatDescriptor::builtin(FormatKind::Ansi))
    );
}

#[test]
fn full_window_is_final() {
    let registry = FormatRegistry::with_builtin(DetectOptions {
        min_sample: 4,
        max_sample: 8,
    });
    // The escape starts inside the window but finishes after it.
    let sample = Sample::partial(b"abcdef\x1b[1m");
    assert!(registry.detection_complete(sample));
    assert_eq!(
        registry.select(sample),
        Selection::Decided(FormatDescriptor::builtin(FormatKind::Plain))
    );
}

#[test]
fn nothing_matches_without_plain() {
    let mut registry = FormatRegistry::new(DetectOptions::default());
    registry.register(FormatDescriptor::builtin(FormatKind::Markup));
    assert!(
        registry
            .applicable_formats(Sample::complete(b"just text"))
            .is_empty()
    );
    assert_eq!(
        registry.select(Sample::complete(b"just text")),
        Selection::Unparseable(FormatDescriptor::builtin(FormatKind::Literal))
    );
}

#[test]
fn lookup_by_name_or_slug() {
    let registry = FormatRegistry::with_builtin(DetectOptions::default());
    assert_eq!(
        registry.find("man page").map(FormatDescriptor::kind),
        Some(FormatKind::Overstrike)
    );
    assert_eq!(
        registry.find("ANSI").map(FormatDescriptor::kind),
        Some(FormatKind::Ansi)
    );
    assert!(registry.find("literal").is_none());
}
