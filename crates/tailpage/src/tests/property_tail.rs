use std::time::Duration;

use quickcheck::QuickCheck;

use super::utils::{MemorySource, lines};
use crate::{
    DetectOptions, Document, DocumentEvent, DocumentId, FormatDescriptor, FormatKind,
    FormatRegistry, ParseProgress, ParserOptions, PollOutcome, SourceError, TailWatch, parse_all,
    plain_text,
};

fn pinned_document() -> (Document, FormatRegistry) {
    let registry = FormatRegistry::with_builtin(DetectOptions::default());
    let mut document = Document::new(DocumentId(1), "mem", ParserOptions::default());
    document.format_override(FormatDescriptor::builtin(FormatKind::Plain));
    document.take_events();
    (document, registry)
}

/// Property: whatever the growth increments, the watch reads every byte
/// exactly once, in order.
#[test]
fn tail_reads_without_gaps_or_duplicates_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(growth: Vec<Vec<u8>>) -> bool {
        let (mut document, registry) = pinned_document();
        let mut source = MemorySource::default();
        let mut watch = TailWatch::new(Duration::from_millis(10));
        for chunk in &growth {
            source.grow(chunk);
            if watch.poll(&mut source, &mut document, &registry).is_err() {
                return false;
            }
        }

        let mut expected_offset = 0;
        for &(offset, len) in &source.reads {
            if offset != expected_offset || len == 0 {
                return false;
            }
            expected_offset += len as u64;
        }
        expected_offset == source.data.len() as u64
            && document.buffer().as_bytes() == source.data.as_slice()
            && watch.last_observed_size() == source.data.len() as u64
    }

    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;

    QuickCheck::new()
        .tests(tests)
        .quickcheck(prop as fn(Vec<Vec<u8>>) -> bool);
}

#[test]
fn stagnant_poll_triggers_no_resume() {
    let (mut document, registry) = pinned_document();
    let data = lines(400);
    let mut source = MemorySource::default();
    let mut watch = TailWatch::new(Duration::from_secs(1));
    let resumes_before = document.parser().stats().resumes;

    let mut ends = Vec::new();
    for size in [100, 250, 250, 400] {
        source.replace(&data[..size]);
        match watch.poll(&mut source, &mut document, &registry).unwrap() {
            PollOutcome::Grew { ingested, .. } => {
                assert_eq!(ingested.progress, ParseProgress::Complete);
                ends.push(ingested.end_offset);
            }
            PollOutcome::Unchanged => {}
            other @ (PollOutcome::Truncated { .. } | PollOutcome::Replaced { .. }) => {
                panic!("unexpected {other:?}")
            }
        }
    }

    assert_eq!(ends, [100, 250, 400]);
    assert_eq!(document.parser().stats().resumes - resumes_before, 3);
    assert_eq!(source.reads, [(0, 100), (100, 150), (250, 150)]);
    assert_eq!(document.parser().last().byte_offset, 400);
}

#[test]
fn shrinking_source_restarts_from_zero() {
    let (mut document, registry) = pinned_document();
    let mut source = MemorySource::default();
    let mut watch = TailWatch::new(Duration::from_secs(1));

    source.grow(b"old line one\nold line two\n");
    watch.poll(&mut source, &mut document, &registry).unwrap();
    assert_eq!(plain_text(document.committed()), "old line one\nold line two\n");

    source.replace(b"new\n");
    let outcome = watch.poll(&mut source, &mut document, &registry).unwrap();
    assert!(matches!(outcome, PollOutcome::Truncated { to: 4, .. }));
    assert_eq!(document.buffer().as_bytes(), b"new\n");
    assert_eq!(plain_text(document.committed()), "new\n");
    assert!(document.take_events().contains(&DocumentEvent::Discontinuity));
    // The pinned format survives the restart.
    assert!(document.is_pinned());
    assert_eq!(
        document.current_format().map(FormatDescriptor::kind),
        Some(FormatKind::Plain)
    );
}

#[test]
fn swapped_source_is_read_from_zero() {
    let (mut document, registry) = pinned_document();
    let mut source = MemorySource::default();
    let mut watch = TailWatch::new(Duration::from_secs(1));
    source.grow(b"old\n");
    watch.poll(&mut source, &mut document, &registry).unwrap();
    document.take_events();

    source.swap(b"NEWFILE-CONTENT\n");
    let outcome = watch.poll(&mut source, &mut document, &registry).unwrap();
    assert!(matches!(outcome, PollOutcome::Replaced { to: 16, .. }));
    assert_eq!(source.reads.last(), Some(&(0, 16)));
    assert_eq!(document.buffer().as_bytes(), b"NEWFILE-CONTENT\n");
    assert_eq!(plain_text(document.committed()), "NEWFILE-CONTENT\n");
    assert!(document.take_events().contains(&DocumentEvent::Discontinuity));
    assert_eq!(watch.last_observed_size(), 16);
}

#[test]
fn failed_read_after_shrink_leaves_document_alone() {
    let (mut document, registry) = pinned_document();
    let mut source = MemorySource::default();
    let mut watch = TailWatch::new(Duration::from_secs(1));
    source.grow(b"first line\nsecond line\n");
    watch.poll(&mut source, &mut document, &registry).unwrap();
    document.take_events();

    source.replace(b"x\n");
    source.broken = true;
    let err = watch
        .poll(&mut source, &mut document, &registry)
        .unwrap_err();
    assert!(matches!(err, SourceError::Io(_)));
    assert_eq!(document.buffer().len(), 23);
    assert_eq!(
        plain_text(document.committed()),
        "first line\nsecond line\n"
    );
    assert!(document.take_events().is_empty());
    assert_eq!(watch.last_observed_size(), 23);

    source.broken = false;
    let outcome = watch.poll(&mut source, &mut document, &registry).unwrap();
    assert!(matches!(outcome, PollOutcome::Truncated { to: 2, .. }));
    assert_eq!(plain_text(document.committed()), "x\n");
}

#[test]
fn removed_source_reports_gone_and_keeps_content() {
    let (mut document, registry) = pinned_document();
    let mut source = MemorySource::default();
    let mut watch = TailWatch::new(Duration::from_secs(1));
    source.grow(b"kept\n");
    watch.poll(&mut source, &mut document, &registry).unwrap();

    source.gone = true;
    let err = watch
        .poll(&mut source, &mut document, &registry)
        .unwrap_err();
    assert!(matches!(err, SourceError::Gone { .. }));
    assert_eq!(plain_text(document.committed()), "kept\n");
}

#[test]
fn tailed_output_matches_batch_parse() {
    let registry = FormatRegistry::with_builtin(DetectOptions::default());
    let mut document = Document::new(DocumentId(7), "log", ParserOptions::default());
    let mut source = MemorySource::default();
    let mut watch = TailWatch::new(Duration::from_secs(1));
    let log: &[u8] = b"\x1b[32mINFO\x1b[0m started\n\x1b[33mWARN\x1b[0m slow disk, retrying the write\n\x1b[31mERROR\x1b[0m gave up\n";

    for chunk in log.chunks(7) {
        source.grow(chunk);
        watch.poll(&mut source, &mut document, &registry).unwrap();
    }
    document.finish_input(&registry);

    let batch = parse_all(
        FormatDescriptor::builtin(FormatKind::Ansi),
        ParserOptions::default(),
        log,
    );
    assert_eq!(
        document.current_format().map(FormatDescriptor::kind),
        Some(FormatKind::Ansi)
    );
    assert_eq!(document.committed(), batch.as_slice());
}
