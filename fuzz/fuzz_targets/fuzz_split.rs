#![no_main]
use std::cell::RefCell;

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng; // faster than StdRng
use rand::{Rng, SeedableRng};
use tailpage::{FormatDescriptor, FormatKind, ParserOptions, parse_all, parse_split};

thread_local! {
    // One SmallRng per thread, seeded once from the host OS
    static RNG: RefCell<SmallRng> =
        RefCell::new(SmallRng::from_os_rng());
}

/// Byte sequences the formats treat specially. Random bytes rarely form a
/// complete escape or tag, so the mutator splices these in.
static FRAGMENTS: &[&[u8]] = &[
    b"\n",
    b"\r\n",
    b"\x1b[1m",
    b"\x1b[0m",
    b"\x1b[38;5;9m",
    b"\x1b[48;2;1;2;3m",
    b"\x1b[",
    b"\x1b]8;;http://x\x1b\\",
    b"\x1b]8;;\x07",
    b"<b>",
    b"</b>",
    b"<a href=\"x\">",
    b"<!--",
    b"-->",
    b"&amp;",
    b"&#x263a;",
    b"_\x08",
    b"\x08",
];

/// Helper: borrow the thread-local RNG and run a closure with it.
fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size == 0 || !seed.is_multiple_of(4) {
        return fuzzer_mutate(data, size, max_size);
    }
    let fragment = with_rng(|rng| FRAGMENTS[rng.random_range(0..FRAGMENTS.len())]);
    if size + fragment.len() > max_size {
        return fuzzer_mutate(data, size, max_size);
    }
    let at = with_rng(|rng| rng.random_range(0..=size));
    data.copy_within(at..size, at + fragment.len());
    data[at..at + fragment.len()].copy_from_slice(fragment);
    size + fragment.len()
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug, Arbitrary)]
struct Case<'a> {
    kind: u8,
    slice_bytes: u8,
    max_unit_bytes: u8,
    splits: Vec<u16>,
    bytes: &'a [u8],
}

fn split_equivalence(data: &[u8]) {
    let Ok(case) = Case::arbitrary_take_rest(Unstructured::new(data)) else {
        return;
    };
    let kind = match case.kind % 5 {
        0 => FormatKind::Plain,
        1 => FormatKind::Ansi,
        2 => FormatKind::Overstrike,
        3 => FormatKind::Markup,
        _ => FormatKind::Literal,
    };
    let options = ParserOptions {
        slice_bytes: usize::from(case.slice_bytes) + 1,
        max_unit_bytes: usize::from(case.max_unit_bytes) + 1,
    };
    let splits: Vec<usize> = case.splits.iter().map(|&s| usize::from(s)).collect();

    let format = FormatDescriptor::builtin(kind);
    let batch = parse_all(format.clone(), options, case.bytes);
    let split = parse_split(format, options, case.bytes, &splits);
    assert_eq!(batch, split, "chunking changed the committed output");
}

fuzz_target!(|data: &[u8]| split_equivalence(data));
