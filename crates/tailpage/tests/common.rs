#![allow(missing_docs, dead_code)]

use std::{
    thread,
    time::{Duration, Instant},
};

use tailpage::{DetectOptions, DocumentId, Pager, PagerOptions, TailOptions, plain_text};

/// Options that poll on every pump and decide formats on tiny samples.
pub fn eager_options(follow: bool) -> PagerOptions {
    PagerOptions {
        detect: DetectOptions {
            min_sample: 1,
            ..Default::default()
        },
        tail: TailOptions {
            poll_interval: Duration::ZERO,
            follow,
        },
        ..Default::default()
    }
}

/// Pumps until `done` holds, failing the test after a few seconds. Stream
/// sources deliver from another thread, so a single pump is not enough.
pub fn pump_until(pager: &mut Pager, mut done: impl FnMut(&Pager) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        pager.pump(Instant::now());
        if done(pager) {
            return;
        }
        assert!(Instant::now() < deadline, "pager never reached the expected state");
        thread::sleep(Duration::from_millis(2));
    }
}

pub fn text_of(pager: &Pager, id: DocumentId) -> String {
    pager
        .document(id)
        .map(|d| plain_text(d.committed()))
        .unwrap_or_default()
}
