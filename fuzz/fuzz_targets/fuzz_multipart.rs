//! Fuzz target: `MultipartExtractor::feed`
//!
//! The first input byte picks a split size; the rest is fed as a request
//! body. The extractor must never panic and must never emit more bytes
//! than it was given.
//!
//! cargo fuzz run fuzz_multipart

#![no_main]

use chime::adapters::multipart::MultipartExtractor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).max(1);

    let mut extractor = MultipartExtractor::new("fuzzBoundary");
    let mut emitted = 0usize;
    for piece in body.chunks(split) {
        if extractor.feed(piece, &mut |b: &[u8]| emitted += b.len()).is_err() {
            break;
        }
    }

    assert!(emitted <= body.len());
    assert_eq!(emitted, extractor.emitted() as usize);
});
