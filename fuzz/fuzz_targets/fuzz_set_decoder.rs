//! Fuzz target: `SetMessage::decode` / `StatusMessage::decode`
//!
//! Feeds arbitrary payloads to both decoders under both layouts and
//! asserts they never panic and that anything accepted re-encodes to a
//! payload of the same length.
//!
//! cargo fuzz run fuzz_set_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshswitch::model::message::{Layout, SetMessage, StatusMessage};

fuzz_target!(|data: &[u8]| {
    for layout in [Layout::STANDARD, Layout::WITH_SOURCE] {
        if let Ok(set) = SetMessage::decode(data, layout) {
            assert_eq!(set.encode(layout).len(), data.len());
            assert_eq!(set.source.is_some(), layout.with_source);
        }
        if let Ok(status) = StatusMessage::decode(data, layout) {
            assert_eq!(status.encode(layout).len(), data.len());
        }
    }
});
