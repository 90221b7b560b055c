//! Feature-flag property-based tests.
//!
//! ## Purpose
//! Flags are embedded in the certificate locality and compared on reuse, so
//! encoding must round-trip as an unordered set regardless of entry order.
//!
//! ## What is covered
//! - Encode then decode yields the same set.
//! - Decoding a shuffled entry list yields the same set.
//! - Arbitrary locality strings never panic the decoder.
// crates/license-authority-core/tests/proptest_flags.rs
// ============================================================================
// Module: Feature Flag Property-Based Tests
// Description: Order-independence checks for flag encoding.
// Purpose: Ensure flag comparison is set equality, not string equality.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeMap;

use license_authority_core::FeatureFlags;
use proptest::prelude::*;

fn flag_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z][a-z0-9_.-]{0,11}", "[A-Za-z0-9 ._=:-]{0,16}", 0 .. 8)
}

proptest! {
    #[test]
    fn encode_decode_is_set_equal(map in flag_map()) {
        let flags = FeatureFlags::from_pairs(map.clone()).unwrap();
        let decoded = FeatureFlags::decode(&flags.encode()).unwrap();
        prop_assert_eq!(&decoded, &flags);
        prop_assert_eq!(decoded.len(), map.len());
    }

    #[test]
    fn entry_order_does_not_matter(map in flag_map(), rotation in 0_usize .. 8) {
        let flags = FeatureFlags::from_pairs(map.clone()).unwrap();
        let mut entries: Vec<String> =
            map.iter().map(|(key, value)| format!("{key}={value}")).collect();
        if !entries.is_empty() {
            let shift = rotation % entries.len();
            entries.rotate_left(shift);
            entries.reverse();
        }
        let decoded = FeatureFlags::decode(&entries.join(",")).unwrap();
        prop_assert_eq!(&decoded, &flags);
        let from_entries = FeatureFlags::from_entries(entries.iter().map(String::as_str)).unwrap();
        prop_assert_eq!(from_entries, flags);
    }

    #[test]
    fn entries_round_trip(map in flag_map()) {
        let flags = FeatureFlags::from_pairs(map).unwrap();
        let entries: Vec<String> = flags.entries().collect();
        prop_assert_eq!(entries.len(), flags.len());
        prop_assert_eq!(FeatureFlags::from_entries(entries.iter().map(String::as_str)).unwrap(), flags);
    }

    #[test]
    fn decoder_never_panics(raw in ".{0,128}") {
        let _ = FeatureFlags::decode(&raw);
    }
}
