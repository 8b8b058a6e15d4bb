// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for quantity parsing and label selectors
//!
//! These tests use proptest to generate random inputs and verify that:
//! 1. Parsing never panics, whatever the input
//! 2. Suffixes scale values exactly as the API server defines them
//! 3. Equal quantities in different notation compare equal
//! 4. Selectors render every label, in sorted order

use std::collections::BTreeMap;

use proptest::prelude::*;

use kube_conformance::framework::hash::{SAFE_ALPHANUMS, safe_encode_string};
use kube_conformance::framework::label_selector;
use kube_conformance::framework::quantity::{ParsedQuantity, equal_resource_list, resource_list};

// =============================================================================
// Strategies
// =============================================================================

fn binary_suffix() -> impl Strategy<Value = (&'static str, i128)> {
    prop_oneof![
        Just(("Ki", 1i128 << 10)),
        Just(("Mi", 1i128 << 20)),
        Just(("Gi", 1i128 << 30)),
        Just(("Ti", 1i128 << 40)),
    ]
}

fn decimal_suffix() -> impl Strategy<Value = (&'static str, i128)> {
    prop_oneof![
        Just(("", 1i128)),
        Just(("k", 1_000)),
        Just(("M", 1_000_000)),
        Just(("G", 1_000_000_000)),
    ]
}

fn label_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}[a-z0-9]"
}

fn label_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,20}"
}

// =============================================================================
// Quantity properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: parsing arbitrary text returns a result, never panics
    #[test]
    fn prop_parse_never_panics(input in "\\PC{0,40}") {
        let _ = ParsedQuantity::parse(&input);
    }

    /// Property: parsing number-like text never panics either
    #[test]
    fn prop_parse_numeric_never_panics(input in "[-+]?[0-9]{0,35}(\\.[0-9]{0,12})?([numkMGTPE]|[KMGTPE]i|[eE][-+]?[0-9]{1,3})?") {
        let _ = ParsedQuantity::parse(&input);
    }

    /// Property: a binary suffix multiplies by its power of two
    #[test]
    fn prop_binary_suffix_scales(n in 0i128..1_000_000, (suffix, factor) in binary_suffix()) {
        let q = ParsedQuantity::parse(&format!("{n}{suffix}")).unwrap();
        prop_assert_eq!(q.value(), n * factor);
    }

    /// Property: a decimal suffix multiplies by its power of ten
    #[test]
    fn prop_decimal_suffix_scales(n in 0i128..1_000_000, (suffix, factor) in decimal_suffix()) {
        let q = ParsedQuantity::parse(&format!("{n}{suffix}")).unwrap();
        prop_assert_eq!(q.value(), n * factor);
    }

    /// Property: `Nm` is N thousandths
    #[test]
    fn prop_milli_value(n in 0i128..10_000_000) {
        let q = ParsedQuantity::parse(&format!("{n}m")).unwrap();
        prop_assert_eq!(q.milli_value(), n);
    }

    /// Property: `N*1000m` and `N` are the same quantity
    #[test]
    fn prop_milli_and_whole_agree(n in 0i128..1_000_000) {
        let milli = ParsedQuantity::parse(&format!("{}m", n * 1000)).unwrap();
        let whole = ParsedQuantity::parse(&n.to_string()).unwrap();
        prop_assert_eq!(milli, whole);
    }

    /// Property: the canonical rendering parses back to the same value
    #[test]
    fn prop_display_is_parseable(nanos in -1_000_000_000_000i128..1_000_000_000_000) {
        let q = ParsedQuantity::from_nanos(nanos);
        prop_assert_eq!(ParsedQuantity::parse(&q.to_string()).unwrap(), q);
    }

    /// Property: parsed order matches numeric order within one suffix
    #[test]
    fn prop_order_preserved(a in 0u32..100_000, b in 0u32..100_000) {
        let qa = ParsedQuantity::parse(&format!("{a}Mi")).unwrap();
        let qb = ParsedQuantity::parse(&format!("{b}Mi")).unwrap();
        prop_assert_eq!(a.cmp(&b), qa.cmp(&qb));
    }

    /// Property: a resource list equals its byte-count rendering
    #[test]
    fn prop_resource_list_notation_independent(mi in 1i128..100_000) {
        let expected = resource_list("", &format!("{mi}Mi"), "");
        let actual = resource_list("", &(mi * 1024 * 1024).to_string(), "");
        prop_assert!(equal_resource_list(&expected, &actual).is_ok());
    }
}

// =============================================================================
// Selector and name properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a selector renders one `k=v` term per label, keys sorted
    #[test]
    fn prop_selector_renders_all_labels(labels in prop::collection::btree_map(label_key(), label_value(), 1..6)) {
        let rendered = label_selector(&labels).to_string();
        let terms: Vec<&str> = rendered.split(',').collect();
        prop_assert_eq!(terms.len(), labels.len());

        let parsed: BTreeMap<String, String> = terms
            .iter()
            .map(|t| {
                let (k, v) = t.split_once('=').unwrap();
                (k.to_string(), v.to_string())
            })
            .collect();
        prop_assert_eq!(&parsed, &labels);

        let keys: Vec<&str> = terms.iter().map(|t| t.split_once('=').unwrap().0).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        prop_assert_eq!(keys, sorted);
    }

    /// Property: safe encoding keeps length and stays inside the alphabet
    #[test]
    fn prop_safe_encode_alphabet(input in "[0-9]{1,10}") {
        let encoded = safe_encode_string(&input);
        prop_assert_eq!(encoded.len(), input.len());
        prop_assert!(encoded.bytes().all(|b| SAFE_ALPHANUMS.contains(&b)));
    }
}
