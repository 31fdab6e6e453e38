//! Property tests for path normalization and the remove-marker sweep.
//!
//! These cover the two places the document algebra depends on an
//! invariant holding for *every* input, not just the handful of fixtures
//! exercised by the unit tests beside `path.rs` and `merge/mod.rs`.

use proptest::prelude::*;

use crate::merge::sweep_remove_markers;
use crate::path::path_in_repo;
use crate::value::{Value, REMOVE, REMOVE_FROM_LIST_PREFIX};

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn path_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 0..6)
}

fn reference_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop_oneof![segment(), Just(".".to_string()), Just("..".to_string())],
        0..6,
    )
}

fn arbitrary_value(depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        "[a-z]{0,8}".prop_map(Value::String),
        Just(Value::String(REMOVE.to_string())),
        "[a-z]{1,6}".prop_map(|s| Value::String(format!("{REMOVE_FROM_LIST_PREFIX}{s}"))),
    ];
    if depth == 0 {
        leaf.boxed()
    } else {
        leaf.prop_recursive(depth, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Seq),
                prop::collection::vec((segment(), inner), 0..4).prop_map(|pairs| {
                    let mut map = indexmap::IndexMap::new();
                    for (k, v) in pairs {
                        map.insert(k, v);
                    }
                    Value::Map(map)
                }),
            ]
        })
        .boxed()
    }
}

fn contains_remove_marker(value: &Value) -> bool {
    match value {
        Value::String(s) => s == REMOVE || s.starts_with(REMOVE_FROM_LIST_PREFIX),
        Value::Seq(items) => items.iter().any(contains_remove_marker),
        Value::Map(map) => map.values().any(contains_remove_marker),
        Value::Doc(_) | Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => false,
    }
}

proptest! {
    /// A relative `$ref` resolved against an arbitrary base never reports a
    /// normalized path that still escapes above every repository root: the
    /// function returns `None` in that case rather than a string starting
    /// with `../`.
    #[test]
    fn path_in_repo_never_returns_escaping_path(
        base_segments in path_segments(),
        reference_segments in reference_segments(),
    ) {
        let base = format!("/{}", base_segments.join("/"));
        let base = if base_segments.is_empty() { None } else { Some(base.as_str()) };
        let reference = reference_segments.join("/");

        if let Some(resolved) = path_in_repo(base, &reference) {
            prop_assert!(!resolved.starts_with("../"));
            prop_assert!(!resolved.starts_with("./"));
        }
    }

    /// An absolute `$ref` is never reported as escaping: it is always
    /// rooted, so normalization can only ever collapse segments, never
    /// climb above the root it starts at.
    #[test]
    fn path_in_repo_absolute_reference_always_resolves_or_escapes_cleanly(
        reference_segments in reference_segments(),
    ) {
        let reference = format!("/{}", reference_segments.join("/"));
        // Either it resolves to a rooted path, or it climbed above the
        // root and correctly reports "no candidates" via `None`.
        if let Some(resolved) = path_in_repo(None, &reference) {
            prop_assert!(resolved.starts_with('/'));
        }
    }

    /// Sweeping an arbitrary value tree always removes every remove-marker
    /// reachable without erroring, as long as no bare `$remove` scalar
    /// appears outside of a map value position (which is itself an error,
    /// covered separately) — and running the sweep twice is a no-op.
    #[test]
    fn sweep_remove_markers_is_idempotent_on_map_rooted_trees(
        pairs in prop::collection::vec((segment(), arbitrary_value(3)), 0..4),
    ) {
        let mut map = indexmap::IndexMap::new();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        let mut value = Value::Map(map);

        if sweep_remove_markers(&mut value).is_ok() {
            prop_assert!(!contains_remove_marker(&value));
            let once = value.clone();
            sweep_remove_markers(&mut value).unwrap();
            prop_assert_eq!(value, once);
        }
    }
}
