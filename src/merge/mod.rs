//! # The Merger
//!
//! This module implements the document algebra's two-value merge and the
//! final remove-marker sweep. Both are pure functions over `Value` (or, for
//! `merge_document_bodies`, over a pair of `Document`s): neither performs
//! I/O, neither knows about `$ref` resolution, and neither knows about
//! sub-document descriptors. The `$ref` fold-left driver lives in
//! `document`, which calls back into the two functions here for each pairwise
//! merge along the chain.

use indexmap::IndexMap;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::value::{Value, REF, REMOVE};

/// Merges `target` over `source`: where both define a value for the same
/// position, `target` wins (recursively, for maps and documents;
/// overwriting, for everything else). Lists are concatenated, source then
/// target. Does not interpret `$remove`/`$remove::` sentinels — that is the
/// sweep's job — with one exception: a `$remove` assigned to the `$ref` key
/// is erased eagerly during the map merge (see `merge_maps`), since leaving
/// it in place would make reference resolution try to load a file literally
/// named `$remove` before the sweep ever runs.
pub fn merge_values(target: Value, source: Value) -> Result<Value> {
    match (target, source) {
        (Value::Map(target_map), Value::Map(source_map)) => {
            Ok(Value::Map(merge_maps(target_map, source_map)?))
        }
        (Value::Seq(mut target_seq), Value::Seq(source_seq)) => {
            let mut result = source_seq;
            result.append(&mut target_seq);
            Ok(Value::Seq(result))
        }
        (Value::Doc(target_doc), Value::Doc(source_doc)) => {
            Ok(Value::Doc(merge_document_bodies(&target_doc, &source_doc)?))
        }
        (target, _source) => Ok(target),
    }
}

fn merge_maps(
    target: IndexMap<String, Value>,
    source: IndexMap<String, Value>,
) -> Result<IndexMap<String, Value>> {
    let mut result = source;
    for (key, target_value) in target {
        // An overlay assigning `$remove` to `$ref` cancels the inherited
        // reference outright. Everywhere else `$remove` is left as an
        // ordinary scalar for the final sweep (4.2.3) to erase.
        if key == REF && target_value.is_remove() {
            result.shift_remove(&key);
            continue;
        }
        match result.shift_remove(&key) {
            Some(source_value) => {
                result.insert(key, merge_values(target_value, source_value)?);
            }
            None => {
                result.insert(key, target_value);
            }
        }
    }
    Ok(result)
}

/// Merges `target`'s body over `source`'s body (target wins), and combines
/// their provenance (`visited_refs`, `source_paths`). Returns a brand new
/// document rather than mutating either input, keeping the function pure;
/// callers that need to mutate a long-lived `Document` in place (the top of
/// a `$ref` chain) copy the result's fields back themselves.
pub fn merge_document_bodies(target: &Document, source: &Document) -> Result<Document> {
    let merged_body = merge_values(target.body(), source.body())?;

    let mut visited_refs = target.visited_refs();
    visited_refs.extend(source.visited_refs());

    let mut source_paths = target.source_paths();
    for path in source.source_paths() {
        if !source_paths.contains(&path) {
            source_paths.push(path);
        }
    }

    Ok(Document::from_raw(
        target.kind(),
        merged_body,
        target.repo_path(),
        source_paths,
        target.parent_handle(),
        visited_refs,
    ))
}

/// Walks a fully merged document tree once, deleting every `$remove`-valued
/// map entry and every `$remove::<payload>`-marked list element (along with
/// any list element it names). A bare `$remove` found anywhere other than
/// as a map value (e.g. as a whole document body, or inside a list) is an
/// error: there is nothing for it to remove.
pub fn sweep_remove_markers(value: &mut Value) -> Result<()> {
    match value {
        Value::Map(map) => {
            let to_delete: Vec<String> = map
                .iter()
                .filter(|(_, v)| v.is_remove())
                .map(|(k, _)| k.clone())
                .collect();
            for key in to_delete {
                map.shift_remove(&key);
                log::debug!("swept `$remove` marker for key `{key}`");
            }
            for (_, child) in map.iter_mut() {
                sweep_remove_markers(child)?;
            }
            Ok(())
        }
        Value::Seq(items) => {
            let removable: std::collections::HashSet<String> = items
                .iter()
                .filter_map(Value::remove_from_list_payload)
                .map(str::to_string)
                .collect();

            if !removable.is_empty() {
                log::debug!("sweeping {} `$remove::` marker(s) from list", removable.len());
            }

            items.retain(|item| {
                if item.remove_from_list_payload().is_some() {
                    return false;
                }
                !matches!(item.as_str(), Some(s) if removable.contains(s))
            });

            for item in items.iter_mut() {
                if item.is_remove() {
                    return Err(Error::InvalidRemove {
                        label: None,
                        message: "`$remove` cannot appear as a list element".to_string(),
                    });
                }
                sweep_remove_markers(item)?;
            }
            Ok(())
        }
        Value::Doc(doc) => doc.sweep_remove_markers(),
        Value::String(s) if s == REMOVE => Err(Error::InvalidRemove {
            label: None,
            message: "`$remove` cannot appear as a whole document or value".to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    #[test]
    fn test_merge_maps_target_wins_on_scalar_conflict() {
        let target = indexmap! { "a".to_string() => Value::Int(2) };
        let source = indexmap! { "a".to_string() => Value::Int(1), "b".to_string() => Value::Int(9) };
        let merged = merge_maps(target, source).unwrap();
        assert_eq!(merged.get("a"), Some(&Value::Int(2)));
        assert_eq!(merged.get("b"), Some(&Value::Int(9)));
    }

    #[test]
    fn test_merge_maps_remove_on_ref_key_cancels_reference_eagerly() {
        let target = indexmap! {
            REF.to_string() => Value::String(REMOVE.to_string()),
            "kept".to_string() => Value::Int(1),
        };
        let source = indexmap! { REF.to_string() => Value::String("/parent".to_string()) };
        let merged = merge_maps(target, source).unwrap();
        assert!(!merged.contains_key(REF));
        assert_eq!(merged.get("kept"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_merge_maps_remove_on_other_key_is_kept_for_sweep() {
        let target = indexmap! { "str_field".to_string() => Value::String(REMOVE.to_string()) };
        let source = indexmap! { "str_field".to_string() => Value::String("a".to_string()) };
        let merged = merge_maps(target, source).unwrap();
        assert_eq!(merged.get("str_field"), Some(&Value::String(REMOVE.to_string())));
    }

    #[test]
    fn test_merge_maps_preserves_source_order_then_new_keys() {
        let target = indexmap! { "c".to_string() => Value::Int(3) };
        let source = indexmap! { "a".to_string() => Value::Int(1), "b".to_string() => Value::Int(2) };
        let merged = merge_maps(target, source).unwrap();
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_values_seq_concatenates_source_then_target() {
        let target = Value::Seq(vec![Value::String("y".to_string()), Value::String("z".to_string())]);
        let source = Value::Seq(vec![Value::String("x".to_string())]);
        let merged = merge_values(target, source).unwrap();
        assert_eq!(
            merged,
            Value::Seq(vec![
                Value::String("x".to_string()),
                Value::String("y".to_string()),
                Value::String("z".to_string()),
            ])
        );
    }

    #[test]
    fn test_merge_values_scalar_target_wins() {
        let merged = merge_values(Value::String("new".to_string()), Value::String("old".to_string())).unwrap();
        assert_eq!(merged, Value::String("new".to_string()));
    }

    #[test]
    fn test_sweep_remove_markers_deletes_remove_valued_key() {
        let mut value = Value::Map(indexmap! {
            "str_field".to_string() => Value::String(REMOVE.to_string()),
            "kept".to_string() => Value::Int(1),
        });
        sweep_remove_markers(&mut value).unwrap();
        let map = value.as_map().unwrap();
        assert!(!map.contains_key("str_field"));
        assert_eq!(map.get("kept"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_sweep_remove_markers_list_removes_named_and_marker() {
        let mut value = Value::Seq(vec![
            Value::String("x".to_string()),
            Value::String("y".to_string()),
            Value::String("z".to_string()),
            Value::String("$remove::y".to_string()),
        ]);
        sweep_remove_markers(&mut value).unwrap();
        assert_eq!(
            value,
            Value::Seq(vec![Value::String("x".to_string()), Value::String("z".to_string())])
        );
    }

    #[test]
    fn test_sweep_remove_markers_bare_remove_in_list_errors() {
        let mut value = Value::Seq(vec![Value::String(REMOVE.to_string())]);
        assert!(sweep_remove_markers(&mut value).is_err());
    }

    #[test]
    fn test_sweep_remove_markers_bare_remove_at_top_errors() {
        let mut value = Value::String(REMOVE.to_string());
        assert!(sweep_remove_markers(&mut value).is_err());
    }

    #[test]
    fn test_sweep_remove_markers_is_idempotent() {
        let mut value = Value::Map(indexmap! {
            "more".to_string() => Value::Seq(vec![Value::String("x".to_string())]),
        });
        sweep_remove_markers(&mut value).unwrap();
        let once = value.clone();
        sweep_remove_markers(&mut value).unwrap();
        assert_eq!(value, once);
    }
}
