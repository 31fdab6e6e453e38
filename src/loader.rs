//! # Loading Referenced Documents
//!
//! This module discovers and parses the file(s) a `$ref` string points at.
//! It is the only place cycle detection happens: a document is refused
//! construction, not merged and then rejected, the moment its resolved
//! logical path is already present in the inherited `visited_refs` set.

use std::path::PathBuf;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::path;
use crate::value::Value;

/// Loads every file satisfying `reference` (resolved relative to
/// `referencing`'s own `repo_path`) across `roots`, as fresh documents of
/// the same kind as `referencing`.
///
/// Fails with `ReferencedDocumentNotFound` if the reference escapes every
/// root after normalization, or if normalization succeeds but no candidate
/// file exists. Fails with `CircularDependency` if the resolved logical path
/// is already in the chain of references that led to `referencing`.
pub fn load_referenced(referencing: &Document, reference: &str, roots: &[PathBuf]) -> Result<Vec<Document>> {
    let base = referencing.repo_path();
    let logical_path = path::path_in_repo(base.as_deref(), reference).ok_or_else(|| {
        Error::ReferencedDocumentNotFound {
            reference: reference.to_string(),
            source_path: referencing.first_source_path(),
        }
    })?;

    let mut visited = referencing.visited_refs();
    if let Some(rp) = &base {
        visited.insert(rp.clone());
    }
    if visited.contains(&logical_path) {
        let chain = base.clone().unwrap_or_else(|| "<root>".to_string());
        return Err(Error::CircularDependency {
            cycle: format!("{chain} -> {logical_path}"),
        });
    }

    let files = path::candidate_files(&logical_path, roots);
    if files.is_empty() {
        return Err(Error::ReferencedDocumentNotFound {
            reference: logical_path,
            source_path: referencing.first_source_path(),
        });
    }

    let kind = referencing.kind();
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(&file)?;
        let parsed: serde_yaml::Value = serde_yaml::from_str(&text)?;
        let value = Value::from_yaml_value(parsed)?;

        let map = value.as_map().cloned().ok_or_else(|| Error::InvalidDocument {
            label: Some(kind.name().to_string()),
            message: format!("{} did not parse to a mapping", file.display()),
        })?;
        if map.len() != 1 {
            return Err(Error::InvalidHeader {
                label: Some(kind.name().to_string()),
                expected: kind.header().to_string(),
                found: format!("a mapping with {} keys in {}", map.len(), file.display()),
            });
        }
        let header = kind.header().to_string();
        let mut map = map;
        let mut body = map.shift_remove(&header).ok_or_else(|| {
            let found = map.keys().next().cloned().unwrap_or_default();
            Error::InvalidHeader {
                label: Some(kind.name().to_string()),
                expected: header.clone(),
                found,
            }
        })?;

        kind.after_construct(&mut body)?;

        documents.push(Document::from_raw(
            kind.clone(),
            body,
            Some(logical_path.clone()),
            vec![file],
            None,
            visited.clone(),
        ));
    }

    Ok(documents)
}
