//! # The Document Kernel
//!
//! `Document` ties the value model, loader, and merger together: it owns a
//! document's body, its provenance (`repo_path`, `source_paths`), its
//! position in the enclosing document tree (`parent`), and the set of
//! reference paths already visited on its resolution chain
//! (`visited_refs`). It exposes the small state machine described in the
//! crate's top-level documentation: `from_yaml`/`from_dict` →
//! `resolve_and_merge_references` → (`validate`) → `process_vars` →
//! `to_plain`.
//!
//! A `Document` is a cheap handle (`Rc<RefCell<DocumentInner>>`) rather than
//! an owned tree node, because sub-documents need to both be owned by their
//! parent's body *and* be reachable independently (a `parent()` variable
//! helper needs to walk back up). Modeling this with a single owning tree
//! and a raw back-pointer is not possible in safe Rust, so the back-pointer
//! is a `Weak` reference instead, and the forward edges are ordinary `Rc`
//! clones.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::loader;
use crate::merge;
use crate::path;
use crate::value::{self, Value};

pub(crate) struct DocumentInner {
    kind: Arc<dyn Kind>,
    body: Value,
    repo_path: Option<String>,
    source_paths: Vec<PathBuf>,
    parent: Option<Weak<RefCell<DocumentInner>>>,
    visited_refs: HashSet<String>,
}

/// A handle to one node of a configuration document tree.
///
/// Cloning a `Document` is cheap and shares the same underlying data (it is
/// a reference-counted handle, not a deep copy); mutating one clone is
/// visible through all others, matching the way a sub-document embedded in
/// a parent's body is the same object a caller may still be holding a
/// handle to.
#[derive(Clone)]
pub struct Document(Rc<RefCell<DocumentInner>>);

impl Document {
    /// Loads a document from a YAML file. The file's single top-level key
    /// must equal `kind.header()`.
    pub fn from_yaml(path: impl AsRef<Path>, kind: Arc<dyn Kind>) -> Result<Document> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let parsed: serde_yaml::Value = serde_yaml::from_str(&text)?;
        let value = Value::from_yaml_value(parsed)?;
        let body = take_header(value, &kind)?;
        Document::from_dict_with_source(body, kind, Some(path.to_path_buf()))
    }

    /// Builds a document directly from an in-memory value (already the body,
    /// without a header wrapper).
    pub fn from_dict(value: Value, kind: Arc<dyn Kind>) -> Result<Document> {
        Document::from_dict_with_source(value, kind, None)
    }

    fn from_dict_with_source(mut body: Value, kind: Arc<dyn Kind>, source: Option<PathBuf>) -> Result<Document> {
        kind.after_construct(&mut body)?;
        let source_paths = source.into_iter().collect();
        Ok(Document::from_raw(kind, body, None, source_paths, None, HashSet::new()))
    }

    pub(crate) fn from_raw(
        kind: Arc<dyn Kind>,
        body: Value,
        repo_path: Option<String>,
        source_paths: Vec<PathBuf>,
        parent: Option<Weak<RefCell<DocumentInner>>>,
        visited_refs: HashSet<String>,
    ) -> Document {
        Document(Rc::new(RefCell::new(DocumentInner {
            kind,
            body,
            repo_path,
            source_paths,
            parent,
            visited_refs,
        })))
    }

    pub fn kind(&self) -> Arc<dyn Kind> {
        self.0.borrow().kind.clone()
    }

    pub fn body(&self) -> Value {
        self.0.borrow().body.clone()
    }

    pub fn repo_path(&self) -> Option<String> {
        self.0.borrow().repo_path.clone()
    }

    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.0.borrow().source_paths.clone()
    }

    pub fn visited_refs(&self) -> HashSet<String> {
        self.0.borrow().visited_refs.clone()
    }

    pub(crate) fn parent_handle(&self) -> Option<Weak<RefCell<DocumentInner>>> {
        self.0.borrow().parent.clone()
    }

    /// The document this one was loaded as a sub-document of, or `self` if
    /// there is none. Exposed to templates as the `parent()` helper.
    pub fn parent(&self) -> Document {
        match self.0.borrow().parent.as_ref().and_then(Weak::upgrade) {
            Some(rc) => Document(rc),
            None => self.clone(),
        }
    }

    pub fn first_source_path(&self) -> Option<String> {
        self.0
            .borrow()
            .source_paths
            .first()
            .map(|p| p.display().to_string())
    }

    /// Resolves this document's `$ref` chain (if any), runs the kind's
    /// `after_merge` hook, descends into typed sub-documents, and sweeps
    /// remove-markers. Idempotent: a document with no remaining `$ref` is
    /// left untouched by steps 1 (no-op) and produces the same body on a
    /// repeated call.
    pub fn resolve_and_merge_references(&self, lookup_paths: &[String]) -> Result<()> {
        let roots = path::resolve_repos(lookup_paths);
        self.resolve_refs_only(&roots)?;

        {
            let mut inner = self.0.borrow_mut();
            let kind = inner.kind.clone();
            kind.after_merge(&mut inner.body)?;
        }

        self.descend_subdocuments(lookup_paths)?;

        {
            let mut inner = self.0.borrow_mut();
            merge::sweep_remove_markers(&mut inner.body)?;
        }

        Ok(())
    }

    /// The reference-resolution-only half of the kernel operation: walks and
    /// folds the `$ref` chain into `self`'s body, with cycle detection, but
    /// never touches sub-documents or remove-markers.
    fn resolve_refs_only(&self, roots: &[PathBuf]) -> Result<()> {
        let reference = {
            let inner = self.0.borrow();
            inner.body.ref_target().map(str::to_string)
        };
        let reference = match reference {
            Some(r) => r,
            None => return Ok(()),
        };

        let candidates = loader::load_referenced(self, &reference, roots)?;
        let mut acc: Option<Document> = None;
        for candidate in candidates {
            acc = Some(match acc {
                None => candidate,
                Some(prev) => merge::merge_document_bodies(&candidate, &prev)?,
            });
        }
        let acc = acc.expect("load_referenced never returns an empty list on success");

        acc.resolve_refs_only(roots)?;

        let merged = merge::merge_document_bodies(self, &acc)?;
        {
            let mut inner = self.0.borrow_mut();
            let merged_inner = merged.0.borrow();
            inner.body = merged_inner.body.clone();
            inner.visited_refs = merged_inner.visited_refs.clone();
            inner.source_paths = merged_inner.source_paths.clone();
        }

        {
            let mut inner = self.0.borrow_mut();
            if let Some(map) = inner.body.as_map_mut() {
                map.shift_remove(value::REF);
            }
        }

        Ok(())
    }

    fn descend_subdocuments(&self, lookup_paths: &[String]) -> Result<()> {
        let kind = self.kind();
        let descriptors = kind.subdocuments().to_vec();
        if descriptors.is_empty() {
            return Ok(());
        }

        let ctx = ParentContext {
            repo_path: self.repo_path(),
            source_paths: self.source_paths(),
            visited_refs: self.visited_refs(),
            parent: Rc::downgrade(&self.0),
        };

        let mut inner = self.0.borrow_mut();
        for descriptor in &descriptors {
            let segments: Vec<&str> = descriptor.path().split('/').filter(|s| !s.is_empty()).collect();
            let child_kind = (descriptor.child_kind)();
            promote_at(&mut inner.body, &segments, descriptor.is_collection(), &child_kind, &ctx, lookup_paths)?;
        }
        Ok(())
    }

    /// Checks the document body against the kind's JSON Schema.
    #[cfg(feature = "schema-validation")]
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();
        let Some(schema) = kind.schema() else {
            return Ok(());
        };
        let body = self.0.borrow().body.to_plain();
        let compiled = jsonschema::validator_for(schema).map_err(|e| Error::SchemaValidation {
            label: Some(kind.name().to_string()),
            message: format!("invalid schema: {e}"),
        })?;
        let errors: Vec<String> = compiled.iter_errors(&body).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaValidation {
                label: Some(kind.name().to_string()),
                message: errors.join("; "),
            })
        }
    }

    /// Recursively replaces every `Doc` node with its header-wrapped plain
    /// body.
    pub fn to_plain(&self) -> serde_json::Value {
        let inner = self.0.borrow();
        let mut map = serde_json::Map::new();
        map.insert(inner.kind.header().to_string(), inner.body.to_plain());
        serde_json::Value::Object(map)
    }

    pub(crate) fn sweep_remove_markers(&self) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        merge::sweep_remove_markers(&mut inner.body)
    }

    pub(crate) fn body_eq(&self, other: &Document) -> bool {
        self.0.borrow().body == other.0.borrow().body
    }

    #[cfg(feature = "variables")]
    pub(crate) fn with_body_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        let mut inner = self.0.borrow_mut();
        f(&mut inner.body)
    }

    /// Runs variable processing (`vars::process_vars`). Requires the
    /// `variables` feature.
    #[cfg(feature = "variables")]
    pub fn process_vars(&self) -> Result<()> {
        crate::vars::process_vars(self)
    }

    /// Renders an arbitrary template string in this document's variable
    /// context (its own declared helpers, `parent()`, and any `extra_helpers`
    /// supplied only for this one call), without touching the document's own
    /// body. Requires the `variables` feature.
    #[cfg(feature = "variables")]
    pub fn process_vars_for(&self, template: &str, extra_helpers: &[crate::kind::HelperDescriptor]) -> Result<String> {
        crate::vars::process_vars_for(self, template, extra_helpers)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Document")
            .field("kind", &inner.kind.name())
            .field("repo_path", &inner.repo_path)
            .finish_non_exhaustive()
    }
}

struct ParentContext {
    repo_path: Option<String>,
    source_paths: Vec<PathBuf>,
    visited_refs: HashSet<String>,
    parent: Weak<RefCell<DocumentInner>>,
}

fn take_header(value: Value, kind: &Arc<dyn Kind>) -> Result<Value> {
    let mut map = value.as_map().cloned().ok_or_else(|| Error::InvalidDocument {
        label: Some(kind.name().to_string()),
        message: "top-level document must be a mapping".to_string(),
    })?;

    if map.len() != 1 {
        return Err(Error::InvalidHeader {
            label: Some(kind.name().to_string()),
            expected: kind.header().to_string(),
            found: format!("a mapping with {} keys", map.len()),
        });
    }

    let header = kind.header().to_string();
    match map.shift_remove(&header) {
        Some(body) => Ok(body),
        None => {
            let found = map.keys().next().cloned().unwrap_or_default();
            Err(Error::InvalidHeader {
                label: Some(kind.name().to_string()),
                expected: header,
                found,
            })
        }
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::String(_) => "string",
        Value::Seq(_) => "list",
        Value::Map(_) => "map",
        Value::Doc(_) => "document",
    }
}

/// Navigates `value` along `segments`, and at the addressed position(s)
/// (one, or every element/value when `collection` is set) replaces a raw
/// mapping with a resolved typed sub-document. Missing segments, or a
/// `$remove` value at any point along the way, are silently skipped (the
/// final sweep will delete the marker; there is nothing to promote).
#[allow(clippy::too_many_arguments)]
fn promote_at(
    value: &mut Value,
    segments: &[&str],
    collection: bool,
    child_kind: &Arc<dyn Kind>,
    ctx: &ParentContext,
    lookup_paths: &[String],
) -> Result<()> {
    match segments.split_first() {
        Some((head, rest)) => match value.as_map_mut() {
            Some(map) => match map.get_mut(*head) {
                Some(next) if !next.is_remove() => {
                    promote_at(next, rest, collection, child_kind, ctx, lookup_paths)
                }
                _ => Ok(()),
            },
            None => Ok(()),
        },
        None => {
            if collection {
                match value {
                    Value::Seq(items) => {
                        for item in items.iter_mut() {
                            if !item.is_remove() {
                                promote_subdocument(item, child_kind, ctx, lookup_paths)?;
                            }
                        }
                        Ok(())
                    }
                    Value::Map(map) => {
                        for (_, item) in map.iter_mut() {
                            if !item.is_remove() {
                                promote_subdocument(item, child_kind, ctx, lookup_paths)?;
                            }
                        }
                        Ok(())
                    }
                    _ => Ok(()),
                }
            } else if !value.is_remove() {
                promote_subdocument(value, child_kind, ctx, lookup_paths)
            } else {
                Ok(())
            }
        }
    }
}

fn promote_subdocument(
    slot: &mut Value,
    child_kind: &Arc<dyn Kind>,
    ctx: &ParentContext,
    lookup_paths: &[String],
) -> Result<()> {
    if let Value::Doc(existing) = slot {
        if existing.kind().header() == child_kind.header() {
            existing.resolve_and_merge_references(lookup_paths)?;
            return Ok(());
        }
    }

    if slot.as_map().is_none() {
        return Err(Error::InvalidDocument {
            label: Some(child_kind.name().to_string()),
            message: format!("expected a mapping for sub-document, found {}", value_type_name(slot)),
        });
    }

    let raw = std::mem::replace(slot, Value::Null);
    let mut body = raw;
    child_kind.after_construct(&mut body)?;
    let child = Document::from_raw(
        child_kind.clone(),
        body,
        ctx.repo_path.clone(),
        ctx.source_paths.clone(),
        Some(ctx.parent.clone()),
        ctx.visited_refs.clone(),
    );
    child.resolve_and_merge_references(lookup_paths)?;
    *slot = Value::Doc(child);
    Ok(())
}

/// Merges two or more files as if each one `$ref`'d the one before it,
/// without running full reference resolution on the intermediate bodies —
/// only the final, fully-folded document is resolved and descended.
pub fn load_multiple(paths: &[PathBuf], kind: Arc<dyn Kind>, lookup_paths: &[String]) -> Result<Document> {
    if paths.is_empty() {
        return Err(Error::InvalidDocument {
            label: Some(kind.name().to_string()),
            message: "load_multiple requires at least one path".to_string(),
        });
    }

    let mut acc: Option<Document> = None;
    for path in paths {
        let doc = Document::from_yaml(path, kind.clone())?;
        acc = Some(match acc {
            None => doc,
            Some(prev) => merge::merge_document_bodies(&doc, &prev)?,
        });
    }
    let merged = acc.expect("checked non-empty above");
    merged.resolve_and_merge_references(lookup_paths)?;
    Ok(merged)
}
