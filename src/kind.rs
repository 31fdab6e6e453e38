//! # Document Kinds
//!
//! A `Kind` is the typed-document equivalent of a class in the original
//! duck-typed implementation this library's document algebra is modeled on:
//! it names the YAML header a document of this kind must carry, the set of
//! positions inside its body that hold further typed sub-documents, the
//! variable helpers available while rendering it, its (optional) JSON
//! Schema, and its lifecycle hooks.
//!
//! Kinds are implemented as `dyn Kind` trait objects rather than an enum so
//! that host applications can define their own document types without
//! modifying this crate, mirroring the way the document algebra's source
//! material let every document type subclass a common base.

use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::value::Value;

/// Describes one position inside a document's body that holds a nested
/// typed document (or a collection of them).
///
/// `selector` is a `/`-delimited path into the body map. A trailing `[]`
/// means "every element of the list, or every value of the map, found at
/// this position" rather than a single value.
#[derive(Debug, Clone, Copy)]
pub struct SubdocumentDescriptor {
    pub selector: &'static str,
    pub child_kind: fn() -> Arc<dyn Kind>,
}

impl SubdocumentDescriptor {
    pub const fn new(selector: &'static str, child_kind: fn() -> Arc<dyn Kind>) -> Self {
        Self { selector, child_kind }
    }

    /// Whether this selector addresses a collection (`[]` suffix) rather
    /// than a single child.
    pub fn is_collection(&self) -> bool {
        self.selector.ends_with("[]")
    }

    /// The selector with any trailing `[]` stripped.
    pub fn path(&self) -> &str {
        self.selector.trim_end_matches("[]")
    }
}

/// A variable helper callable from inside a template string, e.g.
/// `{{ some_helper(1) }}`.
pub struct HelperDescriptor {
    pub name: &'static str,
    #[cfg(feature = "variables")]
    pub func: fn(&Document, &[minijinja::Value]) -> std::result::Result<minijinja::Value, minijinja::Error>,
}

/// Identifies a document type: its header, schema, sub-document layout,
/// helpers, and lifecycle hooks.
pub trait Kind: std::fmt::Debug {
    /// A short, human-readable name used in error messages (not the YAML
    /// header).
    fn name(&self) -> &'static str;

    /// The YAML header key a document of this kind's top-level mapping must
    /// use, e.g. `"base"`.
    fn header(&self) -> &'static str;

    /// This kind's JSON Schema, if any. `None` means "validation always
    /// succeeds", matching documents that never declared a schema.
    #[cfg(feature = "schema-validation")]
    fn schema(&self) -> Option<&serde_json::Value> {
        None
    }

    /// Positions inside the body that hold nested typed documents.
    fn subdocuments(&self) -> &[SubdocumentDescriptor] {
        &[]
    }

    /// Variable helpers available while rendering a document of this kind.
    fn helpers(&self) -> &[HelperDescriptor] {
        &[]
    }

    /// Called once, right after construction, before any merge. Useful for
    /// injecting defaults that a later `$ref` merge may still override.
    fn after_construct(&self, _body: &mut Value) -> Result<()> {
        Ok(())
    }

    /// Called once, after `$ref` resolution and before sub-document descent
    /// and the remove-marker sweep.
    fn after_merge(&self, _body: &mut Value) -> Result<()> {
        Ok(())
    }

    /// Called once, after variable expansion completes.
    fn after_vars(&self, _body: &mut Value) -> Result<()> {
        Ok(())
    }
}
