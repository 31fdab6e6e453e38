//! # Configcrunch
//!
//! This library provides a small document algebra for composing hierarchical,
//! validated configuration documents written in YAML. It is designed to be
//! embedded by host applications that need layered, repository-overlaid
//! configuration (a base document inheriting from one or more parents via
//! `$ref`) without shipping their own merge or templating logic.
//!
//! ## Core Concepts
//!
//! The library is built around a few cooperating pieces:
//!
//! - **Value model (`value`)**: the tagged value tree every document body is
//!   built from, plus the sentinel tokens (`$ref`, `$remove`, `$remove::`)
//!   that drive reference resolution and surgical removal.
//! - **Loader (`loader`, `path`)**: discovers and parses the YAML files a
//!   `$ref` points at across an ordered list of repository roots.
//! - **Merger (`merge`)**: the recursive two-document merge and the final
//!   remove-marker sweep.
//! - **Document kernel (`kind`, `document`)**: ties the above together,
//!   drives the `$ref` resolution chain with cycle detection, and descends
//!   into typed sub-documents per a kind's declared descriptors.
//! - **Variable resolver (`vars`)**: the post-merge, fixed-point template
//!   expansion pass over string leaves, available behind the `variables`
//!   feature.
//!
//! ## Execution Flow
//!
//! A typical document lifecycle:
//!
//! 1. **Load**: `Document::from_yaml` or `Document::from_dict` produces a
//!    document in the `CREATED` state.
//! 2. **Resolve**: `resolve_and_merge_references` walks any `$ref` chain,
//!    descends into sub-documents, and sweeps remove-markers, producing a
//!    `MERGED` document.
//! 3. **Validate** (optional, `schema-validation` feature): `validate`
//!    checks the body against the kind's JSON Schema.
//! 4. **Evaluate**: `process_vars` expands template placeholders, producing
//!    an `EVALUATED` document.
//! 5. **Export**: `to_plain` converts the tree to plain nested containers
//!    for the host application to consume.
//!
//! No step in this pipeline performs network I/O, caching, or concurrent
//! mutation of a single document; see the crate-level design notes in
//! `DESIGN.md` for the reasoning behind that boundary.

pub mod document;
pub mod error;
pub mod kind;
pub mod loader;
pub mod merge;
pub mod path;
pub mod value;

#[cfg(feature = "variables")]
pub mod vars;

#[cfg(test)]
mod path_proptest;

pub use document::{load_multiple, Document};
pub use error::{Error, Result};
pub use kind::{HelperDescriptor, Kind, SubdocumentDescriptor};
pub use value::Value;

#[cfg(feature = "variables")]
pub use vars::process_vars_for;
