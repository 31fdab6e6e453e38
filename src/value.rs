//! # The Value Tree
//!
//! This module defines `Value`, the tagged container every document body is
//! built from, and the sentinel string constants that drive reference
//! resolution (`$ref`) and surgical removal (`$remove`, `$remove::<x>`).
//!
//! Maps preserve insertion order (`indexmap::IndexMap`) so that a merged
//! document's key order matches what a human reading the overlay chain
//! top-to-bottom would expect, and so `to_plain` output is stable.

use std::fmt;

use indexmap::IndexMap;

use crate::document::Document;
use crate::error::{Error, Result};

/// Map key used to reference a parent document.
pub const REF: &str = "$ref";
/// Scalar value that removes the key or sub-document it is assigned to.
pub const REMOVE: &str = "$remove";
/// Prefix for list elements that remove a matching value from the merged list.
pub const REMOVE_FROM_LIST_PREFIX: &str = "$remove::";

/// The in-memory value tree a document body is made of.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Seq(Vec<Value>),
    Map(IndexMap<String, Value>),
    Doc(Document),
}

impl Value {
    pub fn empty_map() -> Value {
        Value::Map(IndexMap::new())
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Value::String(s) if s == REMOVE)
    }

    pub fn remove_from_list_payload(&self) -> Option<&str> {
        match self {
            Value::String(s) => s.strip_prefix(REMOVE_FROM_LIST_PREFIX),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_doc(&self) -> Option<&Document> {
        match self {
            Value::Doc(d) => Some(d),
            _ => None,
        }
    }

    /// The `$ref` target of this value, if its map body contains one.
    pub fn ref_target(&self) -> Option<&str> {
        self.as_map()?.get(REF)?.as_str()
    }

    /// Converts a parsed `serde_yaml::Value` into our tagged tree.
    pub fn from_yaml_value(v: serde_yaml::Value) -> Result<Value> {
        Ok(match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    return Err(Error::InvalidDocument {
                        label: None,
                        message: format!("unsupported numeric value: {n}"),
                    });
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                let mut out = Vec::with_capacity(seq.len());
                for item in seq {
                    out.push(Value::from_yaml_value(item)?);
                }
                Value::Seq(out)
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    let key = k.as_str().map(str::to_string).ok_or_else(|| Error::InvalidDocument {
                        label: None,
                        message: "map keys must be strings".to_string(),
                    })?;
                    out.insert(key, Value::from_yaml_value(v)?);
                }
                Value::Map(out)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml_value(tagged.value)?,
        })
    }

    /// Recursively replaces every `Doc` node with its header-wrapped plain
    /// body, producing a value free of documents and sentinels, suitable for
    /// handing back to a host application.
    pub fn to_plain(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Seq(items) => serde_json::Value::Array(items.iter().map(Value::to_plain).collect()),
            Value::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_plain());
                }
                serde_json::Value::Object(out)
            }
            Value::Doc(doc) => doc.to_plain(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Doc(a), Value::Doc(b)) => a.body_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain())
    }
}
