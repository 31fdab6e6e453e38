//! # Reference Path Resolution
//!
//! This module turns a `$ref` string into a list of candidate files on disk.
//! It is deliberately filesystem-agnostic in its normalization step: turning
//! a `(base, reference)` pair into a logical path is pure string
//! manipulation, so that "did this reference escape every repository root"
//! can be decided once, before any root is tried, rather than per-root.
//!
//! ## Key Functions
//!
//! - **`resolve_repos`**: turns an ordered list of lookup-path strings into
//!   absolute root directories.
//! - **`path_in_repo`**: resolves a reference string against the referencing
//!   document's own logical path, collapsing `.`/`..` segments.
//! - **`candidate_files`**: given a resolved logical path and a list of
//!   repository roots, returns every existing `.yml`/`.yaml` file that could
//!   satisfy the reference.

use std::env;
use std::path::{Path, PathBuf};

/// Turns a list of lookup-path strings into absolute root directories,
/// preserving order. Relative entries are joined against the current
/// working directory.
pub fn resolve_repos<I, S>(lookup_paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    lookup_paths
        .into_iter()
        .map(|p| {
            let p = Path::new(p.as_ref());
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                cwd.join(p)
            }
        })
        .collect()
}

/// Resolves a `$ref` string against the referencing document's own logical
/// repo path, producing a normalized logical path.
///
/// - A reference starting with `/` is absolute within a repository root and
///   is returned unchanged (normalized).
/// - Otherwise it is joined against the directory of `base`, and the result
///   is lexically normalized, collapsing `.` and `..` segments.
///
/// Returns `None` if normalization would escape above every repository root
/// (the result still begins with `../` after normalization); callers treat
/// that the same as "no candidates found".
pub fn path_in_repo(base: Option<&str>, reference: &str) -> Option<String> {
    if let Some(stripped) = reference.strip_prefix('/') {
        return normalize_posix(stripped).map(|p| format!("/{p}"));
    }

    let dir = match base {
        Some(b) => {
            let b = b.trim_start_matches('/');
            match b.rfind('/') {
                Some(idx) => &b[..idx],
                None => "",
            }
        }
        None => "",
    };

    let joined = if dir.is_empty() {
        reference.to_string()
    } else {
        format!("{dir}/{reference}")
    };

    normalize_posix(&joined)
}

/// Collapses `.` and `..` segments in a POSIX-style path. Returns `None` if
/// the result would climb above the root (a `..` with nothing left to pop).
fn normalize_posix(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Returns every existing `.yml`/`.yaml` file matching `logical_path` across
/// `roots`, in root order, trying `.yml` before `.yaml` within a root (both
/// are returned if both exist, so the caller can merge them left to right).
pub fn candidate_files(logical_path: &str, roots: &[PathBuf]) -> Vec<PathBuf> {
    let logical_path = logical_path.trim_start_matches('/');
    let mut found = Vec::new();
    for root in roots {
        for ext in ["yml", "yaml"] {
            let candidate = root.join(format!("{logical_path}.{ext}"));
            if candidate.is_file() {
                log::debug!("candidate reference file found: {}", candidate.display());
                found.push(candidate);
            } else {
                log::debug!("candidate reference file does not exist: {}", candidate.display());
            }
        }
    }
    found
}
