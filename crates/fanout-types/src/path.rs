//! Helpers for `/`-separated store paths.
//!
//! Paths are absolute, use `/` as the only separator and never end with a
//! trailing slash (except the root itself).

use crate::error::TypeError;

/// Join a base path and a relative child, normalizing the separator.
pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if child.is_empty() {
        return if base.is_empty() { "/".into() } else { base.into() };
    }
    format!("{base}/{child}")
}

/// Parent of a path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Last segment of a path.
pub fn name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Every ancestor of `path`, from the root down, excluding `path` itself.
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = parent(path);
    while let Some(p) = current {
        out.push(p);
        current = parent(p);
    }
    out.reverse();
    out
}

/// Validate that `path` is absolute with no empty or relative segments.
pub fn validate(path: &str) -> Result<(), TypeError> {
    let fail = |reason: &str| TypeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if !path.starts_with('/') {
        return Err(fail("must be absolute"));
    }
    if path == "/" {
        return Ok(());
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(fail("empty segment")),
            "." | ".." => return Err(fail("relative segment")),
            _ => {}
        }
    }
    Ok(())
}
