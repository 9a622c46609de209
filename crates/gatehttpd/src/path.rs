//! Request target resolution
//!
//! A request for `path` on `Host: host` maps to `root/host/path`. Paths
//! are assembled in the request arena, never on the heap.

use gatehttpd_core::constants::CREDENTIAL_FILE;
use gatehttpd_core::error::MemoryError;
use gatehttpd_core::Span;
use gatehttpd_runtime::TempMemory;

/// File served for a path ending in `/`
pub const INDEX_FILE: &str = "index.html";

/// Concatenate `parts` into one arena string.
pub fn concat<'t>(scratch: &'t TempMemory<'_>, parts: &[&str]) -> Result<&'t str, MemoryError> {
    let len = parts.iter().map(|p| p.len()).sum();
    let buf = scratch.push_size(len)?;
    let mut at = 0;
    for part in parts {
        buf[at..at + part.len()].copy_from_slice(part.as_bytes());
        at += part.len();
    }
    // SAFETY: a concatenation of &str values is valid UTF-8
    Ok(unsafe { std::str::from_utf8_unchecked(buf) })
}

/// Document root without a trailing slash (`/` becomes the empty string so
/// joined paths still start with `/`).
pub fn normalize_root(root: &str) -> String {
    root.trim_end_matches('/').to_string()
}

/// `true` if a request for `path` on `host` may touch the filesystem.
fn is_safe(host: &str, path: &str) -> bool {
    if host.is_empty() || host == "." || host.contains("..") {
        return false;
    }
    if host.contains(|c: char| c == '/' || c == '\\') {
        return false;
    }
    if !path.starts_with('/') || path.contains('\0') || host.contains('\0') {
        return false;
    }
    if path.split('/').any(|s| s == "..") {
        return false;
    }
    // credential files are never served
    path.rsplit('/').next() != Some(CREDENTIAL_FILE)
}

/// Resolve the file behind a request, or `None` when the target must be
/// answered 404 without looking at the disk.
pub fn resolve<'t>(
    scratch: &'t TempMemory<'_>,
    root: &str,
    host: Span<'_>,
    path: Span<'_>,
) -> Result<Option<&'t str>, MemoryError> {
    let (Some(host), Some(path)) = (host.to_str(), path.to_str()) else {
        return Ok(None);
    };
    if !is_safe(host, path) {
        return Ok(None);
    }

    let index = if path.ends_with('/') { INDEX_FILE } else { "" };
    concat(scratch, &[root, "/", host, path, index]).map(Some)
}
