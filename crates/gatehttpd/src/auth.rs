//! Per-directory Basic authentication
//!
//! The credential file closest to the requested file wins: starting at the
//! file's directory and walking up to the document root, the first
//! directory holding a `.htpasswd` decides. Each entry in that file is a
//! whitespace-separated `user:<md5-hex of password>` token.
//!
//! All scratch memory (file contents, decoded token, rebuilt entry) comes
//! from a scope opened on the caller's arena and is gone on return.

use gatehttpd_core::base64::{decode_into, decoded_capacity};
use gatehttpd_core::constants::CREDENTIAL_FILE;
use gatehttpd_core::error::MemoryError;
use gatehttpd_core::md5::{digest_in_place, padded_len};
use gatehttpd_core::{kwarn, Span};
use gatehttpd_runtime::TempMemory;

use crate::fs::{load_file, LoadError};
use crate::path::concat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// No credential file applies, or the credentials matched
    Granted,
    /// A credential file applies and no credentials were sent
    Unauthorized,
    /// Credentials were sent and did not match
    Forbidden,
}

/// Decide access to `path`, a file under a root whose length is
/// `root_len` (`path[..root_len]` is the root).
///
/// `token` is the base64 text after `Authorization: Basic `.
pub fn authorize(
    path: &str,
    root_len: usize,
    token: Option<&[u8]>,
    scratch: &TempMemory<'_>,
) -> Result<AuthDecision, MemoryError> {
    let temp = scratch.begin_temp();

    let entries = match find_credentials(path, root_len, &temp)? {
        Lookup::None => return Ok(AuthDecision::Granted),
        Lookup::Unreadable => return Ok(AuthDecision::Forbidden),
        Lookup::Found(entries) => entries,
    };

    let Some(token) = token else {
        return Ok(AuthDecision::Unauthorized);
    };

    let Some(expected) = hashed_entry(token, &temp)? else {
        return Ok(AuthDecision::Forbidden);
    };

    if Span::new(entries).words().any(|w| w == expected) {
        Ok(AuthDecision::Granted)
    } else {
        Ok(AuthDecision::Forbidden)
    }
}

enum Lookup<'t> {
    None,
    Unreadable,
    Found(&'t [u8]),
}

/// Walk from the file's directory up to the root looking for a credential
/// file.
fn find_credentials<'t>(
    path: &str,
    root_len: usize,
    temp: &'t TempMemory<'_>,
) -> Result<Lookup<'t>, MemoryError> {
    let mut dir = path;
    while let Some(slash) = dir.rfind('/') {
        if slash < root_len {
            break;
        }
        dir = &path[..slash];

        let candidate = concat(temp, &[dir, "/", CREDENTIAL_FILE])?;
        // nothing at this name (missing, or a path component is a file)
        if std::fs::symlink_metadata(candidate).is_err() {
            continue;
        }
        match load_file(temp, candidate, b"") {
            Ok(contents) => return Ok(Lookup::Found(contents)),
            Err(e) if e.is_not_found() => continue,
            Err(LoadError::TooLarge { size, remaining }) => {
                return Err(MemoryError::OutOfMemory {
                    requested: usize::try_from(size).unwrap_or(usize::MAX),
                    remaining,
                });
            }
            Err(e) => {
                // present but unusable: fail closed
                kwarn!("{}: {}", candidate, e);
                return Ok(Lookup::Unreadable);
            }
        }
    }
    Ok(Lookup::None)
}

/// Turn `base64(user:password)` into `user:<md5-hex(password)>`.
/// `None` when the decoded token has no `:`.
fn hashed_entry<'t>(
    token: &[u8],
    temp: &'t TempMemory<'_>,
) -> Result<Option<&'t [u8]>, MemoryError> {
    let decoded_buf = temp.push_size(decoded_capacity(token.len()))?;
    let decoded = match decode_into(token, decoded_buf) {
        Ok(d) => Span::new(d),
        Err(_) => return Ok(None),
    };

    let Some((user, password)) = decoded.split_once(b':') else {
        return Ok(None);
    };

    let hash_buf = temp.push_size(padded_len(password.len()))?;
    hash_buf[..password.len()].copy_from_slice(password.as_bytes());
    let Ok(digest) = digest_in_place(hash_buf, password.len()) else {
        return Ok(None);
    };

    let hex = digest.to_hex();
    let entry = temp.push_size(user.len() + 1 + hex.len())?;
    entry[..user.len()].copy_from_slice(user.as_bytes());
    entry[user.len()] = b':';
    entry[user.len() + 1..].copy_from_slice(&hex);
    Ok(Some(entry))
}
