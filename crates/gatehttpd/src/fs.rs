//! Loading whole files into a request arena
//!
//! A file is read in one piece behind an optional prefix (the response
//! head), so a 200 response goes out as a single buffer. The size is
//! checked against the arena before anything is allocated.

use gatehttpd_runtime::TempMemory;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};

#[derive(Debug)]
pub enum LoadError {
    /// Open, stat or read failed
    Io(io::Error),

    /// Path exists but is not a regular file
    NotAFile,

    /// Prefix plus file would not fit in the arena
    TooLarge { size: u64, remaining: usize },
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "{}", e),
            LoadError::NotAFile => write!(f, "not a regular file"),
            LoadError::TooLarge { size, remaining } => write!(
                f,
                "file of {} bytes does not fit in {} bytes of task memory",
                size, remaining
            ),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Read `path` into `scratch` behind `prefix`; returns prefix + contents.
pub fn load_file<'t>(
    scratch: &'t TempMemory<'_>,
    path: &str,
    prefix: &[u8],
) -> Result<&'t [u8], LoadError> {
    let mut file = File::open(path)?;
    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(LoadError::NotAFile);
    }

    let size = meta.len();
    let remaining = scratch.remaining();
    let total = usize::try_from(size)
        .ok()
        .and_then(|n| n.checked_add(prefix.len()))
        .filter(|&n| n <= remaining)
        .ok_or(LoadError::TooLarge { size, remaining })?;

    let buf = scratch
        .push_size(total)
        .map_err(|_| LoadError::TooLarge { size, remaining })?;
    buf[..prefix.len()].copy_from_slice(prefix);
    file.read_exact(&mut buf[prefix.len()..])?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehttpd_runtime::Arena;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_load_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", b"body");
        let arena = Arena::with_capacity(4096).unwrap();
        let scratch = arena.begin_temp();
        let bytes = load_file(&scratch, &path, b"HEAD:").unwrap();
        assert_eq!(bytes, b"HEAD:body");
        assert_eq!(arena.used(), 9);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").to_str().unwrap().to_string();
        let arena = Arena::with_capacity(4096).unwrap();
        let scratch = arena.begin_temp();
        let err = load_file(&scratch, &path, b"").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let arena = Arena::with_capacity(4096).unwrap();
        let scratch = arena.begin_temp();
        let err = load_file(&scratch, dir.path().to_str().unwrap(), b"").unwrap_err();
        assert!(matches!(err, LoadError::NotAFile));
    }

    #[test]
    fn test_too_large_leaves_arena_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "big.bin", &[7u8; 200]);
        let arena = Arena::with_capacity(128).unwrap();
        let scratch = arena.begin_temp();
        let err = load_file(&scratch, &path, b"").unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { size: 200, remaining: 128 }));
        assert_eq!(arena.used(), 0);
    }
}
