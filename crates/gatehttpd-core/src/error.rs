//! Error types shared by every gatehttpd crate

use core::fmt;
use std::io;

/// Result type for server operations
pub type GateResult<T> = Result<T, GateError>;

/// Top-level error for setup and serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Reserving or carving memory failed
    Memory(MemoryError),

    /// Worker thread error
    Worker(WorkerError),

    /// Invalid configuration
    Config(ConfigError),

    /// Socket or filesystem error
    Io(io::ErrorKind, String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Memory(e) => write!(f, "memory error: {}", e),
            GateError::Worker(e) => write!(f, "worker error: {}", e),
            GateError::Config(e) => write!(f, "config error: {}", e),
            GateError::Io(kind, msg) => write!(f, "io error ({:?}): {}", kind, msg),
        }
    }
}

impl std::error::Error for GateError {}

impl From<MemoryError> for GateError {
    fn from(e: MemoryError) -> Self {
        GateError::Memory(e)
    }
}

impl From<WorkerError> for GateError {
    fn from(e: WorkerError) -> Self {
        GateError::Worker(e)
    }
}

impl From<ConfigError> for GateError {
    fn from(e: ConfigError) -> Self {
        GateError::Config(e)
    }
}

impl From<io::Error> for GateError {
    fn from(e: io::Error) -> Self {
        GateError::Io(e.kind(), e.to_string())
    }
}

/// Memory region and arena errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap (or the heap fallback) could not reserve the region
    ReserveFailed(i32),

    /// munmap failed
    ReleaseFailed(i32),

    /// Bump allocation would overrun the arena
    OutOfMemory { requested: usize, remaining: usize },

    /// Permanent carving attempted while a checkpoint is open
    CheckpointOpen,

    /// Requested size is zero or overflows
    InvalidSize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::ReserveFailed(errno) => {
                write!(f, "memory reservation failed: errno {}", errno)
            }
            MemoryError::ReleaseFailed(errno) => {
                write!(f, "memory release failed: errno {}", errno)
            }
            MemoryError::OutOfMemory { requested, remaining } => write!(
                f,
                "arena exhausted: requested {} bytes, {} remaining",
                requested, remaining
            ),
            MemoryError::CheckpointOpen => write!(f, "cannot carve while a checkpoint is open"),
            MemoryError::InvalidSize => write!(f, "invalid allocation size"),
        }
    }
}

impl std::error::Error for MemoryError {}

/// Worker thread errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Failed to spawn a worker thread
    SpawnFailed,

    /// A worker thread panicked
    Panicked,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::SpawnFailed => write!(f, "failed to spawn worker thread"),
            WorkerError::Panicked => write!(f, "worker thread panicked"),
        }
    }
}

impl std::error::Error for WorkerError {}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is out of range
    InvalidValue(&'static str),

    /// The config file could not be read
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::Io(msg) => write!(f, "cannot read config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Caller-provided buffer too small for an in-place codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    BufferTooSmall { needed: usize, available: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::BufferTooSmall { needed, available } => write!(
                f,
                "buffer too small: need {} bytes, have {}",
                needed, available
            ),
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = GateError::Memory(MemoryError::OutOfMemory { requested: 10, remaining: 4 });
        assert_eq!(
            format!("{}", e),
            "memory error: arena exhausted: requested 10 bytes, 4 remaining"
        );

        let e = CodecError::BufferTooSmall { needed: 72, available: 8 };
        assert_eq!(format!("{}", e), "buffer too small: need 72 bytes, have 8");
    }

    #[test]
    fn test_error_conversion() {
        let err: GateError = WorkerError::SpawnFailed.into();
        assert!(matches!(err, GateError::Worker(WorkerError::SpawnFailed)));

        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "port taken");
        let err: GateError = io_err.into();
        assert!(matches!(err, GateError::Io(io::ErrorKind::AddrInUse, _)));
    }
}
