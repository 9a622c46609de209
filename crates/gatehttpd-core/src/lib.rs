//! # gatehttpd-core
//!
//! Platform-agnostic building blocks for the gatehttpd file server.
//!
//! Nothing in this crate touches the OS beyond stderr logging. Memory,
//! threads and sockets live in `gatehttpd-runtime` and `gatehttpd`.
//!
//! ## Modules
//!
//! - `span` - Borrowed byte views and the search helpers the parser needs
//! - `md5` - RFC 1321 digest over a caller-padded buffer
//! - `base64` - Tolerant base64 decoding into caller memory
//! - `http` - HTTP/1.x request-head parser
//! - `error` - Error types
//! - `kprint` - Leveled stderr logging macros

pub mod span;
pub mod md5;
pub mod base64;
pub mod http;
pub mod error;
pub mod kprint;

// Re-exports for convenience
pub use span::Span;
pub use md5::Digest;
pub use http::{parse_request, HttpRequest, HttpVersion, Method};
pub use error::{CodecError, ConfigError, GateError, GateResult, MemoryError, WorkerError};

/// Compile-time sizing
pub mod constants {
    /// Task slots (and therefore concurrent requests); one thread accepts,
    /// the rest are background workers
    pub const NUMBER_OF_THREADS: usize = 8;

    /// Work queue capacity
    pub const QUEUE_CAPACITY: usize = 256;

    /// Maximum request lines (request line + headers) the parser accepts
    pub const MAX_REQUEST_LINES: usize = 512;

    /// Trailing bytes MD5 needs past the message for in-place padding
    pub const MD5_PAD_CAPACITY: usize = 72;

    /// Port used when neither CLI, env nor config file set one
    pub const DEFAULT_PORT: u16 = 3490;

    /// Per-directory credential file name
    pub const CREDENTIAL_FILE: &str = ".htpasswd";

    /// Bytes reserved per task slot
    pub const DEFAULT_TASK_MEMORY: usize = 4 * 1024 * 1024;

    /// Receive buffer carved per request
    pub const DEFAULT_RECV_BUFFER: usize = 8 * 1024;
}
