//! # gatehttpd
//!
//! Concurrent static file server with per-directory `.htpasswd` Basic
//! authentication.
//!
//! A request for `GET /a/b.html` with `Host: example` is served from
//! `<root>/example/a/b.html`. The nearest `.htpasswd` between that file and
//! the root decides who may read it.
//!
//! ## Modules
//!
//! - `server` - Accept loop, task slot leasing, dispatch to workers
//! - `handler` - One request: receive, parse, resolve, authorize, respond
//! - `auth` - `.htpasswd` lookup and credential check
//! - `path` - Request target to filesystem path
//! - `fs` - Whole-file reads into a request arena
//! - `response` - Fixed response heads
//! - `stats` - Counters printed at shutdown

pub mod auth;
pub mod fs;
pub mod handler;
pub mod path;
pub mod response;
pub mod server;
pub mod stats;

pub use auth::{authorize, AuthDecision};
pub use handler::{handle, ServeContext};
pub use response::Status;
pub use server::Server;
pub use stats::ServerStats;
