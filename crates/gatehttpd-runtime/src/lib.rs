//! # gatehttpd-runtime
//!
//! Platform layer for the gatehttpd file server.
//!
//! ## Modules
//!
//! - `memory` - Reserved, zero-filled region backing all arenas (mmap on unix)
//! - `arena` - Bump arena with stacked checkpoint scopes
//! - `task_pool` - Fixed set of task slots, each with a private arena
//! - `parking` - Counting semaphore idle workers sleep on (futex on Linux)
//! - `work_queue` - Bounded exactly-once work queue
//! - `worker` - Background worker threads
//! - `config` - Defaults, config file and environment configuration

pub mod memory;
pub mod arena;
pub mod task_pool;
pub mod parking;
pub mod work_queue;
pub mod worker;
pub mod config;

pub use memory::MemoryRegion;
pub use arena::{Arena, TempMemory};
pub use task_pool::{TaskLease, TaskPool};
pub use work_queue::{QueueStats, WorkItem, WorkQueue};
pub use worker::WorkerPool;
pub use config::ServerConfig;
