//! Compile-time defaults, the lowest-priority configuration layer

use gatehttpd_core::constants;

pub const PORT: u16 = constants::DEFAULT_PORT;

pub const ROOT: &str = ".";

/// Task slots; workers are one fewer because the accept thread also serves
pub const NUM_THREADS: usize = constants::NUMBER_OF_THREADS;

pub const QUEUE_CAPACITY: usize = constants::QUEUE_CAPACITY;

pub const TASK_MEMORY: usize = constants::DEFAULT_TASK_MEMORY;

pub const RECV_BUFFER_SIZE: usize = constants::DEFAULT_RECV_BUFFER;

pub const CONFIG_PATH: &str = "config";
