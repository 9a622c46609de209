//! Server configuration
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Command-line flags (applied by the binary through the builder methods)
//! 2. Environment variables
//! 3. The `config` file (see [`loader`])
//! 4. Library defaults ([`defaults`])
//!
//! # Example
//!
//! ```rust,ignore
//! use gatehttpd_runtime::config::ServerConfig;
//!
//! // defaults, then config file, then env overrides
//! let config = ServerConfig::from_env();
//!
//! // or customize programmatically
//! let config = ServerConfig::new().port(8080).root("/srv/www");
//! ```

pub mod defaults;
pub mod env;
pub mod loader;

use gatehttpd_core::error::ConfigError;
use gatehttpd_core::{kinfo, kwarn};
use std::path::{Path, PathBuf};

use self::env::{env_get, env_get_str};
use self::loader::ConfigFile;

/// Largest accepted thread count
const MAX_THREADS: usize = 1024;

/// Smallest per-slot memory beyond the receive buffer
const MIN_TASK_HEADROOM: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Document root; requests resolve to `root/host/path`
    pub root: String,

    /// TCP port to listen on
    pub port: u16,

    /// Task slots (and concurrent requests); `num_threads - 1` background
    /// workers are spawned
    pub num_threads: usize,

    /// Work queue capacity
    pub queue_capacity: usize,

    /// Arena bytes per task slot
    pub task_memory: usize,

    /// Receive buffer carved from the slot arena per request
    pub recv_buffer_size: usize,

    /// Config file consulted by `from_env` / `load`
    pub config_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Library defaults only (no file, no env).
    pub fn new() -> Self {
        Self {
            root: defaults::ROOT.to_string(),
            port: defaults::PORT,
            num_threads: defaults::NUM_THREADS,
            queue_capacity: defaults::QUEUE_CAPACITY,
            task_memory: defaults::TASK_MEMORY,
            recv_buffer_size: defaults::RECV_BUFFER_SIZE,
            config_path: PathBuf::from(defaults::CONFIG_PATH),
        }
    }

    /// Defaults, then the config file, then environment overrides.
    pub fn from_env() -> Self {
        Self::load(None)
    }

    /// Like `from_env`, reading the config file from `config_path` when
    /// given (otherwise `GATE_CONFIG`, otherwise `./config`).
    ///
    /// A missing or malformed file is not fatal: it is reported and the
    /// defaults stay in effect.
    pub fn load(config_path: Option<PathBuf>) -> Self {
        let mut config = Self::new();
        if let Some(path) = config_path.or_else(|| env_get_str("GATE_CONFIG").map(PathBuf::from)) {
            config.config_path = path;
        }

        let path = config.config_path.clone();
        match config.apply_file(&path) {
            Ok(file) if !file.is_clean() => {
                for d in &file.diagnostics {
                    kwarn!("{}:{}", path.display(), d);
                }
                kwarn!(
                    "{}: {} error(s), file ignored",
                    path.display(),
                    file.diagnostics.len()
                );
            }
            Ok(_) => {}
            Err(e) => kwarn!("{}; using defaults", e),
        }

        config.apply_env();
        config
    }

    /// Read and apply a config file. The parsed file is returned so the
    /// caller can report diagnostics; values are applied only when clean.
    pub fn apply_file(&mut self, path: &Path) -> Result<ConfigFile, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let file = loader::parse_config(&text);
        if file.is_clean() {
            if let Some(port) = file.port {
                self.port = port;
            }
            if let Some(root) = &file.root {
                self.root = root.clone();
            }
        }
        Ok(file)
    }

    /// Apply environment overrides (all optional):
    /// - `GATE_PORT` - listen port
    /// - `GATE_ROOT` - document root
    /// - `GATE_THREADS` - task slots / threads
    /// - `GATE_QUEUE_CAPACITY` - work queue capacity
    /// - `GATE_TASK_MEMORY` - arena bytes per slot
    /// - `GATE_RECV_BUFFER` - receive buffer bytes
    pub fn apply_env(&mut self) {
        self.port = env_get("GATE_PORT", self.port);
        if let Some(root) = env_get_str("GATE_ROOT") {
            self.root = root;
        }
        self.num_threads = env_get("GATE_THREADS", self.num_threads);
        self.queue_capacity = env_get("GATE_QUEUE_CAPACITY", self.queue_capacity);
        self.task_memory = env_get("GATE_TASK_MEMORY", self.task_memory);
        self.recv_buffer_size = env_get("GATE_RECV_BUFFER", self.recv_buffer_size);
    }

    // Builder methods

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn queue_capacity(mut self, cap: usize) -> Self {
        self.queue_capacity = cap;
        self
    }

    pub fn task_memory(mut self, bytes: usize) -> Self {
        self.task_memory = bytes;
        self
    }

    pub fn recv_buffer_size(mut self, bytes: usize) -> Self {
        self.recv_buffer_size = bytes;
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Background workers spawned next to the accept thread
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.num_threads.saturating_sub(1)
    }

    /// Total bytes reserved for all task slots
    pub fn region_size(&self) -> Option<usize> {
        self.num_threads.checked_mul(self.task_memory)
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.is_empty() {
            return Err(ConfigError::InvalidValue("root must not be empty"));
        }
        if self.num_threads == 0 {
            return Err(ConfigError::InvalidValue("num_threads must be > 0"));
        }
        if self.num_threads > MAX_THREADS {
            return Err(ConfigError::InvalidValue("num_threads must be <= 1024"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("queue_capacity must be > 0"));
        }
        if self.recv_buffer_size == 0 {
            return Err(ConfigError::InvalidValue("recv_buffer_size must be > 0"));
        }
        if self.task_memory < self.recv_buffer_size.saturating_add(MIN_TASK_HEADROOM) {
            return Err(ConfigError::InvalidValue(
                "task_memory must exceed recv_buffer_size by at least 4KB",
            ));
        }
        if self.region_size().is_none() {
            return Err(ConfigError::InvalidValue(
                "num_threads * task_memory overflows",
            ));
        }
        Ok(())
    }

    /// Log the effective configuration
    pub fn print(&self) {
        kinfo!("configuration:");
        kinfo!("  root:              {}", self.root);
        kinfo!("  port:              {}", self.port);
        kinfo!("  num_threads:       {}", self.num_threads);
        kinfo!("  queue_capacity:    {}", self.queue_capacity);
        kinfo!("  task_memory:       {}", self.task_memory);
        kinfo!("  recv_buffer_size:  {}", self.recv_buffer_size);
        kinfo!("  config_path:       {}", self.config_path.display());
    }
}
