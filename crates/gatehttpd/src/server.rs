//! Accept loop and request dispatch
//!
//! The accepting thread leases a task slot for every connection and queues
//! the request for the worker pool. When it takes the last free slot it
//! runs one queued request itself before accepting again, so a saturated
//! pool slows intake down instead of letting work pile up.
//!
//! ```text
//!   accept ──► acquire slot ──► enqueue ──► worker: handle ──► release slot
//!                    │                         ▲
//!                    └─ last slot? run_one() ──┘
//! ```

use gatehttpd_core::error::{ConfigError, GateError, GateResult};
use gatehttpd_core::{kerror, kinfo, ktrace, kwarn};
use gatehttpd_runtime::{
    Arena, MemoryRegion, ServerConfig, TaskLease, TaskPool, WorkQueue, WorkerPool,
};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::handler::{handle, ServeContext};
use crate::stats::ServerStats;

/// How long the accept loop waits before re-checking the running flag
const ACCEPT_POLL: Duration = Duration::from_millis(100);

pub struct Server {
    pool: TaskPool,
    queue: Arc<WorkQueue>,
    workers: WorkerPool,
    ctx: Arc<ServeContext>,
    stats: Arc<ServerStats>,
}

impl Server {
    /// Reserve task memory and start the worker threads.
    pub fn new(config: &ServerConfig) -> GateResult<Self> {
        config.validate()?;
        let region_size = config
            .region_size()
            .ok_or(ConfigError::InvalidValue("num_threads * task_memory overflows"))?;

        let root = Arena::from_region(MemoryRegion::reserve(region_size)?);
        let pool = TaskPool::new(&root, config.num_threads, config.task_memory)?;
        let queue = Arc::new(WorkQueue::new(config.queue_capacity));
        let workers = WorkerPool::start(config.num_workers(), Arc::clone(&queue))?;

        let stats = Arc::new(ServerStats::new());
        let ctx = Arc::new(ServeContext::new(
            &config.root,
            config.recv_buffer_size,
            Arc::clone(&stats),
        ));

        kinfo!(
            "{} task slots x {} KB, {} workers, queue capacity {}",
            pool.capacity(),
            config.task_memory / 1024,
            workers.num_workers(),
            queue.capacity()
        );

        Ok(Self {
            pool,
            queue,
            workers,
            ctx,
            stats,
        })
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Accept and dispatch connections until `running` is cleared.
    pub fn serve(&self, listener: &TcpListener, running: &AtomicBool) -> GateResult<()> {
        listener.set_nonblocking(true)?;
        if let Ok(addr) = listener.local_addr() {
            kinfo!("serving {} on http://{}/", self.ctx.root(), addr);
        }

        while running.load(Ordering::Relaxed) {
            if !wait_readable(listener, ACCEPT_POLL)? {
                continue;
            }
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nonblocking(false) {
                        kwarn!("{}: {}", peer, e);
                        continue;
                    }
                    self.dispatch(stream, peer);
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => kwarn!("accept: {}", e),
            }
        }
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        self.stats.connections.fetch_add(1, Ordering::Relaxed);

        let lease = self.pool.acquire();
        let saturated = self.pool.busy_count() == self.pool.capacity();

        let ctx = Arc::clone(&self.ctx);
        self.queue.enqueue(move || {
            let mut stream = stream;
            serve_connection(&mut stream, peer, &lease, &ctx);
            drop(lease);
            drop(stream);
        });

        if saturated {
            ktrace!("all {} task slots busy, accept thread helping", self.pool.capacity());
            self.queue.run_one();
        }
    }

    /// Stop the workers after the queue drains and log the counters.
    pub fn shutdown(mut self) -> GateResult<()> {
        kinfo!("shutting down");
        self.workers.shutdown();
        while self.queue.run_one() {}
        self.workers.join()?;

        let q = self.queue.stats();
        kinfo!(
            "queue: pushed={} completed={} panicked={} helped={}",
            q.pushed.load(Ordering::Relaxed),
            q.completed.load(Ordering::Relaxed),
            q.panicked.load(Ordering::Relaxed),
            q.helped.load(Ordering::Relaxed),
        );
        self.stats.print();
        Ok(())
    }
}

fn serve_connection(
    stream: &mut TcpStream,
    peer: SocketAddr,
    lease: &TaskLease,
    ctx: &ServeContext,
) {
    let stats = ctx.stats();
    match handle(stream, peer, lease, ctx) {
        Ok(Some(status)) => stats.record(status),
        Ok(None) => {
            stats.empty.fetch_add(1, Ordering::Relaxed);
        }
        Err(GateError::Memory(e)) => {
            kerror!("{}: request dropped: {}", peer, e);
            stats.memory_errors.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            kwarn!("{}: {}", peer, e);
            stats.transport_errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::os::unix::io::AsRawFd;

        /// `true` once a connection is ready to accept.
        fn wait_readable(listener: &TcpListener, timeout: Duration) -> io::Result<bool> {
            let mut pfd = libc::pollfd {
                fd: listener.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
            let rc = unsafe { libc::poll(&mut pfd, 1, ms) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    return Ok(false);
                }
                return Err(err);
            }
            Ok(rc > 0)
        }
    } else {
        fn wait_readable(_listener: &TcpListener, timeout: Duration) -> io::Result<bool> {
            // nonblocking accept reports WouldBlock when nothing is pending
            std::thread::sleep(timeout / 10);
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::path::Path;
    use std::thread::{self, JoinHandle};

    const HTPASSWD: &str = "user:ee11cbb19052e40b07aac0ca060c23ee\n";

    struct Running {
        addr: SocketAddr,
        flag: Arc<AtomicBool>,
        handle: JoinHandle<Arc<ServerStats>>,
    }

    impl Running {
        fn stop(self) -> Arc<ServerStats> {
            self.flag.store(false, Ordering::Relaxed);
            self.handle.join().unwrap()
        }
    }

    fn start(root: &Path, threads: usize, queue: usize) -> Running {
        let config = ServerConfig::new()
            .root(root.to_str().unwrap())
            .num_threads(threads)
            .queue_capacity(queue)
            .task_memory(128 * 1024)
            .recv_buffer_size(4096);
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let flag = Arc::new(AtomicBool::new(true));

        let running = Arc::clone(&flag);
        let handle = thread::spawn(move || {
            let server = Server::new(&config).unwrap();
            let stats = Arc::clone(server.stats());
            server.serve(&listener, &running).unwrap();
            server.shutdown().unwrap();
            stats
        });
        Running { addr, flag, handle }
    }

    fn fetch(addr: SocketAddr, raw: &str) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(raw.as_bytes()).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        out
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("x")).unwrap();
        fs::write(dir.path().join("x/index.html"), "<p>x</p>\n").unwrap();
        dir
    }

    #[test]
    fn test_end_to_end_public_file() {
        let dir = site();
        let server = start(dir.path(), 4, 16);

        let out = fetch(server.addr, "GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(out, b"HTTP/1.1 200 OK\r\n\r\n<p>x</p>\n");

        let out = fetch(server.addr, "GET / HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(out, b"HTTP/1.1 200 OK\r\n\r\n<p>x</p>\n");

        let stats = server.stop();
        assert_eq!(stats.ok.load(Ordering::Relaxed), 2);
        assert_eq!(stats.connections.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_end_to_end_protected_file() {
        let dir = site();
        fs::write(dir.path().join("x/.htpasswd"), HTPASSWD).unwrap();
        let server = start(dir.path(), 4, 16);

        let out = fetch(server.addr, "GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(out.starts_with(b"HTTP/1.1 401 Unauthorized\r\n"));
        assert!(out.ends_with(b"realm=\"Access to the staging site\"\r\n\r\n"));

        let out = fetch(
            server.addr,
            "GET /index.html HTTP/1.1\r\nHost: x\r\nAuthorization: Basic dXNlcjp1c2Vy\r\n\r\n",
        );
        assert_eq!(out, b"HTTP/1.1 200 OK\r\n\r\n<p>x</p>\n");

        let out = fetch(
            server.addr,
            "GET /index.html HTTP/1.1\r\nHost: x\r\nAuthorization: Basic YWRtaW46YWRtaW4=\r\n\r\n",
        );
        assert_eq!(out, b"HTTP/1.1 403 Forbidden\r\n\r\n");

        let stats = server.stop();
        assert_eq!(stats.unauthorized.load(Ordering::Relaxed), 1);
        assert_eq!(stats.ok.load(Ordering::Relaxed), 1);
        assert_eq!(stats.forbidden.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_end_to_end_errors() {
        let dir = site();
        let server = start(dir.path(), 2, 4);

        let out = fetch(server.addr, "GET /index.html HTTP/1.1\r\n\r\n");
        assert_eq!(out, b"HTTP/1.1 400 Bad Request\r\n\r\n");

        // connect and hang up without a request; accepted before the next one
        drop(TcpStream::connect(server.addr).unwrap());

        let out = fetch(server.addr, "GET /missing HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\n\r\n");

        let stats = server.stop();
        assert_eq!(stats.bad_request.load(Ordering::Relaxed), 1);
        assert_eq!(stats.not_found.load(Ordering::Relaxed), 1);
        assert_eq!(stats.empty.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_many_concurrent_clients() {
        const CLIENTS: usize = 32;
        let dir = site();
        // fewer slots and queue entries than clients: exercises blocking
        // acquire and the accept thread helping
        let server = start(dir.path(), 3, 2);
        let addr = server.addr;

        let clients: Vec<_> = (0..CLIENTS)
            .map(|_| {
                thread::spawn(move || fetch(addr, "GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n"))
            })
            .collect();
        for c in clients {
            assert_eq!(c.join().unwrap(), b"HTTP/1.1 200 OK\r\n\r\n<p>x</p>\n");
        }

        let stats = server.stop();
        assert_eq!(stats.ok.load(Ordering::Relaxed), CLIENTS as u64);
    }

    #[test]
    fn test_single_thread_server() {
        let dir = site();
        let server = start(dir.path(), 1, 1);
        for _ in 0..3 {
            let out = fetch(server.addr, "GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
            assert!(out.starts_with(b"HTTP/1.1 200 OK"));
        }
        server.stop();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ServerConfig::new().num_threads(0);
        assert!(matches!(Server::new(&config), Err(GateError::Config(_))));
    }
}
