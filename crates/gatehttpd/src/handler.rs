//! Per-connection request handling
//!
//! One connection carries one request. Everything the request needs is
//! carved from the task lease's arena: the receive buffer, the resolved
//! path, credential file contents and the 200 response. Dropping the lease
//! afterwards reclaims all of it at once.

use gatehttpd_core::error::GateError;
use gatehttpd_core::{kdebug, kwarn, parse_request, HttpRequest, Method};
use gatehttpd_runtime::{TaskLease, TempMemory};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::auth::{authorize, AuthDecision};
use crate::fs::{load_file, LoadError};
use crate::path::{normalize_root, resolve};
use crate::response::{Status, OK_HEAD};
use crate::stats::ServerStats;

/// Read-only state shared by every request
#[derive(Debug)]
pub struct ServeContext {
    root: String,
    recv_buffer_size: usize,
    stats: Arc<ServerStats>,
}

impl ServeContext {
    pub fn new(root: &str, recv_buffer_size: usize, stats: Arc<ServerStats>) -> Self {
        Self {
            root: normalize_root(root),
            recv_buffer_size,
            stats,
        }
    }

    /// Document root without a trailing slash
    #[inline]
    pub fn root(&self) -> &str {
        &self.root
    }

    #[inline]
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Serve one request on `stream`.
///
/// Returns the status sent, or `None` when the peer closed without sending
/// anything. Transport failures and arena exhaustion come back as errors;
/// the caller drops the connection.
pub fn handle<S: Read + Write>(
    stream: &mut S,
    peer: SocketAddr,
    lease: &TaskLease,
    ctx: &ServeContext,
) -> Result<Option<Status>, GateError> {
    let buf = lease.push_size(ctx.recv_buffer_size)?;
    let len = receive(stream, buf)?;
    if len == 0 {
        return Ok(None);
    }

    let req = parse_request(&buf[..len]);
    let scratch = lease.begin_temp();
    let status = respond(stream, &req, &scratch, ctx)?;
    stream.flush()?;

    kdebug!(
        "{} {} {} {} -> {}",
        peer,
        method_label(&req),
        req.path,
        req.version.as_str(),
        status
    );
    Ok(Some(status))
}

/// Read until the head is complete, the buffer is full or the peer closes.
fn receive<S: Read>(stream: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    let mut len = 0;
    while len < buf.len() {
        match stream.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => {
                // only the tail can hold a terminator that was not there before
                let from = len.saturating_sub(3);
                len += n;
                if has_blank_line(&buf[from..len]) {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(len)
}

#[inline]
fn has_blank_line(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n")
}

fn respond<S: Write>(
    stream: &mut S,
    req: &HttpRequest<'_>,
    scratch: &TempMemory<'_>,
    ctx: &ServeContext,
) -> Result<Status, GateError> {
    if !req.is_valid {
        return send(stream, Status::BadRequest);
    }

    let Some(target) = resolve(scratch, &ctx.root, req.host, req.path)? else {
        return send(stream, Status::NotFound);
    };

    let token = req.auth.map(|t| t.as_bytes());
    match authorize(target, ctx.root.len(), token, scratch)? {
        AuthDecision::Unauthorized => send(stream, Status::Unauthorized),
        AuthDecision::Forbidden => send(stream, Status::Forbidden),
        AuthDecision::Granted => match load_file(scratch, target, OK_HEAD) {
            Ok(response) => {
                stream.write_all(response)?;
                Ok(Status::Ok)
            }
            Err(e) => {
                if let LoadError::TooLarge { .. } = e {
                    kwarn!("{}: {}", target, e);
                }
                send(stream, Status::NotFound)
            }
        },
    }
}

fn send<S: Write>(stream: &mut S, status: Status) -> Result<Status, GateError> {
    stream.write_all(status.head())?;
    Ok(status)
}

fn method_label(req: &HttpRequest<'_>) -> &'static str {
    match req.method {
        Method::Get => "GET",
        Method::Other => "-",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{BAD_REQUEST, FORBIDDEN, NOT_FOUND, UNAUTHORIZED};
    use gatehttpd_runtime::TaskPool;
    use std::fs;
    use std::io::Cursor;

    /// In-memory stream: scripted input, captured output
    struct MockStream {
        input: Cursor<Vec<u8>>,
        chunk: usize,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                chunk: usize::MAX,
                output: Vec::new(),
            }
        }

        /// Deliver at most `chunk` bytes per read
        fn chunked(input: &[u8], chunk: usize) -> Self {
            Self {
                chunk,
                ..Self::new(input)
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.input.read(&mut buf[..n])
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenStream;

    impl Read for BrokenStream {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    impl Write for BrokenStream {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        pool: TaskPool,
        ctx: ServeContext,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("x/docs")).unwrap();
            fs::write(dir.path().join("x/index.html"), "<h1>hello</h1>").unwrap();
            fs::write(dir.path().join("x/docs/index.html"), "docs").unwrap();
            let root = dir.path().to_str().unwrap().to_string();
            Self {
                dir,
                pool: TaskPool::with_capacity(1, 64 * 1024).unwrap(),
                ctx: ServeContext::new(&root, 4096, Arc::new(ServerStats::new())),
            }
        }

        fn run(&self, stream: &mut MockStream) -> Option<Status> {
            let lease = self.pool.try_acquire().unwrap();
            let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
            handle(stream, peer, &lease, &self.ctx).unwrap()
        }

        fn request(&self, raw: &str) -> (Option<Status>, Vec<u8>) {
            let mut stream = MockStream::new(raw.as_bytes());
            let status = self.run(&mut stream);
            (status, stream.output)
        }
    }

    #[test]
    fn test_serves_file() {
        let fx = Fixture::new();
        let (status, out) = fx.request("GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::Ok));
        assert_eq!(out, b"HTTP/1.1 200 OK\r\n\r\n<h1>hello</h1>");
    }

    #[test]
    fn test_directory_index() {
        let fx = Fixture::new();
        let (status, out) = fx.request("GET /docs/ HTTP/1.0\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::Ok));
        assert!(out.ends_with(b"\r\n\r\ndocs"));
    }

    #[test]
    fn test_bad_request() {
        let fx = Fixture::new();
        let (status, out) = fx.request("GET /index.html HTTP/1.1\r\n\r\n");
        assert_eq!(status, Some(Status::BadRequest));
        assert_eq!(out, BAD_REQUEST);

        let (status, _) = fx.request("POST /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::BadRequest));
    }

    #[test]
    fn test_missing_file() {
        let fx = Fixture::new();
        let (status, out) = fx.request("GET /nope.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::NotFound));
        assert_eq!(out, NOT_FOUND);

        let (status, _) = fx.request("GET /index.html HTTP/1.1\r\nHost: y\r\n\r\n");
        assert_eq!(status, Some(Status::NotFound));
    }

    #[test]
    fn test_file_as_directory_is_not_found() {
        let fx = Fixture::new();
        let (status, out) = fx.request("GET /index.html/nope HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::NotFound));
        assert_eq!(out, NOT_FOUND);
    }

    #[test]
    fn test_traversal_is_not_found() {
        let fx = Fixture::new();
        fs::write(fx.dir.path().join("secret"), "no").unwrap();
        let (status, _) = fx.request("GET /../secret HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::NotFound));
    }

    #[test]
    fn test_auth_flow() {
        let fx = Fixture::new();
        fs::write(
            fx.dir.path().join("x/.htpasswd"),
            "user:ee11cbb19052e40b07aac0ca060c23ee\n",
        )
        .unwrap();

        let (status, out) = fx.request("GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::Unauthorized));
        assert_eq!(out, UNAUTHORIZED);

        let (status, out) = fx.request(
            "GET /index.html HTTP/1.1\r\nHost: x\r\nAuthorization: Basic dXNlcjp1c2Vy\r\n\r\n",
        );
        assert_eq!(status, Some(Status::Ok));
        assert!(out.ends_with(b"<h1>hello</h1>"));

        let (status, out) = fx.request(
            "GET /index.html HTTP/1.1\r\nHost: x\r\nAuthorization: Basic Ym9iOmJvYg==\r\n\r\n",
        );
        assert_eq!(status, Some(Status::Forbidden));
        assert_eq!(out, FORBIDDEN);
    }

    #[test]
    fn test_credential_file_not_served() {
        let fx = Fixture::new();
        fs::write(fx.dir.path().join("x/.htpasswd"), "user:x\n").unwrap();
        let (status, _) = fx.request("GET /.htpasswd HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::NotFound));
    }

    #[test]
    fn test_request_in_small_reads() {
        let fx = Fixture::new();
        let mut stream =
            MockStream::chunked(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n", 3);
        assert_eq!(fx.run(&mut stream), Some(Status::Ok));
    }

    #[test]
    fn test_empty_connection() {
        let fx = Fixture::new();
        let (status, out) = fx.request("");
        assert_eq!(status, None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_file_larger_than_task_memory() {
        let fx = Fixture::new();
        fs::write(fx.dir.path().join("x/big.bin"), vec![0u8; 128 * 1024]).unwrap();
        let (status, _) = fx.request("GET /big.bin HTTP/1.1\r\nHost: x\r\n\r\n");
        assert_eq!(status, Some(Status::NotFound));
    }

    #[test]
    fn test_lease_arena_reset_after_request() {
        let fx = Fixture::new();
        fx.request("GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");
        let lease = fx.pool.try_acquire().unwrap();
        assert_eq!(lease.arena().used(), 0);
    }

    #[test]
    fn test_transport_error() {
        let fx = Fixture::new();
        let lease = fx.pool.try_acquire().unwrap();
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let err = handle(&mut BrokenStream, peer, &lease, &fx.ctx).unwrap_err();
        assert!(matches!(err, GateError::Io(io::ErrorKind::ConnectionReset, _)));
    }

    #[test]
    fn test_blank_line_detection() {
        assert!(has_blank_line(b"a\r\n\r\n"));
        assert!(!has_blank_line(b"a\r\n\r"));
        assert!(!has_blank_line(b""));
    }
}
