//! The fixed set of responses the server sends

use std::fmt;

pub const OK_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\n\r\n";
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";
pub const UNAUTHORIZED: &[u8] =
    b"HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"Access to the staging site\"\r\n\r\n";
pub const FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\r\n";
pub const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::NotFound => 404,
        }
    }

    /// Complete response head, including the blank line
    pub fn head(&self) -> &'static [u8] {
        match self {
            Status::Ok => OK_HEAD,
            Status::BadRequest => BAD_REQUEST,
            Status::Unauthorized => UNAUTHORIZED,
            Status::Forbidden => FORBIDDEN,
            Status::NotFound => NOT_FOUND,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
