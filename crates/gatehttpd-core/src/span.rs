//! Borrowed byte views
//!
//! A `Span` is a `(pointer, length)` view into a buffer someone else owns:
//! a receive buffer, a file loaded into an arena, a decoded credential.
//! It never allocates and cannot outlive its backing bytes.

use core::fmt;

/// Immutable view into externally owned bytes
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span<'a> {
    bytes: &'a [u8],
}

impl<'a> Span<'a> {
    pub const EMPTY: Span<'static> = Span { bytes: &[] };

    #[inline]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    #[inline]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// UTF-8 view, if the bytes are valid UTF-8
    pub fn to_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.bytes).ok()
    }

    #[inline]
    pub fn begins_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }

    #[inline]
    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.bytes.ends_with(suffix)
    }

    /// Remainder after `prefix`, or `None` if the span does not begin with it
    pub fn after_prefix(&self, prefix: &[u8]) -> Option<Span<'a>> {
        self.bytes.strip_prefix(prefix).map(Span::new)
    }

    pub fn find(&self, byte: u8) -> Option<usize> {
        self.bytes.iter().position(|&b| b == byte)
    }

    pub fn rfind(&self, byte: u8) -> Option<usize> {
        self.bytes.iter().rposition(|&b| b == byte)
    }

    /// First `n` bytes (clamped to the span)
    pub fn head(&self, n: usize) -> Span<'a> {
        Span::new(&self.bytes[..n.min(self.bytes.len())])
    }

    /// Bytes from `offset` on (empty when past the end)
    pub fn from_offset(&self, offset: usize) -> Span<'a> {
        Span::new(&self.bytes[offset.min(self.bytes.len())..])
    }

    /// Split around the first `sep`; the separator belongs to neither half
    pub fn split_once(&self, sep: u8) -> Option<(Span<'a>, Span<'a>)> {
        let at = self.find(sep)?;
        Some((self.head(at), self.from_offset(at + 1)))
    }

    /// Drop leading spaces and tabs
    pub fn trim_start(&self) -> Span<'a> {
        let skip = self
            .bytes
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        self.from_offset(skip)
    }

    /// Tokens separated by runs of ASCII whitespace
    pub fn words(&self) -> Words<'a> {
        Words { rest: self.bytes }
    }
}

/// Iterator returned by [`Span::words`]
pub struct Words<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Words<'a> {
    type Item = Span<'a>;

    fn next(&mut self) -> Option<Span<'a>> {
        let start = self.rest.iter().position(|b| !b.is_ascii_whitespace())?;
        let rest = &self.rest[start..];
        let end = rest
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(rest.len());
        self.rest = &rest[end..];
        Some(Span::new(&rest[..end]))
    }
}

impl<'a> From<&'a [u8]> for Span<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Span::new(bytes)
    }
}

impl<'a> From<&'a str> for Span<'a> {
    fn from(s: &'a str) -> Self {
        Span::new(s.as_bytes())
    }
}

impl AsRef<[u8]> for Span<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl PartialEq<[u8]> for Span<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl PartialEq<&[u8]> for Span<'_> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.bytes == *other
    }
}

impl PartialEq<str> for Span<'_> {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for Span<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl fmt::Debug for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({:?})", String::from_utf8_lossy(self.bytes))
    }
}

impl fmt::Display for Span<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.bytes))
    }
}
