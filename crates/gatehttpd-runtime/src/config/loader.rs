//! `config` file scanner and parser
//!
//! The file format is a handful of keyword/value pairs:
//!
//! ```text
//! // comments run to end of line
//! port: 8080
//! root: "/srv/www"
//! ```
//!
//! Scanning collects every problem it finds instead of stopping at the
//! first. If any were found, no value from the file is used.

use std::fmt;

/// Most tokens a config file may contain
pub const MAX_TOKENS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Colon,
    Str(String),
    Integer(u32),
    Port,
    Root,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub row: u32,
    pub col: u32,
}

/// Scanning problem with its 1-based location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub row: u32,
    pub col: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.row, self.col, self.message)
    }
}

/// Values found in a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub port: Option<u16>,
    pub root: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ConfigFile {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    row: u32,
    col: u32,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
            row: 1,
            col: 1,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&mut self, row: u32, col: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            row,
            col,
            message: message.into(),
        });
    }

    fn push(&mut self, kind: TokenKind, row: u32, col: u32) {
        if self.tokens.len() == MAX_TOKENS {
            self.error(row, col, format!("too many tokens (max {})", MAX_TOKENS));
            return;
        }
        self.tokens.push(Token { kind, row, col });
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while let Some(c) = self.peek() {
            let (row, col) = (self.row, self.col);
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.advance();
                }
                b':' => {
                    self.advance();
                    self.push(TokenKind::Colon, row, col);
                }
                b'/' if self.src.get(self.pos + 1) == Some(&b'/') => {
                    while matches!(self.peek(), Some(c) if c != b'\n') {
                        self.advance();
                    }
                }
                b'"' => self.string(row, col),
                b'0'..=b'9' => self.number(row, col),
                c if c.is_ascii_alphabetic() || c == b'_' => self.identifier(row, col),
                other => {
                    self.advance();
                    self.error(
                        row,
                        col,
                        format!("unexpected character {:?}", char::from(other)),
                    );
                }
            }
        }
        (self.tokens, self.diagnostics)
    }

    fn string(&mut self, row: u32, col: u32) {
        self.advance();
        let start = self.pos;
        loop {
            match self.peek() {
                None => {
                    self.error(row, col, "unterminated string");
                    return;
                }
                Some(b'"') => break,
                Some(b'\n') => {
                    let (r, c) = (self.row, self.col);
                    self.error(r, c, "newline before end of string");
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.advance();
        self.push(TokenKind::Str(text), row, col);
    }

    fn number(&mut self, row: u32, col: u32) {
        let mut value: u32 = 0;
        let mut overflow = false;
        while let Some(c @ b'0'..=b'9') = self.peek() {
            value = value.saturating_mul(10).saturating_add(u32::from(c - b'0'));
            if value > u32::from(u16::MAX) {
                overflow = true;
            }
            self.advance();
        }
        if overflow {
            self.error(row, col, "number literal overflows 16 bits");
        }
        self.push(TokenKind::Integer(value), row, col);
    }

    fn identifier(&mut self, row: u32, col: u32) {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.advance();
        }
        match &self.src[start..self.pos] {
            b"port" => self.push(TokenKind::Port, row, col),
            b"root" => self.push(TokenKind::Root, row, col),
            other => {
                let name = String::from_utf8_lossy(other).into_owned();
                self.error(row, col, format!("unknown identifier '{}'", name));
            }
        }
    }
}

/// Split config text into tokens, collecting diagnostics.
pub fn tokenize(src: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Scanner::new(src).run()
}

/// Scan and interpret config text. Values are only reported when the
/// text scanned without a single diagnostic.
pub fn parse_config(src: &str) -> ConfigFile {
    let (tokens, diagnostics) = tokenize(src);
    if !diagnostics.is_empty() {
        return ConfigFile {
            diagnostics,
            ..ConfigFile::default()
        };
    }

    let mut out = ConfigFile::default();
    let mut keyword: Option<&TokenKind> = None;
    for token in &tokens {
        match &token.kind {
            TokenKind::Colon => {}
            TokenKind::Port | TokenKind::Root => keyword = Some(&token.kind),
            TokenKind::Integer(v) => {
                if keyword == Some(&TokenKind::Port) {
                    // scanner already rejected anything above u16::MAX
                    out.port = u16::try_from(*v).ok();
                }
            }
            TokenKind::Str(s) => {
                if keyword == Some(&TokenKind::Root) {
                    out.root = Some(s.clone());
                }
            }
        }
    }
    out
}
