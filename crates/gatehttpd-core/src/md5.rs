//! MD5 (RFC 1321)
//!
//! The message is padded in place: callers hand over a buffer whose first
//! `len` bytes are the message and which has room for the padding behind it
//! (at most [`MD5_PAD_CAPACITY`](crate::constants::MD5_PAD_CAPACITY) bytes).
//! This keeps hashing free of heap traffic when the buffer comes from a
//! request arena.

use core::fmt;

use crate::error::CodecError;

/// Per-round left-rotate amounts
const SHIFTS: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22,
    5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20, 5, 9, 14, 20,
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// floor(abs(sin(i + 1)) * 2^32)
const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

const INIT: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

const HEX: &[u8; 16] = b"0123456789abcdef";

/// 128-bit MD5 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    /// Lowercase hex, accumulator bytes in little-endian order
    pub fn to_hex(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, byte) in self.0.iter().enumerate() {
            out[i * 2] = HEX[(byte >> 4) as usize];
            out[i * 2 + 1] = HEX[(byte & 0x0f) as usize];
        }
        out
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        // to_hex only emits ASCII
        f.write_str(core::str::from_utf8(&hex).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

/// Total buffer length needed to hash a `len`-byte message in place
#[inline]
pub const fn padded_len(len: usize) -> usize {
    (len + 8) / 64 * 64 + 64
}

/// Hash `buf[..len]`, writing the padding into `buf[len..padded_len(len)]`.
pub fn digest_in_place(buf: &mut [u8], len: usize) -> Result<Digest, CodecError> {
    let total = padded_len(len);
    if buf.len() < total {
        return Err(CodecError::BufferTooSmall {
            needed: total,
            available: buf.len(),
        });
    }

    Ok(pad_and_hash(&mut buf[..total], len))
}

/// Hash a message that does not carry its own padding room.
pub fn md5(data: &[u8]) -> Digest {
    let mut buf = vec![0u8; padded_len(data.len())];
    buf[..data.len()].copy_from_slice(data);
    pad_and_hash(&mut buf, data.len())
}

/// `buf.len()` must equal `padded_len(len)`
fn pad_and_hash(buf: &mut [u8], len: usize) -> Digest {
    let total = buf.len();
    buf[len] = 0x80;
    buf[len + 1..total - 8].fill(0);
    let bit_len = (len as u64).wrapping_mul(8);
    buf[total - 8..total].copy_from_slice(&bit_len.to_le_bytes());

    let mut state = INIT;
    for block in buf.chunks_exact(64) {
        compress(&mut state, block);
    }

    let mut out = [0u8; 16];
    for (i, word) in state.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    Digest(out)
}

fn compress(state: &mut [u32; 4], block: &[u8]) {
    let mut m = [0u32; 16];
    for (i, word) in block.chunks_exact(4).enumerate() {
        m[i] = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }

    let [mut a, mut b, mut c, mut d] = *state;

    for i in 0..64 {
        let (f, g) = match i / 16 {
            0 => ((b & c) | (!b & d), i),
            1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
            2 => (b ^ c ^ d, (3 * i + 5) % 16),
            _ => (c ^ (b | !d), (7 * i) % 16),
        };

        let rotated = a
            .wrapping_add(f)
            .wrapping_add(K[i])
            .wrapping_add(m[g])
            .rotate_left(SHIFTS[i]);
        a = d;
        d = c;
        c = b;
        b = b.wrapping_add(rotated);
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MD5_PAD_CAPACITY;

    fn hex(data: &str) -> String {
        md5(data.as_bytes()).to_string()
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hex("user"), "ee11cbb19052e40b07aac0ca060c23ee");
        assert_eq!(
            hex("The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
        assert_eq!(
            hex("The quick brown fox jumps over the lazy dog."),
            "e4d909c290d0fb1ca068ffaddf22cbd0"
        );
    }

    #[test]
    fn test_block_boundaries() {
        // 55 bytes fit one block, 56 spill the length into a second
        assert_eq!(padded_len(55), 64);
        assert_eq!(padded_len(56), 128);
        assert_eq!(padded_len(64), 128);
        assert_eq!(
            hex("12345678901234567890123456789012345678901234567890123456789012345678901234567890"),
            "57edf4a22be3c955ac49da2e2107b67a"
        );
    }

    #[test]
    fn test_pad_capacity_bound() {
        for len in 0..256 {
            assert!(padded_len(len) - len <= MD5_PAD_CAPACITY);
        }
    }

    #[test]
    fn test_in_place_with_slack() {
        let mut buf = [0xAAu8; 4 + MD5_PAD_CAPACITY];
        buf[..4].copy_from_slice(b"user");
        let d = digest_in_place(&mut buf, 4).unwrap();
        assert_eq!(d.to_string(), "ee11cbb19052e40b07aac0ca060c23ee");
        assert_eq!(&buf[..4], b"user");
    }

    #[test]
    fn test_buffer_too_small() {
        let mut buf = [0u8; 10];
        assert_eq!(
            digest_in_place(&mut buf, 4),
            Err(CodecError::BufferTooSmall { needed: 64, available: 10 })
        );
    }
}
