//! Tolerant base64 decoding
//!
//! Only `=` is special. Every other byte outside `A-Z a-z 0-9 +` decodes
//! to 63 (so `/` works as expected and garbage decodes to something rather
//! than failing). Input is consumed four bytes at a time; a group stops at
//! its first `=`, and a group left with fewer than two data characters
//! produces nothing.

use crate::error::CodecError;

#[inline]
fn sextet(c: u8) -> u8 {
    match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        _ => 63,
    }
}

/// Upper bound on decoded bytes for `encoded_len` input bytes
#[inline]
pub const fn decoded_capacity(encoded_len: usize) -> usize {
    (encoded_len + 3) / 4 * 3
}

/// Decode `src` into the front of `dst` and return the written prefix.
pub fn decode_into<'d>(src: &[u8], dst: &'d mut [u8]) -> Result<&'d [u8], CodecError> {
    let needed = decoded_capacity(src.len());
    if dst.len() < needed {
        return Err(CodecError::BufferTooSmall {
            needed,
            available: dst.len(),
        });
    }

    let mut written = 0;
    for group in src.chunks(4) {
        let mut s = [0u8; 4];
        let mut n = 0;
        while n < group.len() && group[n] != b'=' {
            s[n] = sextet(group[n]);
            n += 1;
        }

        let bytes = [
            (s[0] << 2) | (s[1] >> 4),
            (s[1] << 4) | (s[2] >> 2),
            (s[2] << 6) | s[3],
        ];
        let out = match n {
            4 => 3,
            3 => 2,
            2 => 1,
            _ => 0,
        };
        dst[written..written + out].copy_from_slice(&bytes[..out]);
        written += out;
    }

    Ok(&dst[..written])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(src: &str) -> Vec<u8> {
        let mut dst = vec![0u8; decoded_capacity(src.len())];
        decode_into(src.as_bytes(), &mut dst).unwrap().to_vec()
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(decode("dXNlcjp1c2Vy"), b"user:user");
        assert_eq!(
            decode("am9qbyBubyBraW15b3VuYSBib3VrZW4="),
            b"jojo no kimyouna bouken"
        );
    }

    #[test]
    fn test_padding_lengths() {
        assert_eq!(decode("YQ=="), b"a");
        assert_eq!(decode("YWI="), b"ab");
        assert_eq!(decode("YWJj"), b"abc");
        // unpadded tails decode the same
        assert_eq!(decode("YQ"), b"a");
        assert_eq!(decode("YWI"), b"ab");
    }

    #[test]
    fn test_degenerate_groups_produce_nothing() {
        assert!(decode("").is_empty());
        assert!(decode("====").is_empty());
        assert!(decode("Y===").is_empty());
        assert!(decode("Y").is_empty());
    }

    #[test]
    fn test_non_alphabet_maps_to_63() {
        // '/' and '*' both decode as 63
        assert_eq!(decode("////"), decode("****"));
        assert_eq!(decode("////"), vec![0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_destination_too_small() {
        let mut dst = [0u8; 2];
        assert_eq!(
            decode_into(b"dXNl", &mut dst),
            Err(CodecError::BufferTooSmall { needed: 3, available: 2 })
        );
    }
}
