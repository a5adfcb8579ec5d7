// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

use zeroize::Zeroizing;

use super::EncodingError;

/// RFC 3548 base32 alphabet, lower-case.
pub const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Base32-encode `src` as in RFC 3548.
///
/// Limitation: `src.len() * 8` must be a multiple of 5, so encoding works
/// on 5-byte granularity and never needs padding characters.
pub fn base32_encode(src: &[u8]) -> Result<String, EncodingError> {
    let nbits = src.len() * 8;
    if nbits % 5 != 0 {
        return Err(EncodingError::InvalidLength { len: src.len() });
    }

    let mut out = String::with_capacity(nbits / 5);
    let mut bit = 0;
    while bit < nbits {
        // v is the 16-bit window starting at src[bit/8], zero-padded.
        let mut v = (src[bit / 8] as u16) << 8;
        if bit + 5 < nbits {
            v |= src[bit / 8 + 1] as u16;
        }
        let u = (v >> (11 - (bit % 8))) & 0x1f;
        out.push(BASE32_ALPHABET[u as usize] as char);
        bit += 5;
    }
    Ok(out)
}

/// Base32-decode `src` as in RFC 3548.
///
/// Limitation: `src.len() * 5` must be a multiple of 8. Letters of either
/// case and the digits `2`-`7` are accepted; anything else is rejected.
pub fn base32_decode(src: &str) -> Result<Vec<u8>, EncodingError> {
    let src = src.as_bytes();
    let nbits = src.len() * 5;
    if nbits % 8 != 0 {
        return Err(EncodingError::InvalidLength { len: src.len() });
    }

    // Convert the characters to the 5-bit groups they represent.
    let mut tmp = Zeroizing::new(vec![0u8; src.len()]);
    for (j, &c) in src.iter().enumerate() {
        tmp[j] = match c {
            b'a'..=b'z' => c - b'a',
            b'A'..=b'Z' => c - b'A',
            b'2'..=b'7' => c - b'2' + 26,
            _ => return Err(EncodingError::IllegalCharacter { byte: c, pos: j }),
        };
    }

    // Reassemble bytes; the packing repeats with period 40 bits.
    let mut out = vec![0u8; nbits / 8];
    for (i, byte) in out.iter_mut().enumerate() {
        let bit = i * 8;
        let b = |idx: usize| tmp[idx] as u16;
        *byte = match bit % 40 {
            0 => (b(bit / 5) << 3) + (b(bit / 5 + 1) >> 2),
            8 => (b(bit / 5) << 6) + (b(bit / 5 + 1) << 1) + (b(bit / 5 + 2) >> 4),
            16 => (b(bit / 5) << 4) + (b(bit / 5 + 1) >> 1),
            24 => (b(bit / 5) << 7) + (b(bit / 5 + 1) << 2) + (b(bit / 5 + 2) >> 3),
            32 => (b(bit / 5) << 5) + b(bit / 5 + 1),
            _ => unreachable!("bytes start on multiples of 8 bits"),
        } as u8;
    }

    Ok(out)
}
