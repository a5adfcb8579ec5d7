// Copyright 2024 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

use super::EncodingError;
use crate::{BASE64_DIGEST_LEN, DIGEST_LEN};

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Input bytes per output line: 48 bytes of input become 64 characters.
const LINE_INPUT_LEN: usize = 48;

/// What a byte means to the decoder.
enum Decoded {
    /// A 6-bit group.
    Value(u8),
    /// Whitespace; skipped.
    Space,
    /// An `=` character: end of data.
    Pad,
    /// Not allowed in base64 at all.
    Invalid,
}

fn classify(c: u8) -> Decoded {
    match c {
        b'A'..=b'Z' => Decoded::Value(c - b'A'),
        b'a'..=b'z' => Decoded::Value(c - b'a' + 26),
        b'0'..=b'9' => Decoded::Value(c - b'0' + 52),
        b'+' => Decoded::Value(62),
        b'/' => Decoded::Value(63),
        b'\t' | b'\n' | 0x0b | 0x0c | b'\r' | b' ' => Decoded::Space,
        b'=' => Decoded::Pad,
        _ => Decoded::Invalid,
    }
}

/// Base64-encode `src` in the line-folded envelope form: every 48 bytes of
/// input produce a 64-character line terminated by `\n`, and the final
/// partial line is `=`-padded.
pub fn base64_encode(src: &[u8]) -> String {
    // 48 bytes of input -> 64 chars of output, plus newline.
    let mut out = String::with_capacity((src.len() / LINE_INPUT_LEN + 1) * 66);

    for line in src.chunks(LINE_INPUT_LEN) {
        for group in line.chunks(3) {
            let n = (group[0] as u32) << 16
                | (group.get(1).copied().unwrap_or(0) as u32) << 8
                | group.get(2).copied().unwrap_or(0) as u32;

            out.push(BASE64_CHARS[(n >> 18) as usize & 0x3f] as char);
            out.push(BASE64_CHARS[(n >> 12) as usize & 0x3f] as char);
            out.push(if group.len() > 1 {
                BASE64_CHARS[(n >> 6) as usize & 0x3f] as char
            } else {
                '='
            });
            out.push(if group.len() > 2 {
                BASE64_CHARS[n as usize & 0x3f] as char
            } else {
                '='
            });
        }
        out.push('\n');
    }

    out
}

/// Base64-decode `src`.
///
/// Whitespace (TAB, LF, VT, FF, CR, SP) anywhere in the input is skipped,
/// and the first `=` ends the data. Note that the number of trailing `=`
/// characters is *not* verified against the data length, so inputs with
/// missing or surplus padding still decode.
pub fn base64_decode(src: &str) -> Result<Vec<u8>, EncodingError> {
    let src = src.as_bytes();
    // Upper bound: every character carries 6 bits, round down.
    let mut out = Vec::with_capacity(src.len() * 3 / 4);

    // Accumulate 6-bit groups in n; every 24 bits flush three bytes.
    let mut n: u32 = 0;
    let mut n_idx = 0;
    for (pos, &c) in src.iter().enumerate() {
        match classify(c) {
            Decoded::Invalid => return Err(EncodingError::IllegalCharacter { byte: c, pos }),
            Decoded::Space => continue,
            Decoded::Pad => break,
            Decoded::Value(v) => {
                n = (n << 6) | v as u32;
                n_idx += 1;
                if n_idx == 4 {
                    out.push((n >> 16) as u8);
                    out.push((n >> 8) as u8);
                    out.push(n as u8);
                    n_idx = 0;
                    n = 0;
                }
            }
        }
    }

    // Cope with leftover bits.
    match n_idx {
        0 => {}
        // 6 bits cannot form a byte.
        1 => return Err(EncodingError::TrailingBits),
        // 12 bits: 8 of data, 4 of padding.
        2 => out.push((n >> 4) as u8),
        // 18 bits: 16 of data, 2 of padding.
        3 => {
            out.push((n >> 10) as u8);
            out.push((n >> 2) as u8);
        }
        _ => unreachable!("groups of four are flushed eagerly"),
    }

    Ok(out)
}

/// Render a digest in its short base64 form: 27 characters, with the
/// trailing `=` and newline stripped.
pub fn digest_to_base64(digest: &[u8; DIGEST_LEN]) -> String {
    let mut b64 = base64_encode(digest);
    b64.truncate(BASE64_DIGEST_LEN);
    b64
}

/// Decode the 27-character short base64 form of a digest.
pub fn digest_from_base64(d64: &str) -> Result<[u8; DIGEST_LEN], EncodingError> {
    if d64.len() != BASE64_DIGEST_LEN {
        return Err(EncodingError::InvalidLength { len: d64.len() });
    }

    let mut padded = String::with_capacity(BASE64_DIGEST_LEN + 2);
    padded.push_str(d64);
    padded.push_str("=\n");

    let decoded = base64_decode(&padded)?;
    decoded
        .try_into()
        .map_err(|bytes: Vec<u8>| EncodingError::InvalidLength { len: bytes.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_empty_is_empty() {
        assert_eq!(base64_encode(b""), "");
    }

    #[test]
    fn encode_pads_and_terminates_lines() {
        assert_eq!(base64_encode(b"a"), "YQ==\n");
        assert_eq!(base64_encode(b"ab"), "YWI=\n");
        assert_eq!(base64_encode(b"abc"), "YWJj\n");
        assert_eq!(
            base64_encode(b"aaaabbbbccccddddeeeeffffgggghhhhiiiijjjjkkkkllll"),
            "YWFhYWJiYmJjY2NjZGRkZGVlZWVmZmZmZ2dnZ2hoaGhpaWlpampqamtra2tsbGxs\n"
        );
    }

    #[test]
    fn long_input_folds_into_lines() {
        let data = vec![0u8; 96];
        let encoded = base64_encode(&data);
        let lines: Vec<&str> = encoded.split_terminator('\n').collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == 64));
    }

    #[test]
    fn decode_handles_padding_variants() {
        // correct, missing, and surplus padding all decode the same way
        assert_eq!(base64_decode("YQ==").unwrap(), b"a");
        assert_eq!(base64_decode("YQ").unwrap(), b"a");
        assert_eq!(base64_decode("YQ===").unwrap(), b"a");
        assert_eq!(base64_decode("YWJj").unwrap(), b"abc");
    }

    #[test]
    fn decode_skips_whitespace_everywhere() {
        let plain = base64_decode("YWFhYWJiYmJjY2Nj").unwrap();
        assert_eq!(base64_decode("YWFh YWJi\tYmJj\nY2Nj\r\n").unwrap(), plain);
        assert_eq!(base64_decode(" Y W F h Y W J i Y m J j Y 2 N j ").unwrap(), plain);
    }

    #[test]
    fn decode_rejects_illegal_characters() {
        assert_eq!(
            base64_decode("YW*j"),
            Err(EncodingError::IllegalCharacter { byte: b'*', pos: 2 })
        );
    }

    #[test]
    fn decode_rejects_dangling_six_bits() {
        assert_eq!(base64_decode("Y"), Err(EncodingError::TrailingBits));
        assert_eq!(base64_decode("YWJjY"), Err(EncodingError::TrailingBits));
    }

    #[test]
    fn decode_three_leftover_groups_emit_two_bytes() {
        assert_eq!(base64_decode("YWI").unwrap(), b"ab");
    }

    #[test]
    fn round_trip_arbitrary_lengths() {
        for len in 0..130 {
            let data: Vec<u8> = (0..len as u8).map(|i| i.wrapping_mul(89).wrapping_add(3)).collect();
            assert_eq!(base64_decode(&base64_encode(&data)).unwrap(), data);
        }
    }

    #[test]
    fn digest_short_form_round_trips() {
        let digest = [0x5a; DIGEST_LEN];
        let d64 = digest_to_base64(&digest);
        assert_eq!(d64.len(), BASE64_DIGEST_LEN);
        assert!(!d64.contains('='));
        assert!(!d64.contains('\n'));
        assert_eq!(digest_from_base64(&d64).unwrap(), digest);
    }

    #[test]
    fn digest_short_form_rejects_wrong_lengths() {
        assert!(digest_from_base64("YQ==").is_err());
    }
}
