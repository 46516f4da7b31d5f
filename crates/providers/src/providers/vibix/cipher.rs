//! Link cipher used by vibix API payloads.
//!
//! Each candidate source string is base64 with every ASCII letter rotated
//! by 18 positions inside its own case's alphabet. Non-letter characters
//! (digits, `+`, `/`, `=`) pass through untouched.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::extractor::error::ProviderError;

const ROT: u8 = 18;

fn rotate_letter(c: char, shift: u8) -> char {
    match c {
        'a'..='z' => (b'a' + (c as u8 - b'a' + shift) % 26) as char,
        'A'..='Z' => (b'A' + (c as u8 - b'A' + shift) % 26) as char,
        _ => c,
    }
}

/// Decodes an obfuscated link payload: rotate letters by 18, then base64.
pub fn decode(payload: &str) -> Result<String, ProviderError> {
    let rotated: String = payload.chars().map(|c| rotate_letter(c, ROT)).collect();
    let bytes = STANDARD
        .decode(rotated.trim())
        .map_err(|e| ProviderError::DecodeFailure(format!("link cipher base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ProviderError::DecodeFailure(format!("link cipher utf8: {e}")))
}

/// Inverse of [`decode`], used to build fixtures: base64-encode, then rotate
/// letters by 8 (the inverse of an 18-rotation over a 26-letter alphabet).
pub fn encode(plain: &str) -> String {
    STANDARD
        .encode(plain.as_bytes())
        .chars()
        .map(|c| rotate_letter(c, 26 - ROT))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_payloads() {
        let samples = [
            "https://cdn.example/video/720.mp4",
            "abcXYZ0123456789",
            "a",
            "",
            "https://s1.example/hls/master.m3u8?token=Ab9",
        ];
        for sample in samples {
            assert_eq!(decode(&encode(sample)).unwrap(), sample, "sample {sample}");
        }
    }

    #[test]
    fn non_letters_pass_through_rotation() {
        assert_eq!(rotate_letter('5', ROT), '5');
        assert_eq!(rotate_letter('+', ROT), '+');
        assert_eq!(rotate_letter('=', ROT), '=');
    }

    #[test]
    fn rotation_wraps_within_case() {
        assert_eq!(rotate_letter('z', ROT), 'r');
        assert_eq!(rotate_letter('A', ROT), 'S');
    }

    #[test]
    fn garbage_payload_is_a_decode_failure() {
        assert!(decode("!!not-base64!!").is_err());
    }
}
