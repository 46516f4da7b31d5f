//! Stream-payload deobfuscation for kinoray CDN responses.
//!
//! The upstream splices base64-encoded "trash" tokens into an otherwise
//! ordinary base64 payload. Every token is a 2- or 3-character combination
//! drawn from a fixed 5-symbol alphabet. Decoding strips every encoded
//! combination, restores base64 padding and decodes what remains.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::extractor::error::ProviderError;

const TRASH_SYMBOLS: [char; 5] = ['$', '@', '#', '!', '^'];

/// Base64 encodings of every 2- and 3-symbol combination, longest first so
/// that stripping a 3-symbol token never leaves half of it behind.
fn trash_tokens() -> Vec<String> {
    let mut tokens = Vec::with_capacity(5 * 5 * 5 + 5 * 5);
    for a in TRASH_SYMBOLS {
        for b in TRASH_SYMBOLS {
            for c in TRASH_SYMBOLS {
                tokens.push(STANDARD.encode(format!("{a}{b}{c}")));
            }
        }
    }
    for a in TRASH_SYMBOLS {
        for b in TRASH_SYMBOLS {
            tokens.push(STANDARD.encode(format!("{a}{b}")));
        }
    }
    tokens
}

/// Strips trash tokens, re-pads and base64-decodes the payload.
pub fn decode(payload: &str) -> Result<String, ProviderError> {
    let mut clean = payload.trim().to_string();
    for token in trash_tokens() {
        if clean.contains(&token) {
            clean = clean.replace(&token, "");
        }
    }

    // Token stripping removes the original padding alignment.
    clean = clean.trim_end_matches('=').to_string();
    while clean.len() % 4 != 0 {
        clean.push('=');
    }

    let bytes = STANDARD
        .decode(&clean)
        .map_err(|e| ProviderError::DecodeFailure(format!("trash cipher base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ProviderError::DecodeFailure(format!("trash cipher utf8: {e}")))
}

/// Builds an obfuscated payload from plaintext. Only used by tests and
/// fixtures; splices one token per `every` characters of base64 output.
pub fn encode(plain: &str, every: usize) -> String {
    let b64 = STANDARD.encode(plain.as_bytes());
    let b64 = b64.trim_end_matches('=');
    let tokens = trash_tokens();
    let step = every.max(1);

    let mut out = String::new();
    for (i, c) in b64.chars().enumerate() {
        if i > 0 && i % step == 0 {
            out.push_str(&tokens[i % tokens.len()]);
        }
        out.push(c);
    }
    out
}
