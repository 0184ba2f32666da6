//! Instructor identity. The catalog has no stable instructor id across
//! appearances, so identity is a SHA-256 of the canonicalized display
//! name: names that normalize identically collide to one instructor.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Canonicalizes a raw instructor name. Pure and idempotent:
/// trim, compose to NFC, collapse whitespace runs to single spaces,
/// strip everything but letters/digits/whitespace/hyphens, collapse
/// hyphen runs, then title-case the first character of each token.
pub fn normalize_instructor_name(name: &str) -> String {
    let composed: String = name.trim().nfc().collect();

    let mut cleaned = String::with_capacity(composed.len());
    let mut last_space = false;
    let mut last_hyphen = false;
    for ch in composed.chars() {
        if ch.is_whitespace() {
            if !last_space {
                cleaned.push(' ');
                last_space = true;
            }
            last_hyphen = false;
        } else if ch == '-' {
            if !last_hyphen {
                cleaned.push('-');
                last_hyphen = true;
            }
            last_space = false;
        } else if ch.is_alphanumeric() {
            cleaned.push(ch);
            last_space = false;
            last_hyphen = false;
        }
        // everything else is stripped
    }

    cleaned
        .trim()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic storage identity for a canonical name: lowercase hex
/// SHA-256 of its UTF-8 bytes.
pub fn instructor_identity(canonical_name: &str) -> String {
    let digest = Sha256::digest(canonical_name.as_bytes());
    hex::encode(digest)
}
