//! Text normalization and content fingerprints.
//!
//! Fingerprints are computed over the normalized chunk body only, so a chunk
//! whose overlap prefix changed (because the previous chunk was edited) is
//! still recognised as unchanged.

/// Collapses every whitespace run to a single space and trims both ends.
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// BLAKE3 hex digest of the normalized `body`.
pub fn fingerprint(body: &str) -> String {
    blake3::hash(normalize_whitespace(body).as_bytes())
        .to_hex()
        .to_string()
}
