//! Statement fingerprints.
//!
//! A fingerprint is a short, deterministic identifier derived from a
//! statement's text. It is only used for "already applied" set membership,
//! so it does not need cryptographic strength.

/// Maps statement text to a stable identifier.
///
/// Implementations must be pure: identical input always yields identical
/// output, across runs and processes. No normalization happens here; the
/// text is fingerprinted exactly as given.
pub trait Fingerprinter {
    fn fingerprint(&self, text: &str) -> String;
}

/// 32-bit rolling hash (`h = h * 31 + unit`) over UTF-16 code units,
/// rendered as a signed decimal integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RollingHash;

impl Fingerprinter for RollingHash {
    fn fingerprint(&self, text: &str) -> String {
        let mut hash: i32 = 0;
        for unit in text.encode_utf16() {
            hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32);
        }
        hash.to_string()
    }
}

/// Fingerprint with the default [`RollingHash`].
pub fn fingerprint(text: &str) -> String {
    RollingHash.fingerprint(text)
}
