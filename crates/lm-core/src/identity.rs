//! Identity tokens for samples.
//!
//! A token is `sha256(secret + "_" + label)` in hex, an underscore, then the
//! sample index in lowercase hex. The hash only depends on the secret and the
//! label, so the index is readable in clear text from the suffix; tokens are
//! handles, not a security boundary.

use crate::config::AppConfig;
use sha2::{Digest, Sha256};

/// Value returned by [`IdentityCodec::decode`] for malformed tokens.
pub const INVALID_INDEX: i64 = -1;

const SEPARATOR: char = '_';

/// Encodes and decodes sample identity tokens.
#[derive(Debug, Clone)]
pub struct IdentityCodec {
    secret: String,
}

impl IdentityCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Encode a sample index and its label into a token.
    pub fn encode(&self, index: usize, label: usize) -> String {
        format!("{}{}{:x}", self.label_hash(label), SEPARATOR, index)
    }

    /// Decode the sample index from a token.
    ///
    /// Returns [`INVALID_INDEX`] when the token has no separator, an empty or
    /// non-hexadecimal suffix, or a suffix that does not fit an `i64`.
    pub fn decode(&self, token: &str) -> i64 {
        let Some((_, suffix)) = token.rsplit_once(SEPARATOR) else {
            return INVALID_INDEX;
        };
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return INVALID_INDEX;
        }
        i64::from_str_radix(suffix, 16).unwrap_or(INVALID_INDEX)
    }

    fn label_hash(&self, label: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update([SEPARATOR as u8]);
        hasher.update(label.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for IdentityCodec {
    fn default() -> Self {
        Self::new(AppConfig::IDENTITY_SECRET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = IdentityCodec::default();
        for label in 0..7 {
            for index in [0usize, 1, 15, 16, 255, 4096, 35_886] {
                assert_eq!(codec.decode(&codec.encode(index, label)), index as i64);
            }
        }
    }

    #[test]
    fn test_encode_255_label_3() {
        let codec = IdentityCodec::default();
        let token = codec.encode(255, 3);
        assert!(token.ends_with("_ff"));
        assert_eq!(codec.decode(&token), 255);
    }

    #[test]
    fn test_hash_depends_only_on_label() {
        let codec = IdentityCodec::default();
        let a = codec.encode(1, 4);
        let b = codec.encode(900, 4);
        let c = codec.encode(1, 5);
        let prefix = |t: &str| t.rsplit_once('_').unwrap().0.to_string();
        assert_eq!(prefix(&a), prefix(&b));
        assert_ne!(prefix(&a), prefix(&c));
        assert_eq!(prefix(&a).len(), 64);
    }

    #[test]
    fn test_known_hash_value() {
        let codec = IdentityCodec::new("secret");
        let expected = hex::encode(Sha256::digest(b"secret_2"));
        assert_eq!(codec.encode(10, 2), format!("{expected}_a"));
    }

    #[test]
    fn test_different_secrets_give_different_tokens() {
        let a = IdentityCodec::new("one").encode(3, 1);
        let b = IdentityCodec::new("two").encode(3, 1);
        assert_ne!(a, b);
        assert_eq!(IdentityCodec::new("two").decode(&a), 3);
    }

    #[test]
    fn test_decode_malformed_returns_sentinel() {
        let codec = IdentityCodec::default();
        for token in [
            "",
            "_",
            "nounderscore",
            "abc_",
            "abc_xyz",
            "abc_-1",
            "abc_+1",
            "abc_1 ",
            "abc_ffffffffffffffffffff",
        ] {
            assert_eq!(codec.decode(token), INVALID_INDEX, "token {token:?}");
        }
    }

    #[test]
    fn test_decode_uses_last_separator() {
        let codec = IdentityCodec::default();
        assert_eq!(codec.decode("a_b_1f"), 31);
    }
}
