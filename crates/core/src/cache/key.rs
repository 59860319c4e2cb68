use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::CacheKeyStrategy;

const KEY_PREFIX: &str = "ticket:";

/// Cache key for a user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `user_input`.
    ///
    /// Only the input text participates; ticket and customer identity never do.
    pub fn derive(user_input: &str, strategy: CacheKeyStrategy) -> Self {
        match strategy {
            CacheKeyStrategy::Raw => Self(format!("{}{}", KEY_PREFIX, user_input)),
            CacheKeyStrategy::Sha256 => {
                let digest = Sha256::digest(user_input.as_bytes());
                Self(format!("{}sha256:{:x}", KEY_PREFIX, digest))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_key_is_prefixed_input() {
        let key = CacheKey::derive("My card was stolen", CacheKeyStrategy::Raw);
        assert_eq!(key.as_str(), "ticket:My card was stolen");
    }

    #[test]
    fn test_sha256_key_is_fixed_length() {
        let short = CacheKey::derive("a", CacheKeyStrategy::Sha256);
        let long = CacheKey::derive(&"x".repeat(10_000), CacheKeyStrategy::Sha256);
        assert!(short.as_str().starts_with("ticket:sha256:"));
        assert_eq!(short.as_str().len(), long.as_str().len());
        assert_eq!(short.as_str().len(), "ticket:sha256:".len() + 64);
    }

    #[test]
    fn test_sha256_known_digest() {
        let key = CacheKey::derive("abc", CacheKeyStrategy::Sha256);
        assert_eq!(
            key.as_str(),
            "ticket:sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_keys_are_deterministic_and_content_addressed() {
        for strategy in [CacheKeyStrategy::Raw, CacheKeyStrategy::Sha256] {
            let a = CacheKey::derive("Late fee on my loan", strategy);
            let b = CacheKey::derive("Late fee on my loan", strategy);
            let c = CacheKey::derive("Late fee on my loan.", strategy);
            assert_eq!(a, b);
            assert_ne!(a, c);
        }
    }
}
