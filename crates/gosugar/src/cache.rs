//! Content-addressed keys for memoizing transpilation results.
//!
//! Output depends only on the source text, the config and the transpiler
//! version, so those three determine the key.

use crate::config::Config;

/// A blake3 digest identifying one transpilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(blake3::Hash);

impl CacheKey {
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn cache_key(source: &str, config: &Config) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    hasher.update(&[0]);
    // Config serialization cannot fail: all fields are plain data.
    let config = serde_json::to_vec(config).unwrap_or_default();
    hasher.update(&(config.len() as u64).to_le_bytes());
    hasher.update(&config);
    hasher.update(source.as_bytes());
    CacheKey(hasher.finalize())
}
