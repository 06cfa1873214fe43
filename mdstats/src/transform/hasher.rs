//! Short content ids for rendered text.

use xxhash_rust::xxh3::xxh3_64;

/// First 8 hex digits of the xxh3-64 hash of `text`
pub fn short_hash(text: &str) -> String {
    format!("{:08x}", xxh3_64(text.as_bytes()) >> 32)
}
