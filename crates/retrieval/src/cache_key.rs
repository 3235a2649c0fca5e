//! Retrieval cache keys — a normalized hash of question plus user id.

use sha2::{Digest, Sha256};

/// Cache key for one retrieval request. Whitespace and case differences in
/// the question map to the same key; different users never share entries.
pub fn retrieval_cache_key(question: &str, user_id: Option<&str>) -> String {
    let normalized = question.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"\n");
    hasher.update(user_id.unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_and_whitespace() {
        let a = retrieval_cache_key("  Total Deposits  ", Some("u-1"));
        let b = retrieval_cache_key("total deposits", Some("u-1"));
        assert_eq!(a, b);
    }

    #[test]
    fn users_do_not_share_keys() {
        let a = retrieval_cache_key("total deposits", Some("u-1"));
        let b = retrieval_cache_key("total deposits", Some("u-2"));
        let c = retrieval_cache_key("total deposits", None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = retrieval_cache_key("q", None);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
