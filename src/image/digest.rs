//! SHA256 digest utilities for image blobs and manifests
//!
//! Digest files written by the build system may hold either a bare hex digest or the full
//! `sha256:<hex>` form; everything handed to a registry uses the full form.

use crate::error::{ResolverError, Result};
use sha2::Digest;

pub const SHA256_PREFIX: &str = "sha256:";

/// Utilities for working with SHA256 digests in Docker context
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest (hex only) from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute full Docker digest (with sha256: prefix) from byte data
    pub fn compute_docker_digest(data: &[u8]) -> String {
        format!("{}{}", SHA256_PREFIX, Self::compute_sha256(data))
    }

    /// Validate SHA256 hex string (64 characters, all lowercase hex)
    pub fn is_valid_sha256_hex(digest: &str) -> bool {
        digest.len() == 64
            && digest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// Validate full Docker digest format (sha256:xxxxx)
    pub fn is_valid_docker_digest(digest: &str) -> bool {
        digest
            .strip_prefix(SHA256_PREFIX)
            .is_some_and(Self::is_valid_sha256_hex)
    }

    /// Normalize digest to full Docker format (add sha256: prefix if missing)
    pub fn normalize_digest(digest: &str) -> Result<String> {
        let digest = digest.trim();
        if let Some(hex_part) = digest.strip_prefix(SHA256_PREFIX) {
            if !Self::is_valid_sha256_hex(hex_part) {
                return Err(ResolverError::Validation(format!(
                    "Invalid SHA256 digest: {}",
                    digest
                )));
            }
            Ok(digest.to_string())
        } else {
            if !Self::is_valid_sha256_hex(digest) {
                return Err(ResolverError::Validation(format!(
                    "Invalid SHA256 digest: expected 64 hex characters, got '{}'",
                    digest
                )));
            }
            Ok(format!("{}{}", SHA256_PREFIX, digest))
        }
    }

    /// Verify data matches expected digest
    pub fn verify_data_integrity(data: &[u8], expected_digest: &str) -> Result<()> {
        let computed = Self::compute_docker_digest(data);
        if computed != expected_digest {
            return Err(ResolverError::Validation(format!(
                "Data integrity check failed: expected {}, computed {}",
                expected_digest, computed
            )));
        }
        Ok(())
    }

    /// Format digest for display (truncated for readability)
    pub fn format_digest_short(digest: &str) -> String {
        if digest.len() > 23 {
            format!("{}...", &digest[..23])
        } else {
            digest.to_string()
        }
    }
}
