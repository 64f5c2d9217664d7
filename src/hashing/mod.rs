//! Request fingerprints and API-key digests.
//!
//! Both caches and the key store are keyed on SHA-256 hex digests. The
//! fingerprint is computed over the canonical JSON of the *post-scrub*
//! request, so requests that redact to the same content share a cache slot.

use sha2::{Digest, Sha256};

use crate::api::ChatRequest;

/// Computes the exact-cache fingerprint for a validated request.
///
/// The request is serialized to canonical JSON (object keys sorted) and
/// hashed. Any field change (model, temperature, `max_tokens`, message
/// order, role, or content) produces a different fingerprint, while
/// re-serializing and re-parsing the same request leaves it unchanged.
pub fn fingerprint(request: &ChatRequest) -> String {
    let value = serde_json::to_value(request).expect("chat request serializes to JSON");
    let canonical = value.to_string();
    sha256_hex(canonical.as_bytes())
}

/// Hashes a plaintext API key for storage and lookup.
///
/// The key store persists only this digest; the plaintext is shown once by
/// the admin tool and never written anywhere.
pub fn hash_api_key(key: &str) -> String {
    sha256_hex(key.as_bytes())
}

/// Derives a 64-bit vector-index point id from a fingerprint.
///
/// The fingerprint is already a uniform 256-bit digest, so taking the first
/// 64 bits keeps collisions negligible for realistic index sizes. A
/// collision surfaces as an overwritten semantic entry, which the confirming
/// exact-cache lookup tolerates.
pub fn fingerprint_to_point_id(fp: &str) -> u64 {
    match fp.get(..16).and_then(|hex| u64::from_str_radix(hex, 16).ok()) {
        Some(id) => id,
        // Not a hex digest; hash whatever we were given instead.
        None => {
            let digest = Sha256::digest(fp.as_bytes());
            u64::from_be_bytes(digest[..8].try_into().expect("SHA-256 yields 32 bytes"))
        }
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
