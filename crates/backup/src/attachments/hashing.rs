//! Content hashing, media names and key generation

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Length of an attachment encryption key (AES key + HMAC key)
pub const ENCRYPTION_KEY_LEN: usize = 64;

/// SHA-256 of the plaintext; the content address of an attachment
pub fn plaintext_hash(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Media-tier object name: hex(sha256(plaintext_hash || encryption_key))
pub fn media_name(plaintext_hash: &[u8], encryption_key: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext_hash);
    hasher.update(encryption_key);
    hex::encode(hasher.finalize())
}

/// Fresh random key for a newly written local attachment
pub fn generate_encryption_key() -> Vec<u8> {
    let mut key = vec![0u8; ENCRYPTION_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    key
}
