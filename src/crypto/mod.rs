//! Cryptographic primitives for ballot receipts and result attestation

pub mod attestation;
pub mod receipt;

use crate::{Result, crypto_error};
use rand::RngCore;

pub use attestation::{ResultAttestation, ResultSigner};
pub use receipt::ReceiptIssuer;

/// A BLAKE3 digest (32 bytes)
pub type Hash = [u8; 32];

/// Cryptographic utilities
pub struct CryptoUtils;

impl CryptoUtils {
    /// Hash arbitrary data with Blake3
    pub fn hash(data: &[u8]) -> Hash {
        blake3::hash(data).into()
    }

    /// Verify that two hashes are equal in constant time
    pub fn constant_time_eq(a: &Hash, b: &Hash) -> bool {
        use subtle::ConstantTimeEq;
        a.ct_eq(b).into()
    }

    /// Convert a hex string to a hash
    pub fn hex_to_hash(hex: &str) -> Result<Hash> {
        if hex.len() != 64 {
            return Err(crypto_error!(
                "Invalid hex length for hash: expected 64, got {}",
                hex.len()
            ));
        }

        let mut hash = [0u8; 32];
        hex::decode_to_slice(hex, &mut hash)
            .map_err(|e| crypto_error!("Invalid hex string: {}", e))?;
        Ok(hash)
    }

    /// Convert a hash to a hex string
    pub fn hash_to_hex(hash: &Hash) -> String {
        hex::encode(hash)
    }
}

/// Secure memory utilities
pub struct SecureMemory;

impl SecureMemory {
    /// Securely compare two byte slices in constant time
    pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
        use subtle::ConstantTimeEq;
        if a.len() != b.len() {
            return false;
        }
        a.ct_eq(b).into()
    }

    /// Generate cryptographically secure random bytes
    pub fn secure_random_bytes<const N: usize>() -> [u8; N] {
        let mut bytes = [0u8; N];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }
}
