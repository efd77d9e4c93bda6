//! Ballot receipts
//!
//! Each accepted ballot carries a keyed BLAKE3 digest over its content. The
//! voter keeps the receipt; an auditor holding the key can later confirm the
//! stored ballot was not altered.

use crate::config::EngineConfig;
use crate::crypto::SecureMemory;
use crate::types::Ballot;
use crate::{Result, crypto_error};
use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Issues and checks ballot receipts
#[derive(Clone)]
pub struct ReceiptIssuer {
    key: Zeroizing<[u8; 32]>,
}

impl fmt::Debug for ReceiptIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptIssuer").finish_non_exhaustive()
    }
}

impl ReceiptIssuer {
    /// Key the issuer with the first 32 bytes of `salt`
    pub fn new(salt: &[u8]) -> Result<Self> {
        if salt.len() < 32 {
            return Err(crypto_error!("Receipt salt must be at least 32 bytes"));
        }
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&salt[..32]);
        Ok(Self { key })
    }

    /// Build from the configured receipt salt
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let salt = config.receipt_salt_bytes()?;
        Self::new(&salt)
    }

    /// Create for testing with a random key
    pub fn for_testing() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        Self { key }
    }

    /// Receipt digest for a ballot (hex)
    pub fn issue(&self, ballot: &Ballot) -> String {
        hex::encode(self.digest(ballot))
    }

    /// Whether the ballot's stored receipt matches its content
    pub fn verify(&self, ballot: &Ballot) -> bool {
        let mut claimed = [0u8; 32];
        if hex::decode_to_slice(ballot.receipt(), &mut claimed).is_err() {
            return false;
        }
        SecureMemory::constant_time_eq(&claimed, &self.digest(ballot))
    }

    fn digest(&self, ballot: &Ballot) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(ballot.ballot_id().as_bytes());
        update_field(&mut hasher, ballot.voter_id());
        update_field(&mut hasher, ballot.election_id());
        update_field(&mut hasher, ballot.position_id());
        hasher.update(&(ballot.candidate_ids().len() as u64).to_le_bytes());
        for candidate_id in ballot.candidate_ids() {
            update_field(&mut hasher, candidate_id);
        }
        hasher.update(&ballot.submitted_at().timestamp_micros().to_le_bytes());
        hasher.finalize().into()
    }
}

// Length-prefixed so ("ab", "c") and ("a", "bc") hash differently
fn update_field(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ballot(candidates: &[&str]) -> Ballot {
        Ballot::new(
            "voter-1".to_string(),
            "2".to_string(),
            "pos4".to_string(),
            candidates.iter().map(|c| c.to_string()).collect(),
            Utc::now(),
        )
    }

    #[test]
    fn test_receipt_round_trip() {
        let issuer = ReceiptIssuer::for_testing();
        let unsigned = ballot(&["cand8", "cand7"]);
        let receipt = issuer.issue(&unsigned);
        let ballot = unsigned.with_receipt(receipt.clone());

        assert_eq!(receipt.len(), 64);
        assert!(issuer.verify(&ballot));
    }

    #[test]
    fn test_receipt_detects_tampering() {
        let issuer = ReceiptIssuer::for_testing();
        let original = ballot(&["cand8", "cand7"]);
        let receipt = issuer.issue(&original);

        // Same content, different preference order
        let mut json = serde_json::to_value(original.with_receipt(receipt)).unwrap();
        json["candidate_ids"] = serde_json::json!(["cand7", "cand8"]);
        let tampered: Ballot = serde_json::from_value(json).unwrap();
        assert!(!issuer.verify(&tampered));

        // Receipts from another key do not verify
        let other = ReceiptIssuer::for_testing();
        let b = ballot(&["cand9"]);
        let b = b.clone().with_receipt(other.issue(&b));
        assert!(!issuer.verify(&b));
    }

    #[test]
    fn test_short_salt_rejected() {
        assert!(ReceiptIssuer::new(&[7u8; 16]).is_err());
        assert!(ReceiptIssuer::new(&[7u8; 48]).is_ok());
    }

    #[test]
    fn test_garbage_receipt_fails_verification() {
        let issuer = ReceiptIssuer::for_testing();
        let b = ballot(&["cand9"]).with_receipt("zz".to_string());
        assert!(!issuer.verify(&b));
    }
}
