//! Signed attestations over finalised election results
//!
//! The canonical JSON of an [`ElectionResults`] is hashed with BLAKE3 and the
//! digest is signed with Ed25519 together with the election id and signing
//! time. Anyone holding the public key can recheck published results.

use crate::crypto::{CryptoUtils, SecureMemory};
use crate::tally::ElectionResults;
use crate::types::ElectionId;
use crate::{Result, crypto_error};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Signature over one election's results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultAttestation {
    pub election_id: ElectionId,

    /// Hex BLAKE3 digest of the results' canonical JSON
    pub digest: String,

    /// Ed25519 signature (64 bytes)
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,

    /// Hex Ed25519 verifying key
    pub public_key: String,

    pub signed_at: DateTime<Utc>,
}

impl ResultAttestation {
    /// Check that `results` are exactly what was signed
    pub fn verify(&self, results: &ElectionResults) -> Result<()> {
        if results.election_id != self.election_id {
            return Err(crypto_error!(
                "Attestation is for election {}, not {}",
                self.election_id,
                results.election_id
            ));
        }

        let digest = results_digest(results)?;
        let claimed = CryptoUtils::hex_to_hash(&self.digest)?;
        if !CryptoUtils::constant_time_eq(&claimed, &digest) {
            return Err(crypto_error!("Results do not match attested digest"));
        }

        let mut key_bytes = [0u8; 32];
        hex::decode_to_slice(&self.public_key, &mut key_bytes)
            .map_err(|e| crypto_error!("Invalid public key hex: {}", e))?;
        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| crypto_error!("Invalid public key"))?;

        let signature = Ed25519Signature::from_slice(&self.signature)
            .map_err(|_| crypto_error!("Invalid signature format"))?;

        verifying_key
            .verify(
                &signed_message(&self.election_id, &digest, self.signed_at),
                &signature,
            )
            .map_err(|_| crypto_error!("Signature verification failed"))
    }
}

/// Ed25519 key used to sign finalised results
pub struct ResultSigner {
    signing_key: SigningKey,
}

impl ResultSigner {
    /// Fresh random key
    pub fn generate() -> Self {
        let secret = Zeroizing::new(SecureMemory::secure_random_bytes::<32>());
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Key from a 32-byte secret
    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        let secret: Zeroizing<[u8; 32]> = Zeroizing::new(
            secret
                .try_into()
                .map_err(|_| crypto_error!("Signing key must be exactly 32 bytes"))?,
        );
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Hex verifying key to publish alongside results
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign finalised results
    pub fn sign(&self, results: &ElectionResults) -> Result<ResultAttestation> {
        let digest = results_digest(results)?;
        let signed_at = Utc::now();
        let signature = self
            .signing_key
            .sign(&signed_message(&results.election_id, &digest, signed_at));

        Ok(ResultAttestation {
            election_id: results.election_id.clone(),
            digest: CryptoUtils::hash_to_hex(&digest),
            signature: signature.to_bytes().to_vec(),
            public_key: self.public_key_hex(),
            signed_at,
        })
    }
}

fn results_digest(results: &ElectionResults) -> Result<[u8; 32]> {
    let canonical = serde_json::to_vec(results)?;
    Ok(CryptoUtils::hash(&canonical))
}

fn signed_message(election_id: &str, digest: &[u8; 32], signed_at: DateTime<Utc>) -> Vec<u8> {
    let mut message = Vec::with_capacity(election_id.len() + 48);
    message.extend_from_slice(&(election_id.len() as u64).to_le_bytes());
    message.extend_from_slice(election_id.as_bytes());
    message.extend_from_slice(digest);
    message.extend_from_slice(&signed_at.timestamp_micros().to_le_bytes());
    message
}
