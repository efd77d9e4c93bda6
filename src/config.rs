//! Engine configuration
//!
//! Loads settings from environment variables (a `.env` file is honoured) with
//! validation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Minimum decoded length of key material, in bytes
const MIN_KEY_BYTES: usize = 32;

/// Decoded length of an Ed25519 secret key, in bytes
const SIGNING_KEY_BYTES: usize = 32;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl LoggingConfig {
    fn from_env() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        }
    }
}

/// Ballot engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Key for ballot receipts (base64, at least 32 bytes decoded)
    pub receipt_salt: String,

    /// Optional Ed25519 secret for signing final results (base64, exactly 32 bytes decoded);
    /// a throwaway key is generated when unset
    pub results_signing_key: Option<String>,

    /// Serve tallies while voting is still open
    pub live_results: bool,

    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let receipt_salt = std::env::var("BALLOT_RECEIPT_SALT")
            .map_err(|_| Error::internal("BALLOT_RECEIPT_SALT environment variable required"))?;
        Self::validate_key(&receipt_salt, "BALLOT_RECEIPT_SALT")?;

        let results_signing_key = std::env::var("BALLOT_RESULTS_SIGNING_KEY").ok();
        if let Some(key) = &results_signing_key {
            Self::validate_signing_key(key, "BALLOT_RESULTS_SIGNING_KEY")?;
        }

        let live_results = std::env::var("BALLOT_LIVE_RESULTS")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .map_err(|_| Error::internal("Invalid BALLOT_LIVE_RESULTS (expected true or false)"))?;

        Ok(Self {
            receipt_salt,
            results_signing_key,
            live_results,
            logging: LoggingConfig::from_env(),
        })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        use base64::Engine;
        let receipt_salt =
            base64::engine::general_purpose::STANDARD.encode(rand::random::<[u8; 32]>());

        Self {
            receipt_salt,
            results_signing_key: None,
            live_results: true,
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    /// Validate base64-encoded key material
    fn validate_key(value: &str, name: &str) -> Result<()> {
        let decoded = decode_key(value, name)?;
        if decoded.len() < MIN_KEY_BYTES {
            return Err(Error::internal(format!(
                "{name} must be at least {MIN_KEY_BYTES} bytes when decoded"
            )));
        }
        Ok(())
    }

    /// Validate a base64-encoded Ed25519 secret
    fn validate_signing_key(value: &str, name: &str) -> Result<()> {
        let decoded = decode_key(value, name)?;
        if decoded.len() != SIGNING_KEY_BYTES {
            return Err(Error::internal(format!(
                "{name} must be exactly {SIGNING_KEY_BYTES} bytes when decoded, got {}",
                decoded.len()
            )));
        }
        Ok(())
    }

    /// Receipt salt as bytes
    pub fn receipt_salt_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        decode_key(&self.receipt_salt, "receipt salt")
    }

    /// Results signing secret as bytes, if configured
    pub fn results_signing_key_bytes(&self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        self.results_signing_key
            .as_deref()
            .map(|key| decode_key(key, "results signing key"))
            .transpose()
    }
}

fn decode_key(value: &str, name: &str) -> Result<Zeroizing<Vec<u8>>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map(Zeroizing::new)
        .map_err(|_| Error::internal(format!("{name} must be valid base64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn test_testing_config() {
        let config = EngineConfig::for_testing();
        assert!(config.receipt_salt_bytes().unwrap().len() >= MIN_KEY_BYTES);
        assert!(config.results_signing_key_bytes().unwrap().is_none());
        assert!(config.live_results);
    }

    #[test]
    fn test_key_validation() {
        let valid = base64::engine::general_purpose::STANDARD.encode([0u8; 32]);
        assert!(EngineConfig::validate_key(&valid, "TEST").is_ok());

        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(EngineConfig::validate_key(&short, "TEST").is_err());

        assert!(EngineConfig::validate_key("invalid_base64!", "TEST").is_err());
    }

    #[test]
    fn test_signing_key_length_is_exact() {
        let exact = base64::engine::general_purpose::STANDARD.encode([3u8; 32]);
        assert!(EngineConfig::validate_signing_key(&exact, "TEST").is_ok());

        let long = base64::engine::general_purpose::STANDARD.encode([3u8; 48]);
        let err = EngineConfig::validate_signing_key(&long, "TEST").unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        assert!(err.to_string().contains("exactly 32"));

        let short = base64::engine::general_purpose::STANDARD.encode([3u8; 16]);
        assert!(EngineConfig::validate_signing_key(&short, "TEST").is_err());
    }

    #[test]
    fn test_signing_key_decoding() {
        let mut config = EngineConfig::for_testing();
        config.results_signing_key = Some(base64::engine::general_purpose::STANDARD.encode([5u8; 32]));
        let key = config.results_signing_key_bytes().unwrap().unwrap();
        assert_eq!(key.as_slice(), &[5u8; 32]);
    }
}
