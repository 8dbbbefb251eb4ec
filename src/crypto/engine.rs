use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::ConnectError;

type HmacSha256 = Hmac<Sha256>;

/// Helper to create an HMAC instance, resolving trait ambiguity.
fn new_hmac(key: &[u8]) -> Result<HmacSha256, ConnectError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| ConnectError::Crypto(format!("HMAC init failed: {e}")))
}

/// AES-256-GCM encryption for tokens at rest and HMAC-SHA256 signing for
/// the OAuth `state` parameter. The state payload is the only channel that
/// carries subject identity across the authorization redirect, so it must
/// be unforgeable.
pub struct CryptoEngine {
    cipher: Aes256Gcm,
    hmac_key: Vec<u8>,
}

impl CryptoEngine {
    /// Create a new CryptoEngine from base64-encoded keys.
    pub fn new(master_key_b64: &str, hmac_secret_b64: &str) -> Result<Self, ConnectError> {
        let master_key = STANDARD
            .decode(master_key_b64)
            .map_err(|e| ConnectError::Crypto(format!("Invalid MASTER_KEY base64: {e}")))?;

        if master_key.len() != 32 {
            return Err(ConnectError::Crypto(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            )));
        }

        let hmac_key = STANDARD
            .decode(hmac_secret_b64)
            .map_err(|e| ConnectError::Crypto(format!("Invalid HMAC_SECRET base64: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| ConnectError::Crypto(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self { cipher, hmac_key })
    }

    /// Encrypt a token value. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, ConnectError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| ConnectError::Crypto(format!("Encryption failed: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&combined))
    }

    /// Decrypt base64(nonce || ciphertext) back to the token value.
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, ConnectError> {
        let combined = STANDARD
            .decode(encrypted_b64)
            .map_err(|e| ConnectError::Crypto(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(ConnectError::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| ConnectError::Crypto(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| ConnectError::Crypto(format!("Invalid UTF-8 after decrypt: {e}")))
    }

    /// Sign a state payload with HMAC-SHA256. Returns URL-safe
    /// base64(hmac || payload), suitable for a query parameter.
    pub fn sign_state(&self, payload: &str) -> Result<String, ConnectError> {
        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut combined = signature.to_vec();
        combined.extend_from_slice(payload.as_bytes());

        Ok(URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Verify a signed state parameter and return its payload. Any decode
    /// or signature failure collapses to `InvalidSession`; callers never
    /// learn which check failed.
    pub fn verify_state(&self, signed: &str) -> Result<String, ConnectError> {
        let combined = URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| ConnectError::InvalidSession)?;

        if combined.len() < 32 {
            return Err(ConnectError::InvalidSession);
        }

        let (signature, payload_bytes) = combined.split_at(32);

        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload_bytes);
        mac.verify_slice(signature)
            .map_err(|_| ConnectError::InvalidSession)?;

        String::from_utf8(payload_bytes.to_vec()).map_err(|_| ConnectError::InvalidSession)
    }
}
