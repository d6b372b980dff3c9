// Utility functions

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a bearer credential or other opaque secret
pub fn hash_credential(credential: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credential.as_bytes());
    hex::encode(hasher.finalize())
}

/// Turn free text ("Software Engineer") into a hashtag ("#SoftwareEngineer").
/// Falls back to `#Professional` when nothing alphanumeric survives.
pub fn hashtag_from(text: &str) -> String {
    let body: String = text.chars().filter(|c| c.is_alphanumeric()).collect();
    if body.is_empty() {
        "#Professional".to_string()
    } else {
        format!("#{}", body)
    }
}

// ============================================
// AES-256-GCM Encryption for LinkedIn access tokens
// ============================================

pub mod encryption {
    use aes_gcm::{
        Aes256Gcm, Nonce,
        aead::{Aead, KeyInit, OsRng},
    };
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use rand::RngCore;
    use sha2::{Digest, Sha256};

    const NONCE_LEN: usize = 12;

    /// Derive a 256-bit key from the configured secret using SHA-256.
    fn derive_key(secret: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.finalize().into()
    }

    /// Encrypt plaintext using AES-256-GCM.
    /// Returns base64-encoded string: nonce(12 bytes) || ciphertext || tag(16 bytes)
    pub fn encrypt(secret: &str, plaintext: &str) -> Result<String, String> {
        let cipher = Aes256Gcm::new_from_slice(&derive_key(secret))
            .map_err(|e| format!("Failed to create cipher: {}", e))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| format!("Encryption failed: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&combined))
    }

    /// Decrypt base64-encoded AES-256-GCM ciphertext produced by [`encrypt`].
    pub fn decrypt(secret: &str, encrypted: &str) -> Result<String, String> {
        let cipher = Aes256Gcm::new_from_slice(&derive_key(secret))
            .map_err(|e| format!("Failed to create cipher: {}", e))?;

        let combined = BASE64
            .decode(encrypted)
            .map_err(|e| format!("Base64 decode failed: {}", e))?;

        if combined.len() < NONCE_LEN {
            return Err("Encrypted data too short".to_string());
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| format!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| format!("UTF-8 decode failed: {}", e))
    }
}
