//! Cipher capability under test
//!
//! The harness only ever sees [`CipherPrimitive`]: two calls taking a string key
//! and a byte buffer. [`AesGcmCipher`] is the stock implementation driven by the
//! `cbench` binary; any other cipher (or a stub) can be injected instead.
//!
//! Wire layout of an [`AesGcmCipher`] ciphertext:
//!
//! ```text
//! nonce (12 bytes) || ciphertext (len(plaintext) bytes) || tag (16 bytes)
//! ```

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{BenchError, Result};

/// An opaque encrypt/decrypt pair keyed by a string credential
pub trait CipherPrimitive {
    /// Short human-readable name recorded in report metadata
    fn name(&self) -> &str;

    fn encrypt(&self, key: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, key: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// AES-256-GCM with a SHA-256 derived key and a random nonce per message
pub struct AesGcmCipher {
    rng: SystemRandom,
}

impl AesGcmCipher {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    fn sealing_key(key: &str) -> Result<LessSafeKey> {
        let material = digest(&SHA256, key.as_bytes());
        let unbound = UnboundKey::new(&aead::AES_256_GCM, material.as_ref())
            .map_err(|_| BenchError::Primitive("invalid AES-256 key material".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl Default for AesGcmCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl CipherPrimitive for AesGcmCipher {
    fn name(&self) -> &str {
        "AES-256-GCM"
    }

    fn encrypt(&self, key: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = Self::sealing_key(key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| BenchError::Primitive("nonce generation failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + plaintext.len() + aead::MAX_TAG_LEN);
        out.extend_from_slice(&nonce_bytes);
        let mut body = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut body,
        )
        .map_err(|_| BenchError::Primitive("seal failed".to_string()))?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(&self, key: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let tag_len = aead::AES_256_GCM.tag_len();
        if ciphertext.len() < NONCE_LEN + tag_len {
            return Err(BenchError::Primitive(format!(
                "ciphertext too short: {} bytes",
                ciphertext.len()
            )));
        }
        let key = Self::sealing_key(key)?;

        let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| BenchError::Primitive("malformed nonce".to_string()))?;

        let mut buf = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut buf)
            .map_err(|_| BenchError::Primitive("authentication failed".to_string()))?;
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "my secret key";

    #[test]
    fn test_ciphertext_non_empty_for_non_empty_plaintext() {
        let cipher = AesGcmCipher::new();
        for size in [1usize, 10, 100, 1000] {
            let ct = cipher.encrypt(KEY, &vec![0u8; size]).unwrap();
            assert!(!ct.is_empty());
            assert_eq!(ct.len(), NONCE_LEN + size + 16);
        }
    }

    #[test]
    fn test_decrypt_recovers_plaintext() {
        let cipher = AesGcmCipher::new();
        let msg = b"zero payloads are boring".to_vec();
        let ct = cipher.encrypt(KEY, &msg).unwrap();
        assert_eq!(cipher.decrypt(KEY, &ct).unwrap(), msg);
    }

    #[test]
    fn test_nonce_differs_per_message() {
        let cipher = AesGcmCipher::new();
        let a = cipher.encrypt(KEY, &[0u8; 16]).unwrap();
        let b = cipher.encrypt(KEY, &[0u8; 16]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_rejects_short_input() {
        let cipher = AesGcmCipher::new();
        let err = cipher.decrypt(KEY, &[0u8; 8]).unwrap_err();
        assert!(err.is_primitive());
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_decrypt_rejects_wrong_key_and_tampering() {
        let cipher = AesGcmCipher::new();
        let mut ct = cipher.encrypt(KEY, &[0u8; 64]).unwrap();
        assert!(cipher.decrypt("other key", &ct).is_err());

        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        assert!(matches!(
            cipher.decrypt(KEY, &ct),
            Err(BenchError::Primitive(_))
        ));
    }
}
