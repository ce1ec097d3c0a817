//! AES-256-GCM chunk sealing.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use tandem_types::{CaptureError, CaptureResult, ChunkEncryptor};

/// Bytes a sealed box adds on top of the plaintext: 12-byte nonce plus
/// 16-byte authentication tag.
pub const GCM_SEAL_OVERHEAD: usize = 12 + 16;

/// [`ChunkEncryptor`] sealing each chunk with AES-256-GCM.
///
/// Every chunk gets a fresh random nonce, so sealing the same plaintext
/// twice yields distinct boxes. Key provisioning is the caller's
/// problem; this type only holds the key material it is handed.
pub struct GcmChunkEncryptor {
    cipher: Aes256Gcm,
    key_id: Option<String>,
}

impl GcmChunkEncryptor {
    /// Build an encryptor over a raw 256-bit key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            key_id: None,
        }
    }

    /// Attach an opaque key identifier for recording metadata.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Open a sealed box produced by [`encrypt`](ChunkEncryptor::encrypt).
    ///
    /// Fails when the box is too short or the authentication tag does
    /// not verify; any flipped byte is rejected.
    pub fn decrypt(&self, sealed: &[u8]) -> CaptureResult<Vec<u8>> {
        if sealed.len() < GCM_SEAL_OVERHEAD {
            return Err(CaptureError::EncryptionFailed(format!(
                "sealed chunk too short: {} bytes",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(12);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CaptureError::EncryptionFailed("chunk authentication failed".into()))
    }
}

impl ChunkEncryptor for GcmChunkEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> CaptureResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CaptureError::EncryptionFailed(format!("AES-GCM seal failed: {e}")))?;

        // aes-gcm appends the tag to the ciphertext; prepend the nonce to
        // make the box self-contained.
        let mut sealed = Vec::with_capacity(nonce.len() + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn algorithm(&self) -> &str {
        "AES-256-GCM"
    }

    fn key_id(&self) -> Option<String> {
        self.key_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn seal_and_open_round_trip() {
        let enc = GcmChunkEncryptor::new(&test_key());
        for plaintext in [&b""[..], b"x", b"some pcm audio bytes"] {
            let sealed = enc.encrypt(plaintext).unwrap();
            assert_eq!(sealed.len(), plaintext.len() + GCM_SEAL_OVERHEAD);
            assert_eq!(enc.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        let enc = GcmChunkEncryptor::new(&test_key());
        let a = enc.encrypt(b"same chunk").unwrap();
        let b = enc.encrypt(b"same chunk").unwrap();
        assert_ne!(a, b);
        assert_ne!(&a[..12], &b[..12]);
    }

    #[test]
    fn tampering_is_detected() {
        let enc = GcmChunkEncryptor::new(&test_key());
        let sealed = enc.encrypt(b"authentic audio").unwrap();

        for position in 0..sealed.len() {
            let mut forged = sealed.clone();
            forged[position] ^= 0x01;
            assert!(
                enc.decrypt(&forged).is_err(),
                "flipped byte at {position} went unnoticed"
            );
        }
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let enc = GcmChunkEncryptor::new(&test_key());
        let other = GcmChunkEncryptor::new(&[0x55; 32]);
        let sealed = enc.encrypt(b"secret").unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn truncated_box_is_rejected() {
        let enc = GcmChunkEncryptor::new(&test_key());
        assert!(matches!(
            enc.decrypt(&[0u8; 10]),
            Err(CaptureError::EncryptionFailed(_))
        ));
    }

    #[test]
    fn key_id_flows_through() {
        let enc = GcmChunkEncryptor::new(&test_key()).with_key_id("tenant-key-3");
        assert_eq!(enc.algorithm(), "AES-256-GCM");
        assert_eq!(enc.key_id().as_deref(), Some("tenant-key-3"));
        assert_eq!(GcmChunkEncryptor::new(&test_key()).key_id(), None);
    }
}
