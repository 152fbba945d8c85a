//! Identifier codec
//!
//! Every patient and user id leaves the service in encoded form. Encoding is
//! deterministic (the same raw id always yields the same token), reversible
//! with the server secret, and authenticated, so a tampered or foreign token
//! fails to decode instead of resolving to some other record.
//!
//! Token layout: `hex(nonce || ciphertext)`, where `nonce` is the first 12
//! bytes of `HMAC-SHA256(mac_key, raw_id)` and the ciphertext is
//! ChaCha20-Poly1305 over the raw id.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("identifier is not valid hex")]
    Encoding,
    #[error("identifier is too short")]
    Length,
    #[error("identifier failed authentication")]
    Authentication,
    #[error("identifier payload is not utf-8")]
    Utf8,
}

impl From<CodecError> for crate::Error {
    fn from(_: CodecError) -> Self {
        crate::Error::NotFound("Unknown identifier".to_string())
    }
}

#[derive(Clone)]
pub struct IdCodec {
    cipher: ChaCha20Poly1305,
    mac_key: [u8; 32],
}

impl std::fmt::Debug for IdCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdCodec").finish_non_exhaustive()
    }
}

impl IdCodec {
    pub fn new(secret: &str) -> Self {
        let enc_key = derive_key(b"raito.codec.enc", secret);
        let mac_key = derive_key(b"raito.codec.mac", secret);
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&enc_key)),
            mac_key,
        }
    }

    pub fn encode(&self, raw_id: &str) -> String {
        let nonce = self.nonce_for(raw_id);
        // Encryption only fails for plaintexts beyond the AEAD length limit.
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), raw_id.as_bytes())
            .unwrap_or_default();

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        hex::encode(out)
    }

    pub fn decode(&self, token: &str) -> Result<String, CodecError> {
        let bytes = hex::decode(token.trim()).map_err(|_| CodecError::Encoding)?;
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CodecError::Length);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CodecError::Utf8)
    }

    fn nonce_for(&self, raw_id: &str) -> [u8; NONCE_LEN] {
        let mut nonce = [0u8; NONCE_LEN];
        if let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(&self.mac_key) {
            mac.update(raw_id.as_bytes());
            let digest = mac.finalize().into_bytes();
            nonce.copy_from_slice(&digest[..NONCE_LEN]);
        }
        nonce
    }
}

fn derive_key(label: &[u8], secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(secret.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}
