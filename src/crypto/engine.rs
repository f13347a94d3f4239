use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed login state stays acceptable, in seconds.
pub const STATE_MAX_AGE_SECS: i64 = 600;

const NONCE_LEN: usize = 12;
const STATE_NONCE_LEN: usize = 16;
const STATE_PAYLOAD_LEN: usize = STATE_NONCE_LEN + 8;
const MAC_LEN: usize = 32;

/// Seals stored tokens (AES-256-GCM), signs login states and derives the key
/// for private cookies (HMAC-SHA256).
pub struct CryptoEngine {
    cipher: Aes256Gcm,
    hmac_key: Vec<u8>,
}

fn decode_key(name: &str, b64: &str) -> Result<Vec<u8>, AuthError> {
    STANDARD
        .decode(b64)
        .map_err(|e| AuthError::CryptoError(format!("Invalid {name} base64: {e}")))
}

impl CryptoEngine {
    /// Build from the base64 `MASTER_KEY` (exactly 32 bytes) and `HMAC_SECRET`.
    pub fn new(master_key_b64: &str, hmac_secret_b64: &str) -> Result<Self, AuthError> {
        let master_key = decode_key("MASTER_KEY", master_key_b64)?;
        if master_key.len() != 32 {
            return Err(AuthError::CryptoError(format!(
                "MASTER_KEY must be 32 bytes, got {}",
                master_key.len()
            )));
        }

        let hmac_key = decode_key("HMAC_SECRET", hmac_secret_b64)?;
        if hmac_key.is_empty() {
            return Err(AuthError::CryptoError("HMAC_SECRET must not be empty".into()));
        }

        let cipher = Aes256Gcm::new_from_slice(&master_key)
            .map_err(|e| AuthError::CryptoError(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self { cipher, hmac_key })
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        <HmacSha256 as Mac>::new_from_slice(&self.hmac_key)
            .map_err(|e| AuthError::CryptoError(format!("HMAC init failed: {e}")))
    }

    /// Seal a token for storage as base64(nonce || ciphertext).
    pub fn seal(&self, token: &str) -> Result<String, AuthError> {
        let mut sealed = vec![0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut sealed);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&sealed), token.as_bytes())
            .map_err(|e| AuthError::CryptoError(format!("Encryption failed: {e}")))?;
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    /// Reverse of [`CryptoEngine::seal`].
    pub fn open(&self, sealed_b64: &str) -> Result<String, AuthError> {
        let sealed = STANDARD
            .decode(sealed_b64)
            .map_err(|e| AuthError::CryptoError(format!("Invalid base64: {e}")))?;
        if sealed.len() <= NONCE_LEN {
            return Err(AuthError::CryptoError("Sealed token too short".into()));
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| AuthError::CryptoError(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::CryptoError(format!("Invalid UTF-8 after decrypt: {e}")))
    }

    /// Mint a login state: base64url(nonce || issued_at || hmac).
    pub fn sign_state(&self, now: i64) -> Result<String, AuthError> {
        let mut payload = [0u8; STATE_PAYLOAD_LEN];
        rand::thread_rng().fill_bytes(&mut payload[..STATE_NONCE_LEN]);
        payload[STATE_NONCE_LEN..].copy_from_slice(&now.to_be_bytes());

        let mut mac = self.mac()?;
        mac.update(&payload);

        let mut signed = payload.to_vec();
        signed.extend_from_slice(&mac.finalize().into_bytes());
        Ok(URL_SAFE_NO_PAD.encode(signed))
    }

    /// Check a login state's signature and age.
    pub fn verify_state(&self, signed: &str, now: i64) -> Result<(), AuthError> {
        let raw = URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| AuthError::InvalidState)?;
        if raw.len() != STATE_PAYLOAD_LEN + MAC_LEN {
            return Err(AuthError::InvalidState);
        }

        let (payload, tag) = raw.split_at(STATE_PAYLOAD_LEN);
        let mut mac = self.mac()?;
        mac.update(payload);
        mac.verify_slice(tag).map_err(|_| AuthError::InvalidState)?;

        let mut issued_at = [0u8; 8];
        issued_at.copy_from_slice(&payload[STATE_NONCE_LEN..]);
        if now - i64::from_be_bytes(issued_at) > STATE_MAX_AGE_SECS {
            return Err(AuthError::StateExpired);
        }
        Ok(())
    }

    /// 64 bytes of key material for private cookies, derived from `HMAC_SECRET`.
    pub fn cookie_key_material(&self) -> Result<[u8; 64], AuthError> {
        let mut material = [0u8; 64];
        for (i, label) in [b"cookie-key:enc".as_slice(), b"cookie-key:sig".as_slice()]
            .into_iter()
            .enumerate()
        {
            let mut mac = self.mac()?;
            mac.update(label);
            material[i * 32..(i + 1) * 32].copy_from_slice(&mac.finalize().into_bytes());
        }
        Ok(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(hmac_byte: u8) -> CryptoEngine {
        CryptoEngine::new(&STANDARD.encode([0x42u8; 32]), &STANDARD.encode([hmac_byte; 32]))
            .unwrap()
    }

    #[test]
    fn test_sealed_token_opens() {
        let engine = engine_with(0x43);
        let sealed = engine.seal("ya29.a0AfH6SMB-access-token").unwrap();
        assert!(!sealed.contains("ya29"));
        assert_eq!(engine.open(&sealed).unwrap(), "ya29.a0AfH6SMB-access-token");
    }

    #[test]
    fn test_sealing_twice_differs() {
        let engine = engine_with(0x43);
        assert_ne!(engine.seal("same").unwrap(), engine.seal("same").unwrap());
    }

    #[test]
    fn test_open_rejects_truncated_input() {
        let engine = engine_with(0x43);
        assert!(engine.open(&STANDARD.encode([0u8; NONCE_LEN])).is_err());
    }

    #[test]
    fn test_bad_keys_rejected() {
        let short = STANDARD.encode([0x42u8; 16]);
        let hmac = STANDARD.encode([0x43u8; 32]);
        assert!(matches!(CryptoEngine::new(&short, &hmac), Err(AuthError::CryptoError(_))));

        let master = STANDARD.encode([0x42u8; 32]);
        assert!(matches!(CryptoEngine::new(&master, ""), Err(AuthError::CryptoError(_))));
    }

    #[test]
    fn test_state_accepted_when_fresh() {
        let engine = engine_with(0x43);
        let state = engine.sign_state(1_700_000_000).unwrap();
        assert!(engine.verify_state(&state, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_state_expires() {
        let engine = engine_with(0x43);
        let state = engine.sign_state(1_700_000_000).unwrap();
        assert!(matches!(
            engine.verify_state(&state, 1_700_000_000 + STATE_MAX_AGE_SECS + 1),
            Err(AuthError::StateExpired)
        ));
    }

    #[test]
    fn test_tampered_state_rejected() {
        let engine = engine_with(0x43);
        let mut raw = URL_SAFE_NO_PAD
            .decode(engine.sign_state(1_700_000_000).unwrap())
            .unwrap();
        // Push the issue time forward without re-signing.
        raw[STATE_PAYLOAD_LEN - 1] ^= 0x01;
        assert!(matches!(
            engine.verify_state(&URL_SAFE_NO_PAD.encode(raw), 1_700_000_000),
            Err(AuthError::InvalidState)
        ));
    }

    #[test]
    fn test_state_from_other_key_rejected() {
        let state = engine_with(0x99).sign_state(1_700_000_000).unwrap();
        assert!(matches!(
            engine_with(0x43).verify_state(&state, 1_700_000_000),
            Err(AuthError::InvalidState)
        ));
    }

    #[test]
    fn test_cookie_key_material_depends_on_secret() {
        let a = engine_with(0x43).cookie_key_material().unwrap();
        assert_eq!(a, engine_with(0x43).cookie_key_material().unwrap());
        assert_ne!(a, engine_with(0x44).cookie_key_material().unwrap());
        assert_ne!(a[..32], a[32..]);
    }
}
