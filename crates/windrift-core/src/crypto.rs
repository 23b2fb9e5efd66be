//! # CryptoPrimitives
//!
//! Everything the rest of the core needs to keep session data
//! confidential end-to-end: password-derived keys, AEAD encryption of
//! opaque plaintexts, a recovery-key escape hatch, and a deterministic
//! password-verification hash that needs no stored token.
//!
//! No raw key material ever leaves this module except through [`Key`],
//! which zeroizes its bytes on drop.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key as AesKey, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD as B64, STANDARD_NO_PAD as B64_NO_PAD};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::wire::{EncryptedPayload, KeyData};

const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_DERIVATION_PURPOSE: &[u8] = b"encryption";
const VERIFICATION_CONTEXT: &[u8] = b"verification";
const VERIFICATION_PLAINTEXT: &[u8] = b"windrift-sync-verification-v1";

/// A 256-bit symmetric key. Zeroized on drop; never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; 32]);

impl Key {
    fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key(..)")
    }
}

/// 32 cryptographically random bytes, base64-encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    B64.encode(bytes)
}

/// 12 cryptographically random bytes, base64-encoded.
pub fn generate_iv() -> String {
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    B64.encode(bytes)
}

/// A fresh recovery key: base64 of 32 random bytes, displayed as
/// dash-separated 4-character blocks. Parsing strips the dashes (and any
/// other non-alphanumeric character) before use in key derivation.
pub fn generate_recovery_key() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let encoded = B64_NO_PAD.encode(bytes);
    dash_group(&encoded)
}

fn dash_group(s: &str) -> String {
    s.as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).expect("ascii base64 alphabet"))
        .collect::<Vec<_>>()
        .join("-")
}

fn strip_non_alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn pbkdf2_derive(password: &[u8], salt_bytes: &[u8], purpose: &[u8]) -> Key {
    let mut salted_salt = Vec::with_capacity(salt_bytes.len() + purpose.len());
    salted_salt.extend_from_slice(salt_bytes);
    salted_salt.extend_from_slice(purpose);

    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password, &salted_salt, PBKDF2_ITERATIONS, &mut out);
    Key(out)
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    B64.decode(value)
        .map_err(|_| CryptoError::InvalidInput(format!("{field} is not valid base64")))
}

/// PBKDF2-HMAC-SHA256, 100,000 iterations, 256-bit output. Pure function
/// of its inputs: two calls with the same arguments yield bit-identical
/// keys.
pub fn derive_key(password: &str, salt_b64: &str) -> Result<Key, CryptoError> {
    let salt = decode_b64("salt", salt_b64)?;
    Ok(pbkdf2_derive(password.as_bytes(), &salt, KEY_DERIVATION_PURPOSE))
}

/// Equivalent to `derive_key(strip_non_alphanumeric(recovery_key), salt)`.
/// The dash grouping in [`generate_recovery_key`] is presentation only.
pub fn derive_key_from_recovery(recovery_key: &str, salt_b64: &str) -> Result<Key, CryptoError> {
    derive_key(&strip_non_alphanumeric(recovery_key), salt_b64)
}

fn encrypt_with_nonce(plaintext: &[u8], key: &Key, nonce: &Nonce<aes_gcm::aes::cipher::consts::U12>) -> Result<Vec<u8>, CryptoError> {
    let aes_key = AesKey::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);
    cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::InvalidInput("encryption failed".to_string()))
}

/// AES-256-GCM with a fresh random 96-bit IV. `ct` includes the 128-bit
/// auth tag.
pub fn encrypt(plaintext: &str, key: &Key) -> Result<EncryptedPayload, CryptoError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ct = encrypt_with_nonce(plaintext.as_bytes(), key, &nonce)?;
    Ok(EncryptedPayload {
        v: 1,
        iv: B64.encode(nonce),
        ct: B64.encode(ct),
    })
}

/// Rejects `v != 1` with [`CryptoError::UnsupportedVersion`]. Any tag
/// mismatch, wrong key, or tampered bytes fails with
/// [`CryptoError::DecryptFailed`].
pub fn decrypt(payload: &EncryptedPayload, key: &Key) -> Result<String, CryptoError> {
    if !payload.is_supported_version() {
        return Err(CryptoError::UnsupportedVersion);
    }
    let iv = decode_b64("iv", &payload.iv)?;
    let ct = decode_b64("ct", &payload.ct)?;
    if iv.len() != 12 {
        return Err(CryptoError::InvalidInput("iv must be 12 bytes".to_string()));
    }
    let nonce = Nonce::from_slice(&iv);

    let aes_key = AesKey::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);
    let plaintext = cipher
        .decrypt(nonce, ct.as_ref())
        .map_err(|_| CryptoError::DecryptFailed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
}

pub fn encrypt_object<T: Serialize>(value: &T, key: &Key) -> Result<EncryptedPayload, CryptoError> {
    let json = serde_json::to_string(value)
        .map_err(|e| CryptoError::InvalidInput(format!("failed to serialize: {e}")))?;
    encrypt(&json, key)
}

pub fn decrypt_object<T: DeserializeOwned>(
    payload: &EncryptedPayload,
    key: &Key,
) -> Result<T, CryptoError> {
    let json = decrypt(payload, key)?;
    serde_json::from_str(&json).map_err(|_| CryptoError::DecryptFailed)
}

/// Deterministic verification IV: the first 12 bytes of
/// `SHA-256(salt || "verification")`.
fn deterministic_verification_nonce(salt_bytes: &[u8]) -> [u8; 12] {
    let mut hasher = Sha256::new();
    hasher.update(salt_bytes);
    hasher.update(VERIFICATION_CONTEXT);
    let digest = hasher.finalize();
    let mut iv = [0u8; 12];
    iv.copy_from_slice(&digest[..12]);
    iv
}

/// A deterministic value derived from `{key, salt}` that confirms a
/// password without holding any ciphertext to decrypt: encrypts a fixed
/// plaintext with a deterministic IV, then hashes the ciphertext.
pub fn verification_hash(key: &Key, salt_b64: &str) -> Result<String, CryptoError> {
    let salt = decode_b64("salt", salt_b64)?;
    let iv_bytes = deterministic_verification_nonce(&salt);
    let nonce = Nonce::from_slice(&iv_bytes);
    let ct = encrypt_with_nonce(VERIFICATION_PLAINTEXT, key, nonce)?;

    let mut hasher = Sha256::new();
    hasher.update(&ct);
    let digest = hasher.finalize();
    Ok(hex::encode(&digest[..16]))
}

/// Fail-safe on any error: returns `false` rather than propagating.
pub fn verify_password(password: &str, key_data: &KeyData) -> bool {
    let Ok(key) = derive_key(password, &key_data.salt) else {
        return false;
    };
    match verification_hash(&key, &key_data.salt) {
        Ok(hash) => hash == key_data.verification_hash,
        Err(_) => false,
    }
}

/// A short non-cryptographic checksum used only for manifest bookkeeping
/// ("did this session actually change?"), never as a security mechanism.
pub fn compute_checksum(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

/// Atomic decrypt-then-encrypt. Errors propagate; there is no partial
/// state to clean up because nothing is persisted by this function.
pub fn re_encrypt(
    payload: &EncryptedPayload,
    old_key: &Key,
    new_key: &Key,
) -> Result<EncryptedPayload, CryptoError> {
    let plaintext = decrypt(payload, old_key)?;
    encrypt(&plaintext, new_key)
}

/// Fresh salt, derived key, and fresh recovery key for a brand-new
/// install. The recovery key is returned here and nowhere else — it is
/// never persisted by this layer.
pub struct SetupResult {
    pub key_data: KeyData,
    pub recovery_key: String,
    pub key: Key,
}

pub fn setup_encryption(password: &str) -> Result<SetupResult, CryptoError> {
    let salt = generate_salt();
    let key = derive_key(password, &salt)?;
    let recovery_key = generate_recovery_key();
    let verification_hash = verification_hash(&key, &salt)?;
    Ok(SetupResult {
        key_data: KeyData {
            salt,
            verification_hash,
        },
        recovery_key,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = derive_key("correct horse battery staple", &generate_salt()).unwrap();
        let plaintext = "a secret session blob";
        let payload = encrypt(plaintext, &key).unwrap();
        assert_eq!(decrypt(&payload, &key).unwrap(), plaintext);
    }

    #[test]
    fn object_roundtrip_is_exact() {
        #[derive(Debug, Serialize, serde::Deserialize, PartialEq)]
        struct Value {
            a: u32,
            b: Vec<String>,
        }
        let key = derive_key("password", &generate_salt()).unwrap();
        let value = Value {
            a: 7,
            b: vec!["x".to_string(), "y".to_string()],
        };
        let payload = encrypt_object(&value, &key).unwrap();
        let back: Value = decrypt_object(&payload, &key).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn ivs_are_unique_across_many_encryptions() {
        let key = derive_key("password", &generate_salt()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let payload = encrypt("same plaintext", &key).unwrap();
            assert!(seen.insert(payload.iv), "IV collision observed");
        }
    }

    #[test]
    fn tampering_with_ciphertext_fails_decryption() {
        let key = derive_key("password", &generate_salt()).unwrap();
        let mut payload = encrypt("secret", &key).unwrap();
        let mut ct = B64.decode(&payload.ct).unwrap();
        ct[0] ^= 0x01;
        payload.ct = B64.encode(ct);
        assert_eq!(decrypt(&payload, &key), Err(CryptoError::DecryptFailed));
    }

    #[test]
    fn tampering_with_iv_fails_decryption() {
        let key = derive_key("password", &generate_salt()).unwrap();
        let mut payload = encrypt("secret", &key).unwrap();
        let mut iv = B64.decode(&payload.iv).unwrap();
        iv[0] ^= 0x01;
        payload.iv = B64.encode(iv);
        assert_eq!(decrypt(&payload, &key), Err(CryptoError::DecryptFailed));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let key = derive_key("password", &generate_salt()).unwrap();
        let mut payload = encrypt("secret", &key).unwrap();
        payload.v = 2;
        assert_eq!(decrypt(&payload, &key), Err(CryptoError::UnsupportedVersion));
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = generate_salt();
        let key1 = derive_key("hunter2", &salt).unwrap();
        let key2 = derive_key("hunter2", &salt).unwrap();
        assert_eq!(
            verification_hash(&key1, &salt).unwrap(),
            verification_hash(&key2, &salt).unwrap()
        );
    }

    #[test]
    fn recovery_key_derivation_matches_stripped_password_path() {
        let salt = generate_salt();
        let recovery_key = generate_recovery_key();
        let via_recovery = derive_key_from_recovery(&recovery_key, &salt).unwrap();
        let via_stripped = derive_key(&strip_non_alphanumeric(&recovery_key), &salt).unwrap();
        assert_eq!(
            verification_hash(&via_recovery, &salt).unwrap(),
            verification_hash(&via_stripped, &salt).unwrap()
        );
    }

    #[test]
    fn verify_password_round_trips_through_setup() {
        let setup = setup_encryption("correct horse battery staple").unwrap();
        assert!(verify_password(
            "correct horse battery staple",
            &setup.key_data
        ));
        assert!(!verify_password("wrong password", &setup.key_data));
    }

    #[test]
    fn verify_password_is_fail_safe_on_malformed_key_data() {
        let bogus = KeyData {
            salt: "not-base64!!".to_string(),
            verification_hash: "deadbeef".to_string(),
        };
        assert!(!verify_password("anything", &bogus));
    }

    #[test]
    fn setup_never_persists_recovery_key_in_key_data() {
        let setup = setup_encryption("password").unwrap();
        let json = serde_json::to_string(&setup.key_data).unwrap();
        assert!(!json.contains(&setup.recovery_key));
        assert!(!json.to_lowercase().contains("recoverykey"));
    }

    #[test]
    fn re_encrypt_is_atomic_decrypt_then_encrypt() {
        let salt = generate_salt();
        let old_key = derive_key("old", &salt).unwrap();
        let new_key = derive_key("new", &salt).unwrap();
        let payload = encrypt("migrate me", &old_key).unwrap();
        let migrated = re_encrypt(&payload, &old_key, &new_key).unwrap();
        assert_eq!(decrypt(&migrated, &new_key).unwrap(), "migrate me");
        assert!(decrypt(&migrated, &old_key).is_err());
    }

    #[test]
    fn checksum_is_short_and_stable() {
        let a = compute_checksum("hello world");
        let b = compute_checksum("hello world");
        let c = compute_checksum("hello worlds");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn legacy_random_iv_verification_hash_differs_from_deterministic_one() {
        // Simulates a pre-migration KeyData whose verificationHash was computed
        // from a random IV rather than the deterministic one; unlock.rs treats
        // any mismatch with the freshly computed deterministic hash as "legacy"
        // and rewrites it.
        let salt = generate_salt();
        let key = derive_key("password", &salt).unwrap();
        let legacy_hash = {
            let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
            let ct = encrypt_with_nonce(VERIFICATION_PLAINTEXT, &key, &nonce).unwrap();
            let mut hasher = Sha256::new();
            hasher.update(&ct);
            hex::encode(&hasher.finalize()[..16])
        };
        let deterministic_hash = verification_hash(&key, &salt).unwrap();
        assert_ne!(legacy_hash, deterministic_hash);
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn encrypt_decrypt_roundtrips_for_any_string_and_password(
            plaintext in ".*",
            password in ".*",
        ) {
            let key = derive_key(&password, &generate_salt()).unwrap();
            let payload = encrypt(&plaintext, &key).unwrap();
            prop_assert_eq!(decrypt(&payload, &key).unwrap(), plaintext);
        }

        #[test]
        fn object_roundtrip_is_exact_for_arbitrary_values(
            a in any::<u32>(),
            b in prop::collection::vec(".*", 0..8),
        ) {
            #[derive(Debug, Serialize, serde::Deserialize, PartialEq)]
            struct Value {
                a: u32,
                b: Vec<String>,
            }
            let key = derive_key("password", &generate_salt()).unwrap();
            let value = Value { a, b };
            let payload = encrypt_object(&value, &key).unwrap();
            let back: Value = decrypt_object(&payload, &key).unwrap();
            prop_assert_eq!(value, back);
        }

        #[test]
        fn kdf_is_deterministic_for_any_password(password in ".*") {
            let salt = generate_salt();
            let key1 = derive_key(&password, &salt).unwrap();
            let key2 = derive_key(&password, &salt).unwrap();
            prop_assert_eq!(
                verification_hash(&key1, &salt).unwrap(),
                verification_hash(&key2, &salt).unwrap()
            );
        }
    }
}
