//! Hybrid cryptography combining classical and post-quantum algorithms
//!
//! Both legs are load-bearing:
//! - Encryption: an LWE-encapsulated 32-byte secret and an ephemeral X25519
//!   agreement are combined with keyed BLAKE2b into a ChaCha20-Poly1305 key
//! - Signatures: Dilithium + Ed25519, valid only if both verify
//!
//! Breaking one leg alone recovers nothing and forges nothing.
//!
//! | Leg | Classical | Quantum-safe |
//! |-----|-----------|--------------|
//! | Key agreement | X25519 | LWE |
//! | Signature | Ed25519 | Dilithium |

use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use qsafe_core::constants::{CHACHA20_NONCE_SIZE, ED25519_SIGNATURE_SIZE, KEY_SIZE, X25519_PUBLIC_KEY_SIZE};
use qsafe_core::{CryptoError, QSafeConfig, Result};
use qsafe_random::Csprng;
use qsafe_symmetric::aead;
use qsafe_symmetric::blake2b::blake2b;

use crate::dilithium::{Dilithium, DilithiumLevel};
use crate::lwe::{LweCrypto, LweParams, LwePrivateKey, LwePublicKey};

const KDF_DOMAIN: &[u8] = b"qsafe/hybrid/kem";

// ============================================================================
// Hybrid Signature
// ============================================================================

/// Hybrid signature combining Dilithium and Ed25519
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridSignature {
    /// Dilithium signature
    #[serde(with = "serde_bytes")]
    pub dilithium_sig: Vec<u8>,

    /// Ed25519 signature (64 bytes)
    #[serde(with = "serde_bytes")]
    pub ed25519_sig: Vec<u8>,
}

impl HybridSignature {
    /// Total signature size in bytes
    pub fn size(&self) -> usize {
        self.dilithium_sig.len() + self.ed25519_sig.len()
    }

    /// Both legs present with plausible sizes
    pub fn is_valid_structure(&self) -> bool {
        self.ed25519_sig.len() == ED25519_SIGNATURE_SIZE
            && DilithiumLevel::ALL
                .iter()
                .any(|level| level.signature_size() == self.dilithium_sig.len())
    }
}

// ============================================================================
// Hybrid Public Key
// ============================================================================

/// Hybrid public key bundle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridPublicKey {
    /// X25519 public key
    pub x25519: [u8; 32],

    /// Ed25519 verifying key
    pub ed25519: [u8; 32],

    /// Serialized LWE public key
    #[serde(with = "serde_bytes")]
    pub lwe: Vec<u8>,

    /// Serialized Dilithium public key (its length identifies the level)
    #[serde(with = "serde_bytes")]
    pub dilithium: Vec<u8>,
}

impl HybridPublicKey {
    /// `x25519 ‖ ed25519 ‖ le32 len ‖ lwe ‖ le32 len ‖ dilithium`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(72 + self.lwe.len() + self.dilithium.len());
        bytes.extend_from_slice(&self.x25519);
        bytes.extend_from_slice(&self.ed25519);
        bytes.extend_from_slice(&(self.lwe.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.lwe);
        bytes.extend_from_slice(&(self.dilithium.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.dilithium);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, |msg| CryptoError::InvalidKeyFormat(msg.to_string()));
        let x25519 = reader.array::<32>()?;
        let ed25519 = reader.array::<32>()?;
        let lwe = reader.prefixed()?.to_vec();
        let dilithium = reader.prefixed()?.to_vec();
        reader.finish()?;
        Ok(Self {
            x25519,
            ed25519,
            lwe,
            dilithium,
        })
    }

    /// Keyed-free BLAKE2b fingerprint of the whole bundle
    pub fn fingerprint(&self) -> Result<[u8; 32]> {
        let digest = blake2b(&self.to_bytes(), 32, None)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Ok(out)
    }
}

// ============================================================================
// Hybrid Secret Key
// ============================================================================

/// Hybrid secret key bundle (zeroized on drop)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HybridSecretKey {
    x25519: [u8; 32],
    ed25519: [u8; 32],
    lwe: Vec<u8>,
    dilithium: Vec<u8>,
}

impl HybridSecretKey {
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(72 + self.lwe.len() + self.dilithium.len()));
        bytes.extend_from_slice(&self.x25519);
        bytes.extend_from_slice(&self.ed25519);
        bytes.extend_from_slice(&(self.lwe.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.lwe);
        bytes.extend_from_slice(&(self.dilithium.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.dilithium);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, |msg| CryptoError::InvalidKeyFormat(msg.to_string()));
        let x25519 = reader.array::<32>()?;
        let ed25519 = reader.array::<32>()?;
        let lwe = reader.prefixed()?.to_vec();
        let dilithium = reader.prefixed()?.to_vec();
        reader.finish()?;
        Ok(Self {
            x25519,
            ed25519,
            lwe,
            dilithium,
        })
    }
}

impl std::fmt::Debug for HybridSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSecretKey").finish_non_exhaustive()
    }
}

/// Freshly generated hybrid key material
#[derive(Clone, Debug)]
pub struct HybridKeyPair {
    pub public: HybridPublicKey,
    pub secret: HybridSecretKey,
}

// ============================================================================
// Hybrid Ciphertext
// ============================================================================

/// Output of [`HybridCrypto::encrypt`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridCiphertext {
    /// Ephemeral X25519 public key
    pub x25519_ephemeral: [u8; 32],

    /// AEAD nonce
    pub nonce: [u8; 12],

    /// LWE encapsulation of the 32-byte secret
    #[serde(with = "serde_bytes")]
    pub lwe_ciphertext: Vec<u8>,

    /// `ciphertext ‖ tag`
    #[serde(with = "serde_bytes")]
    pub sealed: Vec<u8>,
}

impl HybridCiphertext {
    /// `ephemeral ‖ nonce ‖ le32 len ‖ lwe ciphertext ‖ sealed`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(48 + self.lwe_ciphertext.len() + self.sealed.len());
        bytes.extend_from_slice(&self.x25519_ephemeral);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&(self.lwe_ciphertext.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.lwe_ciphertext);
        bytes.extend_from_slice(&self.sealed);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes, |msg| CryptoError::InvalidInput(msg.to_string()));
        let x25519_ephemeral = reader.array::<32>()?;
        let nonce = reader.array::<12>()?;
        let lwe_ciphertext = reader.prefixed()?.to_vec();
        let sealed = reader.rest().to_vec();
        Ok(Self {
            x25519_ephemeral,
            nonce,
            lwe_ciphertext,
            sealed,
        })
    }

    pub fn size(&self) -> usize {
        X25519_PUBLIC_KEY_SIZE + CHACHA20_NONCE_SIZE + 4 + self.lwe_ciphertext.len() + self.sealed.len()
    }
}

// ============================================================================
// Hybrid Crypto
// ============================================================================

/// Composer for the hybrid encryption and signature legs
#[derive(Clone, Debug)]
pub struct HybridCrypto {
    lwe: LweCrypto,
    dilithium: Dilithium,
}

impl HybridCrypto {
    pub fn new(lwe_params: LweParams, level: DilithiumLevel) -> Result<Self> {
        Ok(Self {
            lwe: LweCrypto::new(lwe_params)?,
            dilithium: Dilithium::new(level),
        })
    }

    pub fn from_config(config: &QSafeConfig) -> Result<Self> {
        Ok(Self {
            lwe: LweCrypto::new(LweParams::from_config(&config.lwe)?)?,
            dilithium: Dilithium::from_config(&config.dilithium)?,
        })
    }

    pub fn lwe(&self) -> &LweCrypto {
        &self.lwe
    }

    pub fn dilithium(&self) -> &Dilithium {
        &self.dilithium
    }

    /// Independent LWE, Dilithium, X25519 and Ed25519 key pairs
    pub fn generate_key_pair(&self, rng: &Csprng) -> Result<HybridKeyPair> {
        let lwe = self.lwe.generate_key_pair(rng)?;
        let dilithium = self.dilithium.generate_key_pair(rng)?;

        let x25519_secret = StaticSecret::from(rng.random_array::<32>()?);
        let x25519_public = X25519PublicKey::from(&x25519_secret).to_bytes();

        let mut ed25519_bytes = rng.random_array::<32>()?;
        let ed25519_key = SigningKey::from_bytes(&ed25519_bytes);
        let ed25519_public = ed25519_key.verifying_key().to_bytes();

        let secret = HybridSecretKey {
            x25519: x25519_secret.to_bytes(),
            ed25519: ed25519_bytes,
            lwe: lwe.private.to_bytes(),
            dilithium: dilithium.private_key.to_vec(),
        };
        ed25519_bytes.zeroize();

        tracing::debug!(
            lwe_n = self.lwe.params().n,
            dilithium = %self.dilithium.level(),
            "generated hybrid key pair"
        );

        Ok(HybridKeyPair {
            public: HybridPublicKey {
                x25519: x25519_public,
                ed25519: ed25519_public,
                lwe: lwe.public.to_bytes(),
                dilithium: dilithium.public_key,
            },
            secret,
        })
    }

    /// Encrypt to both legs of `public_key`
    pub fn encrypt(&self, plaintext: &[u8], public_key: &HybridPublicKey, rng: &Csprng) -> Result<HybridCiphertext> {
        let lwe_public = LwePublicKey::from_bytes(&public_key.lwe, self.lwe.params())?;

        // Quantum-safe leg
        let lwe_secret = Zeroizing::new(rng.random_array::<32>()?);
        let lwe_ciphertext = self.lwe.encrypt(lwe_secret.as_slice(), &lwe_public, rng)?;

        // Classical leg
        let ephemeral = StaticSecret::from(rng.random_array::<32>()?);
        let x25519_ephemeral = X25519PublicKey::from(&ephemeral).to_bytes();
        let shared = ephemeral.diffie_hellman(&X25519PublicKey::from(public_key.x25519));
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidKeyFormat(
                "X25519 public key is a low-order point".to_string(),
            ));
        }

        let key = combine_secrets(lwe_secret.as_slice(), shared.as_bytes(), &x25519_ephemeral, &public_key.x25519)?;
        let nonce = rng.random_array::<12>()?;
        let (mut sealed, tag) = aead::encrypt(plaintext, key.as_slice(), &nonce, &x25519_ephemeral)?;
        sealed.extend_from_slice(&tag);

        Ok(HybridCiphertext {
            x25519_ephemeral,
            nonce,
            lwe_ciphertext,
            sealed,
        })
    }

    /// Decrypt; `Ok(None)` when either leg fails to authenticate
    pub fn decrypt(&self, ciphertext: &HybridCiphertext, secret_key: &HybridSecretKey) -> Result<Option<Vec<u8>>> {
        let lwe_private = LwePrivateKey::from_bytes(&secret_key.lwe, self.lwe.params())?;
        if ciphertext.sealed.len() < aead_tag_size() {
            return Err(CryptoError::InvalidInput("sealed payload shorter than a tag".to_string()));
        }

        let lwe_secret = match self.lwe.decrypt(&ciphertext.lwe_ciphertext, &lwe_private) {
            Ok(secret) => Zeroizing::new(secret),
            Err(CryptoError::DecryptionFailed(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if lwe_secret.len() != KEY_SIZE {
            return Err(CryptoError::InvalidInput(format!(
                "encapsulated secret must be {} bytes, got {}",
                KEY_SIZE,
                lwe_secret.len()
            )));
        }

        let own = StaticSecret::from(secret_key.x25519);
        let own_public = X25519PublicKey::from(&own).to_bytes();
        let shared = own.diffie_hellman(&X25519PublicKey::from(ciphertext.x25519_ephemeral));
        if !shared.was_contributory() {
            return Ok(None);
        }

        let key = combine_secrets(&lwe_secret, shared.as_bytes(), &ciphertext.x25519_ephemeral, &own_public)?;
        let (body, tag) = ciphertext.sealed.split_at(ciphertext.sealed.len() - aead_tag_size());
        aead::decrypt(body, tag, key.as_slice(), &ciphertext.nonce, &ciphertext.x25519_ephemeral)
    }

    /// Sign with both legs
    pub fn sign(&self, message: &[u8], secret_key: &HybridSecretKey, rng: &Csprng) -> Result<HybridSignature> {
        let dilithium_sig = self.dilithium.sign(message, &secret_key.dilithium, rng)?;
        let ed25519_sig = SigningKey::from_bytes(&secret_key.ed25519).sign(message).to_bytes().to_vec();
        Ok(HybridSignature {
            dilithium_sig,
            ed25519_sig,
        })
    }

    /// True only if both the Dilithium and the Ed25519 signature verify
    pub fn verify(&self, message: &[u8], signature: &HybridSignature, public_key: &HybridPublicKey) -> bool {
        let dilithium_ok = self
            .dilithium
            .verify(message, &signature.dilithium_sig, &public_key.dilithium);
        let ed25519_ok = verify_ed25519(&public_key.ed25519, message, &signature.ed25519_sig);
        dilithium_ok & ed25519_ok
    }
}

fn verify_ed25519(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    verifying_key
        .verify(message, &Ed25519Signature::from_bytes(&sig_bytes))
        .is_ok()
}

/// `BLAKE2b-256` keyed by the LWE secret over the X25519 transcript
fn combine_secrets(
    lwe_secret: &[u8],
    x25519_shared: &[u8; 32],
    ephemeral: &[u8; 32],
    recipient: &[u8; 32],
) -> Result<Zeroizing<Vec<u8>>> {
    let mut transcript = Zeroizing::new(Vec::with_capacity(KDF_DOMAIN.len() + 96));
    transcript.extend_from_slice(KDF_DOMAIN);
    transcript.extend_from_slice(x25519_shared);
    transcript.extend_from_slice(ephemeral);
    transcript.extend_from_slice(recipient);
    Ok(Zeroizing::new(blake2b(&transcript, KEY_SIZE, Some(lwe_secret))?))
}

fn aead_tag_size() -> usize {
    qsafe_core::constants::TAG_SIZE
}

/// Bounds-checked cursor over length-prefixed layouts
struct Reader<'a, F: Fn(&str) -> CryptoError> {
    bytes: &'a [u8],
    pos: usize,
    error: F,
}

impl<'a, F: Fn(&str) -> CryptoError> Reader<'a, F> {
    fn new(bytes: &'a [u8], error: F) -> Self {
        Self { bytes, pos: 0, error }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| (self.error)("truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn prefixed(&mut self) -> Result<&'a [u8]> {
        let len = u32::from_le_bytes(self.array::<4>()?) as usize;
        self.take(len)
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        slice
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err((self.error)("trailing bytes"))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Csprng, HybridCrypto) {
        let (rng, _) = Csprng::with_defaults().unwrap();
        let hybrid = HybridCrypto::new(LweParams::new(64).unwrap(), DilithiumLevel::Two).unwrap();
        (rng, hybrid)
    }

    #[test]
    fn test_generate_keypair() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();

        assert_eq!(keys.public.lwe.len(), hybrid.lwe().params().public_key_size());
        assert_eq!(keys.public.dilithium.len(), DilithiumLevel::Two.public_key_size());
        assert_ne!(keys.public.x25519, [0u8; 32]);
        assert_ne!(keys.public.ed25519, [0u8; 32]);
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();

        let ciphertext = hybrid.encrypt(b"defense in depth", &keys.public, &rng).unwrap();
        assert_eq!(
            hybrid.decrypt(&ciphertext, &keys.secret).unwrap(),
            Some(b"defense in depth".to_vec())
        );
    }

    #[test]
    fn test_wrong_recipient() {
        let (rng, hybrid) = setup();
        let alice = hybrid.generate_key_pair(&rng).unwrap();
        let bob = hybrid.generate_key_pair(&rng).unwrap();

        let ciphertext = hybrid.encrypt(b"for alice", &alice.public, &rng).unwrap();
        assert_eq!(hybrid.decrypt(&ciphertext, &bob.secret).unwrap(), None);
    }

    #[test]
    fn test_classical_leg_is_load_bearing() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();
        let mut ciphertext = hybrid.encrypt(b"payload", &keys.public, &rng).unwrap();

        // Valid LWE leg, swapped ephemeral key
        let other = StaticSecret::from([7u8; 32]);
        ciphertext.x25519_ephemeral = X25519PublicKey::from(&other).to_bytes();
        assert_eq!(hybrid.decrypt(&ciphertext, &keys.secret).unwrap(), None);
    }

    #[test]
    fn test_sign_and_verify() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();

        let signature = hybrid.sign(b"hello hybrid", &keys.secret, &rng).unwrap();
        assert!(signature.is_valid_structure());
        assert_eq!(signature.ed25519_sig.len(), 64);
        assert!(hybrid.verify(b"hello hybrid", &signature, &keys.public));
        assert!(!hybrid.verify(b"hello hybrie", &signature, &keys.public));
    }

    #[test]
    fn test_either_leg_breaks_signature() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();
        let signature = hybrid.sign(b"msg", &keys.secret, &rng).unwrap();

        let mut bad_ed = signature.clone();
        bad_ed.ed25519_sig[0] ^= 0xff;
        assert!(!hybrid.verify(b"msg", &bad_ed, &keys.public));

        let mut bad_pq = signature.clone();
        bad_pq.dilithium_sig[1500] ^= 0x01;
        assert!(!hybrid.verify(b"msg", &bad_pq, &keys.public));

        let mut missing_pq = signature;
        missing_pq.dilithium_sig.clear();
        assert!(!missing_pq.is_valid_structure());
        assert!(!hybrid.verify(b"msg", &missing_pq, &keys.public));
    }

    #[test]
    fn test_public_key_serialization() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();

        let bytes = keys.public.to_bytes();
        let restored = HybridPublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(keys.public, restored);
        assert_eq!(keys.public.fingerprint().unwrap(), restored.fingerprint().unwrap());

        assert!(matches!(
            HybridPublicKey::from_bytes(&bytes[..bytes.len() - 1]),
            Err(CryptoError::InvalidKeyFormat(_))
        ));
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(HybridPublicKey::from_bytes(&trailing).is_err());
    }

    #[test]
    fn test_secret_key_serialization() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();

        let restored = HybridSecretKey::from_bytes(&keys.secret.to_bytes()).unwrap();
        let ciphertext = hybrid.encrypt(b"persisted", &keys.public, &rng).unwrap();
        assert_eq!(
            hybrid.decrypt(&ciphertext, &restored).unwrap(),
            Some(b"persisted".to_vec())
        );
    }

    #[test]
    fn test_ciphertext_serialization() {
        let (rng, hybrid) = setup();
        let keys = hybrid.generate_key_pair(&rng).unwrap();
        let ciphertext = hybrid.encrypt(b"wire", &keys.public, &rng).unwrap();

        let bytes = ciphertext.to_bytes();
        assert_eq!(bytes.len(), ciphertext.size());
        assert_eq!(HybridCiphertext::from_bytes(&bytes).unwrap(), ciphertext);
        assert!(matches!(
            HybridCiphertext::from_bytes(&bytes[..40]),
            Err(CryptoError::InvalidInput(_))
        ));
    }
}
