//! Cryptographic envelope.
//!
//! Symmetric layer: AES-256-CFB keyed by SHA-256 of a password, random IV
//! prefixed to the ciphertext, base64 output.
//! Asymmetric layer: RSA with OAEP/SHA-256 padding, base64 output.

use aes::Aes256;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cfb_mode::cipher::{AsyncStreamCipher, InvalidLength, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::Argon2 as ArgonConfig;

const KEY_LENGTH: usize = 32;
const IV_SIZE: usize = 16;
/// Default modulus size for user key pairs.
pub const DEFAULT_RSA_BITS: usize = 2048;
/// Smallest accepted modulus size.
pub const MIN_RSA_BITS: usize = 1024;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("base64 is not valid")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext length is {value} while at least {expected} is expected")]
    Length { value: usize, expected: usize },
    #[error("invalid key or iv length")]
    InvalidLength(#[from] InvalidLength),
    #[error("decrypted data is not utf8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Rsa(#[from] rsa::Error),
    #[error("public key encoding failed: {0}")]
    Pkcs1(#[from] rsa::pkcs1::Error),
    #[error("private key encoding failed: {0}")]
    Pkcs8(#[from] rsa::pkcs8::Error),
    #[error("argon2 error: {0}")]
    Argon2(String),
    #[error("invalid password")]
    InvalidPassword,
    #[error("key size is {value} bits while at least {} is expected", MIN_RSA_BITS)]
    KeyTooShort { value: usize },
}

/// Cryptographic manager.
pub struct Crypto {
    /// Cipher keyed with the process-wide secret.
    pub secret: SymmetricCipher,
    pub pwd: PasswordManager,
    /// Size of generated key pairs.
    pub rsa_bits: usize,
}

impl Crypto {
    /// Create a new [`Crypto`].
    pub fn new(
        config: Option<ArgonConfig>,
        secret_key: impl AsRef<[u8]>,
        rsa_bits: usize,
    ) -> Result<Self> {
        if rsa_bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyTooShort { value: rsa_bits });
        }

        let key = SymmetricKey::derive_from_password(secret_key);

        Ok(Self {
            secret: SymmetricCipher::new(key),
            pwd: PasswordManager::new(config)?,
            rsa_bits,
        })
    }
}

/// SymmetricKey holds a fixed-size key protected by Zeroizing.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LENGTH]>);

impl SymmetricKey {
    /// Derive a 256-bit key from the SHA-256 digest of a password.
    pub fn derive_from_password(password: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(password.as_ref());
        Self(Zeroizing::new(digest.into()))
    }

    fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// SymmetricCipher provides encrypt/decrypt operations with AES-256-CFB.
pub struct SymmetricCipher {
    key: SymmetricKey,
}

impl SymmetricCipher {
    /// Create a new [`SymmetricCipher`].
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }

    /// Create a [`SymmetricCipher`] keyed by `password`.
    pub fn from_password(password: impl AsRef<[u8]>) -> Self {
        Self::new(SymmetricKey::derive_from_password(password))
    }

    /// Encrypt data, returning `base64(iv || ciphertext)`.
    pub fn encrypt(&self, plaintext: impl AsRef<[u8]>) -> Result<String> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_ref().to_vec();
        Aes256CfbEnc::new_from_slices(self.key.as_slice(), &iv)?
            .encrypt(&mut buffer);

        let mut out = Vec::with_capacity(IV_SIZE + buffer.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&buffer);
        Ok(STANDARD.encode(out))
    }

    /// Decrypt `base64(iv || ciphertext)` into raw bytes.
    ///
    /// CFB carries no authentication: a wrong key yields garbage, not an
    /// error.
    pub fn decrypt(&self, data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let data = STANDARD.decode(data)?;
        if data.len() < IV_SIZE {
            return Err(CryptoError::Length {
                value: data.len(),
                expected: IV_SIZE,
            });
        }

        let (iv, cipher_text) = data.split_at(IV_SIZE);
        let mut buffer = cipher_text.to_vec();
        Aes256CfbDec::new_from_slices(self.key.as_slice(), iv)?
            .decrypt(&mut buffer);

        Ok(buffer)
    }

    /// Decrypt into an UTF-8 string.
    pub fn decrypt_to_string(&self, data: impl AsRef<[u8]>) -> Result<String> {
        Ok(String::from_utf8(self.decrypt(data)?)?)
    }
}

/// Encrypt `text` under a key derived from `password`.
pub fn encrypt(text: &str, password: &str) -> Result<String> {
    SymmetricCipher::from_password(password).encrypt(text)
}

/// Decrypt what [`encrypt`] produced with the same `password`.
pub fn decrypt(data: &str, password: &str) -> Result<String> {
    SymmetricCipher::from_password(password).decrypt_to_string(data)
}

/// RSA key pair of a user.
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl KeyPair {
    /// Generate a fresh key pair. CPU bound: run it off the async runtime.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_RSA_BITS {
            return Err(CryptoError::KeyTooShort { value: bits });
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, bits)?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(Self {
            public_key: PublicKey(public_key),
            private_key: PrivateKey(private_key),
        })
    }
}

/// Public half, stored in clear as base64 PKCS#1 DER.
#[derive(Clone, Debug, PartialEq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn encode(&self) -> Result<String> {
        let der = self.0.to_pkcs1_der()?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let der = STANDARD.decode(encoded)?;
        Ok(Self(RsaPublicKey::from_pkcs1_der(&der)?))
    }

    /// Encrypt with OAEP/SHA-256, returning base64.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher_text =
            self.0
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext.as_bytes())?;
        Ok(STANDARD.encode(cipher_text))
    }
}

/// Private half, only stored sealed under the user password.
#[derive(Clone, Debug)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Encrypt the PKCS#8 PEM encoding under `password`.
    pub fn seal(&self, password: &str) -> Result<String> {
        let pem = self.0.to_pkcs8_pem(LineEnding::LF)?;
        encrypt(&pem, password)
    }

    /// Recover a key sealed by [`PrivateKey::seal`].
    pub fn open(sealed: &str, password: &str) -> Result<Self> {
        let pem = Zeroizing::new(decrypt(sealed, password)?);
        Ok(Self(RsaPrivateKey::from_pkcs8_pem(&pem)?))
    }

    /// Decrypt base64 OAEP/SHA-256 ciphertext.
    pub fn decrypt(&self, cipher_text: &str) -> Result<String> {
        let data = STANDARD.decode(cipher_text)?;
        let plain = self.0.decrypt(Oaep::new::<Sha256>(), &data)?;
        Ok(String::from_utf8(plain)?)
    }
}

/// Password manager that uses Argon2id and PHC string format for hashing and
/// verification.
pub struct PasswordManager {
    params: Params,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    pub fn new(config: Option<ArgonConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let params = Params::new(
            config.memory_cost,
            config.iterations,
            config.parallelism,
            Some(config.hash_length),
        )
        .map_err(|err| CryptoError::Argon2(err.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Hash password using Argon2id.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_ref(), &salt)
            .map_err(|e| CryptoError::Argon2(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Verify password against a PHC.
    pub fn verify_password(
        &self,
        password: impl AsRef<[u8]>,
        phc_hash: &str,
    ) -> Result<()> {
        let parsed =
            PasswordHash::new(phc_hash).map_err(|_| CryptoError::InvalidPassword)?;

        self.argon2()
            .verify_password(password.as_ref(), &parsed)
            .map_err(|_| CryptoError::InvalidPassword)
    }
}
