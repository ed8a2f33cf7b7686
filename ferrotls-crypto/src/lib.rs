//! # FerroTLS Cryptographic Provider Interface
//!
//! This crate defines the cryptographic abstraction layer for FerroTLS.
//! The protocol core never touches a concrete cipher implementation; it
//! talks to a [`CryptoProvider`] which hands out trait objects for every
//! primitive the record layer and handshake need.
//!
//! ## Architecture
//!
//! ```text
//! CryptoProvider (main trait)
//! ├── Aead        (AES-GCM record protection)
//! ├── BlockCipher (AES-CBC for TLS 1.0–1.2 block suites)
//! ├── Hash        (MD5, SHA-1, SHA-256, SHA-384)
//! ├── Hmac        (record MACs, PRF, Finished verification)
//! ├── Kdf         (HKDF extract/expand for the TLS 1.3 schedule)
//! ├── KeyExchange (X25519, P-256, ffdhe2048)
//! ├── Signature   (RSA PKCS#1/PSS, ECDSA P-256)
//! ├── KeyTransport(RSA premaster-secret wrapping)
//! └── Random      (CSPRNG)
//! ```
//!
//! MD5 and SHA-1 exist solely because the TLS 1.0/1.1 PRF and legacy
//! HMAC suites require them; nothing else may use them.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unused_qualifications,
    missing_debug_implementations
)]

pub mod aead;
pub mod block;
pub mod error;
pub mod hash;
pub mod hmac;
pub mod kdf;
pub mod key_exchange;
pub mod random;
pub mod signature;

pub use aead::{Aead, AeadAlgorithm};
pub use block::{BlockCipher, BlockCipherAlgorithm};
pub use error::{Error, Result};
pub use hash::{Hash, HashAlgorithm};
pub use hmac::Hmac;
pub use kdf::{Kdf, KdfAlgorithm};
pub use key_exchange::{
    KeyExchange, KeyExchangeAlgorithm, PrivateKey, PublicKey, SharedSecret, FFDHE2048_PRIME,
};
pub use random::Random;
pub use signature::{KeyTransport, Signature, SignatureScheme, SigningKey, VerifyingKey};

/// The main cryptographic provider trait.
///
/// Implementations hand out primitive instances on demand. The trait is
/// object-safe so the protocol core can hold a `&dyn CryptoProvider`
/// and stay generic over backends.
///
/// All implementations must be `Send + Sync`; a single provider is
/// shared by every connection a server accepts.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Create a new instance of the crypto provider.
    fn new() -> Self
    where
        Self: Sized;

    /// Get an AEAD cipher instance.
    fn aead(&self, algorithm: AeadAlgorithm) -> Result<Box<dyn Aead>>;

    /// Get a raw CBC block cipher instance.
    ///
    /// The caller is responsible for TLS padding; the cipher operates on
    /// whole blocks only.
    fn block_cipher(&self, algorithm: BlockCipherAlgorithm) -> Result<Box<dyn BlockCipher>>;

    /// Get a hash function instance.
    fn hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hash>>;

    /// Get an HMAC instance keyed with `key`.
    fn hmac(&self, algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>>;

    /// Get a KDF (HKDF) instance.
    fn kdf(&self, algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>>;

    /// Get a key exchange instance.
    fn key_exchange(&self, algorithm: KeyExchangeAlgorithm) -> Result<Box<dyn KeyExchange>>;

    /// Get a signature scheme instance.
    fn signature(&self, scheme: SignatureScheme) -> Result<Box<dyn Signature>>;

    /// Get the RSA key-transport primitive (TLS RSA key exchange).
    fn key_transport(&self) -> Result<Box<dyn KeyTransport>>;

    /// Get the random number generator.
    fn random(&self) -> &dyn Random;

    /// Check if the provider supports a specific key exchange algorithm.
    fn supports_key_exchange(&self, algorithm: KeyExchangeAlgorithm) -> bool {
        self.key_exchange(algorithm).is_ok()
    }

    /// Check if the provider supports a specific signature scheme.
    fn supports_signature(&self, scheme: SignatureScheme) -> bool {
        self.signature(scheme).is_ok()
    }
}
