//! # RustCrypto provider for FerroTLS
//!
//! Implements the [`ferrotls_crypto`] provider interface on top of the
//! RustCrypto crates (`sha2`, `hmac`, `hkdf`, `aes-gcm`, `cbc`, `rsa`,
//! `p256`, `x25519-dalek`).

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

mod aead;
mod block;
mod hash;
mod hmac_impl;
mod kdf;
mod kex;
mod random;
mod signature;

use ferrotls_crypto::{
    Aead, AeadAlgorithm, BlockCipher, BlockCipherAlgorithm, CryptoProvider, Hash, HashAlgorithm,
    Hmac, Kdf, KdfAlgorithm, KeyExchange, KeyExchangeAlgorithm, KeyTransport, Random, Result,
    Signature, SignatureScheme,
};

pub use random::SystemRandom;

/// Crypto provider backed by the RustCrypto ecosystem.
#[derive(Debug, Default)]
pub struct RustCryptoProvider {
    random: SystemRandom,
}

impl CryptoProvider for RustCryptoProvider {
    fn new() -> Self {
        Self {
            random: SystemRandom,
        }
    }

    fn aead(&self, algorithm: AeadAlgorithm) -> Result<Box<dyn Aead>> {
        Ok(match algorithm {
            AeadAlgorithm::Aes128Gcm => Box::new(aead::Aes128GcmCipher),
            AeadAlgorithm::Aes256Gcm => Box::new(aead::Aes256GcmCipher),
        })
    }

    fn block_cipher(&self, algorithm: BlockCipherAlgorithm) -> Result<Box<dyn BlockCipher>> {
        Ok(match algorithm {
            BlockCipherAlgorithm::Aes128Cbc => Box::new(block::Aes128CbcCipher),
            BlockCipherAlgorithm::Aes256Cbc => Box::new(block::Aes256CbcCipher),
        })
    }

    fn hash(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hash>> {
        Ok(hash::new_hash(algorithm))
    }

    fn hmac(&self, algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
        hmac_impl::new_hmac(algorithm, key)
    }

    fn kdf(&self, algorithm: KdfAlgorithm) -> Result<Box<dyn Kdf>> {
        Ok(match algorithm {
            KdfAlgorithm::HkdfSha256 => Box::new(kdf::HkdfSha256Kdf),
            KdfAlgorithm::HkdfSha384 => Box::new(kdf::HkdfSha384Kdf),
        })
    }

    fn key_exchange(&self, algorithm: KeyExchangeAlgorithm) -> Result<Box<dyn KeyExchange>> {
        Ok(match algorithm {
            KeyExchangeAlgorithm::X25519 => Box::new(kex::X25519KeyExchange),
            KeyExchangeAlgorithm::Secp256r1 => Box::new(kex::P256KeyExchange),
            KeyExchangeAlgorithm::Ffdhe2048 => Box::new(kex::Ffdhe2048KeyExchange),
        })
    }

    fn signature(&self, scheme: SignatureScheme) -> Result<Box<dyn Signature>> {
        Ok(match scheme {
            SignatureScheme::RsaPkcs1Sha256 => Box::new(signature::RsaPkcs1Sha256Signature),
            SignatureScheme::RsaPssRsaeSha256 => Box::new(signature::RsaPssSha256Signature),
            SignatureScheme::EcdsaSecp256r1Sha256 => Box::new(signature::EcdsaP256Sha256Signature),
        })
    }

    fn key_transport(&self) -> Result<Box<dyn KeyTransport>> {
        Ok(Box::new(signature::RsaPkcs1KeyTransport))
    }

    fn random(&self) -> &dyn Random {
        &self.random
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_supports_core_algorithms() {
        let provider = RustCryptoProvider::new();
        assert!(provider.aead(AeadAlgorithm::Aes128Gcm).is_ok());
        assert!(provider.block_cipher(BlockCipherAlgorithm::Aes128Cbc).is_ok());
        assert!(provider.hash(HashAlgorithm::Sha256).is_ok());
        assert!(provider.kdf(KdfAlgorithm::HkdfSha256).is_ok());
        assert!(provider.supports_key_exchange(KeyExchangeAlgorithm::X25519));
        assert!(provider.supports_signature(SignatureScheme::EcdsaSecp256r1Sha256));
    }

    #[test]
    fn test_random_fills() {
        let provider = RustCryptoProvider::new();
        let a = provider.random().generate(32).unwrap();
        let b = provider.random().generate(32).unwrap();
        assert_ne!(a, b);
    }
}
