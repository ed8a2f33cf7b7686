//! Key Derivation Function (KDF) interface.

use crate::{HashAlgorithm, Result};

/// KDF algorithms supported by FerroTLS.
///
/// The TLS 1.2 PRF is not listed here; the protocol core builds it from
/// [`crate::Hmac`] directly since its structure (P_hash with the MD5/SHA-1
/// split for pre-1.2 versions) is protocol logic, not a reusable KDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfAlgorithm {
    /// HKDF with SHA-256 (TLS 1.3)
    HkdfSha256,
    /// HKDF with SHA-384 (TLS 1.3)
    HkdfSha384,
}

impl KdfAlgorithm {
    /// Get the underlying hash algorithm.
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            KdfAlgorithm::HkdfSha256 => HashAlgorithm::Sha256,
            KdfAlgorithm::HkdfSha384 => HashAlgorithm::Sha384,
        }
    }

    /// Get the name of this KDF algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            KdfAlgorithm::HkdfSha256 => "HKDF-SHA256",
            KdfAlgorithm::HkdfSha384 => "HKDF-SHA384",
        }
    }

    /// Output size of the underlying hash, which is also the PRK size.
    pub const fn output_size(self) -> usize {
        self.hash_algorithm().output_size()
    }
}

/// KDF trait (HKDF, RFC 5869).
pub trait Kdf: Send + Sync {
    /// HKDF-Extract: extract a pseudorandom key from input key material.
    /// `None` is the all-zero salt of the hash length.
    fn extract(&self, salt: Option<&[u8]>, ikm: &[u8]) -> Vec<u8>;

    /// HKDF-Expand: expand a pseudorandom key to the desired length.
    ///
    /// # Errors
    ///
    /// Fails if `length` exceeds 255 times the hash output size.
    fn expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>>;

    /// Get the algorithm this KDF implements.
    fn algorithm(&self) -> KdfAlgorithm;
}
