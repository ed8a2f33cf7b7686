//! Hash function interface.

use crate::kdf::KdfAlgorithm;

/// Hash algorithms supported by FerroTLS.
///
/// MD5 and SHA-1 are present only for the TLS 1.0/1.1 PRF and legacy
/// HMAC cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5 (16 bytes output) - TLS 1.0/1.1 PRF only
    Md5,
    /// SHA-1 (20 bytes output) - legacy record MACs and TLS 1.0/1.1 PRF
    Sha1,
    /// SHA-256 (32 bytes output)
    Sha256,
    /// SHA-384 (48 bytes output)
    Sha384,
}

impl HashAlgorithm {
    /// Get the output size in bytes for this hash algorithm.
    pub const fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
        }
    }

    /// Get the name of this algorithm.
    pub const fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Sha384 => "SHA-384",
        }
    }

    /// Get the corresponding HKDF variant for this hash algorithm.
    ///
    /// Only the SHA-2 family is valid as a TLS 1.3 schedule hash.
    pub const fn to_kdf_algorithm(self) -> Option<KdfAlgorithm> {
        match self {
            HashAlgorithm::Sha256 => Some(KdfAlgorithm::HkdfSha256),
            HashAlgorithm::Sha384 => Some(KdfAlgorithm::HkdfSha384),
            HashAlgorithm::Md5 | HashAlgorithm::Sha1 => None,
        }
    }
}

/// Hash function trait.
///
/// Incremental hashing; `finalize` consumes the state.
pub trait Hash: Send {
    /// Update the hash state with more data.
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;

    /// Get the output size in bytes for this hash function.
    fn output_size(&self) -> usize;

    /// Get the algorithm this hash implements.
    fn algorithm(&self) -> HashAlgorithm;
}
