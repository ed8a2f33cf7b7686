//! Raw CBC block cipher interface for legacy (TLS 1.0–1.2) suites.

use crate::Result;

/// CBC block cipher algorithms supported by FerroTLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCipherAlgorithm {
    /// AES-128 in CBC mode
    Aes128Cbc,
    /// AES-256 in CBC mode
    Aes256Cbc,
}

impl BlockCipherAlgorithm {
    /// Get the key size in bytes for this algorithm.
    pub const fn key_size(self) -> usize {
        match self {
            BlockCipherAlgorithm::Aes128Cbc => 16,
            BlockCipherAlgorithm::Aes256Cbc => 32,
        }
    }

    /// Get the cipher block size in bytes.
    pub const fn block_size(self) -> usize {
        16
    }

    /// Get the name of this algorithm as used in TLS.
    pub const fn name(self) -> &'static str {
        match self {
            BlockCipherAlgorithm::Aes128Cbc => "AES_128_CBC",
            BlockCipherAlgorithm::Aes256Cbc => "AES_256_CBC",
        }
    }
}

/// Raw CBC block cipher trait.
///
/// Operates on whole blocks only. TLS padding (the `padding_length`
/// repeated-byte scheme) is applied and validated by the record layer,
/// not here, so the record layer controls the failure signal.
pub trait BlockCipher: Send + Sync {
    /// Encrypt block-aligned data with the given key and IV.
    fn encrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt block-aligned data with the given key and IV.
    fn decrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Get the algorithm this cipher implements.
    fn algorithm(&self) -> BlockCipherAlgorithm;
}
