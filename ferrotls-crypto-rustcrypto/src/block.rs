//! AES-CBC block cipher implementations via the `cbc` crate.
//!
//! These operate on whole blocks only. MAC computation, padding and IV
//! handling are record-layer concerns and live in the protocol core.

use aes::{Aes128, Aes256};
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ferrotls_crypto::{BlockCipher, BlockCipherAlgorithm, Error, Result};

fn check_input(algorithm: BlockCipherAlgorithm, key: &[u8], iv: &[u8], data: &[u8]) -> Result<()> {
    if key.len() != algorithm.key_size() {
        return Err(Error::InvalidKeySize {
            expected: algorithm.key_size(),
            actual: key.len(),
        });
    }
    if iv.len() != algorithm.block_size() {
        return Err(Error::InvalidNonceSize {
            expected: algorithm.block_size(),
            actual: iv.len(),
        });
    }
    if data.is_empty() || data.len() % algorithm.block_size() != 0 {
        return Err(Error::InvalidBlockLength);
    }
    Ok(())
}

macro_rules! impl_cbc {
    ($name:ident, $aes:ty, $alg:expr) => {
        pub(crate) struct $name;

        impl BlockCipher for $name {
            fn encrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
                check_input($alg, key, iv, data)?;
                let enc = cbc::Encryptor::<$aes>::new_from_slices(key, iv)
                    .map_err(|_| Error::EncryptionFailed)?;
                Ok(enc.encrypt_padded_vec_mut::<NoPadding>(data))
            }

            fn decrypt(&self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
                check_input($alg, key, iv, data)?;
                let dec = cbc::Decryptor::<$aes>::new_from_slices(key, iv)
                    .map_err(|_| Error::DecryptionFailed)?;
                dec.decrypt_padded_vec_mut::<NoPadding>(data)
                    .map_err(|_| Error::DecryptionFailed)
            }

            fn algorithm(&self) -> BlockCipherAlgorithm {
                $alg
            }
        }
    };
}

impl_cbc!(Aes128CbcCipher, Aes128, BlockCipherAlgorithm::Aes128Cbc);
impl_cbc!(Aes256CbcCipher, Aes256, BlockCipherAlgorithm::Aes256Cbc);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbc_roundtrip() {
        let cipher = Aes128CbcCipher;
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let plaintext = [0x33u8; 48];
        let ct = cipher.encrypt(&key, &iv, &plaintext).unwrap();
        assert_eq!(ct.len(), plaintext.len());
        assert_ne!(&ct[..], &plaintext[..]);
        let pt = cipher.decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(&pt[..], &plaintext[..]);
    }

    #[test]
    fn test_cbc_rejects_partial_block() {
        let cipher = Aes128CbcCipher;
        let key = [0u8; 16];
        let iv = [0u8; 16];
        assert_eq!(
            cipher.encrypt(&key, &iv, &[0u8; 17]),
            Err(Error::InvalidBlockLength)
        );
    }

    #[test]
    fn test_cbc_iv_changes_ciphertext() {
        let cipher = Aes256CbcCipher;
        let key = [0x11u8; 32];
        let plaintext = [0x33u8; 16];
        let a = cipher.encrypt(&key, &[0u8; 16], &plaintext).unwrap();
        let b = cipher.encrypt(&key, &[1u8; 16], &plaintext).unwrap();
        assert_ne!(a, b);
    }
}
