//! AES-GCM AEAD implementations via the `aes-gcm` crate.

use aes_gcm::aead::{Aead as _, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use ferrotls_crypto::{Aead, AeadAlgorithm, Error, Result};

fn check_sizes(algorithm: AeadAlgorithm, key: &[u8], nonce: &[u8]) -> Result<()> {
    if key.len() != algorithm.key_size() {
        return Err(Error::InvalidKeySize {
            expected: algorithm.key_size(),
            actual: key.len(),
        });
    }
    if nonce.len() != algorithm.nonce_size() {
        return Err(Error::InvalidNonceSize {
            expected: algorithm.nonce_size(),
            actual: nonce.len(),
        });
    }
    Ok(())
}

macro_rules! impl_gcm {
    ($name:ident, $cipher:ty, $alg:expr) => {
        pub(crate) struct $name;

        impl Aead for $name {
            fn seal(
                &self,
                key: &[u8],
                nonce: &[u8],
                aad: &[u8],
                plaintext: &[u8],
            ) -> Result<Vec<u8>> {
                check_sizes($alg, key, nonce)?;
                let cipher =
                    <$cipher>::new_from_slice(key).map_err(|_| Error::EncryptionFailed)?;
                cipher
                    .encrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: plaintext,
                            aad,
                        },
                    )
                    .map_err(|_| Error::EncryptionFailed)
            }

            fn open(
                &self,
                key: &[u8],
                nonce: &[u8],
                aad: &[u8],
                ciphertext: &[u8],
            ) -> Result<Vec<u8>> {
                check_sizes($alg, key, nonce)?;
                let cipher =
                    <$cipher>::new_from_slice(key).map_err(|_| Error::DecryptionFailed)?;
                cipher
                    .decrypt(
                        Nonce::from_slice(nonce),
                        Payload {
                            msg: ciphertext,
                            aad,
                        },
                    )
                    .map_err(|_| Error::AuthenticationFailed)
            }

            fn algorithm(&self) -> AeadAlgorithm {
                $alg
            }
        }
    };
}

impl_gcm!(Aes128GcmCipher, Aes128Gcm, AeadAlgorithm::Aes128Gcm);
impl_gcm!(Aes256GcmCipher, Aes256Gcm, AeadAlgorithm::Aes256Gcm);
