//! HKDF implementations via the `hkdf` crate.

use ferrotls_crypto::{Error, Kdf, KdfAlgorithm, Result};
use hkdf::Hkdf;
use sha2::{Sha256, Sha384};

macro_rules! impl_hkdf {
    ($name:ident, $digest:ty, $alg:expr) => {
        pub(crate) struct $name;

        impl Kdf for $name {
            fn extract(&self, salt: Option<&[u8]>, ikm: &[u8]) -> Vec<u8> {
                let (prk, _) = Hkdf::<$digest>::extract(salt, ikm);
                prk.to_vec()
            }

            fn expand(&self, prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
                let hk = Hkdf::<$digest>::from_prk(prk)
                    .map_err(|_| Error::InvalidKeySize {
                        expected: $alg.output_size(),
                        actual: prk.len(),
                    })?;
                let mut okm = vec![0u8; length];
                hk.expand(info, &mut okm)
                    .map_err(|_| Error::Internal(format!("HKDF output length {} too long", length)))?;
                Ok(okm)
            }

            fn algorithm(&self) -> KdfAlgorithm {
                $alg
            }
        }
    };
}

impl_hkdf!(HkdfSha256Kdf, Sha256, KdfAlgorithm::HkdfSha256);
impl_hkdf!(HkdfSha384Kdf, Sha384, KdfAlgorithm::HkdfSha384);
