//! HMAC implementations via the `hmac` crate.

use ferrotls_crypto::{HashAlgorithm, Hmac, Result};
use hmac::{Hmac as HmacCore, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

macro_rules! impl_hmac {
    ($name:ident, $digest:ty, $alg:expr) => {
        pub(crate) struct $name(HmacCore<$digest>);

        impl $name {
            pub(crate) fn new(key: &[u8]) -> Result<Self> {
                // HMAC accepts any key length
                let mac = <HmacCore<$digest> as Mac>::new_from_slice(key)
                    .map_err(|_| ferrotls_crypto::Error::InvalidPrivateKey)?;
                Ok(Self(mac))
            }
        }

        impl Hmac for $name {
            fn update(&mut self, data: &[u8]) {
                Mac::update(&mut self.0, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                self.0.finalize().into_bytes().to_vec()
            }

            fn output_size(&self) -> usize {
                $alg.output_size()
            }

            fn algorithm(&self) -> HashAlgorithm {
                $alg
            }
        }
    };
}

impl_hmac!(HmacMd5, Md5, HashAlgorithm::Md5);
impl_hmac!(HmacSha1, Sha1, HashAlgorithm::Sha1);
impl_hmac!(HmacSha256, Sha256, HashAlgorithm::Sha256);
impl_hmac!(HmacSha384, Sha384, HashAlgorithm::Sha384);

pub(crate) fn new_hmac(algorithm: HashAlgorithm, key: &[u8]) -> Result<Box<dyn Hmac>> {
    Ok(match algorithm {
        HashAlgorithm::Md5 => Box::new(HmacMd5::new(key)?),
        HashAlgorithm::Sha1 => Box::new(HmacSha1::new(key)?),
        HashAlgorithm::Sha256 => Box::new(HmacSha256::new(key)?),
        HashAlgorithm::Sha384 => Box::new(HmacSha384::new(key)?),
    })
}
