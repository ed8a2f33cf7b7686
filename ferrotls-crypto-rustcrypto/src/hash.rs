//! Hash implementations (MD5, SHA-1, SHA-2 family).

use ferrotls_crypto::{Hash, HashAlgorithm};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384};

macro_rules! impl_hash {
    ($name:ident, $inner:ty, $alg:expr) => {
        pub(crate) struct $name($inner);

        impl $name {
            pub(crate) fn new() -> Self {
                Self(<$inner>::new())
            }
        }

        impl Hash for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.0, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                self.0.finalize().to_vec()
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

impl_hash!(Md5Hash, Md5, HashAlgorithm::Md5);
impl_hash!(Sha1Hash, Sha1, HashAlgorithm::Sha1);
impl_hash!(Sha256Hash, Sha256, HashAlgorithm::Sha256);
impl_hash!(Sha384Hash, Sha384, HashAlgorithm::Sha384);

pub(crate) fn new_hash(algorithm: HashAlgorithm) -> Box<dyn Hash> {
    match algorithm {
        HashAlgorithm::Md5 => Box::new(Md5Hash::new()),
        HashAlgorithm::Sha1 => Box::new(Sha1Hash::new()),
        HashAlgorithm::Sha256 => Box::new(Sha256Hash::new()),
        HashAlgorithm::Sha384 => Box::new(Sha384Hash::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_empty() {
        let h = Box::new(Sha256Hash::new());
        let digest = h.finalize();
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_abc() {
        let mut h = Box::new(Sha256Hash::new());
        h.update(b"abc");
        assert_eq!(
            hex::encode(h.finalize()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_md5_abc() {
        let mut h = Box::new(Md5Hash::new());
        h.update(b"abc");
        assert_eq!(hex::encode(h.finalize()), "900150983cd24fb0d6963f7d28e17f72");
    }
}
