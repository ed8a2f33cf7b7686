//! RSA and ECDSA signatures plus RSA key transport via the `rsa` and
//! `p256` crates.
//!
//! Key encodings: RSA keys are PKCS#1 DER, P-256 signing keys are the
//! raw 32-byte scalar, P-256 verifying keys are SEC1 uncompressed
//! points. ECDSA signatures are ASN.1 DER as TLS carries them.

use ferrotls_crypto::{
    Error, KeyTransport, Result, Signature, SignatureScheme, SigningKey, VerifyingKey,
};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::signature::hazmat::{PrehashSigner, PrehashVerifier, RandomizedPrehashSigner};
use rsa::signature::SignatureEncoding;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

fn rsa_private(key: &SigningKey) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_der(key.as_bytes()).map_err(|_| Error::InvalidPrivateKey)
}

fn rsa_public(key: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(key).map_err(|_| Error::InvalidPublicKey)
}

pub(crate) struct RsaPkcs1Sha256Signature;

impl Signature for RsaPkcs1Sha256Signature {
    fn sign(&self, signing_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
        let key = rsa::pkcs1v15::SigningKey::<Sha256>::new(rsa_private(signing_key)?);
        let digest = Sha256::digest(message);
        let sig: rsa::pkcs1v15::Signature = key
            .sign_prehash(&digest)
            .map_err(|_| Error::Internal("RSA PKCS#1 signing failed".into()))?;
        Ok(sig.to_vec())
    }

    fn verify(&self, verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
        let key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(rsa_public(verifying_key.as_bytes())?);
        let sig = rsa::pkcs1v15::Signature::try_from(signature)
            .map_err(|_| Error::SignatureVerificationFailed)?;
        let digest = Sha256::digest(message);
        key.verify_prehash(&digest, &sig)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::RsaPkcs1Sha256
    }
}

pub(crate) struct RsaPssSha256Signature;

impl Signature for RsaPssSha256Signature {
    fn sign(&self, signing_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
        let key = rsa::pss::SigningKey::<Sha256>::new(rsa_private(signing_key)?);
        let digest = Sha256::digest(message);
        let sig: rsa::pss::Signature = key
            .sign_prehash_with_rng(&mut OsRng, &digest)
            .map_err(|_| Error::Internal("RSA-PSS signing failed".into()))?;
        Ok(sig.to_vec())
    }

    fn verify(&self, verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
        let key = rsa::pss::VerifyingKey::<Sha256>::new(rsa_public(verifying_key.as_bytes())?);
        let sig = rsa::pss::Signature::try_from(signature)
            .map_err(|_| Error::SignatureVerificationFailed)?;
        let digest = Sha256::digest(message);
        key.verify_prehash(&digest, &sig)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::RsaPssRsaeSha256
    }
}

pub(crate) struct EcdsaP256Sha256Signature;

impl Signature for EcdsaP256Sha256Signature {
    fn sign(&self, signing_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
        use p256::ecdsa::signature::Signer;
        let key = p256::ecdsa::SigningKey::from_slice(signing_key.as_bytes())
            .map_err(|_| Error::InvalidPrivateKey)?;
        let sig: p256::ecdsa::Signature = key.sign(message);
        Ok(sig.to_der().to_bytes().to_vec())
    }

    fn verify(&self, verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
        use p256::ecdsa::signature::Verifier;
        let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(verifying_key.as_bytes())
            .map_err(|_| Error::InvalidPublicKey)?;
        let sig = p256::ecdsa::Signature::from_der(signature)
            .map_err(|_| Error::SignatureVerificationFailed)?;
        key.verify(message, &sig)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::EcdsaSecp256r1Sha256
    }
}

pub(crate) struct RsaPkcs1KeyTransport;

impl KeyTransport for RsaPkcs1KeyTransport {
    fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        rsa_public(public_key)?
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|_| Error::EncryptionFailed)
    }

    fn decrypt(&self, private_key: &SigningKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
        rsa_private(private_key)?
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| Error::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};

    fn rsa_test_keys() -> (SigningKey, VerifyingKey) {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        (
            SigningKey::from_bytes(private.to_pkcs1_der().unwrap().as_bytes().to_vec()),
            VerifyingKey::from_bytes(public.to_pkcs1_der().unwrap().as_bytes().to_vec()),
        )
    }

    #[test]
    fn test_rsa_pkcs1_sign_verify() {
        let (signing, verifying) = rsa_test_keys();
        let scheme = RsaPkcs1Sha256Signature;
        let sig = scheme.sign(&signing, b"handshake transcript").unwrap();
        scheme.verify(&verifying, b"handshake transcript", &sig).unwrap();
        assert!(scheme.verify(&verifying, b"other message", &sig).is_err());
    }

    #[test]
    fn test_rsa_pss_sign_verify() {
        let (signing, verifying) = rsa_test_keys();
        let scheme = RsaPssSha256Signature;
        let sig = scheme.sign(&signing, b"handshake transcript").unwrap();
        scheme.verify(&verifying, b"handshake transcript", &sig).unwrap();
        assert!(scheme.verify(&verifying, b"other message", &sig).is_err());
    }

    #[test]
    fn test_ecdsa_p256_sign_verify() {
        use p256::elliptic_curve::sec1::ToEncodedPoint;
        let secret = p256::SecretKey::random(&mut OsRng);
        let signing = SigningKey::from_bytes(secret.to_bytes().to_vec());
        let verifying = VerifyingKey::from_bytes(
            secret.public_key().to_encoded_point(false).as_bytes().to_vec(),
        );

        let scheme = EcdsaP256Sha256Signature;
        let sig = scheme.sign(&signing, b"handshake transcript").unwrap();
        scheme.verify(&verifying, b"handshake transcript", &sig).unwrap();

        let mut bad = sig.clone();
        let last = bad.len() - 1;
        bad[last] ^= 1;
        assert!(scheme.verify(&verifying, b"handshake transcript", &bad).is_err());
    }

    #[test]
    fn test_rsa_key_transport_roundtrip() {
        let (signing, verifying) = rsa_test_keys();
        let transport = RsaPkcs1KeyTransport;
        let premaster = [0x42u8; 48];
        let ct = transport.encrypt(verifying.as_bytes(), &premaster).unwrap();
        assert_eq!(ct.len(), 256);
        let pt = transport.decrypt(&signing, &ct).unwrap();
        assert_eq!(&pt[..], &premaster[..]);
    }
}
