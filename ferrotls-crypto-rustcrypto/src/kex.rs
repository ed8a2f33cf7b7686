//! Ephemeral key exchange implementations.
//!
//! X25519 via `x25519-dalek`, P-256 ECDH via `p256`, and the RFC 7919
//! ffdhe2048 group via `num-bigint` modular exponentiation.

use ferrotls_crypto::{
    Error, KeyExchange, KeyExchangeAlgorithm, PrivateKey, PublicKey, Result, SharedSecret,
    FFDHE2048_PRIME,
};
use num_bigint::BigUint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey as XPublicKey, StaticSecret};

pub(crate) struct X25519KeyExchange;

impl KeyExchange for X25519KeyExchange {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = XPublicKey::from(&secret);
        Ok((
            PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            PublicKey::from_bytes(public.as_bytes().to_vec()),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let secret_bytes: [u8; 32] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| Error::InvalidPrivateKey)?;
        let peer_bytes: [u8; 32] = peer_public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey)?;
        let secret = StaticSecret::from(secret_bytes);
        let shared = secret.diffie_hellman(&XPublicKey::from(peer_bytes));
        // All-zero output means the peer sent a low-order point
        if shared.as_bytes().iter().all(|&b| b == 0) {
            return Err(Error::KeyExchangeFailed);
        }
        Ok(SharedSecret::from_bytes(shared.as_bytes().to_vec()))
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::X25519
    }
}

pub(crate) struct P256KeyExchange;

impl KeyExchange for P256KeyExchange {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        let secret = p256::SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_encoded_point(false);
        Ok((
            PrivateKey::from_bytes(secret.to_bytes().to_vec()),
            PublicKey::from_bytes(public.as_bytes().to_vec()),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        let secret = p256::SecretKey::from_slice(private_key.as_bytes())
            .map_err(|_| Error::InvalidPrivateKey)?;
        let peer =
            p256::PublicKey::from_sec1_bytes(peer_public_key).map_err(|_| Error::InvalidPublicKey)?;
        let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
        Ok(SharedSecret::from_bytes(
            shared.raw_secret_bytes().to_vec(),
        ))
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::Secp256r1
    }
}

const FFDHE2048_KEY_SIZE: usize = 256;

pub(crate) struct Ffdhe2048KeyExchange;

impl Ffdhe2048KeyExchange {
    fn prime() -> BigUint {
        BigUint::from_bytes_be(&FFDHE2048_PRIME)
    }

    /// Left-pad to the full group size, as TLS requires for FFDHE.
    fn pad(bytes: Vec<u8>) -> Vec<u8> {
        let mut out = vec![0u8; FFDHE2048_KEY_SIZE - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    }
}

impl KeyExchange for Ffdhe2048KeyExchange {
    fn generate_keypair(&self) -> Result<(PrivateKey, PublicKey)> {
        let p = Self::prime();
        let g = BigUint::from(2u32);

        // 256-bit exponent gives ample margin over the group strength
        let mut exponent = [0u8; 32];
        OsRng.fill_bytes(&mut exponent);
        let x = BigUint::from_bytes_be(&exponent);

        let y = g.modpow(&x, &p);
        Ok((
            PrivateKey::from_bytes(exponent.to_vec()),
            PublicKey::from_bytes(Self::pad(y.to_bytes_be())),
        ))
    }

    fn exchange(&self, private_key: &PrivateKey, peer_public_key: &[u8]) -> Result<SharedSecret> {
        if peer_public_key.len() != FFDHE2048_KEY_SIZE {
            return Err(Error::InvalidPublicKey);
        }
        let p = Self::prime();
        let peer = BigUint::from_bytes_be(peer_public_key);
        let one = BigUint::from(1u32);
        // Reject 0, 1 and p-1 (subgroup confinement)
        if peer <= one || peer >= &p - &one {
            return Err(Error::InvalidPublicKey);
        }
        let x = BigUint::from_bytes_be(private_key.as_bytes());
        let shared = peer.modpow(&x, &p);
        Ok(SharedSecret::from_bytes(Self::pad(shared.to_bytes_be())))
    }

    fn algorithm(&self) -> KeyExchangeAlgorithm {
        KeyExchangeAlgorithm::Ffdhe2048
    }
}
