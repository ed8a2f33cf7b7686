//! Premaster secret establishment for TLS 1.0-1.2.
//!
//! Dispatches on the suite's key exchange kind: RSA wraps a random
//! premaster under the server's certificate key, DHE and ECDHE run an
//! ephemeral exchange whose parameters the server signs.

use zeroize::Zeroizing;

use crate::cipher::KeyExchangeKind;
use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;
use ferrotls_crypto::{CryptoProvider, KeyExchangeAlgorithm, PrivateKey};

/// RSA premaster secret length: 2 version bytes + 46 random.
pub const RSA_PREMASTER_LEN: usize = 48;

/// ffdhe2048 generator.
pub const FFDHE_GENERATOR: u8 = 2;

/// ffdhe2048 prime length in bytes.
pub const FFDHE_PRIME_LEN: usize = 256;

/// Build the RSA premaster secret.
///
/// The first two bytes carry the highest version the client offered in
/// its ClientHello, which the server cross-checks as a rollback
/// defense (RFC 5246 Section 7.4.7.1).
pub fn build_rsa_premaster(
    provider: &dyn CryptoProvider,
    client_version: ProtocolVersion,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut premaster = Zeroizing::new(vec![0u8; RSA_PREMASTER_LEN]);
    premaster[..2].copy_from_slice(&client_version.to_u16().to_be_bytes());
    provider.random().fill(&mut premaster[2..])?;
    Ok(premaster)
}

/// Decrypt the RSA-wrapped premaster on the server side.
///
/// Padding failures and version mismatches are indistinguishable from
/// the outside: either way a random premaster is substituted and the
/// handshake proceeds until the Finished check fails (the
/// Bleichenbacher countermeasure from RFC 5246 Section 7.4.7.1).
pub fn unwrap_rsa_premaster(
    provider: &dyn CryptoProvider,
    private_key: &ferrotls_crypto::SigningKey,
    ciphertext: &[u8],
    client_version: ProtocolVersion,
) -> Result<Zeroizing<Vec<u8>>> {
    let mut substitute = Zeroizing::new(vec![0u8; RSA_PREMASTER_LEN]);
    provider.random().fill(&mut substitute[..])?;
    substitute[..2].copy_from_slice(&client_version.to_u16().to_be_bytes());

    let transport = provider.key_transport()?;
    match transport.decrypt(private_key, ciphertext) {
        Ok(plaintext)
            if plaintext.len() == RSA_PREMASTER_LEN
                && plaintext[..2] == client_version.to_u16().to_be_bytes() =>
        {
            Ok(Zeroizing::new(plaintext))
        }
        _ => Ok(substitute),
    }
}

/// Validate the server's DHE group parameters.
///
/// Only the exact RFC 7919 ffdhe2048 group is accepted; arbitrary
/// server-chosen primes are refused.
pub fn check_dhe_params(p: &[u8], g: &[u8]) -> Result<()> {
    if g != [FFDHE_GENERATOR] || p != ferrotls_crypto::FFDHE2048_PRIME {
        return Err(Error::NegotiationFailure(
            "Unsupported DHE group parameters".into(),
        ));
    }
    Ok(())
}

/// Map a suite's key exchange kind to the group used for the ephemeral
/// exchange, honoring preference order for ECDHE.
pub fn ephemeral_group(
    kind: KeyExchangeKind,
    our_groups: &[KeyExchangeAlgorithm],
    peer_groups: Option<&[KeyExchangeAlgorithm]>,
) -> Option<KeyExchangeAlgorithm> {
    match kind {
        KeyExchangeKind::DheRsa => Some(KeyExchangeAlgorithm::Ffdhe2048),
        KeyExchangeKind::EcdheRsa | KeyExchangeKind::EcdheEcdsa => {
            let ec_only = |g: &KeyExchangeAlgorithm| *g != KeyExchangeAlgorithm::Ffdhe2048;
            match peer_groups {
                Some(peer) => our_groups
                    .iter()
                    .copied()
                    .filter(ec_only)
                    .find(|g| peer.contains(g)),
                None => our_groups.iter().copied().find(ec_only),
            }
        }
        KeyExchangeKind::Rsa | KeyExchangeKind::Tls13 => None,
    }
}

/// An in-flight ephemeral exchange (server side keeps the private key
/// between ServerKeyExchange and ClientKeyExchange).
pub struct EphemeralExchange {
    /// Group in use
    pub group: KeyExchangeAlgorithm,
    /// Our private key
    pub private_key: PrivateKey,
    /// Our public key bytes, as sent on the wire
    pub public_key: Vec<u8>,
}

impl std::fmt::Debug for EphemeralExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralExchange")
            .field("group", &self.group)
            .finish()
    }
}

impl EphemeralExchange {
    /// Generate a fresh key pair on the given group.
    pub fn generate(
        provider: &dyn CryptoProvider,
        group: KeyExchangeAlgorithm,
    ) -> Result<Self> {
        let kex = provider.key_exchange(group)?;
        let (private_key, public_key) = kex.generate_keypair()?;
        Ok(Self {
            group,
            private_key,
            public_key: public_key.into_bytes(),
        })
    }

    /// Complete the exchange with the peer's public key.
    pub fn complete(
        &self,
        provider: &dyn CryptoProvider,
        peer_public_key: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>> {
        let kex = provider.key_exchange(self.group)?;
        let shared = kex.exchange(&self.private_key, peer_public_key)?;
        Ok(Zeroizing::new(shared.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrotls_crypto_rustcrypto::RustCryptoProvider;

    #[test]
    fn test_rsa_premaster_carries_client_version() {
        let provider = RustCryptoProvider::new();
        let premaster = build_rsa_premaster(&provider, ProtocolVersion::TLS1_2).unwrap();
        assert_eq!(premaster.len(), RSA_PREMASTER_LEN);
        assert_eq!(&premaster[..2], &[0x03, 0x03]);
    }

    #[test]
    fn test_dhe_param_validation() {
        let prime = ferrotls_crypto::FFDHE2048_PRIME;
        assert!(check_dhe_params(&prime, &[2]).is_ok());
        assert!(check_dhe_params(&prime, &[5]).is_err());
        // A same-length prime that is not the RFC 7919 one
        assert!(check_dhe_params(&[0xff; 256], &[2]).is_err());
        assert!(check_dhe_params(&[0xff; 128], &[2]).is_err());
    }

    #[test]
    fn test_ephemeral_group_dispatch() {
        let ours = [
            KeyExchangeAlgorithm::X25519,
            KeyExchangeAlgorithm::Secp256r1,
            KeyExchangeAlgorithm::Ffdhe2048,
        ];
        assert_eq!(
            ephemeral_group(KeyExchangeKind::DheRsa, &ours, None),
            Some(KeyExchangeAlgorithm::Ffdhe2048)
        );
        assert_eq!(
            ephemeral_group(
                KeyExchangeKind::EcdheRsa,
                &ours,
                Some(&[KeyExchangeAlgorithm::Secp256r1])
            ),
            Some(KeyExchangeAlgorithm::Secp256r1)
        );
        // The finite-field group never satisfies an ECDHE suite
        assert_eq!(
            ephemeral_group(
                KeyExchangeKind::EcdheRsa,
                &ours,
                Some(&[KeyExchangeAlgorithm::Ffdhe2048])
            ),
            None
        );
        assert_eq!(ephemeral_group(KeyExchangeKind::Rsa, &ours, None), None);
    }

    #[test]
    fn test_ephemeral_exchange_agrees() {
        let provider = RustCryptoProvider::new();
        let a = EphemeralExchange::generate(&provider, KeyExchangeAlgorithm::X25519).unwrap();
        let b = EphemeralExchange::generate(&provider, KeyExchangeAlgorithm::X25519).unwrap();
        let s1 = a.complete(&provider, &b.public_key).unwrap();
        let s2 = b.complete(&provider, &a.public_key).unwrap();
        assert_eq!(&s1[..], &s2[..]);
    }
}
