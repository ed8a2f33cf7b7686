//! Client and server configuration.

use std::sync::Arc;

use ferrotls_crypto::{
    CryptoProvider, KeyExchangeAlgorithm, SignatureScheme, SigningKey,
};

use crate::cipher::{CertificateKind, CipherSuite};
use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;
use crate::ticket::{ClientTicket, TicketStore, DEFAULT_TICKET_LIFETIME_SECS};
use crate::tls12::session::{Session, SessionCache};
use crate::x509;

/// Bytes of declined early data a server will skip by default.
pub const DEFAULT_MAX_EARLY_DATA_SKIP: usize = 16384;

/// Versions offered by default, best first.
pub const DEFAULT_VERSIONS: &[ProtocolVersion] = &[
    ProtocolVersion::TLS1_3,
    ProtocolVersion::TLS1_2,
    ProtocolVersion::TLS1_1,
    ProtocolVersion::TLS1_0,
];

/// Groups offered by default, best first.
pub const DEFAULT_GROUPS: &[KeyExchangeAlgorithm] = &[
    KeyExchangeAlgorithm::X25519,
    KeyExchangeAlgorithm::Secp256r1,
    KeyExchangeAlgorithm::Ffdhe2048,
];

/// Signature schemes offered by default.
pub const DEFAULT_SIGNATURE_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::EcdsaSecp256r1Sha256,
    SignatureScheme::RsaPssRsaeSha256,
    SignatureScheme::RsaPkcs1Sha256,
];

/// A server's certificate chain and private key.
pub struct Identity {
    /// DER certificates, leaf first
    pub certificate_chain: Vec<Vec<u8>>,
    /// Private key matching the leaf
    pub signing_key: Arc<SigningKey>,
    /// Key type of the leaf
    pub kind: CertificateKind,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("chain_length", &self.certificate_chain.len())
            .field("kind", &self.kind)
            .finish()
    }
}

impl Identity {
    /// Create an identity, inferring the key type from the leaf
    /// certificate.
    pub fn new(certificate_chain: Vec<Vec<u8>>, signing_key: SigningKey) -> Result<Self> {
        let leaf = certificate_chain
            .first()
            .ok_or_else(|| Error::InvalidConfig("Identity needs a certificate".into()))?;
        let kind = x509::extract_public_key(leaf)?.kind();
        Ok(Self {
            certificate_chain,
            signing_key: Arc::new(signing_key),
            kind,
        })
    }

    /// The scheme this identity signs with at the given version.
    pub fn signature_scheme(&self, version: ProtocolVersion) -> SignatureScheme {
        match self.kind {
            CertificateKind::Ecdsa => SignatureScheme::EcdsaSecp256r1Sha256,
            CertificateKind::Rsa if version.is_tls13() => SignatureScheme::RsaPssRsaeSha256,
            CertificateKind::Rsa => SignatureScheme::RsaPkcs1Sha256,
        }
    }
}

/// Resumption material from an earlier connection.
#[derive(Debug)]
pub enum Resumption {
    /// TLS 1.3 ticket and its PSK
    Ticket(ClientTicket),
    /// TLS 1.2 session for session-ID resumption
    Session(Session),
}

/// Client configuration.
pub struct ClientConfig {
    /// Crypto backend
    pub provider: Arc<dyn CryptoProvider>,
    /// Versions to offer, best first
    pub supported_versions: Vec<ProtocolVersion>,
    /// Suites to offer, in preference order
    pub cipher_suites: Vec<CipherSuite>,
    /// Groups to offer, best first; key shares are sent for the first
    pub supported_groups: Vec<KeyExchangeAlgorithm>,
    /// Signature schemes to accept
    pub signature_schemes: Vec<SignatureScheme>,
    /// Server name for SNI
    pub server_name: Option<String>,
    /// ALPN protocols to offer
    pub alpn_protocols: Vec<Vec<u8>>,
    /// Offer early_data when resuming with a ticket. No 0-RTT data is
    /// written before the server answers, and acceptance is refused.
    pub offer_early_data: bool,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("supported_versions", &self.supported_versions)
            .field("cipher_suites", &self.cipher_suites)
            .field("server_name", &self.server_name)
            .finish()
    }
}

impl ClientConfig {
    /// Default configuration over the given provider.
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            supported_versions: DEFAULT_VERSIONS.to_vec(),
            cipher_suites: CipherSuite::ALL.to_vec(),
            supported_groups: DEFAULT_GROUPS.to_vec(),
            signature_schemes: DEFAULT_SIGNATURE_SCHEMES.to_vec(),
            server_name: None,
            alpn_protocols: Vec::new(),
            offer_early_data: false,
        }
    }

    /// Highest offered version.
    pub fn max_version(&self) -> ProtocolVersion {
        self.supported_versions
            .iter()
            .copied()
            .max()
            .unwrap_or(ProtocolVersion::TLS1_2)
    }

    /// Sanity-check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.supported_versions.is_empty() {
            return Err(Error::InvalidConfig("No versions enabled".into()));
        }
        if let Some(v) = self.supported_versions.iter().find(|v| !v.is_known()) {
            return Err(Error::InvalidConfig(format!("Unknown version {}", v)));
        }
        if self.cipher_suites.is_empty() {
            return Err(Error::InvalidConfig("No cipher suites enabled".into()));
        }
        if self.supported_groups.is_empty() {
            return Err(Error::InvalidConfig("No groups enabled".into()));
        }
        let usable = self.supported_versions.iter().any(|&v| {
            self.cipher_suites.iter().any(|s| s.usable_at(v))
        });
        if !usable {
            return Err(Error::InvalidConfig(
                "No cipher suite is usable at any enabled version".into(),
            ));
        }
        Ok(())
    }
}

/// Server configuration.
pub struct ServerConfig {
    /// Crypto backend
    pub provider: Arc<dyn CryptoProvider>,
    /// Certificate chain and private key
    pub identity: Identity,
    /// Versions to accept
    pub supported_versions: Vec<ProtocolVersion>,
    /// Suites to negotiate, in server preference order
    pub cipher_suites: Vec<CipherSuite>,
    /// Groups to accept, best first
    pub supported_groups: Vec<KeyExchangeAlgorithm>,
    /// Signature schemes to accept
    pub signature_schemes: Vec<SignatureScheme>,
    /// ALPN protocols, in server preference order
    pub alpn_protocols: Vec<Vec<u8>>,
    /// 1.2 session cache, shared across connections
    pub session_cache: Arc<SessionCache>,
    /// 1.3 ticket store, shared across connections
    pub ticket_store: Arc<TicketStore>,
    /// Lifetime for issued tickets, seconds
    pub ticket_lifetime: u32,
    /// How many NewSessionTicket messages to send after a 1.3 handshake
    pub tickets_to_send: u8,
    /// How many bytes of a declined 0-RTT client's early-data records to
    /// skip before giving up on the handshake
    pub max_early_data_skip: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("identity", &self.identity)
            .field("supported_versions", &self.supported_versions)
            .field("cipher_suites", &self.cipher_suites)
            .finish()
    }
}

impl ServerConfig {
    /// Default configuration for the given identity.
    pub fn new(provider: Arc<dyn CryptoProvider>, identity: Identity) -> Self {
        Self {
            provider,
            identity,
            supported_versions: DEFAULT_VERSIONS.to_vec(),
            cipher_suites: CipherSuite::ALL.to_vec(),
            supported_groups: DEFAULT_GROUPS.to_vec(),
            signature_schemes: DEFAULT_SIGNATURE_SCHEMES.to_vec(),
            alpn_protocols: Vec::new(),
            session_cache: Arc::new(SessionCache::default()),
            ticket_store: Arc::new(TicketStore::default()),
            ticket_lifetime: DEFAULT_TICKET_LIFETIME_SECS,
            tickets_to_send: 1,
            max_early_data_skip: DEFAULT_MAX_EARLY_DATA_SKIP,
        }
    }

    /// Suites compatible with this server's certificate at `version`.
    pub fn usable_suites(&self, version: ProtocolVersion) -> Vec<CipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .filter(|s| {
                s.usable_at(version)
                    && s.certificate_kind()
                        .map_or(true, |k| k == self.identity.kind)
            })
            .collect()
    }

    /// Sanity-check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.supported_versions.is_empty() {
            return Err(Error::InvalidConfig("No versions enabled".into()));
        }
        if self.cipher_suites.is_empty() {
            return Err(Error::InvalidConfig("No cipher suites enabled".into()));
        }
        if self.identity.certificate_chain.is_empty() {
            return Err(Error::InvalidConfig("Identity needs a certificate".into()));
        }
        let usable = self
            .supported_versions
            .iter()
            .any(|&v| !self.usable_suites(v).is_empty());
        if !usable {
            return Err(Error::InvalidConfig(
                "No cipher suite matches the identity at any enabled version".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrotls_crypto_rustcrypto::RustCryptoProvider;

    fn provider() -> Arc<dyn CryptoProvider> {
        Arc::new(RustCryptoProvider::new())
    }

    fn rsa_identity() -> Identity {
        let cert = x509::build_certificate(&x509::SubjectPublicKey::Rsa(vec![
            0x30, 0x06, 0x02, 0x01, 0x05, 0x02, 0x01, 0x03,
        ]));
        Identity::new(vec![cert], SigningKey::from_bytes(vec![1, 2, 3])).unwrap()
    }

    #[test]
    fn test_client_defaults_validate() {
        let config = ClientConfig::new(provider());
        config.validate().unwrap();
        assert_eq!(config.max_version(), ProtocolVersion::TLS1_3);
    }

    #[test]
    fn test_client_without_versions_invalid() {
        let mut config = ClientConfig::new(provider());
        config.supported_versions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_suite_version_mismatch_invalid() {
        let mut config = ClientConfig::new(provider());
        config.supported_versions = vec![ProtocolVersion::TLS1_0];
        config.cipher_suites = vec![CipherSuite::Tls13Aes128GcmSha256];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_identity_filters_suites() {
        let config = ServerConfig::new(provider(), rsa_identity());
        config.validate().unwrap();
        let suites = config.usable_suites(ProtocolVersion::TLS1_2);
        assert!(suites.contains(&CipherSuite::EcdheRsaAes128GcmSha256));
        assert!(!suites.contains(&CipherSuite::EcdheEcdsaAes128GcmSha256));

        // 1.3 suites do not constrain the certificate type
        let suites13 = config.usable_suites(ProtocolVersion::TLS1_3);
        assert!(suites13.contains(&CipherSuite::Tls13Aes128GcmSha256));
    }

    #[test]
    fn test_identity_scheme_selection() {
        let identity = rsa_identity();
        assert_eq!(
            identity.signature_scheme(ProtocolVersion::TLS1_3),
            SignatureScheme::RsaPssRsaeSha256
        );
        assert_eq!(
            identity.signature_scheme(ProtocolVersion::TLS1_2),
            SignatureScheme::RsaPkcs1Sha256
        );
    }
}
