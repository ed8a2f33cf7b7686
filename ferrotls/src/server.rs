//! TLS server configuration and acceptor.

use std::net::TcpStream;
use std::sync::Arc;

use ferrotls_core::config::{Identity, ServerConfig};
use ferrotls_core::connection::{Connection, Transport};
use ferrotls_core::{CipherSuite, ProtocolVersion, Result};
use ferrotls_crypto::{CryptoProvider, KeyExchangeAlgorithm};
use ferrotls_crypto_rustcrypto::RustCryptoProvider;

use crate::stream::TlsStream;

/// A configured TLS server, cheap to clone and shared across accepted
/// connections. The session cache and ticket store live in the shared
/// configuration, so resumption works across clones.
#[derive(Debug, Clone)]
pub struct TlsServer {
    config: Arc<ServerConfig>,
}

impl TlsServer {
    /// Create a new server builder for the given identity.
    pub fn builder(identity: Identity) -> TlsServerBuilder {
        TlsServerBuilder {
            config: ServerConfig::new(Arc::new(RustCryptoProvider::new()), identity),
        }
    }

    /// Run the server side of the TLS handshake over an accepted TCP
    /// connection.
    pub fn accept(&self, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
        self.accept_transport(tcp)
    }

    /// Run the server side of the handshake over any transport.
    pub fn accept_transport<T: Transport>(&self, transport: T) -> Result<TlsStream<T>> {
        let mut connection = Connection::server(transport, Arc::clone(&self.config))?;
        connection.handshake()?;
        log::debug!(
            "Server handshake complete: {:?} {:?}",
            connection.version(),
            connection.cipher_suite()
        );
        Ok(TlsStream::new(connection))
    }

    /// The underlying configuration.
    pub fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }
}

/// Builder for [`TlsServer`].
#[derive(Debug)]
pub struct TlsServerBuilder {
    config: ServerConfig,
}

impl TlsServerBuilder {
    /// Use a specific crypto provider instead of the default backend.
    pub fn with_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.config.provider = provider;
        self
    }

    /// Set the protocol versions to accept.
    pub fn with_protocol_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.config.supported_versions = versions.to_vec();
        self
    }

    /// Set the cipher suites to negotiate, in server preference order.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    /// Set the key exchange groups to accept, best first.
    pub fn with_groups(mut self, groups: &[KeyExchangeAlgorithm]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    /// Set the ALPN protocols, in server preference order.
    pub fn with_alpn_protocols(mut self, protocols: &[&[u8]]) -> Self {
        self.config.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    /// Set the lifetime of issued session tickets, in seconds.
    pub fn with_ticket_lifetime(mut self, seconds: u32) -> Self {
        self.config.ticket_lifetime = seconds;
        self
    }

    /// Set how many session tickets to send after a TLS 1.3 handshake.
    /// Zero disables ticket issuance.
    pub fn with_tickets_to_send(mut self, count: u8) -> Self {
        self.config.tickets_to_send = count;
        self
    }

    /// Set how many bytes of a declined 0-RTT client's early-data
    /// records to skip before failing the handshake.
    pub fn with_max_early_data_skip(mut self, bytes: usize) -> Self {
        self.config.max_early_data_skip = bytes;
        self
    }

    /// Validate and build the server.
    pub fn build(self) -> Result<TlsServer> {
        self.config.validate()?;
        Ok(TlsServer {
            config: Arc::new(self.config),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrotls_core::x509;
    use ferrotls_crypto::SigningKey;

    // RFC 6979 A.2.5 P-256 key pair
    const P256_D: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";
    const P256_QX: &str = "60fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6";
    const P256_QY: &str = "7903fe1008b8bc99a41ae9e95628bc64f2f1b20c2d7e9f5177a3c294d4462299";

    fn test_identity() -> Identity {
        let d = hex::decode(P256_D).unwrap();
        let mut point = vec![0x04];
        point.extend_from_slice(&hex::decode(P256_QX).unwrap());
        point.extend_from_slice(&hex::decode(P256_QY).unwrap());
        let cert = x509::build_certificate(&x509::SubjectPublicKey::EcP256(point));
        Identity::new(vec![cert], SigningKey::from_bytes(d)).unwrap()
    }

    #[test]
    fn test_default_builder_validates() {
        let server = TlsServer::builder(test_identity()).build().unwrap();
        assert_eq!(server.config().tickets_to_send, 1);
    }

    #[test]
    fn test_builder_rejects_suite_certificate_mismatch() {
        // RSA-only suites can never match an ECDSA identity
        let result = TlsServer::builder(test_identity())
            .with_cipher_suites(&[CipherSuite::RsaAes128CbcSha])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_clones_share_ticket_store() {
        let server = TlsServer::builder(test_identity()).build().unwrap();
        let clone = server.clone();
        assert!(Arc::ptr_eq(
            &server.config().ticket_store,
            &clone.config().ticket_store
        ));
    }
}
