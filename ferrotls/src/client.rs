//! TLS client configuration and connector.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

use ferrotls_core::config::{ClientConfig, Resumption};
use ferrotls_core::connection::{Connection, Transport};
use ferrotls_core::{CipherSuite, ProtocolVersion, Result};
use ferrotls_crypto::{CryptoProvider, KeyExchangeAlgorithm};
use ferrotls_crypto_rustcrypto::RustCryptoProvider;

use crate::stream::TlsStream;

/// A configured TLS client, cheap to clone and reusable across
/// connections.
#[derive(Debug, Clone)]
pub struct TlsClient {
    config: Arc<ClientConfig>,
}

impl TlsClient {
    /// Create a new client builder with default settings.
    pub fn builder() -> TlsClientBuilder {
        TlsClientBuilder::default()
    }

    /// Open a TCP connection to `addr` and run the TLS handshake.
    pub fn connect<A: ToSocketAddrs>(&self, addr: A) -> Result<TlsStream<TcpStream>> {
        let tcp = TcpStream::connect(addr).map_err(ferrotls_core::Error::from)?;
        self.handshake(tcp)
    }

    /// Run the TLS handshake over an already-connected transport.
    pub fn handshake<T: Transport>(&self, transport: T) -> Result<TlsStream<T>> {
        self.handshake_with(transport, None)
    }

    /// Run the handshake, attempting to resume an earlier connection.
    ///
    /// A ticket resumes via a TLS 1.3 pre-shared key; a session resumes
    /// via the TLS 1.2 session-ID mechanism. If the server declines,
    /// the handshake falls back to a full one.
    pub fn resume<T: Transport>(
        &self,
        transport: T,
        resumption: Resumption,
    ) -> Result<TlsStream<T>> {
        self.handshake_with(transport, Some(resumption))
    }

    fn handshake_with<T: Transport>(
        &self,
        transport: T,
        resumption: Option<Resumption>,
    ) -> Result<TlsStream<T>> {
        let mut connection = Connection::client(transport, Arc::clone(&self.config), resumption)?;
        connection.handshake()?;
        log::debug!(
            "Client handshake complete: {:?} {:?}",
            connection.version(),
            connection.cipher_suite()
        );
        Ok(TlsStream::new(connection))
    }

    /// The underlying configuration.
    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }
}

/// Builder for [`TlsClient`].
#[derive(Debug)]
pub struct TlsClientBuilder {
    config: ClientConfig,
}

impl Default for TlsClientBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig::new(Arc::new(RustCryptoProvider::new())),
        }
    }
}

impl TlsClientBuilder {
    /// Use a specific crypto provider instead of the default backend.
    pub fn with_provider(mut self, provider: Arc<dyn CryptoProvider>) -> Self {
        self.config.provider = provider;
        self
    }

    /// Set the protocol versions to offer, best first.
    pub fn with_protocol_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.config.supported_versions = versions.to_vec();
        self
    }

    /// Set the cipher suites to offer, in preference order.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    /// Set the key exchange groups to offer, best first.
    pub fn with_groups(mut self, groups: &[KeyExchangeAlgorithm]) -> Self {
        self.config.supported_groups = groups.to_vec();
        self
    }

    /// Set the server name sent in SNI.
    pub fn with_server_name(mut self, name: &str) -> Self {
        self.config.server_name = Some(name.to_string());
        self
    }

    /// Set the ALPN protocols to offer, in preference order.
    pub fn with_alpn_protocols(mut self, protocols: &[&[u8]]) -> Self {
        self.config.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();
        self
    }

    /// Offer early_data when resuming with a ticket. No 0-RTT data is
    /// ever written; servers that accept are treated as misbehaving.
    pub fn with_early_data_offer(mut self, offer: bool) -> Self {
        self.config.offer_early_data = offer;
        self
    }

    /// Validate and build the client.
    pub fn build(self) -> Result<TlsClient> {
        self.config.validate()?;
        Ok(TlsClient {
            config: Arc::new(self.config),
        })
    }
}
