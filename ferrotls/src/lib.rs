//! # FerroTLS
//!
//! A TLS library for Rust covering TLS 1.0 through TLS 1.3:
//! - TLS 1.3 with session tickets, PSK resumption, and key updates
//! - TLS 1.2 with ECDHE, DHE, and RSA key exchange plus session-ID
//!   resumption
//! - TLS 1.0/1.1 CBC suites for legacy peers
//! - Pluggable crypto providers (`ferrotls-crypto-rustcrypto` ships a
//!   pure-Rust backend)
//!
//! ## Quick Start
//!
//! ### Client
//!
//! ```rust,no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use ferrotls::TlsClient;
//!
//! let client = TlsClient::builder()
//!     .with_server_name("example.com")
//!     .with_alpn_protocols(&[b"http/1.1"])
//!     .build()?;
//!
//! let mut stream = client.connect("example.com:443")?;
//!
//! use std::io::{Read, Write};
//! stream.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")?;
//! let mut response = Vec::new();
//! stream.read_to_end(&mut response)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Server
//!
//! ```rust,no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use ferrotls::{Identity, TlsServer};
//! use std::net::TcpListener;
//!
//! # let (chain, key) = (vec![], todo!());
//! let server = TlsServer::builder(Identity::new(chain, key)?).build()?;
//!
//! let listener = TcpListener::bind("0.0.0.0:443")?;
//! loop {
//!     let (tcp, _) = listener.accept()?;
//!     let mut stream = server.accept(tcp)?;
//!     // Handle connection...
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_qualifications
)]
#![forbid(unsafe_code)]

// Re-export core types
pub use ferrotls_core::{
    self, cipher, error, protocol, CipherSuite, Error, Identity, ProtocolVersion, Result,
};

// Re-export the crypto interface and the default backend
pub use ferrotls_crypto;
pub use ferrotls_crypto_rustcrypto::RustCryptoProvider;

// Public modules
pub mod client;
pub mod server;
pub mod stream;

// Re-exports
pub use client::TlsClient;
pub use server::TlsServer;
pub use stream::TlsStream;

/// FerroTLS version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the FerroTLS version.
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert!(ver.starts_with("0."));
    }
}
