//! # FerroTLS Core
//!
//! Core protocol implementation for FerroTLS: TLS 1.0 through 1.3 over
//! a pluggable crypto provider.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Public API (ferrotls)           │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │      ferrotls-core (this crate)         │
//! │  ┌──────────────────────────────────┐   │
//! │  │   Connection orchestration       │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Handshake drivers (sans-I/O)   │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Key schedules (1.3 / 1.2 PRF)  │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Record layer + protection      │   │
//! │  └──────────────────────────────────┘   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │    ferrotls-crypto (trait interface)    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The handshake drivers are sans-I/O: they consume reassembled
//! messages and emit ordered actions; [`connection::Connection`] binds
//! them to a byte transport. Every version shares one record layer and
//! one suite table; the 1.3 key schedule and the 1.0-1.2 PRF live side
//! by side and the negotiated version picks between them.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_qualifications
)]
#![forbid(unsafe_code)]

// Re-export crypto interface
pub use ferrotls_crypto;

// Core modules
pub mod alert;
pub mod cipher;
pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod handshake;
pub mod key_schedule;
pub mod messages;
pub mod protocol;
pub mod record;
pub mod record_protection;
pub mod state;
pub mod ticket;
pub mod tls12;
pub mod transcript;
pub mod x509;

// Re-exports
pub use cipher::CipherSuite;
pub use config::{ClientConfig, Identity, Resumption, ServerConfig};
pub use connection::{Connection, Transport};
pub use error::{Error, Result};
pub use protocol::{ContentType, ProtocolVersion};
