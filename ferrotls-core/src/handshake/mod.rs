//! Handshake drivers.
//!
//! The drivers are sans-I/O: they consume reassembled handshake
//! messages and emit ordered [`HandshakeAction`]s for the connection to
//! execute. Record protection switches are explicit actions so the
//! pending/current key discipline stays visible at the protocol layer.

mod client;
mod server;

pub use client::ClientHandshake;
pub use server::ServerHandshake;

use crate::alert::Alert;
use crate::cipher::CertificateKind;
use crate::record_protection::CipherState;
use crate::ticket::ClientTicket;
use crate::tls12::session::Session;
use ferrotls_crypto::SignatureScheme;

/// Whether a signature scheme can be produced by a certificate key of
/// the given kind.
pub(crate) fn scheme_matches_key(scheme: SignatureScheme, kind: CertificateKind) -> bool {
    match scheme {
        SignatureScheme::EcdsaSecp256r1Sha256 => kind == CertificateKind::Ecdsa,
        SignatureScheme::RsaPkcs1Sha256 | SignatureScheme::RsaPssRsaeSha256 => {
            kind == CertificateKind::Rsa
        }
    }
}

/// An ordered instruction from a handshake driver to the connection.
#[derive(Debug)]
pub enum HandshakeAction {
    /// Send a handshake message (bytes include the 4-byte header),
    /// protected under the current write state.
    SendHandshake(Vec<u8>),
    /// Send a ChangeCipherSpec record.
    SendChangeCipherSpec,
    /// Send an alert under the current write state.
    SendAlert(Alert),
    /// Arm the pending write cipher state.
    SetPendingWrite(CipherState),
    /// Switch writes to the pending state.
    ActivateWrite,
    /// Arm the pending read cipher state.
    SetPendingRead(CipherState),
    /// Switch reads to the pending state.
    ActivateRead,
    /// Replace the active write state in place (1.3 key switch).
    RekeyWrite(CipherState),
    /// Replace the active read state in place (1.3 key switch).
    RekeyRead(CipherState),
    /// The handshake finished; application data may flow.
    HandshakeComplete,
    /// A resumption ticket arrived (client, 1.3).
    TicketReceived(ClientTicket),
    /// A resumable session was established (client, 1.2).
    SessionEstablished(Session),
}
