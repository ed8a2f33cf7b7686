//! Shared harness for driver-level integration tests.
//!
//! Pumps handshake actions between a client and a server driver without
//! a record layer; key switches and ChangeCipherSpec framing are
//! connection-layer concerns tested elsewhere.

#![allow(dead_code)]

use std::sync::Arc;

use ferrotls_core::config::{ClientConfig, Identity, ServerConfig};
use ferrotls_core::handshake::{ClientHandshake, HandshakeAction, ServerHandshake};
use ferrotls_core::messages::{HandshakeBuffer, RawHandshake};
use ferrotls_core::ticket::ClientTicket;
use ferrotls_core::x509;
use ferrotls_crypto::{CryptoProvider, SigningKey};
use ferrotls_crypto_rustcrypto::RustCryptoProvider;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;

/// A fresh ECDSA P-256 identity with a matching certificate.
pub fn ecdsa_identity() -> Identity {
    let secret = p256::ecdsa::SigningKey::random(&mut OsRng);
    let point = secret.verifying_key().to_encoded_point(false);
    let cert = x509::build_certificate(&x509::SubjectPublicKey::EcP256(
        point.as_bytes().to_vec(),
    ));
    Identity::new(vec![cert], SigningKey::from_bytes(secret.to_bytes().to_vec())).unwrap()
}

pub fn client_config() -> ClientConfig {
    ClientConfig::new(Arc::new(RustCryptoProvider::new()))
}

pub fn server_config(identity: Identity) -> ServerConfig {
    ServerConfig::new(Arc::new(RustCryptoProvider::new()), identity)
}

pub fn parse(raw: &[u8]) -> RawHandshake {
    let mut buffer = HandshakeBuffer::new();
    buffer.push(raw);
    buffer.next_message().unwrap().unwrap()
}

/// Feed one side's actions to the other, collecting the responses and
/// any tickets the client extracts along the way.
pub fn drive(
    actions: Vec<HandshakeAction>,
    client: &mut ClientHandshake,
    server: &mut ServerHandshake,
    to_server: bool,
    tickets: &mut Vec<ClientTicket>,
) -> Vec<HandshakeAction> {
    let mut out = Vec::new();
    for action in actions {
        match action {
            HandshakeAction::SendHandshake(raw) => {
                let msg = parse(&raw);
                let replies = if to_server {
                    server.process_message(&msg).unwrap()
                } else {
                    client.process_message(&msg).unwrap()
                };
                out.extend(replies);
            }
            HandshakeAction::SendChangeCipherSpec => {
                let replies = if to_server {
                    server.process_change_cipher_spec().unwrap()
                } else {
                    client.process_change_cipher_spec().unwrap()
                };
                out.extend(replies);
            }
            HandshakeAction::TicketReceived(ticket) => tickets.push(ticket),
            _ => {}
        }
    }
    out
}

/// Run a handshake to completion, returning any tickets the client
/// received.
pub fn handshake(client: &mut ClientHandshake, server: &mut ServerHandshake) -> Vec<ClientTicket> {
    let mut tickets = Vec::new();
    let mut to_server = true;
    let mut actions = client.start().unwrap();
    for _ in 0..8 {
        if client.is_connected() && server.is_connected() && actions.is_empty() {
            break;
        }
        actions = drive(actions, client, server, to_server, &mut tickets);
        to_server = !to_server;
    }
    assert!(client.is_connected(), "client did not reach Connected");
    assert!(server.is_connected(), "server did not reach Connected");
    tickets
}
