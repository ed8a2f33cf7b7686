//! Session ticket issuance and PSK resumption behavior.

mod common;

use std::sync::Arc;

use ferrotls_core::config::Resumption;
use ferrotls_core::handshake::{ClientHandshake, ServerHandshake};
use ferrotls_core::protocol::ProtocolVersion;
use ferrotls_core::ticket::ClientTicket;

fn clone_ticket(ticket: &ClientTicket) -> ClientTicket {
    ClientTicket {
        ticket: ticket.ticket.clone(),
        psk: ticket.psk.clone(),
        suite: ticket.suite,
        age_add: ticket.age_add,
        lifetime: ticket.lifetime,
        received_at: ticket.received_at,
    }
}

#[test]
fn test_resumption_skips_certificate() {
    let server_config = Arc::new(common::server_config(common::ecdsa_identity()));

    let mut client = ClientHandshake::new(Arc::new(common::client_config()), None).unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    let mut tickets = common::handshake(&mut client, &mut server);
    assert_eq!(tickets.len(), 1);
    assert_eq!(server_config.ticket_store.len(), 1);

    let ticket = tickets.pop().unwrap();
    let mut client = ClientHandshake::new(
        Arc::new(common::client_config()),
        Some(Resumption::Ticket(ticket)),
    )
    .unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    common::handshake(&mut client, &mut server);

    assert!(server.is_using_psk());
    assert_eq!(client.version(), Some(ProtocolVersion::TLS1_3));
    // Redeeming consumed the old ticket; a fresh one replaced it
    assert_eq!(server_config.ticket_store.len(), 1);
}

#[test]
fn test_replayed_ticket_gets_full_handshake() {
    let server_config = Arc::new(common::server_config(common::ecdsa_identity()));

    let mut client = ClientHandshake::new(Arc::new(common::client_config()), None).unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    let mut tickets = common::handshake(&mut client, &mut server);
    let ticket = tickets.pop().unwrap();
    let replay = clone_ticket(&ticket);

    let mut client = ClientHandshake::new(
        Arc::new(common::client_config()),
        Some(Resumption::Ticket(ticket)),
    )
    .unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    common::handshake(&mut client, &mut server);
    assert!(server.is_using_psk());

    // Offering the same label again finds nothing in the store; the
    // handshake completes as a full one rather than failing.
    let mut client = ClientHandshake::new(
        Arc::new(common::client_config()),
        Some(Resumption::Ticket(replay)),
    )
    .unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    common::handshake(&mut client, &mut server);
    assert!(!server.is_using_psk());
    assert!(client.is_connected());
}

#[test]
fn test_implausible_ticket_age_gets_full_handshake() {
    let server_config = Arc::new(common::server_config(common::ecdsa_identity()));

    let mut client = ClientHandshake::new(Arc::new(common::client_config()), None).unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    let mut tickets = common::handshake(&mut client, &mut server);

    // Skew the obfuscation so the claimed age lands a minute off
    let mut ticket = tickets.pop().unwrap();
    ticket.age_add = ticket.age_add.wrapping_add(60_000);

    let mut client = ClientHandshake::new(
        Arc::new(common::client_config()),
        Some(Resumption::Ticket(ticket)),
    )
    .unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    common::handshake(&mut client, &mut server);
    assert!(!server.is_using_psk());
    assert!(client.is_connected());
}

#[test]
fn test_server_can_issue_multiple_tickets() {
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.tickets_to_send = 3;
    let server_config = Arc::new(server_config);

    let mut client = ClientHandshake::new(Arc::new(common::client_config()), None).unwrap();
    let mut server = ServerHandshake::new(Arc::clone(&server_config)).unwrap();
    let tickets = common::handshake(&mut client, &mut server);

    assert_eq!(tickets.len(), 3);
    assert_eq!(server_config.ticket_store.len(), 3);
    let labels: std::collections::HashSet<_> =
        tickets.iter().map(|t| t.ticket.clone()).collect();
    assert_eq!(labels.len(), 3);
}
