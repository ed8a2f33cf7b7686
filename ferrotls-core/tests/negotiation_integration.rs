//! Version, suite, and ALPN negotiation outcomes.

mod common;

use std::sync::Arc;

use ferrotls_core::cipher::CipherSuite;
use ferrotls_core::handshake::{ClientHandshake, HandshakeAction, ServerHandshake};
use ferrotls_core::protocol::ProtocolVersion;
use ferrotls_core::Error;

#[test]
fn test_alpn_follows_server_preference() {
    let mut client_config = common::client_config();
    client_config.alpn_protocols = vec![b"http/1.1".to_vec(), b"h2".to_vec()];
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    let mut client = ClientHandshake::new(Arc::new(client_config), None).unwrap();
    let mut server = ServerHandshake::new(Arc::new(server_config)).unwrap();
    common::handshake(&mut client, &mut server);

    assert_eq!(client.negotiated_alpn(), Some(&b"h2"[..]));
    assert_eq!(server.negotiated_alpn(), Some(&b"h2"[..]));
}

#[test]
fn test_alpn_no_overlap_is_fatal() {
    let mut client_config = common::client_config();
    client_config.alpn_protocols = vec![b"h2".to_vec()];
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.alpn_protocols = vec![b"smtp".to_vec()];

    let mut client = ClientHandshake::new(Arc::new(client_config), None).unwrap();
    let mut server = ServerHandshake::new(Arc::new(server_config)).unwrap();

    let actions = client.start().unwrap();
    let raw = match &actions[0] {
        HandshakeAction::SendHandshake(raw) => raw.clone(),
        other => panic!("expected ClientHello, got {:?}", other),
    };
    let result = server.process_message(&common::parse(&raw));
    assert!(matches!(result, Err(Error::HandshakeFailure(_))));
}

#[test]
fn test_no_alpn_offered_negotiates_none() {
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.alpn_protocols = vec![b"h2".to_vec()];

    let mut client = ClientHandshake::new(Arc::new(common::client_config()), None).unwrap();
    let mut server = ServerHandshake::new(Arc::new(server_config)).unwrap();
    common::handshake(&mut client, &mut server);

    assert_eq!(client.negotiated_alpn(), None);
    assert_eq!(server.negotiated_alpn(), None);
}

#[test]
fn test_disjoint_versions_fail() {
    let mut client_config = common::client_config();
    client_config.supported_versions = vec![ProtocolVersion::TLS1_3];
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.supported_versions =
        vec![ProtocolVersion::TLS1_2, ProtocolVersion::TLS1_1];

    let mut client = ClientHandshake::new(Arc::new(client_config), None).unwrap();
    let mut server = ServerHandshake::new(Arc::new(server_config)).unwrap();

    let actions = client.start().unwrap();
    let raw = match &actions[0] {
        HandshakeAction::SendHandshake(raw) => raw.clone(),
        other => panic!("expected ClientHello, got {:?}", other),
    };
    let result = server.process_message(&common::parse(&raw));
    assert!(matches!(result, Err(Error::NegotiationFailure(_))));
}

#[test]
fn test_mixed_versions_settle_on_best_common() {
    let mut client_config = common::client_config();
    client_config.supported_versions = vec![
        ProtocolVersion::TLS1_3,
        ProtocolVersion::TLS1_2,
        ProtocolVersion::TLS1_1,
    ];
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.supported_versions = vec![ProtocolVersion::TLS1_2];
    server_config.cipher_suites = vec![CipherSuite::EcdheEcdsaAes128GcmSha256];

    let mut client = ClientHandshake::new(Arc::new(client_config), None).unwrap();
    let mut server = ServerHandshake::new(Arc::new(server_config)).unwrap();
    common::handshake(&mut client, &mut server);

    assert_eq!(client.version(), Some(ProtocolVersion::TLS1_2));
    assert_eq!(
        server.cipher_suite(),
        Some(CipherSuite::EcdheEcdsaAes128GcmSha256)
    );
}

#[test]
fn test_no_common_suite_fails() {
    let mut client_config = common::client_config();
    client_config.supported_versions = vec![ProtocolVersion::TLS1_2];
    client_config.cipher_suites = vec![CipherSuite::EcdheEcdsaAes128GcmSha256];
    let mut server_config = common::server_config(common::ecdsa_identity());
    server_config.supported_versions = vec![ProtocolVersion::TLS1_2];
    // ECDSA identity filters every RSA suite out of the server's list
    server_config.cipher_suites = vec![CipherSuite::EcdheRsaAes128GcmSha256];

    let client = ClientHandshake::new(Arc::new(client_config), None);
    assert!(client.is_ok());
    let server = ServerHandshake::new(Arc::new(server_config));
    assert!(server.is_err());
}
