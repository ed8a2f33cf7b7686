//! Server handshake driver.
//!
//! Negotiates version and suite from the ClientHello, then runs either
//! the TLS 1.3 flow (full, HelloRetryRequest, PSK resumption, ticket
//! issuance) or the pre-1.3 flow (RSA, DHE, ECDHE key exchange,
//! session-ID resumption).

use std::sync::Arc;
use std::time::Instant;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::cipher::{select_cipher_suite, CipherSuite, KeyExchangeKind};
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::extensions::{self, Extensions, KeyShareEntry};
use crate::handshake::HandshakeAction;
use crate::key_schedule::KeySchedule;
use crate::messages::{
    certificate_verify, encode_handshake, Certificate12, Certificate13, CertificateVerify,
    ClientHello, EncryptedExtensions, Finished, KeyUpdate, NewSessionTicket, RawHandshake,
    ServerHello,
};
use crate::messages::server_hello::{DOWNGRADE_TLS12_SENTINEL, HELLO_RETRY_REQUEST_RANDOM};
use crate::protocol::{ExtensionType, HandshakeType, ProtocolVersion};
use crate::record_protection::{derive_legacy_states, CipherState};
use crate::state::{ConnectionState, ServerState};
use crate::ticket::StoredTicket;
use crate::tls12::key_exchange::{
    unwrap_rsa_premaster, ephemeral_group, EphemeralExchange, FFDHE_GENERATOR,
};
use crate::tls12::messages::{
    ClientKeyExchange, ServerHelloDone, ServerKeyExchange, ServerKeyExchangeParams,
};
use crate::tls12::prf;
use crate::tls12::session::Session;
use crate::transcript::{compute_verify_data, TranscriptHash};
use ferrotls_crypto::{KeyExchangeAlgorithm, FFDHE2048_PRIME};

/// Server-side handshake state.
pub struct ServerHandshake {
    config: Arc<ServerConfig>,
    state: ConnectionState,
    transcript: TranscriptHash,
    key_schedule: Option<KeySchedule>,
    client_random: [u8; 32],
    server_random: [u8; 32],
    client_legacy_version: ProtocolVersion,
    retry_suite: Option<CipherSuite>,
    retry_group: Option<KeyExchangeAlgorithm>,
    exchange: Option<EphemeralExchange>,
    using_psk: bool,
    discarding_early_data: bool,
    extended_master: bool,
    negotiated_alpn: Option<Vec<u8>>,
    master_secret: Option<Zeroizing<Vec<u8>>>,
    ticket_nonce: u64,
}

impl std::fmt::Debug for ServerHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandshake")
            .field("state", &self.state.server_state())
            .field("version", &self.state.version)
            .field("cipher_suite", &self.state.cipher_suite)
            .finish()
    }
}

impl ServerHandshake {
    /// Create a driver over the given configuration.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: ConnectionState::new_server(),
            transcript: TranscriptHash::new(ferrotls_crypto::HashAlgorithm::Sha256),
            key_schedule: None,
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            client_legacy_version: ProtocolVersion::TLS1_2,
            retry_suite: None,
            retry_group: None,
            exchange: None,
            using_psk: false,
            discarding_early_data: false,
            extended_master: false,
            negotiated_alpn: None,
            master_secret: None,
            ticket_nonce: 0,
        })
    }

    /// Negotiated version, once known.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.state.version
    }

    /// Negotiated suite, once known.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.state.cipher_suite
    }

    /// Negotiated ALPN protocol, if any.
    pub fn negotiated_alpn(&self) -> Option<&[u8]> {
        self.negotiated_alpn.as_deref()
    }

    /// Whether the handshake has completed.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Whether an abbreviated handshake resumed an earlier session.
    pub fn is_reusing_session(&self) -> bool {
        self.state.is_reusing_session
    }

    /// Whether the connection was established from a resumption PSK.
    pub fn is_using_psk(&self) -> bool {
        self.using_psk
    }

    /// Whether declined early-data records may still arrive ahead of
    /// the client's Finished.
    pub fn is_discarding_early_data(&self) -> bool {
        self.discarding_early_data
    }

    /// Mark the connection failed after a fatal error.
    pub fn fail(&mut self) {
        self.state.fail();
    }

    /// Feed one reassembled handshake message.
    pub fn process_message(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        match (self.state.server_state(), message.msg_type) {
            (ServerState::Start, HandshakeType::ClientHello) => {
                self.process_client_hello(message, false)
            }
            (ServerState::WaitRetryClientHello, HandshakeType::ClientHello) => {
                self.process_client_hello(message, true)
            }
            (ServerState::WaitClientKeyExchange, HandshakeType::ClientKeyExchange) => {
                self.process_client_key_exchange(message)
            }
            (ServerState::WaitFinished, HandshakeType::Finished) => {
                self.process_finished(message)
            }
            (ServerState::Connected, HandshakeType::KeyUpdate) => {
                self.process_key_update(message)
            }
            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in server state {:?}",
                msg_type, state
            ))),
        }
    }

    /// Feed a ChangeCipherSpec record.
    pub fn process_change_cipher_spec(&mut self) -> Result<Vec<HandshakeAction>> {
        if self.state.version.map_or(false, |v| v.is_tls13()) {
            // Middlebox compatibility noise, dropped
            return Ok(Vec::new());
        }
        if self.state.server_state() != ServerState::WaitChangeCipherSpec {
            return Err(Error::UnexpectedMessage(
                "ChangeCipherSpec outside the cipher switch point".into(),
            ));
        }
        self.state.transition_server(ServerState::WaitFinished)?;
        Ok(vec![HandshakeAction::ActivateRead])
    }

    fn negotiate_version(&self, hello: &ClientHello) -> Result<ProtocolVersion> {
        let supports_tls13 = self
            .config
            .supported_versions
            .iter()
            .any(|v| v.is_tls13());
        match hello.extensions.get(ExtensionType::SupportedVersions) {
            Some(data) => {
                let offered = extensions::parse_supported_versions_client(data)?;
                // Draft offers are answered with the final version
                if supports_tls13 && offered.iter().any(|v| v.is_tls13()) {
                    return Ok(ProtocolVersion::TLS1_3);
                }
                self.config
                    .supported_versions
                    .iter()
                    .copied()
                    .filter(|v| v.is_pre_tls13() && offered.contains(v))
                    .max()
                    .ok_or_else(|| {
                        Error::NegotiationFailure("No common protocol version".into())
                    })
            }
            None => {
                let cap = hello.legacy_version.min(ProtocolVersion::TLS1_2);
                self.config
                    .supported_versions
                    .iter()
                    .copied()
                    .filter(|&v| v.is_pre_tls13() && v <= cap)
                    .max()
                    .ok_or_else(|| {
                        Error::NegotiationFailure("No common protocol version".into())
                    })
            }
        }
    }

    fn process_client_hello(
        &mut self,
        message: &RawHandshake,
        after_retry: bool,
    ) -> Result<Vec<HandshakeAction>> {
        let hello = ClientHello::decode(&message.body)?;
        let version = self.negotiate_version(&hello)?;
        let suite = select_cipher_suite(
            &self.config.usable_suites(version),
            &hello.known_cipher_suites(),
            version,
        )?;

        if after_retry {
            if !version.is_tls13() {
                return Err(Error::InvalidMessage(
                    "Version changed between the retried hellos".into(),
                ));
            }
            if self.retry_suite != Some(suite) {
                return Err(Error::InvalidMessage(
                    "Suite changed between the retried hellos".into(),
                ));
            }
            if hello.random != self.client_random {
                return Err(Error::InvalidMessage(
                    "Client random changed between the retried hellos".into(),
                ));
            }
        } else {
            self.client_random = hello.random;
            self.client_legacy_version = hello.legacy_version;
            self.state.version = Some(version);
            self.state.cipher_suite = Some(suite);
            log::debug!("negotiated {} with {}", version, suite.name());
        }

        if version.is_tls13() {
            self.accept_client_hello13(message, &hello, suite, after_retry)
        } else {
            self.accept_client_hello12(message, &hello, version, suite)
        }
    }

    fn accept_client_hello13(
        &mut self,
        message: &RawHandshake,
        hello: &ClientHello,
        suite: CipherSuite,
        after_retry: bool,
    ) -> Result<Vec<HandshakeAction>> {
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;

        let client_groups = hello
            .extensions
            .get(ExtensionType::SupportedGroups)
            .map(extensions::parse_supported_groups)
            .transpose()?
            .unwrap_or_default();
        let shares = match hello.extensions.get(ExtensionType::KeyShare) {
            Some(data) => extensions::parse_key_share_client(data)?,
            None => Vec::new(),
        };

        // 0-RTT offers are declined: early_data is never echoed, and
        // the client's early-data records are dropped until its
        // Finished arrives.
        if hello.extensions.contains(ExtensionType::EarlyData) {
            if !hello.extensions.contains(ExtensionType::PreSharedKey) {
                return Err(Error::InvalidMessage(
                    "early_data without pre_shared_key".into(),
                ));
            }
            self.discarding_early_data = true;
            log::debug!("declining 0-RTT offer");
        }

        let group = if after_retry {
            self.retry_group
                .ok_or_else(|| Error::InternalError("Retry without a remembered group".into()))?
        } else {
            self.config
                .supported_groups
                .iter()
                .copied()
                .find(|g| client_groups.contains(g))
                .ok_or_else(|| Error::NegotiationFailure("No common group".into()))?
        };

        let Some(share) = shares.iter().find(|e| e.group == group) else {
            if after_retry {
                return Err(Error::InvalidMessage(
                    "Retried hello still lacks a usable key share".into(),
                ));
            }
            return self.send_hello_retry(message, hello, suite, group);
        };

        // PSK acceptance. The offer is only honored when the last
        // extension is pre_shared_key, psk_dhe_ke is offered, the ticket
        // redeems (first use), its hash matches the suite, and the
        // reported age agrees with our clock. A bad binder is fatal;
        // everything else silently falls back to a full handshake.
        self.transcript.set_algorithm(suite.hash_algorithm());
        let mut schedule = KeySchedule::new(suite);
        let mut psk_accepted = false;
        if let Some(data) = hello.extensions.get(ExtensionType::PreSharedKey) {
            let last = hello.extensions.iter().last().map(|e| e.extension_type);
            if last != Some(ExtensionType::PreSharedKey) {
                return Err(Error::InvalidMessage(
                    "pre_shared_key must be the last extension".into(),
                ));
            }
            let modes = hello
                .extensions
                .get(ExtensionType::PskKeyExchangeModes)
                .ok_or_else(|| {
                    Error::InvalidMessage("pre_shared_key without psk_key_exchange_modes".into())
                })?;
            if extensions::parse_psk_modes_offers_dhe(modes)? {
                let psks = extensions::parse_pre_shared_key_client(data)?;
                if let Some(identity) = psks.identities.first() {
                    if let Some(stored) = self.config.ticket_store.take(&identity.identity) {
                        if stored.suite.hash_algorithm() == suite.hash_algorithm()
                            && stored.age_is_valid(identity.obfuscated_ticket_age)
                        {
                            let binders_len = extensions::psk_binders_length(&psks);
                            let truncated = &message.raw[..message.raw.len() - binders_len];
                            schedule.init_early_secret(provider, &stored.psk)?;
                            let binder_key = schedule.derive_binder_key(provider, false)?;
                            let hash =
                                self.transcript.hash_with_partial(provider, truncated)?;
                            let expected =
                                schedule.compute_psk_binder(provider, &binder_key, &hash)?;
                            if !bool::from(expected[..].ct_eq(&psks.binders[0][..])) {
                                return Err(Error::HandshakeFailure(
                                    "PSK binder verification failed".into(),
                                ));
                            }
                            psk_accepted = true;
                        } else {
                            log::debug!("ticket unusable, continuing with a full handshake");
                        }
                    }
                }
            }
        }
        if !psk_accepted {
            schedule = KeySchedule::new(suite);
            schedule.init_early_secret(provider, &[])?;
        }
        self.using_psk = psk_accepted;

        self.transcript.update(&message.raw);

        provider.random().fill(&mut self.server_random)?;
        let exchange = EphemeralExchange::generate(provider, group)?;
        let shared = exchange.complete(provider, &share.key_exchange)?;

        let mut ext = Extensions::new();
        ext.push(extensions::supported_versions_server(
            ProtocolVersion::TLS1_3,
        ));
        ext.push(extensions::key_share_server(&KeyShareEntry {
            group,
            key_exchange: exchange.public_key.clone(),
        }));
        if psk_accepted {
            ext.push(extensions::pre_shared_key_server(0));
        }
        let sh = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: self.server_random,
            session_id: hello.session_id.clone(),
            cipher_suite: suite,
            extensions: ext,
        };
        let sh_raw = encode_handshake(HandshakeType::ServerHello, &sh.encode());
        self.transcript.update(&sh_raw);
        self.state.session_id = hello.session_id.clone();

        schedule.derive_handshake_secret(provider, &shared)?;
        let hash = self.transcript.current_hash(provider)?;
        let client_secret =
            schedule.derive_client_handshake_traffic_secret(provider, &hash)?;
        let server_secret =
            schedule.derive_server_handshake_traffic_secret(provider, &hash)?;

        let mut actions = vec![
            HandshakeAction::SendHandshake(sh_raw),
            HandshakeAction::RekeyWrite(CipherState::tls13(provider, suite, &server_secret)?),
            HandshakeAction::RekeyRead(CipherState::tls13(provider, suite, &client_secret)?),
        ];

        let mut ee_ext = Extensions::new();
        if let Some(data) = hello.extensions.get(ExtensionType::Alpn) {
            let offered = extensions::parse_alpn(data)?;
            if !self.config.alpn_protocols.is_empty() {
                let selected = self
                    .config
                    .alpn_protocols
                    .iter()
                    .find(|p| offered.contains(p))
                    .ok_or_else(|| {
                        Error::HandshakeFailure("No common ALPN protocol".into())
                    })?;
                ee_ext.push(extensions::alpn(std::slice::from_ref(selected)));
                self.negotiated_alpn = Some(selected.clone());
            }
        }
        let ee = EncryptedExtensions { extensions: ee_ext };
        let ee_raw = encode_handshake(HandshakeType::EncryptedExtensions, &ee.encode());
        self.transcript.update(&ee_raw);
        actions.push(HandshakeAction::SendHandshake(ee_raw));

        if !psk_accepted {
            let cert = Certificate13::from_chain(&self.config.identity.certificate_chain);
            let cert_raw = encode_handshake(HandshakeType::Certificate, &cert.encode());
            self.transcript.update(&cert_raw);
            actions.push(HandshakeAction::SendHandshake(cert_raw));

            let scheme = self
                .config
                .identity
                .signature_scheme(ProtocolVersion::TLS1_3);
            let hash = self.transcript.current_hash(provider)?;
            let content = certificate_verify::signed_content(true, &hash);
            let signature = provider
                .signature(scheme)?
                .sign(&self.config.identity.signing_key, &content)?;
            let cv = CertificateVerify { scheme, signature };
            let cv_raw = encode_handshake(HandshakeType::CertificateVerify, &cv.encode());
            self.transcript.update(&cv_raw);
            actions.push(HandshakeAction::SendHandshake(cv_raw));
        }

        let hash = self.transcript.current_hash(provider)?;
        let verify_data =
            compute_verify_data(provider, suite.hash_algorithm(), &server_secret, &hash)?;
        let fin_raw = encode_handshake(HandshakeType::Finished, &verify_data);
        self.transcript.update(&fin_raw);
        actions.push(HandshakeAction::SendHandshake(fin_raw));

        schedule.derive_master_secret(provider)?;
        let hash = self.transcript.current_hash(provider)?;
        let server_app =
            schedule.derive_server_application_traffic_secret(provider, &hash)?;
        // The client secret is derived now (same transcript point) and
        // armed once the client Finished verifies
        schedule.derive_client_application_traffic_secret(provider, &hash)?;
        actions.push(HandshakeAction::RekeyWrite(CipherState::tls13(
            provider, suite, &server_app,
        )?));

        self.key_schedule = Some(schedule);
        self.state.transition_server(ServerState::WaitFinished)?;
        Ok(actions)
    }

    fn send_hello_retry(
        &mut self,
        message: &RawHandshake,
        hello: &ClientHello,
        suite: CipherSuite,
        group: KeyExchangeAlgorithm,
    ) -> Result<Vec<HandshakeAction>> {
        self.transcript.set_algorithm(suite.hash_algorithm());
        self.transcript.update(&message.raw);
        self.transcript.collapse_for_retry(&*self.config.provider)?;

        let mut ext = Extensions::new();
        ext.push(extensions::supported_versions_server(
            ProtocolVersion::TLS1_3,
        ));
        ext.push(extensions::key_share_retry(group));
        let hrr = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: HELLO_RETRY_REQUEST_RANDOM,
            session_id: hello.session_id.clone(),
            cipher_suite: suite,
            extensions: ext,
        };
        let raw = encode_handshake(HandshakeType::ServerHello, &hrr.encode());
        self.transcript.update(&raw);

        self.retry_suite = Some(suite);
        self.retry_group = Some(group);
        self.state
            .transition_server(ServerState::WaitRetryClientHello)?;
        log::debug!("requesting a retry with a {} share", group.name());
        Ok(vec![HandshakeAction::SendHandshake(raw)])
    }

    fn accept_client_hello12(
        &mut self,
        message: &RawHandshake,
        hello: &ClientHello,
        version: ProtocolVersion,
        suite: CipherSuite,
    ) -> Result<Vec<HandshakeAction>> {
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;

        self.extended_master = hello
            .extensions
            .contains(ExtensionType::ExtendedMasterSecret);
        let mut send_renegotiation_info = hello.offers_scsv();
        if let Some(data) = hello.extensions.get(ExtensionType::RenegotiationInfo) {
            if !extensions::parse_renegotiation_info(data)?.is_empty() {
                return Err(Error::HandshakeFailure(
                    "Non-empty renegotiation_info on initial handshake".into(),
                ));
            }
            send_renegotiation_info = true;
        }

        provider.random().fill(&mut self.server_random)?;
        // A 1.3-capable server marks a 1.2 negotiation so a 1.3-capable
        // client can detect a stripped handshake
        if self.config.supported_versions.iter().any(|v| v.is_tls13())
            && version == ProtocolVersion::TLS1_2
        {
            self.server_random[24..].copy_from_slice(&DOWNGRADE_TLS12_SENTINEL);
        }

        let resumed = if hello.session_id.is_empty() {
            None
        } else {
            self.config
                .session_cache
                .get(&hello.session_id)
                .filter(|s| {
                    s.version == version
                        && hello.known_cipher_suites().contains(&s.suite)
                        && s.extended_master_secret == self.extended_master
                })
        };

        if let Some(session) = resumed {
            return self.resume_session12(
                message,
                version,
                session,
                send_renegotiation_info,
            );
        }

        self.transcript.set_algorithm(suite.hash_algorithm());
        self.transcript.update(&message.raw);

        let session_id = provider.random().generate(32)?;
        self.state.session_id = session_id.clone();

        let mut ext = Extensions::new();
        if self.extended_master {
            ext.push(extensions::extended_master_secret());
        }
        if send_renegotiation_info {
            ext.push(extensions::renegotiation_info(&[]));
        }
        let sh = ServerHello {
            legacy_version: version,
            random: self.server_random,
            session_id,
            cipher_suite: suite,
            extensions: ext,
        };
        let sh_raw = encode_handshake(HandshakeType::ServerHello, &sh.encode());
        self.transcript.update(&sh_raw);
        let mut actions = vec![HandshakeAction::SendHandshake(sh_raw)];

        let cert = Certificate12 {
            certificates: self.config.identity.certificate_chain.clone(),
        };
        let cert_raw = encode_handshake(HandshakeType::Certificate, &cert.encode());
        self.transcript.update(&cert_raw);
        actions.push(HandshakeAction::SendHandshake(cert_raw));

        let client_groups = hello
            .extensions
            .get(ExtensionType::SupportedGroups)
            .map(extensions::parse_supported_groups)
            .transpose()?;
        if let Some(group) = ephemeral_group(
            suite.key_exchange(),
            &self.config.supported_groups,
            client_groups.as_deref(),
        ) {
            let exchange = EphemeralExchange::generate(provider, group)?;
            let params = match group {
                KeyExchangeAlgorithm::Ffdhe2048 => ServerKeyExchangeParams::Dhe {
                    p: FFDHE2048_PRIME.to_vec(),
                    g: vec![FFDHE_GENERATOR],
                    public_key: exchange.public_key.clone(),
                },
                _ => ServerKeyExchangeParams::Ecdhe {
                    group,
                    public_key: exchange.public_key.clone(),
                },
            };
            let scheme = self.config.identity.signature_scheme(version);
            let content = ServerKeyExchange::signed_content(
                &self.client_random,
                &self.server_random,
                &params,
            );
            let signature = provider
                .signature(scheme)?
                .sign(&self.config.identity.signing_key, &content)?;
            let ske = ServerKeyExchange {
                params,
                scheme,
                signature,
            };
            let ske_raw = encode_handshake(HandshakeType::ServerKeyExchange, &ske.encode());
            self.transcript.update(&ske_raw);
            actions.push(HandshakeAction::SendHandshake(ske_raw));
            self.exchange = Some(exchange);
        } else if !matches!(suite.key_exchange(), KeyExchangeKind::Rsa) {
            return Err(Error::NegotiationFailure(
                "No common curve for the selected suite".into(),
            ));
        }

        let shd_raw = encode_handshake(HandshakeType::ServerHelloDone, &ServerHelloDone.encode());
        self.transcript.update(&shd_raw);
        actions.push(HandshakeAction::SendHandshake(shd_raw));

        self.state
            .transition_server(ServerState::WaitClientKeyExchange)?;
        Ok(actions)
    }

    fn resume_session12(
        &mut self,
        message: &RawHandshake,
        version: ProtocolVersion,
        session: Session,
        send_renegotiation_info: bool,
    ) -> Result<Vec<HandshakeAction>> {
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;
        let suite = session.suite;
        self.state.cipher_suite = Some(suite);
        self.state.session_id = session.session_id.clone();
        self.state.is_reusing_session = true;

        self.transcript.set_algorithm(suite.hash_algorithm());
        self.transcript.update(&message.raw);

        let mut ext = Extensions::new();
        if self.extended_master {
            ext.push(extensions::extended_master_secret());
        }
        if send_renegotiation_info {
            ext.push(extensions::renegotiation_info(&[]));
        }
        let sh = ServerHello {
            legacy_version: version,
            random: self.server_random,
            session_id: session.session_id.clone(),
            cipher_suite: suite,
            extensions: ext,
        };
        let sh_raw = encode_handshake(HandshakeType::ServerHello, &sh.encode());
        self.transcript.update(&sh_raw);

        let (client_state, server_state) = derive_legacy_states(
            provider,
            suite,
            version,
            &session.master_secret,
            &self.client_random,
            &self.server_random,
        )?;

        let hash = prf::finished_transcript_hash(
            provider,
            version,
            suite.hash_algorithm(),
            &self.transcript.raw_bytes(),
        )?;
        let verify_data = prf::finished_verify_data(
            provider,
            version,
            suite.hash_algorithm(),
            &session.master_secret,
            false,
            &hash,
        )?;
        let fin_raw = encode_handshake(HandshakeType::Finished, &verify_data);
        self.transcript.update(&fin_raw);

        self.master_secret = Some(session.master_secret.clone());
        self.state
            .transition_server(ServerState::WaitChangeCipherSpec)?;
        log::debug!("resuming {} session via session ID", version);
        Ok(vec![
            HandshakeAction::SendHandshake(sh_raw),
            HandshakeAction::SetPendingRead(client_state),
            HandshakeAction::SetPendingWrite(server_state),
            HandshakeAction::SendChangeCipherSpec,
            HandshakeAction::ActivateWrite,
            HandshakeAction::SendHandshake(fin_raw),
        ])
    }

    fn process_client_key_exchange(
        &mut self,
        message: &RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        let suite = self.require_suite()?;
        let version = self
            .state
            .version
            .ok_or_else(|| Error::InternalError("ClientKeyExchange before negotiation".into()))?;
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;

        let premaster: Zeroizing<Vec<u8>> = match suite.key_exchange() {
            KeyExchangeKind::Rsa => {
                let cke = ClientKeyExchange::decode(&message.body, false)?;
                unwrap_rsa_premaster(
                    provider,
                    &self.config.identity.signing_key,
                    &cke.exchange_data,
                    self.client_legacy_version,
                )?
            }
            KeyExchangeKind::EcdheRsa | KeyExchangeKind::EcdheEcdsa => {
                let cke = ClientKeyExchange::decode(&message.body, true)?;
                let exchange = self.exchange.as_ref().ok_or_else(|| {
                    Error::InternalError("ClientKeyExchange without an exchange in flight".into())
                })?;
                exchange.complete(provider, &cke.exchange_data)?
            }
            KeyExchangeKind::DheRsa => {
                let cke = ClientKeyExchange::decode(&message.body, false)?;
                let exchange = self.exchange.as_ref().ok_or_else(|| {
                    Error::InternalError("ClientKeyExchange without an exchange in flight".into())
                })?;
                exchange.complete(provider, &cke.exchange_data)?
            }
            KeyExchangeKind::Tls13 => {
                return Err(Error::InternalError(
                    "TLS 1.3 suite in the legacy flow".into(),
                ));
            }
        };

        self.transcript.update(&message.raw);

        let master = if self.extended_master {
            let session_hash = prf::finished_transcript_hash(
                provider,
                version,
                suite.hash_algorithm(),
                &self.transcript.raw_bytes(),
            )?;
            prf::extended_master_secret(
                provider,
                version,
                suite.hash_algorithm(),
                &premaster,
                &session_hash,
            )?
        } else {
            prf::master_secret(
                provider,
                version,
                suite.hash_algorithm(),
                &premaster,
                &self.client_random,
                &self.server_random,
            )?
        };
        let master = Zeroizing::new(master);

        let (client_state, server_state) = derive_legacy_states(
            provider,
            suite,
            version,
            &master,
            &self.client_random,
            &self.server_random,
        )?;
        self.master_secret = Some(master);
        self.exchange = None;

        self.state
            .transition_server(ServerState::WaitChangeCipherSpec)?;
        Ok(vec![
            HandshakeAction::SetPendingRead(client_state),
            HandshakeAction::SetPendingWrite(server_state),
        ])
    }

    fn process_finished(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        match self.state.version {
            Some(v) if v.is_tls13() => self.process_finished13(message),
            Some(v) => self.process_finished12(message, v),
            None => Err(Error::InternalError("Finished before ClientHello".into())),
        }
    }

    fn process_finished13(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        let finished = Finished::decode(&message.body);
        let suite = self.require_suite()?;
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;
        let schedule = self
            .key_schedule
            .as_ref()
            .ok_or_else(|| Error::InternalError("Finished before key schedule".into()))?;

        let hash = self.transcript.current_hash(provider)?;
        let client_secret = schedule
            .client_handshake_traffic_secret()
            .ok_or_else(|| Error::InternalError("Handshake secret missing".into()))?;
        let expected =
            compute_verify_data(provider, suite.hash_algorithm(), client_secret, &hash)?;
        if !finished.constant_time_eq(&expected) {
            return Err(Error::HandshakeFailure(
                "Client Finished verification failed".into(),
            ));
        }
        self.transcript.update(&message.raw);
        self.discarding_early_data = false;

        let client_app = schedule
            .client_application_traffic_secret()
            .ok_or_else(|| Error::InternalError("Application secret missing".into()))?
            .to_vec();
        let mut actions = vec![
            HandshakeAction::RekeyRead(CipherState::tls13(provider, suite, &client_app)?),
            HandshakeAction::HandshakeComplete,
        ];

        // Issue resumption tickets under the new application keys
        let hash = self.transcript.current_hash(provider)?;
        let resumption =
            Zeroizing::new(schedule.derive_resumption_master_secret(provider, &hash)?);
        for _ in 0..self.config.tickets_to_send {
            let nonce = self.ticket_nonce.to_be_bytes().to_vec();
            self.ticket_nonce += 1;
            let psk = schedule.derive_ticket_psk(provider, &resumption, &nonce)?;
            let label = provider.random().generate(32)?;
            let mut age = [0u8; 4];
            provider.random().fill(&mut age)?;
            let age_add = u32::from_be_bytes(age);
            self.config.ticket_store.insert(
                label.clone(),
                StoredTicket {
                    psk: Zeroizing::new(psk),
                    suite,
                    age_add,
                    lifetime: self.config.ticket_lifetime,
                    issued_at: Instant::now(),
                },
            );
            let nst = NewSessionTicket {
                lifetime: self.config.ticket_lifetime,
                age_add,
                nonce,
                ticket: label,
                extensions: Extensions::new(),
            };
            actions.push(HandshakeAction::SendHandshake(encode_handshake(
                HandshakeType::NewSessionTicket,
                &nst.encode(),
            )));
        }

        self.state.transition_server(ServerState::Connected)?;
        log::info!("TLS 1.3 handshake complete ({})", suite.name());
        Ok(actions)
    }

    fn process_finished12(
        &mut self,
        message: &RawHandshake,
        version: ProtocolVersion,
    ) -> Result<Vec<HandshakeAction>> {
        let finished = Finished::decode(&message.body);
        let suite = self.require_suite()?;
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Finished before master secret".into()))?
            .clone();

        let hash = prf::finished_transcript_hash(
            provider,
            version,
            suite.hash_algorithm(),
            &self.transcript.raw_bytes(),
        )?;
        let expected = prf::finished_verify_data(
            provider,
            version,
            suite.hash_algorithm(),
            &master,
            true,
            &hash,
        )?;
        if !finished.constant_time_eq(&expected) {
            return Err(Error::HandshakeFailure(
                "Client Finished verification failed".into(),
            ));
        }
        self.transcript.update(&message.raw);

        if self.state.is_reusing_session {
            self.state.transition_server(ServerState::Connected)?;
            log::info!("resumed {} session ({})", version, suite.name());
            return Ok(vec![HandshakeAction::HandshakeComplete]);
        }

        let hash = prf::finished_transcript_hash(
            provider,
            version,
            suite.hash_algorithm(),
            &self.transcript.raw_bytes(),
        )?;
        let verify_data = prf::finished_verify_data(
            provider,
            version,
            suite.hash_algorithm(),
            &master,
            false,
            &hash,
        )?;
        let fin_raw = encode_handshake(HandshakeType::Finished, &verify_data);
        self.transcript.update(&fin_raw);

        self.config.session_cache.insert(Session {
            session_id: self.state.session_id.clone(),
            version,
            suite,
            master_secret: master,
            extended_master_secret: self.extended_master,
        });

        self.state.transition_server(ServerState::Connected)?;
        log::info!("{} handshake complete ({})", version, suite.name());
        Ok(vec![
            HandshakeAction::SendChangeCipherSpec,
            HandshakeAction::ActivateWrite,
            HandshakeAction::SendHandshake(fin_raw),
            HandshakeAction::HandshakeComplete,
        ])
    }

    fn process_key_update(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        let update = KeyUpdate::decode(&message.body)?;
        let suite = self.require_suite()?;
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;
        let schedule = self
            .key_schedule
            .as_mut()
            .ok_or_else(|| Error::InternalError("KeyUpdate before key schedule".into()))?;

        // Peer (client) rotated its sending keys
        let client_secret = schedule.update_application_traffic_secret(provider, true)?;
        let mut actions = vec![HandshakeAction::RekeyRead(CipherState::tls13(
            provider,
            suite,
            &client_secret,
        )?)];

        if update.request_update {
            let reply = encode_handshake(
                HandshakeType::KeyUpdate,
                &KeyUpdate {
                    request_update: false,
                }
                .encode(),
            );
            let server_secret = schedule.update_application_traffic_secret(provider, false)?;
            actions.push(HandshakeAction::SendHandshake(reply));
            actions.push(HandshakeAction::RekeyWrite(CipherState::tls13(
                provider,
                suite,
                &server_secret,
            )?));
        }
        Ok(actions)
    }

    /// Rotate our sending keys, optionally demanding the peer do the
    /// same.
    pub fn initiate_key_update(&mut self, request_update: bool) -> Result<Vec<HandshakeAction>> {
        if !self.state.is_connected() {
            return Err(Error::UnexpectedMessage(
                "KeyUpdate before the handshake completed".into(),
            ));
        }
        if !self.state.version.map_or(false, |v| v.is_tls13()) {
            return Err(Error::UnsupportedFeature(
                "KeyUpdate requires TLS 1.3".into(),
            ));
        }
        let suite = self.require_suite()?;
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;
        let schedule = self
            .key_schedule
            .as_mut()
            .ok_or_else(|| Error::InternalError("KeyUpdate before key schedule".into()))?;
        let msg = encode_handshake(
            HandshakeType::KeyUpdate,
            &KeyUpdate { request_update }.encode(),
        );
        let server_secret = schedule.update_application_traffic_secret(provider, false)?;
        Ok(vec![
            HandshakeAction::SendHandshake(msg),
            HandshakeAction::RekeyWrite(CipherState::tls13(provider, suite, &server_secret)?),
        ])
    }

    fn require_suite(&self) -> Result<CipherSuite> {
        self.state
            .cipher_suite
            .ok_or_else(|| Error::InternalError("Cipher suite not negotiated".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Alert, AlertDescription, AlertLevel};
    use crate::config::{ClientConfig, Identity, Resumption};
    use crate::handshake::ClientHandshake;
    use crate::messages::HandshakeBuffer;
    use crate::x509;
    use ferrotls_crypto::{CryptoProvider, SigningKey};
    use ferrotls_crypto_rustcrypto::RustCryptoProvider;

    // RFC 6979 Appendix A.2.5 P-256 key pair
    const P256_D: [u8; 32] = [
        0xc9, 0xaf, 0xa9, 0xd8, 0x45, 0xba, 0x75, 0x16, 0x6b, 0x5c, 0x21, 0x57, 0x67, 0xb1,
        0xd6, 0x93, 0x4e, 0x50, 0xc3, 0xdb, 0x36, 0xe8, 0x9b, 0x12, 0x7b, 0x8a, 0x62, 0x2b,
        0x12, 0x0f, 0x67, 0x21,
    ];
    const P256_QX: [u8; 32] = [
        0x60, 0xfe, 0xd4, 0xba, 0x25, 0x5a, 0x9d, 0x31, 0xc9, 0x61, 0xeb, 0x74, 0xc6, 0x35,
        0x6d, 0x68, 0xc0, 0x49, 0xb8, 0x92, 0x3b, 0x61, 0xfa, 0x6c, 0xe6, 0x69, 0x62, 0x2e,
        0x60, 0xf2, 0x9f, 0xb6,
    ];
    const P256_QY: [u8; 32] = [
        0x79, 0x03, 0xfe, 0x10, 0x08, 0xb8, 0xbc, 0x99, 0xa4, 0x1a, 0xe9, 0xe9, 0x56, 0x28,
        0xbc, 0x64, 0xf2, 0xf1, 0xb2, 0x0c, 0x2d, 0x7e, 0x9f, 0x51, 0x77, 0xa3, 0xc2, 0x94,
        0xd4, 0x46, 0x22, 0x99,
    ];

    fn ecdsa_identity() -> Identity {
        let mut point = vec![0x04];
        point.extend_from_slice(&P256_QX);
        point.extend_from_slice(&P256_QY);
        let cert = x509::build_certificate(&x509::SubjectPublicKey::EcP256(point));
        Identity::new(vec![cert], SigningKey::from_bytes(P256_D.to_vec())).unwrap()
    }

    fn server_config() -> Arc<ServerConfig> {
        Arc::new(ServerConfig::new(
            Arc::new(RustCryptoProvider::new()),
            ecdsa_identity(),
        ))
    }

    fn client_config() -> Arc<ClientConfig> {
        Arc::new(ClientConfig::new(Arc::new(RustCryptoProvider::new())))
    }

    fn parse(raw: &[u8]) -> RawHandshake {
        let mut buffer = HandshakeBuffer::new();
        buffer.push(raw);
        buffer.next_message().unwrap().unwrap()
    }

    /// Run actions from one side into the other, collecting the
    /// responses. ChangeCipherSpec and key switches are protocol-level
    /// concerns exercised through the connection layer, not here.
    fn drive(
        actions: Vec<HandshakeAction>,
        client: &mut ClientHandshake,
        server: &mut ServerHandshake,
        to_server: bool,
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
                _ => {}
            }
        }
        out
    }

    fn handshake(
        client: &mut ClientHandshake,
        server: &mut ServerHandshake,
    ) {
        let mut to_server = true;
        let mut actions = client.start().unwrap();
        for _ in 0..8 {
            if client.is_connected() && server.is_connected() {
                return;
            }
            actions = drive(actions, client, server, to_server);
            to_server = !to_server;
        }
        panic!(
            "handshake did not converge (client: {:?}, server: {:?})",
            client, server
        );
    }

    #[test]
    fn test_tls13_full_handshake() {
        let mut client = ClientHandshake::new(client_config(), None).unwrap();
        let mut server = ServerHandshake::new(server_config()).unwrap();
        handshake(&mut client, &mut server);

        assert_eq!(client.version(), Some(ProtocolVersion::TLS1_3));
        assert_eq!(server.version(), Some(ProtocolVersion::TLS1_3));
        assert_eq!(client.cipher_suite(), server.cipher_suite());
        assert!(!server.is_using_psk());
    }

    #[test]
    fn test_tls13_hello_retry() {
        // The server only accepts P-256; the client's first share is
        // X25519, forcing one retry.
        let config = {
            let mut c = ServerConfig::new(Arc::new(RustCryptoProvider::new()), ecdsa_identity());
            c.supported_groups = vec![KeyExchangeAlgorithm::Secp256r1];
            Arc::new(c)
        };
        let mut client = ClientHandshake::new(client_config(), None).unwrap();
        let mut server = ServerHandshake::new(config).unwrap();

        let ch1 = client.start().unwrap();
        let hrr = drive(ch1, &mut client, &mut server, true);
        // One retry, answered with a fresh ClientHello
        let ch2 = drive(hrr, &mut client, &mut server, false);
        assert!(matches!(ch2[0], HandshakeAction::SendHandshake(_)));

        let flight = drive(ch2, &mut client, &mut server, true);
        let fin = drive(flight, &mut client, &mut server, false);
        drive(fin, &mut client, &mut server, true);

        assert!(client.is_connected());
        assert!(server.is_connected());
        assert_eq!(client.version(), Some(ProtocolVersion::TLS1_3));
    }

    #[test]
    fn test_tls13_psk_resumption_is_single_use() {
        let server_cfg = server_config();

        let mut client = ClientHandshake::new(client_config(), None).unwrap();
        let mut server = ServerHandshake::new(Arc::clone(&server_cfg)).unwrap();

        // First connection; capture the ticket the server issues
        let mut ticket = None;
        let mut actions = client.start().unwrap();
        let mut to_server = true;
        for _ in 0..8 {
            if actions.is_empty() {
                break;
            }
            let replies = drive(actions, &mut client, &mut server, to_server);
            to_server = !to_server;
            actions = Vec::new();
            for action in replies {
                if let HandshakeAction::TicketReceived(t) = action {
                    ticket = Some(t);
                } else {
                    actions.push(action);
                }
            }
        }
        let ticket = ticket.expect("no ticket issued");
        assert!(client.is_connected() && server.is_connected());
        assert_eq!(server_cfg.ticket_store.len(), 1);

        // The ticket resumes once
        let mut client =
            ClientHandshake::new(client_config(), Some(Resumption::Ticket(ticket))).unwrap();
        let mut server = ServerHandshake::new(Arc::clone(&server_cfg)).unwrap();
        handshake(&mut client, &mut server);
        assert!(server.is_using_psk());
    }

    #[test]
    fn test_early_data_requires_psk() {
        let mut client = ClientHandshake::new(client_config(), None).unwrap();
        let mut server = ServerHandshake::new(server_config()).unwrap();

        let actions = client.start().unwrap();
        let raw = match &actions[0] {
            HandshakeAction::SendHandshake(raw) => raw.clone(),
            other => panic!("expected ClientHello, got {:?}", other),
        };
        let msg = parse(&raw);
        let mut hello = ClientHello::decode(&msg.body).unwrap();
        hello.extensions.push(extensions::early_data());
        let tampered = parse(&encode_handshake(HandshakeType::ClientHello, &hello.encode()));

        let err = server.process_message(&tampered).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[test]
    fn test_early_data_offer_declined() {
        let server_cfg = server_config();

        // First connection issues the ticket
        let mut client = ClientHandshake::new(client_config(), None).unwrap();
        let mut server = ServerHandshake::new(Arc::clone(&server_cfg)).unwrap();
        let mut ticket = None;
        let mut actions = client.start().unwrap();
        let mut to_server = true;
        for _ in 0..8 {
            if actions.is_empty() {
                break;
            }
            let replies = drive(actions, &mut client, &mut server, to_server);
            to_server = !to_server;
            actions = Vec::new();
            for action in replies {
                if let HandshakeAction::TicketReceived(t) = action {
                    ticket = Some(t);
                } else {
                    actions.push(action);
                }
            }
        }
        let ticket = ticket.expect("no ticket issued");

        // Resume with an early-data offer; the server drops the offered
        // records until the client's Finished and never accepts
        let client_cfg = {
            let mut c = ClientConfig::new(Arc::new(RustCryptoProvider::new()));
            c.offer_early_data = true;
            Arc::new(c)
        };
        let mut client =
            ClientHandshake::new(client_cfg, Some(Resumption::Ticket(ticket))).unwrap();
        let mut server = ServerHandshake::new(Arc::clone(&server_cfg)).unwrap();

        let ch = client.start().unwrap();
        let flight = drive(ch, &mut client, &mut server, true);
        assert!(server.is_discarding_early_data());

        let fin = drive(flight, &mut client, &mut server, false);
        drive(fin, &mut client, &mut server, true);
        assert!(client.is_connected() && server.is_connected());
        assert!(server.is_using_psk());
        assert!(!server.is_discarding_early_data());
    }

    #[test]
    fn test_hello_request_gets_no_renegotiation_warning() {
        let server_cfg = {
            let mut c = ServerConfig::new(Arc::new(RustCryptoProvider::new()), ecdsa_identity());
            c.supported_versions = vec![ProtocolVersion::TLS1_2];
            Arc::new(c)
        };
        let mut client = ClientHandshake::new(client_config(), None).unwrap();
        let mut server = ServerHandshake::new(server_cfg).unwrap();
        handshake(&mut client, &mut server);

        let msg = parse(&encode_handshake(HandshakeType::HelloRequest, &[]));
        let actions = client.process_message(&msg).unwrap();
        assert!(matches!(
            actions[..],
            [HandshakeAction::SendAlert(Alert {
                level: AlertLevel::Warning,
                description: AlertDescription::NoRenegotiation,
            })]
        ));
        // The connection stays usable after declining
        assert!(client.is_connected());
    }

    #[test]
    fn test_tls12_session_id_resumption() {
        let server_cfg = {
            let mut c = ServerConfig::new(Arc::new(RustCryptoProvider::new()), ecdsa_identity());
            c.supported_versions = vec![ProtocolVersion::TLS1_2];
            Arc::new(c)
        };
        let client_cfg = {
            let mut c = ClientConfig::new(Arc::new(RustCryptoProvider::new()));
            c.supported_versions = vec![ProtocolVersion::TLS1_2];
            Arc::new(c)
        };

        let mut client = ClientHandshake::new(Arc::clone(&client_cfg), None).unwrap();
        let mut server = ServerHandshake::new(Arc::clone(&server_cfg)).unwrap();

        let mut session = None;
        let mut actions = client.start().unwrap();
        let mut to_server = true;
        for _ in 0..8 {
            actions = drive(actions, &mut client, &mut server, to_server);
            to_server = !to_server;
            for action in &actions {
                if let HandshakeAction::SessionEstablished(s) = action {
                    session = Some(s.clone());
                }
            }
            if client.is_connected() && server.is_connected() {
                break;
            }
        }
        assert!(client.is_connected() && server.is_connected());
        assert_eq!(client.version(), Some(ProtocolVersion::TLS1_2));
        assert_eq!(
            client.cipher_suite(),
            Some(CipherSuite::EcdheEcdsaAes128GcmSha256)
        );
        let session = session.expect("no session established");

        let mut client = ClientHandshake::new(
            Arc::clone(&client_cfg),
            Some(Resumption::Session(session)),
        )
        .unwrap();
        let mut server = ServerHandshake::new(server_cfg).unwrap();
        handshake(&mut client, &mut server);
        assert!(client.is_reusing_session());
        assert!(server.is_reusing_session());
    }

    #[test]
    fn test_downgrade_sentinel_set_when_tls13_capable() {
        let client_cfg = {
            let mut c = ClientConfig::new(Arc::new(RustCryptoProvider::new()));
            c.supported_versions = vec![ProtocolVersion::TLS1_2];
            Arc::new(c)
        };
        let mut client = ClientHandshake::new(client_cfg, None).unwrap();
        // Server supports 1.3 but this client only offers 1.2
        let mut server = ServerHandshake::new(server_config()).unwrap();

        let ch = client.start().unwrap();
        let HandshakeAction::SendHandshake(raw) = &ch[0] else {
            panic!("expected a ClientHello send");
        };
        let actions = server.process_message(&parse(raw)).unwrap();
        let HandshakeAction::SendHandshake(sh_raw) = &actions[0] else {
            panic!("expected a ServerHello send");
        };
        let sh = ServerHello::decode(&sh_raw[4..]).unwrap();
        assert_eq!(&sh.random[24..], &DOWNGRADE_TLS12_SENTINEL);
    }

    #[test]
    fn test_client_hello_out_of_order_rejected() {
        let mut server = ServerHandshake::new(server_config()).unwrap();
        let fin = RawHandshake {
            msg_type: HandshakeType::Finished,
            body: vec![0; 32],
            raw: encode_handshake(HandshakeType::Finished, &[0; 32]),
        };
        assert!(matches!(
            server.process_message(&fin),
            Err(Error::UnexpectedMessage(_))
        ));
    }
}
