//! Client handshake driver.
//!
//! Covers the TLS 1.3 flow (full, HelloRetryRequest, PSK resumption)
//! and the pre-1.3 flow (RSA, DHE, ECDHE key exchange, session-ID
//! resumption). The driver consumes reassembled handshake messages and
//! emits [`HandshakeAction`]s; it never touches the transport.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::alert::{Alert, AlertDescription};
use crate::cipher::{CipherSuite, KeyExchangeKind};
use crate::config::{ClientConfig, Resumption};
use crate::error::{Error, Result};
use crate::extensions::{
    self, Extensions, KeyShareEntry, OfferedPsks, PskIdentity,
};
use crate::handshake::{scheme_matches_key, HandshakeAction};
use crate::key_schedule::KeySchedule;
use crate::messages::{
    certificate_verify, encode_handshake, Certificate12, Certificate13, CertificateVerify,
    EncryptedExtensions, Finished, KeyUpdate, NewSessionTicket, RawHandshake, ServerHello,
};
use crate::messages::server_hello::DOWNGRADE_TLS12_SENTINEL;
use crate::protocol::{
    ExtensionType, HandshakeType, ProtocolVersion, RENEGOTIATION_SCSV,
};
use crate::record_protection::{derive_legacy_states, CipherState};
use crate::state::{ClientState, ConnectionState};
use crate::ticket::ClientTicket;
use crate::tls12::key_exchange::{
    build_rsa_premaster, check_dhe_params, EphemeralExchange,
};
use crate::tls12::messages::{
    ClientKeyExchange, ServerHelloDone, ServerKeyExchange, ServerKeyExchangeParams,
};
use crate::tls12::prf;
use crate::tls12::session::Session;
use crate::transcript::{compute_verify_data, TranscriptHash};
use crate::x509::{self, SubjectPublicKey};
use ferrotls_crypto::{CryptoProvider, KeyExchangeAlgorithm};

/// Client-side handshake state.
pub struct ClientHandshake {
    config: Arc<ClientConfig>,
    state: ConnectionState,
    transcript: TranscriptHash,
    key_schedule: Option<KeySchedule>,
    client_random: [u8; 32],
    server_random: [u8; 32],
    session_id: Vec<u8>,
    offered_legacy_version: ProtocolVersion,
    key_shares: Vec<EphemeralExchange>,
    offered_ticket: Option<ClientTicket>,
    offered_session: Option<Session>,
    retry_seen: bool,
    retry_suite: Option<CipherSuite>,
    using_psk: bool,
    extended_master: bool,
    negotiated_alpn: Option<Vec<u8>>,
    server_public_key: Option<SubjectPublicKey>,
    server_kx_params: Option<ServerKeyExchangeParams>,
    master_secret: Option<Zeroizing<Vec<u8>>>,
    resumption_secret: Option<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("state", &self.state.client_state())
            .field("version", &self.state.version)
            .field("cipher_suite", &self.state.cipher_suite)
            .finish()
    }
}

impl ClientHandshake {
    /// Create a driver, optionally armed with resumption material.
    pub fn new(config: Arc<ClientConfig>, resumption: Option<Resumption>) -> Result<Self> {
        config.validate()?;
        let (offered_ticket, offered_session) = match resumption {
            Some(Resumption::Ticket(ticket)) if ticket.is_fresh() => (Some(ticket), None),
            Some(Resumption::Session(session)) => (None, Some(session)),
            _ => (None, None),
        };
        Ok(Self {
            config,
            state: ConnectionState::new_client(),
            transcript: TranscriptHash::new(ferrotls_crypto::HashAlgorithm::Sha256),
            key_schedule: None,
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            session_id: Vec::new(),
            offered_legacy_version: ProtocolVersion::TLS1_2,
            key_shares: Vec::new(),
            offered_ticket,
            offered_session,
            retry_seen: false,
            retry_suite: None,
            using_psk: false,
            extended_master: false,
            negotiated_alpn: None,
            server_public_key: None,
            server_kx_params: None,
            master_secret: None,
            resumption_secret: None,
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

    /// Mark the connection failed after a fatal error.
    pub fn fail(&mut self) {
        self.state.fail();
    }

    fn provider(&self) -> &dyn CryptoProvider {
        &*self.config.provider
    }

    fn offers_tls13(&self) -> bool {
        self.config.supported_versions.iter().any(|v| v.is_tls13())
    }

    fn offers_legacy(&self) -> bool {
        self.config
            .supported_versions
            .iter()
            .any(|v| v.is_pre_tls13())
    }

    /// Produce the opening flight.
    pub fn start(&mut self) -> Result<Vec<HandshakeAction>> {
        let provider = Arc::clone(&self.config.provider);
        provider.random().fill(&mut self.client_random)?;

        self.offered_legacy_version = self
            .config
            .supported_versions
            .iter()
            .copied()
            .filter(|v| v.is_pre_tls13())
            .max()
            .unwrap_or(ProtocolVersion::TLS1_2);

        self.session_id = if let Some(session) = &self.offered_session {
            session.session_id.clone()
        } else if self.offers_tls13() {
            // Compatibility session ID so middleboxes see a familiar shape
            self.provider().random().generate(32)?
        } else {
            Vec::new()
        };

        if self.offers_tls13() {
            let group = self.config.supported_groups[0];
            self.key_shares
                .push(EphemeralExchange::generate(self.provider(), group)?);
        }

        let raw = self.build_client_hello()?;
        self.state.transition_client(ClientState::WaitServerHello)?;
        Ok(vec![HandshakeAction::SendHandshake(raw)])
    }

    fn offered_suite_codepoints(&self) -> Vec<u16> {
        let mut suites: Vec<u16> = self
            .config
            .cipher_suites
            .iter()
            .filter(|s| {
                self.config
                    .supported_versions
                    .iter()
                    .any(|&v| s.usable_at(v))
            })
            .map(|s| s.to_u16())
            .collect();
        if self.offers_legacy() {
            suites.push(RENEGOTIATION_SCSV);
        }
        suites
    }

    /// Whether the ticket can be offered against the transcript we have
    /// (after a retry the suite hash is already fixed).
    fn ticket_offerable(&self) -> Option<&ClientTicket> {
        let ticket = self.offered_ticket.as_ref()?;
        if !self.offers_tls13() || !ticket.is_fresh() {
            return None;
        }
        let offered = self
            .config
            .cipher_suites
            .iter()
            .any(|s| s.is_tls13() && s.hash_algorithm() == ticket.suite.hash_algorithm());
        if !offered {
            return None;
        }
        if let Some(suite) = self.retry_suite {
            if suite.hash_algorithm() != ticket.suite.hash_algorithm() {
                return None;
            }
        }
        Some(ticket)
    }

    /// Build and record a ClientHello (initial or post-retry).
    fn build_client_hello(&mut self) -> Result<Vec<u8>> {
        let mut ext = Extensions::new();
        if let Some(name) = &self.config.server_name {
            ext.push(extensions::server_name(name));
        }
        if self.offers_legacy() {
            ext.push(extensions::ec_point_formats());
        }
        ext.push(extensions::supported_groups(&self.config.supported_groups));
        ext.push(extensions::signature_algorithms(
            &self.config.signature_schemes,
        ));
        if !self.config.alpn_protocols.is_empty() {
            ext.push(extensions::alpn(&self.config.alpn_protocols));
        }
        if self.offers_legacy() {
            ext.push(extensions::extended_master_secret());
        }
        if self.offers_tls13() {
            ext.push(extensions::supported_versions_client(
                &self.config.supported_versions,
            ));
            let entries: Vec<KeyShareEntry> = self
                .key_shares
                .iter()
                .map(|x| KeyShareEntry {
                    group: x.group,
                    key_exchange: x.public_key.clone(),
                })
                .collect();
            ext.push(extensions::key_share_client(&entries));
        }

        // pre_shared_key must be the last extension; it carries a
        // placeholder binder that is patched below once the message
        // bytes exist.
        let psks = self.ticket_offerable().map(|ticket| OfferedPsks {
            identities: vec![PskIdentity {
                identity: ticket.ticket.clone(),
                obfuscated_ticket_age: ticket.obfuscated_age(),
            }],
            binders: vec![vec![0u8; ticket.suite.hash_algorithm().output_size()]],
        });
        if let Some(psks) = &psks {
            // Dropped from the retried hello (RFC 8446 Section 4.1.2)
            if self.config.offer_early_data && !self.retry_seen {
                ext.push(extensions::early_data());
            }
            ext.push(extensions::psk_key_exchange_modes());
            ext.push(extensions::pre_shared_key_client(psks));
        }

        let hello = crate::messages::ClientHello {
            legacy_version: self.offered_legacy_version,
            random: self.client_random,
            session_id: self.session_id.clone(),
            cipher_suites: self.offered_suite_codepoints(),
            extensions: ext,
        };
        let mut raw = encode_handshake(HandshakeType::ClientHello, &hello.encode());

        if let Some(psks) = &psks {
            let ticket = self.offered_ticket.as_ref().ok_or_else(|| {
                Error::InternalError("PSK offered without a ticket".into())
            })?;
            self.transcript
                .set_algorithm(ticket.suite.hash_algorithm());
            let binders_len = extensions::psk_binders_length(psks);
            let truncated = &raw[..raw.len() - binders_len];

            let mut schedule = KeySchedule::new(ticket.suite);
            schedule.init_early_secret(self.provider(), &ticket.psk)?;
            let binder_key = schedule.derive_binder_key(self.provider(), false)?;
            let hash = self
                .transcript
                .hash_with_partial(self.provider(), truncated)?;
            let binder = schedule.compute_psk_binder(self.provider(), &binder_key, &hash)?;
            let at = raw.len() - binder.len();
            raw[at..].copy_from_slice(&binder);
        }

        self.transcript.update(&raw);
        Ok(raw)
    }

    /// Feed one reassembled handshake message.
    pub fn process_message(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        match (self.state.client_state(), message.msg_type) {
            (ClientState::WaitServerHello, HandshakeType::ServerHello) => {
                self.process_server_hello(message)
            }
            (ClientState::WaitEncryptedExtensions, HandshakeType::EncryptedExtensions) => {
                self.process_encrypted_extensions(message)
            }
            (ClientState::WaitCertificate, HandshakeType::Certificate) => {
                self.process_certificate13(message)
            }
            (ClientState::WaitCertificateVerify, HandshakeType::CertificateVerify) => {
                self.process_certificate_verify(message)
            }
            (ClientState::WaitCertificate12, HandshakeType::Certificate) => {
                self.process_certificate12(message)
            }
            (ClientState::WaitServerKeyExchange, HandshakeType::ServerKeyExchange) => {
                self.process_server_key_exchange(message)
            }
            (ClientState::WaitServerHelloDone, HandshakeType::ServerHelloDone) => {
                self.process_server_hello_done(message)
            }
            (ClientState::WaitFinished, HandshakeType::Finished) => {
                self.process_finished(message)
            }
            (ClientState::Connected, HandshakeType::NewSessionTicket) => {
                self.process_new_session_ticket(message)
            }
            (ClientState::Connected, HandshakeType::KeyUpdate) => {
                self.process_key_update(message)
            }
            // Legacy renegotiation is not supported; a no_renegotiation
            // warning declines the trigger without killing the
            // connection (RFC 5246 Section 7.4.1.1)
            (ClientState::Connected, HandshakeType::HelloRequest) => Ok(vec![
                HandshakeAction::SendAlert(Alert::warning(AlertDescription::NoRenegotiation)),
            ]),
            (state, msg_type) => Err(Error::UnexpectedMessage(format!(
                "{:?} in client state {:?}",
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
        if self.state.client_state() != ClientState::WaitChangeCipherSpec {
            return Err(Error::UnexpectedMessage(
                "ChangeCipherSpec outside the cipher switch point".into(),
            ));
        }
        self.state.transition_client(ClientState::WaitFinished)?;
        Ok(vec![HandshakeAction::ActivateRead])
    }

    fn process_server_hello(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        let hello = ServerHello::decode(&message.body)?;

        if hello.is_hello_retry_request() {
            return self.process_hello_retry(message, &hello);
        }

        // Version: the extension wins when present; otherwise the
        // legacy field carries a pre-1.3 version.
        let version = match hello.extensions.get(ExtensionType::SupportedVersions) {
            Some(data) => {
                let v = extensions::parse_supported_versions_server(data)?;
                if !v.is_tls13() {
                    return Err(Error::InvalidMessage(
                        "supported_versions must select TLS 1.3".into(),
                    ));
                }
                if !self.offers_tls13() {
                    return Err(Error::NegotiationFailure(
                        "Server selected a version we did not offer".into(),
                    ));
                }
                ProtocolVersion::TLS1_3
            }
            None => {
                let v = hello.legacy_version;
                if !v.is_pre_tls13() || !self.config.supported_versions.contains(&v) {
                    return Err(Error::NegotiationFailure(format!(
                        "Server selected unsupported version {}",
                        v
                    )));
                }
                if self.offers_tls13() && hello.random[24..] == DOWNGRADE_TLS12_SENTINEL {
                    return Err(Error::HandshakeFailure(
                        "Downgrade sentinel in server random".into(),
                    ));
                }
                v
            }
        };

        let suite = hello.cipher_suite;
        if !self.config.cipher_suites.contains(&suite) || !suite.usable_at(version) {
            return Err(Error::NegotiationFailure(format!(
                "Server selected unacceptable suite {}",
                suite.name()
            )));
        }
        if let Some(retry_suite) = self.retry_suite {
            if suite != retry_suite {
                return Err(Error::InvalidMessage(
                    "Suite changed between retry and ServerHello".into(),
                ));
            }
        }

        self.state.version = Some(version);
        self.state.cipher_suite = Some(suite);
        self.server_random = hello.random;
        self.transcript.set_algorithm(suite.hash_algorithm());
        self.transcript.update(&message.raw);
        log::debug!("negotiated {} with {}", version, suite.name());

        if version.is_tls13() {
            self.accept_server_hello13(&hello, suite)
        } else {
            self.accept_server_hello12(&hello, version, suite)
        }
    }

    fn process_hello_retry(
        &mut self,
        message: &RawHandshake,
        hello: &ServerHello,
    ) -> Result<Vec<HandshakeAction>> {
        if self.retry_seen {
            return Err(Error::InvalidMessage(
                "Second HelloRetryRequest".into(),
            ));
        }
        self.retry_seen = true;

        let versions = hello
            .extensions
            .get(ExtensionType::SupportedVersions)
            .ok_or_else(|| {
                Error::InvalidMessage("HelloRetryRequest without supported_versions".into())
            })?;
        if !extensions::parse_supported_versions_server(versions)?.is_tls13() {
            return Err(Error::InvalidMessage(
                "HelloRetryRequest outside TLS 1.3".into(),
            ));
        }
        let suite = hello.cipher_suite;
        if !suite.is_tls13() || !self.config.cipher_suites.contains(&suite) {
            return Err(Error::NegotiationFailure(
                "Retry selected an unacceptable suite".into(),
            ));
        }

        let group = extensions::parse_key_share_retry(
            hello
                .extensions
                .get(ExtensionType::KeyShare)
                .ok_or_else(|| Error::InvalidMessage("Retry without key_share".into()))?,
        )?;
        if !self.config.supported_groups.contains(&group) {
            return Err(Error::NegotiationFailure(
                "Retry requested a group we did not offer".into(),
            ));
        }
        if self.key_shares.iter().any(|x| x.group == group) {
            // A share for that group was already in the first flight
            return Err(Error::InvalidMessage(
                "Retry requested a group already offered".into(),
            ));
        }

        self.retry_suite = Some(suite);
        let provider = Arc::clone(&self.config.provider);
        self.transcript.set_algorithm(suite.hash_algorithm());
        self.transcript.collapse_for_retry(&*provider)?;
        self.transcript.update(&message.raw);

        self.key_shares = vec![EphemeralExchange::generate(self.provider(), group)?];
        let raw = self.build_client_hello()?;
        self.state.transition_client(ClientState::WaitServerHello)?;
        log::debug!("HelloRetryRequest answered with a {} share", group.name());
        Ok(vec![HandshakeAction::SendHandshake(raw)])
    }

    fn accept_server_hello13(
        &mut self,
        hello: &ServerHello,
        suite: CipherSuite,
    ) -> Result<Vec<HandshakeAction>> {
        if hello.session_id != self.session_id {
            return Err(Error::InvalidMessage(
                "legacy_session_id_echo mismatch".into(),
            ));
        }

        let entry = extensions::parse_key_share_server(
            hello
                .extensions
                .get(ExtensionType::KeyShare)
                .ok_or_else(|| Error::InvalidMessage("ServerHello without key_share".into()))?,
        )?;
        let exchange = self
            .key_shares
            .iter()
            .find(|x| x.group == entry.group)
            .ok_or_else(|| {
                Error::InvalidMessage("Server answered a share we did not send".into())
            })?;
        let shared = exchange.complete(self.provider(), &entry.key_exchange)?;

        let mut schedule = KeySchedule::new(suite);
        match hello.extensions.get(ExtensionType::PreSharedKey) {
            Some(data) => {
                if extensions::parse_pre_shared_key_server(data)? != 0 {
                    return Err(Error::InvalidMessage(
                        "Server accepted a PSK we did not offer".into(),
                    ));
                }
                let ticket = self.offered_ticket.as_ref().ok_or_else(|| {
                    Error::InvalidMessage("Server accepted a PSK we did not offer".into())
                })?;
                schedule.init_early_secret(self.provider(), &ticket.psk)?;
                self.using_psk = true;
            }
            None => schedule.init_early_secret(self.provider(), &[])?,
        }
        schedule.derive_handshake_secret(self.provider(), &shared)?;

        let hash = self.transcript.current_hash(self.provider())?;
        let client_secret =
            schedule.derive_client_handshake_traffic_secret(self.provider(), &hash)?;
        let server_secret =
            schedule.derive_server_handshake_traffic_secret(self.provider(), &hash)?;
        self.key_schedule = Some(schedule);

        let read = CipherState::tls13(self.provider(), suite, &server_secret)?;
        let write = CipherState::tls13(self.provider(), suite, &client_secret)?;
        self.state
            .transition_client(ClientState::WaitEncryptedExtensions)?;
        Ok(vec![
            HandshakeAction::RekeyRead(read),
            HandshakeAction::RekeyWrite(write),
        ])
    }

    fn accept_server_hello12(
        &mut self,
        hello: &ServerHello,
        version: ProtocolVersion,
        suite: CipherSuite,
    ) -> Result<Vec<HandshakeAction>> {
        self.extended_master = hello
            .extensions
            .contains(ExtensionType::ExtendedMasterSecret);
        if let Some(data) = hello.extensions.get(ExtensionType::RenegotiationInfo) {
            if !extensions::parse_renegotiation_info(data)?.is_empty() {
                return Err(Error::HandshakeFailure(
                    "Non-empty renegotiation_info on initial handshake".into(),
                ));
            }
        }

        // Session-ID resumption: the server echoed the ID we offered
        let resumed = self
            .offered_session
            .as_ref()
            .filter(|s| !hello.session_id.is_empty() && hello.session_id == s.session_id)
            .cloned();
        self.state.session_id = hello.session_id.clone();

        if let Some(session) = resumed {
            if session.version != version || session.suite != suite {
                return Err(Error::HandshakeFailure(
                    "Resumed session parameters changed".into(),
                ));
            }
            if session.extended_master_secret != self.extended_master {
                return Err(Error::HandshakeFailure(
                    "extended_master_secret flipped on resumption".into(),
                ));
            }
            self.state.is_reusing_session = true;
            let (client_state, server_state) = derive_legacy_states(
                self.provider(),
                suite,
                version,
                &session.master_secret,
                &self.client_random,
                &self.server_random,
            )?;
            self.master_secret = Some(session.master_secret.clone());
            self.state
                .transition_client(ClientState::WaitChangeCipherSpec)?;
            log::debug!("resuming session via session ID");
            return Ok(vec![
                HandshakeAction::SetPendingRead(server_state),
                HandshakeAction::SetPendingWrite(client_state),
            ]);
        }

        self.state.transition_client(ClientState::WaitCertificate12)?;
        Ok(Vec::new())
    }

    fn process_encrypted_extensions(
        &mut self,
        message: &RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        let ee = EncryptedExtensions::decode(&message.body)?;
        // No early data is ever written, so acceptance cannot be honored
        if ee.extensions.contains(ExtensionType::EarlyData) {
            return Err(Error::UnsupportedFeature(
                "Server accepted early data that was not sent".into(),
            ));
        }
        if let Some(data) = ee.extensions.get(ExtensionType::Alpn) {
            let protocols = extensions::parse_alpn(data)?;
            let selected = protocols
                .first()
                .filter(|p| self.config.alpn_protocols.contains(p))
                .ok_or_else(|| {
                    Error::HandshakeFailure("Server selected an ALPN we did not offer".into())
                })?;
            self.negotiated_alpn = Some(selected.clone());
        }
        self.transcript.update(&message.raw);
        self.state.transition_client(if self.using_psk {
            ClientState::WaitFinished
        } else {
            ClientState::WaitCertificate
        })?;
        Ok(Vec::new())
    }

    fn process_certificate13(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        let certificate = Certificate13::decode(&message.body)?;
        if !certificate.context.is_empty() {
            return Err(Error::InvalidMessage(
                "Server certificate carried a request context".into(),
            ));
        }
        let leaf = certificate
            .leaf()
            .ok_or_else(|| Error::CertificateError("Empty certificate chain".into()))?;
        self.server_public_key = Some(x509::extract_public_key(leaf)?);
        self.transcript.update(&message.raw);
        self.state
            .transition_client(ClientState::WaitCertificateVerify)?;
        Ok(Vec::new())
    }

    fn process_certificate_verify(
        &mut self,
        message: &RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        let verify = CertificateVerify::decode(&message.body)?;
        if !verify.scheme.allowed_in_tls13()
            || !self.config.signature_schemes.contains(&verify.scheme)
        {
            return Err(Error::NegotiationFailure(format!(
                "Unacceptable CertificateVerify scheme {}",
                verify.scheme.name()
            )));
        }
        let key = self
            .server_public_key
            .as_ref()
            .ok_or_else(|| Error::InternalError("CertificateVerify before Certificate".into()))?;
        if !scheme_matches_key(verify.scheme, key.kind()) {
            return Err(Error::CertificateError(
                "Signature scheme does not match the certificate key".into(),
            ));
        }

        let hash = self.transcript.current_hash(self.provider())?;
        let content = certificate_verify::signed_content(true, &hash);
        self.provider().signature(verify.scheme)?.verify(
            &ferrotls_crypto::VerifyingKey::from_bytes(key.as_bytes().to_vec()),
            &content,
            &verify.signature,
        )?;

        self.transcript.update(&message.raw);
        self.state.transition_client(ClientState::WaitFinished)?;
        Ok(Vec::new())
    }

    fn process_finished(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        match self.state.version {
            Some(v) if v.is_tls13() => self.process_finished13(message),
            Some(v) => self.process_finished12(message, v),
            None => Err(Error::InternalError("Finished before ServerHello".into())),
        }
    }

    fn process_finished13(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        let finished = Finished::decode(&message.body);
        let suite = self.require_suite()?;
        let provider = Arc::clone(&self.config.provider);
        let provider = &*provider;
        let schedule = self
            .key_schedule
            .as_mut()
            .ok_or_else(|| Error::InternalError("Finished before key schedule".into()))?;

        let hash = self.transcript.current_hash(provider)?;
        let server_secret = schedule
            .server_handshake_traffic_secret()
            .ok_or_else(|| Error::InternalError("Handshake secret missing".into()))?
            .to_vec();
        let expected =
            compute_verify_data(provider, suite.hash_algorithm(), &server_secret, &hash)?;
        if !finished.constant_time_eq(&expected) {
            return Err(Error::HandshakeFailure(
                "Server Finished verification failed".into(),
            ));
        }
        self.transcript.update(&message.raw);

        schedule.derive_master_secret(provider)?;
        let hash = self.transcript.current_hash(provider)?;
        let client_app = schedule.derive_client_application_traffic_secret(provider, &hash)?;
        let server_app = schedule.derive_server_application_traffic_secret(provider, &hash)?;

        let client_secret = schedule
            .client_handshake_traffic_secret()
            .ok_or_else(|| Error::InternalError("Handshake secret missing".into()))?
            .to_vec();
        let verify_data =
            compute_verify_data(provider, suite.hash_algorithm(), &client_secret, &hash)?;
        let fin = encode_handshake(HandshakeType::Finished, &verify_data);
        self.transcript.update(&fin);

        let resumption = schedule.derive_resumption_master_secret(
            provider,
            &self.transcript.current_hash(provider)?,
        )?;
        self.resumption_secret = Some(Zeroizing::new(resumption));

        let read = CipherState::tls13(provider, suite, &server_app)?;
        let write = CipherState::tls13(provider, suite, &client_app)?;
        self.state.transition_client(ClientState::Connected)?;
        log::info!("TLS 1.3 handshake complete ({})", suite.name());
        Ok(vec![
            HandshakeAction::SendHandshake(fin),
            HandshakeAction::RekeyWrite(write),
            HandshakeAction::RekeyRead(read),
            HandshakeAction::HandshakeComplete,
        ])
    }

    fn process_finished12(
        &mut self,
        message: &RawHandshake,
        version: ProtocolVersion,
    ) -> Result<Vec<HandshakeAction>> {
        let finished = Finished::decode(&message.body);
        let suite = self.require_suite()?;
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Finished before master secret".into()))?
            .clone();

        let hash = prf::finished_transcript_hash(
            self.provider(),
            version,
            suite.hash_algorithm(),
            &self.transcript.raw_bytes(),
        )?;
        let expected = prf::finished_verify_data(
            self.provider(),
            version,
            suite.hash_algorithm(),
            &master,
            false,
            &hash,
        )?;
        if !finished.constant_time_eq(&expected) {
            return Err(Error::HandshakeFailure(
                "Server Finished verification failed".into(),
            ));
        }
        self.transcript.update(&message.raw);

        if self.state.is_reusing_session {
            // Abbreviated handshake: our Finished closes the exchange
            let hash = prf::finished_transcript_hash(
                self.provider(),
                version,
                suite.hash_algorithm(),
                &self.transcript.raw_bytes(),
            )?;
            let verify_data = prf::finished_verify_data(
                self.provider(),
                version,
                suite.hash_algorithm(),
                &master,
                true,
                &hash,
            )?;
            let fin = encode_handshake(HandshakeType::Finished, &verify_data);
            self.transcript.update(&fin);
            self.state.transition_client(ClientState::Connected)?;
            log::info!("resumed {} session ({})", version, suite.name());
            return Ok(vec![
                HandshakeAction::SendChangeCipherSpec,
                HandshakeAction::ActivateWrite,
                HandshakeAction::SendHandshake(fin),
                HandshakeAction::HandshakeComplete,
            ]);
        }

        self.state.transition_client(ClientState::Connected)?;
        log::info!("{} handshake complete ({})", version, suite.name());
        let mut actions = Vec::new();
        if !self.state.session_id.is_empty() {
            actions.push(HandshakeAction::SessionEstablished(Session {
                session_id: self.state.session_id.clone(),
                version,
                suite,
                master_secret: master,
                extended_master_secret: self.extended_master,
            }));
        }
        actions.push(HandshakeAction::HandshakeComplete);
        Ok(actions)
    }

    fn process_certificate12(&mut self, message: &RawHandshake) -> Result<Vec<HandshakeAction>> {
        let certificate = Certificate12::decode(&message.body)?;
        let leaf = certificate
            .leaf()
            .ok_or_else(|| Error::CertificateError("Empty certificate chain".into()))?;
        let key = x509::extract_public_key(leaf)?;
        let suite = self.require_suite()?;
        if suite.certificate_kind() != Some(key.kind()) {
            return Err(Error::CertificateError(
                "Certificate key does not match the suite".into(),
            ));
        }
        self.server_public_key = Some(key);
        self.transcript.update(&message.raw);
        self.state
            .transition_client(match suite.key_exchange() {
                KeyExchangeKind::Rsa => ClientState::WaitServerHelloDone,
                _ => ClientState::WaitServerKeyExchange,
            })?;
        Ok(Vec::new())
    }

    fn process_server_key_exchange(
        &mut self,
        message: &RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        let suite = self.require_suite()?;
        let is_ecdhe = matches!(
            suite.key_exchange(),
            KeyExchangeKind::EcdheRsa | KeyExchangeKind::EcdheEcdsa
        );
        let ske = ServerKeyExchange::decode(&message.body, is_ecdhe)?;

        match &ske.params {
            ServerKeyExchangeParams::Ecdhe { group, .. } => {
                if !self.config.supported_groups.contains(group) {
                    return Err(Error::NegotiationFailure(
                        "Server chose a group we did not offer".into(),
                    ));
                }
            }
            ServerKeyExchangeParams::Dhe { p, g, .. } => check_dhe_params(p, g)?,
        }

        if !self.config.signature_schemes.contains(&ske.scheme) {
            return Err(Error::NegotiationFailure(format!(
                "Unacceptable ServerKeyExchange scheme {}",
                ske.scheme.name()
            )));
        }
        let key = self
            .server_public_key
            .as_ref()
            .ok_or_else(|| Error::InternalError("ServerKeyExchange before Certificate".into()))?;
        if !scheme_matches_key(ske.scheme, key.kind()) {
            return Err(Error::CertificateError(
                "Signature scheme does not match the certificate key".into(),
            ));
        }
        let content = ServerKeyExchange::signed_content(
            &self.client_random,
            &self.server_random,
            &ske.params,
        );
        self.provider().signature(ske.scheme)?.verify(
            &ferrotls_crypto::VerifyingKey::from_bytes(key.as_bytes().to_vec()),
            &content,
            &ske.signature,
        )?;

        self.server_kx_params = Some(ske.params);
        self.transcript.update(&message.raw);
        self.state
            .transition_client(ClientState::WaitServerHelloDone)?;
        Ok(Vec::new())
    }

    fn process_server_hello_done(
        &mut self,
        message: &RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        ServerHelloDone::decode(&message.body)?;
        self.transcript.update(&message.raw);

        let suite = self.require_suite()?;
        let version = self
            .state
            .version
            .ok_or_else(|| Error::InternalError("ServerHelloDone before ServerHello".into()))?;

        let (cke, premaster): (ClientKeyExchange, Zeroizing<Vec<u8>>) =
            match suite.key_exchange() {
                KeyExchangeKind::Rsa => {
                    let premaster =
                        build_rsa_premaster(self.provider(), self.offered_legacy_version)?;
                    let key = self.server_public_key.as_ref().ok_or_else(|| {
                        Error::InternalError("ServerHelloDone before Certificate".into())
                    })?;
                    let encrypted = self
                        .provider()
                        .key_transport()?
                        .encrypt(key.as_bytes(), &premaster)?;
                    (ClientKeyExchange::rsa(encrypted), premaster)
                }
                KeyExchangeKind::EcdheRsa | KeyExchangeKind::EcdheEcdsa => {
                    let params = self.server_kx_params.as_ref().ok_or_else(|| {
                        Error::InternalError("ServerHelloDone before ServerKeyExchange".into())
                    })?;
                    let ServerKeyExchangeParams::Ecdhe { group, public_key } = params else {
                        return Err(Error::InternalError(
                            "ECDHE suite with DHE parameters".into(),
                        ));
                    };
                    let exchange = EphemeralExchange::generate(self.provider(), *group)?;
                    let shared = exchange.complete(self.provider(), public_key)?;
                    (ClientKeyExchange::ecdhe(exchange.public_key), shared)
                }
                KeyExchangeKind::DheRsa => {
                    let params = self.server_kx_params.as_ref().ok_or_else(|| {
                        Error::InternalError("ServerHelloDone before ServerKeyExchange".into())
                    })?;
                    let ServerKeyExchangeParams::Dhe { public_key, .. } = params else {
                        return Err(Error::InternalError(
                            "DHE suite with ECDHE parameters".into(),
                        ));
                    };
                    let exchange = EphemeralExchange::generate(
                        self.provider(),
                        KeyExchangeAlgorithm::Ffdhe2048,
                    )?;
                    let shared = exchange.complete(self.provider(), public_key)?;
                    (ClientKeyExchange::dhe(exchange.public_key), shared)
                }
                KeyExchangeKind::Tls13 => {
                    return Err(Error::InternalError(
                        "TLS 1.3 suite in the legacy flow".into(),
                    ));
                }
            };

        let cke_raw = encode_handshake(HandshakeType::ClientKeyExchange, &cke.encode());
        self.transcript.update(&cke_raw);

        let master = if self.extended_master {
            let session_hash = prf::finished_transcript_hash(
                self.provider(),
                version,
                suite.hash_algorithm(),
                &self.transcript.raw_bytes(),
            )?;
            prf::extended_master_secret(
                self.provider(),
                version,
                suite.hash_algorithm(),
                &premaster,
                &session_hash,
            )?
        } else {
            prf::master_secret(
                self.provider(),
                version,
                suite.hash_algorithm(),
                &premaster,
                &self.client_random,
                &self.server_random,
            )?
        };
        let master = Zeroizing::new(master);

        let (client_state, server_state) = derive_legacy_states(
            self.provider(),
            suite,
            version,
            &master,
            &self.client_random,
            &self.server_random,
        )?;

        let hash = prf::finished_transcript_hash(
            self.provider(),
            version,
            suite.hash_algorithm(),
            &self.transcript.raw_bytes(),
        )?;
        let verify_data = prf::finished_verify_data(
            self.provider(),
            version,
            suite.hash_algorithm(),
            &master,
            true,
            &hash,
        )?;
        let fin = encode_handshake(HandshakeType::Finished, &verify_data);
        self.transcript.update(&fin);
        self.master_secret = Some(master);

        self.state
            .transition_client(ClientState::WaitChangeCipherSpec)?;
        Ok(vec![
            HandshakeAction::SendHandshake(cke_raw),
            HandshakeAction::SetPendingRead(server_state),
            HandshakeAction::SetPendingWrite(client_state),
            HandshakeAction::SendChangeCipherSpec,
            HandshakeAction::ActivateWrite,
            HandshakeAction::SendHandshake(fin),
        ])
    }

    fn process_new_session_ticket(
        &mut self,
        message: &RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        let version = self
            .state
            .version
            .ok_or_else(|| Error::InternalError("Ticket before negotiation".into()))?;
        if !version.is_tls13() {
            return Err(Error::UnexpectedMessage(
                "NewSessionTicket outside TLS 1.3".into(),
            ));
        }
        let nst = NewSessionTicket::decode(&message.body)?;
        let suite = self.require_suite()?;
        let schedule = self
            .key_schedule
            .as_ref()
            .ok_or_else(|| Error::InternalError("Ticket before key schedule".into()))?;
        let resumption = self
            .resumption_secret
            .as_ref()
            .ok_or_else(|| Error::InternalError("Ticket before resumption secret".into()))?;
        let psk = schedule.derive_ticket_psk(self.provider(), resumption, &nst.nonce)?;
        log::debug!("stored resumption ticket (lifetime {}s)", nst.lifetime);
        Ok(vec![HandshakeAction::TicketReceived(ClientTicket {
            ticket: nst.ticket,
            psk: Zeroizing::new(psk),
            suite,
            age_add: nst.age_add,
            lifetime: nst.lifetime,
            received_at: std::time::Instant::now(),
        })])
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

        // Peer (server) rotated its sending keys
        let server_secret = schedule.update_application_traffic_secret(provider, false)?;
        let mut actions = vec![HandshakeAction::RekeyRead(CipherState::tls13(
            provider,
            suite,
            &server_secret,
        )?)];

        if update.request_update {
            // The reply travels under the old write keys, then ours rotate
            let reply = encode_handshake(
                HandshakeType::KeyUpdate,
                &KeyUpdate {
                    request_update: false,
                }
                .encode(),
            );
            let client_secret = schedule.update_application_traffic_secret(provider, true)?;
            actions.push(HandshakeAction::SendHandshake(reply));
            actions.push(HandshakeAction::RekeyWrite(CipherState::tls13(
                provider,
                suite,
                &client_secret,
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
        let client_secret = schedule.update_application_traffic_secret(provider, true)?;
        Ok(vec![
            HandshakeAction::SendHandshake(msg),
            HandshakeAction::RekeyWrite(CipherState::tls13(provider, suite, &client_secret)?),
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
    use crate::extensions::parse_supported_versions_client;
    use crate::messages::ClientHello;
    use ferrotls_crypto_rustcrypto::RustCryptoProvider;

    fn config() -> Arc<ClientConfig> {
        Arc::new(ClientConfig::new(Arc::new(RustCryptoProvider::new())))
    }

    fn first_hello(driver: &mut ClientHandshake) -> ClientHello {
        let actions = driver.start().unwrap();
        let HandshakeAction::SendHandshake(raw) = &actions[0] else {
            panic!("expected a ClientHello send");
        };
        ClientHello::decode(&raw[4..]).unwrap()
    }

    #[test]
    fn test_client_hello_offers_versions_and_scsv() {
        let mut driver = ClientHandshake::new(config(), None).unwrap();
        let hello = first_hello(&mut driver);

        assert_eq!(hello.legacy_version, ProtocolVersion::TLS1_2);
        assert!(hello.offers_scsv());
        assert_eq!(hello.session_id.len(), 32);
        let versions = parse_supported_versions_client(
            hello
                .extensions
                .get(ExtensionType::SupportedVersions)
                .unwrap(),
        )
        .unwrap();
        assert!(versions.contains(&ProtocolVersion::TLS1_3));
        assert!(versions.contains(&ProtocolVersion::TLS1_0));
        assert!(hello.extensions.contains(ExtensionType::KeyShare));
        assert!(hello
            .extensions
            .contains(ExtensionType::ExtendedMasterSecret));
        assert!(!hello.extensions.contains(ExtensionType::PreSharedKey));
    }

    #[test]
    fn test_legacy_only_client_omits_tls13_extensions() {
        let mut cfg = ClientConfig::new(Arc::new(RustCryptoProvider::new()));
        cfg.supported_versions = vec![ProtocolVersion::TLS1_2];
        let mut driver = ClientHandshake::new(Arc::new(cfg), None).unwrap();
        let hello = first_hello(&mut driver);

        assert!(hello.session_id.is_empty());
        assert!(!hello.extensions.contains(ExtensionType::SupportedVersions));
        assert!(!hello.extensions.contains(ExtensionType::KeyShare));
        assert!(hello.offers_scsv());
    }

    #[test]
    fn test_ticket_offer_appends_psk_last() {
        let ticket = ClientTicket {
            ticket: vec![0x11; 16],
            psk: Zeroizing::new(vec![0x22; 32]),
            suite: CipherSuite::Tls13Aes128GcmSha256,
            age_add: 7,
            lifetime: 3600,
            received_at: std::time::Instant::now(),
        };
        let mut driver =
            ClientHandshake::new(config(), Some(Resumption::Ticket(ticket))).unwrap();
        let hello = first_hello(&mut driver);

        let last = hello.extensions.iter().last().unwrap();
        assert_eq!(last.extension_type, ExtensionType::PreSharedKey);
        assert!(hello
            .extensions
            .contains(ExtensionType::PskKeyExchangeModes));

        let psks =
            extensions::parse_pre_shared_key_client(
                hello.extensions.get(ExtensionType::PreSharedKey).unwrap(),
            )
            .unwrap();
        assert_eq!(psks.identities[0].identity, vec![0x11; 16]);
        assert_eq!(psks.binders[0].len(), 32);
        // The binder must be patched in, not left as the placeholder
        assert_ne!(psks.binders[0], vec![0u8; 32]);
    }

    #[test]
    fn test_early_data_offered_only_with_psk() {
        let cfg = {
            let mut c = ClientConfig::new(Arc::new(RustCryptoProvider::new()));
            c.offer_early_data = true;
            Arc::new(c)
        };

        // No resumption material, no offer
        let mut driver = ClientHandshake::new(Arc::clone(&cfg), None).unwrap();
        let hello = first_hello(&mut driver);
        assert!(!hello.extensions.contains(ExtensionType::EarlyData));

        let ticket = ClientTicket {
            ticket: vec![0x11; 16],
            psk: Zeroizing::new(vec![0x22; 32]),
            suite: CipherSuite::Tls13Aes128GcmSha256,
            age_add: 7,
            lifetime: 3600,
            received_at: std::time::Instant::now(),
        };
        let mut driver = ClientHandshake::new(cfg, Some(Resumption::Ticket(ticket))).unwrap();
        let hello = first_hello(&mut driver);
        assert!(hello.extensions.contains(ExtensionType::EarlyData));
        // pre_shared_key still comes last
        let last = hello.extensions.iter().last().unwrap();
        assert_eq!(last.extension_type, ExtensionType::PreSharedKey);
    }

    #[test]
    fn test_message_before_start_rejected() {
        let mut driver = ClientHandshake::new(config(), None).unwrap();
        let msg = RawHandshake {
            msg_type: HandshakeType::Finished,
            body: vec![0; 12],
            raw: encode_handshake(HandshakeType::Finished, &[0; 12]),
        };
        assert!(driver.process_message(&msg).is_err());
    }

    #[test]
    fn test_second_retry_rejected() {
        let mut driver = ClientHandshake::new(config(), None).unwrap();
        driver.start().unwrap();

        let retry = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random: crate::messages::server_hello::HELLO_RETRY_REQUEST_RANDOM,
            session_id: Vec::new(),
            cipher_suite: CipherSuite::Tls13Aes128GcmSha256,
            extensions: {
                let mut ext = Extensions::new();
                ext.push(extensions::supported_versions_server(
                    ProtocolVersion::TLS1_3,
                ));
                ext.push(extensions::key_share_retry(
                    KeyExchangeAlgorithm::Secp256r1,
                ));
                ext
            },
        };
        let raw = encode_handshake(HandshakeType::ServerHello, &retry.encode());
        let msg = RawHandshake {
            msg_type: HandshakeType::ServerHello,
            body: retry.encode(),
            raw,
        };
        let actions = driver.process_message(&msg).unwrap();
        assert!(matches!(actions[0], HandshakeAction::SendHandshake(_)));

        // A second retry (for yet another group) is fatal
        let retry2 = ServerHello {
            extensions: {
                let mut ext = Extensions::new();
                ext.push(extensions::supported_versions_server(
                    ProtocolVersion::TLS1_3,
                ));
                ext.push(extensions::key_share_retry(KeyExchangeAlgorithm::Ffdhe2048));
                ext
            },
            ..retry
        };
        let msg2 = RawHandshake {
            msg_type: HandshakeType::ServerHello,
            body: retry2.encode(),
            raw: encode_handshake(HandshakeType::ServerHello, &retry2.encode()),
        };
        assert!(driver.process_message(&msg2).is_err());
    }

    #[test]
    fn test_downgrade_sentinel_detected() {
        let mut driver = ClientHandshake::new(config(), None).unwrap();
        driver.start().unwrap();

        let mut random = [1u8; 32];
        random[24..].copy_from_slice(&DOWNGRADE_TLS12_SENTINEL);
        let hello = ServerHello {
            legacy_version: ProtocolVersion::TLS1_2,
            random,
            session_id: Vec::new(),
            cipher_suite: CipherSuite::EcdheRsaAes128GcmSha256,
            extensions: Extensions::new(),
        };
        let msg = RawHandshake {
            msg_type: HandshakeType::ServerHello,
            body: hello.encode(),
            raw: encode_handshake(HandshakeType::ServerHello, &hello.encode()),
        };
        assert!(matches!(
            driver.process_message(&msg),
            Err(Error::HandshakeFailure(_))
        ));
    }

    #[test]
    fn test_key_update_requires_connection() {
        let mut driver = ClientHandshake::new(config(), None).unwrap();
        assert!(driver.initiate_key_update(false).is_err());
    }
}
