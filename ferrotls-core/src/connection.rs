//! Connection orchestration.
//!
//! A [`Connection`] drives a handshake driver over a byte [`Transport`],
//! owning the record deframer, handshake reassembly, and record
//! protection. The driver emits [`HandshakeAction`]s; the connection
//! executes them in order, so key switches happen exactly where the
//! protocol places them.

use std::sync::Arc;

use crate::alert::{Alert, AlertDescription};
use crate::config::{ClientConfig, Resumption, ServerConfig};
use crate::error::{Error, Result};
use crate::handshake::{ClientHandshake, HandshakeAction, ServerHandshake};
use crate::messages::HandshakeBuffer;
use crate::protocol::{ContentType, ProtocolVersion};
use crate::record::{fragment, RecordDeframer};
use crate::record_protection::RecordProtection;
use crate::ticket::ClientTicket;
use crate::tls12::session::Session;
use ferrotls_crypto::CryptoProvider;

/// A blocking byte transport (typically a TCP stream).
pub trait Transport {
    /// Write all of `data`.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read up to `buf.len()` bytes; 0 means the peer closed.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl Transport for std::net::TcpStream {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.write_all(data)?;
        self.flush()?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        use std::io::Read;
        Ok(self.read(buf)?)
    }
}

enum Driver {
    Client(ClientHandshake),
    Server(ServerHandshake),
}

impl Driver {
    fn process_message(
        &mut self,
        message: &crate::messages::RawHandshake,
    ) -> Result<Vec<HandshakeAction>> {
        match self {
            Driver::Client(h) => h.process_message(message),
            Driver::Server(h) => h.process_message(message),
        }
    }

    fn process_change_cipher_spec(&mut self) -> Result<Vec<HandshakeAction>> {
        match self {
            Driver::Client(h) => h.process_change_cipher_spec(),
            Driver::Server(h) => h.process_change_cipher_spec(),
        }
    }

    fn initiate_key_update(&mut self, request_update: bool) -> Result<Vec<HandshakeAction>> {
        match self {
            Driver::Client(h) => h.initiate_key_update(request_update),
            Driver::Server(h) => h.initiate_key_update(request_update),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Driver::Client(h) => h.is_connected(),
            Driver::Server(h) => h.is_connected(),
        }
    }

    fn version(&self) -> Option<ProtocolVersion> {
        match self {
            Driver::Client(h) => h.version(),
            Driver::Server(h) => h.version(),
        }
    }

    fn cipher_suite(&self) -> Option<crate::cipher::CipherSuite> {
        match self {
            Driver::Client(h) => h.cipher_suite(),
            Driver::Server(h) => h.cipher_suite(),
        }
    }

    fn negotiated_alpn(&self) -> Option<&[u8]> {
        match self {
            Driver::Client(h) => h.negotiated_alpn(),
            Driver::Server(h) => h.negotiated_alpn(),
        }
    }

    fn is_reusing_session(&self) -> bool {
        match self {
            Driver::Client(h) => h.is_reusing_session(),
            Driver::Server(h) => h.is_reusing_session(),
        }
    }

    fn is_discarding_early_data(&self) -> bool {
        match self {
            Driver::Client(_) => false,
            Driver::Server(h) => h.is_discarding_early_data(),
        }
    }

    fn fail(&mut self) {
        match self {
            Driver::Client(h) => h.fail(),
            Driver::Server(h) => h.fail(),
        }
    }
}

/// A TLS connection over a transport.
pub struct Connection<T> {
    transport: T,
    provider: Arc<dyn CryptoProvider>,
    driver: Driver,
    deframer: RecordDeframer,
    handshake_buffer: HandshakeBuffer,
    protection: RecordProtection,
    plaintext_in: Vec<u8>,
    tickets: Vec<ClientTicket>,
    session: Option<Session>,
    max_early_data_skip: usize,
    early_data_skipped: usize,
    closed: bool,
    peer_closed: bool,
}

impl<T> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("version", &self.driver.version())
            .field("cipher_suite", &self.driver.cipher_suite())
            .field("closed", &self.closed)
            .finish()
    }
}

impl<T: Transport> Connection<T> {
    /// Create a client connection.
    pub fn client(
        transport: T,
        config: Arc<ClientConfig>,
        resumption: Option<Resumption>,
    ) -> Result<Self> {
        let provider = Arc::clone(&config.provider);
        Ok(Self {
            transport,
            provider,
            driver: Driver::Client(ClientHandshake::new(config, resumption)?),
            deframer: RecordDeframer::new(),
            handshake_buffer: HandshakeBuffer::new(),
            protection: RecordProtection::new(),
            plaintext_in: Vec::new(),
            tickets: Vec::new(),
            session: None,
            max_early_data_skip: 0,
            early_data_skipped: 0,
            closed: false,
            peer_closed: false,
        })
    }

    /// Create a server connection.
    pub fn server(transport: T, config: Arc<ServerConfig>) -> Result<Self> {
        let provider = Arc::clone(&config.provider);
        let max_early_data_skip = config.max_early_data_skip;
        Ok(Self {
            transport,
            provider,
            driver: Driver::Server(ServerHandshake::new(config)?),
            deframer: RecordDeframer::new(),
            handshake_buffer: HandshakeBuffer::new(),
            protection: RecordProtection::new(),
            plaintext_in: Vec::new(),
            tickets: Vec::new(),
            session: None,
            max_early_data_skip,
            early_data_skipped: 0,
            closed: false,
            peer_closed: false,
        })
    }

    /// Run the handshake to completion.
    pub fn handshake(&mut self) -> Result<()> {
        if self.driver.is_connected() {
            return Ok(());
        }
        if let Driver::Client(client) = &mut self.driver {
            let actions = client.start()?;
            self.execute(actions)?;
        }
        while !self.driver.is_connected() {
            let (content_type, payload) = self.read_record()?;
            match content_type {
                ContentType::Handshake => self.feed_handshake(&payload)?,
                ContentType::ChangeCipherSpec => {
                    if payload != [1] {
                        return Err(self.abort(Error::InvalidMessage(
                            "Malformed ChangeCipherSpec".into(),
                        )));
                    }
                    let actions = match self.driver.process_change_cipher_spec() {
                        Ok(actions) => actions,
                        Err(e) => return Err(self.abort(e)),
                    };
                    self.execute(actions)?;
                }
                ContentType::Alert => {
                    let alert = Alert::decode(&payload)?;
                    self.driver.fail();
                    return Err(Error::AlertReceived(alert.description));
                }
                ContentType::ApplicationData => {
                    return Err(self.abort(Error::UnexpectedMessage(
                        "ApplicationData during the handshake".into(),
                    )));
                }
            }
        }
        Ok(())
    }

    /// Send application data.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        if data.is_empty() {
            return Ok(());
        }
        self.write_payload(ContentType::ApplicationData, data)
    }

    /// Receive application data into `buf`. Returns 0 after the peer's
    /// close_notify. Reading remains legal after a local [`close`].
    ///
    /// [`close`]: Connection::close
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.driver.is_connected() {
            return Err(Error::UnexpectedMessage("Handshake not complete".into()));
        }
        while self.plaintext_in.is_empty() {
            if self.peer_closed {
                return Ok(0);
            }
            let (content_type, payload) = self.read_record()?;
            match content_type {
                ContentType::ApplicationData => {
                    self.plaintext_in.extend_from_slice(&payload);
                }
                // Post-handshake messages: NewSessionTicket, KeyUpdate
                ContentType::Handshake => self.feed_handshake(&payload)?,
                ContentType::ChangeCipherSpec => {
                    let actions = self.driver.process_change_cipher_spec()?;
                    self.execute(actions)?;
                }
                ContentType::Alert => {
                    let alert = Alert::decode(&payload)?;
                    if alert.description == AlertDescription::CloseNotify {
                        self.peer_closed = true;
                    } else if alert.is_fatal() {
                        self.driver.fail();
                        return Err(Error::AlertReceived(alert.description));
                    }
                }
            }
        }
        let n = self.plaintext_in.len().min(buf.len());
        buf[..n].copy_from_slice(&self.plaintext_in[..n]);
        self.plaintext_in.drain(..n);
        Ok(n)
    }

    /// Rotate our sending keys (TLS 1.3), optionally demanding the peer
    /// rotate too.
    pub fn key_update(&mut self, request_update: bool) -> Result<()> {
        self.check_open()?;
        let actions = self.driver.initiate_key_update(request_update)?;
        self.execute(actions)
    }

    /// Send close_notify and stop writing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.write_alert(Alert::close_notify())
    }

    /// Negotiated version, once known.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.driver.version()
    }

    /// Negotiated suite, once known.
    pub fn cipher_suite(&self) -> Option<crate::cipher::CipherSuite> {
        self.driver.cipher_suite()
    }

    /// Negotiated ALPN protocol, if any.
    pub fn negotiated_alpn(&self) -> Option<&[u8]> {
        self.driver.negotiated_alpn()
    }

    /// Whether the handshake has completed.
    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// Whether the connection resumed an earlier 1.2 session.
    pub fn is_reusing_session(&self) -> bool {
        self.driver.is_reusing_session()
    }

    /// Resumption tickets received so far (client, 1.3). Draining.
    pub fn take_tickets(&mut self) -> Vec<ClientTicket> {
        std::mem::take(&mut self.tickets)
    }

    /// The resumable session, once established (client, 1.2).
    pub fn take_session(&mut self) -> Option<Session> {
        self.session.take()
    }

    fn check_open(&self) -> Result<()> {
        if !self.driver.is_connected() {
            return Err(Error::UnexpectedMessage(
                "Handshake not complete".into(),
            ));
        }
        if self.closed {
            return Err(Error::IoError("Connection closed".into()));
        }
        Ok(())
    }

    fn feed_handshake(&mut self, payload: &[u8]) -> Result<()> {
        self.handshake_buffer.push(payload);
        while let Some(message) = self.handshake_buffer.next_message()? {
            let actions = match self.driver.process_message(&message) {
                Ok(actions) => actions,
                Err(e) => return Err(self.abort(e)),
            };
            self.execute(actions)?;
        }
        Ok(())
    }

    fn execute(&mut self, actions: Vec<HandshakeAction>) -> Result<()> {
        for action in actions {
            match action {
                HandshakeAction::SendHandshake(raw) => {
                    self.write_payload(ContentType::Handshake, &raw)?;
                }
                HandshakeAction::SendChangeCipherSpec => {
                    self.write_payload(ContentType::ChangeCipherSpec, &[1])?;
                }
                HandshakeAction::SendAlert(alert) => self.write_alert(alert)?,
                HandshakeAction::SetPendingWrite(state) => {
                    self.protection.set_pending_write(state);
                }
                HandshakeAction::SetPendingRead(state) => {
                    self.protection.set_pending_read(state);
                }
                HandshakeAction::ActivateWrite => self.protection.activate_write()?,
                HandshakeAction::ActivateRead => self.protection.activate_read()?,
                HandshakeAction::RekeyWrite(state) => self.protection.rekey_write(state),
                HandshakeAction::RekeyRead(state) => self.protection.rekey_read(state),
                HandshakeAction::HandshakeComplete => {}
                HandshakeAction::TicketReceived(ticket) => self.tickets.push(ticket),
                HandshakeAction::SessionEstablished(session) => self.session = Some(session),
            }
        }
        Ok(())
    }

    /// Header version for outgoing plaintext records: 0x0301 until the
    /// version is negotiated, then the negotiated version (1.3 records
    /// claim 0x0303).
    fn header_version(&self) -> ProtocolVersion {
        match self.driver.version() {
            Some(v) if v.is_pre_tls13() => v,
            Some(_) => ProtocolVersion::TLS1_2,
            None => ProtocolVersion::TLS1_0,
        }
    }

    fn write_payload(&mut self, content_type: ContentType, payload: &[u8]) -> Result<()> {
        let version = self.header_version();
        for chunk in fragment(content_type, version, payload) {
            let record =
                self.protection
                    .encrypt(&*self.provider, content_type, version, &chunk.fragment)?;
            self.transport.send(&record.encode()?)?;
        }
        Ok(())
    }

    fn write_alert(&mut self, alert: Alert) -> Result<()> {
        let version = self.header_version();
        let record = self.protection.encrypt(
            &*self.provider,
            ContentType::Alert,
            version,
            &alert.encode(),
        )?;
        self.transport.send(&record.encode()?)
    }

    /// Send a fatal alert for `error`, mark the connection failed, and
    /// hand the error back.
    fn abort(&mut self, error: Error) -> Error {
        let _ = self.write_alert(Alert::fatal(error.to_alert()));
        self.driver.fail();
        log::warn!("connection aborted: {}", error);
        error
    }

    fn read_record(&mut self) -> Result<(ContentType, Vec<u8>)> {
        loop {
            if let Some(record) = self.deframer.next_record()? {
                // ChangeCipherSpec is never protected; in 1.3 it is
                // middlebox-compatibility noise that bypasses decryption
                if record.content_type == ContentType::ChangeCipherSpec {
                    return Ok((ContentType::ChangeCipherSpec, record.fragment));
                }
                let provider = Arc::clone(&self.provider);
                match self.protection.decrypt(&*provider, &record) {
                    Ok(out) => return Ok(out),
                    // Declined 0-RTT: the client's early-data records
                    // cannot decrypt under the handshake keys and are
                    // skipped, within the configured budget
                    Err(Error::DecryptionFailed)
                        if self.driver.is_discarding_early_data()
                            && self.early_data_skipped + record.fragment.len()
                                <= self.max_early_data_skip =>
                    {
                        self.early_data_skipped += record.fragment.len();
                        log::debug!("skipped {} bytes of declined early data", record.fragment.len());
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }
            let mut buf = [0u8; 4096];
            let n = self.transport.recv(&mut buf)?;
            if n == 0 {
                return Err(Error::IoError("Connection closed by peer".into()));
            }
            self.deframer.push(&buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherSuite;
    use crate::config::Identity;
    use crate::x509;
    use ferrotls_crypto::SigningKey;
    use ferrotls_crypto_rustcrypto::RustCryptoProvider;
    use std::sync::mpsc;

    /// In-memory duplex transport; recv blocks on the channel like a
    /// socket would.
    struct ChannelTransport {
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
        pending: Vec<u8>,
    }

    fn duplex() -> (ChannelTransport, ChannelTransport) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        (
            ChannelTransport {
                tx: a_tx,
                rx: b_rx,
                pending: Vec::new(),
            },
            ChannelTransport {
                tx: b_tx,
                rx: a_rx,
                pending: Vec::new(),
            },
        )
    }

    impl Transport for ChannelTransport {
        fn send(&mut self, data: &[u8]) -> Result<()> {
            self.tx
                .send(data.to_vec())
                .map_err(|_| Error::IoError("peer gone".into()))
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.pending.is_empty() {
                match self.rx.recv() {
                    Ok(data) => self.pending = data,
                    Err(_) => return Ok(0),
                }
            }
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

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

    fn connected_pair(
        client_config: Arc<ClientConfig>,
        server_config: Arc<ServerConfig>,
    ) -> (Connection<ChannelTransport>, Connection<ChannelTransport>) {
        let (a, b) = duplex();
        let mut client = Connection::client(a, client_config, None).unwrap();
        let mut server = Connection::server(b, server_config).unwrap();
        let handle = std::thread::spawn(move || {
            server.handshake().unwrap();
            server
        });
        client.handshake().unwrap();
        (client, handle.join().unwrap())
    }

    fn default_configs() -> (Arc<ClientConfig>, Arc<ServerConfig>) {
        (
            Arc::new(ClientConfig::new(Arc::new(RustCryptoProvider::new()))),
            Arc::new(ServerConfig::new(
                Arc::new(RustCryptoProvider::new()),
                ecdsa_identity(),
            )),
        )
    }

    #[test]
    fn test_tls13_handshake_and_data() {
        let (client_cfg, server_cfg) = default_configs();
        let (mut client, mut server) = connected_pair(client_cfg, server_cfg);

        assert_eq!(client.version(), Some(ProtocolVersion::TLS1_3));
        assert_eq!(client.cipher_suite(), server.cipher_suite());

        client.send(b"ping").unwrap();
        let mut buf = [0u8; 16];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");

        server.send(b"pong").unwrap();
        let n = client.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn test_tls12_handshake_and_data() {
        let (mut client_cfg, server_cfg) = default_configs();
        Arc::get_mut(&mut client_cfg).unwrap().supported_versions =
            vec![ProtocolVersion::TLS1_2];
        let (mut client, mut server) = connected_pair(client_cfg, server_cfg);

        assert_eq!(client.version(), Some(ProtocolVersion::TLS1_2));
        assert_eq!(
            client.cipher_suite(),
            Some(CipherSuite::EcdheEcdsaAes128GcmSha256)
        );

        client.send(b"legacy data").unwrap();
        let mut buf = [0u8; 32];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"legacy data");
    }

    #[test]
    fn test_key_update_keeps_data_flowing() {
        let (client_cfg, server_cfg) = default_configs();
        let (mut client, mut server) = connected_pair(client_cfg, server_cfg);

        client.send(b"before").unwrap();
        client.key_update(true).unwrap();
        client.send(b"after").unwrap();

        let mut buf = [0u8; 16];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"before");
        // The KeyUpdate is consumed transparently by the next recv
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"after");
    }

    #[test]
    fn test_close_notify_ends_stream() {
        let (client_cfg, server_cfg) = default_configs();
        let (mut client, mut server) = connected_pair(client_cfg, server_cfg);

        client.send(b"bye").unwrap();
        client.close().unwrap();
        assert!(client.send(b"more").is_err());

        let mut buf = [0u8; 16];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"bye");
        assert_eq!(server.recv(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_send_before_handshake_rejected() {
        let (a, _b) = duplex();
        let (client_cfg, _) = default_configs();
        let mut client = Connection::client(a, client_cfg, None).unwrap();
        assert!(client.send(b"early").is_err());
    }

    #[test]
    fn test_client_ticket_arrives_after_handshake() {
        let (client_cfg, server_cfg) = default_configs();
        let (mut client, mut server) = connected_pair(client_cfg, server_cfg);

        // The ticket rides behind the server Finished; pull it in by
        // exchanging a byte of data
        server.send(b"x").unwrap();
        let mut buf = [0u8; 8];
        client.recv(&mut buf).unwrap();
        assert_eq!(client.take_tickets().len(), 1);
    }

    /// Follows the first flight with a garbage ApplicationData record,
    /// like a 0-RTT client whose early data the server cannot read.
    struct EarlyDataTransport {
        inner: ChannelTransport,
        injected: bool,
    }

    impl Transport for EarlyDataTransport {
        fn send(&mut self, data: &[u8]) -> Result<()> {
            self.inner.send(data)?;
            if !self.injected {
                self.injected = true;
                let mut record = vec![0x17, 0x03, 0x03, 0x00, 0x20];
                record.extend_from_slice(&[0xab; 0x20]);
                self.inner.send(&record)?;
            }
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.inner.recv(buf)
        }
    }

    #[test]
    fn test_declined_early_data_records_are_skipped() {
        let (client_cfg, server_cfg) = default_configs();
        let (mut client, mut server) = connected_pair(client_cfg, Arc::clone(&server_cfg));
        server.send(b"x").unwrap();
        let mut buf = [0u8; 8];
        client.recv(&mut buf).unwrap();
        let ticket = client.take_tickets().pop().expect("no ticket issued");

        // Resume with an early-data offer; the undecryptable record after
        // the ClientHello must not kill the handshake
        let resume_cfg = {
            let mut c = ClientConfig::new(Arc::new(RustCryptoProvider::new()));
            c.offer_early_data = true;
            Arc::new(c)
        };
        let (a, b) = duplex();
        let transport = EarlyDataTransport {
            inner: a,
            injected: false,
        };
        let mut client =
            Connection::client(transport, resume_cfg, Some(Resumption::Ticket(ticket))).unwrap();
        let mut server = Connection::server(b, server_cfg).unwrap();
        let handle = std::thread::spawn(move || {
            server.handshake().unwrap();
            server
        });
        client.handshake().unwrap();
        let mut server = handle.join().unwrap();

        client.send(b"after decline").unwrap();
        let mut buf = [0u8; 32];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"after decline");
    }
}
