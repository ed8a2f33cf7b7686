//! Connection state machines.
//!
//! Every handshake driver owns one of these enums and refuses any
//! message that does not match the current state. Transitions are
//! centralized here so the legal orderings are auditable in one place.

use crate::cipher::CipherSuite;
use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;

/// Connection role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client
    Client,
    /// Server
    Server,
}

/// Client handshake states, covering both the 1.3 and pre-1.3 flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Nothing sent yet
    Start,
    /// ClientHello sent, expecting ServerHello (or HelloRetryRequest)
    WaitServerHello,
    /// 1.3: expecting EncryptedExtensions
    WaitEncryptedExtensions,
    /// 1.3: expecting Certificate (or CertificateRequest)
    WaitCertificate,
    /// 1.3: expecting CertificateVerify
    WaitCertificateVerify,
    /// 1.2: expecting Certificate
    WaitCertificate12,
    /// 1.2: expecting ServerKeyExchange or ServerHelloDone
    WaitServerKeyExchange,
    /// 1.2: expecting ServerHelloDone
    WaitServerHelloDone,
    /// 1.2: expecting the server ChangeCipherSpec
    WaitChangeCipherSpec,
    /// Expecting the peer Finished
    WaitFinished,
    /// Handshake complete
    Connected,
    /// Fatal error occurred
    Failed,
}

/// Server handshake states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Expecting the first ClientHello
    Start,
    /// HelloRetryRequest sent, expecting the second ClientHello
    WaitRetryClientHello,
    /// 1.2: expecting ClientKeyExchange
    WaitClientKeyExchange,
    /// Expecting the client ChangeCipherSpec (1.2)
    WaitChangeCipherSpec,
    /// Expecting the client Finished
    WaitFinished,
    /// Handshake complete
    Connected,
    /// Fatal error occurred
    Failed,
}

impl ClientState {
    /// Legal next states.
    fn successors(self) -> &'static [ClientState] {
        use ClientState::*;
        match self {
            Start => &[WaitServerHello],
            // ServerHello forks: 1.3 full, 1.3 PSK (straight to
            // EncryptedExtensions), 1.2 full, 1.2 abbreviated, or a
            // retry that stays put
            WaitServerHello => &[
                WaitServerHello,
                WaitEncryptedExtensions,
                WaitCertificate12,
                WaitChangeCipherSpec,
                Failed,
            ],
            WaitEncryptedExtensions => &[WaitCertificate, WaitFinished, Failed],
            WaitCertificate => &[WaitCertificateVerify, Failed],
            WaitCertificateVerify => &[WaitFinished, Failed],
            WaitCertificate12 => &[WaitServerKeyExchange, WaitServerHelloDone, Failed],
            WaitServerKeyExchange => &[WaitServerHelloDone, Failed],
            WaitServerHelloDone => &[WaitChangeCipherSpec, Failed],
            WaitChangeCipherSpec => &[WaitFinished, Failed],
            WaitFinished => &[Connected, WaitChangeCipherSpec, Failed],
            Connected => &[Connected, Failed],
            Failed => &[Failed],
        }
    }
}

impl ServerState {
    fn successors(self) -> &'static [ServerState] {
        use ServerState::*;
        match self {
            Start => &[
                WaitRetryClientHello,
                WaitClientKeyExchange,
                WaitChangeCipherSpec,
                WaitFinished,
                Failed,
            ],
            WaitRetryClientHello => &[WaitFinished, Failed],
            WaitClientKeyExchange => &[WaitChangeCipherSpec, Failed],
            WaitChangeCipherSpec => &[WaitFinished, Failed],
            WaitFinished => &[Connected, Failed],
            Connected => &[Connected, Failed],
            Failed => &[Failed],
        }
    }
}

/// Shared connection-level state.
#[derive(Debug)]
pub struct ConnectionState {
    /// Connection role
    pub role: Role,
    /// Negotiated protocol version
    pub version: Option<ProtocolVersion>,
    /// Negotiated cipher suite
    pub cipher_suite: Option<CipherSuite>,
    /// Session ID in play (1.2)
    pub session_id: Vec<u8>,
    /// Whether an abbreviated handshake resumed an earlier session
    pub is_reusing_session: bool,
    client_state: Option<ClientState>,
    server_state: Option<ServerState>,
}

impl ConnectionState {
    /// Create client-side state.
    pub fn new_client() -> Self {
        Self {
            role: Role::Client,
            version: None,
            cipher_suite: None,
            session_id: Vec::new(),
            is_reusing_session: false,
            client_state: Some(ClientState::Start),
            server_state: None,
        }
    }

    /// Create server-side state.
    pub fn new_server() -> Self {
        Self {
            role: Role::Server,
            version: None,
            cipher_suite: None,
            session_id: Vec::new(),
            is_reusing_session: false,
            client_state: None,
            server_state: Some(ServerState::Start),
        }
    }

    /// Current client state (client role only).
    pub fn client_state(&self) -> ClientState {
        self.client_state.unwrap_or(ClientState::Failed)
    }

    /// Current server state (server role only).
    pub fn server_state(&self) -> ServerState {
        self.server_state.unwrap_or(ServerState::Failed)
    }

    /// Move the client state machine, rejecting illegal transitions.
    pub fn transition_client(&mut self, next: ClientState) -> Result<()> {
        let current = self.client_state();
        if !current.successors().contains(&next) {
            return Err(Error::InternalError(format!(
                "Illegal client transition {:?} -> {:?}",
                current, next
            )));
        }
        log::trace!("client state {:?} -> {:?}", current, next);
        self.client_state = Some(next);
        Ok(())
    }

    /// Move the server state machine, rejecting illegal transitions.
    pub fn transition_server(&mut self, next: ServerState) -> Result<()> {
        let current = self.server_state();
        if !current.successors().contains(&next) {
            return Err(Error::InternalError(format!(
                "Illegal server transition {:?} -> {:?}",
                current, next
            )));
        }
        log::trace!("server state {:?} -> {:?}", current, next);
        self.server_state = Some(next);
        Ok(())
    }

    /// Mark the connection failed; always legal.
    pub fn fail(&mut self) {
        match self.role {
            Role::Client => self.client_state = Some(ClientState::Failed),
            Role::Server => self.server_state = Some(ServerState::Failed),
        }
    }

    /// Whether the handshake completed.
    pub fn is_connected(&self) -> bool {
        match self.role {
            Role::Client => self.client_state == Some(ClientState::Connected),
            Role::Server => self.server_state == Some(ServerState::Connected),
        }
    }

    /// Whether a fatal error occurred.
    pub fn is_failed(&self) -> bool {
        match self.role {
            Role::Client => self.client_state == Some(ClientState::Failed),
            Role::Server => self.server_state == Some(ServerState::Failed),
        }
    }
}
