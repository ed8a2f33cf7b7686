//! Blocking TLS stream over a connected transport.

use std::io;

use ferrotls_core::connection::{Connection, Transport};
use ferrotls_core::ticket::ClientTicket;
use ferrotls_core::tls12::session::Session;
use ferrotls_core::{CipherSuite, Error, ProtocolVersion, Result};

/// A TLS connection with its handshake complete, exposing
/// [`std::io::Read`] and [`std::io::Write`] over the protected channel.
pub struct TlsStream<T> {
    connection: Connection<T>,
}

impl<T> std::fmt::Debug for TlsStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsStream")
            .field("connection", &self.connection)
            .finish()
    }
}

impl<T: Transport> TlsStream<T> {
    pub(crate) fn new(connection: Connection<T>) -> Self {
        Self { connection }
    }

    /// The negotiated protocol version.
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.connection.version()
    }

    /// The negotiated cipher suite.
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.connection.cipher_suite()
    }

    /// The ALPN protocol the server selected, if any.
    pub fn negotiated_alpn(&self) -> Option<&[u8]> {
        self.connection.negotiated_alpn()
    }

    /// Whether the handshake resumed an earlier connection.
    pub fn is_resumed(&self) -> bool {
        self.connection.is_reusing_session()
    }

    /// Session tickets received so far (TLS 1.3). Draining; tickets may
    /// keep arriving as application data is read.
    pub fn take_tickets(&mut self) -> Vec<ClientTicket> {
        self.connection.take_tickets()
    }

    /// The established session for TLS 1.2 session-ID resumption, if
    /// the server offered one.
    pub fn take_session(&mut self) -> Option<Session> {
        self.connection.take_session()
    }

    /// Rotate our traffic keys, optionally asking the peer to do the
    /// same (TLS 1.3 only).
    pub fn key_update(&mut self, request_update: bool) -> Result<()> {
        self.connection.key_update(request_update)
    }

    /// Send close_notify. Reading remains possible until the peer
    /// closes its direction.
    pub fn close(&mut self) -> Result<()> {
        self.connection.close()
    }

    /// Access the underlying connection.
    pub fn connection(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }
}

fn to_io_error(error: Error) -> io::Error {
    match error {
        Error::IoError(message) => io::Error::other(message),
        alert @ Error::AlertReceived(_) => {
            io::Error::new(io::ErrorKind::ConnectionAborted, alert)
        }
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl<T: Transport> io::Read for TlsStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connection.recv(buf).map_err(to_io_error)
    }
}

impl<T: Transport> io::Write for TlsStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.connection.send(buf).map_err(to_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
