//! Handshake message framing and codecs.
//!
//! Every handshake message carries a 4-byte header:
//!
//! ```text
//! struct {
//!     HandshakeType msg_type;
//!     uint24 length;
//!     opaque body[length];
//! } Handshake;
//! ```
//!
//! Message bodies live in the submodules. TLS 1.2-only messages
//! (ServerKeyExchange, ClientKeyExchange, ServerHelloDone) live under
//! `tls12::messages`.

pub mod certificate;
pub mod certificate_verify;
pub mod client_hello;
pub mod encrypted_extensions;
pub mod finished;
pub mod key_update;
pub mod new_session_ticket;
pub mod server_hello;

pub use certificate::{Certificate12, Certificate13, CertificateEntry};
pub use certificate_verify::CertificateVerify;
pub use client_hello::ClientHello;
pub use encrypted_extensions::EncryptedExtensions;
pub use finished::Finished;
pub use key_update::KeyUpdate;
pub use new_session_ticket::NewSessionTicket;
pub use server_hello::ServerHello;

use crate::error::{Error, Result};
use crate::protocol::HandshakeType;
use bytes::{Buf, BufMut, BytesMut};

/// Handshake message header size.
pub const HANDSHAKE_HEADER_SIZE: usize = 4;

/// Maximum handshake message body size (uint24).
pub const MAX_HANDSHAKE_SIZE: usize = 0x00ff_ffff;

/// Wrap a message body in the 4-byte handshake header.
pub fn encode_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    debug_assert!(body.len() <= MAX_HANDSHAKE_SIZE);
    let mut out = BytesMut::with_capacity(HANDSHAKE_HEADER_SIZE + body.len());
    out.put_u8(msg_type.to_u8());
    out.put_uint(body.len() as u64, 3);
    out.put_slice(body);
    out.to_vec()
}

/// A reassembled handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHandshake {
    /// Message type
    pub msg_type: HandshakeType,
    /// Body without the header
    pub body: Vec<u8>,
    /// The full message including the header, as fed to the transcript
    pub raw: Vec<u8>,
}

/// Reassembles handshake messages from record fragments.
///
/// Handshake messages may span records and several messages may share
/// one record; this buffers fragments until whole messages are
/// available.
#[derive(Debug, Default)]
pub struct HandshakeBuffer {
    buffer: Vec<u8>,
}

impl HandshakeBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record fragment of handshake content.
    pub fn push(&mut self, fragment: &[u8]) {
        self.buffer.extend_from_slice(fragment);
    }

    /// Pop the next complete handshake message, if one is buffered.
    pub fn next_message(&mut self) -> Result<Option<RawHandshake>> {
        if self.buffer.len() < HANDSHAKE_HEADER_SIZE {
            return Ok(None);
        }
        let mut header = &self.buffer[..];
        let msg_type = HandshakeType::from_u8(header.get_u8())
            .ok_or_else(|| Error::InvalidMessage("Unknown handshake type".into()))?;
        let length = header.get_uint(3) as usize;
        if self.buffer.len() < HANDSHAKE_HEADER_SIZE + length {
            return Ok(None);
        }
        let raw: Vec<u8> = self
            .buffer
            .drain(..HANDSHAKE_HEADER_SIZE + length)
            .collect();
        let body = raw[HANDSHAKE_HEADER_SIZE..].to_vec();
        Ok(Some(RawHandshake {
            msg_type,
            body,
            raw,
        }))
    }

    /// Whether any partial message bytes remain buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn take(data: &mut &[u8], len: usize) -> Result<Vec<u8>> {
    if data.remaining() < len {
        return Err(Error::InvalidMessage("Truncated vector".into()));
    }
    let out = data[..len].to_vec();
    data.advance(len);
    Ok(out)
}

/// Read a `u8`-length-prefixed vector, advancing the cursor.
pub(crate) fn read_vec8(data: &mut &[u8]) -> Result<Vec<u8>> {
    if data.remaining() < 1 {
        return Err(Error::InvalidMessage("Truncated vector".into()));
    }
    let len = data.get_u8() as usize;
    take(data, len)
}

/// Read a `u16`-length-prefixed vector, advancing the cursor.
pub(crate) fn read_vec16(data: &mut &[u8]) -> Result<Vec<u8>> {
    if data.remaining() < 2 {
        return Err(Error::InvalidMessage("Truncated vector".into()));
    }
    let len = data.get_u16() as usize;
    take(data, len)
}

/// Read a `uint24`-length-prefixed vector, advancing the cursor.
pub(crate) fn read_vec24(data: &mut &[u8]) -> Result<Vec<u8>> {
    if data.remaining() < 3 {
        return Err(Error::InvalidMessage("Truncated vector".into()));
    }
    let len = data.get_uint(3) as usize;
    take(data, len)
}

pub(crate) fn write_vec8(buf: &mut impl BufMut, data: &[u8]) {
    buf.put_u8(data.len() as u8);
    buf.put_slice(data);
}

pub(crate) fn write_vec16(buf: &mut impl BufMut, data: &[u8]) {
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

pub(crate) fn write_vec24(buf: &mut impl BufMut, data: &[u8]) {
    buf.put_uint(data.len() as u64, 3);
    buf.put_slice(data);
}
