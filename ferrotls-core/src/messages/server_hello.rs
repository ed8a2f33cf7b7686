//! ServerHello and HelloRetryRequest (RFC 8446 Section 4.1.3).
//!
//! HelloRetryRequest shares the ServerHello wire format; it is
//! identified by the fixed random value.

use crate::cipher::CipherSuite;
use crate::error::{Error, Result};
use crate::extensions::Extensions;
use crate::messages::{read_vec8, write_vec8};
use crate::protocol::ProtocolVersion;
use bytes::{Buf, BufMut, BytesMut};

/// The special random marking a ServerHello as a HelloRetryRequest
/// (SHA-256 of "HelloRetryRequest").
pub const HELLO_RETRY_REQUEST_RANDOM: [u8; 32] = [
    0xcf, 0x21, 0xad, 0x74, 0xe5, 0x9a, 0x61, 0x11, 0xbe, 0x1d, 0x8c, 0x02, 0x1e, 0x65, 0xb8,
    0x91, 0xc2, 0xa2, 0x11, 0x16, 0x7a, 0xbb, 0x8c, 0x5e, 0x07, 0x9e, 0x09, 0xe2, 0xc8, 0xa8,
    0x33, 0x9c,
];

/// The downgrade sentinel in the last 8 random bytes when a 1.3-capable
/// server negotiates 1.2 (RFC 8446 Section 4.1.3).
pub const DOWNGRADE_TLS12_SENTINEL: [u8; 8] = [0x44, 0x4f, 0x57, 0x4e, 0x47, 0x52, 0x44, 0x01];

/// ServerHello message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// legacy_version (0x0303 for 1.3; the real version for 1.0-1.2)
    pub legacy_version: ProtocolVersion,
    /// Server random
    pub random: [u8; 32],
    /// legacy_session_id_echo (1.3) or the session ID (1.2 resumption)
    pub session_id: Vec<u8>,
    /// Selected cipher suite
    pub cipher_suite: CipherSuite,
    /// Extensions
    pub extensions: Extensions,
}

impl ServerHello {
    /// Whether this ServerHello is a HelloRetryRequest.
    pub fn is_hello_retry_request(&self) -> bool {
        self.random == HELLO_RETRY_REQUEST_RANDOM
    }

    /// Encode the body (without the handshake header).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(80);
        buf.put_u16(self.legacy_version.to_u16());
        buf.put_slice(&self.random);
        write_vec8(&mut buf, &self.session_id);
        buf.put_u16(self.cipher_suite.to_u16());
        buf.put_u8(0); // legacy_compression_method
        self.extensions.encode(&mut buf);
        buf.to_vec()
    }

    /// Decode the body.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 34 {
            return Err(Error::InvalidMessage("ServerHello truncated".into()));
        }
        let legacy_version = ProtocolVersion::from_u16(data.get_u16());
        let mut random = [0u8; 32];
        data.copy_to_slice(&mut random);

        let session_id = read_vec8(&mut data)?;
        if data.remaining() < 3 {
            return Err(Error::InvalidMessage("ServerHello truncated".into()));
        }
        let suite_value = data.get_u16();
        let cipher_suite = CipherSuite::from_u16(suite_value).ok_or_else(|| {
            Error::NegotiationFailure(format!("Server selected unknown suite 0x{:04x}", suite_value))
        })?;
        if data.get_u8() != 0 {
            return Err(Error::InvalidMessage(
                "Server selected non-null compression".into(),
            ));
        }

        let extensions = if !data.is_empty() {
            let (exts, consumed) = Extensions::decode(data)?;
            if consumed != data.len() {
                return Err(Error::InvalidMessage("Trailing ServerHello bytes".into()));
            }
            exts
        } else {
            Extensions::new()
        };

        Ok(Self {
            legacy_version,
            random,
            session_id,
            cipher_suite,
            extensions,
        })
    }
}
