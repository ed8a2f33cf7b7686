//! ClientHello (RFC 8446 Section 4.1.2, RFC 5246 Section 7.4.1.2).

use crate::cipher::CipherSuite;
use crate::error::{Error, Result};
use crate::extensions::Extensions;
use crate::messages::{read_vec8, write_vec8};
use crate::protocol::{ProtocolVersion, RENEGOTIATION_SCSV};
use bytes::{Buf, BufMut, BytesMut};

/// ClientHello message body.
///
/// Cipher suites are kept as raw codepoints so the SCSV and suites we
/// do not implement survive parsing; `known_cipher_suites` filters to
/// the ones negotiation can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// legacy_version (0x0303 when 1.3 is offered via supported_versions)
    pub legacy_version: ProtocolVersion,
    /// Client random
    pub random: [u8; 32],
    /// legacy_session_id (1.2 resumption, compatibility padding in 1.3)
    pub session_id: Vec<u8>,
    /// Offered cipher suites, raw codepoints in offer order
    pub cipher_suites: Vec<u16>,
    /// Extensions
    pub extensions: Extensions,
}

impl ClientHello {
    /// Suites we implement, in the client's offer order.
    pub fn known_cipher_suites(&self) -> Vec<CipherSuite> {
        self.cipher_suites
            .iter()
            .filter_map(|&cs| CipherSuite::from_u16(cs))
            .collect()
    }

    /// Whether the renegotiation SCSV is offered.
    pub fn offers_scsv(&self) -> bool {
        self.cipher_suites.contains(&RENEGOTIATION_SCSV)
    }

    /// Encode the body (without the handshake header).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_u16(self.legacy_version.to_u16());
        buf.put_slice(&self.random);
        write_vec8(&mut buf, &self.session_id);
        buf.put_u16((self.cipher_suites.len() * 2) as u16);
        for cs in &self.cipher_suites {
            buf.put_u16(*cs);
        }
        // legacy_compression_methods: null only
        buf.put_slice(&[1, 0]);
        self.extensions.encode(&mut buf);
        buf.to_vec()
    }

    /// Decode the body.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 34 {
            return Err(Error::InvalidMessage("ClientHello truncated".into()));
        }
        let legacy_version = ProtocolVersion::from_u16(data.get_u16());
        let mut random = [0u8; 32];
        data.copy_to_slice(&mut random);

        let session_id = read_vec8(&mut data)?;
        if session_id.len() > 32 {
            return Err(Error::InvalidMessage("Session ID too long".into()));
        }

        if data.remaining() < 2 {
            return Err(Error::InvalidMessage("ClientHello truncated".into()));
        }
        let suites_len = data.get_u16() as usize;
        if suites_len == 0 || suites_len % 2 != 0 || data.remaining() < suites_len {
            return Err(Error::InvalidMessage("Malformed cipher suite list".into()));
        }
        let cipher_suites = data[..suites_len]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        data.advance(suites_len);

        let compressions = read_vec8(&mut data)?;
        if !compressions.contains(&0) {
            return Err(Error::InvalidMessage(
                "Null compression must be offered".into(),
            ));
        }

        let extensions = if !data.is_empty() {
            let (exts, consumed) = Extensions::decode(data)?;
            if consumed != data.len() {
                return Err(Error::InvalidMessage("Trailing ClientHello bytes".into()));
            }
            exts
        } else {
            Extensions::new()
        };

        Ok(Self {
            legacy_version,
            random,
            session_id,
            cipher_suites,
            extensions,
        })
    }
}
