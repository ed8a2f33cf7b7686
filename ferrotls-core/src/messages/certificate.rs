//! Certificate messages.
//!
//! TLS 1.3 (RFC 8446 Section 4.4.2) wraps each certificate in an entry
//! with its own extensions and prefixes the message with a request
//! context. TLS 1.2 and below (RFC 5246 Section 7.4.2) carry a bare
//! list of DER blobs. Certificates are opaque here; the handshake
//! extracts the public key it needs via the `x509` module.

use crate::error::{Error, Result};
use crate::extensions::Extensions;
use crate::messages::{read_vec24, read_vec8, write_vec24, write_vec8};
use bytes::{Buf, BytesMut};

/// One entry in a TLS 1.3 Certificate message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    /// DER-encoded certificate
    pub cert_data: Vec<u8>,
    /// Per-certificate extensions (carried opaquely)
    pub extensions: Extensions,
}

/// TLS 1.3 Certificate message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate13 {
    /// certificate_request_context (empty in server authentication)
    pub context: Vec<u8>,
    /// Certificate list, leaf first
    pub entries: Vec<CertificateEntry>,
}

impl Certificate13 {
    /// Build a server certificate message from a DER chain.
    pub fn from_chain(chain: &[Vec<u8>]) -> Self {
        Self {
            context: Vec::new(),
            entries: chain
                .iter()
                .map(|cert| CertificateEntry {
                    cert_data: cert.clone(),
                    extensions: Extensions::new(),
                })
                .collect(),
        }
    }

    /// Leaf certificate, if any.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.entries.first().map(|e| e.cert_data.as_slice())
    }

    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut list = BytesMut::new();
        for entry in &self.entries {
            write_vec24(&mut list, &entry.cert_data);
            entry.extensions.encode(&mut list);
        }
        let mut buf = BytesMut::with_capacity(4 + self.context.len() + list.len());
        write_vec8(&mut buf, &self.context);
        write_vec24(&mut buf, &list);
        buf.to_vec()
    }

    /// Decode the body.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        let context = read_vec8(&mut data)?;
        let list = read_vec24(&mut data)?;
        if !data.is_empty() {
            return Err(Error::InvalidMessage("Trailing Certificate bytes".into()));
        }
        let mut entries = Vec::new();
        let mut rest = &list[..];
        while !rest.is_empty() {
            let cert_data = read_vec24(&mut rest)?;
            let (extensions, consumed) = Extensions::decode(rest)?;
            rest.advance(consumed);
            entries.push(CertificateEntry {
                cert_data,
                extensions,
            });
        }
        Ok(Self { context, entries })
    }
}

/// Pre-1.3 Certificate message body: a list of DER blobs, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate12 {
    /// Certificate chain
    pub certificates: Vec<Vec<u8>>,
}

impl Certificate12 {
    /// Leaf certificate, if any.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certificates.first().map(|c| c.as_slice())
    }

    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut list = BytesMut::new();
        for cert in &self.certificates {
            write_vec24(&mut list, cert);
        }
        let mut buf = BytesMut::with_capacity(3 + list.len());
        write_vec24(&mut buf, &list);
        buf.to_vec()
    }

    /// Decode the body.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        let list = read_vec24(&mut data)?;
        if !data.is_empty() {
            return Err(Error::InvalidMessage("Trailing Certificate bytes".into()));
        }
        let mut certificates = Vec::new();
        let mut rest = &list[..];
        while !rest.is_empty() {
            certificates.push(read_vec24(&mut rest)?);
        }
        Ok(Self { certificates })
    }
}
