//! TLS record layer framing.
//!
//! ```text
//! struct {
//!     ContentType type;
//!     ProtocolVersion legacy_record_version;
//!     uint16 length;
//!     opaque fragment[TLSPlaintext.length];
//! } TLSPlaintext;
//! ```
//!
//! Handshake messages may be fragmented across records and several
//! messages may share one record; `RecordDeframer` reassembles the byte
//! stream into whole records and `HandshakeBuffer` (messages module)
//! reassembles handshake messages.

use crate::error::{Error, Result};
use crate::protocol::{ContentType, ProtocolVersion};

/// Maximum plaintext fragment size.
pub const MAX_FRAGMENT_SIZE: usize = 16384;

/// Maximum protected fragment size (plaintext + expansion allowance).
pub const MAX_CIPHERTEXT_SIZE: usize = MAX_FRAGMENT_SIZE + 2048;

/// TLS record header size (5 bytes).
pub const RECORD_HEADER_SIZE: usize = 5;

/// A single TLS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsRecord {
    /// Content type from the header
    pub content_type: ContentType,
    /// Version from the header (not authoritative after negotiation)
    pub version: ProtocolVersion,
    /// Fragment payload
    pub fragment: Vec<u8>,
}

impl TlsRecord {
    /// Create a new record.
    pub fn new(content_type: ContentType, version: ProtocolVersion, fragment: Vec<u8>) -> Self {
        Self {
            content_type,
            version,
            fragment,
        }
    }

    /// Encode to wire format.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.fragment.len() > MAX_CIPHERTEXT_SIZE {
            return Err(Error::InvalidMessage("Record fragment too large".into()));
        }
        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + self.fragment.len());
        buf.push(self.content_type.to_u8());
        buf.extend_from_slice(&self.version.to_u16().to_be_bytes());
        buf.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.fragment);
        Ok(buf)
    }

    /// Decode one record from the start of `data`. Returns the record
    /// and the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < RECORD_HEADER_SIZE {
            return Err(Error::InvalidMessage("Record too short".into()));
        }
        let content_type = ContentType::from_u8(data[0])
            .ok_or_else(|| Error::InvalidMessage("Invalid content type".into()))?;
        let version = ProtocolVersion::from_u16(u16::from_be_bytes([data[1], data[2]]));
        let length = u16::from_be_bytes([data[3], data[4]]) as usize;
        if length > MAX_CIPHERTEXT_SIZE {
            return Err(Error::InvalidMessage("Record overflow".into()));
        }
        if data.len() < RECORD_HEADER_SIZE + length {
            return Err(Error::InvalidMessage("Incomplete record".into()));
        }
        let fragment = data[RECORD_HEADER_SIZE..RECORD_HEADER_SIZE + length].to_vec();
        Ok((
            Self {
                content_type,
                version,
                fragment,
            },
            RECORD_HEADER_SIZE + length,
        ))
    }
}

/// Split a payload into records of at most `MAX_FRAGMENT_SIZE`.
pub fn fragment(
    content_type: ContentType,
    version: ProtocolVersion,
    data: &[u8],
) -> Vec<TlsRecord> {
    if data.is_empty() {
        return vec![TlsRecord::new(content_type, version, Vec::new())];
    }
    data.chunks(MAX_FRAGMENT_SIZE)
        .map(|chunk| TlsRecord::new(content_type, version, chunk.to_vec()))
        .collect()
}

/// Incremental record parser over a byte stream.
///
/// Feed raw bytes as they arrive; take complete records out. Partial
/// records stay buffered until the rest shows up.
#[derive(Debug, Default)]
pub struct RecordDeframer {
    buffer: Vec<u8>,
}

impl RecordDeframer {
    /// Create an empty deframer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes from the transport.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Pop the next complete record, if one is buffered.
    pub fn next_record(&mut self) -> Result<Option<TlsRecord>> {
        if self.buffer.len() < RECORD_HEADER_SIZE {
            return Ok(None);
        }
        let length = u16::from_be_bytes([self.buffer[3], self.buffer[4]]) as usize;
        if length > MAX_CIPHERTEXT_SIZE {
            return Err(Error::InvalidMessage("Record overflow".into()));
        }
        if self.buffer.len() < RECORD_HEADER_SIZE + length {
            return Ok(None);
        }
        let (record, consumed) = TlsRecord::decode(&self.buffer)?;
        self.buffer.drain(..consumed);
        Ok(Some(record))
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let record = TlsRecord::new(
            ContentType::Handshake,
            ProtocolVersion::TLS1_2,
            vec![1, 2, 3, 4],
        );
        let encoded = record.encode().unwrap();
        assert_eq!(encoded.len(), RECORD_HEADER_SIZE + 4);
        let (decoded, consumed) = TlsRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_fragmentation_preserves_bytes() {
        let data = vec![0x5au8; MAX_FRAGMENT_SIZE + 100];
        let records = fragment(
            ContentType::ApplicationData,
            ProtocolVersion::TLS1_2,
            &data,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fragment.len(), MAX_FRAGMENT_SIZE);
        assert_eq!(records[1].fragment.len(), 100);
        let total: usize = records.iter().map(|r| r.fragment.len()).sum();
        assert_eq!(total, data.len());
    }

    #[test]
    fn test_deframer_handles_split_input() {
        let record = TlsRecord::new(
            ContentType::Alert,
            ProtocolVersion::TLS1_2,
            vec![2, 20],
        );
        let encoded = record.encode().unwrap();

        let mut deframer = RecordDeframer::new();
        deframer.push(&encoded[..3]);
        assert!(deframer.next_record().unwrap().is_none());
        deframer.push(&encoded[3..]);
        let out = deframer.next_record().unwrap().unwrap();
        assert_eq!(out, record);
        assert!(deframer.next_record().unwrap().is_none());
    }

    #[test]
    fn test_deframer_handles_coalesced_records() {
        let a = TlsRecord::new(ContentType::Handshake, ProtocolVersion::TLS1_2, vec![1]);
        let b = TlsRecord::new(ContentType::Handshake, ProtocolVersion::TLS1_2, vec![2]);
        let mut bytes = a.encode().unwrap();
        bytes.extend_from_slice(&b.encode().unwrap());

        let mut deframer = RecordDeframer::new();
        deframer.push(&bytes);
        assert_eq!(deframer.next_record().unwrap().unwrap(), a);
        assert_eq!(deframer.next_record().unwrap().unwrap(), b);
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut deframer = RecordDeframer::new();
        let mut header = vec![22, 3, 3];
        header.extend_from_slice(&(0xffffu16).to_be_bytes());
        deframer.push(&header);
        assert!(deframer.next_record().is_err());
    }
}
