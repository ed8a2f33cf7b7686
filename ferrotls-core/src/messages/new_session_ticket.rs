//! NewSessionTicket (RFC 8446 Section 4.6.1).

use crate::error::{Error, Result};
use crate::extensions::Extensions;
use crate::messages::{read_vec16, read_vec8, write_vec16, write_vec8};
use crate::protocol::ExtensionType;
use bytes::{Buf, BufMut, BytesMut};

/// NewSessionTicket message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSessionTicket {
    /// ticket_lifetime in seconds
    pub lifetime: u32,
    /// ticket_age_add, the client's age obfuscation value
    pub age_add: u32,
    /// ticket_nonce, unique per ticket on this connection
    pub nonce: Vec<u8>,
    /// Opaque ticket label
    pub ticket: Vec<u8>,
    /// Extensions (early_data carries the 0-RTT limit; we carry them
    /// opaquely)
    pub extensions: Extensions,
}

impl NewSessionTicket {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(16 + self.nonce.len() + self.ticket.len());
        buf.put_u32(self.lifetime);
        buf.put_u32(self.age_add);
        write_vec8(&mut buf, &self.nonce);
        write_vec16(&mut buf, &self.ticket);
        self.extensions.encode(&mut buf);
        buf.to_vec()
    }

    /// Decode the body.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::InvalidMessage("NewSessionTicket truncated".into()));
        }
        let lifetime = data.get_u32();
        let age_add = data.get_u32();
        let nonce = read_vec8(&mut data)?;
        let ticket = read_vec16(&mut data)?;
        if ticket.is_empty() {
            return Err(Error::InvalidMessage("Empty session ticket".into()));
        }
        let (extensions, consumed) = Extensions::decode(data)?;
        if consumed != data.len() {
            return Err(Error::InvalidMessage(
                "Trailing NewSessionTicket bytes".into(),
            ));
        }
        Ok(Self {
            lifetime,
            age_add,
            nonce,
            ticket,
            extensions,
        })
    }

    /// max_early_data_size from the ticket's early_data extension, if
    /// the ticket permits 0-RTT (RFC 8446 Section 4.6.1).
    pub fn max_early_data_size(&self) -> Option<u32> {
        let mut data = self.extensions.get(ExtensionType::EarlyData)?;
        if data.len() != 4 {
            return None;
        }
        Some(data.get_u32())
    }
}
