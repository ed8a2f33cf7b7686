//! KeyUpdate (RFC 8446 Section 4.6.3).

use crate::error::{Error, Result};

/// KeyUpdate message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUpdate {
    /// update_requested: whether the peer must rotate its own keys and
    /// answer with a KeyUpdate of its own
    pub request_update: bool,
}

impl KeyUpdate {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        vec![u8::from(self.request_update)]
    }

    /// Decode the body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        match data {
            [0] => Ok(Self {
                request_update: false,
            }),
            [1] => Ok(Self {
                request_update: true,
            }),
            _ => Err(Error::InvalidMessage("Malformed KeyUpdate".into())),
        }
    }
}
