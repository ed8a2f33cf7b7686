//! EncryptedExtensions (RFC 8446 Section 4.3.1).

use crate::error::{Error, Result};
use crate::extensions::Extensions;

/// EncryptedExtensions message body: the server's non-cryptographic
/// extension answers (ALPN, SNI acknowledgment), sent under the
/// handshake keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptedExtensions {
    /// Extensions
    pub extensions: Extensions,
}

impl EncryptedExtensions {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.extensions.encode(&mut buf);
        buf
    }

    /// Decode the body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (extensions, consumed) = Extensions::decode(data)?;
        if consumed != data.len() {
            return Err(Error::InvalidMessage(
                "Trailing EncryptedExtensions bytes".into(),
            ));
        }
        Ok(Self { extensions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::alpn;

    #[test]
    fn test_roundtrip() {
        let mut msg = EncryptedExtensions::default();
        msg.extensions.push(alpn(&[b"h2".to_vec()]));
        assert_eq!(EncryptedExtensions::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_empty() {
        let msg = EncryptedExtensions::default();
        let encoded = msg.encode();
        assert_eq!(encoded, vec![0, 0]);
        assert_eq!(EncryptedExtensions::decode(&encoded).unwrap(), msg);
    }
}
