//! CertificateVerify (RFC 8446 Section 4.4.3).

use crate::error::{Error, Result};
use crate::messages::{read_vec16, write_vec16};
use bytes::{Buf, BufMut, BytesMut};
use ferrotls_crypto::SignatureScheme;

/// CertificateVerify message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    /// Signature scheme
    pub scheme: SignatureScheme,
    /// Signature over the transcript content
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(4 + self.signature.len());
        buf.put_u16(self.scheme.to_u16());
        write_vec16(&mut buf, &self.signature);
        buf.to_vec()
    }

    /// Decode the body.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.remaining() < 2 {
            return Err(Error::InvalidMessage("CertificateVerify truncated".into()));
        }
        let raw = data.get_u16();
        let scheme = SignatureScheme::from_u16(raw).ok_or_else(|| {
            Error::NegotiationFailure(format!("Unknown signature scheme 0x{:04x}", raw))
        })?;
        let signature = read_vec16(&mut data)?;
        if !data.is_empty() {
            return Err(Error::InvalidMessage(
                "Trailing CertificateVerify bytes".into(),
            ));
        }
        Ok(Self { scheme, signature })
    }
}

/// Build the content CertificateVerify signs: 64 spaces, the context
/// string, a zero byte, then the transcript hash.
pub fn signed_content(is_server: bool, transcript_hash: &[u8]) -> Vec<u8> {
    let context: &[u8] = if is_server {
        b"TLS 1.3, server CertificateVerify"
    } else {
        b"TLS 1.3, client CertificateVerify"
    };
    let mut content = Vec::with_capacity(64 + context.len() + 1 + transcript_hash.len());
    content.extend_from_slice(&[0x20; 64]);
    content.extend_from_slice(context);
    content.push(0);
    content.extend_from_slice(transcript_hash);
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let msg = CertificateVerify {
            scheme: SignatureScheme::EcdsaSecp256r1Sha256,
            signature: vec![0xde; 70],
        };
        assert_eq!(CertificateVerify::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let mut encoded = CertificateVerify {
            scheme: SignatureScheme::RsaPssRsaeSha256,
            signature: vec![1],
        }
        .encode();
        encoded[0] = 0xff;
        assert!(CertificateVerify::decode(&encoded).is_err());
    }

    #[test]
    fn test_signed_content_layout() {
        let content = signed_content(true, &[0xab; 32]);
        assert_eq!(&content[..64], &[0x20; 64]);
        assert_eq!(&content[64..97], b"TLS 1.3, server CertificateVerify");
        assert_eq!(content[97], 0);
        assert_eq!(&content[98..], &[0xab; 32]);
        assert_ne!(signed_content(false, &[0xab; 32]), content);
    }
}
