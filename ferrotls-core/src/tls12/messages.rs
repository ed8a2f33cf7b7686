//! Handshake messages specific to TLS 1.2 and below.

use crate::error::{Error, Result};
use crate::messages::{read_vec16, read_vec8, write_vec16, write_vec8};
use bytes::{Buf, BufMut, BytesMut};
use ferrotls_crypto::{KeyExchangeAlgorithm, SignatureScheme};

/// ECCurveType named_curve (RFC 4492 Section 5.4).
const CURVE_TYPE_NAMED: u8 = 3;

/// Key exchange parameters carried in ServerKeyExchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchangeParams {
    /// Ephemeral ECDH over a named curve
    Ecdhe {
        /// Named group
        group: KeyExchangeAlgorithm,
        /// Uncompressed point (or X25519 u-coordinate)
        public_key: Vec<u8>,
    },
    /// Ephemeral finite-field DH
    Dhe {
        /// Prime modulus
        p: Vec<u8>,
        /// Generator
        g: Vec<u8>,
        /// Server public value
        public_key: Vec<u8>,
    },
}

impl ServerKeyExchangeParams {
    /// Encode just the params (the signature covers these bytes).
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        match self {
            ServerKeyExchangeParams::Ecdhe { group, public_key } => {
                buf.put_u8(CURVE_TYPE_NAMED);
                buf.put_u16(group.to_u16());
                write_vec8(&mut buf, public_key);
            }
            ServerKeyExchangeParams::Dhe { p, g, public_key } => {
                write_vec16(&mut buf, p);
                write_vec16(&mut buf, g);
                write_vec16(&mut buf, public_key);
            }
        }
        buf.to_vec()
    }

    fn decode_ecdhe(data: &mut &[u8]) -> Result<Self> {
        if data.remaining() < 3 {
            return Err(Error::InvalidMessage("ServerKeyExchange truncated".into()));
        }
        if data.get_u8() != CURVE_TYPE_NAMED {
            return Err(Error::NegotiationFailure(
                "Only named curves are supported".into(),
            ));
        }
        let raw = data.get_u16();
        let group = KeyExchangeAlgorithm::from_u16(raw).ok_or_else(|| {
            Error::NegotiationFailure(format!("Server chose unknown group 0x{:04x}", raw))
        })?;
        let public_key = read_vec8(data)?;
        Ok(ServerKeyExchangeParams::Ecdhe { group, public_key })
    }

    fn decode_dhe(data: &mut &[u8]) -> Result<Self> {
        let p = read_vec16(data)?;
        let g = read_vec16(data)?;
        let public_key = read_vec16(data)?;
        Ok(ServerKeyExchangeParams::Dhe { p, g, public_key })
    }
}

/// ServerKeyExchange message body (TLS 1.2 signed form).
///
/// The signature covers `client_random || server_random || params`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    /// Key exchange parameters
    pub params: ServerKeyExchangeParams,
    /// SignatureAndHashAlgorithm codepoint
    pub scheme: SignatureScheme,
    /// Signature over randoms and params
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.params.encode();
        buf.put_u16(self.scheme.to_u16());
        write_vec16(&mut buf, &self.signature);
        buf
    }

    /// Decode the body. The suite determines which params layout to
    /// expect, so the caller passes whether the exchange is ECDHE.
    pub fn decode(mut data: &[u8], is_ecdhe: bool) -> Result<Self> {
        let params = if is_ecdhe {
            ServerKeyExchangeParams::decode_ecdhe(&mut data)?
        } else {
            ServerKeyExchangeParams::decode_dhe(&mut data)?
        };
        if data.remaining() < 2 {
            return Err(Error::InvalidMessage("ServerKeyExchange truncated".into()));
        }
        let raw = data.get_u16();
        let scheme = SignatureScheme::from_u16(raw).ok_or_else(|| {
            Error::NegotiationFailure(format!("Unknown signature scheme 0x{:04x}", raw))
        })?;
        let signature = read_vec16(&mut data)?;
        if !data.is_empty() {
            return Err(Error::InvalidMessage(
                "Trailing ServerKeyExchange bytes".into(),
            ));
        }
        Ok(Self {
            params,
            scheme,
            signature,
        })
    }

    /// The bytes the signature covers.
    pub fn signed_content(
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        params: &ServerKeyExchangeParams,
    ) -> Vec<u8> {
        let params_bytes = params.encode();
        let mut content = Vec::with_capacity(64 + params_bytes.len());
        content.extend_from_slice(client_random);
        content.extend_from_slice(server_random);
        content.extend_from_slice(&params_bytes);
        content
    }
}

/// ClientKeyExchange message body.
///
/// The layout depends on the key exchange: RSA wraps the encrypted
/// premaster secret with a u16 length, ECDHE sends a u8-prefixed point,
/// DHE a u16-prefixed public value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKeyExchange {
    /// Exchange payload (encrypted premaster or public key)
    pub exchange_data: Vec<u8>,
    /// Whether the payload uses the u8 length form (ECDHE)
    pub short_form: bool,
}

impl ClientKeyExchange {
    /// RSA form: the PKCS#1-encrypted premaster secret.
    pub fn rsa(encrypted_premaster: Vec<u8>) -> Self {
        Self {
            exchange_data: encrypted_premaster,
            short_form: false,
        }
    }

    /// ECDHE form: the client public point.
    pub fn ecdhe(public_key: Vec<u8>) -> Self {
        Self {
            exchange_data: public_key,
            short_form: true,
        }
    }

    /// DHE form: the client public value.
    pub fn dhe(public_key: Vec<u8>) -> Self {
        Self {
            exchange_data: public_key,
            short_form: false,
        }
    }

    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(2 + self.exchange_data.len());
        if self.short_form {
            write_vec8(&mut buf, &self.exchange_data);
        } else {
            write_vec16(&mut buf, &self.exchange_data);
        }
        buf.to_vec()
    }

    /// Decode the body; `short_form` comes from the negotiated suite.
    pub fn decode(mut data: &[u8], short_form: bool) -> Result<Self> {
        let exchange_data = if short_form {
            read_vec8(&mut data)?
        } else {
            read_vec16(&mut data)?
        };
        if !data.is_empty() {
            return Err(Error::InvalidMessage(
                "Trailing ClientKeyExchange bytes".into(),
            ));
        }
        Ok(Self {
            exchange_data,
            short_form,
        })
    }
}

/// ServerHelloDone message body (empty).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerHelloDone;

impl ServerHelloDone {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Decode the body.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if !data.is_empty() {
            return Err(Error::InvalidMessage(
                "ServerHelloDone must be empty".into(),
            ));
        }
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdhe_server_key_exchange_roundtrip() {
        let msg = ServerKeyExchange {
            params: ServerKeyExchangeParams::Ecdhe {
                group: KeyExchangeAlgorithm::X25519,
                public_key: vec![0xaa; 32],
            },
            scheme: SignatureScheme::RsaPkcs1Sha256,
            signature: vec![0xbb; 256],
        };
        assert_eq!(ServerKeyExchange::decode(&msg.encode(), true).unwrap(), msg);
    }

    #[test]
    fn test_dhe_server_key_exchange_roundtrip() {
        let msg = ServerKeyExchange {
            params: ServerKeyExchangeParams::Dhe {
                p: vec![0xff; 256],
                g: vec![2],
                public_key: vec![0xcc; 256],
            },
            scheme: SignatureScheme::RsaPkcs1Sha256,
            signature: vec![0xdd; 256],
        };
        assert_eq!(ServerKeyExchange::decode(&msg.encode(), false).unwrap(), msg);
    }

    #[test]
    fn test_signed_content_binds_randoms() {
        let params = ServerKeyExchangeParams::Ecdhe {
            group: KeyExchangeAlgorithm::Secp256r1,
            public_key: vec![4; 65],
        };
        let a = ServerKeyExchange::signed_content(&[1; 32], &[2; 32], &params);
        let b = ServerKeyExchange::signed_content(&[1; 32], &[3; 32], &params);
        assert_ne!(a, b);
        assert_eq!(&a[..32], &[1; 32]);
    }

    #[test]
    fn test_client_key_exchange_forms() {
        let rsa = ClientKeyExchange::rsa(vec![1; 256]);
        assert_eq!(ClientKeyExchange::decode(&rsa.encode(), false).unwrap(), rsa);

        let ecdhe = ClientKeyExchange::ecdhe(vec![2; 32]);
        let encoded = ecdhe.encode();
        assert_eq!(encoded[0], 32);
        assert_eq!(ClientKeyExchange::decode(&encoded, true).unwrap(), ecdhe);
    }

    #[test]
    fn test_server_hello_done_must_be_empty() {
        assert!(ServerHelloDone::decode(&[]).is_ok());
        assert!(ServerHelloDone::decode(&[0]).is_err());
    }
}
