//! Minimal X.509 handling: SubjectPublicKeyInfo extraction.
//!
//! Chain validation and trust decisions are out of scope; the handshake
//! only needs the peer's public key to verify CertificateVerify /
//! ServerKeyExchange signatures or wrap the RSA premaster secret. This
//! module walks just enough DER to pull the SPKI out of a certificate,
//! plus a builder that wraps a public key in a syntactically valid
//! certificate shell for tests and local identities.

use crate::cipher::CertificateKind;
use crate::error::{Error, Result};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_BIT_STRING: u8 = 0x03;
const TAG_OID: u8 = 0x06;
const TAG_INTEGER: u8 = 0x02;
const TAG_NULL: u8 = 0x05;
const TAG_CONTEXT_0: u8 = 0xa0;

const OID_RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
const OID_EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
const OID_PRIME256V1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
const OID_SHA256_WITH_RSA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b];

/// A public key pulled out of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectPublicKey {
    /// RSA, as PKCS#1 DER (`RSAPublicKey`)
    Rsa(Vec<u8>),
    /// P-256, as an SEC1 uncompressed point
    EcP256(Vec<u8>),
}

impl SubjectPublicKey {
    /// The certificate kind this key satisfies.
    pub fn kind(&self) -> CertificateKind {
        match self {
            SubjectPublicKey::Rsa(_) => CertificateKind::Rsa,
            SubjectPublicKey::EcP256(_) => CertificateKind::Ecdsa,
        }
    }

    /// Raw key bytes in the encoding the crypto provider expects.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SubjectPublicKey::Rsa(b) | SubjectPublicKey::EcP256(b) => b,
        }
    }
}

fn bad(msg: &str) -> Error {
    Error::CertificateError(msg.into())
}

/// Read one TLV; returns (tag, value, bytes consumed).
fn read_tlv(data: &[u8]) -> Result<(u8, &[u8], usize)> {
    if data.len() < 2 {
        return Err(bad("DER element truncated"));
    }
    let tag = data[0];
    let (len, header) = if data[1] < 0x80 {
        (data[1] as usize, 2)
    } else {
        let n = (data[1] & 0x7f) as usize;
        if n == 0 || n > 4 || data.len() < 2 + n {
            return Err(bad("Unsupported DER length"));
        }
        let mut len = 0usize;
        for &b in &data[2..2 + n] {
            len = (len << 8) | b as usize;
        }
        (len, 2 + n)
    };
    if data.len() < header + len {
        return Err(bad("DER element truncated"));
    }
    Ok((tag, &data[header..header + len], header + len))
}

fn expect_tag<'a>(data: &'a [u8], tag: u8, what: &str) -> Result<(&'a [u8], usize)> {
    let (t, value, consumed) = read_tlv(data)?;
    if t != tag {
        return Err(bad(what));
    }
    Ok((value, consumed))
}

/// Extract the subject public key from a DER certificate.
pub fn extract_public_key(cert_der: &[u8]) -> Result<SubjectPublicKey> {
    let (cert, _) = expect_tag(cert_der, TAG_SEQUENCE, "Certificate is not a SEQUENCE")?;
    let (tbs, _) = expect_tag(cert, TAG_SEQUENCE, "TBSCertificate is not a SEQUENCE")?;

    let mut offset = 0;
    // Optional explicit [0] version
    if tbs.first() == Some(&TAG_CONTEXT_0) {
        let (_, _, consumed) = read_tlv(tbs)?;
        offset += consumed;
    }
    // serialNumber, signature, issuer, validity, subject
    for _ in 0..5 {
        let (_, _, consumed) = read_tlv(&tbs[offset..])?;
        offset += consumed;
    }

    let (spki, _) = expect_tag(&tbs[offset..], TAG_SEQUENCE, "SPKI is not a SEQUENCE")?;
    let (algorithm, alg_len) =
        expect_tag(spki, TAG_SEQUENCE, "AlgorithmIdentifier is not a SEQUENCE")?;
    let (oid, _) = expect_tag(algorithm, TAG_OID, "Algorithm OID missing")?;
    let (key_bits, _) = expect_tag(&spki[alg_len..], TAG_BIT_STRING, "Key BIT STRING missing")?;
    if key_bits.first() != Some(&0) {
        return Err(bad("Key BIT STRING has unused bits"));
    }
    let key = key_bits[1..].to_vec();

    match oid {
        o if o == OID_RSA_ENCRYPTION => Ok(SubjectPublicKey::Rsa(key)),
        o if o == OID_EC_PUBLIC_KEY => {
            // Parameters must name prime256v1
            let (curve, _) = expect_tag(&algorithm[2 + oid.len()..], TAG_OID, "Curve OID missing")?;
            if curve != OID_PRIME256V1 {
                return Err(bad("Unsupported EC curve"));
            }
            Ok(SubjectPublicKey::EcP256(key))
        }
        _ => Err(bad("Unsupported public key algorithm")),
    }
}

fn write_tlv(buf: &mut Vec<u8>, tag: u8, value: &[u8]) {
    buf.push(tag);
    let len = value.len();
    if len < 0x80 {
        buf.push(len as u8);
    } else if len <= 0xff {
        buf.push(0x81);
        buf.push(len as u8);
    } else {
        buf.push(0x82);
        buf.extend_from_slice(&(len as u16).to_be_bytes());
    }
    buf.extend_from_slice(value);
}

fn encode_spki(key: &SubjectPublicKey) -> Vec<u8> {
    let mut algorithm = Vec::new();
    let key_bytes = match key {
        SubjectPublicKey::Rsa(bytes) => {
            write_tlv(&mut algorithm, TAG_OID, OID_RSA_ENCRYPTION);
            write_tlv(&mut algorithm, TAG_NULL, &[]);
            bytes
        }
        SubjectPublicKey::EcP256(bytes) => {
            write_tlv(&mut algorithm, TAG_OID, OID_EC_PUBLIC_KEY);
            write_tlv(&mut algorithm, TAG_OID, OID_PRIME256V1);
            bytes
        }
    };
    let mut bit_string = vec![0u8];
    bit_string.extend_from_slice(key_bytes);

    let mut spki = Vec::new();
    write_tlv(&mut spki, TAG_SEQUENCE, &algorithm);
    let mut out = Vec::new();
    let mut inner = spki;
    write_tlv(&mut inner, TAG_BIT_STRING, &bit_string);
    write_tlv(&mut out, TAG_SEQUENCE, &inner);
    out
}

/// Wrap a public key in a minimal, syntactically valid certificate.
///
/// The signature is a placeholder; nothing validates chains here. Used
/// for test fixtures and local identities.
pub fn build_certificate(key: &SubjectPublicKey) -> Vec<u8> {
    let mut sig_alg = Vec::new();
    write_tlv(&mut sig_alg, TAG_OID, OID_SHA256_WITH_RSA);
    write_tlv(&mut sig_alg, TAG_NULL, &[]);

    let mut tbs = Vec::new();
    // [0] version v3
    let mut version = Vec::new();
    write_tlv(&mut version, TAG_INTEGER, &[2]);
    write_tlv(&mut tbs, TAG_CONTEXT_0, &version);
    // serialNumber
    write_tlv(&mut tbs, TAG_INTEGER, &[1]);
    // signature
    write_tlv(&mut tbs, TAG_SEQUENCE, &sig_alg.clone());
    // issuer, validity, subject: empty shells
    write_tlv(&mut tbs, TAG_SEQUENCE, &[]);
    write_tlv(&mut tbs, TAG_SEQUENCE, &[]);
    write_tlv(&mut tbs, TAG_SEQUENCE, &[]);
    tbs.extend_from_slice(&encode_spki(key));

    let mut cert_body = Vec::new();
    write_tlv(&mut cert_body, TAG_SEQUENCE, &tbs);
    write_tlv(&mut cert_body, TAG_SEQUENCE, &sig_alg);
    write_tlv(&mut cert_body, TAG_BIT_STRING, &[0, 0]);

    let mut cert = Vec::new();
    write_tlv(&mut cert, TAG_SEQUENCE, &cert_body);
    cert
}
