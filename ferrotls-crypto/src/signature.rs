//! Digital signature algorithms and RSA key transport for TLS.

use crate::Result;
use zeroize::Zeroize;

/// TLS signature schemes supported by FerroTLS (IANA codepoints).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    /// RSA PKCS#1 v1.5 with SHA-256 (TLS 1.2 only)
    RsaPkcs1Sha256,
    /// RSA-PSS with SHA-256
    RsaPssRsaeSha256,
    /// ECDSA with P-256 and SHA-256
    EcdsaSecp256r1Sha256,
}

impl SignatureScheme {
    /// Get the IANA TLS SignatureScheme codepoint.
    pub const fn to_u16(self) -> u16 {
        match self {
            SignatureScheme::RsaPkcs1Sha256 => 0x0401,
            SignatureScheme::RsaPssRsaeSha256 => 0x0804,
            SignatureScheme::EcdsaSecp256r1Sha256 => 0x0403,
        }
    }

    /// Create from IANA codepoint.
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0401 => Some(SignatureScheme::RsaPkcs1Sha256),
            0x0804 => Some(SignatureScheme::RsaPssRsaeSha256),
            0x0403 => Some(SignatureScheme::EcdsaSecp256r1Sha256),
            _ => None,
        }
    }

    /// Get the scheme name.
    pub const fn name(self) -> &'static str {
        match self {
            SignatureScheme::RsaPkcs1Sha256 => "rsa_pkcs1_sha256",
            SignatureScheme::RsaPssRsaeSha256 => "rsa_pss_rsae_sha256",
            SignatureScheme::EcdsaSecp256r1Sha256 => "ecdsa_secp256r1_sha256",
        }
    }

    /// Check if this scheme is allowed in TLS 1.3.
    ///
    /// TLS 1.3 forbids RSA PKCS#1 v1.5 signatures in CertificateVerify.
    pub const fn allowed_in_tls13(self) -> bool {
        !matches!(self, SignatureScheme::RsaPkcs1Sha256)
    }
}

/// Signing key (private key).
///
/// Key encoding is scheme-specific: PKCS#1 DER for RSA, the raw 32-byte
/// scalar for P-256. Zeroized on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

impl SigningKey {
    /// Create a new signing key from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the signing key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Verification key (public key).
///
/// Scheme-specific encoding: PKCS#1 DER for RSA, SEC1 uncompressed
/// point for P-256.
#[derive(Debug, Clone)]
pub struct VerifyingKey {
    bytes: Vec<u8>,
}

impl VerifyingKey {
    /// Create a new verifying key from bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Get the verifying key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Digital signature trait.
///
/// Signs and verifies opaque byte strings. Keys are passed per call so
/// one instance serves every connection.
pub trait Signature: Send + Sync {
    /// Sign a message.
    fn sign(&self, signing_key: &SigningKey, message: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature.
    ///
    /// # Errors
    ///
    /// `SignatureVerificationFailed` if the signature does not verify.
    fn verify(&self, verifying_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()>;

    /// Get the scheme this instance implements.
    fn scheme(&self) -> SignatureScheme;
}

/// RSA key transport (TLS RSA key exchange, RFC 5246 Section 7.4.7.1).
///
/// Wraps the 48-byte premaster secret in RSAES-PKCS1-v1_5 under the
/// server's certificate key.
pub trait KeyTransport: Send + Sync {
    /// Encrypt `plaintext` to the given RSA public key (PKCS#1 DER).
    fn encrypt(&self, public_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` with the given RSA private key (PKCS#1 DER).
    fn decrypt(&self, private_key: &SigningKey, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_codepoints() {
        assert_eq!(SignatureScheme::RsaPkcs1Sha256.to_u16(), 0x0401);
        assert_eq!(
            SignatureScheme::from_u16(0x0403),
            Some(SignatureScheme::EcdsaSecp256r1Sha256)
        );
        assert_eq!(SignatureScheme::from_u16(0x0808), None);
    }

    #[test]
    fn test_tls13_scheme_policy() {
        assert!(!SignatureScheme::RsaPkcs1Sha256.allowed_in_tls13());
        assert!(SignatureScheme::RsaPssRsaeSha256.allowed_in_tls13());
        assert!(SignatureScheme::EcdsaSecp256r1Sha256.allowed_in_tls13());
    }
}
