//! Cipher suite registry.
//!
//! Each suite maps its IANA codepoint to the key exchange, record
//! protection mode, and transcript hash that drive the rest of the
//! stack. TLS 1.3 suites name only the AEAD and hash; pre-1.3 suites
//! additionally fix the key exchange and certificate type.

use crate::error::{Error, Result};
use crate::protocol::ProtocolVersion;
use ferrotls_crypto::{AeadAlgorithm, BlockCipherAlgorithm, HashAlgorithm};

/// Supported cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    /// TLS_AES_128_GCM_SHA256 (TLS 1.3)
    Tls13Aes128GcmSha256,
    /// TLS_AES_256_GCM_SHA384 (TLS 1.3)
    Tls13Aes256GcmSha384,
    /// TLS_RSA_WITH_AES_128_CBC_SHA
    RsaAes128CbcSha,
    /// TLS_RSA_WITH_AES_256_CBC_SHA
    RsaAes256CbcSha,
    /// TLS_DHE_RSA_WITH_AES_256_CBC_SHA
    DheRsaAes256CbcSha,
    /// TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA
    EcdheRsaAes128CbcSha,
    /// TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 (TLS 1.2 only)
    EcdheRsaAes128GcmSha256,
    /// TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 (TLS 1.2 only)
    EcdheEcdsaAes128GcmSha256,
}

/// How the premaster secret is established (pre-1.3 suites).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeKind {
    /// RSA key transport
    Rsa,
    /// Ephemeral finite-field Diffie-Hellman, RSA-signed
    DheRsa,
    /// Ephemeral ECDH, RSA-signed
    EcdheRsa,
    /// Ephemeral ECDH, ECDSA-signed
    EcdheEcdsa,
    /// TLS 1.3 (key exchange comes from the key_share extension)
    Tls13,
}

/// Certificate key type a suite requires from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    /// RSA certificate
    Rsa,
    /// ECDSA (P-256) certificate
    Ecdsa,
}

/// Record protection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// CBC block cipher with HMAC (MAC-then-encrypt)
    Cbc {
        /// Block cipher
        cipher: BlockCipherAlgorithm,
        /// HMAC hash for the record MAC
        mac: HashAlgorithm,
    },
    /// AEAD
    Aead {
        /// AEAD algorithm
        aead: AeadAlgorithm,
    },
}

impl CipherSuite {
    /// All suites this implementation can negotiate, in preference order.
    pub const ALL: &'static [CipherSuite] = &[
        CipherSuite::Tls13Aes128GcmSha256,
        CipherSuite::Tls13Aes256GcmSha384,
        CipherSuite::EcdheEcdsaAes128GcmSha256,
        CipherSuite::EcdheRsaAes128GcmSha256,
        CipherSuite::EcdheRsaAes128CbcSha,
        CipherSuite::DheRsaAes256CbcSha,
        CipherSuite::RsaAes128CbcSha,
        CipherSuite::RsaAes256CbcSha,
    ];

    /// Convert to the IANA codepoint.
    pub const fn to_u16(self) -> u16 {
        match self {
            CipherSuite::Tls13Aes128GcmSha256 => 0x1301,
            CipherSuite::Tls13Aes256GcmSha384 => 0x1302,
            CipherSuite::RsaAes128CbcSha => 0x002f,
            CipherSuite::RsaAes256CbcSha => 0x0035,
            CipherSuite::DheRsaAes256CbcSha => 0x0039,
            CipherSuite::EcdheRsaAes128CbcSha => 0xc013,
            CipherSuite::EcdheRsaAes128GcmSha256 => 0xc02f,
            CipherSuite::EcdheEcdsaAes128GcmSha256 => 0xc02b,
        }
    }

    /// Convert from the IANA codepoint.
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x1301 => Some(CipherSuite::Tls13Aes128GcmSha256),
            0x1302 => Some(CipherSuite::Tls13Aes256GcmSha384),
            0x002f => Some(CipherSuite::RsaAes128CbcSha),
            0x0035 => Some(CipherSuite::RsaAes256CbcSha),
            0x0039 => Some(CipherSuite::DheRsaAes256CbcSha),
            0xc013 => Some(CipherSuite::EcdheRsaAes128CbcSha),
            0xc02f => Some(CipherSuite::EcdheRsaAes128GcmSha256),
            0xc02b => Some(CipherSuite::EcdheEcdsaAes128GcmSha256),
            _ => None,
        }
    }

    /// Key exchange for this suite.
    pub const fn key_exchange(self) -> KeyExchangeKind {
        match self {
            CipherSuite::Tls13Aes128GcmSha256 | CipherSuite::Tls13Aes256GcmSha384 => {
                KeyExchangeKind::Tls13
            }
            CipherSuite::RsaAes128CbcSha | CipherSuite::RsaAes256CbcSha => KeyExchangeKind::Rsa,
            CipherSuite::DheRsaAes256CbcSha => KeyExchangeKind::DheRsa,
            CipherSuite::EcdheRsaAes128CbcSha | CipherSuite::EcdheRsaAes128GcmSha256 => {
                KeyExchangeKind::EcdheRsa
            }
            CipherSuite::EcdheEcdsaAes128GcmSha256 => KeyExchangeKind::EcdheEcdsa,
        }
    }

    /// Certificate key type this suite requires, if it fixes one.
    ///
    /// TLS 1.3 suites return `None`: the certificate type is negotiated
    /// through signature_algorithms instead.
    pub const fn certificate_kind(self) -> Option<CertificateKind> {
        match self.key_exchange() {
            KeyExchangeKind::Rsa | KeyExchangeKind::DheRsa | KeyExchangeKind::EcdheRsa => {
                Some(CertificateKind::Rsa)
            }
            KeyExchangeKind::EcdheEcdsa => Some(CertificateKind::Ecdsa),
            KeyExchangeKind::Tls13 => None,
        }
    }

    /// Record protection mode.
    pub const fn mode(self) -> CipherMode {
        match self {
            CipherSuite::Tls13Aes128GcmSha256 | CipherSuite::EcdheRsaAes128GcmSha256
            | CipherSuite::EcdheEcdsaAes128GcmSha256 => CipherMode::Aead {
                aead: AeadAlgorithm::Aes128Gcm,
            },
            CipherSuite::Tls13Aes256GcmSha384 => CipherMode::Aead {
                aead: AeadAlgorithm::Aes256Gcm,
            },
            CipherSuite::RsaAes128CbcSha | CipherSuite::EcdheRsaAes128CbcSha => CipherMode::Cbc {
                cipher: BlockCipherAlgorithm::Aes128Cbc,
                mac: HashAlgorithm::Sha1,
            },
            CipherSuite::RsaAes256CbcSha | CipherSuite::DheRsaAes256CbcSha => CipherMode::Cbc {
                cipher: BlockCipherAlgorithm::Aes256Cbc,
                mac: HashAlgorithm::Sha1,
            },
        }
    }

    /// Hash algorithm for the key schedule (1.3) or PRF (1.2).
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            CipherSuite::Tls13Aes256GcmSha384 => HashAlgorithm::Sha384,
            _ => HashAlgorithm::Sha256,
        }
    }

    /// Bulk encryption key length in bytes.
    pub const fn key_length(self) -> usize {
        match self.mode() {
            CipherMode::Aead { aead } => aead.key_size(),
            CipherMode::Cbc { cipher, .. } => cipher.key_size(),
        }
    }

    /// MAC key length in bytes (zero for AEAD suites).
    pub const fn mac_key_length(self) -> usize {
        match self.mode() {
            CipherMode::Cbc { mac, .. } => mac.output_size(),
            CipherMode::Aead { .. } => 0,
        }
    }

    /// Length of the IV material taken from the key block / traffic
    /// secret for the given version.
    ///
    /// CBC: one block for TLS 1.0 (fixed IV); zero afterwards, the IV
    /// travels explicitly in each record. AEAD 1.2: the 4-byte implicit
    /// salt. AEAD 1.3: the full 12-byte IV.
    pub const fn fixed_iv_length(self, version: ProtocolVersion) -> usize {
        match self.mode() {
            CipherMode::Cbc { cipher, .. } => {
                if version.has_explicit_cbc_iv() {
                    0
                } else {
                    cipher.block_size()
                }
            }
            CipherMode::Aead { aead } => {
                if version.is_tls13() {
                    aead.nonce_size()
                } else {
                    4
                }
            }
        }
    }

    /// Whether this suite is a TLS 1.3 suite.
    pub const fn is_tls13(self) -> bool {
        matches!(self.key_exchange(), KeyExchangeKind::Tls13)
    }

    /// Whether this suite may be used at the given version.
    pub fn usable_at(self, version: ProtocolVersion) -> bool {
        if self.is_tls13() {
            return version.is_tls13();
        }
        if version.is_tls13() {
            return false;
        }
        // GCM suites need the 1.2 PRF and AEAD record layer; signed
        // ephemeral key exchange needs the 1.2 signature_algorithms
        // machinery
        match self.mode() {
            CipherMode::Aead { .. } => version == ProtocolVersion::TLS1_2,
            CipherMode::Cbc { .. } => {
                matches!(self.key_exchange(), KeyExchangeKind::Rsa)
                    || version == ProtocolVersion::TLS1_2
            }
        }
    }

    /// IANA-style name.
    pub const fn name(self) -> &'static str {
        match self {
            CipherSuite::Tls13Aes128GcmSha256 => "TLS_AES_128_GCM_SHA256",
            CipherSuite::Tls13Aes256GcmSha384 => "TLS_AES_256_GCM_SHA384",
            CipherSuite::RsaAes128CbcSha => "TLS_RSA_WITH_AES_128_CBC_SHA",
            CipherSuite::RsaAes256CbcSha => "TLS_RSA_WITH_AES_256_CBC_SHA",
            CipherSuite::DheRsaAes256CbcSha => "TLS_DHE_RSA_WITH_AES_256_CBC_SHA",
            CipherSuite::EcdheRsaAes128CbcSha => "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
            CipherSuite::EcdheRsaAes128GcmSha256 => "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            CipherSuite::EcdheEcdsaAes128GcmSha256 => "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        }
    }
}

/// Pick the first mutually supported suite usable at `version`.
///
/// `ours` is in local preference order; the first of ours that the peer
/// also offers wins.
pub fn select_cipher_suite(
    ours: &[CipherSuite],
    theirs: &[CipherSuite],
    version: ProtocolVersion,
) -> Result<CipherSuite> {
    ours.iter()
        .copied()
        .find(|s| s.usable_at(version) && theirs.contains(s))
        .ok_or_else(|| Error::NegotiationFailure("No common cipher suite".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codepoint_roundtrip() {
        for &suite in CipherSuite::ALL {
            assert_eq!(CipherSuite::from_u16(suite.to_u16()), Some(suite));
        }
        assert_eq!(CipherSuite::from_u16(0x0000), None);
    }

    #[test]
    fn test_version_applicability() {
        assert!(CipherSuite::Tls13Aes128GcmSha256.usable_at(ProtocolVersion::TLS1_3));
        assert!(!CipherSuite::Tls13Aes128GcmSha256.usable_at(ProtocolVersion::TLS1_2));
        assert!(!CipherSuite::RsaAes128CbcSha.usable_at(ProtocolVersion::TLS1_3));
        assert!(CipherSuite::RsaAes128CbcSha.usable_at(ProtocolVersion::TLS1_0));
        assert!(CipherSuite::EcdheRsaAes128GcmSha256.usable_at(ProtocolVersion::TLS1_2));
        assert!(!CipherSuite::EcdheRsaAes128GcmSha256.usable_at(ProtocolVersion::TLS1_1));
        // Signed ephemeral suites are 1.2-only
        assert!(!CipherSuite::EcdheRsaAes128CbcSha.usable_at(ProtocolVersion::TLS1_1));
        assert!(!CipherSuite::DheRsaAes256CbcSha.usable_at(ProtocolVersion::TLS1_0));
    }

    #[test]
    fn test_key_block_geometry() {
        let suite = CipherSuite::RsaAes128CbcSha;
        assert_eq!(suite.key_length(), 16);
        assert_eq!(suite.mac_key_length(), 20);
        assert_eq!(suite.fixed_iv_length(ProtocolVersion::TLS1_0), 16);
        assert_eq!(suite.fixed_iv_length(ProtocolVersion::TLS1_2), 0);

        let gcm = CipherSuite::EcdheRsaAes128GcmSha256;
        assert_eq!(gcm.fixed_iv_length(ProtocolVersion::TLS1_2), 4);
        assert_eq!(
            CipherSuite::Tls13Aes128GcmSha256.fixed_iv_length(ProtocolVersion::TLS1_3),
            12
        );
    }

    #[test]
    fn test_suite_selection_prefers_local_order() {
        let ours = vec![
            CipherSuite::EcdheRsaAes128GcmSha256,
            CipherSuite::RsaAes128CbcSha,
        ];
        let theirs = vec![
            CipherSuite::RsaAes128CbcSha,
            CipherSuite::EcdheRsaAes128GcmSha256,
        ];
        let selected = select_cipher_suite(&ours, &theirs, ProtocolVersion::TLS1_2).unwrap();
        assert_eq!(selected, CipherSuite::EcdheRsaAes128GcmSha256);
    }

    #[test]
    fn test_suite_selection_no_overlap() {
        let result = select_cipher_suite(
            &[CipherSuite::Tls13Aes128GcmSha256],
            &[CipherSuite::RsaAes128CbcSha],
            ProtocolVersion::TLS1_3,
        );
        assert!(result.is_err());
    }
}
