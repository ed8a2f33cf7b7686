//! Core protocol constants and wire-level enums.

/// TLS protocol version as it appears on the wire.
///
/// Stored as the raw u16 codepoint so that all four released versions
/// plus the final 1.3 draft compare and order naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// TLS 1.0 (RFC 2246).
    pub const TLS1_0: ProtocolVersion = ProtocolVersion(0x0301);
    /// TLS 1.1 (RFC 4346).
    pub const TLS1_1: ProtocolVersion = ProtocolVersion(0x0302);
    /// TLS 1.2 (RFC 5246).
    pub const TLS1_2: ProtocolVersion = ProtocolVersion(0x0303);
    /// TLS 1.3 (RFC 8446).
    pub const TLS1_3: ProtocolVersion = ProtocolVersion(0x0304);
    /// Final TLS 1.3 draft (draft-26 and later used 0x7f1a..0x7f1c;
    /// we accept draft-26 offers and answer with the final version).
    pub const TLS1_3_DRAFT_26: ProtocolVersion = ProtocolVersion(0x7f1a);

    /// Raw wire value.
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Construct from the raw wire value.
    pub const fn from_u16(value: u16) -> Self {
        ProtocolVersion(value)
    }

    /// Whether this version is one we are willing to negotiate.
    pub const fn is_known(self) -> bool {
        matches!(
            self.0,
            0x0301 | 0x0302 | 0x0303 | 0x0304 | 0x7f1a
        )
    }

    /// Whether this is TLS 1.3 or a 1.3 draft.
    pub const fn is_tls13(self) -> bool {
        self.0 == 0x0304 || self.0 == 0x7f1a
    }

    /// Whether this version uses the legacy (pre-1.3) handshake flow.
    pub const fn is_pre_tls13(self) -> bool {
        matches!(self.0, 0x0301 | 0x0302 | 0x0303)
    }

    /// Whether CBC records carry an explicit per-record IV (TLS 1.1+).
    pub const fn has_explicit_cbc_iv(self) -> bool {
        self.0 >= 0x0302 && self.0 != 0x7f1a
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self.0 {
            0x0301 => "TLSv1.0",
            0x0302 => "TLSv1.1",
            0x0303 => "TLSv1.2",
            0x0304 => "TLSv1.3",
            0x7f1a => "TLSv1.3-draft26",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "TLS(0x{:04x})", self.0)
        }
    }
}

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// ChangeCipherSpec
    ChangeCipherSpec,
    /// Alert
    Alert,
    /// Handshake
    Handshake,
    /// Application data
    ApplicationData,
}

impl ContentType {
    /// Convert to wire format.
    pub const fn to_u8(self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
        }
    }

    /// Convert from wire format.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            20 => Some(ContentType::ChangeCipherSpec),
            21 => Some(ContentType::Alert),
            22 => Some(ContentType::Handshake),
            23 => Some(ContentType::ApplicationData),
            _ => None,
        }
    }
}

/// TLS handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    /// HelloRequest (legacy renegotiation trigger)
    HelloRequest,
    /// ClientHello
    ClientHello,
    /// ServerHello
    ServerHello,
    /// NewSessionTicket
    NewSessionTicket,
    /// EndOfEarlyData
    EndOfEarlyData,
    /// EncryptedExtensions
    EncryptedExtensions,
    /// Certificate
    Certificate,
    /// ServerKeyExchange (TLS 1.2 and below)
    ServerKeyExchange,
    /// CertificateRequest
    CertificateRequest,
    /// ServerHelloDone (TLS 1.2 and below)
    ServerHelloDone,
    /// CertificateVerify
    CertificateVerify,
    /// ClientKeyExchange (TLS 1.2 and below)
    ClientKeyExchange,
    /// Finished
    Finished,
    /// KeyUpdate
    KeyUpdate,
    /// Synthetic message_hash entry after HelloRetryRequest
    MessageHash,
}

impl HandshakeType {
    /// Convert to wire format.
    pub const fn to_u8(self) -> u8 {
        match self {
            HandshakeType::HelloRequest => 0,
            HandshakeType::ClientHello => 1,
            HandshakeType::ServerHello => 2,
            HandshakeType::NewSessionTicket => 4,
            HandshakeType::EndOfEarlyData => 5,
            HandshakeType::EncryptedExtensions => 8,
            HandshakeType::Certificate => 11,
            HandshakeType::ServerKeyExchange => 12,
            HandshakeType::CertificateRequest => 13,
            HandshakeType::ServerHelloDone => 14,
            HandshakeType::CertificateVerify => 15,
            HandshakeType::ClientKeyExchange => 16,
            HandshakeType::Finished => 20,
            HandshakeType::KeyUpdate => 24,
            HandshakeType::MessageHash => 254,
        }
    }

    /// Convert from wire format.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(HandshakeType::HelloRequest),
            1 => Some(HandshakeType::ClientHello),
            2 => Some(HandshakeType::ServerHello),
            4 => Some(HandshakeType::NewSessionTicket),
            5 => Some(HandshakeType::EndOfEarlyData),
            8 => Some(HandshakeType::EncryptedExtensions),
            11 => Some(HandshakeType::Certificate),
            12 => Some(HandshakeType::ServerKeyExchange),
            13 => Some(HandshakeType::CertificateRequest),
            14 => Some(HandshakeType::ServerHelloDone),
            15 => Some(HandshakeType::CertificateVerify),
            16 => Some(HandshakeType::ClientKeyExchange),
            20 => Some(HandshakeType::Finished),
            24 => Some(HandshakeType::KeyUpdate),
            254 => Some(HandshakeType::MessageHash),
            _ => None,
        }
    }
}

/// TLS extension types (IANA registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    /// server_name (SNI)
    ServerName,
    /// supported_groups
    SupportedGroups,
    /// ec_point_formats (TLS 1.2 ECC)
    EcPointFormats,
    /// signature_algorithms
    SignatureAlgorithms,
    /// application_layer_protocol_negotiation
    Alpn,
    /// extended_master_secret (RFC 7627)
    ExtendedMasterSecret,
    /// session_ticket (RFC 5077)
    SessionTicket,
    /// pre_shared_key
    PreSharedKey,
    /// early_data
    EarlyData,
    /// supported_versions
    SupportedVersions,
    /// psk_key_exchange_modes
    PskKeyExchangeModes,
    /// key_share
    KeyShare,
    /// renegotiation_info (RFC 5746)
    RenegotiationInfo,
    /// Unrecognized extension, carried opaquely
    Unknown(u16),
}

impl ExtensionType {
    /// Convert to wire format.
    pub const fn to_u16(self) -> u16 {
        match self {
            ExtensionType::ServerName => 0,
            ExtensionType::SupportedGroups => 10,
            ExtensionType::EcPointFormats => 11,
            ExtensionType::SignatureAlgorithms => 13,
            ExtensionType::Alpn => 16,
            ExtensionType::ExtendedMasterSecret => 23,
            ExtensionType::SessionTicket => 35,
            ExtensionType::PreSharedKey => 41,
            ExtensionType::EarlyData => 42,
            ExtensionType::SupportedVersions => 43,
            ExtensionType::PskKeyExchangeModes => 45,
            ExtensionType::KeyShare => 51,
            ExtensionType::RenegotiationInfo => 0xff01,
            ExtensionType::Unknown(v) => v,
        }
    }

    /// Convert from wire format. Unrecognized types decode to `Unknown`.
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => ExtensionType::ServerName,
            10 => ExtensionType::SupportedGroups,
            11 => ExtensionType::EcPointFormats,
            13 => ExtensionType::SignatureAlgorithms,
            16 => ExtensionType::Alpn,
            23 => ExtensionType::ExtendedMasterSecret,
            35 => ExtensionType::SessionTicket,
            41 => ExtensionType::PreSharedKey,
            42 => ExtensionType::EarlyData,
            43 => ExtensionType::SupportedVersions,
            45 => ExtensionType::PskKeyExchangeModes,
            51 => ExtensionType::KeyShare,
            0xff01 => ExtensionType::RenegotiationInfo,
            other => ExtensionType::Unknown(other),
        }
    }
}

/// The TLS_EMPTY_RENEGOTIATION_INFO_SCSV signaling cipher suite value.
pub const RENEGOTIATION_SCSV: u16 = 0x00ff;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(ProtocolVersion::TLS1_0 < ProtocolVersion::TLS1_1);
        assert!(ProtocolVersion::TLS1_2 < ProtocolVersion::TLS1_3);
        assert!(ProtocolVersion::TLS1_3.is_tls13());
        assert!(ProtocolVersion::TLS1_3_DRAFT_26.is_tls13());
        assert!(!ProtocolVersion::TLS1_2.is_tls13());
    }

    #[test]
    fn test_cbc_iv_rules() {
        assert!(!ProtocolVersion::TLS1_0.has_explicit_cbc_iv());
        assert!(ProtocolVersion::TLS1_1.has_explicit_cbc_iv());
        assert!(ProtocolVersion::TLS1_2.has_explicit_cbc_iv());
    }

    #[test]
    fn test_content_type_roundtrip() {
        for ct in [
            ContentType::ChangeCipherSpec,
            ContentType::Alert,
            ContentType::Handshake,
            ContentType::ApplicationData,
        ] {
            assert_eq!(ContentType::from_u8(ct.to_u8()), Some(ct));
        }
        assert_eq!(ContentType::from_u8(99), None);
    }

    #[test]
    fn test_extension_type_unknown_preserved() {
        let ext = ExtensionType::from_u16(0x1234);
        assert_eq!(ext, ExtensionType::Unknown(0x1234));
        assert_eq!(ext.to_u16(), 0x1234);
    }
}
