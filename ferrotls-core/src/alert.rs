//! TLS alert protocol (RFC 8446 Section 6, RFC 5246 Section 7.2).

use crate::error::{Error, Result};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    /// Warning
    Warning,
    /// Fatal
    Fatal,
}

impl AlertLevel {
    /// Convert to wire format.
    pub const fn to_u8(self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
        }
    }

    /// Convert from wire format.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AlertLevel::Warning),
            2 => Some(AlertLevel::Fatal),
            _ => None,
        }
    }
}

/// Alert descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertDescription {
    /// close_notify
    CloseNotify,
    /// unexpected_message
    UnexpectedMessage,
    /// bad_record_mac
    BadRecordMac,
    /// record_overflow
    RecordOverflow,
    /// handshake_failure
    HandshakeFailure,
    /// bad_certificate
    BadCertificate,
    /// unsupported_certificate
    UnsupportedCertificate,
    /// certificate_expired
    CertificateExpired,
    /// certificate_unknown
    CertificateUnknown,
    /// illegal_parameter
    IllegalParameter,
    /// unknown_ca
    UnknownCa,
    /// decode_error
    DecodeError,
    /// decrypt_error
    DecryptError,
    /// protocol_version
    ProtocolVersion,
    /// insufficient_security
    InsufficientSecurity,
    /// internal_error
    InternalError,
    /// inappropriate_fallback
    InappropriateFallback,
    /// user_canceled
    UserCanceled,
    /// no_renegotiation (pre-1.3 only)
    NoRenegotiation,
    /// missing_extension
    MissingExtension,
    /// unsupported_extension
    UnsupportedExtension,
    /// unrecognized_name
    UnrecognizedName,
    /// no_application_protocol
    NoApplicationProtocol,
    /// Description not in our table
    Unknown(u8),
}

impl AlertDescription {
    /// Convert to wire format.
    pub const fn to_u8(self) -> u8 {
        match self {
            AlertDescription::CloseNotify => 0,
            AlertDescription::UnexpectedMessage => 10,
            AlertDescription::BadRecordMac => 20,
            AlertDescription::RecordOverflow => 22,
            AlertDescription::HandshakeFailure => 40,
            AlertDescription::BadCertificate => 42,
            AlertDescription::UnsupportedCertificate => 43,
            AlertDescription::CertificateExpired => 45,
            AlertDescription::CertificateUnknown => 46,
            AlertDescription::IllegalParameter => 47,
            AlertDescription::UnknownCa => 48,
            AlertDescription::DecodeError => 50,
            AlertDescription::DecryptError => 51,
            AlertDescription::ProtocolVersion => 70,
            AlertDescription::InsufficientSecurity => 71,
            AlertDescription::InternalError => 80,
            AlertDescription::InappropriateFallback => 86,
            AlertDescription::UserCanceled => 90,
            AlertDescription::NoRenegotiation => 100,
            AlertDescription::MissingExtension => 109,
            AlertDescription::UnsupportedExtension => 110,
            AlertDescription::UnrecognizedName => 112,
            AlertDescription::NoApplicationProtocol => 120,
            AlertDescription::Unknown(v) => v,
        }
    }

    /// Convert from wire format.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => AlertDescription::CloseNotify,
            10 => AlertDescription::UnexpectedMessage,
            20 => AlertDescription::BadRecordMac,
            22 => AlertDescription::RecordOverflow,
            40 => AlertDescription::HandshakeFailure,
            42 => AlertDescription::BadCertificate,
            43 => AlertDescription::UnsupportedCertificate,
            45 => AlertDescription::CertificateExpired,
            46 => AlertDescription::CertificateUnknown,
            47 => AlertDescription::IllegalParameter,
            48 => AlertDescription::UnknownCa,
            50 => AlertDescription::DecodeError,
            51 => AlertDescription::DecryptError,
            70 => AlertDescription::ProtocolVersion,
            71 => AlertDescription::InsufficientSecurity,
            80 => AlertDescription::InternalError,
            86 => AlertDescription::InappropriateFallback,
            90 => AlertDescription::UserCanceled,
            100 => AlertDescription::NoRenegotiation,
            109 => AlertDescription::MissingExtension,
            110 => AlertDescription::UnsupportedExtension,
            112 => AlertDescription::UnrecognizedName,
            120 => AlertDescription::NoApplicationProtocol,
            other => AlertDescription::Unknown(other),
        }
    }
}

/// A TLS alert message (two bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// Severity
    pub level: AlertLevel,
    /// Description
    pub description: AlertDescription,
}

impl Alert {
    /// Create a fatal alert.
    pub const fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    /// Create a warning alert.
    pub const fn warning(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Warning,
            description,
        }
    }

    /// Create a warning-level close_notify.
    pub const fn close_notify() -> Self {
        Self {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        }
    }

    /// Encode to wire format.
    pub fn encode(&self) -> Vec<u8> {
        vec![self.level.to_u8(), self.description.to_u8()]
    }

    /// Decode from wire format.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != 2 {
            return Err(Error::InvalidMessage("Alert must be 2 bytes".into()));
        }
        let level = AlertLevel::from_u8(data[0])
            .ok_or_else(|| Error::InvalidMessage("Invalid alert level".into()))?;
        Ok(Self {
            level,
            description: AlertDescription::from_u8(data[1]),
        })
    }

    /// Whether receiving this alert must terminate the connection.
    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_roundtrip() {
        let alert = Alert::fatal(AlertDescription::BadRecordMac);
        let encoded = alert.encode();
        assert_eq!(encoded, vec![2, 20]);
        assert_eq!(Alert::decode(&encoded).unwrap(), alert);
    }

    #[test]
    fn test_close_notify() {
        let alert = Alert::close_notify();
        assert!(!alert.is_fatal());
        assert_eq!(alert.encode(), vec![1, 0]);
    }

    #[test]
    fn test_unknown_description_preserved() {
        let alert = Alert::decode(&[2, 200]).unwrap();
        assert_eq!(alert.description, AlertDescription::Unknown(200));
        assert_eq!(alert.encode(), vec![2, 200]);
    }

    #[test]
    fn test_bad_length_rejected() {
        assert!(Alert::decode(&[2]).is_err());
        assert!(Alert::decode(&[2, 0, 0]).is_err());
    }
}
