//! Error types for the protocol core.

use core::fmt;

use crate::alert::AlertDescription;

/// Result type for TLS operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur during a TLS connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration
    InvalidConfig(String),

    /// Cryptographic error
    CryptoError(String),

    /// I/O error
    IoError(String),

    /// Handshake failure
    HandshakeFailure(String),

    /// Fatal alert received from the peer
    AlertReceived(AlertDescription),

    /// A message arrived that the state machine does not accept in its
    /// current state
    UnexpectedMessage(String),

    /// Invalid message format
    InvalidMessage(String),

    /// Record MAC or AEAD tag verification failed
    DecryptionFailed,

    /// Certificate processing failed
    CertificateError(String),

    /// Peer offered nothing we support (version, suite, group, scheme)
    NegotiationFailure(String),

    /// Unsupported feature
    UnsupportedFeature(String),

    /// Internal error
    InternalError(String),
}

impl Error {
    /// The alert to send to the peer when aborting on this error.
    pub fn to_alert(&self) -> AlertDescription {
        match self {
            Error::DecryptionFailed => AlertDescription::BadRecordMac,
            Error::InvalidMessage(_) => AlertDescription::DecodeError,
            Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
            Error::NegotiationFailure(_) => AlertDescription::HandshakeFailure,
            Error::CertificateError(_) => AlertDescription::BadCertificate,
            Error::UnsupportedFeature(_) => AlertDescription::UnsupportedExtension,
            Error::HandshakeFailure(_) => AlertDescription::HandshakeFailure,
            _ => AlertDescription::InternalError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            Error::IoError(msg) => write!(f, "I/O error: {}", msg),
            Error::HandshakeFailure(msg) => write!(f, "Handshake failure: {}", msg),
            Error::AlertReceived(desc) => write!(f, "Alert received: {:?}", desc),
            Error::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
            Error::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            Error::DecryptionFailed => write!(f, "Decryption failed"),
            Error::CertificateError(msg) => write!(f, "Certificate error: {}", msg),
            Error::NegotiationFailure(msg) => write!(f, "Negotiation failure: {}", msg),
            Error::UnsupportedFeature(msg) => write!(f, "Unsupported feature: {}", msg),
            Error::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<ferrotls_crypto::Error> for Error {
    fn from(e: ferrotls_crypto::Error) -> Self {
        match e {
            ferrotls_crypto::Error::AuthenticationFailed => Error::DecryptionFailed,
            other => Error::CryptoError(format!("{}", other)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}
