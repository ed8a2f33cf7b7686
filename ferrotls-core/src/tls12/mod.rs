//! TLS 1.0-1.2 specific machinery: the PRF, legacy message codecs, key
//! exchange dispatch, and the session cache.

pub mod key_exchange;
pub mod messages;
pub mod prf;
pub mod session;
