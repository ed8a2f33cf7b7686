//! Finished (RFC 8446 Section 4.4.4, RFC 5246 Section 7.4.9).
//!
//! The body is the bare verify_data: hash-length HMAC output in 1.3,
//! 12 PRF bytes in 1.0-1.2. Verification must be constant time; use
//! `constant_time_eq`.

use subtle::ConstantTimeEq;

/// Finished message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    /// verify_data
    pub verify_data: Vec<u8>,
}

impl Finished {
    /// Encode the body.
    pub fn encode(&self) -> Vec<u8> {
        self.verify_data.clone()
    }

    /// Decode the body.
    pub fn decode(data: &[u8]) -> Self {
        Self {
            verify_data: data.to_vec(),
        }
    }

    /// Compare against the locally computed verify_data in constant
    /// time.
    pub fn constant_time_eq(&self, expected: &[u8]) -> bool {
        self.verify_data.ct_eq(expected).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_comparison() {
        let finished = Finished {
            verify_data: vec![1, 2, 3, 4],
        };
        assert!(finished.constant_time_eq(&[1, 2, 3, 4]));
        assert!(!finished.constant_time_eq(&[1, 2, 3, 5]));
        assert!(!finished.constant_time_eq(&[1, 2, 3]));
    }
}
