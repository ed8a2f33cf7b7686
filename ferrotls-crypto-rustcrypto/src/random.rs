//! Secure random generation backed by the operating system.

use ferrotls_crypto::{Random, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// Random source using the operating system RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRandom;

impl Random for SystemRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng.fill_bytes(dest);
        Ok(())
    }
}
