//! Handshake transcript hash.
//!
//! A running hash of every handshake message (including the 4-byte
//! header) in the order sent. Feeds key derivation, CertificateVerify,
//! Finished, and PSK binders.

use crate::error::{Error, Result};
use crate::protocol::HandshakeType;
use ferrotls_crypto::{CryptoProvider, HashAlgorithm, KdfAlgorithm};

/// Transcript hash manager.
#[derive(Debug, Clone)]
pub struct TranscriptHash {
    algorithm: HashAlgorithm,
    messages: Vec<Vec<u8>>,
}

impl TranscriptHash {
    /// Create a new transcript with the given hash algorithm.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            messages: Vec::new(),
        }
    }

    /// Hash algorithm in use.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Re-bind the hash algorithm.
    ///
    /// The suite (and with it the transcript hash) is only known once
    /// the ServerHello arrives; messages recorded before that are kept
    /// unhashed, so switching is lossless.
    pub fn set_algorithm(&mut self, algorithm: HashAlgorithm) {
        self.algorithm = algorithm;
    }

    /// All recorded messages concatenated.
    ///
    /// The pre-1.2 Finished computation hashes the raw byte stream with
    /// MD5 and SHA-1 rather than the suite hash.
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.messages.concat()
    }

    /// Append a complete handshake message (with header).
    pub fn update(&mut self, message: &[u8]) {
        self.messages.push(message.to_vec());
    }

    /// Hash of everything appended so far.
    pub fn current_hash(&self, provider: &dyn CryptoProvider) -> Result<Vec<u8>> {
        let mut hasher = provider.hash(self.algorithm)?;
        for msg in &self.messages {
            hasher.update(msg);
        }
        Ok(hasher.finalize())
    }

    /// Number of messages appended.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Snapshot the transcript at this point.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Collapse the transcript into the synthetic message_hash entry.
    ///
    /// After HelloRetryRequest the transcript restarts as
    /// `message_hash(254) || 00 00 || Hash.length || Hash(ClientHello1)`
    /// per RFC 8446 Section 4.4.1. Everything appended so far (the first
    /// ClientHello) is replaced by that single entry.
    pub fn collapse_for_retry(&mut self, provider: &dyn CryptoProvider) -> Result<()> {
        if self.messages.is_empty() {
            return Err(Error::InternalError(
                "Transcript empty at retry collapse".into(),
            ));
        }
        let hash = self.current_hash(provider)?;
        let mut synthetic = Vec::with_capacity(4 + hash.len());
        synthetic.push(HandshakeType::MessageHash.to_u8());
        synthetic.extend_from_slice(&[0, 0]);
        synthetic.push(hash.len() as u8);
        synthetic.extend_from_slice(&hash);
        self.messages.clear();
        self.messages.push(synthetic);
        Ok(())
    }

    /// Hash of the transcript plus a trailing partial message.
    ///
    /// Used for PSK binders, where the final ClientHello is hashed up to
    /// but not including the binders list.
    pub fn hash_with_partial(
        &self,
        provider: &dyn CryptoProvider,
        partial: &[u8],
    ) -> Result<Vec<u8>> {
        let mut hasher = provider.hash(self.algorithm)?;
        for msg in &self.messages {
            hasher.update(msg);
        }
        hasher.update(partial);
        Ok(hasher.finalize())
    }
}

/// HKDF-Expand-Label (RFC 8446 Section 7.1).
///
/// ```text
/// struct {
///     uint16 length = Length;
///     opaque label<7..255> = "tls13 " + Label;
///     opaque context<0..255> = Context;
/// } HkdfLabel;
/// ```
pub fn hkdf_expand_label(
    provider: &dyn CryptoProvider,
    algorithm: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    context: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    if length > 0xffff {
        return Err(Error::InternalError("HKDF output length too large".into()));
    }
    let kdf = provider.kdf(kdf_for(algorithm)?)?;

    let mut info = Vec::with_capacity(4 + 6 + label.len() + context.len());
    info.extend_from_slice(&(length as u16).to_be_bytes());
    info.push((6 + label.len()) as u8);
    info.extend_from_slice(b"tls13 ");
    info.extend_from_slice(label);
    info.push(context.len() as u8);
    info.extend_from_slice(context);

    kdf.expand(secret, &info, length).map_err(Error::from)
}

/// Finished verify data (RFC 8446 Section 4.4.4).
///
/// ```text
/// finished_key = HKDF-Expand-Label(BaseKey, "finished", "", Hash.length)
/// verify_data  = HMAC(finished_key, Transcript-Hash(Handshake Context))
/// ```
pub fn compute_verify_data(
    provider: &dyn CryptoProvider,
    algorithm: HashAlgorithm,
    base_key: &[u8],
    transcript_hash: &[u8],
) -> Result<Vec<u8>> {
    let hash_len = algorithm.output_size();
    let finished_key =
        hkdf_expand_label(provider, algorithm, base_key, b"finished", &[], hash_len)?;
    let mut hmac = provider.hmac(algorithm, &finished_key)?;
    hmac.update(transcript_hash);
    Ok(hmac.finalize())
}

fn kdf_for(algorithm: HashAlgorithm) -> Result<KdfAlgorithm> {
    algorithm
        .to_kdf_algorithm()
        .ok_or_else(|| Error::InternalError("No HKDF for hash algorithm".into()))
}
