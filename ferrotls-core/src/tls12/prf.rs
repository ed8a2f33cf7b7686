//! The TLS pseudo-random function for versions 1.0 through 1.2.
//!
//! TLS 1.2 (RFC 5246 Section 5) uses P_hash with the suite hash. TLS
//! 1.0/1.1 (RFC 2246 Section 5) split the secret in half and XOR
//! P_MD5 with P_SHA1.

use crate::error::Result;
use crate::protocol::ProtocolVersion;
use ferrotls_crypto::{CryptoProvider, HashAlgorithm};

/// Master secret length (all pre-1.3 versions).
pub const MASTER_SECRET_LEN: usize = 48;

/// Finished verify_data length (all pre-1.3 versions).
pub const VERIFY_DATA_LEN: usize = 12;

/// P_hash(secret, seed) expanded to `length` bytes (RFC 5246 Section 5).
fn p_hash(
    provider: &dyn CryptoProvider,
    algorithm: HashAlgorithm,
    secret: &[u8],
    seed: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(length);

    // A(1) = HMAC(secret, seed)
    let mut a = {
        let mut hmac = provider.hmac(algorithm, secret)?;
        hmac.update(seed);
        hmac.finalize()
    };

    while output.len() < length {
        // HMAC(secret, A(i) || seed)
        let mut hmac = provider.hmac(algorithm, secret)?;
        hmac.update(&a);
        hmac.update(seed);
        let chunk = hmac.finalize();
        output.extend_from_slice(&chunk);

        // A(i+1) = HMAC(secret, A(i))
        let mut hmac = provider.hmac(algorithm, secret)?;
        hmac.update(&a);
        a = hmac.finalize();
    }

    output.truncate(length);
    Ok(output)
}

/// PRF(secret, label, seed) for the given protocol version.
///
/// `hash` selects the P_hash digest for TLS 1.2 and is ignored for
/// earlier versions.
pub fn prf(
    provider: &dyn CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);

    if version >= ProtocolVersion::TLS1_2 {
        return p_hash(provider, hash, secret, &label_seed, length);
    }

    // Pre-1.2: secret halves overlap by one byte when the length is odd
    let half = (secret.len() + 1) / 2;
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let md5_part = p_hash(provider, HashAlgorithm::Md5, s1, &label_seed, length)?;
    let sha1_part = p_hash(provider, HashAlgorithm::Sha1, s2, &label_seed, length)?;

    Ok(md5_part
        .iter()
        .zip(sha1_part.iter())
        .map(|(a, b)| a ^ b)
        .collect())
}

/// Compute the 48-byte master secret.
///
/// `master_secret = PRF(pre_master_secret, "master secret",
/// ClientHello.random + ServerHello.random)[0..47]`
pub fn master_secret(
    provider: &dyn CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    premaster: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(
        provider,
        version,
        hash,
        premaster,
        b"master secret",
        &seed,
        MASTER_SECRET_LEN,
    )
}

/// Compute the extended master secret (RFC 7627).
///
/// Binds the master secret to the full handshake transcript instead of
/// just the two randoms.
pub fn extended_master_secret(
    provider: &dyn CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    premaster: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>> {
    prf(
        provider,
        version,
        hash,
        premaster,
        b"extended master secret",
        session_hash,
        MASTER_SECRET_LEN,
    )
}

/// Expand the key block.
///
/// `key_block = PRF(master_secret, "key expansion",
/// ServerHello.random + ClientHello.random)`; note the reversed random
/// order relative to the master secret computation.
pub fn key_block(
    provider: &dyn CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    master: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    length: usize,
) -> Result<Vec<u8>> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);
    prf(
        provider,
        version,
        hash,
        master,
        b"key expansion",
        &seed,
        length,
    )
}

/// Compute Finished verify_data.
///
/// For TLS 1.2 `handshake_hash` is the suite hash of the transcript; for
/// 1.0/1.1 it is `MD5(transcript) || SHA1(transcript)` (36 bytes).
pub fn finished_verify_data(
    provider: &dyn CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    master: &[u8],
    is_client: bool,
    handshake_hash: &[u8],
) -> Result<Vec<u8>> {
    let label: &[u8] = if is_client {
        b"client finished"
    } else {
        b"server finished"
    };
    prf(
        provider,
        version,
        hash,
        master,
        label,
        handshake_hash,
        VERIFY_DATA_LEN,
    )
}

/// Hash the transcript the way Finished expects for `version`.
pub fn finished_transcript_hash(
    provider: &dyn CryptoProvider,
    version: ProtocolVersion,
    hash: HashAlgorithm,
    transcript: &[u8],
) -> Result<Vec<u8>> {
    if version >= ProtocolVersion::TLS1_2 {
        let mut hasher = provider.hash(hash)?;
        hasher.update(transcript);
        Ok(hasher.finalize())
    } else {
        let mut md5 = provider.hash(HashAlgorithm::Md5)?;
        md5.update(transcript);
        let mut sha1 = provider.hash(HashAlgorithm::Sha1)?;
        sha1.update(transcript);
        let mut out = md5.finalize();
        out.extend_from_slice(&sha1.finalize());
        Ok(out)
    }
}
