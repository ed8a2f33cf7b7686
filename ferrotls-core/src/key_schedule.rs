//! TLS 1.3 key schedule (RFC 8446 Section 7.1).
//!
//! ```text
//!              0
//!              |
//!   PSK ->  HKDF-Extract = Early Secret
//!              +--> Derive-Secret(., "ext binder" | "res binder", "")
//!              +--> Derive-Secret(., "c e traffic", ClientHello)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!   (EC)DHE -> HKDF-Extract = Handshake Secret
//!              +--> Derive-Secret(., "c hs traffic", CH..SH)
//!              +--> Derive-Secret(., "s hs traffic", CH..SH)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!   0 -> HKDF-Extract = Master Secret
//!              +--> Derive-Secret(., "c ap traffic", CH..server Fin)
//!              +--> Derive-Secret(., "s ap traffic", CH..server Fin)
//!              +--> Derive-Secret(., "exp master",   CH..server Fin)
//!              +--> Derive-Secret(., "res master",   CH..client Fin)
//! ```
//!
//! Each stage must pass through the "derived" step before the next
//! extract; secrets are only reachable in this order.

use crate::cipher::CipherSuite;
use crate::error::{Error, Result};
use crate::transcript::hkdf_expand_label;
use ferrotls_crypto::{CryptoProvider, HashAlgorithm};
use zeroize::Zeroizing;

/// TLS 1.3 key schedule for one connection.
pub struct KeySchedule {
    cipher_suite: CipherSuite,
    hash_algorithm: HashAlgorithm,
    hash_len: usize,
    early_secret: Option<Zeroizing<Vec<u8>>>,
    handshake_secret: Option<Zeroizing<Vec<u8>>>,
    master_secret: Option<Zeroizing<Vec<u8>>>,
    client_handshake_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    server_handshake_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    client_application_traffic_secret: Option<Zeroizing<Vec<u8>>>,
    server_application_traffic_secret: Option<Zeroizing<Vec<u8>>>,
}

impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySchedule")
            .field("cipher_suite", &self.cipher_suite)
            .field("secrets", &"<redacted>")
            .finish()
    }
}

impl KeySchedule {
    /// Create a key schedule for the given suite.
    pub fn new(cipher_suite: CipherSuite) -> Self {
        let hash_algorithm = cipher_suite.hash_algorithm();
        Self {
            cipher_suite,
            hash_algorithm,
            hash_len: hash_algorithm.output_size(),
            early_secret: None,
            handshake_secret: None,
            master_secret: None,
            client_handshake_traffic_secret: None,
            server_handshake_traffic_secret: None,
            client_application_traffic_secret: None,
            server_application_traffic_secret: None,
        }
    }

    /// Initialize the early secret.
    ///
    /// Pass an empty slice when no PSK is in play; a zero-filled IKM of
    /// hash length is used instead.
    pub fn init_early_secret(&mut self, provider: &dyn CryptoProvider, psk: &[u8]) -> Result<()> {
        let kdf = provider.kdf(self.kdf_algorithm()?)?;
        let ikm = if psk.is_empty() {
            Zeroizing::new(vec![0u8; self.hash_len])
        } else {
            Zeroizing::new(psk.to_vec())
        };
        let salt = vec![0u8; self.hash_len];
        let early = kdf.extract(Some(&salt), &ikm);
        self.early_secret = Some(Zeroizing::new(early));
        Ok(())
    }

    /// Derive the binder key from the early secret.
    ///
    /// `is_external` selects the "ext binder" label; resumption PSKs use
    /// "res binder".
    pub fn derive_binder_key(
        &self,
        provider: &dyn CryptoProvider,
        is_external: bool,
    ) -> Result<Vec<u8>> {
        let early = self.require(&self.early_secret, "early secret")?;
        let label = if is_external { "ext binder" } else { "res binder" };
        let empty_hash = self.empty_hash(provider)?;
        self.derive_secret(provider, early, label, &empty_hash)
    }

    /// Compute the PSK binder over the truncated ClientHello hash.
    pub fn compute_psk_binder(
        &self,
        provider: &dyn CryptoProvider,
        binder_key: &[u8],
        truncated_transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        crate::transcript::compute_verify_data(
            provider,
            self.hash_algorithm,
            binder_key,
            truncated_transcript_hash,
        )
    }

    /// Advance early secret -> handshake secret using the (EC)DHE shared
    /// secret. Pass an empty slice for PSK-only key exchange.
    pub fn derive_handshake_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        shared_secret: &[u8],
    ) -> Result<()> {
        let early = self.require(&self.early_secret, "early secret")?.to_vec();
        let kdf = provider.kdf(self.kdf_algorithm()?)?;
        let empty_hash = self.empty_hash(provider)?;
        let derived = self.derive_secret(provider, &early, "derived", &empty_hash)?;
        let ikm = if shared_secret.is_empty() {
            Zeroizing::new(vec![0u8; self.hash_len])
        } else {
            Zeroizing::new(shared_secret.to_vec())
        };
        let hs = kdf.extract(Some(&derived), &ikm);
        self.handshake_secret = Some(Zeroizing::new(hs));
        Ok(())
    }

    /// Advance handshake secret -> master secret.
    pub fn derive_master_secret(&mut self, provider: &dyn CryptoProvider) -> Result<()> {
        let hs = self.require(&self.handshake_secret, "handshake secret")?.to_vec();
        let kdf = provider.kdf(self.kdf_algorithm()?)?;
        let empty_hash = self.empty_hash(provider)?;
        let derived = self.derive_secret(provider, &hs, "derived", &empty_hash)?;
        let ikm = vec![0u8; self.hash_len];
        let master = kdf.extract(Some(&derived), &ikm);
        self.master_secret = Some(Zeroizing::new(master));
        Ok(())
    }

    /// Derive the client handshake traffic secret.
    pub fn derive_client_handshake_traffic_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        let hs = self.require(&self.handshake_secret, "handshake secret")?.to_vec();
        let secret = self.derive_secret(provider, &hs, "c hs traffic", transcript_hash)?;
        self.client_handshake_traffic_secret = Some(Zeroizing::new(secret.clone()));
        Ok(secret)
    }

    /// Derive the server handshake traffic secret.
    pub fn derive_server_handshake_traffic_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        let hs = self.require(&self.handshake_secret, "handshake secret")?.to_vec();
        let secret = self.derive_secret(provider, &hs, "s hs traffic", transcript_hash)?;
        self.server_handshake_traffic_secret = Some(Zeroizing::new(secret.clone()));
        Ok(secret)
    }

    /// Derive the client application traffic secret.
    pub fn derive_client_application_traffic_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        let master = self.require(&self.master_secret, "master secret")?.to_vec();
        let secret = self.derive_secret(provider, &master, "c ap traffic", transcript_hash)?;
        self.client_application_traffic_secret = Some(Zeroizing::new(secret.clone()));
        Ok(secret)
    }

    /// Derive the server application traffic secret.
    pub fn derive_server_application_traffic_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        let master = self.require(&self.master_secret, "master secret")?.to_vec();
        let secret = self.derive_secret(provider, &master, "s ap traffic", transcript_hash)?;
        self.server_application_traffic_secret = Some(Zeroizing::new(secret.clone()));
        Ok(secret)
    }

    /// Derive the resumption master secret (input to ticket PSKs).
    pub fn derive_resumption_master_secret(
        &self,
        provider: &dyn CryptoProvider,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        let master = self.require(&self.master_secret, "master secret")?;
        self.derive_secret(provider, master, "res master", transcript_hash)
    }

    /// Derive the per-ticket PSK from the resumption master secret.
    ///
    /// `PSK = HKDF-Expand-Label(resumption_master_secret, "resumption",
    /// ticket_nonce, Hash.length)` per RFC 8446 Section 4.6.1.
    pub fn derive_ticket_psk(
        &self,
        provider: &dyn CryptoProvider,
        resumption_master_secret: &[u8],
        ticket_nonce: &[u8],
    ) -> Result<Vec<u8>> {
        hkdf_expand_label(
            provider,
            self.hash_algorithm,
            resumption_master_secret,
            b"resumption",
            ticket_nonce,
            self.hash_len,
        )
    }

    /// Step an application traffic secret forward for KeyUpdate.
    ///
    /// `secret_N+1 = HKDF-Expand-Label(secret_N, "traffic upd", "", Hash.length)`
    pub fn update_application_traffic_secret(
        &mut self,
        provider: &dyn CryptoProvider,
        is_client: bool,
    ) -> Result<Vec<u8>> {
        let slot = if is_client {
            &mut self.client_application_traffic_secret
        } else {
            &mut self.server_application_traffic_secret
        };
        let current = slot
            .as_ref()
            .ok_or_else(|| Error::InternalError("Application traffic secret not derived".into()))?;
        let next = hkdf_expand_label(
            provider,
            self.hash_algorithm,
            current,
            b"traffic upd",
            &[],
            self.hash_len,
        )?;
        *slot = Some(Zeroizing::new(next.clone()));
        Ok(next)
    }

    /// Client handshake traffic secret, if derived.
    pub fn client_handshake_traffic_secret(&self) -> Option<&[u8]> {
        self.client_handshake_traffic_secret.as_deref().map(|s| &s[..])
    }

    /// Server handshake traffic secret, if derived.
    pub fn server_handshake_traffic_secret(&self) -> Option<&[u8]> {
        self.server_handshake_traffic_secret.as_deref().map(|s| &s[..])
    }

    /// Client application traffic secret, if derived.
    pub fn client_application_traffic_secret(&self) -> Option<&[u8]> {
        self.client_application_traffic_secret.as_deref().map(|s| &s[..])
    }

    /// Server application traffic secret, if derived.
    pub fn server_application_traffic_secret(&self) -> Option<&[u8]> {
        self.server_application_traffic_secret.as_deref().map(|s| &s[..])
    }

    /// Cipher suite this schedule serves.
    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    fn derive_secret(
        &self,
        provider: &dyn CryptoProvider,
        secret: &[u8],
        label: &str,
        transcript_hash: &[u8],
    ) -> Result<Vec<u8>> {
        hkdf_expand_label(
            provider,
            self.hash_algorithm,
            secret,
            label.as_bytes(),
            transcript_hash,
            self.hash_len,
        )
    }

    fn empty_hash(&self, provider: &dyn CryptoProvider) -> Result<Vec<u8>> {
        Ok(provider.hash(self.hash_algorithm)?.finalize())
    }

    fn kdf_algorithm(&self) -> Result<ferrotls_crypto::KdfAlgorithm> {
        self.hash_algorithm
            .to_kdf_algorithm()
            .ok_or_else(|| Error::InternalError("No HKDF for hash algorithm".into()))
    }

    fn require<'a>(
        &self,
        slot: &'a Option<Zeroizing<Vec<u8>>>,
        what: &str,
    ) -> Result<&'a [u8]> {
        slot.as_deref()
            .map(|s| &s[..])
            .ok_or_else(|| Error::InternalError(format!("{} not initialized", what)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrotls_crypto_rustcrypto::RustCryptoProvider;

    #[test]
    fn test_stages_are_gated() {
        let provider = RustCryptoProvider::new();
        let mut ks = KeySchedule::new(CipherSuite::Tls13Aes128GcmSha256);

        // Handshake secret before early secret is an error
        assert!(ks.derive_handshake_secret(&provider, &[1u8; 32]).is_err());
        ks.init_early_secret(&provider, &[]).unwrap();
        ks.derive_handshake_secret(&provider, &[1u8; 32]).unwrap();

        // Application secrets before master secret are errors
        assert!(ks
            .derive_client_application_traffic_secret(&provider, &[0u8; 32])
            .is_err());
        ks.derive_master_secret(&provider).unwrap();
        ks.derive_client_application_traffic_secret(&provider, &[0u8; 32])
            .unwrap();
    }

    #[test]
    fn test_traffic_secrets_differ_by_direction() {
        let provider = RustCryptoProvider::new();
        let mut ks = KeySchedule::new(CipherSuite::Tls13Aes128GcmSha256);
        ks.init_early_secret(&provider, &[]).unwrap();
        ks.derive_handshake_secret(&provider, &[7u8; 32]).unwrap();

        let hash = vec![0xabu8; 32];
        let client = ks
            .derive_client_handshake_traffic_secret(&provider, &hash)
            .unwrap();
        let server = ks
            .derive_server_handshake_traffic_secret(&provider, &hash)
            .unwrap();
        assert_ne!(client, server);
        assert_eq!(client.len(), 32);
    }

    #[test]
    fn test_traffic_update_changes_secret() {
        let provider = RustCryptoProvider::new();
        let mut ks = KeySchedule::new(CipherSuite::Tls13Aes128GcmSha256);
        ks.init_early_secret(&provider, &[]).unwrap();
        ks.derive_handshake_secret(&provider, &[7u8; 32]).unwrap();
        ks.derive_master_secret(&provider).unwrap();
        let first = ks
            .derive_client_application_traffic_secret(&provider, &[0u8; 32])
            .unwrap();
        let second = ks
            .update_application_traffic_secret(&provider, true)
            .unwrap();
        assert_ne!(first, second);
    }

    /// RFC 8448 Section 3 (simple 1-RTT handshake, x25519 /
    /// TLS_AES_128_GCM_SHA256). The shared secret and transcript hashes
    /// are taken from the trace; every traffic secret must match.
    #[test]
    fn test_rfc8448_simple_1rtt_traffic_secrets() {
        let provider = RustCryptoProvider::new();
        let mut ks = KeySchedule::new(CipherSuite::Tls13Aes128GcmSha256);

        let shared_secret =
            hex::decode("8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d")
                .unwrap();
        let hello_hash =
            hex::decode("860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8")
                .unwrap();
        let finished_hash =
            hex::decode("9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13")
                .unwrap();

        ks.init_early_secret(&provider, &[]).unwrap();
        ks.derive_handshake_secret(&provider, &shared_secret).unwrap();

        let c_hs = ks
            .derive_client_handshake_traffic_secret(&provider, &hello_hash)
            .unwrap();
        let s_hs = ks
            .derive_server_handshake_traffic_secret(&provider, &hello_hash)
            .unwrap();
        assert_eq!(
            hex::encode(&c_hs),
            "b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21"
        );
        assert_eq!(
            hex::encode(&s_hs),
            "b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38"
        );

        ks.derive_master_secret(&provider).unwrap();
        let c_ap = ks
            .derive_client_application_traffic_secret(&provider, &finished_hash)
            .unwrap();
        let s_ap = ks
            .derive_server_application_traffic_secret(&provider, &finished_hash)
            .unwrap();
        assert_eq!(
            hex::encode(&c_ap),
            "9e40646ce79a7f9dc05af8889bce6552875afa0b06df0087f792ebb7c17504a5"
        );
        assert_eq!(
            hex::encode(&s_ap),
            "a11af9f05531f856ad47116b45a950328204b4f44bfb6b3a4b4f1f3fcb631643"
        );
    }

    #[test]
    fn test_psk_changes_early_secret_outputs() {
        let provider = RustCryptoProvider::new();

        let mut no_psk = KeySchedule::new(CipherSuite::Tls13Aes128GcmSha256);
        no_psk.init_early_secret(&provider, &[]).unwrap();
        let a = no_psk.derive_binder_key(&provider, false).unwrap();

        let mut with_psk = KeySchedule::new(CipherSuite::Tls13Aes128GcmSha256);
        with_psk.init_early_secret(&provider, &[9u8; 32]).unwrap();
        let b = with_psk.derive_binder_key(&provider, false).unwrap();

        assert_ne!(a, b);
    }
}
