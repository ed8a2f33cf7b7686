//! TLS extension encoding and decoding.
//!
//! Extensions are carried as `(u16 type, u16 length, opaque data)`
//! entries. `Extensions` holds the raw entries; the typed codecs below
//! interpret the bodies of the extensions this implementation speaks.
//! Unrecognized extensions survive a decode/encode round trip intact.

use crate::error::{Error, Result};
use crate::protocol::{ExtensionType, ProtocolVersion};
use bytes::{BufMut, BytesMut};
use ferrotls_crypto::{KeyExchangeAlgorithm, SignatureScheme};

/// A single raw extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Extension type
    pub extension_type: ExtensionType,
    /// Opaque extension body
    pub data: Vec<u8>,
}

impl Extension {
    /// Create an extension from a type and body.
    pub fn new(extension_type: ExtensionType, data: Vec<u8>) -> Self {
        Self {
            extension_type,
            data,
        }
    }

    /// Append the wire encoding to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.extension_type.to_u16());
        buf.put_u16(self.data.len() as u16);
        buf.put_slice(&self.data);
    }

    /// Decode one extension. Returns the extension and bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 4 {
            return Err(Error::InvalidMessage("Extension header truncated".into()));
        }
        let extension_type = ExtensionType::from_u16(u16::from_be_bytes([data[0], data[1]]));
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if data.len() < 4 + length {
            return Err(Error::InvalidMessage("Extension body truncated".into()));
        }
        Ok((
            Self {
                extension_type,
                data: data[4..4 + length].to_vec(),
            },
            4 + length,
        ))
    }
}

/// An ordered extension list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extensions {
    entries: Vec<Extension>,
}

impl Extensions {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extension.
    pub fn push(&mut self, extension: Extension) {
        self.entries.push(extension);
    }

    /// Body of the first extension of the given type, if present.
    pub fn get(&self, extension_type: ExtensionType) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.extension_type == extension_type)
            .map(|e| e.data.as_slice())
    }

    /// Whether an extension of the given type is present.
    pub fn contains(&self, extension_type: ExtensionType) -> bool {
        self.get(extension_type).is_some()
    }

    /// Number of extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.entries.iter()
    }

    /// Append `extensions_length || entries` to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        for e in &self.entries {
            e.encode(&mut body);
        }
        buf.put_u16(body.len() as u16);
        buf.put_slice(&body);
    }

    /// Decode a length-prefixed extension list. Returns the list and
    /// bytes consumed. Duplicate extension types are rejected.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 2 {
            return Err(Error::InvalidMessage("Extensions length truncated".into()));
        }
        let total = u16::from_be_bytes([data[0], data[1]]) as usize;
        if data.len() < 2 + total {
            return Err(Error::InvalidMessage("Extensions truncated".into()));
        }
        let mut entries = Vec::new();
        let mut offset = 2;
        let end = 2 + total;
        while offset < end {
            let (ext, consumed) = Extension::decode(&data[offset..end])?;
            if entries
                .iter()
                .any(|e: &Extension| e.extension_type == ext.extension_type)
            {
                return Err(Error::InvalidMessage("Duplicate extension".into()));
            }
            entries.push(ext);
            offset += consumed;
        }
        Ok((Self { entries }, end))
    }
}

/// One entry of the key_share extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    /// Named group
    pub group: KeyExchangeAlgorithm,
    /// Public key bytes
    pub key_exchange: Vec<u8>,
}

/// One PSK identity offered in pre_shared_key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskIdentity {
    /// Opaque ticket identity
    pub identity: Vec<u8>,
    /// Ticket age in milliseconds, obfuscated with the ticket's
    /// age_add value
    pub obfuscated_ticket_age: u32,
}

/// The pre_shared_key extension as offered by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferedPsks {
    /// Offered identities
    pub identities: Vec<PskIdentity>,
    /// One binder per identity
    pub binders: Vec<Vec<u8>>,
}

// supported_versions (RFC 8446 Section 4.2.1)

/// Client form: a list of offered versions.
pub fn supported_versions_client(versions: &[ProtocolVersion]) -> Extension {
    let mut data = Vec::with_capacity(1 + versions.len() * 2);
    data.push((versions.len() * 2) as u8);
    for v in versions {
        data.extend_from_slice(&v.to_u16().to_be_bytes());
    }
    Extension::new(ExtensionType::SupportedVersions, data)
}

/// Parse the client form.
pub fn parse_supported_versions_client(data: &[u8]) -> Result<Vec<ProtocolVersion>> {
    if data.is_empty() || data[0] as usize != data.len() - 1 || data[0] % 2 != 0 {
        return Err(Error::InvalidMessage("Malformed supported_versions".into()));
    }
    Ok(data[1..]
        .chunks_exact(2)
        .map(|c| ProtocolVersion::from_u16(u16::from_be_bytes([c[0], c[1]])))
        .collect())
}

/// Server form: the single selected version.
pub fn supported_versions_server(version: ProtocolVersion) -> Extension {
    Extension::new(
        ExtensionType::SupportedVersions,
        version.to_u16().to_be_bytes().to_vec(),
    )
}

/// Parse the server form.
pub fn parse_supported_versions_server(data: &[u8]) -> Result<ProtocolVersion> {
    if data.len() != 2 {
        return Err(Error::InvalidMessage("Malformed supported_versions".into()));
    }
    Ok(ProtocolVersion::from_u16(u16::from_be_bytes([
        data[0], data[1],
    ])))
}

// key_share (RFC 8446 Section 4.2.8)

fn encode_key_share_entry(entry: &KeyShareEntry, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&entry.group.to_u16().to_be_bytes());
    buf.extend_from_slice(&(entry.key_exchange.len() as u16).to_be_bytes());
    buf.extend_from_slice(&entry.key_exchange);
}

fn decode_key_share_entry(data: &[u8]) -> Result<(Option<KeyShareEntry>, usize)> {
    if data.len() < 4 {
        return Err(Error::InvalidMessage("key_share entry truncated".into()));
    }
    let group = u16::from_be_bytes([data[0], data[1]]);
    let length = u16::from_be_bytes([data[2], data[3]]) as usize;
    if data.len() < 4 + length {
        return Err(Error::InvalidMessage("key_share entry truncated".into()));
    }
    // Unknown groups are skipped, not fatal
    let entry = KeyExchangeAlgorithm::from_u16(group).map(|group| KeyShareEntry {
        group,
        key_exchange: data[4..4 + length].to_vec(),
    });
    Ok((entry, 4 + length))
}

/// Client form: a list of key share entries.
pub fn key_share_client(entries: &[KeyShareEntry]) -> Extension {
    let mut body = Vec::new();
    for e in entries {
        encode_key_share_entry(e, &mut body);
    }
    let mut data = Vec::with_capacity(2 + body.len());
    data.extend_from_slice(&(body.len() as u16).to_be_bytes());
    data.extend_from_slice(&body);
    Extension::new(ExtensionType::KeyShare, data)
}

/// Parse the client form, skipping entries in unknown groups.
pub fn parse_key_share_client(data: &[u8]) -> Result<Vec<KeyShareEntry>> {
    if data.len() < 2 {
        return Err(Error::InvalidMessage("key_share truncated".into()));
    }
    let total = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + total {
        return Err(Error::InvalidMessage("key_share length mismatch".into()));
    }
    let mut entries = Vec::new();
    let mut offset = 2;
    while offset < data.len() {
        let (entry, consumed) = decode_key_share_entry(&data[offset..])?;
        if let Some(entry) = entry {
            entries.push(entry);
        }
        offset += consumed;
    }
    Ok(entries)
}

/// Server form: the single selected entry.
pub fn key_share_server(entry: &KeyShareEntry) -> Extension {
    let mut data = Vec::new();
    encode_key_share_entry(entry, &mut data);
    Extension::new(ExtensionType::KeyShare, data)
}

/// Parse the server form.
pub fn parse_key_share_server(data: &[u8]) -> Result<KeyShareEntry> {
    let (entry, consumed) = decode_key_share_entry(data)?;
    if consumed != data.len() {
        return Err(Error::InvalidMessage("key_share length mismatch".into()));
    }
    entry.ok_or_else(|| Error::InvalidMessage("Server selected unknown group".into()))
}

/// HelloRetryRequest form: the group the server wants a share for.
pub fn key_share_retry(group: KeyExchangeAlgorithm) -> Extension {
    Extension::new(
        ExtensionType::KeyShare,
        group.to_u16().to_be_bytes().to_vec(),
    )
}

/// Parse the HelloRetryRequest form.
pub fn parse_key_share_retry(data: &[u8]) -> Result<KeyExchangeAlgorithm> {
    if data.len() != 2 {
        return Err(Error::InvalidMessage("Malformed retry key_share".into()));
    }
    KeyExchangeAlgorithm::from_u16(u16::from_be_bytes([data[0], data[1]]))
        .ok_or_else(|| Error::InvalidMessage("Retry requested unknown group".into()))
}

// supported_groups (RFC 8446 Section 4.2.7)

/// Build supported_groups from a group list.
pub fn supported_groups(groups: &[KeyExchangeAlgorithm]) -> Extension {
    let mut data = Vec::with_capacity(2 + groups.len() * 2);
    data.extend_from_slice(&((groups.len() * 2) as u16).to_be_bytes());
    for g in groups {
        data.extend_from_slice(&g.to_u16().to_be_bytes());
    }
    Extension::new(ExtensionType::SupportedGroups, data)
}

/// Parse supported_groups, keeping known groups only.
pub fn parse_supported_groups(data: &[u8]) -> Result<Vec<KeyExchangeAlgorithm>> {
    let list = parse_u16_list(data)?;
    Ok(list
        .into_iter()
        .filter_map(KeyExchangeAlgorithm::from_u16)
        .collect())
}

// signature_algorithms (RFC 8446 Section 4.2.3)

/// Build signature_algorithms from a scheme list.
pub fn signature_algorithms(schemes: &[SignatureScheme]) -> Extension {
    let mut data = Vec::with_capacity(2 + schemes.len() * 2);
    data.extend_from_slice(&((schemes.len() * 2) as u16).to_be_bytes());
    for s in schemes {
        data.extend_from_slice(&s.to_u16().to_be_bytes());
    }
    Extension::new(ExtensionType::SignatureAlgorithms, data)
}

/// Parse signature_algorithms, keeping known schemes only.
pub fn parse_signature_algorithms(data: &[u8]) -> Result<Vec<SignatureScheme>> {
    let list = parse_u16_list(data)?;
    Ok(list
        .into_iter()
        .filter_map(SignatureScheme::from_u16)
        .collect())
}

fn parse_u16_list(data: &[u8]) -> Result<Vec<u16>> {
    if data.len() < 2 {
        return Err(Error::InvalidMessage("List length truncated".into()));
    }
    let total = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + total || total % 2 != 0 {
        return Err(Error::InvalidMessage("List length mismatch".into()));
    }
    Ok(data[2..]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

// server_name (RFC 6066 Section 3)

/// Build server_name with a single host_name entry.
pub fn server_name(host: &str) -> Extension {
    let name = host.as_bytes();
    let mut data = Vec::with_capacity(5 + name.len());
    data.extend_from_slice(&((3 + name.len()) as u16).to_be_bytes());
    data.push(0); // name_type host_name
    data.extend_from_slice(&(name.len() as u16).to_be_bytes());
    data.extend_from_slice(name);
    Extension::new(ExtensionType::ServerName, data)
}

/// Parse server_name, returning the first host_name entry.
pub fn parse_server_name(data: &[u8]) -> Result<String> {
    if data.len() < 5 {
        return Err(Error::InvalidMessage("server_name truncated".into()));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + list_len || data[2] != 0 {
        return Err(Error::InvalidMessage("Malformed server_name".into()));
    }
    let name_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    if data.len() < 5 + name_len {
        return Err(Error::InvalidMessage("server_name truncated".into()));
    }
    String::from_utf8(data[5..5 + name_len].to_vec())
        .map_err(|_| Error::InvalidMessage("server_name is not UTF-8".into()))
}

// application_layer_protocol_negotiation (RFC 7301)

/// Build ALPN from a protocol list (client offer or server selection).
pub fn alpn(protocols: &[Vec<u8>]) -> Extension {
    let mut body = Vec::new();
    for p in protocols {
        body.push(p.len() as u8);
        body.extend_from_slice(p);
    }
    let mut data = Vec::with_capacity(2 + body.len());
    data.extend_from_slice(&(body.len() as u16).to_be_bytes());
    data.extend_from_slice(&body);
    Extension::new(ExtensionType::Alpn, data)
}

/// Parse ALPN into its protocol list.
pub fn parse_alpn(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    if data.len() < 2 {
        return Err(Error::InvalidMessage("ALPN truncated".into()));
    }
    let total = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + total {
        return Err(Error::InvalidMessage("ALPN length mismatch".into()));
    }
    let mut protocols = Vec::new();
    let mut offset = 2;
    while offset < data.len() {
        let len = data[offset] as usize;
        offset += 1;
        if len == 0 || data.len() < offset + len {
            return Err(Error::InvalidMessage("Malformed ALPN entry".into()));
        }
        protocols.push(data[offset..offset + len].to_vec());
        offset += len;
    }
    Ok(protocols)
}

// psk_key_exchange_modes (RFC 8446 Section 4.2.9)

/// psk_dhe_ke mode codepoint.
pub const PSK_DHE_KE: u8 = 1;

/// Build psk_key_exchange_modes offering psk_dhe_ke only.
pub fn psk_key_exchange_modes() -> Extension {
    Extension::new(ExtensionType::PskKeyExchangeModes, vec![1, PSK_DHE_KE])
}

/// Parse psk_key_exchange_modes; true if psk_dhe_ke is offered.
pub fn parse_psk_modes_offers_dhe(data: &[u8]) -> Result<bool> {
    if data.is_empty() || data[0] as usize != data.len() - 1 {
        return Err(Error::InvalidMessage(
            "Malformed psk_key_exchange_modes".into(),
        ));
    }
    Ok(data[1..].contains(&PSK_DHE_KE))
}

// pre_shared_key (RFC 8446 Section 4.2.11)

/// Client form: identities plus binders. Must be the last extension in
/// the ClientHello.
pub fn pre_shared_key_client(psks: &OfferedPsks) -> Extension {
    let mut data = Vec::new();
    let mut identities = Vec::new();
    for id in &psks.identities {
        identities.extend_from_slice(&(id.identity.len() as u16).to_be_bytes());
        identities.extend_from_slice(&id.identity);
        identities.extend_from_slice(&id.obfuscated_ticket_age.to_be_bytes());
    }
    data.extend_from_slice(&(identities.len() as u16).to_be_bytes());
    data.extend_from_slice(&identities);

    let mut binders = Vec::new();
    for b in &psks.binders {
        binders.push(b.len() as u8);
        binders.extend_from_slice(b);
    }
    data.extend_from_slice(&(binders.len() as u16).to_be_bytes());
    data.extend_from_slice(&binders);
    Extension::new(ExtensionType::PreSharedKey, data)
}

/// Length of the binders list (with its u16 prefix) in the client
/// form. The ClientHello is hashed up to but not including this many
/// trailing bytes when computing binders.
pub fn psk_binders_length(psks: &OfferedPsks) -> usize {
    2 + psks.binders.iter().map(|b| 1 + b.len()).sum::<usize>()
}

/// Parse the client form.
pub fn parse_pre_shared_key_client(data: &[u8]) -> Result<OfferedPsks> {
    if data.len() < 2 {
        return Err(Error::InvalidMessage("pre_shared_key truncated".into()));
    }
    let id_total = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() < 2 + id_total + 2 {
        return Err(Error::InvalidMessage("pre_shared_key truncated".into()));
    }
    let mut identities = Vec::new();
    let mut offset = 2;
    let id_end = 2 + id_total;
    while offset < id_end {
        if id_end < offset + 2 {
            return Err(Error::InvalidMessage("PSK identity truncated".into()));
        }
        let len = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
        offset += 2;
        if id_end < offset + len + 4 {
            return Err(Error::InvalidMessage("PSK identity truncated".into()));
        }
        let identity = data[offset..offset + len].to_vec();
        offset += len;
        let obfuscated_ticket_age = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;
        identities.push(PskIdentity {
            identity,
            obfuscated_ticket_age,
        });
    }

    let binder_total = u16::from_be_bytes([data[offset], data[offset + 1]]) as usize;
    offset += 2;
    if data.len() != offset + binder_total {
        return Err(Error::InvalidMessage("PSK binders truncated".into()));
    }
    let mut binders = Vec::new();
    while offset < data.len() {
        let len = data[offset] as usize;
        offset += 1;
        if data.len() < offset + len {
            return Err(Error::InvalidMessage("PSK binder truncated".into()));
        }
        binders.push(data[offset..offset + len].to_vec());
        offset += len;
    }
    if binders.len() != identities.len() {
        return Err(Error::InvalidMessage(
            "PSK binder count does not match identities".into(),
        ));
    }
    Ok(OfferedPsks {
        identities,
        binders,
    })
}

/// Server form: the index of the accepted identity.
pub fn pre_shared_key_server(selected_identity: u16) -> Extension {
    Extension::new(
        ExtensionType::PreSharedKey,
        selected_identity.to_be_bytes().to_vec(),
    )
}

/// Parse the server form.
pub fn parse_pre_shared_key_server(data: &[u8]) -> Result<u16> {
    if data.len() != 2 {
        return Err(Error::InvalidMessage("Malformed pre_shared_key".into()));
    }
    Ok(u16::from_be_bytes([data[0], data[1]]))
}

// early_data (RFC 8446 Section 4.2.10)

/// ClientHello and EncryptedExtensions form: empty body, presence is
/// the signal.
pub fn early_data() -> Extension {
    Extension::new(ExtensionType::EarlyData, Vec::new())
}

/// NewSessionTicket form: carries max_early_data_size.
pub fn early_data_limit(max_early_data_size: u32) -> Extension {
    Extension::new(
        ExtensionType::EarlyData,
        max_early_data_size.to_be_bytes().to_vec(),
    )
}

// Flag-style extensions

/// extended_master_secret (RFC 7627): empty body, presence is the signal.
pub fn extended_master_secret() -> Extension {
    Extension::new(ExtensionType::ExtendedMasterSecret, Vec::new())
}

/// renegotiation_info (RFC 5746) carrying the given verify data
/// (empty on an initial handshake).
pub fn renegotiation_info(verify_data: &[u8]) -> Extension {
    let mut data = Vec::with_capacity(1 + verify_data.len());
    data.push(verify_data.len() as u8);
    data.extend_from_slice(verify_data);
    Extension::new(ExtensionType::RenegotiationInfo, data)
}

/// Parse renegotiation_info into its verify data.
pub fn parse_renegotiation_info(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() || data[0] as usize != data.len() - 1 {
        return Err(Error::InvalidMessage("Malformed renegotiation_info".into()));
    }
    Ok(data[1..].to_vec())
}

/// ec_point_formats offering uncompressed only.
pub fn ec_point_formats() -> Extension {
    Extension::new(ExtensionType::EcPointFormats, vec![1, 0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_list_roundtrip() {
        let mut exts = Extensions::new();
        exts.push(supported_versions_client(&[
            ProtocolVersion::TLS1_3,
            ProtocolVersion::TLS1_2,
        ]));
        exts.push(extended_master_secret());
        exts.push(Extension::new(ExtensionType::Unknown(0x5a5a), vec![1, 2]));

        let mut buf = Vec::new();
        exts.encode(&mut buf);
        let (decoded, consumed) = Extensions::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, exts);
        assert!(decoded.contains(ExtensionType::Unknown(0x5a5a)));
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let mut exts = Extensions::new();
        exts.push(extended_master_secret());
        let mut buf = Vec::new();
        exts.encode(&mut buf);
        // Append a second copy of the same extension inside the list
        let mut body = buf[2..].to_vec();
        extended_master_secret().encode(&mut body);
        let mut doubled = (body.len() as u16).to_be_bytes().to_vec();
        doubled.extend_from_slice(&body);
        assert!(Extensions::decode(&doubled).is_err());
    }

    #[test]
    fn test_supported_versions_roundtrip() {
        let versions = [ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_3_DRAFT_26];
        let ext = supported_versions_client(&versions);
        let parsed = parse_supported_versions_client(&ext.data).unwrap();
        assert_eq!(parsed, versions);

        let ext = supported_versions_server(ProtocolVersion::TLS1_3);
        assert_eq!(
            parse_supported_versions_server(&ext.data).unwrap(),
            ProtocolVersion::TLS1_3
        );
    }

    #[test]
    fn test_key_share_skips_unknown_groups() {
        let entry = KeyShareEntry {
            group: KeyExchangeAlgorithm::X25519,
            key_exchange: vec![0xab; 32],
        };
        let ext = key_share_client(&[entry.clone()]);

        // Splice in an entry with an unassigned group before ours
        let mut body = vec![0x9a, 0x9a, 0x00, 0x02, 0xff, 0xff];
        body.extend_from_slice(&ext.data[2..]);
        let mut data = ((body.len()) as u16).to_be_bytes().to_vec();
        data.extend_from_slice(&body);

        let parsed = parse_key_share_client(&data).unwrap();
        assert_eq!(parsed, vec![entry]);
    }

    #[test]
    fn test_key_share_retry_roundtrip() {
        let ext = key_share_retry(KeyExchangeAlgorithm::Secp256r1);
        assert_eq!(
            parse_key_share_retry(&ext.data).unwrap(),
            KeyExchangeAlgorithm::Secp256r1
        );
    }

    #[test]
    fn test_server_name_roundtrip() {
        let ext = server_name("example.com");
        assert_eq!(parse_server_name(&ext.data).unwrap(), "example.com");
    }

    #[test]
    fn test_alpn_roundtrip() {
        let protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
        let ext = alpn(&protocols);
        assert_eq!(parse_alpn(&ext.data).unwrap(), protocols);
    }

    #[test]
    fn test_pre_shared_key_roundtrip() {
        let psks = OfferedPsks {
            identities: vec![PskIdentity {
                identity: vec![1, 2, 3, 4],
                obfuscated_ticket_age: 0xdeadbeef,
            }],
            binders: vec![vec![0x42; 32]],
        };
        let ext = pre_shared_key_client(&psks);
        assert_eq!(parse_pre_shared_key_client(&ext.data).unwrap(), psks);
        // Binders list: u16 prefix + (1 + 32)
        assert_eq!(psk_binders_length(&psks), 35);
    }

    #[test]
    fn test_binder_count_mismatch_rejected() {
        let psks = OfferedPsks {
            identities: vec![
                PskIdentity {
                    identity: vec![1],
                    obfuscated_ticket_age: 0,
                },
                PskIdentity {
                    identity: vec![2],
                    obfuscated_ticket_age: 0,
                },
            ],
            binders: vec![vec![0x42; 32]],
        };
        let ext = pre_shared_key_client(&psks);
        assert!(parse_pre_shared_key_client(&ext.data).is_err());
    }

    #[test]
    fn test_renegotiation_info_roundtrip() {
        let ext = renegotiation_info(&[]);
        assert_eq!(parse_renegotiation_info(&ext.data).unwrap(), Vec::<u8>::new());
        let ext = renegotiation_info(&[1, 2, 3]);
        assert_eq!(parse_renegotiation_info(&ext.data).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_psk_modes() {
        let ext = psk_key_exchange_modes();
        assert!(parse_psk_modes_offers_dhe(&ext.data).unwrap());
        assert!(!parse_psk_modes_offers_dhe(&[1, 0]).unwrap());
    }
}
