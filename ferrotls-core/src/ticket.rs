//! Session tickets and resumption PSKs (TLS 1.3, RFC 8446 Section 4.6.1).
//!
//! The server stores the PSK derived for each ticket it issues and
//! removes it on first use; a replayed ticket never resumes. The client
//! keeps the mirror image: the ticket label plus the PSK it derived
//! from its own resumption master secret.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use zeroize::Zeroizing;

use crate::cipher::CipherSuite;

/// How far the client's reported ticket age may drift from the age the
/// server measures, in milliseconds.
pub const TICKET_AGE_TOLERANCE_MS: u64 = 10_000;

/// Default ticket lifetime in seconds.
pub const DEFAULT_TICKET_LIFETIME_SECS: u32 = 7200;

/// Server-side record of an issued ticket.
pub struct StoredTicket {
    /// The per-ticket PSK
    pub psk: Zeroizing<Vec<u8>>,
    /// Suite the original connection used (fixes the PSK hash)
    pub suite: CipherSuite,
    /// Age obfuscation value sent in the ticket
    pub age_add: u32,
    /// Lifetime in seconds
    pub lifetime: u32,
    /// When the ticket was issued
    pub issued_at: Instant,
}

impl std::fmt::Debug for StoredTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTicket")
            .field("suite", &self.suite)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl StoredTicket {
    /// Validate the client's obfuscated ticket age against the server's
    /// own clock.
    ///
    /// The client sends `(age_ms + age_add) mod 2^32`; after removing
    /// the obfuscation the two measurements must agree within
    /// [`TICKET_AGE_TOLERANCE_MS`], and the ticket must not have
    /// outlived its advertised lifetime.
    pub fn age_is_valid(&self, obfuscated_ticket_age: u32) -> bool {
        let claimed_ms = u64::from(obfuscated_ticket_age.wrapping_sub(self.age_add));
        let actual_ms = self.issued_at.elapsed().as_millis() as u64;
        if actual_ms > u64::from(self.lifetime) * 1000 {
            return false;
        }
        actual_ms.abs_diff(claimed_ms) <= TICKET_AGE_TOLERANCE_MS
    }
}

/// Server-side ticket store.
///
/// Bounded; oldest tickets fall out first when full. Lookup removes the
/// entry, making every ticket single use.
pub struct TicketStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    tickets: HashMap<Vec<u8>, StoredTicket>,
    order: Vec<Vec<u8>>,
}

impl std::fmt::Debug for TicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketStore")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl TicketStore {
    /// Create a store holding at most `capacity` outstanding tickets.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tickets: HashMap::new(),
                order: Vec::new(),
            }),
            capacity,
        }
    }

    /// Record an issued ticket.
    pub fn insert(&self, ticket: Vec<u8>, entry: StoredTicket) {
        let mut inner = self.inner.lock().expect("ticket store poisoned");
        while inner.order.len() >= self.capacity {
            let oldest = inner.order.remove(0);
            inner.tickets.remove(&oldest);
        }
        inner.order.push(ticket.clone());
        inner.tickets.insert(ticket, entry);
    }

    /// Redeem a ticket. Removes it; a second redemption returns `None`.
    pub fn take(&self, ticket: &[u8]) -> Option<StoredTicket> {
        let mut inner = self.inner.lock().expect("ticket store poisoned");
        let entry = inner.tickets.remove(ticket)?;
        inner.order.retain(|t| t != ticket);
        Some(entry)
    }

    /// Number of outstanding tickets.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("ticket store poisoned").tickets.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Client-side record of a ticket received on an earlier connection.
pub struct ClientTicket {
    /// Opaque ticket label to offer as the PSK identity
    pub ticket: Vec<u8>,
    /// PSK derived from the resumption master secret and ticket nonce
    pub psk: Zeroizing<Vec<u8>>,
    /// Suite of the original connection
    pub suite: CipherSuite,
    /// Age obfuscation value from the NewSessionTicket
    pub age_add: u32,
    /// Lifetime in seconds
    pub lifetime: u32,
    /// When the ticket arrived
    pub received_at: Instant,
}

impl std::fmt::Debug for ClientTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTicket")
            .field("suite", &self.suite)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl ClientTicket {
    /// The obfuscated age to put in the pre_shared_key offer.
    pub fn obfuscated_age(&self) -> u32 {
        let age_ms = self.received_at.elapsed().as_millis() as u32;
        age_ms.wrapping_add(self.age_add)
    }

    /// Whether the ticket is still within its lifetime.
    pub fn is_fresh(&self) -> bool {
        self.received_at.elapsed() < Duration::from_secs(u64::from(self.lifetime))
    }
}
