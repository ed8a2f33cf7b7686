//! TLS 1.2 session cache for session-ID resumption (RFC 5246
//! Section 7.4.1.2 abbreviated handshake).

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::cipher::CipherSuite;
use crate::protocol::ProtocolVersion;

/// Everything needed to resume a pre-1.3 session.
#[derive(Clone)]
pub struct Session {
    /// Session ID
    pub session_id: Vec<u8>,
    /// Negotiated version
    pub version: ProtocolVersion,
    /// Negotiated suite
    pub suite: CipherSuite,
    /// The 48-byte master secret
    pub master_secret: Zeroizing<Vec<u8>>,
    /// Whether the session used the extended master secret
    pub extended_master_secret: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("version", &self.version)
            .field("suite", &self.suite)
            .field("extended_master_secret", &self.extended_master_secret)
            .finish()
    }
}

/// Bounded LRU session cache.
pub struct SessionCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    sessions: HashMap<Vec<u8>, Session>,
    order: Vec<Vec<u8>>,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl SessionCache {
    /// Create a cache holding at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                order: Vec::new(),
            }),
            capacity,
        }
    }

    /// Store a session under its session ID.
    pub fn insert(&self, session: Session) {
        let mut inner = self.inner.lock().expect("session cache poisoned");
        let id = session.session_id.clone();
        inner.order.retain(|k| k != &id);
        while inner.order.len() >= self.capacity {
            let oldest = inner.order.remove(0);
            inner.sessions.remove(&oldest);
        }
        inner.order.push(id.clone());
        inner.sessions.insert(id, session);
    }

    /// Look up a session, refreshing its LRU position.
    pub fn get(&self, session_id: &[u8]) -> Option<Session> {
        let mut inner = self.inner.lock().expect("session cache poisoned");
        let session = inner.sessions.get(session_id)?.clone();
        inner.order.retain(|k| k != session_id);
        inner.order.push(session_id.to_vec());
        Some(session)
    }

    /// Drop a session (e.g. after a fatal alert on resumption).
    pub fn remove(&self, session_id: &[u8]) {
        let mut inner = self.inner.lock().expect("session cache poisoned");
        inner.sessions.remove(session_id);
        inner.order.retain(|k| k != session_id);
    }

    /// Number of cached sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("session cache poisoned").sessions.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u8) -> Session {
        Session {
            session_id: vec![id; 32],
            version: ProtocolVersion::TLS1_2,
            suite: CipherSuite::EcdheRsaAes128GcmSha256,
            master_secret: Zeroizing::new(vec![id; 48]),
            extended_master_secret: true,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = SessionCache::default();
        cache.insert(session(1));
        let out = cache.get(&[1; 32]).unwrap();
        assert_eq!(out.suite, CipherSuite::EcdheRsaAes128GcmSha256);
        assert!(cache.get(&[2; 32]).is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = SessionCache::new(2);
        cache.insert(session(1));
        cache.insert(session(2));
        // Touch 1 so 2 becomes the eviction candidate
        cache.get(&[1; 32]).unwrap();
        cache.insert(session(3));
        assert!(cache.get(&[1; 32]).is_some());
        assert!(cache.get(&[2; 32]).is_none());
        assert!(cache.get(&[3; 32]).is_some());
    }

    #[test]
    fn test_remove() {
        let cache = SessionCache::default();
        cache.insert(session(1));
        cache.remove(&[1; 32]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_debug_hides_master_secret() {
        let s = session(7);
        let out = format!("{:?}", s);
        // The field name may appear; the secret bytes must not.
        assert!(!out.contains(&hex::encode(&*s.master_secret)));
        assert!(!out.contains("[7, 7, 7"));
        assert!(out.contains("session_id"));
    }
}
