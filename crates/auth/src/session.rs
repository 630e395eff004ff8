//! Session-store abstraction.
//!
//! A session is a small key/value bag addressed by an opaque [`SessionKey`]
//! (the value of the session cookie). Values are JSON so any serializable
//! snapshot can be stored.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

/// Session key holding the [`AuthUser`](crate::AuthUser) snapshot.
pub const USER_KEY: &str = "user";

/// Session key whose presence marks the session as authenticated.
pub const USER_ID_KEY: &str = "userId";

/// Opaque session token, carried per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Fresh unguessable key (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session value could not be (de)serialized: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("session backend failure: {0}")]
    Backend(String),
}

/// Key/value session backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: &SessionKey, key: &str, value: JsonValue) -> Result<(), SessionError>;

    async fn get(&self, session: &SessionKey, key: &str) -> Result<Option<JsonValue>, SessionError>;

    /// True when `session` names a live session this store issued.
    async fn contains(&self, session: &SessionKey) -> Result<bool, SessionError>;

    /// Start an empty session under a freshly generated key.
    async fn create(&self) -> Result<SessionKey, SessionError>;

    /// Move the values of `session` to a freshly generated key and retire
    /// the old one. An unknown or expired `session` yields an empty session.
    async fn regenerate(&self, session: &SessionKey) -> Result<SessionKey, SessionError>;

    async fn exists(&self, session: &SessionKey, key: &str) -> Result<bool, SessionError> {
        Ok(self.get(session, key).await?.is_some())
    }

    /// Remove and return a value (flash semantics).
    async fn remove(&self, session: &SessionKey, key: &str) -> Result<Option<JsonValue>, SessionError>;

    /// Drop every value of the session.
    async fn destroy(&self, session: &SessionKey) -> Result<(), SessionError>;

    /// Token identifying the session, suitable for a remember-me column.
    fn token(&self, session: &SessionKey) -> String {
        session.as_str().to_string()
    }

    /// Toggle the long-lived ("remember me") lifetime for the session.
    async fn remember_me(&self, session: &SessionKey, remember: bool) -> Result<(), SessionError>;
}

/// Serialize `value` and store it under `key`.
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn SessionStore,
    session: &SessionKey,
    key: &str,
    value: &T,
) -> Result<(), SessionError> {
    store.put(session, key, serde_json::to_value(value)?).await
}

/// Fetch `key` and deserialize it.
pub async fn get_json<T: for<'de> Deserialize<'de>>(
    store: &dyn SessionStore,
    session: &SessionKey,
    key: &str,
) -> Result<Option<T>, SessionError> {
    match store.get(session, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Remove `key` and deserialize what was there.
pub async fn pop_json<T: for<'de> Deserialize<'de>>(
    store: &dyn SessionStore,
    session: &SessionKey,
    key: &str,
) -> Result<Option<T>, SessionError> {
    match store.remove(session, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// Default idle lifetime of a session, in seconds.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 2 * 60 * 60;

/// Lifetime of a session flagged with remember-me, in seconds.
pub const REMEMBER_ME_TTL_SECS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug)]
struct SessionEntry {
    values: HashMap<String, JsonValue>,
    remember: bool,
    expires_at: DateTime<Utc>,
}

/// Process-local session store for dev/tests and single-node deployments.
///
/// Every write slides the expiry forward; expired sessions read as empty and
/// are dropped by [`InMemorySessionStore::purge_expired`].
#[derive(Debug)]
pub struct InMemorySessionStore {
    inner: RwLock<HashMap<SessionKey, SessionEntry>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Drop expired sessions; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        match self.inner.write() {
            Ok(mut map) => {
                let before = map.len();
                map.retain(|_, entry| entry.expires_at > now);
                before - map.len()
            }
            Err(_) => 0,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lifetime(&self, remember: bool) -> Duration {
        if remember {
            Duration::seconds(REMEMBER_ME_TTL_SECS)
        } else {
            self.ttl
        }
    }

    fn with_live_entry<R>(
        &self,
        session: &SessionKey,
        f: impl FnOnce(&mut SessionEntry) -> R,
    ) -> Result<Option<R>, SessionError> {
        let now = Utc::now();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get_mut(session) {
            Some(entry) if entry.expires_at > now => Ok(Some(f(entry))),
            Some(_) => {
                map.remove(session);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> SessionError {
    SessionError::Backend("session lock poisoned".to_string())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: &SessionKey, key: &str, value: JsonValue) -> Result<(), SessionError> {
        let now = Utc::now();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let entry = map.entry(session.clone()).or_insert_with(|| SessionEntry {
            values: HashMap::new(),
            remember: false,
            expires_at: now,
        });
        if entry.expires_at <= now {
            entry.values.clear();
            entry.remember = false;
        }
        entry.values.insert(key.to_string(), value);
        entry.expires_at = now + self.lifetime(entry.remember);
        Ok(())
    }

    async fn get(&self, session: &SessionKey, key: &str) -> Result<Option<JsonValue>, SessionError> {
        let now = Utc::now();
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(session)
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.values.get(key).cloned()))
    }

    async fn contains(&self, session: &SessionKey) -> Result<bool, SessionError> {
        let now = Utc::now();
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(session).is_some_and(|entry| entry.expires_at > now))
    }

    async fn create(&self) -> Result<SessionKey, SessionError> {
        let key = SessionKey::generate();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(
            key.clone(),
            SessionEntry {
                values: HashMap::new(),
                remember: false,
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(key)
    }

    async fn regenerate(&self, session: &SessionKey) -> Result<SessionKey, SessionError> {
        let now = Utc::now();
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let mut entry = map
            .remove(session)
            .filter(|entry| entry.expires_at > now)
            .unwrap_or_else(|| SessionEntry {
                values: HashMap::new(),
                remember: false,
                expires_at: now,
            });
        entry.expires_at = now + self.lifetime(entry.remember);

        let key = SessionKey::generate();
        map.insert(key.clone(), entry);
        Ok(key)
    }

    async fn remove(&self, session: &SessionKey, key: &str) -> Result<Option<JsonValue>, SessionError> {
        Ok(self
            .with_live_entry(session, |entry| entry.values.remove(key))?
            .flatten())
    }

    async fn destroy(&self, session: &SessionKey) -> Result<(), SessionError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.remove(session);
        Ok(())
    }

    async fn remember_me(&self, session: &SessionKey, remember: bool) -> Result<(), SessionError> {
        let lifetime = self.lifetime(remember);
        self.with_live_entry(session, |entry| {
            entry.remember = remember;
            entry.expires_at = Utc::now() + lifetime;
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(k: &str) -> SessionKey {
        SessionKey::new(k)
    }

    #[tokio::test]
    async fn put_get_exists() {
        let store = InMemorySessionStore::new();
        let s = key("abc");

        assert!(!store.exists(&s, USER_ID_KEY).await.unwrap());
        store.put(&s, USER_ID_KEY, json!("7")).await.unwrap();

        assert!(store.exists(&s, USER_ID_KEY).await.unwrap());
        assert_eq!(store.get(&s, USER_ID_KEY).await.unwrap(), Some(json!("7")));
        assert_eq!(store.get(&key("other"), USER_ID_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_pops_once() {
        let store = InMemorySessionStore::new();
        let s = key("abc");
        put_json(&store, &s, "message", "hello").await.unwrap();

        let first: Option<String> = pop_json(&store, &s, "message").await.unwrap();
        let second: Option<String> = pop_json(&store, &s, "message").await.unwrap();
        assert_eq!(first.as_deref(), Some("hello"));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn destroy_clears_everything() {
        let store = InMemorySessionStore::new();
        let s = key("abc");
        store.put(&s, USER_KEY, json!({"id": "1"})).await.unwrap();
        store.put(&s, USER_ID_KEY, json!("1")).await.unwrap();

        store.destroy(&s).await.unwrap();

        assert!(!store.exists(&s, USER_ID_KEY).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_sessions_read_as_empty() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(-1));
        let s = key("abc");
        store.put(&s, USER_ID_KEY, json!("1")).await.unwrap();

        assert!(!store.exists(&s, USER_ID_KEY).await.unwrap());
        assert_eq!(store.purge_expired(), 1);
    }

    #[tokio::test]
    async fn remember_me_extends_lifetime() {
        let store = InMemorySessionStore::with_ttl(Duration::seconds(-1));
        let s = key("abc");
        store.put(&s, USER_ID_KEY, json!("1")).await.unwrap();
        // already expired: remember-me cannot resurrect it
        store.remember_me(&s, true).await.unwrap();
        assert!(!store.exists(&s, USER_ID_KEY).await.unwrap());

        let store = InMemorySessionStore::new();
        store.put(&s, USER_ID_KEY, json!("1")).await.unwrap();
        store.remember_me(&s, true).await.unwrap();
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.token(&s), "abc");
    }

    #[tokio::test]
    async fn only_issued_sessions_are_known() {
        let store = InMemorySessionStore::new();
        assert!(!store.contains(&key("made-up")).await.unwrap());

        let issued = store.create().await.unwrap();
        assert!(store.contains(&issued).await.unwrap());
        assert_ne!(issued, store.create().await.unwrap());

        let expiring = InMemorySessionStore::with_ttl(Duration::seconds(-1));
        let stale = expiring.create().await.unwrap();
        assert!(!expiring.contains(&stale).await.unwrap());
    }

    #[tokio::test]
    async fn regenerate_moves_values_to_a_new_key() {
        let store = InMemorySessionStore::new();
        let old = store.create().await.unwrap();
        store.put(&old, "message", json!("hi")).await.unwrap();
        store.remember_me(&old, true).await.unwrap();

        let new = store.regenerate(&old).await.unwrap();

        assert_ne!(new, old);
        assert!(!store.contains(&old).await.unwrap());
        assert_eq!(store.get(&old, "message").await.unwrap(), None);
        assert_eq!(store.get(&new, "message").await.unwrap(), Some(json!("hi")));
        assert_eq!(store.len(), 1);

        let from_unknown = store.regenerate(&key("planted")).await.unwrap();
        assert!(store.contains(&from_unknown).await.unwrap());
        assert!(!store.contains(&key("planted")).await.unwrap());
    }
}
