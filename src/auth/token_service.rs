//! Opaque, purpose-scoped tokens (spec.md §4.2), backed by a `DashMap`
//! keyed by `(purpose, token)` in the concurrency idiom of the teacher's
//! `presence_manager::PresenceManager` (DashMap + explicit expiry rather
//! than a read-through cache, since `pop_token` needs atomic single-use
//! removal — a plain TTL cache does not give that for free).

use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde_json::Value;

/// Default login/xfr/cal token lifetime (spec.md §5).
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 30;
/// RST flow lifetime (spec.md §5).
pub const RST_TOKEN_LIFETIME_SECS: i64 = 86_400;

struct TokenEntry {
    payload: Value,
    expires_at: DateTime<Utc>,
}

pub struct AuthService {
    tokens: DashMap<(String, String), TokenEntry>,
}

impl AuthService {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    /// Generates a URL-safe token string with >=128 bits of entropy.
    fn generate_token_string() -> String {
        let mut bytes = [0u8; 18]; // 144 bits
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn create_token(&self, purpose: &str, payload: Value, lifetime_seconds: Option<i64>) -> String {
        let token = Self::generate_token_string();
        let lifetime = lifetime_seconds.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let expires_at = Utc::now() + chrono::Duration::seconds(lifetime);
        self.tokens.insert(
            (purpose.to_string(), token.clone()),
            TokenEntry { payload, expires_at },
        );
        token
    }

    /// Passive expiry: an expired entry is reclaimed (removed) on lookup
    /// and treated as a miss.
    pub fn get_token(&self, purpose: &str, token: &str) -> Option<Value> {
        let key = (purpose.to_string(), token.to_string());
        let entry = self.tokens.get(&key)?;
        if entry.expires_at < Utc::now() {
            drop(entry);
            self.tokens.remove(&key);
            return None;
        }
        Some(entry.payload.clone())
    }

    /// Single-use retrieval: at most one caller ever observes `Some` for a
    /// given token (spec.md P7).
    pub fn pop_token(&self, purpose: &str, token: &str) -> Option<Value> {
        let key = (purpose.to_string(), token.to_string());
        let (_, entry) = self.tokens.remove(&key)?;
        if entry.expires_at < Utc::now() {
            return None;
        }
        Some(entry.payload)
    }

    pub fn get_token_expiry(&self, purpose: &str, token: &str) -> Option<i64> {
        let key = (purpose.to_string(), token.to_string());
        let entry = self.tokens.get(&key)?;
        Some(entry.expires_at.timestamp())
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}
