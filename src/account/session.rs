//! Per-visitor session state and the storage seam behind it.
//!
//! A [`Session`] is loaded at the start of a request, handed to exactly one
//! account action as `&mut Session`, and saved afterwards. Nothing outside
//! this module touches its fields directly.
//!
//! Session keys are SHA-256 digests of the random cookie value; stores never
//! see the raw token.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::HashMap, future::Future, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error};

use super::types::SessionUser;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    authenticated: bool,
    user: Option<SessionUser>,
    csrf_tokens: HashMap<String, String>,
    values: HashMap<String, serde_json::Value>,
    // Set whenever the authentication state changes; the cookie must be rotated.
    #[serde(skip)]
    rotate: bool,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
        self.rotate = true;
    }

    /// Cached account, present only while authenticated.
    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        if self.authenticated {
            self.user.as_ref()
        } else {
            None
        }
    }

    pub fn set_user(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Drop everything: cached user, form tokens and auxiliary values.
    pub fn clear(&mut self) {
        self.authenticated = false;
        self.user = None;
        self.csrf_tokens.clear();
        self.values.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.authenticated
            && self.user.is_none()
            && self.csrf_tokens.is_empty()
            && self.values.is_empty()
    }

    /// Returns true once after the authentication state changed.
    pub fn take_rotation(&mut self) -> bool {
        std::mem::take(&mut self.rotate)
    }

    pub(super) fn csrf_token(&self, scope: &str) -> Option<&str> {
        self.csrf_tokens.get(scope).map(String::as_str)
    }

    pub(super) fn store_csrf_token(&mut self, scope: &str, token: String) {
        self.csrf_tokens.insert(scope.to_string(), token);
    }

    pub(super) fn remove_csrf_token(&mut self, scope: &str) {
        self.csrf_tokens.remove(scope);
    }
}

/// Persistence for sessions, keyed by the hash of the cookie token.
pub trait SessionStore: Send + Sync {
    fn load_session(&self, key: &[u8]) -> impl Future<Output = Result<Option<Session>>> + Send;

    fn save_session(
        &self,
        key: &[u8],
        session: &Session,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    fn destroy_session(&self, key: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Delete every session past its expiry, returning how many were removed.
    fn purge_expired_sessions(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// Purge expired sessions now and then every `every` (at least one second)
/// until the task is aborted or the runtime stops.
pub fn spawn_session_purger<S>(store: S, every: Duration) -> JoinHandle<()>
where
    S: SessionStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(purged) => debug!("removed {purged} expired sessions"),
                Err(err) => error!("session purge failed: {err:#}"),
            }
        }
    })
}

/// Create a new random session token for the cookie.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a session token so raw values never reach a store.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}
