//! Persistence seams consumed by the account actions.
//!
//! Implementations must enforce uniqueness themselves (user names, follow
//! edges) and report a lost race as [`InsertOutcome::Conflict`] rather than
//! an error; the pre-checks made by the actions are advisory only.

use anyhow::Result;
use base64ct::{Base64UrlUnpadded, Encoding};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::future::Future;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use super::{
    session::SessionStore,
    types::{Account, InsertOutcome, PasswordHash, SessionUser},
};

pub trait CredentialStore: Send + Sync {
    fn is_unique_user_name(&self, user_name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Hash `password` and persist a new account.
    fn insert(
        &self,
        user_name: &str,
        password: &str,
    ) -> impl Future<Output = Result<InsertOutcome>> + Send;

    fn fetch_by_user_name(
        &self,
        user_name: &str,
    ) -> impl Future<Output = Result<Option<Account>>> + Send;

    fn hash_password(&self, password: &str) -> PasswordHash;
}

pub trait RelationshipStore: Send + Sync {
    fn is_following(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn insert(
        &self,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> impl Future<Output = Result<InsertOutcome>> + Send;

    /// Accounts followed by `follower_id`, oldest edge first.
    fn followings(
        &self,
        follower_id: Uuid,
    ) -> impl Future<Output = Result<Vec<SessionUser>>> + Send;
}

/// Everything the web layer needs from a single backing store.
pub trait AccountStore:
    CredentialStore + RelationshipStore + SessionStore + Clone + Send + Sync + 'static
{
    /// Cheap liveness check for the health endpoint.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Deterministic one-way password digest.
///
/// SHA-256 over a server-side pepper followed by the password, encoded as
/// unpadded URL-safe base64 (always 43 characters).
#[derive(Clone, Debug)]
pub struct PasswordHasher {
    pepper: SecretString,
}

impl PasswordHasher {
    #[must_use]
    pub fn new(pepper: SecretString) -> Self {
        Self { pepper }
    }

    #[must_use]
    pub fn hash(&self, password: &str) -> PasswordHash {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.expose_secret().as_bytes());
        hasher.update(password.as_bytes());
        PasswordHash::new(Base64UrlUnpadded::encode_string(&hasher.finalize()))
    }
}

/// Constant-time comparison of two stored digests.
#[must_use]
pub fn password_hashes_match(stored: &PasswordHash, presented: &PasswordHash) -> bool {
    stored
        .as_str()
        .as_bytes()
        .ct_eq(presented.as_str().as_bytes())
        .into()
}
