//! Runtime choice between the in-process and PostgreSQL stores.

use anyhow::Result;
use std::time::Duration;
use uuid::Uuid;

use super::{
    memory::MemoryStore,
    postgres::PgStore,
    session::{Session, SessionStore},
    store::{AccountStore, CredentialStore, RelationshipStore},
    types::{Account, InsertOutcome, PasswordHash, SessionUser},
};

#[derive(Clone)]
pub enum Backend {
    Memory(MemoryStore),
    Postgres(PgStore),
}

impl Backend {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgresql",
        }
    }
}

impl From<MemoryStore> for Backend {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

impl From<PgStore> for Backend {
    fn from(store: PgStore) -> Self {
        Self::Postgres(store)
    }
}

impl CredentialStore for Backend {
    async fn is_unique_user_name(&self, user_name: &str) -> Result<bool> {
        match self {
            Self::Memory(store) => store.is_unique_user_name(user_name).await,
            Self::Postgres(store) => store.is_unique_user_name(user_name).await,
        }
    }

    async fn insert(&self, user_name: &str, password: &str) -> Result<InsertOutcome> {
        match self {
            Self::Memory(store) => CredentialStore::insert(store, user_name, password).await,
            Self::Postgres(store) => CredentialStore::insert(store, user_name, password).await,
        }
    }

    async fn fetch_by_user_name(&self, user_name: &str) -> Result<Option<Account>> {
        match self {
            Self::Memory(store) => store.fetch_by_user_name(user_name).await,
            Self::Postgres(store) => store.fetch_by_user_name(user_name).await,
        }
    }

    fn hash_password(&self, password: &str) -> PasswordHash {
        match self {
            Self::Memory(store) => store.hash_password(password),
            Self::Postgres(store) => store.hash_password(password),
        }
    }
}

impl RelationshipStore for Backend {
    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        match self {
            Self::Memory(store) => store.is_following(follower_id, followee_id).await,
            Self::Postgres(store) => store.is_following(follower_id, followee_id).await,
        }
    }

    async fn insert(&self, follower_id: Uuid, followee_id: Uuid) -> Result<InsertOutcome> {
        match self {
            Self::Memory(store) => RelationshipStore::insert(store, follower_id, followee_id).await,
            Self::Postgres(store) => {
                RelationshipStore::insert(store, follower_id, followee_id).await
            }
        }
    }

    async fn followings(&self, follower_id: Uuid) -> Result<Vec<SessionUser>> {
        match self {
            Self::Memory(store) => store.followings(follower_id).await,
            Self::Postgres(store) => store.followings(follower_id).await,
        }
    }
}

impl SessionStore for Backend {
    async fn load_session(&self, key: &[u8]) -> Result<Option<Session>> {
        match self {
            Self::Memory(store) => store.load_session(key).await,
            Self::Postgres(store) => store.load_session(key).await,
        }
    }

    async fn save_session(&self, key: &[u8], session: &Session, ttl: Duration) -> Result<()> {
        match self {
            Self::Memory(store) => store.save_session(key, session, ttl).await,
            Self::Postgres(store) => store.save_session(key, session, ttl).await,
        }
    }

    async fn destroy_session(&self, key: &[u8]) -> Result<()> {
        match self {
            Self::Memory(store) => store.destroy_session(key).await,
            Self::Postgres(store) => store.destroy_session(key).await,
        }
    }

    async fn purge_expired_sessions(&self) -> Result<u64> {
        match self {
            Self::Memory(store) => store.purge_expired_sessions().await,
            Self::Postgres(store) => store.purge_expired_sessions().await,
        }
    }
}

impl AccountStore for Backend {
    async fn ping(&self) -> Result<()> {
        match self {
            Self::Memory(store) => store.ping().await,
            Self::Postgres(store) => store.ping().await,
        }
    }
}
