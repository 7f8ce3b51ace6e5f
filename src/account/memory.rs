//! In-process store for tests and single-instance development.
//!
//! All state lives behind one `tokio` mutex, so the uniqueness checks made
//! inside `insert` are atomic with the write.

use anyhow::Result;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    session::{Session, SessionStore},
    store::{AccountStore, CredentialStore, PasswordHasher, RelationshipStore},
    types::{Account, InsertOutcome, PasswordHash, SessionUser},
};

struct StoredSession {
    session: Session,
    expires_at: Instant,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    // (follower, followee) in insertion order
    edges: Vec<(Uuid, Uuid)>,
    sessions: HashMap<Vec<u8>, StoredSession>,
}

#[derive(Clone)]
pub struct MemoryStore {
    hasher: PasswordHasher,
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(hasher: PasswordHasher) -> Self {
        Self {
            hasher,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub async fn account_count(&self) -> usize {
        self.state.lock().await.accounts.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.state.lock().await.edges.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

impl CredentialStore for MemoryStore {
    async fn is_unique_user_name(&self, user_name: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(!state.accounts.iter().any(|a| a.user_name == user_name))
    }

    async fn insert(&self, user_name: &str, password: &str) -> Result<InsertOutcome> {
        let password_hash = self.hasher.hash(password);
        let mut state = self.state.lock().await;
        if state.accounts.iter().any(|a| a.user_name == user_name) {
            return Ok(InsertOutcome::Conflict);
        }
        state.accounts.push(Account {
            id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            password_hash,
        });
        Ok(InsertOutcome::Created)
    }

    async fn fetch_by_user_name(&self, user_name: &str) -> Result<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .iter()
            .find(|a| a.user_name == user_name)
            .cloned())
    }

    fn hash_password(&self, password: &str) -> PasswordHash {
        self.hasher.hash(password)
    }
}

impl RelationshipStore for MemoryStore {
    async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.edges.contains(&(follower_id, followee_id)))
    }

    async fn insert(&self, follower_id: Uuid, followee_id: Uuid) -> Result<InsertOutcome> {
        let mut state = self.state.lock().await;
        if follower_id == followee_id || state.edges.contains(&(follower_id, followee_id)) {
            return Ok(InsertOutcome::Conflict);
        }
        state.edges.push((follower_id, followee_id));
        Ok(InsertOutcome::Created)
    }

    async fn followings(&self, follower_id: Uuid) -> Result<Vec<SessionUser>> {
        let state = self.state.lock().await;
        Ok(state
            .edges
            .iter()
            .filter(|(follower, _)| *follower == follower_id)
            .filter_map(|(_, followee)| state.accounts.iter().find(|a| a.id == *followee))
            .map(SessionUser::from)
            .collect())
    }
}

impl SessionStore for MemoryStore {
    async fn load_session(&self, key: &[u8]) -> Result<Option<Session>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.sessions.retain(|_, stored| stored.expires_at > now);
        Ok(state.sessions.get(key).map(|stored| stored.session.clone()))
    }

    async fn save_session(&self, key: &[u8], session: &Session, ttl: Duration) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sessions.insert(
            key.to_vec(),
            StoredSession {
                session: session.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn destroy_session(&self, key: &[u8]) -> Result<()> {
        self.state.lock().await.sessions.remove(key);
        Ok(())
    }

    async fn purge_expired_sessions(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        let now = Instant::now();
        state.sessions.retain(|_, stored| stored.expires_at > now);
        Ok(u64::try_from(before - state.sessions.len())?)
    }
}

impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::session::spawn_session_purger;
    use secrecy::SecretString;

    fn store() -> MemoryStore {
        MemoryStore::new(PasswordHasher::new(SecretString::from("pepper".to_string())))
    }

    async fn account_id(store: &MemoryStore, user_name: &str) -> Result<Uuid> {
        store
            .fetch_by_user_name(user_name)
            .await?
            .map(|account| account.id)
            .ok_or_else(|| anyhow::anyhow!("missing account {user_name}"))
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_user_name() -> Result<()> {
        let store = store();
        assert_eq!(
            CredentialStore::insert(&store, "frank", "pass123").await?,
            InsertOutcome::Created
        );
        assert_eq!(
            CredentialStore::insert(&store, "frank", "other").await?,
            InsertOutcome::Conflict
        );
        assert_eq!(store.account_count().await, 1);
        assert!(!store.is_unique_user_name("frank").await?);
        assert!(store.is_unique_user_name("grace").await?);
        Ok(())
    }

    #[tokio::test]
    async fn stored_hash_is_not_plaintext() -> Result<()> {
        let store = store();
        CredentialStore::insert(&store, "heidi", "pass123").await?;
        let account = store.fetch_by_user_name("heidi").await?;
        let hash = account.map(|a| a.password_hash);
        assert_eq!(hash, Some(store.hash_password("pass123")));
        assert_ne!(
            hash.as_ref().map(PasswordHash::as_str),
            Some("pass123")
        );
        Ok(())
    }

    #[tokio::test]
    async fn edges_are_directed_and_unique() -> Result<()> {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(
            RelationshipStore::insert(&store, a, b).await?,
            InsertOutcome::Created
        );
        assert_eq!(
            RelationshipStore::insert(&store, a, b).await?,
            InsertOutcome::Conflict
        );
        assert_eq!(
            RelationshipStore::insert(&store, a, a).await?,
            InsertOutcome::Conflict
        );
        assert!(store.is_following(a, b).await?);
        assert!(!store.is_following(b, a).await?);
        assert_eq!(store.edge_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn followings_resolve_accounts_in_edge_order() -> Result<()> {
        let store = store();
        for name in ["ivan", "judy", "mallory"] {
            CredentialStore::insert(&store, name, "pass123").await?;
        }
        let ivan = account_id(&store, "ivan").await?;
        let judy = account_id(&store, "judy").await?;
        let mallory = account_id(&store, "mallory").await?;

        RelationshipStore::insert(&store, ivan, mallory).await?;
        RelationshipStore::insert(&store, ivan, judy).await?;

        let names: Vec<String> = store
            .followings(ivan)
            .await?
            .into_iter()
            .map(|u| u.user_name)
            .collect();
        assert_eq!(names, vec!["mallory".to_string(), "judy".to_string()]);
        assert!(store.followings(judy).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn sessions_expire_and_can_be_destroyed() -> Result<()> {
        let store = store();
        let mut session = Session::new();
        session.set("k", serde_json::json!(1));

        store
            .save_session(b"live", &session, Duration::from_secs(60))
            .await?;
        store
            .save_session(b"stale", &session, Duration::from_secs(0))
            .await?;

        assert_eq!(store.load_session(b"live").await?, Some(session));
        assert_eq!(store.load_session(b"stale").await?, None);
        assert_eq!(store.session_count().await, 1);

        store.destroy_session(b"live").await?;
        assert_eq!(store.load_session(b"live").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() -> Result<()> {
        let store = store();
        let session = Session::new();
        store
            .save_session(b"live", &session, Duration::from_secs(60))
            .await?;
        store
            .save_session(b"stale-1", &session, Duration::from_secs(0))
            .await?;
        store
            .save_session(b"stale-2", &session, Duration::from_secs(0))
            .await?;

        assert_eq!(store.purge_expired_sessions().await?, 2);
        assert_eq!(store.purge_expired_sessions().await?, 0);
        assert_eq!(store.session_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn purger_runs_without_any_session_reads() -> Result<()> {
        let store = store();
        store
            .save_session(b"stale", &Session::new(), Duration::from_secs(0))
            .await?;

        let purger = spawn_session_purger(store.clone(), Duration::from_secs(3600));
        // The first tick fires immediately.
        for _ in 0..50 {
            if store.session_count().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        purger.abort();

        assert_eq!(store.session_count().await, 0);
        Ok(())
    }
}
