//! # Accounts
//!
//! Signup, signin, signout and follow actions for a small social app.
//!
//! Each action is a plain async function that takes the visitor's
//! [`Session`], the [`CsrfTokenService`], the stores it needs and the
//! submitted [`ActionRequest`], and returns an [`Outcome`] for the web layer
//! to turn into a response. Actions never panic on bad input: validation
//! problems become [`ValidationError`]s on a re-rendered [`Page`], forged or
//! stale forms become redirects, and only infrastructure failures surface as
//! `Err`.
//!
//! ## State
//!
//! A visitor is either anonymous or authenticated. Signup and signin move an
//! anonymous visitor to authenticated; signout clears the whole session.
//! Every change of the authenticated flag asks the web layer to rotate the
//! session cookie.
//!
//! ## Follow edges
//!
//! Edges are directed and unique per ordered pair. Self-follows and repeats
//! are silently ignored.

pub mod auth;
pub mod backend;
pub mod csrf;
pub mod follow;
pub mod memory;
pub mod postgres;
pub mod session;
pub mod store;
pub mod types;


use std::time::Duration;

pub use self::{
    auth::{authenticate, index, register, signin, signout, signup},
    backend::Backend,
    csrf::{CsrfScope, CsrfTokenService, TokenPolicy},
    follow::follow,
    memory::MemoryStore,
    postgres::PgStore,
    session::{Session, SessionStore},
    store::{AccountStore, CredentialStore, PasswordHasher, RelationshipStore},
    types::{
        Account, AccountHome, ActionRequest, CredentialForm, InsertOutcome, Outcome, Page,
        PasswordHash, SessionUser, ValidationError,
    },
};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 604_800;

/// Settings shared by the account actions and the session cookie.
#[derive(Clone, Debug)]
pub struct AccountConfig {
    csrf_policy: TokenPolicy,
    session_ttl_seconds: u64,
    session_cookie_secure: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            csrf_policy: TokenPolicy::default(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
        }
    }

    #[must_use]
    pub fn with_csrf_policy(mut self, policy: TokenPolicy) -> Self {
        self.csrf_policy = policy;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn csrf_policy(&self) -> TokenPolicy {
        self.csrf_policy
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    /// Only mark cookies secure when the site is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn csrf(&self) -> CsrfTokenService {
        CsrfTokenService::new(self.csrf_policy)
    }
}
