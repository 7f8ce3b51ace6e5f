//! # Miniblog (Accounts & Follow Graph)
//!
//! `miniblog` admits new accounts, authenticates returning users, keeps an
//! authenticated session and records who follows whom.
//!
//! ## Layout
//!
//! - [`account`]: the actions themselves (signup, signin, signout, follow),
//!   the session, anti-forgery tokens and the store traits with their
//!   in-process and PostgreSQL implementations.
//! - [`api`]: axum routes that load the session from a cookie, run one
//!   action and turn its outcome into a response.
//! - [`cli`]: command-line configuration, telemetry and server startup.
//!
//! ## Forms
//!
//! Every state-changing form carries a `_token` field bound to the visitor's
//! session and the form it was issued for. A missing or stale token sends
//! the visitor back to the form without touching any data.

pub mod account;
pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
