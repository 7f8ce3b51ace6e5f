//! HTTP handlers.
//!
//! Account handlers share one shape: load the session from the cookie, run a
//! single action from [`crate::account`], then save the session and map the
//! outcome to a response (`200` JSON view, `303` redirect, `404`, or `500`
//! after logging an infrastructure error).

pub mod account;
pub mod health;
pub mod root;
pub mod session;
