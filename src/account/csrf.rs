//! Anti-forgery tokens bound to a session and a form scope.
//!
//! Each scope holds only the most recently issued token; issuing a new one
//! replaces the previous value. Whether a verified token stays valid is
//! decided by [`TokenPolicy`].

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::{fmt, str::FromStr};
use subtle::ConstantTimeEq;
use tracing::debug;

use super::session::Session;

const TOKEN_BYTES: usize = 32;

/// Form a token is issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CsrfScope {
    Signup,
    Signin,
    Follow,
}

impl CsrfScope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "account/signup",
            Self::Signin => "account/signin",
            Self::Follow => "account/follow",
        }
    }
}

impl fmt::Display for CsrfScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Verification leaves the token in place, so resubmitting a stale page works.
    #[default]
    Reusable,
    /// A successfully verified token is removed from the session.
    SingleUse,
}

impl TokenPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reusable => "reusable",
            Self::SingleUse => "single-use",
        }
    }
}

impl FromStr for TokenPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "reusable" => Ok(Self::Reusable),
            "single-use" | "single_use" => Ok(Self::SingleUse),
            other => Err(format!("invalid csrf policy: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CsrfTokenService {
    policy: TokenPolicy,
}

impl CsrfTokenService {
    #[must_use]
    pub const fn new(policy: TokenPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Issue a fresh token for `scope`, replacing any earlier one.
    ///
    /// # Errors
    /// Returns an error if the OS random number generator fails.
    pub fn generate(&self, session: &mut Session, scope: CsrfScope) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate csrf token")?;
        let token = Base64UrlUnpadded::encode_string(&bytes);
        session.store_csrf_token(scope.as_str(), token.clone());
        Ok(token)
    }

    /// Check `presented` against the last token issued for `scope`.
    pub fn verify(&self, session: &mut Session, scope: CsrfScope, presented: Option<&str>) -> bool {
        let (Some(presented), Some(expected)) = (presented, session.csrf_token(scope.as_str()))
        else {
            debug!(%scope, "csrf token missing");
            return false;
        };

        let matches: bool = expected.as_bytes().ct_eq(presented.as_bytes()).into();
        if !matches {
            debug!(%scope, "csrf token mismatch");
            return false;
        }

        if self.policy == TokenPolicy::SingleUse {
            session.remove_csrf_token(scope.as_str());
        }
        true
    }
}
