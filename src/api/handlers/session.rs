//! Session cookie handling around a single account action.

use anyhow::{Context, Result};
use axum::{
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Redirect, Response},
};
use tracing::{debug, error};

use crate::{
    account::{
        session::{generate_session_token, hash_session_token},
        AccountConfig, Outcome, Session, SessionStore,
    },
    api::AppState,
};

pub const SESSION_COOKIE_NAME: &str = "miniblog_session";

/// The visitor's session for the duration of one request.
pub(super) struct Visit {
    token: Option<String>,
    pub(super) session: Session,
}

impl Visit {
    /// Resolve the session cookie; unknown or expired tokens start a fresh session.
    pub(super) async fn load(state: &AppState, headers: &HeaderMap) -> Result<Self> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(Self::fresh());
        };
        // Only the hash is stored; never look up raw tokens.
        let stored = state
            .store()
            .load_session(&hash_session_token(&token))
            .await
            .context("failed to load session")?;
        Ok(match stored {
            Some(session) => Self {
                token: Some(token),
                session,
            },
            None => {
                debug!("session cookie did not match a live session");
                Self::fresh()
            }
        })
    }

    fn fresh() -> Self {
        Self {
            token: None,
            session: Session::new(),
        }
    }

    /// Persist the session and turn the action's outcome into a response.
    pub(super) async fn finish(mut self, state: &AppState, outcome: Result<Outcome>) -> Response {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("Account action failed: {err:#}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let cookie = match self.persist(state).await {
            Ok(cookie) => cookie,
            Err(err) => {
                error!("Failed to persist session: {err:#}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = outcome_response(outcome);
        if let Some(cookie) = cookie {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        response
    }

    /// Save the session and return the `Set-Cookie` value for it.
    ///
    /// Every save pushes the stored expiry forward, so the cookie is re-sent
    /// with a fresh `Max-Age` to keep both sides expiring together.
    async fn persist(&mut self, state: &AppState) -> Result<Option<HeaderValue>> {
        let store = state.store();
        let config = state.config();
        let rotate = self.session.take_rotation();

        if self.session.is_empty() {
            // Nothing worth keeping; drop any record and the cookie with it.
            let Some(old) = self.token.take() else {
                return Ok(None);
            };
            store.destroy_session(&hash_session_token(&old)).await?;
            return clear_session_cookie(config)
                .map(Some)
                .context("failed to build session cookie");
        }

        let token = match self.token.take() {
            Some(old) if rotate => {
                store.destroy_session(&hash_session_token(&old)).await?;
                generate_session_token()?
            }
            Some(old) => old,
            None => generate_session_token()?,
        };

        store
            .save_session(&hash_session_token(&token), &self.session, config.session_ttl())
            .await?;

        session_cookie(config, &token)
            .map(Some)
            .context("failed to build session cookie")
    }
}

fn outcome_response(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Render(page) => (StatusCode::OK, Json(page)).into_response(),
        Outcome::Redirect(path) => Redirect::to(&path).into_response(),
        Outcome::NotFound => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AccountConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AccountConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
