use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use miniblog::{
    account::{AccountConfig, MemoryStore, PasswordHasher},
    api::{self, AppState, SESSION_COOKIE_NAME},
};
use secrecy::SecretString;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let store = MemoryStore::new(PasswordHasher::new(SecretString::from(
        "integration-pepper".to_string(),
    )));
    api::router(Arc::new(AppState::new(store.into(), AccountConfig::new())))
}

/// Cookie jar holding at most the session cookie.
#[derive(Default)]
struct Browser {
    session: Option<String>,
}

impl Browser {
    async fn get(&mut self, app: &Router, path: &str) -> Result<Response<Body>> {
        let request = self.with_cookie(Request::get(path)).body(Body::empty())?;
        self.send(app, request).await
    }

    async fn post(
        &mut self,
        app: &Router,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<Response<Body>> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = self
            .with_cookie(Request::post(path))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))?;
        self.send(app, request).await
    }

    fn with_cookie(&self, builder: axum::http::request::Builder) -> axum::http::request::Builder {
        match &self.session {
            Some(token) => builder.header(header::COOKIE, format!("{SESSION_COOKIE_NAME}={token}")),
            None => builder,
        }
    }

    async fn send(&mut self, app: &Router, request: Request<Body>) -> Result<Response<Body>> {
        let response = app.clone().oneshot(request).await?;
        if let Some(cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
        {
            let value = cookie
                .split(';')
                .next()
                .and_then(|pair| pair.trim().strip_prefix(&format!("{SESSION_COOKIE_NAME}=")))
                .unwrap_or_default();
            self.session = (!value.is_empty()).then(|| value.to_string());
        }
        Ok(response)
    }

    /// Load a page and return its JSON view model.
    async fn page(&mut self, app: &Router, path: &str) -> Result<Value> {
        let response = self.get(app, path).await?;
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        json(response).await
    }

    async fn register(&mut self, app: &Router, user_name: &str, password: &str) -> Result<()> {
        let signup = self.page(app, "/account/signup").await?;
        let token = form_token(&signup)?;
        let response = self
            .post(
                app,
                "/account/register",
                &[
                    ("user_name", user_name),
                    ("password", password),
                    ("_token", token.as_str()),
                ],
            )
            .await?;
        assert_eq!(location(&response), Some("/"));
        Ok(())
    }
}

async fn json(response: Response<Body>) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn form_token(page: &Value) -> Result<String> {
    page.get("_token")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .context("page has no _token")
}

fn location(response: &Response<Body>) -> Option<&str> {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn register_then_land_on_account_home() -> Result<()> {
    let app = app();
    let mut browser = Browser::default();

    let signup = browser.page(&app, "/account/signup").await?;
    assert_eq!(
        signup.get("template").and_then(Value::as_str),
        Some("account/signup")
    );
    let anonymous_cookie = browser.session.clone();
    assert!(anonymous_cookie.is_some());

    browser.register(&app, "alice", "secret1").await?;
    assert_ne!(browser.session, anonymous_cookie, "session rotates on signup");

    let response = browser.get(&app, "/").await?;
    assert_eq!(location(&response), Some("/account"));

    let home = browser.page(&app, "/account").await?;
    assert_eq!(
        home.get("template").and_then(Value::as_str),
        Some("account/index")
    );
    assert_eq!(
        home.pointer("/user/user_name").and_then(Value::as_str),
        Some("alice")
    );
    Ok(())
}

#[tokio::test]
async fn invalid_signup_rerenders_form() -> Result<()> {
    let app = app();
    let mut browser = Browser::default();

    let signup = browser.page(&app, "/account/signup").await?;
    let token = form_token(&signup)?;
    let response = browser
        .post(
            &app,
            "/account/register",
            &[("user_name", "al"), ("password", "secret1"), ("_token", token.as_str())],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let page = json(response).await?;
    assert_eq!(
        page.get("template").and_then(Value::as_str),
        Some("account/signup")
    );
    assert_eq!(page.get("user_name").and_then(Value::as_str), Some("al"));
    assert!(page
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| !errors.is_empty()));
    Ok(())
}

#[tokio::test]
async fn plain_visit_to_form_action_is_not_found() -> Result<()> {
    let app = app();
    let mut browser = Browser::default();

    for path in ["/account/register", "/account/authenticate"] {
        let response = browser.get(&app, path).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {path}");
    }

    // Anonymous visitors are sent to the signin form before anything else.
    let response = browser.get(&app, "/account/follow").await?;
    assert_eq!(location(&response), Some("/account/signin"));
    Ok(())
}

#[tokio::test]
async fn forged_token_returns_to_signup() -> Result<()> {
    let app = app();
    let mut browser = Browser::default();

    browser.page(&app, "/account/signup").await?;
    let response = browser
        .post(
            &app,
            "/account/register",
            &[
                ("user_name", "mallory"),
                ("password", "secret1"),
                ("_token", "forged"),
            ],
        )
        .await?;
    assert_eq!(location(&response), Some("/account/signup"));

    // No account was created, so signing in fails.
    let signin = browser.page(&app, "/account/signin").await?;
    let token = form_token(&signin)?;
    let response = browser
        .post(
            &app,
            "/account/authenticate",
            &[
                ("user_name", "mallory"),
                ("password", "secret1"),
                ("_token", token.as_str()),
            ],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json(response).await?;
    assert_eq!(
        page.get("template").and_then(Value::as_str),
        Some("account/signin")
    );
    Ok(())
}

#[tokio::test]
async fn signout_then_signin_again() -> Result<()> {
    let app = app();
    let mut browser = Browser::default();
    browser.register(&app, "carol", "secret1").await?;

    let response = browser.post(&app, "/account/signout", &[]).await?;
    assert_eq!(location(&response), Some("/account/signin"));
    assert!(browser.session.is_none());

    let response = browser.get(&app, "/account").await?;
    assert_eq!(location(&response), Some("/account/signin"));

    let signin = browser.page(&app, "/account/signin").await?;
    let token = form_token(&signin)?;
    let response = browser
        .post(
            &app,
            "/account/authenticate",
            &[
                ("user_name", "carol"),
                ("password", "secret1"),
                ("_token", token.as_str()),
            ],
        )
        .await?;
    assert_eq!(location(&response), Some("/"));

    let home = browser.page(&app, "/account").await?;
    assert_eq!(
        home.pointer("/user/user_name").and_then(Value::as_str),
        Some("carol")
    );
    Ok(())
}

#[tokio::test]
async fn follow_shows_up_on_account_home() -> Result<()> {
    let app = app();

    let mut alice = Browser::default();
    alice.register(&app, "alice", "secret1").await?;

    let mut bob = Browser::default();
    bob.register(&app, "bob", "secret2").await?;

    let home = bob.page(&app, "/account").await?;
    let token = form_token(&home)?;
    let response = bob
        .post(
            &app,
            "/account/follow",
            &[("following_name", "alice"), ("_token", token.as_str())],
        )
        .await?;
    assert_eq!(location(&response), Some("/account"));

    let home = bob.page(&app, "/account").await?;
    let followings = home
        .get("followings")
        .and_then(Value::as_array)
        .context("home has no followings")?;
    assert_eq!(followings.len(), 1);
    assert_eq!(
        followings[0].get("user_name").and_then(Value::as_str),
        Some("alice")
    );

    let alice_home = alice.page(&app, "/account").await?;
    assert_eq!(
        alice_home
            .get("followings")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(0)
    );
    Ok(())
}

#[tokio::test]
async fn follow_with_forged_token_goes_to_profile() -> Result<()> {
    let app = app();

    let mut alice = Browser::default();
    alice.register(&app, "alice", "secret1").await?;
    let mut bob = Browser::default();
    bob.register(&app, "bob", "secret2").await?;

    let response = bob
        .post(
            &app,
            "/account/follow",
            &[("following_name", "alice"), ("_token", "forged")],
        )
        .await?;
    assert_eq!(location(&response), Some("/user/alice"));

    let response = bob
        .post(
            &app,
            "/account/follow",
            &[("following_name", "nobody"), ("_token", "forged")],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn responses_carry_request_id() -> Result<()> {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}
