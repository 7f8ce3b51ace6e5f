//! Account routes. Each handler loads the session, runs one action and
//! saves the session again.

use axum::{
    extract::{Extension, Form},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};
use tracing::instrument;
use utoipa::ToSchema;

use super::session::Visit;
use crate::{
    account::{
        self,
        types::{FOLLOWING_NAME_FIELD, PASSWORD_FIELD, TOKEN_FIELD, USER_NAME_FIELD},
        ActionRequest, Page,
    },
    api::AppState,
};

/// Signup and signin form fields.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CredentialsInput {
    user_name: Option<String>,
    password: Option<String>,
    #[serde(rename = "_token")]
    token: Option<String>,
}

/// Follow form fields.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FollowInput {
    following_name: Option<String>,
    #[serde(rename = "_token")]
    token: Option<String>,
}

impl From<CredentialsInput> for HashMap<String, String> {
    fn from(input: CredentialsInput) -> Self {
        fields([
            (USER_NAME_FIELD, input.user_name),
            (PASSWORD_FIELD, input.password),
            (TOKEN_FIELD, input.token),
        ])
    }
}

impl From<FollowInput> for HashMap<String, String> {
    fn from(input: FollowInput) -> Self {
        fields([
            (FOLLOWING_NAME_FIELD, input.following_name),
            (TOKEN_FIELD, input.token),
        ])
    }
}

fn fields<const N: usize>(pairs: [(&str, Option<String>); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name.to_string(), value)))
        .collect()
}

/// Only `POST` counts as a form submission.
fn action_request<T: Into<HashMap<String, String>>>(
    method: &Method,
    form: Option<Form<T>>,
) -> ActionRequest {
    let fields = form.map(|Form(input)| input.into()).unwrap_or_default();
    ActionRequest::new(method == Method::POST, fields)
}

macro_rules! try_visit {
    ($state:expr, $headers:expr) => {
        match Visit::load(&$state, &$headers).await {
            Ok(visit) => visit,
            Err(err) => {
                tracing::error!("Failed to load session: {err:#}");
                return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    };
}

#[utoipa::path(
    get,
    path = "/account",
    responses(
        (status = 200, description = "Signed-in user and the accounts they follow", body = Page),
        (status = 303, description = "Not signed in; redirect to the signin form")
    ),
    tag = "account"
)]
pub async fn index(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let mut visit = try_visit!(state, headers);
    let outcome = account::index(&mut visit.session, state.csrf(), state.store()).await;
    visit.finish(&state, outcome).await
}

#[utoipa::path(
    get,
    path = "/account/signup",
    responses(
        (status = 200, description = "Empty signup form with a fresh token", body = Page),
        (status = 303, description = "Already signed in")
    ),
    tag = "account"
)]
pub async fn signup(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let mut visit = try_visit!(state, headers);
    let outcome = account::signup(&mut visit.session, state.csrf());
    visit.finish(&state, outcome).await
}

#[utoipa::path(
    post,
    path = "/account/register",
    request_body(content = CredentialsInput, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signup form re-rendered with validation errors", body = Page),
        (status = 303, description = "Registered and signed in, already signed in, or stale form"),
        (status = 404, description = "Not a form submission")
    ),
    tag = "account"
)]
#[instrument(skip_all, fields(http.method = %method))]
pub async fn register(
    method: Method,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    form: Option<Form<CredentialsInput>>,
) -> Response {
    let request = action_request(&method, form);
    let mut visit = try_visit!(state, headers);
    let outcome = account::register(&mut visit.session, state.csrf(), state.store(), &request).await;
    visit.finish(&state, outcome).await
}

#[utoipa::path(
    get,
    path = "/account/signin",
    responses(
        (status = 200, description = "Empty signin form with a fresh token", body = Page),
        (status = 303, description = "Already signed in")
    ),
    tag = "account"
)]
pub async fn signin(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let mut visit = try_visit!(state, headers);
    let outcome = account::signin(&mut visit.session, state.csrf());
    visit.finish(&state, outcome).await
}

#[utoipa::path(
    post,
    path = "/account/authenticate",
    request_body(content = CredentialsInput, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Signin form re-rendered with errors", body = Page),
        (status = 303, description = "Signed in, already signed in, or stale form"),
        (status = 404, description = "Not a form submission")
    ),
    tag = "account"
)]
#[instrument(skip_all, fields(http.method = %method))]
pub async fn authenticate(
    method: Method,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    form: Option<Form<CredentialsInput>>,
) -> Response {
    let request = action_request(&method, form);
    let mut visit = try_visit!(state, headers);
    let outcome =
        account::authenticate(&mut visit.session, state.csrf(), state.store(), &request).await;
    visit.finish(&state, outcome).await
}

#[utoipa::path(
    post,
    path = "/account/signout",
    responses(
        (status = 303, description = "Session cleared; redirect to the signin form")
    ),
    tag = "account"
)]
pub async fn signout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let mut visit = try_visit!(state, headers);
    let outcome = account::signout(&mut visit.session);
    visit.finish(&state, Ok(outcome)).await
}

#[utoipa::path(
    post,
    path = "/account/follow",
    request_body(content = FollowInput, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Followed (or nothing to do), stale form, or not signed in"),
        (status = 404, description = "Not a form submission or unknown user")
    ),
    tag = "account"
)]
#[instrument(skip_all, fields(http.method = %method))]
pub async fn follow(
    method: Method,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    form: Option<Form<FollowInput>>,
) -> Response {
    let request = action_request(&method, form);
    let mut visit = try_visit!(state, headers);
    let outcome = account::follow(
        &mut visit.session,
        state.csrf(),
        state.store(),
        state.store(),
        &request,
    )
    .await;
    visit.finish(&state, outcome).await
}
