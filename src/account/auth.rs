//! Signup, signin and signout transitions.
//!
//! Every submit action runs its guards in the same order: an authenticated
//! visitor is sent to the account home, a non-`POST` request is not found,
//! and a bad anti-forgery token bounces back to the form. Only then are the
//! fields looked at.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, instrument};

use super::{
    csrf::{CsrfScope, CsrfTokenService},
    session::Session,
    store::{password_hashes_match, CredentialStore, RelationshipStore},
    types::{
        AccountHome, ActionRequest, CredentialForm, InsertOutcome, Outcome, Page, SessionUser,
        ValidationError, ACCOUNT_HOME_PATH, PASSWORD_FIELD, ROOT_PATH, SIGNIN_PATH, SIGNUP_PATH,
        TOKEN_FIELD, USER_NAME_FIELD,
    },
};

const PASSWORD_MIN_LEN: usize = 4;
const PASSWORD_MAX_LEN: usize = 30;

fn user_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").ok())
        .as_ref()
}

/// 3 to 20 ASCII letters, digits or underscores.
pub(crate) fn valid_user_name(user_name: &str) -> bool {
    user_name_pattern().is_some_and(|regex| regex.is_match(user_name))
}

pub(crate) fn valid_password_length(password: &str) -> bool {
    (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&password.chars().count())
}

/// Render the empty signup form.
///
/// # Errors
/// Returns an error if a token cannot be generated.
pub fn signup(session: &mut Session, csrf: &CsrfTokenService) -> Result<Outcome> {
    if session.is_authenticated() {
        return Ok(Outcome::redirect(ACCOUNT_HOME_PATH));
    }
    let token = csrf.generate(session, CsrfScope::Signup)?;
    Ok(Outcome::Render(Page::Signup(empty_form(token))))
}

/// Handle the signup form submission.
///
/// # Errors
/// Returns an error if the credential store fails.
#[instrument(skip_all)]
pub async fn register<C: CredentialStore>(
    session: &mut Session,
    csrf: &CsrfTokenService,
    credentials: &C,
    request: &ActionRequest,
) -> Result<Outcome> {
    if session.is_authenticated() {
        return Ok(Outcome::redirect(ACCOUNT_HOME_PATH));
    }
    if !request.is_submission() {
        return Ok(Outcome::NotFound);
    }
    if !csrf.verify(session, CsrfScope::Signup, request.field(TOKEN_FIELD)) {
        return Ok(Outcome::redirect(SIGNUP_PATH));
    }

    let user_name = request.field_or_empty(USER_NAME_FIELD);
    let password = request.field_or_empty(PASSWORD_FIELD);

    let mut errors = validate_registration(credentials, &user_name, &password).await?;

    if errors.is_empty() {
        match credentials
            .insert(&user_name, &password)
            .await
            .context("failed to insert account")?
        {
            InsertOutcome::Created => {
                let account = credentials
                    .fetch_by_user_name(&user_name)
                    .await?
                    .with_context(|| format!("account {user_name} missing after insert"))?;
                session.set_authenticated(true);
                session.set_user(SessionUser::from(&account));
                info!(user_id = %account.id, "account registered");
                return Ok(Outcome::redirect(ROOT_PATH));
            }
            InsertOutcome::Conflict => {
                debug!("user name claimed concurrently");
                errors.push(ValidationError::UserNameTaken);
            }
        }
    }

    let token = csrf.generate(session, CsrfScope::Signup)?;
    Ok(Outcome::Render(Page::Signup(CredentialForm {
        user_name,
        password,
        errors,
        token,
    })))
}

/// Collect every violated rule; fields are checked independently.
async fn validate_registration<C: CredentialStore>(
    credentials: &C,
    user_name: &str,
    password: &str,
) -> Result<Vec<ValidationError>> {
    let mut errors = Vec::new();

    if user_name.is_empty() {
        errors.push(ValidationError::UserNameRequired);
    } else if !valid_user_name(user_name) {
        errors.push(ValidationError::UserNameFormat);
    } else if !credentials
        .is_unique_user_name(user_name)
        .await
        .context("failed to check user name uniqueness")?
    {
        errors.push(ValidationError::UserNameTaken);
    }

    if password.is_empty() {
        errors.push(ValidationError::PasswordRequired);
    } else if !valid_password_length(password) {
        errors.push(ValidationError::PasswordLength);
    }

    Ok(errors)
}

/// Render the empty signin form.
///
/// # Errors
/// Returns an error if a token cannot be generated.
pub fn signin(session: &mut Session, csrf: &CsrfTokenService) -> Result<Outcome> {
    if session.is_authenticated() {
        return Ok(Outcome::redirect(ACCOUNT_HOME_PATH));
    }
    let token = csrf.generate(session, CsrfScope::Signin)?;
    Ok(Outcome::Render(Page::Signin(empty_form(token))))
}

/// Handle the signin form submission.
///
/// Unknown user names and wrong passwords produce the same single error.
///
/// # Errors
/// Returns an error if the credential store fails.
#[instrument(skip_all)]
pub async fn authenticate<C: CredentialStore>(
    session: &mut Session,
    csrf: &CsrfTokenService,
    credentials: &C,
    request: &ActionRequest,
) -> Result<Outcome> {
    if session.is_authenticated() {
        return Ok(Outcome::redirect(ACCOUNT_HOME_PATH));
    }
    if !request.is_submission() {
        return Ok(Outcome::NotFound);
    }
    if !csrf.verify(session, CsrfScope::Signin, request.field(TOKEN_FIELD)) {
        return Ok(Outcome::redirect(SIGNIN_PATH));
    }

    let user_name = request.field_or_empty(USER_NAME_FIELD);
    let password = request.field_or_empty(PASSWORD_FIELD);

    let mut errors = Vec::new();
    if user_name.is_empty() {
        errors.push(ValidationError::UserNameRequired);
    }
    if password.is_empty() {
        errors.push(ValidationError::PasswordRequired);
    }

    if errors.is_empty() {
        let account = credentials
            .fetch_by_user_name(&user_name)
            .await
            .context("failed to look up account")?;
        // Hash even for unknown names so both failure paths do the same work.
        let presented = credentials.hash_password(&password);
        match account {
            Some(account) if password_hashes_match(&account.password_hash, &presented) => {
                session.set_authenticated(true);
                session.set_user(SessionUser::from(&account));
                info!(user_id = %account.id, "signed in");
                return Ok(Outcome::redirect(ROOT_PATH));
            }
            _ => {
                debug!("credentials rejected");
                errors.push(ValidationError::InvalidCredentials);
            }
        }
    }

    let token = csrf.generate(session, CsrfScope::Signin)?;
    Ok(Outcome::Render(Page::Signin(CredentialForm {
        user_name,
        password,
        errors,
        token,
    })))
}

/// Forget everything about the visitor. Safe to call when already signed out.
pub fn signout(session: &mut Session) -> Outcome {
    session.clear();
    session.set_authenticated(false);
    Outcome::redirect(SIGNIN_PATH)
}

/// Account home: the signed-in user and the accounts they follow.
///
/// # Errors
/// Returns an error if the relationship store fails.
pub async fn index<R: RelationshipStore>(
    session: &mut Session,
    csrf: &CsrfTokenService,
    relationships: &R,
) -> Result<Outcome> {
    let Some(user) = session.user().cloned() else {
        return Ok(Outcome::redirect(SIGNIN_PATH));
    };
    let followings = relationships
        .followings(user.id)
        .await
        .context("failed to list followings")?;
    let token = csrf.generate(session, CsrfScope::Follow)?;
    Ok(Outcome::Render(Page::Home(AccountHome {
        user,
        followings,
        token,
    })))
}

fn empty_form(token: String) -> CredentialForm {
    CredentialForm {
        user_name: String::new(),
        password: String::new(),
        errors: Vec::new(),
        token,
    }
}
