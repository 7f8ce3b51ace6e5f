//! Records, view models, and action outcomes shared by the account actions.

use serde::{
    ser::{SerializeStruct, Serializer},
    Deserialize, Serialize,
};
use std::{collections::HashMap, fmt};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where visitors land after a successful signup or signin.
pub const ROOT_PATH: &str = "/";
/// Account home; also the target for already-authenticated visitors.
pub const ACCOUNT_HOME_PATH: &str = "/account";
pub const SIGNUP_PATH: &str = "/account/signup";
pub const SIGNIN_PATH: &str = "/account/signin";

/// Form field carrying the anti-forgery token.
pub const TOKEN_FIELD: &str = "_token";
pub const USER_NAME_FIELD: &str = "user_name";
pub const PASSWORD_FIELD: &str = "password";
pub const FOLLOWING_NAME_FIELD: &str = "following_name";

/// Public profile path of a user, used when a follow form fails its CSRF check.
#[must_use]
pub fn profile_path(user_name: &str) -> String {
    format!("/user/{user_name}")
}

/// Stored password digest. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    #[must_use]
    pub fn new(encoded: String) -> Self {
        Self(encoded)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

/// A registered account as persisted by a [`CredentialStore`](super::store::CredentialStore).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub user_name: String,
    pub password_hash: PasswordHash,
}

/// The part of an [`Account`] cached in the session once authenticated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    pub user_name: String,
}

impl From<&Account> for SessionUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            user_name: account.user_name.clone(),
        }
    }
}

/// Result of an insert that may hit a uniqueness constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Conflict,
}

/// User-correctable problems reported back on the re-rendered form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationError {
    UserNameRequired,
    UserNameFormat,
    UserNameTaken,
    PasswordRequired,
    PasswordLength,
    /// Unknown user name or wrong password; deliberately not distinguished.
    InvalidCredentials,
}

impl ValidationError {
    /// Stable machine-readable identifier.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::UserNameRequired => "user_name_required",
            Self::UserNameFormat => "user_name_format",
            Self::UserNameTaken => "user_name_taken",
            Self::PasswordRequired => "password_required",
            Self::PasswordLength => "password_length",
            Self::InvalidCredentials => "invalid_credentials",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::UserNameRequired => "Please enter a user name",
            Self::UserNameFormat => {
                "User names must be 3 to 20 characters of letters, digits and underscores"
            }
            Self::UserNameTaken => "That user name is already in use",
            Self::PasswordRequired => "Please enter a password",
            Self::PasswordLength => "Passwords must be 4 to 30 characters long",
            Self::InvalidCredentials => "Invalid user name or password",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", self.message())?;
        state.end()
    }
}

/// The submitted form as seen by an action.
#[derive(Clone, Debug, Default)]
pub struct ActionRequest {
    submission: bool,
    fields: HashMap<String, String>,
}

impl ActionRequest {
    /// A plain page view with no form data.
    #[must_use]
    pub fn view() -> Self {
        Self::default()
    }

    /// A form submission (HTTP `POST`).
    #[must_use]
    pub fn submission(fields: HashMap<String, String>) -> Self {
        Self {
            submission: true,
            fields,
        }
    }

    #[must_use]
    pub fn new(submission: bool, fields: HashMap<String, String>) -> Self {
        Self { submission, fields }
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn is_submission(&self) -> bool {
        self.submission
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value or the empty string, mirroring how forms echo missing input.
    pub(crate) fn field_or_empty(&self, name: &str) -> String {
        self.field(name).unwrap_or_default().to_string()
    }
}

/// View model for the signup and signin forms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CredentialForm {
    pub user_name: String,
    pub password: String,
    #[schema(value_type = Vec<Object>)]
    pub errors: Vec<ValidationError>,
    #[serde(rename = "_token")]
    pub token: String,
}

/// View model for the account home, including a token for its follow form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccountHome {
    pub user: SessionUser,
    pub followings: Vec<SessionUser>,
    #[serde(rename = "_token")]
    pub token: String,
}

/// A view to render, tagged with its template name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "template")]
pub enum Page {
    #[serde(rename = "account/signup")]
    Signup(CredentialForm),
    #[serde(rename = "account/signin")]
    Signin(CredentialForm),
    #[serde(rename = "account/index")]
    Home(AccountHome),
}

impl Page {
    #[must_use]
    pub const fn template(&self) -> &'static str {
        match self {
            Self::Signup(_) => "account/signup",
            Self::Signin(_) => "account/signin",
            Self::Home(_) => "account/index",
        }
    }

    /// Errors carried by a form page; empty for other pages.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Self::Signup(form) | Self::Signin(form) => &form.errors,
            Self::Home(_) => &[],
        }
    }
}

/// What an action asks the web layer to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Render(Page),
    Redirect(String),
    NotFound,
}

impl Outcome {
    pub(crate) fn redirect(path: &str) -> Self {
        Self::Redirect(path.to_string())
    }
}
