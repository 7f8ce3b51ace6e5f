use crate::account::types::ACCOUNT_HOME_PATH;
use axum::response::Redirect;

/// Landing page after signup and signin; sends visitors on to the account home.
pub async fn root() -> Redirect {
    Redirect::to(ACCOUNT_HOME_PATH)
}
