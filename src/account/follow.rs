//! Creating follow edges.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use super::{
    csrf::{CsrfScope, CsrfTokenService},
    session::Session,
    store::{CredentialStore, RelationshipStore},
    types::{
        profile_path, ActionRequest, InsertOutcome, Outcome, ACCOUNT_HOME_PATH,
        FOLLOWING_NAME_FIELD, SIGNIN_PATH, TOKEN_FIELD,
    },
};

/// Make the signed-in user follow `following_name`.
///
/// The target is resolved before the anti-forgery check, so a failed check
/// only ever redirects to the profile of an existing account. Following
/// yourself or someone you already follow changes nothing; either way the
/// visitor ends up on the account home.
///
/// # Errors
/// Returns an error if a store fails.
#[instrument(skip_all)]
pub async fn follow<C, R>(
    session: &mut Session,
    csrf: &CsrfTokenService,
    credentials: &C,
    relationships: &R,
    request: &ActionRequest,
) -> Result<Outcome>
where
    C: CredentialStore,
    R: RelationshipStore,
{
    let Some(acting) = session.user().cloned() else {
        return Ok(Outcome::redirect(SIGNIN_PATH));
    };

    if !request.is_submission() {
        return Ok(Outcome::NotFound);
    }
    let Some(following_name) = request.field(FOLLOWING_NAME_FIELD).filter(|n| !n.is_empty())
    else {
        return Ok(Outcome::NotFound);
    };

    let Some(target) = credentials
        .fetch_by_user_name(following_name)
        .await
        .context("failed to look up follow target")?
    else {
        return Ok(Outcome::NotFound);
    };

    if !csrf.verify(session, CsrfScope::Follow, request.field(TOKEN_FIELD)) {
        return Ok(Outcome::Redirect(profile_path(&target.user_name)));
    }

    if acting.id == target.id {
        debug!(user_id = %acting.id, "ignoring self follow");
        return Ok(Outcome::redirect(ACCOUNT_HOME_PATH));
    }

    if relationships
        .is_following(acting.id, target.id)
        .await
        .context("failed to check follow edge")?
    {
        return Ok(Outcome::redirect(ACCOUNT_HOME_PATH));
    }

    match relationships
        .insert(acting.id, target.id)
        .await
        .context("failed to insert follow edge")?
    {
        InsertOutcome::Created => {
            info!(follower = %acting.id, followee = %target.id, "follow edge created");
        }
        InsertOutcome::Conflict => debug!("follow edge created concurrently"),
    }

    Ok(Outcome::redirect(ACCOUNT_HOME_PATH))
}
