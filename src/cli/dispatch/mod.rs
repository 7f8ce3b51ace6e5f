//! Maps parsed CLI arguments to the action that runs the server.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{account, ARG_DSN, ARG_MEMORY_STORE, ARG_PORT};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if neither a DSN nor the memory store was selected, or the
/// account options are invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let memory_store = matches.get_flag(ARG_MEMORY_STORE);
    let dsn = if memory_store {
        None
    } else {
        Some(
            matches
                .get_one::<String>(ARG_DSN)
                .cloned()
                .context("missing required argument: --dsn")?,
        )
    };

    let account_opts = account::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        account: account_opts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::TokenPolicy;
    use crate::cli::commands;

    #[test]
    fn memory_store_server() -> Result<()> {
        temp_env::with_vars(
            [
                ("MINIBLOG_DSN", None::<&str>),
                ("MINIBLOG_PORT", None),
                ("MINIBLOG_CSRF_POLICY", None),
            ],
            || {
                let matches = commands::new().get_matches_from([
                    "miniblog",
                    "--memory-store",
                    "--password-pepper",
                    "pepper",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8080);
                assert!(args.dsn.is_none());
                assert_eq!(args.account.csrf_policy, TokenPolicy::Reusable);
                Ok(())
            },
        )
    }

    #[test]
    fn postgres_server() -> Result<()> {
        temp_env::with_vars(
            [
                ("MINIBLOG_MEMORY_STORE", None::<&str>),
                ("MINIBLOG_PASSWORD_PEPPER", Some("pepper")),
            ],
            || {
                let matches = commands::new().get_matches_from([
                    "miniblog",
                    "-p",
                    "3000",
                    "-d",
                    "postgres://miniblog@localhost/miniblog",
                    "--csrf-policy",
                    "single-use",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 3000);
                assert_eq!(
                    args.dsn.as_deref(),
                    Some("postgres://miniblog@localhost/miniblog")
                );
                assert_eq!(args.account.csrf_policy, TokenPolicy::SingleUse);
                Ok(())
            },
        )
    }
}
