use crate::{
    account::{session::spawn_session_purger, Backend, MemoryStore, PgStore},
    api::{self, AppState},
    cli::{commands::account::Options, telemetry},
};
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    /// `None` selects the in-process store.
    pub dsn: Option<String>,
    pub account: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be applied,
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = args.account.config();
    let hasher = args.account.hasher();

    let store: Backend = if let Some(dsn) = &args.dsn {
        let options = PgConnectOptions::from_str(dsn)
            .context("Invalid database connection string")?
            .application_name(crate::APP_USER_AGENT);

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = PgStore::new(pool, hasher);
        store.apply_schema().await?;

        store.into()
    } else {
        warn!("Using the in-memory store: accounts, follows and sessions are lost on restart");
        MemoryStore::new(hasher).into()
    };

    // Expired rows are also skipped on load; this only reclaims space.
    let purger = spawn_session_purger(store.clone(), args.account.session_purge_interval());

    let result = api::new(args.port, Arc::new(AppState::new(store, config))).await;

    purger.abort();
    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "store",
            args.dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        ("csrf_policy", args.account.csrf_policy.as_str().to_string()),
        (
            "session_ttl_seconds",
            args.account.session_ttl_seconds.to_string(),
        ),
        (
            "session_cookie_secure",
            args.account.session_cookie_secure.to_string(),
        ),
        (
            "session_purge_interval_seconds",
            args.account.session_purge_interval_seconds.to_string(),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
