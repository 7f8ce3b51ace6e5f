use crate::account::{AccountConfig, PasswordHasher, TokenPolicy};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_PASSWORD_PEPPER: &str = "password-pepper";
pub const ARG_CSRF_POLICY: &str = "csrf-policy";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_SESSION_PURGE_INTERVAL_SECONDS: &str = "session-purge-interval-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub password_pepper: SecretString,
    pub csrf_policy: TokenPolicy,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
    pub session_purge_interval_seconds: u64,
}

impl Options {
    /// Parse account arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the pepper is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let password_pepper = matches
            .get_one::<String>(ARG_PASSWORD_PEPPER)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .map(SecretString::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_PASSWORD_PEPPER}"))?;

        Ok(Self {
            password_pepper,
            csrf_policy: matches
                .get_one::<TokenPolicy>(ARG_CSRF_POLICY)
                .copied()
                .unwrap_or_default(),
            session_ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(604_800),
            session_cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
            session_purge_interval_seconds: matches
                .get_one::<u64>(ARG_SESSION_PURGE_INTERVAL_SECONDS)
                .copied()
                .unwrap_or(3600),
        })
    }

    #[must_use]
    pub fn config(&self) -> AccountConfig {
        AccountConfig::new()
            .with_csrf_policy(self.csrf_policy)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_session_cookie_secure(self.session_cookie_secure)
    }

    #[must_use]
    pub fn session_purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_interval_seconds)
    }

    #[must_use]
    pub fn hasher(&self) -> PasswordHasher {
        PasswordHasher::new(self.password_pepper.clone())
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PASSWORD_PEPPER)
                .long(ARG_PASSWORD_PEPPER)
                .help("Secret mixed into every password hash")
                .long_help(
                    "Secret mixed into every password hash. Changing it invalidates all stored passwords.",
                )
                .env("MINIBLOG_PASSWORD_PEPPER")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_CSRF_POLICY)
                .long(ARG_CSRF_POLICY)
                .help("Whether a verified form token stays valid: reusable or single-use")
                .env("MINIBLOG_CSRF_POLICY")
                .default_value("reusable")
                .value_parser(|value: &str| value.parse::<TokenPolicy>()),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("MINIBLOG_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("MINIBLOG_SESSION_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_PURGE_INTERVAL_SECONDS)
                .long(ARG_SESSION_PURGE_INTERVAL_SECONDS)
                .help("How often expired sessions are deleted, in seconds")
                .env("MINIBLOG_SESSION_PURGE_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("miniblog"))
    }

    #[test]
    fn defaults() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("MINIBLOG_CSRF_POLICY", None::<&str>),
                ("MINIBLOG_SESSION_TTL_SECONDS", None),
                ("MINIBLOG_SESSION_COOKIE_SECURE", None),
                ("MINIBLOG_SESSION_PURGE_INTERVAL_SECONDS", None),
            ],
            || {
                let matches =
                    command().get_matches_from(["miniblog", "--password-pepper", "pepper"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.password_pepper.expose_secret(), "pepper");
                assert_eq!(options.csrf_policy, TokenPolicy::Reusable);
                assert_eq!(options.session_ttl_seconds, 604_800);
                assert!(!options.session_cookie_secure);
                assert_eq!(options.session_purge_interval(), Duration::from_secs(3600));
                Ok(())
            },
        )
    }

    #[test]
    fn flags_override_defaults() -> anyhow::Result<()> {
        let matches = command().get_matches_from([
            "miniblog",
            "--password-pepper",
            "pepper",
            "--csrf-policy",
            "single-use",
            "--session-ttl-seconds",
            "3600",
            "--session-cookie-secure",
        ]);
        let config = Options::parse(&matches)?.config();
        assert_eq!(config.csrf_policy(), TokenPolicy::SingleUse);
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert!(config.session_cookie_secure());
        Ok(())
    }

    #[test]
    fn env_is_read() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("MINIBLOG_PASSWORD_PEPPER", Some("from-env")),
                ("MINIBLOG_CSRF_POLICY", Some("single_use")),
                ("MINIBLOG_SESSION_TTL_SECONDS", Some("60")),
                ("MINIBLOG_SESSION_COOKIE_SECURE", Some("true")),
                ("MINIBLOG_SESSION_PURGE_INTERVAL_SECONDS", Some("300")),
            ],
            || {
                let matches = command().get_matches_from(["miniblog"]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.password_pepper.expose_secret(), "from-env");
                assert_eq!(options.csrf_policy, TokenPolicy::SingleUse);
                assert_eq!(options.session_ttl_seconds, 60);
                assert!(options.session_cookie_secure);
                assert_eq!(options.session_purge_interval_seconds, 300);
                Ok(())
            },
        )
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let result = command().try_get_matches_from([
            "miniblog",
            "--password-pepper",
            "pepper",
            "--csrf-policy",
            "sometimes",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn blank_pepper_is_rejected() {
        let matches = command().get_matches_from(["miniblog", "--password-pepper", "  "]);
        assert!(Options::parse(&matches).is_err());
    }

    #[test]
    fn zero_purge_interval_is_rejected() {
        let result = command().try_get_matches_from([
            "miniblog",
            "--password-pepper",
            "pepper",
            "--session-purge-interval-seconds",
            "0",
        ]);
        assert!(result.is_err());
    }
}
