use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept either a level name or its index (`error` = 0 ... `trace` = 4).
fn parse_log_level(level: &str) -> Result<u8, String> {
    if let Ok(parsed) = level.parse::<u8>() {
        if usize::from(parsed) < LEVEL_NAMES.len() {
            return Ok(parsed);
        }
    }
    let lower = level.to_lowercase();
    LEVEL_NAMES
        .iter()
        .position(|name| *name == lower)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level: {level}"))
}

/// Level selected by `-v` repetitions or `MINIBLOG_LOG_LEVEL`; `None` keeps the default.
#[must_use]
pub fn verbosity_level(matches: &ArgMatches) -> Option<Level> {
    match matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0) {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("MINIBLOG_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(parse_log_level),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_log_level_accepts_names_and_indexes() {
        assert_eq!(parse_log_level("error"), Ok(0));
        assert_eq!(parse_log_level("TRACE"), Ok(4));
        assert_eq!(parse_log_level("3"), Ok(3));
        assert!(parse_log_level("9").is_err());
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn verbosity_from_repeated_flag() {
        for (count, expected) in [
            (0, None),
            (1, Some(Level::WARN)),
            (2, Some(Level::INFO)),
            (3, Some(Level::DEBUG)),
            (4, Some(Level::TRACE)),
        ] {
            temp_env::with_vars([("MINIBLOG_LOG_LEVEL", None::<&str>)], || {
                let mut args = vec!["miniblog".to_string()];
                if count > 0 {
                    args.push(format!("-{}", "v".repeat(count)));
                }
                let matches = with_args(Command::new("miniblog")).get_matches_from(args);
                assert_eq!(verbosity_level(&matches), expected);
            });
        }
    }

    #[test]
    fn verbosity_from_env() {
        temp_env::with_vars([("MINIBLOG_LOG_LEVEL", Some("debug"))], || {
            let matches = with_args(Command::new("miniblog")).get_matches_from(["miniblog"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
            assert_eq!(verbosity_level(&matches), Some(Level::DEBUG));
        });
    }
}
