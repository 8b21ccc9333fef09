//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the worker action with its queue and
//! relay configuration.

use anyhow::{Context, Result};

use crate::cli::actions::{Action, worker::Args};
use crate::cli::commands::{ARG_QUEUE_NAME, ARG_QUEUE_URL, smtp};

/// Map validated CLI matches to the worker action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let queue_url = matches
        .get_one::<String>(ARG_QUEUE_URL)
        .cloned()
        .context("missing required argument: --queue-url")?;
    let queue_name = matches
        .get_one::<String>(ARG_QUEUE_NAME)
        .cloned()
        .context("missing required argument: --queue-name")?;

    let smtp = smtp::parse(matches)?;

    Ok(Action::Worker(Args {
        queue_url,
        queue_name,
        smtp,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_a_log_only_worker() {
        temp_env::with_vars(
            [
                ("KONTO_QUEUE_URL", None::<&str>),
                ("KONTO_QUEUE_NAME", None::<&str>),
                ("KONTO_SMTP_HOST", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["konto-worker"]);
                let action = handler(&matches).unwrap();
                let Action::Worker(args) = action;
                assert_eq!(args.queue_url, "redis://127.0.0.1:6379");
                assert_eq!(args.queue_name, "email_queue");
                assert!(args.smtp.is_none());
            },
        );
    }

    #[test]
    fn smtp_host_without_credentials_fails() {
        temp_env::with_vars(
            [
                ("KONTO_SMTP_HOST", Some("smtp.example.com")),
                ("KONTO_SMTP_USERNAME", None::<&str>),
                ("KONTO_SMTP_PASSWORD", None::<&str>),
                ("KONTO_SMTP_FROM", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["konto-worker"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --smtp-username")
                    );
                }
            },
        );
    }
}
