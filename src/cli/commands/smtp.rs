use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::mailer::SmtpOptions;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_FROM: &str = "smtp-from";
pub const ARG_SMTP_REPLY_TO: &str = "smtp-reply-to";

/// Parse the relay options, or `None` when no host is configured and the
/// worker should only log deliveries.
///
/// # Errors
/// Returns an error if a host is configured but credentials or the sender
/// address are missing.
pub fn parse(matches: &ArgMatches) -> anyhow::Result<Option<SmtpOptions>> {
    let Some(host) = matches
        .get_one::<String>(ARG_SMTP_HOST)
        .filter(|v| !v.trim().is_empty())
    else {
        return Ok(None);
    };

    let read_required = |id: &str| -> anyhow::Result<String> {
        matches
            .get_one::<String>(id)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required argument: --{id}"))
    };

    Ok(Some(SmtpOptions {
        host: host.clone(),
        port: matches
            .get_one::<u16>(ARG_SMTP_PORT)
            .copied()
            .unwrap_or(587),
        username: read_required(ARG_SMTP_USERNAME)?,
        password: SecretString::from(read_required(ARG_SMTP_PASSWORD)?),
        from: read_required(ARG_SMTP_FROM)?,
        reply_to: matches.get_one::<String>(ARG_SMTP_REPLY_TO).cloned(),
    }))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host; when unset, deliveries are only logged")
                .env("KONTO_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .default_value("587")
                .env("KONTO_SMTP_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username (required with --smtp-host)")
                .env("KONTO_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password (required with --smtp-host)")
                .env("KONTO_SMTP_PASSWORD"),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long(ARG_SMTP_FROM)
                .help("Sender address (required with --smtp-host)")
                .env("KONTO_SMTP_FROM"),
        )
        .arg(
            Arg::new(ARG_SMTP_REPLY_TO)
                .long(ARG_SMTP_REPLY_TO)
                .help("Optional reply-to address")
                .env("KONTO_SMTP_REPLY_TO"),
        )
}
