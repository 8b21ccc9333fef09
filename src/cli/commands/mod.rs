pub mod logging;
pub mod smtp;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_QUEUE_URL: &str = "queue-url";
pub const ARG_QUEUE_NAME: &str = "queue-name";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("konto-worker")
        .about("Account lifecycle email dispatch worker")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_QUEUE_URL)
                .short('q')
                .long(ARG_QUEUE_URL)
                .help("Queue transport connection string")
                .default_value("redis://127.0.0.1:6379")
                .env("KONTO_QUEUE_URL"),
        )
        .arg(
            Arg::new(ARG_QUEUE_NAME)
                .long(ARG_QUEUE_NAME)
                .help("Queue list name shared with the producers")
                .default_value(crate::queue::DEFAULT_QUEUE_NAME)
                .env("KONTO_QUEUE_NAME"),
        );

    let command = smtp::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "konto-worker");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Account lifecycle email dispatch worker".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("KONTO_QUEUE_URL", None::<&str>),
                ("KONTO_QUEUE_NAME", None::<&str>),
                ("KONTO_SMTP_PORT", None::<&str>),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["konto-worker"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_QUEUE_URL).cloned(),
                    Some("redis://127.0.0.1:6379".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_QUEUE_NAME).cloned(),
                    Some("email_queue".to_string())
                );
                assert_eq!(
                    matches.get_one::<u16>(smtp::ARG_SMTP_PORT).copied(),
                    Some(587)
                );
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("KONTO_QUEUE_URL", Some("redis://queue.internal:6379")),
                ("KONTO_QUEUE_NAME", Some("mail_tasks")),
                ("KONTO_SMTP_HOST", Some("smtp.example.com")),
                ("KONTO_SMTP_PORT", Some("2587")),
                ("KONTO_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["konto-worker"]);
                assert_eq!(
                    matches.get_one::<String>(ARG_QUEUE_URL).cloned(),
                    Some("redis://queue.internal:6379".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_QUEUE_NAME).cloned(),
                    Some("mail_tasks".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(smtp::ARG_SMTP_HOST).cloned(),
                    Some("smtp.example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<u16>(smtp::ARG_SMTP_PORT).copied(),
                    Some(2587)
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([("KONTO_LOG_LEVEL", Some(level))], || {
                let command = new();
                let matches = command.get_matches_from(vec!["konto-worker"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("KONTO_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["konto-worker".to_string()];
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();
                let matches = command.get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_smtp_requires_credentials_with_host() {
        temp_env::with_vars(
            [
                ("KONTO_SMTP_HOST", Some("smtp.example.com")),
                ("KONTO_SMTP_USERNAME", None::<&str>),
                ("KONTO_SMTP_PASSWORD", None::<&str>),
                ("KONTO_SMTP_FROM", None::<&str>),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["konto-worker"]);
                assert!(smtp::parse(&matches).is_err());
            },
        );
    }

    #[test]
    fn test_smtp_absent_host_means_log_only() {
        temp_env::with_vars([("KONTO_SMTP_HOST", None::<&str>)], || {
            let command = new();
            let matches = command.get_matches_from(vec!["konto-worker"]);
            let options = smtp::parse(&matches).unwrap();
            assert!(options.is_none());
        });
    }
}
