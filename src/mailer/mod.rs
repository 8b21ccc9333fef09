//! Outbound mail transport used by the email worker.
//!
//! [`SmtpMailer`] ships through an SMTP relay with STARTTLS; [`LogMailer`]
//! only logs, for deployments without a relay and for local runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_account_confirmation(
        &self,
        to: &str,
        name: &str,
        code: &str,
        duration_label: &str,
    ) -> Result<()>;

    async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        code: &str,
        duration_label: &str,
    ) -> Result<()>;
}

/// SMTP relay settings.
#[derive(Clone)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
    pub reply_to: Option<String>,
}

/// Relay-backed mailer.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    reply_to: Option<String>,
}

impl SmtpMailer {
    /// # Errors
    /// Returns an error if the relay parameters are invalid.
    pub fn new(options: SmtpOptions) -> Result<Self> {
        let credentials = Credentials::new(
            options.username.clone(),
            options.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&options.host)
            .context("invalid smtp relay host")?
            .port(options.port)
            .credentials(credentials)
            .build();
        Ok(Self {
            transport,
            from: options.from,
            reply_to: options.reply_to,
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let mut builder = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(to.parse().context("invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.parse().context("invalid reply-to address")?);
        }
        let message = builder.body(body).context("failed to build message")?;

        self.transport
            .send(message)
            .await
            .context("failed to send message")?;
        Ok(())
    }
}

fn confirmation_body(name: &str, code: &str, duration_label: &str) -> String {
    format!(
        "Hello {name},\n\n\
         Your confirmation code is {code}.\n\
         It is valid for {duration_label}.\n\n\
         If you did not create an account, ignore this message.\n"
    )
}

fn reset_body(name: &str, code: &str, duration_label: &str) -> String {
    format!(
        "Hello {name},\n\n\
         Your password reset code is {code}.\n\
         It is valid for {duration_label}.\n\n\
         If you did not request a reset, ignore this message and your\n\
         password will remain unchanged.\n"
    )
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_account_confirmation(
        &self,
        to: &str,
        name: &str,
        code: &str,
        duration_label: &str,
    ) -> Result<()> {
        self.send(
            to,
            "Confirm your account",
            confirmation_body(name, code, duration_label),
        )
        .await
    }

    async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        code: &str,
        duration_label: &str,
    ) -> Result<()> {
        self.send(
            to,
            "Reset your password",
            reset_body(name, code, duration_label),
        )
        .await
    }
}

/// Logs instead of sending. Codes are not logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_account_confirmation(
        &self,
        to: &str,
        _name: &str,
        _code: &str,
        duration_label: &str,
    ) -> Result<()> {
        info!(to, duration_label, "would send account confirmation");
        Ok(())
    }

    async fn send_password_reset(
        &self,
        to: &str,
        _name: &str,
        _code: &str,
        duration_label: &str,
    ) -> Result<()> {
        info!(to, duration_label, "would send password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_carry_code_and_window() {
        let body = confirmation_body("Fábio", "042137", "2 hours");
        assert!(body.contains("042137"));
        assert!(body.contains("2 hours"));

        let body = reset_body("Ana", "000001", "2 hours");
        assert!(body.contains("000001"));
        assert!(body.contains("remain unchanged"));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() -> Result<()> {
        LogMailer
            .send_account_confirmation("a@b.com", "Ana", "123456", "2 hours")
            .await?;
        LogMailer
            .send_password_reset("a@b.com", "Ana", "123456", "2 hours")
            .await?;
        Ok(())
    }
}
