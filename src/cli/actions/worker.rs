//! The long-running email dispatch worker action.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::mailer::{LogMailer, Mailer, SmtpMailer, SmtpOptions};
use crate::worker::EmailWorker;

pub struct Args {
    pub queue_url: String,
    pub queue_name: String,
    pub smtp: Option<SmtpOptions>,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("queue_url", &self.queue_url)
            .field("queue_name", &self.queue_name)
            .field("smtp", &self.smtp.as_ref().map(|options| &options.host))
            .finish()
    }
}

/// Start the worker and consume the queue until the process is killed.
///
/// # Errors
/// Returns an error only on startup misconfiguration; once running, the
/// worker self-heals and never exits.
pub async fn execute(args: Args) -> Result<()> {
    let mailer: Arc<dyn Mailer> = match args.smtp {
        Some(options) => {
            info!(host = %options.host, "using smtp relay");
            Arc::new(SmtpMailer::new(options)?)
        }
        None => {
            info!("no smtp relay configured, deliveries will only be logged");
            Arc::new(LogMailer)
        }
    };

    let worker = EmailWorker::new(&args.queue_url, args.queue_name, mailer)?;
    worker.run().await;
    Ok(())
}
