//! Long-running email dispatch worker.
//!
//! The worker is the sole consumer of the queue list. It block-pops one task
//! at a time and ships it through the mailer. The loop never exits: transport
//! failures trigger a fixed-backoff reconnect, and task-level failures are
//! logged and dropped. Delivery is best-effort with no re-queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use tracing::{error, info, warn};

use crate::mailer::Mailer;
use crate::queue::{EmailTask, EmailTaskKind};

const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

pub struct EmailWorker {
    client: redis::Client,
    queue_name: String,
    mailer: Arc<dyn Mailer>,
    backoff: Duration,
}

impl EmailWorker {
    /// # Errors
    /// Returns an error if the queue url cannot be parsed. No connection is
    /// made until [`run`](Self::run).
    pub fn new(
        queue_url: &str,
        queue_name: impl Into<String>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        let client = redis::Client::open(queue_url).context("invalid queue url")?;
        Ok(Self {
            client,
            queue_name: queue_name.into(),
            mailer,
            backoff: DEFAULT_BACKOFF,
        })
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Consume the queue forever, reconnecting on transport failure.
    pub async fn run(&self) {
        loop {
            match self.client.get_multiplexed_async_connection().await {
                Ok(conn) => {
                    info!(queue = %self.queue_name, "connected to queue");
                    if let Err(err) = self.drain(conn).await {
                        warn!("queue connection lost: {err}");
                    }
                }
                Err(err) => {
                    warn!("failed to connect to queue: {err}");
                }
            }
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Pop and handle tasks until the connection fails.
    async fn drain(&self, mut conn: MultiplexedConnection) -> Result<()> {
        loop {
            // Blocking pop with no timeout; this is a dedicated process.
            let (_, payload): (String, String) = redis::cmd("BLPOP")
                .arg(&self.queue_name)
                .arg(0)
                .query_async(&mut conn)
                .await
                .context("blocking pop failed")?;

            self.handle_payload(&payload).await;
        }
    }

    /// Handle one raw payload. Never fails the loop: malformed tasks are
    /// logged and dropped, delivery failures are logged and followed by the
    /// backoff pause.
    pub async fn handle_payload(&self, payload: &str) {
        let task: EmailTask = match serde_json::from_str(payload) {
            Ok(task) => task,
            Err(err) => {
                warn!("dropping unreadable task: {err}");
                return;
            }
        };

        info!(kind = ?task.kind, to = %task.email, "delivering email task");
        let result = match task.kind {
            EmailTaskKind::AccountConfirmation => {
                self.mailer
                    .send_account_confirmation(
                        &task.email,
                        &task.name,
                        &task.code,
                        &task.duration_label,
                    )
                    .await
            }
            EmailTaskKind::PasswordReset => {
                self.mailer
                    .send_password_reset(&task.email, &task.name, &task.code, &task.duration_label)
                    .await
            }
        };

        if let Err(err) = result {
            error!(to = %task.email, "failed to deliver email task: {err:#}");
            tokio::time::sleep(self.backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_account_confirmation(
            &self,
            to: &str,
            _name: &str,
            code: &str,
            _duration_label: &str,
        ) -> Result<()> {
            if self.fail {
                anyhow::bail!("relay unavailable");
            }
            self.sent.lock().unwrap().push((
                "accountConfirmation".to_string(),
                to.to_string(),
                code.to_string(),
            ));
            Ok(())
        }

        async fn send_password_reset(
            &self,
            to: &str,
            _name: &str,
            code: &str,
            _duration_label: &str,
        ) -> Result<()> {
            if self.fail {
                anyhow::bail!("relay unavailable");
            }
            self.sent.lock().unwrap().push((
                "passwordReset".to_string(),
                to.to_string(),
                code.to_string(),
            ));
            Ok(())
        }
    }

    fn worker(mailer: Arc<RecordingMailer>) -> EmailWorker {
        EmailWorker::new("redis://127.0.0.1:6379", "email_queue", mailer)
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn valid_task_is_dispatched_by_kind() {
        let mailer = Arc::new(RecordingMailer::default());
        let worker = worker(Arc::clone(&mailer));

        worker
            .handle_payload(
                r#"{"type":"accountConfirmation","email":"a@b.com","nome":"Ana","codigo":"042137","tempoDuracao":"2 hours"}"#,
            )
            .await;
        worker
            .handle_payload(
                r#"{"type":"passwordReset","email":"c@d.com","nome":"Caio","codigo":"000001","tempoDuracao":"2 hours"}"#,
            )
            .await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            (
                "accountConfirmation".to_string(),
                "a@b.com".to_string(),
                "042137".to_string()
            )
        );
        assert_eq!(sent[1].0, "passwordReset");
    }

    #[tokio::test]
    async fn malformed_task_is_dropped_and_the_loop_survives() {
        let mailer = Arc::new(RecordingMailer::default());
        let worker = worker(Arc::clone(&mailer));

        worker.handle_payload("not json at all").await;
        worker
            .handle_payload(r#"{"type":"newsletter","email":"a@b.com"}"#)
            .await;
        worker
            .handle_payload(
                r#"{"type":"accountConfirmation","email":"a@b.com","nome":"Ana","codigo":"042137","tempoDuracao":"2 hours"}"#,
            )
            .await;

        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_panic() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        });
        let worker = worker(Arc::clone(&mailer));

        worker
            .handle_payload(
                r#"{"type":"passwordReset","email":"a@b.com","nome":"Ana","codigo":"042137","tempoDuracao":"2 hours"}"#,
            )
            .await;

        assert!(mailer.sent.lock().unwrap().is_empty());
    }
}
