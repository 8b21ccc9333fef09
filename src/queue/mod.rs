//! Durable FIFO queue between lifecycle operations and the email worker.
//!
//! Tasks are serialized as JSON and appended to a single named Redis list.
//! The producer side never blocks beyond the append; the worker is the sole
//! consumer and pops with a blocking read.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

/// List key shared by producer and worker.
pub const DEFAULT_QUEUE_NAME: &str = "email_queue";

/// Which template the worker should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailTaskKind {
    #[serde(rename = "accountConfirmation")]
    AccountConfirmation,
    #[serde(rename = "passwordReset")]
    PasswordReset,
}

/// One queued email. Field names are part of the wire format and shared with
/// the worker; the code travels in plaintext for human display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTask {
    #[serde(rename = "type")]
    pub kind: EmailTaskKind,
    pub email: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "tempoDuracao")]
    pub duration_label: String,
}

#[async_trait]
pub trait EmailQueue: Send + Sync {
    /// Append one task. Transport failures propagate to the caller.
    async fn enqueue(&self, task: &EmailTask) -> Result<()>;
}

/// Redis list producer.
#[derive(Clone)]
pub struct RedisEmailQueue {
    manager: ConnectionManager,
    queue_name: String,
}

impl RedisEmailQueue {
    /// # Errors
    /// Returns an error if the initial connection cannot be established.
    pub async fn connect(url: &str, queue_name: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid queue url")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("failed to connect to queue transport")?;
        Ok(Self {
            manager,
            queue_name: queue_name.into(),
        })
    }
}

#[async_trait]
impl EmailQueue for RedisEmailQueue {
    async fn enqueue(&self, task: &EmailTask) -> Result<()> {
        let payload = serde_json::to_string(task).context("failed to serialize email task")?;
        // ConnectionManager reconnects internally; cloning shares the handle.
        let mut conn = self.manager.clone();
        let _: () = conn
            .rpush(&self.queue_name, payload)
            .await
            .context("failed to append email task")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_serializes_to_the_wire_format() {
        let task = EmailTask {
            kind: EmailTaskKind::AccountConfirmation,
            email: "a@b.com".to_string(),
            name: "Fábio".to_string(),
            code: "042137".to_string(),
            duration_label: "2 hours".to_string(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], "accountConfirmation");
        assert_eq!(value["email"], "a@b.com");
        assert_eq!(value["nome"], "Fábio");
        assert_eq!(value["codigo"], "042137");
        assert_eq!(value["tempoDuracao"], "2 hours");
    }

    #[test]
    fn task_deserializes_from_the_wire_format() {
        let task: EmailTask = serde_json::from_str(
            r#"{"type":"passwordReset","email":"a@b.com","nome":"Ana","codigo":"000001","tempoDuracao":"2 hours"}"#,
        )
        .unwrap();
        assert_eq!(task.kind, EmailTaskKind::PasswordReset);
        assert_eq!(task.code, "000001");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result: Result<EmailTask, _> = serde_json::from_str(
            r#"{"type":"newsletter","email":"a@b.com","nome":"Ana","codigo":"1","tempoDuracao":"2 hours"}"#,
        );
        assert!(result.is_err());
    }
}
