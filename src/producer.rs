//! NATS reply producer

use crate::error::PredictError;
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    /// HTTP-equivalent status code
    pub status: u16,
}

#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub error: ErrorBody,
}

pub fn error_body(kind: &str, message: String, status: u16) -> ErrorBody {
    ErrorBody {
        kind: kind.to_string(),
        message,
        status,
    }
}

impl From<&PredictError> for ErrorReply {
    fn from(err: &PredictError) -> Self {
        Self {
            error: error_body(err.kind(), err.to_string(), err.status_code()),
        }
    }
}

/// Producer for publishing request replies
#[derive(Clone)]
pub struct ReplyProducer {
    client: Client,
}

impl ReplyProducer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a JSON reply to the requester's inbox
    pub async fn reply<T: Serialize>(&self, inbox: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;

        self.client.publish(inbox.clone(), payload.into()).await?;

        debug!(inbox = %inbox, "Published reply");

        Ok(())
    }
}
