//! NATS reply publisher

use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::{debug, warn};

/// Publishes reply envelopes back to requesters
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a serialized reply to the requester's inbox.
    ///
    /// Messages published without a reply subject are fire-and-forget; the
    /// reply is dropped.
    pub async fn reply(&self, reply_to: Option<Subject>, payload: Vec<u8>) -> Result<bool> {
        let Some(reply_to) = reply_to else {
            warn!("Request has no reply subject, dropping reply");
            return Ok(false);
        };

        let bytes = payload.len();
        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(reply_to = %reply_to, bytes = bytes, "Published reply");
        Ok(true)
    }
}
