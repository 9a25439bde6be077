//! Batched delivery of staged notifications
//!
//! A fresh relay connection is opened for every batch of messages and
//! dropped when the batch is done.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::outbox::OutboxEntry;
use crate::relay::{OutgoingEmail, Relay};

/// Messages sent over a single connection, unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendSummary {
    pub sent: usize,
    pub rejected: usize,
    pub connections: usize,
}

pub struct Mailer<R: Relay> {
    relay: R,
    batch_size: usize,
    test_recipient: Option<String>,
}

impl<R: Relay> Mailer<R> {
    pub fn new(relay: R) -> Self {
        Self {
            relay,
            batch_size: DEFAULT_BATCH_SIZE,
            test_recipient: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Deliver everything to `recipient` instead of the staged addressees
    pub fn with_test_recipient(mut self, recipient: Option<String>) -> Self {
        self.test_recipient = recipient;
        self
    }

    /// Send every entry; a rejected recipient is skipped, any other failure
    /// stops delivery
    pub async fn send_all(&self, entries: &[OutboxEntry]) -> Result<SendSummary> {
        let mut summary = SendSummary::default();

        for batch in entries.chunks(self.batch_size) {
            if summary.connections > 0 {
                info!("Resetting SMTP connection");
            }
            let mut connection = self
                .relay
                .connect()
                .await
                .context("Failed to connect to SMTP server")?;
            summary.connections += 1;

            for entry in batch {
                let to = match &self.test_recipient {
                    Some(recipient) => {
                        info!("Sending to: {} (actual recipient: {})", entry.recipient, recipient);
                        recipient.clone()
                    }
                    None => {
                        info!("Sending to: {}", entry.recipient);
                        entry.recipient.clone()
                    }
                };

                let email = OutgoingEmail {
                    to,
                    subject: entry.message.subject.clone(),
                    body: entry.message.body.clone(),
                };

                match connection.send(&email).await {
                    Ok(()) => summary.sent += 1,
                    Err(e) if e.is_permanent() => {
                        warn!("Skipping {}: {}", entry.recipient, e);
                        summary.rejected += 1;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("Error sending to {} ({})", email.to, entry.path.display())
                        });
                    }
                }
            }
        }

        Ok(summary)
    }
}
