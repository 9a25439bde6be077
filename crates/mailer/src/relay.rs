//! SMTP relay seam
//!
//! A [`Relay`] opens connections, a [`RelayConnection`] sends messages over
//! one of them. Dropping a connection closes it.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay permanently refused this message or recipient
    #[error("Recipient rejected: {0}")]
    Rejected(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Transport(String),

    #[error("SMTP server {0} is not accepting connections")]
    Unavailable(String),
}

impl RelayError {
    /// Whether the failure only concerns the current message
    pub fn is_permanent(&self) -> bool {
        matches!(self, RelayError::Rejected(_) | RelayError::InvalidAddress { .. })
    }
}

/// A message ready to hand to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Relay: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RelayConnection>, RelayError>;
}

#[async_trait]
pub trait RelayConnection: Send {
    async fn send(&mut self, email: &OutgoingEmail) -> Result<(), RelayError>;
}

/// Relay through an SMTP server without authentication
pub struct SmtpRelay {
    server: String,
    port: u16,
    from: Mailbox,
    reply_to: Option<Mailbox>,
}

impl SmtpRelay {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        from: Mailbox,
        reply_to: Option<Mailbox>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            from,
            reply_to,
        }
    }
}

#[async_trait]
impl Relay for SmtpRelay {
    async fn connect(&self) -> Result<Box<dyn RelayConnection>, RelayError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.server)
            .port(self.port)
            .pool_config(PoolConfig::new().max_size(1))
            .build();

        match transport.test_connection().await {
            Ok(true) => {}
            Ok(false) => return Err(RelayError::Unavailable(self.server.clone())),
            Err(e) => return Err(RelayError::Transport(e.to_string())),
        }
        debug!("Connected to SMTP server {}:{}", self.server, self.port);

        Ok(Box::new(SmtpConnection {
            transport,
            from: self.from.clone(),
            reply_to: self.reply_to.clone(),
        }))
    }
}

struct SmtpConnection {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    reply_to: Option<Mailbox>,
}

impl SmtpConnection {
    fn build(&self, email: &OutgoingEmail) -> Result<Message, RelayError> {
        let to: Mailbox = email.to.parse().map_err(|e: lettre::address::AddressError| {
            RelayError::InvalidAddress {
                address: email.to.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        builder
            .body(email.body.clone())
            .map_err(|e| RelayError::Message(e.to_string()))
    }
}

#[async_trait]
impl RelayConnection for SmtpConnection {
    async fn send(&mut self, email: &OutgoingEmail) -> Result<(), RelayError> {
        let message = self.build(email)?;

        match self.transport.send(message).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => Err(RelayError::Rejected(e.to_string())),
            Err(e) => Err(RelayError::Transport(e.to_string())),
        }
    }
}
