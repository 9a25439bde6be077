//! Mailer configuration

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use std::env;

use crate::mailer::DEFAULT_BATCH_SIZE;

/// Mailer configuration
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// SMTP relay host
    pub smtp_server: String,

    /// SMTP relay port
    pub smtp_port: u16,

    /// Messages per connection
    pub batch_size: usize,

    /// From header
    pub from: Mailbox,

    /// Reply-To header, omitted when unset
    pub reply_to: Option<Mailbox>,
}

impl MailerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let from = env::var("MAIL_FROM")
            .unwrap_or_else(|_| "Research Cloud <noreply@localhost>".to_string());

        let config = MailerConfig {
            smtp_server: env::var("SMTP_SERVER").unwrap_or_else(|_| "127.0.0.1".to_string()),

            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .context("Invalid SMTP_PORT")?,

            batch_size: env::var("SMTP_BATCH_SIZE")
                .ok()
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("Invalid SMTP_BATCH_SIZE")?
                .unwrap_or(DEFAULT_BATCH_SIZE),

            from: parse_mailbox("MAIL_FROM", &from)?,

            reply_to: env::var("MAIL_REPLY_TO")
                .ok()
                .map(|v| parse_mailbox("MAIL_REPLY_TO", &v))
                .transpose()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.smtp_server.is_empty() {
            anyhow::bail!("SMTP_SERVER must not be empty");
        }

        if self.batch_size == 0 {
            anyhow::bail!("SMTP_BATCH_SIZE must be greater than 0");
        }

        Ok(())
    }
}

fn parse_mailbox(var: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .with_context(|| format!("Invalid {}: {}", var, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MailerConfig {
        MailerConfig {
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 25,
            batch_size: DEFAULT_BATCH_SIZE,
            from: parse_mailbox("MAIL_FROM", "Research Cloud <noreply@localhost>").unwrap(),
            reply_to: None,
        }
    }

    #[test]
    fn test_default_batch_size() {
        assert_eq!(config().batch_size, 100);
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size() {
        let config = MailerConfig {
            batch_size: 0,
            ..config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_mailbox() {
        let err = parse_mailbox("MAIL_REPLY_TO", "support").unwrap_err();
        assert!(err.to_string().contains("MAIL_REPLY_TO"));
    }
}
