//! Outage Mailer
//!
//! Delivery step for notifications staged by `outage-notify`: reads the
//! outbox and relays every staged message through SMTP in batches.

pub mod config;
pub mod mailer;
pub mod outbox;
pub mod relay;

pub use config::MailerConfig;
pub use mailer::{Mailer, SendSummary, DEFAULT_BATCH_SIZE};
pub use outbox::{read_outbox, OutboxEntry};
pub use relay::{OutgoingEmail, Relay, RelayConnection, RelayError, SmtpRelay};
