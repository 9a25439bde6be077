//! outage-send
//!
//! Relays the notifications staged by `outage-notify` through SMTP.

use anyhow::Result;
use clap::Parser;
use outage_mailer::{read_outbox, Mailer, MailerConfig, SmtpRelay};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "outage-send")]
#[command(about = "Send staged outage notification emails")]
struct Cli {
    /// Outbox folder containing the emails to be sent
    #[arg(short, long)]
    outbox: PathBuf,

    /// SMTP server to use (overrides SMTP_SERVER)
    #[arg(short = 'p', long)]
    smtp_server: Option<String>,

    /// Send all emails to this single address, ignoring the recipients
    #[arg(long)]
    test_recipient: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,outage_mailer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = MailerConfig::from_env()?;
    if let Some(server) = cli.smtp_server {
        config.smtp_server = server;
        config.validate()?;
    }

    let entries = read_outbox(&cli.outbox).await?;
    info!(
        "{} staged messages in {}, relaying through {}:{}",
        entries.len(),
        cli.outbox.display(),
        config.smtp_server,
        config.smtp_port
    );

    let relay = SmtpRelay::new(
        config.smtp_server.clone(),
        config.smtp_port,
        config.from.clone(),
        config.reply_to.clone(),
    );
    let mailer = Mailer::new(relay)
        .with_batch_size(config.batch_size)
        .with_test_recipient(cli.test_recipient);

    let summary = mailer.send_all(&entries).await?;

    println!();
    println!("Sent {} emails, {} rejected.", summary.sent, summary.rejected);

    Ok(())
}
