//! outage-notify
//!
//! Stages outage notification emails for every user with affected instances.
//! Review the staged files and `notify.log`, then deliver them with
//! `outage-send`.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use outage_notifier::{
    parse_start_time, read_instance_ids, run, InstanceFilter, NotifierConfig, NotifyOptions,
    OutageWindow, RunLog, RunOptions, TemplateRenderer,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "outage-notify")]
#[command(about = "Generate outage notification emails for affected users")]
struct Cli {
    /// Availability zone affected by the outage
    #[arg(short = 'z', long)]
    target_zone: Option<String>,

    /// Node expression of affected hosts, e.g. rcc[10-20,25]
    #[arg(short, long)]
    node: Option<String>,

    /// Only instances with this status
    #[arg(long)]
    status: Option<String>,

    /// Only generate the email for this address
    #[arg(long)]
    test_recipient: Option<String>,

    /// Subject used verbatim instead of the default
    #[arg(long)]
    subject: Option<String>,

    /// Only notify the user with this name
    #[arg(long)]
    user: Option<String>,

    /// Outage start, "HH:MM DD-MM-YYYY"
    #[arg(long, value_parser = parse_start_time, required_unless_present = "instances_file")]
    start_time: Option<chrono::NaiveDateTime>,

    /// Outage duration in hours
    #[arg(short, long, required_unless_present = "instances_file")]
    duration: Option<u32>,

    /// Timezone the start time is given in
    #[arg(long, required_unless_present = "instances_file")]
    timezone: Option<String>,

    /// Template file name inside the templates directory
    #[arg(short, long)]
    template: String,

    /// File with one affected instance id per line
    #[arg(short, long)]
    instances_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,outage_notifier=debug,outage_directory=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = NotifierConfig::from_env()?;

    // The template must exist before anything is asked of the directory
    let mut renderer = TemplateRenderer::new(&config.templates_dir);
    renderer.load(&cli.template)?;

    let filter = match &cli.instances_file {
        Some(path) => InstanceFilter::Ids(read_instance_ids(path).await?),
        None => match &cli.node {
            Some(expr) => InstanceFilter::Hosts(expr.clone()),
            None => InstanceFilter::ZoneStatus {
                zone: cli.target_zone.clone(),
                status: cli.status.clone(),
            },
        },
    };
    if matches!(filter, InstanceFilter::Hosts(_))
        && (cli.target_zone.is_some() || cli.status.is_some())
    {
        warn!("--target-zone and --status are ignored when --node is given");
    }

    let window = match (cli.start_time, cli.duration) {
        (Some(start), Some(hours)) => Some(OutageWindow::from_start(start, hours)?),
        _ => None,
    };

    let started = Local::now().naive_local();
    let staging_dir = config.run_dir(started);
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .with_context(|| format!("Failed to create staging directory {}", staging_dir.display()))?;

    let log_path = staging_dir.join(outage_notifier::config::RUN_LOG_NAME);
    let mut log = RunLog::create(&log_path, &started.format("%Y-%m-%d %H:%M:%S").to_string())
        .with_context(|| format!("Failed to create run log {}", log_path.display()))?;

    let directory = config.directory.connect().await?;

    let options = RunOptions {
        filter,
        page_size: config.directory.page_size,
        notify: NotifyOptions {
            template: cli.template,
            subject: cli.subject,
            default_subject: config.default_subject.clone(),
            zone: cli.target_zone,
            node: cli.node,
            window,
            timezone: cli.timezone,
        },
        test_recipient: cli.test_recipient,
        only_user: cli.user,
    };

    info!("Staging notifications in {}", staging_dir.display());
    let summary = run(directory.as_ref(), &renderer, options, &staging_dir, &mut log).await?;

    for orphan in &summary.orphaned {
        warn!(
            "Project {} could not be resolved, {} affected instances have no recipients",
            orphan.project_id,
            orphan.instances.len()
        );
    }

    println!();
    println!("Total instances affected: {}", summary.affected);
    if !summary.orphaned.is_empty() {
        println!(
            "Instances in unresolved projects: {}",
            summary.orphaned.iter().map(|o| o.instances.len()).sum::<usize>()
        );
    }
    println!("Generated {} email notifications.", summary.notifications.notified);
    println!("Skipped {} users.", summary.notifications.skipped);
    println!();
    println!("Emails to be sent stored in: {}", staging_dir.display());
    println!("Log stored in: {}", log_path.display());
    println!();
    println!("Once you have checked the log file and generated emails");
    println!("use the command below to send emails to all users:");
    println!();
    println!(
        "outage-send --outbox {} [--smtp-server <host>] [--test-recipient <address>]",
        staging_dir.display()
    );

    Ok(())
}
