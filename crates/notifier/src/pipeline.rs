//! One notification run, end to end
//!
//! collect instances -> aggregate tenants -> aggregate users -> notify

use anyhow::{Context, Result};
use outage_directory::DirectoryService;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::collector::{InstanceCollector, InstanceFilter};
use crate::notification::{Notifier, NotifyOptions, NotifySummary, RecipientFilter};
use crate::renderer::Renderer;
use crate::run_log::RunLog;
use crate::tenants::{aggregate_tenants, OrphanedProject};
use crate::users::aggregate_users;

/// Everything a run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub filter: InstanceFilter,

    /// Requested instance page size for zone scans
    pub page_size: Option<usize>,

    pub notify: NotifyOptions,

    /// Only notify the user with this email address
    pub test_recipient: Option<String>,

    /// Only notify the user with this name
    pub only_user: Option<String>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Instances matching the filter
    pub instances: usize,

    /// Affected instances owned by resolved projects
    pub affected: usize,

    pub projects: usize,

    pub users: usize,

    pub orphaned: Vec<OrphanedProject>,

    pub notifications: NotifySummary,
}

pub async fn run<W: Write>(
    directory: &dyn DirectoryService,
    renderer: &dyn Renderer,
    options: RunOptions,
    staging_dir: &Path,
    log: &mut RunLog<W>,
) -> Result<RunSummary> {
    let user_id = match &options.only_user {
        Some(name) => {
            let user = directory
                .find_user_by_name(name)
                .await
                .with_context(|| format!("Failed to look up user {}", name))?
                .with_context(|| format!("User {} not found", name))?;
            info!("Only notifying user {} ({})", user.name, user.id);
            Some(user.id)
        }
        None => None,
    };

    let instances = InstanceCollector::with_page_size(directory, options.filter, options.page_size)?
        .collect_all()
        .await?;
    info!("{} instances matched", instances.len());
    let collected = instances.len();

    let tenants = aggregate_tenants(directory, instances, log).await?;
    let users = aggregate_users(directory, &tenants.projects, log).await?;

    let notifier = Notifier::new(renderer, options.notify, staging_dir);
    let recipients = RecipientFilter {
        test_recipient: options.test_recipient,
        user_id,
    };
    let notifications = notifier.notify_all(&users, &recipients, log).await?;

    log.flush()?;

    Ok(RunSummary {
        instances: collected,
        affected: tenants.affected_instances(),
        projects: tenants.projects.len(),
        users: users.len(),
        orphaned: tenants.orphaned,
        notifications,
    })
}
