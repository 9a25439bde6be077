//! User aggregation
//!
//! Builds one record per user, merging that user's affected instances across
//! every project they belong to. Identity fields (name, email, enabled) come
//! from the first sighting of a user; instance lists always merge.

use anyhow::{Context, Result};
use outage_common::{Instance, Project, User};
use outage_directory::DirectoryService;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use tracing::info;

use crate::run_log::RunLog;

/// A user and their affected instances, keyed by project name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub enabled: bool,
    pub instances: BTreeMap<String, Vec<Instance>>,
}

impl UserRecord {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            enabled: user.enabled,
            instances: BTreeMap::new(),
        }
    }

    /// Affected instances across all projects
    pub fn instance_count(&self) -> usize {
        self.instances.values().map(Vec::len).sum()
    }
}

/// Every user seen during a run, keyed by user id, in first-seen order
#[derive(Debug, Default)]
pub struct UserDirectory {
    records: Vec<UserRecord>,
    index: HashMap<String, usize>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a record exists for `user`; an existing record is returned
    /// untouched
    pub fn register(&mut self, user: &User) -> &mut UserRecord {
        let i = match self.index.get(&user.id) {
            Some(&i) => i,
            None => {
                self.index.insert(user.id.clone(), self.records.len());
                self.records.push(UserRecord::from_user(user));
                self.records.len() - 1
            }
        };
        &mut self.records[i]
    }

    /// Attach every instance of `project` to each of its members
    pub fn record_membership(&mut self, project: &Project) {
        for user in &project.users {
            let record = self.register(user);
            if project.instances.is_empty() {
                continue;
            }
            record
                .instances
                .entry(project.name.clone())
                .or_default()
                .extend(project.instances.iter().cloned());
        }
    }

    pub fn get(&self, id: &str) -> Option<&UserRecord> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Build the user directory: members of affected projects first, then every
/// remaining directory user with no instances
pub async fn aggregate_users<W: Write>(
    directory: &dyn DirectoryService,
    projects: &[Project],
    log: &mut RunLog<W>,
) -> Result<UserDirectory> {
    let mut users = UserDirectory::new();

    for project in projects {
        log_project(project, log)?;
        users.record_membership(project);
    }
    let members = users.len();

    info!("Gathering user information for users in affected tenants");
    for user in directory.list_users().await.context("Failed to list users")? {
        users.register(&user);
    }

    info!(
        "{} users in affected projects, {} users in total",
        members,
        users.len()
    );

    Ok(users)
}

fn log_project<W: Write>(project: &Project, log: &mut RunLog<W>) -> Result<()> {
    log.blank()?;
    log.heading(&project.name, &project.id)?;
    log.line("Affected instances: ")?;
    log.blank()?;
    for instance in &project.instances {
        log.row(&[
            &instance.name,
            &instance.id,
            instance.host.as_deref().unwrap_or(""),
            &instance.availability_zone,
        ])?;
    }
    log.rule(' ')?;

    log.line("Users: ")?;
    log.blank()?;
    for user in &project.users {
        log.row(&[user.email.as_deref().unwrap_or("None"), &user.name])?;
    }

    Ok(())
}
