//! Tenant aggregation
//!
//! Groups affected instances by owning project, then resolves the name and
//! members of only those projects. Projects that own affected instances but
//! are missing from the project listing are reported as orphaned.

use anyhow::{Context, Result};
use outage_common::{Instance, Project, User};
use outage_directory::{DirectoryError, DirectoryService};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use tracing::{debug, info, warn};

use crate::run_log::RunLog;

/// A project id that owns affected instances but could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedProject {
    pub project_id: String,
    pub instances: Vec<Instance>,
}

/// Result of the tenant pass
#[derive(Debug, Default)]
pub struct TenantAggregation {
    /// Resolved projects, in order of first affected instance
    pub projects: Vec<Project>,

    /// Unresolvable project ids
    pub orphaned: Vec<OrphanedProject>,
}

impl TenantAggregation {
    /// Affected instances owned by resolved projects
    pub fn affected_instances(&self) -> usize {
        self.projects.iter().map(|p| p.instances.len()).sum()
    }

    /// Affected instances owned by orphaned project ids
    pub fn orphaned_instances(&self) -> usize {
        self.orphaned.iter().map(|o| o.instances.len()).sum()
    }
}

/// Group instances by project id, keeping first-seen project order
pub fn group_by_project(instances: Vec<Instance>) -> Vec<(String, Vec<Instance>)> {
    let mut groups: Vec<(String, Vec<Instance>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for instance in instances {
        match index.get(&instance.project_id) {
            Some(&i) => groups[i].1.push(instance),
            None => {
                index.insert(instance.project_id.clone(), groups.len());
                groups.push((instance.project_id.clone(), vec![instance]));
            }
        }
    }

    groups
}

/// Resolve affected projects and their members
pub async fn aggregate_tenants<W: Write>(
    directory: &dyn DirectoryService,
    instances: Vec<Instance>,
    log: &mut RunLog<W>,
) -> Result<TenantAggregation> {
    let groups = group_by_project(instances);
    let affected: HashSet<&str> = groups.iter().map(|(id, _)| id.as_str()).collect();
    info!("{} projects own affected instances", groups.len());

    let mut names: HashMap<String, String> = directory
        .list_projects()
        .await
        .context("Failed to list projects")?
        .into_iter()
        .filter(|project| affected.contains(project.id.as_str()))
        .map(|project| (project.id, project.name))
        .collect();

    let mut aggregation = TenantAggregation::default();

    for (project_id, instances) in groups {
        let Some(name) = names.remove(&project_id) else {
            warn!(
                "Project {} owns {} affected instances but is not in the project listing",
                project_id,
                instances.len()
            );
            log.line(format!(
                "WARNING: project {} owns {} affected instances but could not be resolved; its users will not be notified",
                project_id,
                instances.len()
            ))?;
            aggregation.orphaned.push(OrphanedProject {
                project_id,
                instances,
            });
            continue;
        };

        let users = resolve_members(directory, &project_id).await?;
        debug!(
            "Project {} ({}): {} instances, {} members",
            name,
            project_id,
            instances.len(),
            users.len()
        );

        aggregation.projects.push(Project {
            id: project_id,
            name,
            users,
            instances,
        });
    }

    Ok(aggregation)
}

/// Members of a project, one entry per user regardless of role count
async fn resolve_members(directory: &dyn DirectoryService, project_id: &str) -> Result<Vec<User>> {
    let assignments = directory
        .list_role_assignments(project_id)
        .await
        .with_context(|| format!("Failed to list role assignments for project {}", project_id))?;

    let mut seen = HashSet::new();
    let mut users = Vec::new();

    for assignment in assignments {
        if !seen.insert(assignment.user_id.clone()) {
            continue;
        }

        match directory.get_user(&assignment.user_id).await {
            Ok(user) => users.push(user),
            Err(DirectoryError::NotFound { id, .. }) => {
                warn!("Project {} has a role assignment for unknown user {}", project_id, id);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to look up user {}", assignment.user_id)
                });
            }
        }
    }

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outage_common::RoleAssignment;
    use outage_directory::{Fixture, FixtureDirectory};
    use std::collections::BTreeMap;

    fn instance(id: &str, project_id: &str) -> Instance {
        Instance {
            id: id.to_string(),
            project_id: project_id.to_string(),
            name: format!("vm-{}", id),
            status: "ACTIVE".to_string(),
            availability_zone: "qh2".to_string(),
            host: None,
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            email: Some(format!("{}@example.org", id)),
            enabled: true,
        }
    }

    fn assignment(user_id: &str, role_id: &str) -> RoleAssignment {
        RoleAssignment {
            user_id: user_id.to_string(),
            role_id: Some(role_id.to_string()),
        }
    }

    fn directory() -> FixtureDirectory {
        let mut role_assignments = BTreeMap::new();
        role_assignments.insert(
            "p-a".to_string(),
            vec![
                assignment("u-1", "member"),
                assignment("u-1", "admin"),
                assignment("u-2", "member"),
                assignment("u-gone", "member"),
            ],
        );
        role_assignments.insert("p-unaffected".to_string(), vec![assignment("u-3", "member")]);

        FixtureDirectory::new(Fixture {
            projects: vec![
                Project::new("p-a", "alpha"),
                Project::new("p-unaffected", "idle"),
            ],
            role_assignments,
            users: vec![user("u-1"), user("u-2"), user("u-3")],
            ..Default::default()
        })
    }

    #[test]
    fn test_group_by_project_keeps_order() {
        let groups = group_by_project(vec![
            instance("i-1", "p-b"),
            instance("i-2", "p-a"),
            instance("i-3", "p-b"),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "p-b");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "p-a");
    }

    #[tokio::test]
    async fn test_members_are_deduplicated() {
        let directory = directory();
        let mut log = RunLog::sink();

        let aggregation = aggregate_tenants(&directory, vec![instance("i-1", "p-a")], &mut log)
            .await
            .unwrap();

        assert_eq!(aggregation.projects.len(), 1);
        let project = &aggregation.projects[0];
        assert_eq!(project.name, "alpha");
        let ids: Vec<_> = project.users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u-1", "u-2"]);
    }

    #[tokio::test]
    async fn test_only_affected_projects_are_resolved() {
        let directory = directory();
        let mut log = RunLog::sink();

        let aggregation = aggregate_tenants(&directory, vec![instance("i-1", "p-a")], &mut log)
            .await
            .unwrap();

        assert!(aggregation.projects.iter().all(|p| p.id != "p-unaffected"));
    }

    #[tokio::test]
    async fn test_orphaned_project_is_reported() {
        let directory = directory();
        let mut log = RunLog::new(Vec::new());

        let aggregation = aggregate_tenants(
            &directory,
            vec![instance("i-1", "p-a"), instance("i-2", "p-deleted")],
            &mut log,
        )
        .await
        .unwrap();

        assert_eq!(aggregation.projects.len(), 1);
        assert_eq!(aggregation.orphaned.len(), 1);
        assert_eq!(aggregation.orphaned[0].project_id, "p-deleted");
        assert_eq!(aggregation.affected_instances(), 1);
        assert_eq!(aggregation.orphaned_instances(), 1);

        let text = String::from_utf8(log.into_inner()).unwrap();
        assert!(text.contains("p-deleted"));
    }
}
