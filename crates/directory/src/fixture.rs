//! In-memory directory for dry runs and testing
//!
//! Loads a JSON document describing instances, projects, role assignments
//! and users, and answers directory queries from it. Instance listings are
//! paginated by marker the same way the compute API does it.

use async_trait::async_trait;
use outage_common::{Instance, Project, RoleAssignment, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::error::{DirectoryError, DirectoryResult};
use crate::service::{DirectoryService, InstanceQuery};

/// Default page size, matching the compute API's default `limit`
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Contents of a fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub instances: Vec<Instance>,

    /// Projects; only `id` and `name` are used
    #[serde(default)]
    pub projects: Vec<Project>,

    /// Role assignments keyed by project id
    #[serde(default)]
    pub role_assignments: BTreeMap<String, Vec<RoleAssignment>>,

    #[serde(default)]
    pub users: Vec<User>,
}

/// Directory answering from a [`Fixture`]
pub struct FixtureDirectory {
    fixture: Fixture,
    page_size: usize,
    instance_requests: AtomicUsize,
}

impl FixtureDirectory {
    /// Create a new fixture directory
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            page_size: DEFAULT_PAGE_SIZE,
            instance_requests: AtomicUsize::new(0),
        }
    }

    /// Override the page size used for paginated instance listings
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Load a fixture from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> DirectoryResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;
        let fixture: Fixture = serde_json::from_str(&contents).map_err(|e| {
            DirectoryError::Fixture(format!("{}: {}", path.display(), e))
        })?;

        debug!(
            "Loaded fixture {}: {} instances, {} projects, {} users",
            path.display(),
            fixture.instances.len(),
            fixture.projects.len(),
            fixture.users.len()
        );

        Ok(Self::new(fixture))
    }

    /// Number of `list_instances` calls served so far
    pub fn instance_requests(&self) -> usize {
        self.instance_requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DirectoryService for FixtureDirectory {
    async fn list_instances(&self, query: &InstanceQuery) -> DirectoryResult<Vec<Instance>> {
        self.instance_requests.fetch_add(1, Ordering::Relaxed);

        let matching: Vec<&Instance> = self
            .fixture
            .instances
            .iter()
            .filter(|i| query.status.as_ref().map_or(true, |s| &i.status == s))
            .filter(|i| {
                query
                    .host
                    .as_ref()
                    .map_or(true, |h| i.host.as_ref() == Some(h))
            })
            .collect();

        // Host listings are served whole
        if query.host.is_some() {
            return Ok(matching.into_iter().cloned().collect());
        }

        let start = match &query.marker {
            None => 0,
            Some(marker) => {
                matching
                    .iter()
                    .position(|i| &i.id == marker)
                    .ok_or_else(|| DirectoryError::NotFound {
                        entity: "marker",
                        id: marker.clone(),
                    })?
                    + 1
            }
        };

        let page_size = query.limit.unwrap_or(self.page_size).min(self.page_size);

        Ok(matching
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn get_instance(&self, id: &str) -> DirectoryResult<Instance> {
        self.fixture
            .instances
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                entity: "instance",
                id: id.to_string(),
            })
    }

    async fn list_projects(&self) -> DirectoryResult<Vec<Project>> {
        Ok(self
            .fixture
            .projects
            .iter()
            .map(|p| Project::new(p.id.clone(), p.name.clone()))
            .collect())
    }

    async fn list_role_assignments(
        &self,
        project_id: &str,
    ) -> DirectoryResult<Vec<RoleAssignment>> {
        Ok(self
            .fixture
            .role_assignments
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_user(&self, id: &str) -> DirectoryResult<User> {
        self.fixture
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                entity: "user",
                id: id.to_string(),
            })
    }

    async fn find_user_by_name(&self, name: &str) -> DirectoryResult<Option<User>> {
        Ok(self.fixture.users.iter().find(|u| u.name == name).cloned())
    }

    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        Ok(self.fixture.users.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, status: &str, host: &str) -> Instance {
        Instance {
            id: id.to_string(),
            project_id: "p-1".to_string(),
            name: format!("vm-{}", id),
            status: status.to_string(),
            availability_zone: "qh2".to_string(),
            host: Some(host.to_string()),
        }
    }

    fn directory() -> FixtureDirectory {
        FixtureDirectory::new(Fixture {
            instances: vec![
                instance("i-1", "ACTIVE", "rcc1"),
                instance("i-2", "SHUTOFF", "rcc1"),
                instance("i-3", "ACTIVE", "rcc2"),
                instance("i-4", "ACTIVE", "rcc2"),
                instance("i-5", "ACTIVE", "rcc3"),
            ],
            ..Default::default()
        })
        .with_page_size(2)
    }

    #[tokio::test]
    async fn test_marker_pagination() {
        let directory = directory();

        let first = directory.list_instances(&InstanceQuery::all()).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].id, "i-2");

        let second = directory
            .list_instances(&InstanceQuery::all().after(Some("i-2".to_string())))
            .await
            .unwrap();
        assert_eq!(second[0].id, "i-3");

        let last = directory
            .list_instances(&InstanceQuery::all().after(Some("i-5".to_string())))
            .await
            .unwrap();
        assert!(last.is_empty());
        assert_eq!(directory.instance_requests(), 3);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let directory = directory().with_page_size(10);
        let active = directory
            .list_instances(&InstanceQuery::all().with_status(Some("ACTIVE".to_string())))
            .await
            .unwrap();
        assert_eq!(active.len(), 4);
    }

    #[tokio::test]
    async fn test_host_listing_is_unpaginated() {
        let directory = directory().with_page_size(1);
        let on_host = directory
            .list_instances(&InstanceQuery::all().on_host("rcc2"))
            .await
            .unwrap();
        assert_eq!(on_host.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_marker() {
        let result = directory()
            .list_instances(&InstanceQuery::all().after(Some("missing".to_string())))
            .await;
        assert!(matches!(result, Err(DirectoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        std::fs::write(
            &path,
            r#"{"users": [{"id": "u1", "name": "alice", "email": "alice@example.org"}]}"#,
        )
        .unwrap();

        let directory = FixtureDirectory::load(&path).await.unwrap();
        let user = directory.find_user_by_name("alice").await.unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert!(directory.find_user_by_name("bob").await.unwrap().is_none());
    }
}
