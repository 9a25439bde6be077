//! The Directory Service seam

use async_trait::async_trait;
use outage_common::{Instance, Project, RoleAssignment, User};

use crate::error::DirectoryResult;

/// Options for a single instance listing request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceQuery {
    /// Only instances with this exact status
    pub status: Option<String>,

    /// Only instances on this host
    pub host: Option<String>,

    /// Begin after the instance with this id
    pub marker: Option<String>,

    /// Page size hint
    pub limit: Option<usize>,
}

impl InstanceQuery {
    /// Query across all projects
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn after(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

/// Read-only view of the control plane
///
/// Calls are awaited one at a time by the pipeline; implementations do not
/// need to support concurrent use beyond `Send + Sync`.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// List one page of instances
    async fn list_instances(&self, query: &InstanceQuery) -> DirectoryResult<Vec<Instance>>;

    /// Fetch a single instance by id
    async fn get_instance(&self, id: &str) -> DirectoryResult<Instance>;

    /// List every project (users and instances are left empty)
    async fn list_projects(&self) -> DirectoryResult<Vec<Project>>;

    /// List role assignments scoped to a project
    async fn list_role_assignments(&self, project_id: &str)
        -> DirectoryResult<Vec<RoleAssignment>>;

    /// Fetch a single user by id
    async fn get_user(&self, id: &str) -> DirectoryResult<User>;

    /// Look a user up by login name
    async fn find_user_by_name(&self, name: &str) -> DirectoryResult<Option<User>>;

    /// List every user in the directory
    async fn list_users(&self) -> DirectoryResult<Vec<User>>;
}
