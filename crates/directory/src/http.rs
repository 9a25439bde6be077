//! HTTP client for the compute and identity APIs
//!
//! Talks to an OpenStack-shaped control plane using a pre-issued token.
//! Obtaining the token is left to the operator's environment.

use async_trait::async_trait;
use outage_common::{Instance, Project, RoleAssignment, User};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{DirectoryError, DirectoryResult};
use crate::service::{DirectoryService, InstanceQuery};

const AUTH_HEADER: &str = "X-Auth-Token";

/// Compute server as returned by `/servers/detail`
#[derive(Debug, Deserialize)]
struct ServerBody {
    id: String,
    name: String,
    status: String,
    tenant_id: String,
    #[serde(rename = "OS-EXT-AZ:availability_zone", default)]
    availability_zone: Option<String>,
    #[serde(rename = "OS-EXT-SRV-ATTR:host", default)]
    host: Option<String>,
}

impl From<ServerBody> for Instance {
    fn from(server: ServerBody) -> Self {
        Instance {
            id: server.id,
            project_id: server.tenant_id,
            name: server.name,
            status: server.status,
            availability_zone: server.availability_zone.unwrap_or_default(),
            host: server.host,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<ServerBody>,
}

#[derive(Debug, Deserialize)]
struct ServerResponse {
    server: ServerBody,
}

#[derive(Debug, Deserialize)]
struct ProjectBody {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    projects: Vec<ProjectBody>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

/// Group assignments carry `group` instead of `user` and are skipped
#[derive(Debug, Deserialize)]
struct RoleAssignmentBody {
    #[serde(default)]
    user: Option<IdRef>,
    #[serde(default)]
    role: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentsResponse {
    role_assignments: Vec<RoleAssignmentBody>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: User,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    users: Vec<User>,
}

/// Directory backed by the control plane REST APIs
pub struct HttpDirectory {
    compute_url: String,
    identity_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    /// Create a new client
    pub fn new(compute_url: String, identity_url: String, token: String) -> Self {
        Self {
            compute_url: compute_url.trim_end_matches('/').to_string(),
            identity_url: identity_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    /// GET a JSON document; `Ok(None)` on 404
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> DirectoryResult<Option<T>> {
        debug!("Directory request: GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .header(AUTH_HEADER, &self.token)
            .query(query)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(DirectoryError::Unauthorized(format!(
                    "{} returned {}",
                    url,
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(DirectoryError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            _ => {}
        }

        Ok(Some(response.json().await?))
    }

    /// GET a JSON document that must exist
    async fn get_required<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> DirectoryResult<T> {
        self.get_json(url, query)
            .await?
            .ok_or_else(|| DirectoryError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    async fn list_instances(&self, query: &InstanceQuery) -> DirectoryResult<Vec<Instance>> {
        let url = format!("{}/servers/detail", self.compute_url);

        let mut params = vec![("all_tenants", "1".to_string())];
        if let Some(status) = &query.status {
            params.push(("status", status.clone()));
        }
        if let Some(host) = &query.host {
            params.push(("host", host.clone()));
        }
        if let Some(marker) = &query.marker {
            params.push(("marker", marker.clone()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        let response: ServersResponse = self.get_required(&url, &params).await?;
        Ok(response.servers.into_iter().map(Instance::from).collect())
    }

    async fn get_instance(&self, id: &str) -> DirectoryResult<Instance> {
        let url = format!("{}/servers/{}", self.compute_url, id);

        let response: ServerResponse =
            self.get_json(&url, &[])
                .await?
                .ok_or_else(|| DirectoryError::NotFound {
                    entity: "instance",
                    id: id.to_string(),
                })?;

        Ok(response.server.into())
    }

    async fn list_projects(&self) -> DirectoryResult<Vec<Project>> {
        let url = format!("{}/v3/projects", self.identity_url);

        let response: ProjectsResponse = self.get_required(&url, &[]).await?;
        Ok(response
            .projects
            .into_iter()
            .map(|project| Project::new(project.id, project.name))
            .collect())
    }

    async fn list_role_assignments(
        &self,
        project_id: &str,
    ) -> DirectoryResult<Vec<RoleAssignment>> {
        let url = format!("{}/v3/role_assignments", self.identity_url);
        let params = [
            ("scope.project.id", project_id.to_string()),
            ("effective", String::new()),
        ];

        let response: RoleAssignmentsResponse = self.get_required(&url, &params).await?;
        Ok(response
            .role_assignments
            .into_iter()
            .filter_map(|assignment| {
                let user = assignment.user?;
                Some(RoleAssignment {
                    user_id: user.id,
                    role_id: assignment.role.map(|role| role.id),
                })
            })
            .collect())
    }

    async fn get_user(&self, id: &str) -> DirectoryResult<User> {
        let url = format!("{}/v3/users/{}", self.identity_url, id);

        let response: UserResponse =
            self.get_json(&url, &[])
                .await?
                .ok_or_else(|| DirectoryError::NotFound {
                    entity: "user",
                    id: id.to_string(),
                })?;

        Ok(response.user)
    }

    async fn find_user_by_name(&self, name: &str) -> DirectoryResult<Option<User>> {
        let url = format!("{}/v3/users", self.identity_url);

        let response: UsersResponse = self
            .get_required(&url, &[("name", name.to_string())])
            .await?;
        Ok(response.users.into_iter().find(|user| user.name == name))
    }

    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        let url = format!("{}/v3/users", self.identity_url);

        let response: UsersResponse = self.get_required(&url, &[]).await?;
        Ok(response.users)
    }
}
