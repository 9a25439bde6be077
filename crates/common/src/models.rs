//! Control plane records shared by the directory client and the pipeline.

use serde::{Deserialize, Serialize};

/// A virtual machine instance as seen at collection time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique instance identifier
    pub id: String,

    /// Owning project identifier
    pub project_id: String,

    /// Display name
    pub name: String,

    /// Current status (e.g. ACTIVE, SHUTOFF)
    pub status: String,

    /// Availability zone, empty when the control plane reports none
    #[serde(default)]
    pub availability_zone: String,

    /// Hosting node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl Instance {
    /// Case-insensitive availability zone match
    pub fn in_zone(&self, zone: &str) -> bool {
        self.availability_zone.eq_ignore_ascii_case(zone)
    }
}

/// A directory user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

/// A project (tenant) touched by the outage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,

    pub name: String,

    /// Members, de-duplicated by user id, in first-seen order
    #[serde(default)]
    pub users: Vec<User>,

    /// Affected instances owned by this project
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl Project {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            users: Vec::new(),
            instances: Vec::new(),
        }
    }
}

/// A user's role on a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_match_ignores_case() {
        let instance = Instance {
            id: "i-1".to_string(),
            project_id: "p-1".to_string(),
            name: "web".to_string(),
            status: "ACTIVE".to_string(),
            availability_zone: "Melbourne-QH2".to_string(),
            host: None,
        };

        assert!(instance.in_zone("melbourne-qh2"));
        assert!(!instance.in_zone("melbourne"));
    }

    #[test]
    fn test_user_defaults() {
        let user: User = serde_json::from_str(r#"{"id": "u1", "name": "alice"}"#).unwrap();
        assert!(user.enabled);
        assert!(user.email.is_none());
    }
}
