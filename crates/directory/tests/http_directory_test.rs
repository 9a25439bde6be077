//! Integration tests for the HTTP directory client against a mock control plane

use mockito::{Matcher, Server};
use outage_directory::{DirectoryError, DirectoryService, HttpDirectory, InstanceQuery};

fn client(server: &Server) -> HttpDirectory {
    HttpDirectory::new(
        format!("{}/compute", server.url()),
        format!("{}/identity", server.url()),
        "test-token".to_string(),
    )
}

#[tokio::test]
async fn test_list_instances_sends_marker_and_token() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/compute/servers/detail")
        .match_header("X-Auth-Token", "test-token")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("all_tenants".into(), "1".into()),
            Matcher::UrlEncoded("status".into(), "ACTIVE".into()),
            Matcher::UrlEncoded("marker".into(), "i-1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"servers": [{
                "id": "i-2",
                "name": "web-02",
                "status": "ACTIVE",
                "tenant_id": "p-1",
                "OS-EXT-AZ:availability_zone": "qh2",
                "OS-EXT-SRV-ATTR:host": "rcc10"
            }]}"#,
        )
        .create_async()
        .await;

    let query = InstanceQuery::all()
        .with_status(Some("ACTIVE".to_string()))
        .after(Some("i-1".to_string()));
    let instances = client(&server).list_instances(&query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].id, "i-2");
    assert_eq!(instances[0].availability_zone, "qh2");
}

#[tokio::test]
async fn test_unauthorized_is_reported() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/identity/v3/projects")
        .with_status(401)
        .create_async()
        .await;

    let result = client(&server).list_projects().await;
    assert!(matches!(result, Err(DirectoryError::Unauthorized(_))));
}

#[tokio::test]
async fn test_missing_instance() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/compute/servers/i-404")
        .with_status(404)
        .create_async()
        .await;

    let result = client(&server).get_instance("i-404").await;
    assert!(matches!(
        result,
        Err(DirectoryError::NotFound { entity: "instance", .. })
    ));
}

#[tokio::test]
async fn test_role_assignments_skip_groups() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/identity/v3/role_assignments")
        .match_query(Matcher::UrlEncoded("scope.project.id".into(), "p-1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"role_assignments": [
                {"user": {"id": "u-1"}, "role": {"id": "member"}, "scope": {"project": {"id": "p-1"}}},
                {"group": {"id": "g-1"}, "role": {"id": "member"}, "scope": {"project": {"id": "p-1"}}},
                {"user": {"id": "u-1"}, "role": {"id": "admin"}, "scope": {"project": {"id": "p-1"}}}
            ]}"#,
        )
        .create_async()
        .await;

    let assignments = client(&server).list_role_assignments("p-1").await.unwrap();
    assert_eq!(assignments.len(), 2);
    assert!(assignments.iter().all(|a| a.user_id == "u-1"));
    assert_eq!(assignments[1].role_id.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_find_user_by_name() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/identity/v3/users")
        .match_query(Matcher::UrlEncoded("name".into(), "alice".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"users": [{"id": "u-1", "name": "alice", "email": "alice@example.org", "enabled": true}]}"#,
        )
        .create_async()
        .await;

    let user = client(&server).find_user_by_name("alice").await.unwrap();
    assert_eq!(user.unwrap().email.as_deref(), Some("alice@example.org"));
}
