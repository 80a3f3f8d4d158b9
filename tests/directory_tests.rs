//! HTTP user/pet lookups against a mocked directory service.

use anyhow::Result;
use pawalert_server::config::{Platform, PlatformConfig};
use pawalert_server::directory::{HttpDirectory, PetDirectory, UserDirectory};
use pawalert_server::error::AlertError;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn existing_user_is_found_with_api_key() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/21"))
        .and(header("x-api-key", "local-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 21})))
        .expect(1)
        .mount(&server)
        .await;

    let directory = HttpDirectory::new(server.uri(), Some("local-key".into()));
    assert!(directory.user_exists(21).await?);
    Ok(())
}

#[tokio::test]
async fn missing_pet_is_reported_as_absent() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pets/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let directory = HttpDirectory::new(format!("{}/", server.uri()), None);
    assert!(!directory.pet_exists(404).await?);
    Ok(())
}

#[tokio::test]
async fn server_errors_surface_as_collaborator_failures() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/3"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let directory = HttpDirectory::new(server.uri(), None);
    let err = directory.user_exists(3).await.unwrap_err();
    assert!(matches!(err, AlertError::Collaborator(_)));
    Ok(())
}

#[tokio::test]
async fn unreachable_directory_is_a_collaborator_failure() {
    // Nothing listens on port 9 locally.
    let directory = HttpDirectory::new("http://127.0.0.1:9", None);
    let err = directory.pet_exists(1).await.unwrap_err();
    assert!(matches!(err, AlertError::Collaborator(_)));
}

#[test]
fn platform_without_base_url_has_no_http_directory() {
    let config = PlatformConfig {
        platform: Platform::Vercel,
        base_url: None,
        api_key: Some("unused".into()),
    };
    assert!(HttpDirectory::from_platform(&config).is_none());

    let config = PlatformConfig {
        base_url: Some("https://directory.example".into()),
        ..config
    };
    assert!(HttpDirectory::from_platform(&config).is_some());
}
