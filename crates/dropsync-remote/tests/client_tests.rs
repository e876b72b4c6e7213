//! HTTP transport tests against a mock Dropbox API.

use dropsync_config::{AccessToken, RemoteConfig};
use dropsync_remote::DropboxClient;
use dropsync_types::{
    DeleteOutcome, Error, RemoteEntryKind, RetryConfig, SyncPath, Transport, WriteMode,
};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, root: &str) -> RemoteConfig {
    RemoteConfig {
        api_url: server.uri(),
        content_url: server.uri(),
        root: root.to_string(),
        retry: RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            backoff_multiplier: 2.0,
        },
        ..RemoteConfig::default()
    }
}

fn client(server: &MockServer) -> DropboxClient {
    DropboxClient::new(AccessToken::new("secret-token"), &config(server, "")).unwrap()
}

fn file_json(path: &str, rev: &str, size: u64) -> serde_json::Value {
    json!({
        ".tag": "file",
        "name": path.rsplit('/').next().unwrap(),
        "path_display": path,
        "id": format!("id:{path}"),
        "rev": rev,
        "size": size,
        "server_modified": "2024-05-01T10:00:00Z",
        "content_hash": "hash"
    })
}

fn folder_json(path: &str) -> serde_json::Value {
    json!({
        ".tag": "folder",
        "name": path.rsplit('/').next().unwrap(),
        "path_display": path,
        "id": format!("id:{path}")
    })
}

fn summary(text: &str) -> serde_json::Value {
    json!({ "error_summary": text, "error": {} })
}

// =============================================================================
// Listing
// =============================================================================

mod listing {
    use super::*;

    #[tokio::test]
    async fn test_follows_cursor_pages() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .and(header("authorization", "Bearer secret-token"))
            .and(body_partial_json(json!({ "path": "", "recursive": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [folder_json("/Docs"), file_json("/Docs/a.txt", "01", 3)],
                "cursor": "page-2",
                "has_more": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .and(body_partial_json(json!({ "cursor": "page-2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [
                    file_json("/b.txt", "02", 1),
                    { ".tag": "deleted", "name": "old.txt", "path_display": "/old.txt" }
                ],
                "cursor": "page-3",
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let entries = client(&server).list_folder(&SyncPath::root()).await.unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Docs", "Docs/a.txt", "b.txt", "old.txt"]);
        assert!(matches!(entries[0].kind, RemoteEntryKind::Folder(_)));
        match &entries[1].kind {
            RemoteEntryKind::File(meta) => {
                assert_eq!(meta.rev, "01");
                assert_eq!(meta.size, 3);
            }
            other => panic!("expected a file, got {other:?}"),
        }
        assert!(matches!(entries[3].kind, RemoteEntryKind::Deleted));
    }

    #[tokio::test]
    async fn test_paths_are_relative_to_remote_root() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .and(body_partial_json(json!({ "path": "/Team" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [folder_json("/Team"), file_json("/team/Notes/a.txt", "01", 1)],
                "cursor": "c",
                "has_more": false
            })))
            .mount(&server)
            .await;

        let client =
            DropboxClient::new(AccessToken::new("t"), &config(&server, "/Team")).unwrap();
        let entries = client.list_folder(&SyncPath::root()).await.unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["", "Notes/a.txt"]);
    }
}

// =============================================================================
// Content transfers
// =============================================================================

mod transfers {
    use super::*;

    #[tokio::test]
    async fn test_download_writes_file_and_returns_metadata() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/2/files/download"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "Dropbox-API-Result",
                        file_json("/a.txt", "0a1", 5).to_string().as_str(),
                    )
                    .set_body_bytes(b"hello".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let local = dir.path().join("a.txt");
        let meta = client(&server)
            .download_to_file(&SyncPath::new("a.txt"), &local)
            .await
            .unwrap();

        assert_eq!(meta.rev, "0a1");
        assert_eq!(std::fs::read(&local).unwrap(), b"hello");
        assert!(!dir.path().join("a.txt.dropsync-part").exists());

        let requests = server.received_requests().await.unwrap();
        let arg = requests[0].headers.get("Dropbox-API-Arg").unwrap();
        assert_eq!(arg.to_str().unwrap(), r#"{"path":"/a.txt"}"#);
    }

    #[tokio::test]
    async fn test_download_missing_is_error_and_leaves_no_file() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/2/files/download"))
            .respond_with(ResponseTemplate::new(409).set_body_json(summary("path/not_found/..")))
            .mount(&server)
            .await;

        let local = dir.path().join("gone.txt");
        let err = client(&server)
            .download_to_file(&SyncPath::new("gone.txt"), &local)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Remote { status: 409, ref summary } if summary.starts_with("path/not_found")));
        assert!(!local.exists());
    }

    #[tokio::test]
    async fn test_upload_sends_overwrite_mode_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/upload"))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_json("/docs/b.txt", "0b2", 4)))
            .expect(1)
            .mount(&server)
            .await;

        let meta = client(&server)
            .upload_file(b"data".to_vec(), &SyncPath::new("docs/b.txt"), WriteMode::Overwrite)
            .await
            .unwrap();
        assert_eq!(meta.rev, "0b2");
        assert_eq!(meta.size, 4);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].body, b"data");
        let arg: serde_json::Value = serde_json::from_str(
            requests[0]
                .headers
                .get("Dropbox-API-Arg")
                .unwrap()
                .to_str()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(arg["path"], "/docs/b.txt");
        assert_eq!(arg["mode"][".tag"], "overwrite");
        assert_eq!(arg["autorename"], false);
    }
}

// =============================================================================
// Folder and delete operations
// =============================================================================

mod folders {
    use super::*;

    #[tokio::test]
    async fn test_create_folder_returns_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .and(body_partial_json(json!({ "path": "/docs", "autorename": false })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "metadata": folder_json("/docs") })),
            )
            .mount(&server)
            .await;

        let meta = client(&server)
            .create_folder(&SyncPath::new("docs"))
            .await
            .unwrap();
        assert_eq!(meta.id.as_deref(), Some("id:/docs"));
    }

    #[tokio::test]
    async fn test_existing_folder_is_looked_up() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(summary("path/conflict/folder/..")),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/get_metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(folder_json("/docs")))
            .expect(1)
            .mount(&server)
            .await;

        let meta = client(&server)
            .create_folder(&SyncPath::new("docs"))
            .await
            .unwrap();
        assert_eq!(meta.id.as_deref(), Some("id:/docs"));
    }

    #[tokio::test]
    async fn test_delete_not_found_is_already_absent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(summary("path_lookup/not_found/...")),
            )
            .mount(&server)
            .await;

        let outcome = client(&server).delete(&SyncPath::new("x")).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
    }

    #[tokio::test]
    async fn test_delete_other_conflict_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(summary("path_lookup/restricted_content/")),
            )
            .mount(&server)
            .await;

        let err = client(&server).delete(&SyncPath::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::Remote { status: 409, .. }));
    }
}

// =============================================================================
// Error mapping and retries
// =============================================================================

mod errors {
    use super::*;

    #[tokio::test]
    async fn test_unauthorized_is_auth_error_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(summary("invalid_access_token/..")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .list_folder(&SyncPath::root())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
        assert!(!err.should_retry());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "metadata": file_json("/x", "1", 1) })),
            )
            .mount(&server)
            .await;

        let outcome = client(&server).delete(&SyncPath::new("x")).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_honours_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "metadata": folder_json("/d") })),
            )
            .mount(&server)
            .await;

        let meta = client(&server).create_folder(&SyncPath::new("d")).await.unwrap();
        assert_eq!(meta.id.as_deref(), Some("id:/d"));
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server)
            .list_folder(&SyncPath::root())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: 500, .. }));
    }
}
