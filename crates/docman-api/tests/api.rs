//! Router-level tests driving the full API through `tower::ServiceExt::oneshot`

use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use docman_api::{AppState, MasterAccount, create_router, ensure_master};
use docman_auth::{JwtManager, PasswordManager, PasswordParams};
use docman_db::Database;
use docman_storage::{LocalStorage, StorageBackend};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const BOUNDARY: &str = "docman-test-boundary";

struct TestApp {
    router: Router,
    jwt: Arc<JwtManager>,
    dir: TempDir,
}

async fn setup() -> TestApp {
    let dir = TempDir::new().unwrap();
    let db = Database::new("sqlite::memory:").await.unwrap();
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let jwt = Arc::new(
        JwtManager::new("integration-secret", Duration::minutes(15), Duration::days(7)).unwrap(),
    );
    let passwords = Arc::new(
        PasswordManager::new(PasswordParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap(),
    );

    let state = AppState::new(db, storage, jwt.clone(), passwords, 1024 * 1024);
    let created = ensure_master(
        &state,
        &MasterAccount {
            name: "master".to_string(),
            email: "master@email.com".to_string(),
            password: "copa2026".to_string(),
        },
    )
    .await
    .unwrap();
    assert!(created);

    TestApp {
        router: create_router(state, None),
        jwt,
        dir,
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Reply {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        headers,
        body,
    }
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, token);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn multipart_request(method: Method, uri: &str, token: &str, parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn login(app: &TestApp, handle: &str, password: &str) -> Reply {
    send(
        app,
        request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "username_or_email": handle, "password": password })),
        ),
    )
    .await
}

async fn access_token(app: &TestApp, handle: &str, password: &str) -> String {
    let reply = login(app, handle, password).await;
    assert_eq!(reply.status, StatusCode::OK);
    reply.json()["access_token"].as_str().unwrap().to_string()
}

async fn sign_up(app: &TestApp, name: &str) -> Value {
    let reply = send(
        app,
        request(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "name": name,
                "email": format!("{}@example.com", name),
                "password": "password123",
            })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    reply.json()
}

/// Files under the sharded `documents/` tree
fn stored_file_count(app: &TestApp) -> usize {
    std::fs::read_dir(app.dir.path().join("documents"))
        .unwrap()
        .flat_map(|shard| std::fs::read_dir(shard.unwrap().path()).unwrap())
        .count()
}

#[tokio::test]
async fn test_login_as_seeded_master() {
    let app = setup().await;

    let reply = login(&app, "master", "copa2026").await;
    assert_eq!(reply.status, StatusCode::OK);

    let body = reply.json();
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["master"], true);
    assert_eq!(body["user"]["name"], "master");
    assert!(body["user"].get("password_hash").is_none());

    let access = body["access_token"].as_str().unwrap();
    let refresh = body["refresh_token"].as_str().unwrap();
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_ne!(access, refresh);

    let by_email = login(&app, "master@email.com", "copa2026").await;
    assert_eq!(by_email.status, StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
    let app = setup().await;

    let wrong_password = login(&app, "master", "not-the-password").await;
    let unknown_user = login(&app, "nobody", "not-the-password").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(wrong_password.json(), json!({ "error": "Invalid credentials" }));
}

#[tokio::test]
async fn test_login_rejects_malformed_input() {
    let app = setup().await;

    let reply = send(
        &app,
        request(Method::POST, "/login", None, Some(json!({ "username": "master" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json(), json!({ "error": "Invalid data" }));

    let long_password = "x".repeat(300);
    let reply = login(&app, "master", &long_password).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_flow() {
    let app = setup().await;
    let body = login(&app, "master", "copa2026").await.json();
    let refresh = body["refresh_token"].as_str().unwrap();

    let reply = send(
        &app,
        request(
            Method::POST,
            "/refresh-token",
            None,
            Some(json!({ "refresh_token": refresh })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let access = reply.json()["access_token"].as_str().unwrap().to_string();

    let claims = app.jwt.validate_access_token(&access).unwrap();
    assert!(claims.is_master);

    let original = app
        .jwt
        .validate_access_token(body["access_token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.user_id, original.user_id);
    assert!(claims.exp > original.exp);

    let reply = send(&app, request(Method::GET, "/users", Some(&access), None)).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejections() {
    let app = setup().await;

    let reply = send(
        &app,
        request(
            Method::POST,
            "/refresh-token",
            None,
            Some(json!({ "refresh_token": "garbage" })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json(), json!({ "error": "Invalid token" }));

    let stale = app
        .jwt
        .issue_pair_at(Uuid::new_v4(), true, Utc::now() - Duration::days(8))
        .unwrap();
    let reply = send(
        &app,
        request(
            Method::POST,
            "/refresh-token",
            None,
            Some(json!({ "refresh_token": stale.refresh_token })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = send(
        &app,
        request(Method::POST, "/refresh-token", None, Some(json!({}))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json(), json!({ "error": "Invalid data" }));
}

#[tokio::test]
async fn test_guard_responses() {
    let app = setup().await;

    let reply = send(&app, request(Method::GET, "/users", None, None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json(), json!({ "message": "Missing token" }));

    let reply = send(&app, request(Method::GET, "/documents", Some("not-a-jwt"), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json(), json!({ "error": "Invalid token" }));

    let token = access_token(&app, "master", "copa2026").await;
    let bearer = format!("Bearer {}", token);
    let reply = send(&app, request(Method::GET, "/users", Some(&bearer), None)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let expired = app
        .jwt
        .issue_pair_at(Uuid::new_v4(), true, Utc::now() - Duration::hours(1))
        .unwrap();
    let reply = send(
        &app,
        request(Method::GET, "/users", Some(&expired.access_token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json(), json!({ "error": "Invalid token" }));
}

#[tokio::test]
async fn test_master_guard() {
    let app = setup().await;
    sign_up(&app, "alice").await;
    let alice = access_token(&app, "alice", "password123").await;
    let master = access_token(&app, "master", "copa2026").await;

    let new_master = json!({
        "name": "admin",
        "email": "admin@example.com",
        "password": "password123",
    });

    let reply = send(
        &app,
        request(Method::POST, "/usersMaster", Some(&alice), Some(new_master.clone())),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json(), json!({ "error": "Insufficient permissions" }));

    let reply = send(
        &app,
        request(Method::POST, "/usersMaster", Some(&master), Some(new_master)),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json()["master"], true);
}

#[tokio::test]
async fn test_sign_up_validation_and_conflicts() {
    let app = setup().await;
    sign_up(&app, "alice").await;

    let duplicate = send(
        &app,
        request(
            Method::POST,
            "/users",
            None,
            Some(json!({ "name": "alice", "email": "other@example.com", "password": "password123" })),
        ),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let short_password = send(
        &app,
        request(
            Method::POST,
            "/users",
            None,
            Some(json!({ "name": "bob", "email": "bob@example.com", "password": "short" })),
        ),
    )
    .await;
    assert_eq!(short_password.status, StatusCode::BAD_REQUEST);

    let bad_email = send(
        &app,
        request(
            Method::POST,
            "/users",
            None,
            Some(json!({ "name": "bob", "email": "bob.example.com", "password": "password123" })),
        ),
    )
    .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_listing_and_updates() {
    let app = setup().await;
    let alice = sign_up(&app, "alice").await;
    let bob = sign_up(&app, "bob").await;
    let alice_token = access_token(&app, "alice", "password123").await;

    let reply = send(
        &app,
        request(Method::GET, "/users?sort=name&dir=desc&limit=2", Some(&alice_token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["users"][0]["name"], "master");
    assert_eq!(body["users"][1]["name"], "bob");

    let reply = send(&app, request(Method::GET, "/users?start=abc", Some(&alice_token), None)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json(), json!({ "error": "Invalid 'start' parameter" }));

    let bob_uri = format!("/users/{}", bob["id"].as_str().unwrap());
    let reply = send(
        &app,
        request(Method::PUT, &bob_uri, Some(&alice_token), Some(json!({ "name": "mallory" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let alice_uri = format!("/users/{}", alice["id"].as_str().unwrap());
    let reply = send(&app, request(Method::PUT, &alice_uri, Some(&alice_token), Some(json!({})))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(
        &app,
        request(
            Method::PUT,
            &alice_uri,
            Some(&alice_token),
            Some(json!({ "password": "a-brand-new-password" })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["message"], "User updated successfully");
    assert_eq!(
        login(&app, "alice", "password123").await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&app, "alice", "a-brand-new-password").await.status,
        StatusCode::OK
    );

    let reply = send(&app, request(Method::GET, "/users/not-a-uuid", Some(&alice_token), None)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_master_accounts_survive_deletion_attempts() {
    let app = setup().await;
    let master_token = access_token(&app, "master", "copa2026").await;
    let master_id = app.jwt.validate_access_token(&master_token).unwrap().user_id;

    let reply = send(
        &app,
        request(Method::DELETE, &format!("/users/{}", master_id), Some(&master_token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json(), json!({ "error": "You cannot delete a user master" }));

    let reply = send(
        &app,
        request(
            Method::DELETE,
            &format!("/usersMaster/{}", master_id),
            Some(&master_token),
            None,
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = send(
        &app,
        request(
            Method::POST,
            "/usersMaster",
            Some(&master_token),
            Some(json!({ "name": "admin", "email": "admin@example.com", "password": "password123" })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = send(
        &app,
        request(
            Method::DELETE,
            &format!("/usersMaster/{}", master_id),
            Some(&master_token),
            None,
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_document_lifecycle() {
    let app = setup().await;
    sign_up(&app, "alice").await;
    sign_up(&app, "bob").await;
    let alice = access_token(&app, "alice", "password123").await;
    let bob = access_token(&app, "bob", "password123").await;

    let reply = send(
        &app,
        multipart_request(
            Method::POST,
            "/documents/upload",
            &alice,
            &[
                ("title", None, "Quarterly report"),
                ("description", None, "Q3 numbers"),
                ("file", Some("report.pdf"), "%PDF-1.4 fake"),
            ],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let doc = reply.json();
    assert_eq!(doc["title"], "Quarterly report");
    assert_eq!(doc["owner_name"], "alice");
    assert_eq!(doc["content_type"], "application/pdf");
    assert_eq!(doc["size"], 13);
    assert_eq!(doc["size_human"], "13 B");
    let id = doc["id"].as_str().unwrap().to_string();

    let reply = send(
        &app,
        request(Method::GET, &format!("/documents/file/{}", id), Some(&bob), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Bytes::from_static(b"%PDF-1.4 fake"));
    assert_eq!(reply.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(reply.headers[header::CONTENT_LENGTH], "13");
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.pdf\""
    );

    let reply = send(&app, request(Method::GET, "/documents?sort=title", Some(&bob), None)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["total"], 1);

    let doc_uri = format!("/documents/{}", id);
    let reply = send(
        &app,
        request(Method::PUT, &doc_uri, Some(&bob), Some(json!({ "title": "mine now" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(
        &app,
        request(Method::PUT, &doc_uri, Some(&alice), Some(json!({ "title": "Q3 report" }))),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["document"]["title"], "Q3 report");

    let reply = send(
        &app,
        multipart_request(
            Method::PUT,
            &format!("/documents/upload/{}", id),
            &alice,
            &[("file", Some("report.txt"), "plain text now")],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let updated = reply.json();
    assert_eq!(updated["document"]["file_name"], "report.txt");
    assert_eq!(updated["document"]["content_type"], "text/plain");
    assert_eq!(updated["document"]["title"], "Q3 report");

    let reply = send(&app, request(Method::DELETE, &doc_uri, Some(&bob), None)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(&app, request(Method::DELETE, &doc_uri, Some(&alice), None)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(&app, request(Method::GET, &doc_uri, Some(&alice), None)).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_requires_title_and_file() {
    let app = setup().await;
    let token = access_token(&app, "master", "copa2026").await;

    let reply = send(
        &app,
        multipart_request(
            Method::POST,
            "/documents/upload",
            &token,
            &[("file", Some("notes.txt"), "orphan")],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json(), json!({ "error": "Title is required" }));

    let reply = send(
        &app,
        multipart_request(Method::POST, "/documents/upload", &token, &[("title", None, "no file")]),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(&app, request(Method::GET, "/documents", Some(&token), None)).await;
    assert_eq!(reply.json()["total"], 0);

    assert_eq!(stored_file_count(&app), 0);
}

#[tokio::test]
async fn test_rejected_replace_keeps_stored_file() {
    let app = setup().await;
    let token = access_token(&app, "master", "copa2026").await;

    let reply = send(
        &app,
        multipart_request(
            Method::POST,
            "/documents/upload",
            &token,
            &[("title", None, "Contract"), ("file", Some("a.txt"), "original-bytes")],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let id = reply.json()["id"].as_str().unwrap().to_string();
    let replace_uri = format!("/documents/upload/{}", id);

    // Title arrives after the file has already been streamed
    let reply = send(
        &app,
        multipart_request(
            Method::PUT,
            &replace_uri,
            &token,
            &[("file", Some("b.txt"), "REPLACED"), ("title", None, "")],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json(), json!({ "error": "Title cannot be empty" }));

    let reply = send(
        &app,
        multipart_request(Method::PUT, &replace_uri, &token, &[("title", None, "no file")]),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = send(
        &app,
        request(Method::GET, &format!("/documents/{}", id), Some(&token), None),
    )
    .await;
    let doc = reply.json();
    assert_eq!(doc["title"], "Contract");
    assert_eq!(doc["file_name"], "a.txt");
    assert_eq!(doc["size"], 14);

    let reply = send(
        &app,
        request(Method::GET, &format!("/documents/file/{}", id), Some(&token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Bytes::from_static(b"original-bytes"));
    assert_eq!(stored_file_count(&app), 1);

    let reply = send(
        &app,
        multipart_request(
            Method::PUT,
            &replace_uri,
            &token,
            &[("title", None, "Contract v2"), ("file", Some("b.txt"), "REPLACED")],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let doc = reply.json();
    assert_eq!(doc["document"]["title"], "Contract v2");
    assert_eq!(doc["document"]["file_name"], "b.txt");
    assert_eq!(doc["document"]["size"], 8);

    let reply = send(
        &app,
        request(Method::GET, &format!("/documents/file/{}", id), Some(&token), None),
    )
    .await;
    assert_eq!(reply.body, Bytes::from_static(b"REPLACED"));
    assert_eq!(stored_file_count(&app), 1);
}

#[tokio::test]
async fn test_download_of_missing_file() {
    let app = setup().await;
    let token = access_token(&app, "master", "copa2026").await;

    let reply = send(
        &app,
        multipart_request(
            Method::POST,
            "/documents/upload",
            &token,
            &[("title", None, "Scan"), ("file", Some("scan.png"), "PNG-data")],
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let id = reply.json()["id"].as_str().unwrap().to_string();

    std::fs::remove_file(app.dir.path().join("documents").join(&id[..2]).join(&id)).unwrap();

    let reply = send(
        &app,
        request(Method::GET, &format!("/documents/file/{}", id), Some(&token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json(), json!({ "error": "File not found" }));

    let reply = send(
        &app,
        request(Method::DELETE, &format!("/documents/{}", id), Some(&token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    for path in ["/health", "/healthz"] {
        let reply = send(&app, request(Method::GET, path, None, None)).await;
        assert_eq!(reply.status, StatusCode::OK);
        let body = reply.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
