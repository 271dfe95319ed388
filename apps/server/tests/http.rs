use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use pixhost_domain::config::AppConfig;
use pixhost_server::Server;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "pixhost-test-boundary";

async fn app_with(temp: &TempDir, api_keys: &[&str]) -> Router {
    let mut cfg = AppConfig::default();
    cfg.storage.root = temp.path().join("uploads");
    cfg.storage.snapshot_dir = temp.path().join("backups");
    cfg.storage.max_file_size = 1024;
    cfg.server.public_url = Some("https://img.example.com/".to_owned());
    cfg.security.api_keys = api_keys.iter().map(|&k| k.to_owned()).collect();

    Server::builder().config(cfg).build().await.unwrap().app()
}

fn multipart(filename: &str, data: &[u8], folder: Option<&str>) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
    if let Some(folder) = folder {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"folder\"\r\n\r\n{folder}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload_request(filename: &str, data: &[u8], folder: Option<&str>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(multipart(filename, data, folder))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn raw_body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &["secret"]).await;

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn protected_routes_require_a_key() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &["secret"]).await;

    let missing = app.clone().oneshot(get("/list")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(missing).await["code"], "unauthorized");

    let wrong = app
        .clone()
        .oneshot(Request::builder().uri("/list").header("X-API-Key", "nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let header_ok = app
        .clone()
        .oneshot(Request::builder().uri("/list").header("X-API-Key", "secret").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(header_ok.status(), StatusCode::OK);

    let query_ok = app.oneshot(get("/list?api_key=secret")).await.unwrap();
    assert_eq!(query_ok.status(), StatusCode::OK);
}

#[tokio::test]
async fn upload_then_fetch_round_trip() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &[]).await;
    let payload = vec![7u8; 50];

    let response = app.clone().oneshot(upload_request("photo.PNG", &payload, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let filename = body["filename"].as_str().unwrap().to_owned();
    assert!(filename.ends_with(".png"));
    assert_eq!(body["folder"], "default");
    assert_eq!(body["size"], 50);
    assert_eq!(body["url"], format!("https://img.example.com/image/default/{filename}"));

    let fetched = app.oneshot(get(&format!("/image/default/{filename}"))).await.unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(fetched.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(raw_body(fetched).await, payload);
}

#[tokio::test]
async fn upload_validation_maps_to_client_errors() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &[]).await;

    let bad_type = app.clone().oneshot(upload_request("run.exe", b"MZ", None)).await.unwrap();
    assert_eq!(bad_type.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(bad_type).await["code"], "unsupported_type");

    let too_big = app.clone().oneshot(upload_request("a.png", &[0u8; 2048], None)).await.unwrap();
    assert_eq!(too_big.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(too_big).await["code"], "size_limit");

    let missing = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/upload")
                .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
                .body(Body::from(format!("--{BOUNDARY}--\r\n")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(missing).await["code"], "bad_request");
}

#[tokio::test]
async fn missing_image_is_not_found() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &[]).await;

    let response = app.oneshot(get("/image/nothing.png")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "not_found");
}

#[tokio::test]
async fn move_conflict_and_success() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &[]).await;

    let uploaded = json_body(app.clone().oneshot(upload_request("a.gif", b"gif", Some("src"))).await.unwrap()).await;
    let filename = uploaded["filename"].as_str().unwrap();

    let move_request = |target: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/move")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "filename": filename, "sourceFolder": "src", "targetFolder": target }).to_string(),
            ))
            .unwrap()
    };

    let moved = app.clone().oneshot(move_request("dst")).await.unwrap();
    assert_eq!(moved.status(), StatusCode::OK);
    assert_eq!(json_body(moved).await["folder"], "dst");

    let gone = app.oneshot(move_request("dst")).await.unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_endpoints() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &[]).await;
    let first = json_body(app.clone().oneshot(upload_request("a.png", b"1", Some("x"))).await.unwrap()).await;
    app.clone().oneshot(upload_request("b.png", b"2", Some("y"))).await.unwrap();

    let one = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/delete/{}", first["filename"].as_str().unwrap()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(one.status(), StatusCode::OK);

    let all = app
        .oneshot(Request::builder().method(Method::DELETE).uri("/files").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let report = json_body(all).await;
    assert_eq!(report["deleted"], 1);
    assert_eq!(report["success"], true);
}

#[tokio::test]
async fn backup_download_and_restore() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &[]).await;
    app.clone().oneshot(upload_request("a.png", b"keep me", Some("x"))).await.unwrap();

    let created = app
        .clone()
        .oneshot(Request::builder().method(Method::POST).uri("/backup").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::OK);
    let created = json_body(created).await;
    let id = created["id"].as_str().unwrap().to_owned();
    assert_eq!(created["url"], format!("https://img.example.com/backup/{id}"));

    let listed = json_body(app.clone().oneshot(get("/backups")).await.unwrap()).await;
    assert_eq!(listed["total"], 1);

    let archive = raw_body(app.clone().oneshot(get(&format!("/backup/{id}"))).await.unwrap()).await;
    assert!(archive.starts_with(b"PK"));

    let restored = app
        .clone()
        .oneshot(Request::builder().method(Method::POST).uri("/restore?clear=true").body(Body::from(archive)).unwrap())
        .await
        .unwrap();
    assert_eq!(restored.status(), StatusCode::OK);
    assert_eq!(json_body(restored).await["restored"], 1);

    let corrupt = app
        .oneshot(
            Request::builder().method(Method::POST).uri("/restore").body(Body::from(&b"not a zip"[..])).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(corrupt.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(corrupt).await["code"], "bad_archive");
}

#[tokio::test]
async fn config_reports_policy() {
    let temp = TempDir::new().unwrap();
    let app = app_with(&temp, &["k"]).await;

    let body = json_body(app.oneshot(get("/config?api_key=k")).await.unwrap()).await;

    assert_eq!(body["maxFileSize"], 1024);
    assert_eq!(body["hasApiKeys"], true);
    assert!(body["allowedExtensions"].as_array().unwrap().iter().any(|e| e == "png"));
}
