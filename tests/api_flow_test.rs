use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

use storyvault::api::{create_router, AppState};
use storyvault::config::{AppConfig, CloudSection, StorageSection};
use storyvault::mode::Environment;
use storyvault::setup::sample_audio_bytes;
use storyvault::storage::local::LocalStorage;
use storyvault::storage::StorageBackend;
use storyvault::streaming::STREAM_CHUNK_SIZE;

const BOUNDARY: &str = "storyvault-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
    samples: TempDir,
    _bucket: Option<TempDir>,
}

impl TestApp {
    fn local() -> Self {
        Self::build(|_| {}, false)
    }

    fn cloud() -> Self {
        Self::build(
            |config| {
                config.cloud = CloudSection {
                    bucket: Some("stories-bucket".into()),
                    region: Some("eu-west-1".into()),
                    access_key_id: Some("AKIA".into()),
                    secret_access_key: Some("secret".into()),
                    ..Default::default()
                };
            },
            true,
        )
    }

    fn build(configure: impl FnOnce(&mut AppConfig), with_store: bool) -> Self {
        let samples = TempDir::new().unwrap();
        let mut config = AppConfig {
            storage: StorageSection {
                samples_dir: samples.path().to_string_lossy().into_owned(),
                ..Default::default()
            },
            ..Default::default()
        };
        configure(&mut config);

        let (bucket, store) = if with_store {
            let bucket = TempDir::new().unwrap();
            let store: Arc<dyn StorageBackend> = Arc::new(
                LocalStorage::new(bucket.path(), "https://stories-bucket.example").unwrap(),
            );
            (Some(bucket), Some(store))
        } else {
            (None, None)
        };

        let state = AppState::new(&config, store);
        Self {
            router: create_router(state.clone()),
            state,
            samples,
            _bucket: bucket,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn get_range(&self, uri: &str, range: &str) -> Response {
        self.send(
            Request::builder()
                .uri(uri)
                .header(header::HOST, "localhost:3000")
                .header(header::RANGE, range)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    fn write_sample(&self, name: &str, data: &[u8]) {
        std::fs::write(self.samples.path().join(name), data).unwrap();
    }
}

fn multipart_upload(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::HOST, "localhost:3000")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_reports_service() {
    let app = TestApp::local();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::HeaderName::from_static("x-content-type-options")), "nosniff");

    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["service"], "Bedtime Story Player Backend");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn upload_list_and_stream_round_trip() {
    let app = TestApp::local();

    let response = app
        .send(multipart_upload("story", "story.txt", "text/plain", b"Once upon a time"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "File uploaded successfully");
    assert_eq!(json["data"]["fileName"], "story.txt");
    assert_eq!(json["data"]["fileSize"], 16);
    assert_eq!(json["data"]["fileType"], "text/plain");
    assert_eq!(json["data"]["storageKey"], "stories/local/story.txt");
    assert_eq!(json["data"]["location"], "http://localhost:3000/file/story.txt");
    assert_eq!(json["data"]["testMode"], true);

    let response = app.get("/stories").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["testMode"], true);
    assert_eq!(json["totalCount"], 1);
    assert_eq!(json["stories"][0]["fileName"], "story.txt");
    assert_eq!(json["stories"][0]["category"], "text");

    let response = app.get("/file/story.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "text/plain");
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), "bytes");
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "16");
    assert_eq!(body_bytes(response).await, b"Once upon a time");
}

#[tokio::test]
async fn duplicate_uploads_get_numbered_names() {
    let app = TestApp::local();

    for expected in ["moon.mp3", "moon-1.mp3", "moon-2.mp3"] {
        let response = app
            .send(multipart_upload("story", "moon.mp3", "audio/mpeg", b"ID3"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["fileName"], expected);
    }

    let json = body_json(app.get("/stories").await).await;
    assert_eq!(json["totalCount"], 3);
}

#[tokio::test]
async fn generic_binary_type_is_corrected_from_extension() {
    let app = TestApp::local();
    let response = app
        .send(multipart_upload(
            "story",
            "voice.m4a",
            "application/octet-stream",
            b"audio",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["fileType"], "audio/m4a");
}

#[tokio::test]
async fn range_requests_are_clamped() {
    let app = TestApp::local();
    let data: Vec<u8> = (0..100u8).collect();
    app.write_sample("bedtime.mp3", &data);

    let response = app.get_range("/file/bedtime.mp3", "bytes=10-19").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes 10-19/100");
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "10");
    assert_eq!(header_str(&response, header::CONTENT_TYPE), "audio/mpeg");
    assert_eq!(body_bytes(response).await, &data[10..20]);

    let response = app.get_range("/file/bedtime.mp3", "bytes=90-500").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes 90-99/100");
    assert_eq!(body_bytes(response).await, &data[90..]);

    let response = app.get_range("/file/bedtime.mp3", "bytes=-5").await;
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes 95-99/100");
    assert_eq!(body_bytes(response).await, &data[95..]);

    let response = app.get_range("/file/bedtime.mp3", "bytes=0-1,4-5").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MULTIPLE_RANGES_UNSUPPORTED");

    let response = app.get_range("/file/bedtime.mp3", "bytes=abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_RANGE");
}

#[tokio::test]
async fn large_files_stream_in_bounded_chunks() {
    let app = TestApp::local();
    let data = sample_audio_bytes();
    assert!(data.len() > STREAM_CHUNK_SIZE);
    app.write_sample("sample-audio.mp3", &data);

    let response = app.get("/file/sample-audio.mp3").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::CONTENT_LENGTH),
        data.len().to_string()
    );

    let mut body = response.into_body();
    let mut received = Vec::new();
    let mut frames = 0;
    while let Some(frame) = body.frame().await {
        let Ok(chunk) = frame.unwrap().into_data() else {
            continue;
        };
        assert!(chunk.len() <= STREAM_CHUNK_SIZE, "frame of {} bytes", chunk.len());
        received.extend_from_slice(&chunk);
        frames += 1;
    }
    assert!(frames >= 2, "expected several frames, got {frames}");
    assert_eq!(received, data);

    let response = app.get_range("/file/sample-audio.mp3", "bytes=65530-65545").await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        format!("bytes 65530-65545/{}", data.len())
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), "16");
    assert_eq!(body_bytes(response).await, &data[65530..=65545]);

    let tail_start = data.len() - 100;
    let response = app
        .get_range("/file/sample-audio.mp3", &format!("bytes={tail_start}-"))
        .await;
    assert_eq!(body_bytes(response).await, &data[tail_start..]);
}

#[tokio::test]
async fn empty_file_range_is_not_satisfiable() {
    let app = TestApp::local();
    app.write_sample("empty.txt", b"");

    let response = app.get("/file/empty.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    let response = app.get_range("/file/empty.txt", "bytes=0-").await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), "bytes */0");
}

#[tokio::test]
async fn encoded_names_are_decoded_once() {
    let app = TestApp::local();
    app.write_sample("good night.txt", b"sleep");
    app.write_sample("100%25.txt", b"literal");

    let response = app.get("/file/good%20night.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"sleep");

    let response = app.get("/file/100%2525.txt").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"literal");
}

#[tokio::test]
async fn traversal_attempts_are_forbidden() {
    let app = TestApp::local();

    for uri in [
        "/file/..%2F..%2Fetc%2Fpasswd",
        "/file/%2e%2e%2fsecret.txt",
        "/file/..%5C..%5Cwindows",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "PATH_TRAVERSAL");
    }
}

#[tokio::test]
async fn unencoded_dot_segments_never_reach_the_file_route() {
    let app = TestApp::local();
    let response = app.get("/file/../../etc/passwd").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["message"], "The requested endpoint does not exist");
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let app = TestApp::local();
    let response = app.get("/file/nope.mp3").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn empty_samples_directory_lists_nothing() {
    let app = TestApp::local();
    let json = body_json(app.get("/stories").await).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["totalCount"], 0);
    assert_eq!(json["stories"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn rejected_uploads() {
    let app = TestApp::local();

    let response = app
        .send(multipart_upload("story", "photo.png", "image/png", b"png"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_FILE_TYPE");
    assert!(json["message"].as_str().unwrap().contains("image/png"));

    let response = app
        .send(multipart_upload("attachment", "story.txt", "text/plain", b"hi"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "NO_FILE");

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/upload")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_UPLOAD");

    let json = body_json(app.get("/stories").await).await;
    assert_eq!(json["totalCount"], 0);
}

#[tokio::test]
async fn oversize_upload_is_rejected() {
    let app = TestApp::build(|config| config.storage.max_upload_bytes = 16, false);

    let response = app
        .send(multipart_upload("story", "long.txt", "text/plain", &[b'z'; 32]))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["code"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn tunnel_hosts_get_https_locations() {
    let app = TestApp::local();
    let mut request = multipart_upload("story", "story.txt", "text/plain", b"hi");
    request.headers_mut().insert(
        header::HOST,
        "quiet-owl.ngrok-free.app".parse().unwrap(),
    );

    let json = body_json(app.send(request).await).await;
    assert_eq!(
        json["data"]["location"],
        "https://quiet-owl.ngrok-free.app/file/story.txt"
    );
}

#[tokio::test]
async fn cloud_mode_uploads_to_object_store() {
    let app = TestApp::cloud();

    let response = app
        .send(multipart_upload("story", "lullaby.mp3", "audio/mpeg", b"ID3-audio"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["testMode"], false);
    assert_eq!(json["data"]["fileName"], "lullaby.mp3");
    let key = json["data"]["storageKey"].as_str().unwrap().to_string();
    assert!(key.starts_with("stories/audio/"), "{key}");
    assert!(key.ends_with("-lullaby.mp3"), "{key}");
    assert_eq!(
        json["data"]["location"],
        format!("https://stories-bucket.example/{key}")
    );

    let json = body_json(app.get("/stories").await).await;
    assert_eq!(json["testMode"], false);
    assert_eq!(json["totalCount"], 1);
    assert_eq!(json["stories"][0]["fileName"], "lullaby.mp3");
    assert_eq!(json["stories"][0]["category"], "audio");
    assert_eq!(json["stories"][0]["storageKey"], key);

    // Nothing landed in the samples directory.
    assert_eq!(std::fs::read_dir(app.samples.path()).unwrap().count(), 0);

    let response = app.get("/file/lullaby.mp3").await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body_json(response).await["code"], "NOT_IMPLEMENTED");
}

#[tokio::test]
async fn force_flag_applies_on_next_request() {
    let app = TestApp::cloud();
    assert_eq!(body_json(app.get("/stories").await).await["testMode"], false);

    app.state.settings.set_force_test_mode(true).await;
    assert_eq!(body_json(app.get("/stories").await).await["testMode"], true);

    app.state.settings.set_force_test_mode(false).await;
    assert_eq!(body_json(app.get("/stories").await).await["testMode"], false);
}

#[tokio::test]
async fn production_without_credentials_is_configuration_error() {
    let app = TestApp::build(|config| config.mode.environment = Environment::Production, false);

    let response = app
        .send(multipart_upload("story", "story.txt", "text/plain", b"hi"))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFIGURATION_ERROR");
    assert_eq!(json["success"], false);

    let response = app.get("/stories").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn file_route_exposes_range_headers_to_any_origin() {
    let app = TestApp::local();
    app.write_sample("story.txt", b"hello");

    let response = app
        .send(
            Request::builder()
                .uri("/file/story.txt")
                .header(header::ORIGIN, "http://player.example")
                .header(header::RANGE, "bytes=0-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    let exposed = header_str(&response, header::ACCESS_CONTROL_EXPOSE_HEADERS).to_ascii_lowercase();
    assert!(exposed.contains("content-range"), "{exposed}");
    assert!(exposed.contains("accept-ranges"), "{exposed}");
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let app = TestApp::local();
    let response = app.get("/does/not/exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "NOT_FOUND");
}
