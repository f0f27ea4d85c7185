//! HTTP and Google Drive retrieval against a local mock server.

use tempfile::TempDir;
use vforge_storage::http::{build_http_client, download_http};
use vforge_storage::{DriveDownloader, StorageError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn downloads_body_to_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/my%20clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("nested/in.mp4");
    let client = build_http_client().unwrap();

    let reference = format!("{}/media/my clip.mp4", server.uri());
    let written = download_http(&client, &reference, &dest).await.unwrap();

    assert_eq!(written, 4096);
    assert_eq!(tokio::fs::read(&dest).await.unwrap().len(), 4096);
}

#[tokio::test]
async fn empty_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = build_http_client().unwrap();
    let result = download_http(&client, &format!("{}/empty.mp3", server.uri()), &dir.path().join("a.mp3")).await;

    assert!(matches!(result, Err(StorageError::EmptyDownload(_))));
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = build_http_client().unwrap();
    let result = download_http(&client, &format!("{}/gone.mp4", server.uri()), &dir.path().join("g.mp4")).await;

    assert!(matches!(result, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn drive_interstitial_is_confirmed() {
    let server = MockServer::start().await;

    let interstitial = r#"<html><form action="/download">
        <input type="hidden" name="id" value="BIGFILE">
        <input type="hidden" name="uuid" value="abc-123"></form></html>"#;

    Mock::given(method("GET"))
        .and(path("/uc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(interstitial),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .and(query_param("id", "BIGFILE"))
        .and(query_param("uuid", "abc-123"))
        .and(query_param("confirm", "t"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![1u8; 2048]),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("track.mp3");
    let drive = DriveDownloader::new(build_http_client().unwrap())
        .with_confirm_base(format!("{}/download", server.uri()));

    let reference = format!("{}/uc?export=download&id=BIGFILE", server.uri());
    let written = drive.download(&reference, &dest).await.unwrap();

    assert_eq!(written, 2048);
}

#[tokio::test]
async fn drive_html_without_confirmation_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>You need access</html>"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("private.mp3");
    let drive = DriveDownloader::new(build_http_client().unwrap());

    let result = drive
        .download(&format!("{}/uc?export=download&id=PRIVATE", server.uri()), &dest)
        .await;

    assert!(result.is_err());
    assert!(!dest.exists());
}

#[tokio::test]
async fn html_page_is_not_saved_as_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/share/clip.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<!DOCTYPE html><html><body>Sign in</body></html>"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("clip.mp4");
    let client = build_http_client().unwrap();
    let result = download_http(&client, &format!("{}/share/clip.mp4", server.uri()), &dest).await;

    assert!(matches!(result, Err(StorageError::HtmlResponse(_))));
    assert!(!dest.exists());
}

#[tokio::test]
async fn html_body_with_generic_content_type_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/track.mp3"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_string("\n<html><head><title>Google Drive - Virus scan warning</title></head></html>"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("track.mp3");
    let client = build_http_client().unwrap();
    let result = download_http(&client, &format!("{}/track.mp3", server.uri()), &dest).await;

    assert!(matches!(result, Err(StorageError::HtmlResponse(_))));
    assert!(!dest.exists());
}
