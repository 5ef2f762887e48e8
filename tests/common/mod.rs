//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdf_preview_server::{create_app, AppState, Config, ShutdownHandle};
use tempfile::TempDir;

pub const BOUNDARY: &str = "----pdf-preview-test-boundary";

/// A router over a throwaway artifacts directory
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub shutdown: ShutdownHandle,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn artifacts(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.artifacts().join(session_id)
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_config(|_| {})
}

pub fn build_test_app_with_config(adjust: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.storage.artifacts_dir = temp_dir.path().to_path_buf();
    config.render.dpi = 72.0;
    config.render.timeout_secs = 30;
    config.events.poll_interval_ms = 25;
    config.events.keepalive_secs = 0;
    adjust(&mut config);

    let (state, shutdown) = AppState::new(config);
    TestApp {
        app: create_app(state.clone()),
        state,
        shutdown,
        temp_dir,
    }
}

/// A PDF whose pages have the given sizes in points
pub fn sample_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = sizes
        .iter()
        .map(|&(width, height)| {
            let content_id = doc.add_object(Stream::new(
                Dictionary::new(),
                b"1 0 0 rg 0 0 20 20 re f".to_vec(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ],
            });
            page_id.into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(kids.len() as i64),
            "Kids" => kids,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Integration Sample"),
        "Author" => Object::string_literal("Test Suite"),
    });
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// One file part of a multipart body
pub struct Part<'a> {
    pub field: &'a str,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn pdf(file_name: &'a str, bytes: &'a [u8]) -> Self {
        Self {
            field: "pdfs",
            file_name,
            content_type: "application/pdf",
            bytes,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POST /upload with the given parts and optional session cookie
pub fn upload_request(parts: &[Part<'_>], session_id: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(id) = session_id {
        builder = builder.header("Cookie", format!("session_id={id}"));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// Session id from a response's Set-Cookie header
pub fn session_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("session_id="))
        .and_then(|rest| rest.split(';').next())
        .map(str::to_string)
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Every regular file below `dir`
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found
}
