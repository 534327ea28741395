//! Common utilities for integration tests

#![allow(dead_code)]

use std::io::Cursor;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use server::config::ServerConfig;
use server::{build_router, AppState};
use tower::ServiceExt;

/// Router with the real handlers and default configuration.
pub fn create_test_app() -> Router {
    build_router(AppState::new(ServerConfig::default()))
}

/// 16-bit mono sine at half scale.
pub fn sine_wav(freq: f32, sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let n = (sample_rate as f32 * seconds) as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let s = (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// What `FileReader.readAsDataURL` would hand the page.
pub fn as_upload(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// Payload half of a `data:` URI, base64-decoded.
pub fn decode_data_uri(uri: &str, expected_prefix: &str) -> Vec<u8> {
    let encoded = uri
        .strip_prefix(expected_prefix)
        .unwrap_or_else(|| panic!("{uri:.40} does not start with {expected_prefix}"));
    general_purpose::STANDARD.decode(encoded).unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn assert_status(response: &Response<Body>, status: StatusCode) {
    assert_eq!(response.status(), status, "unexpected status");
}
