pub mod config;
pub mod error;
pub mod metrics;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{Html, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use spectro_core::datauri::{decode_upload, encode_data_uri, playback_mime};
use spectro_core::{AudioPayload, DecodedAudio, PipelineError, SpectrogramImage, SpectrogramPipeline};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::metrics::{AppMetrics, DetailedMetricsResponse, EndpointMetrics};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SpectrogramPipeline>,
    pub metrics: Arc<AppMetrics>,
    pub request_count: Arc<AtomicU64>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            pipeline: Arc::new(SpectrogramPipeline::default()),
            metrics: Arc::new(AppMetrics::new()),
            request_count: Arc::new(AtomicU64::new(0)),
            config,
        }
    }
}

/// Upload event sent by the page: a `<type>,<base64>` string plus the
/// file's display name. Both are absent before anything is chosen.
#[derive(Debug, Default, Deserialize)]
pub struct UploadRequest {
    pub contents: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SpectrogramView {
    pub file_label: Option<String>,
    pub image_src: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PlayerView {
    pub audio_src: Option<String>,
    pub file_label: Option<String>,
    pub image_src: Option<String>,
}

/// Routes mounted at the root and again under `/api`.
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    let public_api = Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/upload/spectrogram", post(spectrogram_endpoint))
        .route("/upload/player", post(player_endpoint));

    // Metrics endpoint - consider adding authentication in production
    let metrics_api = Router::new().route("/metrics", get(metrics_endpoint));

    let api = Router::new().merge(public_api).merge(metrics_api);

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .layer(axum::middleware::from_fn(add_request_id))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

async fn add_request_id(mut request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert("x-request-id", value.clone());
        let mut response = next.run(request).await;
        response.headers_mut().insert("x-request-id", value);
        return response;
    }
    next.run(request).await
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> Json<DetailedMetricsResponse> {
    let request_count = state.request_count.load(Ordering::Relaxed);
    Json(state.metrics.snapshot(request_count))
}

pub async fn spectrogram_endpoint(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<SpectrogramView>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let Some(contents) = req.contents else {
        return Ok(Json(SpectrogramView::default()));
    };

    let started = Instant::now();
    let result = render_upload(&state, contents, req.filename, "Spectrogram 1").await;
    let (payload, _, image) = record(&state, &state.metrics.spectrogram, started, result)?;

    Ok(Json(SpectrogramView {
        file_label: Some(format!("Selected file 1: {}", display_name(&payload))),
        image_src: Some(encode_data_uri("image/png", &image.png)),
    }))
}

pub async fn player_endpoint(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<PlayerView>, ApiError> {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    let Some(contents) = req.contents else {
        return Ok(Json(PlayerView::default()));
    };

    let started = Instant::now();
    let result = render_upload(&state, contents, req.filename, spectro_core::DEFAULT_TITLE).await;
    let (payload, decoded, image) = record(&state, &state.metrics.player, started, result)?;

    let audio_mime = playback_mime(decoded.format, payload.mime.as_deref());
    Ok(Json(PlayerView {
        audio_src: Some(encode_data_uri(&audio_mime, &payload.bytes)),
        file_label: Some(format!("Selected file: {}", display_name(&payload))),
        image_src: Some(encode_data_uri("image/png", &image.png)),
    }))
}

type Rendered = (AudioPayload, DecodedAudio, SpectrogramImage);

/// Decode the upload and render it off the async runtime.
async fn render_upload(
    state: &AppState,
    contents: String,
    filename: Option<String>,
    title: &'static str,
) -> Result<Rendered, ApiError> {
    let pipeline = state.pipeline.clone();
    tokio::task::spawn_blocking(move || {
        let payload = decode_upload(&contents, filename)?;
        let (decoded, image) = pipeline.render_payload(&payload, title)?;
        Ok::<_, PipelineError>((payload, decoded, image))
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Task join error: {e}")))?
    .map_err(|e| {
        if matches!(e, PipelineError::Decode(_)) {
            state.metrics.render.record_decode_failure();
        }
        ApiError::from(e)
    })
}

fn record(
    state: &AppState,
    endpoint: &EndpointMetrics,
    started: Instant,
    result: Result<Rendered, ApiError>,
) -> Result<Rendered, ApiError> {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    endpoint.record_request(elapsed_ms);

    match result {
        Ok((payload, decoded, image)) => {
            state
                .metrics
                .render
                .record_render(elapsed_ms, decoded.samples.len(), image.png.len());
            info!(
                filename = ?payload.filename,
                bytes = payload.bytes.len(),
                sample_rate = decoded.sample_rate,
                duration_secs = decoded.duration_secs(),
                elapsed_ms,
                "Rendered spectrogram"
            );
            Ok((payload, decoded, image))
        }
        Err(e) => {
            endpoint.record_error();
            Err(e)
        }
    }
}

fn display_name(payload: &AudioPayload) -> &str {
    payload.filename.as_deref().unwrap_or("")
}
