use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::sse::{KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::pipeline::{self, SegmentOptions};
use crate::segment::Zone;
use crate::session::SessionConfig;

use super::events::{self, EventStream};
use super::models::{
    ConfirmZoneRequest, ErrorResponse, HealthResponse, SessionQuery, StatusResponse,
};
use super::state::ServerState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn router(state: Arc<ServerState>) -> Router {
    let upload_limit = state.settings.max_upload_bytes;
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/upload-image", post(upload_image))
        .route("/confirm-zone", post(confirm_zone))
        .route("/stream-questions", get(stream_questions))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

pub async fn run_server(state: Arc<ServerState>) -> Result<()> {
    let addr = state.settings.server_addr.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn banner() -> &'static str {
    "Qsnap backend running"
}

async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            ocr_ready: state.ocr.is_ready(),
        }),
    )
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn upload_image(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SessionQuery>,
    mut multipart: Multipart,
) -> Result<String, ApiError> {
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.body_text()))?;
        image = Some(bytes);
        break;
    }
    let Some(bytes) = image.filter(|bytes| !bytes.is_empty()) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No image"));
    };

    let mime = infer::get(&bytes).map(|kind| kind.mime_type());
    if !mime.is_some_and(|mime| mime.starts_with("image/")) {
        return Err(api_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("unsupported upload type: {}", mime.unwrap_or("unknown")),
        ));
    }

    let session = query.id();
    let total = state.sessions.push_page(session, bytes.to_vec());
    info!(session, total, "image received");
    Ok(format!("Image received. Total images: {}", total))
}

async fn confirm_zone(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SessionQuery>,
    Json(request): Json<ConfirmZoneRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let payload = request.payload;
    let zone = payload
        .zone_x_bounds
        .map(|bounds| Zone::new(bounds.x1, bounds.x2))
        .transpose()
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.to_string()))?;

    let session = query.id();
    state
        .sessions
        .configure(
            session,
            SessionConfig {
                zone,
                templates: payload.ques_seq_style,
                banned_words: payload.ban_word,
            },
        )
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.to_string()))?;
    info!(session, ?zone, "zone confirmed");
    Ok(Json(StatusResponse {
        status: "ok, zone confirmed".to_string(),
    }))
}

async fn stream_questions(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Sse<EventStream>, ApiError> {
    let engine = state
        .ocr
        .get()
        .map_err(|err| api_error(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let session = query.id().to_string();
    let taken = state.sessions.take(&session);
    let stream = match taken.into_job() {
        Ok(job) => {
            let (tx, rx) = mpsc::channel(state.settings.channel_capacity);
            let options = SegmentOptions::from(&state.settings);
            tokio::spawn(async move {
                let outcome = pipeline::run(job, engine, options, tx).await;
                info!(session = %session, ?outcome, "session torn down");
            });
            events::streamed(rx)
        }
        Err(err) => {
            warn!(session = %session, error = %err, "run rejected");
            events::rejected(err.to_string())
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
