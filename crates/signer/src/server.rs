use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::handler::RequestHandler;
use crate::props::SignProps;

pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// JSON body shared by every non-document response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub handler: RequestHandler,
    pub max_body_bytes: usize,
}

pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/sign/{cert_name}", post(sign_handler))
        .layer(body_limit)
        .with_state(state)
}

pub async fn run(address: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

async fn index() -> Json<Envelope<&'static str>> {
    Json(Envelope::success(
        "Welcome to the document signer. POST a multipart form to /sign/{cert_name}.",
    ))
}

async fn health() -> Json<Envelope<&'static str>> {
    Json(Envelope::success("healthy"))
}

#[derive(Default)]
struct SignForm {
    document: Option<Vec<u8>>,
    props: Option<SignProps>,
    password: Vec<u8>,
}

async fn read_form(mut multipart: Multipart) -> Result<SignForm, ServerError> {
    let mut form = SignForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Error reading `{name}` field: {e}")))?;

        match name.as_str() {
            "file" => form.document = Some(bytes.to_vec()),
            "props" if bytes.iter().all(u8::is_ascii_whitespace) => {}
            "props" => {
                let props = SignProps::from_json(&bytes).map_err(|e| {
                    ServerError::BadRequest(format!("Error reading JSON `props`: {e}"))
                })?;
                form.props = Some(props);
            }
            "password" => form.password = bytes.to_vec(),
            other => debug!("ignoring form field '{other}'"),
        }
    }
    Ok(form)
}

async fn sign_handler(
    State(state): State<AppState>,
    Path(cert_name): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let multipart = multipart.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let deadline = state.handler.deadline();
    let name = cert_name.clone();

    // One budget covers receiving the upload and signing it.
    let work = async {
        let form = read_form(multipart).await?;
        let document = match form.document {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                return Err(ServerError::BadRequest(
                    "Invalid file in the `file` field.".to_string(),
                ));
            }
        };
        state
            .handler
            .sign(cert_name, form.props, form.password, document)
            .await
    };
    let signed = tokio::time::timeout(deadline, work).await.map_err(|_| {
        warn!("request for '{name}' exceeded {deadline:?}");
        ServerError::TimedOut(deadline)
    })??;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.handler.media_type())],
        signed,
    )
        .into_response())
}
