//! HTTP endpoint serving the annotated stream.

use std::{convert::Infallible, sync::Arc};

use anyhow::Context;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures_util::stream;
use tokio::{net::TcpListener, sync::mpsc};

use crate::bootstrap::AppState;

/// Path of the stream endpoint.
pub const STREAM_PATH: &str = "/asl_stream";

/// `Content-Type` of the stream response.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Builds the router. Every path other than [`STREAM_PATH`] is answered with 404.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(STREAM_PATH, get(asl_stream))
        .with_state(state)
}

/// Serves requests on `listener` until the process is terminated.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    log::info!("serving stream at http://{addr}{STREAM_PATH}");
    axum::serve(listener, router(state))
        .await
        .context("HTTP server failed")
}

async fn asl_stream(State(state): State<Arc<AppState>>) -> Response {
    log::debug!("client connected");

    // One part in flight at a time; the producer blocks until the client has taken the last one.
    let (tx, rx) = mpsc::channel::<Bytes>(1);
    let frames = state.frames();
    tokio::task::spawn_blocking(move || {
        for part in frames {
            if tx.blocking_send(part).is_err() {
                log::debug!("client disconnected");
                return;
            }
        }
        log::debug!("stream ended");
    });

    let body = stream::unfold(rx, |mut rx| async move {
        let part = rx.recv().await?;
        Some((Ok::<_, Infallible>(part), rx))
    });

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(STREAM_CONTENT_TYPE),
        )],
        Body::from_stream(body),
    )
        .into_response()
}
