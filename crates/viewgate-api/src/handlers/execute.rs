// View execution handlers - buffered and streamed
use actix_web::{web, HttpResponse, Responder};
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use log::{debug, error};
use std::time::Instant;
use viewgate_commons::{GatewayError, Result};
use viewgate_engine::JsonSink;

use crate::models::{error_response, ErrorResponse, ExecuteRequest};
use crate::state::AppState;

/// Handler for `POST /api/v1/views/{id}/query`.
///
/// Executes the stored view and returns the full result as one JSON array.
pub async fn execute_view(
    path: web::Path<String>,
    req: web::Json<ExecuteRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let id = path.into_inner();
    let options = req.into_inner().into_options();
    let deadline = Instant::now() + state.request_timeout;

    let started = Instant::now();
    match state.gateway.execute_buffered(&id, &options, deadline).await {
        Ok(body) => {
            debug!("view '{}' executed in {:?}", id, started.elapsed());
            HttpResponse::Ok()
                .content_type("application/json")
                .body(body)
        }
        Err(err) => {
            error!("view '{}' execution failed: {}", id, err);
            error_response(&err)
        }
    }
}

/// Handler for `POST /api/v1/views/{id}/query/stream`.
///
/// Streams the result as a chunked JSON array. Failures detected before any
/// network resource is touched are written as an error object body; later
/// failures terminate the (already closed) array and are logged.
pub async fn execute_view_stream(
    path: web::Path<String>,
    req: web::Json<ExecuteRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    let id = path.into_inner();
    let options = req.into_inner().into_options();
    let deadline = Instant::now() + state.request_timeout;
    let gateway = state.gateway.clone();

    let (tx, rx) = mpsc::channel::<std::result::Result<Bytes, std::io::Error>>(64);

    actix_web::rt::spawn(async move {
        let mut sink = ChannelSink { tx };
        if let Err(err) = gateway
            .execute_streamed(&id, &options, deadline, &mut sink)
            .await
        {
            error!("streaming execution of view '{}' failed: {}", id, err);
            if err.is_client_error() {
                // nothing has been written yet; give the client a
                // diagnosable body instead of an empty stream
                if let Ok(body) = serde_json::to_string(&ErrorResponse::from_error(&err)) {
                    let _ = sink.write_fragment(&body).await;
                }
            }
        }
    });

    HttpResponse::Ok()
        .content_type("application/json")
        .streaming(rx)
}

/// JSON sink over the chunked response channel. A send failure means the
/// client went away; surfacing it as `Cancelled` makes the gateway abandon
/// the stream and release its resources.
struct ChannelSink {
    tx: mpsc::Sender<std::result::Result<Bytes, std::io::Error>>,
}

#[async_trait]
impl JsonSink for ChannelSink {
    async fn write_fragment(&mut self, fragment: &str) -> Result<()> {
        self.tx
            .send(Ok(Bytes::copy_from_slice(fragment.as_bytes())))
            .await
            .map_err(|_| GatewayError::cancelled("client disconnected"))
    }

    async fn flush(&mut self) -> Result<()> {
        self.tx
            .flush()
            .await
            .map_err(|_| GatewayError::cancelled("client disconnected"))
    }
}
