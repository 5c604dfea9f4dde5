//! HTTP transport: accept loop, request conversion and the status endpoint.

mod builder;

pub use builder::{MirageBuilder, RunningServer};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::engine::MockEngine;
use crate::request::InboundRequest;
use crate::response::MockResponse;

pub const STATUS_PATH: &str = "/system/status";

/// Accept connections until a shutdown signal arrives.
pub async fn serve(
    listener: TcpListener,
    engine: Arc<MockEngine>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let engine = Arc::clone(&engine);
                                async move { handle_request(req, engine).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!("Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Server shutting down");
                break;
            }
        }
    }
}

/// Handle one HTTP request against the engine.
pub async fn handle_request(
    req: Request<Incoming>,
    engine: Arc<MockEngine>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    if parts.method == Method::GET && parts.uri.path() == STATUS_PATH {
        return Ok(status_response().into_hyper());
    }

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            Bytes::new()
        }
    };

    let mut request = InboundRequest::new(parts.method.as_str(), parts.uri.path())
        .with_query_string(parts.uri.query().unwrap_or_default())
        .with_body(body);
    for (name, value) in &parts.headers {
        request = request.with_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }

    debug!("{} {}", request.method, request.path);

    // scripts and file reads block, so the pipeline stays off the reactor
    let response = match tokio::task::spawn_blocking(move || engine.handle(&request)).await {
        Ok(response) => response,
        Err(e) => {
            error!("Request pipeline aborted: {}", e);
            MockResponse::server_error()
        }
    };

    Ok(response.into_hyper())
}

fn status_response() -> MockResponse {
    let body = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    MockResponse::new(200).with_body("application/json", body.to_string())
}
