//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Resolve each request through the route matcher
//! - Forward matched requests to their upstream address
//!
//! # Design Decisions
//! - Unmatched requests (including lookups before readiness) get 404
//! - One pooled client shared by all upstreams
//! - The original Host header is forwarded; the upstream sees x-forwarded-host too

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::http::request::{request_host, request_id, UuidRequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::RouteMatcher;

const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<dyn RouteMatcher>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server fronting the route matcher.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server resolving requests through `matcher`.
    pub fn new(matcher: Arc<dyn RouteMatcher>, timeouts: &TimeoutConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState { matcher, client };

        Self {
            router: Self::build_router(timeouts, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(timeouts: &TimeoutConfig, state: AppState) -> Router {
        Router::new().fallback(proxy_handler).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs))),
        )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Looks up the route and forwards the request to its backend.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let request_id = request_id(&request).to_string();
    let host = request_host(&request).unwrap_or_default().to_string();
    let path = request.uri().path().to_string();

    let Some(route) = state.matcher.match_route(&host, &path) else {
        tracing::debug!(request_id = %request_id, host = %host, path = %path, "No route matched");
        metrics::record_request(method.as_str(), 404, start);
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        host = %host,
        path = %path,
        namespace = %route.namespace,
        ingress = %route.name,
        backend = %route.backend,
        "Proxying request"
    );

    let (mut parts, body) = request.into_parts();
    let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    parts.uri = match format!("http://{}{}", route.backend, path_and_query).parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %route.backend, error = %e, "Invalid upstream URI");
            metrics::record_request(method.as_str(), 502, start);
            return (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response();
        }
    };
    strip_hop_by_hop(&mut parts.headers);
    if let Ok(value) = HeaderValue::from_str(&host) {
        parts.headers.insert(X_FORWARDED_HOST, value);
    }

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), start);
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %route.backend, error = %e, "Upstream error");
            metrics::record_request(method.as_str(), 502, start);
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}
