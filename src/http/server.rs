//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing)
//! - Forward every request to the configured upstream
//! - Hand upstream responses to the [`ResponseForwarder`]
//! - Serve until the shutdown signal, then drain

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, Version},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::filter::{IgnorePatternSet, PathFilter};
use crate::http::forward::{Exchange, ResponseForwarder};
use crate::http::upstream::{build_client, UpstreamClient, UpstreamError, UpstreamTarget};
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: UpstreamClient,
    pub target: Arc<UpstreamTarget>,
    pub forwarder: ResponseForwarder,
}

/// HTTP server for the status proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server, loading the ignore file named in the configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, UpstreamError> {
        let ignore = IgnorePatternSet::load(Path::new(&config.inspection.ignore_file));
        Self::with_filter(config, PathFilter::new(ignore))
    }

    /// Create a server with an explicitly constructed filter.
    pub fn with_filter(config: ProxyConfig, filter: PathFilter) -> Result<Self, UpstreamError> {
        let target = Arc::new(UpstreamTarget::parse(&config.upstream.target_url)?);
        let forwarder = ResponseForwarder::from_config(&config.inspection, Arc::new(filter))
            .with_settle_timeout(Duration::from_secs(config.timeouts.settle_secs));

        tracing::info!(
            upstream = %config.upstream.target_url,
            meta_name = %config.inspection.meta_name,
            ignore_patterns = forwarder.filter().ignore_patterns().len(),
            "Proxy configured"
        );

        let state = AppState {
            client: build_client(&config.upstream),
            target,
            forwarder,
        };

        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Forward one request upstream and the response back down.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let exchange = Exchange::new(request.method().clone(), request.uri().path());
    let method_str = exchange.method.to_string();

    tracing::debug!(
        peer = %peer,
        method = %exchange.method,
        path = %exchange.path,
        "Current path"
    );

    let (mut parts, body) = request.into_parts();
    parts.uri = match state.target.uri_for(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(path = %exchange.path, error = %e, "Cannot map request to upstream");
            metrics::record_request(&method_str, 400, false, start_time);
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        }
    };
    parts.version = Version::HTTP_11;

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(upstream) => {
            let forwarded = state
                .forwarder
                .forward(&exchange, upstream.map(Body::new))
                .await;
            metrics::record_request(
                &method_str,
                forwarded.response.status().as_u16(),
                forwarded.inspected,
                start_time,
            );
            forwarded.response
        }
        Err(e) => {
            tracing::error!(
                upstream = %state.target.authority(),
                path = %exchange.path,
                error = %e,
                "Upstream error"
            );
            metrics::record_request(&method_str, 502, false, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
