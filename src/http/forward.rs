//! Response forwarding: header copy-through and path selection.
//!
//! # Responsibilities
//! - Copy every upstream header and the upstream status downstream
//! - Pass unfiltered bodies through untouched
//! - Route filtered bodies through one [`TranscodingStream`] per exchange
//!
//! # Design Decisions
//! - The body is assigned exactly once, from exactly one path
//! - The status is settled before the head is returned, since hyper sends
//!   the head before the first body byte
//! - Settling is bounded by `settle_timeout`; a page that is too slow to
//!   reveal its status is sent with the upstream status, never replaced
//! - `Content-Length` is dropped on the transcoded path; the recompressed
//!   size is unknown up front

use axum::body::Body;
use axum::http::{header, Method, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::config::InspectionConfig;
use crate::filter::PathFilter;
use crate::inspect::MetaExtractor;
use crate::observability::metrics;
use crate::transcode::{StreamTranscoder, TranscodingStream};

/// The request side of one exchange, as seen by the forwarder.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: Method,
    pub path: String,
}

impl Exchange {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

/// Downstream response plus whether its body went through the transcoder.
pub struct Forwarded {
    pub response: Response<Body>,
    pub inspected: bool,
}

const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Turns an upstream response into the downstream response.
#[derive(Debug, Clone)]
pub struct ResponseForwarder {
    filter: Arc<PathFilter>,
    extractor: MetaExtractor,
    max_inspect_bytes: usize,
    settle_timeout: Duration,
}

impl ResponseForwarder {
    pub fn new(filter: Arc<PathFilter>, meta_name: impl Into<String>, max_inspect_bytes: usize) -> Self {
        Self {
            filter,
            extractor: MetaExtractor::new(meta_name),
            max_inspect_bytes,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Bound the wait for the status before the response head is released.
    pub fn with_settle_timeout(mut self, settle_timeout: Duration) -> Self {
        self.settle_timeout = settle_timeout;
        self
    }

    pub fn from_config(config: &InspectionConfig, filter: Arc<PathFilter>) -> Self {
        Self::new(filter, config.meta_name.clone(), config.max_inspect_bytes)
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub async fn forward(&self, exchange: &Exchange, upstream: Response<Body>) -> Forwarded {
        let (parts, body) = upstream.into_parts();

        let mut response = Response::new(Body::empty());
        *response.status_mut() = parts.status;
        let headers = response.headers_mut();
        for (name, value) in parts.headers.iter() {
            headers.append(name.clone(), value.clone());
        }

        if !self
            .filter
            .should_process(&exchange.method, &exchange.path, response.headers())
        {
            *response.body_mut() = body;
            return Forwarded {
                response,
                inspected: false,
            };
        }

        tracing::debug!(path = %exchange.path, "Filtered path");
        response.headers_mut().remove(header::CONTENT_LENGTH);

        let transcoder = StreamTranscoder::new(self.extractor.clone(), self.max_inspect_bytes);
        let mut stream = TranscodingStream::new(body.into_data_stream(), transcoder);

        let settled = match tokio::time::timeout(self.settle_timeout, stream.settle()).await {
            Ok(status) => status,
            Err(_) => {
                tracing::debug!(
                    path = %exchange.path,
                    timeout_ms = self.settle_timeout.as_millis() as u64,
                    "Status not found in time, keeping upstream status"
                );
                stream.give_up();
                None
            }
        };

        if let Some(status) = settled {
            tracing::debug!(
                path = %exchange.path,
                from = parts.status.as_u16(),
                to = status.as_u16(),
                "Status taken from body"
            );
            metrics::record_status_rewrite(status.as_u16());
            *response.status_mut() = status;
        }

        *response.body_mut() = Body::from_stream(stream);
        Forwarded {
            response,
            inspected: true,
        }
    }
}
