//! The single upstream target.
//!
//! # Responsibilities
//! - Parse the configured base URL once
//! - Rewrite each downstream URI onto the upstream (path and query kept)
//! - Build the pooled HTTP client used for every exchange

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;

pub type UpstreamClient = Client<HttpConnector, Body>;

/// Error building the upstream target or a request URI.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("cannot build upstream uri: {0}")]
    Uri(#[from] axum::http::Error),
}

/// Base URL every exchange is forwarded to.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    /// Base path without trailing slash ("" for the root).
    base_path: String,
}

impl UpstreamTarget {
    pub fn parse(target_url: &str) -> Result<Self, UpstreamError> {
        let invalid = |reason: &str| UpstreamError::InvalidTarget {
            url: target_url.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(target_url).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http targets are supported"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            scheme: Scheme::HTTP,
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Map a downstream request URI onto the upstream.
    pub fn uri_for(&self, downstream: &Uri) -> Result<Uri, UpstreamError> {
        let path_and_query = downstream
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");

        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(format!("{}{}", self.base_path, path_and_query))
            .build()?;
        Ok(uri)
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

/// Build the HTTP client shared by all exchanges.
pub fn build_client(config: &UpstreamConfig) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
    connector.set_nodelay(true);

    Client::builder(TokioExecutor::new()).build(connector)
}
