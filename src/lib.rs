//! Status-rewriting reverse proxy library.
//!
//! Sits in front of a server-rendering web application and turns
//! `<meta name="app:status" content="404">` in gzip-encoded HTML into the
//! actual HTTP status of the response, while streaming the body through.

pub mod config;
pub mod filter;
pub mod http;
pub mod inspect;
pub mod lifecycle;
pub mod observability;
pub mod transcode;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
