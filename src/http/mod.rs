//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → upstream.rs (rewrite URI onto the target, send with pooled client)
//!     → forward.rs (copy headers + status, pick pass-through or transcode)
//!     → Send to client
//! ```

pub mod forward;
pub mod server;
pub mod upstream;

pub use forward::{Exchange, Forwarded, ResponseForwarder};
pub use server::HttpServer;
pub use upstream::{UpstreamError, UpstreamTarget};
