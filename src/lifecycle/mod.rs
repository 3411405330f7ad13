//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight exchanges finish → exit
//! ```
//!
//! # Design Decisions
//! - No forced deadline: exchanges are drained, not cut
//! - Dropping a client connection drops its body stream, which stops the upstream read

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
