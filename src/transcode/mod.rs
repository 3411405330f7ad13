//! Body transcoding subsystem.
//!
//! # Data Flow
//! ```text
//! upstream gzip chunks
//!     → body.rs (pull one chunk when downstream is ready)
//!     → gzip.rs (decompress → inspect while buffering → recompress)
//!     → downstream gzip chunks
//! ```
//!
//! # Design Decisions
//! - One transcoder per exchange, never shared
//! - The status is settled before the response head is sent
//! - Errors abort only the affected body stream

pub mod body;
pub mod gzip;

pub use body::TranscodingStream;
pub use gzip::{StreamTranscoder, TranscodeError, TranscodeState};
