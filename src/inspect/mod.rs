//! HTML inspection.
//!
//! # Data Flow
//! ```text
//! accumulated decompressed text
//!     → meta.rs (substring fast-reject, then HTML parse)
//!     → content attribute → status code
//! ```

pub mod meta;

pub use meta::{parse_status, MetaExtractor};
