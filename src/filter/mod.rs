//! Response filtering subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ignore file → ignore.rs (compile regexes) → IgnorePatternSet
//!
//! Per exchange:
//!     (method, path, upstream headers)
//!     → path.rs (ignore check, then GET + text/html + gzip)
//!     → inspect body? yes / no
//! ```

pub mod ignore;
pub mod path;

pub use ignore::{IgnoreFileError, IgnorePatternSet};
pub use path::PathFilter;
