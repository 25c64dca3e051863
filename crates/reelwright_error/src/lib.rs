//! Error types for the Reelwright pipeline.
//!
//! This crate provides the foundation error types used throughout the Reelwright workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Stage executors only ever surface [`StageError`], whose kind is one of
//! `Transient`, `Terminal` or `QuotaExceeded`. Provider adapters translate
//! their own failure codes into that taxonomy before returning.
//!
//! # Examples
//!
//! ```
//! use reelwright_error::{ReelwrightResult, StageError, StageErrorKind};
//!
//! fn call_provider() -> ReelwrightResult<String> {
//!     Err(StageError::new(StageErrorKind::Transient("connection reset".into())))?
//! }
//!
//! assert!(call_provider().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod input;
mod quota;
mod stage;
mod storage;

pub use config::ConfigError;
pub use error::{ReelwrightError, ReelwrightErrorKind, ReelwrightResult};
pub use input::InputError;
pub use quota::{QuotaError, QuotaErrorKind};
pub use stage::{RetryableError, StageError, StageErrorKind};
pub use storage::{StorageError, StorageErrorKind};
