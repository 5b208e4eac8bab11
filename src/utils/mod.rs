//! # Utilities Module
//!
//! Cross-cutting concerns shared by the session manager, the state
//! interpreter and the command issuer.
//!
//! ## Modules
//!
//! - [`errors`]: Typed error hierarchy using `thiserror`
//! - [`retry`]: Exponential backoff retry logic for transient remote failures
//!
//! ## Design Notes
//!
//! Retryability is a property of the error itself ([`RiscoError::is_retryable`]),
//! so every call site hands the same predicate to [`retry_with_backoff`].
//! Transport failures, credential rejections and bad HTTP statuses are retried;
//! a command the panel refused is surfaced immediately.

pub mod errors;
pub mod retry;

pub use errors::{ConfigError, RiscoError};
pub use retry::{retry_with_backoff, RetryConfig};
