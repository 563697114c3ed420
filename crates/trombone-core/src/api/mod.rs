//! HTTP client factory for JSON REST backends.
//!
//! This module provides the `ApiClient`, built from a `ClientConfig`, and the
//! `ApiError` taxonomy it reports: transport, application (non-2xx status)
//! and decode failures are kept distinct and never swallowed.

pub mod client;
pub mod error;

pub use client::{ApiClient, ApiResponse};
pub use error::ApiError;
