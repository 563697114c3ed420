//! In-memory revalidation cache for API reads.
//!
//! This module provides the `CacheManager` store and the `ReadHandle` live
//! reads built on it. Concurrent reads of one key share a single request;
//! entries refresh only on key change or explicit invalidation, and on focus
//! regain when `CacheOptions::revalidate_on_focus` is set.

pub mod manager;
pub mod read;

pub use manager::{fetcher, CacheManager, CacheOptions, Fetcher};
pub use read::{ReadHandle, ReadState, ReadStatus};
