//! Core library for trombone.
//!
//! - `api`: HTTP client factory and error taxonomy
//! - `cache`: revalidation cache with shared in-flight requests
//! - `context`: provider/scope wiring one client and one cache together
//! - `config`: client settings from the environment and config file

pub mod api;
pub mod cache;
pub mod config;
pub mod context;

pub use api::{ApiClient, ApiError, ApiResponse};
pub use cache::{fetcher, CacheManager, CacheOptions, Fetcher, ReadHandle, ReadState, ReadStatus};
pub use config::{ClientConfig, Config, BASE_URL_ENV};
pub use context::{
    default_client, init_default_client, reset_default_client, ApiContext, ApiScope,
    FallbackPolicy,
};
