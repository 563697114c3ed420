//! API context distribution.
//!
//! An `ApiContext` is mounted once at the application root: it owns the
//! shared `ApiClient` and a `CacheManager` whose default fetcher GETs through
//! that client. Consumers receive an `ApiScope` explicitly and look the client
//! up from it. A scope with no provider falls back according to its
//! `FallbackPolicy`.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::cache::{fetcher, CacheManager, CacheOptions, Fetcher, ReadHandle};
use crate::config::ClientConfig;

/// Process-wide client used by lookups outside any provider.
static DEFAULT_CLIENT: RwLock<Option<Arc<ApiClient>>> = RwLock::new(None);

/// Shared default client, built from `ClientConfig::default()` on first use.
pub fn default_client() -> Result<Arc<ApiClient>, ApiError> {
    if let Some(client) = DEFAULT_CLIENT
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .as_ref()
    {
        return Ok(Arc::clone(client));
    }

    let mut slot = DEFAULT_CLIENT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    // Another caller may have filled the slot between the two locks
    if let Some(client) = slot.as_ref() {
        return Ok(Arc::clone(client));
    }
    let client = Arc::new(ApiClient::new(ClientConfig::default())?);
    *slot = Some(Arc::clone(&client));
    Ok(client)
}

/// Replace the default client with one built from `config`.
pub fn init_default_client(config: ClientConfig) -> Result<Arc<ApiClient>, ApiError> {
    let client = Arc::new(ApiClient::new(config)?);
    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&client));
    Ok(client)
}

/// Drop the default client; the next lookup rebuilds it from defaults.
pub fn reset_default_client() {
    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
}

/// What a lookup does when no provider is mounted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Return the disconnected default client and log a warning
    #[default]
    DefaultClient,
    /// Fail with `ApiError::NoProvider`
    Strict,
}

/// The mounted provider: one client plus the cache reads go through.
#[derive(Debug, Clone)]
pub struct ApiContext {
    client: Arc<ApiClient>,
    cache: CacheManager,
}

impl ApiContext {
    /// Build a client from `config` and mount a provider around it.
    pub fn mount(config: ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::with_client(Arc::new(ApiClient::new(config)?)))
    }

    pub fn with_client(client: Arc<ApiClient>) -> Self {
        let cache = CacheManager::with_fetcher(
            CacheOptions {
                revalidate_on_focus: false,
            },
            Self::client_fetcher(Arc::clone(&client)),
        );
        info!(base_url = %client.base_url(), "API provider mounted");
        Self { client, cache }
    }

    /// GET the key as a path and hand back the payload; errors pass through unchanged.
    fn client_fetcher(client: Arc<ApiClient>) -> Fetcher {
        fetcher(move |path| {
            let client = Arc::clone(&client);
            async move { Ok(client.get(&path).await?.data) }
        })
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Cache-aware read of `key` through the provider's client. `None` reads nothing.
    pub fn fetch(&self, key: Option<&str>) -> ReadHandle {
        self.cache.read(key)
    }

    /// Cache-aware read of `key` resolved by an explicit fetcher.
    pub fn fetch_with(&self, key: Option<&str>, fetcher: Fetcher) -> ReadHandle {
        self.cache.read_with(key, fetcher)
    }
}

/// Explicit stand-in for a component subtree: carries at most one provider.
#[derive(Debug, Clone, Default)]
pub struct ApiScope {
    context: Option<ApiContext>,
    policy: FallbackPolicy,
}

impl ApiScope {
    /// A scope with no provider mounted.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: FallbackPolicy) -> Self {
        Self {
            context: None,
            policy,
        }
    }

    /// Child scope seeing `context`. Any outer provider is shadowed, not merged.
    pub fn provide(&self, context: ApiContext) -> Self {
        Self {
            context: Some(context),
            policy: self.policy,
        }
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn context(&self) -> Option<&ApiContext> {
        self.context.as_ref()
    }

    /// The client visible from this scope.
    pub fn use_api(&self) -> Result<Arc<ApiClient>, ApiError> {
        if let Some(context) = &self.context {
            return Ok(Arc::clone(context.api()));
        }

        match self.policy {
            FallbackPolicy::DefaultClient => {
                warn!("API lookup outside any provider, using the default client");
                default_client()
            }
            FallbackPolicy::Strict => Err(ApiError::NoProvider),
        }
    }
}
