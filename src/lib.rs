pub mod api;
pub mod auth;
pub mod clients;
pub mod config;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod store;
pub mod tokens;

pub use config::Config;
pub use error::ConnectError;

use std::sync::Arc;

use clients::{CasesClient, DriveClient};
use crypto::CryptoEngine;
use providers::ProviderRegistry;
use store::TokenStore;
use tokens::TokenService;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn TokenStore>,
    pub crypto: Arc<CryptoEngine>,
    pub registry: Arc<ProviderRegistry>,
    pub tokens: TokenService,
    pub cases: Option<CasesClient>,
    pub drive: Option<DriveClient>,
}

impl AppState {
    /// Wire the service graph from a config and a token store. Integration
    /// clients exist only for providers with configured credentials.
    pub fn new(config: Config, store: Arc<dyn TokenStore>, crypto: Arc<CryptoEngine>) -> Self {
        let mut registry = ProviderRegistry::new();
        providers::register_defaults(&mut registry, &config);
        let registry = Arc::new(registry);

        let tokens = TokenService::new(store.clone(), registry.clone());
        let cases = config
            .cases
            .clone()
            .map(|cfg| CasesClient::new(cfg, tokens.clone()));
        let drive = config
            .drive
            .clone()
            .map(|cfg| DriveClient::new(cfg, tokens.clone()));

        Self {
            config,
            store,
            crypto,
            registry,
            tokens,
            cases,
            drive,
        }
    }
}

pub type SharedState = Arc<AppState>;
