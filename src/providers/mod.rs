mod cases;
mod drive;
mod registry;
mod traits;

pub use cases::CasesProvider;
pub use drive::DriveProvider;
pub use registry::ProviderRegistry;
pub use traits::{OAuthProvider, TokenSet};

use crate::config::Config;

/// Register every integration that has credentials configured.
pub fn register_defaults(registry: &mut ProviderRegistry, config: &Config) {
    if let Some(cfg) = &config.cases {
        registry.register(Box::new(CasesProvider::new(cfg.clone())));
    }
    if let Some(cfg) = &config.drive {
        registry.register(Box::new(DriveProvider::new(cfg.clone())));
    }
}
