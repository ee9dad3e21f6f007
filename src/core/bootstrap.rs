use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::core::flows::FlowCatalog;
use crate::core::llm::{GenericProvider, LlmManager, ProviderRegistry};
use crate::core::store::{SqliteBackend, StorageBackend};

/// Everything a command needs, built once from config.
pub struct Services {
    pub catalog: FlowCatalog,
    pub provider_registry: ProviderRegistry,
    pub llm: LlmManager,
}

pub fn load_services(config: &AppConfig) -> Result<Services> {
    let provider_registry = match config.providers_path() {
        Some(path) => ProviderRegistry::load_with_custom(path)?,
        None => ProviderRegistry::load()?,
    };
    let catalog = match config.flows_path() {
        Some(path) => FlowCatalog::load_with_custom(path)?,
        None => FlowCatalog::builtin()?,
    };
    info!("Flow catalog ready with {} flow(s)", catalog.list().len());

    let llm = build_llm_manager(config, &provider_registry);
    Ok(Services {
        catalog,
        provider_registry,
        llm,
    })
}

/// Register the configured provider. A missing API key is logged rather than
/// fatal so the rest of the service still starts; flow runs then fail with
/// a provider error.
pub fn build_llm_manager(config: &AppConfig, registry: &ProviderRegistry) -> LlmManager {
    let mut manager = LlmManager::new();

    let Some(def) = registry.get_provider(&config.llm.provider) else {
        warn!(
            "Configured provider '{}' is not in the registry",
            config.llm.provider
        );
        return manager;
    };

    match GenericProvider::from_env(def.clone()) {
        Ok(provider) => {
            let model = config
                .llm
                .model
                .clone()
                .unwrap_or_else(|| def.default_model.clone());
            manager.register_provider(Arc::new(provider));
            manager.set_active(&def.id, &model);
        }
        Err(e) => warn!("{}", e),
    }
    manager
}

pub async fn open_storage(config: &AppConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend = match config.database_path() {
        Some(path) => SqliteBackend::open(path).await?,
        None => SqliteBackend::in_memory().await?,
    };
    Ok(Arc::new(backend))
}
