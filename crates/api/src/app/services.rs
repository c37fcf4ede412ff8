//! Wiring of stores, processors and the batch job service.

use std::sync::Arc;

use catalogsync_infra::catalog::{InMemoryProductCatalog, ProductCatalog};
use catalogsync_infra::jobs::{
    BatchJobService, ExecutorConfig, InMemoryJobStore, JobControl, JobExecutor, JobStore,
    ProcessorRegistry,
};
use catalogsync_infra::marketplace::{InMemoryMarketplace, MarketplaceDirectory};
use catalogsync_infra::processors;

use crate::config::AppConfig;

/// Marketplace codes wired to the in-process client in dev builds.
const DEV_MARKETPLACE_CODES: [&str; 3] = ["naver", "coupang", "eleventh"];

pub struct AppServices {
    pub batch_jobs: BatchJobService,
    pub catalog: Arc<dyn ProductCatalog>,
    pub marketplaces: Arc<MarketplaceDirectory>,
}

impl AppServices {
    /// Assemble the services over the given collaborators.
    ///
    /// `customize` may add custom processors before the registry is frozen.
    pub fn assemble(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn ProductCatalog>,
        marketplaces: Arc<MarketplaceDirectory>,
        executor_config: ExecutorConfig,
        customize: impl FnOnce(&mut ProcessorRegistry),
    ) -> Self {
        let mut registry = ProcessorRegistry::new();
        processors::register_builtin(&mut registry, catalog.clone(), marketplaces.clone());
        customize(&mut registry);
        let missing = registry.missing_builtins();
        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "job types without a processor will fail on start");
        }
        tracing::info!(processors = registry.len(), "processor registry built");

        let control = Arc::new(JobControl::new());
        let executor = Arc::new(JobExecutor::new(
            store.clone(),
            Arc::new(registry),
            control.clone(),
            executor_config,
        ));

        Self {
            batch_jobs: BatchJobService::new(store, catalog.clone(), control, executor),
            catalog,
            marketplaces,
        }
    }

    /// Fully in-memory services over `catalog`.
    pub fn in_memory(
        catalog: Arc<dyn ProductCatalog>,
        marketplaces: Arc<MarketplaceDirectory>,
        concurrency_limit: usize,
    ) -> Self {
        Self::assemble(
            Arc::new(InMemoryJobStore::new()),
            catalog,
            marketplaces,
            ExecutorConfig::default().with_concurrency_limit(concurrency_limit),
            |_| {},
        )
    }
}

pub fn dev_marketplaces() -> MarketplaceDirectory {
    let client = Arc::new(InMemoryMarketplace::new());
    DEV_MARKETPLACE_CODES
        .into_iter()
        .fold(MarketplaceDirectory::new(), |dir, code| {
            dir.with_client(code, client.clone())
        })
}

/// Build services from configuration.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let catalog: Arc<dyn ProductCatalog> = Arc::new(InMemoryProductCatalog::new());
    let marketplaces = Arc::new(dev_marketplaces());
    let executor_config =
        ExecutorConfig::default().with_concurrency_limit(config.concurrency_limit);

    let store = job_store(config).await?;
    Ok(AppServices::assemble(
        store,
        catalog,
        marketplaces,
        executor_config,
        |_| {},
    ))
}

#[cfg(feature = "postgres")]
async fn job_store(config: &AppConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    use anyhow::Context;
    use catalogsync_infra::jobs::PostgresJobStore;

    if !config.use_persistent_stores {
        return Ok(Arc::new(InMemoryJobStore::new()));
    }
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for persistent stores")?;
    let store = PostgresJobStore::connect(url).await?;
    store.migrate().await?;
    tracing::info!("using postgres job store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn job_store(config: &AppConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    if config.use_persistent_stores {
        anyhow::bail!("persistent stores need the `postgres` feature");
    }
    Ok(Arc::new(InMemoryJobStore::new()))
}
