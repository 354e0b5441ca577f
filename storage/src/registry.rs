use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use common::config::{DataSourceConfig, SourceType};
use common::datasource::DataSource;
use common::err::{CResult, EngineError};

use crate::mvcc::engine::MemoryEngine;

/// Builds a source instance from its configuration.
pub type SourceFactory = fn(&DataSourceConfig) -> CResult<Arc<dyn DataSource>>;

static REGISTRY: Lazy<RwLock<Option<HashMap<SourceType, SourceFactory>>>> =
    Lazy::new(|| RwLock::new(None));

fn memory_factory(config: &DataSourceConfig) -> CResult<Arc<dyn DataSource>> {
    Ok(MemoryEngine::from_config(config))
}

/// Install the process-wide factory table. The memory engine registers
/// itself; drivers for remote and file sources register here when their
/// crates are linked in.
pub fn init() {
    let mut guard = REGISTRY.write().unwrap();
    if guard.is_none() {
        let mut factories: HashMap<SourceType, SourceFactory> = HashMap::new();
        factories.insert(SourceType::Memory, memory_factory);
        *guard = Some(factories);
        debug!("data source factory registry initialized");
    }
}

pub fn shutdown() {
    *REGISTRY.write().unwrap() = None;
}

pub fn register(source_type: SourceType, factory: SourceFactory) -> CResult<()> {
    let mut guard = REGISTRY.write().unwrap();
    let factories = guard
        .as_mut()
        .ok_or_else(|| EngineError::Internal("factory registry not initialized".to_string()))?;
    factories.insert(source_type, factory);
    Ok(())
}

pub fn create(config: &DataSourceConfig) -> CResult<Arc<dyn DataSource>> {
    let guard = REGISTRY.read().unwrap();
    let factories = guard
        .as_ref()
        .ok_or_else(|| EngineError::Internal("factory registry not initialized".to_string()))?;
    let factory = factories.get(&config.source_type).ok_or_else(|| {
        EngineError::Config(format!(
            "no driver registered for data source type {:?} (source '{}')",
            config.source_type, config.name
        ))
    })?;
    factory(config)
}
