//! Datasource to dialect resolution.
//!
//! The product name of a datasource is probed once and the resolved
//! [`DatabaseKind`] is cached for the life of the process. Concurrent first
//! calls for the same datasource agree on a single cached value.

use std::sync::{Arc, LazyLock};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, warn};

use super::DatabaseKind;

/// Dialect used when a product name cannot be matched
pub const FALLBACK_DIALECT: DatabaseKind = DatabaseKind::MySql;

/// Source of a datasource's database product name
pub trait ProductNameProbe {
    /// Product name as reported by the driver, `None` when the probe fails
    fn database_product_name(&self, datasource: &str) -> Option<String>;
}

impl<F> ProductNameProbe for F
where
    F: Fn(&str) -> Option<String>
{
    fn database_product_name(&self, datasource: &str) -> Option<String> {
        self(datasource)
    }
}

/// Probe reporting the same product name for every datasource
#[derive(Debug, Clone)]
pub struct FixedProductName(pub String);

impl ProductNameProbe for FixedProductName {
    fn database_product_name(&self, _datasource: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

static GLOBAL_FACTORY: LazyLock<Arc<DialectFactory>> =
    LazyLock::new(|| Arc::new(DialectFactory::new()));

/// Process-wide factory
pub fn global_factory() -> Arc<DialectFactory> {
    Arc::clone(&GLOBAL_FACTORY)
}

/// Caches the resolved dialect per datasource
#[derive(Debug, Default)]
pub struct DialectFactory {
    cache: DashMap<String, DatabaseKind>
}

impl DialectFactory {
    pub fn new() -> Self {
        Self {
            cache: DashMap::with_capacity(16)
        }
    }

    /// Dialect of `datasource`, probing its product name on first use.
    ///
    /// Unknown products, blank names and failed probes resolve to
    /// [`FALLBACK_DIALECT`]; the fallback is cached too, so the warning is
    /// logged once per datasource. The probe runs under the cache entry
    /// lock and must not call back into this factory.
    pub fn resolve<P>(&self, datasource: &str, probe: &P) -> DatabaseKind
    where
        P: ProductNameProbe + ?Sized
    {
        if let Some(kind) = self.cache.get(datasource) {
            return *kind;
        }
        match self.cache.entry(datasource.to_string()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let product = probe.database_product_name(datasource);
                let kind = match product.as_deref().and_then(DatabaseKind::from_product_name) {
                    Some(kind) => {
                        debug!(datasource, dialect = kind.name(), "dialect resolved");
                        kind
                    }
                    None => {
                        warn!(
                            datasource,
                            product = product.as_deref().unwrap_or("<unavailable>"),
                            fallback = FALLBACK_DIALECT.name(),
                            "unknown database product, using fallback dialect"
                        );
                        FALLBACK_DIALECT
                    }
                };
                *entry.insert(kind)
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
