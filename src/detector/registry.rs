use super::{AdvisoryDriver, AdvisoryStore, Driver, OsFamily};
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from OS family key to driver.
///
/// Built once through [`DriverRegistryBuilder`] and read concurrently
/// afterwards. [`DriverRegistry::register`] needs `&mut self`, so a registry
/// already shared with a [`Detector`](super::Detector) cannot change under
/// in-flight detections.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    /// Builder preloaded with an advisory-backed driver for every built-in family.
    ///
    /// CentOS and Red Hat share a single driver instance.
    pub fn with_advisories(store: Arc<dyn AdvisoryStore>) -> DriverRegistryBuilder {
        let mut builder = DriverRegistryBuilder::default();
        let mut shared: HashMap<OsFamily, Arc<dyn Driver>> = HashMap::new();

        for family in OsFamily::ALL {
            let advisory_family = family.advisory_family();
            let driver = shared
                .entry(advisory_family)
                .or_insert_with(|| {
                    Arc::new(AdvisoryDriver::new(advisory_family, store.clone())) as Arc<dyn Driver>
                })
                .clone();
            builder = builder.register(family.as_str(), driver);
        }

        builder
    }

    /// Inserts or replaces the driver for `family`.
    pub fn register(&mut self, family: &str, driver: Arc<dyn Driver>) {
        self.drivers.insert(normalize(family), driver);
    }

    pub fn get(&self, family: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(&normalize(family)).cloned()
    }

    pub fn contains(&self, family: &str) -> bool {
        self.drivers.contains_key(&normalize(family))
    }

    /// Registered family keys, sorted.
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        families.sort_unstable();
        families
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[derive(Default)]
pub struct DriverRegistryBuilder {
    registry: DriverRegistry,
}

impl DriverRegistryBuilder {
    pub fn register(mut self, family: &str, driver: Arc<dyn Driver>) -> Self {
        self.registry.register(family, driver);
        self
    }

    pub fn build(self) -> DriverRegistry {
        self.registry
    }
}

fn normalize(family: &str) -> String {
    family.trim().to_lowercase()
}
