//! Explicit name → factory registration of analysis modules

use super::{EventAnalyzer, ParameterSet};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

pub type ModuleFactory = fn(&ParameterSet) -> Box<dyn EventAnalyzer>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("module '{0}' is already registered")]
    Duplicate(String),

    #[error("no module named '{0}' is registered")]
    Unknown(String),
}

/// Registry the caller populates before handing it to a host.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: ModuleFactory,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        debug!(module = %name, "Registered module");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Construct a registered module.
    pub fn create(
        &self,
        name: &str,
        params: &ParameterSet,
    ) -> Result<Box<dyn EventAnalyzer>, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        Ok(factory(params))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
