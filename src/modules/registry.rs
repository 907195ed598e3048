//! Ordered, toggleable collection of transform modules

use crate::modules::{Module, ModuleChain, ModuleName};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errors surfaced to the configuration collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a module named '{0}' is already registered")]
    DuplicateName(String),

    #[error("no module named '{0}'")]
    NotFound(String),

    #[error("invalid module name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Operator-facing view of one registered module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: ModuleName,
    pub description: String,
    pub enabled: bool,
    pub order: usize,
}

struct RegisteredModule {
    name: ModuleName,
    module: Arc<dyn Module>,
    enabled: bool,
}

/// Registry owning every module for the process lifetime
///
/// Registration order is the canonical application order for both the
/// request and the response pass.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: RwLock<Vec<RegisteredModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from modules in their application order
    pub fn with_modules(
        modules: impl IntoIterator<Item = Arc<dyn Module>>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new();
        for module in modules {
            registry.register(module)?;
        }
        Ok(registry)
    }

    pub fn register(&self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        let name = ModuleName::try_new(module.name().to_string()).map_err(|e| {
            RegistryError::InvalidName {
                name: module.name().to_string(),
                reason: e.to_string(),
            }
        })?;

        let mut entries = self.entries.write();
        if entries.iter().any(|entry| entry.name == name) {
            return Err(RegistryError::DuplicateName(name.into_inner()));
        }

        let enabled = module.enabled_by_default();
        info!(module = %name, enabled, order = entries.len(), "Registered module");
        entries.push(RegisteredModule {
            name,
            module,
            enabled,
        });
        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        let entry = entries
            .iter_mut()
            .find(|entry| entry.name.as_ref() == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        if entry.enabled != enabled {
            info!(module = %entry.name, enabled, "Module toggled");
        }
        entry.enabled = enabled;
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> Result<bool, RegistryError> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.name.as_ref() == name)
            .map(|entry| entry.enabled)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Currently enabled modules in registration order
    ///
    /// Reads the live flags; callers keep the returned chain for a whole call
    /// so a toggle never lands between its request and response passes.
    pub fn enabled_modules(&self) -> ModuleChain {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| Arc::clone(&entry.module))
            .collect()
    }

    pub fn describe(&self) -> Vec<ModuleInfo> {
        self.entries
            .read()
            .iter()
            .enumerate()
            .map(|(order, entry)| Self::info(order, entry))
            .collect()
    }

    pub fn describe_one(&self, name: &str) -> Result<ModuleInfo, RegistryError> {
        self.entries
            .read()
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.name.as_ref() == name)
            .map(|(order, entry)| Self::info(order, entry))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Enabled flag of every module, keyed by name
    pub fn flags(&self) -> Vec<(ModuleName, bool)> {
        self.entries
            .read()
            .iter()
            .map(|entry| (entry.name.clone(), entry.enabled))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn info(order: usize, entry: &RegisteredModule) -> ModuleInfo {
        ModuleInfo {
            name: entry.name.clone(),
            description: entry.module.description().to_string(),
            enabled: entry.enabled,
            order,
        }
    }
}
