//! Config registry: hierarchical, path-addressed access to every job's config.
//!
//! Paths are dotted and mirror the task nesting, e.g.
//! `RenderMainView.Bloom.BloomThreshold`. Each entry is shared with the job
//! that owns it (`Arc<RwLock<C>>`), so updates made between frames are seen
//! by the next `run`.
//!
//! # JSON
//!
//! [`ConfigRegistry::to_json`] exports `{ path: config }` for every entry.
//! [`ConfigRegistry::apply_json`] accepts the same shape with any subset of
//! paths and fields; missing fields keep their current value, and the result
//! is sanitized before it is stored. An update either applies to every path
//! it names or to none of them.

use std::any::{Any, type_name};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use super::job::JobConfig;
use umbra_core::errors::ConfigError;

/// A config shared between its job and the registry.
pub type SharedConfig<C> = Arc<RwLock<C>>;

/// Object-safe view of a [`JobConfig`].
pub(crate) trait ErasedConfig: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);
    fn to_json(&self) -> Result<Value, ConfigError>;
    /// Builds the sanitized config `patch` describes without storing it.
    fn stage_json(&self, patch: &Value, path: &str) -> Result<StagedConfig, ConfigError>;
    /// Stores a config built by [`stage_json`](Self::stage_json).
    fn commit(&mut self, staged: StagedConfig);
}

/// A validated config update waiting to be committed.
pub(crate) type StagedConfig = Box<dyn Any + Send>;

impl<C: JobConfig> ErasedConfig for C {
    fn is_enabled(&self) -> bool {
        JobConfig::is_enabled(self)
    }

    fn set_enabled(&mut self, enabled: bool) {
        JobConfig::set_enabled(self, enabled);
    }

    fn to_json(&self) -> Result<Value, ConfigError> {
        Ok(serde_json::to_value(self)?)
    }

    fn stage_json(&self, patch: &Value, path: &str) -> Result<StagedConfig, ConfigError> {
        let Value::Object(patch) = patch else {
            return Err(ConfigError::NotAnObject(path.to_owned()));
        };

        let mut current = serde_json::to_value(self)?;
        match &mut current {
            Value::Object(fields) => {
                for (key, value) in patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            _ => return Err(ConfigError::NotAnObject(path.to_owned())),
        }

        let mut updated: C = serde_json::from_value(current)?;
        if updated.sanitize() {
            log::warn!("Config '{path}' had out-of-range values; clamped");
        }
        Ok(Box::new(updated))
    }

    fn commit(&mut self, staged: StagedConfig) {
        if let Ok(updated) = staged.downcast::<C>() {
            *self = *updated;
        }
    }
}

struct ConfigEntry {
    erased: Arc<RwLock<dyn ErasedConfig>>,
    typed: Box<dyn Any + Send + Sync>,
}

/// Registry of every job and sub-task config of one task, keyed by dotted path.
#[derive(Default)]
pub struct ConfigRegistry {
    entries: FxHashMap<String, ConfigEntry>,
    order: Vec<String>,
}

impl ConfigRegistry {
    pub(crate) fn register<C: JobConfig>(&mut self, path: String, config: SharedConfig<C>) {
        let erased: Arc<RwLock<dyn ErasedConfig>> = config.clone();
        self.order.push(path.clone());
        self.entries.insert(
            path,
            ConfigEntry {
                erased,
                typed: Box::new(config),
            },
        );
    }

    /// Typed handle to the config at `path`.
    pub fn get<C: JobConfig>(&self, path: &str) -> Result<SharedConfig<C>, ConfigError> {
        let entry = self.entry(path)?;
        entry
            .typed
            .downcast_ref::<SharedConfig<C>>()
            .cloned()
            .ok_or_else(|| ConfigError::TypeMismatch {
                path: path.to_owned(),
                expected: type_name::<C>(),
            })
    }

    pub fn is_enabled(&self, path: &str) -> Result<bool, ConfigError> {
        Ok(self.entry(path)?.erased.read().is_enabled())
    }

    pub fn set_enabled(&self, path: &str, enabled: bool) -> Result<(), ConfigError> {
        self.entry(path)?.erased.write().set_enabled(enabled);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Paths in registration (declaration) order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Exports every config as `{ path: config }`.
    pub fn to_json(&self) -> Result<Value, ConfigError> {
        let mut out = Map::new();
        for path in &self.order {
            let value = self.entry(path)?.erased.read().to_json()?;
            out.insert(path.clone(), value);
        }
        Ok(Value::Object(out))
    }

    /// Exports a single config.
    pub fn config_json(&self, path: &str) -> Result<Value, ConfigError> {
        self.entry(path)?.erased.read().to_json()
    }

    /// Applies a partial `{ path: { field: value } }` update.
    ///
    /// Every patch is resolved, deserialized and sanitized before anything
    /// is written; any failure leaves all configs unchanged.
    pub fn apply_json(&self, value: &Value) -> Result<(), ConfigError> {
        let Value::Object(updates) = value else {
            return Err(ConfigError::NotAnObject(String::new()));
        };

        let staged = updates
            .iter()
            .map(|(path, patch)| {
                let entry = self.entry(path)?;
                let config = entry.erased.read().stage_json(patch, path)?;
                Ok((entry, config))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        for (entry, config) in staged {
            entry.erased.write().commit(config);
        }
        Ok(())
    }

    fn entry(&self, path: &str) -> Result<&ConfigEntry, ConfigError> {
        self.entries
            .get(path)
            .ok_or_else(|| ConfigError::UnknownPath(path.to_owned()))
    }
}

impl std::fmt::Debug for ConfigRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigRegistry")
            .field("paths", &self.order)
            .finish()
    }
}
