//! Job Trait
//!
//! A job is one unit of per-frame work in a task graph. It declares three
//! associated types:
//!
//! - `Inputs`: a plain struct of [`Varying`] handles, checked at compile time
//!   against the producers' output types;
//! - `Output`: the value it publishes (its `Default` is what downstream jobs
//!   see when the job is disabled);
//! - `Config`: its serializable parameter block.
//!
//! # Execution contract
//!
//! - `run` receives the shared [`RenderContext`] mutably, its config mutably
//!   (to write back statistics such as `num_drawn`), its input handles and
//!   the frame's [`Varyings`] store (read-only).
//! - A disabled job is not called; its slot receives `Output::default()`.
//!   Jobs that keep paired bookkeeping consistent (timer ranges) set
//!   [`Job::ALWAYS_RUN`].
//! - An `Err` aborts the frame.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::varying::{AnyVarying, Varying, Varyings};
use crate::context::RenderContext;
use umbra_core::errors::Result;

/// A unit of per-frame work.
pub trait Job: 'static {
    type Inputs: JobInputs;
    type Output: Default + 'static;
    type Config: JobConfig;

    /// Run even when the config is disabled.
    const ALWAYS_RUN: bool = false;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut Self::Config,
        inputs: &Self::Inputs,
        varyings: &Varyings,
    ) -> Result<Self::Output>;
}

// ─── Inputs ────────────────────────────────────────────────────────────────

/// Input bundle of a job: enumerates the varyings it reads.
pub trait JobInputs: 'static {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying));
}

impl JobInputs for () {
    fn visit(&self, _visitor: &mut dyn FnMut(AnyVarying)) {}
}

impl<T: 'static> JobInputs for Varying<T> {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying)) {
        visitor(self.as_any());
    }
}

impl<T: JobInputs> JobInputs for Option<T> {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying)) {
        if let Some(inner) = self {
            inner.visit(visitor);
        }
    }
}

impl<A: JobInputs, B: JobInputs> JobInputs for (A, B) {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying)) {
        self.0.visit(visitor);
        self.1.visit(visitor);
    }
}

impl<T: JobInputs> JobInputs for Vec<T> {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying)) {
        for input in self {
            input.visit(visitor);
        }
    }
}

/// Implements [`JobInputs`] for a struct whose fields are all [`JobInputs`].
///
/// ```rust,ignore
/// pub struct DrawInputs {
///     pub items: Varying<ItemBounds>,
///     pub lighting_model: Varying<LightingModel>,
/// }
/// job_inputs!(DrawInputs { items, lighting_model });
/// ```
#[macro_export]
macro_rules! job_inputs {
    ($ty:ident { $( $field:ident ),* $(,)? }) => {
        impl $crate::graph::JobInputs for $ty {
            fn visit(&self, visitor: &mut dyn FnMut($crate::graph::AnyVarying)) {
                $( $crate::graph::JobInputs::visit(&self.$field, visitor); )*
            }
        }
    };
}

// ─── Config ────────────────────────────────────────────────────────────────

/// Parameter block of a job.
///
/// Configs are owned by the task, shared with the [`ConfigRegistry`]
/// (`crate::graph::ConfigRegistry`) and read at the start of every run.
pub trait JobConfig: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// Clamps out-of-range values. Returns `true` if anything changed.
    fn sanitize(&mut self) -> bool {
        false
    }
}

/// Implements [`JobConfig`] for a struct with a `pub enabled: bool` field.
///
/// An optional `sanitize(this) { ... }` block receives `&mut Self` as `this`
/// and must evaluate to `true` when it changed a value.
#[macro_export]
macro_rules! impl_job_config {
    ($ty:ty) => {
        impl $crate::graph::JobConfig for $ty {
            fn is_enabled(&self) -> bool {
                self.enabled
            }

            fn set_enabled(&mut self, enabled: bool) {
                self.enabled = enabled;
            }
        }
    };
    ($ty:ty, sanitize($this:ident) $body:block) => {
        impl $crate::graph::JobConfig for $ty {
            fn is_enabled(&self) -> bool {
                self.enabled
            }

            fn set_enabled(&mut self, enabled: bool) {
                self.enabled = enabled;
            }

            fn sanitize(&mut self) -> bool {
                let $this = self;
                $body
            }
        }
    };
}

/// Config for jobs with nothing to tune. Enabled by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledConfig {
    pub enabled: bool,
}

impl Default for EnabledConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

crate::impl_job_config!(EnabledConfig);

/// Config for debug visualizers. Disabled by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

crate::impl_job_config!(DebugConfig);

/// Config of a (sub-)task. Disabling it skips every child job.
pub type TaskConfig = EnabledConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert!(EnabledConfig::default().is_enabled());
        assert!(!DebugConfig::default().is_enabled());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: EnabledConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
    }
}
