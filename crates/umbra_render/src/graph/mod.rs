//! Render task graph
//!
//! Jobs, typed varyings, nested tasks and the config registry.
//!
//! - [`varying`]: typed handles and the per-frame store
//! - [`job`]: the [`Job`] trait, input bundles and config blocks
//! - [`task`]: [`TaskBuilder`] and the [`Task`] executor
//! - [`config`]: path-addressed [`ConfigRegistry`]

pub mod config;
pub mod job;
pub mod task;
pub mod varying;

pub use config::{ConfigRegistry, SharedConfig};
pub use job::{DebugConfig, EnabledConfig, Job, JobConfig, JobInputs, TaskConfig};
pub use task::{Dependency, JobDependencies, Task, TaskBuilder};
pub use varying::{AnyVarying, Field, GraphId, JobOutputs, Varying, Varyings};
