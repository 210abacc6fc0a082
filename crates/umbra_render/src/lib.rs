//! Umbra render
//!
//! The render task graph of the Umbra client and the deferred main view
//! built on it.
//!
//! - [`graph`]: typed varyings, jobs, nested tasks and the config registry
//! - [`gpu`]: the recording GPU layer (batches, resources, timers)
//! - [`scene`]: render items and the per-frame light, haze and background stages
//! - [`shapes`]: shape keys and the plumber that maps them to pipelines
//! - [`jobs`]: every job of the main view
//! - [`deferred`]: [`RenderDeferredTask`], the main view graph
//! - [`view`]: [`RenderView`], which brackets the graph in GPU frames

pub mod context;
pub mod deferred;
pub mod gpu;
pub mod graph;
pub mod jobs;
pub mod scene;
pub mod settings;
pub mod shapes;
pub mod view;

pub use context::{DisplayMode, RenderArgs, RenderContext, RenderMode};
pub use deferred::{MAIN_VIEW_TASK, MainViewOutputs, MainViewPlumbers, RenderDeferredTask};
pub use settings::RenderSettings;
pub use view::RenderView;
