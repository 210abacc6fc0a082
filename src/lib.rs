//! # Umbra
//!
//! Deferred render task graph of a networked VR client.
//!
//! The graph is a flat, ordered list of jobs wired together by typed
//! varyings. Each job has a config block addressable by its dotted path
//! (`RenderMainView.Bloom.BloomApply`), so any stage can be toggled or
//! tuned at runtime.
//!
//! ```no_run
//! use umbra::prelude::*;
//!
//! # fn main() -> umbra::Result<()> {
//! let mut view = RenderView::new(&RenderSettings::default(), Scene::default())?;
//! view.configs().set_enabled("RenderMainView.Bloom", false)?;
//! let args = RenderArgs {
//!     view_frustum: Some(ViewFrustum::perspective(
//!         Vec3::ZERO,
//!         Quat::IDENTITY,
//!         1.2,
//!         16.0 / 9.0,
//!         0.1,
//!         500.0,
//!     )),
//!     viewport: Viewport::from_size(1920, 1080),
//!     ..RenderArgs::default()
//! };
//! let frame = view.render(args, FetchCullSortOutput::default())?;
//! println!("{} batches", frame.batches.len());
//! # Ok(())
//! # }
//! ```

pub use umbra_core::{errors, math};
pub use umbra_core::{
    Aabb, ConfigError, GpuError, GraphError, RenderError, Result, ViewFrustum, Viewport,
};
pub use umbra_render::{
    DisplayMode, MAIN_VIEW_TASK, MainViewOutputs, MainViewPlumbers, RenderArgs, RenderContext,
    RenderDeferredTask, RenderMode, RenderSettings, RenderView,
};
pub use umbra_render::{context, deferred, gpu, graph, jobs, scene, settings, shapes, view};
pub use umbra_render::{impl_job_config, job_inputs, job_outputs};

pub use glam;

pub mod prelude {
    pub use crate::gpu::{Batch, FrameRecord, GpuContext, GpuLimits};
    pub use crate::graph::{
        ConfigRegistry, DebugConfig, EnabledConfig, Job, JobConfig, JobInputs, JobOutputs, Task,
        TaskBuilder, Varying, Varyings,
    };
    pub use crate::jobs::FetchCullSortOutput;
    pub use crate::scene::{Item, ItemBound, ItemBounds, ItemKey, Layer, Light, Scene, ShapeItem};
    pub use crate::shapes::{ShapeKey, ShapePlumber};
    pub use crate::{
        Aabb, RenderArgs, RenderContext, RenderDeferredTask, RenderError, RenderSettings,
        RenderView, ViewFrustum, Viewport,
    };
    pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
}
