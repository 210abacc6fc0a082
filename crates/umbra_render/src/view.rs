//! Frame driver for one view.

use crate::context::{RenderArgs, RenderContext};
use crate::deferred::RenderDeferredTask;
use crate::gpu::{FrameRecord, GpuContext};
use crate::graph::ConfigRegistry;
use crate::jobs::FetchCullSortOutput;
use crate::scene::Scene;
use crate::settings::RenderSettings;
use umbra_core::errors::Result;

/// Owns the render context and the main view task, and brackets every run
/// of the task in a GPU frame.
pub struct RenderView {
    ctx: RenderContext,
    main_view: RenderDeferredTask,
}

impl RenderView {
    pub fn new(settings: &RenderSettings, scene: Scene) -> Result<Self> {
        let mut gpu = GpuContext::new(settings.limits);
        let main_view = RenderDeferredTask::build(settings, &mut gpu)?;
        Ok(Self {
            ctx: RenderContext::new(gpu, scene),
            main_view,
        })
    }

    /// Renders one frame and returns what it recorded.
    ///
    /// A failing job aborts the frame: nothing recorded so far is kept and
    /// the next frame starts clean.
    pub fn render(&mut self, args: RenderArgs, items: FetchCullSortOutput) -> Result<FrameRecord> {
        self.ctx.args = args;
        self.ctx.gpu.begin_frame()?;
        if let Err(err) = self.main_view.run(&mut self.ctx, items) {
            log::error!("Frame {} aborted: {err}", self.ctx.args.frame_index);
            self.ctx.gpu.abort_frame();
            return Err(err);
        }
        Ok(self.ctx.gpu.end_frame()?)
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    #[inline]
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    #[inline]
    #[must_use]
    pub fn main_view(&self) -> &RenderDeferredTask {
        &self.main_view
    }

    #[inline]
    #[must_use]
    pub fn configs(&self) -> &ConfigRegistry {
        self.main_view.configs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::errors::RenderError;
    use umbra_core::math::Viewport;

    #[test]
    fn test_missing_camera_aborts_frame() {
        let mut view = RenderView::new(&RenderSettings::default(), Scene::default()).unwrap();
        let args = RenderArgs {
            viewport: Viewport::from_size(32, 32),
            ..RenderArgs::default()
        };
        let err = view.render(args.clone(), FetchCullSortOutput::default());
        assert!(matches!(err, Err(RenderError::MissingViewFrustum { .. })));

        // The aborted frame left no frame open behind it.
        assert!(view.context_mut().gpu.begin_frame().is_ok());
    }
}
