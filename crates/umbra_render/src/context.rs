//! Render Context
//!
//! The mutable state every job of a frame shares:
//!
//! - [`GpuContext`]: resource handles and the command recorder;
//! - [`Scene`]: items, per-frame stages, selections and fade transitions;
//! - [`RenderArgs`]: the per-view arguments (camera, viewport, timing).
//!
//! There is no transient "current batch" or "global shape key" slot here.
//! Draw jobs build a local [`Batch`](crate::gpu::Batch), pass it explicitly
//! to the shape helpers, and hand it to [`GpuContext::submit`] when done.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::gpu::{FramebufferId, GpuContext, TextureId};
use crate::scene::Scene;
use umbra_core::errors::{RenderError, Result};
use umbra_core::math::{ViewFrustum, Viewport};

/// What the current view renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    #[default]
    Default,
    Shadow,
    Mirror,
    SecondaryCamera,
}

/// Output layout of the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Mono,
    StereoHmd,
    StereoMonitor,
}

/// Per-view arguments of one frame.
#[derive(Debug, Clone, Default)]
pub struct RenderArgs {
    /// Camera of the view. Draw jobs fail without one.
    pub view_frustum: Option<ViewFrustum>,
    pub viewport: Viewport,
    pub render_mode: RenderMode,
    pub display_mode: DisplayMode,
    pub frame_index: u64,
    /// Seconds since the previous frame.
    pub delta_time: f32,
    /// Sub-pixel projection offset in pixels, written by the jitter job.
    pub jitter: Vec2,
    /// Where `Blit` copies the final image; `None` is the swap chain.
    pub blit_target: Option<FramebufferId>,
    /// Overlay texture composited by the HUD job.
    pub hud_texture: Option<TextureId>,
}

impl RenderArgs {
    /// Camera of the view, or the precondition error naming `job`.
    pub fn require_view_frustum(&self, job: &'static str) -> Result<&ViewFrustum> {
        self.view_frustum
            .as_ref()
            .ok_or(RenderError::MissingViewFrustum { job })
    }

    /// Jitter converted to NDC units for the current viewport.
    #[must_use]
    pub fn jitter_ndc(&self) -> Vec2 {
        if self.viewport.is_empty() {
            return Vec2::ZERO;
        }
        Vec2::new(
            2.0 * self.jitter.x / self.viewport.width as f32,
            2.0 * self.jitter.y / self.viewport.height as f32,
        )
    }
}

/// Shared mutable state of a frame.
#[derive(Default)]
pub struct RenderContext {
    pub gpu: GpuContext,
    pub scene: Scene,
    pub args: RenderArgs,
}

impl RenderContext {
    #[must_use]
    pub fn new(gpu: GpuContext, scene: Scene) -> Self {
        Self {
            gpu,
            scene,
            args: RenderArgs::default(),
        }
    }
}
