//! Item draw jobs: the deferred opaque/transparent draws and the overlays.
//!
//! Every draw job shares one contract:
//!
//! 1. fail with [`RenderError::MissingViewFrustum`] when the view has no camera;
//! 2. record one batch that binds the job's target framebuffer, then the
//!    viewport, scissor, projection and view of the camera;
//! 3. bind the lighting model (and, for forward-lit draws, clusters and haze);
//! 4. draw the items through the job's [`ShapePlumber`] in input order,
//!    with the frame's global shape key and the `max_drawn` cap applied;
//! 5. submit and publish the drawn count in the config's `num_drawn`.
//!
//! [`RenderError::MissingViewFrustum`]: umbra_core::errors::RenderError::MissingViewFrustum
//! [`ShapePlumber`]: crate::shapes::ShapePlumber

use serde::{Deserialize, Serialize};

use super::frame::LightingModel;
use super::lighting::LightClusters;
use crate::context::RenderContext;
use crate::gpu::{Batch, FramebufferId};
use crate::gpu::slots::uniform;
use crate::graph::{Job, Varying, Varyings};
use crate::scene::ItemBounds;
use crate::shapes::{SharedShapePlumber, render_shapes, render_state_sort_shapes};
use umbra_core::errors::Result;

// ─── Configs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub enabled: bool,
    /// Cap on items drawn per frame; `-1` draws everything.
    pub max_drawn: i32,
    /// Items drawn last frame.
    pub num_drawn: usize,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_drawn: -1,
            num_drawn: 0,
        }
    }
}

crate::impl_job_config!(DrawConfig, sanitize(this) {
    let changed = this.max_drawn < -1;
    this.max_drawn = this.max_drawn.max(-1);
    changed
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawStateSortConfig {
    pub enabled: bool,
    pub max_drawn: i32,
    pub num_drawn: usize,
    /// Group items by pipeline before drawing.
    pub state_sort: bool,
}

impl Default for DrawStateSortConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_drawn: -1,
            num_drawn: 0,
            state_sort: true,
        }
    }
}

crate::impl_job_config!(DrawStateSortConfig, sanitize(this) {
    let changed = this.max_drawn < -1;
    this.max_drawn = this.max_drawn.max(-1);
    changed
});

/// Opens the batch of a camera-space draw: viewport, scissor, jittered
/// projection and view of the current frustum.
///
/// The batch draws into whatever target is bound; debug views use this to
/// overlay the current framebuffer.
pub(crate) fn view_batch(name: &str, ctx: &RenderContext, job: &'static str) -> Result<Batch> {
    let mut batch = Batch::new(name);
    set_camera(&mut batch, ctx, job)?;
    Ok(batch)
}

/// [`view_batch`] bound to `framebuffer` first.
pub(crate) fn target_view_batch(
    name: &str,
    ctx: &RenderContext,
    job: &'static str,
    framebuffer: FramebufferId,
) -> Result<Batch> {
    let mut batch = Batch::new(name);
    batch.set_framebuffer(Some(framebuffer));
    set_camera(&mut batch, ctx, job)?;
    Ok(batch)
}

fn set_camera(batch: &mut Batch, ctx: &RenderContext, job: &'static str) -> Result<()> {
    let frustum = ctx.args.require_view_frustum(job)?;
    batch.set_viewport(ctx.args.viewport);
    batch.set_scissor(ctx.args.viewport);
    batch.set_projection(frustum.jittered_projection(ctx.args.jitter_ndc()));
    batch.set_view(frustum.view());
    Ok(())
}

// ─── DrawDeferred ──────────────────────────────────────────────────────────

pub struct DrawDeferredInputs {
    pub items: Varying<ItemBounds>,
    pub lighting_model: Varying<LightingModel>,
    pub light_clusters: Varying<LightClusters>,
    /// Lighting accumulation target.
    pub framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(DrawDeferredInputs {
    items,
    lighting_model,
    light_clusters,
    framebuffer
});

/// Forward-lit draw of items into the lighting buffer, in input order.
pub struct DrawDeferred {
    plumber: SharedShapePlumber,
}

impl DrawDeferred {
    #[must_use]
    pub fn new(plumber: SharedShapePlumber) -> Self {
        Self { plumber }
    }
}

impl Job for DrawDeferred {
    type Inputs = DrawDeferredInputs;
    type Output = ();
    type Config = DrawConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DrawConfig,
        inputs: &DrawDeferredInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let items = varyings.get(&inputs.items)?;
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        let clusters = varyings.get(&inputs.light_clusters)?;
        let target = *varyings.get(&inputs.framebuffer)?;

        let mut batch = target_view_batch("DrawDeferred", ctx, "DrawDeferred", target)?;
        batch.set_uniform_buffer(uniform::LIGHTING_MODEL, lighting_model.buffer);
        clusters.bind(&mut batch);
        if let Some(haze) = ctx.scene.haze_stage.buffer() {
            batch.set_uniform_buffer(uniform::HAZE_MODEL, Some(haze));
        }

        let drawn = {
            let plumber = self.plumber.read();
            render_shapes(
                ctx,
                &mut batch,
                &plumber,
                items,
                config.max_drawn,
                lighting_model.global_shape_key(),
            )
        };

        LightClusters::unbind(&mut batch);
        ctx.gpu.submit(batch)?;
        config.num_drawn = drawn;
        log::trace!("DrawDeferred: {drawn} of {} item(s)", items.len());
        Ok(())
    }
}

// ─── DrawStateSortDeferred ─────────────────────────────────────────────────

pub struct DrawStateSortInputs {
    pub items: Varying<ItemBounds>,
    pub lighting_model: Varying<LightingModel>,
    /// G-buffer for the deferred draw, primary buffer for overlays.
    pub framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(DrawStateSortInputs {
    items,
    lighting_model,
    framebuffer
});

/// G-buffer draw of opaque items, optionally grouped by pipeline.
pub struct DrawStateSortDeferred {
    plumber: SharedShapePlumber,
}

impl DrawStateSortDeferred {
    #[must_use]
    pub fn new(plumber: SharedShapePlumber) -> Self {
        Self { plumber }
    }
}

impl Job for DrawStateSortDeferred {
    type Inputs = DrawStateSortInputs;
    type Output = ();
    type Config = DrawStateSortConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DrawStateSortConfig,
        inputs: &DrawStateSortInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let items = varyings.get(&inputs.items)?;
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        let target = *varyings.get(&inputs.framebuffer)?;

        let mut batch = target_view_batch(
            "DrawStateSortDeferred",
            ctx,
            "DrawStateSortDeferred",
            target,
        )?;
        batch.set_uniform_buffer(uniform::LIGHTING_MODEL, lighting_model.buffer);

        let drawn = {
            let plumber = self.plumber.read();
            let global_key = lighting_model.global_shape_key();
            if config.state_sort {
                render_state_sort_shapes(ctx, &mut batch, &plumber, items, config.max_drawn, global_key)
            } else {
                render_shapes(ctx, &mut batch, &plumber, items, config.max_drawn, global_key)
            }
        };

        ctx.gpu.submit(batch)?;
        config.num_drawn = drawn;
        Ok(())
    }
}

// ─── DrawOverlay3D ─────────────────────────────────────────────────────────

/// Draws in-front or HUD layer items on top of the scene.
///
/// Depth is cleared first when there is anything to draw, so overlay items
/// only occlude each other.
pub struct DrawOverlay3D {
    plumber: SharedShapePlumber,
    opaque: bool,
}

impl DrawOverlay3D {
    #[must_use]
    pub fn new(plumber: SharedShapePlumber, opaque: bool) -> Self {
        Self { plumber, opaque }
    }
}

impl Job for DrawOverlay3D {
    type Inputs = DrawStateSortInputs;
    type Output = ();
    type Config = DrawConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DrawConfig,
        inputs: &DrawStateSortInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let items = varyings.get(&inputs.items)?;
        config.num_drawn = 0;
        if items.is_empty() {
            return Ok(());
        }
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        let target = *varyings.get(&inputs.framebuffer)?;

        let name = if self.opaque {
            "DrawOverlay3D.opaque"
        } else {
            "DrawOverlay3D.transparent"
        };
        let mut batch = target_view_batch(name, ctx, "DrawOverlay3D", target)?;
        if self.opaque {
            batch.clear(None, Some(1.0), None);
        }
        batch.set_uniform_buffer(uniform::LIGHTING_MODEL, lighting_model.buffer);

        let drawn = {
            let plumber = self.plumber.read();
            render_shapes(
                ctx,
                &mut batch,
                &plumber,
                items,
                config.max_drawn,
                lighting_model.global_shape_key(),
            )
        };

        ctx.gpu.submit(batch)?;
        config.num_drawn = drawn;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BatchCommand, FrameRecord};
    use crate::graph::{JobConfig, Task};
    use crate::jobs::frame::{MakeLightingModel, PreparePrimaryFramebuffer};
    use crate::scene::{Item, ShapeItem};
    use crate::shapes::ShapeKey;
    use crate::shapes::pipelines::deferred_pipelines;
    use glam::{Mat4, Quat, Vec3};
    use umbra_core::errors::RenderError;
    use umbra_core::math::{Aabb, ViewFrustum, Viewport};

    fn context_with_camera() -> RenderContext {
        let mut ctx = RenderContext::default();
        ctx.args.viewport = Viewport::from_size(64, 64);
        ctx.args.view_frustum = Some(ViewFrustum::perspective(
            Vec3::ZERO,
            Quat::IDENTITY,
            1.0,
            1.0,
            0.1,
            100.0,
        ));
        ctx
    }

    fn add_shapes(ctx: &mut RenderContext, keys: &[ShapeKey]) -> ItemBounds {
        keys.iter()
            .map(|&key| {
                let id = ctx.scene.add_item(Item::shape(
                    Aabb::from_sphere(Vec3::NEG_Z * 5.0, 1.0),
                    ShapeItem::new(Mat4::IDENTITY, key, 3),
                ));
                ctx.scene.item_bound(id).unwrap()
            })
            .collect()
    }

    #[derive(Debug)]
    struct StateSortRun {
        frame: FrameRecord,
        num_drawn: usize,
        target: FramebufferId,
    }

    fn run_state_sort(
        ctx: &mut RenderContext,
        items: ItemBounds,
        config: DrawStateSortConfig,
    ) -> Result<StateSortRun> {
        let plumber = deferred_pipelines(&mut ctx.gpu).shared();
        let (mut task, framebuffer) = Task::<ItemBounds>::build("Draw", |b, input| {
            let lighting_model = b.add_job("LightingModel", MakeLightingModel::default(), ())?;
            let framebuffer = b.add_job("Target", PreparePrimaryFramebuffer::default(), ())?;
            b.add_job_with_config(
                "DrawOpaque",
                DrawStateSortDeferred::new(plumber),
                DrawStateSortInputs {
                    items: input,
                    lighting_model,
                    framebuffer,
                },
                config,
            )?;
            Ok(framebuffer)
        })?;

        ctx.gpu.begin_frame()?;
        if let Err(err) = task.run(ctx, items) {
            ctx.gpu.abort_frame();
            return Err(err);
        }
        let frame = ctx.gpu.end_frame()?;
        let num_drawn = task
            .configs()
            .get::<DrawStateSortConfig>("Draw.DrawOpaque")?
            .read()
            .num_drawn;
        Ok(StateSortRun {
            frame,
            num_drawn,
            target: *task.get(&framebuffer)?,
        })
    }

    #[test]
    fn test_draw_config_clamps_max_drawn() {
        let mut config = DrawConfig {
            max_drawn: -7,
            ..DrawConfig::default()
        };
        assert!(config.sanitize());
        assert_eq!(config.max_drawn, -1);
        assert!(!config.sanitize());
    }

    #[test]
    fn test_state_sort_draw_respects_cap() {
        let mut ctx = context_with_camera();
        let items = add_shapes(&mut ctx, &[ShapeKey::MATERIAL; 5]);
        let config = DrawStateSortConfig {
            max_drawn: 2,
            ..DrawStateSortConfig::default()
        };
        let run = run_state_sort(&mut ctx, items, config).unwrap();
        assert_eq!(run.num_drawn, 2);
        assert_eq!(run.frame.batch("DrawStateSortDeferred").unwrap().draw_count(), 2);
    }

    #[test]
    fn test_state_sort_draw_binds_its_target_first() {
        let mut ctx = context_with_camera();
        let items = add_shapes(&mut ctx, &[ShapeKey::MATERIAL; 2]);
        let run = run_state_sort(&mut ctx, items, DrawStateSortConfig::default()).unwrap();
        let batch = run.frame.batch("DrawStateSortDeferred").unwrap();
        assert_eq!(batch.commands()[0], BatchCommand::SetFramebuffer(Some(run.target)));
        assert_eq!(batch.framebuffers().as_slice(), [Some(run.target)]);
    }

    #[test]
    fn test_missing_frustum_fails() {
        let mut ctx = RenderContext::default();
        let items = add_shapes(&mut ctx, &[ShapeKey::MATERIAL]);
        let err = run_state_sort(&mut ctx, items, DrawStateSortConfig::default()).unwrap_err();
        assert!(matches!(err, RenderError::MissingViewFrustum { .. }));
    }
}
