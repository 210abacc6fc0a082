//! Outline highlighting of selected items.
//!
//! Each outline group renders its selection into a private mask target with
//! the mask plumber, then draws the outline and fill over the primary
//! framebuffer from that mask and the scene depth.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{
    DEPTH_STENCIL_FORMAT, JobFramebuffer, LDR_FORMAT, LazyPipeline, bind_frame_transform,
    pass_batch, reference_size, upload_uniform,
};
use super::draw::target_view_batch;
use super::frame::DeferredFrameTransform;
use crate::context::RenderContext;
use crate::gpu::slots::{texture, uniform};
use crate::gpu::uniforms::HighlightUniforms;
use crate::gpu::{BufferId, FramebufferId, PipelineState};
use crate::graph::{EnabledConfig, Job, Varying, Varyings};
use crate::scene::ItemBounds;
use crate::shapes::{ShapeKey, SharedShapePlumber, render_shapes};
use umbra_core::errors::Result;

/// Mask of one outline group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightMask {
    /// `None` when the group had nothing to draw.
    pub framebuffer: Option<FramebufferId>,
    pub drawn: usize,
}

pub struct HighlightMaskInputs {
    pub items: Varying<ItemBounds>,
    pub deferred_framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(HighlightMaskInputs {
    items,
    deferred_framebuffer
});

/// Renders a group's selected items into its mask target.
pub struct DrawHighlightMask {
    plumber: SharedShapePlumber,
    mask: JobFramebuffer,
}

impl DrawHighlightMask {
    #[must_use]
    pub fn new(plumber: SharedShapePlumber) -> Self {
        Self {
            plumber,
            mask: JobFramebuffer::new("HighlightMask")
                .color(LDR_FORMAT)
                .depth_stencil(DEPTH_STENCIL_FORMAT),
        }
    }
}

impl Job for DrawHighlightMask {
    type Inputs = HighlightMaskInputs;
    type Output = HighlightMask;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &HighlightMaskInputs,
        varyings: &Varyings,
    ) -> Result<HighlightMask> {
        let items = varyings.get(&inputs.items)?;
        if items.is_empty() {
            return Ok(HighlightMask::default());
        }
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;

        let size = reference_size(&ctx.gpu, deferred, ctx.args.viewport);
        let mask = self.mask.ensure(&mut ctx.gpu, size);

        let mut batch = target_view_batch("HighlightMask", ctx, "DrawHighlightMask", mask)?;
        batch.clear(Some(wgpu::Color::TRANSPARENT), Some(1.0), Some(0));
        let drawn = {
            let plumber = self.plumber.read();
            render_shapes(ctx, &mut batch, &plumber, items, -1, ShapeKey::empty())
        };
        ctx.gpu.submit(batch)?;

        Ok(HighlightMask {
            framebuffer: Some(mask),
            drawn,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enabled: bool,
    pub outline_color: Vec3,
    /// Outline width in pixels.
    pub outline_width: f32,
    /// Outline fades out towards its edge.
    pub glow: bool,
    pub unoccluded_fill_opacity: f32,
    pub occluded_fill_opacity: f32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            outline_color: Vec3::new(1.0, 0.7, 0.2),
            outline_width: 2.0,
            glow: false,
            unoccluded_fill_opacity: 0.0,
            occluded_fill_opacity: 0.0,
        }
    }
}

impl HighlightConfig {
    pub const MAX_OUTLINE_WIDTH: f32 = 20.0;

    #[must_use]
    pub fn uniforms(&self) -> HighlightUniforms {
        HighlightUniforms {
            outline_color: self.outline_color.extend(1.0),
            params: Vec4::new(
                self.outline_width,
                self.unoccluded_fill_opacity,
                self.occluded_fill_opacity,
                if self.glow { 1.0 } else { 0.0 },
            ),
        }
    }
}

crate::impl_job_config!(HighlightConfig, sanitize(this) {
    let before = this.clone();
    let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    this.unoccluded_fill_opacity = unit(this.unoccluded_fill_opacity);
    this.occluded_fill_opacity = unit(this.occluded_fill_opacity);
    this.outline_color = this.outline_color.clamp(Vec3::ZERO, Vec3::ONE);
    this.outline_width = if this.outline_width.is_nan() {
        HighlightConfig::default().outline_width
    } else {
        this.outline_width.clamp(0.0, HighlightConfig::MAX_OUTLINE_WIDTH)
    };
    *this != before
});

pub struct HighlightInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub mask: Varying<HighlightMask>,
    pub deferred_framebuffer: Varying<FramebufferId>,
    pub primary_framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(HighlightInputs {
    frame_transform,
    mask,
    deferred_framebuffer,
    primary_framebuffer
});

/// Draws one group's outline and fill over the primary framebuffer.
pub struct DrawHighlight {
    pipeline: LazyPipeline,
    filled_pipeline: LazyPipeline,
    buffer: Option<BufferId>,
}

impl Default for DrawHighlight {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("DrawHighlight", PipelineState::fullscreen_blended()),
            filled_pipeline: LazyPipeline::new(
                "DrawHighlight.filled",
                PipelineState::fullscreen_blended(),
            ),
            buffer: None,
        }
    }
}

impl Job for DrawHighlight {
    type Inputs = HighlightInputs;
    type Output = ();
    type Config = HighlightConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut HighlightConfig,
        inputs: &HighlightInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let Some(mask) = varyings.get(&inputs.mask)?.framebuffer else {
            return Ok(());
        };
        let transform = varyings.get(&inputs.frame_transform)?;
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;
        let primary = *varyings.get(&inputs.primary_framebuffer)?;

        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, "Highlight", &config.uniforms())?;
        let filled = config.unoccluded_fill_opacity > 0.0 || config.occluded_fill_opacity > 0.0;
        let pipeline = if filled {
            self.filled_pipeline.get(&mut ctx.gpu)
        } else {
            self.pipeline.get(&mut ctx.gpu)
        };

        let mut batch = pass_batch("DrawHighlight", &ctx.gpu, Some(primary), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(buffer));
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::MASK, Some(ctx.gpu.framebuffer_depth(mask)));
        batch.set_resource_texture(
            texture::DEFERRED_DEPTH,
            Some(ctx.gpu.framebuffer_depth(deferred)),
        );
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::MASK, None);
        batch.set_resource_texture(texture::DEFERRED_DEPTH, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::JobConfig;

    #[test]
    fn test_highlight_config_clamps() {
        let mut config = HighlightConfig {
            outline_width: 100.0,
            unoccluded_fill_opacity: 2.0,
            outline_color: Vec3::new(2.0, -1.0, 0.5),
            ..HighlightConfig::default()
        };
        assert!(config.sanitize());
        assert_eq!(config.outline_width, HighlightConfig::MAX_OUTLINE_WIDTH);
        assert_eq!(config.unoccluded_fill_opacity, 1.0);
        assert_eq!(config.outline_color, Vec3::new(1.0, 0.0, 0.5));
        assert!(!config.sanitize());
    }

    #[test]
    fn test_highlight_uniforms_pack_glow() {
        let config = HighlightConfig {
            glow: true,
            ..HighlightConfig::default()
        };
        assert_eq!(config.uniforms().params.w, 1.0);
        assert_eq!(config.uniforms().params.x, 2.0);
    }
}
