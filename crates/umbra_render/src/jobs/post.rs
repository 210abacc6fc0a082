//! Post-processing: bloom, tone mapping, temporal antialiasing and the HUD
//! composite.
//!
//! Bloom works on the HDR lighting target: a threshold pass extracts bright
//! pixels into a quarter-resolution target, three blur levels each halve the
//! previous one, and the apply pass adds the blurred levels back. Tone mapping
//! then resolves the lighting target into the primary framebuffer.

use glam::Vec4;
use serde::{Deserialize, Serialize};

use super::common::{
    HDR_FORMAT, JobFramebuffer, LazyPipeline, bind_frame_transform, pass_batch, reference_size,
    upload_uniform,
};
use super::frame::DeferredFrameTransform;
use super::surfaces::{LinearDepthOutputs, VelocityOutputs};
use crate::context::RenderContext;
use crate::gpu::slots::{texture, uniform};
use crate::gpu::uniforms::{AntialiasingUniforms, BloomUniforms, ToneMappingUniforms};
use crate::gpu::{BufferId, FramebufferId, PipelineState};
use crate::graph::{AnyVarying, EnabledConfig, Job, JobInputs, Varying, Varyings};
use umbra_core::errors::Result;
use umbra_core::math::Viewport;

// ─── Bloom ─────────────────────────────────────────────────────────────────

pub struct BloomThresholdInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub lighting_framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(BloomThresholdInputs {
    frame_transform,
    lighting_framebuffer
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomThresholdConfig {
    pub enabled: bool,
    /// Luminance above which pixels bloom.
    pub threshold: f32,
}

impl Default for BloomThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.9,
        }
    }
}

crate::impl_job_config!(BloomThresholdConfig, sanitize(this) {
    if this.threshold.is_nan() {
        this.threshold = BloomThresholdConfig::default().threshold;
        return true;
    }
    let clamped = this.threshold.clamp(0.0, 2.0);
    let changed = clamped != this.threshold;
    this.threshold = clamped;
    changed
});

/// Extracts the bright pixels of the lighting target at quarter resolution.
pub struct BloomThreshold {
    target: JobFramebuffer,
    pipeline: LazyPipeline,
    buffer: Option<BufferId>,
}

impl BloomThreshold {
    pub const DOWNSCALE: u32 = 4;
}

impl Default for BloomThreshold {
    fn default() -> Self {
        Self {
            target: JobFramebuffer::new("BloomThreshold")
                .color(HDR_FORMAT)
                .downscaled(Self::DOWNSCALE),
            pipeline: LazyPipeline::new("BloomThreshold", PipelineState::fullscreen()),
            buffer: None,
        }
    }
}

impl Job for BloomThreshold {
    type Inputs = BloomThresholdInputs;
    type Output = FramebufferId;
    type Config = BloomThresholdConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut BloomThresholdConfig,
        inputs: &BloomThresholdInputs,
        varyings: &Varyings,
    ) -> Result<FramebufferId> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let lighting = *varyings.get(&inputs.lighting_framebuffer)?;

        let size = reference_size(&ctx.gpu, lighting, ctx.args.viewport);
        let target = self.target.ensure(&mut ctx.gpu, size);
        let uniforms = BloomUniforms {
            params: Vec4::new(config.threshold, 0.0, 0.0, 0.0),
        };
        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, "BloomThreshold", &uniforms)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("BloomThreshold", &ctx.gpu, Some(target), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(buffer));
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::SOURCE, Some(ctx.gpu.framebuffer_color(lighting, 0)));
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::SOURCE, None);
        ctx.gpu.submit(batch)?;
        Ok(target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomBlurConfig {
    pub enabled: bool,
    /// Scale of the gaussian kernel, in source texels.
    pub filter_scale: f32,
}

impl Default for BloomBlurConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter_scale: 1.0,
        }
    }
}

crate::impl_job_config!(BloomBlurConfig, sanitize(this) {
    if this.filter_scale.is_nan() || this.filter_scale < 0.0 {
        this.filter_scale = 0.0;
        return true;
    }
    false
});

/// Separable gaussian blur of its input into a half-size target.
pub struct BloomBlur {
    label: &'static str,
    horizontal: JobFramebuffer,
    vertical: JobFramebuffer,
    pipeline: LazyPipeline,
    buffer: Option<BufferId>,
}

impl BloomBlur {
    /// Labels of the three bloom levels.
    pub const LEVELS: [&'static str; 3] = ["BloomBlur0", "BloomBlur1", "BloomBlur2"];

    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            horizontal: JobFramebuffer::new(label).color(HDR_FORMAT).downscaled(2),
            vertical: JobFramebuffer::new(label).color(HDR_FORMAT).downscaled(2),
            pipeline: LazyPipeline::new("BloomBlur", PipelineState::fullscreen()),
            buffer: None,
        }
    }
}

impl Job for BloomBlur {
    type Inputs = Varying<FramebufferId>;
    type Output = FramebufferId;
    type Config = BloomBlurConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut BloomBlurConfig,
        inputs: &Varying<FramebufferId>,
        varyings: &Varyings,
    ) -> Result<FramebufferId> {
        let source = *varyings.get(inputs)?;

        let size = reference_size(&ctx.gpu, source, ctx.args.viewport);
        let horizontal = self.horizontal.ensure(&mut ctx.gpu, size);
        let vertical = self.vertical.ensure(&mut ctx.gpu, size);
        let uniforms = BloomUniforms {
            params: Vec4::new(0.0, config.filter_scale, 0.0, 0.0),
        };
        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, self.label, &uniforms)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch(self.label, &ctx.gpu, Some(horizontal), ctx.args.viewport);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(buffer));
        batch.set_pipeline(pipeline);
        for (input, output) in [(source, horizontal), (horizontal, vertical)] {
            batch.set_framebuffer(Some(output));
            batch.set_resource_texture(texture::SOURCE, Some(ctx.gpu.framebuffer_color(input, 0)));
            batch.draw_fullscreen();
        }
        batch.set_resource_texture(texture::SOURCE, None);
        ctx.gpu.submit(batch)?;
        Ok(vertical)
    }
}

pub struct BloomApplyInputs {
    pub lighting_framebuffer: Varying<FramebufferId>,
    pub blurs: [Varying<FramebufferId>; 3],
}

impl JobInputs for BloomApplyInputs {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying)) {
        self.lighting_framebuffer.visit(visitor);
        for blur in &self.blurs {
            blur.visit(visitor);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomApplyConfig {
    pub enabled: bool,
    pub intensity: f32,
    /// Balance between the narrow and the wide levels.
    pub size: f32,
}

impl Default for BloomApplyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.25,
            size: 0.7,
        }
    }
}

crate::impl_job_config!(BloomApplyConfig, sanitize(this) {
    let before = this.clone();
    this.intensity = if this.intensity.is_nan() { 0.0 } else { this.intensity.clamp(0.0, 5.0) };
    this.size = if this.size.is_nan() { 0.7 } else { this.size.clamp(0.0, 1.0) };
    *this != before
});

impl BloomApplyConfig {
    /// Weights of the three blur levels.
    #[must_use]
    pub fn level_weights(&self) -> [f32; 3] {
        let size = self.size;
        [
            self.intensity * (1.0 - size),
            self.intensity * 0.5,
            self.intensity * size,
        ]
    }
}

/// Adds the blurred levels back into the lighting target.
pub struct BloomApply {
    pipeline: LazyPipeline,
    buffer: Option<BufferId>,
}

impl Default for BloomApply {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("BloomApply", PipelineState::fullscreen_blended()),
            buffer: None,
        }
    }
}

impl Job for BloomApply {
    type Inputs = BloomApplyInputs;
    type Output = ();
    type Config = BloomApplyConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut BloomApplyConfig,
        inputs: &BloomApplyInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let lighting = *varyings.get(&inputs.lighting_framebuffer)?;
        let [w0, w1, w2] = config.level_weights();
        let uniforms = BloomUniforms {
            params: Vec4::new(w0, w1, w2, config.intensity),
        };
        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, "BloomApply", &uniforms)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("BloomApply", &ctx.gpu, Some(lighting), ctx.args.viewport);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(buffer));
        batch.set_pipeline(pipeline);
        for (level, blur) in inputs.blurs.iter().enumerate() {
            let blur = *varyings.get(blur)?;
            batch.set_resource_texture(
                texture::BLOOM_LEVELS + level as u32,
                Some(ctx.gpu.framebuffer_color(blur, 0)),
            );
        }
        batch.draw_fullscreen();
        for level in 0..3 {
            batch.set_resource_texture(texture::BLOOM_LEVELS + level, None);
        }
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

/// What [`DebugBloom`] shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BloomDebugMode {
    #[default]
    Mosaic,
    Threshold,
    Level0,
    Level1,
    Level2,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugBloomConfig {
    pub enabled: bool,
    pub mode: BloomDebugMode,
}

crate::impl_job_config!(DebugBloomConfig);

pub struct DebugBloomInputs {
    pub target: Varying<FramebufferId>,
    pub threshold: Varying<FramebufferId>,
    pub blurs: [Varying<FramebufferId>; 3],
}

impl JobInputs for DebugBloomInputs {
    fn visit(&self, visitor: &mut dyn FnMut(AnyVarying)) {
        self.target.visit(visitor);
        self.threshold.visit(visitor);
        for blur in &self.blurs {
            blur.visit(visitor);
        }
    }
}

/// Blits the bloom intermediates over the frame.
#[derive(Default)]
pub struct DebugBloom;

impl Job for DebugBloom {
    type Inputs = DebugBloomInputs;
    type Output = ();
    type Config = DebugBloomConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DebugBloomConfig,
        inputs: &DebugBloomInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let target = *varyings.get(&inputs.target)?;
        let threshold = *varyings.get(&inputs.threshold)?;
        let mut blurs = [threshold; 3];
        for (blur, input) in blurs.iter_mut().zip(&inputs.blurs) {
            *blur = *varyings.get(input)?;
        }

        let viewport = ctx.args.viewport;
        let mut batch = pass_batch("DebugBloom", &ctx.gpu, Some(target), viewport);
        let full = Viewport::from_size(viewport.width, viewport.height);
        let sources = match config.mode {
            BloomDebugMode::Threshold => vec![(threshold, full)],
            BloomDebugMode::Level0 => vec![(blurs[0], full)],
            BloomDebugMode::Level1 => vec![(blurs[1], full)],
            BloomDebugMode::Level2 => vec![(blurs[2], full)],
            BloomDebugMode::Mosaic => {
                let (w, h) = (viewport.width / 2, viewport.height / 2);
                let quadrant = |x: u32, y: u32| Viewport::new(x as i32, y as i32, w, h);
                vec![
                    (threshold, quadrant(0, 0)),
                    (blurs[0], quadrant(w, 0)),
                    (blurs[1], quadrant(0, h)),
                    (blurs[2], quadrant(w, h)),
                ]
            }
        };
        for (source, rect) in sources {
            let source_size = reference_size(&ctx.gpu, source, viewport);
            batch.blit(
                source,
                Viewport::from_size(source_size.0, source_size.1),
                Some(target),
                rect,
            );
        }
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Tone mapping ──────────────────────────────────────────────────────────

/// Curve applied after exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToneCurve {
    /// Linear passthrough.
    None,
    #[default]
    Gamma22,
    Reinhard,
    Filmic,
}

impl ToneCurve {
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Gamma22 => 1,
            Self::Reinhard => 2,
            Self::Filmic => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingConfig {
    pub enabled: bool,
    /// Exposure in stops.
    pub exposure: f32,
    pub curve: ToneCurve,
}

impl Default for ToneMappingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exposure: 0.0,
            curve: ToneCurve::Gamma22,
        }
    }
}

crate::impl_job_config!(ToneMappingConfig, sanitize(this) {
    if this.exposure.is_nan() {
        this.exposure = 0.0;
        return true;
    }
    let clamped = this.exposure.clamp(-10.0, 10.0);
    let changed = clamped != this.exposure;
    this.exposure = clamped;
    changed
});

impl ToneMappingConfig {
    #[must_use]
    pub fn uniforms(&self) -> ToneMappingUniforms {
        ToneMappingUniforms {
            exposure: self.exposure.exp2(),
            curve: self.curve.index(),
            ..ToneMappingUniforms::default()
        }
    }
}

pub struct ToneMappingInputs {
    pub lighting_framebuffer: Varying<FramebufferId>,
    pub primary_framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(ToneMappingInputs {
    lighting_framebuffer,
    primary_framebuffer
});

/// Resolves the HDR lighting target into the primary framebuffer.
pub struct ToneMappingDeferred {
    pipeline: LazyPipeline,
    buffer: Option<BufferId>,
}

impl Default for ToneMappingDeferred {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("ToneMapping", PipelineState::fullscreen()),
            buffer: None,
        }
    }
}

impl Job for ToneMappingDeferred {
    type Inputs = ToneMappingInputs;
    type Output = ();
    type Config = ToneMappingConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut ToneMappingConfig,
        inputs: &ToneMappingInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let lighting = *varyings.get(&inputs.lighting_framebuffer)?;
        let primary = *varyings.get(&inputs.primary_framebuffer)?;
        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, "ToneMapping", &config.uniforms())?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("ToneMapping", &ctx.gpu, Some(primary), ctx.args.viewport);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(buffer));
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::SOURCE, Some(ctx.gpu.framebuffer_color(lighting, 0)));
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::SOURCE, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Antialiasing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntialiasingConfig {
    pub enabled: bool,
    /// Weight of the current frame against the history.
    pub blend: f32,
    /// Variance clipping window.
    pub covariance_gamma: f32,
    pub sharpen: f32,
    /// Clip history to the neighbourhood of the current frame.
    pub constrain_color: bool,
    /// Show the raw history instead of the resolved frame.
    pub debug_history: bool,
}

impl Default for AntialiasingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blend: 0.25,
            covariance_gamma: 0.65,
            sharpen: 0.15,
            constrain_color: true,
            debug_history: false,
        }
    }
}

crate::impl_job_config!(AntialiasingConfig, sanitize(this) {
    let before = this.clone();
    let unit = |v: f32, fallback: f32| if v.is_nan() { fallback } else { v.clamp(0.0, 1.0) };
    this.blend = unit(this.blend, 0.25);
    this.sharpen = unit(this.sharpen, 0.15);
    this.covariance_gamma = if this.covariance_gamma.is_nan() {
        0.65
    } else {
        this.covariance_gamma.clamp(0.5, 1.5)
    };
    *this != before
});

impl AntialiasingConfig {
    #[must_use]
    pub fn uniforms(&self, jitter: glam::Vec2, history_valid: bool) -> AntialiasingUniforms {
        let flags = u32::from(self.constrain_color) | (u32::from(self.debug_history) << 1);
        AntialiasingUniforms {
            params: Vec4::new(
                if history_valid { self.blend } else { 1.0 },
                self.covariance_gamma,
                self.sharpen,
                flags as f32,
            ),
            jitter: jitter.extend(0.0).extend(0.0),
        }
    }
}

pub struct AntialiasingInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub source: Varying<FramebufferId>,
    /// Rejects history samples across depth discontinuities.
    pub linear_depth: Varying<LinearDepthOutputs>,
    pub velocity: Varying<VelocityOutputs>,
}

crate::job_inputs!(AntialiasingInputs {
    frame_transform,
    source,
    linear_depth,
    velocity
});

/// Temporal antialiasing with a ping-pong history pair.
///
/// Each frame resolves the source and the previous history into the other
/// history target, then copies the result back into the source. History is
/// discarded when the source changes size.
pub struct Antialiasing {
    history: [JobFramebuffer; 2],
    current: usize,
    history_size: Option<(u32, u32)>,
    pipeline: LazyPipeline,
    buffer: Option<BufferId>,
}

impl Default for Antialiasing {
    fn default() -> Self {
        Self {
            history: [
                JobFramebuffer::new("AntialiasingHistory0").color(HDR_FORMAT),
                JobFramebuffer::new("AntialiasingHistory1").color(HDR_FORMAT),
            ],
            current: 0,
            history_size: None,
            pipeline: LazyPipeline::new("Antialiasing", PipelineState::fullscreen()),
            buffer: None,
        }
    }
}

impl Antialiasing {
    /// History target written by the most recent run.
    #[must_use]
    pub fn history(&self) -> Option<FramebufferId> {
        self.history[self.current].id()
    }
}

impl Job for Antialiasing {
    type Inputs = AntialiasingInputs;
    /// History target holding the resolved frame.
    type Output = FramebufferId;
    type Config = AntialiasingConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut AntialiasingConfig,
        inputs: &AntialiasingInputs,
        varyings: &Varyings,
    ) -> Result<FramebufferId> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let source = *varyings.get(&inputs.source)?;
        let linear_depth = varyings.get(&inputs.linear_depth)?;
        let velocity = varyings.get(&inputs.velocity)?;

        let size = reference_size(&ctx.gpu, source, ctx.args.viewport);
        let history_valid = self.history_size == Some(size);
        if !history_valid {
            log::debug!("Antialiasing: history reset at {}x{}", size.0, size.1);
        }
        self.history_size = Some(size);

        let previous = self.history[self.current].ensure(&mut ctx.gpu, size);
        self.current = 1 - self.current;
        let next = self.history[self.current].ensure(&mut ctx.gpu, size);

        let uniforms = config.uniforms(ctx.args.jitter, history_valid);
        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, "Antialiasing", &uniforms)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("Antialiasing", &ctx.gpu, Some(next), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(buffer));
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::SOURCE, Some(ctx.gpu.framebuffer_color(source, 0)));
        batch.set_resource_texture(texture::HISTORY, Some(ctx.gpu.framebuffer_color(previous, 0)));
        batch.set_resource_texture(texture::LINEAR_DEPTH, Some(linear_depth.linear_depth));
        batch.set_resource_texture(texture::VELOCITY, Some(velocity.velocity));
        batch.draw_fullscreen();
        for slot in [
            texture::SOURCE,
            texture::HISTORY,
            texture::LINEAR_DEPTH,
            texture::VELOCITY,
        ] {
            batch.set_resource_texture(slot, None);
        }
        let rect = Viewport::from_size(size.0, size.1);
        batch.blit(next, rect, Some(source), rect);
        ctx.gpu.submit(batch)?;
        Ok(next)
    }
}

// ─── HUD ───────────────────────────────────────────────────────────────────

/// Blends the HUD texture of the view over the primary framebuffer.
pub struct CompositeHUD {
    pipeline: LazyPipeline,
}

impl Default for CompositeHUD {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("CompositeHUD", PipelineState::fullscreen_blended()),
        }
    }
}

impl Job for CompositeHUD {
    type Inputs = Varying<FramebufferId>;
    type Output = ();
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &Varying<FramebufferId>,
        varyings: &Varyings,
    ) -> Result<()> {
        let Some(hud) = ctx.args.hud_texture else {
            return Ok(());
        };
        let primary = *varyings.get(inputs)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("CompositeHUD", &ctx.gpu, Some(primary), ctx.args.viewport);
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::SOURCE, Some(hud));
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::SOURCE, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::JobConfig;

    #[test]
    fn test_tone_mapping_exposure_is_in_stops() {
        let config = ToneMappingConfig {
            exposure: 2.0,
            curve: ToneCurve::Filmic,
            ..ToneMappingConfig::default()
        };
        let uniforms = config.uniforms();
        assert_eq!(uniforms.exposure, 4.0);
        assert_eq!(uniforms.curve, 3);
    }

    #[test]
    fn test_bloom_weights_follow_size() {
        let narrow = BloomApplyConfig {
            size: 0.0,
            ..BloomApplyConfig::default()
        };
        let [w0, _, w2] = narrow.level_weights();
        assert!(w0 > 0.0);
        assert_eq!(w2, 0.0);

        let mut bad = BloomApplyConfig {
            intensity: -1.0,
            size: 3.0,
            ..BloomApplyConfig::default()
        };
        assert!(bad.sanitize());
        assert_eq!(bad.intensity, 0.0);
        assert_eq!(bad.size, 1.0);
    }

    #[test]
    fn test_antialiasing_without_history_takes_current_frame() {
        let config = AntialiasingConfig::default();
        let fresh = config.uniforms(glam::Vec2::new(0.25, -0.25), false);
        assert_eq!(fresh.params.x, 1.0);
        assert_eq!(fresh.jitter.x, 0.25);
        let steady = config.uniforms(glam::Vec2::ZERO, true);
        assert_eq!(steady.params.x, config.blend);
    }
}
