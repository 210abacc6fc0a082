//! Per-frame setup jobs: camera and lighting-model uniforms, jitter, fades,
//! primary and G-buffer targets, timer ranges and the final blit.

use glam::{Mat4, UVec4, Vec2, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{
    DEPTH_STENCIL_FORMAT, HDR_FORMAT, JobFramebuffer, LDR_FORMAT, LazyPipeline, pass_batch,
    reference_size, upload_uniform,
};
use crate::context::RenderContext;
use crate::gpu::uniforms::{DeferredFrameTransformUniforms, FadeUniforms, LightingModelUniforms};
use crate::gpu::{BufferId, FramebufferId, PipelineState, RangeTimer};
use crate::graph::{EnabledConfig, Job, Varying, Varyings};
use crate::scene::{FadeCategory, ItemBounds};
use crate::shapes::ShapeKey;
use umbra_core::errors::Result;
use umbra_core::math::Viewport;

// ─── Deferred frame transform ──────────────────────────────────────────────

/// Camera uniforms of the frame and the buffer holding them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeferredFrameTransform {
    pub buffer: Option<BufferId>,
    pub uniforms: DeferredFrameTransformUniforms,
}

/// Builds the [`DeferredFrameTransform`] from the view frustum.
#[derive(Default)]
pub struct GenerateDeferredFrameTransform {
    buffer: Option<BufferId>,
    previous_view_projection: Option<Mat4>,
}

impl Job for GenerateDeferredFrameTransform {
    type Inputs = ();
    type Output = DeferredFrameTransform;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<DeferredFrameTransform> {
        let frustum = *ctx.args.require_view_frustum("DeferredFrameTransform")?;
        let viewport = ctx.args.viewport;
        let projection = frustum.jittered_projection(ctx.args.jitter_ndc());
        let view_projection = projection * frustum.view();
        let (near, far) = (frustum.near_clip(), frustum.far_clip());

        let uniforms = DeferredFrameTransformUniforms {
            view: frustum.view(),
            view_inverse: frustum.view_inverse(),
            projection,
            projection_inverse: projection.inverse(),
            previous_view_projection: self.previous_view_projection.unwrap_or(view_projection),
            depth_info: Vec4::new(near * far, far - near, far, near),
            pixel_info: Vec4::new(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
            ),
            jitter_info: Vec4::new(
                ctx.args.jitter.x,
                ctx.args.jitter.y,
                ctx.args.frame_index as f32,
                0.0,
            ),
        };
        self.previous_view_projection = Some(view_projection);

        let buffer = upload_uniform(
            &mut ctx.gpu,
            &mut self.buffer,
            "DeferredFrameTransform",
            &uniforms,
        )?;

        Ok(DeferredFrameTransform {
            buffer: Some(buffer),
            uniforms,
        })
    }
}

// ─── Lighting model ────────────────────────────────────────────────────────

/// Shading switches of the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightingModel {
    pub buffer: Option<BufferId>,
    pub uniforms: LightingModelUniforms,
}

impl LightingModel {
    #[inline]
    #[must_use]
    pub fn is_wireframe(&self) -> bool {
        self.uniforms.extras.y != 0
    }

    #[inline]
    #[must_use]
    pub fn is_haze_enabled(&self) -> bool {
        self.uniforms.extras.z != 0
    }

    #[inline]
    #[must_use]
    pub fn is_background_enabled(&self) -> bool {
        self.uniforms.material_channels.w != 0
    }

    /// Key bits every draw of the frame is forced to carry.
    #[must_use]
    pub fn global_shape_key(&self) -> ShapeKey {
        if self.is_wireframe() {
            ShapeKey::WIREFRAME
        } else {
            ShapeKey::empty()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct LightingModelConfig {
    pub enabled: bool,
    pub unlit: bool,
    pub emissive: bool,
    pub lightmap: bool,
    pub background: bool,
    pub scattering: bool,
    pub diffuse: bool,
    pub specular: bool,
    pub albedo: bool,
    pub ambient_light: bool,
    pub directional_light: bool,
    pub point_light: bool,
    pub spot_light: bool,
    pub show_light_contour: bool,
    pub wireframe: bool,
    pub haze: bool,
    pub ambient_occlusion: bool,
}

impl Default for LightingModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unlit: true,
            emissive: true,
            lightmap: true,
            background: true,
            scattering: true,
            diffuse: true,
            specular: true,
            albedo: true,
            ambient_light: true,
            directional_light: true,
            point_light: true,
            spot_light: true,
            show_light_contour: false,
            wireframe: false,
            haze: true,
            ambient_occlusion: true,
        }
    }
}

crate::impl_job_config!(LightingModelConfig);

impl LightingModelConfig {
    #[must_use]
    pub fn uniforms(&self) -> LightingModelUniforms {
        let flags = |a: bool, b: bool, c: bool, d: bool| {
            UVec4::new(u32::from(a), u32::from(b), u32::from(c), u32::from(d))
        };
        LightingModelUniforms {
            material_channels: flags(self.unlit, self.emissive, self.lightmap, self.background),
            shading_terms: flags(self.scattering, self.diffuse, self.specular, self.albedo),
            light_types: flags(
                self.ambient_light,
                self.directional_light,
                self.point_light,
                self.spot_light,
            ),
            extras: flags(
                self.show_light_contour,
                self.wireframe,
                self.haze,
                self.ambient_occlusion,
            ),
        }
    }
}

/// Publishes the [`LightingModel`] and keeps its buffer current.
#[derive(Default)]
pub struct MakeLightingModel {
    buffer: Option<BufferId>,
}

impl Job for MakeLightingModel {
    type Inputs = ();
    type Output = LightingModel;
    type Config = LightingModelConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut LightingModelConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<LightingModel> {
        let uniforms = config.uniforms();
        let buffer = upload_uniform(&mut ctx.gpu, &mut self.buffer, "LightingModel", &uniforms)?;
        Ok(LightingModel {
            buffer: Some(buffer),
            uniforms,
        })
    }
}

// ─── Jitter ────────────────────────────────────────────────────────────────

/// Element `index` (1-based) of the Halton low-discrepancy sequence.
#[must_use]
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut fraction = 1.0;
    let mut result = 0.0;
    let base_f = base as f32;
    while index > 0 {
        fraction /= base_f;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    pub enabled: bool,
    /// Multiplier on the sub-pixel offset, in `[0, 1]`.
    pub scale: f32,
    /// Keeps returning the current sample.
    pub freeze: bool,
    /// Length of the sample pattern: 8 or 16.
    pub sample_count: u32,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: 1.0,
            freeze: false,
            sample_count: JitterSample::MAX_SAMPLES,
        }
    }
}

crate::impl_job_config!(JitterConfig, sanitize(this) {
    let mut changed = false;
    if !(0.0..=1.0).contains(&this.scale) {
        this.scale = this.scale.clamp(0.0, 1.0);
        if this.scale.is_nan() {
            this.scale = 1.0;
        }
        changed = true;
    }
    if this.sample_count != 8 && this.sample_count != JitterSample::MAX_SAMPLES {
        this.sample_count = if this.sample_count < 12 { 8 } else { JitterSample::MAX_SAMPLES };
        changed = true;
    }
    changed
});

/// Cycles the camera through a Halton(2, 3) sub-pixel pattern.
///
/// Writes [`RenderArgs::jitter`](crate::context::RenderArgs::jitter), which
/// is reset to zero while the job is disabled.
pub struct JitterSample {
    samples: [Vec2; Self::MAX_SAMPLES as usize],
    current: usize,
}

impl Default for JitterSample {
    fn default() -> Self {
        Self {
            samples: std::array::from_fn(|i| {
                let index = i as u32 + 1;
                Vec2::new(halton(index, 2) - 0.5, halton(index, 3) - 0.5)
            }),
            current: 0,
        }
    }
}

impl JitterSample {
    pub const MAX_SAMPLES: u32 = 16;

    /// Unscaled offset of sample `index`, in pixels.
    #[must_use]
    pub fn sample(&self, index: usize) -> Vec2 {
        self.samples[index % self.samples.len()]
    }
}

impl Job for JitterSample {
    type Inputs = ();
    type Output = Vec2;
    type Config = JitterConfig;

    const ALWAYS_RUN: bool = true;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut JitterConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<Vec2> {
        if !config.enabled {
            ctx.args.jitter = Vec2::ZERO;
            return Ok(Vec2::ZERO);
        }
        if !config.freeze {
            self.current = (self.current + 1) % config.sample_count as usize;
        }
        let offset = self.sample(self.current) * config.scale;
        ctx.args.jitter = offset;
        Ok(offset)
    }
}

// ─── Fade ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub enabled: bool,
    /// Transition length in seconds, per [`FadeCategory`].
    pub durations: [f32; FadeCategory::COUNT],
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            durations: [0.75, 0.75, 0.5, 0.5, 1.0],
        }
    }
}

impl FadeConfig {
    pub const MIN_DURATION: f32 = 0.01;
}

crate::impl_job_config!(FadeConfig, sanitize(this) {
    let mut changed = false;
    for duration in &mut this.durations {
        if duration.is_nan() || *duration < FadeConfig::MIN_DURATION {
            *duration = FadeConfig::MIN_DURATION;
            changed = true;
        }
    }
    changed
});

/// Fade statistics of the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FadeOutput {
    /// Transitions still running after this frame's update.
    pub active: usize,
    /// Opaque items drawn this frame with a running transition.
    pub visible: usize,
}

/// Advances fade transitions and uploads their dissolve thresholds.
#[derive(Default)]
pub struct FadeJob;

impl Job for FadeJob {
    type Inputs = Varying<ItemBounds>;
    type Output = FadeOutput;
    type Config = FadeConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut FadeConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<FadeOutput> {
        let RenderContext { gpu, scene, args } = ctx;
        let delta = args.delta_time.max(0.0);

        scene.fades.retain(|_, transition| {
            transition.elapsed + delta < config.durations[transition.category.index()]
        });

        for (item, transition) in scene.fades.iter_mut() {
            transition.elapsed += delta;
            let duration = config.durations[transition.category.index()];
            let t = (transition.elapsed / duration).clamp(0.0, 1.0);
            transition.threshold = if transition.category.is_fade_in() {
                1.0 - t
            } else {
                t
            };

            let uniforms = FadeUniforms {
                params: Vec4::new(
                    transition.threshold,
                    transition.category.index() as f32,
                    0.0,
                    0.0,
                ),
            };
            match transition.buffer {
                Some(buffer) => gpu.update_uniform(buffer, &uniforms)?,
                None => {
                    log::trace!("Allocating fade parameters for {item:?}");
                    transition.buffer = Some(gpu.create_uniform_buffer("FadeParameters", &uniforms));
                }
            }
        }

        let visible = varyings
            .get(inputs)?
            .iter()
            .filter(|item| scene.fades.get(item.id).is_some())
            .count();
        Ok(FadeOutput {
            active: scene.fades.len(),
            visible,
        })
    }
}

// ─── Primary framebuffer ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryFramebufferConfig {
    pub enabled: bool,
    /// Render resolution relative to the viewport, in `[0.1, 2]`.
    pub resolution_scale: f32,
}

impl Default for PrimaryFramebufferConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution_scale: 1.0,
        }
    }
}

crate::impl_job_config!(PrimaryFramebufferConfig, sanitize(this) {
    if (0.1..=2.0).contains(&this.resolution_scale) {
        return false;
    }
    this.resolution_scale = if this.resolution_scale.is_nan() {
        1.0
    } else {
        this.resolution_scale.clamp(0.1, 2.0)
    };
    true
});

/// Allocates the HDR target the whole frame renders into.
pub struct PreparePrimaryFramebuffer {
    framebuffer: JobFramebuffer,
}

impl Default for PreparePrimaryFramebuffer {
    fn default() -> Self {
        Self {
            framebuffer: JobFramebuffer::new("PrimaryFramebuffer")
                .color(HDR_FORMAT)
                .depth_stencil(DEPTH_STENCIL_FORMAT),
        }
    }
}

impl Job for PreparePrimaryFramebuffer {
    type Inputs = ();
    type Output = FramebufferId;
    type Config = PrimaryFramebufferConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut PrimaryFramebufferConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<FramebufferId> {
        let viewport = ctx.args.viewport;
        let scale = |extent: u32| (extent as f32 * config.resolution_scale).round() as u32;
        Ok(self
            .framebuffer
            .ensure(&mut ctx.gpu, (scale(viewport.width), scale(viewport.height))))
    }
}

// ─── Deferred targets ──────────────────────────────────────────────────────

pub struct PrepareDeferredInputs {
    pub primary: Varying<FramebufferId>,
    pub lighting_model: Varying<LightingModel>,
}

crate::job_inputs!(PrepareDeferredInputs {
    primary,
    lighting_model
});

/// G-buffer and lighting accumulation targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepareDeferredOutputs {
    /// Colour, normal and specular attachments plus depth-stencil.
    pub deferred: FramebufferId,
    /// HDR lighting accumulation.
    pub lighting: FramebufferId,
}

crate::job_outputs!(PrepareDeferredOutputs {
    0 => deferred: FramebufferId as DEFERRED_FRAMEBUFFER,
    1 => lighting: FramebufferId as LIGHTING_FRAMEBUFFER,
});

/// Sizes the deferred targets to the primary buffer and clears them.
pub struct PrepareDeferred {
    deferred: JobFramebuffer,
    lighting: JobFramebuffer,
}

impl Default for PrepareDeferred {
    fn default() -> Self {
        Self {
            deferred: JobFramebuffer::new("DeferredFramebuffer")
                .color(LDR_FORMAT)
                .color(LDR_FORMAT)
                .color(LDR_FORMAT)
                .depth_stencil(DEPTH_STENCIL_FORMAT),
            lighting: JobFramebuffer::new("LightingFramebuffer").color(HDR_FORMAT),
        }
    }
}

impl Job for PrepareDeferred {
    type Inputs = PrepareDeferredInputs;
    type Output = PrepareDeferredOutputs;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &PrepareDeferredInputs,
        varyings: &Varyings,
    ) -> Result<PrepareDeferredOutputs> {
        let primary = *varyings.get(&inputs.primary)?;
        let lighting_model = varyings.get(&inputs.lighting_model)?;

        let size = reference_size(&ctx.gpu, primary, ctx.args.viewport);
        let deferred = self.deferred.ensure(&mut ctx.gpu, size);
        let lighting = self.lighting.ensure(&mut ctx.gpu, size);

        let mut batch = pass_batch("PrepareDeferred", &ctx.gpu, Some(deferred), ctx.args.viewport);
        batch.clear(Some(wgpu::Color::TRANSPARENT), Some(1.0), Some(0));
        batch.set_framebuffer(Some(lighting));
        batch.clear(Some(wgpu::Color::TRANSPARENT), None, None);
        batch.set_uniform_buffer(
            crate::gpu::slots::uniform::LIGHTING_MODEL,
            lighting_model.buffer,
        );
        ctx.gpu.submit(batch)?;

        Ok(PrepareDeferredOutputs { deferred, lighting })
    }
}

/// Marks background pixels in the stencil so lighting can skip them.
pub struct PrepareStencil {
    pipeline: LazyPipeline,
}

impl Default for PrepareStencil {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new(
                "PrepareStencil",
                PipelineState {
                    stencil_test: true,
                    ..PipelineState::fullscreen()
                },
            ),
        }
    }
}

impl PrepareStencil {
    /// Stencil value of pixels no shape has written.
    pub const STENCIL_BACKGROUND: u32 = 0;
    /// Stencil value written by shapes.
    pub const STENCIL_SHAPE: u32 = 1;
}

impl Job for PrepareStencil {
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
        let target = *varyings.get(inputs)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);
        let mut batch = pass_batch("PrepareStencil", &ctx.gpu, Some(target), ctx.args.viewport);
        batch.clear(None, None, Some(Self::STENCIL_BACKGROUND));
        batch.set_pipeline(pipeline);
        batch.draw_fullscreen();
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Timer ranges ──────────────────────────────────────────────────────────

/// Opens a named GPU timer range.
pub struct BeginGPURangeTimer {
    name: String,
}

impl BeginGPURangeTimer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Job for BeginGPURangeTimer {
    type Inputs = ();
    type Output = RangeTimer;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<RangeTimer> {
        Ok(ctx.gpu.begin_timer(&self.name)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GPURangeTimerConfig {
    pub enabled: bool,
    /// Batches submitted inside the range last frame.
    pub batch_count: usize,
}

impl Default for GPURangeTimerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_count: 0,
        }
    }
}

crate::impl_job_config!(GPURangeTimerConfig);

/// Closes the range opened by a [`BeginGPURangeTimer`].
///
/// Always runs; an inert timer (opener disabled) is a no-op.
#[derive(Default)]
pub struct EndGPURangeTimer;

impl Job for EndGPURangeTimer {
    type Inputs = Varying<RangeTimer>;
    type Output = ();
    type Config = GPURangeTimerConfig;

    const ALWAYS_RUN: bool = true;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut GPURangeTimerConfig,
        inputs: &Varying<RangeTimer>,
        varyings: &Varyings,
    ) -> Result<()> {
        let timer = varyings.get(inputs)?;
        if let Some(batches) = ctx.gpu.end_timer(timer)? {
            config.batch_count = batches;
        }
        Ok(())
    }
}

// ─── Blit ──────────────────────────────────────────────────────────────────

/// Copies the primary framebuffer into the view's output target.
#[derive(Default)]
pub struct Blit;

impl Job for Blit {
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
        let source = *varyings.get(inputs)?;
        let Some((width, height)) = ctx.gpu.framebuffer_size(source) else {
            log::trace!("Blit skipped: no primary framebuffer");
            return Ok(());
        };

        let target = ctx.args.blit_target;
        let viewport = ctx.args.viewport;
        let mut batch = pass_batch("Blit", &ctx.gpu, target, viewport);
        batch.blit(source, Viewport::from_size(width, height), target, viewport);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{JobConfig, Task};

    #[test]
    fn test_halton_prefix() {
        assert_eq!(halton(1, 2), 0.5);
        assert_eq!(halton(2, 2), 0.25);
        assert_eq!(halton(3, 2), 0.75);
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_jitter_config_clamps() {
        let mut config = JitterConfig {
            scale: 3.0,
            sample_count: 5,
            ..JitterConfig::default()
        };
        assert!(config.sanitize());
        assert_eq!(config.scale, 1.0);
        assert_eq!(config.sample_count, 8);
        assert!(!config.sanitize());
    }

    #[test]
    fn test_jitter_cycles_and_resets_when_disabled() {
        let mut ctx = RenderContext::default();
        let (mut task, jitter) =
            Task::<()>::build("Jitter", |b, _| b.add_job("JitterCam", JitterSample::default(), ()))
                .unwrap();

        let config = task.configs().get::<JitterConfig>("Jitter.JitterCam").unwrap();
        config.write().sample_count = 8;

        let mut seen = Vec::new();
        for _ in 0..9 {
            task.run(&mut ctx, ()).unwrap();
            seen.push(*task.get(&jitter).unwrap());
            assert_eq!(ctx.args.jitter, *seen.last().unwrap());
        }
        assert_eq!(seen[0], seen[8]);
        assert!(seen.iter().all(|o| o.x.abs() <= 0.5 && o.y.abs() <= 0.5));

        task.configs().set_enabled("Jitter.JitterCam", false).unwrap();
        task.run(&mut ctx, ()).unwrap();
        assert_eq!(ctx.args.jitter, Vec2::ZERO);
    }

    #[test]
    fn test_lighting_model_wireframe_key() {
        let config = LightingModelConfig {
            wireframe: true,
            ..LightingModelConfig::default()
        };
        let model = LightingModel {
            buffer: None,
            uniforms: config.uniforms(),
        };
        assert_eq!(model.global_shape_key(), ShapeKey::WIREFRAME);
        assert!(LightingModel::default().global_shape_key().is_empty());
    }

    #[test]
    fn test_fade_thresholds_and_expiry() {
        use crate::scene::{Item, ShapeItem};
        use umbra_core::math::Aabb;

        let mut ctx = RenderContext::default();
        let id = ctx.scene.add_item(Item::shape(
            Aabb::from_sphere(glam::Vec3::ZERO, 1.0),
            ShapeItem::new(Mat4::IDENTITY, ShapeKey::MATERIAL | ShapeKey::FADE, 3),
        ));
        ctx.scene.fades.start(id, FadeCategory::ElementAdded);
        ctx.args.delta_time = 0.25;

        let (mut task, out) = Task::<ItemBounds>::build("Fade", |b, input| {
            b.add_job("Fade", FadeJob, input)
        })
        .unwrap();
        let bounds = vec![ctx.scene.item_bound(id).unwrap()];

        task.run(&mut ctx, bounds.clone()).unwrap();
        let transition = ctx.scene.fades.get(id).unwrap();
        assert!((transition.threshold - 0.5).abs() < 1e-6);
        let buffer = transition.buffer.unwrap();
        let uniforms: FadeUniforms = ctx.gpu.read_uniform(buffer).unwrap();
        assert!((uniforms.params.x - 0.5).abs() < 1e-6);
        assert_eq!(task.get(&out).unwrap().visible, 1);

        task.run(&mut ctx, bounds).unwrap();
        assert!(ctx.scene.fades.get(id).is_none());
        assert_eq!(*task.get(&out).unwrap(), FadeOutput::default());
    }

    #[test]
    fn test_primary_framebuffer_follows_viewport() {
        let mut ctx = RenderContext::default();
        ctx.args.viewport = Viewport::from_size(640, 480);
        let (mut task, primary) = Task::<()>::build("Primary", |b, _| {
            b.add_job("PreparePrimaryBuffer", PreparePrimaryFramebuffer::default(), ())
        })
        .unwrap();

        task.run(&mut ctx, ()).unwrap();
        let id = *task.get(&primary).unwrap();
        assert_eq!(ctx.gpu.framebuffer_size(id), Some((640, 480)));

        ctx.args.viewport = Viewport::from_size(0, 0);
        task.run(&mut ctx, ()).unwrap();
        assert_eq!(*task.get(&primary).unwrap(), id);
        assert_eq!(ctx.gpu.framebuffer_size(id), Some((640, 480)));
    }
}
