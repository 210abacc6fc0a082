//! Screen-space surface passes derived from the G-buffer: linear depth,
//! curvature, subsurface scattering, ambient occlusion and velocity.

use glam::Vec4;
use serde::{Deserialize, Serialize};

use super::common::{
    JobFramebuffer, LDR_FORMAT, LINEAR_DEPTH_FORMAT, LazyPipeline, VELOCITY_FORMAT,
    bind_frame_transform, pass_batch, reference_size, upload_uniform,
};
use super::frame::{DeferredFrameTransform, LightingModel};
use crate::context::RenderContext;
use crate::gpu::slots::{texture, uniform};
use crate::gpu::uniforms::{AmbientOcclusionUniforms, ScatteringUniforms};
use crate::gpu::{BufferId, FramebufferId, PipelineState, TextureDesc, TextureId};
use crate::graph::{EnabledConfig, Job, Varying, Varyings};
use umbra_core::errors::Result;

// ─── Linear depth ──────────────────────────────────────────────────────────

pub struct SurfaceInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub deferred_framebuffer: Varying<FramebufferId>,
}

crate::job_inputs!(SurfaceInputs {
    frame_transform,
    deferred_framebuffer
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearDepthOutputs {
    pub framebuffer: FramebufferId,
    pub linear_depth: TextureId,
    pub half_linear_depth: TextureId,
    pub half_normal: TextureId,
}

crate::job_outputs!(LinearDepthOutputs {
    0 => framebuffer: FramebufferId as FRAMEBUFFER,
    1 => linear_depth: TextureId as LINEAR_DEPTH,
    2 => half_linear_depth: TextureId as HALF_LINEAR_DEPTH,
    3 => half_normal: TextureId as HALF_NORMAL,
});

/// Converts the G-buffer depth to linear eye depth, plus a half-resolution
/// depth/normal pair for the downsampled passes.
pub struct LinearDepthPass {
    full: JobFramebuffer,
    half: JobFramebuffer,
    linearize: LazyPipeline,
    downsample: LazyPipeline,
}

impl Default for LinearDepthPass {
    fn default() -> Self {
        Self {
            full: JobFramebuffer::new("LinearDepth").color(LINEAR_DEPTH_FORMAT),
            half: JobFramebuffer::new("HalfLinearDepth")
                .color(LINEAR_DEPTH_FORMAT)
                .color(LDR_FORMAT)
                .downscaled(2),
            linearize: LazyPipeline::new("LinearDepth.linearize", PipelineState::fullscreen()),
            downsample: LazyPipeline::new("LinearDepth.downsample", PipelineState::fullscreen()),
        }
    }
}

impl Job for LinearDepthPass {
    type Inputs = SurfaceInputs;
    type Output = LinearDepthOutputs;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &SurfaceInputs,
        varyings: &Varyings,
    ) -> Result<LinearDepthOutputs> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;

        let size = reference_size(&ctx.gpu, deferred, ctx.args.viewport);
        let full = self.full.ensure(&mut ctx.gpu, size);
        let half = self.half.ensure(&mut ctx.gpu, size);
        let linearize = self.linearize.get(&mut ctx.gpu);
        let downsample = self.downsample.get(&mut ctx.gpu);

        let outputs = LinearDepthOutputs {
            framebuffer: full,
            linear_depth: ctx.gpu.framebuffer_color(full, 0),
            half_linear_depth: ctx.gpu.framebuffer_color(half, 0),
            half_normal: ctx.gpu.framebuffer_color(half, 1),
        };

        let mut batch = pass_batch("LinearDepth", &ctx.gpu, Some(full), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_pipeline(linearize);
        batch.set_resource_texture(
            texture::DEFERRED_DEPTH,
            Some(ctx.gpu.framebuffer_depth(deferred)),
        );
        batch.draw_fullscreen();

        batch.set_framebuffer(Some(half));
        batch.set_viewport(umbra_core::math::Viewport::from_size(
            size.0.div_ceil(2),
            size.1.div_ceil(2),
        ));
        batch.set_pipeline(downsample);
        batch.set_resource_texture(texture::LINEAR_DEPTH, Some(outputs.linear_depth));
        batch.set_resource_texture(
            texture::DEFERRED_NORMAL,
            Some(ctx.gpu.framebuffer_color(deferred, 1)),
        );
        batch.draw_fullscreen();
        ctx.gpu.submit(batch)?;

        Ok(outputs)
    }
}

// ─── Surface geometry ──────────────────────────────────────────────────────

pub struct SurfaceGeometryInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub deferred_framebuffer: Varying<FramebufferId>,
    pub linear_depth: Varying<LinearDepthOutputs>,
}

crate::job_inputs!(SurfaceGeometryInputs {
    frame_transform,
    deferred_framebuffer,
    linear_depth
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceGeometryOutputs {
    pub framebuffer: FramebufferId,
    pub curvature: FramebufferId,
    pub mid_curvature_normal: FramebufferId,
    pub low_curvature_normal: FramebufferId,
}

crate::job_outputs!(SurfaceGeometryOutputs {
    0 => framebuffer: FramebufferId as FRAMEBUFFER,
    1 => curvature: FramebufferId as CURVATURE,
    2 => mid_curvature_normal: FramebufferId as MID_CURVATURE_NORMAL,
    3 => low_curvature_normal: FramebufferId as LOW_CURVATURE_NORMAL,
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceGeometryConfig {
    pub enabled: bool,
    pub depth_threshold: f32,
    pub basis_scale: f32,
    pub curvature_scale: f32,
    /// Downscale exponent of the curvature targets, `0..=2`.
    pub resolution_level: u32,
    pub diffuse_filter_scale: f32,
    pub diffuse_depth_threshold: f32,
}

impl Default for SurfaceGeometryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            depth_threshold: 5e-3,
            basis_scale: 1.0,
            curvature_scale: 10.0,
            resolution_level: 1,
            diffuse_filter_scale: 0.2,
            diffuse_depth_threshold: 1.0,
        }
    }
}

crate::impl_job_config!(SurfaceGeometryConfig, sanitize(this) {
    if this.resolution_level > SurfaceGeometryConfig::MAX_RESOLUTION_LEVEL {
        this.resolution_level = SurfaceGeometryConfig::MAX_RESOLUTION_LEVEL;
        return true;
    }
    false
});

impl SurfaceGeometryConfig {
    pub const MAX_RESOLUTION_LEVEL: u32 = 2;
}

/// Computes curvature from linear depth and diffuses it twice (mid and low
/// frequency) for the scattering pass.
pub struct SurfaceGeometryPass {
    geometry: JobFramebuffer,
    curvature: [JobFramebuffer; 3],
    resolution_level: Option<u32>,
    curvature_pipeline: LazyPipeline,
    diffuse_pipeline: LazyPipeline,
}

impl Default for SurfaceGeometryPass {
    fn default() -> Self {
        Self {
            geometry: JobFramebuffer::new("SurfaceGeometry").color(LDR_FORMAT),
            curvature: Self::curvature_targets(1),
            resolution_level: None,
            curvature_pipeline: LazyPipeline::new(
                "SurfaceGeometry.curvature",
                PipelineState::fullscreen(),
            ),
            diffuse_pipeline: LazyPipeline::new(
                "SurfaceGeometry.diffuse",
                PipelineState::fullscreen(),
            ),
        }
    }
}

impl SurfaceGeometryPass {
    /// Curvature, mid and low diffused targets at `1 / 2^level`.
    fn curvature_targets(level: u32) -> [JobFramebuffer; 3] {
        ["Curvature", "MidCurvatureNormal", "LowCurvatureNormal"].map(|label| {
            JobFramebuffer::new(label)
                .color(LDR_FORMAT)
                .downscaled(1 << level)
        })
    }
}

impl Job for SurfaceGeometryPass {
    type Inputs = SurfaceGeometryInputs;
    type Output = SurfaceGeometryOutputs;
    type Config = SurfaceGeometryConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut SurfaceGeometryConfig,
        inputs: &SurfaceGeometryInputs,
        varyings: &Varyings,
    ) -> Result<SurfaceGeometryOutputs> {
        if self.resolution_level != Some(config.resolution_level) {
            log::debug!(
                "Curvature targets at resolution level {}",
                config.resolution_level
            );
            self.curvature = Self::curvature_targets(config.resolution_level);
            self.resolution_level = Some(config.resolution_level);
        }

        let transform = varyings.get(&inputs.frame_transform)?;
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;
        let linear_depth = varyings.get(&inputs.linear_depth)?;

        let size = reference_size(&ctx.gpu, deferred, ctx.args.viewport);
        let [curvature, mid, low] = &mut self.curvature;
        let outputs = SurfaceGeometryOutputs {
            framebuffer: self.geometry.ensure(&mut ctx.gpu, size),
            curvature: curvature.ensure(&mut ctx.gpu, size),
            mid_curvature_normal: mid.ensure(&mut ctx.gpu, size),
            low_curvature_normal: low.ensure(&mut ctx.gpu, size),
        };
        let curvature_pipeline = self.curvature_pipeline.get(&mut ctx.gpu);
        let diffuse_pipeline = self.diffuse_pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch(
            "SurfaceGeometry",
            &ctx.gpu,
            Some(outputs.curvature),
            ctx.args.viewport,
        );
        bind_frame_transform(&mut batch, transform);
        batch.set_pipeline(curvature_pipeline);
        batch.set_resource_texture(texture::LINEAR_DEPTH, Some(linear_depth.linear_depth));
        batch.set_resource_texture(
            texture::DEFERRED_NORMAL,
            Some(ctx.gpu.framebuffer_color(deferred, 1)),
        );
        batch.draw_fullscreen();

        batch.set_pipeline(diffuse_pipeline);
        let mut source = outputs.curvature;
        for target in [outputs.mid_curvature_normal, outputs.low_curvature_normal] {
            batch.set_framebuffer(Some(target));
            batch.set_resource_texture(
                texture::CURVATURE,
                Some(ctx.gpu.framebuffer_color(source, 0)),
            );
            batch.draw_fullscreen();
            source = target;
        }
        ctx.gpu.submit(batch)?;

        Ok(outputs)
    }
}

// ─── Subsurface scattering ─────────────────────────────────────────────────

/// Scattering parameters and the lookup tables the lighting pass samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScatteringResource {
    pub buffer: Option<BufferId>,
    pub profile: Option<TextureId>,
    pub lut: Option<TextureId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatteringConfig {
    pub enabled: bool,
    pub bent_red: f32,
    pub bent_green: f32,
    pub bent_blue: f32,
    pub bent_scale: f32,
    pub curvature_offset: f32,
    pub curvature_scale: f32,
    pub show_bent_normals: bool,
}

impl Default for ScatteringConfig {
    fn default() -> Self {
        let uniforms = ScatteringUniforms::default();
        Self {
            enabled: true,
            bent_red: uniforms.bent_info.x,
            bent_green: uniforms.bent_info.y,
            bent_blue: uniforms.bent_info.z,
            bent_scale: uniforms.bent_info.w,
            curvature_offset: uniforms.curvature_info.x,
            curvature_scale: uniforms.curvature_info.y,
            show_bent_normals: false,
        }
    }
}

crate::impl_job_config!(ScatteringConfig);

/// Maintains the scattering profile and its 2D lookup table.
///
/// Reads nothing from the frame but the lighting model. The tables only
/// depend on constants and are generated on the first run.
pub struct SubsurfaceScattering {
    resource: ScatteringResource,
    lut: JobFramebuffer,
    pipeline: LazyPipeline,
}

impl Default for SubsurfaceScattering {
    fn default() -> Self {
        Self {
            resource: ScatteringResource::default(),
            lut: JobFramebuffer::new("ScatteringLUT").color(wgpu::TextureFormat::Rgba16Float),
            pipeline: LazyPipeline::new("SubsurfaceScattering.lut", PipelineState::fullscreen()),
        }
    }
}

impl SubsurfaceScattering {
    pub const LUT_SIZE: (u32, u32) = (256, 128);
    pub const PROFILE_WIDTH: u32 = 128;
}

impl Job for SubsurfaceScattering {
    type Inputs = Varying<LightingModel>;
    type Output = ScatteringResource;
    type Config = ScatteringConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut ScatteringConfig,
        inputs: &Varying<LightingModel>,
        varyings: &Varyings,
    ) -> Result<ScatteringResource> {
        let lighting_model = varyings.get(inputs)?;
        let uniforms = ScatteringUniforms {
            bent_info: Vec4::new(
                config.bent_red,
                config.bent_green,
                config.bent_blue,
                config.bent_scale,
            ),
            curvature_info: Vec4::new(
                config.curvature_offset,
                config.curvature_scale,
                f32::from(u8::from(config.show_bent_normals)),
                f32::from(u8::from(lighting_model.uniforms.shading_terms.x != 0)),
            ),
        };
        upload_uniform(
            &mut ctx.gpu,
            &mut self.resource.buffer,
            "ScatteringParameters",
            &uniforms,
        )?;

        if self.resource.lut.is_none() {
            let profile = ctx.gpu.create_texture(TextureDesc {
                label: "ScatteringProfile".into(),
                width: Self::PROFILE_WIDTH,
                height: 1,
                format: wgpu::TextureFormat::Rgba16Float,
            });
            let target = self.lut.ensure(&mut ctx.gpu, Self::LUT_SIZE);
            self.resource.profile = Some(profile);
            self.resource.lut = Some(ctx.gpu.framebuffer_color(target, 0));

            let pipeline = self.pipeline.get(&mut ctx.gpu);
            let (width, height) = Self::LUT_SIZE;
            let viewport = umbra_core::math::Viewport::from_size(width, height);
            let mut batch = pass_batch("SubsurfaceScattering", &ctx.gpu, Some(target), viewport);
            batch.set_pipeline(pipeline);
            batch.set_uniform_buffer(uniform::SUBSURFACE_SCATTERING, self.resource.buffer);
            batch.set_resource_texture(texture::SOURCE, Some(profile));
            batch.draw_fullscreen();
            ctx.gpu.submit(batch)?;
            log::debug!("Generated scattering profile and LUT");
        }

        Ok(self.resource)
    }
}

// ─── Ambient occlusion ─────────────────────────────────────────────────────

pub struct AmbientOcclusionInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub deferred_framebuffer: Varying<FramebufferId>,
    pub linear_depth: Varying<LinearDepthOutputs>,
}

crate::job_inputs!(AmbientOcclusionInputs {
    frame_transform,
    deferred_framebuffer,
    linear_depth
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmbientOcclusionOutputs {
    pub framebuffer: FramebufferId,
    pub uniforms: Option<BufferId>,
}

crate::job_outputs!(AmbientOcclusionOutputs {
    0 => framebuffer: FramebufferId as FRAMEBUFFER,
    1 => uniforms: Option<BufferId> as UNIFORMS,
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientOcclusionConfig {
    pub enabled: bool,
    pub radius: f32,
    pub level: f32,
    pub falloff_angle: f32,
    pub num_samples: u32,
    /// Downscale exponent of the occlusion target, `0..=4`.
    pub resolution_level: u32,
    pub blur_radius: u32,
    pub ditering: bool,
}

impl Default for AmbientOcclusionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: 0.5,
            level: 0.5,
            falloff_angle: 0.01,
            num_samples: 16,
            resolution_level: 1,
            blur_radius: 4,
            ditering: true,
        }
    }
}

impl AmbientOcclusionConfig {
    pub const MAX_SAMPLES: u32 = 64;
    pub const MAX_RESOLUTION_LEVEL: u32 = 4;
    pub const MAX_BLUR_RADIUS: u32 = 15;

    #[must_use]
    pub fn uniforms(&self) -> AmbientOcclusionUniforms {
        AmbientOcclusionUniforms {
            params: Vec4::new(
                self.radius,
                self.level,
                self.falloff_angle,
                self.num_samples as f32,
            ),
            resolution: Vec4::new(
                self.resolution_level as f32,
                self.blur_radius as f32,
                f32::from(u8::from(self.ditering)),
                0.0,
            ),
        }
    }
}

crate::impl_job_config!(AmbientOcclusionConfig, sanitize(this) {
    let before = this.clone();
    this.num_samples = this.num_samples.clamp(1, AmbientOcclusionConfig::MAX_SAMPLES);
    this.resolution_level = this.resolution_level.min(AmbientOcclusionConfig::MAX_RESOLUTION_LEVEL);
    this.blur_radius = this.blur_radius.min(AmbientOcclusionConfig::MAX_BLUR_RADIUS);
    if this.radius.is_nan() || this.radius <= 0.0 {
        this.radius = AmbientOcclusionConfig::default().radius;
    }
    this.level = if this.level.is_nan() { 0.0 } else { this.level.clamp(0.0, 1.0) };
    *this != before
});

/// Occlusion at `1 / 2^resolution_level` followed by a separable blur.
pub struct AmbientOcclusionEffect {
    occlusion: JobFramebuffer,
    blurred: JobFramebuffer,
    level: Option<u32>,
    buffer: Option<BufferId>,
    occlusion_pipeline: LazyPipeline,
    blur_pipeline: LazyPipeline,
}

impl Default for AmbientOcclusionEffect {
    fn default() -> Self {
        Self {
            occlusion: JobFramebuffer::new("AmbientOcclusion").color(LDR_FORMAT),
            blurred: JobFramebuffer::new("AmbientOcclusionBlurred").color(LDR_FORMAT),
            level: None,
            buffer: None,
            occlusion_pipeline: LazyPipeline::new(
                "AmbientOcclusion.occlusion",
                PipelineState::fullscreen(),
            ),
            blur_pipeline: LazyPipeline::new("AmbientOcclusion.blur", PipelineState::fullscreen()),
        }
    }
}

impl Job for AmbientOcclusionEffect {
    type Inputs = AmbientOcclusionInputs;
    type Output = AmbientOcclusionOutputs;
    type Config = AmbientOcclusionConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut AmbientOcclusionConfig,
        inputs: &AmbientOcclusionInputs,
        varyings: &Varyings,
    ) -> Result<AmbientOcclusionOutputs> {
        if self.level != Some(config.resolution_level) {
            let divisor = 1 << config.resolution_level;
            self.occlusion = JobFramebuffer::new("AmbientOcclusion")
                .color(LDR_FORMAT)
                .downscaled(divisor);
            self.blurred = JobFramebuffer::new("AmbientOcclusionBlurred")
                .color(LDR_FORMAT)
                .downscaled(divisor);
            self.level = Some(config.resolution_level);
        }

        let transform = varyings.get(&inputs.frame_transform)?;
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;
        let linear_depth = varyings.get(&inputs.linear_depth)?;

        let size = reference_size(&ctx.gpu, deferred, ctx.args.viewport);
        let occlusion = self.occlusion.ensure(&mut ctx.gpu, size);
        let blurred = self.blurred.ensure(&mut ctx.gpu, size);
        let buffer = upload_uniform(
            &mut ctx.gpu,
            &mut self.buffer,
            "AmbientOcclusionParameters",
            &config.uniforms(),
        )?;
        let occlusion_pipeline = self.occlusion_pipeline.get(&mut ctx.gpu);
        let blur_pipeline = self.blur_pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("AmbientOcclusion", &ctx.gpu, Some(occlusion), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::AMBIENT_OCCLUSION, Some(buffer));
        batch.set_pipeline(occlusion_pipeline);
        batch.set_resource_texture(
            texture::HALF_LINEAR_DEPTH,
            Some(linear_depth.half_linear_depth),
        );
        batch.set_resource_texture(texture::HALF_NORMAL, Some(linear_depth.half_normal));
        batch.draw_fullscreen();

        if config.blur_radius > 0 {
            batch.set_pipeline(blur_pipeline);
            for (source, target) in [(occlusion, blurred), (blurred, occlusion)] {
                batch.set_framebuffer(Some(target));
                batch.set_resource_texture(
                    texture::AMBIENT_OCCLUSION,
                    Some(ctx.gpu.framebuffer_color(source, 0)),
                );
                batch.draw_fullscreen();
            }
        }
        ctx.gpu.submit(batch)?;

        Ok(AmbientOcclusionOutputs {
            framebuffer: occlusion,
            uniforms: Some(buffer),
        })
    }
}

// ─── Velocity ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VelocityOutputs {
    pub framebuffer: FramebufferId,
    pub velocity: TextureId,
}

crate::job_outputs!(VelocityOutputs {
    0 => framebuffer: FramebufferId as FRAMEBUFFER,
    1 => velocity: TextureId as VELOCITY,
});

/// Screen-space motion from camera reprojection, consumed by antialiasing.
pub struct VelocityBufferPass {
    framebuffer: JobFramebuffer,
    pipeline: LazyPipeline,
}

impl Default for VelocityBufferPass {
    fn default() -> Self {
        Self {
            framebuffer: JobFramebuffer::new("Velocity").color(VELOCITY_FORMAT),
            pipeline: LazyPipeline::new("VelocityBuffer", PipelineState::fullscreen()),
        }
    }
}

impl Job for VelocityBufferPass {
    type Inputs = SurfaceInputs;
    type Output = VelocityOutputs;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &SurfaceInputs,
        varyings: &Varyings,
    ) -> Result<VelocityOutputs> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;

        let size = reference_size(&ctx.gpu, deferred, ctx.args.viewport);
        let framebuffer = self.framebuffer.ensure(&mut ctx.gpu, size);
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("VelocityBuffer", &ctx.gpu, Some(framebuffer), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(
            texture::DEFERRED_DEPTH,
            Some(ctx.gpu.framebuffer_depth(deferred)),
        );
        batch.draw_fullscreen();
        ctx.gpu.submit(batch)?;

        Ok(VelocityOutputs {
            framebuffer,
            velocity: ctx.gpu.framebuffer_color(framebuffer, 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::BatchCommand;
    use crate::graph::{JobConfig, Task};
    use crate::jobs::frame::MakeLightingModel;

    #[test]
    fn test_scattering_lut_is_drawn_once_into_its_own_target() {
        let mut ctx = RenderContext::default();
        let (mut task, resource) = Task::<()>::build("Surfaces", |b, _| {
            let lighting_model = b.add_job("LightingModel", MakeLightingModel::default(), ())?;
            b.add_job("Scattering", SubsurfaceScattering::default(), lighting_model)
        })
        .unwrap();

        let scattering = task
            .dependencies()
            .into_iter()
            .find(|job| job.path == "Surfaces.Scattering")
            .unwrap();
        let producers: Vec<_> = scattering.inputs.iter().map(|d| d.producer.as_str()).collect();
        assert_eq!(producers, ["Surfaces.LightingModel"]);

        ctx.gpu.begin_frame().unwrap();
        task.run(&mut ctx, ()).unwrap();
        let frame = ctx.gpu.end_frame().unwrap();
        let batch = frame.batch("SubsurfaceScattering").unwrap();
        let BatchCommand::SetFramebuffer(Some(target)) = batch.commands()[0] else {
            panic!("LUT batch does not bind a target first");
        };
        assert_eq!(batch.draw_count(), 1);
        assert_eq!(
            task.get(&resource).unwrap().lut,
            Some(ctx.gpu.framebuffer_color(target, 0))
        );
        assert_eq!(ctx.gpu.framebuffer_size(target), Some(SubsurfaceScattering::LUT_SIZE));

        ctx.gpu.begin_frame().unwrap();
        task.run(&mut ctx, ()).unwrap();
        let frame = ctx.gpu.end_frame().unwrap();
        assert!(frame.batch("SubsurfaceScattering").is_none());
    }

    #[test]
    fn test_ambient_occlusion_config_clamps() {
        let mut config = AmbientOcclusionConfig {
            num_samples: 0,
            resolution_level: 9,
            blur_radius: 100,
            radius: -1.0,
            ..AmbientOcclusionConfig::default()
        };
        assert!(config.sanitize());
        assert_eq!(config.num_samples, 1);
        assert_eq!(config.resolution_level, 4);
        assert_eq!(config.blur_radius, 15);
        assert_eq!(config.radius, 0.5);
        assert!(!config.sanitize());
    }

    #[test]
    fn test_surface_geometry_level_is_clamped() {
        let mut config = SurfaceGeometryConfig {
            resolution_level: 7,
            ..SurfaceGeometryConfig::default()
        };
        assert!(config.sanitize());
        assert_eq!(config.resolution_level, 2);
    }
}
