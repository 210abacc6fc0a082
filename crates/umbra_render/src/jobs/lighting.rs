//! Zones, lights, light clustering and the deferred lighting passes.
//!
//! # Light clustering
//!
//! The view frustum between `range_near` and `range_far` is divided into a
//! `dims.x * dims.y * dims.z` froxel grid: uniform in NDC x/y, exponential in
//! view depth. Every local light is assigned to each froxel its bounding
//! sphere may touch. The x/y range comes from projecting the sphere's
//! view-space bounding box, which always contains the sphere's projection,
//! so assignment is conservative: a froxel may list a light that does not
//! reach it, never the reverse.

use glam::{Mat4, UVec3, UVec4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{LazyPipeline, bind_frame_transform, pass_batch, upload_bytes, upload_uniform};
use super::frame::{DeferredFrameTransform, LightingModel};
use super::surfaces::{
    AmbientOcclusionOutputs, LinearDepthOutputs, ScatteringResource, SurfaceGeometryOutputs,
};
use crate::context::RenderContext;
use crate::gpu::slots::{buffer, texture, uniform};
use crate::gpu::uniforms::LightClusterGridUniforms;
use crate::gpu::{Batch, BufferId, FramebufferId, PipelineState, TextureId};
use crate::graph::{DebugConfig, EnabledConfig, Job, Varying, Varyings};
use crate::scene::{Haze, ItemBounds, Light, LightKind};
use umbra_core::errors::Result;
use umbra_core::math::ViewFrustum;

// ─── Zones ─────────────────────────────────────────────────────────────────

/// Keeps the items of a bucket that carry a zone.
#[derive(Default)]
pub struct FilterZones;

impl Job for FilterZones {
    type Inputs = Varying<ItemBounds>;
    type Output = ItemBounds;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<ItemBounds> {
        Ok(varyings
            .get(inputs)?
            .iter()
            .filter(|item| {
                ctx.scene
                    .item(item.id)
                    .is_some_and(|i| i.payload.zone().is_some())
            })
            .copied()
            .collect())
    }
}

/// Restages the frame's sun, ambient, skyboxes and hazes from its zones.
///
/// Zones are applied in bucket order; the first zone providing a sun or an
/// ambient light wins.
#[derive(Default)]
pub struct SetupZones;

impl Job for SetupZones {
    type Inputs = Varying<ItemBounds>;
    /// Number of zones staged.
    type Output = usize;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<usize> {
        let scene = &mut ctx.scene;
        scene.light_stage.clear();
        scene.background_stage.clear();
        scene.haze_stage.clear();

        let zones: Vec<_> = varyings
            .get(inputs)?
            .iter()
            .filter_map(|item| scene.item(item.id)?.payload.zone().cloned())
            .collect();

        for zone in &zones {
            if let Some(sun) = zone.sun
                && scene.light_stage.sun().is_none()
            {
                scene.light_stage.set_sun(sun);
            }
            if let Some(ambient) = zone.ambient
                && scene.light_stage.ambient().is_none()
            {
                scene.light_stage.set_ambient(ambient);
            }
            if let Some(skybox) = zone.skybox {
                scene.background_stage.add_skybox(skybox);
            }
            if let Some(haze) = zone.haze {
                scene.haze_stage.add_haze(haze);
            }
        }
        Ok(zones.len())
    }
}

/// Registers the lights of light items with the light stage.
#[derive(Default)]
pub struct DrawLight;

impl Job for DrawLight {
    type Inputs = Varying<ItemBounds>;
    /// Number of local lights registered.
    type Output = usize;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<usize> {
        let scene = &mut ctx.scene;
        let lights: Vec<Light> = varyings
            .get(inputs)?
            .iter()
            .filter_map(|item| scene.item(item.id)?.payload.light().copied())
            .collect();

        let mut registered = 0;
        for light in lights {
            if light.is_local() {
                scene.light_stage.add_light(light);
                registered += 1;
            } else if scene.light_stage.sun().is_none() {
                scene.light_stage.set_sun(light);
            }
        }
        Ok(registered)
    }
}

/// Haze of the frame and its parameter buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HazeOutput {
    pub haze: Option<Haze>,
    pub buffer: Option<BufferId>,
}

/// Uploads the haze staged by the zones.
#[derive(Default)]
pub struct FetchHazeStage;

impl Job for FetchHazeStage {
    type Inputs = ();
    type Output = HazeOutput;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<HazeOutput> {
        let buffer = ctx.scene.haze_stage.upload(&mut ctx.gpu)?;
        Ok(HazeOutput {
            haze: ctx.scene.haze_stage.current().copied(),
            buffer,
        })
    }
}

// ─── Light clustering ──────────────────────────────────────────────────────

pub struct LightClusteringInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub lighting_model: Varying<LightingModel>,
    pub linear_depth: Varying<LinearDepthOutputs>,
}

crate::job_inputs!(LightClusteringInputs {
    frame_transform,
    lighting_model,
    linear_depth
});

/// Froxel grid of local lights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightClusters {
    pub dims: UVec3,
    pub range_near: f32,
    pub range_far: f32,
    /// Light stage indices of the clustered lights.
    pub lights: Vec<u32>,
    /// Per cluster: first entry in `content`.
    pub cluster_offsets: Vec<u32>,
    /// Per cluster: number of entries in `content`.
    pub cluster_counts: Vec<u32>,
    /// Indices into `lights`, grouped by cluster.
    pub content: Vec<u32>,
    pub grid_buffer: Option<BufferId>,
    pub light_buffer: Option<BufferId>,
    pub cluster_buffer: Option<BufferId>,
    pub content_buffer: Option<BufferId>,
    /// Linear depth the shaders read to find a pixel's depth slice.
    pub linear_depth: Option<TextureId>,
}

impl LightClusters {
    #[inline]
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        (self.dims.x * self.dims.y * self.dims.z) as usize
    }

    #[inline]
    #[must_use]
    pub fn cluster_index(&self, x: u32, y: u32, z: u32) -> usize {
        (x + self.dims.x * (y + self.dims.y * z)) as usize
    }

    /// Indices into [`lights`](Self::lights) assigned to cluster `(x, y, z)`.
    #[must_use]
    pub fn cluster_lights(&self, x: u32, y: u32, z: u32) -> &[u32] {
        let index = self.cluster_index(x, y, z);
        match (self.cluster_offsets.get(index), self.cluster_counts.get(index)) {
            (Some(&offset), Some(&count)) => {
                &self.content[offset as usize..(offset + count) as usize]
            }
            _ => &[],
        }
    }

    #[must_use]
    pub fn non_empty_clusters(&self) -> usize {
        self.cluster_counts.iter().filter(|&&count| count > 0).count()
    }

    pub fn bind(&self, batch: &mut Batch) {
        batch.set_uniform_buffer(uniform::LIGHT_CLUSTER_FRUSTUM_GRID, self.grid_buffer);
        batch.set_resource_buffer(buffer::LIGHT_ARRAY, self.light_buffer);
        batch.set_resource_buffer(buffer::LIGHT_CLUSTER_GRID, self.cluster_buffer);
        batch.set_resource_buffer(buffer::LIGHT_CLUSTER_CONTENT, self.content_buffer);
        batch.set_resource_texture(texture::LINEAR_DEPTH, self.linear_depth);
    }

    pub fn unbind(batch: &mut Batch) {
        batch.set_uniform_buffer(uniform::LIGHT_CLUSTER_FRUSTUM_GRID, None);
        batch.set_resource_buffer(buffer::LIGHT_ARRAY, None);
        batch.set_resource_buffer(buffer::LIGHT_CLUSTER_GRID, None);
        batch.set_resource_buffer(buffer::LIGHT_CLUSTER_CONTENT, None);
        batch.set_resource_texture(texture::LINEAR_DEPTH, None);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightClusteringConfig {
    pub enabled: bool,
    pub dims: [u32; 3],
    pub range_near: f32,
    pub range_far: f32,
    /// Keeps last frame's assignment.
    pub freeze: bool,
    /// Lights clustered last frame.
    pub num_clustered_lights: usize,
}

impl Default for LightClusteringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dims: [16, 12, 16],
            range_near: 0.1,
            range_far: 200.0,
            freeze: false,
            num_clustered_lights: 0,
        }
    }
}

impl LightClusteringConfig {
    pub const MAX_DIMS: [u32; 3] = [64, 64, 128];
}

crate::impl_job_config!(LightClusteringConfig, sanitize(this) {
    let before = this.clone();
    for (dim, max) in this.dims.iter_mut().zip(LightClusteringConfig::MAX_DIMS) {
        *dim = (*dim).clamp(1, max);
    }
    if this.range_near.is_nan() || this.range_near <= 0.0 {
        this.range_near = LightClusteringConfig::default().range_near;
    }
    if this.range_far.is_nan() || this.range_far <= this.range_near {
        this.range_far = this.range_near * 2.0;
    }
    *this != before
});

/// Packed light record of the light array buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuLight {
    /// xyz position, w falloff radius.
    position: Vec4,
    /// xyz colour times intensity, w kind (1 point, 2 spot).
    color: Vec4,
    /// xyz direction, w spot cutoff cosine.
    direction: Vec4,
}

impl GpuLight {
    fn new(light: &Light) -> Self {
        let (kind, cutoff) = match light.kind {
            LightKind::Sun => (0.0, -1.0),
            LightKind::Point => (1.0, -1.0),
            LightKind::Spot { cutoff } => (2.0, cutoff.cos()),
        };
        Self {
            position: light.position.extend(light.falloff_radius),
            color: (light.color * light.intensity).extend(kind),
            direction: light.direction.extend(cutoff),
        }
    }
}

/// Assigns local lights to clusters and uploads the grid.
#[derive(Default)]
pub struct LightClusteringPass {
    clusters: LightClusters,
}

impl LightClusteringPass {
    /// Depth slice of view depth `depth`, for `slices` exponential slices.
    fn depth_slice(depth: f32, near: f32, far: f32, slices: u32) -> u32 {
        if depth <= near {
            return 0;
        }
        let t = (depth / near).ln() / (far / near).ln();
        ((t * slices as f32) as u32).min(slices - 1)
    }

    /// Cluster ranges `(min, max)` per axis touched by a view-space sphere,
    /// or `None` when it lies outside the clustered range.
    fn sphere_cluster_range(
        center: Vec3,
        radius: f32,
        projection: &Mat4,
        near: f32,
        far: f32,
        dims: UVec3,
    ) -> Option<(UVec3, UVec3)> {
        let depth = -center.z;
        if depth + radius < near || depth - radius > far {
            return None;
        }
        let z_min = Self::depth_slice((depth - radius).max(near), near, far, dims.z);
        let z_max = Self::depth_slice((depth + radius).min(far), near, far, dims.z);

        let (mut x_min, mut x_max, mut y_min, mut y_max) = (0, dims.x - 1, 0, dims.y - 1);
        if depth - radius > near {
            let mut lo = glam::Vec2::splat(f32::MAX);
            let mut hi = glam::Vec2::splat(f32::MIN);
            for i in 0..8 {
                let corner = center
                    + Vec3::new(
                        if i & 1 == 0 { -radius } else { radius },
                        if i & 2 == 0 { -radius } else { radius },
                        if i & 4 == 0 { -radius } else { radius },
                    );
                let ndc = projection.project_point3(corner).truncate();
                lo = lo.min(ndc);
                hi = hi.max(ndc);
            }
            if lo.x > 1.0 || lo.y > 1.0 || hi.x < -1.0 || hi.y < -1.0 {
                return None;
            }
            let cell = |ndc: f32, count: u32| {
                let t = ((ndc + 1.0) * 0.5).clamp(0.0, 1.0);
                ((t * count as f32) as u32).min(count - 1)
            };
            (x_min, x_max) = (cell(lo.x, dims.x), cell(hi.x, dims.x));
            (y_min, y_max) = (cell(lo.y, dims.y), cell(hi.y, dims.y));
        }

        Some((
            UVec3::new(x_min, y_min, z_min),
            UVec3::new(x_max, y_max, z_max),
        ))
    }

    /// Builds the cluster lists for `lights` seen from `frustum`.
    #[must_use]
    pub fn cluster(
        frustum: &ViewFrustum,
        lights: &[Light],
        dims: UVec3,
        range_near: f32,
        range_far: f32,
    ) -> LightClusters {
        let view = frustum.view();
        let projection = frustum.projection();
        let cluster_count = (dims.x * dims.y * dims.z) as usize;
        let mut per_cluster: Vec<Vec<u32>> = vec![Vec::new(); cluster_count];
        let mut clustered = Vec::new();

        for (stage_index, light) in lights.iter().enumerate() {
            if !light.is_local() {
                continue;
            }
            let (center, radius) = light.bounding_sphere();
            let center = view.transform_point3(center);
            let Some((lo, hi)) =
                Self::sphere_cluster_range(center, radius, &projection, range_near, range_far, dims)
            else {
                continue;
            };

            let light_index = clustered.len() as u32;
            clustered.push(stage_index as u32);
            for z in lo.z..=hi.z {
                for y in lo.y..=hi.y {
                    for x in lo.x..=hi.x {
                        per_cluster[(x + dims.x * (y + dims.y * z)) as usize].push(light_index);
                    }
                }
            }
        }

        let mut clusters = LightClusters {
            dims,
            range_near,
            range_far,
            lights: clustered,
            cluster_offsets: Vec::with_capacity(cluster_count),
            cluster_counts: Vec::with_capacity(cluster_count),
            ..LightClusters::default()
        };
        for list in per_cluster {
            clusters.cluster_offsets.push(clusters.content.len() as u32);
            clusters.cluster_counts.push(list.len() as u32);
            clusters.content.extend(list);
        }
        clusters
    }

    fn upload(&mut self, ctx: &mut RenderContext) -> Result<()> {
        let clusters = &mut self.clusters;
        let grid = LightClusterGridUniforms {
            dims: UVec4::new(
                clusters.dims.x,
                clusters.dims.y,
                clusters.dims.z,
                clusters.lights.len() as u32,
            ),
            range: Vec4::new(clusters.range_near, clusters.range_far, 0.0, 0.0),
        };
        let stage = ctx.scene.light_stage.lights();
        let lights: Vec<GpuLight> = clusters
            .lights
            .iter()
            .filter_map(|&index| stage.get(index as usize).map(GpuLight::new))
            .collect();
        let grid_cells: Vec<[u32; 2]> = clusters
            .cluster_offsets
            .iter()
            .zip(&clusters.cluster_counts)
            .map(|(&offset, &count)| [offset, count])
            .collect();

        let gpu = &mut ctx.gpu;
        upload_uniform(gpu, &mut clusters.grid_buffer, "LightClusterFrustumGrid", &grid)?;
        upload_bytes(
            gpu,
            &mut clusters.light_buffer,
            "LightArray",
            bytemuck::cast_slice(&lights),
        )?;
        upload_bytes(
            gpu,
            &mut clusters.cluster_buffer,
            "LightClusterGrid",
            bytemuck::cast_slice(&grid_cells),
        )?;
        upload_bytes(
            gpu,
            &mut clusters.content_buffer,
            "LightClusterContent",
            bytemuck::cast_slice(&clusters.content),
        )?;
        Ok(())
    }
}

impl Job for LightClusteringPass {
    type Inputs = LightClusteringInputs;
    type Output = LightClusters;
    type Config = LightClusteringConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut LightClusteringConfig,
        inputs: &LightClusteringInputs,
        varyings: &Varyings,
    ) -> Result<LightClusters> {
        let frustum = *ctx.args.require_view_frustum("LightClustering")?;
        let linear_depth = varyings.get(&inputs.linear_depth)?.linear_depth;

        if !config.freeze {
            let buffers = (
                self.clusters.grid_buffer,
                self.clusters.light_buffer,
                self.clusters.cluster_buffer,
                self.clusters.content_buffer,
            );
            self.clusters = Self::cluster(
                &frustum,
                ctx.scene.light_stage.lights(),
                UVec3::from_array(config.dims),
                config.range_near,
                config.range_far,
            );
            (
                self.clusters.grid_buffer,
                self.clusters.light_buffer,
                self.clusters.cluster_buffer,
                self.clusters.content_buffer,
            ) = buffers;
            self.upload(ctx)?;
        }
        self.clusters.linear_depth = Some(linear_depth);

        config.num_clustered_lights = self.clusters.lights.len();
        Ok(self.clusters.clone())
    }
}

/// Draws the occupied clusters over the frame.
pub struct DebugLightClusters {
    pipeline: LazyPipeline,
}

impl Default for DebugLightClusters {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("DebugLightClusters", PipelineState::fullscreen_blended()),
        }
    }
}

pub struct DebugLightClustersInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub light_clusters: Varying<LightClusters>,
    pub target: Varying<FramebufferId>,
}

crate::job_inputs!(DebugLightClustersInputs {
    frame_transform,
    light_clusters,
    target
});

impl Job for DebugLightClusters {
    type Inputs = DebugLightClustersInputs;
    type Output = ();
    type Config = DebugConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut DebugConfig,
        inputs: &DebugLightClustersInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let clusters = varyings.get(&inputs.light_clusters)?;
        let target = *varyings.get(&inputs.target)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("DebugLightClusters", &ctx.gpu, Some(target), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        clusters.bind(&mut batch);
        batch.set_pipeline(pipeline);
        batch.draw(24, clusters.non_empty_clusters() as u32);
        LightClusters::unbind(&mut batch);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Deferred lighting ─────────────────────────────────────────────────────

pub struct RenderDeferredInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub deferred_framebuffer: Varying<FramebufferId>,
    pub lighting_framebuffer: Varying<FramebufferId>,
    pub lighting_model: Varying<LightingModel>,
    pub surface_geometry: Varying<SurfaceGeometryOutputs>,
    pub scattering: Varying<ScatteringResource>,
    pub ambient_occlusion: Varying<AmbientOcclusionOutputs>,
    pub light_clusters: Varying<LightClusters>,
    pub haze: Varying<HazeOutput>,
}

crate::job_inputs!(RenderDeferredInputs {
    frame_transform,
    deferred_framebuffer,
    lighting_framebuffer,
    lighting_model,
    surface_geometry,
    scattering,
    ambient_occlusion,
    light_clusters,
    haze
});

/// Resolves the G-buffer into the lighting target: a global pass for sun and
/// ambient, then a clustered pass for local lights.
pub struct RenderDeferred {
    global: LazyPipeline,
    local: LazyPipeline,
    sun_buffer: Option<BufferId>,
    ambient_buffer: Option<BufferId>,
}

impl Default for RenderDeferred {
    fn default() -> Self {
        Self {
            global: LazyPipeline::new(
                "RenderDeferred.global",
                PipelineState {
                    stencil_test: true,
                    ..PipelineState::fullscreen()
                },
            ),
            local: LazyPipeline::new(
                "RenderDeferred.localLights",
                PipelineState {
                    stencil_test: true,
                    ..PipelineState::fullscreen_blended()
                },
            ),
            sun_buffer: None,
            ambient_buffer: None,
        }
    }
}

impl Job for RenderDeferred {
    type Inputs = RenderDeferredInputs;
    type Output = ();
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &RenderDeferredInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;
        let lighting = *varyings.get(&inputs.lighting_framebuffer)?;
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        let surface = varyings.get(&inputs.surface_geometry)?;
        let scattering = varyings.get(&inputs.scattering)?;
        let occlusion = varyings.get(&inputs.ambient_occlusion)?;
        let clusters = varyings.get(&inputs.light_clusters)?;
        let haze = varyings.get(&inputs.haze)?;

        let sun = ctx.scene.light_stage.sun().copied().unwrap_or_default();
        let ambient = ctx.scene.light_stage.ambient().copied().unwrap_or_default();
        let sun_buffer = upload_uniform(&mut ctx.gpu, &mut self.sun_buffer, "Sun", &GpuLight::new(&sun))?;
        let ambient_buffer = upload_uniform(
            &mut ctx.gpu,
            &mut self.ambient_buffer,
            "AmbientLight",
            &(ambient.color * ambient.intensity).extend(1.0),
        )?;
        let global = self.global.get(&mut ctx.gpu);
        let local = self.local.get(&mut ctx.gpu);

        let gpu = &ctx.gpu;
        let mut batch = pass_batch("RenderDeferred", gpu, Some(lighting), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::LIGHTING_MODEL, lighting_model.buffer);
        batch.set_uniform_buffer(uniform::SUBSURFACE_SCATTERING, scattering.buffer);
        batch.set_uniform_buffer(uniform::AMBIENT_OCCLUSION, occlusion.uniforms);
        batch.set_uniform_buffer(uniform::HAZE_MODEL, haze.buffer);
        for (slot, attachment) in [
            (texture::DEFERRED_COLOR, 0),
            (texture::DEFERRED_NORMAL, 1),
            (texture::DEFERRED_SPECULAR, 2),
        ] {
            batch.set_resource_texture(slot, Some(gpu.framebuffer_color(deferred, attachment)));
        }
        batch.set_resource_texture(texture::DEFERRED_DEPTH, Some(gpu.framebuffer_depth(deferred)));
        batch.set_resource_texture(
            texture::AMBIENT_OCCLUSION,
            Some(gpu.framebuffer_color(occlusion.framebuffer, 0)),
        );
        batch.set_resource_texture(
            texture::CURVATURE,
            Some(gpu.framebuffer_color(surface.curvature, 0)),
        );
        batch.set_resource_texture(
            texture::DIFFUSED_CURVATURE,
            Some(gpu.framebuffer_color(surface.low_curvature_normal, 0)),
        );
        batch.set_resource_texture(texture::SCATTERING_LUT, scattering.lut);

        batch.set_pipeline(global);
        batch.set_uniform_buffer(uniform::LIGHT, Some(sun_buffer));
        batch.set_uniform_buffer(uniform::LIGHT_AMBIENT, Some(ambient_buffer));
        batch.draw_fullscreen();

        if !clusters.lights.is_empty() {
            batch.set_pipeline(local);
            clusters.bind(&mut batch);
            batch.draw_fullscreen();
            LightClusters::unbind(&mut batch);
        }

        for slot in [
            texture::DEFERRED_COLOR,
            texture::DEFERRED_NORMAL,
            texture::DEFERRED_SPECULAR,
            texture::DEFERRED_DEPTH,
            texture::AMBIENT_OCCLUSION,
            texture::CURVATURE,
            texture::DIFFUSED_CURVATURE,
            texture::SCATTERING_LUT,
        ] {
            batch.set_resource_texture(slot, None);
        }
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Background and haze ───────────────────────────────────────────────────

pub struct BackgroundInputs {
    pub lighting_model: Varying<LightingModel>,
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub target: Varying<FramebufferId>,
}

crate::job_inputs!(BackgroundInputs {
    lighting_model,
    frame_transform,
    target
});

/// Draws the current skybox behind the lit scene.
pub struct DrawBackgroundStage {
    pipeline: LazyPipeline,
}

impl Default for DrawBackgroundStage {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new(
                "DrawBackground",
                PipelineState {
                    depth_test: true,
                    ..PipelineState::fullscreen()
                },
            ),
        }
    }
}

impl Job for DrawBackgroundStage {
    type Inputs = BackgroundInputs;
    type Output = ();
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &BackgroundInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        if !lighting_model.is_background_enabled() {
            return Ok(());
        }
        let Some(skybox) = ctx.scene.background_stage.current().copied() else {
            return Ok(());
        };
        let transform = varyings.get(&inputs.frame_transform)?;
        let target = *varyings.get(&inputs.target)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let texture = skybox
            .texture
            .unwrap_or_else(|| ctx.gpu.placeholder_texture());
        let mut batch = pass_batch("DrawBackground", &ctx.gpu, Some(target), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::SKYBOX, Some(texture));
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::SKYBOX, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

pub struct DrawHazeInputs {
    pub haze: Varying<HazeOutput>,
    pub lighting_model: Varying<LightingModel>,
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub linear_depth: Varying<LinearDepthOutputs>,
    pub target: Varying<FramebufferId>,
}

crate::job_inputs!(DrawHazeInputs {
    haze,
    lighting_model,
    frame_transform,
    linear_depth,
    target
});

/// Blends the staged haze over the opaque scene.
pub struct DrawHaze {
    pipeline: LazyPipeline,
}

impl Default for DrawHaze {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("DrawHaze", PipelineState::fullscreen_blended()),
        }
    }
}

impl Job for DrawHaze {
    type Inputs = DrawHazeInputs;
    type Output = ();
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &DrawHazeInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let haze = varyings.get(&inputs.haze)?;
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        let Some(haze_buffer) = haze.buffer else {
            return Ok(());
        };
        if !lighting_model.is_haze_enabled() {
            return Ok(());
        }
        let transform = varyings.get(&inputs.frame_transform)?;
        let linear_depth = varyings.get(&inputs.linear_depth)?;
        let target = *varyings.get(&inputs.target)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("DrawHaze", &ctx.gpu, Some(target), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::HAZE_MODEL, Some(haze_buffer));
        batch.set_uniform_buffer(uniform::LIGHTING_MODEL, lighting_model.buffer);
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::LINEAR_DEPTH, Some(linear_depth.linear_depth));
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::LINEAR_DEPTH, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::JobConfig;
    use glam::Quat;

    fn camera() -> ViewFrustum {
        ViewFrustum::perspective(
            Vec3::ZERO,
            Quat::IDENTITY,
            std::f32::consts::FRAC_PI_2,
            1.0,
            0.1,
            100.0,
        )
    }

    #[test]
    fn test_light_assigned_to_cluster_containing_center() {
        let frustum = camera();
        let lights = [Light::point(Vec3::new(0.0, 0.0, -10.0), 1.0)];
        let dims = UVec3::new(8, 8, 16);
        let clusters = LightClusteringPass::cluster(&frustum, &lights, dims, 0.1, 100.0);

        assert_eq!(clusters.lights, [0]);
        assert_eq!(clusters.cluster_offsets.len(), clusters.cluster_count());

        let z = LightClusteringPass::depth_slice(10.0, 0.1, 100.0, dims.z);
        assert!(!clusters.cluster_lights(4, 4, z).is_empty());
        assert!(clusters.cluster_lights(0, 0, z).is_empty());
        assert!(clusters.cluster_lights(4, 4, 0).is_empty());
    }

    #[test]
    fn test_lights_outside_range_are_skipped() {
        let frustum = camera();
        let lights = [
            Light::point(Vec3::new(0.0, 0.0, 10.0), 1.0),
            Light::point(Vec3::new(0.0, 0.0, -500.0), 1.0),
            Light::point(Vec3::new(300.0, 0.0, -10.0), 1.0),
            Light::sun(Vec3::NEG_Y, Vec3::ONE, 1.0),
        ];
        let clusters =
            LightClusteringPass::cluster(&frustum, &lights, UVec3::new(4, 4, 4), 0.1, 100.0);
        assert!(clusters.lights.is_empty());
        assert!(clusters.content.is_empty());
    }

    #[test]
    fn test_light_around_camera_covers_full_xy() {
        let frustum = camera();
        let lights = [Light::point(Vec3::ZERO, 2.0)];
        let dims = UVec3::new(4, 4, 8);
        let clusters = LightClusteringPass::cluster(&frustum, &lights, dims, 0.1, 100.0);
        for x in 0..dims.x {
            for y in 0..dims.y {
                assert_eq!(clusters.cluster_lights(x, y, 0), [0]);
            }
        }
    }

    #[test]
    fn test_depth_slices_are_monotonic() {
        let mut last = 0;
        for depth in [0.05, 0.1, 0.5, 1.0, 10.0, 50.0, 100.0, 1000.0] {
            let slice = LightClusteringPass::depth_slice(depth, 0.1, 100.0, 16);
            assert!(slice >= last);
            assert!(slice < 16);
            last = slice;
        }
    }

    #[test]
    fn test_clustering_config_clamps() {
        let mut config = LightClusteringConfig {
            dims: [0, 1000, 16],
            range_near: -1.0,
            range_far: 0.0,
            ..LightClusteringConfig::default()
        };
        assert!(config.sanitize());
        assert_eq!(config.dims, [1, 64, 16]);
        assert_eq!(config.range_near, 0.1);
        assert!(config.range_far > config.range_near);
    }
}
