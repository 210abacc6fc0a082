//! Debug visualizers. All of them are disabled by default and record nothing
//! until enabled through the config registry.

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{LazyPipeline, bind_frame_transform, pass_batch, upload_bytes, upload_uniform};
use super::draw::view_batch;
use super::frame::{DeferredFrameTransform, LightingModel};
use super::select::SpatialSelection;
use super::surfaces::{
    AmbientOcclusionOutputs, LinearDepthOutputs, ScatteringResource, SurfaceGeometryOutputs,
    VelocityOutputs,
};
use crate::context::RenderContext;
use crate::gpu::slots::{texture, uniform};
use crate::gpu::{Batch, BufferId, FramebufferId, PipelineState, TextureId};
use crate::graph::{DebugConfig, Job, Varying, Varyings};
use crate::scene::{ItemBounds, ItemId};
use umbra_core::errors::Result;
use umbra_core::math::{Aabb, ViewFrustum, Viewport};

/// Vertices of one box or frustum drawn as a line list.
const BOX_LINE_VERTICES: u32 = 24;

fn line_state() -> PipelineState {
    PipelineState {
        depth_write: false,
        cull_back_faces: false,
        wireframe: true,
        ..PipelineState::default()
    }
}

/// Packs boxes as `(min, max)` pairs for the instanced box shader.
fn pack_boxes(boxes: impl IntoIterator<Item = Aabb>) -> Vec<[Vec4; 2]> {
    boxes
        .into_iter()
        .map(|aabb| [aabb.min.extend(1.0), aabb.max.extend(1.0)])
        .collect()
}

/// Instanced wireframe boxes in world space.
struct BoxDrawer {
    pipeline: LazyPipeline,
    instances: Option<BufferId>,
    color: Option<BufferId>,
}

impl BoxDrawer {
    fn new(label: &'static str) -> Self {
        Self {
            pipeline: LazyPipeline::new(label, line_state()),
            instances: None,
            color: None,
        }
    }

    /// Records the boxes into `batch`; returns how many were drawn.
    fn draw(
        &mut self,
        ctx: &mut RenderContext,
        batch: &mut Batch,
        boxes: &[[Vec4; 2]],
        color: Vec4,
    ) -> Result<usize> {
        if boxes.is_empty() {
            return Ok(0);
        }
        let instances = upload_bytes(
            &mut ctx.gpu,
            &mut self.instances,
            "DebugBoxes",
            bytemuck::cast_slice(boxes),
        )?;
        let color = upload_uniform(&mut ctx.gpu, &mut self.color, "DebugBoxColor", &color)?;
        batch.set_pipeline(self.pipeline.get(&mut ctx.gpu));
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(color));
        batch.set_resource_buffer(0, Some(instances));
        batch.draw(BOX_LINE_VERTICES, boxes.len() as u32);
        batch.set_resource_buffer(0, None);
        Ok(boxes.len())
    }
}

// ─── Bounds and frustums ───────────────────────────────────────────────────

/// Draws the bound of every item in a bucket.
pub struct DrawBounds {
    drawer: BoxDrawer,
    color: Vec4,
}

impl Default for DrawBounds {
    fn default() -> Self {
        Self {
            drawer: BoxDrawer::new("DrawBounds"),
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

impl Job for DrawBounds {
    type Inputs = Varying<ItemBounds>;
    /// Number of bounds drawn.
    type Output = usize;
    type Config = DebugConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut DebugConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<usize> {
        let items = varyings.get(inputs)?;
        let boxes = pack_boxes(items.iter().map(|item| item.bound));
        let mut batch = view_batch("DrawBounds", ctx, "DrawBounds")?;
        let drawn = self.drawer.draw(ctx, &mut batch, &boxes, self.color)?;
        ctx.gpu.submit(batch)?;
        Ok(drawn)
    }
}

/// View frustum and shadow cascade frustums of the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustums {
    pub view: Option<ViewFrustum>,
    pub shadow_cascade0: Option<ViewFrustum>,
    pub shadow_cascade1: Option<ViewFrustum>,
    pub shadow_cascade2: Option<ViewFrustum>,
    pub shadow_cascade3: Option<ViewFrustum>,
}

crate::job_outputs!(Frustums {
    0 => view: Option<ViewFrustum> as VIEW_FRUSTUM,
    1 => shadow_cascade0: Option<ViewFrustum> as SHADOW_CASCADE0_FRUSTUM,
    2 => shadow_cascade1: Option<ViewFrustum> as SHADOW_CASCADE1_FRUSTUM,
    3 => shadow_cascade2: Option<ViewFrustum> as SHADOW_CASCADE2_FRUSTUM,
    4 => shadow_cascade3: Option<ViewFrustum> as SHADOW_CASCADE3_FRUSTUM,
});

impl Frustums {
    pub const SHADOW_CASCADES: [crate::graph::Field<Frustums, Option<ViewFrustum>>; 4] = [
        Self::SHADOW_CASCADE0_FRUSTUM,
        Self::SHADOW_CASCADE1_FRUSTUM,
        Self::SHADOW_CASCADE2_FRUSTUM,
        Self::SHADOW_CASCADE3_FRUSTUM,
    ];

    fn cascade_mut(&mut self, index: usize) -> Option<&mut Option<ViewFrustum>> {
        match index {
            0 => Some(&mut self.shadow_cascade0),
            1 => Some(&mut self.shadow_cascade1),
            2 => Some(&mut self.shadow_cascade2),
            3 => Some(&mut self.shadow_cascade3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractFrustumsConfig {
    pub enabled: bool,
    /// Distance covered by the shadow cascades.
    pub shadow_max_distance: f32,
}

impl Default for ExtractFrustumsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shadow_max_distance: 100.0,
        }
    }
}

crate::impl_job_config!(ExtractFrustumsConfig, sanitize(this) {
    if this.shadow_max_distance.is_nan() || this.shadow_max_distance <= 0.0 {
        this.shadow_max_distance = ExtractFrustumsConfig::default().shadow_max_distance;
        return true;
    }
    false
});

/// Copies the view frustum and fits orthographic cascades around slices of it
/// along the sun direction.
pub struct ExtractFrustums {
    cascade_count: usize,
}

impl ExtractFrustums {
    #[must_use]
    pub fn new(cascade_count: usize) -> Self {
        Self {
            cascade_count: cascade_count.min(Frustums::SHADOW_CASCADES.len()),
        }
    }

    /// Split distances between `near` and `far`, blending uniform and
    /// logarithmic splits evenly.
    #[must_use]
    pub fn cascade_splits(near: f32, far: f32, count: usize) -> Vec<f32> {
        (0..=count)
            .map(|i| {
                let t = i as f32 / count as f32;
                let uniform = near + (far - near) * t;
                let log = near * (far / near).powf(t);
                0.5 * (uniform + log)
            })
            .collect()
    }

    /// Orthographic frustum enclosing the slice `[start, end]` of `view`.
    fn fit_cascade(view: &ViewFrustum, direction: Vec3, start: f32, end: f32) -> ViewFrustum {
        let corners = view.corners();
        let (near, far) = (view.near_clip(), view.far_clip());
        let range = (far - near).max(f32::EPSILON);
        let slice: [Vec3; 8] = std::array::from_fn(|i| {
            let edge = i % 4;
            let distance = if i < 4 { start } else { end };
            corners[edge].lerp(corners[edge + 4], (distance - near) / range)
        });
        let center = slice.iter().copied().sum::<Vec3>() / 8.0;
        let radius = slice
            .iter()
            .map(|corner| corner.distance(center))
            .fold(0.0, f32::max)
            .max(0.01);
        let orientation = Quat::from_rotation_arc(Vec3::NEG_Z, direction);
        ViewFrustum::orthographic(
            center - direction * radius * 2.0,
            orientation,
            radius,
            radius,
            0.01,
            radius * 4.0,
        )
    }
}

impl Job for ExtractFrustums {
    type Inputs = ();
    type Output = Frustums;
    type Config = ExtractFrustumsConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut ExtractFrustumsConfig,
        _inputs: &(),
        _varyings: &Varyings,
    ) -> Result<Frustums> {
        let mut frustums = Frustums {
            view: ctx.args.view_frustum,
            ..Frustums::default()
        };
        let (Some(view), Some(sun)) = (ctx.args.view_frustum, ctx.scene.light_stage.sun()) else {
            return Ok(frustums);
        };
        let direction = sun.direction.normalize_or(Vec3::NEG_Y);
        let near = view.near_clip();
        let far = view.far_clip().min(near + config.shadow_max_distance);
        let splits = Self::cascade_splits(near, far, self.cascade_count.max(1));

        for (index, pair) in splits.windows(2).take(self.cascade_count).enumerate() {
            if let Some(slot) = frustums.cascade_mut(index) {
                *slot = Some(Self::fit_cascade(&view, direction, pair[0], pair[1]));
            }
        }
        Ok(frustums)
    }
}

/// Draws the edges of a frustum in a fixed colour.
pub struct DrawFrustum {
    color: Vec3,
    pipeline: LazyPipeline,
    corners: Option<BufferId>,
    color_buffer: Option<BufferId>,
}

impl DrawFrustum {
    #[must_use]
    pub fn new(color: Vec3) -> Self {
        Self {
            color,
            pipeline: LazyPipeline::new("DrawFrustum", line_state()),
            corners: None,
            color_buffer: None,
        }
    }
}

impl Job for DrawFrustum {
    type Inputs = Varying<Option<ViewFrustum>>;
    type Output = ();
    type Config = DebugConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut DebugConfig,
        inputs: &Varying<Option<ViewFrustum>>,
        varyings: &Varyings,
    ) -> Result<()> {
        let Some(frustum) = varyings.get(inputs)? else {
            return Ok(());
        };
        let corners = frustum.corners().map(|corner| corner.extend(1.0));
        let corners = upload_bytes(
            &mut ctx.gpu,
            &mut self.corners,
            "FrustumCorners",
            bytemuck::cast_slice(&corners),
        )?;
        let color = upload_uniform(
            &mut ctx.gpu,
            &mut self.color_buffer,
            "FrustumColor",
            &self.color.extend(1.0),
        )?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = view_batch("DrawFrustum", ctx, "DrawFrustum")?;
        batch.set_pipeline(pipeline);
        batch.set_uniform_buffer(uniform::EFFECT_PARAMETERS, Some(color));
        batch.set_resource_buffer(0, Some(corners));
        batch.draw(BOX_LINE_VERTICES, 1);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Buffer visualizers ────────────────────────────────────────────────────

/// Channel shown by [`DebugDeferredBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeferredDebugMode {
    #[default]
    Albedo,
    Normal,
    Specular,
    Depth,
    LinearDepth,
    HalfLinearDepth,
    HalfNormal,
    Curvature,
    DiffusedCurvature,
    AmbientOcclusion,
    Velocity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugDeferredBufferConfig {
    pub enabled: bool,
    pub mode: DeferredDebugMode,
    /// Covered region in NDC: `(x_min, y_min, x_max, y_max)`.
    pub size: Vec4,
}

impl Default for DebugDeferredBufferConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: DeferredDebugMode::default(),
            size: Vec4::new(0.0, -1.0, 1.0, 1.0),
        }
    }
}

crate::impl_job_config!(DebugDeferredBufferConfig, sanitize(this) {
    let before = this.size;
    let clamped = this.size.clamp(Vec4::NEG_ONE, Vec4::ONE);
    this.size = if clamped.is_nan() {
        DebugDeferredBufferConfig::default().size
    } else {
        clamped
    };
    this.size != before
});

/// Pixel rectangle of an NDC region inside `viewport`.
fn ndc_rect(viewport: Viewport, region: Vec4) -> Viewport {
    let to_pixels = |ndc: f32, extent: u32| ((ndc + 1.0) * 0.5 * extent as f32) as u32;
    let x0 = to_pixels(region.x.min(region.z), viewport.width);
    let x1 = to_pixels(region.x.max(region.z), viewport.width);
    let y0 = to_pixels(region.y.min(region.w), viewport.height);
    let y1 = to_pixels(region.y.max(region.w), viewport.height);
    Viewport::new(viewport.x + x0 as i32, viewport.y + y0 as i32, x1 - x0, y1 - y0)
}

pub struct DebugDeferredBufferInputs {
    pub deferred_framebuffer: Varying<FramebufferId>,
    pub linear_depth: Varying<LinearDepthOutputs>,
    pub surface_geometry: Varying<SurfaceGeometryOutputs>,
    pub ambient_occlusion: Varying<AmbientOcclusionOutputs>,
    pub velocity: Varying<VelocityOutputs>,
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub target: Varying<FramebufferId>,
}

crate::job_inputs!(DebugDeferredBufferInputs {
    deferred_framebuffer,
    linear_depth,
    surface_geometry,
    ambient_occlusion,
    velocity,
    frame_transform,
    target
});

/// Shows one intermediate buffer of the frame over part of the screen.
pub struct DebugDeferredBuffer {
    pipeline: LazyPipeline,
}

impl Default for DebugDeferredBuffer {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("DebugDeferredBuffer", PipelineState::fullscreen()),
        }
    }
}

impl Job for DebugDeferredBuffer {
    type Inputs = DebugDeferredBufferInputs;
    type Output = ();
    type Config = DebugDeferredBufferConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DebugDeferredBufferConfig,
        inputs: &DebugDeferredBufferInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let deferred = *varyings.get(&inputs.deferred_framebuffer)?;
        let linear_depth = varyings.get(&inputs.linear_depth)?;
        let surface = varyings.get(&inputs.surface_geometry)?;
        let occlusion = varyings.get(&inputs.ambient_occlusion)?;
        let velocity = varyings.get(&inputs.velocity)?;
        let transform = varyings.get(&inputs.frame_transform)?;
        let target = *varyings.get(&inputs.target)?;

        let gpu = &ctx.gpu;
        let source: TextureId = match config.mode {
            DeferredDebugMode::Albedo => gpu.framebuffer_color(deferred, 0),
            DeferredDebugMode::Normal => gpu.framebuffer_color(deferred, 1),
            DeferredDebugMode::Specular => gpu.framebuffer_color(deferred, 2),
            DeferredDebugMode::Depth => gpu.framebuffer_depth(deferred),
            DeferredDebugMode::LinearDepth => linear_depth.linear_depth,
            DeferredDebugMode::HalfLinearDepth => linear_depth.half_linear_depth,
            DeferredDebugMode::HalfNormal => linear_depth.half_normal,
            DeferredDebugMode::Curvature => gpu.framebuffer_color(surface.curvature, 0),
            DeferredDebugMode::DiffusedCurvature => {
                gpu.framebuffer_color(surface.low_curvature_normal, 0)
            }
            DeferredDebugMode::AmbientOcclusion => gpu.framebuffer_color(occlusion.framebuffer, 0),
            DeferredDebugMode::Velocity => velocity.velocity,
        };
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("DebugDeferredBuffer", &ctx.gpu, Some(target), ctx.args.viewport);
        let full = ctx
            .gpu
            .framebuffer_size(target)
            .map_or(ctx.args.viewport, |(w, h)| Viewport::from_size(w, h));
        batch.set_viewport(ndc_rect(full, config.size));
        bind_frame_transform(&mut batch, transform);
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::SOURCE, Some(source));
        batch.draw_fullscreen();
        batch.set_resource_texture(texture::SOURCE, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugScatteringConfig {
    pub enabled: bool,
    pub show_profile: bool,
    pub show_lut: bool,
}

impl Default for DebugScatteringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            show_profile: true,
            show_lut: true,
        }
    }
}

crate::impl_job_config!(DebugScatteringConfig);

pub struct DebugScatteringInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub lighting_model: Varying<LightingModel>,
    pub scattering: Varying<ScatteringResource>,
    pub target: Varying<FramebufferId>,
}

crate::job_inputs!(DebugScatteringInputs {
    frame_transform,
    lighting_model,
    scattering,
    target
});

/// Shows the scattering profile and lookup table in the corner of the view.
pub struct DebugScattering {
    pipeline: LazyPipeline,
}

impl DebugScattering {
    /// Side of each panel in pixels.
    pub const PANEL_SIZE: u32 = 256;
}

impl Default for DebugScattering {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("DebugScattering", PipelineState::fullscreen()),
        }
    }
}

impl Job for DebugScattering {
    type Inputs = DebugScatteringInputs;
    type Output = ();
    type Config = DebugScatteringConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DebugScatteringConfig,
        inputs: &DebugScatteringInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let lighting_model = varyings.get(&inputs.lighting_model)?;
        let scattering = varyings.get(&inputs.scattering)?;
        let target = *varyings.get(&inputs.target)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let panels = [
            (config.show_profile, scattering.profile),
            (config.show_lut, scattering.lut),
        ];
        let mut batch = pass_batch("DebugScattering", &ctx.gpu, Some(target), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::LIGHTING_MODEL, lighting_model.buffer);
        batch.set_uniform_buffer(uniform::SUBSURFACE_SCATTERING, scattering.buffer);
        batch.set_pipeline(pipeline);
        let size = Self::PANEL_SIZE;
        for (column, panel) in panels
            .into_iter()
            .filter_map(|(shown, panel)| shown.then_some(panel).flatten())
            .enumerate()
        {
            batch.set_viewport(Viewport::new((column as u32 * size) as i32, 0, size, size));
            batch.set_resource_texture(texture::SOURCE, Some(panel));
            batch.draw_fullscreen();
        }
        batch.set_resource_texture(texture::SOURCE, None);
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

pub struct DebugAmbientOcclusionInputs {
    pub frame_transform: Varying<DeferredFrameTransform>,
    pub linear_depth: Varying<LinearDepthOutputs>,
    pub ambient_occlusion: Varying<AmbientOcclusionOutputs>,
    pub target: Varying<FramebufferId>,
}

crate::job_inputs!(DebugAmbientOcclusionInputs {
    frame_transform,
    linear_depth,
    ambient_occlusion,
    target
});

/// Overlays the raw occlusion term on the view.
pub struct DebugAmbientOcclusion {
    pipeline: LazyPipeline,
}

impl Default for DebugAmbientOcclusion {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new(
                "DebugAmbientOcclusion",
                PipelineState::fullscreen_blended(),
            ),
        }
    }
}

impl Job for DebugAmbientOcclusion {
    type Inputs = DebugAmbientOcclusionInputs;
    type Output = ();
    type Config = DebugConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut DebugConfig,
        inputs: &DebugAmbientOcclusionInputs,
        varyings: &Varyings,
    ) -> Result<()> {
        let transform = varyings.get(&inputs.frame_transform)?;
        let linear_depth = varyings.get(&inputs.linear_depth)?;
        let occlusion = varyings.get(&inputs.ambient_occlusion)?;
        let target = *varyings.get(&inputs.target)?;
        let pipeline = self.pipeline.get(&mut ctx.gpu);

        let mut batch = pass_batch("DebugAmbientOcclusion", &ctx.gpu, Some(target), ctx.args.viewport);
        bind_frame_transform(&mut batch, transform);
        batch.set_uniform_buffer(uniform::AMBIENT_OCCLUSION, occlusion.uniforms);
        batch.set_pipeline(pipeline);
        batch.set_resource_texture(texture::HALF_LINEAR_DEPTH, Some(linear_depth.half_linear_depth));
        batch.set_resource_texture(
            texture::AMBIENT_OCCLUSION,
            Some(ctx.gpu.framebuffer_color(occlusion.framebuffer, 0)),
        );
        batch.draw_fullscreen();
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

// ─── Scene visualizers ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSceneOctreeConfig {
    pub enabled: bool,
    pub show_visible_cells: bool,
    pub show_empty_cells: bool,
    /// Cells drawn last frame.
    pub num_drawn: usize,
}

impl Default for DrawSceneOctreeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            show_visible_cells: true,
            show_empty_cells: false,
            num_drawn: 0,
        }
    }
}

crate::impl_job_config!(DrawSceneOctreeConfig);

/// Draws the spatial cells the frame's selection touched.
pub struct DrawSceneOctree {
    drawer: BoxDrawer,
}

impl Default for DrawSceneOctree {
    fn default() -> Self {
        Self {
            drawer: BoxDrawer::new("DrawSceneOctree"),
        }
    }
}

impl Job for DrawSceneOctree {
    type Inputs = Varying<SpatialSelection>;
    type Output = ();
    type Config = DrawSceneOctreeConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DrawSceneOctreeConfig,
        inputs: &Varying<SpatialSelection>,
        varyings: &Varyings,
    ) -> Result<()> {
        let selection = varyings.get(inputs)?;
        let has_items = !selection.inside.is_empty() || !selection.partial.is_empty();
        let shown = (config.show_visible_cells && has_items)
            || (config.show_empty_cells && !has_items);
        let boxes = if shown {
            pack_boxes(selection.cells.iter().copied())
        } else {
            Vec::new()
        };

        let mut batch = view_batch("DrawSceneOctree", ctx, "DrawSceneOctree")?;
        config.num_drawn = self
            .drawer
            .draw(ctx, &mut batch, &boxes, Vec4::new(0.2, 0.8, 0.2, 1.0))?;
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawItemSelectionConfig {
    pub enabled: bool,
    pub show_inside_items: bool,
    pub show_partial_items: bool,
}

impl Default for DrawItemSelectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            show_inside_items: true,
            show_partial_items: true,
        }
    }
}

crate::impl_job_config!(DrawItemSelectionConfig);

/// Draws the bounds of items the spatial query kept, coloured by whether
/// they were fully inside the view.
pub struct DrawItemSelection {
    inside: BoxDrawer,
    partial: BoxDrawer,
}

impl Default for DrawItemSelection {
    fn default() -> Self {
        Self {
            inside: BoxDrawer::new("DrawItemSelection.inside"),
            partial: BoxDrawer::new("DrawItemSelection.partial"),
        }
    }
}

impl Job for DrawItemSelection {
    type Inputs = Varying<SpatialSelection>;
    type Output = ();
    type Config = DrawItemSelectionConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DrawItemSelectionConfig,
        inputs: &Varying<SpatialSelection>,
        varyings: &Varyings,
    ) -> Result<()> {
        let selection = varyings.get(inputs)?;
        let bounds = |ids: &[ItemId], shown: bool| {
            if !shown {
                return Vec::new();
            }
            pack_boxes(ids.iter().filter_map(|&id| Some(ctx.scene.item(id)?.bound)))
        };
        let inside = bounds(&selection.inside, config.show_inside_items);
        let partial = bounds(&selection.partial, config.show_partial_items);

        let mut batch = view_batch("DrawItemSelection", ctx, "DrawItemSelection")?;
        self.inside
            .draw(ctx, &mut batch, &inside, Vec4::new(0.0, 1.0, 0.0, 1.0))?;
        self.partial
            .draw(ctx, &mut batch, &partial, Vec4::new(1.0, 0.5, 0.0, 1.0))?;
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawStatusConfig {
    pub enabled: bool,
    pub show_display: bool,
    pub show_network: bool,
}

impl Default for DrawStatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            show_display: true,
            show_network: false,
        }
    }
}

crate::impl_job_config!(DrawStatusConfig);

/// Draws a status icon above every item of a bucket.
///
/// The icon atlas is looked up by asset name on first use; when it is
/// missing the placeholder texture is used instead.
pub struct DrawStatus {
    atlas_name: String,
    atlas: Option<TextureId>,
    pipeline: LazyPipeline,
    positions: Option<BufferId>,
}

impl DrawStatus {
    #[must_use]
    pub fn new(atlas_name: impl Into<String>) -> Self {
        Self {
            atlas_name: atlas_name.into(),
            atlas: None,
            pipeline: LazyPipeline::new("DrawStatus", PipelineState::fullscreen_blended()),
            positions: None,
        }
    }

    fn atlas(&mut self, ctx: &RenderContext) -> TextureId {
        *self.atlas.get_or_insert_with(|| {
            ctx.gpu.find_texture(&self.atlas_name).unwrap_or_else(|err| {
                log::warn!("DrawStatus: {err}; using placeholder icons");
                ctx.gpu.placeholder_texture()
            })
        })
    }
}

impl Job for DrawStatus {
    type Inputs = Varying<ItemBounds>;
    type Output = ();
    type Config = DrawStatusConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        config: &mut DrawStatusConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<()> {
        let items = varyings.get(inputs)?;
        let atlas = self.atlas(ctx);
        let mut batch = view_batch("DrawStatus", ctx, "DrawStatus")?;
        let icon_rows = u32::from(config.show_display) + u32::from(config.show_network);
        if !items.is_empty() && icon_rows > 0 {
            let anchors: Vec<Vec4> = items
                .iter()
                .map(|item| {
                    let top = item.bound.center() + Vec3::Y * item.bound.half_extents().y;
                    top.extend(icon_rows as f32)
                })
                .collect();
            let positions = upload_bytes(
                &mut ctx.gpu,
                &mut self.positions,
                "StatusIconAnchors",
                bytemuck::cast_slice(&anchors),
            )?;
            batch.set_pipeline(self.pipeline.get(&mut ctx.gpu));
            batch.set_resource_buffer(0, Some(positions));
            batch.set_resource_texture(texture::SOURCE, Some(atlas));
            batch.draw(4, items.len() as u32 * icon_rows);
            batch.set_resource_texture(texture::SOURCE, None);
        }
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

/// Shows the staged sun, ambient, skyboxes and hazes as a column of swatches.
pub struct DrawZoneStack {
    pipeline: LazyPipeline,
    swatches: Option<BufferId>,
}

impl Default for DrawZoneStack {
    fn default() -> Self {
        Self {
            pipeline: LazyPipeline::new("DrawZoneStack", PipelineState::fullscreen()),
            swatches: None,
        }
    }
}

impl DrawZoneStack {
    pub const SWATCH_SIZE: u32 = 64;

    /// Swatch colours, top to bottom: sun, ambient, skyboxes, hazes.
    #[must_use]
    pub fn swatches(ctx: &RenderContext) -> Vec<Vec4> {
        let lights = &ctx.scene.light_stage;
        let sun = lights.sun().map(|sun| (sun.color * sun.intensity).extend(1.0));
        let ambient = lights
            .ambient()
            .map(|ambient| (ambient.color * ambient.intensity).extend(1.0));
        sun.into_iter()
            .chain(ambient)
            .chain(
                ctx.scene
                    .background_stage
                    .skyboxes()
                    .iter()
                    .map(|skybox| skybox.color.extend(1.0)),
            )
            .chain(ctx.scene.haze_stage.current().map(|haze| haze.color.extend(1.0)))
            .collect()
    }
}

impl Job for DrawZoneStack {
    type Inputs = Varying<DeferredFrameTransform>;
    type Output = ();
    type Config = DebugConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut DebugConfig,
        inputs: &Varying<DeferredFrameTransform>,
        varyings: &Varyings,
    ) -> Result<()> {
        let transform = varyings.get(inputs)?;
        let swatches = Self::swatches(ctx);
        let mut batch = Batch::new("DrawZoneStack");
        bind_frame_transform(&mut batch, transform);
        if !swatches.is_empty() {
            let buffer = upload_bytes(
                &mut ctx.gpu,
                &mut self.swatches,
                "ZoneStackSwatches",
                bytemuck::cast_slice(&swatches),
            )?;
            batch.set_pipeline(self.pipeline.get(&mut ctx.gpu));
            batch.set_resource_buffer(0, Some(buffer));
            let size = Self::SWATCH_SIZE;
            for row in 0..swatches.len() as u32 {
                batch.set_viewport(Viewport::new(0, (row * size) as i32, size, size));
                batch.draw_fullscreen();
            }
        }
        ctx.gpu.submit(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Task;
    use crate::scene::Light;

    #[test]
    fn test_cascade_splits_cover_range() {
        let splits = ExtractFrustums::cascade_splits(0.1, 100.0, 4);
        assert_eq!(splits.len(), 5);
        assert!((splits[0] - 0.1).abs() < 1e-5);
        assert!((splits[4] - 100.0).abs() < 1e-3);
        assert!(splits.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_extract_frustums_needs_sun_for_cascades() {
        let mut ctx = RenderContext::default();
        ctx.args.view_frustum = Some(ViewFrustum::perspective(
            Vec3::ZERO,
            Quat::IDENTITY,
            1.0,
            1.0,
            0.1,
            50.0,
        ));
        let (mut task, frustums) = Task::<()>::build("Frustums", |b, _| {
            b.add_job("ExtractFrustums", ExtractFrustums::new(4), ())
        })
        .unwrap();

        task.run(&mut ctx, ()).unwrap();
        let extracted = task.get(&frustums).unwrap();
        assert!(extracted.view.is_some());
        assert!(extracted.shadow_cascade0.is_none());

        ctx.scene
            .light_stage
            .set_sun(Light::sun(Vec3::new(0.0, -1.0, -1.0), Vec3::ONE, 1.0));
        task.run(&mut ctx, ()).unwrap();
        let extracted = task.get(&frustums).unwrap();
        assert!(extracted.shadow_cascade0.is_some());
        assert!(extracted.shadow_cascade3.is_some());
        let cascade = task.get(&frustums.get_n(Frustums::SHADOW_CASCADES[3])).unwrap();
        assert_eq!(*cascade, extracted.shadow_cascade3);
    }

    #[test]
    fn test_ndc_rect_right_half() {
        let rect = ndc_rect(Viewport::from_size(200, 100), Vec4::new(0.0, -1.0, 1.0, 1.0));
        assert_eq!(rect, Viewport::new(100, 0, 100, 100));
    }
}
