//! The deferred main view: the task that turns the culled and sorted item
//! buckets of one view into a finished frame.
//!
//! Every stage is its own job so each can be toggled from the config
//! registry at `RenderMainView.<Job>`. Job order is declaration order.

use glam::Vec3;

use crate::context::RenderContext;
use crate::gpu::{FramebufferId, GpuContext};
use crate::graph::{ConfigRegistry, Task, TaskBuilder, Varying};
use crate::jobs::debug::{
    DebugAmbientOcclusionInputs, DebugDeferredBufferInputs, DebugScatteringInputs,
};
use crate::jobs::draw::{DrawDeferredInputs, DrawStateSortInputs};
use crate::jobs::frame::PrepareDeferredInputs;
use crate::jobs::highlight::{HighlightInputs, HighlightMaskInputs};
use crate::jobs::lighting::{
    BackgroundInputs, DebugLightClustersInputs, DrawHazeInputs, LightClusteringInputs,
    RenderDeferredInputs,
};
use crate::jobs::post::{
    AntialiasingInputs, BloomApplyInputs, BloomThresholdInputs, DebugBloomInputs,
    ToneMappingInputs,
};
use crate::jobs::select::{FilterLayeredOutputs, SelectItemsInputs};
use crate::jobs::surfaces::{
    AmbientOcclusionInputs, SurfaceGeometryInputs, SurfaceInputs,
};
use crate::jobs::*;
use crate::scene::{ItemBounds, Layer};
use crate::settings::RenderSettings;
use crate::shapes::SharedShapePlumber;
use crate::shapes::pipelines::{deferred_pipelines, mask_pipelines, overlay_pipelines};
use umbra_core::errors::Result;

/// Name of the main view task and root of its config paths.
pub const MAIN_VIEW_TASK: &str = "RenderMainView";

/// Colour of the view frustum debug view.
const VIEW_FRUSTUM_COLOR: Vec3 = Vec3::new(1.0, 1.0, 0.0);

/// Varyings of the main view that stay readable after a frame.
#[derive(Clone)]
pub struct MainViewOutputs {
    pub primary_framebuffer: Varying<FramebufferId>,
    pub deferred: Varying<PrepareDeferredOutputs>,
    pub lighting_model: Varying<LightingModel>,
    pub linear_depth: Varying<LinearDepthOutputs>,
    pub light_clusters: Varying<LightClusters>,
    pub zones: Varying<ItemBounds>,
    /// Union of the meta, opaque and transparent items of the first outline
    /// group's selection.
    pub selection: Varying<ItemBounds>,
    pub highlight_masks: Vec<Varying<HighlightMask>>,
    pub frustums: Varying<Frustums>,
    /// The primary framebuffer after antialiasing.
    pub antialiased: Varying<FramebufferId>,
}

/// Shape plumbers shared between the draw jobs of the main view.
#[derive(Clone)]
pub struct MainViewPlumbers {
    pub deferred: SharedShapePlumber,
    pub overlay: SharedShapePlumber,
    pub mask: SharedShapePlumber,
}

impl MainViewPlumbers {
    #[must_use]
    pub fn new(gpu: &mut GpuContext) -> Self {
        Self {
            deferred: deferred_pipelines(gpu).shared(),
            overlay: overlay_pipelines(gpu).shared(),
            mask: mask_pipelines(gpu).shared(),
        }
    }
}

/// The deferred main view task and the handles needed to read its results.
pub struct RenderDeferredTask {
    task: Task<FetchCullSortOutput>,
    outputs: MainViewOutputs,
    plumbers: MainViewPlumbers,
}

impl RenderDeferredTask {
    /// Builds the main view with plumbers created on `gpu`.
    pub fn build(settings: &RenderSettings, gpu: &mut GpuContext) -> Result<Self> {
        Self::build_with_plumbers(settings, MainViewPlumbers::new(gpu))
    }

    pub fn build_with_plumbers(settings: &RenderSettings, plumbers: MainViewPlumbers) -> Result<Self> {
        let mut settings = settings.clone();
        settings.sanitize();

        let (task, outputs) = Task::<FetchCullSortOutput>::build(MAIN_VIEW_TASK, |b, input| {
            build_main_view(b, input, &settings, &plumbers)
        })?;
        log::info!(
            "Built {MAIN_VIEW_TASK} with {} jobs and {} outline groups",
            task.job_count(),
            settings.highlight_groups
        );
        Ok(Self {
            task,
            outputs,
            plumbers,
        })
    }

    /// Renders one view. The caller owns the frame bracket on the GPU context.
    pub fn run(&mut self, ctx: &mut RenderContext, items: FetchCullSortOutput) -> Result<()> {
        self.task.run(ctx, items)
    }

    #[inline]
    #[must_use]
    pub fn task(&self) -> &Task<FetchCullSortOutput> {
        &self.task
    }

    #[inline]
    #[must_use]
    pub fn configs(&self) -> &ConfigRegistry {
        self.task.configs()
    }

    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &MainViewOutputs {
        &self.outputs
    }

    #[inline]
    #[must_use]
    pub fn plumbers(&self) -> &MainViewPlumbers {
        &self.plumbers
    }

    /// Resolves a varying of the main view against the last frame.
    pub fn get<T: 'static>(&self, varying: &Varying<T>) -> Result<&T> {
        self.task.get(varying)
    }
}

fn build_main_view(
    b: &mut TaskBuilder<'_>,
    input: Varying<FetchCullSortOutput>,
    settings: &RenderSettings,
    plumbers: &MainViewPlumbers,
) -> Result<MainViewOutputs> {
    let opaques = input.get_n(FetchCullSortOutput::OPAQUE);
    let transparents = input.get_n(FetchCullSortOutput::TRANSPARENT);
    let lights = input.get_n(FetchCullSortOutput::LIGHT);
    let metas = input.get_n(FetchCullSortOutput::META);
    let overlay_opaques = input.get_n(FetchCullSortOutput::OVERLAY_OPAQUE);
    let overlay_transparents = input.get_n(FetchCullSortOutput::OVERLAY_TRANSPARENT);
    let spatial_selection = input.get_n(FetchCullSortOutput::SPATIAL_SELECTION);

    // Frame setup.
    b.add_job("Fade", FadeJob, opaques)?;
    b.add_job("JitterCam", JitterSample::default(), ())?;
    let frame_transform = b.add_job(
        "DeferredFrameTransform",
        GenerateDeferredFrameTransform::default(),
        (),
    )?;
    let lighting_model = b.add_job("LightingModel", MakeLightingModel::default(), ())?;

    let primary = b.add_job("PreparePrimaryBuffer", PreparePrimaryFramebuffer::default(), ())?;
    let opaque_timer = b.add_job(
        "BeginOpaqueRangeTimer",
        BeginGPURangeTimer::new("OpaqueRangeTimer"),
        (),
    )?;

    let deferred = b.add_job(
        "PrepareDeferred",
        PrepareDeferred::default(),
        PrepareDeferredInputs {
            primary,
            lighting_model,
        },
    )?;
    let deferred_framebuffer = deferred.get_n(PrepareDeferredOutputs::DEFERRED_FRAMEBUFFER);
    let lighting_framebuffer = deferred.get_n(PrepareDeferredOutputs::LIGHTING_FRAMEBUFFER);
    b.add_job("PrepareStencil", PrepareStencil::default(), primary)?;

    // Opaque G-buffer.
    b.add_job(
        "DrawOpaqueDeferred",
        DrawStateSortDeferred::new(plumbers.deferred.clone()),
        DrawStateSortInputs {
            items: opaques,
            lighting_model,
            framebuffer: deferred_framebuffer,
        },
    )?;
    b.add_job("OpaqueRangeTimer", EndGPURangeTimer, opaque_timer)?;

    // Surface analysis.
    let linear_depth = b.add_job(
        "LinearDepth",
        LinearDepthPass::default(),
        SurfaceInputs {
            frame_transform,
            deferred_framebuffer,
        },
    )?;
    let surface_geometry = b.add_job(
        "SurfaceGeometry",
        SurfaceGeometryPass::default(),
        SurfaceGeometryInputs {
            frame_transform,
            deferred_framebuffer,
            linear_depth,
        },
    )?;
    let scattering = b.add_job(
        "Scattering",
        SubsurfaceScattering::default(),
        lighting_model,
    )?;
    let ambient_occlusion = b.add_job(
        "AmbientOcclusion",
        AmbientOcclusionEffect::default(),
        AmbientOcclusionInputs {
            frame_transform,
            deferred_framebuffer,
            linear_depth,
        },
    )?;
    let velocity = b.add_job(
        "VelocityBuffer",
        VelocityBufferPass::default(),
        SurfaceInputs {
            frame_transform,
            deferred_framebuffer,
        },
    )?;

    // Zones and lights.
    let zones = b.add_sub_task("ZoneRenderer", |zone| {
        let zones = zone.add_job("FilterZones", FilterZones, metas)?;
        zone.add_job("SetupZones", SetupZones, zones)?;
        Ok(zones)
    })?;
    b.add_job("DrawLight", DrawLight, lights)?;
    let light_clusters = b.add_job(
        "LightClustering",
        LightClusteringPass::default(),
        LightClusteringInputs {
            frame_transform,
            lighting_model,
            linear_depth,
        },
    )?;
    let haze = b.add_job("HazeModel", FetchHazeStage, ())?;

    // Lighting.
    b.add_job(
        "RenderDeferred",
        RenderDeferred::default(),
        RenderDeferredInputs {
            frame_transform,
            deferred_framebuffer,
            lighting_framebuffer,
            lighting_model,
            surface_geometry,
            scattering,
            ambient_occlusion,
            light_clusters,
            haze,
        },
    )?;
    b.add_job(
        "DrawBackgroundDeferred",
        DrawBackgroundStage::default(),
        BackgroundInputs {
            lighting_model,
            frame_transform,
            target: lighting_framebuffer,
        },
    )?;
    b.add_job(
        "DrawHazeDeferred",
        DrawHaze::default(),
        DrawHazeInputs {
            haze,
            lighting_model,
            frame_transform,
            linear_depth,
            target: lighting_framebuffer,
        },
    )?;
    b.add_job(
        "DrawTransparentDeferred",
        DrawDeferred::new(plumbers.deferred.clone()),
        DrawDeferredInputs {
            items: transparents,
            lighting_model,
            light_clusters,
            framebuffer: lighting_framebuffer,
        },
    )?;
    b.add_job(
        "DebugLightClusters",
        DebugLightClusters::default(),
        DebugLightClustersInputs {
            frame_transform,
            light_clusters,
            target: lighting_framebuffer,
        },
    )?;

    // Bloom and tone mapping.
    let post_timer = b.add_job(
        "BeginToneAndPostRangeTimer",
        BeginGPURangeTimer::new("ToneAndPostRangeTimer"),
        (),
    )?;
    b.add_sub_task("Bloom", |bloom| {
        let threshold = bloom.add_job(
            "BloomThreshold",
            BloomThreshold::default(),
            BloomThresholdInputs {
                frame_transform,
                lighting_framebuffer,
            },
        )?;
        let [name0, name1, name2] = BloomBlur::LEVELS;
        let blur0 = bloom.add_job(name0, BloomBlur::new(name0), threshold)?;
        let blur1 = bloom.add_job(name1, BloomBlur::new(name1), blur0)?;
        let blur2 = bloom.add_job(name2, BloomBlur::new(name2), blur1)?;
        let blurs = [blur0, blur1, blur2];
        bloom.add_job(
            "BloomApply",
            BloomApply::default(),
            BloomApplyInputs {
                lighting_framebuffer,
                blurs,
            },
        )?;
        bloom.add_job(
            "DebugBloom",
            DebugBloom,
            DebugBloomInputs {
                target: lighting_framebuffer,
                threshold,
                blurs,
            },
        )?;
        Ok(())
    })?;
    b.add_job(
        "ToneMapping",
        ToneMappingDeferred::default(),
        ToneMappingInputs {
            lighting_framebuffer,
            primary_framebuffer: primary,
        },
    )?;

    // Outline highlighting.
    let highlight_timer = b.add_job(
        "BeginHighlightRangeTimer",
        BeginGPURangeTimer::new("HighlightRangeTimer"),
        (),
    )?;
    let selection = add_selection_trio(
        b,
        "",
        &settings.highlight_selection_name(0),
        [metas, opaques, transparents],
    )?;
    let highlight_masks = b.add_sub_task("DrawHighlight", |highlight| {
        (0..settings.highlight_groups)
            .map(|group| {
                let selected = add_selection_trio(
                    highlight,
                    &group.to_string(),
                    &settings.highlight_selection_name(group),
                    [metas, opaques, transparents],
                )?;
                let mask = highlight.add_job(
                    &format!("HighlightMask{group}"),
                    DrawHighlightMask::new(plumbers.mask.clone()),
                    HighlightMaskInputs {
                        items: selected,
                        deferred_framebuffer,
                    },
                )?;
                highlight.add_job(
                    &format!("HighlightEffect{group}"),
                    DrawHighlight::default(),
                    HighlightInputs {
                        frame_transform,
                        mask,
                        deferred_framebuffer,
                        primary_framebuffer: primary,
                    },
                )?;
                Ok(mask)
            })
            .collect::<Result<Vec<_>>>()
    })?;
    b.add_job("HighlightRangeTimer", EndGPURangeTimer, highlight_timer)?;

    // Bounds and frustum debug views.
    b.add_job("DrawMetaBounds", DrawBounds::default(), metas)?;
    b.add_job("DrawOpaqueBounds", DrawBounds::default(), opaques)?;
    b.add_job("DrawTransparentBounds", DrawBounds::default(), transparents)?;
    b.add_job("DrawLightBounds", DrawBounds::default(), lights)?;
    b.add_job("DrawZones", DrawBounds::default(), zones)?;
    let frustums = b.add_job(
        "ExtractFrustums",
        ExtractFrustums::new(settings.shadow_cascades),
        (),
    )?;
    b.add_job(
        "DrawViewFrustum",
        DrawFrustum::new(VIEW_FRUSTUM_COLOR),
        frustums.get_n(Frustums::VIEW_FRUSTUM),
    )?;
    let cascades = settings.shadow_cascades;
    for (index, field) in Frustums::SHADOW_CASCADES.into_iter().take(cascades).enumerate() {
        b.add_job(
            &format!("DrawShadowFrustum{index}"),
            DrawFrustum::new(shadow_frustum_color(index, cascades)),
            frustums.get_n(field),
        )?;
    }
    b.add_job("DrawSelectionBounds", DrawBounds::default(), selection)?;

    // In-front overlays.
    let layered_opaques = b.add_job(
        "FilterOverlaysLayeredOpaque",
        FilterLayeredItems::new(Layer::InFront),
        overlay_opaques,
    )?;
    let layered_transparents = b.add_job(
        "FilterOverlaysLayeredTransparent",
        FilterLayeredItems::new(Layer::InFront),
        overlay_transparents,
    )?;
    let in_front_opaques = layered_opaques.get_n(FilterLayeredOutputs::MATCHING);
    let in_front_transparents = layered_transparents.get_n(FilterLayeredOutputs::MATCHING);
    let hud_opaques = layered_opaques.get_n(FilterLayeredOutputs::NON_MATCHING);
    let hud_transparents = layered_transparents.get_n(FilterLayeredOutputs::NON_MATCHING);

    add_overlays(
        b,
        "InFront",
        &plumbers.overlay,
        lighting_model,
        primary,
        [in_front_opaques, in_front_transparents],
    )?;

    let antialiased = b.add_job(
        "Antialiasing",
        Antialiasing::default(),
        AntialiasingInputs {
            frame_transform,
            source: primary,
            linear_depth,
            velocity,
        },
    )?;

    // Buffer and scene debug views.
    b.add_job(
        "DebugDeferredBuffer",
        DebugDeferredBuffer::default(),
        DebugDeferredBufferInputs {
            deferred_framebuffer,
            linear_depth,
            surface_geometry,
            ambient_occlusion,
            velocity,
            frame_transform,
            target: primary,
        },
    )?;
    b.add_job(
        "DebugScattering",
        DebugScattering::default(),
        DebugScatteringInputs {
            frame_transform,
            lighting_model,
            scattering,
            target: primary,
        },
    )?;
    b.add_job(
        "DebugAmbientOcclusion",
        DebugAmbientOcclusion::default(),
        DebugAmbientOcclusionInputs {
            frame_transform,
            linear_depth,
            ambient_occlusion,
            target: primary,
        },
    )?;
    b.add_job("DrawSceneOctree", DrawSceneOctree::default(), spatial_selection)?;
    b.add_job("DrawItemSelection", DrawItemSelection::default(), spatial_selection)?;
    b.add_job(
        "DrawStatus",
        DrawStatus::new(settings.status_icon_atlas.clone()),
        opaques,
    )?;
    b.add_job("DrawZoneStack", DrawZoneStack::default(), frame_transform)?;

    // HUD.
    b.add_job("HUD", CompositeHUD::default(), primary)?;
    add_overlays(
        b,
        "HUD",
        &plumbers.overlay,
        lighting_model,
        primary,
        [hud_opaques, hud_transparents],
    )?;

    b.add_job("ToneAndPostRangeTimer", EndGPURangeTimer, post_timer)?;
    b.add_job("Blit", Blit, primary)?;

    Ok(MainViewOutputs {
        primary_framebuffer: primary,
        deferred,
        lighting_model,
        linear_depth,
        light_clusters,
        zones,
        selection,
        highlight_masks,
        frustums,
        antialiased,
    })
}

/// Adds `MetaSelection{suffix}`, `OpaqueSelection{suffix}` and
/// `TransparentSelection{suffix}`, each extending the previous result.
fn add_selection_trio(
    b: &mut TaskBuilder<'_>,
    suffix: &str,
    selection: &str,
    [metas, opaques, transparents]: [Varying<ItemBounds>; 3],
) -> Result<Varying<ItemBounds>> {
    let meta = b.add_job(
        &format!("MetaSelection{suffix}"),
        SelectItems::new(selection),
        SelectItemsInputs {
            items: metas,
            previous: None,
        },
    )?;
    let opaque = b.add_job(
        &format!("OpaqueSelection{suffix}"),
        SelectItems::new(selection),
        SelectItemsInputs {
            items: opaques,
            previous: Some(meta),
        },
    )?;
    b.add_job(
        &format!("TransparentSelection{suffix}"),
        SelectItems::new(selection),
        SelectItemsInputs {
            items: transparents,
            previous: Some(opaque),
        },
    )
}

/// Adds `DrawOverlay{layer}Opaque/Transparent` and their bounds views.
/// Overlays draw into `framebuffer`.
fn add_overlays(
    b: &mut TaskBuilder<'_>,
    layer: &str,
    plumber: &SharedShapePlumber,
    lighting_model: Varying<LightingModel>,
    framebuffer: Varying<FramebufferId>,
    [opaques, transparents]: [Varying<ItemBounds>; 2],
) -> Result<()> {
    for (kind, items, opaque) in [("Opaque", opaques, true), ("Transparent", transparents, false)] {
        let job = DrawOverlay3D::new(plumber.clone(), opaque);
        b.add_job(
            &format!("DrawOverlay{layer}{kind}"),
            job,
            DrawStateSortInputs {
                items,
                lighting_model,
                framebuffer,
            },
        )?;
    }
    for (kind, items) in [("Opaque", opaques), ("Transparent", transparents)] {
        b.add_job(&format!("DrawOverlay{layer}{kind}Bounds"), DrawBounds::default(), items)?;
    }
    Ok(())
}

/// Cascade `index` of `count` fades from cyan to blue.
fn shadow_frustum_color(index: usize, count: usize) -> Vec3 {
    let tint = if count > 1 {
        1.0 - index as f32 / (count - 1) as f32
    } else {
        1.0
    };
    Vec3::new(0.0, tint, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_frustum_colors() {
        assert_eq!(shadow_frustum_color(0, 4), Vec3::new(0.0, 1.0, 1.0));
        assert_eq!(shadow_frustum_color(3, 4), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(shadow_frustum_color(0, 1), Vec3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn test_main_view_job_names() {
        let mut gpu = GpuContext::default();
        let view = RenderDeferredTask::build(&RenderSettings::default(), &mut gpu).unwrap();
        let configs = view.configs();
        for path in [
            "RenderMainView.Fade",
            "RenderMainView.DrawOpaqueDeferred",
            "RenderMainView.ZoneRenderer.SetupZones",
            "RenderMainView.Bloom.BloomBlur2",
            "RenderMainView.MetaSelection",
            "RenderMainView.DrawHighlight.TransparentSelection3",
            "RenderMainView.DrawHighlight.HighlightEffect3",
            "RenderMainView.DrawShadowFrustum3",
            "RenderMainView.DrawOverlayHUDTransparentBounds",
            "RenderMainView.Blit",
        ] {
            assert!(configs.contains(path), "missing {path}");
        }
        assert_eq!(view.outputs().highlight_masks.len(), 4);
    }
}
