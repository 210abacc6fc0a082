//! Main View Tests
//!
//! End-to-end frames of the deferred main view against the recording GPU
//! layer:
//! - Empty and single-item frames
//! - Draw targets of the G-buffer, forward and overlay passes
//! - Draw caps, state sorting and disabled stages
//! - Debug views staying silent while disabled and leaving the frame
//!   untouched while enabled
//! - Highlight selections, overlay layers, timers, jitter and lights
//! - Linear depth reaching clustering, haze and antialiasing
//! - Framebuffer allocation fallback

use anyhow::Result;

use umbra::gpu::slots::{texture, uniform};
use umbra::gpu::{BatchCommand, TextureId};
use umbra::jobs::draw::{DrawConfig, DrawStateSortConfig};
use umbra::jobs::lighting::LightClusteringConfig;
use umbra::prelude::*;
use umbra::scene::{Haze, Zone};

const WIDTH: u32 = 128;
const HEIGHT: u32 = 96;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera_args() -> RenderArgs {
    RenderArgs {
        view_frustum: Some(ViewFrustum::perspective(
            Vec3::ZERO,
            Quat::IDENTITY,
            1.0,
            WIDTH as f32 / HEIGHT as f32,
            0.1,
            100.0,
        )),
        viewport: Viewport::from_size(WIDTH, HEIGHT),
        delta_time: 1.0 / 90.0,
        ..RenderArgs::default()
    }
}

fn new_view() -> Result<RenderView> {
    init_logging();
    Ok(RenderView::new(&RenderSettings::default(), Scene::default())?)
}

fn add_shape(view: &mut RenderView, key: ShapeKey, z: f32, layer: Layer) -> ItemBound {
    let scene = &mut view.context_mut().scene;
    let id = scene.add_item(
        Item::shape(
            Aabb::from_sphere(Vec3::new(0.0, 0.0, z), 0.5),
            ShapeItem::new(Mat4::from_translation(Vec3::new(0.0, 0.0, z)), key, 36),
        )
        .with_layer(layer),
    );
    scene.item_bound(id).expect("item just added")
}

fn opaques(view: &mut RenderView, count: usize) -> ItemBounds {
    (0..count)
        .map(|i| add_shape(view, ShapeKey::MATERIAL, -2.0 - i as f32, Layer::World))
        .collect()
}

fn batch_count(frame: &FrameRecord, name: &str) -> usize {
    frame.batch_names().into_iter().filter(|n| *n == name).count()
}

fn transparent(view: &mut RenderView, z: f32) -> ItemBound {
    add_shape(view, ShapeKey::MATERIAL | ShapeKey::TRANSLUCENT, z, Layer::World)
}

/// Index of the first command binding `slot` to a buffer.
fn uniform_bound(commands: &[BatchCommand], slot: u32) -> Option<usize> {
    commands.iter().position(|c| {
        matches!(c, BatchCommand::SetUniformBuffer { slot: s, buffer: Some(_) } if *s == slot)
    })
}

/// Texture bound to `slot` by the last command touching it before the
/// first draw.
fn texture_at_draw(batch: &Batch, slot: u32) -> Option<TextureId> {
    let commands = batch.commands();
    let drawn = commands.iter().position(BatchCommand::is_draw)?;
    commands[..drawn].iter().rev().find_map(|c| match c {
        BatchCommand::SetResourceTexture { slot: s, texture } if *s == slot => *texture,
        _ => None,
    })
}

// ============================================================================
// Basic frames
// ============================================================================

#[test]
fn empty_buckets_render_a_complete_frame() -> Result<()> {
    let mut view = new_view()?;
    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;

    for name in ["PrepareDeferred", "RenderDeferred", "ToneMapping", "Blit"] {
        assert!(frame.batch(name).is_some(), "missing batch {name}");
    }
    assert_eq!(frame.batch("DrawStateSortDeferred").map(Batch::draw_count), Some(0));
    assert_eq!(frame.batch("DrawDeferred").map(Batch::draw_count), Some(0));
    assert_eq!(frame.draw_count(), frame.batches.iter().map(Batch::draw_count).sum::<usize>());
    Ok(())
}

#[test]
fn single_opaque_item_is_drawn_after_the_lighting_model_is_bound() -> Result<()> {
    let mut view = new_view()?;
    let items = FetchCullSortOutput {
        opaques: opaques(&mut view, 1),
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let batch = frame.batch("DrawStateSortDeferred").expect("opaque batch");
    assert_eq!(batch.draw_count(), 1);

    let commands = batch.commands();
    let bound = commands
        .iter()
        .position(|c| {
            matches!(
                c,
                BatchCommand::SetUniformBuffer { slot, buffer: Some(_) } if *slot == uniform::LIGHTING_MODEL
            )
        })
        .expect("lighting model bound");
    let drawn = commands.iter().position(BatchCommand::is_draw).expect("draw recorded");
    assert!(bound < drawn);
    assert!(matches!(commands[drawn], BatchCommand::DrawIndexed { index_count: 36, .. }));
    Ok(())
}

#[test]
fn single_transparent_item_is_drawn_after_lighting_and_clusters_are_bound() -> Result<()> {
    let mut view = new_view()?;
    let item = transparent(&mut view, -3.0);
    let items = FetchCullSortOutput {
        transparents: vec![item],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let batch = frame.batch("DrawDeferred").expect("transparent batch");
    assert_eq!(batch.draw_count(), 1);

    let commands = batch.commands();
    let drawn = commands.iter().position(BatchCommand::is_draw).expect("draw recorded");
    let lighting = uniform_bound(commands, uniform::LIGHTING_MODEL).expect("lighting model bound");
    let clusters = uniform_bound(commands, uniform::LIGHT_CLUSTER_FRUSTUM_GRID)
        .expect("cluster grid bound");
    assert!(lighting < drawn);
    assert!(clusters < drawn);
    assert!(matches!(commands[drawn], BatchCommand::DrawIndexed { index_count: 36, .. }));

    let drawn = view
        .configs()
        .get::<DrawConfig>("RenderMainView.DrawTransparentDeferred")?
        .read()
        .num_drawn;
    assert_eq!(drawn, 1);
    Ok(())
}

#[test]
fn missing_camera_aborts_the_frame_and_the_next_one_recovers() -> Result<()> {
    let mut view = new_view()?;
    let args = RenderArgs {
        view_frustum: None,
        ..camera_args()
    };
    let result = view.render(args, FetchCullSortOutput::default());
    assert!(matches!(result, Err(RenderError::MissingViewFrustum { .. })));

    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;
    assert!(frame.batch("Blit").is_some());
    Ok(())
}

// ============================================================================
// Draw targets
// ============================================================================

#[test]
fn draw_passes_bind_their_own_targets() -> Result<()> {
    let mut view = new_view()?;
    let opaque_items = opaques(&mut view, 1);
    let transparent_item = transparent(&mut view, -4.0);
    let overlay = add_shape(&mut view, ShapeKey::MATERIAL, -3.0, Layer::InFront);
    let items = FetchCullSortOutput {
        opaques: opaque_items,
        transparents: vec![transparent_item],
        overlay_opaques: vec![overlay],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let outputs = view.main_view().outputs().clone();
    let deferred = *view.main_view().get(&outputs.deferred)?;
    let primary = *view.main_view().get(&outputs.primary_framebuffer)?;
    assert_ne!(deferred.deferred, deferred.lighting);

    for (name, target) in [
        ("DrawStateSortDeferred", deferred.deferred),
        ("DrawDeferred", deferred.lighting),
        ("DrawOverlay3D.opaque", primary),
    ] {
        let batch = frame.batch(name).expect("draw batch");
        assert_eq!(batch.draw_count(), 1, "{name}");
        assert_eq!(
            batch.commands().first(),
            Some(&BatchCommand::SetFramebuffer(Some(target))),
            "{name}"
        );
        assert_eq!(batch.framebuffers().as_slice(), &[Some(target)], "{name}");
    }
    Ok(())
}

// ============================================================================
// Draw caps and state sorting
// ============================================================================

#[test]
fn max_drawn_caps_the_opaque_pass() -> Result<()> {
    let mut view = new_view()?;
    let config = view
        .configs()
        .get::<DrawStateSortConfig>("RenderMainView.DrawOpaqueDeferred")?;
    config.write().max_drawn = 2;

    let items = FetchCullSortOutput {
        opaques: opaques(&mut view, 5),
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    assert_eq!(frame.batch("DrawStateSortDeferred").map(Batch::draw_count), Some(2));
    assert_eq!(config.read().num_drawn, 2);
    Ok(())
}

#[test]
fn state_sort_draws_the_same_items_as_input_order() -> Result<()> {
    let mut view = new_view()?;
    let keys = [
        ShapeKey::MATERIAL,
        ShapeKey::MATERIAL | ShapeKey::DEPTH_BIAS,
        ShapeKey::MATERIAL,
        ShapeKey::MATERIAL | ShapeKey::DEPTH_BIAS,
        ShapeKey::MATERIAL,
    ];
    let opaque_items: ItemBounds = keys
        .iter()
        .enumerate()
        .map(|(i, &key)| add_shape(&mut view, key, -2.0 - i as f32, Layer::World))
        .collect();
    let items = FetchCullSortOutput {
        opaques: opaque_items,
        ..FetchCullSortOutput::default()
    };

    let draws = |frame: &FrameRecord| {
        let batch = frame.batch("DrawStateSortDeferred").expect("opaque batch");
        let mut models: Vec<[u32; 3]> = batch
            .commands()
            .iter()
            .filter_map(|c| match c {
                BatchCommand::SetModel(m) => Some(m.w_axis.truncate().to_array().map(f32::to_bits)),
                _ => None,
            })
            .collect();
        models.sort_unstable();
        (batch.draw_count(), batch.pipelines().len(), models)
    };

    let sorted = view.render(camera_args(), items.clone())?;
    view.configs()
        .get::<DrawStateSortConfig>("RenderMainView.DrawOpaqueDeferred")?
        .write()
        .state_sort = false;
    let unsorted = view.render(camera_args(), items)?;

    let (sorted_draws, sorted_binds, sorted_models) = draws(&sorted);
    let (unsorted_draws, unsorted_binds, unsorted_models) = draws(&unsorted);
    assert_eq!(sorted_draws, 5);
    assert_eq!(sorted_draws, unsorted_draws);
    assert_eq!(sorted_models, unsorted_models);
    assert_eq!(sorted_binds, 2);
    assert_eq!(unsorted_binds, 5);
    Ok(())
}

// ============================================================================
// Disabled stages
// ============================================================================

#[test]
fn disabling_bloom_skips_every_bloom_pass() -> Result<()> {
    let mut view = new_view()?;
    view.configs().set_enabled("RenderMainView.Bloom", false)?;
    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;

    for name in ["BloomThreshold", "BloomBlur", "BloomApply", "DebugBloom"] {
        assert!(frame.batch(name).is_none(), "{name} ran while bloom was disabled");
    }
    assert!(frame.batch("ToneMapping").is_some());
    Ok(())
}

#[test]
fn debug_views_record_nothing_until_enabled() -> Result<()> {
    let debug_batches = [
        "DrawBounds",
        "DrawFrustum",
        "DebugDeferredBuffer",
        "DebugScattering",
        "DebugAmbientOcclusion",
        "DrawSceneOctree",
        "DrawItemSelection",
        "DrawStatus",
        "DrawZoneStack",
        "DebugLightClusters",
        "DebugBloom",
    ];

    let mut view = new_view()?;
    let items = FetchCullSortOutput {
        opaques: opaques(&mut view, 3),
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items.clone())?;
    for name in debug_batches {
        assert!(frame.batch(name).is_none(), "{name} recorded while disabled");
    }

    view.configs().set_enabled("RenderMainView.DrawOpaqueBounds", true)?;
    view.configs().set_enabled("RenderMainView.DrawViewFrustum", true)?;
    let frame = view.render(camera_args(), items)?;
    assert_eq!(frame.batch("DrawBounds").map(Batch::draw_count), Some(1));
    assert_eq!(batch_count(&frame, "DrawFrustum"), 1);
    Ok(())
}

/// Two opaques, a transparent and a point light, added in a fixed order so
/// two views get the same item ids.
fn lit_scene(view: &mut RenderView) -> FetchCullSortOutput {
    let opaque_items = opaques(view, 2);
    let transparent_item = transparent(view, -5.0);
    let scene = &mut view.context_mut().scene;
    let id = scene.add_item(Item::light(Light::point(Vec3::new(0.0, 0.0, -4.0), 3.0)));
    let light = scene.item_bound(id).expect("light just added");
    FetchCullSortOutput {
        opaques: opaque_items,
        transparents: vec![transparent_item],
        lights: vec![light],
        ..FetchCullSortOutput::default()
    }
}

#[test]
fn enabling_debug_views_leaves_every_other_batch_unchanged() -> Result<()> {
    let debug_jobs = [
        "RenderMainView.DebugDeferredBuffer",
        "RenderMainView.DebugScattering",
        "RenderMainView.DebugAmbientOcclusion",
        "RenderMainView.DebugLightClusters",
        "RenderMainView.DrawStatus",
        "RenderMainView.DrawOpaqueBounds",
        "RenderMainView.DrawTransparentBounds",
        "RenderMainView.DrawLightBounds",
        "RenderMainView.DrawViewFrustum",
        "RenderMainView.DrawZoneStack",
        "RenderMainView.DrawSceneOctree",
        "RenderMainView.DrawItemSelection",
        "RenderMainView.Bloom.DebugBloom",
    ];
    let debug_batches = [
        "DrawBounds",
        "DrawFrustum",
        "DebugDeferredBuffer",
        "DebugScattering",
        "DebugAmbientOcclusion",
        "DrawSceneOctree",
        "DrawItemSelection",
        "DrawStatus",
        "DrawZoneStack",
        "DebugLightClusters",
        "DebugBloom",
    ];

    let mut plain = new_view()?;
    let mut debug = new_view()?;
    let items = lit_scene(&mut plain);
    lit_scene(&mut debug);

    // Lazily created resources of the regular passes get the same ids in
    // both views before any debug view allocates.
    plain.render(camera_args(), items.clone())?;
    debug.render(camera_args(), items.clone())?;
    for path in debug_jobs {
        debug.configs().set_enabled(path, true)?;
    }
    let plain_frame = plain.render(camera_args(), items.clone())?;
    let debug_frame = debug.render(camera_args(), items)?;

    for name in debug_batches {
        assert!(plain_frame.batch(name).is_none(), "{name} recorded while disabled");
    }
    for name in ["DebugDeferredBuffer", "DrawStatus", "DrawBounds", "DebugLightClusters"] {
        assert!(debug_frame.batch(name).is_some(), "{name} missing once enabled");
    }

    let regular = |frame: &FrameRecord| -> Vec<(String, Vec<BatchCommand>)> {
        frame
            .batches
            .iter()
            .filter(|batch| !debug_batches.contains(&batch.name()))
            .map(|batch| (batch.name().to_owned(), batch.commands().to_vec()))
            .collect()
    };
    let without_debug = regular(&plain_frame);
    let with_debug = regular(&debug_frame);
    assert_eq!(
        without_debug.iter().map(|(name, _)| name).collect::<Vec<_>>(),
        with_debug.iter().map(|(name, _)| name).collect::<Vec<_>>()
    );
    for ((name, plain_commands), (_, debug_commands)) in without_debug.iter().zip(&with_debug) {
        assert_eq!(plain_commands, debug_commands, "{name} changed with debug views on");
    }
    Ok(())
}

// ============================================================================
// Highlight
// ============================================================================

#[test]
fn highlight_selection_keeps_bucket_order_and_feeds_the_mask() -> Result<()> {
    let mut view = new_view()?;
    let opaque_items = opaques(&mut view, 3);
    let transparent = add_shape(
        &mut view,
        ShapeKey::MATERIAL | ShapeKey::TRANSLUCENT,
        -4.0,
        Layer::World,
    );
    let prefix = RenderSettings::default().highlight_selection_name(0);
    view.context_mut().scene.set_selection(
        &prefix,
        vec![transparent.id, opaque_items[2].id, opaque_items[0].id],
    );

    let items = FetchCullSortOutput {
        opaques: opaque_items.clone(),
        transparents: vec![transparent],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let outputs = view.main_view().outputs().clone();
    let selection = view.main_view().get(&outputs.selection)?;
    assert_eq!(selection, &vec![opaque_items[0], opaque_items[2], transparent]);

    let first = view.main_view().get(&outputs.highlight_masks[0])?;
    assert!(first.framebuffer.is_some());
    assert_eq!(first.drawn, 3);
    for mask in &outputs.highlight_masks[1..] {
        assert!(view.main_view().get(mask)?.framebuffer.is_none());
    }
    assert_eq!(batch_count(&frame, "HighlightMask"), 1);
    assert_eq!(batch_count(&frame, "DrawHighlight"), 1);
    Ok(())
}

// ============================================================================
// Overlays
// ============================================================================

#[test]
fn overlays_are_split_between_in_front_and_hud() -> Result<()> {
    let mut view = new_view()?;
    let in_front = add_shape(&mut view, ShapeKey::MATERIAL, -3.0, Layer::InFront);
    let hud = add_shape(&mut view, ShapeKey::MATERIAL, -3.0, Layer::Hud);
    let items = FetchCullSortOutput {
        overlay_opaques: vec![in_front, hud],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    assert_eq!(batch_count(&frame, "DrawOverlay3D.opaque"), 2);
    assert_eq!(batch_count(&frame, "DrawOverlay3D.transparent"), 0);
    for path in [
        "RenderMainView.DrawOverlayInFrontOpaque",
        "RenderMainView.DrawOverlayHUDOpaque",
    ] {
        let drawn = view.configs().get::<DrawConfig>(path)?.read().num_drawn;
        assert_eq!(drawn, 1, "{path}");
    }
    Ok(())
}

// ============================================================================
// Timers, jitter and lights
// ============================================================================

#[test]
fn timer_ranges_close_and_nest() -> Result<()> {
    let mut view = new_view()?;
    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;

    let opaque = frame.timer("OpaqueRangeTimer").expect("opaque range");
    let post = frame.timer("ToneAndPostRangeTimer").expect("post range");
    let highlight = frame.timer("HighlightRangeTimer").expect("highlight range");
    for timer in [opaque, post, highlight] {
        assert!(timer.end_batch.is_some(), "{} left open", timer.name);
    }
    assert_eq!(opaque.depth, 0);
    assert_eq!(post.depth, 0);
    assert_eq!(highlight.depth, 1);
    let opaque_pass = frame
        .batch_names()
        .iter()
        .position(|name| *name == "DrawStateSortDeferred")
        .expect("opaque pass recorded");
    assert!((opaque.first_batch..opaque.end_batch.unwrap_or_default()).contains(&opaque_pass));
    assert!(post.first_batch <= highlight.first_batch);
    assert!(post.end_batch >= highlight.end_batch);
    Ok(())
}

#[test]
fn jitter_moves_every_frame_unless_frozen() -> Result<()> {
    let mut view = new_view()?;
    view.render(camera_args(), FetchCullSortOutput::default())?;
    let first = view.context().args.jitter;
    view.render(camera_args(), FetchCullSortOutput::default())?;
    let second = view.context().args.jitter;
    assert_ne!(first, Vec2::ZERO);
    assert_ne!(first, second);

    view.configs().set_enabled("RenderMainView.JitterCam", false)?;
    view.render(camera_args(), FetchCullSortOutput::default())?;
    assert_eq!(view.context().args.jitter, Vec2::ZERO);
    Ok(())
}

#[test]
fn local_lights_are_clustered_and_shaded() -> Result<()> {
    let mut view = new_view()?;
    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;
    assert_eq!(frame.batch("RenderDeferred").map(Batch::draw_count), Some(1));

    let light = {
        let scene = &mut view.context_mut().scene;
        let id = scene.add_item(Item::light(Light::point(Vec3::new(0.0, 0.0, -10.0), 2.0)));
        scene.item_bound(id).expect("light just added")
    };
    let items = FetchCullSortOutput {
        lights: vec![light],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let outputs = view.main_view().outputs().clone();
    let clusters = view.main_view().get(&outputs.light_clusters)?;
    assert_eq!(clusters.lights.len(), 1);
    assert!(clusters.non_empty_clusters() > 0);
    let config = view
        .configs()
        .get::<LightClusteringConfig>("RenderMainView.LightClustering")?;
    assert_eq!(config.read().num_clustered_lights, 1);
    assert_eq!(frame.batch("RenderDeferred").map(Batch::draw_count), Some(2));
    Ok(())
}

// ============================================================================
// Linear depth consumers
// ============================================================================

#[test]
fn clusters_carry_linear_depth_into_the_lighting_pass() -> Result<()> {
    let mut view = new_view()?;
    let light = {
        let scene = &mut view.context_mut().scene;
        let id = scene.add_item(Item::light(Light::point(Vec3::new(0.0, 0.0, -6.0), 2.0)));
        scene.item_bound(id).expect("light just added")
    };
    let items = FetchCullSortOutput {
        lights: vec![light],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let outputs = view.main_view().outputs().clone();
    let linear_depth = view.main_view().get(&outputs.linear_depth)?.linear_depth;
    let clusters = view.main_view().get(&outputs.light_clusters)?;
    assert_eq!(clusters.linear_depth, Some(linear_depth));

    let batch = frame.batch("RenderDeferred").expect("lighting batch");
    assert_eq!(texture_at_draw(batch, texture::LINEAR_DEPTH), Some(linear_depth));
    Ok(())
}

#[test]
fn antialiasing_resolve_reads_linear_depth() -> Result<()> {
    let mut view = new_view()?;
    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;

    let outputs = view.main_view().outputs().clone();
    let depth = *view.main_view().get(&outputs.linear_depth)?;
    let batch = frame.batch("Antialiasing").expect("resolve batch");
    assert_eq!(texture_at_draw(batch, texture::LINEAR_DEPTH), Some(depth.linear_depth));
    let unbound = batch.commands().iter().rev().any(|c| {
        matches!(c, BatchCommand::SetResourceTexture { slot, texture: None } if *slot == texture::LINEAR_DEPTH)
    });
    assert!(unbound, "linear depth left bound after the resolve");
    Ok(())
}

#[test]
fn haze_samples_linear_depth() -> Result<()> {
    let mut view = new_view()?;
    let frame = view.render(camera_args(), FetchCullSortOutput::default())?;
    assert!(frame.batch("DrawHaze").is_none());

    let zone = {
        let scene = &mut view.context_mut().scene;
        let id = scene.add_item(Item::zone(Zone {
            bound: Aabb::from_sphere(Vec3::ZERO, 50.0),
            haze: Some(Haze::default()),
            ..Zone::default()
        }));
        scene.item_bound(id).expect("zone just added")
    };
    let items = FetchCullSortOutput {
        metas: vec![zone],
        ..FetchCullSortOutput::default()
    };
    let frame = view.render(camera_args(), items)?;

    let outputs = view.main_view().outputs().clone();
    let depth = *view.main_view().get(&outputs.linear_depth)?;
    let deferred = *view.main_view().get(&outputs.deferred)?;
    let batch = frame.batch("DrawHaze").expect("haze batch");
    assert_eq!(batch.draw_count(), 1);
    assert_eq!(texture_at_draw(batch, texture::LINEAR_DEPTH), Some(depth.linear_depth));
    assert!(!batch.framebuffers().contains(&Some(deferred.deferred)));
    Ok(())
}

// ============================================================================
// Resource fallback
// ============================================================================

#[test]
fn oversized_viewport_falls_back_without_failing_the_frame() -> Result<()> {
    let mut view = new_view()?;
    let args = RenderArgs {
        viewport: Viewport::from_size(100_000, 64),
        ..camera_args()
    };
    let frame = view.render(args, FetchCullSortOutput::default())?;
    assert!(frame.batch("Blit").is_some());

    let outputs = view.main_view().outputs().clone();
    let primary = *view.main_view().get(&outputs.primary_framebuffer)?;
    assert_eq!(view.context().gpu.framebuffer_size(primary), Some((1, 1)));
    Ok(())
}
