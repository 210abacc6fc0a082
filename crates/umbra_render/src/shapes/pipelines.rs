//! Built-in pipeline sets for the plumbers of the deferred task.

use std::sync::Arc;

use super::key::{ShapeFilter, ShapeKey};
use super::plumber::{BatchSetter, ItemSetter, ShapePipeline, ShapePlumber};
use crate::context::RenderContext;
use crate::gpu::{Batch, GpuContext, PipelineDesc, PipelineState, slots};
use crate::scene::ItemId;

/// Binds the dissolve mask used by fading items.
fn fade_batch_setter() -> BatchSetter {
    Arc::new(|_pipeline: &ShapePipeline, batch: &mut Batch, ctx: &RenderContext| {
        batch.set_resource_texture(slots::texture::MASK, Some(ctx.gpu.placeholder_texture()));
    })
}

/// Binds the item's fade parameters, or unbinds them when it is not fading.
fn fade_item_setter() -> ItemSetter {
    Arc::new(
        |_pipeline: &ShapePipeline, batch: &mut Batch, ctx: &RenderContext, item: ItemId| {
            let buffer = ctx.scene.fades.get(item).and_then(|t| t.buffer);
            batch.set_uniform_buffer(slots::uniform::FADE_PARAMETERS, buffer);
        },
    )
}

fn register(
    plumber: &mut ShapePlumber,
    gpu: &mut GpuContext,
    label: &str,
    filter: ShapeFilter,
    state: PipelineState,
) {
    let id = gpu.create_pipeline(PipelineDesc::new(label, state));
    let mut pipeline = ShapePipeline::new(id, state);
    if filter.flags().contains(ShapeKey::FADE) {
        pipeline = pipeline
            .with_batch_setter(fade_batch_setter())
            .with_item_setter(fade_item_setter());
    }
    plumber.add_pipeline(filter, pipeline);
}

/// Variants shared by every colour pipeline set: base, wireframe and fade,
/// each for opaque and translucent keys.
fn register_material_variants(
    plumber: &mut ShapePlumber,
    gpu: &mut GpuContext,
    prefix: &str,
    opaque: PipelineState,
    translucent: PipelineState,
) {
    for (suffix, base, state) in [
        ("opaque", ShapeFilter::builder().with_opaque(), opaque),
        (
            "translucent",
            ShapeFilter::builder().with_translucent(),
            translucent,
        ),
    ] {
        let base = base.without(ShapeKey::DEPTH_ONLY);
        register(plumber, gpu, &format!("{prefix}.{suffix}"), base, state);
        register(
            plumber,
            gpu,
            &format!("{prefix}.{suffix}.wireframe"),
            base.with(ShapeKey::WIREFRAME),
            PipelineState {
                wireframe: true,
                ..state
            },
        );
        register(
            plumber,
            gpu,
            &format!("{prefix}.{suffix}.doubleSided"),
            base.with(ShapeKey::NO_CULL_FACE),
            PipelineState {
                cull_back_faces: false,
                ..state
            },
        );
        register(
            plumber,
            gpu,
            &format!("{prefix}.{suffix}.fade"),
            base.with(ShapeKey::FADE),
            state,
        );
    }
}

/// Pipelines of the main view: G-buffer writes for opaque keys and
/// forward-lit blending for translucent keys.
#[must_use]
pub fn deferred_pipelines(gpu: &mut GpuContext) -> ShapePlumber {
    let mut plumber = ShapePlumber::default();
    register_material_variants(
        &mut plumber,
        gpu,
        "deferred",
        PipelineState::default(),
        PipelineState {
            depth_write: false,
            blend: true,
            ..PipelineState::default()
        },
    );
    register(
        &mut plumber,
        gpu,
        "deferred.depthBias",
        ShapeFilter::builder()
            .with_opaque()
            .with(ShapeKey::DEPTH_BIAS)
            .without(ShapeKey::DEPTH_ONLY),
        PipelineState {
            depth_bias: true,
            ..PipelineState::default()
        },
    );
    plumber
}

/// Pipelines of the in-front and HUD overlays.
#[must_use]
pub fn overlay_pipelines(gpu: &mut GpuContext) -> ShapePlumber {
    let mut plumber = ShapePlumber::default();
    register_material_variants(
        &mut plumber,
        gpu,
        "overlay",
        PipelineState::default(),
        PipelineState {
            depth_write: false,
            blend: true,
            ..PipelineState::default()
        },
    );
    plumber
}

/// Depth-only pipelines that write the highlight stencil mask.
#[must_use]
pub fn mask_pipelines(gpu: &mut GpuContext) -> ShapePlumber {
    let mut plumber = ShapePlumber::default();
    let state = PipelineState {
        stencil_test: true,
        ..PipelineState::default()
    };
    register(
        &mut plumber,
        gpu,
        "highlightMask",
        ShapeFilter::builder().without(ShapeKey::FADE),
        state,
    );
    register(
        &mut plumber,
        gpu,
        "highlightMask.fade",
        ShapeFilter::builder().with(ShapeKey::FADE),
        state,
    );
    plumber
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_set_covers_common_keys() {
        let mut gpu = GpuContext::default();
        let plumber = deferred_pipelines(&mut gpu);
        for key in [
            ShapeKey::MATERIAL,
            ShapeKey::MATERIAL | ShapeKey::TRANSLUCENT,
            ShapeKey::MATERIAL | ShapeKey::WIREFRAME,
            ShapeKey::MATERIAL | ShapeKey::SKINNED | ShapeKey::FADE,
            ShapeKey::DEPTH_BIAS,
        ] {
            assert!(plumber.pick_pipeline(key).is_some(), "missing {key:?}");
        }
        assert!(plumber.pick_pipeline(ShapeKey::DEPTH_ONLY).is_none());
    }

    #[test]
    fn test_wireframe_variant_state() {
        let mut gpu = GpuContext::default();
        let plumber = deferred_pipelines(&mut gpu);
        let pipeline = plumber
            .pick_pipeline(ShapeKey::MATERIAL | ShapeKey::WIREFRAME)
            .unwrap();
        assert!(pipeline.state.wireframe);
        assert!(gpu.pipeline(pipeline.pipeline).unwrap().state.wireframe);
    }

    #[test]
    fn test_mask_set_accepts_any_valid_key() {
        let mut gpu = GpuContext::default();
        let plumber = mask_pipelines(&mut gpu);
        assert!(plumber.pick_pipeline(ShapeKey::TRANSLUCENT).is_some());
        assert!(plumber.pick_pipeline(ShapeKey::FADE).is_some());
    }
}
