//! Shape Plumber
//!
//! Maps shape keys to pipelines and records item draws.
//!
//! # Design
//!
//! Registration is eager: [`ShapePlumber::add_pipeline`] enumerates every
//! pipeline-relevant key its [`ShapeFilter`] matches and stores the pipeline
//! under each of them, so [`ShapePlumber::pick_pipeline`] is a single hash
//! lookup per draw. Later registrations override earlier ones for the keys
//! they share.
//!
//! The plumber is shared between jobs as an `Arc<RwLock<_>>`; jobs only take
//! the read lock while drawing, so it can be cleared and rebuilt between
//! frames (e.g. after a shader reload).

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::key::{ShapeFilter, ShapeKey};
use crate::context::RenderContext;
use crate::gpu::{Batch, PipelineId, PipelineState};
use crate::scene::{ItemBound, ItemId};

/// Per-pipeline setup run once whenever the pipeline is (re)bound.
pub type BatchSetter = Arc<dyn Fn(&ShapePipeline, &mut Batch, &RenderContext) + Send + Sync>;

/// Per-item setup run before each item drawn with the pipeline.
pub type ItemSetter =
    Arc<dyn Fn(&ShapePipeline, &mut Batch, &RenderContext, ItemId) + Send + Sync>;

/// A pipeline plus its optional setters.
pub struct ShapePipeline {
    pub pipeline: PipelineId,
    pub state: PipelineState,
    pub(crate) batch_setter: Option<BatchSetter>,
    pub(crate) item_setter: Option<ItemSetter>,
}

impl ShapePipeline {
    #[must_use]
    pub fn new(pipeline: PipelineId, state: PipelineState) -> Self {
        Self {
            pipeline,
            state,
            batch_setter: None,
            item_setter: None,
        }
    }

    #[must_use]
    pub fn with_batch_setter(mut self, setter: BatchSetter) -> Self {
        self.batch_setter = Some(setter);
        self
    }

    #[must_use]
    pub fn with_item_setter(mut self, setter: ItemSetter) -> Self {
        self.item_setter = Some(setter);
        self
    }

    /// Binds the pipeline and runs the batch setter.
    pub fn bind(&self, batch: &mut Batch, ctx: &RenderContext) {
        batch.set_pipeline(self.pipeline);
        if let Some(setter) = &self.batch_setter {
            setter(self, batch, ctx);
        }
    }

    /// Runs the item setter for `item`.
    pub fn prepare_item(&self, batch: &mut Batch, ctx: &RenderContext, item: ItemId) {
        if let Some(setter) = &self.item_setter {
            setter(self, batch, ctx, item);
        }
    }
}

impl std::fmt::Debug for ShapePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapePipeline")
            .field("pipeline", &self.pipeline)
            .field("state", &self.state)
            .field("batch_setter", &self.batch_setter.is_some())
            .field("item_setter", &self.item_setter.is_some())
            .finish()
    }
}

/// Key → pipeline map.
#[derive(Default)]
pub struct ShapePlumber {
    pipelines: FxHashMap<ShapeKey, Arc<ShapePipeline>>,
    version: u64,
}

/// Plumber shared between jobs.
pub type SharedShapePlumber = Arc<RwLock<ShapePlumber>>;

impl ShapePlumber {
    #[must_use]
    pub fn shared(self) -> SharedShapePlumber {
        Arc::new(RwLock::new(self))
    }

    /// Registers `pipeline` for every key matched by `filter`.
    pub fn add_pipeline(&mut self, filter: ShapeFilter, pipeline: ShapePipeline) {
        let pipeline = Arc::new(pipeline);
        let mut overridden = 0usize;
        for key in filter.enumerate_keys() {
            if self.pipelines.insert(key, pipeline.clone()).is_some() {
                overridden += 1;
            }
        }
        if overridden > 0 {
            log::debug!("Shape pipeline {filter:?} overrides {overridden} existing key(s)");
        }
        self.version += 1;
    }

    /// Pipeline for an effective key; `None` for invalid or unregistered keys.
    #[must_use]
    pub fn pick_pipeline(&self, key: ShapeKey) -> Option<&Arc<ShapePipeline>> {
        if !key.is_valid() {
            return None;
        }
        self.pipelines.get(&key.pipeline_bits())
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
        self.version += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Incremented on every change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }
}

// ─── Draw helpers ──────────────────────────────────────────────────────────

/// Number of leading items a `max_drawn` cap lets through; negative is unlimited.
#[inline]
#[must_use]
pub fn draw_limit(item_count: usize, max_drawn: i32) -> usize {
    usize::try_from(max_drawn).map_or(item_count, |max| item_count.min(max))
}

fn effective_key(ctx: &RenderContext, id: ItemId, global_key: ShapeKey) -> Option<ShapeKey> {
    let item = ctx.scene.item(id)?;
    let key = item.shape_key() | global_key;
    key.is_valid().then_some(key)
}

fn draw_item(ctx: &RenderContext, batch: &mut Batch, id: ItemId) {
    if let Some(item) = ctx.scene.item(id) {
        item.payload.render(batch);
    }
}

/// Draws items in input order, binding the matching pipeline for each.
///
/// Only the first `max_drawn` items are considered (`-1` = all). Items whose
/// effective key is invalid or has no pipeline are skipped. Returns the
/// number of items drawn.
pub fn render_shapes(
    ctx: &RenderContext,
    batch: &mut Batch,
    plumber: &ShapePlumber,
    items: &[ItemBound],
    max_drawn: i32,
    global_key: ShapeKey,
) -> usize {
    let limit = draw_limit(items.len(), max_drawn);
    let mut drawn = 0;

    for item in &items[..limit] {
        let Some(key) = effective_key(ctx, item.id, global_key) else {
            continue;
        };
        if key.has_own_pipeline() {
            draw_item(ctx, batch, item.id);
            drawn += 1;
            continue;
        }
        let Some(pipeline) = plumber.pick_pipeline(key) else {
            log::warn!("No shape pipeline for key {key:?}; item skipped");
            continue;
        };
        pipeline.bind(batch, ctx);
        pipeline.prepare_item(batch, ctx, item.id);
        draw_item(ctx, batch, item.id);
        drawn += 1;
    }
    drawn
}

/// Draws items grouped by effective key to minimise pipeline switches.
///
/// Groups are emitted in order of first appearance and keep the relative
/// order of their items; each group binds its pipeline once. Items with
/// their own pipeline are drawn after all groups. The `max_drawn` cap applies
/// to the input list before grouping. Returns the number of items drawn.
pub fn render_state_sort_shapes(
    ctx: &RenderContext,
    batch: &mut Batch,
    plumber: &ShapePlumber,
    items: &[ItemBound],
    max_drawn: i32,
    global_key: ShapeKey,
) -> usize {
    let limit = draw_limit(items.len(), max_drawn);

    let mut group_index: FxHashMap<ShapeKey, usize> = FxHashMap::default();
    let mut groups: Vec<(ShapeKey, Vec<ItemId>)> = Vec::new();
    let mut own_pipeline: Vec<ItemId> = Vec::new();

    for item in &items[..limit] {
        let Some(key) = effective_key(ctx, item.id, global_key) else {
            continue;
        };
        if key.has_own_pipeline() {
            own_pipeline.push(item.id);
            continue;
        }
        let index = *group_index.entry(key).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(item.id);
    }

    let mut drawn = 0;
    for (key, ids) in &groups {
        let Some(pipeline) = plumber.pick_pipeline(*key) else {
            log::warn!(
                "No shape pipeline for key {key:?}; {} item(s) skipped",
                ids.len()
            );
            continue;
        };
        pipeline.bind(batch, ctx);
        for id in ids {
            pipeline.prepare_item(batch, ctx, *id);
            draw_item(ctx, batch, *id);
            drawn += 1;
        }
    }

    for id in own_pipeline {
        draw_item(ctx, batch, id);
        drawn += 1;
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BatchCommand, PipelineDesc};
    use crate::scene::{Item, ShapeItem};
    use glam::{Mat4, Vec3};
    use umbra_core::math::Aabb;

    fn plumber_with_two_pipelines(ctx: &mut RenderContext) -> (ShapePlumber, PipelineId, PipelineId) {
        let opaque = ctx
            .gpu
            .create_pipeline(PipelineDesc::new("opaque", PipelineState::default()));
        let skinned = ctx
            .gpu
            .create_pipeline(PipelineDesc::new("skinned", PipelineState::default()));
        let mut plumber = ShapePlumber::default();
        plumber.add_pipeline(
            ShapeFilter::builder().with_opaque(),
            ShapePipeline::new(opaque, PipelineState::default()),
        );
        plumber.add_pipeline(
            ShapeFilter::builder().with_opaque().with(ShapeKey::SKINNED),
            ShapePipeline::new(skinned, PipelineState::default()),
        );
        (plumber, opaque, skinned)
    }

    fn add_shape(ctx: &mut RenderContext, key: ShapeKey, index_count: u32) -> ItemBound {
        let bound = Aabb::from_sphere(Vec3::ZERO, 1.0);
        let id = ctx.scene.add_item(Item::shape(
            bound,
            ShapeItem::new(Mat4::IDENTITY, key, index_count),
        ));
        ItemBound::new(id, bound)
    }

    fn drawn_index_counts(batch: &Batch) -> Vec<u32> {
        batch
            .commands()
            .iter()
            .filter_map(|c| match c {
                BatchCommand::DrawIndexed { index_count, .. } => Some(*index_count),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_draw_limit() {
        assert_eq!(draw_limit(5, -1), 5);
        assert_eq!(draw_limit(5, 2), 2);
        assert_eq!(draw_limit(5, 0), 0);
        assert_eq!(draw_limit(1, 10), 1);
    }

    #[test]
    fn test_later_registration_overrides() {
        let mut ctx = RenderContext::default();
        let (plumber, opaque, skinned) = plumber_with_two_pipelines(&mut ctx);
        assert_eq!(
            plumber.pick_pipeline(ShapeKey::MATERIAL).unwrap().pipeline,
            opaque
        );
        assert_eq!(
            plumber
                .pick_pipeline(ShapeKey::MATERIAL | ShapeKey::SKINNED)
                .unwrap()
                .pipeline,
            skinned
        );
        assert!(plumber.pick_pipeline(ShapeKey::TRANSLUCENT).is_none());
        assert!(plumber.pick_pipeline(ShapeKey::INVALID).is_none());
    }

    #[test]
    fn test_state_sort_groups_by_first_appearance() {
        let mut ctx = RenderContext::default();
        let (plumber, opaque, skinned) = plumber_with_two_pipelines(&mut ctx);
        let items = vec![
            add_shape(&mut ctx, ShapeKey::MATERIAL, 1),
            add_shape(&mut ctx, ShapeKey::SKINNED, 2),
            add_shape(&mut ctx, ShapeKey::OWN_PIPELINE, 3),
            add_shape(&mut ctx, ShapeKey::MATERIAL, 4),
            add_shape(&mut ctx, ShapeKey::INVALID, 5),
            add_shape(&mut ctx, ShapeKey::SKINNED, 6),
        ];

        let mut batch = Batch::new("sorted");
        let drawn =
            render_state_sort_shapes(&ctx, &mut batch, &plumber, &items, -1, ShapeKey::empty());
        assert_eq!(drawn, 5);
        assert_eq!(drawn_index_counts(&batch), [1, 4, 2, 6, 3]);
        assert_eq!(batch.pipelines().as_slice(), &[opaque, skinned]);
    }

    #[test]
    fn test_unsorted_respects_cap_and_order() {
        let mut ctx = RenderContext::default();
        let (plumber, ..) = plumber_with_two_pipelines(&mut ctx);
        let items: Vec<_> = (1..=5)
            .map(|i| add_shape(&mut ctx, ShapeKey::MATERIAL, i))
            .collect();

        let mut batch = Batch::new("capped");
        let drawn = render_shapes(&ctx, &mut batch, &plumber, &items, 2, ShapeKey::empty());
        assert_eq!(drawn, 2);
        assert_eq!(drawn_index_counts(&batch), [1, 2]);
    }
}
