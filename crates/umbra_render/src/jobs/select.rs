//! Bucket input and the CPU-only selection / filter jobs.

use glam::Vec3;
use rustc_hash::FxHashSet;

use crate::context::RenderContext;
use crate::graph::{EnabledConfig, Job, Varying, Varyings};
use crate::scene::{ItemBound, ItemBounds, ItemId, ItemKey, Layer, Scene};
use umbra_core::errors::Result;
use umbra_core::math::{Aabb, ViewFrustum};

// ─── Task input ────────────────────────────────────────────────────────────

/// Octree cells and items the spatial query touched.
#[derive(Debug, Clone, Default)]
pub struct SpatialSelection {
    pub cells: Vec<Aabb>,
    /// Items fully inside the view.
    pub inside: Vec<ItemId>,
    /// Items straddling the view boundary.
    pub partial: Vec<ItemId>,
}

/// Culled and sorted buckets fed to the main view task.
#[derive(Debug, Clone, Default)]
pub struct FetchCullSortOutput {
    /// Front to back.
    pub opaques: ItemBounds,
    /// Back to front.
    pub transparents: ItemBounds,
    pub lights: ItemBounds,
    pub metas: ItemBounds,
    pub overlay_opaques: ItemBounds,
    pub overlay_transparents: ItemBounds,
    pub spatial_selection: SpatialSelection,
}

crate::job_outputs!(FetchCullSortOutput {
    0 => opaques: ItemBounds as OPAQUE,
    1 => transparents: ItemBounds as TRANSPARENT,
    2 => lights: ItemBounds as LIGHT,
    3 => metas: ItemBounds as META,
    4 => overlay_opaques: ItemBounds as OVERLAY_OPAQUE,
    5 => overlay_transparents: ItemBounds as OVERLAY_TRANSPARENT,
    6 => spatial_selection: SpatialSelection as SPATIAL_SELECTION,
});

impl FetchCullSortOutput {
    /// Buckets every visible scene item, culled against `frustum` when given.
    ///
    /// A flat stand-in for the spatial tree: the selection holds a single
    /// cell enclosing all items.
    #[must_use]
    pub fn from_scene(scene: &Scene, frustum: Option<&ViewFrustum>) -> Self {
        let mut out = Self::default();
        let mut world = Aabb::EMPTY;

        for (id, item) in scene.items() {
            if item.key.contains(ItemKey::INVISIBLE) {
                continue;
            }
            world = world.union(&item.bound);

            if let Some(frustum) = frustum {
                let center = item.bound.center();
                let radius = item.bound.bounding_radius();
                if !frustum.intersects_sphere(center, radius) {
                    continue;
                }
                if frustum.intersects_sphere(center, -radius) {
                    out.spatial_selection.inside.push(id);
                } else {
                    out.spatial_selection.partial.push(id);
                }
            } else {
                out.spatial_selection.inside.push(id);
            }

            let entry = ItemBound::new(id, item.bound);
            let key = item.key;
            if key.contains(ItemKey::LIGHT) {
                out.lights.push(entry);
            } else if key.contains(ItemKey::META) {
                out.metas.push(entry);
            } else if key.contains(ItemKey::SHAPE) {
                let translucent = key.contains(ItemKey::TRANSLUCENT);
                match (item.layer == Layer::World, translucent) {
                    (true, false) => out.opaques.push(entry),
                    (true, true) => out.transparents.push(entry),
                    (false, false) => out.overlay_opaques.push(entry),
                    (false, true) => out.overlay_transparents.push(entry),
                }
            }
        }

        if !world.is_empty() {
            out.spatial_selection.cells.push(world);
        }

        let eye = frustum.map_or(Vec3::ZERO, ViewFrustum::position);
        let distance = |item: &ItemBound| item.bound.center().distance_squared(eye);
        out.opaques.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
        out.overlay_opaques
            .sort_by(|a, b| distance(a).total_cmp(&distance(b)));
        out.transparents.sort_by(|a, b| distance(b).total_cmp(&distance(a)));
        out.overlay_transparents
            .sort_by(|a, b| distance(b).total_cmp(&distance(a)));
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opaques.is_empty()
            && self.transparents.is_empty()
            && self.lights.is_empty()
            && self.metas.is_empty()
            && self.overlay_opaques.is_empty()
            && self.overlay_transparents.is_empty()
    }
}

// ─── SelectItems ───────────────────────────────────────────────────────────

pub struct SelectItemsInputs {
    pub items: Varying<ItemBounds>,
    /// Items selected by an earlier stage, kept ahead of the new matches.
    pub previous: Option<Varying<ItemBounds>>,
}

crate::job_inputs!(SelectItemsInputs { items, previous });

/// Intersects a bucket with a named scene selection.
pub struct SelectItems {
    selection: String,
}

impl SelectItems {
    #[must_use]
    pub fn new(selection: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
        }
    }
}

impl Job for SelectItems {
    type Inputs = SelectItemsInputs;
    type Output = ItemBounds;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &SelectItemsInputs,
        varyings: &Varyings,
    ) -> Result<ItemBounds> {
        let selected = ctx.scene.selection(&self.selection);
        if selected.is_empty() {
            return Ok(ItemBounds::new());
        }
        let selected: FxHashSet<ItemId> = selected.iter().copied().collect();

        let mut out = match &inputs.previous {
            Some(previous) => varyings.get(previous)?.clone(),
            None => ItemBounds::new(),
        };
        let mut present: FxHashSet<ItemId> = out.iter().map(|item| item.id).collect();

        for item in varyings.get(&inputs.items)? {
            if selected.contains(&item.id) && present.insert(item.id) {
                out.push(*item);
            }
        }
        Ok(out)
    }
}

// ─── FilterLayeredItems ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FilterLayeredOutputs {
    pub matching: ItemBounds,
    pub non_matching: ItemBounds,
}

crate::job_outputs!(FilterLayeredOutputs {
    0 => matching: ItemBounds as MATCHING,
    1 => non_matching: ItemBounds as NON_MATCHING,
});

/// Splits a bucket by item layer, preserving order in both halves.
pub struct FilterLayeredItems {
    layer: Layer,
}

impl FilterLayeredItems {
    #[must_use]
    pub fn new(layer: Layer) -> Self {
        Self { layer }
    }
}

impl Job for FilterLayeredItems {
    type Inputs = Varying<ItemBounds>;
    type Output = FilterLayeredOutputs;
    type Config = EnabledConfig;

    fn run(
        &mut self,
        ctx: &mut RenderContext,
        _config: &mut EnabledConfig,
        inputs: &Varying<ItemBounds>,
        varyings: &Varyings,
    ) -> Result<FilterLayeredOutputs> {
        let mut out = FilterLayeredOutputs::default();
        for item in varyings.get(inputs)? {
            let layer = ctx.scene.item(item.id).map(|i| i.layer);
            if layer == Some(self.layer) {
                out.matching.push(*item);
            } else {
                out.non_matching.push(*item);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Task;
    use crate::scene::{Item, ShapeItem};
    use crate::shapes::ShapeKey;
    use glam::{Mat4, Quat};

    fn shape(scene: &mut Scene, key: ShapeKey, center: Vec3, layer: Layer) -> ItemId {
        scene.add_item(
            Item::shape(
                Aabb::from_sphere(center, 0.5),
                ShapeItem::new(Mat4::IDENTITY, key, 6),
            )
            .with_layer(layer),
        )
    }

    #[test]
    fn test_from_scene_buckets_and_sorts() {
        let mut scene = Scene::default();
        let far = shape(&mut scene, ShapeKey::MATERIAL, Vec3::new(0.0, 0.0, -20.0), Layer::World);
        let near = shape(&mut scene, ShapeKey::MATERIAL, Vec3::new(0.0, 0.0, -5.0), Layer::World);
        let glass = shape(&mut scene, ShapeKey::TRANSLUCENT, Vec3::new(0.0, 0.0, -8.0), Layer::World);
        let gizmo = shape(&mut scene, ShapeKey::MATERIAL, Vec3::new(0.0, 0.0, -3.0), Layer::InFront);
        shape(&mut scene, ShapeKey::MATERIAL, Vec3::new(0.0, 0.0, 30.0), Layer::World);

        let frustum = ViewFrustum::perspective(Vec3::ZERO, Quat::IDENTITY, 1.2, 1.0, 0.1, 100.0);
        let buckets = FetchCullSortOutput::from_scene(&scene, Some(&frustum));

        let ids = |bucket: &ItemBounds| bucket.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(&buckets.opaques), [near, far]);
        assert_eq!(ids(&buckets.transparents), [glass]);
        assert_eq!(ids(&buckets.overlay_opaques), [gizmo]);
        assert_eq!(buckets.spatial_selection.inside.len(), 4);
    }

    #[test]
    fn test_select_items_keeps_previous_and_dedups() {
        let mut ctx = RenderContext::default();
        let a = shape(&mut ctx.scene, ShapeKey::MATERIAL, Vec3::ZERO, Layer::World);
        let b = shape(&mut ctx.scene, ShapeKey::MATERIAL, Vec3::ONE, Layer::World);
        let c = shape(&mut ctx.scene, ShapeKey::MATERIAL, Vec3::NEG_ONE, Layer::World);
        ctx.scene.set_selection("picked", vec![a, c]);

        let (mut task, (first, second)) = Task::<ItemBounds>::build("Select", |b, input| {
            let first = b.add_job(
                "First",
                SelectItems::new("picked"),
                SelectItemsInputs {
                    items: input,
                    previous: None,
                },
            )?;
            let second = b.add_job(
                "Second",
                SelectItems::new("picked"),
                SelectItemsInputs {
                    items: input,
                    previous: Some(first),
                },
            )?;
            Ok((first, second))
        })
        .unwrap();

        let all = [a, b, c]
            .map(|id| ctx.scene.item_bound(id).unwrap())
            .to_vec();
        task.run(&mut ctx, all).unwrap();

        let ids = |v: &ItemBounds| v.iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids(task.get(&first).unwrap()), [a, c]);
        assert_eq!(ids(task.get(&second).unwrap()), [a, c]);
    }

    #[test]
    fn test_filter_layered_items() {
        let mut ctx = RenderContext::default();
        let world = shape(&mut ctx.scene, ShapeKey::MATERIAL, Vec3::ZERO, Layer::World);
        let front = shape(&mut ctx.scene, ShapeKey::MATERIAL, Vec3::ZERO, Layer::InFront);
        let hud = shape(&mut ctx.scene, ShapeKey::MATERIAL, Vec3::ZERO, Layer::Hud);

        let (mut task, out) = Task::<ItemBounds>::build("Filter", |b, input| {
            b.add_job("InFront", FilterLayeredItems::new(Layer::InFront), input)
        })
        .unwrap();

        let items = [world, front, hud]
            .map(|id| ctx.scene.item_bound(id).unwrap())
            .to_vec();
        task.run(&mut ctx, items).unwrap();

        let matching = task
            .get(&out.get_n(FilterLayeredOutputs::MATCHING))
            .unwrap();
        let rest = task
            .get(&out.get_n(FilterLayeredOutputs::NON_MATCHING))
            .unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].id, front);
        assert_eq!(rest.iter().map(|i| i.id).collect::<Vec<_>>(), [world, hud]);
    }
}
