//! Scene
//!
//! Render items, the per-frame stages and the named selections the render
//! graph reads from.
//!
//! # Render items
//!
//! An [`Item`] carries the metadata the fetch/cull stage and the filters need
//! (key, layer, world bound) plus a boxed [`ItemPayload`]. The payload is
//! the single renderer interface: it draws itself into a batch and exposes
//! optional capabilities (`light`, `zone`) instead of a class hierarchy.

pub mod fade;
pub mod stages;

use bitflags::bitflags;
use glam::Mat4;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use crate::gpu::Batch;
use crate::shapes::ShapeKey;
use umbra_core::math::Aabb;

pub use fade::{FadeCategory, FadeTransition, FadeTransitions};
pub use stages::{
    AmbientLight, BackgroundStage, Haze, HazeStage, Light, LightKind, LightStage, Skybox, Zone,
};

new_key_type! {
    /// Stable handle of a render item.
    pub struct ItemId;
}

bitflags! {
    /// Coarse classification bits used by fetch, cull and the filters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ItemKey: u32 {
        const SHAPE       = 1 << 0;
        const LIGHT       = 1 << 1;
        const META        = 1 << 2;
        const TRANSLUCENT = 1 << 3;
        const VIEW_SPACE  = 1 << 4;
        const LAYERED     = 1 << 5;
        const INVISIBLE   = 1 << 6;
        const ZONE        = 1 << 7;
    }
}

/// Draw layer of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layer {
    #[default]
    World,
    /// Drawn after the main scene, on top of it.
    InFront,
    /// Drawn into the HUD.
    Hud,
}

/// An item id with its world bound, as listed in a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemBound {
    pub id: ItemId,
    pub bound: Aabb,
}

impl ItemBound {
    #[inline]
    #[must_use]
    pub fn new(id: ItemId, bound: Aabb) -> Self {
        Self { id, bound }
    }
}

/// Ordered list of items, as produced by the fetch/cull/sort stage.
pub type ItemBounds = Vec<ItemBound>;

/// The renderer side of a render item.
pub trait ItemPayload: 'static {
    /// Pipeline selector; `INVALID` items are never drawn.
    fn shape_key(&self) -> ShapeKey {
        ShapeKey::INVALID
    }

    /// Records the item's draw into `batch`.
    fn render(&self, _batch: &mut Batch) {}

    fn light(&self) -> Option<&Light> {
        None
    }

    fn zone(&self) -> Option<&Zone> {
        None
    }
}

/// Standard mesh payload: one indexed draw under a model transform.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeItem {
    pub transform: Mat4,
    pub shape_key: ShapeKey,
    pub index_count: u32,
}

impl ShapeItem {
    #[must_use]
    pub fn new(transform: Mat4, shape_key: ShapeKey, index_count: u32) -> Self {
        Self {
            transform,
            shape_key,
            index_count,
        }
    }
}

impl ItemPayload for ShapeItem {
    fn shape_key(&self) -> ShapeKey {
        self.shape_key
    }

    fn render(&self, batch: &mut Batch) {
        batch.set_model(self.transform);
        batch.draw_indexed(self.index_count, 1);
    }
}

/// Payload of a light item.
#[derive(Debug, Clone, PartialEq)]
pub struct LightItem(pub Light);

impl ItemPayload for LightItem {
    fn light(&self) -> Option<&Light> {
        Some(&self.0)
    }
}

/// Payload of a zone item.
#[derive(Debug, Clone)]
pub struct ZoneItem(pub Zone);

impl ItemPayload for ZoneItem {
    fn zone(&self) -> Option<&Zone> {
        Some(&self.0)
    }
}

/// A render item.
pub struct Item {
    pub key: ItemKey,
    pub layer: Layer,
    pub bound: Aabb,
    pub payload: Box<dyn ItemPayload>,
}

impl Item {
    #[must_use]
    pub fn new(key: ItemKey, bound: Aabb, payload: impl ItemPayload) -> Self {
        Self {
            key,
            layer: Layer::World,
            bound,
            payload: Box::new(payload),
        }
    }

    /// Shape item; translucency follows the shape key.
    #[must_use]
    pub fn shape(bound: Aabb, shape: ShapeItem) -> Self {
        let mut key = ItemKey::SHAPE;
        if shape.shape_key.is_translucent() {
            key |= ItemKey::TRANSLUCENT;
        }
        Self::new(key, bound, shape)
    }

    #[must_use]
    pub fn light(light: Light) -> Self {
        Self::new(ItemKey::LIGHT, light.bound(), LightItem(light))
    }

    #[must_use]
    pub fn zone(zone: Zone) -> Self {
        Self::new(ItemKey::ZONE | ItemKey::META, zone.bound, ZoneItem(zone))
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        if layer != Layer::World {
            self.key |= ItemKey::LAYERED;
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn shape_key(&self) -> ShapeKey {
        self.payload.shape_key()
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("key", &self.key)
            .field("layer", &self.layer)
            .field("bound", &self.bound)
            .field("shape_key", &self.shape_key())
            .finish_non_exhaustive()
    }
}

/// Items, stages, selections and fades of the world being rendered.
#[derive(Default)]
pub struct Scene {
    items: SlotMap<ItemId, Item>,
    selections: FxHashMap<String, Vec<ItemId>>,
    pub light_stage: LightStage,
    pub haze_stage: HazeStage,
    pub background_stage: BackgroundStage,
    pub fades: FadeTransitions,
}

impl Scene {
    pub fn add_item(&mut self, item: Item) -> ItemId {
        self.items.insert(item)
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        self.fades.remove(id);
        for selection in self.selections.values_mut() {
            selection.retain(|selected| *selected != id);
        }
        self.items.remove(id)
    }

    #[inline]
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    #[must_use]
    pub fn item_bound(&self, id: ItemId) -> Option<ItemBound> {
        self.items.get(id).map(|item| ItemBound::new(id, item.bound))
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items.iter()
    }

    /// Replaces the named selection.
    pub fn set_selection(&mut self, name: &str, items: Vec<ItemId>) {
        self.selections.insert(name.to_owned(), items);
    }

    pub fn clear_selection(&mut self, name: &str) {
        self.selections.remove(name);
    }

    /// Items of the named selection; empty when it does not exist.
    #[must_use]
    pub fn selection(&self, name: &str) -> &[ItemId] {
        self.selections.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn selection_names(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_removed_item_leaves_selections() {
        let mut scene = Scene::default();
        let bound = Aabb::from_sphere(Vec3::ZERO, 1.0);
        let a = scene.add_item(Item::shape(
            bound,
            ShapeItem::new(Mat4::IDENTITY, ShapeKey::MATERIAL, 3),
        ));
        let b = scene.add_item(Item::light(Light::point(Vec3::ONE, 2.0)));
        scene.set_selection("picked", vec![a, b]);

        scene.remove_item(a);
        assert_eq!(scene.selection("picked"), &[b]);
        assert!(scene.selection("missing").is_empty());
        assert!(scene.item(b).unwrap().payload.light().is_some());
    }

    #[test]
    fn test_layered_items_are_tagged() {
        let item = Item::shape(
            Aabb::from_sphere(Vec3::ZERO, 1.0),
            ShapeItem::new(Mat4::IDENTITY, ShapeKey::TRANSLUCENT, 6),
        )
        .with_layer(Layer::InFront);
        assert!(item.key.contains(ItemKey::LAYERED | ItemKey::TRANSLUCENT));
    }
}
