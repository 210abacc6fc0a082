//! Fade transitions: items dissolving in or out over a short time.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::ItemId;
use crate::gpu::BufferId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FadeCategory {
    ElementEnterLeaveDomain,
    BubbleIsolate,
    ElementAdded,
    ElementRemoved,
    AvatarChange,
}

impl FadeCategory {
    pub const COUNT: usize = 5;

    pub const ALL: [FadeCategory; Self::COUNT] = [
        FadeCategory::ElementEnterLeaveDomain,
        FadeCategory::BubbleIsolate,
        FadeCategory::ElementAdded,
        FadeCategory::ElementRemoved,
        FadeCategory::AvatarChange,
    ];

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Items fading in go from fully dissolved to solid.
    #[inline]
    #[must_use]
    pub fn is_fade_in(self) -> bool {
        matches!(
            self,
            FadeCategory::ElementEnterLeaveDomain | FadeCategory::ElementAdded
        )
    }
}

/// State of one running transition.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeTransition {
    pub category: FadeCategory,
    pub elapsed: f32,
    /// Dissolve threshold in `[0, 1]`; 1 is fully dissolved.
    pub threshold: f32,
    /// Per-item parameter buffer, allocated by the fade job.
    pub buffer: Option<BufferId>,
}

/// Running transitions keyed by item.
#[derive(Debug, Default)]
pub struct FadeTransitions {
    transitions: FxHashMap<ItemId, FadeTransition>,
}

impl FadeTransitions {
    /// Starts (or restarts) a transition for `item`.
    pub fn start(&mut self, item: ItemId, category: FadeCategory) {
        let threshold = if category.is_fade_in() { 1.0 } else { 0.0 };
        let buffer = self.transitions.get(&item).and_then(|t| t.buffer);
        self.transitions.insert(
            item,
            FadeTransition {
                category,
                elapsed: 0.0,
                threshold,
                buffer,
            },
        );
    }

    #[must_use]
    pub fn get(&self, item: ItemId) -> Option<&FadeTransition> {
        self.transitions.get(&item)
    }

    pub fn get_mut(&mut self, item: ItemId) -> Option<&mut FadeTransition> {
        self.transitions.get_mut(&item)
    }

    pub fn remove(&mut self, item: ItemId) -> Option<FadeTransition> {
        self.transitions.remove(&item)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ItemId, &mut FadeTransition)> {
        self.transitions.iter_mut().map(|(id, t)| (*id, t))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Drops every transition for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(ItemId, &FadeTransition) -> bool) {
        self.transitions.retain(|id, t| keep(*id, t));
    }
}
