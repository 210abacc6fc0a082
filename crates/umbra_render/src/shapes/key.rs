//! Shape keys: the bit set that selects a pipeline variant for an item.

use bitflags::bitflags;

bitflags! {
    /// Per-item shading/state bits.
    ///
    /// The effective key of a draw is the item's key OR-ed with the
    /// frame-global key (which, for example, forces `WIREFRAME`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeKey: u32 {
        const MATERIAL     = 1 << 0;
        const TRANSLUCENT  = 1 << 1;
        const LIGHTMAP     = 1 << 2;
        const TANGENTS     = 1 << 3;
        const UNLIT        = 1 << 4;
        const SKINNED      = 1 << 5;
        const DEPTH_ONLY   = 1 << 6;
        const DEPTH_BIAS   = 1 << 7;
        const WIREFRAME    = 1 << 8;
        const NO_CULL_FACE = 1 << 9;
        const FADE         = 1 << 10;

        /// The item binds its own pipeline inside `render`.
        const OWN_PIPELINE = 1 << 12;
        /// Never drawn.
        const INVALID      = 1 << 13;

        const CUSTOM_0     = 1 << 16;
        const CUSTOM_1     = 1 << 17;
        const CUSTOM_2     = 1 << 18;
        const CUSTOM_3     = 1 << 19;
    }
}

impl ShapeKey {
    /// Bits that select a pipeline in the plumber.
    pub const PIPELINE_BITS: Self = Self::MATERIAL
        .union(Self::TRANSLUCENT)
        .union(Self::LIGHTMAP)
        .union(Self::TANGENTS)
        .union(Self::UNLIT)
        .union(Self::SKINNED)
        .union(Self::DEPTH_ONLY)
        .union(Self::DEPTH_BIAS)
        .union(Self::WIREFRAME)
        .union(Self::NO_CULL_FACE)
        .union(Self::FADE);

    #[inline]
    #[must_use]
    pub fn is_valid(self) -> bool {
        !self.contains(Self::INVALID)
    }

    #[inline]
    #[must_use]
    pub fn has_own_pipeline(self) -> bool {
        self.contains(Self::OWN_PIPELINE)
    }

    #[inline]
    #[must_use]
    pub fn is_translucent(self) -> bool {
        self.contains(Self::TRANSLUCENT)
    }

    #[inline]
    #[must_use]
    pub fn is_wireframe(self) -> bool {
        self.contains(Self::WIREFRAME)
    }

    /// The part of the key the plumber looks up.
    #[inline]
    #[must_use]
    pub fn pipeline_bits(self) -> Self {
        self & Self::PIPELINE_BITS
    }
}

/// A set of shape keys: all keys whose `mask` bits equal `flags`.
///
/// Bits outside the mask are free, so one filter usually covers many keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShapeFilter {
    flags: ShapeKey,
    mask: ShapeKey,
}

impl ShapeFilter {
    /// Filter that matches every key.
    #[must_use]
    pub fn builder() -> Self {
        Self::default()
    }

    /// Requires `bits` to be set.
    #[must_use]
    pub fn with(mut self, bits: ShapeKey) -> Self {
        self.flags |= bits;
        self.mask |= bits;
        self
    }

    /// Requires `bits` to be clear.
    #[must_use]
    pub fn without(mut self, bits: ShapeKey) -> Self {
        self.flags.remove(bits);
        self.mask |= bits;
        self
    }

    #[must_use]
    pub fn with_opaque(self) -> Self {
        self.without(ShapeKey::TRANSLUCENT)
    }

    #[must_use]
    pub fn with_translucent(self) -> Self {
        self.with(ShapeKey::TRANSLUCENT)
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> ShapeKey {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn mask(&self) -> ShapeKey {
        self.mask
    }

    #[inline]
    #[must_use]
    pub fn matches(&self, key: ShapeKey) -> bool {
        (key & self.mask) == self.flags
    }

    /// Every pipeline-relevant key the filter matches.
    #[must_use]
    pub fn enumerate_keys(&self) -> Vec<ShapeKey> {
        let fixed = self.flags.pipeline_bits();
        let free: Vec<ShapeKey> = ShapeKey::PIPELINE_BITS
            .difference(self.mask)
            .iter()
            .collect();

        let combinations = 1usize << free.len();
        (0..combinations)
            .map(|combo| {
                free.iter()
                    .enumerate()
                    .filter(|(bit, _)| combo & (1 << bit) != 0)
                    .fold(fixed, |key, (_, flag)| key | *flag)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let filter = ShapeFilter::builder()
            .with_opaque()
            .without(ShapeKey::DEPTH_ONLY);
        assert!(filter.matches(ShapeKey::MATERIAL));
        assert!(filter.matches(ShapeKey::MATERIAL | ShapeKey::SKINNED));
        assert!(!filter.matches(ShapeKey::TRANSLUCENT));
        assert!(!filter.matches(ShapeKey::DEPTH_ONLY));
    }

    #[test]
    fn test_enumeration_covers_free_bits() {
        let filter = ShapeFilter::builder().with(ShapeKey::PIPELINE_BITS.difference(
            ShapeKey::SKINNED | ShapeKey::FADE,
        ));
        let keys = filter.enumerate_keys();
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| filter.matches(*k)));
    }

    #[test]
    fn test_global_key_composition() {
        let item = ShapeKey::MATERIAL | ShapeKey::CUSTOM_1;
        let effective = item | ShapeKey::WIREFRAME;
        assert!(effective.is_wireframe());
        assert_eq!(
            effective.pipeline_bits(),
            ShapeKey::MATERIAL | ShapeKey::WIREFRAME
        );
    }
}
