//! Renderer-wide settings fixed when the main view task is built.
//!
//! Per-job parameters live in the job configs (see
//! [`ConfigRegistry`](crate::graph::ConfigRegistry)); the values here shape
//! the graph itself and cannot change without rebuilding it.

use serde::{Deserialize, Serialize};

use crate::gpu::GpuLimits;

/// Build-time settings of the deferred main view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Number of outline groups the highlight stage draws.
    pub highlight_groups: usize,
    /// Selection name prefix of highlight group `i` (`"{prefix}{i}"`;
    /// group 0 uses the bare prefix).
    pub highlight_selection_prefix: String,
    /// Asset name of the status icon atlas.
    pub status_icon_atlas: String,
    /// Shadow cascades extracted for the frustum debug views.
    pub shadow_cascades: usize,
    /// Limits of the device the view renders with.
    pub limits: GpuLimits,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            highlight_groups: 4,
            highlight_selection_prefix: "contextOverlayHighlightList".into(),
            status_icon_atlas: "icons/statusIconAtlas.svg".into(),
            shadow_cascades: 4,
            limits: GpuLimits::default(),
        }
    }
}

impl RenderSettings {
    /// Maximum number of shadow cascades.
    pub const MAX_SHADOW_CASCADES: usize = 4;

    /// Selection name of highlight group `group`.
    #[must_use]
    pub fn highlight_selection_name(&self, group: usize) -> String {
        if group == 0 {
            self.highlight_selection_prefix.clone()
        } else {
            format!("{}{group}", self.highlight_selection_prefix)
        }
    }

    /// Clamps values the graph cannot be built with.
    pub fn sanitize(&mut self) -> bool {
        let cascades = self.shadow_cascades.min(Self::MAX_SHADOW_CASCADES);
        let changed = cascades != self.shadow_cascades;
        if changed {
            log::warn!(
                "shadow_cascades {} exceeds {}; clamped",
                self.shadow_cascades,
                Self::MAX_SHADOW_CASCADES
            );
            self.shadow_cascades = cascades;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_selection_names() {
        let settings = RenderSettings::default();
        assert_eq!(settings.highlight_selection_name(0), "contextOverlayHighlightList");
        assert_eq!(settings.highlight_selection_name(2), "contextOverlayHighlightList2");
    }

    #[test]
    fn test_settings_from_partial_json() {
        let mut settings: RenderSettings =
            serde_json::from_str(r#"{ "shadow_cascades": 9, "limits": { "max_texture_dimension": 4096 } }"#)
                .unwrap();
        assert_eq!(settings.highlight_groups, 4);
        assert_eq!(settings.limits.max_texture_dimension, 4096);
        assert!(settings.sanitize());
        assert_eq!(settings.shadow_cascades, RenderSettings::MAX_SHADOW_CASCADES);
    }
}
