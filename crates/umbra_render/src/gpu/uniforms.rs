//! Uniform blocks uploaded by the deferred jobs.
//!
//! Every block is `#[repr(C)]` + [`bytemuck::Pod`] so it can be written to a
//! buffer with [`GpuContext::update_uniform`](super::GpuContext::update_uniform).
//! Fields are packed in 16-byte groups to match std140 layout.

use glam::{Mat4, UVec4, Vec4};

/// Defines a Pod uniform block with per-field defaults.
///
/// ```rust,ignore
/// define_uniform_struct!(
///     /// Tone mapping parameters.
///     struct ToneMappingUniforms {
///         pub exposure: f32 = 1.0,
///         pub curve: u32,
///     }
/// );
/// ```
#[macro_export]
macro_rules! define_uniform_struct {
    (
        $(#[$meta:meta])* struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $vis:vis $field_name:ident : $field_type:ty $(= $default_val:expr)?
            ),* $(,)?
        }
    ) => {
        #[repr(C)]
        #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        $(#[$meta])*
        pub struct $name {
            $(
                $(#[$fmeta])*
                $vis $field_name : $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $( $field_name: $crate::define_uniform_struct!(@val_or_default $field_type $(, $default_val)?), )*
                }
            }
        }
    };
    (@val_or_default $type:ty, $val:expr) => { $val };
    (@val_or_default $type:ty) => { <$type as Default>::default() };
}

define_uniform_struct!(
    /// Per-frame camera data shared by every deferred pass.
    struct DeferredFrameTransformUniforms {
        pub view: Mat4 = Mat4::IDENTITY,
        pub view_inverse: Mat4 = Mat4::IDENTITY,
        pub projection: Mat4 = Mat4::IDENTITY,
        pub projection_inverse: Mat4 = Mat4::IDENTITY,
        pub previous_view_projection: Mat4 = Mat4::IDENTITY,
        /// `(near * far, far - near, far, near)`
        pub depth_info: Vec4,
        /// `(x, y, width, height)` of the viewport.
        pub pixel_info: Vec4,
        /// `(jitter.x, jitter.y, frame_index, 0)`
        pub jitter_info: Vec4,
    }
);

define_uniform_struct!(
    /// Shading switches; every component is a boolean (0 or 1).
    struct LightingModelUniforms {
        /// `(unlit, emissive, lightmap, background)`
        pub material_channels: UVec4 = UVec4::ONE,
        /// `(scattering, diffuse, specular, albedo)`
        pub shading_terms: UVec4 = UVec4::ONE,
        /// `(ambient, directional, point, spot)`
        pub light_types: UVec4 = UVec4::ONE,
        /// `(show_light_contour, wireframe, haze, ambient_occlusion)`
        pub extras: UVec4 = UVec4::new(0, 0, 1, 1),
    }
);

define_uniform_struct!(
    /// Haze colour and falloff parameters.
    struct HazeUniforms {
        pub color: Vec4 = Vec4::new(0.5, 0.6, 0.7, 1.0),
        /// `(range, height, base_level, background_blend)`
        pub params: Vec4 = Vec4::new(1000.0, 200.0, 0.0, 0.0),
    }
);

define_uniform_struct!(
    /// Light cluster grid description.
    struct LightClusterGridUniforms {
        /// `(x, y, z, light_count)`
        pub dims: UVec4,
        /// `(range_near, range_far, 0, 0)`
        pub range: Vec4,
    }
);

define_uniform_struct!(
    /// Ambient occlusion parameters.
    struct AmbientOcclusionUniforms {
        /// `(radius, level, falloff_angle, num_samples)`
        pub params: Vec4 = Vec4::new(0.5, 0.5, 0.01, 16.0),
        /// `(resolution_level, blur_radius, ditering, 0)`
        pub resolution: Vec4 = Vec4::new(1.0, 4.0, 1.0, 0.0),
    }
);

define_uniform_struct!(
    /// Subsurface scattering parameters.
    struct ScatteringUniforms {
        /// `(bent_red, bent_green, bent_blue, bent_scale)`
        pub bent_info: Vec4 = Vec4::new(1.5, 0.8, 0.3, 1.5),
        /// `(curvature_offset, curvature_scale, show_bent, enabled)`
        pub curvature_info: Vec4 = Vec4::new(0.08, 0.8, 0.0, 1.0),
    }
);

define_uniform_struct!(
    /// Bloom threshold and blend parameters.
    struct BloomUniforms {
        /// `(threshold, intensity, size, 0)`
        pub params: Vec4 = Vec4::new(0.9, 0.25, 0.7, 0.0),
    }
);

define_uniform_struct!(
    /// Tone mapping operator selection.
    struct ToneMappingUniforms {
        pub exposure: f32 = 1.0,
        pub curve: u32 = 1,
        pub __pad: [u32; 2],
    }
);

define_uniform_struct!(
    /// Temporal antialiasing parameters.
    struct AntialiasingUniforms {
        /// `(blend, covariance_gamma, sharpen, regenerate_history)`
        pub params: Vec4 = Vec4::new(0.25, 0.65, 0.15, 0.0),
        /// `(jitter.x, jitter.y, 0, 0)`
        pub jitter: Vec4,
    }
);

define_uniform_struct!(
    /// Outline / fill parameters of one highlight group.
    struct HighlightUniforms {
        pub outline_color: Vec4 = Vec4::new(1.0, 0.7, 0.2, 1.0),
        /// `(outline_width, occluded_fill_alpha, unoccluded_fill_alpha, glow)`
        pub params: Vec4 = Vec4::new(2.0, 0.0, 0.0, 0.0),
    }
);

define_uniform_struct!(
    /// Per-item fade threshold consumed by the fade pipelines.
    struct FadeUniforms {
        /// `(threshold, category, 0, 0)`
        pub params: Vec4,
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<DeferredFrameTransformUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<LightingModelUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<ToneMappingUniforms>(), 16);
    }

    define_uniform_struct!(
        /// Block with documented fields.
        struct DocumentedUniforms {
            /// Scale factor.
            pub scale: Vec4 = Vec4::ONE,
            /// Unset, zero by default.
            pub offset: Vec4,
        }
    );

    #[test]
    fn test_documented_fields_keep_defaults() {
        let block = DocumentedUniforms::default();
        assert_eq!(block.scale, Vec4::ONE);
        assert_eq!(block.offset, Vec4::ZERO);

        let transform = DeferredFrameTransformUniforms::default();
        assert_eq!(transform.view, Mat4::IDENTITY);
        assert_eq!(transform.depth_info, Vec4::ZERO);
    }

    #[test]
    fn test_defaults_apply() {
        let model = LightingModelUniforms::default();
        assert_eq!(model.material_channels, UVec4::ONE);
        assert_eq!(model.extras.y, 0);
        assert_eq!(ToneMappingUniforms::default().exposure, 1.0);
    }
}
