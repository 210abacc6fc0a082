//! Shader binding slots shared by the deferred pipeline.

/// Uniform buffer slots.
pub mod uniform {
    pub const DEFERRED_FRAME_TRANSFORM: u32 = 0;
    pub const LIGHTING_MODEL: u32 = 1;
    pub const LIGHT: u32 = 2;
    pub const LIGHT_AMBIENT: u32 = 3;
    pub const HAZE_MODEL: u32 = 4;
    pub const SUBSURFACE_SCATTERING: u32 = 5;
    pub const AMBIENT_OCCLUSION: u32 = 6;
    pub const LIGHT_CLUSTER_FRUSTUM_GRID: u32 = 7;
    pub const FADE_PARAMETERS: u32 = 8;
    pub const EFFECT_PARAMETERS: u32 = 9;
}

/// Shader storage / resource buffer slots.
pub mod buffer {
    pub const LIGHT_ARRAY: u32 = 0;
    pub const LIGHT_CLUSTER_GRID: u32 = 1;
    pub const LIGHT_CLUSTER_CONTENT: u32 = 2;
}

/// Texture slots.
pub mod texture {
    pub const DEFERRED_COLOR: u32 = 0;
    pub const DEFERRED_NORMAL: u32 = 1;
    pub const DEFERRED_SPECULAR: u32 = 2;
    pub const DEFERRED_DEPTH: u32 = 3;
    pub const DEFERRED_LIGHTING: u32 = 4;
    pub const LINEAR_DEPTH: u32 = 5;
    pub const HALF_LINEAR_DEPTH: u32 = 6;
    pub const HALF_NORMAL: u32 = 7;
    pub const CURVATURE: u32 = 8;
    pub const DIFFUSED_CURVATURE: u32 = 9;
    pub const SCATTERING_LUT: u32 = 10;
    pub const AMBIENT_OCCLUSION: u32 = 11;
    pub const VELOCITY: u32 = 12;
    pub const SKYBOX: u32 = 13;
    pub const SOURCE: u32 = 14;
    pub const HISTORY: u32 = 15;
    pub const MASK: u32 = 16;
    /// First of the three bloom levels.
    pub const BLOOM_LEVELS: u32 = 17;
}
