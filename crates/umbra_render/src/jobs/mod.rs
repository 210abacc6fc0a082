//! The jobs of the deferred main view, grouped by stage.

pub(crate) mod common;
pub mod debug;
pub mod draw;
pub mod frame;
pub mod highlight;
pub mod lighting;
pub mod post;
pub mod select;
pub mod surfaces;

pub use common::{DEPTH_STENCIL_FORMAT, HDR_FORMAT, LDR_FORMAT, LINEAR_DEPTH_FORMAT, VELOCITY_FORMAT};
pub use debug::{
    DebugAmbientOcclusion, DebugDeferredBuffer, DebugScattering, DrawBounds, DrawFrustum,
    DrawItemSelection, DrawSceneOctree, DrawStatus, DrawZoneStack, ExtractFrustums, Frustums,
};
pub use draw::{
    DrawConfig, DrawDeferred, DrawDeferredInputs, DrawOverlay3D, DrawStateSortConfig,
    DrawStateSortDeferred, DrawStateSortInputs,
};
pub use frame::{
    BeginGPURangeTimer, Blit, DeferredFrameTransform, EndGPURangeTimer, FadeJob,
    GenerateDeferredFrameTransform, JitterSample, LightingModel, MakeLightingModel,
    PrepareDeferred, PrepareDeferredOutputs, PreparePrimaryFramebuffer, PrepareStencil,
};
pub use highlight::{DrawHighlight, DrawHighlightMask, HighlightConfig, HighlightMask};
pub use lighting::{
    DebugLightClusters, DrawBackgroundStage, DrawHaze, DrawLight, FetchHazeStage, FilterZones,
    LightClusteringPass, LightClusters, RenderDeferred, SetupZones,
};
pub use post::{
    Antialiasing, BloomApply, BloomBlur, BloomThreshold, CompositeHUD, DebugBloom,
    ToneMappingDeferred,
};
pub use select::{FetchCullSortOutput, FilterLayeredItems, SelectItems, SpatialSelection};
pub use surfaces::{
    AmbientOcclusionEffect, LinearDepthOutputs, LinearDepthPass, SubsurfaceScattering,
    SurfaceGeometryPass, VelocityBufferPass,
};
