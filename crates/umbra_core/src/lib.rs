//! Umbra core: the error taxonomy and math primitives every other crate
//! in the workspace builds on.

pub mod errors;
pub mod math;

pub use errors::{ConfigError, GpuError, GraphError, RenderError, Result};
pub use math::{Aabb, ViewFrustum, Viewport};
