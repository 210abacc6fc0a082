//! Shape keys, pipeline plumbing and the item draw helpers.

pub mod key;
pub mod pipelines;
pub mod plumber;

pub use key::{ShapeFilter, ShapeKey};
pub use plumber::{
    BatchSetter, ItemSetter, ShapePipeline, ShapePlumber, SharedShapePlumber, draw_limit,
    render_shapes, render_state_sort_shapes,
};
