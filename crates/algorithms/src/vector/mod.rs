//! Vector operations against the raster grid
//!
//! - Containment: which cell centres fall inside a (multi)polygon
//! - Union: collapse several boundary polygons into one geometry
//! - Bounding box: axis-aligned envelope

mod containment;
mod spatial;

pub use containment::{contains_point, polygon_mask};
pub use spatial::{bounding_box, union_all, BoundingBox};
