//! Percentile classification of interpolated surfaces
//!
//! - **Percentile breaks**: N+1 evenly spaced percentile ranks over valid cells
//! - **Boundary clipping**: bounding-box crop plus exact cell-centre containment
//! - **Outline**: boundary rings in pixel space for overlay drawing
//! - **Classify**: class raster, per-class area table, coloured image

mod classify;
mod clip;
mod outline;
mod percentile;

pub use classify::{classify, ClassEntry, ClassifiedMap, ClassifyParams, RasterClassifier};
pub use clip::{clip_to_geometry, prepare_boundary, Boundary};
pub use outline::outline_rings;
pub use percentile::{class_index, percentile, percentile_breaks};
