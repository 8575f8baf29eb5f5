//! # soilmap colormap
//!
//! Color ramps and class rendering for classified soil maps.
//!
//! The classifier assigns each cell a class index; [`render_classes`] turns
//! that index raster into an RGB image on the diverging red-yellow-green
//! ramp, lowest class red and highest green.
//!
//! ```ignore
//! use soilmap_colormap::{class_color, render_classes};
//!
//! let image = render_classes(&classes, 8);
//! let legend: Vec<_> = (0..8).map(|i| class_color(i, 8)).collect();
//! ```

mod render;
mod scheme;

pub use image::RgbImage;
pub use render::{class_color, class_palette, render_classes};
pub use scheme::{evaluate, ColorScheme, ColorStop, Rgb};
