//! Class-index raster to RGB image rendering.

use crate::scheme::{evaluate, ColorScheme, Rgb};
use image::RgbImage;
use soilmap_core::raster::Raster;

/// Color of class `index` out of `num_classes`.
///
/// Class 0 sits at the red end and class `num_classes - 1` at the green end;
/// a single class takes the ramp midpoint. Low attribute values read as red
/// on the published maps, so the ramp is sampled at `index / (n - 1)`, not
/// reversed.
pub fn class_color(index: usize, num_classes: usize) -> Rgb {
    let t = if num_classes <= 1 {
        0.5
    } else {
        index as f64 / (num_classes - 1) as f64
    };
    evaluate(ColorScheme::RdYlGn, t)
}

/// Colors for all classes, lowest first.
pub fn class_palette(num_classes: usize) -> Vec<Rgb> {
    (0..num_classes).map(|i| class_color(i, num_classes)).collect()
}

/// Render a class raster (`-1` = null) into an RGB image, one pixel per cell.
///
/// Indices outside `0..num_classes` render white.
pub fn render_classes(classes: &Raster<i16>, num_classes: usize) -> RgbImage {
    let palette = class_palette(num_classes);
    let (rows, cols) = classes.shape();
    let data = classes.data();

    RgbImage::from_fn(cols as u32, rows as u32, |x, y| {
        let class = data[(y as usize, x as usize)];
        let color = usize::try_from(class)
            .ok()
            .and_then(|i| palette.get(i).copied())
            .unwrap_or(Rgb::WHITE);
        image::Rgb(color.to_array())
    })
}
