//! Color schemes and multi-stop interpolation engine.

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Used for null and out-of-boundary cells.
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255 };

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorScheme {
    /// Red -> Yellow -> Green, diverging (low values red)
    #[default]
    RdYlGn,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[Self::RdYlGn];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RdYlGn => "RdYlGn",
        }
    }

    fn stops(&self) -> &'static [ColorStop] {
        match self {
            Self::RdYlGn => RDYLGN_STOPS,
        }
    }
}

// ColorBrewer RdYlGn, 11 classes
const RDYLGN_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 165, 0, 38),
    ColorStop::new(0.1, 215, 48, 39),
    ColorStop::new(0.2, 244, 109, 67),
    ColorStop::new(0.3, 253, 174, 97),
    ColorStop::new(0.4, 254, 224, 139),
    ColorStop::new(0.5, 255, 255, 191),
    ColorStop::new(0.6, 217, 239, 139),
    ColorStop::new(0.7, 166, 217, 106),
    ColorStop::new(0.8, 102, 189, 99),
    ColorStop::new(0.9, 26, 152, 80),
    ColorStop::new(1.0, 0, 104, 55),
];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Rgb::WHITE,
    };
    if t.is_nan() {
        return Rgb::WHITE;
    }
    if t <= first.t {
        return first.color;
    }
    if t >= last.t {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.t {
            let ratio = (t - lo.t) / (hi.t - lo.t);
            return lerp_color(lo.color, hi.color, ratio);
        }
    }
    last.color
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1].
///
/// Values outside the range clamp to the end colors; NaN gives white.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    multi_stop(scheme.stops(), t)
}
