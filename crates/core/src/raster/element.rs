//! Cell value trait for rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can live in a raster cell.
///
/// Float cells use NaN as their null marker; integer cells use an explicit
/// sentinel (the class rasters use `-1`).
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Value written into cells that hold no data
    fn null_value() -> Self;

    /// Whether this value is null, given the raster's optional nodata marker
    fn is_null(&self, nodata: Option<Self>) -> bool;

    /// Lossy conversion to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_float_element {
    ($t:ty) => {
        impl RasterElement for $t {
            fn null_value() -> Self {
                <$t>::NAN
            }

            fn is_null(&self, nodata: Option<Self>) -> bool {
                if !self.is_finite() {
                    return true;
                }
                nodata.is_some_and(|nd| !nd.is_nan() && *self == nd)
            }
        }
    };
}

macro_rules! impl_int_element {
    ($t:ty, $null:expr) => {
        impl RasterElement for $t {
            fn null_value() -> Self {
                $null
            }

            fn is_null(&self, nodata: Option<Self>) -> bool {
                nodata.is_some_and(|nd| *self == nd)
            }
        }
    };
}

impl_float_element!(f32);
impl_float_element!(f64);
impl_int_element!(i16, -1);
impl_int_element!(i32, -1);
impl_int_element!(u8, 0);
