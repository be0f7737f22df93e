//! Integer storage encoding for product rasters
//!
//! Values are rounded half-to-even, clipped to the target integer range and
//! cast. Undefined (NaN) values take the variable's fill value.

use crate::types::{Raster, VELOCITY_NO_DATA};
use ndarray::Array2;
use num_traits::{Bounded, NumCast, ToPrimitive};

/// Fill value of the velocity-family variables
pub const VELOCITY_FILL: i16 = VELOCITY_NO_DATA;
/// Fill value of the chip-size variables
pub const CHIP_SIZE_FILL: u16 = 0;
/// Fill value of the interpolation mask
pub const MASK_FILL: u8 = 0;

/// Round, clip and cast a stream of values into `T`
pub fn quantize<T, I>(values: I, fill: T) -> Vec<T>
where
    T: NumCast + Bounded + Copy,
    I: IntoIterator<Item = f64>,
{
    let lo = <T as Bounded>::min_value().to_f64().unwrap_or(f64::MIN);
    let hi = <T as Bounded>::max_value().to_f64().unwrap_or(f64::MAX);

    values
        .into_iter()
        .map(|v| {
            if v.is_nan() {
                fill
            } else {
                <T as NumCast>::from(v.clamp(lo, hi).round_ties_even()).unwrap_or(fill)
            }
        })
        .collect()
}

/// Velocity rasters are stored as signed 16-bit m/yr
pub fn encode_velocity(field: &Raster) -> Vec<i16> {
    quantize(field.iter().map(|&v| v as f64), VELOCITY_FILL)
}

/// Chip sizes are stored as unsigned 16-bit metres
pub fn encode_chip_size(field: &Raster) -> Vec<u16> {
    quantize(field.iter().map(|&v| v as f64), CHIP_SIZE_FILL)
}

pub fn encode_mask(field: &Array2<i32>) -> Vec<u8> {
    quantize(field.iter().map(|&v| v as f64), MASK_FILL)
}

/// Round a scalar attribute to one decimal; negative zero is written as zero
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0 + 0.0
}
