use crate::types::Raster;
use ndarray::{Array2, Zip};
use std::f32::consts::FRAC_PI_2;

/// Projects range-offset measurements onto an a priori flow direction
///
/// The calibration coefficients map offsets to velocity,
/// `vx = o2vx_1 * dx + o2vx_2 * dy` and `vy = o2vy_1 * dx + o2vy_2 * dy`.
/// Inverting that system gives the range offset implied by a velocity vector,
/// so a single range measurement fixes the length of a vector whose direction
/// is known.
pub struct RangeProjector {
    /// Range row of the inverse calibration system: `[o2vy_2 / det, o2vx_2 / det]`
    inverse: Array2<[f32; 2]>,
    /// Range sensitivity direction `[o2vx_1, o2vy_1]`
    direction: Array2<[f32; 2]>,
    angle_threshold: f32,
}

impl RangeProjector {
    pub fn new(
        offset2vx_1: &Raster,
        offset2vx_2: &Raster,
        offset2vy_1: &Raster,
        offset2vy_2: &Raster,
        angle_threshold: f32,
    ) -> Self {
        let inverse = Zip::from(offset2vx_1)
            .and(offset2vx_2)
            .and(offset2vy_1)
            .and(offset2vy_2)
            .map_collect(|&x1, &x2, &y1, &y2| {
                let det = x1 * y2 - x2 * y1;
                [y2 / det, x2 / det]
            });
        let direction = Zip::from(offset2vx_1)
            .and(offset2vy_1)
            .map_collect(|&x1, &y1| [x1, y1]);

        Self {
            inverse,
            direction,
            angle_threshold,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.inverse.dim()
    }

    /// Scale the flow vector `(ux, uy)` so that it reproduces the observed range offset
    ///
    /// Pixels with a zero flow vector, or a flow vector too close to
    /// perpendicular to the range direction, are NaN.
    pub fn project(&self, range_offset: &Raster, ux: &Raster, uy: &Raster) -> (Raster, Raster) {
        let threshold = self.angle_threshold;
        let kernel = |&dx: &f32, inv: &[f32; 2], dir: &[f32; 2], &x: &f32, &y: &f32| {
            if x == 0.0 && y == 0.0 {
                return (f32::NAN, f32::NAN);
            }
            if !is_observable(x, y, dir[0], dir[1], threshold) {
                return (f32::NAN, f32::NAN);
            }
            let alpha = dx / (inv[0] * x - inv[1] * y);
            (alpha * x, alpha * y)
        };

        let zip = Zip::from(range_offset)
            .and(&self.inverse)
            .and(&self.direction)
            .and(ux)
            .and(uy);

        #[cfg(feature = "parallel")]
        let projected = zip.par_map_collect(kernel);
        #[cfg(not(feature = "parallel"))]
        let projected = zip.map_collect(kernel);

        (projected.mapv(|(x, _)| x), projected.mapv(|(_, y)| y))
    }
}

/// Whether a flow vector has enough range sensitivity to be projected
///
/// False when the angle between the flow vector and the range direction lies
/// within `threshold` radians of perpendicular.
pub fn is_observable(ux: f32, uy: f32, range_x: f32, range_y: f32, threshold: f32) -> bool {
    let cos = (ux * range_x + uy * range_y)
        / ((ux * ux + uy * uy).sqrt() * (range_x * range_x + range_y * range_y).sqrt());
    let angle = cos.clamp(-1.0, 1.0).acos();
    // NaN geometry never compares below the threshold
    !((angle - FRAC_PI_2).abs() < threshold)
}
