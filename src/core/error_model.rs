use crate::types::Raster;
use ndarray::Zip;
use serde::{Deserialize, Serialize};

/// Linear error model for one velocity component
///
/// The displacement error over the pair is `per_day * date_dt + intercept`
/// (metres); dividing by the baseline and scaling by 365 gives m/yr.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearErrorTerm {
    pub per_day: f64,
    pub intercept: f64,
}

impl LinearErrorTerm {
    pub fn new(per_day: f64, intercept: f64) -> Self {
        Self { per_day, intercept }
    }

    /// Baseline-independent error (optical pairs)
    pub fn constant(error: f64) -> Self {
        Self::new(0.0, error)
    }

    /// Annualized error for a temporal baseline of `date_dt` days
    pub fn annual_rate(&self, date_dt: f64) -> f64 {
        (self.per_day * date_dt + self.intercept) / date_dt * 365.0
    }
}

/// Fallback per-component error coefficients used when no stable surface exists
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorModel {
    pub vx: LinearErrorTerm,
    pub vy: LinearErrorTerm,
    pub vr: LinearErrorTerm,
    pub va: LinearErrorTerm,
    pub vxp: LinearErrorTerm,
    pub vyp: LinearErrorTerm,
}

impl ErrorModel {
    /// Build from the two-row coefficient table used by the radar workflow
    ///
    /// Row 0 holds per-day slopes and row 1 intercepts, columns ordered
    /// vx, vy, vr, va, vxp, vyp.
    pub fn from_radar_table(table: [[f64; 6]; 2]) -> Self {
        let term = |i: usize| LinearErrorTerm::new(table[0][i], table[1][i]);
        Self {
            vx: term(0),
            vy: term(1),
            vr: term(2),
            va: term(3),
            vxp: term(4),
            vyp: term(5),
        }
    }

    /// Optical pairs only carry a constant x/y displacement error
    pub fn from_optical(vx_error: f64, vy_error: f64) -> Self {
        Self {
            vx: LinearErrorTerm::constant(vx_error),
            vy: LinearErrorTerm::constant(vy_error),
            ..Self::default()
        }
    }
}

/// Per-pixel magnitude error from uncorrelated component errors
///
/// `sqrt((ex * vx / v)^2 + (ey * vy / v)^2)`; undefined (NaN) where v is zero.
pub fn magnitude_error(vx: &Raster, vy: &Raster, vx_error: f64, vy_error: f64) -> Raster {
    let ex = vx_error as f32;
    let ey = vy_error as f32;
    Zip::from(vx).and(vy).map_collect(|&x, &y| {
        let v = (x * x + y * y).sqrt();
        ((ex * x / v).powi(2) + (ey * y / v).powi(2)).sqrt()
    })
}
