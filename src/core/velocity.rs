use crate::core::error_model::{magnitude_error, ErrorModel, LinearErrorTerm};
use crate::core::flow_projection::RangeProjector;
use crate::core::stable_surface::StableSurface;
use crate::types::{MaskRaster, PairType, Raster, SarError, SarResult, VELOCITY_NO_DATA};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Numerical constants for velocity derivation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityParams {
    /// Stable-surface values at or beyond this magnitude (m/yr) are outliers
    pub outlier_cutoff: f64,
    /// Minimum angular distance (radians) from perpendicular-to-range for a projection
    pub angle_threshold: f32,
    /// Seconds per year used to annualize offsets
    pub seconds_per_year: f64,
}

impl Default for VelocityParams {
    fn default() -> Self {
        Self {
            outlier_cutoff: 500.0,
            angle_threshold: 0.75,
            seconds_per_year: 365.0 * 24.0 * 3600.0,
        }
    }
}

/// Scalar geometry of the image pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairGeometry {
    /// Range (or x) pixel size in metres
    pub range_pixel_size: f64,
    /// Azimuth (or y) pixel size in metres
    pub azimuth_pixel_size: f64,
    /// Temporal baseline in seconds
    pub dt: f64,
    /// Temporal baseline in days
    pub date_dt: f64,
    /// Mean range offset removed upstream over stable surfaces (pixels)
    pub dx_mean_shift: f64,
    /// Mean azimuth offset removed upstream over stable surfaces (pixels)
    pub dy_mean_shift: f64,
}

/// Per-pixel offset-to-velocity calibration coefficients
#[derive(Debug, Clone)]
pub struct OffsetCalibration {
    pub offset2vx_1: Raster,
    pub offset2vx_2: Raster,
    pub offset2vy_1: Raster,
    pub offset2vy_2: Raster,
}

/// Rasters only present for radar-geometry pairs
#[derive(Debug, Clone)]
pub struct RadarFields {
    /// Range pixel offsets
    pub dx: Raster,
    /// Azimuth pixel offsets
    pub dy: Raster,
    /// Slope-parallel flow direction
    pub sx: Raster,
    pub sy: Raster,
    /// Reference flow velocity
    pub vx_ref: Raster,
    pub vy_ref: Raster,
    /// True where the reference-flow projection is preferred
    pub mode_mask: MaskRaster,
}

/// Complete input set for one image pair
#[derive(Debug, Clone)]
pub struct VelocityInputs {
    pub pair_type: PairType,
    pub vx: Raster,
    pub vy: Raster,
    pub stable_surface: MaskRaster,
    pub chip_size_x: Raster,
    pub chip_size_y: Raster,
    pub interp_mask: Array2<i32>,
    pub calibration: OffsetCalibration,
    pub radar: Option<RadarFields>,
    pub geometry: PairGeometry,
    pub error_model: ErrorModel,
}

impl VelocityInputs {
    pub fn dim(&self) -> (usize, usize) {
        self.vx.dim()
    }

    /// Check required fields and grid shapes
    pub fn validate(&self) -> SarResult<()> {
        let expected = self.dim();
        let mut shapes = vec![
            ("vy", self.vy.dim()),
            ("stable_surface", self.stable_surface.dim()),
            ("chip_size_x", self.chip_size_x.dim()),
            ("chip_size_y", self.chip_size_y.dim()),
            ("interp_mask", self.interp_mask.dim()),
            ("offset2vx_1", self.calibration.offset2vx_1.dim()),
            ("offset2vx_2", self.calibration.offset2vx_2.dim()),
            ("offset2vy_1", self.calibration.offset2vy_1.dim()),
            ("offset2vy_2", self.calibration.offset2vy_2.dim()),
        ];

        match (self.pair_type, &self.radar) {
            (PairType::Radar, None) => {
                return Err(SarError::Configuration(
                    "Missing required radar input fields (dx, dy, sx, sy, vx_ref, vy_ref, mode_mask) for radar pair"
                        .to_string(),
                ));
            }
            (PairType::Radar, Some(radar)) => {
                shapes.extend([
                    ("dx", radar.dx.dim()),
                    ("dy", radar.dy.dim()),
                    ("sx", radar.sx.dim()),
                    ("sy", radar.sy.dim()),
                    ("vx_ref", radar.vx_ref.dim()),
                    ("vy_ref", radar.vy_ref.dim()),
                    ("mode_mask", radar.mode_mask.dim()),
                ]);
            }
            (PairType::Optical, _) => {}
        }

        for (name, actual) in shapes {
            if actual != expected {
                return Err(SarError::ShapeMismatch {
                    name: name.to_string(),
                    expected,
                    actual,
                });
            }
        }

        if self.pair_type.is_radar() && self.geometry.dt == 0.0 {
            return Err(SarError::Configuration(
                "Temporal baseline dt must be non-zero for a radar pair".to_string(),
            ));
        }
        Ok(())
    }
}

/// A derived velocity component with its stable-surface correction and error
#[derive(Debug, Clone)]
pub struct Component {
    pub values: Raster,
    /// Bias estimated over stable surfaces (m/yr)
    pub stable_shift: f64,
    /// Component error (m/yr)
    pub error: f64,
}

/// Range/azimuth and flow-projected variables of a radar pair
#[derive(Debug, Clone)]
pub struct RadarProduct {
    pub vr: Component,
    pub va: Component,
    pub vxp: Component,
    pub vyp: Component,
    pub vp: Raster,
    pub vp_error: Raster,
    /// Stable pixels with a valid projected estimate
    pub stable_count_p: usize,
}

/// Everything the grid product writer needs for one pair
#[derive(Debug, Clone)]
pub struct VelocityProduct {
    pub pair_type: PairType,
    pub vx: Component,
    pub vy: Component,
    pub v: Raster,
    pub v_error: Raster,
    pub radar: Option<RadarProduct>,
    /// Chip sizes in metres
    pub chip_size_width: Raster,
    pub chip_size_height: Raster,
    pub interp_mask: Array2<i32>,
    pub stable_count: usize,
    pub stable_shift_applied: bool,
    pub geometry: PairGeometry,
}

impl VelocityProduct {
    pub fn dim(&self) -> (usize, usize) {
        self.vx.values.dim()
    }
}

/// Velocity derivation engine
pub struct VelocityDeriver {
    params: VelocityParams,
}

impl VelocityDeriver {
    pub fn new(params: VelocityParams) -> Self {
        Self { params }
    }

    /// Engine with the standard product constants
    pub fn standard() -> Self {
        Self::new(VelocityParams::default())
    }

    pub fn params(&self) -> &VelocityParams {
        &self.params
    }

    /// Derive all velocity rasters, corrections and errors for one pair
    pub fn derive(&self, inputs: &VelocityInputs) -> SarResult<VelocityProduct> {
        inputs.validate()?;
        let (rows, cols) = inputs.dim();
        log::info!("Deriving {} pair velocities on a {}x{} grid", inputs.pair_type, rows, cols);

        let stable = StableSurface::new(&inputs.stable_surface, self.params.outlier_cutoff);
        let stable_count = stable.count_defined(&inputs.vx);
        let stable_shift_applied = stable_count > 0;
        if stable_shift_applied {
            log::debug!("{} stable-surface pixels available", stable_count);
        } else {
            log::warn!("No stable surface available, falling back to the error model");
        }

        let (vx_shift, vy_shift) = if stable_shift_applied {
            self.predicted_shifts(inputs, &stable)
        } else {
            (0.0, 0.0)
        };
        log::debug!("Stable shift: vx = {:.3}, vy = {:.3}", vx_shift, vy_shift);

        let date_dt = inputs.geometry.date_dt;
        let model = &inputs.error_model;
        let vx_error = self.component_error(stable_shift_applied, &stable, &inputs.vx, &model.vx, date_dt)?;
        let vy_error = self.component_error(stable_shift_applied, &stable, &inputs.vy, &model.vy, date_dt)?;

        let v = magnitude(&inputs.vx, &inputs.vy);
        let v_error = magnitude_error(&inputs.vx, &inputs.vy, vx_error, vy_error);

        let radar = match (inputs.pair_type, &inputs.radar) {
            (PairType::Radar, Some(fields)) => Some(self.derive_radar(
                inputs,
                fields,
                &stable,
                stable_shift_applied,
                (vx_shift, vy_shift),
                &v_error,
            )?),
            _ => None,
        };

        let geometry = inputs.geometry;
        let range_size = geometry.range_pixel_size as f32;
        let azimuth_size = geometry.azimuth_pixel_size as f32;
        let chip_size_width = inputs.chip_size_x.mapv(|c| c * range_size);
        let chip_size_height = inputs.chip_size_y.mapv(|c| c * azimuth_size);

        let mut product = VelocityProduct {
            pair_type: inputs.pair_type,
            vx: Component {
                values: inputs.vx.clone(),
                stable_shift: vx_shift,
                error: vx_error,
            },
            vy: Component {
                values: inputs.vy.clone(),
                stable_shift: vy_shift,
                error: vy_error,
            },
            v,
            v_error,
            radar,
            chip_size_width,
            chip_size_height,
            interp_mask: inputs.interp_mask.clone(),
            stable_count,
            stable_shift_applied,
            geometry,
        };

        let no_data = no_data_mask(&inputs.vx, &inputs.vy);
        self.apply_no_data(&mut product, &no_data);

        log::info!("Velocity derivation completed");
        Ok(product)
    }

    /// Stable-surface median of the velocity implied by the upstream mean offsets
    fn predicted_shifts(&self, inputs: &VelocityInputs, stable: &StableSurface) -> (f64, f64) {
        let cal = &inputs.calibration;
        let dxm = inputs.geometry.dx_mean_shift as f32;
        let dym = inputs.geometry.dy_mean_shift as f32;

        let vx_predicted = Zip::from(&cal.offset2vx_1)
            .and(&cal.offset2vx_2)
            .map_collect(|&c1, &c2| c1 * dxm + c2 * dym);
        let vy_predicted = Zip::from(&cal.offset2vy_1)
            .and(&cal.offset2vy_2)
            .map_collect(|&c1, &c2| c1 * dxm + c2 * dym);

        (
            self.shift_or_zero(stable, &vx_predicted, "vx"),
            self.shift_or_zero(stable, &vy_predicted, "vy"),
        )
    }

    fn shift_or_zero(&self, stable: &StableSurface, field: &Raster, name: &str) -> f64 {
        stable.median(field).unwrap_or_else(|| {
            log::warn!("All stable-surface {} values are outliers, no shift estimated", name);
            0.0
        })
    }

    /// Stable-surface spread when available, otherwise the linear error model
    fn component_error(
        &self,
        use_stable: bool,
        stable: &StableSurface,
        field: &Raster,
        term: &LinearErrorTerm,
        date_dt: f64,
    ) -> SarResult<f64> {
        if use_stable {
            if let Some(sd) = stable.std_dev(field) {
                return Ok(sd);
            }
        }
        if date_dt == 0.0 {
            return Err(SarError::Configuration(
                "Temporal baseline date_dt must be non-zero for the error-model fallback".to_string(),
            ));
        }
        Ok(term.annual_rate(date_dt))
    }

    fn derive_radar(
        &self,
        inputs: &VelocityInputs,
        fields: &RadarFields,
        stable: &StableSurface,
        stable_shift_applied: bool,
        (vx_shift, vy_shift): (f64, f64),
        v_error: &Raster,
    ) -> SarResult<RadarProduct> {
        let geometry = &inputs.geometry;
        let model = &inputs.error_model;
        let date_dt = geometry.date_dt;
        let year = self.params.seconds_per_year;

        // Range/azimuth velocities; azimuth offsets are positive against the y axis
        let range_scale = geometry.range_pixel_size / geometry.dt * year;
        let azimuth_scale = -geometry.azimuth_pixel_size / geometry.dt * year;
        let vr = fields.dx.mapv(|d| (d as f64 * range_scale) as f32);
        let va = fields.dy.mapv(|d| (d as f64 * azimuth_scale) as f32);
        let (vr_shift, va_shift) = if stable_shift_applied {
            (geometry.dx_mean_shift * range_scale, geometry.dy_mean_shift * azimuth_scale)
        } else {
            (0.0, 0.0)
        };
        let vr_error = self.component_error(stable_shift_applied, stable, &vr, &model.vr, date_dt)?;
        let va_error = self.component_error(stable_shift_applied, stable, &va, &model.va, date_dt)?;

        let cal = &inputs.calibration;
        let projector = RangeProjector::new(
            &cal.offset2vx_1,
            &cal.offset2vx_2,
            &cal.offset2vy_1,
            &cal.offset2vy_2,
            self.params.angle_threshold,
        );
        let downslope_x = fields.sx.mapv(|s| -s);
        let downslope_y = fields.sy.mapv(|s| -s);
        let (vx_slope, vy_slope) = projector.project(&fields.dx, &downslope_x, &downslope_y);
        let (vx_refp, vy_refp) = projector.project(&fields.dx, &fields.vx_ref, &fields.vy_ref);

        let vxp = select(&fields.mode_mask, &vx_refp, &vx_slope);
        let vyp = select(&fields.mode_mask, &vy_refp, &vy_slope);

        let stable_count_p = stable.count_defined(&vxp);
        let projected_applied = stable_count_p > 0;
        let (vxp_shift, vyp_shift) = if projected_applied {
            let bias_x = self.shift_or_zero(stable, &(&vxp - &inputs.vx), "vxp");
            let bias_y = self.shift_or_zero(stable, &(&vyp - &inputs.vy), "vyp");
            (vx_shift + bias_x / 2.0, vy_shift + bias_y / 2.0)
        } else {
            log::warn!("No stable surface with a valid projected velocity");
            (0.0, 0.0)
        };

        let vxp_error = self.component_error(projected_applied, stable, &vxp, &model.vxp, date_dt)?;
        let vyp_error = self.component_error(projected_applied, stable, &vyp, &model.vyp, date_dt)?;
        let projected_error = magnitude_error(&vxp, &vyp, vxp_error, vyp_error);

        // Keep the direct estimate unless the projected one has the smaller error
        let use_projected = Zip::from(v_error)
            .and(&projected_error)
            .map_collect(|&direct, &projected| direct > projected);
        let fused_x = select(&use_projected, &vxp, &inputs.vx);
        let fused_y = select(&use_projected, &vyp, &inputs.vy);
        log::debug!(
            "Projected estimate selected for {} pixels",
            use_projected.iter().filter(|&&p| p).count()
        );

        let vxp_error = self.component_error(stable_shift_applied, stable, &fused_x, &model.vxp, date_dt)?;
        let vyp_error = self.component_error(stable_shift_applied, stable, &fused_y, &model.vyp, date_dt)?;
        let vp = magnitude(&fused_x, &fused_y);
        let vp_error = magnitude_error(&fused_x, &fused_y, vxp_error, vyp_error);

        Ok(RadarProduct {
            vr: Component {
                values: vr,
                stable_shift: vr_shift,
                error: vr_error,
            },
            va: Component {
                values: va,
                stable_shift: va_shift,
                error: va_error,
            },
            vxp: Component {
                values: fused_x,
                stable_shift: vxp_shift,
                error: vxp_error,
            },
            vyp: Component {
                values: fused_y,
                stable_shift: vyp_shift,
                error: vyp_error,
            },
            vp,
            vp_error,
            stable_count_p,
        })
    }

    fn apply_no_data(&self, product: &mut VelocityProduct, no_data: &MaskRaster) {
        let fill = VELOCITY_NO_DATA as f32;
        let masked = no_data.iter().filter(|&&m| m).count();
        if masked > 0 {
            log::debug!("Masking {} no-data pixels", masked);
        }

        fill_where(&mut product.vx.values, no_data, fill);
        fill_where(&mut product.vy.values, no_data, fill);
        fill_where(&mut product.v, no_data, fill);
        fill_where(&mut product.v_error, no_data, fill);
        if let Some(radar) = product.radar.as_mut() {
            fill_where(&mut radar.vr.values, no_data, fill);
            fill_where(&mut radar.va.values, no_data, fill);
            fill_where(&mut radar.vxp.values, no_data, fill);
            fill_where(&mut radar.vyp.values, no_data, fill);
            fill_where(&mut radar.vp, no_data, fill);
            fill_where(&mut radar.vp_error, no_data, fill);
        }
        fill_where(&mut product.chip_size_width, no_data, 0.0);
        fill_where(&mut product.chip_size_height, no_data, 0.0);
        fill_where(&mut product.interp_mask, no_data, 0);
    }
}

/// Pixels where either velocity component is undefined
pub fn no_data_mask(vx: &Raster, vy: &Raster) -> MaskRaster {
    Zip::from(vx)
        .and(vy)
        .map_collect(|x, y| x.is_nan() || y.is_nan())
}

pub fn magnitude(x: &Raster, y: &Raster) -> Raster {
    Zip::from(x).and(y).map_collect(|&a, &b| (a * a + b * b).sqrt())
}

/// Elementwise `mask ? if_true : if_false`
pub fn select(mask: &MaskRaster, if_true: &Raster, if_false: &Raster) -> Raster {
    Zip::from(mask)
        .and(if_true)
        .and(if_false)
        .map_collect(|&m, &t, &f| if m { t } else { f })
}

fn fill_where<T: Copy>(field: &mut Array2<T>, mask: &MaskRaster, fill: T) {
    Zip::from(field).and(mask).for_each(|value, &m| {
        if m {
            *value = fill;
        }
    });
}
