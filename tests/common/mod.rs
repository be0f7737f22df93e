#![allow(dead_code)]

use ndarray::Array2;
use sarvel::core::{ErrorModel, OffsetCalibration, PairGeometry, RadarFields, VelocityInputs};
use sarvel::io::CrsDescription;
use sarvel::{GeoTransform, PairInfo, PairType};

pub const YEAR_SECONDS: f64 = 365.0 * 24.0 * 3600.0;

pub fn geometry() -> PairGeometry {
    PairGeometry {
        range_pixel_size: 2.3,
        azimuth_pixel_size: 14.0,
        dt: 12.0 * 24.0 * 3600.0,
        date_dt: 12.0,
        dx_mean_shift: 0.0,
        dy_mean_shift: 0.0,
    }
}

/// Identity offset-to-velocity calibration
pub fn calibration(shape: (usize, usize)) -> OffsetCalibration {
    OffsetCalibration {
        offset2vx_1: Array2::ones(shape),
        offset2vx_2: Array2::zeros(shape),
        offset2vy_1: Array2::zeros(shape),
        offset2vy_2: Array2::ones(shape),
    }
}

pub fn optical_inputs(shape: (usize, usize)) -> VelocityInputs {
    let (_, cols) = shape;
    let vx = Array2::from_shape_fn(shape, |(i, j)| (i * cols + j) as f32 * 3.0 + 0.4);
    let vy = Array2::from_shape_fn(shape, |(i, _)| -(i as f32) * 2.0 - 1.0);

    VelocityInputs {
        pair_type: PairType::Optical,
        vx,
        vy,
        stable_surface: Array2::from_shape_fn(shape, |(i, _)| i == 0),
        chip_size_x: Array2::from_elem(shape, 32.0),
        chip_size_y: Array2::from_elem(shape, 16.0),
        interp_mask: Array2::from_shape_fn(shape, |(_, j)| (j % 2) as i32),
        calibration: calibration(shape),
        radar: None,
        geometry: geometry(),
        error_model: ErrorModel::from_optical(1.5, 2.5),
    }
}

pub fn radar_inputs(shape: (usize, usize)) -> VelocityInputs {
    let mut inputs = optical_inputs(shape);
    inputs.pair_type = PairType::Radar;
    inputs.radar = Some(RadarFields {
        dx: Array2::from_shape_fn(shape, |(i, j)| 0.1 * (i + j) as f32),
        dy: Array2::from_elem(shape, -0.05),
        sx: Array2::from_shape_fn(shape, |(_, j)| if j == 0 { 0.0 } else { -1.0 }),
        sy: Array2::from_elem(shape, 0.0),
        vx_ref: Array2::from_elem(shape, 100.0),
        vy_ref: Array2::from_elem(shape, 20.0),
        mode_mask: Array2::from_shape_fn(shape, |(i, _)| i % 2 == 1),
    });
    inputs.error_model = ErrorModel::from_radar_table([
        [0.1, 0.1, 0.05, 0.2, 0.3, 0.3],
        [5.0, 5.0, 2.0, 8.0, 10.0, 10.0],
    ]);
    inputs
}

pub fn polar_stereographic_crs() -> CrsDescription {
    CrsDescription {
        projection: "Polar_Stereographic".to_string(),
        central_meridian: -45.0,
        false_easting: 0.0,
        false_northing: 0.0,
        latitude_of_origin: 70.0,
        semi_major_axis: 6378137.0,
        inverse_flattening: 298.257223563,
        wkt: "PROJCS[\"WGS 84 / NSIDC Sea Ice Polar Stereographic North\"]".to_string(),
        proj4: "+proj=stere +lat_0=90 +lat_ts=70 +lon_0=-45 +k=1 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs".to_string(),
        epsg: 3413,
    }
}

pub fn utm_crs() -> CrsDescription {
    CrsDescription {
        projection: "Transverse_Mercator".to_string(),
        central_meridian: -141.0,
        false_easting: 500000.0,
        false_northing: 0.0,
        latitude_of_origin: 0.0,
        semi_major_axis: 6378137.0,
        inverse_flattening: 298.257223563,
        wkt: "PROJCS[\"WGS 84 / UTM zone 7N\"]".to_string(),
        proj4: "+proj=utm +zone=7 +datum=WGS84 +units=m +no_defs".to_string(),
        epsg: 32607,
    }
}

pub fn geo_transform() -> GeoTransform {
    GeoTransform::from_gdal([-150000.0, 240.0, 0.0, -2100000.0, 0.0, -240.0])
}

pub fn pair_info() -> PairInfo {
    let mut info = PairInfo::new();
    info.insert("mission_img1", "S");
    info.insert("satellite_img1", "1A");
    info.insert("absolute_orbit_number_img1", "030639");
    info.insert("roi_valid_percentage", 87.5);
    info.insert("autoRIFT_software_version", "1.0.8");
    info.set_acquisition_dates("20200103", "20200115").unwrap();
    info
}
