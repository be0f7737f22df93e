//! sarvel: ice-surface velocity products from SAR and optical image pairs
//!
//! Converts feature-tracking offsets and calibration rasters into velocity
//! fields with stable-surface bias correction, error estimates and (for radar
//! pairs) flow-projected estimates, and packages them as CF-1.6 NetCDF.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    GeoTransform, MaskRaster, PairInfo, PairInfoValue, PairType, Raster, SarError, SarResult,
    VELOCITY_NO_DATA,
};

pub use core::{ErrorModel, VelocityDeriver, VelocityInputs, VelocityParams, VelocityProduct};
pub use io::{package_velocity_product, CrsDescription, GridProductWriter, RasterReader};

#[cfg(feature = "python")]
mod python {
    use crate::core::{
        ErrorModel, OffsetCalibration, PairGeometry, RadarFields, VelocityDeriver, VelocityInputs,
    };
    use crate::io::browse::write_browse_from_velocity;
    use crate::io::{package_velocity_product, CrsDescription, GridProductWriter, WriterOptions};
    use crate::types::{GeoTransform, PairInfo, PairType, SarError};
    use numpy::PyReadonlyArray2;
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::{PyDict, PyFloat};

    /// Convert PyReadonlyArray2 to ndarray Array2
    fn numpy_to_array2<T>(arr: PyReadonlyArray2<T>) -> ndarray::Array2<T>
    where
        T: Copy + numpy::Element,
    {
        arr.as_array().to_owned()
    }

    fn to_py_err(e: SarError) -> PyErr {
        match e {
            SarError::Configuration(_) | SarError::ShapeMismatch { .. } => {
                PyValueError::new_err(e.to_string())
            }
            _ => PyRuntimeError::new_err(e.to_string()),
        }
    }

    fn required<'py>(dict: &'py PyDict, name: &str) -> PyResult<&'py PyAny> {
        dict.get_item(name)?
            .ok_or_else(|| PyValueError::new_err(format!("Missing required field: {}", name)))
    }

    fn raster(fields: &PyDict, name: &str) -> PyResult<ndarray::Array2<f32>> {
        Ok(numpy_to_array2(required(fields, name)?.extract::<PyReadonlyArray2<f32>>()?))
    }

    fn mask(fields: &PyDict, name: &str) -> PyResult<ndarray::Array2<bool>> {
        Ok(numpy_to_array2(required(fields, name)?.extract::<PyReadonlyArray2<bool>>()?))
    }

    fn scalar(scalars: &PyDict, name: &str) -> PyResult<f64> {
        required(scalars, name)?.extract::<f64>()
    }

    fn pair_info_from_dict(dict: &PyDict) -> PyResult<PairInfo> {
        let mut info = PairInfo::new();
        for (key, value) in dict.iter() {
            let key: String = key.extract()?;
            if let Ok(text) = value.extract::<String>() {
                info.insert(key, text);
            } else if value.is_instance_of::<PyFloat>() {
                info.insert(key, value.extract::<f64>()?);
            } else if let Ok(int) = value.extract::<i64>() {
                info.insert(key, int);
            } else {
                info.insert(key, value.extract::<f64>()?);
            }
        }
        Ok(info)
    }

    fn error_model(pair_type: PairType, table: Vec<Vec<f64>>) -> PyResult<ErrorModel> {
        match pair_type {
            PairType::Radar => {
                if table.len() != 2 || table.iter().any(|row| row.len() != 6) {
                    return Err(PyValueError::new_err("Radar error table must be 2x6"));
                }
                let mut rows = [[0.0; 6]; 2];
                for (dst, src) in rows.iter_mut().zip(&table) {
                    dst.copy_from_slice(src);
                }
                Ok(ErrorModel::from_radar_table(rows))
            }
            PairType::Optical => match table.concat().as_slice() {
                [vx, vy] => Ok(ErrorModel::from_optical(*vx, *vy)),
                _ => Err(PyValueError::new_err("Optical error table must have 2 entries")),
            },
        }
    }

    /// Derive velocities and write the NetCDF product; returns a summary dict
    #[pyfunction]
    #[allow(clippy::too_many_arguments)]
    fn write_velocity_netcdf(
        py: Python,
        fields: &PyDict,
        scalars: &PyDict,
        pair_info: &PyDict,
        error_table: Vec<Vec<f64>>,
        pair_type: &str,
        wkt: &str,
        epsg: u32,
        geo_transform: [f64; 6],
        output_path: String,
        detection_method: String,
        coordinates: String,
    ) -> PyResult<PyObject> {
        let pair_type: PairType = pair_type.parse().map_err(to_py_err)?;
        let pair_info = pair_info_from_dict(pair_info)?;
        let date_dt = pair_info.date_dt().map_err(to_py_err)?;

        let radar = if pair_type.is_radar() {
            Some(RadarFields {
                dx: raster(fields, "dx")?,
                dy: raster(fields, "dy")?,
                sx: raster(fields, "sx")?,
                sy: raster(fields, "sy")?,
                vx_ref: raster(fields, "vx_ref")?,
                vy_ref: raster(fields, "vy_ref")?,
                mode_mask: mask(fields, "mode_mask")?,
            })
        } else {
            None
        };

        let inputs = VelocityInputs {
            pair_type,
            vx: raster(fields, "vx")?,
            vy: raster(fields, "vy")?,
            stable_surface: mask(fields, "stable_surface")?,
            chip_size_x: raster(fields, "chip_size_x")?,
            chip_size_y: raster(fields, "chip_size_y")?,
            interp_mask: raster(fields, "interp_mask")?.mapv(|v| v as i32),
            calibration: OffsetCalibration {
                offset2vx_1: raster(fields, "offset2vx_1")?,
                offset2vx_2: raster(fields, "offset2vx_2")?,
                offset2vy_1: raster(fields, "offset2vy_1")?,
                offset2vy_2: raster(fields, "offset2vy_2")?,
            },
            radar,
            geometry: PairGeometry {
                range_pixel_size: scalar(scalars, "range_pixel_size")?,
                azimuth_pixel_size: scalar(scalars, "azimuth_pixel_size")?,
                dt: scalar(scalars, "dt")?,
                date_dt,
                dx_mean_shift: scalar(scalars, "dx_mean_shift")?,
                dy_mean_shift: scalar(scalars, "dy_mean_shift")?,
            },
            error_model: error_model(pair_type, error_table)?,
        };

        let crs = CrsDescription::from_wkt(wkt, epsg).map_err(to_py_err)?;
        let writer = GridProductWriter::new(WriterOptions {
            detection_method,
            coordinates,
            ..WriterOptions::default()
        });

        let product = package_velocity_product(
            &VelocityDeriver::standard(),
            &writer,
            &inputs,
            &crs,
            &GeoTransform::from_gdal(geo_transform),
            &pair_info,
            &output_path,
        )
        .map_err(to_py_err)?;

        let summary = PyDict::new(py);
        summary.set_item("stable_count", product.stable_count)?;
        summary.set_item("stable_shift_applied", product.stable_shift_applied)?;
        summary.set_item("vx_error", product.vx.error)?;
        summary.set_item("vy_error", product.vy.error)?;
        summary.set_item("vx_stable_shift", product.vx.stable_shift)?;
        summary.set_item("vy_stable_shift", product.vy.stable_shift)?;
        Ok(summary.into())
    }

    /// Write the byte-scaled browse GeoTIFF for a two-band velocity raster
    #[pyfunction]
    fn make_browse(velocity_tif: String, browse_tif: String) -> PyResult<()> {
        write_browse_from_velocity(&velocity_tif, &browse_tif).map_err(to_py_err)
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(write_velocity_netcdf, m)?)?;
        m.add_function(wrap_pyfunction!(make_browse, m)?)?;
        Ok(())
    }
}
