use crate::types::{GeoTransform, MaskRaster, Raster, SarError, SarResult};
use gdal::Dataset;
use ndarray::Array2;
use std::path::Path;

/// GeoTIFF reader for the offset, calibration and mask rasters
pub struct RasterReader;

impl RasterReader {
    /// Read one band as `f32`
    pub fn read_band<P: AsRef<Path>>(path: P, band: isize) -> SarResult<Raster> {
        log::debug!("Reading band {} of {}", band, path.as_ref().display());
        let dataset = Dataset::open(path.as_ref())?;
        Self::read_dataset_band(&dataset, band)
    }

    /// Read the first two bands (x, y) of a two-band raster
    pub fn read_vector<P: AsRef<Path>>(path: P) -> SarResult<(Raster, Raster)> {
        log::debug!("Reading vector raster {}", path.as_ref().display());
        let dataset = Dataset::open(path.as_ref())?;
        if dataset.raster_count() < 2 {
            return Err(SarError::InvalidFormat(format!(
                "{} has {} band(s), expected 2",
                path.as_ref().display(),
                dataset.raster_count()
            )));
        }
        Ok((
            Self::read_dataset_band(&dataset, 1)?,
            Self::read_dataset_band(&dataset, 2)?,
        ))
    }

    /// Read one band as a boolean mask (non-zero and defined is true)
    pub fn read_mask<P: AsRef<Path>>(path: P, band: isize) -> SarResult<MaskRaster> {
        Ok(Self::read_band(path, band)?.mapv(|v| v != 0.0 && !v.is_nan()))
    }

    /// Geotransform and WKT spatial reference of a raster
    pub fn read_georeference<P: AsRef<Path>>(path: P) -> SarResult<(GeoTransform, String)> {
        let dataset = Dataset::open(path.as_ref())?;
        let geo_transform = GeoTransform::from_gdal(dataset.geo_transform()?);
        let wkt = dataset.spatial_ref()?.to_wkt()?;
        Ok((geo_transform, wkt))
    }

    fn read_dataset_band(dataset: &Dataset, band: isize) -> SarResult<Raster> {
        let (width, height) = dataset.raster_size();
        let rasterband = dataset.rasterband(band)?;
        let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

        Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| SarError::Processing(format!("Failed to reshape band {}: {}", band, e)))
    }
}
