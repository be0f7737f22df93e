use crate::core::velocity::magnitude;
use crate::io::raster::RasterReader;
use crate::types::{GeoTransform, Raster, SarResult};
use gdal::raster::{Buffer, RasterCreationOption};
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use ndarray::Array2;
use std::path::Path;

/// Scale a velocity magnitude raster to bytes for browse imagery
///
/// Finite values are stretched linearly between their minimum and maximum
/// onto 1..=255; undefined values map to 0 (no-data).
pub fn scale_to_byte(magnitude: &Raster) -> Array2<u8> {
    let (min, max) = magnitude
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    magnitude.mapv(|v| {
        if !v.is_finite() {
            0
        } else if range <= 0.0 {
            1
        } else {
            (1.0 + (v - min) / range * 254.0).round() as u8
        }
    })
}

/// Write the browse GeoTIFF for a two-band (vx, vy) velocity raster
pub fn write_browse_from_velocity<P: AsRef<Path>, Q: AsRef<Path>>(
    velocity_tif: P,
    browse_tif: Q,
) -> SarResult<()> {
    let (vx, vy) = RasterReader::read_vector(&velocity_tif)?;
    let (geo_transform, wkt) = RasterReader::read_georeference(&velocity_tif)?;
    write_browse_geotiff(&magnitude(&vx, &vy), &geo_transform, &wkt, browse_tif)
}

/// Save a min/max-scaled magnitude as an LZW-compressed byte GeoTIFF
pub fn write_browse_geotiff<P: AsRef<Path>>(
    magnitude: &Raster,
    transform: &GeoTransform,
    wkt: &str,
    output_path: P,
) -> SarResult<()> {
    log::info!("Writing browse image: {}", output_path.as_ref().display());

    let scaled = scale_to_byte(magnitude);
    let (height, width) = scaled.dim();

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = [RasterCreationOption {
        key: "COMPRESS",
        value: "LZW",
    }];
    let mut dataset = driver.create_with_band_type_with_options::<u8, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
        &options,
    )?;

    dataset.set_geo_transform(&transform.north_up())?;
    dataset.set_spatial_ref(&SpatialRef::from_wkt(wkt)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<u8> = scaled.iter().cloned().collect();
    let buffer = Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;
    rasterband.set_no_data_value(Some(0.0))?;

    Ok(())
}
