use crate::types::SarResult;
use std::path::{Path, PathBuf};

/// Product-level files handed to the packaging stage, besides the NetCDF product
pub const PRODUCT_LIST: [&str; 14] = [
    "offset.tif",
    "velocity.tif",
    "velocity_browse.tif",
    "velocity_browse.kmz",
    "velocity_browse.png",
    "velocity_browse.png.aux.xml",
    "window_chip_size_max.tif",
    "window_chip_size_min.tif",
    "window_location.tif",
    "window_offset.tif",
    "window_rdr_off2vel_x_vec.tif",
    "window_rdr_off2vel_y_vec.tif",
    "window_search_range.tif",
    "window_stable_surface_mask.tif",
];

/// Copy the listed products and every `*.nc` file from `work_dir` into `product_dir`
///
/// Returns the copied destination paths. A missing listed product is an error.
pub fn collect_products<P: AsRef<Path>, Q: AsRef<Path>>(
    work_dir: P,
    product_dir: Q,
) -> SarResult<Vec<PathBuf>> {
    let work_dir = work_dir.as_ref();
    let product_dir = product_dir.as_ref();
    log::info!("Collecting products into {}", product_dir.display());

    std::fs::create_dir_all(product_dir)?;

    let mut sources: Vec<PathBuf> = PRODUCT_LIST.iter().map(|name| work_dir.join(name)).collect();
    let mut netcdf_files = Vec::new();
    for entry in std::fs::read_dir(work_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "nc") {
            netcdf_files.push(path);
        }
    }
    netcdf_files.sort();
    sources.extend(netcdf_files);

    let mut copied = Vec::with_capacity(sources.len());
    for source in sources {
        // Every source path was built from a file name
        let Some(name) = source.file_name() else {
            continue;
        };
        let destination = product_dir.join(name);
        std::fs::copy(&source, &destination)?;
        log::debug!("Copied {}", destination.display());
        copied.push(destination);
    }

    Ok(copied)
}
