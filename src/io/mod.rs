//! I/O modules for reading input rasters and writing velocity products

pub mod raster;
pub mod encoding;
pub mod grid_mapping;
pub mod netcdf_writer;
pub mod browse;
pub mod product;

pub use raster::RasterReader;
pub use grid_mapping::{CrsDescription, GridMapping, ProjectionFamily};
pub use netcdf_writer::{GridProductWriter, WriterOptions, package_velocity_product};
pub use product::{PRODUCT_LIST, collect_products};
