use crate::core::velocity::{Component, VelocityDeriver, VelocityInputs, VelocityProduct};
use crate::io::encoding::{
    encode_chip_size, encode_mask, encode_velocity, round_tenth, CHIP_SIZE_FILL, MASK_FILL,
    VELOCITY_FILL,
};
use crate::io::grid_mapping::{CrsDescription, GridMapping};
use crate::types::{GeoTransform, PairInfo, PairInfoValue, PairType, Raster, SarError, SarResult};
use netcdf::{FileMut, VariableMut};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TITLE: &str = "autoRIFT surface velocities";
pub const AUTHOR: &str = "Alex S. Gardner, JPL/NASA; Yang Lei, GPS/Caltech";
pub const INSTITUTION: &str =
    "NASA Jet Propulsion Laboratory (JPL), California Institute of Technology";

const FLAG_STABLE_SHIFT_MEANINGS: &str = "flag for applying velocity bias correction over stable surfaces (stationary or slow-flowing surfaces with velocity < 15 m/yr): 0 = there is no stable surface available and no correction is applied; 1 = there are stable surfaces and velocity bias is corrected";

const PROJECTED_NOTE: &str = "determined by projecting radar range measurements onto an a priori flow vector. Where projected errors are larger than those determined from range and azimuth measurements, unprojected";

/// Product-level options for the NetCDF writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterOptions {
    /// `motion_detection_method` global attribute
    pub detection_method: String,
    /// `motion_coordinates` global attribute
    pub coordinates: String,
    /// Deflate level of the data variables
    pub deflate_level: i32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            detection_method: "feature".to_string(),
            coordinates: "map".to_string(),
            deflate_level: 2,
        }
    }
}

/// Row/column chunk shape: about 128 chunks of 8192 rows, capped at the image height
pub fn chunk_shape(rows: usize, cols: usize) -> [usize; 2] {
    if rows == 0 {
        return [0, cols];
    }
    let lines = 8192usize.div_ceil(rows) * 128;
    [lines.min(rows), cols]
}

/// Names and descriptive attributes of one data variable
struct VariableDescription<'a> {
    name: &'a str,
    standard_name: &'a str,
    description: String,
}

/// Writes a derived velocity product as a CF-1.6 NetCDF file
pub struct GridProductWriter {
    options: WriterOptions,
}

impl GridProductWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    pub fn standard() -> Self {
        Self::new(WriterOptions::default())
    }

    /// Write `product` to `output_path`
    ///
    /// The grid mapping is resolved before the file is created, so an
    /// unsupported projection leaves nothing on disk. Any failure while
    /// writing removes the partial file.
    pub fn write<P: AsRef<Path>>(
        &self,
        product: &VelocityProduct,
        crs: &CrsDescription,
        geo_transform: &GeoTransform,
        pair_info: &PairInfo,
        output_path: P,
    ) -> SarResult<()> {
        let output_path = output_path.as_ref();
        let mapping = GridMapping::from_crs(crs, geo_transform)?;

        let (rows, cols) = product.dim();
        if rows == 0 || cols == 0 {
            return Err(SarError::Processing(format!(
                "Cannot write an empty {}x{} product",
                rows, cols
            )));
        }

        log::info!("Writing velocity product: {}", output_path.display());
        if let Err(e) = self.write_file(product, &mapping, geo_transform, pair_info, output_path) {
            log::warn!("Removing partial product {}: {}", output_path.display(), e);
            if output_path.exists() {
                std::fs::remove_file(output_path)?;
            }
            return Err(e);
        }

        log::info!("Velocity product written successfully");
        Ok(())
    }

    fn write_file(
        &self,
        product: &VelocityProduct,
        mapping: &GridMapping,
        geo_transform: &GeoTransform,
        pair_info: &PairInfo,
        output_path: &Path,
    ) -> SarResult<()> {
        let mut file = netcdf::create(output_path)?;
        let (rows, cols) = product.dim();
        let chunk = chunk_shape(rows, cols);
        log::debug!("Chunk shape: {:?}", chunk);

        self.write_global_attributes(&mut file, product.pair_type)?;
        write_pair_info(&mut file, pair_info)?;
        write_coordinates(&mut file, geo_transform, rows, cols)?;

        {
            let mut var = file.add_variable::<u8>(mapping.variable_name(), &[])?;
            for (name, value) in mapping.attributes() {
                var.put_attribute(name, value)?;
            }
        }

        let radar = product.pair_type.is_radar();
        let source = if radar {
            " from radar range and azimuth measurements"
        } else {
            ""
        };
        let grid_mapping = mapping.variable_name();

        for (component, name, axis) in [(&product.vx, "vx", "x"), (&product.vy, "vy", "y")] {
            let desc = VariableDescription {
                name,
                standard_name: if axis == "x" { "x_velocity" } else { "y_velocity" },
                description: format!("velocity component in {} direction{}", axis, source),
            };
            self.write_component(&mut file, &desc, component, product, grid_mapping, chunk)?;
        }

        let desc = VariableDescription {
            name: "v",
            standard_name: "velocity",
            description: format!("velocity magnitude{}", source),
        };
        self.write_velocity(&mut file, &desc, &product.v, None, grid_mapping, chunk)?;

        let desc = VariableDescription {
            name: "v_error",
            standard_name: "velocity_error",
            description: format!("velocity magnitude error{}", source),
        };
        self.write_velocity(&mut file, &desc, &product.v_error, None, grid_mapping, chunk)?;

        if let Some(radar) = &product.radar {
            let desc = VariableDescription {
                name: "vr",
                standard_name: "range_velocity",
                description: "velocity in radar range direction".to_string(),
            };
            self.write_component(&mut file, &desc, &radar.vr, product, grid_mapping, chunk)?;

            let desc = VariableDescription {
                name: "va",
                standard_name: "azimuth_velocity",
                description: "velocity in radar azimuth direction".to_string(),
            };
            self.write_component(&mut file, &desc, &radar.va, product, grid_mapping, chunk)?;

            for (component, name, axis) in [(&radar.vxp, "vxp", "x"), (&radar.vyp, "vyp", "y")] {
                let desc = VariableDescription {
                    name,
                    standard_name: if axis == "x" {
                        "projected_x_velocity"
                    } else {
                        "projected_y_velocity"
                    },
                    description: format!(
                        "{}-direction velocity {} v{} estimates are used",
                        axis, PROJECTED_NOTE, axis
                    ),
                };
                self.write_component(&mut file, &desc, component, product, grid_mapping, chunk)?;
            }

            let desc = VariableDescription {
                name: "vp",
                standard_name: "projected_velocity",
                description: format!("velocity magnitude {} v estimates are used", PROJECTED_NOTE),
            };
            self.write_velocity(&mut file, &desc, &radar.vp, None, grid_mapping, chunk)?;

            let desc = VariableDescription {
                name: "vp_error",
                standard_name: "projected_velocity_error",
                description: format!(
                    "velocity magnitude error {} v_error estimates are used",
                    PROJECTED_NOTE
                ),
            };
            self.write_velocity(&mut file, &desc, &radar.vp_error, None, grid_mapping, chunk)?;
        }

        self.write_chip_sizes(&mut file, product, grid_mapping, chunk)?;
        self.write_interp_mask(&mut file, product, grid_mapping, chunk)?;

        Ok(())
    }

    fn write_global_attributes(&self, file: &mut FileMut, pair_type: PairType) -> SarResult<()> {
        let created = chrono::Local::now().format("%d-%b-%Y %H:%M:%S").to_string();

        file.add_attribute("GDAL_AREA_OR_POINT", "Area")?;
        file.add_attribute("Conventions", "CF-1.6")?;
        file.add_attribute("date_created", created.as_str())?;
        file.add_attribute("title", TITLE)?;
        file.add_attribute("author", AUTHOR)?;
        file.add_attribute("institution", INSTITUTION)?;
        file.add_attribute("scene_pair_type", pair_type.to_string().as_str())?;
        file.add_attribute("motion_detection_method", self.options.detection_method.as_str())?;
        file.add_attribute("motion_coordinates", self.options.coordinates.as_str())?;
        Ok(())
    }

    /// Velocity component with its stable-shift and error attributes
    fn write_component(
        &self,
        file: &mut FileMut,
        desc: &VariableDescription,
        component: &Component,
        product: &VelocityProduct,
        grid_mapping: &str,
        chunk: [usize; 2],
    ) -> SarResult<()> {
        let stats = ComponentAttributes {
            error: component.error,
            stable_shift: component.stable_shift,
            stable_count: product.stable_count,
            stable_shift_applied: product.stable_shift_applied,
        };
        self.write_velocity(file, desc, &component.values, Some(stats), grid_mapping, chunk)
    }

    fn write_velocity(
        &self,
        file: &mut FileMut,
        desc: &VariableDescription,
        values: &Raster,
        stats: Option<ComponentAttributes>,
        grid_mapping: &str,
        chunk: [usize; 2],
    ) -> SarResult<()> {
        let mut var = file.add_variable::<i16>(desc.name, &["y", "x"])?;
        self.configure_raster(&mut var, chunk)?;
        var.set_fill_value(VELOCITY_FILL)?;

        if let Some(stats) = stats {
            var.put_attribute(&format!("{}_error", desc.name), round_tenth(stats.error))?;
            var.put_attribute("stable_count", stats.stable_count as i64)?;
            var.put_attribute("stable_shift", round_tenth(stats.stable_shift))?;
            var.put_attribute("flag_stable_shift", stats.stable_shift_applied as i32)?;
            var.put_attribute("flag_stable_shift_meanings", FLAG_STABLE_SHIFT_MEANINGS)?;
        }
        put_descriptive_attributes(&mut var, desc, grid_mapping, "m/y")?;

        var.put_values(&encode_velocity(values), ..)?;
        var.put_attribute("missing_value", VELOCITY_FILL)?;
        Ok(())
    }

    fn write_chip_sizes(
        &self,
        file: &mut FileMut,
        product: &VelocityProduct,
        grid_mapping: &str,
        chunk: [usize; 2],
    ) -> SarResult<()> {
        let radar = product.pair_type.is_radar();
        let coordinates = if radar {
            "radar geometry: width = range, height = azimuth"
        } else {
            "image projection geometry: width = x, height = y"
        };
        let geometry = &product.geometry;

        let dims = [
            (
                "chip_size_width",
                "width of search window",
                &product.chip_size_width,
                if radar { "range_pixel_size" } else { "x_pixel_size" },
                geometry.range_pixel_size,
            ),
            (
                "chip_size_height",
                "height of search window",
                &product.chip_size_height,
                if radar { "azimuth_pixel_size" } else { "y_pixel_size" },
                geometry.azimuth_pixel_size,
            ),
        ];

        for (name, description, values, size_name, pixel_size) in dims {
            let mut var = file.add_variable::<u16>(name, &["y", "x"])?;
            self.configure_raster(&mut var, chunk)?;
            var.set_fill_value(CHIP_SIZE_FILL)?;

            var.put_attribute("grid_mapping", grid_mapping)?;
            var.put_attribute(size_name, pixel_size)?;
            var.put_attribute("chip_size_coordinates", coordinates)?;
            var.put_attribute("standard_name", name)?;
            var.put_attribute("description", description)?;
            var.put_attribute("units", "m")?;

            var.put_values(&encode_chip_size(values), ..)?;
            var.put_attribute("missing_value", CHIP_SIZE_FILL)?;
        }
        Ok(())
    }

    fn write_interp_mask(
        &self,
        file: &mut FileMut,
        product: &VelocityProduct,
        grid_mapping: &str,
        chunk: [usize; 2],
    ) -> SarResult<()> {
        let mut var = file.add_variable::<u8>("interp_mask", &["y", "x"])?;
        self.configure_raster(&mut var, chunk)?;

        let desc = VariableDescription {
            name: "interp_mask",
            standard_name: "interpolated_value_mask",
            description: "light interpolation mask".to_string(),
        };
        put_descriptive_attributes(&mut var, &desc, grid_mapping, "binary")?;

        var.put_values(&encode_mask(&product.interp_mask), ..)?;
        var.put_attribute("missing_value", MASK_FILL)?;
        Ok(())
    }

    fn configure_raster(&self, var: &mut VariableMut, chunk: [usize; 2]) -> SarResult<()> {
        var.set_chunking(&chunk)?;
        var.set_compression(self.options.deflate_level, true)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ComponentAttributes {
    error: f64,
    stable_shift: f64,
    stable_count: usize,
    stable_shift_applied: bool,
}

fn put_descriptive_attributes(
    var: &mut VariableMut,
    desc: &VariableDescription,
    grid_mapping: &str,
    units: &str,
) -> SarResult<()> {
    var.put_attribute("grid_mapping", grid_mapping)?;
    var.put_attribute("standard_name", desc.standard_name)?;
    var.put_attribute("description", desc.description.as_str())?;
    var.put_attribute("units", units)?;
    Ok(())
}

/// Scalar `img_pair_info` variable carrying the provenance dictionary
fn write_pair_info(file: &mut FileMut, pair_info: &PairInfo) -> SarResult<()> {
    let mut var = file.add_variable::<u8>("img_pair_info", &[])?;
    for (key, value) in pair_info.iter() {
        match value {
            PairInfoValue::Text(s) => var.put_attribute(key, s.as_str())?,
            PairInfoValue::Int(i) => var.put_attribute(key, *i)?,
            PairInfoValue::Float(f) => var.put_attribute(key, *f)?,
        };
    }
    Ok(())
}

fn write_coordinates(
    file: &mut FileMut,
    geo_transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> SarResult<()> {
    file.add_dimension("x", cols)?;
    file.add_dimension("y", rows)?;

    let axes = [
        ("x", geo_transform.x_coordinates(cols)),
        ("y", geo_transform.y_coordinates(rows)),
    ];
    for (axis, values) in axes {
        let mut var = file.add_variable::<f64>(axis, &[axis])?;
        var.put_attribute("standard_name", format!("projection_{}_coordinate", axis).as_str())?;
        var.put_attribute("description", format!("{} coordinate of projection", axis).as_str())?;
        var.put_attribute("units", "m")?;
        var.put_values(&values, ..)?;
    }
    Ok(())
}

/// Derive velocities for one pair and write the NetCDF product
///
/// The grid mapping is checked first so that configuration errors surface
/// before any computation or output.
pub fn package_velocity_product<P: AsRef<Path>>(
    deriver: &VelocityDeriver,
    writer: &GridProductWriter,
    inputs: &VelocityInputs,
    crs: &CrsDescription,
    geo_transform: &GeoTransform,
    pair_info: &PairInfo,
    output_path: P,
) -> SarResult<VelocityProduct> {
    GridMapping::from_crs(crs, geo_transform)?;

    let product = deriver.derive(inputs)?;
    writer.write(&product, crs, geo_transform, pair_info, output_path)?;
    Ok(product)
}
