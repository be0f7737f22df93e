use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Real-valued raster (velocity, offsets, calibration coefficients)
pub type Raster = Array2<f32>;

/// Boolean raster (stable-surface mask, projection mode mask)
pub type MaskRaster = Array2<bool>;

/// No-data sentinel of the velocity-family rasters, both in memory and on disk
pub const VELOCITY_NO_DATA: i16 = -32767;

/// Image pair geometry the offsets were measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairType {
    /// Radar range/azimuth geometry (Sentinel-1)
    Radar,
    /// Map-projected optical imagery (Landsat, Sentinel-2)
    Optical,
}

impl PairType {
    pub fn is_radar(&self) -> bool {
        matches!(self, PairType::Radar)
    }
}

impl std::fmt::Display for PairType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairType::Radar => write!(f, "radar"),
            PairType::Optical => write!(f, "optical"),
        }
    }
}

impl FromStr for PairType {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s.to_lowercase().as_str() {
            "radar" => Ok(PairType::Radar),
            "optical" | "geocoded" => Ok(PairType::Optical),
            _ => Err(SarError::Configuration(format!(
                "Pair type '{}' not recognized (expected 'radar' or 'optical')",
                s
            ))),
        }
    }
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Build from the GDAL six-coefficient layout
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    /// GDAL layout with the rotation terms dropped (products are north-up)
    pub fn north_up(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            0.0,
            self.top_left_y,
            0.0,
            self.pixel_height,
        ]
    }

    /// Pixel-edge x coordinates for `cols` columns
    pub fn x_coordinates(&self, cols: usize) -> Vec<f64> {
        (0..cols)
            .map(|i| self.top_left_x + self.pixel_width * i as f64)
            .collect()
    }

    /// Pixel-edge y coordinates for `rows` rows
    pub fn y_coordinates(&self, rows: usize) -> Vec<f64> {
        (0..rows)
            .map(|j| self.top_left_y + self.pixel_height * j as f64)
            .collect()
    }

    /// Space-separated string stored in the `GeoTransform` attribute
    pub fn to_attribute_string(&self) -> String {
        self.north_up()
            .iter()
            .map(|v| format!("{:?}", v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Single provenance value stored on `img_pair_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PairInfoValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for PairInfoValue {
    fn from(v: &str) -> Self {
        PairInfoValue::Text(v.to_string())
    }
}

impl From<String> for PairInfoValue {
    fn from(v: String) -> Self {
        PairInfoValue::Text(v)
    }
}

impl From<i64> for PairInfoValue {
    fn from(v: i64) -> Self {
        PairInfoValue::Int(v)
    }
}

impl From<f64> for PairInfoValue {
    fn from(v: f64) -> Self {
        PairInfoValue::Float(v)
    }
}

/// Image-pair provenance dictionary, copied verbatim into the product
///
/// Entries keep their insertion order; re-inserting a key replaces the value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairInfo {
    entries: Vec<(String, PairInfoValue)>,
}

impl PairInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<PairInfoValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PairInfoValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PairInfoValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Temporal baseline in days (`date_dt`)
    pub fn date_dt(&self) -> SarResult<f64> {
        match self.get("date_dt") {
            Some(PairInfoValue::Float(v)) => Ok(*v),
            Some(PairInfoValue::Int(v)) => Ok(*v as f64),
            Some(PairInfoValue::Text(s)) => s.trim().parse::<f64>().map_err(|_| {
                SarError::InvalidFormat(format!("date_dt is not numeric: '{}'", s))
            }),
            None => Err(SarError::Configuration(
                "Missing required pair info field: date_dt".to_string(),
            )),
        }
    }

    /// Fill `date_dt` and `date_center` from two acquisition dates (`YYYYMMDD`)
    pub fn set_acquisition_dates(&mut self, first: &str, second: &str) -> SarResult<()> {
        let d0 = parse_acquisition_date(first)?;
        let d1 = parse_acquisition_date(second)?;
        let span = d1.signed_duration_since(d0);
        let center = if span.num_days() < 0 {
            d1 + (d0 - d1) / 2
        } else {
            d0 + span / 2
        };

        self.insert("date_dt", span.num_days().abs() as f64);
        self.insert("date_center", center.format("%Y%m%d").to_string());
        Ok(())
    }
}

fn parse_acquisition_date(s: &str) -> SarResult<NaiveDate> {
    let digits = s.get(0..8).unwrap_or(s);
    NaiveDate::parse_from_str(digits, "%Y%m%d")
        .map_err(|e| SarError::InvalidFormat(format!("Invalid acquisition date '{}': {}", s, e)))
}

/// Error types for velocity processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Raster '{name}' has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

/// Result type for velocity operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_type_parsing() {
        assert_eq!("radar".parse::<PairType>().unwrap(), PairType::Radar);
        assert_eq!("Optical".parse::<PairType>().unwrap(), PairType::Optical);
        assert_eq!("geocoded".parse::<PairType>().unwrap(), PairType::Optical);

        let err = "unknown".parse::<PairType>().unwrap_err();
        assert!(matches!(err, SarError::Configuration(_)));
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_geotransform_coordinates() {
        let gt = GeoTransform::from_gdal([500000.0, 240.0, 0.1, -1200000.0, 0.2, -240.0]);

        assert_eq!(gt.x_coordinates(3), vec![500000.0, 500240.0, 500480.0]);
        assert_eq!(gt.y_coordinates(2), vec![-1200000.0, -1200240.0]);
        assert_eq!(
            gt.to_attribute_string(),
            "500000.0 240.0 0.0 -1200000.0 0.0 -240.0"
        );
    }

    #[test]
    fn test_pair_info_dates() {
        let mut info = PairInfo::new();
        info.set_acquisition_dates("20200103", "20200115").unwrap();

        assert_eq!(info.date_dt().unwrap(), 12.0);
        assert_eq!(
            info.get("date_center"),
            Some(&PairInfoValue::Text("20200109".to_string()))
        );

        // Reversed order gives the same baseline and center
        let mut reversed = PairInfo::new();
        reversed.set_acquisition_dates("20200115T000000", "20200103").unwrap();
        assert_eq!(reversed.date_dt().unwrap(), 12.0);
        assert_eq!(reversed.get("date_center"), info.get("date_center"));
    }

    #[test]
    fn test_pair_info_keeps_insertion_order() {
        let mut info = PairInfo::new();
        info.insert("mission_img1", "S");
        info.insert("absolute_orbit_number_img1", "030639");
        info.insert("date_dt", 12.0);
        info.insert("mission_img1", "L");

        let keys: Vec<&str> = info.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["mission_img1", "absolute_orbit_number_img1", "date_dt"]);
        assert_eq!(info.len(), 3);
        assert_eq!(info.get("mission_img1"), Some(&PairInfoValue::Text("L".to_string())));
    }

    #[test]
    fn test_missing_date_dt() {
        let info = PairInfo::new();
        assert!(matches!(info.date_dt(), Err(SarError::Configuration(_))));
    }
}
