use crate::types::{GeoTransform, SarError, SarResult};
use gdal::spatial_ref::SpatialRef;
use netcdf::AttributeValue;
use serde::{Deserialize, Serialize};

/// Coordinate reference system of the output grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsDescription {
    /// OGC projection method name, e.g. `Polar_Stereographic`
    pub projection: String,
    pub central_meridian: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    pub latitude_of_origin: f64,
    pub semi_major_axis: f64,
    pub inverse_flattening: f64,
    pub wkt: String,
    pub proj4: String,
    pub epsg: u32,
}

impl CrsDescription {
    /// Extract projection parameters from a GDAL spatial reference
    pub fn from_spatial_ref(srs: &SpatialRef, epsg: u32) -> SarResult<Self> {
        let projection = srs.get_attr_value("PROJECTION", 0)?.ok_or_else(|| {
            SarError::Configuration(format!("EPSG:{} is not a projected coordinate system", epsg))
        })?;

        let proj_parm = |name: &str| -> SarResult<f64> { Ok(srs.get_proj_param(name)?.unwrap_or(0.0)) };
        let spheroid = |child: usize| -> SarResult<f64> {
            let value = srs.get_attr_value("GEOGCS|SPHEROID", child)?.ok_or_else(|| {
                SarError::InvalidFormat("Spatial reference has no spheroid".to_string())
            })?;
            value.trim().parse::<f64>().map_err(|_| {
                SarError::InvalidFormat(format!("Invalid spheroid parameter: '{}'", value))
            })
        };

        Ok(Self {
            projection,
            central_meridian: proj_parm("central_meridian")?,
            false_easting: proj_parm("false_easting")?,
            false_northing: proj_parm("false_northing")?,
            latitude_of_origin: proj_parm("latitude_of_origin")?,
            semi_major_axis: spheroid(1)?,
            inverse_flattening: spheroid(2)?,
            wkt: srs.to_wkt()?,
            proj4: srs.to_proj4()?,
            epsg,
        })
    }

    pub fn from_epsg(epsg: u32) -> SarResult<Self> {
        let srs = SpatialRef::from_epsg(epsg)?;
        Self::from_spatial_ref(&srs, epsg)
    }

    pub fn from_wkt(wkt: &str, epsg: u32) -> SarResult<Self> {
        let srs = SpatialRef::from_wkt(wkt)?;
        Self::from_spatial_ref(&srs, epsg)
    }
}

/// The two supported CF grid-mapping families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionFamily {
    PolarStereographic,
    TransverseMercator,
}

impl ProjectionFamily {
    pub fn from_projection_name(name: &str) -> SarResult<Self> {
        match name {
            "Polar_Stereographic" => Ok(ProjectionFamily::PolarStereographic),
            "Transverse_Mercator" => Ok(ProjectionFamily::TransverseMercator),
            _ => Err(SarError::Configuration(format!(
                "Projection {} not recognized for this program",
                name
            ))),
        }
    }
}

/// Grid-mapping variable written next to the data variables
#[derive(Debug, Clone)]
pub struct GridMapping {
    family: ProjectionFamily,
    crs: CrsDescription,
    geo_transform: GeoTransform,
}

impl GridMapping {
    pub fn from_crs(crs: &CrsDescription, geo_transform: &GeoTransform) -> SarResult<Self> {
        let family = ProjectionFamily::from_projection_name(&crs.projection)?;
        Ok(Self {
            family,
            crs: crs.clone(),
            geo_transform: *geo_transform,
        })
    }

    pub fn family(&self) -> ProjectionFamily {
        self.family
    }

    /// Name of the grid-mapping variable, referenced by each raster's `grid_mapping`
    pub fn variable_name(&self) -> &'static str {
        match self.family {
            ProjectionFamily::PolarStereographic => "Polar_Stereographic",
            ProjectionFamily::TransverseMercator => "UTM_projection",
        }
    }

    pub fn grid_mapping_name(&self) -> &'static str {
        match self.family {
            ProjectionFamily::PolarStereographic => "polar_stereographic",
            ProjectionFamily::TransverseMercator => "universal_transverse_mercator",
        }
    }

    /// Attributes of the grid-mapping variable, in output order
    pub fn attributes(&self) -> Vec<(&'static str, AttributeValue)> {
        let crs = &self.crs;
        let text = |s: &str| AttributeValue::Str(s.to_string());

        let mut attrs = vec![("grid_mapping_name", text(self.grid_mapping_name()))];
        match self.family {
            ProjectionFamily::PolarStereographic => {
                attrs.extend([
                    (
                        "straight_vertical_longitude_from_pole",
                        AttributeValue::Double(crs.central_meridian),
                    ),
                    ("false_easting", AttributeValue::Double(crs.false_easting)),
                    ("false_northing", AttributeValue::Double(crs.false_northing)),
                    (
                        "latitude_of_projection_origin",
                        AttributeValue::Double(pole_latitude(crs.latitude_of_origin)),
                    ),
                    ("latitude_of_origin", AttributeValue::Double(crs.latitude_of_origin)),
                    ("semi_major_axis", AttributeValue::Double(crs.semi_major_axis)),
                    ("scale_factor_at_projection_origin", AttributeValue::Int(1)),
                    ("inverse_flattening", AttributeValue::Double(crs.inverse_flattening)),
                ]);
            }
            ProjectionFamily::TransverseMercator => {
                attrs.extend([
                    ("utm_zone_number", AttributeValue::Int((crs.epsg % 100) as i32)),
                    ("CoordinateTransformType", text("Projection")),
                    ("CoordinateAxisTypes", text("GeoX GeoY")),
                    ("semi_major_axis", AttributeValue::Double(crs.semi_major_axis)),
                    ("inverse_flattening", AttributeValue::Double(crs.inverse_flattening)),
                ]);
            }
        }
        attrs.extend([
            ("spatial_ref", text(&crs.wkt)),
            ("spatial_proj4", text(&crs.proj4)),
            ("spatial_epsg", AttributeValue::Int(crs.epsg as i32)),
            ("GeoTransform", text(&self.geo_transform.to_attribute_string())),
        ]);
        attrs
    }
}

/// Latitude of the projection pole, signed like the latitude of true scale
fn pole_latitude(latitude_of_origin: f64) -> f64 {
    if latitude_of_origin > 0.0 {
        90.0
    } else if latitude_of_origin < 0.0 {
        -90.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polar_crs(epsg: u32, latitude_of_origin: f64) -> CrsDescription {
        CrsDescription {
            projection: "Polar_Stereographic".to_string(),
            central_meridian: -45.0,
            false_easting: 0.0,
            false_northing: 0.0,
            latitude_of_origin,
            semi_major_axis: 6378137.0,
            inverse_flattening: 298.257223563,
            wkt: "PROJCS[\"WGS 84 / NSIDC Sea Ice Polar Stereographic North\"]".to_string(),
            proj4: "+proj=stere +lat_0=90 +lat_ts=70 +lon_0=-45".to_string(),
            epsg,
        }
    }

    fn transform() -> GeoTransform {
        GeoTransform::from_gdal([-200000.0, 240.0, 0.0, -2000000.0, 0.0, -240.0])
    }

    fn lookup<'a>(attrs: &'a [(&'static str, AttributeValue)], name: &str) -> &'a AttributeValue {
        &attrs.iter().find(|(n, _)| *n == name).unwrap().1
    }

    #[test]
    fn test_polar_stereographic_attributes() {
        let mapping = GridMapping::from_crs(&polar_crs(3413, 70.0), &transform()).unwrap();
        assert_eq!(mapping.variable_name(), "Polar_Stereographic");

        let attrs = mapping.attributes();
        assert!(matches!(lookup(&attrs, "spatial_epsg"), AttributeValue::Int(3413)));
        assert!(matches!(
            lookup(&attrs, "latitude_of_projection_origin"),
            AttributeValue::Double(v) if *v == 90.0
        ));
        assert!(matches!(
            lookup(&attrs, "straight_vertical_longitude_from_pole"),
            AttributeValue::Double(v) if *v == -45.0
        ));
        match lookup(&attrs, "GeoTransform") {
            AttributeValue::Str(s) => assert_eq!(s, "-200000.0 240.0 0.0 -2000000.0 0.0 -240.0"),
            other => panic!("unexpected GeoTransform attribute {:?}", other),
        }
    }

    #[test]
    fn test_southern_pole_latitude() {
        let mapping = GridMapping::from_crs(&polar_crs(3031, -71.0), &transform()).unwrap();
        let attrs = mapping.attributes();
        assert!(matches!(
            lookup(&attrs, "latitude_of_projection_origin"),
            AttributeValue::Double(v) if *v == -90.0
        ));
    }

    #[test]
    fn test_utm_zone_from_epsg() {
        let mut crs = polar_crs(32607, 0.0);
        crs.projection = "Transverse_Mercator".to_string();
        let mapping = GridMapping::from_crs(&crs, &transform()).unwrap();

        assert_eq!(mapping.variable_name(), "UTM_projection");
        let attrs = mapping.attributes();
        assert!(matches!(lookup(&attrs, "utm_zone_number"), AttributeValue::Int(7)));
        assert!(attrs.iter().all(|(n, _)| *n != "latitude_of_origin"));
    }

    #[test]
    fn test_unknown_projection_rejected() {
        let mut crs = polar_crs(3857, 0.0);
        crs.projection = "Mercator_1SP".to_string();

        let err = GridMapping::from_crs(&crs, &transform()).unwrap_err();
        assert!(matches!(err, SarError::Configuration(_)));
        assert!(err.to_string().contains("Mercator_1SP"));
    }
}
