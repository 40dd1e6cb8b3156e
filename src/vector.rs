//! GeoJSON input and output layers, and the spatial reference carried
//! between them.

use geo::{BoundingRect, Geometry, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{RasterError, RasterResult};
use crate::grid::BoundingBox;

/// RFC 7946 coordinate reference system, assumed when none is declared.
pub const CRS84: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// Name of the integer attribute holding a region's pixel value.
pub const DN_FIELD: &str = "DN";

/// Opaque coordinate-system descriptor (a CRS name such as `EPSG:4326`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialReference(String);

impl SpatialReference {
    pub fn parse(name: &str) -> RasterResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RasterError::Input("spatial reference is empty".into()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn crs84() -> Self {
        Self(CRS84.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads a legacy GeoJSON `crs` member of the `name` flavour.
    pub fn from_geojson_crs(value: &JsonValue) -> RasterResult<Self> {
        let kind = value.get("type").and_then(JsonValue::as_str);
        let name = value
            .get("properties")
            .and_then(|p| p.get("name"))
            .and_then(JsonValue::as_str);

        match (kind, name) {
            (Some("name"), Some(name)) => Self::parse(name),
            _ => Err(RasterError::Input(format!(
                "unsupported crs member, expected {{\"type\": \"name\", \"properties\": {{\"name\": ...}}}}: {value}"
            ))),
        }
    }

    pub fn to_geojson_crs(&self) -> JsonValue {
        json!({ "type": "name", "properties": { "name": self.0 } })
    }
}

impl std::fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geometries and spatial reference of the layer to rasterize.
#[derive(Debug, Clone)]
pub struct InputLayer {
    pub geometries: Vec<Geometry<f64>>,
    pub srs: SpatialReference,
}

impl InputLayer {
    /// Reads a GeoJSON document (collection, single feature or bare geometry).
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path) -> RasterResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RasterError::Input(format!("cannot read {}: {}", path.display(), e)))?;
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| RasterError::Input(format!("{} is not valid GeoJSON: {}", path.display(), e)))?;
        Self::from_geojson(geojson)
    }

    pub fn from_geojson(geojson: GeoJson) -> RasterResult<Self> {
        match geojson {
            GeoJson::FeatureCollection(fc) => Self::from_feature_collection(fc),
            GeoJson::Feature(feature) => {
                let srs = srs_from_members(feature.foreign_members.as_ref())?;
                let geometries = feature
                    .geometry
                    .into_iter()
                    .map(convert)
                    .collect::<RasterResult<Vec<_>>>()?;
                Self::new(geometries, srs)
            }
            GeoJson::Geometry(geometry) => {
                let srs = srs_from_members(geometry.foreign_members.as_ref())?;
                Self::new(vec![convert(geometry)?], srs)
            }
        }
    }

    pub fn from_feature_collection(fc: FeatureCollection) -> RasterResult<Self> {
        let srs = srs_from_members(fc.foreign_members.as_ref())?;
        let total = fc.features.len();

        let geometries = fc
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .map(convert)
            .collect::<RasterResult<Vec<_>>>()?;

        if geometries.len() < total {
            warn!(
                skipped = total - geometries.len(),
                "Features without geometry ignored"
            );
        }
        Self::new(geometries, srs)
    }

    fn new(geometries: Vec<Geometry<f64>>, srs: SpatialReference) -> RasterResult<Self> {
        if geometries.is_empty() {
            return Err(RasterError::Input("input layer has no geometry".into()));
        }
        debug!(count = geometries.len(), srs = %srs, "Input layer loaded");
        Ok(Self { geometries, srs })
    }

    /// Extent of every geometry in the layer.
    pub fn bounding_box(&self) -> RasterResult<BoundingBox> {
        let extent = self
            .geometries
            .iter()
            .filter_map(|g| g.bounding_rect())
            .map(BoundingBox::from)
            .reduce(|a, b| BoundingBox {
                x_min: a.x_min.min(b.x_min),
                x_max: a.x_max.max(b.x_max),
                y_min: a.y_min.min(b.y_min),
                y_max: a.y_max.max(b.y_max),
            })
            .ok_or_else(|| RasterError::Input("input geometries are empty".into()))?;

        let bbox = BoundingBox::new(extent.x_min, extent.x_max, extent.y_min, extent.y_max)?;
        if bbox.y_min < -90.0 || bbox.y_max > 90.0 {
            return Err(RasterError::Input(format!(
                "latitudes {}..{} are outside -90..90; input must be in geographic degrees",
                bbox.y_min, bbox.y_max
            )));
        }
        Ok(bbox)
    }
}

fn srs_from_members(members: Option<&JsonObject>) -> RasterResult<SpatialReference> {
    match members.and_then(|m| m.get("crs")) {
        Some(crs) => SpatialReference::from_geojson_crs(crs),
        None => {
            debug!("No crs member, assuming {}", CRS84);
            Ok(SpatialReference::crs84())
        }
    }
}

fn convert(geometry: geojson::Geometry) -> RasterResult<Geometry<f64>> {
    Geometry::<f64>::try_from(geometry)
        .map_err(|e| RasterError::Input(format!("unsupported geometry: {e}")))
}

/// One polygonized region.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFeature {
    pub dn: i64,
    pub geometry: MultiPolygon<f64>,
}

/// Result of a run: one feature per region, georeferenced by `srs`.
#[derive(Debug, Clone)]
pub struct OutputLayer {
    pub features: Vec<OutputFeature>,
    pub srs: SpatialReference,
}

impl OutputLayer {
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|f| {
                let mut properties = JsonObject::new();
                properties.insert(DN_FIELD.to_string(), JsonValue::from(f.dn));
                Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&f.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let mut members = JsonObject::new();
        members.insert("crs".to_string(), self.srs.to_geojson_crs());

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(members),
        }
    }

    /// Writes the layer as a GeoJSON feature collection, replacing `path`.
    #[tracing::instrument(skip_all, fields(path = %path.display(), features = self.features.len()))]
    pub fn write(&self, path: &Path) -> RasterResult<()> {
        let file = File::create(path)
            .map_err(|e| RasterError::resource(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(&mut writer, &self.to_feature_collection())
            .map_err(|e| RasterError::library("serializing output layer", e))?;
        writer
            .flush()
            .map_err(|e| RasterError::resource(format!("writing {}", path.display()), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "EPSG:4326" } },
        "features": [
            { "type": "Feature", "properties": {}, "geometry": {
                "type": "Polygon",
                "coordinates": [[[-73.5, 45.5], [-73.4, 45.5], [-73.4, 45.6], [-73.5, 45.6], [-73.5, 45.5]]]
            } },
            { "type": "Feature", "properties": { "empty": true }, "geometry": null }
        ]
    }"#;

    #[test]
    fn test_reads_crs_and_skips_empty_features() {
        let layer = InputLayer::from_geojson(SQUARE.parse().unwrap()).unwrap();
        assert_eq!(layer.srs.as_str(), "EPSG:4326");
        assert_eq!(layer.geometries.len(), 1);

        let bbox = layer.bounding_box().unwrap();
        assert_eq!(bbox, BoundingBox::new(-73.5, -73.4, 45.5, 45.6).unwrap());
    }

    #[test]
    fn test_missing_crs_defaults_to_crs84() {
        let geojson: GeoJson = r#"{ "type": "Point", "coordinates": [1.0, 2.0] }"#.parse().unwrap();
        let layer = InputLayer::from_geojson(geojson).unwrap();
        assert_eq!(layer.srs, SpatialReference::crs84());
    }

    #[test]
    fn test_malformed_crs_is_input_error() {
        let geojson: GeoJson = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "link", "properties": { "href": "x" } },
            "features": []
        }"#
        .parse()
        .unwrap();
        assert!(matches!(InputLayer::from_geojson(geojson), Err(RasterError::Input(_))));
    }

    #[test]
    fn test_empty_collection_is_input_error() {
        let geojson: GeoJson = r#"{ "type": "FeatureCollection", "features": [] }"#.parse().unwrap();
        assert!(matches!(InputLayer::from_geojson(geojson), Err(RasterError::Input(_))));
    }

    #[test]
    fn test_projected_coordinates_are_rejected() {
        let geojson: GeoJson =
            r#"{ "type": "Point", "coordinates": [300000.0, 5040000.0] }"#.parse().unwrap();
        let layer = InputLayer::from_geojson(geojson).unwrap();
        assert!(matches!(layer.bounding_box(), Err(RasterError::Input(_))));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        assert!(matches!(
            InputLayer::read(Path::new("/nonexistent/layer.geojson")),
            Err(RasterError::Input(_))
        ));
    }

    #[test]
    fn test_output_carries_dn_and_crs() {
        let layer = OutputLayer {
            features: vec![OutputFeature {
                dn: 128,
                geometry: MultiPolygon::new(vec![polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                    (x: 0.0, y: 0.0),
                ]]),
            }],
            srs: SpatialReference::parse("EPSG:32618").unwrap(),
        };

        let json = serde_json::to_value(layer.to_feature_collection()).unwrap();
        assert_eq!(json["crs"]["properties"]["name"], "EPSG:32618");
        assert_eq!(json["features"][0]["properties"]["DN"], 128);
        assert_eq!(json["features"][0]["geometry"]["type"], "MultiPolygon");
    }
}
