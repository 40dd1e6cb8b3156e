use geo::{Area, Winding};
use geojson::{FeatureCollection, GeoJson};
use std::path::{Path, PathBuf};
use transition_toolkit::config::RasterizeConfig;
use transition_toolkit::error::RasterError;
use transition_toolkit::geodesy::LocalScale;
use transition_toolkit::grid::GeoTransform;
use transition_toolkit::pipeline;
use transition_toolkit::polygonize::polygonize;
use transition_toolkit::raster::RasterBand;
use transition_toolkit::vector::InputLayer;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn read_output(path: &Path) -> FeatureCollection {
    let content = std::fs::read_to_string(path).expect("output written");
    match content.parse::<GeoJson>().expect("output is GeoJSON") {
        GeoJson::FeatureCollection(fc) => fc,
        other => panic!("expected a feature collection, got {other:?}"),
    }
}

fn dn(feature: &geojson::Feature) -> i64 {
    feature
        .property("DN")
        .and_then(|v| v.as_i64())
        .expect("DN property")
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("parcels.geojson");

    let summary = pipeline::run(
        &fixture("two_parcels.geojson"),
        &output,
        &RasterizeConfig::new(10.0),
    )
    .expect("run succeeds");

    assert_eq!(summary.width_px, 31);
    assert_eq!(summary.height_px, 11);
    assert_eq!(summary.burned_pixels, 16 * 11);

    let fc = read_output(&output);
    assert_eq!(fc.features.len(), 3);
    assert_eq!(fc.features.iter().filter(|f| dn(f) == 128).count(), 2);
    assert_eq!(fc.features.iter().filter(|f| dn(f) == 0).count(), 1);
}

#[test]
fn test_crs_written_back() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("parcels.geojson");

    pipeline::run(
        &fixture("two_parcels.geojson"),
        &output,
        &RasterizeConfig::new(10.0),
    )
    .unwrap();

    let fc = read_output(&output);
    let crs = fc
        .foreign_members
        .as_ref()
        .and_then(|m| m.get("crs"))
        .expect("crs member");
    assert_eq!(crs["properties"]["name"], "EPSG:4326");
}

#[test]
fn test_exclude_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("parcels.geojson");
    let mut config = RasterizeConfig::new(10.0);
    config.include_no_data = false;

    pipeline::run(&fixture("two_parcels.geojson"), &output, &config).unwrap();

    let fc = read_output(&output);
    assert_eq!(fc.features.len(), 2);
    assert!(fc.features.iter().all(|f| dn(f) == 128));
}

#[test]
fn test_custom_burn_value() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("parcels.geojson");
    let mut config = RasterizeConfig::new(10.0);
    config.no_data_value = 255;
    config.burn_value = 1;

    pipeline::run(&fixture("two_parcels.geojson"), &output, &config).unwrap();

    let fc = read_output(&output);
    assert!(fc.features.iter().all(|f| dn(f) == 1 || dn(f) == 255));
    assert_eq!(fc.features.iter().filter(|f| dn(f) == 255).count(), 1);
}

#[test]
fn test_hole_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("access.geojson");

    pipeline::run(
        &fixture("walk_access.geojson"),
        &output,
        &RasterizeConfig::new(20.0),
    )
    .unwrap();

    let fc = read_output(&output);
    let burned: Vec<_> = fc.features.iter().filter(|f| dn(f) == 128).collect();
    assert_eq!(burned.len(), 1);

    let geometry: geo::Geometry<f64> = burned[0]
        .geometry
        .clone()
        .expect("geometry")
        .try_into()
        .expect("convertible geometry");
    let multi = match geometry {
        geo::Geometry::MultiPolygon(multi) => multi,
        other => panic!("expected a multipolygon, got {other:?}"),
    };
    assert_eq!(multi.0.len(), 1);
    assert_eq!(multi.0[0].interiors().len(), 1);
    assert!(multi.0[0].exterior().is_ccw());
    assert!(multi.0[0].interiors()[0].is_cw());

    // Hole shows up as its own no-data region.
    assert_eq!(fc.features.iter().filter(|f| dn(f) == 0).count(), 1);
}

#[test]
fn test_keep_raster() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("parcels.geojson");
    let kept = dir.path().join("parcels.png");
    let mut config = RasterizeConfig::new(10.0);
    config.keep_raster = Some(kept.clone());

    pipeline::run(&fixture("two_parcels.geojson"), &output, &config).unwrap();

    assert!(kept.exists());
    let header: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("parcels.json")).unwrap())
            .unwrap();
    assert_eq!(header["width"], 31);
    assert_eq!(header["height"], 11);
    assert_eq!(header["spatial_reference"], "EPSG:4326");
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("run.json");
    std::fs::write(
        &config_path,
        r#"{ "resolution_meters": 10.0, "include_no_data": false }"#,
    )
    .unwrap();
    let output = dir.path().join("parcels.geojson");

    let config = RasterizeConfig::load(&config_path).unwrap();
    pipeline::run(&fixture("two_parcels.geojson"), &output, &config).unwrap();

    assert_eq!(read_output(&output).features.len(), 2);
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let result = pipeline::run(
        &fixture("does_not_exist.geojson"),
        &dir.path().join("out.geojson"),
        &RasterizeConfig::new(10.0),
    );
    assert!(matches!(result, Err(RasterError::Input(_))));
}

#[test]
fn test_input_not_geojson() {
    let dir = tempfile::tempdir().unwrap();
    let result = pipeline::run(
        &fixture("not_geojson.txt"),
        &dir.path().join("out.geojson"),
        &RasterizeConfig::new(10.0),
    );
    assert!(matches!(result, Err(RasterError::Input(_))));
}

#[test]
fn test_unwritable_output() {
    let result = pipeline::run(
        &fixture("two_parcels.geojson"),
        Path::new("/nonexistent/dir/out.geojson"),
        &RasterizeConfig::new(10.0),
    );
    assert!(matches!(result, Err(RasterError::Resource { .. })));
}

#[test]
fn test_resolution_coarser_than_extent() {
    let dir = tempfile::tempdir().unwrap();
    let result = pipeline::run(
        &fixture("two_parcels.geojson"),
        &dir.path().join("out.geojson"),
        &RasterizeConfig::new(5000.0),
    );
    assert!(matches!(result, Err(RasterError::InvalidGrid(_))));
}

#[test]
fn test_all_no_data_band_covers_extent() {
    let band = RasterBand::new(12, 7, 0);
    let transform = GeoTransform::north_up(-73.6, 45.6, 0.001, 0.0005);

    let regions = polygonize(&band, &transform, true).unwrap();

    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].value, 0);
    assert_eq!(regions[0].pixel_count, 84);
    let expected = 12.0 * 0.001 * 7.0 * 0.0005;
    assert!((regions[0].geometry.unsigned_area() - expected).abs() < 1e-12);

    assert!(polygonize(&band, &transform, false).unwrap().is_empty());
}

#[test]
fn test_aligned_rectangle_round_trip_keeps_area() {
    let (x_min, y_min, y_max) = (-73.6, 45.5, 45.501);
    let (cols, rows) = (12.0, 9.0);

    // Size the rectangle to whole pixels, a hair over so truncation keeps them.
    let scale = LocalScale::at_mid_latitude(y_min, y_max);
    let res = (y_max - y_min) * scale.meters_per_degree_latitude / rows * (1.0 - 1e-9);
    let x_max = x_min + cols * res / scale.meters_per_degree_longitude * (1.0 + 1e-9);

    let rectangle = geo::Rect::new(
        geo::coord! { x: x_min, y: y_min },
        geo::coord! { x: x_max, y: y_max },
    )
    .to_polygon();
    let geojson = GeoJson::Geometry(geojson::Geometry::new(geojson::Value::from(&rectangle)));
    let layer = InputLayer::from_geojson(geojson).unwrap();

    let mut config = RasterizeConfig::new(res);
    config.include_no_data = false;
    let (output, summary) = pipeline::rasterize_layer(&layer, &config).unwrap();

    assert_eq!(summary.width_px, cols as u32);
    assert_eq!(summary.height_px, rows as u32);
    assert_eq!(summary.burned_pixels, 108);
    assert_eq!(output.features.len(), 1);
    assert_eq!(output.features[0].dn, 128);

    let area = output.features[0].geometry.unsigned_area();
    assert!((area - rectangle.unsigned_area()).abs() <= summary.pixel_area);
    assert!(output.features[0].geometry.0[0].exterior().is_ccw());
}
