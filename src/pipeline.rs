//! Rasterize/polygonize run: vector → extent and scale → grid → raster → vector.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::config::RasterizeConfig;
use crate::error::{RasterError, RasterResult};
use crate::geodesy::LocalScale;
use crate::grid::{BoundingBox, GridSpec, ResolutionSpec};
use crate::polygonize::polygonize;
use crate::raster::{burn_geometry, RasterWriter};
use crate::vector::{InputLayer, OutputFeature, OutputLayer};

const SCRATCH_PREFIX: &str = "transition-raster-";
const RASTER_FILE_NAME: &str = "burn.png";

/// What a run produced, for logging and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub scale: LocalScale,
    pub width_px: u32,
    pub height_px: u32,
    /// Ground area of one pixel in squared layer units.
    pub pixel_area: f64,
    pub burned_pixels: usize,
    pub features: usize,
}

/// Reads `input`, runs the rasterize/polygonize round trip and writes the
/// resulting layer to `output`.
#[tracing::instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
pub fn run(input: &Path, output: &Path, config: &RasterizeConfig) -> RasterResult<RunSummary> {
    let layer = InputLayer::read(input)?;
    let (result, summary) = rasterize_layer(&layer, config)?;
    result.write(output)?;

    info!(
        width = summary.width_px,
        height = summary.height_px,
        features = summary.features,
        "Polygonized layer written"
    );
    Ok(summary)
}

/// Core of a run on an already loaded layer. The intermediate raster lives in
/// a scratch directory removed before returning, whatever the outcome.
pub fn rasterize_layer(
    layer: &InputLayer,
    config: &RasterizeConfig,
) -> RasterResult<(OutputLayer, RunSummary)> {
    config.validate()?;

    let bbox = layer.bounding_box()?;
    check_latitude_span(&bbox, config.max_latitude_span_degrees)?;

    let scale = LocalScale::at_mid_latitude(bbox.y_min, bbox.y_max);
    let resolution = ResolutionSpec {
        resolution_meters: config.resolution_meters,
        no_data_value: config.no_data_byte(),
    };
    let grid = GridSpec::compute(&bbox, &resolution, &scale, config.max_pixels)?;
    debug!(
        meters_per_degree_lat = scale.meters_per_degree_latitude,
        meters_per_degree_lon = scale.meters_per_degree_longitude,
        width = grid.width_px,
        height = grid.height_px,
        "Grid computed"
    );

    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(|e| RasterError::resource("creating scratch directory", e))?;

    let closed = {
        let mut writer = RasterWriter::create(
            scratch.path().join(RASTER_FILE_NAME),
            &grid,
            &layer.srs,
            resolution.no_data_value,
        )?;
        let transform = writer.transform();
        for geometry in &layer.geometries {
            burn_geometry(writer.band_mut(), &transform, geometry, config.burn_byte());
        }
        writer.close()?
    };

    if let Some(keep) = &config.keep_raster {
        closed.copy_to(keep)?;
        info!(path = %keep.display(), "Intermediate raster kept");
    }

    let reader = closed.open()?;
    let srs = reader.spatial_reference()?;
    let burned_pixels = reader.band().count_data_pixels();
    let regions = polygonize(reader.band(), &reader.transform(), config.include_no_data)?;
    drop(reader);

    scratch
        .close()
        .map_err(|e| RasterError::resource("removing scratch directory", e))?;

    let features: Vec<OutputFeature> = regions
        .into_iter()
        .map(|r| OutputFeature {
            dn: i64::from(r.value),
            geometry: r.geometry,
        })
        .collect();

    let summary = RunSummary {
        x_min: bbox.x_min,
        x_max: bbox.x_max,
        y_min: bbox.y_min,
        y_max: bbox.y_max,
        scale,
        width_px: grid.width_px,
        height_px: grid.height_px,
        pixel_area: grid.transform.pixel_area(),
        burned_pixels,
        features: features.len(),
    };

    Ok((OutputLayer { features, srs }, summary))
}

fn check_latitude_span(bbox: &BoundingBox, max_span: f64) -> RasterResult<()> {
    if bbox.height() > max_span {
        return Err(RasterError::Input(format!(
            "latitude span {:.4}° exceeds {max_span}°; a single local scale would be too inaccurate",
            bbox.height()
        )));
    }
    Ok(())
}
