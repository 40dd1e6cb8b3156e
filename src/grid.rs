//! Conversion of an extent and a ground resolution into a pixel grid.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, RasterResult};
use crate::geodesy::LocalScale;

/// Axis-aligned extent in the input layer's native units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> RasterResult<Self> {
        let bbox = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        if ![x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite()) {
            return Err(RasterError::Input(format!(
                "extent has non-finite coordinates: {bbox:?}"
            )));
        }
        if x_max < x_min || y_max < y_min {
            return Err(RasterError::Input(format!("extent is inverted: {bbox:?}")));
        }
        Ok(bbox)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

impl From<geo::Rect<f64>> for BoundingBox {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self {
            x_min: rect.min().x,
            x_max: rect.max().x,
            y_min: rect.min().y,
            y_max: rect.max().y,
        }
    }
}

/// Ground sampling distance and background value of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionSpec {
    pub resolution_meters: f64,
    pub no_data_value: u8,
}

/// Six-parameter affine mapping from pixel (column, row) to ground coordinates,
/// in GDAL order: `(origin_x, pixel_width, row_rotation, origin_y,
/// column_rotation, pixel_height)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with the origin at the top-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn pixel_width(&self) -> f64 {
        self.0[1]
    }

    /// Signed row step; negative for north-up rasters.
    pub fn pixel_height(&self) -> f64 {
        self.0[5]
    }

    /// Ground coordinates of a pixel-space position (corners are integers).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let t = &self.0;
        (
            t[0] + col * t[1] + row * t[2],
            t[3] + col * t[4] + row * t[5],
        )
    }

    /// Pixel-space position of ground coordinates. Only north-up transforms are
    /// produced by this crate, so the rotation terms are ignored.
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        let t = &self.0;
        ((x - t[0]) / t[1], (y - t[3]) / t[5])
    }

    pub fn pixel_area(&self) -> f64 {
        (self.0[1] * self.0[5]).abs()
    }
}

/// Pixel dimensions plus georeferencing of the raster to allocate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub width_px: u32,
    pub height_px: u32,
    pub transform: GeoTransform,
}

impl GridSpec {
    /// Sizes the grid covering `bbox` at `resolution` using the local `scale`.
    ///
    /// Dimensions are truncated, so the grid may under-cover the extent by up to
    /// one pixel on the right and bottom edges.
    pub fn compute(
        bbox: &BoundingBox,
        resolution: &ResolutionSpec,
        scale: &LocalScale,
        max_pixels: u64,
    ) -> RasterResult<Self> {
        let res = resolution.resolution_meters;
        if !res.is_finite() || res <= 0.0 {
            return Err(RasterError::Config(format!(
                "resolution must be positive, got {res}"
            )));
        }
        if !scale.is_usable() {
            return Err(RasterError::InvalidGrid(format!(
                "local scale degenerates near latitude {:.4} ({:.3} m/deg lon, {:.3} m/deg lat)",
                (bbox.y_min + bbox.y_max) / 2.0,
                scale.meters_per_degree_longitude,
                scale.meters_per_degree_latitude
            )));
        }

        let width = (bbox.width() * scale.meters_per_degree_longitude / res).floor();
        let height = (bbox.height() * scale.meters_per_degree_latitude / res).floor();

        if width < 1.0 || height < 1.0 {
            return Err(RasterError::InvalidGrid(format!(
                "extent {:.6} x {:.6} is smaller than one {res} m pixel ({width} x {height} px)",
                bbox.width(),
                bbox.height()
            )));
        }
        if width > u32::MAX as f64 || height > u32::MAX as f64 || width * height > max_pixels as f64
        {
            return Err(RasterError::InvalidGrid(format!(
                "{width} x {height} px exceeds the {max_pixels} pixel limit"
            )));
        }

        let transform = GeoTransform::north_up(
            bbox.x_min,
            bbox.y_max,
            res / scale.meters_per_degree_longitude,
            res / scale.meters_per_degree_latitude,
        );

        Ok(Self {
            width_px: width as u32,
            height_px: height as u32,
            transform,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.width_px as usize * self.height_px as usize
    }
}
