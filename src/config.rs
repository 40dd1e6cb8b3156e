//! Run configuration for the rasterize/polygonize pipeline.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{RasterError, RasterResult};

pub const DEFAULT_NO_DATA_VALUE: i64 = 0;
pub const DEFAULT_BURN_VALUE: i64 = 128;
pub const DEFAULT_MAX_LATITUDE_SPAN_DEGREES: f64 = 10.0;
pub const DEFAULT_MAX_PIXELS: u64 = 500_000_000;

/// Everything a single run needs to know besides its input and output paths.
///
/// Stored as a plain JSON object on disk, every field but the resolution
/// optional:
/// ```json
/// {
///   "resolution_meters": 2.0,
///   "no_data_value": 0,
///   "burn_value": 128,
///   "include_no_data": true
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RasterizeConfig {
    /// Ground size of one pixel, in meters.
    pub resolution_meters: f64,
    #[serde(default = "default_no_data")]
    pub no_data_value: i64,
    #[serde(default = "default_burn")]
    pub burn_value: i64,
    /// Whether regions holding the no-data value are written to the output.
    #[serde(default = "default_true")]
    pub include_no_data: bool,
    #[serde(default = "default_max_span")]
    pub max_latitude_span_degrees: f64,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
    /// Copy of the intermediate raster to keep after the run.
    #[serde(default)]
    pub keep_raster: Option<PathBuf>,
}

fn default_no_data() -> i64 {
    DEFAULT_NO_DATA_VALUE
}

fn default_burn() -> i64 {
    DEFAULT_BURN_VALUE
}

fn default_true() -> bool {
    true
}

fn default_max_span() -> f64 {
    DEFAULT_MAX_LATITUDE_SPAN_DEGREES
}

fn default_max_pixels() -> u64 {
    DEFAULT_MAX_PIXELS
}

impl RasterizeConfig {
    pub fn new(resolution_meters: f64) -> Self {
        Self {
            resolution_meters,
            no_data_value: DEFAULT_NO_DATA_VALUE,
            burn_value: DEFAULT_BURN_VALUE,
            include_no_data: true,
            max_latitude_span_degrees: DEFAULT_MAX_LATITUDE_SPAN_DEGREES,
            max_pixels: DEFAULT_MAX_PIXELS,
            keep_raster: None,
        }
    }

    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> RasterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RasterError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| RasterError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Checks the values against the constraints of a single-band byte raster.
    pub fn validate(&self) -> RasterResult<()> {
        if !self.resolution_meters.is_finite() || self.resolution_meters <= 0.0 {
            return Err(RasterError::Config(format!(
                "resolution must be a positive number of meters, got {}",
                self.resolution_meters
            )));
        }
        for (name, value) in [
            ("no_data_value", self.no_data_value),
            ("burn_value", self.burn_value),
        ] {
            if u8::try_from(value).is_err() {
                return Err(RasterError::Config(format!(
                    "{name} must fit in a byte (0..=255), got {value}"
                )));
            }
        }
        if self.burn_value == self.no_data_value {
            return Err(RasterError::Config(format!(
                "burn value and no-data value are both {}",
                self.burn_value
            )));
        }
        if !self.max_latitude_span_degrees.is_finite() || self.max_latitude_span_degrees <= 0.0 {
            return Err(RasterError::Config(format!(
                "max_latitude_span_degrees must be positive, got {}",
                self.max_latitude_span_degrees
            )));
        }
        if self.max_pixels == 0 {
            return Err(RasterError::Config("max_pixels must be positive".into()));
        }
        Ok(())
    }

    pub(crate) fn no_data_byte(&self) -> u8 {
        self.no_data_value as u8
    }

    pub(crate) fn burn_byte(&self) -> u8 {
        self.burn_value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_new_uses_defaults() {
        let config = RasterizeConfig::new(2.0);
        assert_eq!(config.no_data_value, 0);
        assert_eq!(config.burn_value, 128);
        assert!(config.include_no_data);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "resolution_meters": 5.0, "include_no_data": false }}"#).unwrap();

        let config = RasterizeConfig::load(file.path()).unwrap();
        assert_eq!(config.resolution_meters, 5.0);
        assert!(!config.include_no_data);
        assert_eq!(config.burn_value, DEFAULT_BURN_VALUE);
        assert_eq!(config.max_pixels, DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "resolution_meters": 5.0, "resolution": 3 }}"#).unwrap();

        assert!(matches!(
            RasterizeConfig::load(file.path()),
            Err(RasterError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = RasterizeConfig::load("/nonexistent/rasterize.json");
        assert!(matches!(result, Err(RasterError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RasterizeConfig::new(0.0);
        assert!(config.validate().is_err());

        config.resolution_meters = f64::NAN;
        assert!(config.validate().is_err());

        config.resolution_meters = 1.0;
        config.burn_value = 0;
        assert!(config.validate().is_err());

        config.burn_value = 300;
        assert!(config.validate().is_err());

        config.burn_value = 255;
        config.no_data_value = -1;
        assert!(config.validate().is_err());
    }
}
