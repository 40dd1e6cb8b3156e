//! On-disk raster storage with scoped write and read handles.
//!
//! A raster is an 8-bit grayscale PNG plus a JSON header sidecar next to it
//! (`burn.png` + `burn.json`) carrying the georeferencing, the no-data value
//! and the spatial reference. The only way to read a raster back is through
//! the [`ClosedRaster`] returned by [`RasterWriter::close`], so a raster is
//! never opened for reading while its write handle is alive.

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RasterBand;
use crate::error::{RasterError, RasterResult};
use crate::grid::{GeoTransform, GridSpec};
use crate::vector::SpatialReference;

/// Georeferencing metadata stored beside the pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterHeader {
    pub width: u32,
    pub height: u32,
    pub geo_transform: GeoTransform,
    pub no_data_value: u8,
    pub spatial_reference: String,
}

fn header_path(path: &Path) -> PathBuf {
    path.with_extension("json")
}

/// Exclusive write handle on a raster being produced.
#[derive(Debug)]
pub struct RasterWriter {
    path: PathBuf,
    file: File,
    header: RasterHeader,
    band: RasterBand,
}

impl RasterWriter {
    /// Creates the raster file at `path` (which must not exist yet) and
    /// allocates a band reading as `no_data_value` everywhere.
    pub fn create(
        path: impl Into<PathBuf>,
        grid: &GridSpec,
        srs: &SpatialReference,
        no_data_value: u8,
    ) -> RasterResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| RasterError::resource(format!("creating raster {}", path.display()), e))?;

        debug!(
            path = %path.display(),
            width = grid.width_px,
            height = grid.height_px,
            "Raster allocated"
        );

        Ok(Self {
            path,
            file,
            header: RasterHeader {
                width: grid.width_px,
                height: grid.height_px,
                geo_transform: grid.transform,
                no_data_value,
                spatial_reference: srs.as_str().to_string(),
            },
            band: RasterBand::new(grid.width_px, grid.height_px, no_data_value),
        })
    }

    pub fn transform(&self) -> GeoTransform {
        self.header.geo_transform
    }

    pub fn band_mut(&mut self) -> &mut RasterBand {
        &mut self.band
    }

    /// Encodes and flushes the pixels and header, then releases the handle.
    pub fn close(self) -> RasterResult<ClosedRaster> {
        let Self {
            path,
            file,
            header,
            band,
        } = self;

        let mut writer = BufWriter::new(file);
        PngEncoder::new(&mut writer)
            .write_image(band.data(), header.width, header.height, image::ColorType::L8)
            .map_err(|e| RasterError::library(format!("encoding {}", path.display()), e))?;
        let file = writer
            .into_inner()
            .map_err(|e| RasterError::resource(format!("flushing {}", path.display()), e.into_error()))?;
        file.sync_all()
            .map_err(|e| RasterError::resource(format!("syncing {}", path.display()), e))?;
        drop(file);

        let header_path = header_path(&path);
        let header_file = File::create(&header_path).map_err(|e| {
            RasterError::resource(format!("creating header {}", header_path.display()), e)
        })?;
        let mut header_writer = BufWriter::new(header_file);
        serde_json::to_writer_pretty(&mut header_writer, &header)
            .map_err(|e| RasterError::library("writing raster header", e))?;
        header_writer
            .flush()
            .map_err(|e| RasterError::resource(format!("flushing {}", header_path.display()), e))?;

        debug!(path = %path.display(), burned = band.count_data_pixels(), "Raster closed");
        Ok(ClosedRaster { path })
    }
}

/// A fully written raster that can be opened for reading.
#[derive(Debug, Clone)]
pub struct ClosedRaster {
    path: PathBuf,
}

impl ClosedRaster {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> RasterResult<RasterReader> {
        RasterReader::open(&self.path)
    }

    /// Copies pixels and header to `dest` (header lands at `dest` with a
    /// `.json` extension).
    pub fn copy_to(&self, dest: &Path) -> RasterResult<()> {
        for (from, to) in [
            (self.path.clone(), dest.to_path_buf()),
            (header_path(&self.path), header_path(dest)),
        ] {
            std::fs::copy(&from, &to).map_err(|e| {
                RasterError::resource(format!("copying {} to {}", from.display(), to.display()), e)
            })?;
        }
        Ok(())
    }
}

/// Read handle on a closed raster.
#[derive(Debug)]
pub struct RasterReader {
    header: RasterHeader,
    band: RasterBand,
}

impl RasterReader {
    fn open(path: &Path) -> RasterResult<Self> {
        let header_path = header_path(path);
        let header_file = File::open(&header_path).map_err(|e| {
            RasterError::resource(format!("opening header {}", header_path.display()), e)
        })?;
        let header: RasterHeader = serde_json::from_reader(BufReader::new(header_file))
            .map_err(|e| RasterError::library(format!("parsing {}", header_path.display()), e))?;

        let file = File::open(path)
            .map_err(|e| RasterError::resource(format!("opening raster {}", path.display()), e))?;
        let image = image::load(BufReader::new(file), ImageFormat::Png)
            .map_err(|e| RasterError::library(format!("decoding {}", path.display()), e))?;
        let pixels = match image {
            DynamicImage::ImageLuma8(buffer) => buffer,
            other => {
                return Err(RasterError::library(
                    format!("decoding {}", path.display()),
                    format!("expected 8-bit single band, found {:?}", other.color()),
                ));
            }
        };

        if pixels.width() != header.width || pixels.height() != header.height {
            return Err(RasterError::library(
                format!("reading {}", path.display()),
                format!(
                    "pixels are {}x{} but header says {}x{}",
                    pixels.width(),
                    pixels.height(),
                    header.width,
                    header.height
                ),
            ));
        }

        let band = RasterBand::from_data(
            header.width,
            header.height,
            header.no_data_value,
            pixels.into_raw(),
        )
        .ok_or_else(|| {
            RasterError::library(format!("reading {}", path.display()), "truncated pixel data")
        })?;

        Ok(Self { header, band })
    }

    pub fn band(&self) -> &RasterBand {
        &self.band
    }

    pub fn transform(&self) -> GeoTransform {
        self.header.geo_transform
    }

    /// Spatial reference parsed from the stored header.
    pub fn spatial_reference(&self) -> RasterResult<SpatialReference> {
        SpatialReference::parse(&self.header.spatial_reference)
    }
}
