//! Single-band byte raster: in-memory band, on-disk storage with scoped
//! write/read handles, and geometry burning.

mod burn;
mod store;

pub use burn::burn_geometry;
pub use store::{ClosedRaster, RasterHeader, RasterReader, RasterWriter};

/// Row-major band of byte pixels with a no-data value kept as metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBand {
    width: u32,
    height: u32,
    no_data_value: u8,
    data: Vec<u8>,
}

impl RasterBand {
    /// Band whose every pixel reads as `no_data_value` until written.
    pub fn new(width: u32, height: u32, no_data_value: u8) -> Self {
        Self {
            width,
            height,
            no_data_value,
            data: vec![no_data_value; width as usize * height as usize],
        }
    }

    /// Wraps decoded pixels; `None` when the buffer does not match the size.
    pub fn from_data(width: u32, height: u32, no_data_value: u8, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            no_data_value,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn no_data_value(&self) -> u8 {
        self.no_data_value
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, col: u32, row: u32) -> u8 {
        self.data[self.index(col, row)]
    }

    pub fn set(&mut self, col: u32, row: u32, value: u8) {
        let i = self.index(col, row);
        self.data[i] = value;
    }

    /// Writes `value` when `(col, row)` lies inside the band; ignored otherwise.
    pub fn set_checked(&mut self, col: i64, row: i64, value: u8) {
        if col >= 0 && row >= 0 && col < self.width as i64 && row < self.height as i64 {
            self.set(col as u32, row as u32, value);
        }
    }

    /// Number of pixels holding something other than the no-data value.
    pub fn count_data_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v != self.no_data_value).count()
    }

    fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.width as usize + col as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_band_reads_no_data() {
        let band = RasterBand::new(3, 2, 7);
        assert!(band.data().iter().all(|&v| v == 7));
        assert_eq!(band.count_data_pixels(), 0);
    }

    #[test]
    fn test_set_checked_ignores_outside() {
        let mut band = RasterBand::new(2, 2, 0);
        band.set_checked(-1, 0, 9);
        band.set_checked(0, 2, 9);
        band.set_checked(1, 1, 9);
        assert_eq!(band.count_data_pixels(), 1);
        assert_eq!(band.get(1, 1), 9);
    }

    #[test]
    fn test_from_data_checks_length() {
        assert!(RasterBand::from_data(2, 2, 0, vec![0; 3]).is_none());
        assert!(RasterBand::from_data(2, 2, 0, vec![0; 4]).is_some());
    }
}
