//! Burns vector geometries into a [`RasterBand`].
//!
//! Polygons burn every pixel whose center lies inside them (even-odd over all
//! rings, so holes stay untouched). Points burn the pixel containing them and
//! line strings every pixel a segment passes through.

use geo::{Coord, Geometry, LineString, Polygon};

use super::RasterBand;
use crate::grid::GeoTransform;

/// Burns `geometry` into `band` with `value`. Returns nothing: parts falling
/// outside the grid are clipped.
pub fn burn_geometry(
    band: &mut RasterBand,
    transform: &GeoTransform,
    geometry: &Geometry<f64>,
    value: u8,
) {
    match geometry {
        Geometry::Point(p) => burn_point(band, transform, p.0, value),
        Geometry::MultiPoint(mp) => {
            for p in mp {
                burn_point(band, transform, p.0, value);
            }
        }
        Geometry::Line(line) => burn_segment(band, transform, line.start, line.end, value),
        Geometry::LineString(ls) => burn_line_string(band, transform, ls, value),
        Geometry::MultiLineString(mls) => {
            for ls in mls {
                burn_line_string(band, transform, ls, value);
            }
        }
        Geometry::Polygon(poly) => burn_polygon(band, transform, poly, value),
        Geometry::MultiPolygon(mp) => {
            for poly in mp {
                burn_polygon(band, transform, poly, value);
            }
        }
        Geometry::Rect(rect) => burn_polygon(band, transform, &rect.to_polygon(), value),
        Geometry::Triangle(tri) => burn_polygon(band, transform, &tri.to_polygon(), value),
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                burn_geometry(band, transform, g, value);
            }
        }
    }
}

fn burn_point(band: &mut RasterBand, transform: &GeoTransform, c: Coord<f64>, value: u8) {
    let (col, row) = transform.invert(c.x, c.y);
    band.set_checked(col.floor() as i64, row.floor() as i64, value);
}

fn burn_line_string(
    band: &mut RasterBand,
    transform: &GeoTransform,
    ls: &LineString<f64>,
    value: u8,
) {
    if ls.0.len() == 1 {
        burn_point(band, transform, ls.0[0], value);
    }
    for line in ls.lines() {
        burn_segment(band, transform, line.start, line.end, value);
    }
}

/// Grid traversal visiting each pixel the segment crosses.
fn burn_segment(
    band: &mut RasterBand,
    transform: &GeoTransform,
    start: Coord<f64>,
    end: Coord<f64>,
    value: u8,
) {
    let (x0, y0) = transform.invert(start.x, start.y);
    let (x1, y1) = transform.invert(end.x, end.y);

    let mut col = x0.floor() as i64;
    let mut row = y0.floor() as i64;
    let end_col = x1.floor() as i64;
    let end_row = y1.floor() as i64;

    let (dx, dy) = (x1 - x0, y1 - y0);
    let step_col = if dx > 0.0 { 1 } else { -1 };
    let step_row = if dy > 0.0 { 1 } else { -1 };

    let t_delta_col = if dx != 0.0 { (1.0 / dx).abs() } else { f64::INFINITY };
    let t_delta_row = if dy != 0.0 { (1.0 / dy).abs() } else { f64::INFINITY };
    let mut t_max_col = match dx {
        dx if dx > 0.0 => ((col + 1) as f64 - x0) / dx,
        dx if dx < 0.0 => (col as f64 - x0) / dx,
        _ => f64::INFINITY,
    };
    let mut t_max_row = match dy {
        dy if dy > 0.0 => ((row + 1) as f64 - y0) / dy,
        dy if dy < 0.0 => (row as f64 - y0) / dy,
        _ => f64::INFINITY,
    };

    band.set_checked(col, row, value);
    let steps = (end_col - col).abs() + (end_row - row).abs();
    for _ in 0..steps {
        if t_max_col < t_max_row {
            t_max_col += t_delta_col;
            col += step_col;
        } else {
            t_max_row += t_delta_row;
            row += step_row;
        }
        band.set_checked(col, row, value);
    }
}

/// Scanline fill sampled at pixel centers.
fn burn_polygon(band: &mut RasterBand, transform: &GeoTransform, poly: &Polygon<f64>, value: u8) {
    let height = band.height() as usize;
    let width = band.width() as f64;
    let mut crossings: Vec<Vec<f64>> = vec![Vec::new(); height];

    for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
        for line in ring.lines() {
            let (x0, y0) = transform.invert(line.start.x, line.start.y);
            let (x1, y1) = transform.invert(line.end.x, line.end.y);
            if y0 == y1 {
                continue;
            }
            let (top, bottom) = if y0 < y1 { (y0, y1) } else { (y1, y0) };

            // rows whose center c satisfies top <= c < bottom
            let first = ((top - 0.5).ceil().max(0.0)) as usize;
            let last = ((bottom - 0.5).ceil().min(height as f64)).max(0.0) as usize;
            for (row, row_crossings) in crossings.iter_mut().enumerate().take(last).skip(first) {
                let yc = row as f64 + 0.5;
                row_crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
            }
        }
    }

    for (row, xs) in crossings.iter_mut().enumerate() {
        xs.sort_by(f64::total_cmp);
        for pair in xs.chunks_exact(2) {
            let start = (pair[0] - 0.5).ceil().clamp(0.0, width) as u32;
            let end = (pair[1] - 0.5).ceil().clamp(0.0, width) as u32;
            for col in start..end {
                band.set(col, row as u32, value);
            }
        }
    }
}
