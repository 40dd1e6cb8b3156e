//! Raster to vector conversion: one polygon per 4-connected region of equal
//! pixel value.
//!
//! Regions are labelled with a flood fill, then each region's boundary is
//! walked along pixel edges with the region on the right-hand side (in pixel
//! space, rows growing downward). Where two pixels of the same region touch
//! only at a corner the walk turns left, which keeps the exterior a single
//! simple ring and lets a hole touch it at that corner instead of merging into
//! it. Traced rings are clockwise on screen; when the transform mirrors the
//! row axis (north-up rasters) they are reversed, so exteriors come out
//! counter-clockwise and holes clockwise on the ground.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{RasterError, RasterResult};
use crate::grid::GeoTransform;
use crate::raster::RasterBand;

/// One connected region of the band.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub value: u8,
    pub pixel_count: usize,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    East,
    South,
    West,
    North,
}

impl Dir {
    fn delta(self) -> (i64, i64) {
        match self {
            Dir::East => (1, 0),
            Dir::South => (0, 1),
            Dir::West => (-1, 0),
            Dir::North => (0, -1),
        }
    }

    fn right(self) -> Dir {
        match self {
            Dir::East => Dir::South,
            Dir::South => Dir::West,
            Dir::West => Dir::North,
            Dir::North => Dir::East,
        }
    }

    fn left(self) -> Dir {
        match self {
            Dir::East => Dir::North,
            Dir::South => Dir::East,
            Dir::West => Dir::South,
            Dir::North => Dir::West,
        }
    }

    /// Preference when leaving a vertex: left turn, straight, right turn.
    fn rank_after(self, next: Dir) -> u8 {
        if next == self.left() {
            0
        } else if next == self {
            1
        } else if next == self.right() {
            2
        } else {
            3
        }
    }
}

type Vertex = (u32, u32);

#[derive(Debug, Clone, Copy)]
struct Edge {
    start: Vertex,
    dir: Dir,
}

impl Edge {
    fn end(&self) -> Vertex {
        let (dx, dy) = self.dir.delta();
        (
            (self.start.0 as i64 + dx) as u32,
            (self.start.1 as i64 + dy) as u32,
        )
    }
}

/// Labels 4-connected regions in row-major order of their first pixel.
/// Returns the label per pixel and the value of each label.
fn label_regions(band: &RasterBand) -> (Vec<u32>, Vec<u8>) {
    let (w, h) = (band.width() as usize, band.height() as usize);
    let data = band.data();
    let mut labels = vec![u32::MAX; w * h];
    let mut values = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..w * h {
        if labels[seed] != u32::MAX {
            continue;
        }
        let label = values.len() as u32;
        let value = data[seed];
        values.push(value);
        labels[seed] = label;
        stack.push(seed);

        while let Some(i) = stack.pop() {
            let (col, row) = (i % w, i / w);
            let mut visit = |j: usize| {
                if labels[j] == u32::MAX && data[j] == value {
                    labels[j] = label;
                    stack.push(j);
                }
            };
            if col > 0 {
                visit(i - 1);
            }
            if col + 1 < w {
                visit(i + 1);
            }
            if row > 0 {
                visit(i - w);
            }
            if row + 1 < h {
                visit(i + w);
            }
        }
    }

    (labels, values)
}

/// Converts every region of `band` into a polygon. Regions holding the band's
/// no-data value are skipped unless `include_no_data` is set.
#[tracing::instrument(skip_all, fields(width = band.width(), height = band.height()))]
pub fn polygonize(
    band: &RasterBand,
    transform: &GeoTransform,
    include_no_data: bool,
) -> RasterResult<Vec<Region>> {
    let (w, h) = (band.width() as usize, band.height() as usize);
    let (labels, values) = label_regions(band);
    let wanted = |label: u32| include_no_data || values[label as usize] != band.no_data_value();

    let mut edges: Vec<Vec<Edge>> = vec![Vec::new(); values.len()];
    let mut pixel_counts = vec![0usize; values.len()];

    for row in 0..h {
        for col in 0..w {
            let i = row * w + col;
            let label = labels[i];
            if !wanted(label) {
                continue;
            }
            pixel_counts[label as usize] += 1;

            let (c, r) = (col as u32, row as u32);
            let region_edges = &mut edges[label as usize];
            if row == 0 || labels[i - w] != label {
                region_edges.push(Edge { start: (c, r), dir: Dir::East });
            }
            if col + 1 == w || labels[i + 1] != label {
                region_edges.push(Edge { start: (c + 1, r), dir: Dir::South });
            }
            if row + 1 == h || labels[i + w] != label {
                region_edges.push(Edge { start: (c + 1, r + 1), dir: Dir::West });
            }
            if col == 0 || labels[i - 1] != label {
                region_edges.push(Edge { start: (c, r + 1), dir: Dir::North });
            }
        }
    }

    let mut regions = Vec::new();
    for (label, region_edges) in edges.into_iter().enumerate() {
        if region_edges.is_empty() {
            continue;
        }
        let rings = trace_rings(&region_edges)?;
        let polygon = assemble_polygon(rings, transform).ok_or_else(|| {
            RasterError::library(
                "polygonize",
                format!("region {label} does not have exactly one exterior ring"),
            )
        })?;
        regions.push(Region {
            value: values[label],
            pixel_count: pixel_counts[label],
            geometry: MultiPolygon::new(vec![polygon]),
        });
    }

    debug!(regions = regions.len(), labelled = values.len(), "Raster polygonized");
    Ok(regions)
}

/// Chains a region's boundary edges into closed rings of corner vertices.
fn trace_rings(edges: &[Edge]) -> RasterResult<Vec<Vec<Vertex>>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.start).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        let mut walk: Vec<(Vertex, Dir)> = Vec::new();
        let mut current = first;

        loop {
            used[current] = true;
            let edge = edges[current];
            walk.push((edge.start, edge.dir));

            let next = outgoing
                .get(&edge.end())
                .into_iter()
                .flatten()
                .copied()
                .filter(|&j| !used[j] || j == first)
                .min_by_key(|&j| edge.dir.rank_after(edges[j].dir));

            match next {
                Some(j) if j == first => break,
                Some(j) => current = j,
                None => {
                    return Err(RasterError::library(
                        "polygonize",
                        format!("open boundary at vertex {:?}", edge.end()),
                    ));
                }
            }
        }

        // keep only corners
        let n = walk.len();
        let ring: Vec<Vertex> = (0..n)
            .filter(|&k| walk[(k + n - 1) % n].1 != walk[k].1)
            .map(|k| walk[k].0)
            .collect();
        rings.push(ring);
    }

    Ok(rings)
}

/// Twice the signed area in pixel space; positive for exterior rings.
fn doubled_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|k| {
            let (x0, y0) = (ring[k].0 as i64, ring[k].1 as i64);
            let (x1, y1) = (ring[(k + 1) % n].0 as i64, ring[(k + 1) % n].1 as i64);
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn assemble_polygon(rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Option<Polygon<f64>> {
    let (exteriors, holes): (Vec<_>, Vec<_>) =
        rings.into_iter().partition(|ring| doubled_area(ring) > 0);
    let [exterior] = <[Vec<Vertex>; 1]>::try_from(exteriors).ok()?;

    // negative determinant: pixel space and ground have opposite handedness
    let mirrored = transform.pixel_width() * transform.pixel_height() < 0.0;

    let to_line_string = |mut ring: Vec<Vertex>| {
        if mirrored {
            ring.reverse();
        }
        let mut coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(c, r)| {
                let (x, y) = transform.apply(c as f64, r as f64);
                Coord { x, y }
            })
            .collect();
        coords.push(coords[0]);
        LineString::new(coords)
    };

    Some(Polygon::new(
        to_line_string(exterior),
        holes.into_iter().map(to_line_string).collect(),
    ))
}
