//! Nearest-neighbour fill for target pixels the coordinate map misses

use crate::core::transfer::source_value;
use crate::io::raster::RasterProvider;
use crate::types::CoordinateMap;

/// Source pixel chosen for a gap, its sample and its planar distance in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapCandidate {
    pub source: (usize, usize),
    pub value: f64,
    pub distance: f64,
    pub window: usize,
}

/// Searches growing square windows around a target pixel for mapped neighbours
pub struct GapFiller<'a> {
    map: &'a CoordinateMap,
    source: &'a dyn RasterProvider,
    target: &'a dyn RasterProvider,
    max_window: usize,
}

impl<'a> GapFiller<'a> {
    pub fn new(
        map: &'a CoordinateMap,
        source: &'a dyn RasterProvider,
        target: &'a dyn RasterProvider,
        max_window: usize,
    ) -> Self {
        Self {
            map,
            source,
            target,
            max_window,
        }
    }

    /// Closest mapped neighbour of target pixel (x, y) whose `band` sample is valid.
    ///
    /// Windows 3, 5, ... up to `max_window` are scanned in turn; the first one
    /// holding any candidate decides, ties going to the earliest in row-major order.
    /// Neighbours mapping onto an invalid source sample are not candidates.
    pub fn nearest(&self, band: &str, x: usize, y: usize) -> Option<GapCandidate> {
        let origin = self.target.geo_position(x, y)?;
        let (width, height) = self.target.dimensions();

        let mut window = 3;
        while window <= self.max_window {
            let half = (window / 2) as isize;
            let mut best: Option<GapCandidate> = None;

            for dy in -half..=half {
                for dx in -half..=half {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let (nx, ny) = (x as isize + dx, y as isize + dy);
                    if nx < 0 || ny < 0 || nx as usize >= width || ny as usize >= height {
                        continue;
                    }
                    let Some((sx, sy)) = self.map.lookup_pixel(nx as usize, ny as usize) else {
                        continue;
                    };
                    let Some(position) = self.source.geo_position(sx, sy) else {
                        continue;
                    };

                    let distance = origin.planar_distance(&position);
                    if best.map_or(true, |b| distance < b.distance) {
                        let Some(value) = source_value(self.source, band, sx, sy) else {
                            continue;
                        };
                        best = Some(GapCandidate {
                            source: (sx, sy),
                            value,
                            distance,
                            window,
                        });
                    }
                }
            }

            if best.is_some() {
                return best;
            }
            window += 2;
        }

        None
    }

    /// Value for target pixel (x, y) from its nearest valid mapped neighbour
    pub fn fill(&self, band: &str, x: usize, y: usize) -> Option<f64> {
        self.nearest(band, x, y).map(|candidate| candidate.value)
    }
}
