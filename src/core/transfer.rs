//! Tile-wise transfer of source samples onto the target grid
//!
//! Each tile reads the shared coordinate and orphan maps and writes only its
//! own buffers, so tiles run independently (in parallel with the `parallel`
//! feature). The maps are never modified here.

use crate::config::CoregistrationConfig;
use crate::core::gap_fill::GapFiller;
use crate::core::orphan::OrphanRecovery;
use crate::io::raster::RasterProvider;
use crate::types::{CancelFlag, CoordinateMap, CoregError, CoregResult, PixelProvenance};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source sample at (x, y) if the source marks it valid and it is not negative
pub fn source_value(source: &dyn RasterProvider, band: &str, x: usize, y: usize) -> Option<f64> {
    if !source.is_valid(band, x, y) {
        return None;
    }
    source.sample(band, x, y).filter(|v| v.is_finite() && *v >= 0.0)
}

/// Rectangle of target pixels `[x0, x0 + width) x [y0, y0 + height)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x0: usize,
    pub y0: usize,
    pub width: usize,
    pub height: usize,
}

impl TileRect {
    pub fn new(x0: usize, y0: usize, width: usize, height: usize) -> Self {
        Self { x0, y0, width, height }
    }

    /// Cover a `(width, height)` raster with tiles of at most `tile_size` square,
    /// row by row
    pub fn tiling((width, height): (usize, usize), tile_size: usize) -> Vec<TileRect> {
        let step = tile_size.max(1);
        let mut tiles = Vec::new();
        for y0 in (0..height).step_by(step) {
            for x0 in (0..width).step_by(step) {
                tiles.push(TileRect::new(x0, y0, step.min(width - x0), step.min(height - y0)));
            }
        }
        tiles
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Pixel counts by outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub mapped: usize,
    pub orphan: usize,
    pub gap_filled: usize,
    pub gap: usize,
    pub covered: usize,
    pub fill_flagged: usize,
}

impl TransferStats {
    fn record(&mut self, provenance: PixelProvenance) {
        match provenance {
            PixelProvenance::Mapped => self.mapped += 1,
            PixelProvenance::Orphan => self.orphan += 1,
            PixelProvenance::GapFilled => self.gap_filled += 1,
            PixelProvenance::Gap => self.gap += 1,
        }
    }

    pub fn merge(&mut self, other: &TransferStats) {
        self.mapped += other.mapped;
        self.orphan += other.orphan;
        self.gap_filled += other.gap_filled;
        self.gap += other.gap;
        self.covered += other.covered;
        self.fill_flagged += other.fill_flagged;
    }

    pub fn total(&self) -> usize {
        self.mapped + self.orphan + self.gap_filled + self.gap
    }
}

/// Output buffers of one tile, indexed `[row, col]` relative to the tile origin
#[derive(Debug, Clone)]
pub struct TransferTile {
    pub rect: TileRect,
    pub values: Array2<f32>,
    pub coverage: Array2<u8>,
    pub fill: Array2<u8>,
    pub provenance: Array2<PixelProvenance>,
    pub stats: TransferStats,
}

impl TransferTile {
    pub fn new(rect: TileRect, no_data: f32) -> Self {
        let shape = (rect.height, rect.width);
        Self {
            rect,
            values: Array2::from_elem(shape, no_data),
            coverage: Array2::zeros(shape),
            fill: Array2::zeros(shape),
            provenance: Array2::from_elem(shape, PixelProvenance::Gap),
            stats: TransferStats::default(),
        }
    }

    fn local(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let r = &self.rect;
        if x >= r.x0 && y >= r.y0 && x < r.x0 + r.width && y < r.y0 + r.height {
            Some((y - r.y0, x - r.x0))
        } else {
            None
        }
    }

    /// Write a value at global target pixel (x, y); pixels outside the tile are ignored
    pub fn set_sample(&mut self, x: usize, y: usize, value: f32) {
        if let Some(index) = self.local(x, y) {
            self.values[index] = value;
        }
    }

    /// Value at global target pixel (x, y)
    pub fn sample(&self, x: usize, y: usize) -> Option<f32> {
        self.local(x, y).map(|index| self.values[index])
    }
}

/// A full target-sized band assembled from tiles
#[derive(Debug, Clone)]
pub struct BandOutput {
    pub band: String,
    pub values: Array2<f32>,
    pub coverage: Array2<u8>,
    pub fill: Array2<u8>,
    pub provenance: Array2<PixelProvenance>,
    pub stats: TransferStats,
}

/// Stitch tiles into arrays of the target's dimensions
pub fn assemble_band(
    band: &str,
    (width, height): (usize, usize),
    tiles: Vec<TransferTile>,
    no_data: f32,
) -> CoregResult<BandOutput> {
    let mut output = BandOutput {
        band: band.to_string(),
        values: Array2::from_elem((height, width), no_data),
        coverage: Array2::zeros((height, width)),
        fill: Array2::zeros((height, width)),
        provenance: Array2::from_elem((height, width), PixelProvenance::Gap),
        stats: TransferStats::default(),
    };

    for tile in tiles {
        let r = tile.rect;
        if r.x0 + r.width > width || r.y0 + r.height > height {
            return Err(CoregError::Range(format!(
                "tile at ({}, {}) of {}x{} exceeds the {}x{} target",
                r.x0, r.y0, r.width, r.height, width, height
            )));
        }
        let (rows, cols) = (r.y0..r.y0 + r.height, r.x0..r.x0 + r.width);
        output.values.slice_mut(s![rows.clone(), cols.clone()]).assign(&tile.values);
        output.coverage.slice_mut(s![rows.clone(), cols.clone()]).assign(&tile.coverage);
        output.fill.slice_mut(s![rows.clone(), cols.clone()]).assign(&tile.fill);
        output.provenance.slice_mut(s![rows, cols]).assign(&tile.provenance);
        output.stats.merge(&tile.stats);
    }

    Ok(output)
}

/// Moves one band's samples from the source raster onto the target grid
pub struct PixelTransferEngine<'a> {
    band: &'a str,
    map: Arc<CoordinateMap>,
    orphans: &'a OrphanRecovery,
    source: &'a dyn RasterProvider,
    target: &'a dyn RasterProvider,
    config: &'a CoregistrationConfig,
    cancel: CancelFlag,
}

impl<'a> PixelTransferEngine<'a> {
    pub fn new(
        band: &'a str,
        map: Arc<CoordinateMap>,
        orphans: &'a OrphanRecovery,
        source: &'a dyn RasterProvider,
        target: &'a dyn RasterProvider,
        config: &'a CoregistrationConfig,
    ) -> Self {
        Self {
            band,
            map,
            orphans,
            source,
            target,
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fill one tile
    pub fn transfer_tile(&self, rect: TileRect) -> CoregResult<TransferTile> {
        self.cancel.check()?;

        let mut tile = TransferTile::new(rect, self.config.no_data_value);
        let has_band = self.source.has_band(self.band);
        if !has_band {
            log::warn!(
                "Source band {} missing, tile ({}, {}) left at no-data",
                self.band,
                rect.x0,
                rect.y0
            );
        }

        let filler = GapFiller::new(&self.map, self.source, self.target, self.config.max_window);

        for row in 0..rect.height {
            self.cancel.check()?;
            let y = rect.y0 + row;

            for col in 0..rect.width {
                let x = rect.x0 + col;
                let primary = self.map.lookup_pixel(x, y);

                let mut value = None;
                let mut provenance = PixelProvenance::Gap;
                if has_band {
                    if let Some(v) = primary.and_then(|(sx, sy)| source_value(self.source, self.band, sx, sy)) {
                        value = Some(v);
                        provenance = PixelProvenance::Mapped;
                    }
                    if let Some(v) = self.orphans.value(x, y).filter(|v| *v > 0.0) {
                        value = Some(v);
                        provenance = PixelProvenance::Orphan;
                    }
                }

                let covered = primary.is_some();
                // unmapped, yet the source product marks the pixel as carrying data
                let recoverable = !covered && self.source.is_valid(self.band, x, y);

                if value.is_none() && recoverable && has_band && self.config.gap_fill {
                    if let Some(v) = filler.fill(self.band, x, y) {
                        value = Some(v);
                        provenance = PixelProvenance::GapFilled;
                    }
                }

                if let Some(v) = value {
                    tile.values[[row, col]] = v as f32;
                }
                tile.coverage[[row, col]] = covered as u8;
                tile.fill[[row, col]] = recoverable as u8;
                tile.provenance[[row, col]] = provenance;

                tile.stats.record(provenance);
                tile.stats.covered += covered as usize;
                tile.stats.fill_flagged += recoverable as usize;
            }
        }

        Ok(tile)
    }

    /// Process every tile of the target raster and assemble the band
    pub fn transfer_all(&self) -> CoregResult<BandOutput> {
        let dims = self.target.dimensions();
        let rects = TileRect::tiling(dims, self.config.tile_size);
        log::info!(
            "Transferring {} onto {}x{} target in {} tiles",
            self.band,
            dims.0,
            dims.1,
            rects.len()
        );

        #[cfg(feature = "parallel")]
        let tiles = {
            use rayon::prelude::*;
            rects
                .into_par_iter()
                .map(|rect| self.transfer_tile(rect))
                .collect::<CoregResult<Vec<_>>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let tiles = rects
            .into_iter()
            .map(|rect| self.transfer_tile(rect))
            .collect::<CoregResult<Vec<_>>>()?;

        let output = assemble_band(self.band, dims, tiles, self.config.no_data_value)?;
        log::info!(
            "Band {}: {} mapped, {} orphan, {} gap-filled, {} left empty",
            self.band,
            output.stats.mapped,
            output.stats.orphan,
            output.stats.gap_filled,
            output.stats.gap
        );
        Ok(output)
    }
}
