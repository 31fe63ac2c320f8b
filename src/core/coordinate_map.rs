//! Source-image to target-image correspondence through the instrument grid
//!
//! Two sparse maps are read from the calibration files:
//!
//! * stage A, per source band: source image `(col, row)` -> instrument
//!   `(camera, line, detector)`
//! * stage B, once per product pair: instrument `(camera, line, detector)` ->
//!   target image `(col, row)`, rows shifted by the reference row offset
//!
//! and composed into target image -> source image. Both stages read the
//! `(N_CAM, N_LINE_OLC, N_DET_CAM)` grid in line chunks so peak memory stays
//! bounded by the chunk size, not by the file.

use crate::config::CoregistrationConfig;
use crate::core::resolver::{BandFamily, GridResolver};
use crate::io::array::{CalibrationSource, CalibrationStore, Dimension};
use crate::types::{BandIdentity, CancelFlag, CoordinateMap, CoregError, CoregResult, GridCoordinate};

pub const CAMERA_DIM: &str = "N_CAM";
pub const LINE_DIM: &str = "N_LINE_OLC";
pub const DETECTOR_DIM: &str = "N_DET_CAM";

/// Position of the camera, line and detector axes inside a 3-D variable
#[derive(Debug, Clone, PartialEq)]
struct GridLayout {
    axes: [usize; 3],
    dims: Vec<Dimension>,
}

impl GridLayout {
    fn locate(file: &dyn CalibrationSource, variable: &str) -> CoregResult<Self> {
        let dims = file.dimensions(variable)?;
        if dims.len() != 3 {
            return Err(CoregError::Schema(format!(
                "{}:{} has {} dimensions, expected {}/{}/{}",
                file.location(),
                variable,
                dims.len(),
                CAMERA_DIM,
                LINE_DIM,
                DETECTOR_DIM
            )));
        }

        let position = |name: &str| {
            dims.iter().position(|d| d.name == name).ok_or_else(|| {
                CoregError::Schema(format!(
                    "{}:{} has no {} dimension",
                    file.location(),
                    variable,
                    name
                ))
            })
        };
        let axes = [position(CAMERA_DIM)?, position(LINE_DIM)?, position(DETECTOR_DIM)?];

        Ok(Self { axes, dims })
    }

    fn cameras(&self) -> usize {
        self.dims[self.axes[0]].size
    }

    fn lines(&self) -> usize {
        self.dims[self.axes[1]].size
    }

    fn detectors(&self) -> usize {
        self.dims[self.axes[2]].size
    }

    /// Block covering every camera and detector for `count` lines from `first`
    fn block(&self, first: usize, count: usize) -> (Vec<usize>, Vec<usize>) {
        let mut start = vec![0; 3];
        let mut shape: Vec<usize> = self.dims.iter().map(|d| d.size).collect();
        start[self.axes[1]] = first;
        shape[self.axes[1]] = count;
        (start, shape)
    }

    fn index(&self, camera: usize, line: usize, detector: usize) -> [usize; 3] {
        let mut index = [0; 3];
        index[self.axes[0]] = camera;
        index[self.axes[1]] = line;
        index[self.axes[2]] = detector;
        index
    }
}

/// Counters for one pass over an instrument grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub visited: usize,
    pub kept: usize,
    pub dropped: usize,
    pub chunks: usize,
}

/// Image coordinate for a (col, row) pair if it lies in `[0, width) x [0, height)`
pub fn image_coordinate(col: f64, row: f64, (width, height): (usize, usize)) -> Option<GridCoordinate> {
    if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
        return None;
    }
    let (col, row) = (col.round() as usize, row.round() as usize);
    if col < width && row < height {
        Some(GridCoordinate::image(col as u32, row as u32))
    } else {
        None
    }
}

/// Compose stage A (`aux -> instrument`) with stage B (`instrument -> target`)
/// into `target -> aux`. Stage A entries without a stage B match are dropped.
pub fn compose(stage_a: &CoordinateMap, stage_b: &CoordinateMap) -> CoordinateMap {
    let mut composed = CoordinateMap::with_capacity(stage_a.len().min(stage_b.len()));

    for (aux, instrument) in stage_a.sorted_entries() {
        if let Some(target) = stage_b.get(&instrument) {
            composed.insert_min(*target, aux);
        }
    }

    log::debug!(
        "Composed {} of {} stage A entries through {} stage B entries",
        composed.len(),
        stage_a.len(),
        stage_b.len()
    );
    composed
}

/// Builds coordinate maps from a store of calibration files
pub struct CoordinateMapBuilder<'a> {
    store: &'a dyn CalibrationStore,
    config: &'a CoregistrationConfig,
    resolver: GridResolver,
    cancel: CancelFlag,
}

impl<'a> CoordinateMapBuilder<'a> {
    pub fn new(store: &'a dyn CalibrationStore, config: &'a CoregistrationConfig) -> Self {
        Self {
            store,
            config,
            resolver: GridResolver::standard(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: GridResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk the row/col variables chunk by chunk, handing every present
    /// `(instrument, row, col)` triple to `visit`, which reports whether it kept it
    fn scan_grid<F>(
        &self,
        file: &dyn CalibrationSource,
        row_var: &str,
        col_var: &str,
        mut visit: F,
    ) -> CoregResult<ScanStats>
    where
        F: FnMut(GridCoordinate, f64, f64) -> bool,
    {
        let layout = GridLayout::locate(file, row_var)?;
        if GridLayout::locate(file, col_var)? != layout {
            return Err(CoregError::Schema(format!(
                "{}: {} and {} have different shapes",
                file.location(),
                row_var,
                col_var
            )));
        }

        let (cameras, lines, detectors) = (layout.cameras(), layout.lines(), layout.detectors());
        let chunk_lines = self.config.chunk_lines.max(1);
        let mut stats = ScanStats::default();

        let mut first = 0;
        while first < lines {
            self.cancel.check()?;

            let count = (lines - first).min(chunk_lines);
            let (start, shape) = layout.block(first, count);
            let rows = file.read_block(row_var, &start, &shape)?;
            let cols = file.read_block(col_var, &start, &shape)?;
            log::debug!(
                "{}: lines {}..{} of {} ({:?} rows, {:?} cols)",
                file.location(),
                first,
                first + count,
                lines,
                rows.element,
                cols.element
            );

            for camera in 0..cameras {
                for line in 0..count {
                    for detector in 0..detectors {
                        let index = layout.index(camera, line, detector);
                        stats.visited += 1;

                        let kept = match (rows.value(&index), cols.value(&index)) {
                            (Some(row), Some(col)) => {
                                let instrument = GridCoordinate::instrument(
                                    camera as u32,
                                    (first + line) as u32,
                                    detector as u32,
                                );
                                visit(instrument, row, col)
                            }
                            _ => false,
                        };

                        if kept {
                            stats.kept += 1;
                        } else {
                            stats.dropped += 1;
                        }
                    }
                }
            }

            stats.chunks += 1;
            first += count;
        }

        Ok(stats)
    }

    /// Stage A: source image -> instrument for `band`.
    ///
    /// Entries outside `source_dims` or negative are dropped. When several
    /// instrument pixels land on the same source pixel the lowest
    /// `(camera, line, detector)` is kept.
    pub fn build_source_map(&self, band: BandIdentity, source_dims: (usize, usize)) -> CoregResult<CoordinateMap> {
        let file_name = band.calibration_file_name();
        let file = self.store.open(&file_name)?;
        let (row_var, col_var) = self.resolver.resolve(file.as_ref(), &BandFamily::from(band))?;

        let mut map = CoordinateMap::new();
        let stats = self.scan_grid(file.as_ref(), &row_var, &col_var, |instrument, row, col| {
            match image_coordinate(col, row, source_dims) {
                Some(image) => {
                    map.insert_min(image, instrument);
                    true
                }
                None => false,
            }
        })?;

        log::info!(
            "Stage A {}: {} source pixels from {} grid entries ({} dropped, {} chunks)",
            band,
            map.len(),
            stats.visited,
            stats.dropped,
            stats.chunks
        );
        Ok(map)
    }

    /// Stage B: instrument -> target image for the reference OLCI band
    pub fn build_target_map(&self, target_dims: (usize, usize)) -> CoregResult<CoordinateMap> {
        let reference = BandIdentity::Olci {
            band: self.config.reference_band,
        };
        let file_name = reference.calibration_file_name();
        let file = self.store.open(&file_name)?;
        let (row_var, col_var) = self.resolver.resolve(file.as_ref(), &BandFamily::from(reference))?;
        let row_offset = file.read_scalar(&self.config.row_offset_variable)?;
        log::debug!("{}: row offset {}", file.location(), row_offset);

        let mut map = CoordinateMap::new();
        let stats = self.scan_grid(file.as_ref(), &row_var, &col_var, |instrument, row, col| {
            match image_coordinate(col, row - row_offset, target_dims) {
                Some(image) => {
                    map.insert(instrument, image);
                    true
                }
                None => false,
            }
        })?;

        log::info!(
            "Stage B {}: {} instrument pixels on the target grid ({} dropped, {} chunks)",
            reference,
            map.len(),
            stats.dropped,
            stats.chunks
        );
        Ok(map)
    }

    /// Stage A for `band` composed with an already built stage B map
    pub fn build_band_map(
        &self,
        band: BandIdentity,
        source_dims: (usize, usize),
        target_map: &CoordinateMap,
    ) -> CoregResult<CoordinateMap> {
        let source_map = self.build_source_map(band, source_dims)?;
        self.cancel.check()?;
        let composed = compose(&source_map, target_map);
        log::info!("Band {}: {} target pixels mapped", band, composed.len());
        Ok(composed)
    }
}
