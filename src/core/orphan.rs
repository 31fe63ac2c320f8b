//! Orphan pixel recovery
//!
//! Orphan pixels are source samples that fell outside the primary instrument
//! grid but were kept in a per-band companion file `{band}_orphan.nc`. The file
//! is optional; whether it exists is decided once when the map is built.

use crate::config::CoregistrationConfig;
use crate::io::array::CalibrationStore;
use crate::types::{CancelFlag, CoregError, CoregResult};
use ndarray::Array2;

/// Variable holding the orphan samples
pub const ORPHAN_VARIABLE: &str = "orphan";

pub fn orphan_file_name(band_name: &str) -> String {
    format!("{}_orphan.nc", band_name)
}

/// Orphan samples for one band on the target image grid
#[derive(Debug, Clone)]
pub struct OrphanMap {
    /// Physical values indexed `[y, x]`, cropped to the target grid; NaN where absent
    samples: Array2<f64>,
    count: usize,
}

impl OrphanMap {
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Physical orphan value for image pixel (x, y)
    pub fn value(&self, x: usize, y: usize) -> Option<f64> {
        self.samples.get((y, x)).copied().filter(|v| !v.is_nan())
    }
}

/// Orphan recovery capability for one band
#[derive(Debug, Clone)]
pub enum OrphanRecovery {
    /// No companion file, or recovery switched off
    Unavailable,
    Available(OrphanMap),
}

impl OrphanRecovery {
    pub fn is_available(&self) -> bool {
        matches!(self, OrphanRecovery::Available(_))
    }

    pub fn value(&self, x: usize, y: usize) -> Option<f64> {
        match self {
            OrphanRecovery::Unavailable => None,
            OrphanRecovery::Available(map) => map.value(x, y),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OrphanRecovery::Unavailable => 0,
            OrphanRecovery::Available(map) => map.len(),
        }
    }
}

/// Load the orphan companion of `band_name` from `store`.
///
/// A missing companion file yields [`OrphanRecovery::Unavailable`]. A file that
/// exists but is malformed is an error.
pub fn build_orphan_map(
    store: &dyn CalibrationStore,
    band_name: &str,
    target_dims: (usize, usize),
    config: &CoregistrationConfig,
    cancel: &CancelFlag,
) -> CoregResult<OrphanRecovery> {
    if !config.orphan_recovery {
        return Ok(OrphanRecovery::Unavailable);
    }

    let file_name = orphan_file_name(band_name);
    if !store.contains(&file_name) {
        log::debug!("No orphan file {} in {}", file_name, store.location());
        return Ok(OrphanRecovery::Unavailable);
    }

    let file = store.open(&file_name)?;
    let dims = file.dimensions(ORPHAN_VARIABLE)?;
    if dims.len() != 2 {
        return Err(CoregError::Schema(format!(
            "{}:{} has {} dimensions, expected 2 (row, col)",
            file.location(),
            ORPHAN_VARIABLE,
            dims.len()
        )));
    }

    let (rows, cols) = (dims[0].size, dims[1].size);
    let (width, height) = target_dims;
    // array axis 0 is the image row (y), axis 1 the column (x)
    let mut samples = Array2::from_elem((rows.min(height), cols.min(width)), f64::NAN);
    let mut count = 0;
    let chunk_rows = config.chunk_lines.max(1);

    let mut first = 0;
    while first < rows {
        cancel.check()?;
        let block_rows = (rows - first).min(chunk_rows);
        let block = file.read_block(ORPHAN_VARIABLE, &[first, 0], &[block_rows, cols])?;

        for r in 0..block_rows {
            let row = first + r;
            if row >= height {
                continue;
            }
            for col in 0..cols.min(width) {
                if let Some(value) = block.value(&[r, col]) {
                    samples[[row, col]] = value;
                    count += 1;
                }
            }
        }
        first += block_rows;
    }

    log::info!(
        "Orphan map {}: {} pixels from a {}x{} array",
        band_name,
        count,
        cols,
        rows
    );
    Ok(OrphanRecovery::Available(OrphanMap { samples, count }))
}
