use crate::types::{CoregError, CoregResult};
use serde::{Deserialize, Serialize};

/// Largest number of lines read from a calibration variable in one block
pub const DEFAULT_CHUNK_LINES: usize = 10_000;

/// Co-registration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoregistrationConfig {
    /// OLCI band whose calibration file holds the target row/col grid
    pub reference_band: u8,
    /// Scalar variable holding the target row offset in the reference file
    pub row_offset_variable: String,
    /// Line chunk size for calibration reads
    pub chunk_lines: usize,
    /// Overwrite primary samples with positive orphan samples
    pub orphan_recovery: bool,
    /// Nearest-neighbour fill of unmapped pixels
    pub gap_fill: bool,
    /// Largest (odd) gap-fill search window
    pub max_window: usize,
    /// Value written to target pixels without data
    pub no_data_value: f32,
    /// Edge length of the square tiles the target raster is cut into
    pub tile_size: usize,
}

impl Default for CoregistrationConfig {
    fn default() -> Self {
        Self {
            reference_band: 17,
            row_offset_variable: "row_offset".to_string(),
            chunk_lines: DEFAULT_CHUNK_LINES,
            orphan_recovery: true,
            gap_fill: true,
            max_window: 9,
            no_data_value: f32::NAN,
            tile_size: 512,
        }
    }
}

impl CoregistrationConfig {
    /// Check parameter consistency before any file is touched
    pub fn validate(&self) -> CoregResult<()> {
        if self.chunk_lines == 0 || self.chunk_lines > DEFAULT_CHUNK_LINES {
            return Err(CoregError::Config(format!(
                "chunk_lines must be in 1..={}, got {}",
                DEFAULT_CHUNK_LINES, self.chunk_lines
            )));
        }
        if self.max_window < 3 || self.max_window % 2 == 0 {
            return Err(CoregError::Config(format!(
                "max_window must be odd and at least 3, got {}",
                self.max_window
            )));
        }
        if self.tile_size == 0 {
            return Err(CoregError::Config("tile_size must be positive".to_string()));
        }
        if !(1..=21).contains(&self.reference_band) {
            return Err(CoregError::Config(format!(
                "reference_band must be an OLCI band 1..=21, got {}",
                self.reference_band
            )));
        }
        Ok(())
    }

    /// True if `value` is the configured no-data value (NaN aware)
    pub fn is_no_data(&self, value: f32) -> bool {
        if self.no_data_value.is_nan() {
            value.is_nan()
        } else {
            value == self.no_data_value
        }
    }
}
