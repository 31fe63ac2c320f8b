use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Integer coordinate on either an image grid or an instrument grid.
///
/// The derived ordering compares arity first (image before instrument) and then
/// the elements lexicographically, which is the traversal order used wherever a
/// deterministic walk over a [`CoordinateMap`] is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GridCoordinate {
    /// Processed raster position (col, row)
    Image { col: u32, row: u32 },
    /// Native sensor position (camera, line, detector)
    Instrument { camera: u32, line: u32, detector: u32 },
}

impl GridCoordinate {
    pub fn image(col: u32, row: u32) -> Self {
        GridCoordinate::Image { col, row }
    }

    pub fn instrument(camera: u32, line: u32, detector: u32) -> Self {
        GridCoordinate::Instrument { camera, line, detector }
    }

    pub fn arity(&self) -> usize {
        match self {
            GridCoordinate::Image { .. } => 2,
            GridCoordinate::Instrument { .. } => 3,
        }
    }

    pub fn elements(&self) -> Vec<u32> {
        match *self {
            GridCoordinate::Image { col, row } => vec![col, row],
            GridCoordinate::Instrument { camera, line, detector } => vec![camera, line, detector],
        }
    }

    /// (col, row) for image coordinates
    pub fn as_image(&self) -> Option<(usize, usize)> {
        match *self {
            GridCoordinate::Image { col, row } => Some((col as usize, row as usize)),
            GridCoordinate::Instrument { .. } => None,
        }
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridCoordinate::Image { col, row } => write!(f, "({}, {})", col, row),
            GridCoordinate::Instrument { camera, line, detector } => {
                write!(f, "({}, {}, {})", camera, line, detector)
            }
        }
    }
}

/// Sparse correspondence between two grids.
///
/// Hash-keyed; iteration order is unspecified. Use [`CoordinateMap::sorted_entries`]
/// when a reproducible traversal is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateMap {
    entries: HashMap<GridCoordinate, GridCoordinate>,
}

impl CoordinateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a correspondence, replacing any previous value for `key`
    pub fn insert(&mut self, key: GridCoordinate, value: GridCoordinate) -> Option<GridCoordinate> {
        self.entries.insert(key, value)
    }

    /// Insert unless `key` already maps to a value that sorts lower.
    ///
    /// The outcome does not depend on insertion order. Returns true if the map changed.
    pub fn insert_min(&mut self, key: GridCoordinate, value: GridCoordinate) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if value < *entry.get() {
                    entry.insert(value);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    pub fn get(&self, key: &GridCoordinate) -> Option<&GridCoordinate> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &GridCoordinate) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridCoordinate, &GridCoordinate)> {
        self.entries.iter()
    }

    /// Entries ordered by key (arity, then elements ascending)
    pub fn sorted_entries(&self) -> Vec<(GridCoordinate, GridCoordinate)> {
        let mut entries: Vec<_> = self.entries.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Look up an image pixel and return the mapped image pixel as (col, row)
    pub fn lookup_pixel(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let key = GridCoordinate::image(u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        self.entries.get(&key).and_then(GridCoordinate::as_image)
    }
}

impl FromIterator<(GridCoordinate, GridCoordinate)> for CoordinateMap {
    fn from_iter<I: IntoIterator<Item = (GridCoordinate, GridCoordinate)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPos {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Planar distance over (lon, lat); fine at pixel scale, not across a swath
    pub fn planar_distance(&self, other: &GeoPos) -> f64 {
        ((self.lon - other.lon).powi(2) + (self.lat - other.lat).powi(2)).sqrt()
    }
}

/// Viewing geometry of an SLSTR detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum View {
    Nadir,
    Oblique,
}

impl View {
    pub fn suffix(&self) -> &'static str {
        match self {
            View::Nadir => "n",
            View::Oblique => "o",
        }
    }
}

/// Which map instance and calibration naming a raster band belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BandIdentity {
    /// SLSTR channel S1..S9 (F1/F2 fire channels are 10 and 11)
    Slstr { channel: u8, view: View },
    /// OLCI band Oa01..Oa21
    Olci { band: u8 },
}

impl BandIdentity {
    /// Token used in calibration file names, e.g. `S3_n` or `Oa17`
    pub fn token(&self) -> String {
        match self {
            BandIdentity::Slstr { channel, view } => format!("S{}_{}", channel, view.suffix()),
            BandIdentity::Olci { band } => format!("Oa{:02}", band),
        }
    }

    /// Name of the calibration file carrying this band's correspondence grid
    pub fn calibration_file_name(&self) -> String {
        format!("MISR_{}.nc", self.token())
    }
}

impl fmt::Display for BandIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Where a transferred target sample came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelProvenance {
    /// Copied through the primary coordinate map
    Mapped,
    /// Taken from the orphan array
    Orphan,
    /// Copied from the nearest mapped neighbour
    GapFilled,
    /// Left at no-data
    Gap,
}

/// Shared cancellation flag polled between chunks, tiles and rows
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Return `Err(Cancelled)` once the flag has been raised
    pub fn check(&self) -> CoregResult<()> {
        if self.is_cancelled() {
            Err(CoregError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Error types for co-registration
#[derive(Debug, thiserror::Error)]
pub enum CoregError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Range error: {0}")]
    Range(String),

    #[error("Unknown band: {0}")]
    UnknownBand(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing cancelled")]
    Cancelled,

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for co-registration operations
pub type CoregResult<T> = Result<T, CoregError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_ordering() {
        let mut coords = vec![
            GridCoordinate::instrument(0, 0, 0),
            GridCoordinate::image(2, 1),
            GridCoordinate::image(1, 5),
            GridCoordinate::image(1, 2),
        ];
        coords.sort();
        assert_eq!(
            coords,
            vec![
                GridCoordinate::image(1, 2),
                GridCoordinate::image(1, 5),
                GridCoordinate::image(2, 1),
                GridCoordinate::instrument(0, 0, 0),
            ]
        );
    }

    #[test]
    fn test_equality_needs_same_arity() {
        assert_ne!(GridCoordinate::image(0, 0), GridCoordinate::instrument(0, 0, 0));
        assert_eq!(GridCoordinate::image(3, 4).elements(), vec![3, 4]);
        assert_eq!(GridCoordinate::instrument(1, 2, 3).arity(), 3);
    }

    #[test]
    fn test_sorted_entries_is_deterministic() {
        let map: CoordinateMap = (0..50u32)
            .rev()
            .map(|i| (GridCoordinate::image(i % 7, i), GridCoordinate::image(i, i)))
            .collect();
        let sorted = map.sorted_entries();
        assert_eq!(sorted.len(), 50);
        assert!(sorted.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_insert_min_is_order_independent() {
        let key = GridCoordinate::image(1, 1);
        let low = GridCoordinate::instrument(0, 5, 2);
        let high = GridCoordinate::instrument(1, 0, 0);

        let mut forward = CoordinateMap::new();
        forward.insert_min(key, low);
        assert!(!forward.insert_min(key, high));

        let mut backward = CoordinateMap::new();
        backward.insert_min(key, high);
        assert!(backward.insert_min(key, low));

        assert_eq!(forward, backward);
        assert_eq!(forward.get(&key), Some(&low));
    }

    #[test]
    fn test_band_tokens() {
        let slstr = BandIdentity::Slstr { channel: 3, view: View::Oblique };
        assert_eq!(slstr.token(), "S3_o");
        assert_eq!(BandIdentity::Olci { band: 7 }.calibration_file_name(), "MISR_Oa07.nc");
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        let shared = flag.clone();
        assert!(flag.check().is_ok());
        shared.cancel();
        assert!(matches!(flag.check(), Err(CoregError::Cancelled)));
    }
}
