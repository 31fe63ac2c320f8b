//! syncoreg: OLCI/SLSTR pixel co-registration
//!
//! Sentinel-3 SLSTR samples are moved onto the OLCI image grid through the
//! MISR calibration grids, which tie both instruments to a shared
//! camera/line/detector space. The pipeline builds the composed target->source
//! coordinate map per band, overlays orphan pixels when the product ships them,
//! transfers samples tile by tile and fills the remaining holes from the
//! nearest mapped neighbour.

pub mod config;
pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use config::CoregistrationConfig;
pub use types::{
    BandIdentity, CancelFlag, CoordinateMap, CoregError, CoregResult, GeoPos, GridCoordinate,
    PixelProvenance, View,
};

pub use crate::core::{Coregistration, CoregistrationOutput, CoregistrationReport};
pub use io::{ArrayRaster, GdalCalibrationStore, MemoryCalibrationStore, RasterProvider};
