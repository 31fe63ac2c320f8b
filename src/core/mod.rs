//! Core co-registration modules

pub mod bands;
pub mod coordinate_map;
pub mod coregistration;
pub mod gap_fill;
pub mod orphan;
pub mod resolver;
pub mod transfer;

// Re-export main types
pub use bands::BandTable;
pub use coordinate_map::{compose, CoordinateMapBuilder, ScanStats};
pub use coregistration::{
    BandFailure, BandMapSet, BandMaps, Coregistration, CoregistrationOutput, CoregistrationReport,
};
pub use gap_fill::{GapCandidate, GapFiller};
pub use orphan::{build_orphan_map, OrphanMap, OrphanRecovery};
pub use resolver::{resolve_row_col_variables, BandFamily, GridResolver, NamingTemplate};
pub use transfer::{assemble_band, BandOutput, PixelTransferEngine, TileRect, TransferStats, TransferTile};
