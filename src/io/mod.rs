//! I/O modules for calibration arrays and raster products

pub mod array;
pub mod gdal_array;
pub mod raster;

pub use array::{
    CalibrationSource, CalibrationStore, Dimension, ElementType, MemoryArrayFile,
    MemoryCalibrationStore, MemoryVariable, ScaledArray,
};
pub use gdal_array::{GdalArrayFile, GdalCalibrationStore};
pub use raster::{ArrayRaster, RasterProvider};
