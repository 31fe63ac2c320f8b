//! Python bindings

use crate::config::CoregistrationConfig;
use crate::core::Coregistration;
use crate::io::{ArrayRaster, GdalCalibrationStore};
use crate::types::CoregError;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn to_py_err(e: CoregError) -> PyErr {
    match e {
        CoregError::Config(_) | CoregError::UnknownBand(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        CoregError::NotFound(_) => PyErr::new::<pyo3::exceptions::PyFileNotFoundError, _>(format!("{}", e)),
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

type GeoArrays<'py> = (PyReadonlyArray2<'py, f64>, PyReadonlyArray2<'py, f64>);

fn attach_geolocation(raster: &mut ArrayRaster, geo: Option<GeoArrays<'_>>) -> PyResult<()> {
    if let Some((lon, lat)) = geo {
        raster
            .set_geolocation(lon.as_array().to_owned(), lat.as_array().to_owned())
            .map_err(to_py_err)?;
    }
    Ok(())
}

/// Co-register one SLSTR band onto the OLCI grid.
///
/// `target_shape` is `(height, width)` of the OLCI grid. `source_valid`, shaped
/// like `source`, marks which source samples carry data.
///
/// Returns `(values, coverage, fill)`, each shaped like the target.
#[pyfunction]
#[pyo3(signature = (
    calibration_dir,
    band,
    source,
    target_shape,
    source_valid=None,
    orphan_dir=None,
    source_geo=None,
    target_geo=None,
    gap_fill=true,
    chunk_lines=crate::config::DEFAULT_CHUNK_LINES
))]
#[allow(clippy::too_many_arguments)]
fn coregister_band<'py>(
    py: Python<'py>,
    calibration_dir: &str,
    band: &str,
    source: PyReadonlyArray2<'py, f32>,
    target_shape: (usize, usize),
    source_valid: Option<PyReadonlyArray2<'py, bool>>,
    orphan_dir: Option<&str>,
    source_geo: Option<GeoArrays<'py>>,
    target_geo: Option<GeoArrays<'py>>,
    gap_fill: bool,
    chunk_lines: usize,
) -> PyResult<(&'py PyArray2<f32>, &'py PyArray2<u8>, &'py PyArray2<u8>)> {
    let config = CoregistrationConfig {
        gap_fill,
        chunk_lines,
        ..CoregistrationConfig::default()
    };

    let source = source.as_array().to_owned();
    let (height, width) = source.dim();
    let mut source_raster = ArrayRaster::new(width, height);
    source_raster.add_band(band, source).map_err(to_py_err)?;
    if let Some(valid) = source_valid {
        source_raster
            .add_mask(band, valid.as_array().to_owned())
            .map_err(to_py_err)?;
    }
    attach_geolocation(&mut source_raster, source_geo)?;

    let (height, width) = target_shape;
    let mut target_raster = ArrayRaster::new(width, height);
    attach_geolocation(&mut target_raster, target_geo)?;

    let calibration = GdalCalibrationStore::new(calibration_dir);
    let orphans = orphan_dir.map(GdalCalibrationStore::new);
    let mut coreg = Coregistration::new(config, &calibration).map_err(to_py_err)?;
    if let Some(store) = orphans.as_ref() {
        coreg = coreg.with_orphan_store(store);
    }

    let output = coreg.run(&[band], &source_raster, &target_raster).map_err(to_py_err)?;
    if let Some(failure) = output.report.failures.first() {
        return Err(PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!(
            "{}: {}",
            failure.band, failure.error
        )));
    }
    let result = output.bands.into_iter().next().ok_or_else(|| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{} is not a source band", band))
    })?;

    Ok((
        result.values.into_pyarray(py),
        result.coverage.into_pyarray(py),
        result.fill.into_pyarray(py),
    ))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(coregister_band, m)?)?;
    Ok(())
}
