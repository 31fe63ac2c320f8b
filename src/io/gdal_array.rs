//! GDAL multidimensional backend for calibration files (netCDF / HDF5)

use crate::io::array::{check_block, CalibrationSource, CalibrationStore, Dimension, ElementType, ScaledArray};
use crate::types::{CoregError, CoregResult};
use gdal::cpl::CslStringList;
use gdal::raster::{GdalType, MDArray};
use gdal::{Dataset, DatasetOptions, GdalOpenFlags};
use gdal_sys::GDALDataType;
use ndarray::{ArrayD, IxDyn};
use num_traits::AsPrimitive;
use std::path::{Path, PathBuf};

/// Calibration file opened through GDAL's multidimensional API
pub struct GdalArrayFile {
    path: PathBuf,
    dataset: Dataset,
}

impl GdalArrayFile {
    pub fn open<P: AsRef<Path>>(path: P) -> CoregResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(CoregError::NotFound(format!("calibration file {}", path.display())));
        }

        log::debug!("Opening calibration file {}", path.display());
        let options = DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_MULTIDIM_RASTER,
            allowed_drivers: None,
            open_options: None,
            sibling_files: None,
        };
        let dataset = Dataset::open_ex(&path, options)?;

        Ok(Self { path, dataset })
    }

    fn with_array<R>(&self, variable: &str, f: impl FnOnce(&MDArray<'_>) -> CoregResult<R>) -> CoregResult<R> {
        if !self.has_variable(variable)? {
            return Err(CoregError::NotFound(format!(
                "variable '{}' in {}",
                variable,
                self.path.display()
            )));
        }
        let group = self.dataset.root_group()?;
        let array = group.open_md_array(variable, CslStringList::new())?;
        f(&array)
    }
}

fn element_type(array: &MDArray<'_>, variable: &str) -> CoregResult<ElementType> {
    let datatype = array.datatype().numeric_datatype();
    let element = match datatype {
        GDALDataType::GDT_Byte => ElementType::U8,
        GDALDataType::GDT_UInt16 => ElementType::U16,
        GDALDataType::GDT_Int16 => ElementType::I16,
        GDALDataType::GDT_UInt32 => ElementType::U32,
        GDALDataType::GDT_Int32 => ElementType::I32,
        GDALDataType::GDT_Float32 => ElementType::F32,
        GDALDataType::GDT_Float64 => ElementType::F64,
        other => {
            return Err(CoregError::InvalidFormat(format!(
                "unsupported element type {} for {}",
                other, variable
            )))
        }
    };
    Ok(element)
}

/// Read with the variable's own element type, widening to f64 afterwards
fn read_typed<T>(array: &MDArray<'_>, start: &[usize], shape: &[usize]) -> CoregResult<Vec<f64>>
where
    T: Copy + GdalType + AsPrimitive<f64>,
{
    let start_index: Vec<u64> = start.iter().map(|&s| s as u64).collect();
    let values: Vec<T> = array.read_as::<T>(start_index, shape.to_vec())?;
    Ok(values.into_iter().map(|v| v.as_()).collect())
}

fn attribute_f64(array: &MDArray<'_>, name: &str) -> Option<f64> {
    array.attribute(name).ok().map(|attr| attr.read_as_f64())
}

impl CalibrationSource for GdalArrayFile {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn variable_names(&self) -> CoregResult<Vec<String>> {
        let group = self.dataset.root_group()?;
        Ok(group.array_names(CslStringList::new()))
    }

    fn dimensions(&self, variable: &str) -> CoregResult<Vec<Dimension>> {
        self.with_array(variable, |array| {
            Ok(array
                .dimensions()?
                .iter()
                .map(|dim| Dimension::new(&dim.name(), dim.size()))
                .collect())
        })
    }

    fn read_block(&self, variable: &str, start: &[usize], shape: &[usize]) -> CoregResult<ScaledArray> {
        self.with_array(variable, |array| {
            let dims: Vec<Dimension> = array
                .dimensions()?
                .iter()
                .map(|dim| Dimension::new(&dim.name(), dim.size()))
                .collect();
            check_block(&self.location(), variable, &dims, start, shape)?;

            let element = element_type(array, variable)?;
            let values = match element {
                ElementType::U8 => read_typed::<u8>(array, start, shape)?,
                ElementType::I8 | ElementType::I16 => read_typed::<i16>(array, start, shape)?,
                ElementType::U16 => read_typed::<u16>(array, start, shape)?,
                ElementType::U32 => read_typed::<u32>(array, start, shape)?,
                ElementType::I32 => read_typed::<i32>(array, start, shape)?,
                ElementType::F32 => read_typed::<f32>(array, start, shape)?,
                ElementType::F64 => read_typed::<f64>(array, start, shape)?,
            };

            let raw = ArrayD::from_shape_vec(IxDyn(shape), values)
                .map_err(|e| CoregError::InvalidFormat(format!("Shape error: {}", e)))?;

            Ok(ScaledArray {
                element,
                raw,
                scale: attribute_f64(array, "scale_factor").unwrap_or(1.0),
                offset: attribute_f64(array, "add_offset")
                    .or_else(|| attribute_f64(array, "offset"))
                    .unwrap_or(0.0),
                fill_value: attribute_f64(array, "_FillValue"),
            })
        })
    }
}

/// Directory of calibration files opened with GDAL
#[derive(Debug, Clone)]
pub struct GdalCalibrationStore {
    root: PathBuf,
}

impl GdalCalibrationStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl CalibrationStore for GdalCalibrationStore {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn contains(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }

    fn open(&self, name: &str) -> CoregResult<Box<dyn CalibrationSource + '_>> {
        Ok(Box::new(GdalArrayFile::open(self.path_of(name))?))
    }
}
