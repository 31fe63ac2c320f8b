//! Calibration array access: typed block reads with scale/offset
//!
//! The calibration grids come as self-describing multidimensional files. This
//! module defines the backend-neutral contract ([`CalibrationSource`] for one
//! file, [`CalibrationStore`] for a directory of files) and an in-memory
//! backend used for synthetic inputs. The GDAL backend lives in
//! [`crate::io::gdal_array`].

use crate::types::{CoregError, CoregResult};
use ndarray::{ArrayD, IxDyn};
use std::collections::{BTreeMap, HashMap};

/// Declared storage type of a calibration variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes
    pub fn width(&self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }

    /// Convert `value` the way storing it in this element type would
    pub fn narrow(&self, value: f64) -> f64 {
        match self {
            ElementType::U8 => (value as i64 as u8) as f64,
            ElementType::I8 => (value as i64 as i8) as f64,
            ElementType::U16 => (value as i64 as u16) as f64,
            ElementType::I16 => (value as i64 as i16) as f64,
            ElementType::U32 => (value as i64 as u32) as f64,
            ElementType::I32 => (value as i64 as i32) as f64,
            ElementType::F32 => value as f32 as f64,
            ElementType::F64 => value,
        }
    }
}

/// Named dimension of a variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub size: usize,
}

impl Dimension {
    pub fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
        }
    }
}

/// Block of raw samples with the scaling needed to turn them into physical values
#[derive(Debug, Clone)]
pub struct ScaledArray {
    pub element: ElementType,
    pub raw: ArrayD<f64>,
    pub scale: f64,
    pub offset: f64,
    pub fill_value: Option<f64>,
}

impl ScaledArray {
    pub fn new(element: ElementType, raw: ArrayD<f64>) -> Self {
        Self {
            element,
            raw,
            scale: 1.0,
            offset: 0.0,
            fill_value: None,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.raw.shape()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Physical value at `index`, `None` outside the block or on fill
    pub fn value(&self, index: &[usize]) -> Option<f64> {
        let raw = *self.raw.get(IxDyn(index))?;
        if self.is_fill(raw) {
            return None;
        }
        Some(raw * self.scale + self.offset)
    }

    fn is_fill(&self, raw: f64) -> bool {
        match self.fill_value {
            Some(fill) => raw == fill || (fill.is_nan() && raw.is_nan()),
            None => raw.is_nan(),
        }
    }
}

/// Reject blocks that do not fit inside the declared dimensions
pub fn check_block(
    location: &str,
    variable: &str,
    dims: &[Dimension],
    start: &[usize],
    shape: &[usize],
) -> CoregResult<()> {
    if start.len() != dims.len() || shape.len() != dims.len() {
        return Err(CoregError::Range(format!(
            "{}:{} has rank {}, block start/shape have rank {}/{}",
            location,
            variable,
            dims.len(),
            start.len(),
            shape.len()
        )));
    }

    for ((dim, &s), &n) in dims.iter().zip(start).zip(shape) {
        let end = s.checked_add(n);
        if end.map_or(true, |end| end > dim.size) {
            return Err(CoregError::Range(format!(
                "{}:{} block [{}, {}+{}) exceeds dimension {} of length {}",
                location, variable, s, s, n, dim.name, dim.size
            )));
        }
    }

    Ok(())
}

/// One self-describing calibration file
pub trait CalibrationSource {
    /// Human readable origin, used in error messages
    fn location(&self) -> String;

    /// Variable catalogue
    fn variable_names(&self) -> CoregResult<Vec<String>>;

    /// Declared dimensions of `variable`
    fn dimensions(&self, variable: &str) -> CoregResult<Vec<Dimension>>;

    /// Read the block `[start, start + shape)` of `variable`.
    ///
    /// Performs no chunking; callers split large reads themselves.
    fn read_block(&self, variable: &str, start: &[usize], shape: &[usize]) -> CoregResult<ScaledArray>;

    fn has_variable(&self, variable: &str) -> CoregResult<bool> {
        Ok(self.variable_names()?.iter().any(|name| name == variable))
    }

    /// Physical value of a single-element variable
    fn read_scalar(&self, variable: &str) -> CoregResult<f64> {
        let dims = self.dimensions(variable)?;
        if dims.iter().map(|d| d.size).product::<usize>() != 1 {
            return Err(CoregError::Schema(format!(
                "{}:{} is not a scalar ({:?})",
                self.location(),
                variable,
                dims
            )));
        }
        let start = vec![0; dims.len()];
        let shape = vec![1; dims.len()];
        let block = self.read_block(variable, &start, &shape)?;
        block.value(&start).ok_or_else(|| {
            CoregError::InvalidFormat(format!("{}:{} holds a fill value", self.location(), variable))
        })
    }
}

impl<T: CalibrationSource + ?Sized> CalibrationSource for &T {
    fn location(&self) -> String {
        (**self).location()
    }

    fn variable_names(&self) -> CoregResult<Vec<String>> {
        (**self).variable_names()
    }

    fn dimensions(&self, variable: &str) -> CoregResult<Vec<Dimension>> {
        (**self).dimensions(variable)
    }

    fn read_block(&self, variable: &str, start: &[usize], shape: &[usize]) -> CoregResult<ScaledArray> {
        (**self).read_block(variable, start, shape)
    }
}

/// A directory-like collection of calibration files
pub trait CalibrationStore {
    fn location(&self) -> String;

    fn contains(&self, name: &str) -> bool;

    /// Open file `name`; a missing file is `NotFound`
    fn open(&self, name: &str) -> CoregResult<Box<dyn CalibrationSource + '_>>;
}

/// In-memory variable with a declared element type
#[derive(Debug, Clone)]
pub struct MemoryVariable {
    pub element: ElementType,
    pub dims: Vec<Dimension>,
    pub data: ArrayD<f64>,
    pub attributes: HashMap<String, f64>,
}

impl MemoryVariable {
    /// Build a variable from row-major `values`, narrowed to `element`
    pub fn new(element: ElementType, dims: &[(&str, usize)], values: Vec<f64>) -> CoregResult<Self> {
        let shape: Vec<usize> = dims.iter().map(|(_, n)| *n).collect();
        let narrowed: Vec<f64> = values.into_iter().map(|v| element.narrow(v)).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), narrowed)
            .map_err(|e| CoregError::InvalidFormat(format!("Shape error: {}", e)))?;

        Ok(Self {
            element,
            dims: dims.iter().map(|(name, n)| Dimension::new(name, *n)).collect(),
            data,
            attributes: HashMap::new(),
        })
    }

    pub fn scalar(element: ElementType, value: f64) -> Self {
        Self {
            element,
            dims: Vec::new(),
            data: ArrayD::from_elem(IxDyn(&[]), element.narrow(value)),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: f64) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }
}

/// Calibration file held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArrayFile {
    pub name: String,
    variables: BTreeMap<String, MemoryVariable>,
}

impl MemoryArrayFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: &str, variable: MemoryVariable) -> Self {
        self.add_variable(name, variable);
        self
    }

    pub fn add_variable(&mut self, name: &str, variable: MemoryVariable) {
        self.variables.insert(name.to_string(), variable);
    }

    fn variable(&self, name: &str) -> CoregResult<&MemoryVariable> {
        self.variables.get(name).ok_or_else(|| {
            CoregError::NotFound(format!("variable '{}' in {}", name, self.name))
        })
    }
}

impl CalibrationSource for MemoryArrayFile {
    fn location(&self) -> String {
        self.name.clone()
    }

    fn variable_names(&self) -> CoregResult<Vec<String>> {
        Ok(self.variables.keys().cloned().collect())
    }

    fn dimensions(&self, variable: &str) -> CoregResult<Vec<Dimension>> {
        Ok(self.variable(variable)?.dims.clone())
    }

    fn read_block(&self, variable: &str, start: &[usize], shape: &[usize]) -> CoregResult<ScaledArray> {
        let var = self.variable(variable)?;
        check_block(&self.name, variable, &var.dims, start, shape)?;

        let raw = ArrayD::from_shape_fn(IxDyn(shape), |idx| {
            let pos: Vec<usize> = (0..shape.len()).map(|axis| idx[axis] + start[axis]).collect();
            var.data[IxDyn(&pos)]
        });

        let attr = |name: &str| var.attributes.get(name).copied();
        Ok(ScaledArray {
            element: var.element,
            raw,
            scale: attr("scale_factor").unwrap_or(1.0),
            offset: attr("add_offset").or_else(|| attr("offset")).unwrap_or(0.0),
            fill_value: attr("_FillValue"),
        })
    }
}

/// Calibration files held in memory, keyed by file name
#[derive(Debug, Clone, Default)]
pub struct MemoryCalibrationStore {
    files: HashMap<String, MemoryArrayFile>,
}

impl MemoryCalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: MemoryArrayFile) {
        self.files.insert(file.name.clone(), file);
    }

    pub fn with_file(mut self, file: MemoryArrayFile) -> Self {
        self.insert(file);
        self
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn open(&self, name: &str) -> CoregResult<Box<dyn CalibrationSource + '_>> {
        let file = self
            .files
            .get(name)
            .ok_or_else(|| CoregError::NotFound(format!("calibration file {}", name)))?;
        Ok(Box::new(file))
    }
}
