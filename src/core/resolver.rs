//! Row/column variable naming across calibration file generations

use crate::io::array::CalibrationSource;
use crate::types::{BandIdentity, CoregError, CoregResult, View};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Band number plus optional view, as it appears in calibration variable names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandFamily {
    pub number: u8,
    pub view: Option<View>,
}

impl BandFamily {
    pub fn new(number: u8, view: Option<View>) -> Self {
        Self { number, view }
    }
}

impl From<BandIdentity> for BandFamily {
    fn from(identity: BandIdentity) -> Self {
        match identity {
            BandIdentity::Slstr { channel, view } => BandFamily::new(channel, Some(view)),
            BandIdentity::Olci { band } => BandFamily::new(band, None),
        }
    }
}

impl fmt::Display for BandFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.view {
            Some(view) => write!(f, "{}/{}", self.number, view.suffix()),
            None => write!(f, "{}", self.number),
        }
    }
}

/// One generation's naming of the row/col correspondence variables
pub trait NamingTemplate: Send + Sync {
    fn name(&self) -> &str;

    /// (row variable, col variable) this template expects for `family`
    fn candidates(&self, family: &BandFamily) -> (String, String);
}

/// `{prefix}{NN}[_{view}]` with a zero-padded band number
#[derive(Debug, Clone)]
pub struct PaddedTemplate {
    name: &'static str,
    row_prefix: &'static str,
    col_prefix: &'static str,
}

impl PaddedTemplate {
    pub const fn new(name: &'static str, row_prefix: &'static str, col_prefix: &'static str) -> Self {
        Self {
            name,
            row_prefix,
            col_prefix,
        }
    }
}

impl NamingTemplate for PaddedTemplate {
    fn name(&self) -> &str {
        self.name
    }

    fn candidates(&self, family: &BandFamily) -> (String, String) {
        let suffix = family.view.map(|v| format!("_{}", v.suffix())).unwrap_or_default();
        (
            format!("{}{:02}{}", self.row_prefix, family.number, suffix),
            format!("{}{:02}{}", self.col_prefix, family.number, suffix),
        )
    }
}

/// `row-{N}[-{view}]` / `col-{N}[-{view}]`
#[derive(Debug, Clone, Default)]
pub struct DashTemplate;

impl NamingTemplate for DashTemplate {
    fn name(&self) -> &str {
        "dash-separated"
    }

    fn candidates(&self, family: &BandFamily) -> (String, String) {
        let suffix = family.view.map(|v| format!("-{}", v.suffix())).unwrap_or_default();
        (
            format!("row-{}{}", family.number, suffix),
            format!("col-{}{}", family.number, suffix),
        )
    }
}

/// Ordered list of naming templates; the first one fully present in a file wins
#[derive(Clone)]
pub struct GridResolver {
    templates: Vec<Arc<dyn NamingTemplate>>,
}

impl GridResolver {
    pub fn standard() -> Self {
        Self {
            templates: vec![
                Arc::new(PaddedTemplate::new("delta", "delta_row_", "delta_col_")),
                Arc::new(PaddedTemplate::new("corresp", "row_corresp_", "col_corresp_")),
                Arc::new(DashTemplate),
            ],
        }
    }

    /// Append a template after the existing ones
    pub fn with_template(mut self, template: Box<dyn NamingTemplate>) -> Self {
        self.templates.push(Arc::from(template));
        self
    }

    pub fn template_names(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.name()).collect()
    }

    /// Find the (row, col) variable pair for `family` in `file`
    pub fn resolve(&self, file: &dyn CalibrationSource, family: &BandFamily) -> CoregResult<(String, String)> {
        let catalogue: HashSet<String> = file.variable_names()?.into_iter().collect();

        for template in &self.templates {
            let (row, col) = template.candidates(family);
            if catalogue.contains(&row) && catalogue.contains(&col) {
                log::debug!(
                    "{}: band {} uses {} naming ({}, {})",
                    file.location(),
                    family,
                    template.name(),
                    row,
                    col
                );
                return Ok((row, col));
            }
        }

        let tried: Vec<String> = self
            .templates
            .iter()
            .map(|t| {
                let (row, col) = t.candidates(family);
                format!("{}/{}", row, col)
            })
            .collect();
        Err(CoregError::Schema(format!(
            "{}: no row/col variables for band {} (tried {})",
            file.location(),
            family,
            tried.join(", ")
        )))
    }
}

impl Default for GridResolver {
    fn default() -> Self {
        Self::standard()
    }
}

/// Resolve with the standard template list
pub fn resolve_row_col_variables(file: &dyn CalibrationSource, family: &BandFamily) -> CoregResult<(String, String)> {
    GridResolver::standard().resolve(file, family)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::array::{Dimension, ElementType, MemoryArrayFile, MemoryVariable, ScaledArray};

    fn file_with(names: &[&str]) -> MemoryArrayFile {
        names.iter().fold(MemoryArrayFile::new("misr.nc"), |file, name| {
            file.with_variable(name, MemoryVariable::scalar(ElementType::I16, 0.0))
        })
    }

    #[test]
    fn test_delta_template_wins() {
        let file = file_with(&["row_corresp_17", "col_corresp_17", "delta_row_17", "delta_col_17", "row-17", "col-17"]);
        let (row, col) = resolve_row_col_variables(&file, &BandFamily::new(17, None)).unwrap();
        assert_eq!(row, "delta_row_17");
        assert_eq!(col, "delta_col_17");
    }

    #[test]
    fn test_zero_padding_and_views() {
        let file = file_with(&["row_corresp_03_o", "col_corresp_03_o"]);
        let (row, _) = resolve_row_col_variables(&file, &BandFamily::new(3, Some(View::Oblique))).unwrap();
        assert_eq!(row, "row_corresp_03_o");

        let file = file_with(&["row-3-n", "col-3-n"]);
        let (row, col) = resolve_row_col_variables(&file, &BandFamily::new(3, Some(View::Nadir))).unwrap();
        assert_eq!((row.as_str(), col.as_str()), ("row-3-n", "col-3-n"));
    }

    #[test]
    fn test_half_pair_does_not_match() {
        let file = file_with(&["delta_row_17", "row_corresp_17", "col_corresp_17"]);
        let (row, _) = resolve_row_col_variables(&file, &BandFamily::new(17, None)).unwrap();
        assert_eq!(row, "row_corresp_17");
    }

    #[test]
    fn test_no_template_is_schema_error() {
        let file = file_with(&["delta_row_16", "delta_col_16", "latitude"]);
        match resolve_row_col_variables(&file, &BandFamily::new(17, None)) {
            Err(CoregError::Schema(msg)) => {
                assert!(msg.contains("misr.nc"));
                assert!(msg.contains("delta_row_17"));
            }
            other => panic!("expected Schema error, got {:?}", other),
        }
    }

    /// File whose catalogue cannot be listed
    struct UnreadableFile;

    impl CalibrationSource for UnreadableFile {
        fn location(&self) -> String {
            "broken.nc".to_string()
        }

        fn variable_names(&self) -> CoregResult<Vec<String>> {
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt header").into())
        }

        fn dimensions(&self, variable: &str) -> CoregResult<Vec<Dimension>> {
            Err(CoregError::NotFound(variable.to_string()))
        }

        fn read_block(&self, variable: &str, _start: &[usize], _shape: &[usize]) -> CoregResult<ScaledArray> {
            Err(CoregError::NotFound(variable.to_string()))
        }
    }

    #[test]
    fn test_unreadable_catalogue_is_not_schema_error() {
        let result = resolve_row_col_variables(&UnreadableFile, &BandFamily::new(17, None));
        assert!(matches!(result, Err(CoregError::Io(_))), "got {:?}", result);
        assert!(UnreadableFile.has_variable("delta_row_17").is_err());
    }

    struct UpperCaseTemplate;

    impl NamingTemplate for UpperCaseTemplate {
        fn name(&self) -> &str {
            "upper"
        }

        fn candidates(&self, family: &BandFamily) -> (String, String) {
            (format!("ROW_{}", family.number), format!("COL_{}", family.number))
        }
    }

    #[test]
    fn test_extra_template_is_tried_last() {
        let resolver = GridResolver::standard().with_template(Box::new(UpperCaseTemplate));
        assert_eq!(resolver.template_names(), vec!["delta", "corresp", "dash-separated", "upper"]);

        let file = file_with(&["ROW_5", "COL_5"]);
        let (row, _) = resolver.resolve(&file, &BandFamily::new(5, None)).unwrap();
        assert_eq!(row, "ROW_5");
    }
}
