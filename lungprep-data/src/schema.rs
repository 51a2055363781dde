//! Schema descriptor and column type inference for manifests.

use lungprep_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Column data type, named the way dataframe libraries name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "object", alias = "string")]
    Object,
    #[serde(rename = "int64", alias = "integer")]
    Int64,
    #[serde(rename = "float64", alias = "float")]
    Float64,
    #[serde(rename = "bool", alias = "boolean")]
    Bool,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ColumnType::Object => "object",
            ColumnType::Int64 => "int64",
            ColumnType::Float64 => "float64",
            ColumnType::Bool => "bool",
        })
    }
}

/// Infer a column's type from all of its values.
///
/// Every value must parse for a narrower type to win; anything else,
/// including an empty column, is `object`.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a str>) -> ColumnType {
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    let mut seen = false;

    for v in values {
        seen = true;
        let v = v.trim();
        if all_int && v.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_float && v.parse::<f64>().is_err() {
            all_float = false;
        }
        if all_bool && !matches!(v, "true" | "false" | "True" | "False") {
            all_bool = false;
        }
        if !all_int && !all_float && !all_bool {
            break;
        }
    }

    match (seen, all_int, all_float, all_bool) {
        (false, ..) => ColumnType::Object,
        (true, true, _, _) => ColumnType::Int64,
        (true, _, true, _) => ColumnType::Float64,
        (true, _, _, true) => ColumnType::Bool,
        _ => ColumnType::Object,
    }
}

/// Declarative manifest schema, supplied as a YAML document.
///
/// ```yaml
/// columns: [Label_Image_Path, Image_Label]
/// column_datatypes:
///   Label_Image_Path: object
///   Image_Label: object
/// domain_value:
///   Image_Label: [NORMAL, PNEUMONIA]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub columns: Vec<String>,
    pub column_datatypes: BTreeMap<String, ColumnType>,
    pub domain_value: BTreeMap<String, Vec<String>>,
}

impl SchemaDescriptor {
    /// Read and check a schema file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let schema: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("schema: {e}"),
        })?;
        schema.check()?;
        Ok(schema)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });
        if self.columns.len() != 2 {
            return invalid(format!(
                "schema must declare exactly 2 columns, found {}",
                self.columns.len()
            ));
        }
        for column in &self.columns {
            if !self.column_datatypes.contains_key(column) {
                return invalid(format!("schema has no datatype for column '{column}'"));
            }
        }
        match self.domain_value.get(self.label_column()) {
            Some(values) if values.len() == 2 && values[0] != values[1] => Ok(()),
            Some(values) => invalid(format!(
                "schema must declare 2 distinct domain values for '{}', found {values:?}",
                self.label_column()
            )),
            None => invalid(format!(
                "schema has no domain values for '{}'",
                self.label_column()
            )),
        }
    }

    pub fn path_column(&self) -> &str {
        &self.columns[0]
    }

    pub fn label_column(&self) -> &str {
        &self.columns[1]
    }

    pub fn datatype(&self, column: &str) -> Option<ColumnType> {
        self.column_datatypes.get(column).copied()
    }

    /// Declared label values, in declared order.
    pub fn label_domain(&self) -> &[String] {
        self.domain_value
            .get(self.label_column())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA_YAML: &str = r#"
columns: [Label_Image_Path, Image_Label]
column_datatypes:
  Label_Image_Path: object
  Image_Label: object
domain_value:
  Image_Label: [NORMAL, PNEUMONIA]
"#;

    #[test]
    fn test_infer_column_type_int() {
        assert_eq!(infer_column_type(["1", "2", "3"]), ColumnType::Int64);
    }

    #[test]
    fn test_infer_column_type_float_and_bool() {
        assert_eq!(infer_column_type(["1", "2.5"]), ColumnType::Float64);
        assert_eq!(infer_column_type(["true", "False"]), ColumnType::Bool);
    }

    #[test]
    fn test_infer_column_type_object() {
        assert_eq!(
            infer_column_type(["/data/a.jpeg", "/data/b.jpeg"]),
            ColumnType::Object
        );
        assert_eq!(infer_column_type(["1", "NORMAL"]), ColumnType::Object);
        assert_eq!(infer_column_type(std::iter::empty()), ColumnType::Object);
    }

    #[test]
    fn test_load_schema() {
        let schema = SchemaDescriptor::from_yaml(SCHEMA_YAML).unwrap();
        assert_eq!(schema.path_column(), "Label_Image_Path");
        assert_eq!(schema.label_column(), "Image_Label");
        assert_eq!(schema.datatype("Image_Label"), Some(ColumnType::Object));
        assert_eq!(schema.label_domain(), ["NORMAL", "PNEUMONIA"]);
    }

    #[test]
    fn test_schema_requires_two_domain_values() {
        let yaml = SCHEMA_YAML.replace("[NORMAL, PNEUMONIA]", "[NORMAL]");
        let err = SchemaDescriptor::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_schema_requires_datatypes() {
        let yaml = SCHEMA_YAML.replace("  Image_Label: object\n", "");
        let err = SchemaDescriptor::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("no datatype"));
    }

    #[test]
    fn test_missing_schema_file() {
        let err = SchemaDescriptor::load(Path::new("/nonexistent/schema.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
