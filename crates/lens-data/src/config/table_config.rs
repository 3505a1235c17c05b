//! Configuration of a table loaded from a delimited file

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};

use super::null_handling::NullConfig;
use crate::DataError;

/// Column type override that can be serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializableDataType {
    Boolean,
    Int32,
    Int64,
    Float64,
    Utf8,
    Date64,
    /// Milliseconds since the epoch
    Timestamp,
}

impl From<SerializableDataType> for DataType {
    fn from(sdt: SerializableDataType) -> Self {
        match sdt {
            SerializableDataType::Boolean => DataType::Boolean,
            SerializableDataType::Int32 => DataType::Int32,
            SerializableDataType::Int64 => DataType::Int64,
            SerializableDataType::Float64 => DataType::Float64,
            SerializableDataType::Utf8 => DataType::Utf8,
            SerializableDataType::Date64 => DataType::Date64,
            SerializableDataType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, None),
        }
    }
}

impl From<&DataType> for SerializableDataType {
    fn from(dt: &DataType) -> Self {
        match dt {
            DataType::Boolean => SerializableDataType::Boolean,
            DataType::Int8 | DataType::Int16 | DataType::Int32 => SerializableDataType::Int32,
            DataType::Int64 | DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => {
                SerializableDataType::Int64
            }
            DataType::Float16 | DataType::Float32 | DataType::Float64 => SerializableDataType::Float64,
            DataType::Date32 | DataType::Date64 => SerializableDataType::Date64,
            DataType::Timestamp(_, _) => SerializableDataType::Timestamp,
            _ => SerializableDataType::Utf8,
        }
    }
}

/// Where a table comes from and how its columns are read and used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table name; defaults to the file stem
    pub name: Option<String>,
    pub path: PathBuf,
    pub has_header: bool,
    pub delimiter: char,
    /// Rows sampled for type inference
    pub sample_size: usize,
    pub column_types: HashMap<String, SerializableDataType>,
    pub null_config: NullConfig,
    /// Columns indexed for full-text search; `None` indexes every text column
    pub full_text_columns: Option<Vec<String>>,
    pub time_field: Option<String>,
    pub latitude_field: Option<String>,
    pub longitude_field: Option<String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: None,
            path: PathBuf::new(),
            has_header: true,
            delimiter: ',',
            sample_size: 1000,
            column_types: HashMap::new(),
            null_config: NullConfig::default(),
            full_text_columns: None,
            time_field: None,
            latitude_field: None,
            longitude_field: None,
        }
    }
}

impl TableConfig {
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file; a relative `path` resolves against the
    /// configuration file's directory
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let mut config = Self::from_json(&fs::read_to_string(path)?)?;
        if config.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.path = dir.join(&config.path);
            }
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn table_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "table".to_string())
        })
    }

    /// Delimiter as the single byte the reader expects
    pub fn delimiter_byte(&self) -> Result<u8, DataError> {
        u8::try_from(self.delimiter)
            .map_err(|_| DataError::Other(format!("Delimiter '{}' is not a single byte", self.delimiter)))
    }

    pub fn column_type(&self, column: &str) -> Option<DataType> {
        self.column_types.get(column).map(|t| DataType::from(*t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = TableConfig::from_json(r#"{ "path": "cities.csv", "delimiter": ";" }"#).unwrap();
        assert_eq!(config.delimiter_byte().unwrap(), b';');
        assert!(config.has_header);
        assert_eq!(config.sample_size, 1000);
        assert_eq!(config.table_name(), "cities");
    }

    #[test]
    fn test_column_type_overrides() {
        let config = TableConfig::from_json(
            r#"{ "path": "t.csv", "column_types": { "created": "Int32", "when": "Timestamp" } }"#,
        )
        .unwrap();
        assert_eq!(config.column_type("created"), Some(DataType::Int32));
        assert_eq!(
            config.column_type("when"),
            Some(DataType::Timestamp(TimeUnit::Millisecond, None))
        );
        assert_eq!(config.column_type("other"), None);
    }

    #[test]
    fn test_load_resolves_relative_path() {
        let dir = tempdir().unwrap();
        let mut config = TableConfig::for_path("data.csv");
        config.name = Some("events".to_string());
        config.time_field = Some("created".to_string());
        let file = dir.path().join("events.json");
        config.save(&file).unwrap();

        let loaded = TableConfig::load(&file).unwrap();
        assert_eq!(loaded.path, dir.path().join("data.csv"));
        assert_eq!(loaded.table_name(), "events");
        assert_eq!(loaded.time_field.as_deref(), Some("created"));
    }

    #[test]
    fn test_rejects_wide_delimiter() {
        let config = TableConfig {
            delimiter: '→',
            ..TableConfig::default()
        };
        assert!(matches!(config.delimiter_byte(), Err(DataError::Other(_))));
    }
}
