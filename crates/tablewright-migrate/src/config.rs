//! Generator configuration.
//!
//! Read from `tablewright.toml`:
//!
//! ```toml
//! dialects = ["postgres", "sqlite"]
//!
//! [tables.users]
//! scope_column = "account_id"
//! ascending = false
//! ```
//!
//! Every key is optional. A missing file means all dialects and default
//! options for every table.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tablewright_core::crud::CrudOptions;
use tablewright_core::dialect::Dialect;
use tablewright_core::schema::Schema;

use crate::error::{MigrateError, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "tablewright.toml";

/// Which dialects to generate for, and per-table CRUD options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Target dialects.
    #[serde(default = "all_dialects")]
    pub dialects: Vec<Dialect>,
    /// Options keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, CrudOptions>,
}

fn all_dialects() -> Vec<Dialect> {
    Dialect::ALL.to_vec()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dialects: all_dialects(),
            tables: BTreeMap::new(),
        }
    }
}

impl GeneratorConfig {
    /// Parses a configuration document.
    pub fn parse(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| MigrateError::Config(e.to_string()))?;
        if config.dialects.is_empty() {
            return Err(MigrateError::Config(
                "at least one dialect is required".to_string(),
            ));
        }
        Ok(config)
    }

    /// Reads the configuration at `path`, falling back to the default if the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(source) => Self::parse(&source),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Options for `table`.
    #[must_use]
    pub fn options_for(&self, table: &str) -> CrudOptions {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    /// Rejects options for tables the schema does not have.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        match self.tables.keys().find(|name| !schema.contains(name)) {
            Some(name) => Err(MigrateError::Config(format!(
                "options given for unknown table '{name}'"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablewright_core::schema::{TableBuilder, string};

    #[test]
    fn parses_dialects_and_table_options() {
        let config = GeneratorConfig::parse(
            r#"
            dialects = ["postgres", "sqlite"]

            [tables.users]
            scope_column = "account_id"
            "#,
        )
        .unwrap();

        assert_eq!(config.dialects, vec![Dialect::Postgres, Dialect::Sqlite]);
        let users = config.options_for("users");
        assert_eq!(users.scope_column.as_deref(), Some("account_id"));
        assert!(!users.ascending);
        assert_eq!(config.options_for("posts"), CrudOptions::default());
    }

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(GeneratorConfig::parse("").unwrap(), GeneratorConfig::default());
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(GeneratorConfig::parse("dialects = []").is_err());
        assert!(GeneratorConfig::parse("dialects = [\"oracle\"]").is_err());
        assert!(GeneratorConfig::parse("dialect = \"sqlite\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::load(&dir.path().join("tablewright.toml")).unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn validate_rejects_unknown_tables() {
        let mut schema = Schema::default();
        schema.insert(
            TableBuilder::with_audit_columns("users")
                .column(string("name"))
                .build(&Schema::default())
                .unwrap(),
        );
        let config = GeneratorConfig::parse("[tables.posts]\nascending = true").unwrap();
        assert!(matches!(
            config.validate(&schema),
            Err(MigrateError::Config(_))
        ));
        assert!(GeneratorConfig::default().validate(&schema).is_ok());
    }
}
