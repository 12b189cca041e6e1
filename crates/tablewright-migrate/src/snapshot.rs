//! Snapshot persistence.
//!
//! The snapshot is the JSON form of a [`MigrationPlan`]:
//!
//! ```json
//! {
//!   "schema": { "name": "", "tables": { "users": { ... } } },
//!   "migrations": [
//!     { "name": "20240101000000_create_users",
//!       "instructions": { "postgres": ["..."], "mysql": ["..."], "sqlite": ["..."] } }
//!   ]
//! }
//! ```
//!
//! Writes go to a sibling temporary file which is then renamed over the
//! snapshot, so a crash never leaves a half-written document behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::plan::MigrationPlan;

/// Default snapshot file name.
pub const DEFAULT_SNAPSHOT_PATH: &str = "tablewright.snapshot.json";

/// A snapshot file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: PathBuf,
}

impl Snapshot {
    /// Creates a handle for the snapshot at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the plan, or `None` if the file does not exist.
    pub fn load(&self) -> Result<Option<MigrationPlan>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let plan = serde_json::from_str(&contents).map_err(|e| MigrateError::Snapshot {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        debug!(path = %self.path.display(), "Loaded snapshot");
        Ok(Some(plan))
    }

    /// Reads the plan, starting empty if the file does not exist.
    pub fn load_or_default(&self) -> Result<MigrationPlan> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Replaces the snapshot with `plan`.
    pub fn save(&self, plan: &MigrationPlan) -> Result<()> {
        let json = serde_json::to_string_pretty(plan)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, json + "\n")?;
        fs::rename(&temp, &self.path)?;
        debug!(
            path = %self.path.display(),
            migrations = plan.migrations.len(),
            "Saved snapshot"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Instructions, MigrationRecord};
    use tablewright_core::schema::{Schema, TableBuilder, string};

    fn sample_plan() -> MigrationPlan {
        let users = TableBuilder::with_audit_columns("users")
            .column(string("name").not_null())
            .build(&Schema::default())
            .unwrap();
        let mut schema = Schema::new("app");
        schema.insert(users);
        MigrationPlan {
            schema,
            migrations: vec![MigrationRecord {
                name: "20240101000000_create_users".into(),
                instructions: Instructions {
                    postgres: vec!["CREATE TABLE \"users\" ()".into()],
                    mysql: Vec::new(),
                    sqlite: vec![
                        "CREATE TABLE \"users\" ()".into(),
                        "SELECT 1;\nSELECT 2".into(),
                    ],
                },
            }],
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path().join("absent.json"));
        assert!(snapshot.load().unwrap().is_none());
        assert_eq!(snapshot.load_or_default().unwrap(), MigrationPlan::new());
    }

    #[test]
    fn save_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");
        let snapshot = Snapshot::new(&path);

        snapshot.save(&MigrationPlan::new()).unwrap();
        snapshot.save(&sample_plan()).unwrap();

        assert_eq!(snapshot.load().unwrap().unwrap(), sample_plan());
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("snapshot.json")]);
    }

    #[test]
    fn document_has_schema_and_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = Snapshot::new(dir.path().join("snapshot.json"));
        snapshot.save(&sample_plan()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(snapshot.path()).unwrap()).unwrap();
        assert_eq!(raw["schema"]["name"], "app");
        assert!(raw["schema"]["tables"]["users"]["columns"].is_array());
        let instructions = &raw["migrations"][0]["instructions"];
        assert_eq!(instructions["mysql"], serde_json::json!([]));
        assert_eq!(instructions["sqlite"][1], "SELECT 1;\nSELECT 2");
    }

    #[test]
    fn malformed_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Snapshot::new(&path).load().unwrap_err();
        assert!(matches!(err, MigrateError::Snapshot { path: ref p, .. } if *p == path));
    }
}
