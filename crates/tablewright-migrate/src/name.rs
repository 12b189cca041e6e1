//! Migration unit names.
//!
//! A name is a 14-digit timestamp, an underscore and a lowercase snake case
//! description, e.g. `20240101120000_create_users`. The timestamp is the
//! version migrations are ordered by.

use std::fmt;

use crate::error::{MigrateError, Result};

const VERSION_DIGITS: usize = 14;

/// A validated migration name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationName {
    name: String,
    version: u64,
}

impl MigrationName {
    /// Parses and validates a migration name.
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = |reason: &str| MigrateError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        if name.len() < VERSION_DIGITS + 2 {
            return Err(invalid("expected at least 16 characters"));
        }
        if !name.as_bytes()[..VERSION_DIGITS]
            .iter()
            .all(u8::is_ascii_digit)
        {
            return Err(invalid("the first 14 characters must be digits"));
        }
        let (digits, rest) = name.split_at(VERSION_DIGITS);
        let Some(description) = rest.strip_prefix('_') else {
            return Err(invalid("expected '_' after the timestamp"));
        };
        if description.is_empty() {
            return Err(invalid("missing description after the timestamp"));
        }
        if !description
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(invalid("the description must be lowercase snake case"));
        }
        if description.starts_with('_') {
            return Err(invalid("the description must not start with '_'"));
        }

        let version = digits
            .parse()
            .map_err(|_| invalid("timestamp out of range"))?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// The full name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// The numeric timestamp prefix.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The part after the timestamp.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.name[VERSION_DIGITS + 1..]
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialOrd for MigrationName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MigrationName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.name.cmp(&other.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_name() {
        let name = MigrationName::parse("20240101120000_create_users").unwrap();
        assert_eq!(name.version(), 20_240_101_120_000);
        assert_eq!(name.description(), "create_users");
        assert_eq!(name.to_string(), "20240101120000_create_users");
    }

    #[test]
    fn shortest_valid_name() {
        let name = MigrationName::parse("00000000000001_a").unwrap();
        assert_eq!(name.version(), 1);
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in [
            "",
            "0001_initial",
            "20240101120000_",
            "20240101120000",
            "2024010112000a_users",
            "20240101120000-users",
            "20240101120000_CreateUsers",
            "20240101120000_create users",
            "20240101120000__users",
        ] {
            assert!(
                matches!(
                    MigrationName::parse(bad),
                    Err(MigrateError::InvalidName { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn orders_by_version() {
        let mut names = vec![
            MigrationName::parse("20240301000000_c").unwrap(),
            MigrationName::parse("20240101000000_a").unwrap(),
            MigrationName::parse("20240201000000_b").unwrap(),
        ];
        names.sort();
        let order: Vec<_> = names.iter().map(MigrationName::description).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
