//! Database and collection addressing.

use std::fmt;

use crate::error::{Error, Result};

/// Characters the server rejects in database names.
const INVALID_DB_NAME_CHARS: &[char] = &[' ', '.', '$', '/', '\\', '\u{0}', '"'];

/// A database/collection pair, rendered as `db.coll` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Database name.
    pub db: String,
    /// Collection name.
    pub coll: String,
}

impl Namespace {
    /// Build a namespace from database and collection names.
    #[must_use]
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.coll)
    }
}

/// Check a database name against the server's naming rules.
///
/// Empty names and names containing any of `` . $ / \ " `` (space) or a NUL
/// byte are rejected with [`Error::InvalidName`]. Validation happens on the
/// client so a bad name fails before any network call.
pub fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "database name cannot be empty".into(),
        });
    }
    if let Some(bad) = name.chars().find(|c| INVALID_DB_NAME_CHARS.contains(c)) {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: format!("database name cannot contain {bad:?}"),
        });
    }
    Ok(())
}
