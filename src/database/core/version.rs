//! Schema version strings
//!
//! Versions are dotted lists of unsigned numbers compared segment by segment,
//! so `1.9.0 < 1.10.0`. Missing trailing segments count as zero.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::error::DbError;

/// Version assumed when no version record can be read
pub const BASELINE_SCHEMA_VERSION: &str = "1.0.0";

/// Version of the schema this build of the application expects
pub const APP_SCHEMA_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct SchemaVersion {
    raw: String,
    segments: Vec<u64>,
}

impl SchemaVersion {
    pub fn parse(s: &str) -> Result<Self, DbError> {
        let raw = s.trim();
        let raw = raw.strip_prefix('v').unwrap_or(raw);
        if raw.is_empty() {
            return Err(DbError::InvalidVersion(s.to_string()));
        }

        let segments = raw
            .split('.')
            .map(|seg| seg.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DbError::InvalidVersion(s.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The baseline version, used when the database has no readable marker
    pub fn baseline() -> Self {
        Self {
            raw: BASELINE_SCHEMA_VERSION.to_string(),
            segments: vec![1, 0, 0],
        }
    }

    /// The version compiled into this application
    pub fn application() -> Self {
        Self::parse(APP_SCHEMA_VERSION).unwrap_or_else(|_| Self::baseline())
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn segment(&self, idx: usize) -> u64 {
        self.segments.get(idx).copied().unwrap_or(0)
    }
}

/// Whether a database at `current` must be migrated to reach `target`
pub fn needs_migration(current: &SchemaVersion, target: &SchemaVersion) -> bool {
    current < target
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| self.segment(i).cmp(&other.segment(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SchemaVersion {}

impl FromStr for SchemaVersion {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SchemaVersion {
        SchemaVersion::parse(s).unwrap()
    }

    #[test]
    fn test_numeric_segment_ordering() {
        assert!(v("1.9.0") < v("1.10.0"));
        assert!(v("1.2.0") < v("1.10.0"));
        assert!(v("2.0.0") > v("1.99.99"));
    }

    #[test]
    fn test_trailing_zero_segments_are_equal() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0"));
        assert!(v("1.0.0.1") > v("1.0"));
    }

    #[test]
    fn test_needs_migration() {
        assert!(!needs_migration(&v("1.0.0"), &v("1.0.0")));
        assert!(needs_migration(&v("1.0.0"), &v("1.1.0")));
        assert!(needs_migration(&v("1.9.0"), &v("1.10.0")));
        assert!(!needs_migration(&v("1.10.0"), &v("1.9.0")));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SchemaVersion::parse("").is_err());
        assert!(SchemaVersion::parse("1.x.0").is_err());
        assert!(SchemaVersion::parse("1..0").is_err());
        assert_eq!(v("v1.2.3").as_str(), "1.2.3");
    }

    #[test]
    fn test_baseline_and_application() {
        assert_eq!(SchemaVersion::baseline(), v(BASELINE_SCHEMA_VERSION));
        assert_eq!(SchemaVersion::application().to_string(), APP_SCHEMA_VERSION);
    }
}
