//! Schema-per-center tenancy
//!
//! Each center owns one PostgreSQL schema. A unit of work is bound to a
//! center by opening a transaction and setting its `search_path` with
//! `SET LOCAL`, so the binding lives exactly as long as the transaction:
//! commit, rollback or drop all return the pooled connection to its ambient
//! (shared-schema) state. Nothing process-wide remembers "the current
//! tenant"; concurrent requests for different centers each carry their own
//! [`TenantScope`].
//!
//! Provides:
//! - [`SchemaName`]: validated schema identifier
//! - [`derive_schema_name`]: collision-free identifier from a center name
//! - [`TenantContext`] / [`RequestScope`]: per-request tenant resolution
//! - [`TenantScope`] / [`with_tenant_scope`]: scoped execution
//! - [`provision_schema`] / [`migrate_schema`]: schema lifecycle

mod resolve;
mod scope;

pub use resolve::{normalize_host, RequestScope, TenantContext};
pub use scope::{migrate_schema, provision_schema, with_tenant_scope, TenantScope};

use crate::errors::{AppError, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Name of the shared schema holding centers, domains and users
pub const PUBLIC_SCHEMA: &str = "public";

/// PostgreSQL truncates identifiers beyond 63 bytes
const MAX_SCHEMA_NAME_LEN: usize = 63;

static SCHEMA_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Length is checked separately; the pattern only covers the alphabet.
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("schema name pattern is valid")
});

/// A validated PostgreSQL schema identifier for a center
///
/// Validation makes it safe to splice into DDL and `SET search_path`
/// statements, which cannot take bind parameters. The name is always
/// double-quoted in SQL, so its case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaName(String);

impl SchemaName {
    /// Validate a schema identifier
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        let invalid = |reason: &str| AppError::InvalidSchemaName {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if name.len() > MAX_SCHEMA_NAME_LEN {
            return Err(invalid("must be at most 63 characters"));
        }
        if !SCHEMA_NAME_RE.is_match(&name) {
            return Err(invalid(
                "must start with a letter or underscore and contain only letters, digits and underscores",
            ));
        }
        let lowered = name.to_lowercase();
        if lowered == PUBLIC_SCHEMA || lowered == "information_schema" || lowered.starts_with("pg_") {
            return Err(invalid("is reserved"));
        }

        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for use in SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SchemaName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<SchemaName> for String {
    fn from(name: SchemaName) -> Self {
        name.0
    }
}

/// Longest `_N` suffix derivation can append (`_` plus a `u32`)
const MAX_SUFFIX_LEN: usize = 11;

/// Base schema identifier for a center name: lower-cased, with spaces and
/// hyphens turned into underscores, cut to the identifier limit
pub fn schema_base_name(center_name: &str) -> String {
    let base = center_name.trim().to_lowercase().replace([' ', '-'], "_");
    truncate_to(&base, MAX_SCHEMA_NAME_LEN).to_string()
}

/// Prefix shared by every candidate [`derive_schema_name`] can produce for
/// `center_name`; lets callers fetch the taken names in one query
pub fn schema_name_prefix(center_name: &str) -> String {
    let base = schema_base_name(center_name);
    truncate_to(&base, MAX_SCHEMA_NAME_LEN - MAX_SUFFIX_LEN).to_string()
}

/// Derive a schema identifier that `is_taken` does not report as used
///
/// The unsuffixed base wins if free; otherwise `_1`, `_2`, ... are tried in
/// order and the first free candidate is returned. The base is shortened as
/// needed so every candidate stays within 63 bytes.
pub fn derive_schema_name<F>(center_name: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = schema_base_name(center_name);
    let mut candidate = base.clone();
    let mut counter = 1u32;

    while is_taken(&candidate) {
        let suffix = format!("_{}", counter);
        candidate = format!("{}{}", truncate_to(&base, MAX_SCHEMA_NAME_LEN - suffix.len()), suffix);
        counter += 1;
    }

    candidate
}

/// Longest prefix of `s` within `max` bytes, cut on a char boundary
fn truncate_to(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_derive_unsuffixed_when_free() {
        let taken: HashSet<&str> = HashSet::new();
        assert_eq!(derive_schema_name("Acme", |c| taken.contains(c)), "acme");
    }

    #[test]
    fn test_derive_skips_taken_suffixes() {
        let taken: HashSet<&str> = ["acme", "acme_1"].into_iter().collect();
        assert_eq!(derive_schema_name("Acme", |c| taken.contains(c)), "acme_2");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let taken: HashSet<&str> = ["north_lab"].into_iter().collect();
        let first = derive_schema_name("North-Lab", |c| taken.contains(c));
        let second = derive_schema_name("North-Lab", |c| taken.contains(c));
        assert_eq!(first, "north_lab_1");
        assert_eq!(first, second);
    }

    #[test]
    fn test_derive_fits_identifier_limit() {
        let none: HashSet<String> = HashSet::new();

        let exact = "a".repeat(63);
        assert_eq!(derive_schema_name(&exact, |c| none.contains(c)), exact);

        let over = "b".repeat(64);
        assert_eq!(derive_schema_name(&over, |c| none.contains(c)), "b".repeat(63));

        let long = format!("Central Regional {}", "x".repeat(83));
        assert_eq!(long.len(), 100);
        let derived = derive_schema_name(&long, |c| none.contains(c));
        assert_eq!(derived.len(), 63);
        assert!(SchemaName::parse(derived).is_ok());
    }

    #[test]
    fn test_derive_suffix_shortens_long_base() {
        let name = "c".repeat(100);
        let taken: HashSet<String> = ["c".repeat(63), format!("{}_1", "c".repeat(61))]
            .into_iter()
            .collect();

        let derived = derive_schema_name(&name, |c| taken.contains(c));
        assert_eq!(derived, format!("{}_2", "c".repeat(61)));
        assert!(SchemaName::parse(derived.clone()).is_ok());
        assert!(derived.starts_with(&schema_name_prefix(&name)));
        assert!(taken.iter().all(|t| t.starts_with(&schema_name_prefix(&name))));
    }

    #[test]
    fn test_base_name_replaces_spaces_and_hyphens() {
        assert_eq!(schema_base_name("City Blood-Bank"), "city_blood_bank");
        assert_eq!(schema_base_name("  Lab  "), "lab");
    }

    #[test]
    fn test_schema_name_validation() {
        assert!(SchemaName::parse("acme_2").is_ok());
        assert!(SchemaName::parse("_lab").is_ok());
        assert!(SchemaName::parse("").is_err());
        assert!(SchemaName::parse("2lab").is_err());
        assert!(SchemaName::parse("labX").is_ok());
        assert!(SchemaName::parse("lab-x").is_err());
        assert!(SchemaName::parse("lab\"; drop table users; --").is_err());
        assert!(SchemaName::parse("public").is_err());
        assert!(SchemaName::parse("pg_catalog").is_err());
        assert!(SchemaName::parse("PG_temp").is_err());
        assert!(SchemaName::parse("information_schema").is_err());
        assert!(SchemaName::parse("a".repeat(64)).is_err());
        assert!(SchemaName::parse("a".repeat(63)).is_ok());
    }

    #[test]
    fn test_schema_name_quoted() {
        let name = SchemaName::parse("labx").unwrap();
        assert_eq!(name.quoted(), "\"labx\"");
        assert_eq!(name.to_string(), "labx");
    }

    #[test]
    fn test_schema_name_deserialize_validates() {
        let ok: std::result::Result<SchemaName, _> = serde_json::from_str("\"acme\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<SchemaName, _> = serde_json::from_str("\"Acme Labs\"");
        assert!(bad.is_err());
    }
}
