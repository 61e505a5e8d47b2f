//! # Validation Violations
//!
//! Validation is a trust boundary: a value that fails its schema is rejected
//! with every violation found, not just the first. Each [`Violation`] names
//! the offending field path and the type the schema expected there.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Path to the violating field, e.g. `address.city` or `items[2]`.
    /// Empty for the root value.
    pub path: String,
    /// The schema type expected at this path, e.g. `string` or
    /// `record com.example.Address`.
    pub expected: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl Violation {
    /// Create a violation.
    pub fn new(
        path: impl Into<String>,
        expected: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            message: message.into(),
        }
    }

    /// The path, rendered as `(root)` for the root value.
    pub fn display_path(&self) -> &str {
        if self.path.is_empty() {
            "(root)"
        } else {
            &self.path
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.display_path(), self.message)
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation.
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Returns an iterator over the violations.
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    /// One `path: message` line per violation.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

}

impl From<Vec<Violation>> for ValidationViolations {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl IntoIterator for ValidationViolations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// A value did not conform to the named schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value does not conform to schema '{schema}': {violations}")]
pub struct ValidationError {
    /// Full name of the schema validated against.
    pub schema: String,
    /// Every violation found.
    pub violations: ValidationViolations,
}
