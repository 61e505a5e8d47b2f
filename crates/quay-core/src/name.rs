//! # Schema Names
//!
//! A fully-qualified schema name is a dot-separated path such as
//! `com.example.FullName`. The part after the last dot is the short name;
//! everything before it is the namespace. Route endpoints are derived from
//! the namespace and route paths end in the short name, so the split must be
//! exact and a name must never be empty.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::NameError;

/// Fully-qualified schema name, split on the last dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaName {
    namespace: Option<String>,
    short: String,
}

impl SchemaName {
    /// Parse a fully-qualified name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::Empty`] for an empty string and
    /// [`NameError::EmptySegment`] when any dot-separated segment is empty.
    pub fn parse(full: &str) -> Result<Self, NameError> {
        if full.is_empty() {
            return Err(NameError::Empty);
        }
        if full.split('.').any(str::is_empty) {
            return Err(NameError::EmptySegment(full.to_string()));
        }
        Ok(match full.rsplit_once('.') {
            Some((namespace, short)) => Self {
                namespace: Some(namespace.to_string()),
                short: short.to_string(),
            },
            None => Self {
                namespace: None,
                short: full.to_string(),
            },
        })
    }

    /// Build a name from a short name and an optional namespace.
    ///
    /// An empty namespace is treated as absent.
    pub fn from_parts(namespace: Option<&str>, short: &str) -> Result<Self, NameError> {
        match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => Self::parse(&format!("{ns}.{short}")),
            None => Self::parse(short),
        }
    }

    /// The namespace, if the name has one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// The namespace, or `""` for names without one.
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    /// The part after the last dot.
    pub fn short_name(&self) -> &str {
        &self.short
    }

    /// The fully-qualified name.
    pub fn full(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.short),
            None => self.short.clone(),
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.short),
            None => f.write_str(&self.short),
        }
    }
}

impl FromStr for SchemaName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SchemaName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Joining namespace and short name reproduces the parsed input.
        #[test]
        fn parse_full_roundtrip(segments in prop::collection::vec("[a-zA-Z_][a-zA-Z0-9_]{0,8}", 1..5)) {
            let full = segments.join(".");
            let name = SchemaName::parse(&full).unwrap();
            prop_assert_eq!(name.full(), full);
            prop_assert_eq!(name.short_name(), segments.last().unwrap().as_str());
        }
    }
}
