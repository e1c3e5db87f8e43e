//! Function identity keys for statistics buckets
//!
//! A `FunctionIdentity` names a callable by its human-readable name plus the
//! source location where it was defined. Two callables that produce the same
//! (name, file, line) tuple share one statistics bucket.

use std::fmt;
use std::panic::Location;

/// Stable key identifying a profiled callable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionIdentity {
    name: String,
    file: String,
    line: u32,
}

impl FunctionIdentity {
    /// Create an identity from explicit parts
    pub fn new(name: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            line,
        }
    }

    /// Create an identity located at the caller's source position
    ///
    /// # Example
    /// ```
    /// use callprof::identity::FunctionIdentity;
    ///
    /// let id = FunctionIdentity::here("parse");
    /// assert_eq!(id.name(), "parse");
    /// assert!(id.file().ends_with(".rs"));
    /// ```
    #[track_caller]
    pub fn here(name: impl Into<String>) -> Self {
        let location = Location::caller();
        Self::new(name, location.file(), location.line())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for FunctionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.file, self.line)
    }
}
