//! Function filtering for -e wrap= expressions
//!
//! Selects which callables the binder instruments. Supports:
//! - Individual names: -e wrap=parse,render
//! - Negation: -e wrap=!helper (everything except helper)
//! - Regex patterns: -e wrap=/^handle_/

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;

/// Filter that determines which functions to wrap
#[derive(Debug, Clone)]
pub struct FunctionFilter {
    /// Names to include (None = all functions)
    include: Option<HashSet<String>>,
    /// Names to exclude, checked before includes
    exclude: HashSet<String>,
    /// Patterns to include
    patterns: Vec<Regex>,
}

impl FunctionFilter {
    /// Create a filter that wraps every function
    pub fn all() -> Self {
        Self {
            include: None,
            exclude: HashSet::new(),
            patterns: Vec::new(),
        }
    }

    /// Parse a filter expression like "wrap=parse,!helper,/^handle_/"
    pub fn from_expr(expr: &str) -> Result<Self> {
        if let Some(spec) = expr.strip_prefix("wrap=") {
            Self::from_wrap_spec(spec)
        } else {
            bail!(
                "Invalid filter expression: {}. Expected format: wrap=SPEC",
                expr
            );
        }
    }

    /// Parse a wrap specification (the part after "wrap=")
    fn from_wrap_spec(spec: &str) -> Result<Self> {
        let mut include = HashSet::new();
        let mut exclude = HashSet::new();
        let mut patterns = Vec::new();

        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            if let Some(name) = part.strip_prefix('!') {
                exclude.insert(name.trim().to_string());
            } else if let Some(pattern) = part
                .strip_prefix('/')
                .and_then(|rest| rest.strip_suffix('/'))
            {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid regex pattern: {}", pattern))?;
                patterns.push(regex);
            } else {
                include.insert(part.to_string());
            }
        }

        // Only negations given: everything else is wrapped
        let include = if include.is_empty() && patterns.is_empty() {
            None
        } else {
            Some(include)
        };

        Ok(Self {
            include,
            exclude,
            patterns,
        })
    }

    /// Check if a function should be wrapped
    pub fn should_wrap(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        match &self.include {
            None => true,
            Some(set) => set.contains(name) || self.patterns.iter().any(|re| re.is_match(name)),
        }
    }
}

impl Default for FunctionFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_all_wraps_everything() {
        let filter = FunctionFilter::all();
        assert!(filter.should_wrap("main"));
        assert!(filter.should_wrap("anything"));
    }

    #[test]
    fn test_filter_individual_names() {
        let filter = FunctionFilter::from_expr("wrap=parse,render").unwrap();
        assert!(filter.should_wrap("parse"));
        assert!(filter.should_wrap("render"));
        assert!(!filter.should_wrap("main"));
    }

    #[test]
    fn test_filter_negation_only() {
        let filter = FunctionFilter::from_expr("wrap=!helper").unwrap();
        assert!(!filter.should_wrap("helper"));
        assert!(filter.should_wrap("main"));
    }

    #[test]
    fn test_filter_regex() {
        let filter = FunctionFilter::from_expr("wrap=/^handle_/").unwrap();
        assert!(filter.should_wrap("handle_request"));
        assert!(!filter.should_wrap("main"));
    }

    #[test]
    fn test_filter_mixed() {
        let filter = FunctionFilter::from_expr("wrap=main,/^work_/,!work_idle").unwrap();
        assert!(filter.should_wrap("main"));
        assert!(filter.should_wrap("work_hard"));
        assert!(!filter.should_wrap("work_idle"));
        assert!(!filter.should_wrap("other"));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(FunctionFilter::from_expr("invalid").is_err());
    }

    #[test]
    fn test_invalid_regex() {
        let err = FunctionFilter::from_expr("wrap=/([/").unwrap_err();
        assert!(err.to_string().contains("Invalid regex pattern"));
    }

    #[test]
    fn test_filter_whitespace_handling() {
        let filter = FunctionFilter::from_expr("wrap=parse, render ,  ").unwrap();
        assert!(filter.should_wrap("parse"));
        assert!(filter.should_wrap("render"));
        assert!(!filter.should_wrap("close"));
    }

    #[test]
    fn test_empty_wrap_list_wraps_everything() {
        let filter = FunctionFilter::from_expr("wrap=").unwrap();
        assert!(filter.should_wrap("main"));
    }
}
