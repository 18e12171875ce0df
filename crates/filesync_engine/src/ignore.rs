//! Ignore rule for temporary and tool-managed files.

use crate::config::DEFAULT_IGNORE_PATTERNS;

/// A set of ignore patterns.
///
/// A name is ignored if it starts with or ends with any pattern. There is
/// no globbing: `.swp` matches `notes.txt.swp` and `.swp-backup` alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    patterns: Vec<String>,
}

impl IgnoreRules {
    /// Builds rules from patterns. Empty patterns are dropped, since they
    /// would match every name.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Rules that ignore nothing.
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Returns true if `name` matches any pattern.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| name.starts_with(p.as_str()) || name.ends_with(p.as_str()))
    }

    /// Returns the patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_PATTERNS.iter().copied())
    }
}
