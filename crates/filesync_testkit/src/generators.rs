//! Property-based test generators using proptest.
//!
//! Provides strategies for file names, contents and whole directory
//! states on either side of a sync.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Suffixes that the default ignore rules always match.
pub const IGNORED_SUFFIXES: &[&str] = &[".swp", ".tmp", ".part", "~"];

/// Strategy for generating valid, never-ignored file names.
pub fn file_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}\\.(txt|md|bin)").expect("Invalid regex")
}

/// Strategy for generating names the default ignore rules match.
pub fn ignored_name_strategy() -> impl Strategy<Value = String> {
    (file_name_strategy(), prop::sample::select(IGNORED_SUFFIXES))
        .prop_map(|(name, suffix)| format!("{name}{suffix}"))
}

/// Strategy for generating file contents.
pub fn file_content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating modification times, in whole seconds.
///
/// Kept to a narrow range so that equal mtimes come up regularly.
pub fn mtime_strategy() -> impl Strategy<Value = u64> {
    1_600_000_000u64..1_600_000_008
}

/// One file on one side of a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    /// File contents.
    pub data: Vec<u8>,
    /// Modification time in seconds since the epoch.
    pub mtime: u64,
}

/// Strategy for generating one file.
///
/// Contents are drawn from a small pool so that both sides often agree.
pub fn file_state_strategy() -> impl Strategy<Value = FileState> {
    let data = prop_oneof![
        2 => prop::sample::select(vec![b"alpha".to_vec(), b"beta".to_vec(), Vec::new()]),
        1 => file_content_strategy(),
    ];
    (data, mtime_strategy()).prop_map(|(data, mtime)| FileState { data, mtime })
}

/// Strategy for generating the files of one directory, keyed by name.
pub fn directory_state_strategy(max_files: usize) -> impl Strategy<Value = BTreeMap<String, FileState>> {
    prop::collection::btree_map(file_name_strategy(), file_state_strategy(), 0..=max_files)
}

/// Strategy for generating a local and a remote directory that overlap.
///
/// Names are drawn from a shared pool so that the two sides have local-only,
/// remote-only and shared names.
pub fn paired_state_strategy(
    max_files: usize,
) -> impl Strategy<Value = (BTreeMap<String, FileState>, BTreeMap<String, FileState>)> {
    let side = |pool: Vec<String>| {
        prop::collection::btree_map(prop::sample::select(pool), file_state_strategy(), 0..=4)
    };
    prop::collection::vec(file_name_strategy(), 1..=max_files.max(1))
        .prop_flat_map(move |pool| (side(pool.clone()), side(pool)))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    ///
    /// Suited to properties that touch the filesystem on every case.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
