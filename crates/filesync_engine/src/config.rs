//! Configuration for the sync engine.

use crate::ignore::IgnoreRules;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Patterns ignored by default: editor swap files, partial downloads, VCS
/// and tool directories, OS metadata.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".goutputstream-",
    "~",
    ".swp",
    ".tmp",
    ".part",
    ".DS_Store",
    ".git",
    ".gitignore",
    ".env",
    ".venv",
    ".idea",
    ".vscode",
    ".svn",
    ".cache",
    ".local",
    ".npm",
    ".yarn",
    "Thumbs.db",
    "desktop.ini",
];

/// What reconciliation does with a file that exists locally but not remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// The remote listing is authoritative: delete the local file.
    ///
    /// A file created locally and not yet uploaded is deleted by the next
    /// pass unless its debounced upload fires first.
    Mirror,
    /// Delete only files the manifest records as previously synced; push
    /// files that were never synced.
    #[default]
    Manifest,
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrphanPolicy::Mirror => f.write_str("mirror"),
            OrphanPolicy::Manifest => f.write_str("manifest"),
        }
    }
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mirror" => Ok(OrphanPolicy::Mirror),
            "manifest" => Ok(OrphanPolicy::Manifest),
            other => Err(format!("unknown orphan policy '{other}' (mirror, manifest)")),
        }
    }
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server URL.
    pub server_url: String,
    /// Watched local directory.
    pub local_dir: PathBuf,
    /// Name prefixes/suffixes excluded from sync.
    pub ignore_patterns: Vec<String>,
    /// Quiet period after the last modification before an upload fires.
    pub debounce_window: Duration,
    /// How often pending uploads are checked against their deadline.
    pub debounce_tick: Duration,
    /// Period of full reconciliation passes.
    pub reconcile_interval: Duration,
    /// Request timeout.
    pub timeout: Duration,
    /// Handling of local-only files during reconciliation.
    pub orphan_policy: OrphanPolicy,
    /// Where the sync manifest is persisted, if anywhere.
    pub manifest_path: Option<PathBuf>,
    /// Capacity of the event and work queues.
    pub queue_capacity: usize,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(server_url: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into(),
            local_dir: local_dir.into(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            debounce_window: Duration::from_secs(1),
            debounce_tick: Duration::from_millis(100),
            reconcile_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            orphan_policy: OrphanPolicy::default(),
            manifest_path: None,
            queue_capacity: 1024,
        }
    }

    /// Replaces the ignore patterns.
    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the debounce tick.
    pub fn with_debounce_tick(mut self, tick: Duration) -> Self {
        self.debounce_tick = tick;
        self
    }

    /// Sets the reconciliation interval.
    pub fn with_reconcile_interval(mut self, interval: Duration) -> Self {
        self.reconcile_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the orphan policy.
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Persists the manifest at `path`.
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Builds the ignore rules.
    ///
    /// A manifest stored inside the watched directory is ignored too, so the
    /// client never uploads its own state file.
    pub fn ignore_rules(&self) -> IgnoreRules {
        let mut patterns = self.ignore_patterns.clone();
        if let Some(path) = &self.manifest_path {
            if path.parent() == Some(self.local_dir.as_path()) {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    patterns.push(name.to_string());
                }
            }
        }
        IgnoreRules::new(patterns)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080", ".")
    }
}
