//! # filesync testkit
//!
//! Test utilities for filesync.
//!
//! This crate provides:
//! - Temporary sync directories with controllable modification times
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use filesync_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_directory() {
//!     with_temp_dir(|dir| {
//!         dir.write_with_mtime("a.txt", b"hello", 1_700_000_000);
//!         // ... run a pass against dir.path()
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
