//! Flat file names.

use crate::error::{ProtocolError, ProtocolResult};
use std::path::Path;

/// Checks that `name` is a valid flat file name.
///
/// The store has no directories, so a name must not contain a path
/// separator and must not be `.` or `..`.
pub fn validate_name(name: &str) -> ProtocolResult<()> {
    let reason = if name.is_empty() {
        "empty"
    } else if name == "." || name == ".." {
        "refers to a directory"
    } else if name.contains('/') || name.contains('\\') {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains NUL"
    } else {
        return Ok(());
    };

    Err(ProtocolError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Returns the flat name of the last component of `path`, if it is valid
/// UTF-8 and a valid name.
pub fn file_name_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    validate_name(name).ok().map(|_| name)
}
