use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Open a task's output file for appending, creating it if needed.
///
/// Re-admitted tasks keep writing to the same file.
pub(super) fn open(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
