//! Filesystem helpers
//!
//! Atomic writes go through a sibling temp file followed by a rename so
//! readers never observe a partially written stamp or log record.

use camino::Utf8Path;
use std::fs;
use std::io::{self, Write};

/// Write `content` to `path` atomically (temp file + rename)
///
/// Creates parent directories as needed. The temp file lives next to
/// the target so the rename stays on one filesystem.
pub fn atomic_write(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(content)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append one line to a file, creating it and its parents as needed
pub fn append_line(path: &Utf8Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}
