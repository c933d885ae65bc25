// SupportLens - platform/fs.rs
//
// Filesystem helpers: bounded reads with lossy UTF-8 decoding.

use std::io;
use std::path::Path;

/// Failure modes of a size-capped read.
#[derive(Debug)]
pub enum CappedReadError {
    Io(io::Error),
    TooLarge { size: u64, max: u64 },
}

/// Read the full content of a file as a string, refusing files larger
/// than `max_size` bytes.
///
/// Invalid UTF-8 is replaced rather than rejected, and a leading byte-order
/// mark is dropped.
pub fn read_capped_lossy(path: &Path, max_size: u64) -> Result<String, CappedReadError> {
    let size = std::fs::metadata(path).map_err(CappedReadError::Io)?.len();
    if size > max_size {
        return Err(CappedReadError::TooLarge {
            size,
            max: max_size,
        });
    }
    let bytes = std::fs::read(path).map_err(CappedReadError::Io)?;
    let decoded = String::from_utf8_lossy(&bytes);
    let text: &str = &decoded;
    Ok(text.strip_prefix('\u{FEFF}').unwrap_or(text).to_string())
}

/// Write `content` to `path`, creating parent directories as needed.
pub fn write_with_parents(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}
