//! Atomic file replacement.
//!
//! Files are written to a hidden temporary file in the destination directory,
//! flushed to disk, then renamed over the target. Readers either see the old
//! state or the complete new file, never a prefix of it.
//!
//! Temporary files are named `.tmp-*`. Callers that list a directory must
//! skip dot-files.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

/// Prefix of in-progress temporary files.
pub const TEMP_PREFIX: &str = ".tmp-";

/// Write `bytes` to `dir/file_name` atomically.
///
/// Returns the final path.
pub fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    write_atomic_with(dir, file_name, |file| file.write_all(bytes))
}

/// Write to `dir/file_name` atomically using a caller-supplied writer.
///
/// If `write` fails, the temporary file is removed and the target is left
/// untouched.
pub fn write_atomic_with<F>(dir: &Path, file_name: &str, write: F) -> io::Result<PathBuf>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    persist_in(dir, file_name, write, true)
}

/// Write `bytes` to `dir/file_name` atomically, failing with
/// [`io::ErrorKind::AlreadyExists`] if the target is already there.
///
/// The existence check and the rename are one step, so two writers racing
/// for the same name can never both succeed.
pub fn write_new_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    persist_in(dir, file_name, |file| file.write_all(bytes), false)
}

fn persist_in<F>(dir: &Path, file_name: &str, write: F, replace: bool) -> io::Result<PathBuf>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let target = dir.join(file_name);

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)?;

    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;

    if replace {
        tmp.persist(&target).map_err(|e| e.error)?;
    } else {
        tmp.persist_noclobber(&target).map_err(|e| e.error)?;
    }

    #[cfg(unix)]
    if let Ok(dir) = File::open(dir) {
        let _ = dir.sync_all();
    }

    Ok(target)
}

/// Async wrapper around [`write_atomic`] that runs on the blocking pool.
pub async fn write_atomic_async(
    dir: PathBuf,
    file_name: String,
    bytes: Bytes,
) -> io::Result<PathBuf> {
    tokio::task::spawn_blocking(move || write_atomic(&dir, &file_name, &bytes))
        .await
        .map_err(io::Error::other)?
}

/// Async wrapper around [`write_new_atomic`] that runs on the blocking pool.
pub async fn write_new_atomic_async(
    dir: PathBuf,
    file_name: String,
    bytes: Bytes,
) -> io::Result<PathBuf> {
    tokio::task::spawn_blocking(move || write_new_atomic(&dir, &file_name, &bytes))
        .await
        .map_err(io::Error::other)?
}

/// Whether a directory entry name belongs to an in-progress write.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}
