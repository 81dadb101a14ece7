//! Owner-only, crash-safe file replacement.

use std::io;
use std::io::Write;
use std::path::Path;

/// Replaces `path` with `contents`, creating parent directories as needed.
///
/// Writes to a uniquely named temp file in the same directory, fsyncs it,
/// then renames it over the target. Readers observe either the old or the
/// new file. The result is mode 0600 on Unix.
pub fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
