//! Document persistence helpers.
//!
//! Writes go through a temp-file-and-rename step so a crash mid-write
//! never leaves a half-written active document. The `.bak` copy is taken
//! after a successful save, not as a pre-write snapshot; a crash between
//! save and copy leaves the backup one generation stale (accepted gap).

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Atomically replace `path` with `data`.
pub fn write_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut tmp = dir;
    tmp.push(format!(
        ".sbm-{}-{}.tmp",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    f.write_all(data)?;
    f.flush()?;
    f.sync_all()?;
    drop(f);

    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Backup lives next to the active document with a `.bak` suffix.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".bak");
    PathBuf::from(os)
}

/// Save the document, then refresh its backup by whole-file copy.
/// The backup copy is best-effort: a failed copy is logged, not fatal.
pub fn save_with_backup(path: &Path, data: &[u8]) -> io::Result<()> {
    write_atomic(path, data)?;
    if let Err(e) = fs::copy(path, backup_path(path)) {
        warn!(path = %path.display(), error = %e, "backup copy failed");
    }
    Ok(())
}

/// Rollback = delete the active document and copy the backup over it.
pub fn rollback_from_backup(path: &Path) -> io::Result<()> {
    let bak = backup_path(path);
    if !bak.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no backup at {}", bak.display()),
        ));
    }
    if path.exists() {
        fs::remove_file(path)?;
    }
    fs::copy(&bak, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_refreshes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("active.json");
        save_with_backup(&p, b"{\"v\":1}").unwrap();
        assert_eq!(fs::read_to_string(backup_path(&p)).unwrap(), "{\"v\":1}");
        save_with_backup(&p, b"{\"v\":2}").unwrap();
        assert_eq!(fs::read_to_string(backup_path(&p)).unwrap(), "{\"v\":2}");
    }

    #[test]
    fn rollback_restores_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("active.json");
        save_with_backup(&p, b"good").unwrap();
        // out-of-band corruption of the active file
        fs::write(&p, b"garbage").unwrap();
        rollback_from_backup(&p).unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "good");
    }

    #[test]
    fn rollback_without_backup_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("never-saved.json");
        let err = rollback_from_backup(&p).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
