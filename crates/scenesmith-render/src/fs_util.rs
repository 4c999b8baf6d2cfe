//! Filesystem helpers for workspace cleanup and artifact hand-off.

use std::io;
use std::path::Path;

use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Clear read-only bits on `root` and everything below it.
///
/// Best effort; entries that cannot be updated are skipped.
pub fn make_writable(root: &Path) {
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut perms = metadata.permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(perms.mode() | 0o700);
        }
        #[cfg(not(unix))]
        {
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
        }
        let _ = std::fs::set_permissions(entry.path(), perms);
    }
}

/// Remove a directory tree, retrying once after forcing permissive modes.
pub fn remove_dir_forced(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "delete failed, retrying after chmod");
            make_writable(path);
            std::fs::remove_dir_all(path)
        }
    }
}

/// Move a file, falling back to copy and delete across filesystems.
pub async fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                "cross-device rename, falling back to copy+delete"
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(e),
    }
}

/// EXDEV is 18 on Linux and macOS.
fn is_cross_device_error(e: &io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> io::Result<()> {
    // Copy next to the destination so the final rename stays on one device.
    let tmp = dst.with_extension("tmp");
    if let Err(e) = fs::copy(src, &tmp).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    fs::rename(&tmp, dst).await?;
    fs::remove_file(src).await
}
