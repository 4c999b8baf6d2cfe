//! Per-execution workspaces and their retention sweep.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use scenesmith_core::obs;
use scenesmith_core::{Result, SceneError};

use crate::config::RetentionPolicy;
use crate::fs_util::remove_dir_forced;

/// Directories under the root with this prefix hold finished sequences.
pub const SEQUENCE_PREFIX: &str = "sequential_";

const CREATE_ATTEMPTS: usize = 5;

/// An isolated directory owned by one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub root: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Counts from one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Allocates workspaces under a shared root and sweeps old ones.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    constrained: bool,
    retention: RetentionPolicy,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, constrained: bool, retention: RetentionPolicy) -> Self {
        Self {
            root: root.into(),
            constrained,
            retention,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, uniquely named directory.
    pub fn create(&self) -> Result<Workspace> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            SceneError::Workspace(format!("cannot create root {}: {e}", self.root.display()))
        })?;

        for _ in 0..CREATE_ATTEMPTS {
            let id = self.new_id();
            let root = self.root.join(&id);
            match std::fs::create_dir(&root) {
                Ok(()) => {
                    obs::emit_workspace_created(&id, &root);
                    return Ok(Workspace {
                        id,
                        root,
                        created_at: Utc::now(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SceneError::Workspace(format!(
                        "cannot create {}: {e}",
                        root.display()
                    )))
                }
            }
        }
        Err(SceneError::Workspace(format!(
            "no free workspace id under {} after {CREATE_ATTEMPTS} attempts",
            self.root.display()
        )))
    }

    /// [`create`](Self::create) on tokio's blocking pool.
    pub async fn create_async(&self) -> Result<Workspace> {
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.create())
            .await
            .map_err(|e| SceneError::Workspace(format!("workspace creation task failed: {e}")))?
    }

    /// Opaque id; short lowercase hex on the constrained platform.
    fn new_id(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        if self.constrained {
            id[..8].to_string()
        } else {
            id
        }
    }

    /// Sweep with the configured maximum age.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_older_than(self.retention.max_age())
    }

    /// [`sweep`](Self::sweep) on tokio's blocking pool.
    pub async fn sweep_async(&self) -> SweepReport {
        let manager = self.clone();
        match tokio::task::spawn_blocking(move || manager.sweep()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "workspace sweep task failed");
                SweepReport::default()
            }
        }
    }

    /// Delete workspaces older than `max_age` among the most recently
    /// modified `sweep_cap` directories. Never fails.
    pub fn sweep_older_than(&self, max_age: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return report;
        };

        let mut candidates: Vec<(PathBuf, SystemTime)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                !e.file_name()
                    .to_string_lossy()
                    .starts_with(SEQUENCE_PREFIX)
            })
            .filter_map(|e| {
                let meta = e.metadata().ok()?;
                if !meta.is_dir() {
                    return None;
                }
                Some((e.path(), meta.modified().ok()?))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.truncate(self.retention.sweep_cap);

        let now = SystemTime::now();
        for (path, modified) in candidates {
            report.scanned += 1;
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match remove_dir_forced(&path) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    obs::emit_sweep_delete_failed(&path, &e);
                    report.failed += 1;
                }
            }
        }

        obs::emit_sweep_completed(report.scanned, report.removed, report.failed);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(root: &Path, constrained: bool, cap: usize) -> WorkspaceManager {
        WorkspaceManager::new(
            root,
            constrained,
            RetentionPolicy {
                max_age_secs: 3600,
                sweep_cap: cap,
            },
        )
    }

    #[cfg(unix)]
    fn age_dir(path: &Path, by: Duration) {
        let file = std::fs::File::open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_create_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), false, 20);
        let a = mgr.create().unwrap();
        let b = mgr.create().unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.root.is_dir());
        assert_eq!(a.id.len(), 32);
        assert_eq!(a.path("scene.py"), a.root.join("scene.py"));
    }

    #[test]
    fn test_constrained_ids_are_short_hex() {
        let dir = tempfile::tempdir().unwrap();
        let ws = manager(dir.path(), true, 20).create().unwrap();
        assert_eq!(ws.id.len(), 8);
        assert!(ws.id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_create_makes_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a/b");
        let ws = manager(&root, false, 20).create().unwrap();
        assert!(ws.root.starts_with(&root));
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_removes_only_old() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), false, 20);
        let old = mgr.create().unwrap();
        let fresh = mgr.create().unwrap();
        age_dir(&old.root, Duration::from_secs(7200));

        let report = mgr.sweep();
        assert_eq!(report, SweepReport { scanned: 2, removed: 1, failed: 0 });
        assert!(!old.root.exists());
        assert!(fresh.root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_bounded_by_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), false, 2);
        let mut all = Vec::new();
        for i in 0..4u64 {
            let ws = mgr.create().unwrap();
            age_dir(&ws.root, Duration::from_secs(7200 + i * 60));
            all.push(ws);
        }

        let report = mgr.sweep();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, 2);
        // The two least recently modified are outside the cap.
        assert!(all[2].root.exists());
        assert!(all[3].root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_sweep_skips_sequence_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("sequential_0badf00d");
        std::fs::create_dir(&store).unwrap();
        age_dir(&store, Duration::from_secs(7200));

        let report = manager(dir.path(), false, 20).sweep();
        assert_eq!(report.scanned, 0);
        assert!(store.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_async_create_and_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path(), false, 20);
        let old = mgr.create_async().await.unwrap();
        let fresh = mgr.create_async().await.unwrap();
        age_dir(&old.root, Duration::from_secs(7200));

        let report = mgr.sweep_async().await;
        assert_eq!(report.removed, 1);
        assert!(!old.root.exists());
        assert!(fresh.root.is_dir());
    }

    #[test]
    fn test_sweep_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let report = manager(&dir.path().join("none"), false, 20).sweep();
        assert_eq!(report, SweepReport::default());
    }
}
