//! Finding the media a render left in its workspace.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use scenesmith_core::obs;
use scenesmith_core::{Artifact, ExecutionAttempt, MediaKind, Result, SceneError};

/// Depth below the workspace root covered by the fallback walk.
pub const FALLBACK_DEPTH: usize = 2;

/// Intermediate chunks the engine stitches into the final movie.
const PARTIAL_DIR: &str = "partial_movie_files";

/// Best media file under `workspace`, if any.
///
/// Video beats animated image beats frame image; within a kind the most
/// recently modified file wins. A recursive search runs first and a
/// depth-bounded manual walk that follows symlinks runs when it finds
/// nothing.
pub fn locate_artifact(workspace: &Path) -> Option<Artifact> {
    let mut candidates = recursive_candidates(workspace);
    if candidates.is_empty() {
        candidates = bounded_walk(workspace, FALLBACK_DEPTH);
    }

    let (path, kind, _) = candidates
        .into_iter()
        .min_by_key(|(_, kind, modified)| (*kind, Reverse(*modified)))?;
    let path = std::path::absolute(&path).unwrap_or(path);
    obs::emit_artifact_located(&path, &format!("{kind:?}"));
    Some(Artifact::new(path, kind))
}

/// Like [`locate_artifact`], but a miss after a clean exit is an error
/// carrying that attempt's diagnostics.
pub fn require_artifact(workspace: &Path, attempt: &ExecutionAttempt) -> Result<Artifact> {
    locate_artifact(workspace).ok_or_else(|| SceneError::NoArtifactProduced {
        workspace: workspace.to_path_buf(),
        diagnostics: attempt.diagnostics(),
    })
}

/// [`require_artifact`] on tokio's blocking pool.
pub async fn find_artifact(workspace: &Path, attempt: &ExecutionAttempt) -> Result<Artifact> {
    let root = workspace.to_path_buf();
    let attempt = attempt.clone();
    tokio::task::spawn_blocking(move || require_artifact(&root, &attempt))
        .await
        .map_err(|e| SceneError::Workspace(format!("artifact search task failed: {e}")))?
}

type Candidate = (PathBuf, MediaKind, SystemTime);

fn candidate(path: PathBuf, modified: Option<SystemTime>) -> Option<Candidate> {
    if path.components().any(|c| c.as_os_str() == PARTIAL_DIR) {
        return None;
    }
    let kind = MediaKind::from_path(&path)?;
    Some((path, kind, modified.unwrap_or(SystemTime::UNIX_EPOCH)))
}

fn recursive_candidates(root: &Path) -> Vec<Candidate> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name() != PARTIAL_DIR)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let modified = e.metadata().ok().and_then(|m| m.modified().ok());
            candidate(e.into_path(), modified)
        })
        .collect()
}

fn bounded_walk(root: &Path, max_depth: usize) -> Vec<Candidate> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            // Follows symlinks, unlike the recursive search.
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            if meta.is_dir() {
                if depth < max_depth {
                    pending.push((path, depth + 1));
                }
            } else if let Some(c) = candidate(path, meta.modified().ok()) {
                found.push(c);
            }
        }
    }
    found
}
