//! Sequential-segments mode: render several scripts and join them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use scenesmith_core::{Artifact, MediaKind, Result, SceneError, ScriptSubmission};

use crate::fs_util::move_file;
use crate::pipeline::{RenderResult, ScenePipeline};
use crate::workspace::SEQUENCE_PREFIX;

/// One part of a long-form video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(alias = "manimCode")]
    pub script: String,

    #[serde(default, alias = "voiceover")]
    pub narration: Option<String>,
}

impl Segment {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            narration: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }
}

/// The joined video plus each segment's own result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub artifact: Artifact,
    pub segments: Vec<RenderResult>,
}

impl ScenePipeline {
    /// Render `segments` in order, narrate each, and join them into one
    /// video in the permanent store under the workspace root.
    ///
    /// Blank segments are skipped. Any segment render failure aborts the
    /// whole sequence; a segment whose narration fails is joined silent.
    pub async fn render_sequence(&self, segments: &[Segment]) -> Result<SequenceResult> {
        let active: Vec<&Segment> = segments
            .iter()
            .filter(|s| !s.script.trim().is_empty())
            .collect();
        if active.is_empty() {
            return Err(SceneError::InputEmpty);
        }

        let mut results = Vec::with_capacity(active.len());
        for (index, segment) in active.iter().enumerate() {
            let mut submission = ScriptSubmission::from_script(segment.script.clone());
            submission.narration = segment.narration.clone();
            let result = self.process(&submission).await?;
            info!(
                segment = index,
                path = %result.artifact.path.display(),
                "segment rendered"
            );
            results.push(result);
        }

        let joined = if results.len() == 1 {
            results[0].artifact.path.clone()
        } else {
            self.join(&results).await?
        };

        let store = self.config.workspace_root.join(format!(
            "{SEQUENCE_PREFIX}{}",
            &Uuid::new_v4().simple().to_string()[..8]
        ));
        let file_name = joined
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("sequence.mp4"));
        let dest = store.join(file_name);
        move_file(&joined, &dest).await?;
        if let [only] = results.as_mut_slice() {
            only.artifact.path = dest.clone();
        }

        let kind = results[0].artifact.kind;
        let narrated = results.iter().all(|r| r.artifact.narrated);
        let mut artifact = Artifact::new(dest, kind);
        artifact.narrated = narrated;
        Ok(SequenceResult {
            artifact,
            segments: results,
        })
    }

    async fn join(&self, results: &[RenderResult]) -> Result<PathBuf> {
        if let Some(r) = results.iter().find(|r| r.artifact.kind != MediaKind::Video) {
            return Err(SceneError::ConcatenationFailed(format!(
                "{} is not a video",
                r.artifact.path.display()
            )));
        }
        let paths: Vec<PathBuf> = results.iter().map(|r| r.artifact.path.clone()).collect();

        let workspace = self.workspaces.create_async().await?;
        let output = workspace.path("sequence.mp4");
        self.voiceover
            .concatenate(&paths, &output)
            .await
            .map_err(|e| SceneError::ConcatenationFailed(e.to_string()))?;
        Ok(output)
    }
}
