//! End-to-end processing of one submission.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use scenesmith_core::obs;
use scenesmith_core::{
    detect_scene, sanitize, Artifact, ExecutionAttempt, RepairEngine, RepairRecord, Result,
    SceneError, ScriptSubmission,
};

use crate::config::PipelineConfig;
use crate::locate::find_artifact;
use crate::orchestrator::{RenderJob, RenderOrchestrator};
use crate::process::{ProcessRunner, SystemRunner};
use crate::voiceover::{CommandSynthesizer, SpeechSynthesizer, VoiceoverProcessor};
use crate::workspace::{Workspace, WorkspaceManager};

/// Everything a caller needs from a successful render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    pub artifact: Artifact,
    pub workspace: Workspace,
    /// Scene class handed to the engine.
    pub scene: String,
    /// The attempt that produced the artifact.
    pub attempt: ExecutionAttempt,
    pub attempts_made: usize,
    pub repair: RepairRecord,
    pub remediated: bool,
    /// Narration was requested but dropped; the artifact is silent.
    pub voiceover_error: Option<String>,
}

/// Normalize, repair, validate, render, locate, narrate.
pub struct ScenePipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) workspaces: WorkspaceManager,
    pub(crate) orchestrator: RenderOrchestrator,
    pub(crate) voiceover: VoiceoverProcessor,
}

impl ScenePipeline {
    /// Pipeline running real programs on the host.
    pub fn new(config: PipelineConfig) -> Self {
        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
        let synthesizer = Arc::new(CommandSynthesizer::new(
            runner.clone(),
            config.voiceover.clone(),
        ));
        let mut pipeline = Self::with_components(config, runner, synthesizer);
        pipeline.voiceover = pipeline.voiceover.with_tool_check();
        pipeline
    }

    /// Pipeline over caller-supplied process and speech seams.
    pub fn with_components(
        config: PipelineConfig,
        runner: Arc<dyn ProcessRunner>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let workspaces = WorkspaceManager::new(
            &config.workspace_root,
            config.render.constrained,
            config.retention,
        );
        let orchestrator = RenderOrchestrator::new(runner.clone(), config.render.clone());
        let voiceover = VoiceoverProcessor::new(runner, synthesizer, config.voiceover.clone());
        Self {
            config,
            workspaces,
            orchestrator,
            voiceover,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run one submission through the whole pipeline.
    ///
    /// Empty or unparseable input is rejected before any workspace exists.
    /// A voiceover failure does not fail the call; it is reported in
    /// [`RenderResult::voiceover_error`] next to the silent artifact.
    pub async fn process(&self, submission: &ScriptSubmission) -> Result<RenderResult> {
        let source = submission.source().ok_or(SceneError::InputEmpty)?;
        let engine = RepairEngine::new(self.config.repair_options(submission.narrated_scene));
        let sanitized = sanitize(source, &engine)?;

        self.workspaces.sweep_async().await;
        let workspace = self.workspaces.create_async().await?;
        let span = obs::execution_span(&workspace.id);

        async move {
            let script = workspace.path(&self.config.render.script_name);
            tokio::fs::write(&script, &sanitized.text).await?;

            let scene = detect_scene(&sanitized.text);
            let job = RenderJob {
                script: &script,
                scene: &scene.class_name,
                workspace: &workspace.root,
            };
            let outcome = self.orchestrator.render(&job).await?;

            let mut artifact = find_artifact(&workspace.root, &outcome.attempt).await?;
            if scene.narrated {
                artifact = artifact.with_narration();
            }

            let mut voiceover_error = None;
            if let Some(voice) = submission.voice_source() {
                let post = self.voiceover.postprocess(&artifact, &voice).await;
                artifact = post.artifact;
                voiceover_error = post.error.map(|e| SceneError::from(e).to_string());
            }

            Ok::<_, SceneError>(RenderResult {
                artifact,
                workspace,
                scene: scene.class_name,
                attempt: outcome.attempt,
                attempts_made: outcome.attempts_made,
                repair: sanitized.record,
                remediated: sanitized.remediated,
                voiceover_error,
            })
        }
        .instrument(span)
        .await
    }
}
