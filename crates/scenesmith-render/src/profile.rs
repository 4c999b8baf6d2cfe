//! Render profiles: one set of engine flags per fallback step.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::RenderConfig;

/// Output container requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mp4,
    Gif,
    Png,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Gif => "gif",
            OutputFormat::Png => "png",
        }
    }
}

/// Engine quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    pub fn flag(&self) -> &'static str {
        match self {
            Quality::Low => "-ql",
            Quality::Medium => "-qm",
            Quality::High => "-qh",
        }
    }
}

/// One configuration of the render engine.
///
/// `None` fields are left to the engine's own defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderProfile {
    pub name: String,
    pub quality: Quality,
    pub format: Option<OutputFormat>,
    pub renderer: Option<String>,
    pub frame_rate: Option<u32>,
    pub resolution: Option<(u32, u32)>,

    /// Only tried on the constrained platform.
    #[serde(default)]
    pub constrained_only: bool,
}

impl RenderProfile {
    /// The fallback chain, in order:
    ///
    /// 1. `primary`: preferred renderer, format and resolution;
    /// 2. `degraded-format`: animated image, engine-chosen renderer;
    /// 3. `frame-images`: still frames at a low rate, constrained platform only;
    /// 4. `minimal`: low quality and engine defaults for everything else.
    pub fn standard_chain(config: &RenderConfig) -> Vec<RenderProfile> {
        let resolution = Some(config.resolution);
        vec![
            RenderProfile {
                name: "primary".to_string(),
                quality: Quality::Medium,
                format: Some(OutputFormat::Mp4),
                renderer: Some("cairo".to_string()),
                frame_rate: Some(config.frame_rate),
                resolution,
                constrained_only: false,
            },
            RenderProfile {
                name: "degraded-format".to_string(),
                quality: Quality::Medium,
                format: Some(OutputFormat::Gif),
                renderer: None,
                frame_rate: Some(config.frame_rate),
                resolution,
                constrained_only: false,
            },
            RenderProfile {
                name: "frame-images".to_string(),
                quality: Quality::Medium,
                format: Some(OutputFormat::Png),
                renderer: None,
                frame_rate: Some(24),
                resolution: None,
                constrained_only: true,
            },
            RenderProfile {
                name: "minimal".to_string(),
                quality: Quality::Low,
                format: None,
                renderer: None,
                frame_rate: None,
                resolution: None,
                constrained_only: false,
            },
        ]
    }

    /// The standard chain with platform-specific steps filtered out.
    pub fn effective_chain(config: &RenderConfig) -> Vec<RenderProfile> {
        Self::standard_chain(config)
            .into_iter()
            .filter(|p| config.constrained || !p.constrained_only)
            .collect()
    }

    /// Engine arguments for rendering `scene` from `script` into `media_dir`.
    pub fn args(&self, script: &Path, scene: &str, media_dir: &Path) -> Vec<String> {
        let mut args = vec![
            script.display().to_string(),
            scene.to_string(),
            self.quality.flag().to_string(),
            "--media_dir".to_string(),
            media_dir.display().to_string(),
            "--disable_caching".to_string(),
            "--progress_bar".to_string(),
            "none".to_string(),
            "--flush_cache".to_string(),
        ];
        if let Some(format) = self.format {
            args.push("--format".to_string());
            args.push(format.as_str().to_string());
        }
        if let Some(renderer) = &self.renderer {
            args.push("--renderer".to_string());
            args.push(renderer.clone());
        }
        if let Some(fps) = self.frame_rate {
            args.push("--frame_rate".to_string());
            args.push(fps.to_string());
        }
        if let Some((w, h)) = self.resolution {
            args.push("--resolution".to_string());
            args.push(format!("{w},{h}"));
        }
        args.push("-v".to_string());
        args.push("ERROR".to_string());
        args
    }
}
