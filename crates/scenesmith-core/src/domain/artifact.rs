use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of media a render produced, ordered by preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    AnimatedImage,
    FrameSequence,
}

impl MediaKind {
    /// Classify a path by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp4" | "mov" | "webm" => Some(MediaKind::Video),
            "gif" => Some(MediaKind::AnimatedImage),
            "png" => Some(MediaKind::FrameSequence),
            _ => None,
        }
    }
}

/// A media file produced by a successful render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: MediaKind,

    /// The media already carries narration audio.
    #[serde(default)]
    pub narrated: bool,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
            narrated: false,
        }
    }

    /// Build from a path, inferring the kind from its extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = MediaKind::from_path(&path)?;
        Some(Self::new(path, kind))
    }

    pub fn with_narration(mut self) -> Self {
        self.narrated = true;
        self
    }
}
