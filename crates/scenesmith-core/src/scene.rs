//! Scene class detection.

use std::sync::LazyLock;

use regex::Regex;

use crate::repair::scan::Scan;

static SCENE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^class\s+([A-Za-z_]\w*)\s*\(([^)]*)\)\s*:").expect("valid scene class regex")
});

/// Fallback name handed to the render engine when no scene class is found.
pub const DEFAULT_SCENE: &str = "Scene";

/// The scene class a script defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneInfo {
    pub class_name: String,

    /// The scene derives from the narration-capable base.
    pub narrated: bool,
}

/// First top-level class whose bases name a `*Scene` type.
pub fn detect_scene(text: &str) -> SceneInfo {
    let scan = Scan::new(text);
    SCENE_CLASS_RE
        .captures_iter(text)
        .filter(|c| c.get(0).is_some_and(|m| scan.is_code(m.start())))
        .find_map(|c| {
            let bases = &c[2];
            let is_scene = bases
                .split(',')
                .map(str::trim)
                .any(|b| b.rsplit('.').next().is_some_and(|n| n.ends_with("Scene")));
            is_scene.then(|| SceneInfo {
                class_name: c[1].to_string(),
                narrated: bases.contains("VoiceoverScene"),
            })
        })
        .unwrap_or_else(|| SceneInfo {
            class_name: DEFAULT_SCENE.to_string(),
            narrated: false,
        })
}
