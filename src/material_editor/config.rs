use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    material_editor::io::{ProjectIoError, read_json_file_blocking},
    resource::{EngineRoot, ResourcePath},
};

/// Editor settings, read from a JSON file. Every field has a default so a
/// partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub engine_root: PathBuf,
    /// Model the selected material is previewed on.
    pub preview_model: ResourcePath,
    /// Texture bound to a freshly added slot.
    pub placeholder_texture: ResourcePath,
    pub material_extension: String,
    pub unload_delay_ms: u64,
    pub log_filter: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            engine_root: PathBuf::from("."),
            preview_model: ResourcePath::new("models/editor/material_sphere.msh"),
            placeholder_texture: ResourcePath::new("textures/default.dds"),
            material_extension: "mat".to_string(),
            unload_delay_ms: 2000,
            log_filter: "info".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectIoError> {
        read_json_file_blocking(path)
    }

    pub fn root(&self) -> EngineRoot {
        EngineRoot::new(self.engine_root.clone())
    }

    pub fn unload_delay(&self) -> Duration {
        Duration::from_millis(self.unload_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        std::fs::write(&path, r#"{ "engine_root": "/data/game", "unload_delay_ms": 10 }"#).unwrap();

        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config.engine_root, PathBuf::from("/data/game"));
        assert_eq!(config.unload_delay(), Duration::from_millis(10));
        assert_eq!(config.placeholder_texture.as_str(), "textures/default.dds");
        assert_eq!(config.material_extension, "mat");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("editor.json");
        std::fs::write(&path, "engine_root = 1").unwrap();
        assert!(matches!(
            EditorConfig::load(&path),
            Err(ProjectIoError::Corrupt { .. })
        ));
    }
}
