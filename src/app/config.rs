use crate::assets::KeyStrategy;
use crate::export::DEFAULT_ARCHIVE_NAME;
use crate::scene::Color;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Editor settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Seeds primitive colors and the default terrain seed.
    pub seed: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub key_strategy: KeyStrategy,
    pub highlight_tint: Color,
    pub export_dir: PathBuf,
    pub archive_name: String,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            viewport_width: 800,
            viewport_height: 600,
            key_strategy: KeyStrategy::default(),
            highlight_tint: Color(0x222222),
            export_dir: PathBuf::from("."),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn aspect(&self) -> f64 {
        self.viewport_width.max(1) as f64 / self.viewport_height.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(contents: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let name = format!("scene_forge_config_{}_{nanos}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let path = temp_config(r#"{ "seed": 7, "key_strategy": "content" }"#);
        let config = EditorConfig::load(&path).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.key_strategy, KeyStrategy::Content);
        assert_eq!(config.archive_name, "3d-game-export.zip");
        assert_eq!(config.highlight_tint, Color(0x222222));
        assert_eq!(config.viewport_width, 800);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bad_json_is_reported() {
        let path = temp_config("{ seed: ");
        assert!(matches!(EditorConfig::load(&path), Err(ConfigError::Json { .. })));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(EditorConfig::load(&path), Err(ConfigError::Io { .. })));
    }
}
