//! Code generation and standalone game export.

pub mod archive;
pub mod emit;
pub mod format;
pub mod templates;

pub use archive::PackReport;
pub use emit::{Instruction, Target};
pub use format::{js_number, Formatter};

use crate::assets::AssetError;
use crate::scene::SceneRegistry;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

pub const DEFAULT_ARCHIVE_NAME: &str = "3d-game-export.zip";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("export cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Program text for the editor's code view.
pub fn generate_preview_code(registry: &SceneRegistry) -> String {
    Formatter::new(Target::Preview).render(&emit::build(registry, Target::Preview))
}

/// Complete `game.html` document.
pub fn generate_game_html(registry: &SceneRegistry) -> String {
    let instructions = emit::build(registry, Target::Standalone);
    let script = Formatter::new(Target::Standalone).render(&instructions);
    let capacity = templates::HTML_HEAD.len() + script.len() + templates::HTML_TAIL.len();
    let mut html = String::with_capacity(capacity);
    html.push_str(templates::HTML_HEAD);
    html.push_str(&script);
    html.push_str(templates::HTML_TAIL);
    html
}

/// Owned copy of everything an export needs, safe to move to a worker.
#[derive(Debug, Clone)]
pub struct ExportSnapshot {
    pub registry: SceneRegistry,
    pub output_dir: PathBuf,
    pub archive_name: String,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub pack: PackReport,
}

impl ExportReport {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl ExportSnapshot {
    pub fn capture(registry: &SceneRegistry, output_dir: &Path, archive_name: &str) -> Self {
        Self {
            registry: registry.clone(),
            output_dir: output_dir.to_path_buf(),
            archive_name: archive_name.to_string(),
        }
    }

    /// Builds the archive in `output_dir`. A partial file is removed on failure.
    pub fn run(&self, cancel: &AtomicBool) -> Result<ExportReport> {
        log::info!(
            "Exporting {} objects to {}",
            self.registry.len(),
            self.output_dir.display()
        );
        let html = generate_game_html(&self.registry);
        let (entries, pack) = archive::collect_assets(&self.registry, cancel)?;

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(&self.archive_name);
        let written = File::create(&path)
            .map_err(ExportError::from)
            .and_then(|file| archive::write_archive(BufWriter::new(file), &html, &entries, cancel));
        if let Err(err) = written {
            let _ = std::fs::remove_file(&path);
            return Err(err);
        }

        let size_bytes = std::fs::metadata(&path)?.len();
        log::info!(
            "Export finished: {} models, {} textures ({} placeholders), {} bytes",
            pack.models,
            pack.textures,
            pack.placeholders,
            size_bytes
        );
        Ok(ExportReport {
            path,
            size_bytes,
            pack,
        })
    }
}
