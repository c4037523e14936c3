//! Packaging of `game.html` and its assets into a zip archive.

use crate::assets::{self, preview::placeholder_texture};
use crate::export::{ExportError, Result};
use crate::scene::{Entity, EntityRole, SceneRegistry, TextureSlot, TextureSlotKind};
use std::collections::HashSet;
use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const HTML_ENTRY: &str = "game.html";
pub const MODELS_DIR: &str = "models/";
pub const TEXTURES_DIR: &str = "textures/";
const DEFLATE_LEVEL: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOrigin {
    Original,
    DataUrl,
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Arc<[u8]>,
    pub origin: AssetOrigin,
}

/// What ended up in the archive.
#[derive(Debug, Clone, Default)]
pub struct PackReport {
    pub models: usize,
    pub textures: usize,
    pub placeholders: usize,
    /// Archive paths that could not be produced.
    pub skipped: Vec<String>,
}

/// Base name of a stored file name, so archive entries stay inside their folder.
pub fn asset_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => "asset".to_string(),
        _ => base.to_string(),
    }
}

fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(ExportError::Cancelled);
    }
    Ok(())
}

/// Original bytes first, then the stored data URL.
fn slot_bytes(slot: &TextureSlot) -> Option<(Arc<[u8]>, AssetOrigin)> {
    if let Some(original) = &slot.original {
        return Some((original.clone(), AssetOrigin::Original));
    }
    let url = slot.data_url.as_deref()?;
    match assets::decode_data_url(url) {
        Ok(bytes) => Some((bytes.into(), AssetOrigin::DataUrl)),
        Err(err) => {
            log::warn!("Could not recover '{}' from its data URL: {}", slot.file_name, err);
            None
        }
    }
}

fn texture_entry(
    entity: &Entity,
    kind: TextureSlotKind,
    report: &mut PackReport,
) -> Option<ArchiveEntry> {
    let material = entity.material()?;
    let slot = material.slot(kind)?;
    let path = format!("{TEXTURES_DIR}{}", asset_file_name(&slot.file_name));

    if let Some((bytes, origin)) = slot_bytes(slot) {
        return Some(ArchiveEntry { path, bytes, origin });
    }
    match kind {
        TextureSlotKind::Diffuse => {
            log::warn!(
                "No source for texture '{}' on '{}', writing placeholder",
                slot.file_name,
                entity.name
            );
            match assets::encode_png(&placeholder_texture(material.color)) {
                Ok(png) => Some(ArchiveEntry {
                    path,
                    bytes: png.into(),
                    origin: AssetOrigin::Placeholder,
                }),
                Err(err) => {
                    log::warn!("Placeholder for '{}' failed: {}", slot.file_name, err);
                    report.skipped.push(path);
                    None
                }
            }
        }
        TextureSlotKind::Normal => {
            log::warn!(
                "No source for normal map '{}' on '{}', skipping",
                slot.file_name,
                entity.name
            );
            report.skipped.push(path);
            None
        }
    }
}

/// Resolves every model and texture file referenced by the registry.
/// Paths are unique; the first entity referencing a path wins.
pub fn collect_assets(
    registry: &SceneRegistry,
    cancel: &AtomicBool,
) -> Result<(Vec<ArchiveEntry>, PackReport)> {
    let mut report = PackReport::default();
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for entity in registry.objects() {
        check_cancelled(cancel)?;
        let mut candidates = Vec::new();
        match &entity.role {
            EntityRole::Model(model) => candidates.push(ArchiveEntry {
                path: format!("{MODELS_DIR}{}", asset_file_name(&model.file_name)),
                bytes: model.bytes.clone(),
                origin: AssetOrigin::Original,
            }),
            EntityRole::Mesh(_) => {
                for kind in [TextureSlotKind::Diffuse, TextureSlotKind::Normal] {
                    if let Some(entry) = texture_entry(entity, kind, &mut report) {
                        candidates.push(entry);
                    }
                }
            }
            EntityRole::Light(_) => {}
        }

        for entry in candidates {
            if !seen.insert(entry.path.clone()) {
                log::debug!("Skipping duplicate archive path {}", entry.path);
                continue;
            }
            if entry.path.starts_with(MODELS_DIR) {
                report.models += 1;
            } else {
                report.textures += 1;
            }
            if entry.origin == AssetOrigin::Placeholder {
                report.placeholders += 1;
            }
            let size = entry.bytes.len();
            log::debug!("Packing {} ({} bytes, {:?})", entry.path, size, entry.origin);
            entries.push(entry);
        }
    }
    Ok((entries, report))
}

/// Writes `game.html`, the two asset folders and every entry.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    html: &str,
    entries: &[ArchiveEntry],
    cancel: &AtomicBool,
) -> Result<W> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(DEFLATE_LEVEL));
    let mut zip = ZipWriter::new(writer);

    zip.start_file(HTML_ENTRY, options)?;
    zip.write_all(html.as_bytes())?;
    zip.add_directory(MODELS_DIR, options)?;
    zip.add_directory(TEXTURES_DIR, options)?;

    for entry in entries {
        check_cancelled(cancel)?;
        zip.start_file(entry.path.as_str(), options)?;
        zip.write_all(&entry.bytes)?;
    }
    Ok(zip.finish()?)
}
