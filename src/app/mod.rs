//! The editor session: owns the scene, selection, caches, cameras and
//! background jobs, and exposes every user action.

pub mod animation;
pub mod config;
pub mod input;
pub mod jobs;
pub mod launcher;
pub mod mode;
pub mod timing;

pub use animation::{AnimationError, PositionAnimation};
pub use config::{ConfigError, EditorConfig};
pub use jobs::{JobKind, JobOutput, JobQueue};
pub use launcher::{GameRuntime, TemplateLauncher, TEMPLATE_NAMES};
pub use mode::{EditorMode, ModeController, ModeError};

use crate::assets::preview::Thumbnail;
use crate::assets::{self, AssetError, CacheKeyGenerator, TextureAsset, TextureCache};
use crate::export::{self, ExportError, ExportReport, ExportSnapshot};
use crate::render::{
    pick_nearest, ray_from_ndc, screen_to_ndc, HeadlessBackend, Highlightable, RenderBackend,
};
use crate::scene::serialization::{self, SerializationError};
use crate::scene::{
    parse_model, Color, Entity, EntityId, HeightmapSource, LightKind, PrimitiveKind, SceneError,
    SceneRegistry, TextureSlot, TextureSlotKind, Transform,
};
use crate::terrain::{self, TerrainError};
use crate::ui::{FieldPath, FieldValue, InspectorError, InspectorView};
use glam::DVec3;
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use timing::FrameTiming;
use winit::keyboard::PhysicalKey;

/// Where new primitives and imported models are placed.
pub const SPAWN_POSITION: DVec3 = DVec3::new(0.0, 1.0, 0.0);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Inspector(#[from] InspectorError),
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Animation(#[from] AnimationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0} must be a positive number")]
    InvalidScale(&'static str),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Rejected user input.
    Alert,
    Error,
    Success,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

pub struct EditorSession<B: RenderBackend + Highlightable = HeadlessBackend> {
    config: EditorConfig,
    registry: SceneRegistry,
    backend: B,
    selection: Option<EntityId>,
    highlighted: Option<EntityId>,
    inspector: InspectorView,
    textures: TextureCache,
    heightmap_images: HashMap<String, Arc<DynamicImage>>,
    keys: Box<dyn CacheKeyGenerator>,
    rng: StdRng,
    modes: ModeController,
    animation: Option<PositionAnimation>,
    timing: FrameTiming,
    jobs: JobQueue,
    notifications: Vec<Notification>,
    height_scale: f64,
    last_export: Option<ExportReport>,
}

impl EditorSession<HeadlessBackend> {
    pub fn headless(config: EditorConfig) -> Self {
        Self::with_backend(config, HeadlessBackend::new())
    }
}

impl<B: RenderBackend + Highlightable> EditorSession<B> {
    pub fn with_backend(config: EditorConfig, backend: B) -> Self {
        Self::from_registry(config, backend, SceneRegistry::new())
    }

    /// Starts a session over an existing scene, e.g. one loaded from disk.
    pub fn from_registry(config: EditorConfig, mut backend: B, registry: SceneRegistry) -> Self {
        for entity in registry.objects() {
            backend.add_node(entity);
        }
        let modes = ModeController::new();
        backend.set_camera(&modes.pose());
        log::info!(
            "Editor session started with {} objects (seed {})",
            registry.len(),
            config.seed
        );
        Self {
            keys: config.key_strategy.generator(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            registry,
            backend,
            selection: None,
            highlighted: None,
            inspector: InspectorView::default(),
            textures: TextureCache::new(),
            heightmap_images: HashMap::new(),
            modes,
            animation: None,
            timing: FrameTiming::new(),
            jobs: JobQueue::new(),
            notifications: Vec::new(),
            height_scale: 1.0,
            last_export: None,
        }
    }

    pub fn open(config: EditorConfig, backend: B, path: &Path) -> Result<Self> {
        let registry = serialization::load_scene_from_file(path)?;
        log::info!("Scene loaded from {}", path.display());
        Ok(Self::from_registry(config, backend, registry))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        serialization::save_scene_to_file(&self.registry, path)?;
        log::info!("Scene saved to {}", path.display());
        Ok(())
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn selection(&self) -> Option<EntityId> {
        self.selection
    }

    pub fn inspector(&self) -> &InspectorView {
        &self.inspector
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn mode(&self) -> EditorMode {
        self.modes.mode()
    }

    pub fn modes(&self) -> &ModeController {
        &self.modes
    }

    pub fn animation(&self) -> Option<&PositionAnimation> {
        self.animation.as_ref()
    }

    pub fn height_scale(&self) -> f64 {
        self.height_scale
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.pending()
    }

    pub fn last_export(&self) -> Option<&ExportReport> {
        self.last_export.as_ref()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            NotificationKind::Alert | NotificationKind::Error => {
                log::warn!("{:?}: {}", kind, message)
            }
            NotificationKind::Success | NotificationKind::Info => log::info!("{}", message),
        }
        self.notifications.push(Notification { kind, message });
    }

    /// Rejects user input: raises an alert and returns the error.
    fn reject<T>(&mut self, err: impl Into<SessionError>) -> Result<T> {
        let err = err.into();
        self.notify(NotificationKind::Alert, err.to_string());
        Err(err)
    }

    /// Reports a failed decode or parse.
    fn asset_failure<T>(&mut self, err: impl Into<SessionError>) -> Result<T> {
        let err = err.into();
        self.notify(NotificationKind::Error, err.to_string());
        Err(err)
    }

    // ---- objects ----

    /// Adds a primitive with a random color at `position` (default (0, 1, 0)) and selects it.
    pub fn add_primitive(&mut self, kind: PrimitiveKind, position: Option<DVec3>) -> EntityId {
        let color = Color(self.rng.gen_range(0..=0xffffff));
        let transform = Transform::at(position.unwrap_or(SPAWN_POSITION));
        let id = self.registry.add_primitive(kind, transform, color);
        self.attach(id);
        id
    }

    pub fn add_light(&mut self, kind: LightKind) -> EntityId {
        let id = self.registry.add_light(kind);
        self.attach(id);
        id
    }

    fn attach(&mut self, id: EntityId) {
        if let Some(entity) = self.registry.get(id) {
            log::info!("Added {} '{}'", id, entity.name);
            self.backend.add_node(entity);
        }
        self.set_selection(Some(id));
    }

    /// Parses a glTF/GLB payload and adds it at the spawn position.
    pub fn import_model(&mut self, bytes: Vec<u8>, file_name: &str) -> Result<EntityId> {
        let model = match parse_model(bytes.into(), file_name) {
            Ok(model) => model,
            Err(source) => {
                return self.asset_failure(SceneError::Import {
                    file_name: file_name.to_string(),
                    source,
                })
            }
        };
        log::info!(
            "Imported '{}': {} meshes, {} primitives",
            file_name,
            model.mesh_count,
            model.primitive_count
        );
        let id = self.registry.add_model(model, Transform::at(SPAWN_POSITION));
        self.attach(id);
        Ok(id)
    }

    /// Reads the model file on a worker; the import happens in a later `tick`.
    pub fn request_import_model(&mut self, path: PathBuf) {
        self.jobs.read_model(path);
    }

    /// Removes an entity. The ground and unknown ids are ignored.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let removed = self.registry.remove(id)?;
        self.backend.remove_node(id);
        if self.highlighted == Some(id) {
            self.highlighted = None;
        }
        if self.animation.as_ref().map(|anim| anim.entity) == Some(id) {
            self.animation = None;
        }
        if self.selection == Some(id) {
            self.selection = None;
        }
        log::info!("Removed {} '{}'", id, removed.name);
        self.refresh_inspector();
        Some(removed)
    }

    // ---- selection & inspector ----

    pub fn select(&mut self, id: Option<EntityId>) -> Result<()> {
        if let Some(id) = id {
            let entity = self.registry.get(id).ok_or(SceneError::UnknownEntity(id))?;
            if entity.is_ground() {
                return Err(SceneError::GroundLocked.into());
            }
        }
        self.set_selection(id);
        Ok(())
    }

    fn set_selection(&mut self, id: Option<EntityId>) {
        self.selection = id;
        let heightmap_scale = id
            .and_then(|id| self.registry.get(id))
            .and_then(|entity| entity.mesh())
            .and_then(|mesh| mesh.heightmap.as_ref())
            .map(|state| state.height_scale);
        self.height_scale = heightmap_scale.unwrap_or(1.0);
        self.sync_highlight(false);
        self.refresh_inspector();
    }

    /// Moves the emissive tint to the selected mesh. Edit mode only.
    fn sync_highlight(&mut self, force: bool) {
        if self.modes.mode() != EditorMode::Edit {
            return;
        }
        let wanted = self
            .selection
            .filter(|id| self.registry.get(*id).is_some_and(Entity::is_pickable));
        if wanted == self.highlighted && !force {
            return;
        }
        if let Some(previous) = self.highlighted.take() {
            self.backend.clear_highlight(previous);
        }
        if let Some(id) = wanted {
            self.backend.set_highlight(id, self.config.highlight_tint);
        }
        self.highlighted = wanted;
    }

    /// Cached texture for a slot, re-decoding the stored data URL on a miss.
    fn restore_texture(&mut self, slot: &TextureSlot) -> Option<Arc<TextureAsset>> {
        if let Some(hit) = self.textures.get(&slot.cache_key) {
            return Some(hit);
        }
        let bytes = match (&slot.original, &slot.data_url) {
            (Some(original), _) => original.to_vec(),
            (None, Some(url)) => match assets::decode_data_url(url) {
                Ok(bytes) => bytes,
                Err(err) => {
                    let _: Result<()> = self.asset_failure(err);
                    return None;
                }
            },
            (None, None) => {
                log::warn!("Texture '{}' has no stored source", slot.file_name);
                return None;
            }
        };
        match self.textures.get_or_decode(&slot.cache_key, &slot.file_name, &bytes) {
            Ok(asset) => Some(asset),
            Err(err) => {
                let _: Result<()> = self.asset_failure(err);
                None
            }
        }
    }

    /// Mirrors the selection into the inspector, rebinds its textures and
    /// redraws the thumbnail.
    pub fn refresh_inspector(&mut self) {
        let mut thumbnail = Thumbnail::empty();
        let slots: Vec<(TextureSlotKind, TextureSlot)> = self
            .selection
            .and_then(|id| self.registry.get(id))
            .and_then(Entity::material)
            .map(|material| {
                [TextureSlotKind::Diffuse, TextureSlotKind::Normal]
                    .into_iter()
                    .filter_map(|kind| material.slot(kind).map(|slot| (kind, slot.clone())))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(id) = self.selection {
            for (kind, slot) in slots {
                let texture = self.restore_texture(&slot);
                if kind == TextureSlotKind::Diffuse {
                    if let Some(texture) = &texture {
                        thumbnail = Thumbnail::of_texture(texture);
                    }
                }
                self.backend.bind_texture(id, kind, texture);
            }
        }

        self.inspector =
            InspectorView::build(&self.registry, self.selection, self.modes.mode(), thumbnail);
    }

    /// Writes one inspector field back to the selection. Returns `Ok(false)`
    /// when the field does not apply.
    pub fn apply_field_edit(&mut self, field: FieldPath, raw: &str) -> Result<bool> {
        let Some(id) = self.selection else {
            return Ok(false);
        };
        let has_material = self.registry.get(id).and_then(Entity::material).is_some();
        if field.needs_material() && !has_material {
            return Ok(false);
        }
        let value = match field.parse_value(raw) {
            Ok(value) => value,
            Err(err) => return self.reject(err),
        };

        match (field, value) {
            (FieldPath::TextureScale, FieldValue::Number(scale)) => {
                self.set_texture_scale(id, scale)?;
                return Ok(true);
            }
            (FieldPath::HeightScale, FieldValue::Number(scale)) => {
                if !self.registry.get(id).is_some_and(Entity::has_plane_geometry) {
                    return Ok(false);
                }
                self.set_height_scale(scale)?;
                return Ok(true);
            }
            _ => {}
        }

        let Some(entity) = self.registry.get_mut(id) else {
            return Ok(false);
        };
        match (field, value) {
            (FieldPath::Position(axis), FieldValue::Number(v)) => {
                entity.transform.position[axis.index()] = v
            }
            (FieldPath::Rotation(axis), FieldValue::Number(v)) => {
                entity.transform.rotation[axis.index()] = v
            }
            (FieldPath::Scale(axis), FieldValue::Number(v)) => {
                entity.transform.scale[axis.index()] = v
            }
            (FieldPath::MaterialColor, FieldValue::Color(color)) => {
                if let Some(material) = entity.material_mut() {
                    material.color = color;
                    material.needs_update = true;
                }
            }
            (FieldPath::MaterialRoughness, FieldValue::Number(v)) => {
                if let Some(material) = entity.material_mut() {
                    material.roughness = v.clamp(0.0, 1.0);
                    material.needs_update = true;
                }
            }
            (FieldPath::MaterialMetalness, FieldValue::Number(v)) => {
                if let Some(material) = entity.material_mut() {
                    material.metalness = v.clamp(0.0, 1.0);
                    material.needs_update = true;
                }
            }
            _ => return Ok(false),
        }

        if field.needs_material() {
            if let Some(material) = entity.material() {
                self.backend.update_material(id, material);
            }
        } else {
            self.backend.update_transform(id, &entity.transform);
        }
        log::debug!("Set {} on {} to {}", field, id, raw.trim());
        self.refresh_inspector();
        Ok(true)
    }

    // ---- terrain ----

    fn push_geometry(&mut self, id: EntityId) {
        if let Some(mesh) = self.registry.get(id).and_then(Entity::mesh) {
            self.backend.replace_geometry(id, &mesh.geometry);
        }
    }

    fn check_terrain_target(&mut self, id: EntityId) -> Result<()> {
        match terrain::ensure_plane(&self.registry, id) {
            Ok(()) => Ok(()),
            Err(err) => self.reject(err),
        }
    }

    /// Decodes `bytes` and displaces the plane by the image's brightness.
    pub fn apply_image_heightmap(
        &mut self,
        id: EntityId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.check_terrain_target(id)?;
        let image = match assets::decode_image(file_name, bytes) {
            Ok(image) => Arc::new(image),
            Err(err) => return self.asset_failure(err),
        };
        let key = self.keys.key("heightmap", file_name, bytes);
        terrain::apply_image_heightmap(&mut self.registry, id, &image, &key, self.height_scale)?;
        self.heightmap_images.insert(key, image);
        self.push_geometry(id);
        self.refresh_inspector();
        Ok(())
    }

    /// Seeded noise terrain. Without a seed one is drawn from the session RNG.
    pub fn generate_procedural_heightmap(&mut self, id: EntityId, seed: Option<u64>) -> Result<()> {
        self.check_terrain_target(id)?;
        let seed = seed.unwrap_or_else(|| self.rng.gen());
        terrain::generate_procedural_heightmap(&mut self.registry, id, seed, self.height_scale)?;
        self.push_geometry(id);
        self.refresh_inspector();
        Ok(())
    }

    pub fn reset_terrain(&mut self, id: EntityId) -> Result<()> {
        self.check_terrain_target(id)?;
        terrain::reset(&mut self.registry, id)?;
        self.height_scale = 1.0;
        self.push_geometry(id);
        self.refresh_inspector();
        Ok(())
    }

    /// Stores the slider value and regenerates the selected terrain from its source.
    pub fn set_height_scale(&mut self, scale: f64) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0) {
            return self.reject(SessionError::InvalidScale("height scale"));
        }
        self.height_scale = scale;

        let Some(id) = self.selection else {
            return Ok(());
        };
        let Some(state) = self
            .registry
            .get(id)
            .and_then(Entity::mesh)
            .and_then(|mesh| mesh.heightmap.clone())
        else {
            self.refresh_inspector();
            return Ok(());
        };

        match state.source {
            HeightmapSource::Procedural { seed } => {
                terrain::generate_procedural_heightmap(&mut self.registry, id, seed, scale)?;
            }
            HeightmapSource::Image { cache_key } => {
                let Some(image) = self.heightmap_images.get(&cache_key).cloned() else {
                    log::warn!("Heightmap source '{}' is no longer available", cache_key);
                    return Ok(());
                };
                terrain::apply_image_heightmap(&mut self.registry, id, &image, &cache_key, scale)?;
            }
        }
        self.push_geometry(id);
        self.refresh_inspector();
        Ok(())
    }

    // ---- textures ----

    fn load_texture(
        &mut self,
        id: EntityId,
        kind: TextureSlotKind,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let Some(entity) = self.registry.get(id) else {
            return Err(SceneError::UnknownEntity(id).into());
        };
        if entity.is_ground() || entity.material().is_none() {
            return self.reject(SceneError::NoMaterial(id));
        }
        let key = match kind {
            TextureSlotKind::Diffuse => file_name.to_string(),
            TextureSlotKind::Normal => self.keys.key("normal", file_name, &bytes),
        };
        let texture = match self.textures.get_or_decode(&key, file_name, &bytes) {
            Ok(texture) => texture,
            Err(err) => return self.asset_failure(err),
        };

        let data_url = assets::to_data_url(file_name, &bytes);
        let Some(material) = self.registry.get_mut(id).and_then(Entity::material_mut) else {
            return Err(SceneError::NoMaterial(id).into());
        };
        let scale = material.texture_scale.unwrap_or(1.0);
        *material.slot_mut(kind) = Some(TextureSlot {
            cache_key: key,
            file_name: file_name.to_string(),
            original: Some(bytes.into()),
            data_url: Some(data_url),
            repeat: [scale, scale],
        });
        material.needs_update = true;
        self.backend.update_material(id, material);
        self.backend.bind_texture(id, kind, Some(texture));
        log::info!("Loaded {:?} texture '{}' on {}", kind, file_name, id);
        self.refresh_inspector();
        Ok(())
    }

    pub fn load_diffuse_texture(
        &mut self,
        id: EntityId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.load_texture(id, TextureSlotKind::Diffuse, file_name, bytes)
    }

    pub fn load_normal_map(&mut self, id: EntityId, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        self.load_texture(id, TextureSlotKind::Normal, file_name, bytes)
    }

    /// Reads the image on a worker; it is applied in a later `tick`.
    pub fn request_texture_load(&mut self, id: EntityId, kind: TextureSlotKind, path: PathBuf) {
        self.jobs.read_texture(id, kind, path);
    }

    pub fn set_texture_scale(&mut self, id: EntityId, scale: f64) -> Result<()> {
        if !(scale.is_finite() && scale > 0.0) {
            return self.reject(SessionError::InvalidScale("texture scale"));
        }
        let Some(material) = self.registry.get_mut(id).and_then(Entity::material_mut) else {
            return Err(SceneError::NoMaterial(id).into());
        };
        material.texture_scale = Some(scale);
        if let Some(diffuse) = material.diffuse.as_mut() {
            diffuse.repeat = [scale, scale];
            material.needs_update = true;
        }
        self.backend.update_material(id, material);
        self.refresh_inspector();
        Ok(())
    }

    fn remove_texture(&mut self, id: EntityId, kind: TextureSlotKind) -> Result<()> {
        let Some(material) = self.registry.get_mut(id).and_then(Entity::material_mut) else {
            return Err(SceneError::NoMaterial(id).into());
        };
        if material.slot_mut(kind).take().is_some() {
            material.needs_update = true;
            self.backend.update_material(id, material);
            self.backend.bind_texture(id, kind, None);
        }
        self.refresh_inspector();
        Ok(())
    }

    pub fn remove_diffuse(&mut self, id: EntityId) -> Result<()> {
        self.remove_texture(id, TextureSlotKind::Diffuse)
    }

    pub fn remove_normal_map(&mut self, id: EntityId) -> Result<()> {
        self.remove_texture(id, TextureSlotKind::Normal)
    }

    // ---- modes & input ----

    /// Switches mode, resets that mode's camera and cancels any animation.
    pub fn set_mode(&mut self, mode: EditorMode) -> Result<()> {
        let no_objects = self.registry.listed().next().is_none();
        if let Err(err) = self.modes.set_mode(mode, no_objects) {
            return self.reject(err);
        }
        self.animation = None;
        match mode {
            EditorMode::Edit => self.sync_highlight(true),
            EditorMode::Preview => {
                if let Some(id) = self.highlighted.take() {
                    self.backend.clear_highlight(id);
                }
            }
        }
        self.backend.set_camera(&self.modes.pose());
        self.refresh_inspector();
        Ok(())
    }

    pub fn pointer_down(&mut self, x: f64, y: f64, shift: bool) {
        self.modes.pointer_down(x, y, shift);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.modes.pointer_move(x, y);
    }

    /// Ends a drag; a click in Edit mode picks the nearest mesh or clears the selection.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Option<EntityId> {
        let (x, y) = self.modes.pointer_up(x, y)?;
        let (ndc_x, ndc_y) = screen_to_ndc(
            x,
            y,
            self.config.viewport_width as f64,
            self.config.viewport_height as f64,
        );
        let ray = ray_from_ndc(&self.modes.pose(), ndc_x, ndc_y, self.config.aspect());
        let hit = pick_nearest(&self.registry, &ray).map(|hit| hit.entity);
        self.set_selection(hit);
        hit
    }

    pub fn wheel(&mut self, delta_y: f64) {
        self.modes.wheel(delta_y);
    }

    pub fn key_event(&mut self, key: PhysicalKey, pressed: bool) {
        self.modes.key(key, pressed);
    }

    /// Per-frame callback.
    pub fn tick(&mut self, now: Instant) {
        let dt = self.timing.update(now);
        self.modes.step(dt);
        self.step_animation(dt);
        for output in self.jobs.drain() {
            self.apply_job(output);
        }
        self.backend.set_camera(&self.modes.pose());
        self.backend.render();
    }

    // ---- animation ----

    fn animation_target(&mut self) -> Result<(EntityId, DVec3)> {
        let selected = self
            .selection
            .and_then(|id| self.registry.get(id))
            .map(|entity| (entity.id, entity.transform.position));
        match selected {
            Some(found) if self.modes.mode() == EditorMode::Preview => Ok(found),
            _ => self.reject(AnimationError::NotAvailable),
        }
    }

    /// Eases the selection to `target`. Preview mode only.
    pub fn animate_to_position(&mut self, target: DVec3, duration: Option<f64>) -> Result<()> {
        let (id, start) = self.animation_target()?;
        match PositionAnimation::new(id, start, target, duration) {
            Ok(animation) => {
                log::debug!("Animating {} to {:?}", id, target);
                self.animation = Some(animation);
                Ok(())
            }
            Err(err) => self.reject(err),
        }
    }

    pub fn animate_to_camera(&mut self, duration: Option<f64>) -> Result<()> {
        let camera = self.modes.pose().position;
        self.animate_to_position(camera, duration)
    }

    pub fn stop_animation(&mut self) {
        self.animation = None;
    }

    fn step_animation(&mut self, dt: f64) {
        let Some(animation) = self.animation.as_mut() else {
            return;
        };
        let id = animation.entity;
        let (position, finished) = animation.step(dt);
        if finished {
            self.animation = None;
        }
        if let Some(entity) = self.registry.get_mut(id) {
            entity.transform.position = position;
            self.backend.update_transform(id, &entity.transform);
        }
        if finished {
            self.refresh_inspector();
        }
    }

    // ---- export ----

    pub fn generate_preview_code(&self) -> String {
        export::generate_preview_code(&self.registry)
    }

    fn snapshot(&self) -> ExportSnapshot {
        ExportSnapshot::capture(&self.registry, &self.config.export_dir, &self.config.archive_name)
    }

    /// Builds the archive on the calling thread.
    pub fn export_standalone_game(&mut self) -> Result<ExportReport> {
        match self.snapshot().run(&AtomicBool::new(false)) {
            Ok(report) => {
                self.finish_export(Ok(report.clone()));
                Ok(report)
            }
            Err(err) => {
                self.finish_export(Err(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Builds the archive on a worker. Returns false if an export is already running.
    pub fn request_export(&mut self) -> bool {
        let snapshot = self.snapshot();
        self.jobs.export(snapshot).is_some()
    }

    pub fn cancel_export(&self) {
        self.jobs.cancel_export();
    }

    fn finish_export(&mut self, result: std::result::Result<ExportReport, String>) {
        match result {
            Ok(report) => {
                self.notify(
                    NotificationKind::Success,
                    format!(
                        "Game exported successfully! {} ({:.2} MB)",
                        report.path.display(),
                        report.size_mb()
                    ),
                );
                self.last_export = Some(report);
            }
            Err(message) => {
                self.notify(NotificationKind::Error, format!("Export failed: {message}"))
            }
        }
    }

    // ---- background jobs ----

    fn apply_job(&mut self, output: JobOutput) {
        match output {
            JobOutput::ModelRead { file_name, result } => match result {
                Ok(bytes) => {
                    // Failures are already reported by `import_model`.
                    let _ = self.import_model(bytes, &file_name);
                }
                Err(err) => {
                    let _: Result<()> = self.asset_failure(err);
                }
            },
            JobOutput::TextureRead {
                entity,
                slot,
                file_name,
                result,
            } => match result {
                Ok(bytes) => {
                    if let Err(err) = self.load_texture(entity, slot, &file_name, bytes) {
                        log::warn!("Texture '{}' not applied: {}", file_name, err);
                    }
                }
                Err(err) => {
                    let _: Result<()> = self.asset_failure(err);
                }
            },
            JobOutput::Export(result) => {
                self.finish_export(result.map_err(|err| err.to_string()));
            }
            JobOutput::Panicked(JobKind::Export) => {
                self.finish_export(Err("export worker stopped unexpectedly".to_string()));
            }
            JobOutput::Panicked(kind) => {
                let message = format!("Background {} failed unexpectedly", kind.name());
                self.notify(NotificationKind::Error, message);
            }
        }
    }

    /// Blocks until every background job has finished and applies the results.
    pub fn wait_for_jobs(&mut self) {
        for output in self.jobs.wait_all() {
            self.apply_job(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::png_bytes;
    use crate::render::camera::{EDIT_CAMERA_OFFSET, PREVIEW_EYE};
    use crate::scene::model::tests::triangle_gltf;
    use crate::ui::Axis;
    use std::time::Duration;
    use winit::keyboard::KeyCode;

    fn session() -> EditorSession {
        EditorSession::headless(EditorConfig::default())
    }

    fn field(path: &str) -> FieldPath {
        path.parse().unwrap()
    }

    fn alerts(session: &EditorSession) -> usize {
        session
            .notifications()
            .iter()
            .filter(|n| n.kind == NotificationKind::Alert)
            .count()
    }

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("scene_forge_{tag}_{}_{nanos}", std::process::id()))
    }

    #[test]
    fn test_cube_edit_survives_mode_round_trip() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, Some(DVec3::ZERO));
        assert_eq!(session.selection(), Some(cube));

        for (path, raw) in [("position.x", "3"), ("position.y", "1"), ("position.z", "-2")] {
            assert!(session.apply_field_edit(field(path), raw).unwrap());
        }
        session.set_mode(EditorMode::Preview).unwrap();
        session.set_mode(EditorMode::Edit).unwrap();

        let entity = session.registry().get(cube).unwrap();
        assert_eq!(entity.transform.position, DVec3::new(3.0, 1.0, -2.0));
        let node = session.backend().node(cube).unwrap();
        assert_eq!(node.transform.position, DVec3::new(3.0, 1.0, -2.0));

        let ground = session.registry().ground().unwrap().id;
        assert!(matches!(
            session.select(Some(ground)),
            Err(SessionError::Scene(SceneError::GroundLocked))
        ));
        assert_eq!(session.selection(), Some(cube));
        assert!(session.remove(ground).is_none());
        assert_eq!(session.registry().objects().iter().filter(|e| e.is_ground()).count(), 1);
    }

    #[test]
    fn test_heightmap_on_cube_is_rejected() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        let before = session.registry().get(cube).unwrap().clone();
        let released = session.backend().geometries_released();

        let err = session.generate_procedural_heightmap(cube, Some(1)).unwrap_err();
        assert!(matches!(err, SessionError::Terrain(TerrainError::NotAPlane(_))));
        assert_eq!(alerts(&session), 1);
        assert_eq!(session.registry().get(cube).unwrap(), &before);
        assert_eq!(session.backend().geometries_released(), released);

        let ground = session.registry().ground().unwrap().id;
        assert!(session.reset_terrain(ground).is_err());
        assert_eq!(alerts(&session), 2);
    }

    #[test]
    fn test_export_of_empty_scene() {
        let dir = temp_path("session_export");
        let mut session = EditorSession::headless(EditorConfig {
            export_dir: dir.clone(),
            ..EditorConfig::default()
        });
        let code = session.generate_preview_code();
        assert!(code.contains("// Ground"));
        assert!(code.contains("// Default lights"));
        assert!(code.contains("// Camera controls"));
        assert!(!code.contains("new THREE.Mesh(geometry"));

        let report = session.export_standalone_game().unwrap();
        assert!(report.path.ends_with("3d-game-export.zip"));
        let last = session.notifications().last().unwrap();
        assert_eq!(last.kind, NotificationKind::Success);
        assert!(last.message.starts_with("Game exported successfully!"));
        assert!(last.message.ends_with(" MB)"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_background_export_reports_on_tick() {
        let dir = temp_path("session_bg_export");
        let mut session = EditorSession::headless(EditorConfig {
            export_dir: dir.clone(),
            ..EditorConfig::default()
        });
        session.add_primitive(PrimitiveKind::Sphere, None);
        assert!(session.request_export());
        assert!(!session.request_export());
        session.wait_for_jobs();
        assert!(session.last_export().is_some());
        assert!(dir.join("3d-game-export.zip").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_selection_moves_highlight() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        assert_eq!(session.backend().highlighted(), vec![cube]);
        assert_eq!(session.backend().node(cube).unwrap().emissive, Color(0x222222));

        let sphere = session.add_primitive(PrimitiveKind::Sphere, None);
        assert_eq!(session.backend().highlighted(), vec![sphere]);

        let light = session.add_light(LightKind::Point);
        assert_eq!(session.selection(), Some(light));
        assert!(session.backend().highlighted().is_empty());

        session.select(Some(cube)).unwrap();
        session.remove(cube);
        assert_eq!(session.selection(), None);
        assert!(session.backend().highlighted().is_empty());
        assert!(session.inspector().objects.iter().all(|row| !row.active));
        assert!(matches!(
            session.select(Some(cube)),
            Err(SessionError::Scene(SceneError::UnknownEntity(_)))
        ));
    }

    #[test]
    fn test_inspector_rejects_malformed_input() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        let before = session.registry().get(cube).unwrap().transform;

        assert!(session.apply_field_edit(field("scale.y"), "tall").is_err());
        assert!(session.apply_field_edit(field("rotation.z"), "NaN").is_err());
        assert!(session.apply_field_edit(field("material.color"), "#12345").is_err());
        assert_eq!(alerts(&session), 3);
        assert_eq!(session.registry().get(cube).unwrap().transform, before);

        assert!(session.apply_field_edit(field("material.color"), "#00ff00").unwrap());
        assert_eq!(session.inspector().color.as_deref(), Some("#00ff00"));
        assert!(session.apply_field_edit(field("material.roughness"), "0.25").unwrap());
        assert_eq!(session.registry().get(cube).unwrap().material().unwrap().roughness, 0.25);

        session.add_light(LightKind::Ambient);
        assert!(!session.apply_field_edit(field("material.color"), "#ffffff").unwrap());
        assert!(session.apply_field_edit(FieldPath::Position(Axis::Y), "4").unwrap());

        session.select(None).unwrap();
        assert!(!session.apply_field_edit(field("position.x"), "1").unwrap());
    }

    #[test]
    fn test_texture_cache_decodes_once() {
        let mut session = session();
        let png = png_bytes(8, 8, [200, 10, 10, 255]);
        let a = session.add_primitive(PrimitiveKind::Cube, None);
        let b = session.add_primitive(PrimitiveKind::Cone, None);
        session.load_diffuse_texture(a, "brick.png", png.clone()).unwrap();
        session.load_diffuse_texture(b, "brick.png", png.clone()).unwrap();
        assert_eq!(session.textures().decode_count(), 1);
        assert_eq!(session.backend().node(b).unwrap().diffuse.as_deref(), Some("brick.png"));
        assert!(!session.inspector().thumbnail.is_placeholder());
        assert_eq!(session.inspector().texture_name.as_deref(), Some("brick.png"));

        session.remove_diffuse(b).unwrap();
        assert!(session.inspector().thumbnail.is_placeholder());
        assert!(session.textures().contains("brick.png"));
        session.load_diffuse_texture(b, "brick.png", png).unwrap();
        assert_eq!(session.textures().decode_count(), 1);
    }

    #[test]
    fn test_normal_maps_use_generated_keys() {
        let mut session = session();
        let png = png_bytes(2, 2, [128, 128, 255, 255]);
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        session.load_normal_map(cube, "n.png", png.clone()).unwrap();
        session.load_normal_map(cube, "n.png", png).unwrap();
        let material = session.registry().get(cube).unwrap().material().unwrap();
        let slot = material.normal_map.clone().unwrap();
        assert_eq!(slot.cache_key, "normal_1_n.png");
        assert_eq!(session.textures().decode_count(), 2);

        let err = session.load_diffuse_texture(cube, "bad.png", b"junk".to_vec()).unwrap_err();
        assert!(matches!(err, SessionError::Asset(AssetError::Decode { .. })));
        assert_eq!(session.notifications().last().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn test_texture_scale_updates_repeat() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        session.set_texture_scale(cube, 3.0).unwrap();
        session.load_diffuse_texture(cube, "t.png", png_bytes(2, 2, [0, 0, 0, 255])).unwrap();
        let material = session.registry().get(cube).unwrap().material().unwrap().clone();
        assert_eq!(material.diffuse.unwrap().repeat, [3.0, 3.0]);

        assert!(session.apply_field_edit(field("texture.scale"), "0.5").unwrap());
        let material = session.registry().get(cube).unwrap().material().unwrap().clone();
        assert_eq!(material.diffuse.unwrap().repeat, [0.5, 0.5]);
        assert!(session.set_texture_scale(cube, -1.0).is_err());
    }

    #[test]
    fn test_textures_restore_from_data_url() {
        let png = png_bytes(4, 4, [1, 2, 3, 255]);
        let mut registry = SceneRegistry::new();
        let cube = registry.add_primitive(PrimitiveKind::Cube, Transform::default(), Color::WHITE);
        registry.get_mut(cube).and_then(Entity::material_mut).unwrap().diffuse = Some(TextureSlot {
            cache_key: "saved.png".into(),
            file_name: "saved.png".into(),
            original: None,
            data_url: Some(assets::to_data_url("saved.png", &png)),
            repeat: [1.0, 1.0],
        });
        let mut session =
            EditorSession::from_registry(EditorConfig::default(), HeadlessBackend::new(), registry);
        assert!(session.textures().is_empty());
        session.select(Some(cube)).unwrap();
        assert!(session.textures().contains("saved.png"));
        assert_eq!(session.backend().node(cube).unwrap().diffuse.as_deref(), Some("saved.png"));
    }

    fn max_height(session: &EditorSession, id: EntityId) -> f32 {
        let mesh = session.registry().get(id).unwrap().mesh().unwrap();
        mesh.geometry.as_plane().unwrap().max_height()
    }

    #[test]
    fn test_height_scale_regenerates_terrain() {
        let mut session = session();
        let plane = session.add_primitive(PrimitiveKind::Plane, None);
        session.generate_procedural_heightmap(plane, Some(42)).unwrap();
        let low = max_height(&session, plane);
        assert!(session.inspector().terrain_info.starts_with("Generated terrain (procedural)"));

        assert!(session.apply_field_edit(field("heightmap.scale"), "2").unwrap());
        let mesh = session.registry().get(plane).unwrap().mesh().unwrap().clone();
        let high = mesh.geometry.as_plane().unwrap().max_height();
        assert!((high - low * 2.0).abs() < 1e-3, "{low} -> {high}");
        assert_eq!(mesh.heightmap.unwrap().height_scale, 2.0);
        let shown = session.inspector().display_value(FieldPath::HeightScale);
        assert_eq!(shown.as_deref(), Some("2.0"));

        let image = png_bytes(3, 3, [255, 255, 255, 255]);
        session.apply_image_heightmap(plane, "hm.png", &image).unwrap();
        session.set_height_scale(0.5).unwrap();
        assert!((max_height(&session, plane) - 2.5).abs() < 1e-4);

        session.reset_terrain(plane).unwrap();
        assert!(session.registry().get(plane).unwrap().mesh().unwrap().heightmap.is_none());
        assert!(session.set_height_scale(f64::NAN).is_err());
    }

    #[test]
    fn test_height_scale_follows_selected_plane() {
        let mut session = session();
        let first = session.add_primitive(PrimitiveKind::Plane, None);
        session.generate_procedural_heightmap(first, Some(7)).unwrap();
        session.set_height_scale(2.0).unwrap();

        let second = session.add_primitive(PrimitiveKind::Plane, None);
        assert_eq!(session.height_scale(), 1.0);
        let shown = session.inspector().display_value(FieldPath::HeightScale);
        assert_eq!(shown.as_deref(), Some("1.0"));
        session.generate_procedural_heightmap(second, Some(7)).unwrap();
        let used = session.registry().get(second).unwrap().mesh().unwrap().heightmap.clone();
        assert_eq!(used.unwrap().height_scale, 1.0);

        session.select(Some(first)).unwrap();
        assert_eq!(session.height_scale(), 2.0);
        session.reset_terrain(first).unwrap();
        assert_eq!(session.height_scale(), 1.0);
        session.generate_procedural_heightmap(first, Some(7)).unwrap();
        assert!((max_height(&session, first) - max_height(&session, second)).abs() < 1e-6);
    }

    #[test]
    fn test_preview_resets_camera_and_cancels_animation() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        assert!(matches!(
            session.animate_to_position(DVec3::new(5.0, 1.0, 0.0), None),
            Err(SessionError::Animation(AnimationError::NotAvailable))
        ));

        session.set_mode(EditorMode::Preview).unwrap();
        assert!(session.backend().highlighted().is_empty());
        assert!((session.backend().camera().unwrap().position - PREVIEW_EYE).length() < 1e-9);
        assert!(session.inspector().show_animation_panel);
        assert!(session.animate_to_position(DVec3::new(f64::NAN, 0.0, 0.0), None).is_err());
        session.animate_to_position(DVec3::new(5.0, 1.0, 0.0), Some(1.0)).unwrap();

        let start = Instant::now();
        session.tick(start);
        session.tick(start + Duration::from_millis(500));
        assert!(session.animation().is_some());
        session.tick(start + Duration::from_millis(1500));
        assert!(session.animation().is_none());
        let position = session.registry().get(cube).unwrap().transform.position;
        assert_eq!(position, DVec3::new(5.0, 1.0, 0.0));

        session.animate_to_camera(None).unwrap();
        session.set_mode(EditorMode::Edit).unwrap();
        assert!(session.animation().is_none());
        assert!(!session.inspector().show_animation_panel);
        let pose = session.backend().camera().unwrap();
        assert!((pose.position - EDIT_CAMERA_OFFSET).length() < 1e-9);
        assert_eq!(session.backend().highlighted(), vec![cube]);
    }

    #[test]
    fn test_removing_animated_entity_stops_animation() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, None);
        session.set_mode(EditorMode::Preview).unwrap();
        session.animate_to_camera(None).unwrap();
        session.remove(cube);
        assert!(session.animation().is_none());
    }

    #[test]
    fn test_preview_keys_move_camera_on_tick() {
        let mut session = session();
        assert!(matches!(
            session.set_mode(EditorMode::Preview),
            Err(SessionError::Mode(ModeError::EmptyScene))
        ));
        session.add_primitive(PrimitiveKind::Cube, None);
        session.key_event(PhysicalKey::Code(KeyCode::KeyW), true);
        session.set_mode(EditorMode::Preview).unwrap();
        session.key_event(PhysicalKey::Code(KeyCode::KeyW), true);
        let start = Instant::now();
        session.tick(start);
        session.tick(start + Duration::from_millis(50));
        assert!(session.backend().camera().unwrap().position.z < PREVIEW_EYE.z);
        assert_eq!(session.backend().frames_rendered(), 2);
    }

    #[test]
    fn test_click_picks_or_clears() {
        let mut session = session();
        let cube = session.add_primitive(PrimitiveKind::Cube, Some(DVec3::ZERO));
        session.select(None).unwrap();

        session.pointer_down(400.0, 300.0, false);
        assert_eq!(session.pointer_up(400.0, 300.0), Some(cube));
        assert_eq!(session.selection(), Some(cube));

        session.pointer_down(2.0, 2.0, false);
        assert_eq!(session.pointer_up(2.0, 2.0), None);
        assert_eq!(session.selection(), None);
    }

    #[test]
    fn test_async_model_import_lands_on_tick() {
        let path = temp_path("model").with_extension("gltf");
        std::fs::write(&path, triangle_gltf()).unwrap();
        let mut session = session();
        session.request_import_model(path.clone());
        session.wait_for_jobs();
        let model = session.registry().objects().last().unwrap();
        assert_eq!(model.name, "Model_1");
        assert_eq!(model.transform.position, SPAWN_POSITION);
        assert!(model.model().unwrap().cast_shadow);
        assert_eq!(session.selection(), Some(model.id));

        session.request_import_model(path.with_extension("missing"));
        session.wait_for_jobs();
        assert_eq!(session.notifications().last().unwrap().kind, NotificationKind::Error);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bad_model_adds_nothing() {
        let mut session = session();
        let err = session.import_model(b"not gltf".to_vec(), "broken.glb").unwrap_err();
        assert!(matches!(err, SessionError::Scene(SceneError::Import { .. })));
        assert_eq!(session.registry().len(), 1);
        assert_eq!(session.notifications().last().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn test_session_save_and_open() {
        let path = temp_path("session_scene").with_extension("json");
        let mut session = session();
        session.add_primitive(PrimitiveKind::Cylinder, Some(DVec3::new(1.0, 2.0, 3.0)));
        session.add_light(LightKind::Directional);
        session.save(&path).unwrap();

        let reopened =
            EditorSession::open(EditorConfig::default(), HeadlessBackend::new(), &path).unwrap();
        assert_eq!(reopened.registry().object_names(), vec!["cylinder_1", "DirectionalLight_2"]);
        assert_eq!(reopened.backend().node_count(), 3);
        let _ = std::fs::remove_file(&path);
    }
}
