pub mod geometry;
pub mod model;
pub mod serialization;

pub use geometry::{Geometry, PlaneGeometry};
pub use model::{parse_model, ImportedModel, ModelError};

use glam::{DMat4, DQuat, DVec3, EulerRot};
use std::fmt;
use std::sync::Arc;

/// Stable identity of an entity. Ids are handed out monotonically and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityKind {
    Cube,
    Sphere,
    Cone,
    Cylinder,
    Plane,
    ImportedModel,
    AmbientLight,
    DirectionalLight,
    PointLight,
    GroundMarker,
}

impl EntityKind {
    /// Prefix used for default display names.
    pub fn name_prefix(self) -> &'static str {
        match self {
            Self::Cube => "cube",
            Self::Sphere => "sphere",
            Self::Cone => "cone",
            Self::Cylinder => "cylinder",
            Self::Plane => "plane",
            Self::ImportedModel => "Model",
            Self::AmbientLight => "AmbientLight",
            Self::DirectionalLight => "DirectionalLight",
            Self::PointLight => "PointLight",
            Self::GroundMarker => "Ground",
        }
    }

    pub fn is_light(self) -> bool {
        matches!(
            self,
            Self::AmbientLight | Self::DirectionalLight | Self::PointLight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PrimitiveKind {
    Cube,
    Sphere,
    Cone,
    Cylinder,
    Plane,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 5] = [
        Self::Cube,
        Self::Sphere,
        Self::Cone,
        Self::Cylinder,
        Self::Plane,
    ];

    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Cube => EntityKind::Cube,
            Self::Sphere => EntityKind::Sphere,
            Self::Cone => EntityKind::Cone,
            Self::Cylinder => EntityKind::Cylinder,
            Self::Plane => EntityKind::Plane,
        }
    }

    pub fn geometry(self) -> Geometry {
        match self {
            Self::Cube => Geometry::cube(),
            Self::Sphere => Geometry::sphere(),
            Self::Cone => Geometry::cone(),
            Self::Cylinder => Geometry::cylinder(),
            Self::Plane => Geometry::plane(5.0, 5.0),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cube" | "box" => Some(Self::Cube),
            "sphere" => Some(Self::Sphere),
            "cone" => Some(Self::Cone),
            "cylinder" => Some(Self::Cylinder),
            "plane" => Some(Self::Plane),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
}

impl LightKind {
    pub fn entity_kind(self) -> EntityKind {
        match self {
            Self::Ambient => EntityKind::AmbientLight,
            Self::Directional => EntityKind::DirectionalLight,
            Self::Point => EntityKind::PointLight,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ambient" => Some(Self::Ambient),
            "directional" => Some(Self::Directional),
            "point" => Some(Self::Point),
            _ => None,
        }
    }

    fn defaults(self) -> (LightPayload, DVec3) {
        match self {
            Self::Ambient => (
                LightPayload {
                    color: Color::WHITE,
                    intensity: 0.5,
                    distance: None,
                    cast_shadow: false,
                },
                DVec3::ZERO,
            ),
            Self::Directional => (
                LightPayload {
                    color: Color::WHITE,
                    intensity: 0.8,
                    distance: None,
                    cast_shadow: true,
                },
                DVec3::new(5.0, 10.0, 3.0),
            ),
            Self::Point => (
                LightPayload {
                    color: Color::WHITE,
                    intensity: 1.0,
                    distance: Some(100.0),
                    cast_shadow: false,
                },
                DVec3::new(0.0, 5.0, 0.0),
            ),
        }
    }
}

/// 24-bit RGB color, stored the way three.js prints it (`0xrrggbb`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xffffff);
    pub const BLACK: Color = Color(0x000000);

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub fn rgb8(self) -> [u8; 3] {
        [
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        ]
    }

    pub fn to_linear_f32(self) -> [f32; 3] {
        let [r, g, b] = self.rgb8();
        [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
    }

    /// Lowercase six digit hex without prefix, like `Color#getHexString`.
    pub fn hex(self) -> String {
        format!("{:06x}", self.0 & 0xffffff)
    }

    /// Accepts `#rrggbb`, `rrggbb` or `0xrrggbb`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub position: DVec3,
    /// Euler angles in radians, XYZ order.
    pub rotation: DVec3,
    pub scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DVec3::ZERO,
            scale: DVec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: DVec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn quat(&self) -> DQuat {
        DQuat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    pub fn matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }
}

/// Reference from a material slot to a cached texture, plus what the exporter
/// needs to reproduce the file.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextureSlot {
    pub cache_key: String,
    pub file_name: String,
    /// Bytes of the uploaded file; session only.
    #[serde(skip)]
    pub original: Option<Arc<[u8]>>,
    pub data_url: Option<String>,
    pub repeat: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TextureSlotKind {
    Diffuse,
    Normal,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Material {
    pub color: Color,
    pub roughness: f64,
    pub metalness: f64,
    pub diffuse: Option<TextureSlot>,
    pub normal_map: Option<TextureSlot>,
    pub texture_scale: Option<f64>,
    pub double_sided: bool,
    #[serde(skip)]
    pub needs_update: bool,
}

impl Material {
    pub fn standard(color: Color) -> Self {
        Self {
            color,
            roughness: 0.7,
            metalness: 0.2,
            diffuse: None,
            normal_map: None,
            texture_scale: None,
            double_sided: false,
            needs_update: false,
        }
    }

    /// three.js `MeshStandardMaterial` defaults, used for planes.
    pub fn double_sided(color: Color) -> Self {
        Self {
            roughness: 1.0,
            metalness: 0.0,
            double_sided: true,
            ..Self::standard(color)
        }
    }

    pub fn slot(&self, kind: TextureSlotKind) -> Option<&TextureSlot> {
        match kind {
            TextureSlotKind::Diffuse => self.diffuse.as_ref(),
            TextureSlotKind::Normal => self.normal_map.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, kind: TextureSlotKind) -> &mut Option<TextureSlot> {
        match kind {
            TextureSlotKind::Diffuse => &mut self.diffuse,
            TextureSlotKind::Normal => &mut self.normal_map,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum HeightmapSource {
    Image { cache_key: String },
    Procedural { seed: u64 },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HeightmapState {
    pub source: HeightmapSource,
    pub height_scale: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshData {
    pub geometry: Geometry,
    pub material: Material,
    pub heightmap: Option<HeightmapState>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LightPayload {
    pub color: Color,
    pub intensity: f64,
    pub distance: Option<f64>,
    pub cast_shadow: bool,
}

/// What an entity is. Exactly one role per entity.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EntityRole {
    Mesh(MeshData),
    Light(LightPayload),
    Model(ImportedModel),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub transform: Transform,
    pub role: EntityRole,
}

impl Entity {
    pub fn is_ground(&self) -> bool {
        self.kind == EntityKind::GroundMarker
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.role {
            EntityRole::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshData> {
        match &mut self.role {
            EntityRole::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&Material> {
        self.mesh().map(|mesh| &mesh.material)
    }

    pub fn material_mut(&mut self) -> Option<&mut Material> {
        self.mesh_mut().map(|mesh| &mut mesh.material)
    }

    pub fn light(&self) -> Option<&LightPayload> {
        match &self.role {
            EntityRole::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&ImportedModel> {
        match &self.role {
            EntityRole::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn has_plane_geometry(&self) -> bool {
        self.mesh()
            .map(|mesh| mesh.geometry.is_plane())
            .unwrap_or(false)
    }

    /// Meshes the click picker is allowed to hit.
    pub fn is_pickable(&self) -> bool {
        !self.is_ground() && self.mesh().is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    #[error("the ground marker cannot be selected or removed")]
    GroundLocked,
    #[error("entity {0} has no material")]
    NoMaterial(EntityId),
    #[error("failed to import model '{file_name}': {source}")]
    Import {
        file_name: String,
        #[source]
        source: ModelError,
    },
}

/// Ordered collection of every entity, including the ground marker.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SceneRegistry {
    objects: Vec<Entity>,
    next_id: u64,
    next_name_index: u64,
}

impl Default for SceneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneRegistry {
    /// Creates a registry holding only the ground marker.
    pub fn new() -> Self {
        let mut registry = Self {
            objects: Vec::new(),
            next_id: 0,
            next_name_index: 0,
        };
        let ground = Entity {
            id: registry.allocate_id(),
            name: "Ground".to_string(),
            kind: EntityKind::GroundMarker,
            transform: Transform {
                position: DVec3::new(0.0, -2.0, 0.0),
                rotation: DVec3::new(-std::f64::consts::FRAC_PI_2, 0.0, 0.0),
                scale: DVec3::ONE,
            },
            role: EntityRole::Mesh(MeshData {
                geometry: Geometry::plane(100.0, 100.0),
                material: Material::double_sided(Color(0x666666)),
                heightmap: None,
                cast_shadow: false,
                receive_shadow: true,
            }),
        };
        registry.objects.push(ground);
        registry.next_name_index = 1;
        registry
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    fn next_name(&mut self, kind: EntityKind) -> String {
        let name = format!("{}_{}", kind.name_prefix(), self.next_name_index);
        self.next_name_index += 1;
        name
    }

    pub fn objects(&self) -> &[Entity] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.objects.iter().find(|entity| entity.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.objects.iter_mut().find(|entity| entity.id == id)
    }

    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.objects.iter().position(|entity| entity.id == id)
    }

    pub fn ground(&self) -> Option<&Entity> {
        self.objects.iter().find(|entity| entity.is_ground())
    }

    /// Entities shown in the object list: everything except the ground.
    pub fn listed(&self) -> impl Iterator<Item = &Entity> {
        self.objects.iter().filter(|entity| !entity.is_ground())
    }

    pub fn object_names(&self) -> Vec<&str> {
        self.listed().map(|entity| entity.name.as_str()).collect()
    }

    pub fn add_primitive(
        &mut self,
        kind: PrimitiveKind,
        transform: Transform,
        color: Color,
    ) -> EntityId {
        let material = match kind {
            PrimitiveKind::Plane => Material::double_sided(color),
            _ => Material::standard(color),
        };
        let id = self.allocate_id();
        let entity_kind = kind.entity_kind();
        let name = self.next_name(entity_kind);
        self.objects.push(Entity {
            id,
            name,
            kind: entity_kind,
            transform,
            role: EntityRole::Mesh(MeshData {
                geometry: kind.geometry(),
                material,
                heightmap: None,
                cast_shadow: true,
                receive_shadow: true,
            }),
        });
        id
    }

    pub fn add_light(&mut self, kind: LightKind) -> EntityId {
        let (payload, position) = kind.defaults();
        let id = self.allocate_id();
        let entity_kind = kind.entity_kind();
        let name = self.next_name(entity_kind);
        self.objects.push(Entity {
            id,
            name,
            kind: entity_kind,
            transform: Transform::at(position),
            role: EntityRole::Light(payload),
        });
        id
    }

    pub fn add_model(&mut self, model: ImportedModel, transform: Transform) -> EntityId {
        let id = self.allocate_id();
        let name = self.next_name(EntityKind::ImportedModel);
        self.objects.push(Entity {
            id,
            name,
            kind: EntityKind::ImportedModel,
            transform,
            role: EntityRole::Model(model),
        });
        id
    }

    /// Removes an entity. Unknown ids and the ground marker are left alone.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.index_of(id)?;
        if self.objects[index].is_ground() {
            return None;
        }
        Some(self.objects.remove(index))
    }

    /// Regenerates plane vertex buffers skipped by serialization.
    pub fn rebuild_skipped_buffers(&mut self) -> Vec<EntityId> {
        let mut rebuilt = Vec::new();
        for entity in &mut self.objects {
            let id = entity.id;
            if let Some(mesh) = entity.mesh_mut() {
                if let Geometry::Plane(plane) = &mut mesh.geometry {
                    if plane.needs_rebuild() {
                        plane.rebuild_flat();
                        rebuilt.push(id);
                    }
                }
            }
        }
        rebuilt
    }

    /// Checks a registry read from disk: exactly one ground marker and unique
    /// ids. Counters behind the stored ids and names are moved forward.
    pub fn validate(&mut self) -> Result<(), String> {
        let grounds = self.objects.iter().filter(|entity| entity.is_ground()).count();
        if grounds != 1 {
            return Err(format!("expected one ground marker, found {grounds}"));
        }
        let mut seen = std::collections::HashSet::new();
        for entity in &self.objects {
            if !seen.insert(entity.id) {
                return Err(format!("duplicate entity id {}", entity.id));
            }
        }

        let max_id = self.objects.iter().map(|entity| entity.id.0).max().unwrap_or(0);
        if self.next_id <= max_id {
            log::warn!("Scene id counter {} behind entity {}, advancing", self.next_id, max_id);
            self.next_id = max_id + 1;
        }
        let max_name = self
            .objects
            .iter()
            .filter_map(|entity| entity.name.rsplit_once('_'))
            .filter_map(|(_, n)| n.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.next_name_index = self.next_name_index.max(max_name + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_holds_only_the_ground() {
        let registry = SceneRegistry::new();
        assert_eq!(registry.len(), 1);
        let ground = registry.ground().unwrap();
        assert!(ground.is_ground());
        assert!(registry.object_names().is_empty());
    }

    #[test]
    fn test_primitives_get_defaults_and_unique_names() {
        let mut registry = SceneRegistry::new();
        let cube = registry.add_primitive(
            PrimitiveKind::Cube,
            Transform::at(DVec3::new(0.0, 1.0, 0.0)),
            Color(0x123456),
        );
        let sphere = registry.add_primitive(
            PrimitiveKind::Sphere,
            Transform::default(),
            Color::WHITE,
        );
        assert_eq!(registry.get(cube).unwrap().name, "cube_1");
        assert_eq!(registry.get(sphere).unwrap().name, "sphere_2");

        registry.remove(cube);
        let second = registry.add_primitive(
            PrimitiveKind::Sphere,
            Transform::default(),
            Color::WHITE,
        );
        assert_eq!(registry.get(second).unwrap().name, "sphere_3");

        let material = registry.get(sphere).unwrap().material().unwrap();
        assert_eq!(material.roughness, 0.7);
        assert_eq!(material.metalness, 0.2);
    }

    #[test]
    fn test_planes_use_double_sided_defaults() {
        let mut registry = SceneRegistry::new();
        let plane =
            registry.add_primitive(PrimitiveKind::Plane, Transform::default(), Color::WHITE);
        let entity = registry.get(plane).unwrap();
        assert!(entity.has_plane_geometry());
        let material = entity.material().unwrap();
        assert!(material.double_sided);
        assert_eq!(material.metalness, 0.0);
    }

    #[test]
    fn test_light_defaults_follow_kind() {
        let mut registry = SceneRegistry::new();
        let ambient = registry.add_light(LightKind::Ambient);
        let directional = registry.add_light(LightKind::Directional);
        let point = registry.add_light(LightKind::Point);

        let directional = registry.get(directional).unwrap();
        assert!(directional.light().unwrap().cast_shadow);
        assert_eq!(directional.transform.position, DVec3::new(5.0, 10.0, 3.0));
        assert_eq!(registry.get(point).unwrap().light().unwrap().distance, Some(100.0));
        assert_eq!(registry.get(ambient).unwrap().name, "AmbientLight_1");
        assert!(registry.get(ambient).unwrap().material().is_none());
    }

    #[test]
    fn test_ground_cannot_be_removed() {
        let mut registry = SceneRegistry::new();
        let ground_id = registry.ground().unwrap().id;
        assert!(registry.remove(ground_id).is_none());
        assert!(registry.remove(EntityId(999)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_color_parsing_accepts_common_forms() {
        assert_eq!(Color::parse("#ff8000"), Some(Color(0xff8000)));
        assert_eq!(Color::parse("0x00FF00"), Some(Color(0x00ff00)));
        assert_eq!(Color::parse("abcdef"), Some(Color(0xabcdef)));
        assert_eq!(Color::parse("#fff"), None);
        assert_eq!(Color::parse("zzzzzz"), None);
        assert_eq!(Color(0x0a0b0c).hex(), "0a0b0c");
    }

    #[test]
    fn test_transform_matrix_applies_translation_last() {
        let transform = Transform {
            position: DVec3::new(3.0, 1.0, -2.0),
            rotation: DVec3::new(0.0, std::f64::consts::FRAC_PI_2, 0.0),
            scale: DVec3::new(2.0, 1.0, 1.0),
        };
        let p = transform.matrix().transform_point3(DVec3::X);
        // +X scaled by 2, rotated a quarter turn about Y onto -Z, then translated.
        assert!((p - DVec3::new(3.0, 1.0, -4.0)).length() < 1e-9);
    }
}
