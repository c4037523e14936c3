pub mod camera;
pub mod pick;

pub use camera::{CameraPose, FlyCamera, MoveIntent, OrbitCamera};
pub use pick::{pick_nearest, ray_from_ndc, screen_to_ndc, PickHit, Ray};

use crate::assets::TextureAsset;
use crate::scene::{
    Color, Entity, EntityId, EntityRole, Geometry, Material, TextureSlotKind, Transform,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What the editor core needs from a 3D runtime. Node handles are entity ids.
pub trait RenderBackend {
    fn add_node(&mut self, entity: &Entity);
    fn remove_node(&mut self, id: EntityId);
    fn update_transform(&mut self, id: EntityId, transform: &Transform);
    fn update_material(&mut self, id: EntityId, material: &Material);
    /// Swaps the node's geometry. The previous geometry resource is released.
    fn replace_geometry(&mut self, id: EntityId, geometry: &Geometry);
    fn bind_texture(
        &mut self,
        id: EntityId,
        slot: TextureSlotKind,
        texture: Option<Arc<TextureAsset>>,
    );
    fn set_camera(&mut self, pose: &CameraPose);
    fn render(&mut self);
}

/// Emissive selection tint.
pub trait Highlightable {
    fn set_highlight(&mut self, id: EntityId, tint: Color);
    fn clear_highlight(&mut self, id: EntityId);
}

/// Last state pushed to a node of the headless backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeState {
    pub transform: Transform,
    pub color: Option<Color>,
    pub vertex_count: usize,
    pub diffuse: Option<String>,
    pub normal_map: Option<String>,
    pub emissive: Color,
}

/// Backend that renders nothing and records what it was asked to do.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    nodes: BTreeMap<EntityId, NodeState>,
    camera: Option<CameraPose>,
    frames_rendered: u64,
    geometries_released: u64,
    material_updates: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: EntityId) -> Option<&NodeState> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn camera(&self) -> Option<&CameraPose> {
        self.camera.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn geometries_released(&self) -> u64 {
        self.geometries_released
    }

    pub fn material_updates(&self) -> u64 {
        self.material_updates
    }

    /// Ids whose emissive tint is not black.
    pub fn highlighted(&self) -> Vec<EntityId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.emissive != Color::BLACK)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl RenderBackend for HeadlessBackend {
    fn add_node(&mut self, entity: &Entity) {
        let (color, vertex_count) = match &entity.role {
            EntityRole::Mesh(mesh) => (Some(mesh.material.color), mesh.geometry.vertex_count()),
            EntityRole::Light(light) => (Some(light.color), 0),
            EntityRole::Model(_) => (None, 0),
        };
        log::debug!("Headless add node {} '{}'", entity.id, entity.name);
        self.nodes.insert(
            entity.id,
            NodeState {
                transform: entity.transform,
                color,
                vertex_count,
                diffuse: None,
                normal_map: None,
                emissive: Color::BLACK,
            },
        );
    }

    fn remove_node(&mut self, id: EntityId) {
        if self.nodes.remove(&id).is_some() {
            self.geometries_released += 1;
        }
    }

    fn update_transform(&mut self, id: EntityId, transform: &Transform) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.transform = *transform;
        }
    }

    fn update_material(&mut self, id: EntityId, material: &Material) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.color = Some(material.color);
            self.material_updates += 1;
        }
    }

    fn replace_geometry(&mut self, id: EntityId, geometry: &Geometry) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.vertex_count = geometry.vertex_count();
            self.geometries_released += 1;
        }
    }

    fn bind_texture(
        &mut self,
        id: EntityId,
        slot: TextureSlotKind,
        texture: Option<Arc<TextureAsset>>,
    ) {
        if let Some(node) = self.nodes.get_mut(&id) {
            let key = texture.map(|asset| asset.key.clone());
            match slot {
                TextureSlotKind::Diffuse => node.diffuse = key,
                TextureSlotKind::Normal => node.normal_map = key,
            }
        }
    }

    fn set_camera(&mut self, pose: &CameraPose) {
        self.camera = Some(*pose);
    }

    fn render(&mut self) {
        self.frames_rendered += 1;
    }
}

impl Highlightable for HeadlessBackend {
    fn set_highlight(&mut self, id: EntityId, tint: Color) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.emissive = tint;
        }
    }

    fn clear_highlight(&mut self, id: EntityId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.emissive = Color::BLACK;
        }
    }
}
