//! Structured description of the generated program.
//!
//! The registry is walked once into a flat list of [`Instruction`]s; the
//! formatter turns that list into text. Indices in variable names are registry
//! positions, so the ground marker occupies index 0.

use crate::scene::{
    Color, Entity, EntityKind, EntityRole, Geometry, LightKind, Material, MeshData, SceneRegistry,
    TextureSlot, Transform,
};
use super::archive::asset_file_name;
use glam::DVec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Script body shown in the editor's code view.
    Preview,
    /// Script embedded in `game.html`.
    Standalone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureRef {
    pub file_name: String,
    pub repeat: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveBlock {
    pub index: usize,
    pub label: String,
    /// Constructor call without the `THREE.` prefix, e.g. `BoxGeometry(2, 2, 2)`.
    pub geometry: &'static str,
    pub color: Color,
    pub roughness: f64,
    pub metalness: f64,
    pub double_sided: bool,
    pub diffuse: Option<TextureRef>,
    pub normal_map: Option<TextureRef>,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightBlock {
    pub index: usize,
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f64,
    pub distance: Option<f64>,
    pub position: DVec3,
    pub cast_shadow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelBlock {
    pub index: usize,
    pub file_name: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Scene, camera and renderer setup.
    Prelude,
    /// Texture loader, load counters and the progress overlay function.
    LoadTracking { textures: usize, models: usize },
    Ground,
    Comment(String),
    Light(LightBlock),
    DefaultLights,
    Primitive(PrimitiveBlock),
    Model(ModelBlock),
    ModelLoaders(Vec<ModelBlock>),
    InitialProgress,
    Controls,
}

/// Canonical constructor for a primitive. Heightmapped planes still export
/// as the flat 5x5 plane.
pub fn geometry_constructor(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Box { .. } => "BoxGeometry(2, 2, 2)",
        Geometry::Sphere { .. } => "SphereGeometry(1, 32, 32)",
        Geometry::Cone { .. } => "ConeGeometry(1, 2, 32)",
        Geometry::Cylinder { .. } => "CylinderGeometry(1, 1, 2, 32)",
        Geometry::Plane(_) => "PlaneGeometry(5, 5)",
    }
}

fn light_kind(kind: EntityKind) -> Option<LightKind> {
    match kind {
        EntityKind::AmbientLight => Some(LightKind::Ambient),
        EntityKind::DirectionalLight => Some(LightKind::Directional),
        EntityKind::PointLight => Some(LightKind::Point),
        _ => None,
    }
}

fn capitalized(prefix: &str) -> String {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn texture_ref(slot: &TextureSlot, material: &Material) -> TextureRef {
    TextureRef {
        file_name: asset_file_name(&slot.file_name),
        repeat: material.texture_scale.map(|_| slot.repeat),
    }
}

fn primitive_block(index: usize, entity: &Entity, mesh: &MeshData) -> PrimitiveBlock {
    let material = &mesh.material;
    PrimitiveBlock {
        index,
        label: capitalized(entity.kind.name_prefix()),
        geometry: geometry_constructor(&mesh.geometry),
        color: material.color,
        roughness: material.roughness,
        metalness: material.metalness,
        double_sided: material.double_sided,
        diffuse: material.diffuse.as_ref().map(|slot| texture_ref(slot, material)),
        normal_map: material.normal_map.as_ref().map(|slot| texture_ref(slot, material)),
        transform: entity.transform,
    }
}

/// Number of texture files the exported page waits for.
pub fn texture_count(registry: &SceneRegistry) -> usize {
    registry
        .objects()
        .iter()
        .filter_map(Entity::material)
        .map(|material| {
            usize::from(material.diffuse.is_some()) + usize::from(material.normal_map.is_some())
        })
        .sum()
}

pub fn model_count(registry: &SceneRegistry) -> usize {
    registry.objects().iter().filter(|e| e.model().is_some()).count()
}

/// Walks the registry in insertion order.
pub fn build(registry: &SceneRegistry, target: Target) -> Vec<Instruction> {
    let mut lights = Vec::new();
    let mut objects = Vec::new();
    let mut models = Vec::new();

    for (index, entity) in registry.objects().iter().enumerate() {
        if entity.is_ground() {
            continue;
        }
        match &entity.role {
            EntityRole::Light(light) => {
                let Some(kind) = light_kind(entity.kind) else {
                    continue;
                };
                lights.push(Instruction::Light(LightBlock {
                    index,
                    kind,
                    color: light.color,
                    intensity: light.intensity,
                    distance: light.distance,
                    position: entity.transform.position,
                    cast_shadow: light.cast_shadow,
                }));
            }
            EntityRole::Mesh(mesh) => {
                objects.push(Instruction::Primitive(primitive_block(index, entity, mesh)));
            }
            EntityRole::Model(model) => {
                let block = ModelBlock {
                    index,
                    file_name: asset_file_name(&model.file_name),
                    transform: entity.transform,
                };
                objects.push(Instruction::Model(block.clone()));
                models.push(block);
            }
        }
    }

    let has_lights = !lights.is_empty();
    let mut out = vec![Instruction::Prelude];
    if target == Target::Standalone {
        out.push(Instruction::LoadTracking {
            textures: texture_count(registry),
            models: models.len(),
        });
    }
    out.push(Instruction::Ground);
    out.push(Instruction::Comment("Lights".to_string()));
    out.extend(lights);
    if !has_lights && target == Target::Preview {
        out.push(Instruction::DefaultLights);
    }
    out.push(Instruction::Comment("Objects".to_string()));
    out.extend(objects);

    if target == Target::Standalone {
        if !has_lights {
            out.push(Instruction::DefaultLights);
        }
        if !models.is_empty() {
            out.push(Instruction::ModelLoaders(models));
        }
        out.push(Instruction::InitialProgress);
    }
    out.push(Instruction::Controls);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::model::tests::triangle_gltf;
    use crate::scene::{parse_model, PrimitiveKind};
    use std::sync::Arc;

    #[test]
    fn test_empty_scene_uses_default_lights() {
        let registry = SceneRegistry::new();
        let preview = build(&registry, Target::Preview);
        assert_eq!(
            preview,
            vec![
                Instruction::Prelude,
                Instruction::Ground,
                Instruction::Comment("Lights".into()),
                Instruction::DefaultLights,
                Instruction::Comment("Objects".into()),
                Instruction::Controls,
            ]
        );

        let standalone = build(&registry, Target::Standalone);
        assert_eq!(
            standalone,
            vec![
                Instruction::Prelude,
                Instruction::LoadTracking {
                    textures: 0,
                    models: 0
                },
                Instruction::Ground,
                Instruction::Comment("Lights".into()),
                Instruction::Comment("Objects".into()),
                Instruction::DefaultLights,
                Instruction::InitialProgress,
                Instruction::Controls,
            ]
        );
    }

    #[test]
    fn test_real_lights_replace_defaults_and_keep_registry_indices() {
        let mut registry = SceneRegistry::new();
        registry.add_primitive(PrimitiveKind::Cone, Transform::default(), Color(0x123456));
        registry.add_light(LightKind::Point);

        let instructions = build(&registry, Target::Preview);
        assert!(!instructions.contains(&Instruction::DefaultLights));
        let light = instructions.iter().find_map(|i| match i {
            Instruction::Light(light) => Some(light),
            _ => None,
        });
        let light = light.unwrap();
        assert_eq!(light.index, 2);
        assert_eq!(light.kind, LightKind::Point);
        assert_eq!(light.distance, Some(100.0));

        let primitive = instructions.iter().find_map(|i| match i {
            Instruction::Primitive(block) => Some(block),
            _ => None,
        });
        let primitive = primitive.unwrap();
        assert_eq!(primitive.index, 1);
        assert_eq!(primitive.label, "Cone");
        assert_eq!(primitive.geometry, "ConeGeometry(1, 2, 32)");
    }

    #[test]
    fn test_models_are_counted_and_loaded() {
        let mut registry = SceneRegistry::new();
        let bytes: Arc<[u8]> = triangle_gltf().into();
        let model = parse_model(bytes, "tri.gltf").unwrap();
        registry.add_model(model, Transform::at(DVec3::new(0.0, 1.0, 0.0)));

        let instructions = build(&registry, Target::Standalone);
        assert!(instructions.contains(&Instruction::LoadTracking {
            textures: 0,
            models: 1
        }));
        let loaders = instructions
            .iter()
            .find(|i| matches!(i, Instruction::ModelLoaders(_)));
        assert!(matches!(
            loaders,
            Some(Instruction::ModelLoaders(models))
                if models.len() == 1 && models[0].file_name == "tri.gltf"
        ));
        assert_eq!(model_count(&registry), 1);
    }
}
