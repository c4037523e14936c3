use crate::scene::{HeightmapSource, SceneRegistry};
use crate::terrain;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid scene: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SerializationError>;

pub fn save_scene_to_file(scene: &SceneRegistry, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(scene)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn load_scene_from_file(path: &Path) -> Result<SceneRegistry> {
    let json = std::fs::read_to_string(path)?;
    let mut scene: SceneRegistry = serde_json::from_str(&json)?;
    scene.validate().map_err(SerializationError::Invalid)?;
    restore_runtime_geometry(&mut scene);
    Ok(scene)
}

/// Rebuilds the vertex buffers that are not persisted. Procedural terrain is
/// regenerated from its seed; image terrain has no stored pixels and goes flat.
pub fn restore_runtime_geometry(scene: &mut SceneRegistry) {
    scene.rebuild_skipped_buffers();

    let terrains: Vec<_> = scene
        .objects()
        .iter()
        .filter_map(|entity| {
            let state = entity.mesh()?.heightmap.clone()?;
            Some((entity.id, state))
        })
        .collect();

    for (id, state) in terrains {
        let restored = match &state.source {
            HeightmapSource::Procedural { seed } => {
                terrain::generate_procedural_heightmap(scene, id, *seed, state.height_scale)
            }
            HeightmapSource::Image { cache_key } => {
                log::warn!(
                    "Heightmap image '{}' for {} is not stored in scene files; terrain loaded flat",
                    cache_key,
                    id
                );
                terrain::reset(scene, id)
            }
        };
        if let Err(err) = restored {
            log::warn!("Could not restore terrain for {}: {}", id, err);
        }
    }
}

/// Serde adapter storing byte payloads as base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(bytes: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use crate::scene::model::tests::triangle_gltf;
    use crate::scene::{
        parse_model, Color, EntityRole, Geometry, LightKind, PrimitiveKind, SceneRegistry,
        Transform,
    };
    use glam::DVec3;
    use std::sync::Arc;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        path.push(format!(
            "scene_forge_{}_{}_{}.json",
            tag,
            std::process::id(),
            nonce
        ));
        path
    }

    #[test]
    fn test_empty_scene_serialization() {
        let scene = SceneRegistry::new();
        let json = serde_json::to_string_pretty(&scene).unwrap();
        let loaded: SceneRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.ground().is_some());
    }

    #[test]
    fn test_vertex_buffers_are_not_serialized() {
        let mut scene = SceneRegistry::new();
        scene.add_primitive(PrimitiveKind::Plane, Transform::default(), Color::WHITE);
        let json = serde_json::to_string_pretty(&scene).unwrap();
        assert!(!json.contains("positions"));
        assert!(!json.contains("indices"));
    }

    #[test]
    fn test_save_load_roundtrip_via_file() {
        let mut scene = SceneRegistry::new();
        let cube = scene.add_primitive(
            PrimitiveKind::Cube,
            Transform::at(DVec3::new(3.0, 1.0, -2.0)),
            Color(0x336699),
        );
        scene.add_light(LightKind::Point);
        let model = parse_model(Arc::from(triangle_gltf()), "tri.gltf").unwrap();
        let model_id = scene.add_model(model, Transform::default());

        let path = temp_path("roundtrip");
        for _ in 0..10 {
            super::save_scene_to_file(&scene, &path).unwrap();
            scene = super::load_scene_from_file(&path).unwrap();
        }
        let _ = std::fs::remove_file(&path);

        assert_eq!(scene.len(), 4);
        let cube = scene.get(cube).unwrap();
        assert_eq!(cube.transform.position, DVec3::new(3.0, 1.0, -2.0));
        assert_eq!(cube.material().unwrap().color, Color(0x336699));
        match &scene.get(model_id).unwrap().role {
            EntityRole::Model(model) => assert_eq!(&*model.bytes, triangle_gltf().as_slice()),
            other => panic!("Expected model role, got {:?}", other),
        }

        // Ids keep counting from where the saved session stopped.
        let next = scene.add_primitive(PrimitiveKind::Sphere, Transform::default(), Color::WHITE);
        assert!(next.0 > model_id.0);
        assert_eq!(scene.get(next).unwrap().name, "sphere_4");
    }

    #[test]
    fn test_procedural_terrain_is_regenerated_on_load() {
        let mut scene = SceneRegistry::new();
        let plane = scene.add_primitive(PrimitiveKind::Plane, Transform::default(), Color::WHITE);
        crate::terrain::generate_procedural_heightmap(&mut scene, plane, 77, 2.0).unwrap();
        let original = scene.get(plane).unwrap().mesh().unwrap().geometry.clone();

        let path = temp_path("terrain");
        super::save_scene_to_file(&scene, &path).unwrap();
        let loaded = super::load_scene_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let restored = &loaded.get(plane).unwrap().mesh().unwrap().geometry;
        assert_eq!(restored, &original);
        assert!(matches!(restored, Geometry::Plane(p) if p.max_height() > 0.0));
    }

    #[test]
    fn test_image_terrain_loads_flat() {
        let mut scene = SceneRegistry::new();
        let plane = scene.add_primitive(PrimitiveKind::Plane, Transform::default(), Color::WHITE);
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            2,
            image::Rgba([200, 200, 200, 255]),
        ));
        crate::terrain::apply_image_heightmap(&mut scene, plane, &image, "hm.png", 1.0).unwrap();

        let json = serde_json::to_string(&scene).unwrap();
        let mut loaded: SceneRegistry = serde_json::from_str(&json).unwrap();
        super::restore_runtime_geometry(&mut loaded);

        let mesh = loaded.get(plane).unwrap().mesh().unwrap();
        assert!(mesh.heightmap.is_none());
        assert_eq!(mesh.geometry.as_plane().unwrap().max_height(), 0.0);
    }

    #[test]
    fn test_malformed_scene_files_are_rejected() {
        let scene = SceneRegistry::new();
        let mut json: serde_json::Value = serde_json::to_value(&scene).unwrap();
        let ground = json["objects"][0].clone();
        json["objects"].as_array_mut().unwrap().push(ground);

        let path = temp_path("two_grounds");
        std::fs::write(&path, json.to_string()).unwrap();
        let loaded = super::load_scene_from_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(loaded, Err(super::SerializationError::Invalid(_))));

        let mut scene = SceneRegistry::new();
        let cube = scene.add_primitive(PrimitiveKind::Cube, Transform::default(), Color::WHITE);
        let mut json: serde_json::Value = serde_json::to_value(&scene).unwrap();
        let mut copy = json["objects"][1].clone();
        copy["name"] = "cube_9".into();
        json["objects"].as_array_mut().unwrap().push(copy);
        let path = temp_path("duplicate_ids");
        std::fs::write(&path, json.to_string()).unwrap();
        let loaded = super::load_scene_from_file(&path);
        let _ = std::fs::remove_file(&path);
        match loaded {
            Err(super::SerializationError::Invalid(msg)) => {
                assert!(msg.contains(&cube.to_string()))
            }
            other => panic!("expected invalid scene, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_stale_counters_are_advanced_on_load() {
        let mut scene = SceneRegistry::new();
        let cube = scene.add_primitive(PrimitiveKind::Cube, Transform::default(), Color::WHITE);
        let mut json: serde_json::Value = serde_json::to_value(&scene).unwrap();
        json["next_id"] = 0.into();
        json["next_name_index"] = 0.into();

        let path = temp_path("stale_counters");
        std::fs::write(&path, json.to_string()).unwrap();
        let mut loaded = super::load_scene_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let next = loaded.add_primitive(PrimitiveKind::Sphere, Transform::default(), Color::WHITE);
        assert!(next.0 > cube.0);
        assert_eq!(loaded.get(next).unwrap().name, "sphere_2");
        assert_eq!(loaded.get(cube).unwrap().name, "cube_1");
    }
}
