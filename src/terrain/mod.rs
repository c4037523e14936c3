pub mod noise;

pub use noise::SimplexNoise;

use crate::scene::{
    EntityId, Geometry, HeightmapSource, HeightmapState, PlaneGeometry, SceneRegistry,
};
use image::imageops::FilterType;
use image::DynamicImage;

/// Terrain planes are always rebuilt at this size, whatever the plane was before.
pub const TERRAIN_SIZE: f64 = 10.0;
pub const TERRAIN_SEGMENTS: u32 = 100;
/// Fixed visibility multiplier applied on top of the user height scale.
pub const HEIGHT_MULTIPLIER: f64 = 5.0;
/// Source images larger than this (per axis) are downscaled before sampling.
pub const MAX_SOURCE_SIZE: u32 = 512;
pub const NOISE_OCTAVES: u32 = 5;
pub const NOISE_FREQUENCY: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    #[error("heightmaps only work on plane geometries ({0} is not a plane)")]
    NotAPlane(EntityId),
}

pub type Result<T> = std::result::Result<T, TerrainError>;

pub fn flat_terrain() -> PlaneGeometry {
    PlaneGeometry::new(TERRAIN_SIZE, TERRAIN_SIZE, TERRAIN_SEGMENTS, TERRAIN_SEGMENTS)
}

/// Displaces a fresh terrain plane by the mean RGB of `image`.
pub fn heightfield_from_image(image: &DynamicImage, height_scale: f64) -> PlaneGeometry {
    let width = image.width().clamp(1, MAX_SOURCE_SIZE);
    let height = image.height().clamp(1, MAX_SOURCE_SIZE);
    let rgba = if width != image.width() || height != image.height() {
        image.resize_exact(width, height, FilterType::Triangle).to_rgba8()
    } else {
        image.to_rgba8()
    };

    let mut plane = flat_terrain();
    let half = TERRAIN_SIZE / 2.0;
    for position in &mut plane.positions {
        let u = (position[0] as f64 + half) / TERRAIN_SIZE;
        let v = (position[1] as f64 + half) / TERRAIN_SIZE;
        let px = (u * (width - 1) as f64).floor().clamp(0.0, (width - 1) as f64) as u32;
        let py = ((1.0 - v) * (height - 1) as f64)
            .floor()
            .clamp(0.0, (height - 1) as f64) as u32;
        let [r, g, b, _] = rgba.get_pixel(px, py).0;
        let h = (r as f64 + g as f64 + b as f64) / 255.0 / 3.0;
        position[2] = (h * height_scale * HEIGHT_MULTIPLIER) as f32;
    }
    plane.compute_vertex_normals();
    plane
}

/// Displaces a fresh terrain plane with fractal simplex noise.
pub fn heightfield_from_noise(seed: u64, height_scale: f64) -> PlaneGeometry {
    let noise = SimplexNoise::new(seed);
    let mut plane = flat_terrain();
    for position in &mut plane.positions {
        let raw = noise.fractal(
            position[0] as f64,
            position[1] as f64,
            NOISE_FREQUENCY,
            NOISE_OCTAVES,
        );
        let normalized = ((raw + 1.0) * 0.5).clamp(0.0, 1.0);
        let h = normalized * normalized;
        position[2] = (h * height_scale * HEIGHT_MULTIPLIER) as f32;
    }
    plane.compute_vertex_normals();
    plane
}

/// Checks that `id` names a user plane that may carry a heightmap.
pub fn ensure_plane(registry: &SceneRegistry, id: EntityId) -> Result<()> {
    let entity = registry.get(id).ok_or(TerrainError::UnknownEntity(id))?;
    if entity.is_ground() || !entity.has_plane_geometry() {
        return Err(TerrainError::NotAPlane(id));
    }
    Ok(())
}

fn install(
    registry: &mut SceneRegistry,
    id: EntityId,
    plane: PlaneGeometry,
    heightmap: Option<HeightmapState>,
) -> Result<()> {
    let mesh = registry
        .get_mut(id)
        .and_then(|entity| entity.mesh_mut())
        .ok_or(TerrainError::UnknownEntity(id))?;
    mesh.geometry = Geometry::Plane(plane);
    mesh.heightmap = heightmap;
    Ok(())
}

pub fn apply_image_heightmap(
    registry: &mut SceneRegistry,
    id: EntityId,
    image: &DynamicImage,
    cache_key: &str,
    height_scale: f64,
) -> Result<()> {
    ensure_plane(registry, id)?;
    let plane = heightfield_from_image(image, height_scale);
    log::info!(
        "Applied image heightmap '{}' to {} ({}x{} source, scale {})",
        cache_key,
        id,
        image.width(),
        image.height(),
        height_scale
    );
    install(
        registry,
        id,
        plane,
        Some(HeightmapState {
            source: HeightmapSource::Image {
                cache_key: cache_key.to_string(),
            },
            height_scale,
        }),
    )
}

pub fn generate_procedural_heightmap(
    registry: &mut SceneRegistry,
    id: EntityId,
    seed: u64,
    height_scale: f64,
) -> Result<()> {
    ensure_plane(registry, id)?;
    let plane = heightfield_from_noise(seed, height_scale);
    log::info!(
        "Generated procedural terrain on {} (seed {}, scale {})",
        id,
        seed,
        height_scale
    );
    install(
        registry,
        id,
        plane,
        Some(HeightmapState {
            source: HeightmapSource::Procedural { seed },
            height_scale,
        }),
    )
}

pub fn reset(registry: &mut SceneRegistry, id: EntityId) -> Result<()> {
    ensure_plane(registry, id)?;
    log::info!("Reset terrain on {}", id);
    install(registry, id, flat_terrain(), None)
}

/// Text shown in the terrain panel for the given heightmap.
pub fn terrain_info(heightmap: Option<&HeightmapState>, vertex_count: usize) -> String {
    let Some(state) = heightmap else {
        return "Select a plane object to enable terrain tools".to_string();
    };
    let source = match &state.source {
        HeightmapSource::Procedural { .. } => "Generated terrain (procedural)",
        HeightmapSource::Image { .. } => "Heightmap from image",
    };
    format!(
        "{}\nHeight scale: {}\nSegments: {}x{}\nVertices: {}",
        source,
        crate::export::format::js_number(state.height_scale),
        TERRAIN_SEGMENTS,
        TERRAIN_SEGMENTS,
        vertex_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Color, PrimitiveKind, Transform};
    use image::{Rgba, RgbaImage};

    fn registry_with(kind: PrimitiveKind) -> (SceneRegistry, EntityId) {
        let mut registry = SceneRegistry::new();
        let id = registry.add_primitive(kind, Transform::default(), Color::WHITE);
        (registry, id)
    }

    #[test]
    fn test_image_heightmap_maps_brightness_to_height() {
        let (mut registry, id) = registry_with(PrimitiveKind::Plane);
        let white = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let image = DynamicImage::ImageRgba8(white);
        apply_image_heightmap(&mut registry, id, &image, "white.png", 2.0).unwrap();

        let mesh = registry.get(id).unwrap().mesh().unwrap();
        let plane = mesh.geometry.as_plane().unwrap();
        assert_eq!(plane.positions.len(), 101 * 101);
        for p in &plane.positions {
            assert!((p[2] - 10.0).abs() < 1e-5);
        }
        assert_eq!(
            mesh.heightmap.as_ref().unwrap().source,
            HeightmapSource::Image {
                cache_key: "white.png".to_string()
            }
        );
    }

    #[test]
    fn test_image_rows_are_sampled_top_down() {
        // Top half white, bottom half black.
        let image = RgbaImage::from_fn(8, 8, |_, y| {
            if y < 4 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let plane = heightfield_from_image(&DynamicImage::ImageRgba8(image), 1.0);
        // First vertex row is the top edge (y = +5).
        assert!((plane.positions[0][2] - 5.0).abs() < 1e-5);
        assert_eq!(plane.positions.last().unwrap()[2], 0.0);
    }

    #[test]
    fn test_large_images_are_downscaled() {
        let grey = RgbaImage::from_pixel(1024, 600, Rgba([128, 128, 128, 255]));
        let image = DynamicImage::ImageRgba8(grey);
        let plane = heightfield_from_image(&image, 1.0);
        let expected = 128.0 / 255.0 * 5.0;
        assert!((plane.positions[5050][2] as f64 - expected).abs() < 0.05);
    }

    #[test]
    fn test_procedural_heightmap_is_deterministic() {
        let a = heightfield_from_noise(1234, 3.0);
        let b = heightfield_from_noise(1234, 3.0);
        assert_eq!(a.positions, b.positions);
        let c = heightfield_from_noise(4321, 3.0);
        assert_ne!(a.positions, c.positions);
        for p in &a.positions {
            assert!(p[2] >= 0.0 && p[2] <= 15.0 + 1e-4);
        }
    }

    #[test]
    fn test_non_plane_is_rejected_without_change() {
        let (mut registry, cube) = registry_with(PrimitiveKind::Cube);
        let before = registry.get(cube).unwrap().clone();

        let err = generate_procedural_heightmap(&mut registry, cube, 1, 1.0).unwrap_err();
        assert!(matches!(err, TerrainError::NotAPlane(id) if id == cube));
        assert!(matches!(reset(&mut registry, cube), Err(TerrainError::NotAPlane(_))));
        let image = DynamicImage::ImageRgba8(RgbaImage::new(2, 2));
        assert!(apply_image_heightmap(&mut registry, cube, &image, "k", 1.0).is_err());

        assert_eq!(registry.get(cube).unwrap(), &before);
    }

    #[test]
    fn test_ground_is_not_a_terrain_target() {
        let mut registry = SceneRegistry::new();
        let ground = registry.ground().unwrap().id;
        assert!(matches!(
            reset(&mut registry, ground),
            Err(TerrainError::NotAPlane(_))
        ));
    }

    #[test]
    fn test_reset_clears_heightmap() {
        let (mut registry, id) = registry_with(PrimitiveKind::Plane);
        generate_procedural_heightmap(&mut registry, id, 9, 1.0).unwrap();
        reset(&mut registry, id).unwrap();
        let mesh = registry.get(id).unwrap().mesh().unwrap();
        assert!(mesh.heightmap.is_none());
        let plane = mesh.geometry.as_plane().unwrap();
        assert_eq!(plane.segments_x, TERRAIN_SEGMENTS);
        assert_eq!(plane.max_height(), 0.0);
    }

    #[test]
    fn test_terrain_info_text() {
        let state = HeightmapState {
            source: HeightmapSource::Procedural { seed: 3 },
            height_scale: 2.5,
        };
        let info = terrain_info(Some(&state), 10201);
        assert!(info.starts_with("Generated terrain (procedural)"));
        assert!(info.contains("Height scale: 2.5"));
        assert!(info.contains("Segments: 100x100"));
        assert!(info.contains("Vertices: 10201"));
    }
}
