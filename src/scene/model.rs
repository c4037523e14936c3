use gltf::Gltf;
use std::sync::Arc;

/// A parsed glTF/GLB payload. The raw bytes are kept so the exporter can
/// ship the original file next to the generated HTML.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImportedModel {
    pub file_name: String,
    #[serde(with = "super::serialization::base64_bytes")]
    pub bytes: Arc<[u8]>,
    pub mesh_count: usize,
    pub primitive_count: usize,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub cast_shadow: bool,
}

impl ImportedModel {
    pub fn center(&self) -> [f32; 3] {
        [
            (self.bounds_min[0] + self.bounds_max[0]) * 0.5,
            (self.bounds_min[1] + self.bounds_max[1]) * 0.5,
            (self.bounds_min[2] + self.bounds_max[2]) * 0.5,
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid glTF payload: {0}")]
    Parse(#[from] gltf::Error),
    #[error("model file is empty")]
    Empty,
}

/// Parses a glTF or GLB payload and records what the editor needs from it.
pub fn parse_model(bytes: Arc<[u8]>, file_name: &str) -> Result<ImportedModel, ModelError> {
    if bytes.is_empty() {
        return Err(ModelError::Empty);
    }
    let gltf = Gltf::from_slice(&bytes)?;

    let mut mesh_count = 0;
    let mut primitive_count = 0;
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for mesh in gltf.meshes() {
        mesh_count += 1;
        for primitive in mesh.primitives() {
            primitive_count += 1;
            let Some(accessor) = primitive.get(&gltf::Semantic::Positions) else {
                continue;
            };
            if let (Some(lo), Some(hi)) = (
                accessor.min().as_ref().and_then(vec3_from_json),
                accessor.max().as_ref().and_then(vec3_from_json),
            ) {
                for axis in 0..3 {
                    min[axis] = min[axis].min(lo[axis]);
                    max[axis] = max[axis].max(hi[axis]);
                }
            }
        }
    }
    if min[0] > max[0] {
        min = [0.0; 3];
        max = [0.0; 3];
    }

    log::info!(
        "Parsed model '{}': {} meshes, {} primitives, {} bytes",
        file_name,
        mesh_count,
        primitive_count,
        bytes.len()
    );
    Ok(ImportedModel {
        file_name: file_name.to_string(),
        bytes,
        mesh_count,
        primitive_count,
        bounds_min: min,
        bounds_max: max,
        cast_shadow: true,
    })
}

fn vec3_from_json(value: &gltf::json::Value) -> Option<[f32; 3]> {
    let array = value.as_array()?;
    if array.len() < 3 {
        return None;
    }
    Some([
        array[0].as_f64()? as f32,
        array[1].as_f64()? as f32,
        array[2].as_f64()? as f32,
    ])
}
