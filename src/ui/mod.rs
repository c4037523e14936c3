//! Inspector binding: the closed set of editable fields and the read-only view
//! mirrored from the selected entity.

use crate::app::mode::EditorMode;
use crate::assets::preview::Thumbnail;
use crate::scene::{Color, EntityId, SceneRegistry};
use crate::terrain;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }
}

/// Every field the inspector can write. Parsed from the dotted names the UI uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Position(Axis),
    Rotation(Axis),
    Scale(Axis),
    MaterialColor,
    MaterialRoughness,
    MaterialMetalness,
    TextureScale,
    HeightScale,
}

impl FieldPath {
    pub const ALL: [FieldPath; 14] = [
        Self::Position(Axis::X),
        Self::Position(Axis::Y),
        Self::Position(Axis::Z),
        Self::Rotation(Axis::X),
        Self::Rotation(Axis::Y),
        Self::Rotation(Axis::Z),
        Self::Scale(Axis::X),
        Self::Scale(Axis::Y),
        Self::Scale(Axis::Z),
        Self::MaterialColor,
        Self::MaterialRoughness,
        Self::MaterialMetalness,
        Self::TextureScale,
        Self::HeightScale,
    ];

    /// Fields that only apply to entities with a material.
    pub fn needs_material(self) -> bool {
        !matches!(self, Self::Position(_) | Self::Rotation(_) | Self::Scale(_))
    }

    /// Parses the raw text typed into the field.
    pub fn parse_value(self, raw: &str) -> Result<FieldValue, InspectorError> {
        match self {
            Self::MaterialColor => Color::parse(raw)
                .map(FieldValue::Color)
                .ok_or_else(|| InspectorError::InvalidColor(raw.to_string())),
            _ => {
                let value: f64 = raw.trim().parse().map_err(|_| InspectorError::InvalidNumber {
                    field: self,
                    raw: raw.to_string(),
                })?;
                if !value.is_finite() {
                    return Err(InspectorError::InvalidNumber {
                        field: self,
                        raw: raw.to_string(),
                    });
                }
                Ok(FieldValue::Number(value))
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(axis) => write!(f, "position.{}", axis.as_str()),
            Self::Rotation(axis) => write!(f, "rotation.{}", axis.as_str()),
            Self::Scale(axis) => write!(f, "scale.{}", axis.as_str()),
            Self::MaterialColor => f.write_str("material.color"),
            Self::MaterialRoughness => f.write_str("material.roughness"),
            Self::MaterialMetalness => f.write_str("material.metalness"),
            Self::TextureScale => f.write_str("texture.scale"),
            Self::HeightScale => f.write_str("heightmap.scale"),
        }
    }
}

impl FromStr for FieldPath {
    type Err = InspectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, member) = s
            .split_once('.')
            .ok_or_else(|| InspectorError::UnknownField(s.to_string()))?;
        let axis = match member {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        };
        let path = match (group, member, axis) {
            ("position", _, Some(axis)) => Self::Position(axis),
            ("rotation", _, Some(axis)) => Self::Rotation(axis),
            ("scale", _, Some(axis)) => Self::Scale(axis),
            ("material", "color", _) => Self::MaterialColor,
            ("material", "roughness", _) => Self::MaterialRoughness,
            ("material", "metalness", _) => Self::MaterialMetalness,
            ("texture", "scale", _) => Self::TextureScale,
            ("heightmap", "scale", _) => Self::HeightScale,
            _ => return Err(InspectorError::UnknownField(s.to_string())),
        };
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Color(Color),
}

#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("unknown inspector field '{0}'")]
    UnknownField(String),
    #[error("'{raw}' is not a valid number for {field}")]
    InvalidNumber { field: FieldPath, raw: String },
    #[error("'{0}' is not a valid color (expected #rrggbb)")]
    InvalidColor(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRow {
    pub id: EntityId,
    pub name: String,
    pub active: bool,
}

/// Snapshot of everything the inspector panels display.
#[derive(Debug, Clone)]
pub struct InspectorView {
    pub selection: Option<EntityId>,
    pub position: [f64; 3],
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
    pub color: Option<String>,
    pub roughness: Option<f64>,
    pub metalness: Option<f64>,
    pub show_properties: bool,
    pub show_material_panel: bool,
    pub show_texture_panel: bool,
    pub show_heightmap_panel: bool,
    pub show_animation_panel: bool,
    pub texture_scale: f64,
    pub height_scale: f64,
    pub texture_name: Option<String>,
    pub normal_map_name: Option<String>,
    pub terrain_info: String,
    pub objects: Vec<ObjectRow>,
    pub thumbnail: Thumbnail,
}

impl Default for InspectorView {
    fn default() -> Self {
        Self {
            selection: None,
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            color: None,
            roughness: None,
            metalness: None,
            show_properties: false,
            show_material_panel: false,
            show_texture_panel: false,
            show_heightmap_panel: false,
            show_animation_panel: false,
            texture_scale: 1.0,
            height_scale: 1.0,
            texture_name: None,
            normal_map_name: None,
            terrain_info: terrain::terrain_info(None, 0),
            objects: Vec::new(),
            thumbnail: Thumbnail::empty(),
        }
    }
}

impl InspectorView {
    pub fn build(
        registry: &SceneRegistry,
        selection: Option<EntityId>,
        mode: EditorMode,
        thumbnail: Thumbnail,
    ) -> Self {
        let mut view = Self {
            objects: registry
                .listed()
                .map(|entity| ObjectRow {
                    id: entity.id,
                    name: entity.name.clone(),
                    active: Some(entity.id) == selection,
                })
                .collect(),
            thumbnail,
            ..Self::default()
        };

        let Some(entity) = selection.and_then(|id| registry.get(id)) else {
            return view;
        };
        view.selection = Some(entity.id);
        view.show_properties = true;
        view.show_animation_panel = mode == EditorMode::Preview;
        view.position = entity.transform.position.to_array();
        view.rotation = entity.transform.rotation.to_array();
        view.scale = entity.transform.scale.to_array();

        if let Some(mesh) = entity.mesh() {
            let material = &mesh.material;
            view.color = Some(format!("#{}", material.color.hex()));
            view.roughness = Some(material.roughness);
            view.metalness = Some(material.metalness);
            view.show_material_panel = true;
            view.show_texture_panel = true;
            view.texture_scale = material.texture_scale.unwrap_or(1.0);
            view.texture_name = material.diffuse.as_ref().map(|slot| slot.file_name.clone());
            view.normal_map_name = material.normal_map.as_ref().map(|slot| slot.file_name.clone());
            if mesh.geometry.is_plane() {
                view.show_heightmap_panel = true;
                view.height_scale = mesh
                    .heightmap
                    .as_ref()
                    .map(|state| state.height_scale)
                    .unwrap_or(1.0);
                view.terrain_info =
                    terrain::terrain_info(mesh.heightmap.as_ref(), mesh.geometry.vertex_count());
            }
        }
        view
    }

    /// Text currently shown in the given field, if the field is visible.
    pub fn display_value(&self, field: FieldPath) -> Option<String> {
        use crate::export::format::js_number;
        self.selection?;
        match field {
            FieldPath::Position(axis) => Some(js_number(self.position[axis.index()])),
            FieldPath::Rotation(axis) => Some(js_number(self.rotation[axis.index()])),
            FieldPath::Scale(axis) => Some(js_number(self.scale[axis.index()])),
            FieldPath::MaterialColor => self.color.clone(),
            FieldPath::MaterialRoughness => self.roughness.map(js_number),
            FieldPath::MaterialMetalness => self.metalness.map(js_number),
            FieldPath::TextureScale => self
                .show_texture_panel
                .then(|| format!("{:.1}", self.texture_scale)),
            FieldPath::HeightScale => self
                .show_heightmap_panel
                .then(|| format!("{:.1}", self.height_scale)),
        }
    }

    pub fn active_row(&self) -> Option<&ObjectRow> {
        self.objects.iter().find(|row| row.active)
    }
}
