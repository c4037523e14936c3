use glam::DVec3;

/// Base geometry of a mesh entity. Dimensions match the constructors the
/// exporter emits, so the editor and the exported game agree on sizes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Geometry {
    Box {
        width: f64,
        height: f64,
        depth: f64,
    },
    Sphere {
        radius: f64,
        width_segments: u32,
        height_segments: u32,
    },
    Cone {
        radius: f64,
        height: f64,
        radial_segments: u32,
    },
    Cylinder {
        radius_top: f64,
        radius_bottom: f64,
        height: f64,
        radial_segments: u32,
    },
    Plane(PlaneGeometry),
}

impl Geometry {
    pub fn cube() -> Self {
        Self::Box {
            width: 2.0,
            height: 2.0,
            depth: 2.0,
        }
    }

    pub fn sphere() -> Self {
        Self::Sphere {
            radius: 1.0,
            width_segments: 32,
            height_segments: 32,
        }
    }

    pub fn cone() -> Self {
        Self::Cone {
            radius: 1.0,
            height: 2.0,
            radial_segments: 32,
        }
    }

    pub fn cylinder() -> Self {
        Self::Cylinder {
            radius_top: 1.0,
            radius_bottom: 1.0,
            height: 2.0,
            radial_segments: 32,
        }
    }

    pub fn plane(width: f64, height: f64) -> Self {
        Self::Plane(PlaneGeometry::new(width, height, 1, 1))
    }

    pub fn is_plane(&self) -> bool {
        matches!(self, Self::Plane(_))
    }

    pub fn as_plane(&self) -> Option<&PlaneGeometry> {
        match self {
            Self::Plane(plane) => Some(plane),
            _ => None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Plane(plane) => plane.positions.len(),
            _ => 0,
        }
    }

    /// Object-space axis aligned bounds.
    pub fn local_bounds(&self) -> (DVec3, DVec3) {
        match self {
            Self::Box {
                width,
                height,
                depth,
            } => {
                let half = DVec3::new(*width, *height, *depth) * 0.5;
                (-half, half)
            }
            Self::Sphere { radius, .. } => (DVec3::splat(-radius), DVec3::splat(*radius)),
            Self::Cone { radius, height, .. } => (
                DVec3::new(-radius, -height * 0.5, -radius),
                DVec3::new(*radius, height * 0.5, *radius),
            ),
            Self::Cylinder {
                radius_top,
                radius_bottom,
                height,
                ..
            } => {
                let r = radius_top.max(*radius_bottom);
                (
                    DVec3::new(-r, -height * 0.5, -r),
                    DVec3::new(r, height * 0.5, r),
                )
            }
            Self::Plane(plane) => plane.bounds(),
        }
    }
}

/// Subdivided XY plane with an explicit vertex buffer, laid out the way
/// three.js `PlaneGeometry` lays it out (rows top to bottom, +Z normals).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlaneGeometry {
    pub width: f64,
    pub height: f64,
    pub segments_x: u32,
    pub segments_y: u32,
    #[serde(skip)]
    pub positions: Vec<[f32; 3]>,
    #[serde(skip)]
    pub normals: Vec<[f32; 3]>,
    #[serde(skip)]
    pub indices: Vec<u32>,
}

impl PlaneGeometry {
    pub fn new(width: f64, height: f64, segments_x: u32, segments_y: u32) -> Self {
        let mut plane = Self {
            width,
            height,
            segments_x: segments_x.max(1),
            segments_y: segments_y.max(1),
            positions: Vec::new(),
            normals: Vec::new(),
            indices: Vec::new(),
        };
        plane.rebuild_flat();
        plane
    }

    pub fn columns(&self) -> usize {
        self.segments_x as usize + 1
    }

    pub fn rows(&self) -> usize {
        self.segments_y as usize + 1
    }

    /// True when the buffers were skipped during deserialization.
    pub fn needs_rebuild(&self) -> bool {
        self.positions.len() != self.columns() * self.rows()
    }

    pub fn rebuild_flat(&mut self) {
        let grid_x = self.segments_x as usize;
        let grid_y = self.segments_y as usize;
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        let seg_w = self.width / grid_x as f64;
        let seg_h = self.height / grid_y as f64;

        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
        self.positions.reserve((grid_x + 1) * (grid_y + 1));

        for iy in 0..=grid_y {
            let y = iy as f64 * seg_h - half_h;
            for ix in 0..=grid_x {
                let x = ix as f64 * seg_w - half_w;
                self.positions.push([x as f32, -y as f32, 0.0]);
                self.normals.push([0.0, 0.0, 1.0]);
            }
        }

        let columns = (grid_x + 1) as u32;
        for iy in 0..grid_y as u32 {
            for ix in 0..grid_x as u32 {
                let a = ix + columns * iy;
                let b = ix + columns * (iy + 1);
                let c = (ix + 1) + columns * (iy + 1);
                let d = (ix + 1) + columns * iy;
                self.indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }
    }

    /// Area-weighted vertex normals from the index buffer.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![glam::Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let a = glam::Vec3::from(self.positions[ia]);
            let b = glam::Vec3::from(self.positions[ib]);
            let c = glam::Vec3::from(self.positions[ic]);
            let face = (c - b).cross(a - b);
            accum[ia] += face;
            accum[ib] += face;
            accum[ic] += face;
        }
        self.normals = accum
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(glam::Vec3::Z).to_array())
            .collect();
    }

    pub fn bounds(&self) -> (DVec3, DVec3) {
        let half = DVec3::new(self.width * 0.5, self.height * 0.5, 0.0);
        let (mut z_min, mut z_max) = (0.0f64, 0.0f64);
        for p in &self.positions {
            z_min = z_min.min(p[2] as f64);
            z_max = z_max.max(p[2] as f64);
        }
        // Flat planes still need some thickness to be hit by a grazing ray.
        const SLAB: f64 = 1e-3;
        (
            DVec3::new(-half.x, -half.y, z_min - SLAB),
            DVec3::new(half.x, half.y, z_max + SLAB),
        )
    }

    pub fn max_height(&self) -> f32 {
        self.positions
            .iter()
            .map(|p| p[2])
            .fold(0.0f32, f32::max)
    }
}
