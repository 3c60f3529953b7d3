//! CPU-side model data as it comes out of the loader, before any GPU upload.
//!
//! A [`ModelObject`] is the loaded mesh hierarchy plus the transform that places
//! it in the scene. Post-processing (material override, scale, centering) happens
//! on this type so it can be checked without a GPU.

use cgmath::{EuclideanSpace, Matrix4, Point3, Vector3};

/// Handle to a material owned by the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn from_points<I: IntoIterator<Item = Point3<f32>>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Aabb {
                min: first,
                max: first,
            },
            |aabb, p| aabb.expanded(p),
        ))
    }

    fn expanded(self, p: Point3<f32>) -> Self {
        Aabb {
            min: Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z)),
            max: Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z)),
        }
    }

    pub fn union(self, other: Aabb) -> Self {
        self.expanded(other.min).expanded(other.max)
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }
}

/// Placement of a model: uniform scale about the model origin, then translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub scale: f32,
}

impl Transform {
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position) * Matrix4::from_scale(self.scale)
    }

    pub fn apply(&self, p: Point3<f32>) -> Point3<f32> {
        Point3::from_vec(p.to_vec() * self.scale + self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: 1.0,
        }
    }
}

/// A triangulated mesh with one shared index buffer for all attributes.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: Option<MaterialId>,
}

impl MeshData {
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().copied().map(Point3::from))
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModelObject {
    pub name: String,
    pub meshes: Vec<MeshData>,
    pub transform: Transform,
}

impl ModelObject {
    pub fn new(name: impl Into<String>, meshes: Vec<MeshData>) -> Self {
        Self {
            name: name.into(),
            meshes,
            transform: Transform::default(),
        }
    }

    /// Bounds in model space, ignoring the transform.
    pub fn local_bounds(&self) -> Option<Aabb> {
        self.meshes
            .iter()
            .filter_map(MeshData::bounds)
            .reduce(Aabb::union)
    }

    /// Bounds after applying the transform.
    pub fn world_bounds(&self) -> Option<Aabb> {
        let local = self.local_bounds()?;
        let transform = self.transform;
        Some(Aabb {
            min: transform.apply(local.min),
            max: transform.apply(local.max),
        })
    }

    /// Points every mesh at `material`, replacing whatever the file referenced.
    pub fn assign_material(&mut self, material: MaterialId) {
        self.meshes
            .iter_mut()
            .for_each(|mesh| mesh.material = Some(material));
    }

    /// Scales uniformly by `scale`, then moves the object so the center of its
    /// world bounds sits at the origin. Calling it again with the same scale
    /// leaves the object where it is.
    ///
    /// Returns the resulting world bounds, or `None` for an object without vertices
    /// (which is scaled but not moved).
    pub fn fit_to_origin(&mut self, scale: f32) -> Option<Aabb> {
        self.transform.scale = scale;
        let bounds = self.world_bounds()?;
        self.transform.position -= bounds.center().to_vec();
        self.world_bounds()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(MeshData::vertex_count).sum()
    }
}
