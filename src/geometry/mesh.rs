//! Triangle meshes for entity geometry
//!
//! Meshes are plain triangle soups. They back the bounding boxes used by the
//! relaxation loop, the surface sampling used to find support planes, and the
//! ray casts used for visibility checks.

use rand::Rng;

use super::{Aabb, Vec3, EPSILON};
use crate::error::SceneError;

/// A surface point together with the normal of the face it was drawn from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub point: Vec3,
    pub normal: Vec3,
}

/// An indexed triangle mesh.
///
/// Every face index is checked against the vertex list on construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    faces: Vec<[usize; 3]>,
}

/// Corner order of [`Mesh::cuboid`]: bit 0 = +x, bit 1 = +y, bit 2 = +z
const CUBOID_FACES: [[usize; 3]; 12] = [
    [0, 2, 1],
    [1, 2, 3],
    [4, 5, 6],
    [5, 7, 6],
    [0, 4, 2],
    [2, 4, 6],
    [1, 3, 5],
    [3, 7, 5],
    [0, 1, 4],
    [1, 5, 4],
    [2, 6, 3],
    [3, 6, 7],
];

impl Mesh {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[usize; 3]>) -> Result<Self, SceneError> {
        if let Some((face, index)) = faces
            .iter()
            .enumerate()
            .find_map(|(f, idx)| idx.iter().find(|&&i| i >= vertices.len()).map(|&i| (f, i)))
        {
            return Err(SceneError::invalid_argument(
                "faces",
                format!(
                    "face {} refers to vertex {} but the mesh has {}",
                    face,
                    index,
                    vertices.len()
                ),
            ));
        }
        Ok(Self { vertices, faces })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Closed box of the given size centred on the origin, faces wound outwards
    pub fn cuboid(size: Vec3) -> Self {
        let h = size * 0.5;
        let vertices = (0..8)
            .map(|i| {
                Vec3::new(
                    if i & 1 == 0 { -h.x } else { h.x },
                    if i & 2 == 0 { -h.y } else { h.y },
                    if i & 4 == 0 { -h.z } else { h.z },
                )
            })
            .collect();
        Self {
            vertices,
            faces: CUBOID_FACES.to_vec(),
        }
    }

    /// Box spanning `bounds`
    pub fn cuboid_between(bounds: Aabb) -> Self {
        Self::cuboid(bounds.size()).translated(bounds.center())
    }

    /// Concatenate several meshes into one soup
    pub fn merge(parts: impl IntoIterator<Item = Mesh>) -> Self {
        let mut merged = Mesh::default();
        for part in parts {
            let base = merged.vertices.len();
            merged.vertices.extend(part.vertices);
            merged
                .faces
                .extend(part.faces.into_iter().map(|[a, b, c]| [a + base, b + base, c + base]));
        }
        merged
    }

    /// A four-legged table: a slab on top of square legs.
    ///
    /// The result is centred on its bounding box like every canonical mesh.
    pub fn table(size: Vec3, top_thickness: f64, leg: f64) -> Self {
        let (hw, hd) = (size.x / 2.0, size.z / 2.0);
        let leg_height = (size.y - top_thickness).max(0.0);
        let top = Mesh::cuboid_between(Aabb::new(
            Vec3::new(-hw, leg_height, -hd),
            Vec3::new(hw, size.y, hd),
        ));
        let legs = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].map(|(sx, sz)| {
            let cx = sx * (hw - leg / 2.0);
            let cz = sz * (hd - leg / 2.0);
            Mesh::cuboid_between(Aabb::new(
                Vec3::new(cx - leg / 2.0, 0.0, cz - leg / 2.0),
                Vec3::new(cx + leg / 2.0, leg_height, cz + leg / 2.0),
            ))
        });
        Mesh::merge(std::iter::once(top).chain(legs)).centered()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().copied())
    }

    pub fn translated(mut self, delta: Vec3) -> Self {
        for v in &mut self.vertices {
            *v += delta;
        }
        self
    }

    /// Rotate every vertex about the vertical axis through `pivot`
    pub fn rotated_y(mut self, degrees: f64, pivot: Vec3) -> Self {
        for v in &mut self.vertices {
            *v = (*v - pivot).rotated_y(degrees) + pivot;
        }
        self
    }

    /// Translate so the bounding box is centred on the origin
    pub fn centered(self) -> Self {
        match self.bounds() {
            Some(b) => {
                let c = b.center();
                self.translated(-c)
            }
            None => self,
        }
    }

    fn triangle(&self, face: usize) -> (Vec3, Vec3, Vec3) {
        let [a, b, c] = self.faces[face];
        (self.vertices[a], self.vertices[b], self.vertices[c])
    }

    fn face_cross(&self, face: usize) -> Vec3 {
        let (a, b, c) = self.triangle(face);
        (b - a).cross(c - a)
    }

    pub fn face_area(&self, face: usize) -> f64 {
        self.face_cross(face).length() / 2.0
    }

    /// Unit normal of a face, `None` for a degenerate triangle
    pub fn face_normal(&self, face: usize) -> Option<Vec3> {
        self.face_cross(face).normalized()
    }

    pub fn surface_area(&self) -> f64 {
        (0..self.faces.len()).map(|f| self.face_area(f)).sum()
    }

    /// Draw `count` points uniformly over the surface (area weighted)
    pub fn sample_surface<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<SurfaceSample> {
        let mut cumulative = Vec::with_capacity(self.faces.len());
        let mut total = 0.0;
        for f in 0..self.faces.len() {
            total += self.face_area(f);
            cumulative.push(total);
        }
        if total <= EPSILON {
            return Vec::new();
        }

        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let target = rng.gen::<f64>() * total;
            let face = cumulative
                .partition_point(|&c| c <= target)
                .min(self.faces.len() - 1);
            let Some(normal) = self.face_normal(face) else {
                continue;
            };
            let (a, b, c) = self.triangle(face);
            let r1 = rng.gen::<f64>().sqrt();
            let r2 = rng.gen::<f64>();
            let point = a * (1.0 - r1) + b * (r1 * (1.0 - r2)) + c * (r1 * r2);
            samples.push(SurfaceSample { point, normal });
        }
        samples
    }

    /// Distance along `dir` to the nearest face hit by the ray, if any.
    ///
    /// `dir` must be a unit vector; faces are hit from either side.
    pub fn ray_intersect(&self, origin: Vec3, dir: Vec3) -> Option<f64> {
        let mut nearest: Option<f64> = None;
        for f in 0..self.faces.len() {
            let (a, b, c) = self.triangle(f);
            let e1 = b - a;
            let e2 = c - a;
            let p = dir.cross(e2);
            let det = e1.dot(p);
            if det.abs() < EPSILON {
                continue;
            }
            let inv = 1.0 / det;
            let s = origin - a;
            let u = s.dot(p) * inv;
            if !(0.0..=1.0).contains(&u) {
                continue;
            }
            let q = s.cross(e1);
            let v = dir.dot(q) * inv;
            if v < 0.0 || u + v > 1.0 {
                continue;
            }
            let t = e2.dot(q) * inv;
            if t > EPSILON && nearest.map_or(true, |n| t < n) {
                nearest = Some(t);
            }
        }
        nearest
    }
}
