//! Placed objects

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Mesh, Segment, Vec2, Vec3};

use super::placement::{frame, Placement};

/// Coarse kind of an entity.
///
/// Everything except plain furniture is exempt from collision handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Furniture,
    Window,
    Door,
    Curtain,
    Rug,
    Painting,
    Mirror,
    Clock,
}

impl Category {
    pub fn ignores_overlap(self) -> bool {
        !matches!(self, Category::Furniture)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Furniture => "furniture",
            Category::Window => "window",
            Category::Door => "door",
            Category::Curtain => "curtain",
            Category::Rug => "rug",
            Category::Painting => "painting",
            Category::Mirror => "mirror",
            Category::Clock => "clock",
        };
        f.write_str(s)
    }
}

/// Footprint edges named after the entity's own orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sides {
    pub left: Segment,
    pub right: Segment,
    pub front: Segment,
    pub back: Segment,
}

/// A placed object: canonical geometry plus everything needed to derive its
/// room-space position.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    category: Category,
    /// Canonical mesh, unrotated and centred on the origin
    mesh: Mesh,
    dims: Vec3,
    rotation: f64,
    pub(crate) rotation_set: bool,
    pub(crate) placement: Placement,
    /// Position derived from the placement
    pub(crate) base: Vec3,
    /// Displacement applied since the entity was placed
    pub(crate) offset: Vec3,
    pub on_floor: bool,
    pub placed_on_wall: bool,
    pub ignore_overlap: bool,
    pub(crate) supported: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        let mesh = mesh.centered();
        let dims = mesh.bounds().map(|b| b.size()).unwrap_or(Vec3::ZERO);
        Self {
            name: name.into(),
            category: Category::Furniture,
            mesh,
            dims,
            rotation: 0.0,
            rotation_set: false,
            placement: Placement::Unplaced,
            base: Vec3::ZERO,
            offset: Vec3::ZERO,
            on_floor: false,
            placed_on_wall: false,
            ignore_overlap: false,
            supported: Vec::new(),
        }
    }

    /// Box-shaped entity of the given (width, height, depth)
    pub fn cuboid(name: impl Into<String>, size: Vec3) -> Self {
        Self::new(name, Mesh::cuboid(size))
    }

    /// Set the category; non-furniture categories are exempt from overlap checks
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self.ignore_overlap = category.ignores_overlap();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Canonical (width, height, depth), independent of rotation
    pub fn dims(&self) -> Vec3 {
        self.dims
    }

    /// Rotation about the vertical axis in degrees, within `[0, 360)`
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn is_placed(&self) -> bool {
        self.placement.is_placed()
    }

    /// Displacement accumulated since placement
    pub fn offset(&self) -> Vec3 {
        self.offset
    }

    /// Entities resting on top of this one, in placement order
    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn supports(&self, name: &str) -> bool {
        self.supported.iter().any(|s| s == name)
    }

    pub fn center(&self) -> Vec3 {
        self.base + self.offset
    }

    pub(crate) fn set_rotation(&mut self, degrees: f64) {
        self.rotation = degrees.rem_euclid(360.0);
    }

    /// Bounds of the rotated canonical mesh, relative to the centre
    pub fn local_bounds(&self) -> Aabb {
        let rotated = self.mesh.clone().rotated_y(self.rotation, Vec3::ZERO);
        rotated
            .bounds()
            .unwrap_or_else(|| Aabb::new(Vec3::ZERO, Vec3::ZERO))
    }

    /// Room-space mesh
    pub fn world_mesh(&self) -> Mesh {
        self.mesh
            .clone()
            .rotated_y(self.rotation, Vec3::ZERO)
            .translated(self.center())
    }

    /// Room-space bounding box, quantised to 1/1000 units
    pub fn aabb(&self) -> Aabb {
        self.local_bounds().translated(self.center()).quantized()
    }

    /// `(xmin, ymin, zmin, xmax, ymax, zmax)` of [`Entity::aabb`]
    pub fn min_max(&self) -> (f64, f64, f64, f64, f64, f64) {
        self.aabb().min_max()
    }

    /// Room-axis footprint: bottom-left, bottom-right, top-right, top-left
    pub fn footprint(&self) -> [Vec2; 4] {
        self.aabb().footprint()
    }

    /// Floor area of the room-space footprint
    pub fn floor_area(&self) -> f64 {
        self.aabb().floor_area()
    }

    /// Horizontal unit vectors (right, front) of the entity's own frame
    pub fn frame(&self) -> (Vec2, Vec2) {
        frame(self.rotation)
    }

    /// Footprint edges, each assigned to the side whose outward normal best
    /// matches the entity's own right/front directions.
    pub fn sides(&self) -> Sides {
        let [bl, br, tr, tl] = self.footprint();
        let edges = [
            (Segment::new(bl, br), Vec2::new(0.0, -1.0)),
            (Segment::new(br, tr), Vec2::new(1.0, 0.0)),
            (Segment::new(tr, tl), Vec2::new(0.0, 1.0)),
            (Segment::new(tl, bl), Vec2::new(-1.0, 0.0)),
        ];
        let (right, front) = self.frame();
        let best = |dir: Vec2| {
            let mut pick = 0;
            for (i, (_, n)) in edges.iter().enumerate() {
                if n.dot(dir) > edges[pick].1.dot(dir) {
                    pick = i;
                }
            }
            edges[pick].0
        };
        Sides {
            left: best(-right),
            right: best(right),
            front: best(front),
            back: best(-front),
        }
    }

    /// Whether this entity takes part in the relaxation loop at all
    pub fn is_movable(&self) -> bool {
        self.on_floor && !self.placed_on_wall
    }

    /// Whether this entity can collide or obstruct
    pub fn is_solid(&self) -> bool {
        self.is_movable() && !self.ignore_overlap
    }
}
