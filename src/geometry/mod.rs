//! Geometric primitives for room-space reasoning
//!
//! Room space is right-handed with `y` pointing up: `x` runs across the room
//! width, `z` across its depth and the floor is the `y = 0` plane. Every
//! horizontal ("top-down") quantity is expressed as a [`Vec2`] of `(x, z)`.

pub mod mesh;

pub use mesh::{Mesh, SurfaceSample};

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Lengths below this are treated as zero when normalising
pub const EPSILON: f64 = 1e-9;

/// Truncate to a grid of `1/scale`, snapping values that sit within float
/// noise of a grid line onto that line first.
fn truncate_to(v: f64, scale: f64) -> f64 {
    let scaled = v * scale;
    let nearest = scaled.round();
    if (scaled - nearest).abs() < 1e-6 {
        nearest / scale
    } else {
        scaled.trunc() / scale
    }
}

/// Truncate a coordinate to 1/1000 units (the precision every box query uses)
pub fn quantize_milli(v: f64) -> f64 {
    truncate_to(v, 1000.0)
}

/// Truncate a magnitude to 1/100 units
pub fn truncate_centi(v: f64) -> f64 {
    truncate_to(v, 100.0)
}

/// Round to 2 decimal places
pub fn round_centi(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// A point or direction in the horizontal `(x, z)` plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub z: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };

    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.z * other.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector
    pub fn normalized(self) -> Option<Vec2> {
        let len = self.length();
        if len < EPSILON || !len.is_finite() {
            None
        } else {
            Some(Vec2::new(self.x / len, self.z / len))
        }
    }

    /// Linear interpolation between `self` (t = 0) and `other` (t = 1)
    pub fn lerp(self, other: Vec2, t: f64) -> Vec2 {
        self * (1.0 - t) + other * t
    }

    /// Lift into 3D at the given height
    pub fn at_height(self, y: f64) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.z + rhs.z)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.z * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.z)
    }
}

/// A point or direction in room space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len < EPSILON || !len.is_finite() {
            None
        } else {
            Some(Vec3::new(self.x / len, self.y / len, self.z / len))
        }
    }

    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Largest absolute component
    pub fn max_abs(self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    /// Horizontal projection
    pub fn xz(self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }

    /// Rotate about the vertical axis through the origin.
    ///
    /// Positive angles turn `+z` towards `+x`, so an entity rotated by θ
    /// faces `(sin θ, cos θ)`.
    pub fn rotated_y(self, degrees: f64) -> Vec3 {
        let (s, c) = degrees.to_radians().sin_cos();
        Vec3::new(c * self.x + s * self.z, self.y, -s * self.x + c * self.z)
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f64) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// An axis-aligned bounding box in room space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing every point, `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Aabb> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Aabb::new(min, max))
    }

    /// Box of the given size centred on `center`
    pub fn from_center(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Aabb::new(center - half, center + half)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Extent along each axis (width, height, depth)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn floor_area(&self) -> f64 {
        let s = self.size();
        s.x * s.z
    }

    /// Truncate both corners to 1/1000 units
    pub fn quantized(&self) -> Aabb {
        Aabb::new(
            Vec3::new(
                quantize_milli(self.min.x),
                quantize_milli(self.min.y),
                quantize_milli(self.min.z),
            ),
            Vec3::new(
                quantize_milli(self.max.x),
                quantize_milli(self.max.y),
                quantize_milli(self.max.z),
            ),
        )
    }

    /// `(xmin, ymin, zmin, xmax, ymax, zmax)`
    pub fn min_max(&self) -> (f64, f64, f64, f64, f64, f64) {
        (
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        )
    }

    /// Strict intersection on all three axes; touching faces do not count
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
            && self.min.z < other.max.z
            && other.min.z < self.max.z
    }

    /// Volume shared with another box (zero when disjoint)
    pub fn intersection_volume(&self, other: &Aabb) -> f64 {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        let d = hi - lo;
        if d.x <= 0.0 || d.y <= 0.0 || d.z <= 0.0 {
            0.0
        } else {
            d.x * d.y * d.z
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn translated(&self, delta: Vec3) -> Aabb {
        Aabb::new(self.min + delta, self.max + delta)
    }

    /// Whether the horizontal projection contains `p` (boundary inclusive)
    pub fn contains_xz(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    /// Half-extent of the floor projection along a horizontal unit direction
    pub fn support(&self, dir: Vec2) -> f64 {
        let s = self.size();
        dir.x.abs() * s.x / 2.0 + dir.z.abs() * s.z / 2.0
    }

    /// Floor projection corners: bottom-left, bottom-right, top-right, top-left
    pub fn footprint(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.min.x, self.min.z),
            Vec2::new(self.max.x, self.min.z),
            Vec2::new(self.max.x, self.max.z),
            Vec2::new(self.min.x, self.max.z),
        ]
    }
}

/// One of the four cardinal floor directions.
///
/// The declaration order (`+x`, `-x`, `+z`, `-z`) is the column order of every
/// anchor/axis weight matrix, so it also decides ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    PosX,
    NegX,
    PosZ,
    NegZ,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosZ,
        Direction::NegZ,
    ];

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::PosX => Vec2::new(1.0, 0.0),
            Direction::NegX => Vec2::new(-1.0, 0.0),
            Direction::PosZ => Vec2::new(0.0, 1.0),
            Direction::NegZ => Vec2::new(0.0, -1.0),
        }
    }

    /// Unit step in room space (always horizontal)
    pub fn unit3(self) -> Vec3 {
        self.unit().at_height(0.0)
    }

    pub fn is_x(self) -> bool {
        matches!(self, Direction::PosX | Direction::NegX)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::PosX => "+x",
            Direction::NegX => "-x",
            Direction::PosZ => "+z",
            Direction::NegZ => "-z",
        };
        f.write_str(s)
    }
}

/// One edge of a footprint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Vec2,
    pub end: Vec2,
}

impl Segment {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn midpoint(&self) -> Vec2 {
        self.start.lerp(self.end, 0.5)
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}
