//! Placement vocabulary: how an entity's position is derived
//!
//! A [`Placement`] is stored on every entity and re-evaluated whenever its
//! anchor moves, which is what keeps relatively placed children rigid with
//! their parents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::geometry::{Vec2, Vec3};

use super::entity::Entity;
use super::Room;

/// Gap kept between a wall-targeted entity and the wall
pub const WALL_GAP: f64 = 0.1;

/// Gap between a wall-mounted entity's back face and its wall
pub const WALL_MOUNT_GAP: f64 = 0.05;

/// Spatial relation of a child to its anchor, in the anchor's own frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    LeftOf,
    RightOf,
    InFrontOf,
    Behind,
    /// Beside the anchor, back edges aligned
    LeftAdjacent,
    RightAdjacent,
    /// Resting on one of the anchor's support surfaces
    OnTopOf,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::LeftOf => "left_of",
            Relation::RightOf => "right_of",
            Relation::InFrontOf => "in_front_of",
            Relation::Behind => "behind",
            Relation::LeftAdjacent => "left_adj",
            Relation::RightAdjacent => "right_adj",
            Relation::OnTopOf => "on_top_of",
        };
        f.write_str(s)
    }
}

/// The four room walls.
///
/// The left wall is `x = 0`, the right wall `x = W`, the back wall `z = 0`
/// and the front wall `z = D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallId {
    Left,
    Right,
    Front,
    Back,
}

impl WallId {
    /// Rotation that makes an entity face this wall
    pub fn facing_angle(self) -> f64 {
        match self {
            WallId::Left => -90.0,
            WallId::Right => 90.0,
            WallId::Front => 0.0,
            WallId::Back => 180.0,
        }
    }

    pub fn opposite(self) -> WallId {
        match self {
            WallId::Left => WallId::Right,
            WallId::Right => WallId::Left,
            WallId::Front => WallId::Back,
            WallId::Back => WallId::Front,
        }
    }

    /// Rotation of an entity hung on this wall (its front points into the room)
    pub fn mount_rotation(self) -> f64 {
        match self {
            WallId::Back => 0.0,
            WallId::Left => 90.0,
            WallId::Front => 180.0,
            WallId::Right => 270.0,
        }
    }

    /// Unit normal pointing from the wall into the room
    pub fn inward_normal(self) -> Vec2 {
        match self {
            WallId::Left => Vec2::new(1.0, 0.0),
            WallId::Right => Vec2::new(-1.0, 0.0),
            WallId::Back => Vec2::new(0.0, 1.0),
            WallId::Front => Vec2::new(0.0, -1.0),
        }
    }

    /// Whether the wall bounds the `x` axis
    pub fn is_x_wall(self) -> bool {
        matches!(self, WallId::Left | WallId::Right)
    }

    /// Point on the wall line for a horizontal slot.
    ///
    /// Slots are named as seen from inside the room looking at the wall.
    pub fn slot_point(self, room: &Room, slot: WallSlot) -> Vec2 {
        let (lo, hi) = (0.2, 0.8);
        let t = match slot {
            WallSlot::Middle => 0.5,
            WallSlot::Left => match self {
                WallId::Back | WallId::Right => lo,
                WallId::Front | WallId::Left => hi,
            },
            WallSlot::Right => match self {
                WallId::Back | WallId::Right => hi,
                WallId::Front | WallId::Left => lo,
            },
        };
        match self {
            WallId::Left => Vec2::new(0.0, t * room.depth),
            WallId::Right => Vec2::new(room.width, t * room.depth),
            WallId::Back => Vec2::new(t * room.width, 0.0),
            WallId::Front => Vec2::new(t * room.width, room.depth),
        }
    }
}

impl fmt::Display for WallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WallId::Left => "left_wall",
            WallId::Right => "right_wall",
            WallId::Front => "front_wall",
            WallId::Back => "back_wall",
        };
        f.write_str(s)
    }
}

/// Horizontal slot along a wall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WallSlot {
    Left,
    Middle,
    Right,
}

/// Vertical slot on a wall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalSlot {
    Top,
    Middle,
    Bottom,
}

/// Target for one horizontal coordinate of a global placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisTarget {
    At(f64),
    Wall(WallId),
    Center,
}

/// Target for the vertical coordinate of a global placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Height {
    Floor,
    Ceiling,
    At(f64),
}

/// Something an entity can be turned to face.
///
/// Entity names are resolved against the scene when the facing is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceTarget {
    Entity(String),
    Wall(WallId),
    Point(Vec2),
}

impl From<WallId> for FaceTarget {
    fn from(wall: WallId) -> Self {
        FaceTarget::Wall(wall)
    }
}

/// How an entity's base position is derived
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Placement {
    #[default]
    Unplaced,
    /// Fixed room-space centre
    Global { center: Vec3 },
    /// Derived from an anchor entity's position and rotation
    Relative {
        relation: Relation,
        anchor: String,
        dist: f64,
        shift: f64,
    },
    /// Resting on an anchor; `slot` is the offset from the anchor's centre
    OnTopOf { anchor: String, slot: Vec3 },
    /// Hung on a wall
    OnWall {
        wall: WallId,
        slot: WallSlot,
        vertical: VerticalSlot,
        center: Vec3,
    },
}

impl Placement {
    /// Name of the entity this placement depends on, if any
    pub fn anchor(&self) -> Option<&str> {
        match self {
            Placement::Relative { anchor, .. } | Placement::OnTopOf { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        !matches!(self, Placement::Unplaced)
    }
}

/// Unit vectors of an entity's local frame projected on the floor: (right, front)
pub fn frame(rotation: f64) -> (Vec2, Vec2) {
    let (s, c) = rotation.to_radians().sin_cos();
    (Vec2::new(c, -s), Vec2::new(s, c))
}

/// Snap a heading (in degrees) to the nearest multiple of 45
pub fn snap_heading(delta: Vec2) -> Option<f64> {
    let dir = delta.normalized()?;
    let deg = dir.x.atan2(dir.z).to_degrees();
    Some((deg / 45.0).round() * 45.0)
}

/// Centre of `child` placed relative to `anchor`.
///
/// The separation along the relation's axis is `dist` plus the half-extents
/// of both world-space footprints along that axis, so the two footprints
/// are exactly `dist` apart.
pub fn relative_center(
    relation: Relation,
    anchor: &Entity,
    child: &Entity,
    dist: f64,
    shift: f64,
) -> Result<Vec3, SceneError> {
    let (right, front) = frame(anchor.rotation());
    let anchor_box = anchor.aabb();
    let child_box = child.local_bounds();
    let origin = anchor.center().xz();
    let dist = dist.abs();

    let separated = |axis: Vec2| {
        origin + axis * (dist + anchor_box.support(axis) + child_box.support(axis))
    };
    let back_aligned = shift + anchor_box.support(front) - child_box.support(front);

    let xz = match relation {
        Relation::RightOf => separated(right) + front * shift,
        Relation::LeftOf => separated(-right) + front * shift,
        Relation::InFrontOf => separated(front) + right * shift,
        Relation::Behind => separated(-front) + right * shift,
        Relation::RightAdjacent => separated(right) + (-front) * back_aligned,
        Relation::LeftAdjacent => separated(-right) + (-front) * back_aligned,
        Relation::OnTopOf => {
            return Err(SceneError::invalid_argument(
                "relation",
                "on_top_of is resolved through the anchor's support surfaces",
            ))
        }
    };
    Ok(xz.at_height(child_box.size().y / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new(5.0, 4.0, 3.0).unwrap()
    }

    #[test]
    fn test_frame_at_zero_and_ninety() {
        let (right, front) = frame(0.0);
        assert_eq!(right, Vec2::new(1.0, 0.0));
        assert_eq!(front, Vec2::new(0.0, 1.0));

        let (right, front) = frame(90.0);
        assert!((right.z + 1.0).abs() < 1e-12);
        assert!((front.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_snap_heading() {
        assert_eq!(snap_heading(Vec2::new(0.0, 1.0)), Some(0.0));
        assert_eq!(snap_heading(Vec2::new(1.0, 0.1)), Some(90.0));
        assert_eq!(snap_heading(Vec2::new(-1.0, -1.0)), Some(-135.0));
        assert_eq!(snap_heading(Vec2::ZERO), None);
    }

    #[test]
    fn test_wall_slots() {
        let r = room();
        assert_eq!(WallId::Back.slot_point(&r, WallSlot::Left), Vec2::new(1.0, 0.0));
        assert_eq!(WallId::Front.slot_point(&r, WallSlot::Left), Vec2::new(4.0, 4.0));
        assert_eq!(WallId::Left.slot_point(&r, WallSlot::Right).z, 0.8);
        assert_eq!(WallId::Right.slot_point(&r, WallSlot::Middle), Vec2::new(5.0, 2.0));
    }

    #[test]
    fn test_mounted_entities_face_into_room() {
        for wall in [WallId::Left, WallId::Right, WallId::Front, WallId::Back] {
            let (_, front) = frame(wall.mount_rotation());
            let n = wall.inward_normal();
            assert!((front.dot(n) - 1.0).abs() < 1e-9, "{} mount faces outwards", wall);
        }
    }

    #[test]
    fn test_facing_opposite_wall_matches_mount() {
        for wall in [WallId::Left, WallId::Right, WallId::Front, WallId::Back] {
            let a = wall.opposite().facing_angle().rem_euclid(360.0);
            assert_eq!(a, wall.mount_rotation());
        }
    }
}
