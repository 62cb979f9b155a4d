//! Post-solve diagnostics.
//!
//! Runs after relaxation to report what the solver could not fix, or what
//! it was never asked to: remaining overlaps and escapes, crowded wall
//! slots, implausible room occupancy and entities facing the wrong way.

use std::fmt;

use crate::error::SceneError;
use crate::scene::Scene;

/// Occupancy ratio below which the room is reported as too large
pub const MIN_OCCUPANCY: f64 = 0.3;

/// Occupancy ratio above which the room is reported as too small
pub const MAX_OCCUPANCY: f64 = 0.5;

/// Smallest `front · direction` for an entity to count as facing a target
const FACING_TOLERANCE: f64 = 0.5;

/// A lint warning about a scene defect
#[derive(Debug, Clone, PartialEq)]
pub struct LintWarning {
    pub category: LintCategory,
    pub message: String,
}

impl LintWarning {
    fn new(category: LintCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Category of lint defect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintCategory {
    Overlap,
    OutOfBounds,
    WallSlot,
    Occupancy,
    Orientation,
}

impl fmt::Display for LintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintCategory::Overlap => write!(f, "overlap"),
            LintCategory::OutOfBounds => write!(f, "out-of-bounds"),
            LintCategory::WallSlot => write!(f, "wall-slot"),
            LintCategory::Occupancy => write!(f, "occupancy"),
            LintCategory::Orientation => write!(f, "orientation"),
        }
    }
}

/// Run all scene-wide checks.
pub fn check(scene: &Scene) -> Vec<LintWarning> {
    let mut warnings = Vec::new();
    check_overlaps(scene, &mut warnings);
    check_bounds(scene, &mut warnings);
    check_wall_slots(scene, &mut warnings);
    check_occupancy(scene, &mut warnings);
    warnings
}

fn check_overlaps(scene: &Scene, warnings: &mut Vec<LintWarning>) {
    let entities = scene.entities();
    for (i, a) in entities.iter().enumerate() {
        for b in &entities[i + 1..] {
            if !a.is_solid() || !b.is_solid() || a.supports(b.name()) || b.supports(a.name()) {
                continue;
            }
            let (ba, bb) = (a.aabb(), b.aabb());
            if ba.intersects(&bb) {
                warnings.push(LintWarning::new(
                    LintCategory::Overlap,
                    format!(
                        "\"{}\" and \"{}\" overlap by {:.3} m³",
                        a.name(),
                        b.name(),
                        ba.intersection_volume(&bb)
                    ),
                ));
            }
        }
    }
}

fn check_bounds(scene: &Scene, warnings: &mut Vec<LintWarning>) {
    let room = scene.room();
    for e in scene.entities().iter().filter(|e| e.is_movable()) {
        if !room.contains_footprint(&e.aabb()) {
            warnings.push(LintWarning::new(
                LintCategory::OutOfBounds,
                format!(
                    "\"{}\" extends outside the {}x{} room",
                    e.name(),
                    room.width,
                    room.depth
                ),
            ));
        }
    }
}

fn check_wall_slots(scene: &Scene, warnings: &mut Vec<LintWarning>) {
    for ((wall, slot), names) in scene.wall_occupancy() {
        if names.len() > 1 {
            warnings.push(LintWarning::new(
                LintCategory::WallSlot,
                format!(
                    "{} entities share the {:?} slot of the {} wall: {}",
                    names.len(),
                    slot,
                    wall,
                    names.join(", ")
                ),
            ));
        }
    }
}

/// Share of the floor covered by solid floor entities
pub fn occupancy_ratio(scene: &Scene) -> f64 {
    let covered: f64 = scene
        .entities()
        .iter()
        .filter(|e| e.is_solid())
        .map(|e| e.floor_area())
        .sum();
    covered / scene.room().floor_area()
}

fn check_occupancy(scene: &Scene, warnings: &mut Vec<LintWarning>) {
    if !scene.entities().iter().any(|e| e.is_solid()) {
        return;
    }
    let ratio = occupancy_ratio(scene);
    let verdict = if ratio < MIN_OCCUPANCY {
        "room too large"
    } else if ratio > MAX_OCCUPANCY {
        "room too small"
    } else {
        return;
    };
    warnings.push(LintWarning::new(
        LintCategory::Occupancy,
        format!("{}: furniture covers {:.0}% of the floor", verdict, ratio * 100.0),
    ));
}

/// Alignment of `entity`'s front with the direction to `target`; `None`
/// when their centres coincide.
fn facing_alignment(scene: &Scene, entity: &str, target: &str) -> Result<Option<f64>, SceneError> {
    let e = scene.get(entity)?;
    let t = scene.get(target)?;
    let (_, front) = e.frame();
    Ok((t.center().xz() - e.center().xz())
        .normalized()
        .map(|dir| front.dot(dir)))
}

/// Flag `entity` unless it roughly faces `target`.
pub fn check_facing(scene: &Scene, entity: &str, target: &str) -> Result<Vec<LintWarning>, SceneError> {
    let mut warnings = Vec::new();
    if let Some(alignment) = facing_alignment(scene, entity, target)? {
        if alignment < FACING_TOLERANCE {
            warnings.push(LintWarning::new(
                LintCategory::Orientation,
                format!(
                    "\"{}\" does not face \"{}\" (alignment {:.2})",
                    entity, target, alignment
                ),
            ));
        }
    }
    Ok(warnings)
}

/// Flag every member of a seating group that turns away from another member.
pub fn check_conversation(scene: &Scene, names: &[&str]) -> Result<Vec<LintWarning>, SceneError> {
    let mut warnings = Vec::new();
    for a in names {
        for b in names.iter().filter(|b| *b != a) {
            if let Some(alignment) = facing_alignment(scene, a, b)? {
                if alignment < 0.0 {
                    warnings.push(LintWarning::new(
                        LintCategory::Orientation,
                        format!("\"{}\" turns its back on \"{}\"", a, b),
                    ));
                }
            }
        }
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::geometry::Vec3;
    use crate::scene::{AxisTarget, Entity, Height, Room, VerticalSlot, WallId, WallSlot};

    fn place(s: &mut Scene, name: &str, size: Vec3, x: f64, z: f64) {
        s.add(Entity::cuboid(name, size)).unwrap();
        s.place_global(
            name,
            AxisTarget::At(x),
            Height::Floor,
            AxisTarget::At(z),
            Vec3::ZERO,
            None,
        )
        .unwrap();
    }

    #[test]
    fn test_overlap_and_bounds() {
        let mut s = Scene::new(Room::new(4.0, 4.0, 3.0).unwrap());
        place(&mut s, "a", Vec3::new(2.0, 1.0, 2.0), 1.0, 1.0);
        place(&mut s, "b", Vec3::new(2.0, 1.0, 2.0), 2.0, 2.0);
        place(&mut s, "c", Vec3::new(1.0, 1.0, 1.0), 3.8, 3.0);
        let categories: Vec<LintCategory> = check(&s).into_iter().map(|w| w.category).collect();
        assert_eq!(
            categories,
            vec![LintCategory::Overlap, LintCategory::OutOfBounds, LintCategory::Occupancy]
        );
    }

    #[test]
    fn test_occupancy_band() {
        let mut s = Scene::new(Room::new(4.0, 4.0, 3.0).unwrap());
        place(&mut s, "bed", Vec3::new(2.0, 0.5, 3.0), 1.0, 2.0);
        assert!((occupancy_ratio(&s) - 0.375).abs() < 1e-9);
        assert!(check(&s).is_empty());

        place(&mut s, "desk", Vec3::new(1.0, 0.8, 2.4), 3.5, 1.5);
        let warnings = check(&s);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("room too small"));
    }

    #[test]
    fn test_shared_wall_slot() {
        let mut s = Scene::new(Room::new(5.0, 5.0, 3.0).unwrap());
        for name in ["clock", "mirror"] {
            s.add(Entity::cuboid(name, Vec3::new(0.4, 0.4, 0.05))).unwrap();
            s.place_on_wall(name, WallId::Back, WallSlot::Middle, VerticalSlot::Middle)
                .unwrap();
        }
        let warnings = check(&s);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].category, LintCategory::WallSlot);
        assert!(warnings[0].message.ends_with("clock, mirror"));
    }

    #[test]
    fn test_facing_and_conversation() {
        let mut s = Scene::new(Room::new(6.0, 6.0, 3.0).unwrap());
        place(&mut s, "tv", Vec3::new(1.0, 0.6, 0.2), 3.0, 5.0);
        place(&mut s, "sofa", Vec3::new(2.0, 0.8, 0.9), 3.0, 1.0);
        place(&mut s, "armchair", Vec3::new(0.8, 0.8, 0.8), 1.0, 3.0);

        // unrotated entities face +z, which is where the tv is
        assert!(check_facing(&s, "sofa", "tv").unwrap().is_empty());
        assert_eq!(check_facing(&s, "armchair", "tv").unwrap().len(), 0);
        s.set_rotation("sofa", 180.0).unwrap();
        let warnings = check_facing(&s, "sofa", "tv").unwrap();
        assert_eq!(warnings[0].category, LintCategory::Orientation);

        s.set_rotation("armchair", 135.0).unwrap();
        let warnings = check_conversation(&s, &["sofa", "armchair"]).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].to_string(), "[orientation] \"sofa\" turns its back on \"armchair\"");
        assert!(check_facing(&s, "sofa", "lamp").is_err());
    }
}
