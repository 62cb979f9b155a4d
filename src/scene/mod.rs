//! Scene model: the room, its entities and the placement API
//!
//! Entities are positioned through placements (global, relative to another
//! entity, on top of another entity, or on a wall). A placement is kept after
//! it is applied, so moving an entity re-resolves everything placed relative
//! to it and the hierarchy moves rigidly.

pub mod entity;
pub mod graph;
pub mod occupancy;
pub mod placement;
pub mod support;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SceneError;
use crate::geometry::{Aabb, Vec3};

pub use entity::{Category, Entity, Sides};
pub use graph::SceneGraph;
pub use occupancy::{free_space_around, CellRect, OccupancyField, CELLS_PER_METRE};
pub use placement::{
    AxisTarget, FaceTarget, Height, Placement, Relation, VerticalSlot, WallId, WallSlot,
};
pub use support::{SupportPlane, SupportRegions, SupportSlot};

use placement::{relative_center, snap_heading, WALL_GAP, WALL_MOUNT_GAP};

/// Default height of a wall-mounted entity's centre band
const MOUNT_HEIGHT: f64 = 2.0;
/// Headroom kept above a middle-mounted entity in low rooms
const MOUNT_HEADROOM: f64 = 1.5;
/// Gap between a top-mounted entity and the ceiling
const MOUNT_CEILING_GAP: f64 = 0.4;

/// Room extents in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl Room {
    pub fn new(width: f64, depth: f64, height: f64) -> Result<Self, SceneError> {
        for (name, v) in [("width", width), ("depth", depth), ("height", height)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(SceneError::invalid_argument(
                    name,
                    format!("room dimensions must be positive, got {}", v),
                ));
            }
        }
        Ok(Self {
            width,
            depth,
            height,
        })
    }

    pub fn floor_area(&self) -> f64 {
        self.width * self.depth
    }

    pub fn longest_side(&self) -> f64 {
        self.width.max(self.depth)
    }

    /// Whether a box's floor projection lies within `[0, W] x [0, D]`
    pub fn contains_footprint(&self, b: &Aabb) -> bool {
        b.min.x >= 0.0 && b.max.x <= self.width && b.min.z >= 0.0 && b.max.z <= self.depth
    }
}

/// Entities in a room plus the bookkeeping needed to place them
#[derive(Debug, Clone)]
pub struct Scene {
    room: Room,
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
    wall_occupancy: BTreeMap<(WallId, WallSlot), Vec<String>>,
    rng: StdRng,
}

impl Scene {
    pub fn new(room: Room) -> Self {
        Self::with_seed(room, 0)
    }

    /// Scene whose support-slot choices are drawn from a seeded generator
    pub fn with_seed(room: Room, seed: u64) -> Self {
        Self {
            room,
            entities: Vec::new(),
            index: HashMap::new(),
            wall_occupancy: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Index of an entity in [`Scene::entities`]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<&Entity, SceneError> {
        self.index_of(name).map(|i| &self.entities[i])
    }

    /// Entity names recorded per wall slot
    pub fn wall_occupancy(&self) -> &BTreeMap<(WallId, WallSlot), Vec<String>> {
        &self.wall_occupancy
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, SceneError> {
        self.position(name)
            .ok_or_else(|| SceneError::unknown(name, self.index.keys().map(String::as_str)))
    }

    pub fn add(&mut self, entity: Entity) -> Result<(), SceneError> {
        if self.contains(entity.name()) {
            return Err(SceneError::DuplicateEntity {
                name: entity.name().to_string(),
            });
        }
        self.index
            .insert(entity.name().to_string(), self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    /// Remove an entity.
    ///
    /// Placements that use it as their anchor are left untouched, so the next
    /// [`Scene::graph`] reports them as dangling.
    pub fn remove(&mut self, name: &str) -> Result<Entity, SceneError> {
        let idx = self.index_of(name)?;
        self.detach(idx);
        let entity = self.entities.remove(idx);
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name().to_string(), i))
            .collect();
        Ok(entity)
    }

    /// Current placement hierarchy
    pub fn graph(&self) -> Result<SceneGraph, SceneError> {
        SceneGraph::build(self)
    }

    /// Hierarchy of a scene that is ready to be solved: every entity placed,
    /// every anchor resolvable, no cycles.
    pub fn validate(&self) -> Result<SceneGraph, SceneError> {
        let graph = self.graph()?;
        if let Some(e) = self.entities.iter().find(|e| !e.is_placed()) {
            return Err(SceneError::NotPlaced {
                name: e.name().to_string(),
            });
        }
        Ok(graph)
    }

    // ── Placement API ─────────────────────────────────────────────

    /// Place an entity in room coordinates.
    ///
    /// Wall targets keep the entity half its size plus `|delta|` and a small
    /// gap away from the wall and, unless `face` says otherwise, turn it to
    /// face away from that wall.
    pub fn place_global(
        &mut self,
        name: &str,
        x: AxisTarget,
        y: Height,
        z: AxisTarget,
        delta: Vec3,
        face: Option<FaceTarget>,
    ) -> Result<(), SceneError> {
        let idx = self.index_of(name)?;
        if let AxisTarget::Wall(w) = x {
            if !w.is_x_wall() {
                return Err(SceneError::invalid_argument(
                    "x",
                    format!("{} does not bound the x axis", w),
                ));
            }
        }
        if let AxisTarget::Wall(w) = z {
            if w.is_x_wall() {
                return Err(SceneError::invalid_argument(
                    "z",
                    format!("{} does not bound the z axis", w),
                ));
            }
        }
        if let Some(FaceTarget::Entity(target)) = &face {
            self.index_of(target)?;
        }

        self.detach(idx);
        let room = self.room;
        let delta = Vec3::new(delta.x.abs(), delta.y.abs(), delta.z.abs());
        let entity = &mut self.entities[idx];

        let turn_to = match (&face, x, z) {
            (Some(FaceTarget::Wall(w)), _, _) => Some(*w),
            (None, AxisTarget::Wall(w), _) | (None, _, AxisTarget::Wall(w)) => Some(w.opposite()),
            _ => None,
        };
        if let Some(w) = turn_to {
            entity.set_rotation(w.facing_angle());
            entity.rotation_set = true;
        }

        let size = entity.local_bounds().size();
        let cx = match x {
            AxisTarget::At(v) => v,
            AxisTarget::Center => room.width / 2.0 + delta.x,
            AxisTarget::Wall(WallId::Left) => size.x / 2.0 + delta.x + WALL_GAP,
            AxisTarget::Wall(_) => room.width - size.x / 2.0 - delta.x - WALL_GAP,
        };
        let cz = match z {
            AxisTarget::At(v) => v,
            AxisTarget::Center => room.depth / 2.0 + delta.z,
            AxisTarget::Wall(WallId::Back) => size.z / 2.0 + delta.z + WALL_GAP,
            AxisTarget::Wall(_) => room.depth - size.z / 2.0 - delta.z - WALL_GAP,
        };
        let cy = match y {
            Height::Floor => {
                entity.on_floor = true;
                size.y / 2.0 + delta.y
            }
            Height::Ceiling => room.height - size.y / 2.0 - delta.y,
            Height::At(v) => v,
        };

        let center = Vec3::new(cx, cy, cz);
        entity.placement = Placement::Global { center };
        entity.base = center;
        entity.offset = Vec3::ZERO;
        debug!(entity = name, ?center, "placed globally");

        if let Some(target) = face.as_ref().filter(|f| !matches!(f, FaceTarget::Wall(_))) {
            self.apply_facing(idx, target)?;
        }
        self.cascade(idx)
    }

    /// Place an entity next to `anchor`, in the anchor's frame.
    ///
    /// `dist` is the gap between the two footprints and `shift` slides the
    /// entity sideways along the anchor's other axis.
    pub fn place_relative(
        &mut self,
        name: &str,
        relation: Relation,
        anchor: &str,
        dist: f64,
        shift: f64,
    ) -> Result<(), SceneError> {
        if relation == Relation::OnTopOf {
            return self.place_on_top_of(name, anchor);
        }
        let idx = self.index_of(name)?;
        let a = self.index_of(anchor)?;
        self.check_no_cycle(idx, a)?;

        self.detach(idx);
        let entity = &mut self.entities[idx];
        entity.placement = Placement::Relative {
            relation,
            anchor: anchor.to_string(),
            dist,
            shift,
        };
        entity.offset = Vec3::ZERO;
        entity.on_floor = true;
        self.resolve(idx)?;
        debug!(entity = name, %relation, anchor, center = ?self.entities[idx].center(), "placed relative");
        self.cascade(idx)
    }

    /// Rest an entity on `anchor`'s support surfaces.
    ///
    /// All entities already on the anchor are re-arranged together. The
    /// entity is exempted from collision handling.
    pub fn place_on_top_of(&mut self, name: &str, anchor: &str) -> Result<(), SceneError> {
        let idx = self.index_of(name)?;
        let a = self.index_of(anchor)?;
        self.check_no_cycle(idx, a)?;

        self.detach(idx);
        let entity = &mut self.entities[idx];
        entity.placement = Placement::OnTopOf {
            anchor: anchor.to_string(),
            slot: Vec3::ZERO,
        };
        entity.offset = Vec3::ZERO;
        entity.ignore_overlap = true;
        entity.on_floor = false;

        if !self.entities[a].supports(name) {
            self.entities[a].supported.push(name.to_string());
        }
        self.arrange_supported(a)
    }

    /// Hang an entity on a wall, facing into the room
    pub fn place_on_wall(
        &mut self,
        name: &str,
        wall: WallId,
        slot: WallSlot,
        vertical: VerticalSlot,
    ) -> Result<(), SceneError> {
        let idx = self.index_of(name)?;
        self.detach(idx);
        let room = self.room;
        let entity = &mut self.entities[idx];
        entity.placed_on_wall = true;
        entity.set_rotation(wall.mount_rotation());
        entity.rotation_set = true;

        let size = entity.local_bounds().size();
        let y = match vertical {
            VerticalSlot::Middle => (room.height - MOUNT_HEADROOM).min(MOUNT_HEIGHT) + size.y / 2.0,
            VerticalSlot::Top => room.height - size.y / 2.0 - MOUNT_CEILING_GAP,
            VerticalSlot::Bottom => {
                entity.on_floor = true;
                size.y / 2.0
            }
        };
        let along = wall.slot_point(&room, slot);
        let center = (along + wall.inward_normal() * (entity.dims().z / 2.0 + WALL_MOUNT_GAP))
            .at_height(y);
        entity.placement = Placement::OnWall {
            wall,
            slot,
            vertical,
            center,
        };
        entity.base = center;
        entity.offset = Vec3::ZERO;

        self.wall_occupancy
            .entry((wall, slot))
            .or_default()
            .push(name.to_string());
        debug!(entity = name, %wall, ?slot, ?center, "placed on wall");
        self.cascade(idx)
    }

    /// Turn an entity towards a wall, another entity or a point.
    ///
    /// Facing an entity never makes it an anchor.
    pub fn face_towards(&mut self, name: &str, target: FaceTarget) -> Result<(), SceneError> {
        let idx = self.index_of(name)?;
        self.apply_facing(idx, &target)?;
        self.cascade(idx)
    }

    /// Set the rotation about the vertical axis, in degrees
    pub fn set_rotation(&mut self, name: &str, degrees: f64) -> Result<(), SceneError> {
        let idx = self.index_of(name)?;
        let entity = &mut self.entities[idx];
        entity.set_rotation(degrees);
        entity.rotation_set = true;
        self.cascade(idx)
    }

    /// Translate an entity; everything placed relative to it follows
    pub fn displace(&mut self, name: &str, delta: Vec3) -> Result<(), SceneError> {
        let idx = self.index_of(name)?;
        self.displace_at(idx, delta)
    }

    pub(crate) fn displace_at(&mut self, idx: usize, delta: Vec3) -> Result<(), SceneError> {
        self.entities[idx].offset += delta;
        self.cascade(idx)
    }

    // ── Resolution ────────────────────────────────────────────────

    /// Forget placement-specific state before an entity is placed again
    fn detach(&mut self, idx: usize) {
        let name = self.entities[idx].name().to_string();
        for other in &mut self.entities {
            other.supported.retain(|s| *s != name);
        }
        for names in self.wall_occupancy.values_mut() {
            names.retain(|s| *s != name);
        }
        self.wall_occupancy.retain(|_, names| !names.is_empty());

        let entity = &mut self.entities[idx];
        entity.on_floor = false;
        entity.placed_on_wall = false;
        entity.ignore_overlap = entity.category().ignores_overlap();
    }

    /// Reject an anchor whose own anchor chain leads back to `child`
    fn check_no_cycle(&self, child: usize, anchor: usize) -> Result<(), SceneError> {
        let mut path = vec![child];
        let mut cur = Some(anchor);
        while let Some(node) = cur {
            path.push(node);
            if node == child {
                let names = path
                    .iter()
                    .map(|&n| self.entities[n].name().to_string())
                    .collect();
                return Err(SceneError::cycle(names));
            }
            if path.len() > self.entities.len() + 1 {
                break;
            }
            cur = self.entities[node]
                .placement
                .anchor()
                .and_then(|a| self.position(a));
        }
        Ok(())
    }

    fn children_of(&self, idx: usize) -> Vec<usize> {
        let name = self.entities[idx].name();
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.placement.anchor() == Some(name))
            .map(|(i, _)| i)
            .collect()
    }

    fn anchor_index(&self, idx: usize, anchor: &str) -> Result<usize, SceneError> {
        self.position(anchor)
            .ok_or_else(|| SceneError::dangling(self.entities[idx].name(), anchor))
    }

    fn inherit_rotation(&mut self, idx: usize, anchor: usize) {
        if !self.entities[idx].rotation_set {
            let r = self.entities[anchor].rotation();
            self.entities[idx].set_rotation(r);
        }
    }

    /// Recompute an entity's base position from its placement
    fn resolve(&mut self, idx: usize) -> Result<(), SceneError> {
        let base = match self.entities[idx].placement.clone() {
            Placement::Unplaced => return Ok(()),
            Placement::Global { center } | Placement::OnWall { center, .. } => center,
            Placement::Relative {
                relation,
                anchor,
                dist,
                shift,
            } => {
                let a = self.anchor_index(idx, &anchor)?;
                self.inherit_rotation(idx, a);
                relative_center(relation, &self.entities[a], &self.entities[idx], dist, shift)?
            }
            Placement::OnTopOf { anchor, slot } => {
                let a = self.anchor_index(idx, &anchor)?;
                self.inherit_rotation(idx, a);
                self.entities[a].center() + slot
            }
        };
        self.entities[idx].base = base;
        Ok(())
    }

    /// Re-resolve every entity below `root`, breadth first
    fn cascade(&mut self, root: usize) -> Result<(), SceneError> {
        let mut visited = HashSet::from([root]);
        let mut via: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            if node != root {
                self.resolve(node)?;
            }
            for child in self.children_of(node) {
                if !visited.insert(child) {
                    let mut cycle = vec![child, node];
                    let mut cur = node;
                    while let Some(&p) = via.get(&cur) {
                        cycle.push(p);
                        cur = p;
                    }
                    cycle.reverse();
                    let names = cycle
                        .iter()
                        .map(|&n| self.entities[n].name().to_string())
                        .collect();
                    return Err(SceneError::cycle(names));
                }
                via.insert(child, node);
                queue.push_back(child);
            }
        }
        Ok(())
    }

    /// Assign every entity resting on `anchor` a slot on its support surfaces
    fn arrange_supported(&mut self, anchor: usize) -> Result<(), SceneError> {
        let children: Vec<usize> = self.entities[anchor]
            .supported
            .iter()
            .filter_map(|n| self.position(n))
            .collect();
        if children.is_empty() {
            return Ok(());
        }
        for &c in &children {
            self.inherit_rotation(c, anchor);
        }

        let (w, d) = children.iter().fold((0.0_f64, 0.0_f64), |(w, d), &c| {
            let s = self.entities[c].local_bounds().size();
            (w.max(s.x), d.max(s.z))
        });
        let anchor_center = self.entities[anchor].center();
        let mesh = self.entities[anchor].world_mesh();
        let regions = SupportRegions::new(&mesh, &mut self.rng);
        let locations = regions.locations_on_top(w, d, &mut self.rng);

        let slots: Vec<Vec3> = if locations.len() >= children.len() {
            children
                .iter()
                .zip(&locations)
                .map(|(&c, loc)| {
                    let h = self.entities[c].local_bounds().size().y;
                    Vec3::new(loc.x, loc.y + h / 2.0, loc.z) - anchor_center
                })
                .collect()
        } else {
            warn!(
                anchor = self.entities[anchor].name(),
                children = children.len(),
                slots = locations.len(),
                "no usable support surface, spreading children along the anchor"
            );
            self.naive_slots(anchor, &children)
        };

        for (&c, slot) in children.iter().zip(slots) {
            if let Placement::OnTopOf { slot: s, .. } = &mut self.entities[c].placement {
                *s = slot;
            }
            self.resolve(c)?;
            self.cascade(c)?;
        }
        Ok(())
    }

    /// Spread children evenly between the midpoints of the anchor's left and
    /// right sides, resting on its top.
    fn naive_slots(&self, anchor: usize, children: &[usize]) -> Vec<Vec3> {
        let a = &self.entities[anchor];
        let sides = a.sides();
        let (left, right) = (sides.left.midpoint(), sides.right.midpoint());
        let top = a.aabb().max.y;
        let center = a.center();
        let n = children.len() as f64;
        children
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let t = (i as f64 + 1.0) / (n + 1.0);
                let h = self.entities[c].local_bounds().size().y;
                left.lerp(right, t).at_height(top + h / 2.0) - center
            })
            .collect()
    }

    fn apply_facing(&mut self, idx: usize, target: &FaceTarget) -> Result<(), SceneError> {
        let here = self.entities[idx].center().xz();
        let angle = match target {
            FaceTarget::Wall(w) => Some(w.facing_angle()),
            FaceTarget::Entity(other) => {
                let o = self.index_of(other)?;
                snap_heading(self.entities[o].center().xz() - here)
            }
            FaceTarget::Point(p) => snap_heading(*p - here),
        };
        match angle {
            Some(angle) => {
                let entity = &mut self.entities[idx];
                entity.set_rotation(angle);
                entity.rotation_set = true;
            }
            None => debug!(
                entity = self.entities[idx].name(),
                "facing target coincides with entity, rotation unchanged"
            ),
        }
        Ok(())
    }
}
