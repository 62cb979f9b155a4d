//! Pairwise corrections
//!
//! A [`CorrectionComputer`] looks at two bodies (entities or synthetic
//! volumes), measures how far a constraint between them is violated and
//! routes the fix through [`AnchorSelector`] to pick who moves and where.

use crate::geometry::{truncate_centi, Aabb, Direction, Vec2, Vec3, EPSILON};
use crate::scene::Scene;

use super::config::SolverConfig;
use super::weighting::{AnchorSelector, Side};

/// A displacement to accumulate on one anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub anchor: usize,
    pub direction: Direction,
    pub magnitude: f64,
}

impl Correction {
    pub fn delta(&self) -> Vec3 {
        self.direction.unit3() * self.magnitude
    }
}

/// Something a correction is measured against
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Body {
    Entity(usize),
    /// A fixed volume such as a clearance zone
    Volume(Aabb),
}

impl Body {
    fn bounds(&self, scene: &Scene) -> Aabb {
        match self {
            Body::Entity(i) => scene.entities()[*i].aabb(),
            Body::Volume(b) => b.quantized(),
        }
    }

    fn entity(&self) -> Option<usize> {
        match self {
            Body::Entity(i) => Some(*i),
            Body::Volume(_) => None,
        }
    }
}

/// How far, and which way, a pair has to move.
///
/// `x` and `z` are the distances needed along each axis; `push` holds the
/// preferred unit direction for the first and second body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub x: f64,
    pub z: f64,
    pub push: [Vec2; 2],
}

impl Adjustment {
    fn uniform(amount: f64, push: Vec2) -> Self {
        Self {
            x: amount,
            z: amount,
            push: [push, -push],
        }
    }

    fn along(&self, dir: Direction) -> f64 {
        if dir.is_x() {
            self.x
        } else {
            self.z
        }
    }
}

/// Evenly spaced points on a footprint outline.
///
/// Each edge gets a share of `count` proportional to its length; rounding
/// leftovers go to the first edge. Edge endpoints are included.
pub fn sample_boundary(corners: &[Vec2; 4], count: usize) -> Vec<Vec2> {
    let edges: Vec<(Vec2, Vec2)> = (0..4).map(|i| (corners[i], corners[(i + 1) % 4])).collect();
    let lengths: Vec<f64> = edges.iter().map(|(a, b)| a.distance(*b)).collect();
    let perimeter: f64 = lengths.iter().sum();
    if perimeter < EPSILON {
        return vec![corners[0]];
    }

    let mut counts: Vec<i64> = lengths
        .iter()
        .map(|l| (count as f64 * l / perimeter).round() as i64)
        .collect();
    counts[0] += count as i64 - counts.iter().sum::<i64>();

    let mut points = Vec::with_capacity(count);
    for ((start, end), n) in edges.iter().zip(counts) {
        let n = n.max(0) as usize;
        for j in 0..n {
            let t = if n > 1 { j as f64 / (n - 1) as f64 } else { 0.5 };
            points.push(start.lerp(*end, t));
        }
    }
    points
}

/// Measures and routes corrections for one pair of bodies
pub struct CorrectionComputer<'a> {
    scene: &'a Scene,
    config: &'a SolverConfig,
    first: Body,
    second: Body,
    fix_second: bool,
}

impl<'a> CorrectionComputer<'a> {
    pub fn new(scene: &'a Scene, config: &'a SolverConfig, first: Body, second: Body) -> Self {
        Self {
            scene,
            config,
            first,
            second,
            fix_second: false,
        }
    }

    /// Only the first body may be moved
    pub fn fix_second(mut self) -> Self {
        self.fix_second = true;
        self
    }

    fn buffer(&self) -> f64 {
        self.config.buffer
    }

    // ── Raw adjustments ───────────────────────────────────────────

    /// Overlap along x and z plus the buffer, pushing the bodies apart along
    /// the line between their footprint centres.
    ///
    /// `None` when neither axis needs more than the buffer, or when the
    /// centres coincide.
    pub fn overlap_adjustment(&self) -> Option<Adjustment> {
        let a = self.first.bounds(self.scene);
        let b = self.second.bounds(self.scene);
        let buffer = self.buffer();
        let axis = |min1: f64, max1: f64, min2: f64, max2: f64| {
            if max1 >= min2 && min1 <= max2 {
                truncate_centi(((max1 - min2).min(max2 - min1) + buffer).abs())
            } else {
                0.0
            }
        };
        let x = axis(a.min.x, a.max.x, b.min.x, b.max.x);
        let z = axis(a.min.z, a.max.z, b.min.z, b.max.z);
        if x.max(z) < buffer {
            return None;
        }
        let push = (a.center().xz() - b.center().xz()).normalized()?;
        Some(Adjustment {
            x,
            z,
            push: [push, -push],
        })
    }

    /// Penetration past each violated wall plus the buffer, pushing the first
    /// body back into the room.
    pub fn out_of_bounds_adjustment(&self) -> Option<Adjustment> {
        let b = self.first.bounds(self.scene);
        let room = self.scene.room();
        let buffer = self.buffer();
        let (mut x, mut z) = (0.0, 0.0);
        let mut push = Vec2::ZERO;
        if b.min.x < 0.0 {
            x = b.min.x.abs() + buffer;
            push = push + Vec2::new(x, 0.0);
        }
        if b.max.x > room.width {
            x = (b.max.x - room.width).abs() + buffer;
            push = push + Vec2::new(-x, 0.0);
        }
        if b.min.z < 0.0 {
            z = b.min.z.abs() + buffer;
            push = push + Vec2::new(0.0, z);
        }
        if b.max.z > room.depth {
            z = (b.max.z - room.depth).abs() + buffer;
            push = push + Vec2::new(0.0, -z);
        }
        let push = push.normalized()?;
        Some(Adjustment {
            x,
            z,
            push: [push, Vec2::ZERO],
        })
    }

    /// Nearest pair of sampled boundary points: `(distance, on first, on second)`
    pub fn boundary_distance(&self) -> (f64, Vec2, Vec2) {
        let n = self.config.boundary_samples;
        let pts1 = sample_boundary(&self.first.bounds(self.scene).footprint(), n);
        let pts2 = sample_boundary(&self.second.bounds(self.scene).footprint(), n);
        let mut best = (f64::INFINITY, Vec2::ZERO, Vec2::ZERO);
        for p1 in &pts1 {
            for p2 in &pts2 {
                let d = p1.distance(*p2);
                if d < best.0 {
                    best = (d, *p1, *p2);
                }
            }
        }
        best
    }

    /// Unit vector from the second footprint centre to the first
    fn centre_direction(&self) -> Option<Vec2> {
        let a = self.first.bounds(self.scene).center().xz();
        let b = self.second.bounds(self.scene).center().xz();
        (a - b).normalized()
    }

    /// Push the bodies apart when their boundaries are closer than `min`.
    ///
    /// Touching footprints share their nearest points, so the push falls back
    /// to the line between the centres.
    pub fn min_distance_adjustment(&self, min: f64) -> Option<Adjustment> {
        let (current, p1, p2) = self.boundary_distance();
        if current > min {
            return None;
        }
        let amount = truncate_centi(self.config.distance_scale * (min - current + self.buffer()));
        let push = (p1 - p2)
            .normalized()
            .or_else(|| self.centre_direction())?;
        Some(Adjustment::uniform(amount, push))
    }

    /// Pull the bodies together when their boundaries are further than `max`
    pub fn max_distance_adjustment(&self, max: f64) -> Option<Adjustment> {
        let (current, p1, p2) = self.boundary_distance();
        if current < max {
            return None;
        }
        let amount = truncate_centi(self.config.distance_scale * (current - max + self.buffer()));
        let push = (p2 - p1)
            .normalized()
            .or_else(|| self.centre_direction().map(|d| -d))?;
        Some(Adjustment::uniform(amount, push))
    }

    /// Sideways push for `obstructor`, off the line from the viewer (second
    /// body) to the target (first body).
    ///
    /// An obstructor centred on the sight line is pushed along the line's
    /// left normal. `None` only when the viewer and target coincide.
    pub fn visibility_adjustment(&self, obstructor: usize) -> Option<Adjustment> {
        let target = self.first.bounds(self.scene).center().xz();
        let viewer = self.second.bounds(self.scene).center().xz();
        let obstacle = self.scene.entities()[obstructor].aabb().center().xz();
        let line = target - viewer;
        let len2 = line.dot(line);
        if len2 < EPSILON {
            return None;
        }
        let rel = obstacle - viewer;
        let perpendicular = rel - line * (rel.dot(line) / len2);
        let push = perpendicular
            .normalized()
            .or_else(|| Vec2::new(-line.z, line.x).normalized())?;
        Some(Adjustment::uniform(1.0, push))
    }

    // ── Routed corrections ────────────────────────────────────────

    fn collapse(&self, selector: &AnchorSelector<'_>, a: Option<usize>, b: Option<usize>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a != b && selector.graph().same_subtree(a, b),
            _ => false,
        }
    }

    fn route(
        &self,
        selector: &mut AnchorSelector<'_>,
        adj: Adjustment,
        first: Option<usize>,
        second: Option<usize>,
        second_movable: bool,
        magnitude: impl Fn(Direction) -> f64,
    ) -> Option<Correction> {
        let collapse = self.collapse(selector, first, second);
        let mut sides = Vec::with_capacity(2);
        if let Some(a) = first {
            sides.push(Side::new(a, adj.push[0]));
        }
        if let (Some(b), true) = (second, second_movable) {
            sides.push(Side::new(b, adj.push[1]));
        }
        let (anchor, direction) = selector.select(&sides, collapse, (adj.x, adj.z))?;
        Some(Correction {
            anchor,
            direction,
            magnitude: magnitude(direction),
        })
    }

    pub fn overlap_correction(&self, selector: &mut AnchorSelector<'_>) -> Option<Correction> {
        let adj = self.overlap_adjustment()?;
        self.route(
            selector,
            adj,
            self.first.entity(),
            self.second.entity(),
            !self.fix_second,
            |dir| adj.along(dir),
        )
    }

    /// Only the first body is ever moved back into the room
    pub fn out_of_bounds_correction(&self, selector: &mut AnchorSelector<'_>) -> Option<Correction> {
        let adj = self.out_of_bounds_adjustment()?;
        let entity = self.first.entity();
        self.route(selector, adj, entity, entity, false, |dir| adj.along(dir))
    }

    pub fn min_distance_correction(
        &self,
        selector: &mut AnchorSelector<'_>,
        min: f64,
    ) -> Option<Correction> {
        let adj = self.min_distance_adjustment(min)?;
        self.route(
            selector,
            adj,
            self.first.entity(),
            self.second.entity(),
            !self.fix_second,
            |_| adj.x,
        )
    }

    pub fn max_distance_correction(
        &self,
        selector: &mut AnchorSelector<'_>,
        max: f64,
    ) -> Option<Correction> {
        let adj = self.max_distance_adjustment(max)?;
        self.route(
            selector,
            adj,
            self.first.entity(),
            self.second.entity(),
            !self.fix_second,
            |_| adj.x,
        )
    }

    /// Move `obstructor` sideways off the sight line; the viewer stays put
    pub fn visibility_correction(
        &self,
        selector: &mut AnchorSelector<'_>,
        obstructor: usize,
    ) -> Option<Correction> {
        let adj = self.visibility_adjustment(obstructor)?;
        self.route(
            selector,
            adj,
            Some(obstructor),
            self.second.entity(),
            false,
            |_| 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::scene::{AxisTarget, Entity, Height, Room};

    fn scene(boxes: &[(&str, Vec3, Vec3)]) -> Scene {
        let mut s = Scene::new(Room::new(5.0, 5.0, 3.0).unwrap());
        for (name, size, center) in boxes {
            s.add(Entity::cuboid(*name, *size)).unwrap();
            s.place_global(
                name,
                AxisTarget::At(center.x),
                Height::Floor,
                AxisTarget::At(center.z),
                Vec3::ZERO,
                None,
            )
            .unwrap();
        }
        s
    }

    fn unit() -> Vec3 {
        Vec3::new(2.0, 1.0, 2.0)
    }

    #[test]
    fn test_boundary_sampling_counts_and_corners() {
        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(3.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let pts = sample_boundary(&corners, 100);
        assert_eq!(pts.len(), 100);
        for c in corners {
            assert!(pts.contains(&c), "corner {:?} not sampled", c);
        }
        assert_eq!(sample_boundary(&[Vec2::ZERO; 4], 100), vec![Vec2::ZERO]);
    }

    #[test]
    fn test_overlap_adjustment() {
        let s = scene(&[
            ("a", unit(), Vec3::new(1.0, 0.5, 1.0)),
            ("b", unit(), Vec3::new(2.0, 0.5, 2.0)),
        ]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(1));
        let adj = c.overlap_adjustment().unwrap();
        assert_eq!((adj.x, adj.z), (1.2, 1.2));
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert!((adj.push[0] - Vec2::new(-h, -h)).length() < 1e-12);
        assert_eq!(adj.push[1], -adj.push[0]);
    }

    #[test]
    fn test_coincident_centres_give_no_adjustment() {
        let s = scene(&[
            ("a", unit(), Vec3::new(2.0, 0.5, 2.0)),
            ("b", unit(), Vec3::new(2.0, 0.5, 2.0)),
        ]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(1));
        assert_eq!(c.overlap_adjustment(), None);
    }

    #[test]
    fn test_out_of_bounds_adjustment() {
        let s = scene(&[("a", unit(), Vec3::new(0.0, 0.5, 4.5))]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(0));
        let adj = c.out_of_bounds_adjustment().unwrap();
        assert!((adj.x - 1.2).abs() < 1e-9 && (adj.z - 0.7).abs() < 1e-9);
        assert!(adj.push[0].x > 0.0 && adj.push[0].z < 0.0);

        let inside = scene(&[("a", unit(), Vec3::new(2.0, 0.5, 2.0))]);
        let c = CorrectionComputer::new(&inside, &config, Body::Entity(0), Body::Entity(0));
        assert_eq!(c.out_of_bounds_adjustment(), None);
    }

    #[test]
    fn test_distance_adjustments() {
        let s = scene(&[
            ("a", Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.0, 0.5, 2.0)),
            ("b", Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 0.5, 2.0)),
        ]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(1));
        let (d, _, _) = c.boundary_distance();
        assert!((d - 1.0).abs() < 1e-9);

        assert_eq!(c.min_distance_adjustment(0.5), None);
        let near = c.min_distance_adjustment(1.5).unwrap();
        assert_eq!(near.x, 0.56);
        assert!((near.push[0] - Vec2::new(-1.0, 0.0)).length() < 1e-6);

        assert_eq!(c.max_distance_adjustment(1.5), None);
        let far = c.max_distance_adjustment(0.5).unwrap();
        assert_eq!(far.x, 0.56);
        assert!((far.push[0] - Vec2::new(1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_visibility_pushes_sideways() {
        let s = scene(&[
            ("tv", Vec3::new(1.0, 0.6, 0.2), Vec3::new(2.5, 0.3, 0.5)),
            ("sofa", Vec3::new(2.0, 0.8, 0.9), Vec3::new(2.5, 0.4, 4.0)),
            ("plant", Vec3::new(0.4, 1.5, 0.4), Vec3::new(2.7, 0.75, 2.0)),
        ]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(1));
        let adj = c.visibility_adjustment(2).unwrap();
        assert!((adj.push[0] - Vec2::new(1.0, 0.0)).length() < 1e-9);
        assert_eq!(adj.x, 1.0);
    }

    #[test]
    fn test_touching_footprints_are_pushed_apart() {
        let s = scene(&[
            ("desk", Vec3::new(1.0, 1.0, 1.0), Vec3::new(1.5, 0.5, 2.0)),
            ("chair", Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.5, 0.5, 2.0)),
        ]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(1));
        assert_eq!(c.boundary_distance().0, 0.0);

        let near = c.min_distance_adjustment(0.1).unwrap();
        assert!(near.x > 0.0);
        assert!((near.push[0] - Vec2::new(-1.0, 0.0)).length() < 1e-9);
        assert!((near.push[1] - Vec2::new(1.0, 0.0)).length() < 1e-9);

        // a zero maximum is violated by nothing closer than touching
        let far = c.max_distance_adjustment(0.0).unwrap();
        assert!((far.push[0] - Vec2::new(1.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_obstructor_on_the_sight_line_still_moves() {
        let s = scene(&[
            ("tv", Vec3::new(1.0, 0.6, 0.2), Vec3::new(2.5, 0.3, 0.5)),
            ("sofa", Vec3::new(2.0, 0.8, 0.9), Vec3::new(2.5, 0.4, 4.0)),
            ("bookcase", Vec3::new(1.2, 1.8, 0.5), Vec3::new(2.5, 0.9, 2.5)),
        ]);
        let config = SolverConfig::default();
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Entity(1));
        let adj = c.visibility_adjustment(2).unwrap();
        // sofa to tv runs along -z, whose left normal is +x
        assert!((adj.push[0] - Vec2::new(1.0, 0.0)).length() < 1e-9);

        let g = s.graph().unwrap();
        let mut sel = AnchorSelector::new(&s, &g, &config);
        let fix = c.visibility_correction(&mut sel, 2).unwrap();
        assert_eq!(fix.anchor, 2);
        assert_eq!(fix.direction, Direction::PosX);
    }

    #[test]
    fn test_fixed_volume_only_moves_entity() {
        let s = scene(&[("chair", Vec3::new(0.5, 1.0, 0.5), Vec3::new(2.0, 0.5, 2.0))]);
        let config = SolverConfig::default();
        let g = s.graph().unwrap();
        let mut sel = AnchorSelector::new(&s, &g, &config);
        let zone = Aabb::new(Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.1, 2.0, 3.0));
        let c = CorrectionComputer::new(&s, &config, Body::Entity(0), Body::Volume(zone)).fix_second();
        let fix = c.overlap_correction(&mut sel).unwrap();
        assert_eq!(fix.anchor, 0);
        assert_eq!(fix.direction, Direction::PosX);
        assert_eq!(fix.magnitude, 0.55);
    }
}
