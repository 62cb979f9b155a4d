//! Relaxation loop
//!
//! Each iteration clears the pending displacement of every eligible entity,
//! evaluates all constraints against the positions at the start of the
//! iteration, then applies `learning_rate * pending` to every entity at once.
//! The loop stops when no entity moves by more than the convergence
//! threshold along any axis.
//!
//! The pairwise overlap checks and the per-entity ray counts run on the
//! rayon pool against the same `&Scene`. Their corrections are collected in
//! index order and folded into the pending displacements serially, so the
//! outcome does not depend on the number of threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::geometry::Vec3;
use crate::scene::{Scene, SceneGraph};

use super::config::SolverConfig;
use super::constraints::{clearance_zones, ClearanceSide, Constraint};
use super::correction::{Body, Correction, CorrectionComputer};
use super::error::SolverError;
use super::ledger::DisplacementLedger;
use super::weighting::AnchorSelector;

/// Result of [`Relaxer::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxOutcome {
    /// `false` when the iteration budget ran out first
    pub converged: bool,
    pub iterations: usize,
    pub ledger: DisplacementLedger,
}

/// Pending displacement per entity; `None` for entities that never move
#[derive(Debug, Clone, Default)]
struct Gradients(Vec<Option<Vec3>>);

impl Gradients {
    fn add(&mut self, scene: &Scene, kind: &str, correction: Correction, weight: f64) {
        let name = scene.entities()[correction.anchor].name();
        match self.0.get_mut(correction.anchor) {
            Some(Some(grad)) => {
                *grad += correction.delta() * weight;
                trace!(
                    constraint = kind,
                    anchor = name,
                    direction = %correction.direction,
                    magnitude = correction.magnitude,
                    "correction"
                );
            }
            _ => trace!(constraint = kind, anchor = name, "correction on a fixed entity dropped"),
        }
    }
}

/// Drives the constraint checks and applies their corrections
pub struct Relaxer {
    config: SolverConfig,
    grads: Gradients,
    ledger: DisplacementLedger,
    sampler: StdRng,
}

impl Relaxer {
    pub fn new(scene: &Scene, config: SolverConfig) -> Result<Self, SolverError> {
        config.validate()?;
        let ledger = DisplacementLedger::new(scene.entities().iter().map(|e| e.name()));
        let sampler = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            grads: Gradients::default(),
            ledger,
            sampler,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn ledger(&self) -> &DisplacementLedger {
        &self.ledger
    }

    /// Clear pending displacements; only floor entities not hung on a wall
    /// can receive one.
    pub fn init_grads(&mut self, scene: &Scene) {
        self.grads = Gradients(
            scene
                .entities()
                .iter()
                .map(|e| e.is_movable().then_some(Vec3::ZERO))
                .collect(),
        );
    }

    /// Separate every intersecting pair of solid floor entities
    pub fn no_overlaps(&mut self, scene: &Scene, graph: &SceneGraph) {
        let entities = scene.entities();
        let n = entities.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();
        let config = &self.config;
        let corrections: Vec<Correction> = pairs
            .par_iter()
            .filter(|&&(i, j)| {
                let (a, b) = (&entities[i], &entities[j]);
                !a.supports(b.name())
                    && !b.supports(a.name())
                    && a.is_solid()
                    && b.is_solid()
                    && a.aabb().intersects(&b.aabb())
            })
            .map_init(
                || AnchorSelector::new(scene, graph, config),
                |selector, &(i, j)| {
                    CorrectionComputer::new(scene, config, Body::Entity(i), Body::Entity(j))
                        .overlap_correction(selector)
                },
            )
            .flatten()
            .collect();

        let weight = self.config.weights.overlap;
        for c in corrections {
            self.grads.add(scene, "no_overlap", c, weight);
        }
    }

    /// Pull every floor entity back inside the room
    pub fn no_out_of_bounds(&mut self, scene: &Scene, graph: &SceneGraph) {
        let mut selector = AnchorSelector::new(scene, graph, &self.config);
        for (i, entity) in scene.entities().iter().enumerate() {
            if !entity.is_movable() || scene.room().contains_footprint(&entity.aabb()) {
                continue;
            }
            let computer =
                CorrectionComputer::new(scene, &self.config, Body::Entity(i), Body::Entity(i));
            if let Some(c) = computer.out_of_bounds_correction(&mut selector) {
                self.grads
                    .add(scene, "no_out_of_bounds", c, self.config.weights.out_of_bounds);
            }
        }
    }

    /// Keep the boundary distance between two entities within `[min, max]`
    pub fn access(
        &mut self,
        scene: &Scene,
        graph: &SceneGraph,
        first: &str,
        second: &str,
        min: f64,
        max: f64,
    ) -> Result<(), SolverError> {
        let a = scene.index_of(first)?;
        let b = scene.index_of(second)?;
        let mut selector = AnchorSelector::new(scene, graph, &self.config);
        let computer = CorrectionComputer::new(scene, &self.config, Body::Entity(a), Body::Entity(b));
        let weight = self.config.weights.access;
        if let Some(c) = computer.min_distance_correction(&mut selector, min) {
            self.grads.add(scene, "access", c, weight);
        }
        if let Some(c) = computer.max_distance_correction(&mut selector, max) {
            self.grads.add(scene, "access", c, weight);
        }
        Ok(())
    }

    /// Push solid entities out of the zone in front of, or beside, `entity`.
    ///
    /// The zone itself never moves. The entity, whatever rests on it and the
    /// `omit` list are exempt.
    pub fn clearance(
        &mut self,
        scene: &Scene,
        graph: &SceneGraph,
        entity: &str,
        side: ClearanceSide,
        distance: f64,
        omit: &[String],
    ) -> Result<(), SolverError> {
        let idx = scene.index_of(entity)?;
        let owner = &scene.entities()[idx];
        let zones = clearance_zones(owner, side, distance, self.config.clearance_height);
        let mut selector = AnchorSelector::new(scene, graph, &self.config);
        for zone in zones {
            for (i, other) in scene.entities().iter().enumerate() {
                if i == idx
                    || owner.supports(other.name())
                    || omit.iter().any(|n| n == other.name())
                    || !other.is_solid()
                    || !other.aabb().intersects(&zone)
                {
                    continue;
                }
                let computer =
                    CorrectionComputer::new(scene, &self.config, Body::Entity(i), Body::Volume(zone))
                        .fix_second();
                if let Some(c) = computer.overlap_correction(&mut selector) {
                    self.grads
                        .add(scene, "clearance", c, self.config.weights.clearance);
                }
            }
        }
        Ok(())
    }

    /// Entities blocking more than the threshold share of sight lines from
    /// the viewer's eye to points sampled in the target's bounding box.
    pub fn obstructors(&mut self, scene: &Scene, target: usize, viewer: usize) -> Vec<usize> {
        let entities = scene.entities();
        let (t, v) = (&entities[target], &entities[viewer]);
        let bounds = t.aabb();
        let mut eye = v.center();
        eye.y = self.config.eye_height;

        let count = self.config.visibility_samples;
        if count == 0 {
            return Vec::new();
        }
        let mut rays = Vec::with_capacity(count);
        for _ in 0..count {
            let mut coord = |lo: f64, hi: f64| lo + (hi - lo) * self.sampler.gen::<f64>();
            let sample = Vec3::new(
                coord(bounds.min.x, bounds.max.x),
                coord(bounds.min.y, bounds.max.y),
                coord(bounds.min.z, bounds.max.z),
            );
            let offset = sample - eye;
            if let Some(dir) = offset.normalized() {
                rays.push((dir, offset.length()));
            }
        }

        let candidates: Vec<usize> = entities
            .iter()
            .enumerate()
            .filter(|(i, e)| {
                *i != target
                    && *i != viewer
                    && !t.supports(e.name())
                    && !v.supports(e.name())
                    && e.is_solid()
            })
            .map(|(i, _)| i)
            .collect();
        let counts: Vec<(usize, usize)> = candidates
            .par_iter()
            .map(|&i| {
                let mesh = entities[i].world_mesh();
                let blocked = rays
                    .iter()
                    .filter(|(dir, dist)| mesh.ray_intersect(eye, *dir).is_some_and(|hit| hit < *dist))
                    .count();
                (i, blocked)
            })
            .collect();

        let mut blocking = Vec::new();
        for (i, blocked) in counts {
            let share = blocked as f64 / count as f64;
            if share > self.config.visibility_threshold {
                debug!(obstructor = entities[i].name(), target = t.name(), viewer = v.name(), share, "sight line blocked");
                blocking.push(i);
            }
        }
        blocking
    }

    /// Move whatever blocks the view of `target` from `viewer` sideways
    pub fn visible(
        &mut self,
        scene: &Scene,
        graph: &SceneGraph,
        target: &str,
        viewer: &str,
    ) -> Result<(), SolverError> {
        let t = scene.index_of(target)?;
        let v = scene.index_of(viewer)?;
        let obstructors = self.obstructors(scene, t, v);
        let mut selector = AnchorSelector::new(scene, graph, &self.config);
        let computer = CorrectionComputer::new(scene, &self.config, Body::Entity(t), Body::Entity(v));
        for o in obstructors {
            if let Some(c) = computer.visibility_correction(&mut selector, o) {
                self.grads
                    .add(scene, "visible", c, self.config.weights.visible);
            }
        }
        Ok(())
    }

    /// Evaluate one constraint against the current positions
    pub fn evaluate(
        &mut self,
        scene: &Scene,
        graph: &SceneGraph,
        constraint: &Constraint,
    ) -> Result<(), SolverError> {
        match constraint {
            Constraint::NoOverlap => self.no_overlaps(scene, graph),
            Constraint::NoOutOfBounds => self.no_out_of_bounds(scene, graph),
            Constraint::Access {
                first,
                second,
                min,
                max,
            } => self.access(scene, graph, first, second, *min, *max)?,
            Constraint::Clearance {
                entity,
                side,
                distance,
                omit,
            } => self.clearance(scene, graph, entity, *side, *distance, omit)?,
            Constraint::Visible { target, viewer } => self.visible(scene, graph, target, viewer)?,
        }
        Ok(())
    }

    /// Apply `learning_rate * pending` to every eligible entity.
    ///
    /// Returns whether the largest step component stayed below the
    /// convergence threshold (trivially true with nothing to move).
    pub fn update(&mut self, scene: &mut Scene) -> Result<bool, SolverError> {
        let steps: Vec<(usize, Vec3)> = self
            .grads
            .0
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.map(|g| (i, g * self.config.learning_rate)))
            .collect();

        let mut largest = 0.0_f64;
        for (i, step) in steps {
            let name = scene.entities()[i].name().to_string();
            let before = scene.entities()[i].center();
            self.ledger.record(&name, step);
            scene.displace_at(i, step)?;
            largest = largest.max(step.max_abs());
            if step != Vec3::ZERO {
                debug!(
                    entity = %name,
                    ?before,
                    after = ?scene.entities()[i].center(),
                    ?step,
                    displacement = ?self.ledger.get(&name),
                    "applied step"
                );
            }
        }
        Ok(largest < self.config.convergence_threshold)
    }

    /// One full iteration; `true` once converged
    pub fn step(&mut self, scene: &mut Scene, constraints: &[Constraint]) -> Result<bool, SolverError> {
        let graph = scene.validate()?;
        self.init_grads(scene);
        for constraint in constraints {
            self.evaluate(scene, &graph, constraint)?;
        }
        self.update(scene)
    }

    /// Iterate until converged or out of budget.
    ///
    /// Running out of iterations is reported through
    /// [`RelaxOutcome::converged`], not as an error.
    pub fn run(
        &mut self,
        scene: &mut Scene,
        constraints: &[Constraint],
    ) -> Result<RelaxOutcome, SolverError> {
        for constraint in constraints {
            constraint.validate(scene)?;
        }
        let budget = self.config.max_iterations;
        for iteration in 1..=budget {
            if self.step(scene, constraints)? {
                info!(iterations = iteration, "relaxation converged");
                return Ok(self.outcome(true, iteration));
            }
        }
        warn!(iterations = budget, "relaxation did not converge");
        Ok(self.outcome(false, budget))
    }

    fn outcome(&self, converged: bool, iterations: usize) -> RelaxOutcome {
        RelaxOutcome {
            converged,
            iterations,
            ledger: self.ledger.clone(),
        }
    }
}
