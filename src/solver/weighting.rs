//! Anchor and axis selection for a correction
//!
//! A violation between two entities can be fixed by moving either of them or
//! one of their ancestors (which carries the whole subtree along). Every
//! candidate gets a weight per cardinal direction:
//!
//! ```text
//! weight = free_space_affinity * mass_affinity * structure_affinity * direction_affinity
//! ```
//!
//! and the highest weight wins. Rows are ordered side one's chain then side
//! two's chain, columns `+x, -x, +z, -z`; the first maximum in that order is
//! taken.

use std::collections::HashMap;

use crate::geometry::{Direction, Vec2};
use crate::scene::{free_space_around, Scene, SceneGraph};

use super::config::SolverConfig;

/// Smallest floor area used for mass affinity
const MIN_MASS_AREA: f64 = 1e-6;

/// One side of a pair: the entity that violated and where it should go
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Side {
    pub node: usize,
    pub push: Vec2,
}

impl Side {
    pub fn new(node: usize, push: Vec2) -> Self {
        Self { node, push }
    }
}

/// How free space enters the weight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FreeSpace {
    /// Directions with less room than the adjustment count as blocked
    Masked,
    Unmasked,
    /// Free space is ignored entirely
    Ignored,
}

/// `1 - e^(-2 * space)`
pub fn free_space_affinity(space: f64) -> f64 {
    1.0 - (-2.0 * space).exp()
}

/// Chooses which entity receives a correction, and along which axis.
///
/// Free space is cached per candidate, so a selector must not outlive the
/// positions it was created for.
pub struct AnchorSelector<'a> {
    scene: &'a Scene,
    graph: &'a SceneGraph,
    config: &'a SolverConfig,
    free_space: HashMap<usize, [f64; 4]>,
}

impl<'a> AnchorSelector<'a> {
    pub fn new(scene: &'a Scene, graph: &'a SceneGraph, config: &'a SolverConfig) -> Self {
        Self {
            scene,
            graph,
            config,
            free_space: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        self.graph
    }

    /// Candidate anchors for `node`: itself, then its ancestors nearest first
    pub fn chain(&self, node: usize, collapse: bool) -> Vec<usize> {
        let mut chain = vec![node];
        if !collapse {
            chain.extend(
                self.graph
                    .ancestors(node)
                    .into_iter()
                    .take(self.config.max_ancestors),
            );
        }
        chain
    }

    /// Free space around a candidate and its subtree, `+x, -x, +z, -z`
    pub fn free_space(&mut self, node: usize) -> [f64; 4] {
        *self
            .free_space
            .entry(node)
            .or_insert_with(|| free_space_around(self.scene, self.graph, node))
    }

    /// `1 / sqrt(floor area of the candidate and everything placed on or next to it)`
    pub fn mass_affinity(&self, node: usize) -> f64 {
        let entities = self.scene.entities();
        let area = self
            .graph
            .descendants(node)
            .into_iter()
            .map(|d| entities[d].floor_area())
            .sum::<f64>()
            + entities[node].floor_area();
        1.0 / area.max(MIN_MASS_AREA).sqrt()
    }

    fn structure_affinity(&self, level: usize) -> f64 {
        let scale = &self.config.structure_affinity;
        scale
            .get(level)
            .or_else(|| scale.last())
            .copied()
            .unwrap_or(1.0)
    }

    /// Weight matrix: one row per candidate, columns in [`Direction::ALL`] order
    fn weights(
        &mut self,
        sides: &[Side],
        collapse: bool,
        adjustment: (f64, f64),
        mode: FreeSpace,
    ) -> Vec<(usize, [f64; 4])> {
        let mut rows = Vec::new();
        for side in sides {
            for (level, candidate) in self.chain(side.node, collapse).into_iter().enumerate() {
                if !self.scene.entities()[candidate].is_movable() {
                    rows.push((candidate, [0.0; 4]));
                    continue;
                }
                let space = self.free_space(candidate);
                let mass = self.mass_affinity(candidate);
                let structure = self.structure_affinity(level);
                let row = Direction::ALL.map(|dir| {
                    let needed = if dir.is_x() { adjustment.0 } else { adjustment.1 };
                    let free = space[dir.index()];
                    let free_affinity = match mode {
                        FreeSpace::Masked if free < needed => 0.0,
                        FreeSpace::Masked | FreeSpace::Unmasked => free_space_affinity(free),
                        FreeSpace::Ignored => 1.0,
                    };
                    let direction = side.push.dot(dir.unit()).max(0.0);
                    free_affinity * mass * structure * direction
                });
                rows.push((candidate, row));
            }
        }
        rows
    }

    /// Best `(anchor, direction)` for the given sides.
    ///
    /// `collapse` restricts each side to the entity itself. `adjustment` is
    /// the `(x, z)` distance the correction needs; when every direction with
    /// that much room is blocked the mask is dropped, then free space is
    /// ignored altogether. `None` means nothing can move in a useful
    /// direction.
    pub fn select(
        &mut self,
        sides: &[Side],
        collapse: bool,
        adjustment: (f64, f64),
    ) -> Option<(usize, Direction)> {
        for mode in [FreeSpace::Masked, FreeSpace::Unmasked, FreeSpace::Ignored] {
            let rows = self.weights(sides, collapse, adjustment, mode);
            let mut best: Option<(usize, Direction, f64)> = None;
            for (candidate, row) in &rows {
                for dir in Direction::ALL {
                    let w = row[dir.index()];
                    if w > best.map_or(0.0, |b| b.2) {
                        best = Some((*candidate, dir, w));
                    }
                }
            }
            if let Some((anchor, dir, _)) = best {
                return Some((anchor, dir));
            }
        }
        None
    }
}
