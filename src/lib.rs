//! Scene Relax - constraint relaxation for furnished room layouts
//!
//! This library places entities in a rectangular room through a declarative
//! placement API and then nudges them, iteration by iteration, until spatial
//! constraints (no overlap, inside the room, access distance, clearance,
//! line of sight) hold or the iteration budget runs out.
//!
//! # Example
//!
//! ```rust
//! use scene_relax::geometry::Vec3;
//! use scene_relax::scene::{AxisTarget, Entity, Height, Room, Scene};
//! use scene_relax::solver::{Constraint, SolverConfig};
//!
//! let mut scene = Scene::new(Room::new(5.0, 5.0, 3.0).unwrap());
//! for (name, at) in [("a", 1.0), ("b", 2.0)] {
//!     scene.add(Entity::cuboid(name, Vec3::new(2.0, 1.0, 2.0))).unwrap();
//!     scene
//!         .place_global(name, AxisTarget::At(at), Height::Floor, AxisTarget::At(at), Vec3::ZERO, None)
//!         .unwrap();
//! }
//!
//! let outcome = scene_relax::relax(&mut scene, &[Constraint::NoOverlap], SolverConfig::default()).unwrap();
//! assert!(outcome.converged);
//! assert!(outcome.ledger.get("b").unwrap().x > 0.0);
//! ```

pub mod error;
pub mod geometry;
pub mod scene;
pub mod solver;

pub use error::SceneError;
pub use scene::{Room, Scene};
pub use solver::{Constraint, DisplacementLedger, RelaxOutcome, Relaxer, SolverConfig, SolverError};

/// Relax `scene` against `constraints` with the given configuration
///
/// The scene is updated in place; the outcome carries the cumulative
/// displacement of every entity and whether the loop converged.
pub fn relax(
    scene: &mut Scene,
    constraints: &[Constraint],
    config: SolverConfig,
) -> Result<RelaxOutcome, SolverError> {
    Relaxer::new(scene, config)?.run(scene, constraints)
}
