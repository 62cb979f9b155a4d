//! Constraint invocations evaluated by the relaxation loop

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Segment, Vec2};
use crate::scene::{Entity, Scene};

use super::error::SolverError;

/// Default reach of a clearance zone
pub const DEFAULT_CLEARANCE: f64 = 0.5;

fn default_clearance() -> f64 {
    DEFAULT_CLEARANCE
}

/// Which side of an entity must be kept clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceSide {
    Front,
    /// Both the left and the right side
    Sides,
}

impl fmt::Display for ClearanceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearanceSide::Front => write!(f, "front"),
            ClearanceSide::Sides => write!(f, "sides"),
        }
    }
}

/// One check run every iteration, in the order the caller lists them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Every pair of solid floor entities must be disjoint
    NoOverlap,
    /// Every floor entity must stay inside the room
    NoOutOfBounds,
    /// Boundary distance between two entities within `[min, max]`
    Access {
        first: String,
        second: String,
        min: f64,
        max: f64,
    },
    /// Nothing solid within `distance` of the given side
    Clearance {
        entity: String,
        side: ClearanceSide,
        #[serde(default = "default_clearance")]
        distance: f64,
        #[serde(default)]
        omit: Vec<String>,
    },
    /// Nothing solid between the viewer's eye and the target
    Visible { target: String, viewer: String },
}

impl Constraint {
    pub fn access(first: impl Into<String>, second: impl Into<String>, min: f64, max: f64) -> Self {
        Constraint::Access {
            first: first.into(),
            second: second.into(),
            min,
            max,
        }
    }

    pub fn clearance(entity: impl Into<String>, side: ClearanceSide, distance: f64) -> Self {
        Constraint::Clearance {
            entity: entity.into(),
            side,
            distance,
            omit: Vec::new(),
        }
    }

    /// Clearance zone that tolerates the listed entities
    pub fn clearance_omitting<I, S>(
        entity: impl Into<String>,
        side: ClearanceSide,
        distance: f64,
        omit: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::Clearance {
            entity: entity.into(),
            side,
            distance,
            omit: omit.into_iter().map(Into::into).collect(),
        }
    }

    pub fn visible(target: impl Into<String>, viewer: impl Into<String>) -> Self {
        Constraint::Visible {
            target: target.into(),
            viewer: viewer.into(),
        }
    }

    /// Short name used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::NoOverlap => "no_overlap",
            Constraint::NoOutOfBounds => "no_out_of_bounds",
            Constraint::Access { .. } => "access",
            Constraint::Clearance { .. } => "clearance",
            Constraint::Visible { .. } => "visible",
        }
    }

    /// Check names and parameters against the scene before solving
    pub fn validate(&self, scene: &Scene) -> Result<(), SolverError> {
        match self {
            Constraint::NoOverlap | Constraint::NoOutOfBounds => Ok(()),
            Constraint::Access {
                first,
                second,
                min,
                max,
            } => {
                scene.get(first)?;
                scene.get(second)?;
                if first == second {
                    return Err(SolverError::invalid_constraint(
                        self.to_string(),
                        "an entity has no distance to itself",
                    ));
                }
                if !(min.is_finite() && max.is_finite() && *min >= 0.0 && min <= max) {
                    return Err(SolverError::invalid_constraint(
                        self.to_string(),
                        "distances must satisfy 0 <= min <= max",
                    ));
                }
                Ok(())
            }
            Constraint::Clearance {
                entity,
                distance,
                omit,
                ..
            } => {
                scene.get(entity)?;
                for name in omit {
                    scene.get(name)?;
                }
                if !(distance.is_finite() && *distance > 0.0) {
                    return Err(SolverError::invalid_constraint(
                        self.to_string(),
                        "distance must be positive",
                    ));
                }
                Ok(())
            }
            Constraint::Visible { target, viewer } => {
                scene.get(target)?;
                scene.get(viewer)?;
                if target == viewer {
                    return Err(SolverError::invalid_constraint(
                        self.to_string(),
                        "an entity cannot be its own viewer",
                    ));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::NoOverlap | Constraint::NoOutOfBounds => write!(f, "{}", self.kind()),
            Constraint::Access {
                first,
                second,
                min,
                max,
            } => write!(f, "access({}, {}, {}..{})", first, second, min, max),
            Constraint::Clearance {
                entity,
                side,
                distance,
                ..
            } => write!(f, "clearance({}, {}, {})", entity, side, distance),
            Constraint::Visible { target, viewer } => {
                write!(f, "visible({} from {})", target, viewer)
            }
        }
    }
}

/// Thin prisms that must stay clear around an entity, from the floor up to
/// `height`.
///
/// The front zone starts at the front edge; the side zones start at the left
/// and right edges. Each reaches `distance` outwards.
pub fn clearance_zones(entity: &Entity, side: ClearanceSide, distance: f64, height: f64) -> Vec<Aabb> {
    let sides = entity.sides();
    let prism = |edge: Segment, opposite: Segment| {
        let out = (edge.midpoint() - opposite.midpoint()).normalized()?;
        let far: [Vec2; 2] = [edge.start + out * distance, edge.end + out * distance];
        Aabb::from_points(
            [edge.start, edge.end, far[0], far[1]]
                .into_iter()
                .flat_map(|p| [p.at_height(0.0), p.at_height(height)]),
        )
    };
    match side {
        ClearanceSide::Front => prism(sides.front, sides.back).into_iter().collect(),
        ClearanceSide::Sides => [prism(sides.left, sides.right), prism(sides.right, sides.left)]
            .into_iter()
            .flatten()
            .collect(),
    }
}
