//! Constraint relaxation for a placed scene
//!
//! Constraints are evaluated against a snapshot of the scene each iteration.
//! Every violation becomes a [`Correction`] on one anchor entity, chosen by
//! the [`AnchorSelector`]; the [`Relaxer`] accumulates them and applies a
//! damped step to all entities at once until nothing moves any more.

pub mod config;
pub mod constraints;
pub mod correction;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod lint;
pub mod weighting;

pub use config::{SolverConfig, Weights};
pub use constraints::{clearance_zones, ClearanceSide, Constraint, DEFAULT_CLEARANCE};
pub use correction::{Adjustment, Body, Correction, CorrectionComputer};
pub use engine::{RelaxOutcome, Relaxer};
pub use error::SolverError;
pub use ledger::DisplacementLedger;
pub use lint::{LintCategory, LintWarning};
pub use weighting::{AnchorSelector, Side};
