//! Configuration for the relaxation solver

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::SolverError;

/// Per-constraint scale applied to a correction before it is accumulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Weights {
    pub overlap: f64,
    pub out_of_bounds: f64,
    pub access: f64,
    pub clearance: f64,
    pub visible: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            overlap: 1.0,
            out_of_bounds: 1.0,
            access: 0.5,
            clearance: 0.5,
            visible: 0.5,
        }
    }
}

/// Tunables of the relaxation loop.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// max_iterations = 200
///
/// [weights]
/// access = 0.8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Extra separation added to every overlap, bounds and distance correction
    pub buffer: f64,

    /// Fraction of the accumulated correction applied per iteration
    pub learning_rate: f64,

    /// Largest step component that still counts as converged
    pub convergence_threshold: f64,

    pub max_iterations: usize,

    /// Fraction of a distance violation corrected at once
    pub distance_scale: f64,

    /// Rays cast per visibility check
    pub visibility_samples: usize,

    /// Blocked-ray fraction above which an entity obstructs the view
    pub visibility_threshold: f64,

    /// Height of the viewer's eye above the floor
    pub eye_height: f64,

    /// Points sampled along each footprint boundary for distance checks
    pub boundary_samples: usize,

    /// Height of the clearance volume in front of or beside an entity
    pub clearance_height: f64,

    /// Ancestor levels considered as correction anchors
    pub max_ancestors: usize,

    /// Weight of each level of the anchor chain, the entity itself first
    pub structure_affinity: Vec<f64>,

    /// Seed of the visibility sampler
    pub seed: u64,

    pub weights: Weights,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            buffer: 0.2,
            learning_rate: 0.2,
            convergence_threshold: 0.05,
            max_iterations: 100,
            distance_scale: 0.8,
            visibility_samples: 1000,
            visibility_threshold: 0.1,
            eye_height: 1.0,
            boundary_samples: 100,
            clearance_height: 2.0,
            max_ancestors: 4,
            structure_affinity: vec![1.0, 5.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0],
            seed: 0,
            weights: Weights::default(),
        }
    }
}

impl SolverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, SolverError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, SolverError> {
        let config: SolverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the solver cannot work with
    pub fn validate(&self) -> Result<(), SolverError> {
        let positive = [
            ("learning_rate", self.learning_rate),
            ("convergence_threshold", self.convergence_threshold),
            ("distance_scale", self.distance_scale),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SolverError::invalid_config(key, "must be positive"));
            }
        }
        if !(self.buffer.is_finite() && self.buffer >= 0.0) {
            return Err(SolverError::invalid_config("buffer", "must not be negative"));
        }
        if self.boundary_samples < 4 {
            return Err(SolverError::invalid_config(
                "boundary_samples",
                "need at least one point per footprint edge",
            ));
        }
        // the entity, its ancestors and one spare level
        let chain = self.max_ancestors + 2;
        if self.structure_affinity.len() < chain {
            return Err(SolverError::invalid_config(
                "structure_affinity",
                format!("needs {} entries for max_ancestors = {}", chain, self.max_ancestors),
            ));
        }
        Ok(())
    }

    /// Set the separation buffer
    pub fn with_buffer(mut self, buffer: f64) -> Self {
        self.buffer = buffer;
        self
    }

    /// Set the learning rate
    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate;
        self
    }

    /// Set the convergence threshold
    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the visibility sampler seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }
}
