//! Solver configuration loaded from TOML and fed to a relaxation run.

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use scene_relax::geometry::Vec3;
use scene_relax::scene::{AxisTarget, Entity, Height, Room, Scene};
use scene_relax::solver::{Constraint, SolverConfig, SolverError, Weights};

fn write_config(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("scene-relax-{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_config_file_drives_the_solver() {
    let path = write_config(
        "slow",
        r#"
learning_rate = 0.1
max_iterations = 3

[weights]
overlap = 2.0
"#,
    );
    let config = SolverConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(
        config.weights,
        Weights {
            overlap: 2.0,
            ..Weights::default()
        }
    );

    let mut scene = Scene::new(Room::new(5.0, 5.0, 3.0).unwrap());
    for (name, at) in [("a", 1.0), ("b", 2.0)] {
        scene
            .add(Entity::cuboid(name, Vec3::new(2.0, 1.0, 2.0)))
            .unwrap();
        scene
            .place_global(
                name,
                AxisTarget::At(at),
                Height::Floor,
                AxisTarget::At(at),
                Vec3::ZERO,
                None,
            )
            .unwrap();
    }
    let outcome = scene_relax::relax(&mut scene, &[Constraint::NoOverlap], config).unwrap();
    assert_eq!(outcome.iterations, 3);
    // 1.2 m of overlap, doubled by the weight and scaled by the rate
    let b = outcome.ledger.get("b").unwrap();
    assert!(b.x > 0.24);
}

#[test]
fn test_bad_values_are_reported_by_key() {
    let path = write_config("bad", "buffer = -0.1\n");
    let err = SolverConfig::from_file(&path).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(matches!(err, SolverError::InvalidConfig { ref key, .. } if key == "buffer"));
    assert_eq!(
        err.to_string(),
        "invalid solver config 'buffer': must not be negative"
    );
}

#[test]
fn test_malformed_toml() {
    let err = SolverConfig::from_toml_str("max_iterations = \"many\"").unwrap_err();
    assert!(matches!(err, SolverError::ConfigParse(_)));
}
