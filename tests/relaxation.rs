//! Scenario tests for the relaxation loop: each builds a small furnished
//! room, runs the solver and checks the geometry it leaves behind.

use pretty_assertions::{assert_eq, assert_ne};
use scene_relax::geometry::Vec3;
use scene_relax::scene::{AxisTarget, Entity, Height, Relation, Room, Scene};
use scene_relax::solver::{
    clearance_zones, lint, ClearanceSide, Constraint, Relaxer, SolverConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn room(width: f64, depth: f64) -> Scene {
    Scene::new(Room::new(width, depth, 3.0).unwrap())
}

fn place(scene: &mut Scene, name: &str, size: Vec3, x: f64, z: f64) {
    scene.add(Entity::cuboid(name, size)).unwrap();
    scene
        .place_global(
            name,
            AxisTarget::At(x),
            Height::Floor,
            AxisTarget::At(z),
            Vec3::ZERO,
            None,
        )
        .unwrap();
}

fn overlapping_pair() -> Scene {
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "a", Vec3::new(2.0, 1.0, 2.0), 1.0, 1.0);
    place(&mut scene, "b", Vec3::new(2.0, 1.0, 2.0), 2.0, 2.0);
    scene
}

fn intersects(scene: &Scene, a: &str, b: &str) -> bool {
    scene
        .get(a)
        .unwrap()
        .aabb()
        .intersects(&scene.get(b).unwrap().aabb())
}

#[test]
fn test_first_iteration_ledger() {
    init_tracing();
    let mut scene = overlapping_pair();
    let mut relaxer = Relaxer::new(&scene, SolverConfig::default()).unwrap();
    relaxer.step(&mut scene, &[Constraint::NoOverlap]).unwrap();
    insta::assert_snapshot!(relaxer.ledger().to_json().unwrap(), @r#"{"a":[0.0,0.0,0.0],"b":[0.24,0.0,0.0]}"#);
}

#[test]
fn test_overlap_is_resolved() {
    init_tracing();
    let mut scene = overlapping_pair();
    let outcome = scene_relax::relax(&mut scene, &[Constraint::NoOverlap], SolverConfig::default())
        .unwrap();
    assert!(outcome.converged);
    assert!(outcome.iterations > 1);
    assert!(!intersects(&scene, "a", "b"));
    // the corner box has no room to give, so only "b" moves
    assert_eq!(outcome.ledger.get("a"), Some(Vec3::ZERO));
}

#[test]
fn test_entity_is_pulled_back_into_the_room() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "wardrobe", Vec3::new(2.0, 2.0, 2.0), 0.0, 2.5);
    assert!(!scene
        .room()
        .contains_footprint(&scene.get("wardrobe").unwrap().aabb()));

    let outcome = scene_relax::relax(
        &mut scene,
        &[Constraint::NoOutOfBounds],
        SolverConfig::default(),
    )
    .unwrap();
    assert!(outcome.converged);
    let wardrobe = scene.get("wardrobe").unwrap().aabb();
    assert!(scene.room().contains_footprint(&wardrobe));
    let moved = outcome.ledger.get("wardrobe").unwrap();
    assert!(moved.x > 1.0 && moved.z == 0.0);
}

#[test]
fn test_access_distance_is_reached() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "desk", Vec3::new(1.0, 0.8, 1.0), 1.5, 2.5);
    place(&mut scene, "chair", Vec3::new(1.0, 0.9, 1.0), 2.55, 2.5);

    let config = SolverConfig::default().with_convergence_threshold(0.005);
    let constraints = [Constraint::access("desk", "chair", 0.1, 0.3)];
    let outcome = scene_relax::relax(&mut scene, &constraints, config).unwrap();
    assert!(outcome.converged);

    let gap = scene.get("chair").unwrap().aabb().min.x - scene.get("desk").unwrap().aabb().max.x;
    assert!((0.1..=0.3).contains(&gap), "gap {} outside [0.1, 0.3]", gap);
}

#[test]
fn test_access_separates_touching_pair() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "desk", Vec3::new(1.0, 0.8, 1.0), 1.5, 2.5);
    place(&mut scene, "chair", Vec3::new(1.0, 0.9, 1.0), 2.5, 2.5);

    let config = SolverConfig::default().with_convergence_threshold(0.005);
    let constraints = [Constraint::access("desk", "chair", 0.1, 0.3)];
    let outcome = scene_relax::relax(&mut scene, &constraints, config).unwrap();
    assert!(outcome.converged);
    assert!(outcome.iterations > 1);

    let gap = scene.get("chair").unwrap().aabb().min.x - scene.get("desk").unwrap().aabb().max.x;
    assert!(
        (0.1 - 1e-6..=0.3 + 1e-6).contains(&gap),
        "gap {} outside [0.1, 0.3]",
        gap
    );
}

#[test]
fn test_access_pulls_distant_pair_together() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "desk", Vec3::new(1.0, 0.8, 1.0), 1.0, 2.5);
    place(&mut scene, "chair", Vec3::new(1.0, 0.9, 1.0), 3.5, 2.5);

    let constraints = [Constraint::access("desk", "chair", 0.1, 0.3)];
    let outcome = scene_relax::relax(&mut scene, &constraints, SolverConfig::default()).unwrap();
    assert!(outcome.converged);

    let gap = scene.get("chair").unwrap().aabb().min.x - scene.get("desk").unwrap().aabb().max.x;
    assert!(
        (0.1 - 1e-6..=0.3 + 1e-6).contains(&gap),
        "gap {} outside [0.1, 0.3]",
        gap
    );
}

#[test]
fn test_converged_scene_stays_put() {
    init_tracing();
    let mut scene = overlapping_pair();
    let constraints = [Constraint::NoOverlap, Constraint::NoOutOfBounds];
    let first = scene_relax::relax(&mut scene, &constraints, SolverConfig::default()).unwrap();
    assert!(first.converged);

    let second = scene_relax::relax(&mut scene, &constraints, SolverConfig::default()).unwrap();
    assert!(second.converged);
    assert_eq!(second.iterations, 1);
    for (name, displacement) in second.ledger.iter() {
        assert_eq!(displacement, Vec3::ZERO, "{} moved on the second run", name);
    }
}

#[test]
fn test_children_follow_their_anchor() {
    init_tracing();
    let mut scene = room(6.0, 6.0);
    place(&mut scene, "table", Vec3::new(1.2, 0.75, 0.8), 3.0, 3.0);
    scene
        .add(Entity::cuboid("chair", Vec3::new(0.5, 0.9, 0.5)))
        .unwrap();
    scene
        .place_relative("chair", Relation::InFrontOf, "table", 0.1, 0.0)
        .unwrap();
    place(&mut scene, "bin", Vec3::new(0.6, 0.5, 0.6), 3.4, 3.9);
    let chair_before = scene.get("chair").unwrap().center();

    let outcome = scene_relax::relax(&mut scene, &[Constraint::NoOverlap], SolverConfig::default())
        .unwrap();
    assert!(outcome.converged);
    // the table outweighs the chair through its structure weight
    assert_ne!(outcome.ledger.get("table"), Some(Vec3::ZERO));

    // the chair moved with the table plus whatever it was moved on its own
    let expected = chair_before
        + outcome.ledger.get("table").unwrap()
        + outcome.ledger.get("chair").unwrap();
    let chair_after = scene.get("chair").unwrap().center();
    assert!((chair_after - expected).max_abs() < 1e-9);
}

#[test]
fn test_clearance_pushes_intruder_out() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "sofa", Vec3::new(2.0, 0.8, 1.0), 2.5, 2.0);
    place(&mut scene, "coffee_table", Vec3::new(1.0, 0.5, 0.6), 2.5, 2.9);

    let config = SolverConfig::default().with_convergence_threshold(0.005);
    let constraints = [Constraint::clearance("sofa", ClearanceSide::Front, 0.5)];
    let outcome = scene_relax::relax(&mut scene, &constraints, config).unwrap();
    assert!(outcome.converged);
    assert_eq!(outcome.ledger.get("sofa"), Some(Vec3::ZERO));

    let zones = clearance_zones(scene.get("sofa").unwrap(), ClearanceSide::Front, 0.5, 2.0);
    let table = scene.get("coffee_table").unwrap().aabb();
    assert!(zones.iter().all(|z| !z.intersects(&table)));
    assert!(outcome.ledger.get("coffee_table").unwrap().z > 0.0);
}

#[test]
fn test_clearance_omits_listed_entities() {
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "sofa", Vec3::new(2.0, 0.8, 1.0), 2.5, 2.0);
    place(&mut scene, "coffee_table", Vec3::new(1.0, 0.5, 0.6), 2.5, 2.9);

    let constraints = [Constraint::clearance_omitting(
        "sofa",
        ClearanceSide::Front,
        0.5,
        ["coffee_table"],
    )];
    let outcome = scene_relax::relax(&mut scene, &constraints, SolverConfig::default()).unwrap();
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.ledger.get("coffee_table"), Some(Vec3::ZERO));
}

#[test]
fn test_obstruction_moves_sideways() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "tv", Vec3::new(1.0, 0.8, 0.2), 2.5, 0.5);
    place(&mut scene, "sofa", Vec3::new(2.0, 0.8, 0.9), 2.5, 4.2);
    place(&mut scene, "bookcase", Vec3::new(1.2, 1.8, 0.5), 2.35, 2.5);

    let outcome = scene_relax::relax(
        &mut scene,
        &[Constraint::visible("tv", "sofa")],
        SolverConfig::default(),
    )
    .unwrap();
    assert!(outcome.converged);
    let moved = outcome.ledger.get("bookcase").unwrap();
    assert!(moved.x < 0.0 && moved.z == 0.0);
    assert_eq!(outcome.ledger.get("tv"), Some(Vec3::ZERO));
    assert_eq!(outcome.ledger.get("sofa"), Some(Vec3::ZERO));
}

#[test]
fn test_centred_obstruction_still_moves() {
    init_tracing();
    let mut scene = room(5.0, 5.0);
    place(&mut scene, "tv", Vec3::new(1.0, 0.8, 0.2), 2.5, 0.5);
    place(&mut scene, "sofa", Vec3::new(2.0, 0.8, 0.9), 2.5, 4.2);
    place(&mut scene, "bookcase", Vec3::new(1.2, 1.8, 0.5), 2.5, 2.5);

    let outcome = scene_relax::relax(
        &mut scene,
        &[Constraint::visible("tv", "sofa")],
        SolverConfig::default(),
    )
    .unwrap();
    assert!(outcome.converged);
    assert!(outcome.iterations > 1);
    // sofa to tv runs along -z; a dead-centre blocker goes to its left, +x
    let moved = outcome.ledger.get("bookcase").unwrap();
    assert!(moved.x > 0.0 && moved.z == 0.0);
    assert_eq!(outcome.ledger.get("tv"), Some(Vec3::ZERO));
    assert_eq!(outcome.ledger.get("sofa"), Some(Vec3::ZERO));
}

#[test]
fn test_budget_exhaustion_reports_not_converged() {
    let mut scene = overlapping_pair();
    let config = SolverConfig::default().with_max_iterations(2);
    let outcome = scene_relax::relax(&mut scene, &[Constraint::NoOverlap], config).unwrap();
    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, 2);
    assert!(intersects(&scene, "a", "b"));
}

#[test]
fn test_zero_budget_runs_nothing() {
    let mut scene = overlapping_pair();
    let config = SolverConfig::default().with_max_iterations(0);
    let outcome = scene_relax::relax(&mut scene, &[Constraint::NoOverlap], config).unwrap();
    assert!(!outcome.converged);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(outcome.ledger.get("b"), Some(Vec3::ZERO));
}

#[test]
fn test_lint_is_clean_after_relaxation() {
    let mut scene = overlapping_pair();
    let before = lint::check(&scene);
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].category, lint::LintCategory::Overlap);

    let outcome = scene_relax::relax(
        &mut scene,
        &[Constraint::NoOverlap, Constraint::NoOutOfBounds],
        SolverConfig::default(),
    )
    .unwrap();
    assert!(outcome.converged);
    assert_eq!(lint::check(&scene), vec![]);
}
