//! End-to-end bundle-adjustment rounds on synthetic scenes with tiny-solver.

use sfm_core::synthetic::{self, SyntheticConfig};
use sfm_core::{CameraModel, Pt3, Scene, Vec2, Vec3};
use sfm_optim::{
    bundle_adjust_round, build_problem, evaluate_residuals, mark_noisy_points, total_cost,
    BundleAdjustOptions, MarkOutcome, OptimBackend, TinySolverBackend,
};

fn perturb_points(scene: &mut Scene) -> Vec<Pt3> {
    let truth: Vec<Pt3> = scene.points.iter().map(|p| p.position).collect();
    for (i, p) in scene.points.iter_mut().enumerate() {
        let k = i as f64;
        p.position += Vec3::new(
            0.03 * (0.7 * k).sin(),
            -0.02 * (1.3 * k).cos(),
            0.05 * (0.4 * k).sin(),
        );
    }
    truth
}

#[test]
fn round_refines_points_and_rejects_the_outlier() {
    let cfg = SyntheticConfig::default();
    let mut scene = synthetic::scene(&cfg).unwrap();
    let truth = perturb_points(&mut scene);
    let outlier = 7;
    scene.keypoints[1][outlier] += Vec2::new(50.0, 0.0);

    let opts = BundleAdjustOptions {
        fix_cameras: (0..cfg.num_cameras).collect(),
        ..BundleAdjustOptions::default()
    };
    let report = bundle_adjust_round(&mut scene, &opts).unwrap();

    assert_eq!(report.build.residuals, 80);
    assert!(
        report.final_cost < report.initial_cost,
        "cost did not decrease: {} -> {}",
        report.initial_cost,
        report.final_cost
    );
    assert_eq!(report.outliers, MarkOutcome::Marked(1));
    assert!(!scene.points[outlier].is_valid());

    for (i, (p, t)) in scene.points.iter().zip(&truth).enumerate() {
        if i == outlier {
            continue;
        }
        let err = (p.position - t).norm();
        assert!(err < 1e-2, "point {i} is {err} away from ground truth");
    }

    let next = bundle_adjust_round(&mut scene, &opts).unwrap();
    assert_eq!(next.build.residuals, 76);
    assert_eq!(next.build.skipped_invalid, 4);
    assert_eq!(next.outliers, MarkOutcome::Marked(0));
}

#[test]
fn reduced_model_solve_lowers_cost() {
    let cfg = SyntheticConfig::default();
    let mut scene = synthetic::scene(&cfg).unwrap();
    perturb_points(&mut scene);
    scene.cameras[2].0[4] += 0.02;
    scene.cameras[3].0[1] -= 0.01;

    for model in [CameraModel::SharedPrincipalPoint, CameraModel::Minimal] {
        let (mut ir, initial, _) = build_problem(&scene, model, 4.0).unwrap();
        for image in [0, 1] {
            let id = ir.param_by_name(&format!("cam/{image}")).unwrap();
            ir.set_fixed(id, sfm_optim::ir::FixedMask::all_fixed(11)).unwrap();
        }
        let initial_cost = total_cost(&evaluate_residuals(&ir, &initial).unwrap());
        let solution = TinySolverBackend
            .solve(&ir, &initial, &Default::default())
            .unwrap();
        assert!(
            solution.final_cost < initial_cost,
            "{model:?}: {} -> {}",
            initial_cost,
            solution.final_cost
        );
        for (name, value) in &solution.params {
            if name.starts_with("cam/") {
                for i in model.fixed_indices() {
                    assert_eq!(value[i], initial[name][i], "{name}[{i}] moved");
                }
            }
        }
    }
}

#[test]
fn disabled_marker_keeps_every_point() {
    let cfg = SyntheticConfig::default();
    let mut scene = synthetic::scene(&cfg).unwrap();
    scene.keypoints[0][3] += Vec2::new(0.0, 40.0);
    assert_eq!(mark_noisy_points(&mut scene, 0.0).as_count(), -1);
    assert_eq!(scene.num_valid_points(), 20);
    assert_eq!(mark_noisy_points(&mut scene, 4.0).as_count(), 1);
}
