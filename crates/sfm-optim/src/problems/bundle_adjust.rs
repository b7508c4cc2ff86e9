//! One bundle-adjustment round: build, solve, write back, reject outliers.
//!
//! Callers iterate rounds themselves, typically until
//! [`RoundReport::outliers`] reports nothing new.

use crate::backend::{BackendKind, BackendSolveOptions, OptimBackend};
use crate::builder::{apply_solution, build_problem, BuildSummary, DEFAULT_LOSS_WIDTH};
use crate::eval::{evaluate_residuals, total_cost};
use crate::ir::{BlockKind, FixedMask, ProblemIR};
use crate::outliers::{mark_noisy_points, MarkOutcome, DEFAULT_OUTLIER_THRESHOLD_SQ};
use anyhow::{anyhow, ensure, Result};
use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use sfm_core::{CameraModel, Scene, CAMERA_PARAM_DIM};
use std::collections::HashMap;

/// Options for one bundle-adjustment round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleAdjustOptions {
    pub model: CameraModel,
    /// Cauchy loss width; `<= 0` disables the robust loss.
    pub loss_width: f64,
    /// Squared pixel error for outlier marking after the solve; `<= 0` disables it.
    pub outlier_threshold_sq: f64,
    /// Images whose camera block is held entirely constant (gauge fixing).
    pub fix_cameras: Vec<usize>,
    pub backend: BackendKind,
    pub solve: BackendSolveOptions,
}

impl Default for BundleAdjustOptions {
    fn default() -> Self {
        Self {
            model: CameraModel::Full,
            loss_width: DEFAULT_LOSS_WIDTH,
            outlier_threshold_sq: DEFAULT_OUTLIER_THRESHOLD_SQ,
            fix_cameras: Vec::new(),
            backend: BackendKind::TinySolver,
            solve: BackendSolveOptions::default(),
        }
    }
}

/// Outcome of one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundReport {
    pub build: BuildSummary,
    /// Robustified cost before the solve.
    pub initial_cost: f64,
    /// Robustified cost reported by the backend.
    pub final_cost: f64,
    pub outliers: MarkOutcome,
}

/// Build the reprojection problem for `scene`, with gauge-fixed cameras applied.
pub fn build_bundle_adjust_ir(
    scene: &Scene,
    opts: &BundleAdjustOptions,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>, BuildSummary)> {
    let (mut ir, initial, build) = build_problem(scene, opts.model, opts.loss_width)?;
    ensure!(build.residuals > 0, "no residuals to optimize");

    for &image in &opts.fix_cameras {
        let name = BlockKind::Camera { image }.block_name();
        let id = ir
            .param_by_name(&name)
            .ok_or_else(|| anyhow!("cannot fix camera {image}: it has no residuals"))?;
        ir.set_fixed(id, FixedMask::all_fixed(CAMERA_PARAM_DIM))?;
    }

    ir.validate()?;
    Ok((ir, initial, build))
}

/// Run one round with the backend selected in `opts`.
pub fn bundle_adjust_round(scene: &mut Scene, opts: &BundleAdjustOptions) -> Result<RoundReport> {
    bundle_adjust_round_with(scene, opts, &opts.backend)
}

/// Run one round with an explicit backend.
///
/// The scene is only modified once the solve succeeded: cameras and points
/// receive the solved values, then points whose error exceeds
/// `opts.outlier_threshold_sq` are marked invalid.
pub fn bundle_adjust_round_with(
    scene: &mut Scene,
    opts: &BundleAdjustOptions,
    backend: &dyn OptimBackend,
) -> Result<RoundReport> {
    let (ir, initial, build) = build_bundle_adjust_ir(scene, opts)?;
    let initial_cost = total_cost(&evaluate_residuals(&ir, &initial)?);

    let solution = backend.solve(&ir, &initial, &opts.solve)?;
    apply_solution(scene, &ir, &solution.params)?;
    let outliers = mark_noisy_points(scene, opts.outlier_threshold_sq);

    info!(
        "bundle adjust ({:?}): {} residuals, cost {:.6e} -> {:.6e}, outliers {}",
        opts.model,
        build.residuals,
        initial_cost,
        solution.final_cost,
        outliers.as_count()
    );

    Ok(RoundReport {
        build,
        initial_cost,
        final_cost: solution.final_cost,
        outliers,
    })
}
