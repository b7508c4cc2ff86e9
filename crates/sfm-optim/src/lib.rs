//! Bundle-adjustment problem assembly and solving on top of `sfm-core`.
//!
//! The crate turns a [`sfm_core::Scene`] into a backend-independent
//! [`ir::ProblemIR`] of reprojection residuals, compiles that IR for a solver
//! backend (tiny-solver by default), writes the solution back into the scene,
//! and marks landmarks whose reprojection error stays too large.
//!
//! Parameter blocks are named `cam/<image>` and `point/<point>`; value maps
//! passed to and returned from backends use the same names.

pub mod backend;
pub mod builder;
pub mod eval;
pub mod factors;
pub mod ir;
pub mod jacobian_ad;
pub mod outliers;
pub mod problems;
pub mod robust;

pub use crate::backend::{
    solve_with_backend, BackendKind, BackendSolution, BackendSolveOptions, LinearSolverKind,
    OptimBackend, TinySolverBackend,
};
pub use crate::builder::{
    add_reprojection_residuals, apply_solution, build_problem, BuildSummary, DEFAULT_LOSS_WIDTH,
};
pub use crate::eval::{evaluate_residuals, total_cost, ResidualEval};
pub use crate::jacobian_ad::{reprojection_jacobian, ReprojectionJacobian};
pub use crate::outliers::{mark_noisy_points, MarkOutcome, DEFAULT_OUTLIER_THRESHOLD_SQ};
pub use crate::problems::bundle_adjust::{
    build_bundle_adjust_ir, bundle_adjust_round, bundle_adjust_round_with, BundleAdjustOptions,
    RoundReport,
};
