use crate::backend::{BackendSolution, BackendSolveOptions, LinearSolverKind, OptimBackend};
use crate::eval::{evaluate_residuals, total_cost};
use crate::factors::reprojection::reprojection_residual_generic;
use crate::ir::{ProblemIR, ReprojectionFactor, ResidualBlock, RobustLoss};
use anyhow::{anyhow, ensure, Result};
use log::debug;
use nalgebra::DVector;
use std::collections::HashMap;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{CauchyLoss, Loss};
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

/// tiny-solver backend adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TinySolverBackend;

impl TinySolverBackend {
    fn compile(&self, ir: &ProblemIR, initial: &HashMap<String, DVector<f64>>) -> Result<Problem> {
        ir.validate()?;

        let mut problem = Problem::new();

        for param in &ir.params {
            let init = initial.get(&param.name).ok_or_else(|| {
                anyhow!(
                    "initial values missing parameter {} (id {:?})",
                    param.name,
                    param.id
                )
            })?;
            ensure!(
                init.len() == param.dim,
                "initial dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                init.len()
            );

            for idx in param.fixed.iter() {
                problem.fix_variable(&param.name, idx);
            }
        }

        for residual in &ir.residuals {
            let (factor, loss) = compile_factor(residual)?;
            let names = [
                ir.params[residual.camera.0].name.as_str(),
                ir.params[residual.point.0].name.as_str(),
            ];
            problem.add_residual_block(ReprojectionFactor::RESIDUAL_DIM, &names, factor, loss);
        }

        Ok(problem)
    }
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &BackendSolveOptions,
    ) -> Result<BackendSolution> {
        let problem = self.compile(ir, initial)?;
        debug!(
            "tiny-solver: {} parameter blocks, {} residual blocks",
            ir.params.len(),
            ir.residuals.len()
        );
        let optimizer = LevenbergMarquardtOptimizer::default();
        let options = to_optimizer_options(opts);
        let solution = optimizer
            .optimize(&problem, initial, Some(options))
            .ok_or_else(|| anyhow!("tiny-solver failed to converge"))?;

        // Blocks the solver never saw keep their initial value.
        let mut params = initial.clone();
        params.extend(solution);
        let final_cost = total_cost(&evaluate_residuals(ir, &params)?);

        Ok(BackendSolution { params, final_cost })
    }
}

fn to_optimizer_options(opts: &BackendSolveOptions) -> OptimizerOptions {
    let mut options = OptimizerOptions {
        max_iteration: opts.max_iters,
        verbosity_level: opts.verbosity,
        ..OptimizerOptions::default()
    };
    if let Some(solver) = opts.linear_solver {
        options.linear_solver_type = match solver {
            LinearSolverKind::SparseCholesky => LinearSolverType::SparseCholesky,
            LinearSolverKind::SparseQR => LinearSolverType::SparseQR,
        };
    }
    if let Some(v) = opts.min_abs_decrease {
        options.min_abs_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_rel_decrease {
        options.min_rel_error_decrease_threshold = v;
    }
    if let Some(v) = opts.min_error {
        options.min_error_threshold = v;
    }
    options
}

fn compile_loss(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    match loss {
        RobustLoss::None => Ok(None),
        RobustLoss::Cauchy { scale } => {
            ensure!(scale > 0.0, "Cauchy scale must be positive");
            Ok(Some(Box::new(CauchyLoss::new(scale))))
        }
    }
}

type CompiledFactor = (
    Box<dyn tiny_solver::factors::FactorImpl + Send>,
    Option<Box<dyn Loss + Send>>,
);

fn compile_factor(residual: &ResidualBlock) -> Result<CompiledFactor> {
    let loss = compile_loss(residual.loss)?;
    let factor = TinyReprojectionFactor {
        inner: residual.factor,
    };
    Ok((Box::new(factor), loss))
}

#[derive(Debug, Clone)]
struct TinyReprojectionFactor {
    inner: ReprojectionFactor,
}

impl<T: nalgebra::RealField> Factor<T> for TinyReprojectionFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 2, "expected [camera, point] parameter blocks");
        let r = reprojection_residual_generic(
            &self.inner,
            params[0].as_slice(),
            params[1].as_slice(),
        );
        DVector::from_row_slice(r.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_problem;
    use sfm_core::synthetic::{self, SyntheticConfig};
    use sfm_core::CameraModel;

    #[test]
    fn compile_rejects_missing_or_misshaped_initial_values() {
        let cfg = SyntheticConfig {
            num_cameras: 2,
            nx: 2,
            ny: 1,
            ..SyntheticConfig::default()
        };
        let scene = synthetic::scene(&cfg).unwrap();
        let (ir, mut initial, _) = build_problem(&scene, CameraModel::Full, 4.0).unwrap();
        assert!(TinySolverBackend.compile(&ir, &initial).is_ok());

        initial.insert("cam/1".to_string(), DVector::zeros(7));
        let err = TinySolverBackend.compile(&ir, &initial).err().expect("compile should fail");
        assert!(err.to_string().contains("cam/1"), "{err}");

        initial.remove("cam/1");
        assert!(TinySolverBackend.compile(&ir, &initial).is_err());
    }
}
