//! Residual and cost evaluation over a [`ProblemIR`] and a value map.
//!
//! Backends compute `BackendSolution::final_cost` with [`total_cost`].

use anyhow::{anyhow, ensure, Result};
use nalgebra::{DVector, Vector2};
use std::collections::HashMap;

use crate::factors::reprojection::reprojection_residual;
use crate::ir::{ParamId, ProblemIR};

/// Evaluation of one residual block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidualEval {
    /// Raw residual `uv - projection`.
    pub residual: Vector2<f64>,
    pub squared_norm: f64,
    /// Robust loss `rho(|r|^2)`.
    pub rho: f64,
    /// IRLS weight `rho'(|r|^2)`.
    pub weight: f64,
}

fn lookup<'a>(
    ir: &ProblemIR,
    values: &'a HashMap<String, DVector<f64>>,
    id: ParamId,
) -> Result<&'a DVector<f64>> {
    let param = ir.param(id)?;
    let value = values
        .get(&param.name)
        .ok_or_else(|| anyhow!("missing value for parameter {}", param.name))?;
    ensure!(
        value.len() == param.dim,
        "value dimension mismatch for {}: expected {}, got {}",
        param.name,
        param.dim,
        value.len()
    );
    Ok(value)
}

/// Evaluate every residual block of `ir` at `values`, in block order.
pub fn evaluate_residuals(
    ir: &ProblemIR,
    values: &HashMap<String, DVector<f64>>,
) -> Result<Vec<ResidualEval>> {
    ir.validate()?;
    ir.residuals
        .iter()
        .map(|block| {
            let camera = lookup(ir, values, block.camera)?;
            let point = lookup(ir, values, block.point)?;
            let residual =
                reprojection_residual(&block.factor, camera.as_slice(), point.as_slice());
            let squared_norm = residual.norm_squared();
            let (rho, weight) = block.loss.rho_and_weight(squared_norm);
            Ok(ResidualEval {
                residual,
                squared_norm,
                rho,
                weight,
            })
        })
        .collect()
}

/// Robustified cost `0.5 * sum(rho)`.
pub fn total_cost(evals: &[ResidualEval]) -> f64 {
    0.5 * evals.iter().map(|e| e.rho).sum::<f64>()
}
