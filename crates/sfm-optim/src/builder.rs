//! Reprojection residual builder.
//!
//! Walks the visibility index of a [`Scene`] and adds one residual block per
//! observation of a valid landmark. Camera and point blocks are created once
//! and shared by every residual that touches them; their starting values go
//! into a separate map keyed by block name, so the IR never points into scene
//! storage.

use anyhow::{anyhow, ensure, Result};
use log::{debug, warn};
use nalgebra::DVector;
use sfm_core::{CameraModel, CameraParams, Pt3, Scene, VisibleObservation};
use std::collections::HashMap;

use crate::ir::{
    BlockKind, FixedMask, ParamId, ProblemIR, ReprojectionFactor, ResidualBlock, RobustLoss,
};

/// Cauchy width used when callers do not pick one.
pub const DEFAULT_LOSS_WIDTH: f64 = 4.0;

/// What a build pass added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Residual blocks added.
    pub residuals: usize,
    /// Visibility entries skipped because their point is invalid.
    pub skipped_invalid: usize,
    /// Camera blocks created by this pass.
    pub cameras: usize,
    /// Point blocks created by this pass.
    pub points: usize,
}

fn get_or_add_block(
    ir: &mut ProblemIR,
    initial: &mut HashMap<String, DVector<f64>>,
    kind: BlockKind,
    fixed: impl FnOnce() -> FixedMask,
    value: impl FnOnce() -> DVector<f64>,
) -> Result<(ParamId, bool)> {
    let name = kind.block_name();
    if let Some(id) = ir.param_by_name(&name) {
        return Ok((id, false));
    }
    let id = ir.add_param_block(kind, fixed())?;
    initial.insert(name, value());
    Ok((id, true))
}

/// Add reprojection residuals for every visible, valid point of `scene`.
///
/// Each residual gets a Cauchy loss of width `loss_width` when the width is
/// positive and no robust loss otherwise. Reduced camera models read the
/// intrinsics they hold constant from a snapshot of the camera taken here.
///
/// Every visibility entry is resolved before `ir` or `initial` is touched, so
/// an out-of-range image, keypoint or point index leaves both unchanged.
pub fn add_reprojection_residuals(
    ir: &mut ProblemIR,
    initial: &mut HashMap<String, DVector<f64>>,
    scene: &Scene,
    model: CameraModel,
    loss_width: f64,
) -> Result<BuildSummary> {
    ensure!(!loss_width.is_nan(), "loss width must not be NaN");

    let mut observations: Vec<VisibleObservation> =
        scene.observations().collect::<Result<_, _>>()?;
    observations.sort_by_key(|obs| obs.key);

    let loss = RobustLoss::from_width(loss_width);
    let mut summary = BuildSummary::default();

    for obs in observations {
        if !scene.points[obs.point].is_valid() {
            summary.skipped_invalid += 1;
            continue;
        }
        let camera = &scene.cameras[obs.image];

        let (cam_id, cam_new) = get_or_add_block(
            ir,
            initial,
            BlockKind::Camera { image: obs.image },
            || FixedMask::for_camera_model(model),
            || DVector::from_row_slice(camera.as_slice()),
        )?;
        let (point_id, point_new) = get_or_add_block(
            ir,
            initial,
            BlockKind::Point { point: obs.point },
            FixedMask::all_free,
            || DVector::from_row_slice(scene.points[obs.point].position.coords.as_slice()),
        )?;
        summary.cameras += usize::from(cam_new);
        summary.points += usize::from(point_new);

        ir.add_residual_block(ResidualBlock {
            camera: cam_id,
            point: point_id,
            loss,
            factor: ReprojectionFactor {
                model,
                uv: [obs.uv.x, obs.uv.y],
                fixed: camera.fixed_intrinsics(),
            },
        });
        summary.residuals += 1;
    }

    debug!(
        "reprojection build ({:?}, loss {:?}): {} residuals, {} invalid skipped, \
         {} new cameras, {} new points",
        model,
        loss,
        summary.residuals,
        summary.skipped_invalid,
        summary.cameras,
        summary.points
    );
    if summary.residuals == 0 {
        warn!("reprojection build added no residuals");
    }

    Ok(summary)
}

/// Build a fresh problem and its initial values from `scene`.
pub fn build_problem(
    scene: &Scene,
    model: CameraModel,
    loss_width: f64,
) -> Result<(ProblemIR, HashMap<String, DVector<f64>>, BuildSummary)> {
    let mut ir = ProblemIR::new();
    let mut initial = HashMap::new();
    let summary = add_reprojection_residuals(&mut ir, &mut initial, scene, model, loss_width)?;
    Ok((ir, initial, summary))
}

enum Update {
    Camera(usize, CameraParams),
    Point(usize, Pt3),
}

/// Write solved block values back into `scene` and return the number of blocks written.
///
/// Every block of `ir` must have a value in `params`. Nothing is written
/// unless all of them are present and well formed.
pub fn apply_solution(
    scene: &mut Scene,
    ir: &ProblemIR,
    params: &HashMap<String, DVector<f64>>,
) -> Result<usize> {
    let mut updates = Vec::with_capacity(ir.params.len());
    for block in &ir.params {
        let value = params
            .get(&block.name)
            .ok_or_else(|| anyhow!("solution missing parameter {}", block.name))?;
        match block.kind {
            BlockKind::Camera { image } => {
                ensure!(
                    image < scene.cameras.len(),
                    "camera block {} has no camera in the scene",
                    block.name
                );
                let cam = CameraParams::from_slice(value.as_slice())?;
                updates.push(Update::Camera(image, cam));
            }
            BlockKind::Point { point } => {
                ensure!(
                    point < scene.points.len(),
                    "point block {} has no point in the scene",
                    block.name
                );
                ensure!(
                    value.len() == block.dim,
                    "point block {} has {} values, expected {}",
                    block.name,
                    value.len(),
                    block.dim
                );
                updates.push(Update::Point(point, Pt3::new(value[0], value[1], value[2])));
            }
        }
    }

    let written = updates.len();
    for update in updates {
        match update {
            Update::Camera(image, cam) => scene.cameras[image] = cam,
            Update::Point(point, position) => scene.points[point].position = position,
        }
    }
    Ok(written)
}
