//! Per-residual Jacobians using `num-dual`.
//!
//! A reprojection residual depends on one camera block and one point block, so
//! autodiff runs over a local vector of `K = 11 + 3 = 14` values and the
//! result is split back into the two block Jacobians.
//!
//! Robust weights are applied by callers and are never differentiated.

use nalgebra::{SMatrix, SVector, Vector2};
use num_dual::{jacobian, DualSVec64};
use sfm_core::{CAMERA_PARAM_DIM, POINT_PARAM_DIM};

use crate::factors::reprojection::reprojection_residual_generic;
use crate::ir::ReprojectionFactor;

pub(crate) const LOCAL_DIM: usize = CAMERA_PARAM_DIM + POINT_PARAM_DIM;

/// Residual and Jacobian of one reprojection residual.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectionJacobian {
    pub residual: Vector2<f64>,
    /// `d residual / d camera` (2 x 11).
    pub camera: SMatrix<f64, 2, CAMERA_PARAM_DIM>,
    /// `d residual / d point` (2 x 3).
    pub point: SMatrix<f64, 2, POINT_PARAM_DIM>,
}

fn build_local_params(camera: &[f64], point: &[f64]) -> SVector<f64, LOCAL_DIM> {
    let mut local = SVector::<f64, LOCAL_DIM>::zeros();
    for (i, v) in camera.iter().enumerate() {
        local[i] = *v;
    }
    for (k, v) in point.iter().enumerate() {
        local[CAMERA_PARAM_DIM + k] = *v;
    }
    local
}

/// Evaluate one reprojection residual together with its Jacobian.
///
/// Columns of camera values a reduced model does not read come out as zero.
pub fn reprojection_jacobian(
    factor: &ReprojectionFactor,
    camera: &[f64],
    point: &[f64],
) -> ReprojectionJacobian {
    debug_assert_eq!(camera.len(), CAMERA_PARAM_DIM);
    debug_assert_eq!(point.len(), POINT_PARAM_DIM);

    let p0 = build_local_params(camera, point);
    let (r, j) = jacobian(
        |p: SVector<DualSVec64<LOCAL_DIM>, LOCAL_DIM>| {
            let p_slice = p.as_slice();
            reprojection_residual_generic(
                factor,
                &p_slice[..CAMERA_PARAM_DIM],
                &p_slice[CAMERA_PARAM_DIM..],
            )
        },
        p0,
    );

    ReprojectionJacobian {
        residual: r,
        camera: j.fixed_view::<2, CAMERA_PARAM_DIM>(0, 0).into_owned(),
        point: j.fixed_view::<2, POINT_PARAM_DIM>(0, CAMERA_PARAM_DIM).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::reprojection::reprojection_residual;
    use sfm_core::{CameraModel, CameraParams, Pt3, Vec2, Vec3};

    fn setup(model: CameraModel) -> (ReprojectionFactor, CameraParams, Pt3) {
        let cam = CameraParams::new(
            Vec3::new(0.05, -0.02, 0.1),
            Vec3::new(0.1, 0.2, 0.5),
            400.0,
            Vec2::new(320.0, 240.0),
            -0.1,
            0.02,
        );
        let factor = ReprojectionFactor {
            model,
            uv: [350.0, 200.0],
            fixed: cam.fixed_intrinsics(),
        };
        (factor, cam, Pt3::new(0.3, -0.1, 4.0))
    }

    fn finite_diff(
        factor: &ReprojectionFactor,
        camera: &[f64],
        point: &[f64],
        col: usize,
    ) -> Vector2<f64> {
        let h = 1e-6;
        let mut local = build_local_params(camera, point);
        local[col] += h;
        let rp = reprojection_residual(
            factor,
            &local.as_slice()[..CAMERA_PARAM_DIM],
            &local.as_slice()[CAMERA_PARAM_DIM..],
        );
        local[col] -= 2.0 * h;
        let rm = reprojection_residual(
            factor,
            &local.as_slice()[..CAMERA_PARAM_DIM],
            &local.as_slice()[CAMERA_PARAM_DIM..],
        );
        (rp - rm) / (2.0 * h)
    }

    #[test]
    fn autodiff_matches_finite_differences() {
        for model in [
            CameraModel::Full,
            CameraModel::SharedPrincipalPoint,
            CameraModel::Minimal,
        ] {
            let (factor, cam, p) = setup(model);
            let jac = reprojection_jacobian(&factor, cam.as_slice(), p.coords.as_slice());
            let r = reprojection_residual(&factor, cam.as_slice(), p.coords.as_slice());
            assert!((jac.residual - r).norm() < 1e-12);

            for col in 0..LOCAL_DIM {
                let fd = finite_diff(&factor, cam.as_slice(), p.coords.as_slice(), col);
                let ad = if col < CAMERA_PARAM_DIM {
                    jac.camera.column(col).into_owned()
                } else {
                    jac.point.column(col - CAMERA_PARAM_DIM).into_owned()
                };
                let scale = 1.0 + fd.norm();
                assert!(
                    (ad - fd).norm() / scale < 1e-5,
                    "{model:?} column {col}: ad {ad:?} vs fd {fd:?}"
                );
            }
        }
    }

    #[test]
    fn reduced_models_have_zero_columns_for_constants() {
        let (factor, cam, p) = setup(CameraModel::Minimal);
        let jac = reprojection_jacobian(&factor, cam.as_slice(), p.coords.as_slice());
        for col in CameraModel::Minimal.fixed_indices() {
            assert_eq!(jac.camera.column(col).norm(), 0.0);
        }
        assert!(jac.camera.column(5).norm() > 0.0);
    }
}
