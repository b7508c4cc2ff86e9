//! Reprojection residual shared by every backend.

use nalgebra::{RealField, SVector};
use sfm_core::{lit, project_generic, CAMERA_PARAM_DIM, POINT_PARAM_DIM};

use crate::ir::ReprojectionFactor;

/// Residual `uv - projection` for a camera block and a point block.
pub fn reprojection_residual(
    factor: &ReprojectionFactor,
    camera: &[f64],
    point: &[f64],
) -> SVector<f64, 2> {
    reprojection_residual_generic(factor, camera, point)
}

/// Generic reprojection residual evaluator for backend adapters and autodiff.
pub(crate) fn reprojection_residual_generic<T: RealField>(
    factor: &ReprojectionFactor,
    camera: &[T],
    point: &[T],
) -> SVector<T, 2> {
    debug_assert!(
        camera.len() == CAMERA_PARAM_DIM,
        "camera must have 11 params"
    );
    debug_assert!(point.len() == POINT_PARAM_DIM, "point must have 3 params");

    let proj = project_generic(factor.model, camera, point, &factor.fixed);
    let u_meas = lit::<T>(factor.uv[0]);
    let v_meas = lit::<T>(factor.uv[1]);
    SVector::<T, 2>::new(u_meas - proj.x.clone(), v_meas - proj.y.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfm_core::{CameraModel, CameraParams, FixedIntrinsics, Pt3, Vec2, Vec3};

    #[test]
    fn exact_observation_has_zero_residual() {
        let cam = CameraParams::default();
        let p = Pt3::new(0.0, 0.0, 1.0);
        let factor = ReprojectionFactor {
            model: CameraModel::Full,
            uv: [0.0, 0.0],
            fixed: cam.fixed_intrinsics(),
        };
        let r = reprojection_residual(&factor, cam.as_slice(), p.coords.as_slice());
        assert!(r.norm() < 1e-15);
    }

    #[test]
    fn residual_grows_with_point_offset() {
        let cam = CameraParams::default();
        let factor = ReprojectionFactor {
            model: CameraModel::Full,
            uv: [0.0, 0.0],
            fixed: cam.fixed_intrinsics(),
        };
        let mut last = 0.0;
        for step in 1..6 {
            let p = Pt3::new(0.05 * step as f64, 0.0, 1.0);
            let r = reprojection_residual(&factor, cam.as_slice(), p.coords.as_slice());
            assert!(r.norm() > last);
            last = r.norm();
        }
    }

    #[test]
    fn minimal_model_uses_snapshot_not_block() {
        let mut cam = CameraParams::new(
            Vec3::zeros(),
            Vec3::zeros(),
            100.0,
            Vec2::new(10.0, 20.0),
            0.0,
            0.0,
        );
        let fixed = cam.fixed_intrinsics();
        let factor = ReprojectionFactor {
            model: CameraModel::Minimal,
            uv: [10.0, 20.0],
            fixed,
        };
        cam.0[CameraParams::FOCAL] = 999.0;
        cam.0[7] = -50.0;
        let p = Pt3::new(0.0, 0.0, 2.0);
        let r = reprojection_residual(&factor, cam.as_slice(), p.coords.as_slice());
        assert!(r.norm() < 1e-12);

        let snapshot = FixedIntrinsics {
            focal: 100.0,
            cx: 0.0,
            cy: 0.0,
        };
        let factor = ReprojectionFactor {
            fixed: snapshot,
            ..factor
        };
        let r = reprojection_residual(&factor, cam.as_slice(), p.coords.as_slice());
        assert!((r.x - 10.0).abs() < 1e-12);
        assert!((r.y - 20.0).abs() < 1e-12);
    }
}
