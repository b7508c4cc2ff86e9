use nalgebra::{RealField, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::math::{lit, rotate_axis_angle, Pt3, Real, Vec2, Vec3};
use crate::scene::SceneError;

/// Number of values in a camera parameter block.
pub const CAMERA_PARAM_DIM: usize = 11;

/// Number of values in a point parameter block.
pub const POINT_PARAM_DIM: usize = 3;

/// Camera parameters in the common 11-value layout.
///
/// `[rx, ry, rz, tx, ty, tz, f, cx, cy, k1, k2]`:
/// axis-angle rotation (world to camera), translation, focal length,
/// principal point and two radial distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraParams(pub [Real; CAMERA_PARAM_DIM]);

impl Default for CameraParams {
    fn default() -> Self {
        let mut v = [0.0; CAMERA_PARAM_DIM];
        v[6] = 1.0;
        Self(v)
    }
}

impl CameraParams {
    pub const ROTATION: Range<usize> = 0..3;
    pub const TRANSLATION: Range<usize> = 3..6;
    pub const FOCAL: usize = 6;
    pub const PRINCIPAL_POINT: Range<usize> = 7..9;
    pub const DISTORTION: Range<usize> = 9..11;

    pub fn new(
        rotation: Vec3,
        translation: Vec3,
        focal: Real,
        principal_point: Vec2,
        k1: Real,
        k2: Real,
    ) -> Self {
        Self([
            rotation.x,
            rotation.y,
            rotation.z,
            translation.x,
            translation.y,
            translation.z,
            focal,
            principal_point.x,
            principal_point.y,
            k1,
            k2,
        ])
    }

    /// Build from a dense slice, checking its length.
    pub fn from_slice(v: &[Real]) -> Result<Self, SceneError> {
        let arr: [Real; CAMERA_PARAM_DIM] =
            v.try_into().map_err(|_| SceneError::DimensionMismatch {
                expected: CAMERA_PARAM_DIM,
                got: v.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.0
    }

    pub fn rotation(&self) -> Vec3 {
        Vec3::new(self.0[0], self.0[1], self.0[2])
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.0[3], self.0[4], self.0[5])
    }

    pub fn focal(&self) -> Real {
        self.0[Self::FOCAL]
    }

    pub fn principal_point(&self) -> Vec2 {
        Vec2::new(self.0[7], self.0[8])
    }

    /// Radial distortion coefficients `(k1, k2)`.
    pub fn distortion(&self) -> (Real, Real) {
        (self.0[9], self.0[10])
    }

    /// Snapshot of the intrinsics that reduced models treat as constants.
    pub fn fixed_intrinsics(&self) -> FixedIntrinsics {
        FixedIntrinsics {
            focal: self.focal(),
            cx: self.0[7],
            cy: self.0[8],
        }
    }

    /// Transform a world point into the camera frame.
    pub fn to_camera_frame(&self, p: &Pt3) -> Vec3 {
        rotate_axis_angle(&self.rotation(), &p.coords) + self.translation()
    }

    /// Project a world point with the given model.
    ///
    /// `fixed` supplies the intrinsics the model does not take from this camera;
    /// it is ignored by [`CameraModel::Full`].
    pub fn project(&self, model: CameraModel, p: &Pt3, fixed: &FixedIntrinsics) -> Vec2 {
        project_generic(model, &self.0, p.coords.as_slice(), fixed)
    }

    /// Project a world point with the full distortion model.
    pub fn project_full(&self, p: &Pt3) -> Vec2 {
        self.project(CameraModel::Full, p, &self.fixed_intrinsics())
    }
}

/// Intrinsics captured from a camera at residual-construction time.
///
/// Reduced camera models read their principal point (and, for
/// [`CameraModel::Minimal`], their focal length) from here instead of from the
/// optimized block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedIntrinsics {
    pub focal: Real,
    pub cx: Real,
    pub cy: Real,
}

/// Camera parameterization used when building residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraModel {
    /// Rotation, translation, focal length, principal point and `k1, k2` (11 DOF).
    #[default]
    Full,
    /// Rotation, translation and focal length; principal point is a constant (7 DOF).
    SharedPrincipalPoint,
    /// Rotation and translation; focal length and principal point are constants (6 DOF).
    Minimal,
}

impl CameraModel {
    /// Number of leading camera values the model optimizes.
    pub fn dof(self) -> usize {
        match self {
            CameraModel::Full => 11,
            CameraModel::SharedPrincipalPoint => 7,
            CameraModel::Minimal => 6,
        }
    }

    /// Camera block indices held constant under this model.
    pub fn fixed_indices(self) -> Range<usize> {
        self.dof()..CAMERA_PARAM_DIM
    }
}

/// Project a world point to pixels for any camera model.
///
/// Generic over [`RealField`] so the same code serves plain evaluation and
/// forward-mode autodiff. `camera` must follow the [`CameraParams`] layout;
/// values past [`CameraModel::dof`] are not read.
pub fn project_generic<T: RealField>(
    model: CameraModel,
    camera: &[T],
    point: &[T],
    fixed: &FixedIntrinsics,
) -> Vector2<T> {
    debug_assert!(camera.len() >= model.dof(), "camera block too short");
    debug_assert!(point.len() >= POINT_PARAM_DIM, "point must have 3 values");

    let aa = Vector3::new(camera[0].clone(), camera[1].clone(), camera[2].clone());
    let t = Vector3::new(camera[3].clone(), camera[4].clone(), camera[5].clone());
    let pw = Vector3::new(point[0].clone(), point[1].clone(), point[2].clone());
    let pc = rotate_axis_angle(&aa, &pw) + t;

    let x_n = pc.x.clone() / pc.z.clone();
    let y_n = pc.y.clone() / pc.z.clone();

    match model {
        CameraModel::Full => {
            let f = camera[6].clone();
            let cx = camera[7].clone();
            let cy = camera[8].clone();
            let k1 = camera[9].clone();
            let k2 = camera[10].clone();
            let r2 = x_n.clone() * x_n.clone() + y_n.clone() * y_n.clone();
            let radial = T::one() + r2.clone() * (k1 + k2 * r2);
            Vector2::new(
                f.clone() * radial.clone() * x_n + cx,
                f * radial * y_n + cy,
            )
        }
        CameraModel::SharedPrincipalPoint => {
            let f = camera[6].clone();
            Vector2::new(
                f.clone() * x_n + lit::<T>(fixed.cx),
                f * y_n + lit::<T>(fixed.cy),
            )
        }
        CameraModel::Minimal => {
            let f = lit::<T>(fixed.focal);
            Vector2::new(
                f.clone() * x_n + lit::<T>(fixed.cx),
                f * y_n + lit::<T>(fixed.cy),
            )
        }
    }
}
