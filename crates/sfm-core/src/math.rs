use nalgebra::{Point2, Point3, RealField, Vector2, Vector3};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;

/// Lift an `f64` constant into a generic real field (f64 or dual number).
#[inline]
pub fn lit<T: RealField>(v: f64) -> T {
    nalgebra::convert(v)
}

/// Rotate `p` by the axis-angle vector `aa` using Rodrigues' formula.
///
/// Near the identity the first-order expansion `p + aa × p` is used instead,
/// so derivatives stay finite when `T` is a dual number and `aa == 0`.
pub fn rotate_axis_angle<T: RealField>(aa: &Vector3<T>, p: &Vector3<T>) -> Vector3<T> {
    let theta2 = aa.norm_squared();
    if theta2 > lit::<T>(f64::EPSILON) {
        let theta = theta2.sqrt();
        let (sin_t, cos_t) = theta.clone().sin_cos();
        let w = aa / theta;
        let w_cross_p = w.cross(p);
        let tmp = w.dot(p) * (T::one() - cos_t.clone());
        p * cos_t + w_cross_p * sin_t + w * tmp
    } else {
        p + aa.cross(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    #[test]
    fn rodrigues_matches_rotation_matrix() {
        let aa = Vec3::new(0.3, -0.2, 0.7);
        let p = Vec3::new(1.0, 2.0, -0.5);
        let expected = Rotation3::from_scaled_axis(aa) * p;
        let got = rotate_axis_angle(&aa, &p);
        assert!(
            (got - expected).norm() < 1e-12,
            "got {got}, expected {expected}"
        );
    }

    #[test]
    fn zero_rotation_is_identity() {
        let p = Vec3::new(0.4, -1.0, 3.0);
        let got = rotate_axis_angle(&Vec3::zeros(), &p);
        assert_eq!(got, p);
    }

    #[test]
    fn tiny_rotation_uses_first_order_branch() {
        let aa = Vec3::new(1e-9, 0.0, 0.0);
        let p = Vec3::new(0.0, 1.0, 0.0);
        let expected = Rotation3::from_scaled_axis(aa) * p;
        assert!((rotate_axis_angle(&aa, &p) - expected).norm() < 1e-15);
    }
}
