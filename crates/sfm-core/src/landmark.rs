use serde::{Deserialize, Serialize};

use crate::math::Pt3;

/// A triangulated 3D point together with its trust flag.
///
/// Only valid landmarks take part in optimization. Changing validity never
/// touches `position`, so a rejected point can be re-validated unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub position: Pt3,
    pub valid: bool,
}

impl Landmark {
    /// A valid landmark at `position`.
    pub fn new(position: Pt3) -> Self {
        Self {
            position,
            valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark as an outlier. Returns `true` if the landmark was valid before.
    pub fn invalidate(&mut self) -> bool {
        std::mem::replace(&mut self.valid, false)
    }

    pub fn revalidate(&mut self) {
        self.valid = true;
    }

    /// Encode validity in the sign of `z` (negative means invalid).
    ///
    /// Interop helper for pipelines that store points as bare `[x, y, z]`
    /// and keep every point at non-negative `z`.
    pub fn to_signed_z(&self) -> Pt3 {
        let mut p = self.position;
        p.z = if self.valid { p.z.abs() } else { -p.z.abs() };
        p
    }

    /// Inverse of [`Landmark::to_signed_z`]: negative `z` yields an invalid
    /// landmark at `|z|`.
    pub fn from_signed_z(p: Pt3) -> Self {
        let valid = p.z >= 0.0;
        Self {
            position: Pt3::new(p.x, p.y, p.z.abs()),
            valid,
        }
    }
}

impl From<Pt3> for Landmark {
    fn from(position: Pt3) -> Self {
        Self::new(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_is_one_way_and_keeps_position() {
        let mut lm = Landmark::new(Pt3::new(1.0, 2.0, 3.0));
        assert!(lm.invalidate());
        assert!(!lm.invalidate());
        assert!(!lm.is_valid());
        assert_eq!(lm.position, Pt3::new(1.0, 2.0, 3.0));
        lm.revalidate();
        assert!(lm.is_valid());
    }

    #[test]
    fn signed_z_roundtrip_preserves_magnitude() {
        let mut lm = Landmark::new(Pt3::new(0.5, -0.5, 4.0));
        assert_eq!(lm.to_signed_z().z, 4.0);
        lm.invalidate();
        let encoded = lm.to_signed_z();
        assert_eq!(encoded.z, -4.0);
        assert_eq!(Landmark::from_signed_z(encoded), lm);
    }

    #[test]
    fn landmark_json_roundtrip() {
        let lm = Landmark::new(Pt3::new(0.1, 0.2, 0.3));
        let json = serde_json::to_string(&lm).unwrap();
        let back: Landmark = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lm);
    }
}
