//! Core geometry and bookkeeping primitives for `sfm-adjust`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Pt3`, ...) and an
//!   axis-angle rotation usable with dual numbers,
//! - the 11-value camera parameter layout and the three camera models
//!   (`Full`, `SharedPrincipalPoint`, `Minimal`) built on top of it,
//! - landmarks with an explicit validity flag,
//! - the sparse visibility index mapping `(image, keypoint)` to point ids,
//! - the [`Scene`] container tying cameras, points and observations together.
//!
//! Camera pipeline:
//! `pixel = f * radial(r²) * (R(aa) * X + t).xy / z + c`

/// Camera parameter layout and projection models.
pub mod camera;
/// Landmarks (3D points) with validity flags.
pub mod landmark;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Cameras, points, keypoints and visibility in one container.
pub mod scene;
/// Deterministic synthetic scenes for tests and examples.
pub mod synthetic;
/// Sparse `(image, keypoint) -> point` visibility index.
pub mod visibility;

pub use camera::*;
pub use landmark::*;
pub use math::*;
pub use scene::*;
pub use visibility::*;
