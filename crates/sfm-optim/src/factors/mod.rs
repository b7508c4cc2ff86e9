//! Residual factor implementations with automatic differentiation support.
//!
//! Factors compute the difference between an observed keypoint and the
//! projection of a landmark through a camera. They are generic over
//! [`nalgebra::RealField`] so the same code runs on `f64` for evaluation and on
//! dual numbers for Jacobians.
//!
//! - [`reprojection`] - pixel reprojection error for the three camera models

pub mod reprojection;
