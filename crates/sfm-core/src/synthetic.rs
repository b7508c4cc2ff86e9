//! Deterministic synthetic scenes.
//!
//! Builds a small rig of cameras on a horizontal line looking down +Z at a
//! slightly non-planar grid of points, with noiseless keypoints produced by the
//! full camera model and every point visible in every image. Keypoint `j` of
//! each image observes point `j`.

use crate::{
    CameraParams, Landmark, Pt3, Real, Scene, Vec2, Vec3, VisibilityError, VisibilityIndex,
};

/// Parameters of a synthetic scene.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub num_cameras: usize,
    pub nx: usize,
    pub ny: usize,
    pub spacing: Real,
    pub depth: Real,
    pub baseline: Real,
    pub focal: Real,
    pub principal_point: Vec2,
    pub k1: Real,
    pub k2: Real,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            num_cameras: 4,
            nx: 5,
            ny: 4,
            spacing: 0.25,
            depth: 5.0,
            baseline: 0.3,
            focal: 500.0,
            principal_point: Vec2::new(320.0, 240.0),
            k1: 0.0,
            k2: 0.0,
        }
    }
}

/// Grid of `nx * ny` points centered on the optical axis at roughly `depth`.
///
/// Depth alternates in three steps of 0.1 so the structure is not planar.
/// Ordered row-major (Y major).
pub fn grid_points(nx: usize, ny: usize, spacing: Real, depth: Real) -> Vec<Pt3> {
    let x0 = 0.5 * (nx.saturating_sub(1)) as Real * spacing;
    let y0 = 0.5 * (ny.saturating_sub(1)) as Real * spacing;
    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let z = depth + 0.1 * ((i + j) % 3) as Real;
            points.push(Pt3::new(i as Real * spacing - x0, j as Real * spacing - y0, z));
        }
    }
    points
}

/// Cameras spaced `baseline` apart along X, each with a small yaw towards the center.
pub fn cameras_on_line(cfg: &SyntheticConfig) -> Vec<CameraParams> {
    let mid = 0.5 * cfg.num_cameras.saturating_sub(1) as Real;
    (0..cfg.num_cameras)
        .map(|i| {
            let offset = i as Real - mid;
            CameraParams::new(
                Vec3::new(0.0, 0.02 * offset, 0.0),
                Vec3::new(-cfg.baseline * offset, 0.0, 0.0),
                cfg.focal,
                cfg.principal_point,
                cfg.k1,
                cfg.k2,
            )
        })
        .collect()
}

/// Build a fully visible, noiseless scene.
pub fn scene(cfg: &SyntheticConfig) -> Result<Scene, VisibilityError> {
    let cameras = cameras_on_line(cfg);
    let points = grid_points(cfg.nx, cfg.ny, cfg.spacing, cfg.depth);

    let mut visibility = VisibilityIndex::new();
    let mut keypoints = Vec::with_capacity(cameras.len());
    for (image, cam) in cameras.iter().enumerate() {
        let kps: Vec<Vec2> = points.iter().map(|p| cam.project_full(p)).collect();
        for point in 0..points.len() {
            visibility.insert(image, point, point)?;
        }
        keypoints.push(kps);
    }

    Ok(Scene {
        cameras,
        points: points.into_iter().map(Landmark::new).collect(),
        keypoints,
        visibility,
    })
}
