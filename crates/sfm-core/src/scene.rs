//! Scene container: cameras, landmarks, per-image keypoints and visibility.
//!
//! The scene owns all parameter storage. Optimization problems refer to its
//! cameras and points by index, never by address, so the containers may grow
//! between rounds without invalidating anything built from them.

use thiserror::Error;

use crate::camera::CameraParams;
use crate::landmark::Landmark;
use crate::math::Vec2;
use crate::visibility::{VisibilityIndex, VisibilityKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("visibility entry references image {image}, but the scene has {num_images} images")]
    ImageOutOfRange { image: usize, num_images: usize },
    #[error("image {image} has {num_keypoints} keypoints, entry references keypoint {keypoint}")]
    KeypointOutOfRange {
        image: usize,
        keypoint: usize,
        num_keypoints: usize,
    },
    #[error("visibility entry references point {point}, but the scene has {num_points} points")]
    PointOutOfRange { point: usize, num_points: usize },
    #[error("camera count {cameras} does not match keypoint image count {images}")]
    CameraCountMismatch { cameras: usize, images: usize },
    #[error("parameter dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// A visibility entry resolved against the scene storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleObservation {
    pub key: VisibilityKey,
    pub image: usize,
    pub keypoint: usize,
    pub point: usize,
    /// Observed pixel.
    pub uv: Vec2,
}

/// Cameras (one per image), landmarks, keypoints and their visibility.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub cameras: Vec<CameraParams>,
    pub points: Vec<Landmark>,
    /// Keypoint pixels per image, addressed by `(image, keypoint)`.
    pub keypoints: Vec<Vec<Vec2>>,
    pub visibility: VisibilityIndex,
}

impl Scene {
    /// Create a scene, checking that there is exactly one camera per image.
    ///
    /// Visibility entries are not checked here; see [`Scene::validate`].
    pub fn new(
        cameras: Vec<CameraParams>,
        points: Vec<Landmark>,
        keypoints: Vec<Vec<Vec2>>,
        visibility: VisibilityIndex,
    ) -> Result<Self, SceneError> {
        if cameras.len() != keypoints.len() {
            return Err(SceneError::CameraCountMismatch {
                cameras: cameras.len(),
                images: keypoints.len(),
            });
        }
        Ok(Self {
            cameras,
            points,
            keypoints,
            visibility,
        })
    }

    pub fn num_images(&self) -> usize {
        self.cameras.len()
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_valid_points(&self) -> usize {
        self.points.iter().filter(|p| p.valid).count()
    }

    /// Observed pixel for `(image, keypoint)`.
    pub fn observation(&self, image: usize, keypoint: usize) -> Option<Vec2> {
        self.keypoints.get(image)?.get(keypoint).copied()
    }

    /// Resolve one visibility entry, checking every index against storage.
    pub fn resolve(
        &self,
        key: VisibilityKey,
        point: usize,
    ) -> Result<VisibleObservation, SceneError> {
        let (image, keypoint) = key.decode();
        if image >= self.cameras.len() || image >= self.keypoints.len() {
            return Err(SceneError::ImageOutOfRange {
                image,
                num_images: self.cameras.len().min(self.keypoints.len()),
            });
        }
        let kps = &self.keypoints[image];
        let uv = *kps.get(keypoint).ok_or(SceneError::KeypointOutOfRange {
            image,
            keypoint,
            num_keypoints: kps.len(),
        })?;
        if point >= self.points.len() {
            return Err(SceneError::PointOutOfRange {
                point,
                num_points: self.points.len(),
            });
        }
        Ok(VisibleObservation {
            key,
            image,
            keypoint,
            point,
            uv,
        })
    }

    /// Resolve every visibility entry, in index iteration order.
    pub fn observations(
        &self,
    ) -> impl Iterator<Item = Result<VisibleObservation, SceneError>> + '_ {
        self.visibility
            .iter()
            .map(move |(key, point)| self.resolve(key, point))
    }

    /// Check camera/image counts and every visibility entry.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.cameras.len() != self.keypoints.len() {
            return Err(SceneError::CameraCountMismatch {
                cameras: self.cameras.len(),
                images: self.keypoints.len(),
            });
        }
        for obs in self.observations() {
            obs?;
        }
        Ok(())
    }
}
