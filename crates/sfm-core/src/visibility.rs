use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Bits reserved for each of the image and keypoint fields of a key.
pub const KEY_FIELD_BITS: u32 = 16;

/// Largest image or keypoint index that fits in a key field.
pub const MAX_KEY_INDEX: usize = (1 << KEY_FIELD_BITS) - 1;

const FIELD_MASK: u32 = (1 << KEY_FIELD_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VisibilityError {
    #[error("image index {0} does not fit in a 16-bit key field")]
    ImageIndexOverflow(usize),
    #[error("keypoint index {0} does not fit in a 16-bit key field")]
    KeypointIndexOverflow(usize),
}

/// Composite `(image, keypoint)` key: image in the high 16 bits, keypoint in
/// the low 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisibilityKey(u32);

impl VisibilityKey {
    /// Pack an image and keypoint index, rejecting indices wider than 16 bits.
    pub fn encode(image: usize, keypoint: usize) -> Result<Self, VisibilityError> {
        if image > MAX_KEY_INDEX {
            return Err(VisibilityError::ImageIndexOverflow(image));
        }
        if keypoint > MAX_KEY_INDEX {
            return Err(VisibilityError::KeypointIndexOverflow(keypoint));
        }
        Ok(Self(((image as u32) << KEY_FIELD_BITS) | keypoint as u32))
    }

    /// Unpack into `(image, keypoint)`.
    pub fn decode(self) -> (usize, usize) {
        (self.image(), self.keypoint())
    }

    pub fn image(self) -> usize {
        ((self.0 >> KEY_FIELD_BITS) & FIELD_MASK) as usize
    }

    pub fn keypoint(self) -> usize {
        (self.0 & FIELD_MASK) as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// Sparse map from `(image, keypoint)` to a global point id.
///
/// Iteration order is unspecified; every entry contributes independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityIndex {
    entries: HashMap<VisibilityKey, usize>,
}

impl VisibilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `keypoint` in `image` observes `point`.
    ///
    /// Returns the point id previously stored under the same key, if any.
    pub fn insert(
        &mut self,
        image: usize,
        keypoint: usize,
        point: usize,
    ) -> Result<Option<usize>, VisibilityError> {
        let key = VisibilityKey::encode(image, keypoint)?;
        Ok(self.entries.insert(key, point))
    }

    /// Point id observed by `keypoint` in `image`.
    pub fn get(&self, image: usize, keypoint: usize) -> Option<usize> {
        let key = VisibilityKey::encode(image, keypoint).ok()?;
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, point)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (VisibilityKey, usize)> + '_ {
        self.entries.iter().map(|(k, p)| (*k, *p))
    }

    /// `(keypoint, point)` pairs observed in one image, sorted by keypoint.
    pub fn entries_for_image(&self, image: usize) -> Vec<(usize, usize)> {
        let mut out: Vec<(usize, usize)> = self
            .iter()
            .filter(|(k, _)| k.image() == image)
            .map(|(k, p)| (k.keypoint(), p))
            .collect();
        out.sort_unstable();
        out
    }

    /// Drop every observation of `point`. Returns how many entries were removed.
    pub fn remove_point(&mut self, point: usize) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, p| *p != point);
        before - self.entries.len()
    }
}
