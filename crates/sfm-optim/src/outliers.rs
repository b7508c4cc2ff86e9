//! Reprojection-error outlier rejection.

use log::{debug, warn};
use sfm_core::Scene;

/// Squared pixel error above which a point is marked invalid, unless the caller picks one.
pub const DEFAULT_OUTLIER_THRESHOLD_SQ: f64 = 4.0;

/// Result of an outlier marking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The threshold was not positive; nothing was inspected.
    Disabled,
    /// Number of points newly marked invalid.
    Marked(usize),
}

impl MarkOutcome {
    /// Count in the conventional signed form: `-1` when disabled.
    pub fn as_count(self) -> i64 {
        match self {
            MarkOutcome::Disabled => -1,
            MarkOutcome::Marked(n) => n as i64,
        }
    }

    /// Points marked, zero when disabled.
    pub fn marked(self) -> usize {
        match self {
            MarkOutcome::Disabled => 0,
            MarkOutcome::Marked(n) => n,
        }
    }
}

/// Mark valid points whose reprojection error exceeds `threshold_sq` in any image.
///
/// Projection always uses the full 11-value camera model, whatever model the
/// problem was built with. Points only go from valid to invalid here; already
/// invalid points are not inspected. A NaN or non-positive threshold disables
/// the pass. Visibility entries that do not resolve against the scene are
/// skipped with a warning.
pub fn mark_noisy_points(scene: &mut Scene, threshold_sq: f64) -> MarkOutcome {
    if threshold_sq.is_nan() || threshold_sq <= 0.0 {
        debug!("outlier marking disabled (threshold {})", threshold_sq);
        return MarkOutcome::Disabled;
    }

    let mut entries: Vec<_> = scene.visibility.iter().collect();
    entries.sort_unstable_by_key(|(key, _)| *key);

    let mut noisy = Vec::new();
    let mut inspected = 0usize;
    for (key, point) in entries {
        let obs = match scene.resolve(key, point) {
            Ok(obs) => obs,
            Err(err) => {
                warn!("skipping visibility entry {:?}: {}", key, err);
                continue;
            }
        };
        let landmark = &scene.points[obs.point];
        if !landmark.is_valid() {
            continue;
        }
        inspected += 1;
        let projected = scene.cameras[obs.image].project_full(&landmark.position);
        let err_sq = (projected - obs.uv).norm_squared();
        if err_sq > threshold_sq {
            noisy.push(obs.point);
        }
    }

    let marked = noisy
        .into_iter()
        .filter(|&point| scene.points[point].invalidate())
        .count();

    debug!(
        "outlier marking: {} observations inspected, {} points marked (threshold {} px^2)",
        inspected, marked, threshold_sq
    );
    MarkOutcome::Marked(marked)
}
