use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};
use sfm_core::{CameraModel, FixedIntrinsics, CAMERA_PARAM_DIM, POINT_PARAM_DIM};
use std::collections::{BTreeSet, HashMap};

/// Identifier for a parameter block in the IR.
///
/// This is stable within a `ProblemIR` instance and is used by residual blocks
/// to reference their parameter dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub usize);

/// What a parameter block stores and which scene entry owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Camera parameters of one image (11 values).
    Camera { image: usize },
    /// Position of one landmark (3 values).
    Point { point: usize },
}

impl BlockKind {
    /// Storage dimension implied by the kind.
    pub fn dim(self) -> usize {
        match self {
            BlockKind::Camera { .. } => CAMERA_PARAM_DIM,
            BlockKind::Point { .. } => POINT_PARAM_DIM,
        }
    }

    /// Canonical block name, also used as the key of value maps.
    pub fn block_name(self) -> String {
        match self {
            BlockKind::Camera { image } => format!("cam/{image}"),
            BlockKind::Point { point } => format!("point/{point}"),
        }
    }
}

/// Fixed parameter mask for a block.
///
/// Backends interpret this as per-index fixing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedMask {
    fixed_indices: BTreeSet<usize>,
}

impl FixedMask {
    /// Creates a mask with no fixed indices.
    pub fn all_free() -> Self {
        Self::default()
    }

    /// Creates a mask with all indices fixed.
    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed_indices: (0..dim).collect(),
        }
    }

    /// Creates a mask from an explicit list of indices.
    pub fn fix_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fixed_indices: indices.into_iter().collect(),
        }
    }

    /// Mask holding the camera values a model does not optimize.
    pub fn for_camera_model(model: CameraModel) -> Self {
        Self::fix_indices(model.fixed_indices())
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed_indices.contains(&idx)
    }

    /// Returns `true` if all indices `[0, dim)` are fixed.
    pub fn is_all_fixed(&self, dim: usize) -> bool {
        (0..dim).all(|i| self.fixed_indices.contains(&i))
    }

    /// Iterates over fixed indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed_indices.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_indices.is_empty()
    }
}

/// Robust loss applied to a residual block.
///
/// Each observation gets its own residual block, so robustification acts per
/// observation rather than per image.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobustLoss {
    #[default]
    None,
    Cauchy {
        scale: f64,
    },
}

/// Reprojection factor: one observed pixel of one point in one image.
///
/// Parameters: `[camera (11), point (3)]`. The residual is `uv - projection`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReprojectionFactor {
    pub model: CameraModel,
    /// Observed pixel.
    pub uv: [f64; 2],
    /// Intrinsics snapshot taken when the factor was built.
    pub fixed: FixedIntrinsics,
}

impl ReprojectionFactor {
    pub const RESIDUAL_DIM: usize = 2;
}

/// Parameter block definition in the IR.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub kind: BlockKind,
    pub dim: usize,
    pub fixed: FixedMask,
}

/// Residual block definition in the IR.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub camera: ParamId,
    pub point: ParamId,
    pub loss: RobustLoss,
    pub factor: ReprojectionFactor,
}

impl ResidualBlock {
    /// Parameter blocks in the order the factor expects them.
    pub fn params(&self) -> [ParamId; 2] {
        [self.camera, self.point]
    }
}

/// Backend-agnostic optimization problem representation.
///
/// Residual blocks reference parameter blocks by [`ParamId`]; values live in a
/// separate map keyed by block name. Backends compile this IR into
/// solver-specific problems.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
    by_name: HashMap<String, ParamId>,
}

impl ProblemIR {
    /// Creates an empty IR.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter block and returns its `ParamId`.
    ///
    /// Block names are unique; adding a second block for the same scene entry
    /// is an error.
    pub fn add_param_block(&mut self, kind: BlockKind, fixed: FixedMask) -> Result<ParamId> {
        let name = kind.block_name();
        ensure!(
            !self.by_name.contains_key(&name),
            "parameter block {} already exists",
            name
        );
        let id = ParamId(self.params.len());
        self.by_name.insert(name.clone(), id);
        self.params.push(ParamBlock {
            id,
            name,
            kind,
            dim: kind.dim(),
            fixed,
        });
        Ok(id)
    }

    /// Adds a residual block to the IR.
    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    /// Finds a parameter by name.
    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.by_name.get(name).copied()
    }

    pub fn param(&self, id: ParamId) -> Result<&ParamBlock> {
        self.params
            .get(id.0)
            .ok_or_else(|| anyhow!("unknown parameter block {:?}", id))
    }

    /// Replace the fixed mask of a block.
    pub fn set_fixed(&mut self, id: ParamId, fixed: FixedMask) -> Result<()> {
        let block = self
            .params
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("unknown parameter block {:?}", id))?;
        block.fixed = fixed;
        Ok(())
    }

    /// Validates internal consistency and factor expectations.
    pub fn validate(&self) -> Result<()> {
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "param id mismatch: expected {}, got {:?}",
                idx,
                param.id
            );
            ensure!(
                param.dim == param.kind.dim(),
                "param {} has dim {}, expected {}",
                param.name,
                param.dim,
                param.kind.dim()
            );
            for fixed_idx in param.fixed.iter() {
                ensure!(
                    fixed_idx < param.dim,
                    "param {} fixed index {} out of range",
                    param.name,
                    fixed_idx
                );
            }
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            for id in residual.params() {
                ensure!(
                    id.0 < self.params.len(),
                    "residual {} references missing param {:?}",
                    r_idx,
                    id
                );
            }
            let cam = &self.params[residual.camera.0];
            let point = &self.params[residual.point.0];
            ensure!(
                matches!(cam.kind, BlockKind::Camera { .. }),
                "residual {} expects a camera block first, got {}",
                r_idx,
                cam.name
            );
            ensure!(
                matches!(point.kind, BlockKind::Point { .. }),
                "residual {} expects a point block second, got {}",
                r_idx,
                point.name
            );
            match residual.loss {
                RobustLoss::None => {}
                RobustLoss::Cauchy { scale } => {
                    ensure!(
                        scale > 0.0,
                        "residual {} robust loss scale must be positive, got {}",
                        r_idx,
                        scale
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor() -> ReprojectionFactor {
        ReprojectionFactor {
            model: CameraModel::Full,
            uv: [1.0, 2.0],
            fixed: FixedIntrinsics {
                focal: 1.0,
                cx: 0.0,
                cy: 0.0,
            },
        }
    }

    #[test]
    fn blocks_get_sequential_ids_and_unique_names() {
        let mut ir = ProblemIR::new();
        let cam = ir
            .add_param_block(BlockKind::Camera { image: 3 }, FixedMask::all_free())
            .unwrap();
        let pt = ir
            .add_param_block(BlockKind::Point { point: 7 }, FixedMask::all_free())
            .unwrap();
        assert_eq!(cam, ParamId(0));
        assert_eq!(pt, ParamId(1));
        assert_eq!(ir.param_by_name("cam/3"), Some(cam));
        assert_eq!(ir.param_by_name("point/7"), Some(pt));
        assert_eq!(ir.param(pt).unwrap().dim, 3);
        assert!(ir
            .add_param_block(BlockKind::Camera { image: 3 }, FixedMask::all_free())
            .is_err());
    }

    #[test]
    fn validate_rejects_swapped_blocks() {
        let mut ir = ProblemIR::new();
        let cam = ir
            .add_param_block(BlockKind::Camera { image: 0 }, FixedMask::all_free())
            .unwrap();
        let pt = ir
            .add_param_block(BlockKind::Point { point: 0 }, FixedMask::all_free())
            .unwrap();
        ir.add_residual_block(ResidualBlock {
            camera: cam,
            point: pt,
            loss: RobustLoss::None,
            factor: factor(),
        });
        ir.validate().unwrap();

        ir.add_residual_block(ResidualBlock {
            camera: pt,
            point: cam,
            loss: RobustLoss::None,
            factor: factor(),
        });
        assert!(ir.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_fixed_index_and_loss_scale() {
        let mut ir = ProblemIR::new();
        let pt = ir
            .add_param_block(BlockKind::Point { point: 0 }, FixedMask::fix_indices([5]))
            .unwrap();
        assert!(ir.validate().is_err());
        ir.set_fixed(pt, FixedMask::all_fixed(3)).unwrap();
        ir.validate().unwrap();

        let cam = ir
            .add_param_block(BlockKind::Camera { image: 0 }, FixedMask::all_free())
            .unwrap();
        ir.add_residual_block(ResidualBlock {
            camera: cam,
            point: pt,
            loss: RobustLoss::Cauchy { scale: 0.0 },
            factor: factor(),
        });
        assert!(ir.validate().is_err());
    }

    #[test]
    fn camera_model_masks() {
        let mask = FixedMask::for_camera_model(CameraModel::SharedPrincipalPoint);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![7, 8, 9, 10]);
        assert!(FixedMask::for_camera_model(CameraModel::Full).is_empty());
        assert!(FixedMask::all_fixed(3).is_all_fixed(3));
        assert!(!FixedMask::fix_indices([0, 2]).is_all_fixed(3));
    }
}
