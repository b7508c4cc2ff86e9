//! Backend-independent intermediate representation of optimization problems.

mod types;

pub use types::{
    BlockKind, FixedMask, ParamBlock, ParamId, ProblemIR, ReprojectionFactor, ResidualBlock,
    RobustLoss,
};
