use svgsketch_engine::errors::PipelineError;
use thiserror::Error;

use crate::cli::{MIN_ARGUMENTS, USAGE};

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("expected at least {} arguments, found {found}. {}", MIN_ARGUMENTS, USAGE)]
    Usage { found: usize },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl FrontendError {
    /// 参数错误为 2，其余沿用流程错误的退出码。
    pub fn exit_code(&self) -> i32 {
        match self {
            FrontendError::Usage { .. } => 2,
            FrontendError::Pipeline(err) => err.exit_code(),
        }
    }
}
