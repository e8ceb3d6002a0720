use std::path::PathBuf;

use thiserror::Error;

/// 引擎错误
///
/// 只在 API 边界（骨骼创建、二进制解码、资源加载）使用，
/// 运行时核心走局部降级，不向上传播。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob parse error: {0}")]
    BlobParse(String),

    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("Duplicate bone name: {0}")]
    DuplicateBoneName(String),

    #[error("Asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, EngineError>;
