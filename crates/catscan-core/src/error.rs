//! 错误类型
use std::path::PathBuf;
use thiserror::Error;

/// 扫描条件校验失败：在启动扫描前返回，不会进入遍历
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange { field: &'static str, value: i64, min: i64, max: i64 },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown {field} '{value}'")]
    Unknown { field: &'static str, value: String },
}

/// 扫描无法启动
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("search directory does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("search path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
