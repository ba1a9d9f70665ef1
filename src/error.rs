//! 错误定义模块

use thiserror::Error;

/// DIP工具统一错误类型
///
/// 分组失败不是错误, 只会体现在 `ResolutionResult::matched` 上。
#[derive(Error, Debug)]
pub enum DipError {
    /// 上传的目录缺少必要列, 之前的目录保持不变
    #[error("{catalog}缺少必要列: {}", .missing.join(", "))]
    CatalogSchema {
        catalog: &'static str,
        missing: Vec<String>,
    },

    /// 上传的目录无法读取或格式错误
    #[error("文件读取错误: {0}")]
    CatalogIo(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for DipError {
    fn from(e: csv::Error) -> Self {
        DipError::CatalogIo(e.to_string())
    }
}

impl From<serde_json::Error> for DipError {
    fn from(e: serde_json::Error) -> Self {
        DipError::CatalogIo(e.to_string())
    }
}

impl From<config::ConfigError> for DipError {
    fn from(e: config::ConfigError) -> Self {
        DipError::Config(e.to_string())
    }
}

/// DIP工具统一结果类型
pub type Result<T> = std::result::Result<T, DipError>;
