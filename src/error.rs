use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/**
 * 检索错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * 前五类（路径、不存在、超限、权限、请求格式）属于终止性错误，
 * 在扫描开始之前返回；`SourceShrunk` 与 `Io` 只在打开阶段以 `Err` 出现，
 * 扫描中途发生时会被记录为 `ScanHalt` 并随部分结果返回。
 */
#[derive(Error, Debug, Diagnostic)]
pub enum RetrievalError {
    #[error("Path traversal rejected: {reason}")]
    #[diagnostic(
        code(retriever::path_traversal_rejected),
        help("Request a regular file inside the configured log directory")
    )]
    PathTraversalRejected { requested: String, reason: String },

    #[error("Not found: {}", path.display())]
    #[diagnostic(code(retriever::not_found))]
    NotFound { path: PathBuf },

    #[error("File size {size} bytes exceeds the configured limit of {limit} bytes")]
    #[diagnostic(
        code(retriever::size_limit_exceeded),
        help("Raise engine.max_file_size_bytes or rotate the log file")
    )]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Permission denied: {}", path.display())]
    #[diagnostic(code(retriever::permission_denied))]
    PermissionDenied { path: PathBuf },

    #[error("Malformed request: {0}")]
    #[diagnostic(
        code(retriever::malformed_request),
        help("filename must be non-empty and max_entries must be within 1..=10000")
    )]
    MalformedRequest(String),

    #[error("Source shrunk: read of {length} bytes at offset {offset} exceeds current size {current_size}")]
    #[diagnostic(code(retriever::source_shrunk))]
    SourceShrunk {
        offset: u64,
        length: usize,
        current_size: u64,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(retriever::io_failure))]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(retriever::config_error))]
    Config(String),

    #[error("Timeout error: {0}")]
    #[diagnostic(code(retriever::timeout_error))]
    Timeout(String),
}

impl RetrievalError {
    /**
     * 按 io::ErrorKind 归类 IO 错误
     */
    pub fn from_io(error: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error.kind() {
            std::io::ErrorKind::NotFound => RetrievalError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => RetrievalError::PermissionDenied { path },
            _ => RetrievalError::Io {
                message: format!("{}: {}", path.display(), error),
                path: Some(path),
                source: Some(error),
            },
        }
    }

    pub fn path_rejected(requested: impl Into<String>, reason: impl Into<String>) -> Self {
        RetrievalError::PathTraversalRejected {
            requested: requested.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        RetrievalError::MalformedRequest(message.into())
    }

    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            RetrievalError::PathTraversalRejected { .. } => "PATH_TRAVERSAL_REJECTED",
            RetrievalError::NotFound { .. } => "NOT_FOUND",
            RetrievalError::SizeLimitExceeded { .. } => "SIZE_LIMIT_EXCEEDED",
            RetrievalError::PermissionDenied { .. } => "PERMISSION_DENIED",
            RetrievalError::MalformedRequest(_) => "MALFORMED_REQUEST",
            RetrievalError::SourceShrunk { .. } => "SOURCE_SHRUNK",
            RetrievalError::Io { .. } => "IO_FAILURE",
            RetrievalError::Config(_) => "CONFIG_ERROR",
            RetrievalError::Timeout(_) => "TIMEOUT",
        }
    }

    /**
     * 终止性错误：不产生任何部分结果
     */
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RetrievalError::SourceShrunk { .. } | RetrievalError::Io { .. }
        )
    }
}

/**
 * 结构化错误响应，交给路由层或命令行输出
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&RetrievalError> for ErrorResponse {
    fn from(error: &RetrievalError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, RetrievalError>;
