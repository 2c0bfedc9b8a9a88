//! 检索请求
//!
//! 使用 validator 框架在访问任何文件之前完成参数校验。

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{Result, RetrievalError};

/// 默认返回条目数
pub const DEFAULT_MAX_ENTRIES: usize = 100;
/// 单次请求允许的最大条目数
pub const MAX_ENTRIES_LIMIT: usize = 10_000;

/// 尾部检索请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TailRequest {
    /// 相对于日志目录的文件路径
    #[validate(
        length(min = 1, max = 4096, message = "filename must be 1-4096 bytes"),
        custom(function = "validate_filename")
    )]
    pub filename: String,

    #[serde(default = "default_max_entries")]
    #[validate(range(min = 1, max = 10000, message = "maxEntries must be within 1..=10000"))]
    pub max_entries: usize,

    /// 大小写不敏感的关键词（可选）
    #[serde(default)]
    pub keyword: Option<String>,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn validate_filename(filename: &str) -> std::result::Result<(), ValidationError> {
    if filename.trim().is_empty() {
        return Err(ValidationError::new("blank_filename")
            .with_message("filename must not be blank".into()));
    }
    Ok(())
}

impl TailRequest {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            max_entries: DEFAULT_MAX_ENTRIES,
            keyword: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// 校验请求，失败时返回 `MalformedRequest`
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| RetrievalError::malformed(describe(&errors)))
    }
}

fn describe(errors: &ValidationErrors) -> String {
    let mut parts = Vec::new();
    for (field, errs) in errors.field_errors() {
        for e in errs.iter() {
            match &e.message {
                Some(message) => parts.push(format!("{}: {}", field, message)),
                None => parts.push(format!("{}: {}", field, e.code)),
            }
        }
    }
    parts.sort();
    parts.join("; ")
}
