//! 配置管理基础设施层
//!
//! 分层加载：内置默认值 → TOML 配置文件 → 环境变量，加载后统一校验。
//! 引擎只消费校验后的配置，不自行推导任何参数。

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::services::file_accessor::AccessLimits;

/// 环境变量前缀，例如 `LOG_RETRIEVER_ENGINE__LOG_DIR`
pub const ENV_PREFIX: &str = "LOG_RETRIEVER";

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置验证失败: {0}")]
    Validation(String),

    #[error("配置文件不存在: {0}")]
    FileNotFound(PathBuf),

    #[error("配置文件格式错误: {0}")]
    FormatError(#[from] config::ConfigError),

    #[error("配置序列化失败: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// 全局配置根结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub engine: EngineConfig,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// 检索引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// 日志根目录
    #[validate(custom(function = "validate_log_dir"))]
    pub log_dir: PathBuf,

    /// 达到该大小时使用内存映射（默认 80 KB）
    pub mmap_threshold_bytes: u64,

    /// 允许检索的最大文件大小（默认 4 GB）
    #[validate(range(min = 1))]
    pub max_file_size_bytes: u64,

    /// 反向扫描窗口大小（默认 8 KB）
    #[validate(range(min = 1, max = 67108864))]
    pub window_size_bytes: usize,

    /// 请求级扫描时限，0 表示不限制
    #[validate(range(max = 3600000))]
    pub scan_timeout_ms: u64,
}

/// 日志输出配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    #[validate(length(min = 1, max = 100))]
    pub level: String,

    pub json: bool,
}

fn validate_log_dir(log_dir: &PathBuf) -> Result<(), ValidationError> {
    if log_dir.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_log_dir")
            .with_message("engine.log_dir must not be empty".into()));
    }
    Ok(())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            mmap_threshold_bytes: 80 * 1024,
            max_file_size_bytes: 4 * 1024 * 1024 * 1024,
            window_size_bytes: 8 * 1024,
            scan_timeout_ms: 30_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    pub fn access_limits(&self) -> AccessLimits {
        AccessLimits {
            mmap_threshold: self.mmap_threshold_bytes,
            max_file_size: self.max_file_size_bytes,
        }
    }
}

impl AppConfig {
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// 配置加载器
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl ConfigLoader {
    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: prefix.into(),
        }
    }

    /// 按默认值 → 配置文件 → 环境变量的顺序加载并校验
    pub fn load(&self, path: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(config)
    }
}
