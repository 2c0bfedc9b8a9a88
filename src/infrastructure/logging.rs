//! 日志初始化
//!
//! RUST_LOG 优先于配置文件中的级别；重复初始化会被忽略。

use tracing_subscriber::EnvFilter;

use super::config::LoggingConfig;

/// 安装全局 tracing subscriber，已安装时返回 false
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.is_ok()
}
