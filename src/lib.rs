//! 日志尾部检索引擎
//!
//! 从大型日志文件末尾按固定大小窗口反向读取，按“最新在前”的顺序
//! 返回最后 N 条（可按关键词过滤的）日志条目，读取量与请求条数成正比而非文件大小。

pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{ErrorResponse, Result, RetrievalError};
pub use infrastructure::config::{AppConfig, ConfigLoader, EngineConfig};
pub use models::{LogEntry, RetrievalResponse, RetrievalResult, StreamFrame, TailRequest};
pub use services::LogRetriever;
