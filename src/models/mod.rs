pub mod log_entry;
pub mod request;
pub mod result;
pub mod source;

// 重新导出核心类型
pub use log_entry::LogEntry;
pub use request::{TailRequest, DEFAULT_MAX_ENTRIES, MAX_ENTRIES_LIMIT};
pub use result::{RetrievalResponse, RetrievalResult, ScanHalt, StreamFrame, StreamSummary};
pub use source::{AccessStrategy, LogSource, ScanWindow};
