//! 检索结果数据结构
//!
//! 包含批量结果、流式摘要、扫描中止诊断以及对外的序列化形态。

use serde::{Deserialize, Serialize};

use super::log_entry::LogEntry;
use super::source::LogSource;
use crate::error::{ErrorResponse, RetrievalError};

/// 扫描中途停止的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ScanHalt {
    /// 文件在扫描期间被截断或轮转
    SourceShrunk {
        offset: u64,
        length: usize,
        current_size: u64,
    },
    /// 读取过程中出现的 IO 错误
    Io { message: String },
    /// 超出请求级扫描时限
    DeadlineExceeded { elapsed_ms: u64 },
    /// 调用方主动取消
    Cancelled,
}

impl ScanHalt {
    pub fn from_error(error: &RetrievalError) -> Self {
        match error {
            RetrievalError::SourceShrunk {
                offset,
                length,
                current_size,
            } => ScanHalt::SourceShrunk {
                offset: *offset,
                length: *length,
                current_size: *current_size,
            },
            other => ScanHalt::Io {
                message: other.to_string(),
            },
        }
    }

    /// 是否导致结果被标记为截断
    pub fn truncates(&self) -> bool {
        !matches!(self, ScanHalt::Cancelled)
    }

    pub fn describe(&self) -> String {
        match self {
            ScanHalt::SourceShrunk {
                offset,
                length,
                current_size,
            } => format!(
                "source shrunk: read of {} bytes at offset {} exceeds current size {}",
                length, offset, current_size
            ),
            ScanHalt::Io { message } => format!("io failure: {}", message),
            ScanHalt::DeadlineExceeded { elapsed_ms } => {
                format!("scan deadline exceeded after {} ms", elapsed_ms)
            }
            ScanHalt::Cancelled => "scan cancelled by consumer".to_string(),
        }
    }
}

/// 批量模式结果（最新条目在前）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub entries: Vec<LogEntry>,
    pub returned_count: usize,
    pub scanned_bytes: u64,
    pub truncated: bool,
    pub halt: Option<ScanHalt>,
    pub source: Option<LogSource>,
}

impl RetrievalResult {
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.text().into_owned()).collect()
    }
}

/// 流式模式结束后的摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    pub returned_count: usize,
    pub scanned_bytes: u64,
    pub truncated: bool,
    pub halt: Option<ScanHalt>,
    /// 消费端断开（而非达到上限或扫描结束）
    pub consumer_stopped: bool,
}

/// 批量模式对外响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResponse {
    pub entries: Vec<String>,
    pub returned_count: usize,
    pub scanned_bytes: u64,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl From<&RetrievalResult> for RetrievalResponse {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            entries: result.lines(),
            returned_count: result.returned_count,
            scanned_bytes: result.scanned_bytes,
            truncated: result.truncated,
            diagnostic: result.halt.as_ref().map(ScanHalt::describe),
        }
    }
}

/// 流式传输帧，线上格式为 NDJSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamFrame {
    Entry {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    Summary {
        returned_count: usize,
        scanned_bytes: u64,
        truncated: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        diagnostic: Option<String>,
    },
    Error(ErrorResponse),
}

impl StreamFrame {
    pub fn entry(entry: &LogEntry) -> Self {
        StreamFrame::Entry {
            content: entry.text().into_owned(),
        }
    }

    pub fn summary(summary: &StreamSummary) -> Self {
        StreamFrame::Summary {
            returned_count: summary.returned_count,
            scanned_bytes: summary.scanned_bytes,
            truncated: summary.truncated,
            diagnostic: summary.halt.as_ref().map(ScanHalt::describe),
        }
    }

    pub fn error(error: &RetrievalError) -> Self {
        StreamFrame::Error(ErrorResponse::from(error))
    }

    /// 序列化为单行 JSON（不含换行符）
    pub fn to_ndjson(&self) -> String {
        // 帧只包含字符串和整数字段，序列化不会失败
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"type\":\"error\",\"code\":\"IO_FAILURE\",\"message\":\"{}\"}}",
                e
            )
        })
    }
}
