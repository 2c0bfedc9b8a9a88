use serde::Serialize;
use std::ops::Range;
use std::path::PathBuf;

/// 文件访问策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStrategy {
    /// 整个文件的只读内存映射
    MemoryMapped,
    /// 带缓冲的定位读取
    Positional,
}

/// 单次请求的日志源描述，扫描期间不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSource {
    pub path: PathBuf,
    /// 打开时捕获的文件大小，之后的追加写入被忽略
    pub size_at_open: u64,
    pub strategy: AccessStrategy,
}

/// 一次反向扫描步骤覆盖的字节区间 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub start: u64,
    pub end: u64,
}

impl ScanWindow {
    /// 以 `cursor` 为右边界、向前至多 `window_size` 字节的窗口
    pub fn ending_at(cursor: u64, window_size: usize) -> Self {
        Self {
            start: cursor.saturating_sub(window_size as u64),
            end: cursor,
        }
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 是否已到达文件开头
    pub fn is_first(&self) -> bool {
        self.start == 0
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}
