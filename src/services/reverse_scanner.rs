//! 反向分块扫描器
//!
//! 从文件末尾开始以固定大小的窗口向前读取，重建跨窗口边界的行，
//! 并按“最新在前”的顺序惰性产出完整行。
//!
//! # 算法
//!
//! 设 `cursor = size`，每一步读取 `[max(0, cursor - W), cursor)`：
//! 1. 窗口最右侧的片段与上一窗口遗留的残片（`CarryFragment`）拼接成一行；
//! 2. 窗口内部被换行符完整分隔的片段从右到左依次产出；
//! 3. 窗口最左侧、在本窗口内找不到行首的片段成为新的残片，
//!    除非窗口已到达文件开头，此时它就是文件的第一行。
//!
//! 文件以换行符结尾时，末尾隐含的空片段被丢弃；内部空行照常作为零长度条目产出。
//! 只有在消费端继续拉取时才会读取下一个窗口，已读取的窗口不会重复扫描。

use std::collections::VecDeque;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::file_accessor::ByteSource;
use super::keyword_filter::KeywordFilter;
use crate::models::{LogEntry, ScanHalt, ScanWindow};

/// 默认窗口大小（8 KB）
pub const DEFAULT_WINDOW_SIZE: usize = 8 * 1024;

const DELIMITER: u8 = b'\n';

/// 跨窗口边界的残片
///
/// 片段按从右到左的顺序追加，拼接时再反转，避免超长行在每个窗口被重复复制。
#[derive(Debug, Default)]
struct CarryFragment {
    parts: Vec<Vec<u8>>,
    len: usize,
}

impl CarryFragment {
    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn prepend(&mut self, bytes: &[u8]) {
        self.len += bytes.len();
        self.parts.push(bytes.to_vec());
    }

    /// 以 `prefix` 开头拼接出完整行，并清空残片
    fn take_with_prefix(&mut self, prefix: &[u8]) -> Vec<u8> {
        let mut line = Vec::with_capacity(prefix.len() + self.len);
        line.extend_from_slice(prefix);
        for part in self.parts.drain(..).rev() {
            line.extend_from_slice(&part);
        }
        self.len = 0;
        line
    }
}

/// 反向扫描器
///
/// 每个请求独立构造，持有自己的字节源；是一次性、不可重启的序列。
pub struct ReverseScanner<S: ByteSource> {
    source: S,
    filter: KeywordFilter,
    window_size: usize,
    cursor: u64,
    /// 下一个窗口是否紧贴文件末尾
    at_file_end: bool,
    carry: CarryFragment,
    pending: VecDeque<LogEntry>,
    scanned_bytes: u64,
    windows_read: u64,
    halt: Option<ScanHalt>,
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
    started: Instant,
}

impl<S: ByteSource> ReverseScanner<S> {
    pub fn new(source: S, filter: KeywordFilter, window_size: usize) -> Self {
        let cursor = source.size();
        Self {
            source,
            filter,
            window_size: window_size.max(1),
            cursor,
            at_file_end: true,
            carry: CarryFragment::default(),
            pending: VecDeque::new(),
            scanned_bytes: 0,
            windows_read: 0,
            halt: None,
            cancel: None,
            deadline: None,
            started: Instant::now(),
        }
    }

    /// 窗口之间检查的取消信号
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 请求级扫描截止时间
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn scanned_bytes(&self) -> u64 {
        self.scanned_bytes
    }

    pub fn windows_read(&self) -> u64 {
        self.windows_read
    }

    pub fn halt(&self) -> Option<&ScanHalt> {
        self.halt.as_ref()
    }

    pub fn take_halt(&mut self) -> Option<ScanHalt> {
        self.halt.take()
    }

    /// 下一条满足过滤条件的行（最新在前）
    pub fn next_entry(&mut self) -> Option<LogEntry> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Some(entry);
            }
            if !self.scan_next_window() {
                return None;
            }
        }
    }

    fn should_stop(&mut self) -> bool {
        if self.halt.is_some() {
            return true;
        }
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            self.halt = Some(ScanHalt::Cancelled);
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                let elapsed_ms = self.started.elapsed().as_millis() as u64;
                warn!(
                    elapsed_ms = elapsed_ms,
                    scanned_bytes = self.scanned_bytes,
                    "Scan deadline exceeded"
                );
                self.halt = Some(ScanHalt::DeadlineExceeded { elapsed_ms });
                return true;
            }
        }
        false
    }

    /// 读取并切分下一个窗口；没有更多窗口或扫描已中止时返回 false
    fn scan_next_window(&mut self) -> bool {
        if self.cursor == 0 || self.should_stop() {
            return false;
        }

        let window = ScanWindow::ending_at(self.cursor, self.window_size);
        let at_file_end = self.at_file_end;
        let first_line_reached = window.is_first();

        let bytes = match self.source.read_range(window.start, window.len()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    window_start = window.start,
                    window_end = window.end,
                    error = %e,
                    "Scan halted mid-file"
                );
                self.halt = Some(ScanHalt::from_error(&e));
                return false;
            }
        };

        let before = self.pending.len();
        let mut segments = bytes.rsplit(|b| *b == DELIMITER).peekable();
        let mut rightmost = true;
        while let Some(segment) = segments.next() {
            let leftmost = segments.peek().is_none();

            // 行首不在本窗口内，留给更早的窗口
            if leftmost && !first_line_reached {
                self.carry.prepend(segment);
                break;
            }

            if rightmost {
                rightmost = false;
                // 文件末尾的换行符不产生空条目
                if at_file_end && segment.is_empty() && !leftmost {
                    continue;
                }
                if self.carry.is_empty() {
                    if self.filter.matches(segment) {
                        self.pending.push_back(LogEntry::from(segment));
                    }
                } else {
                    let line = self.carry.take_with_prefix(segment);
                    if self.filter.matches(&line) {
                        self.pending.push_back(LogEntry::new(line));
                    }
                }
                continue;
            }

            if self.filter.matches(segment) {
                self.pending.push_back(LogEntry::from(segment));
            }
        }

        self.scanned_bytes += window.len() as u64;
        self.windows_read += 1;
        self.cursor = window.start;
        self.at_file_end = false;

        trace!(
            window_start = window.start,
            window_end = window.end,
            matched = self.pending.len() - before,
            "Scanned window"
        );
        true
    }
}

impl<S: ByteSource> Iterator for ReverseScanner<S> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        self.next_entry()
    }
}
