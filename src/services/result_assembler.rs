//! 结果组装
//!
//! 同一条惰性扫描序列的两种消费方式：
//! - 批量：收集到有界的有序集合，达到上限或扫描结束后返回
//! - 流式：每产出一条就推送给消费端，消费端断开或达到上限时停止扫描

use std::io::Write;
use tokio::sync::mpsc;
use tracing::debug;

use super::file_accessor::ByteSource;
use super::reverse_scanner::ReverseScanner;
use crate::models::{LogEntry, RetrievalResult, StreamFrame, StreamSummary};

/// 消费端对每条条目的反馈
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    /// 消费端已断开或不再需要更多条目
    Stop,
}

/// 流式消费端
pub trait EntrySink {
    fn accept(&mut self, entry: LogEntry) -> SinkControl;
}

impl<F> EntrySink for F
where
    F: FnMut(LogEntry) -> SinkControl,
{
    fn accept(&mut self, entry: LogEntry) -> SinkControl {
        self(entry)
    }
}

/// 批量模式：最多收集 `max_entries` 条
pub fn collect_bulk<S: ByteSource>(
    mut scanner: ReverseScanner<S>,
    max_entries: usize,
) -> RetrievalResult {
    let mut entries = Vec::with_capacity(max_entries.min(1024));
    while entries.len() < max_entries {
        match scanner.next_entry() {
            Some(entry) => entries.push(entry),
            None => break,
        }
    }

    let halt = scanner.take_halt();
    RetrievalResult {
        returned_count: entries.len(),
        entries,
        scanned_bytes: scanner.scanned_bytes(),
        truncated: halt.as_ref().is_some_and(|h| h.truncates()),
        halt,
        source: None,
    }
}

/// 流式模式：逐条推送给 `sink`
pub fn stream_to_sink<S: ByteSource, K: EntrySink + ?Sized>(
    mut scanner: ReverseScanner<S>,
    max_entries: usize,
    sink: &mut K,
) -> StreamSummary {
    let mut returned_count = 0;
    let mut consumer_stopped = false;

    while returned_count < max_entries {
        let Some(entry) = scanner.next_entry() else {
            break;
        };
        match sink.accept(entry) {
            SinkControl::Continue => returned_count += 1,
            SinkControl::Stop => {
                consumer_stopped = true;
                break;
            }
        }
    }

    if consumer_stopped {
        debug!(
            returned_count = returned_count,
            scanned_bytes = scanner.scanned_bytes(),
            "Consumer stopped the stream"
        );
    }

    let halt = scanner.take_halt();
    StreamSummary {
        returned_count,
        scanned_bytes: scanner.scanned_bytes(),
        truncated: halt.as_ref().is_some_and(|h| h.truncates()),
        halt,
        consumer_stopped,
    }
}

/// 以 NDJSON 帧写入任意 `io::Write`；写入失败（如管道断开）视为消费端断开
pub struct WriterSink<W: Write> {
    writer: W,
    failed: bool,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            failed: false,
        }
    }

    /// 写入任意帧（摘要或错误帧）
    pub fn write_frame(&mut self, frame: &StreamFrame) -> std::io::Result<()> {
        self.writer.write_all(frame.to_ndjson().as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EntrySink for WriterSink<W> {
    fn accept(&mut self, entry: LogEntry) -> SinkControl {
        match self.write_frame(&StreamFrame::entry(&entry)) {
            Ok(()) => SinkControl::Continue,
            Err(e) => {
                debug!(error = %e, "Stream writer closed");
                self.failed = true;
                SinkControl::Stop
            }
        }
    }
}

/// 推送到有界 tokio 通道；接收端被丢弃即视为断开
///
/// 只能在阻塞线程中使用（内部调用 `blocking_send`）。
pub struct ChannelSink {
    sender: mpsc::Sender<StreamFrame>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<StreamFrame>) -> Self {
        Self { sender }
    }

    pub fn send_frame(&self, frame: StreamFrame) -> bool {
        self.sender.blocking_send(frame).is_ok()
    }
}

impl EntrySink for ChannelSink {
    fn accept(&mut self, entry: LogEntry) -> SinkControl {
        if self.send_frame(StreamFrame::entry(&entry)) {
            SinkControl::Continue
        } else {
            SinkControl::Stop
        }
    }
}
