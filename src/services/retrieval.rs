//! 检索引擎入口
//!
//! 控制流：路径守卫 → 文件访问 → 反向扫描（关键词过滤）→ 结果组装。
//! 每个请求重新打开文件、构造自己的扫描器，不保留任何跨请求状态；
//! 文件句柄与内存映射在所有退出路径（成功、错误、取消）上随扫描器一起释放。

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use super::file_accessor::{AccessLimits, FileAccessor};
use super::keyword_filter::KeywordFilter;
use super::result_assembler::{collect_bulk, stream_to_sink, ChannelSink, EntrySink};
use super::reverse_scanner::ReverseScanner;
use crate::error::{Result, RetrievalError};
use crate::infrastructure::config::EngineConfig;
use crate::models::{LogSource, RetrievalResult, StreamFrame, StreamSummary, TailRequest};
use crate::utils::path_security::PathGuard;

/// 流式扫描句柄
pub struct StreamHandle {
    /// 条目帧，最后一帧为摘要或错误
    pub frames: mpsc::Receiver<StreamFrame>,
    /// 取消信号，在窗口之间检查
    pub cancel: CancellationToken,
    pub task: JoinHandle<Result<StreamSummary>>,
}

/// 日志检索引擎
///
/// 只持有不可变配置，可以在多个并发请求之间共享。
#[derive(Debug, Clone)]
pub struct LogRetriever {
    guard: PathGuard,
    limits: AccessLimits,
    window_size: usize,
    scan_timeout: Option<Duration>,
}

impl LogRetriever {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            guard: PathGuard::new(&config.log_dir)?,
            limits: config.access_limits(),
            window_size: config.window_size_bytes.max(1),
            scan_timeout: (config.scan_timeout_ms > 0)
                .then(|| Duration::from_millis(config.scan_timeout_ms)),
        })
    }

    pub fn log_dir(&self) -> &std::path::Path {
        self.guard.base_dir()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// 校验请求、解析路径、打开文件并构造扫描器；任何一步失败都不会开始扫描
    fn prepare(&self, request: &TailRequest) -> Result<(ReverseScanner<FileAccessor>, LogSource)> {
        request.ensure_valid()?;
        let filter = KeywordFilter::new(request.keyword.as_deref())?;
        let path = self.guard.resolve(&request.filename)?;
        let accessor = FileAccessor::open(&path, &self.limits)?;
        let source = accessor.source();

        let mut scanner = ReverseScanner::new(accessor, filter, self.window_size);
        if let Some(timeout) = self.scan_timeout {
            scanner = scanner.with_deadline(Instant::now() + timeout);
        }
        Ok((scanner, source))
    }

    /// 批量模式检索
    pub fn retrieve(&self, request: &TailRequest) -> Result<RetrievalResult> {
        let request_id = Uuid::new_v4();
        let span = info_span!("retrieve", %request_id, file = %request.filename);
        let _enter = span.enter();
        let started = Instant::now();

        let (scanner, source) = self.prepare(request).inspect_err(|e| {
            warn!(code = e.code(), error = %e, "Request rejected");
        })?;
        let mut result = collect_bulk(scanner, request.max_entries);

        info!(
            returned_count = result.returned_count,
            scanned_bytes = result.scanned_bytes,
            size_at_open = source.size_at_open,
            strategy = ?source.strategy,
            truncated = result.truncated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Retrieval completed"
        );
        result.source = Some(source);
        Ok(result)
    }

    /// 流式模式检索
    ///
    /// 条目按最新在前的顺序推送给 `sink`；`cancel` 在窗口之间检查。
    pub fn stream<K: EntrySink + ?Sized>(
        &self,
        request: &TailRequest,
        sink: &mut K,
        cancel: Option<CancellationToken>,
    ) -> Result<StreamSummary> {
        let request_id = Uuid::new_v4();
        let span = info_span!("stream", %request_id, file = %request.filename);
        let _enter = span.enter();
        let started = Instant::now();

        let (mut scanner, source) = self.prepare(request).inspect_err(|e| {
            warn!(code = e.code(), error = %e, "Request rejected");
        })?;
        if let Some(token) = cancel {
            scanner = scanner.with_cancellation(token);
        }
        let summary = stream_to_sink(scanner, request.max_entries, sink);

        info!(
            returned_count = summary.returned_count,
            scanned_bytes = summary.scanned_bytes,
            size_at_open = source.size_at_open,
            truncated = summary.truncated,
            consumer_stopped = summary.consumer_stopped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stream completed"
        );
        Ok(summary)
    }

    /// 在阻塞线程池上执行批量检索
    pub async fn retrieve_async(self: Arc<Self>, request: TailRequest) -> Result<RetrievalResult> {
        tokio::task::spawn_blocking(move || self.retrieve(&request))
            .await
            .map_err(|e| RetrievalError::Io {
                message: format!("retrieval task failed: {}", e),
                path: None,
                source: None,
            })?
    }

    /// 在阻塞线程上执行流式检索，帧通过有界通道送出
    ///
    /// 丢弃接收端即断开，扫描会在下一个窗口之前停止。
    pub fn spawn_stream(self: Arc<Self>, request: TailRequest, buffer: usize) -> StreamHandle {
        let (sender, frames) = mpsc::channel(buffer.max(1));
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink::new(sender);
            match self.stream(&request, &mut sink, Some(token)) {
                Ok(summary) => {
                    if !summary.consumer_stopped {
                        sink.send_frame(StreamFrame::summary(&summary));
                    }
                    Ok(summary)
                }
                Err(e) => {
                    sink.send_frame(StreamFrame::error(&e));
                    Err(e)
                }
            }
        });

        StreamHandle {
            frames,
            cancel,
            task,
        }
    }
}
