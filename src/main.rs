//! 日志尾部检索 - 命令行入口
//!
//! 批量模式输出一个 JSON 响应；`--stream` 模式逐行输出 NDJSON 帧，
//! 最后一帧为摘要或错误。

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

use log_retriever::infrastructure::config::ConfigLoader;
use log_retriever::infrastructure::logging::init_tracing;
use log_retriever::models::{RetrievalResponse, StreamFrame, TailRequest, DEFAULT_MAX_ENTRIES};
use log_retriever::services::{LogRetriever, WriterSink};
use log_retriever::{ErrorResponse, RetrievalError};

#[derive(Debug, Parser)]
#[command(name = "log-retriever", version, about = "Retrieve the newest entries of a log file")]
struct Cli {
    /// TOML 配置文件
    #[arg(long, env = "LOG_RETRIEVER_CONFIG")]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志根目录
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// 相对于日志根目录的文件名
    file: String,

    /// 最多返回的条目数
    #[arg(short = 'n', long = "max-entries", default_value_t = DEFAULT_MAX_ENTRIES)]
    max_entries: usize,

    /// 大小写不敏感的关键词
    #[arg(short = 'k', long)]
    keyword: Option<String>,

    /// 以 NDJSON 帧流式输出
    #[arg(long)]
    stream: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::default()
        .load(cli.config.as_deref())
        .into_diagnostic()?;
    if let Some(log_dir) = cli.log_dir {
        config.engine.log_dir = log_dir;
    }
    init_tracing(&config.logging);
    debug!(log_dir = %config.engine.log_dir.display(), "Configuration loaded");

    let retriever = LogRetriever::new(&config.engine)?;
    let mut request = TailRequest::new(cli.file).with_max_entries(cli.max_entries);
    if let Some(keyword) = cli.keyword {
        request = request.with_keyword(keyword);
    }

    if cli.stream {
        run_stream(&retriever, &request)
    } else {
        run_bulk(&retriever, &request)
    }
}

fn run_bulk(retriever: &LogRetriever, request: &TailRequest) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match retriever.retrieve(request) {
        Ok(result) => {
            serde_json::to_writer_pretty(&mut stdout, &RetrievalResponse::from(&result))
                .into_diagnostic()?;
            writeln!(stdout).into_diagnostic()?;
            Ok(())
        }
        Err(e) => {
            report_error(&mut stdout, &e)?;
            Err(e.into())
        }
    }
}

fn run_stream(retriever: &LogRetriever, request: &TailRequest) -> Result<()> {
    let mut sink = WriterSink::new(io::stdout().lock());
    match retriever.stream(request, &mut sink, None) {
        Ok(summary) => {
            // 输出端已关闭时不再写摘要
            if !sink.has_failed() {
                sink.write_frame(&StreamFrame::summary(&summary))
                    .into_diagnostic()?;
            }
            Ok(())
        }
        Err(e) => {
            // 流尚未开始，错误帧是唯一的输出
            let _ = sink.write_frame(&StreamFrame::error(&e));
            Err(e.into())
        }
    }
}

fn report_error<W: Write>(out: &mut W, error: &RetrievalError) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &ErrorResponse::from(error)).into_diagnostic()?;
    writeln!(out).into_diagnostic()
}
