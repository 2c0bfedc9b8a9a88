//! 尾部检索集成测试
//!
//! 通过 `LogRetriever` 覆盖完整链路：路径守卫 → 文件访问 → 反向扫描 → 结果组装。
//! 内存映射与定位读取两种策略都要跑一遍。

use rstest::*;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

use log_retriever::infrastructure::config::EngineConfig;
use log_retriever::models::{AccessStrategy, LogEntry, RetrievalResponse, ScanHalt, TailRequest};
use log_retriever::services::{
    collect_bulk, AccessLimits, FileAccessor, KeywordFilter, LogRetriever, ReverseScanner,
    SinkControl,
};
use log_retriever::RetrievalError;

const ALWAYS_MMAP: u64 = 0;
const NEVER_MMAP: u64 = u64::MAX;

struct Fixture {
    dir: TempDir,
    retriever: LogRetriever,
}

impl Fixture {
    fn new(mmap_threshold: u64, window_size: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            log_dir: dir.path().to_path_buf(),
            mmap_threshold_bytes: mmap_threshold,
            window_size_bytes: window_size,
            ..EngineConfig::default()
        };
        let retriever = LogRetriever::new(&config).unwrap();
        Self { dir, retriever }
    }

    fn write(&self, name: &str, content: impl AsRef<[u8]>) {
        fs::write(self.dir.path().join(name), content).unwrap();
    }

    fn lines(&self, request: TailRequest) -> Vec<String> {
        self.retriever.retrieve(&request).unwrap().lines()
    }
}

#[rstest]
#[case(ALWAYS_MMAP)]
#[case(NEVER_MMAP)]
fn test_last_three_of_five(#[case] threshold: u64) {
    let fx = Fixture::new(threshold, 8192);
    fx.write("app.log", "L1\nL2\nL3\nL4\nL5\n");

    let result = fx
        .retriever
        .retrieve(&TailRequest::new("app.log").with_max_entries(3))
        .unwrap();
    assert_eq!(result.lines(), vec!["L5", "L4", "L3"]);
    assert_eq!(result.returned_count, 3);
    assert!(!result.truncated);

    let expected = if threshold == ALWAYS_MMAP {
        AccessStrategy::MemoryMapped
    } else {
        AccessStrategy::Positional
    };
    assert_eq!(result.source.unwrap().strategy, expected);
}

#[rstest]
#[case(ALWAYS_MMAP, 8192)]
#[case(NEVER_MMAP, 8192)]
#[case(NEVER_MMAP, 7)]
fn test_keyword_filter_mixed_case(#[case] threshold: u64, #[case] window: usize) {
    let fx = Fixture::new(threshold, window);
    let content = [
        "01 INFO boot",
        "02 ERROR disk full",
        "03 INFO ok",
        "04 WARN slow",
        "05 error: retry",
        "06 INFO ok",
        "07 DEBUG tick",
        "08 Error timeout",
        "09 INFO ok",
        "10 INFO done",
    ]
    .join("\n")
        + "\n";
    fx.write("app.log", content);

    let lines = fx.lines(
        TailRequest::new("app.log")
            .with_max_entries(100)
            .with_keyword("error"),
    );
    assert_eq!(
        lines,
        vec!["08 Error timeout", "05 error: retry", "02 ERROR disk full"]
    );
}

#[test]
fn test_oversized_sparse_file_rejected() {
    let fx = Fixture::new(80 * 1024, 8192);
    let path = fx.dir.path().join("huge.log");
    let file = fs::File::create(&path).unwrap();
    file.set_len(5 * 1024 * 1024 * 1024).unwrap();
    drop(file);

    let err = fx
        .retriever
        .retrieve(&TailRequest::new("huge.log"))
        .unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::SizeLimitExceeded {
            size: 5_368_709_120,
            limit: 4_294_967_296
        }
    ));
    assert_eq!(err.code(), "SIZE_LIMIT_EXCEEDED");
    assert!(err.is_terminal());
}

#[rstest]
#[case("../../etc/passwd")]
#[case("/etc/passwd")]
#[case("logs/../../secret.log")]
#[case("app\0.log")]
#[case("nested")]
fn test_path_rejected(#[case] filename: &str) {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    fx.write("app.log", "x\n");
    fs::create_dir(fx.dir.path().join("nested")).unwrap();

    let err = fx
        .retriever
        .retrieve(&TailRequest::new(filename))
        .unwrap_err();
    assert!(
        matches!(err, RetrievalError::PathTraversalRejected { .. }),
        "{}: {:?}",
        filename,
        err
    );
}

#[test]
fn test_missing_file_not_found() {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    let err = fx
        .retriever
        .retrieve(&TailRequest::new("absent.log"))
        .unwrap_err();
    assert!(matches!(err, RetrievalError::NotFound { .. }));
}

#[test]
fn test_nested_relative_path_allowed() {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    fs::create_dir(fx.dir.path().join("svc")).unwrap();
    fx.write("svc/app.log", "a\nb\n");
    assert_eq!(fx.lines(TailRequest::new("svc/./app.log")), vec!["b", "a"]);
}

#[rstest]
#[case(ALWAYS_MMAP)]
#[case(NEVER_MMAP)]
fn test_long_line_spanning_windows(#[case] threshold: u64) {
    let fx = Fixture::new(threshold, 8192);
    let long_line = "x".repeat(20 * 1024);
    fx.write("app.log", format!("before\n{}\nafter\n", long_line));

    let lines = fx.lines(TailRequest::new("app.log"));
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "after");
    assert_eq!(lines[1], long_line);
    assert_eq!(lines[2], "before");
}

#[test]
fn test_empty_file() {
    let fx = Fixture::new(ALWAYS_MMAP, 8192);
    fx.write("empty.log", "");
    let result = fx.retriever.retrieve(&TailRequest::new("empty.log")).unwrap();
    assert!(result.entries.is_empty());
    assert_eq!(result.returned_count, 0);
    assert_eq!(result.scanned_bytes, 0);
    assert!(!result.truncated);
    assert!(result.halt.is_none());
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(8192)]
fn test_missing_trailing_delimiter(#[case] window: usize) {
    let fx = Fixture::new(NEVER_MMAP, window);
    fx.write("app.log", "first\nsecond\nlast");
    assert_eq!(
        fx.lines(TailRequest::new("app.log")),
        vec!["last", "second", "first"]
    );
}

#[rstest]
#[case("a\n\nb\n", vec!["b", "", "a"])]
#[case("\na\n", vec!["a", ""])]
#[case("\n", vec![""])]
#[case("a\n\n", vec!["", "a"])]
#[case("a\r\nb\r\n", vec!["b\r", "a\r"])]
fn test_blank_line_boundaries(#[case] content: &str, #[case] expected: Vec<&str>) {
    for window in [1, 2, 8192] {
        let fx = Fixture::new(NEVER_MMAP, window);
        fx.write("app.log", content);
        assert_eq!(fx.lines(TailRequest::new("app.log")), expected, "window {}", window);
    }
}

#[test]
fn test_invalid_utf8_kept_as_bytes() {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    fx.write("bin.log", b"ok\nbad \xff byte\n");
    let result = fx.retriever.retrieve(&TailRequest::new("bin.log")).unwrap();
    assert_eq!(result.entries[0].as_bytes(), b"bad \xff byte");

    let response = RetrievalResponse::from(&result);
    assert_eq!(response.entries[0], "bad \u{fffd} byte");
}

#[test]
fn test_idempotent_scans() {
    let fx = Fixture::new(ALWAYS_MMAP, 64);
    let content: String = (0..500).map(|i| format!("entry {:04}\n", i)).collect();
    fx.write("app.log", content);

    let request = TailRequest::new("app.log")
        .with_max_entries(250)
        .with_keyword("7");
    let first = RetrievalResponse::from(&fx.retriever.retrieve(&request).unwrap());
    let second = RetrievalResponse::from(&fx.retriever.retrieve(&request).unwrap());
    assert_eq!(first, second);
}

#[test]
fn test_scanned_bytes_proportional_to_request() {
    let fx = Fixture::new(ALWAYS_MMAP, 4096);
    let content: String = (0..100_000).map(|i| format!("line {:06}\n", i)).collect();
    let total = content.len() as u64;
    fx.write("big.log", content);

    let result = fx
        .retriever
        .retrieve(&TailRequest::new("big.log").with_max_entries(10))
        .unwrap();
    assert_eq!(result.entries[0].text(), "line 099999");
    assert!(result.scanned_bytes <= 4096);
    assert!(result.scanned_bytes < total);
}

#[test]
fn test_concurrent_scans_of_same_file() {
    let fx = Fixture::new(ALWAYS_MMAP, 128);
    let content: String = (0..2_000).map(|i| format!("row {}\n", i)).collect();
    fx.write("shared.log", content);
    let retriever = Arc::new(fx.retriever.clone());

    let handles: Vec<_> = (1..=8)
        .map(|n| {
            let retriever = Arc::clone(&retriever);
            thread::spawn(move || {
                let request = TailRequest::new("shared.log").with_max_entries(n * 100);
                retriever.retrieve(&request).unwrap().lines()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let lines = handle.join().unwrap();
        let n = (i + 1) * 100;
        assert_eq!(lines.len(), n);
        assert_eq!(lines[0], "row 1999");
        assert_eq!(lines[n - 1], format!("row {}", 2_000 - n));
    }
}

#[rstest]
#[case(ALWAYS_MMAP)]
#[case(NEVER_MMAP)]
fn test_append_after_open_is_ignored(#[case] threshold: u64) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "a\nb\nc\n").unwrap();

    let limits = AccessLimits {
        mmap_threshold: threshold,
        max_file_size: 1024,
    };
    let accessor = FileAccessor::open(&path, &limits).unwrap();
    let mut writer = OpenOptions::new().append(true).open(&path).unwrap();
    writer.write_all(b"d\ne\n").unwrap();

    let scanner = ReverseScanner::new(accessor, KeywordFilter::pass_all(), 2);
    let result = collect_bulk(scanner, 100);
    assert_eq!(result.lines(), vec!["c", "b", "a"]);
    assert!(!result.truncated);
}

#[rstest]
#[case(ALWAYS_MMAP)]
#[case(NEVER_MMAP)]
fn test_truncation_during_scan_keeps_partial_result(#[case] threshold: u64) {
    let fx = Fixture::new(threshold, 6);
    let path = fx.dir.path().join("rotating.log");
    fs::write(&path, "line1\nline2\nline3\nline4\n").unwrap();

    let mut delivered = Vec::new();
    let mut sink = |entry: LogEntry| {
        if delivered.is_empty() {
            // 模拟日志轮转：读取第一条后文件被截断
            OpenOptions::new()
                .write(true)
                .open(&path)
                .unwrap()
                .set_len(0)
                .unwrap();
        }
        delivered.push(entry.text().into_owned());
        SinkControl::Continue
    };
    let summary = fx
        .retriever
        .stream(&TailRequest::new("rotating.log"), &mut sink, None)
        .unwrap();

    assert_eq!(delivered, vec!["line4"]);
    assert_eq!(summary.returned_count, 1);
    assert!(summary.truncated);
    assert!(matches!(
        summary.halt,
        Some(ScanHalt::SourceShrunk { current_size: 0, .. })
    ));
}

#[rstest]
#[case(TailRequest::new("app.log").with_max_entries(0))]
#[case(TailRequest::new("app.log").with_max_entries(10_001))]
#[case(TailRequest::new(""))]
#[case(TailRequest::new("   "))]
fn test_malformed_requests(#[case] request: TailRequest) {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    fx.write("app.log", "x\n");
    let err = fx.retriever.retrieve(&request).unwrap_err();
    assert!(matches!(err, RetrievalError::MalformedRequest(_)), "{:?}", err);
    assert_eq!(err.code(), "MALFORMED_REQUEST");
}

#[test]
fn test_max_entries_upper_bound_accepted() {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    fx.write("app.log", "x\n");
    let result = fx
        .retriever
        .retrieve(&TailRequest::new("app.log").with_max_entries(10_000))
        .unwrap();
    assert_eq!(result.lines(), vec!["x"]);
}

#[test]
fn test_response_json_shape() {
    let fx = Fixture::new(NEVER_MMAP, 8192);
    fx.write("app.log", "one\ntwo\n");
    let result = fx.retriever.retrieve(&TailRequest::new("app.log")).unwrap();
    let json = serde_json::to_value(RetrievalResponse::from(&result)).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "entries": ["two", "one"],
            "returnedCount": 2,
            "scannedBytes": 8,
            "truncated": false
        })
    );
}
