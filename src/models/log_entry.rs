use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// 日志条目
///
/// 换行符之间的一段不透明字节，不含行终止符，生成后不可变。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LogEntry {
    content: Arc<[u8]>,
}

impl LogEntry {
    pub fn new(content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// 按 UTF-8 解码，非法字节替换为 U+FFFD
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

impl From<&str> for LogEntry {
    fn from(line: &str) -> Self {
        Self::new(line.as_bytes())
    }
}

impl From<&[u8]> for LogEntry {
    fn from(line: &[u8]) -> Self {
        Self::new(line)
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LogEntry").field(&self.text()).finish()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text())
    }
}
