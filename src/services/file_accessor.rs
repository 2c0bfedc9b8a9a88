//! 文件访问层
//!
//! 以只读方式打开日志文件，并在一个统一接口后面隐藏两种读取策略：
//! - 文件大小 >= 阈值：整文件只读内存映射，任意区间 O(1) 访问且不复制
//! - 文件大小 <  阈值：带缓冲的定位读取
//!
//! 打开时捕获文件大小，之后的追加写入被忽略；若文件在打开后缩小，
//! 越界读取返回 `SourceShrunk`，不会返回垃圾数据，也不会阻塞。

use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RetrievalError};
use crate::models::{AccessStrategy, LogSource};

/// 随机访问字节源
///
/// 反向扫描器只依赖这个接口，不关心底层是内存映射还是定位读取。
pub trait ByteSource {
    /// 打开时捕获的大小
    fn size(&self) -> u64;

    /// 读取 `[offset, offset + length)`，要求 `offset + length <= size()`
    fn read_range(&mut self, offset: u64, length: usize) -> Result<Cow<'_, [u8]>>;
}

/// 文件访问限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessLimits {
    /// 达到该大小时改用内存映射
    pub mmap_threshold: u64,
    /// 允许访问的最大文件大小
    pub max_file_size: u64,
}

impl Default for AccessLimits {
    fn default() -> Self {
        Self {
            mmap_threshold: 80 * 1024,
            max_file_size: 4 * 1024 * 1024 * 1024,
        }
    }
}

enum Backing {
    Mapped(Mmap),
    Positional(Vec<u8>),
}

/// 只读文件访问器
///
/// 每个请求独立打开，文件句柄和映射在 drop 时释放。
pub struct FileAccessor {
    file: File,
    path: PathBuf,
    size: u64,
    backing: Backing,
}

impl FileAccessor {
    /// 打开文件并选择访问策略
    ///
    /// 文件超过 `max_file_size` 时返回 `SizeLimitExceeded`，此时不读取任何字节。
    pub fn open(path: &Path, limits: &AccessLimits) -> Result<Self> {
        let file = File::open(path).map_err(|e| RetrievalError::from_io(e, path))?;
        let size = file
            .metadata()
            .map_err(|e| RetrievalError::from_io(e, path))?
            .len();

        if size > limits.max_file_size {
            return Err(RetrievalError::SizeLimitExceeded {
                size,
                limit: limits.max_file_size,
            });
        }

        // 空文件无法映射，始终走定位读取
        let backing = if size > 0 && size >= limits.mmap_threshold {
            // SAFETY: 映射为只读；文件被外部截断时访问映射会触发 SIGBUS，
            // 因此每次读取前都会用当前元数据校验区间，见 `ensure_within_current_size`。
            let map = unsafe { Mmap::map(&file) }.map_err(|e| RetrievalError::from_io(e, path))?;
            Backing::Mapped(map)
        } else {
            Backing::Positional(Vec::new())
        };

        let accessor = Self {
            file,
            path: path.to_path_buf(),
            size,
            backing,
        };
        debug!(
            file = %path.display(),
            size = size,
            strategy = ?accessor.strategy(),
            "Opened log file"
        );
        Ok(accessor)
    }

    pub fn strategy(&self) -> AccessStrategy {
        match self.backing {
            Backing::Mapped(_) => AccessStrategy::MemoryMapped,
            Backing::Positional(_) => AccessStrategy::Positional,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> LogSource {
        LogSource {
            path: self.path.clone(),
            size_at_open: self.size,
            strategy: self.strategy(),
        }
    }

    fn ensure_within_current_size(&self, offset: u64, length: usize) -> Result<()> {
        let current_size = self
            .file
            .metadata()
            .map_err(|e| RetrievalError::from_io(e, &self.path))?
            .len();
        if offset + length as u64 > current_size {
            return Err(RetrievalError::SourceShrunk {
                offset,
                length,
                current_size,
            });
        }
        Ok(())
    }
}

impl ByteSource for FileAccessor {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, offset: u64, length: usize) -> Result<Cow<'_, [u8]>> {
        let end = offset + length as u64;
        if end > self.size {
            return Err(RetrievalError::Io {
                message: format!(
                    "range {}..{} is outside the {} bytes captured at open",
                    offset, end, self.size
                ),
                path: Some(self.path.clone()),
                source: None,
            });
        }
        if length == 0 {
            return Ok(Cow::Borrowed(&[]));
        }

        self.ensure_within_current_size(offset, length)?;

        match &mut self.backing {
            Backing::Mapped(map) => {
                let start = offset as usize;
                Ok(Cow::Borrowed(&map[start..start + length]))
            }
            Backing::Positional(buffer) => {
                buffer.resize(length, 0);
                self.file
                    .seek(SeekFrom::Start(offset))
                    .map_err(|e| RetrievalError::from_io(e, &self.path))?;
                match self.file.read_exact(buffer) {
                    Ok(()) => Ok(Cow::Borrowed(buffer.as_slice())),
                    // 校验与读取之间文件被截断
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                        let current_size = self.file.metadata().map(|m| m.len()).unwrap_or(0);
                        Err(RetrievalError::SourceShrunk {
                            offset,
                            length,
                            current_size,
                        })
                    }
                    Err(e) => Err(RetrievalError::from_io(e, &self.path)),
                }
            }
        }
    }
}

/// 内存缓冲区字节源，用于扫描已在内存中的日志内容
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    data: Vec<u8>,
}

impl InMemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for InMemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_range(&mut self, offset: u64, length: usize) -> Result<Cow<'_, [u8]>> {
        let start = offset as usize;
        match start.checked_add(length) {
            Some(end) if end <= self.data.len() => Ok(Cow::Borrowed(&self.data[start..end])),
            _ => Err(RetrievalError::SourceShrunk {
                offset,
                length,
                current_size: self.size(),
            }),
        }
    }
}
