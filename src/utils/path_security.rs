//! 路径安全验证模块
//!
//! 将客户端提供的相对路径解析到配置的日志目录下，防止路径穿越、
//! 符号链接逃逸以及对非普通文件（目录、设备文件）的访问。
//! 纯检查，不打开文件。

use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RetrievalError};

/// 路径守卫
///
/// 持有规范化后的日志根目录，所有请求路径都必须解析为其后代。
#[derive(Debug, Clone)]
pub struct PathGuard {
    base_dir: PathBuf,
}

impl PathGuard {
    /// 创建路径守卫
    ///
    /// # 参数
    ///
    /// - `base_dir` - 日志根目录，必须存在且为目录
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let canonical = canonicalize_path(base_dir).map_err(|e| {
            RetrievalError::Config(format!(
                "log directory {} is not accessible: {}",
                base_dir.display(),
                e
            ))
        })?;
        if !canonical.is_dir() {
            return Err(RetrievalError::Config(format!(
                "log directory {} is not a directory",
                base_dir.display()
            )));
        }
        Ok(Self {
            base_dir: canonical,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 解析并验证请求路径
    ///
    /// # 返回值
    ///
    /// - `Ok(PathBuf)` - 日志目录内普通文件的规范化绝对路径
    /// - `Err(PathTraversalRejected)` - 逃逸出日志目录、包含空字节或不是普通文件
    /// - `Err(NotFound)` - 文件不存在
    /// - `Err(PermissionDenied)` - 无权访问路径
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let relative = normalize_relative(requested)?;
        let candidate = self.base_dir.join(&relative);

        // 第二道检查：解析符号链接后仍须位于日志目录内
        let canonical = canonicalize_path(&candidate)
            .map_err(|e| RetrievalError::from_io(e, candidate.clone()))?;
        if !canonical.starts_with(&self.base_dir) {
            return Err(RetrievalError::path_rejected(
                requested,
                "resolves outside the log directory",
            ));
        }

        let metadata = std::fs::metadata(&canonical)
            .map_err(|e| RetrievalError::from_io(e, canonical.clone()))?;
        if !metadata.is_file() {
            return Err(RetrievalError::path_rejected(
                requested,
                "target is not a regular file",
            ));
        }

        debug!(requested = requested, resolved = %canonical.display(), "Path resolved");
        Ok(canonical)
    }
}

/// 词法规范化相对路径：去除 `.`，折叠 `..`
///
/// 任何会越过根目录的 `..`、绝对路径、驱动器前缀或空字节都被拒绝。
pub fn normalize_relative(requested: &str) -> Result<PathBuf> {
    if requested.contains('\0') {
        return Err(RetrievalError::path_rejected(
            requested,
            "contains a null byte",
        ));
    }
    if requested.starts_with('/') || requested.starts_with('\\') {
        return Err(RetrievalError::path_rejected(
            requested,
            "absolute paths are not allowed",
        ));
    }

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(requested).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(RetrievalError::path_rejected(
                        requested,
                        "escapes the log directory",
                    ));
                }
            }
            Component::Normal(part) => parts.push(part),
            Component::RootDir | Component::Prefix(_) => {
                return Err(RetrievalError::path_rejected(
                    requested,
                    "absolute paths are not allowed",
                ));
            }
        }
    }

    if parts.is_empty() {
        return Err(RetrievalError::path_rejected(
            requested,
            "does not name a file",
        ));
    }
    Ok(parts.iter().collect())
}

/// 规范化路径
///
/// 在 Windows 上使用 dunce 去除 UNC 前缀，在 Unix-like 系统上使用标准规范化。
pub fn canonicalize_path(path: &Path) -> io::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        dunce::canonicalize(path)
    }
    #[cfg(not(target_os = "windows"))]
    {
        path.canonicalize()
    }
}
