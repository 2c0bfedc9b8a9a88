//! 通用工具函数模块

pub mod path_security;

pub use path_security::{canonicalize_path, normalize_relative, PathGuard};
