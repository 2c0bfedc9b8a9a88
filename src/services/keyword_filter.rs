use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::error::{Result, RetrievalError};

/**
 * 关键词过滤器 - 使用 Aho-Corasick 自动机做大小写不敏感的子串匹配
 *
 * 只折叠 ASCII 大小写，非 ASCII 字节按原值逐字节比较，结果是确定的。
 * 未配置关键词（或关键词为空）时所有条目都通过。
 */
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    ac: Option<AhoCorasick>,
}

impl KeywordFilter {
    /// 不做任何过滤
    pub fn pass_all() -> Self {
        Self { ac: None }
    }

    /**
     * 创建过滤器
     *
     * # 参数
     * * `keyword` - 可选关键词
     */
    pub fn new(keyword: Option<&str>) -> Result<Self> {
        let keyword = match keyword {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(Self::pass_all()),
        };

        let ac = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .ascii_case_insensitive(true)
            .build([keyword.as_bytes()])
            .map_err(|e| RetrievalError::malformed(format!("keyword rejected: {}", e)))?;
        Ok(Self { ac: Some(ac) })
    }

    pub fn is_pass_all(&self) -> bool {
        self.ac.is_none()
    }

    /// 条目是否包含关键词
    pub fn matches(&self, line: &[u8]) -> bool {
        match &self.ac {
            Some(ac) => ac.is_match(line),
            None => true,
        }
    }
}
