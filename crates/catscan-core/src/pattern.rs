//! 文件名通配模式（只有 `*` 是通配符），大小写不敏感
use regex::Regex;

/// 逗号分隔的通配模式集合
///
/// - 编译时统一转为小写，匹配前对输入同样转小写；
/// - 空集合不匹配任何名称（用于关闭归档下钻）；
/// - 除 `*` 外的字符一律按字面量处理，`.` 只匹配 `.`，`?` 只匹配 `?`。
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    source: String,
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// 从逗号分隔的模式列表构建；空白项被忽略
    pub fn parse(csv: &str) -> Self {
        let patterns = csv
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter_map(|p| compile_wildcard(&p.to_lowercase()))
            .collect();
        Self { source: csv.trim().to_string(), patterns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 原始模式文本（用于条件展示）
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let name = name.to_lowercase();
        self.patterns.iter().any(|re| re.is_match(&name))
    }
}

/// 单个通配模式 -> 锚定正则；编译失败时退化为字面量匹配
fn compile_wildcard(pattern: &str) -> Option<Regex> {
    let mut rx = String::with_capacity(pattern.len() + 8);
    rx.push_str("^(?s:");
    for ch in pattern.chars() {
        match ch {
            '*' => rx.push_str(".*"),
            c => rx.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    rx.push_str(")$");
    match Regex::new(&rx) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(%pattern, %err, "wildcard pattern degraded to literal match");
            Regex::new(&format!("^{}$", regex::escape(pattern))).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_extension_is_case_insensitive_and_anchored() {
        let set = PatternSet::parse("*.txt");
        assert!(set.matches("a.txt"));
        assert!(set.matches("A.TXT"));
        assert!(!set.matches("a.txt.bak"));
        assert!(!set.matches("atxt"));
    }

    #[test]
    fn lone_star_matches_everything() {
        let set = PatternSet::parse("*");
        assert!(set.matches("Makefile"));
        assert!(set.matches("a.b.c"));
        assert!(set.matches(""));
    }

    #[test]
    fn dot_is_literal() {
        let set = PatternSet::parse("a.c");
        assert!(set.matches("a.c"));
        assert!(!set.matches("abc"));

        let star_dot_star = PatternSet::parse("*.*");
        assert!(star_dot_star.matches("readme.md"));
        assert!(!star_dot_star.matches("README"));
    }

    #[test]
    fn question_mark_is_literal() {
        let set = PatternSet::parse("file?.log");
        assert!(set.matches("file?.log"));
        assert!(!set.matches("file1.log"));
        assert!(!set.matches("file.log"));
        assert!(PatternSet::parse("*?").matches("what?"));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        let set = PatternSet::parse("a+(b)[c].txt");
        assert!(set.matches("a+(b)[c].txt"));
        assert!(!set.matches("aa(b)c.txt"));
    }

    #[test]
    fn csv_list_and_empty_set() {
        let set = PatternSet::parse(" *.jar , *.WAR,,");
        assert!(set.matches("lib.jar"));
        assert!(set.matches("app.war"));
        assert!(!set.matches("app.ear"));

        assert!(PatternSet::parse("").is_empty());
        assert!(!PatternSet::empty().matches("anything.zip"));
    }
}
