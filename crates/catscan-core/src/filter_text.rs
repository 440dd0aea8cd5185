//! 文本内容搜索（逐行，每行只报告第一处命中）
use aho_corasick::AhoCorasick;
use std::io::{self, BufRead, BufReader};

use crate::entry::Entry;
use crate::error::CriteriaError;
use crate::filter::{Criteria, EntryMatcher};
use crate::filter_name::NameFilter;
use crate::pattern::PatternSet;
use crate::types::MatchNode;

/// 命中位置两侧保留的上下文字符数
const SURROUND_CHARS: usize = 20;

/// 在名称命中的文件中查找文本
///
/// - 非 UTF-8 字节按替换字符处理，不会中断扫描；
/// - 列号为 0 起始的字符序号；
/// - 大小写不敏感时，行与搜索词都逐字符转小写再比较，列号仍按原行计算。
#[derive(Debug, Clone)]
pub struct TextFilter {
    names: NameFilter,
    text: String,
    case_sensitive: bool,
    finder: AhoCorasick,
    needle_chars: usize,
}

impl TextFilter {
    pub const DEFAULT_NAMES: &'static str = "*.txt";

    pub fn new(names: PatternSet, text: &str, case_sensitive: bool) -> Result<Self, CriteriaError> {
        if text.is_empty() {
            return Err(CriteriaError::Missing { field: "Search Text" });
        }
        let needle = if case_sensitive { text.to_string() } else { fold_line(text).0 };
        let finder = AhoCorasick::new([needle.as_str()])
            .map_err(|e| CriteriaError::Invalid { field: "Search Text", reason: e.to_string() })?;
        Ok(Self {
            names: NameFilter::new(names),
            text: text.to_string(),
            case_sensitive,
            finder,
            needle_chars: text.chars().count(),
        })
    }

    pub fn search_text(&self) -> &str {
        &self.text
    }

    fn search_lines<R: BufRead>(&self, mut reader: R) -> io::Result<Option<Vec<MatchNode>>> {
        let mut matches: Vec<MatchNode> = Vec::new();
        let mut buf = Vec::new();
        let mut row = 0usize;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            row += 1;
            let decoded = String::from_utf8_lossy(trim_line_ending(&buf));
            let line: &str = &decoded;
            let col = if self.case_sensitive {
                self.finder.find(line).map(|m| line[..m.start()].chars().count())
            } else {
                let (folded, starts) = fold_line(line);
                self.finder
                    .find(folded.as_str())
                    .map(|m| starts.partition_point(|&s| s <= m.start()).saturating_sub(1))
            };
            if let Some(col) = col {
                matches.push(MatchNode::new(self.match_message(row, col, line)));
            }
        }
        Ok((!matches.is_empty()).then_some(matches))
    }

    fn match_message(&self, row: usize, col: usize, line: &str) -> String {
        let chars: Vec<char> = line.chars().collect();
        let col_in_line = col.min(chars.len());
        let start = col_in_line.saturating_sub(SURROUND_CHARS);
        let stop = (col_in_line + self.needle_chars + SURROUND_CHARS).min(chars.len());
        let mut msg = format!("Line {row}, Column {col}: ");
        if start > 0 {
            msg.push_str("...");
        }
        msg.extend(&chars[start..stop]);
        if stop < chars.len() {
            msg.push_str("...");
        }
        msg
    }
}

/// 逐字符转小写，同时记录每个原字符在结果中的起始字节
///
/// 有些字符转小写后变成多个字符（如 `İ`），靠这张表把命中位置映射回原行。
fn fold_line(line: &str) -> (String, Vec<usize>) {
    let mut folded = String::with_capacity(line.len());
    let mut starts = Vec::with_capacity(line.len());
    for ch in line.chars() {
        starts.push(folded.len());
        folded.extend(ch.to_lowercase());
    }
    (folded, starts)
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

impl EntryMatcher for TextFilter {
    fn name(&self) -> &'static str {
        "Text File Search"
    }

    fn criteria(&self) -> Criteria {
        let mut c = self.names.criteria();
        c.push(("Search Text", self.text.clone()));
        c.push(("Case Sensitive", self.case_sensitive.to_string()));
        c
    }

    fn needs_content(&self, entry: &Entry) -> bool {
        self.names.accepts(entry.name())
    }

    fn search_entry(&mut self, entry: &Entry) -> io::Result<Option<Vec<MatchNode>>> {
        if !self.names.accepts(entry.name()) {
            return Ok(None);
        }
        let file = entry.open_content()?;
        self.search_lines(BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn labels(nodes: Option<Vec<MatchNode>>) -> Vec<String> {
        nodes.unwrap_or_default().iter().map(|n| n.label().to_string()).collect()
    }

    fn filter(text: &str, case_sensitive: bool) -> TextFilter {
        TextFilter::new(PatternSet::parse("*.txt"), text, case_sensitive).unwrap()
    }

    #[test]
    fn reports_line_and_column_of_single_hit() {
        let f = filter("quux", false);
        let out = f.search_lines(Cursor::new("first line\nabcdquux here\nlast\n")).unwrap();
        assert_eq!(labels(out), vec!["Line 2, Column 4: abcdquux here"]);

        let out = f.search_lines(Cursor::new("first\nabcdequux\nlast")).unwrap();
        assert_eq!(labels(out), vec!["Line 2, Column 5: abcdequux"]);
    }

    #[test]
    fn only_first_hit_per_line() {
        let f = filter("ab", true);
        let out = f.search_lines(Cursor::new("xxab ab ab\n")).unwrap();
        assert_eq!(labels(out), vec!["Line 1, Column 2: xxab ab ab"]);
    }

    #[test]
    fn no_hit_means_no_match() {
        let f = filter("zzz", false);
        assert!(f.search_lines(Cursor::new("abc\ndef\n")).unwrap().is_none());
    }

    #[test]
    fn case_handling() {
        let insensitive = filter("WORLD", false);
        assert_eq!(labels(insensitive.search_lines(Cursor::new("Hello World")).unwrap()).len(), 1);

        let sensitive = filter("WORLD", true);
        assert!(sensitive.search_lines(Cursor::new("Hello World")).unwrap().is_none());
    }

    #[test]
    fn folding_that_grows_keeps_column_on_original_line() {
        // `İ` 转小写后是两个字符
        let f = filter("WORLD", false);
        let out = labels(f.search_lines(Cursor::new("İİ world")).unwrap());
        assert_eq!(out, vec!["Line 1, Column 3: İİ world"]);

        let f = filter("i\u{307}", false);
        let out = labels(f.search_lines(Cursor::new("abİc")).unwrap());
        assert_eq!(out, vec!["Line 1, Column 2: abİc"]);
    }

    #[test]
    fn context_is_truncated_with_ellipsis() {
        let f = filter("X", true);
        let line = format!("{}X{}", "a".repeat(30), "b".repeat(30));
        let out = labels(f.search_lines(Cursor::new(line)).unwrap());
        let expected = format!("Line 1, Column 30: ...{}X{}...", "a".repeat(20), "b".repeat(20));
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn invalid_utf8_does_not_abort() {
        let f = filter("ok", false);
        let data: Vec<u8> = b"\xff\xfe bad\r\nthis is ok\r\n".to_vec();
        let out = labels(f.search_lines(Cursor::new(data)).unwrap());
        assert_eq!(out, vec!["Line 2, Column 8: this is ok"]);
    }

    #[test]
    fn empty_search_text_is_rejected() {
        let err = TextFilter::new(PatternSet::parse("*.txt"), "", false).unwrap_err();
        assert_eq!(err, CriteriaError::Missing { field: "Search Text" });
    }

    #[test]
    fn name_prefilter_applies_before_reading() {
        let mut f = filter("x", false);
        let e = Entry::archive_member(std::path::Path::new("/a.zip"), "a.log", 1, None);
        assert!(!f.needs_content(&e));
        // 名称不匹配时不会尝试读取内容
        assert!(f.search_entry(&e).unwrap().is_none());
    }
}
