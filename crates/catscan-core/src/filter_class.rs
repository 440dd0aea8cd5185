//! 类 / 包名搜索
use std::io;

use crate::entry::Entry;
use crate::error::CriteriaError;
use crate::filter::{Criteria, EntryMatcher};
use crate::filter_name::NameFilter;
use crate::pattern::PatternSet;
use crate::types::MatchNode;

const CLASS_SUFFIX: &str = ".class";

/// 在类文件、源文件与 jar/war/ear 归档中查找类或包
///
/// 查询 `com.foo.Bar` 转为路径片段 `com/foo/Bar`；若查询本身以 `.class` 结尾，
/// 转换后再补回 `.class`。文件系统条目比较其完整路径（分隔符统一为 `/`），
/// 归档成员比较其在归档内的成员路径。包只有在包含至少一个匹配文件时才能被找到。
#[derive(Debug, Clone)]
pub struct ClassFilter {
    names: NameFilter,
    class_name: String,
    needle: String,
    case_sensitive: bool,
}

impl ClassFilter {
    pub const DEFAULT_NAMES: &'static str = "*.class,*.java";
    pub const DEFAULT_ARCHIVES: &'static str = "*.jar,*.war,*.ear";

    pub fn new(names: PatternSet, class_name: &str, case_sensitive: bool) -> Result<Self, CriteriaError> {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return Err(CriteriaError::Missing { field: "Class or Package" });
        }
        Ok(Self {
            names: NameFilter::new(names),
            class_name: class_name.to_string(),
            needle: to_path_needle(class_name, case_sensitive),
            case_sensitive,
        })
    }

    fn path_matches(&self, path: &str) -> bool {
        if self.case_sensitive {
            path.contains(&self.needle)
        } else {
            path.to_lowercase().contains(&self.needle)
        }
    }
}

fn to_path_needle(class_name: &str, case_sensitive: bool) -> String {
    let needle = match class_name.strip_suffix(CLASS_SUFFIX) {
        Some(stem) => format!("{}{CLASS_SUFFIX}", stem.replace('.', "/")),
        None => class_name.replace('.', "/"),
    };
    if case_sensitive { needle } else { needle.to_lowercase() }
}

impl EntryMatcher for ClassFilter {
    fn name(&self) -> &'static str {
        "Java Class/Package Search"
    }

    fn criteria(&self) -> Criteria {
        let mut c = self.names.criteria();
        c.push(("Class or Package", self.class_name.clone()));
        c.push(("Case Sensitive", self.case_sensitive.to_string()));
        c
    }

    fn search_entry(&mut self, entry: &Entry) -> io::Result<Option<Vec<MatchNode>>> {
        if !self.names.accepts(entry.name()) {
            return Ok(None);
        }
        let hit = match entry.member() {
            Some(member) => self.path_matches(member),
            None => self.path_matches(&entry.path().to_string_lossy().replace('\\', "/")),
        };
        Ok(hit.then(Vec::new))
    }
}
