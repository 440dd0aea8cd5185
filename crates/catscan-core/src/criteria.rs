//! 过滤器目录与条件文件（TOML）
//!
//! 条件文件只有一个 `[filter]` 表，省略的字段取对应过滤器的默认值：
//!
//! ```toml
//! [filter]
//! kind = "text"
//! name_patterns = "*.txt"
//! archive_patterns = "*.zip"
//! search_text = "world"
//! case_sensitive = false
//! ```
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::archive::{ClassSearch, NameSearch, StatSearch, TextSearch};
use crate::dir_size::DirectorySizeCache;
use crate::error::CriteriaError;
use crate::filter::{Criteria, SearchFilter};
use crate::filter_class::ClassFilter;
use crate::filter_name::NameFilter;
use crate::filter_stat::{validate_max_results, StatFilter, StatKind, DEFAULT_MAX_RESULTS};
use crate::filter_text::TextFilter;
use crate::pattern::PatternSet;

/// 可选的过滤器种类（展示顺序即声明顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Name,
    Text,
    Class,
    Stat,
}

impl FilterKind {
    pub const ALL: [FilterKind; 4] = [FilterKind::Name, FilterKind::Text, FilterKind::Class, FilterKind::Stat];

    pub fn all() -> &'static [FilterKind] {
        &Self::ALL
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Name => "name",
            FilterKind::Text => "text",
            FilterKind::Class => "class",
            FilterKind::Stat => "stat",
        }
    }

    pub fn default_names(&self) -> &'static str {
        match self {
            FilterKind::Name | FilterKind::Stat => NameFilter::DEFAULT_NAMES,
            FilterKind::Text => TextFilter::DEFAULT_NAMES,
            FilterKind::Class => ClassFilter::DEFAULT_NAMES,
        }
    }

    /// 统计过滤器默认不进入归档
    pub fn default_archives(&self) -> &'static str {
        match self {
            FilterKind::Name | FilterKind::Text => NameFilter::DEFAULT_ARCHIVES,
            FilterKind::Class => ClassFilter::DEFAULT_ARCHIVES,
            FilterKind::Stat => "",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = CriteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| CriteriaError::Unknown { field: "Filter", value: s.to_string() })
    }
}

/// 一次扫描的全部条件；除 `kind` 外都可省略
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSpec {
    pub kind: FilterKind,
    #[serde(default)]
    pub name_patterns: Option<String>,
    #[serde(default)]
    pub archive_patterns: Option<String>,
    #[serde(default)]
    pub search_text: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub stat: Option<StatKind>,
    #[serde(default)]
    pub max_results: Option<i64>,
}

impl FilterSpec {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            name_patterns: None,
            archive_patterns: None,
            search_text: None,
            class_name: None,
            case_sensitive: None,
            stat: None,
            max_results: None,
        }
    }

    /// 校验并构造过滤器原型
    pub fn build(&self, sizes: &Arc<DirectorySizeCache>) -> Result<Box<dyn SearchFilter>, CriteriaError> {
        let names = PatternSet::parse(self.name_patterns.as_deref().unwrap_or(self.kind.default_names()));
        let archives = PatternSet::parse(self.archive_patterns.as_deref().unwrap_or(self.kind.default_archives()));
        let case_sensitive = self.case_sensitive.unwrap_or(false);
        let filter: Box<dyn SearchFilter> = match self.kind {
            FilterKind::Name => Box::new(NameSearch::new(NameFilter::new(names), archives)),
            FilterKind::Text => {
                let text = self.search_text.as_deref().unwrap_or_default();
                Box::new(TextSearch::new(TextFilter::new(names, text, case_sensitive)?, archives))
            }
            FilterKind::Class => {
                let class_name = self.class_name.as_deref().unwrap_or_default();
                Box::new(ClassSearch::new(ClassFilter::new(names, class_name, case_sensitive)?, archives))
            }
            FilterKind::Stat => {
                let kind = self.stat.ok_or(CriteriaError::Missing { field: "Stat Type" })?;
                let max_results = match self.max_results {
                    Some(v) => validate_max_results(v)?,
                    None => DEFAULT_MAX_RESULTS,
                };
                let stat = StatFilter::new(names, kind, max_results, Arc::clone(sizes))?;
                Box::new(StatSearch::new(stat, archives))
            }
        };
        Ok(filter)
    }
}

/// 默认条件的过滤器；文本与类名过滤器缺少必填项，只能列出条件而不能直接构造
pub fn default_criteria(kind: FilterKind) -> (&'static str, Criteria) {
    let mut c = vec![("Archive Name Pattern(s)", kind.default_archives().to_string())];
    c.push(("File Name Pattern(s)", kind.default_names().to_string()));
    let name = match kind {
        FilterKind::Name => "File Name Search",
        FilterKind::Text => {
            c.push(("Search Text", String::new()));
            c.push(("Case Sensitive", false.to_string()));
            "Text File Search"
        }
        FilterKind::Class => {
            c.push(("Class or Package", String::new()));
            c.push(("Case Sensitive", false.to_string()));
            "Java Class/Package Search"
        }
        FilterKind::Stat => {
            c.push(("Stat Type", StatKind::LargestFiles.label().to_string()));
            c.push(("Max Results", DEFAULT_MAX_RESULTS.to_string()));
            "File Statistics"
        }
    };
    (name, c)
}

/// 名称与统计过滤器可按默认条件直接构造
pub fn default_filter(kind: FilterKind, sizes: &Arc<DirectorySizeCache>) -> Result<Box<dyn SearchFilter>, CriteriaError> {
    let mut spec = FilterSpec::new(kind);
    if kind == FilterKind::Stat {
        spec.stat = Some(StatKind::LargestFiles);
    }
    spec.build(sizes)
}

#[derive(Debug, Deserialize)]
struct CriteriaFile {
    filter: FilterSpec,
}

pub fn parse_filter_spec(text: &str) -> Result<FilterSpec> {
    let parsed: CriteriaFile = toml::from_str(text).context("invalid criteria file")?;
    Ok(parsed.filter)
}

pub fn load_filter_spec(path: &Path) -> Result<FilterSpec> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read criteria file {}", path.display()))?;
    parse_filter_spec(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> Arc<DirectorySizeCache> {
        Arc::new(DirectorySizeCache::new())
    }

    #[test]
    fn parses_text_criteria() {
        let spec = parse_filter_spec(
            r#"
            [filter]
            kind = "text"
            name_patterns = "*.md, *.txt"
            search_text = "world"
            case_sensitive = true
            "#,
        )
        .unwrap();
        assert_eq!(spec.kind, FilterKind::Text);
        let filter = spec.build(&sizes()).unwrap();
        assert_eq!(filter.name(), "Text File Search");
        assert_eq!(
            filter.criteria(),
            vec![
                ("Archive Name Pattern(s)", "*.zip".to_string()),
                ("File Name Pattern(s)", "*.md, *.txt".to_string()),
                ("Search Text", "world".to_string()),
                ("Case Sensitive", "true".to_string()),
            ]
        );
    }

    #[test]
    fn stat_defaults_disable_archives() {
        let spec = parse_filter_spec("[filter]\nkind = \"stat\"\nstat = \"newest_files\"\n").unwrap();
        let filter = spec.build(&sizes()).unwrap();
        let criteria = filter.criteria();
        assert_eq!(criteria[0], ("Archive Name Pattern(s)", String::new()));
        assert!(criteria.contains(&("Stat Type", "Newest Files".to_string())));
        assert!(criteria.contains(&("Max Results", "20".to_string())));
    }

    #[test]
    fn validation_errors_surface_before_launch() {
        let mut spec = FilterSpec::new(FilterKind::Stat);
        spec.stat = Some(StatKind::LargestFiles);
        spec.max_results = Some(0);
        assert!(matches!(spec.build(&sizes()), Err(CriteriaError::OutOfRange { value: 0, .. })));
        spec.max_results = Some(-3);
        assert!(matches!(spec.build(&sizes()), Err(CriteriaError::OutOfRange { value: -3, .. })));

        assert!(matches!(FilterSpec::new(FilterKind::Text).build(&sizes()), Err(CriteriaError::Missing { .. })));
        assert!(matches!(FilterSpec::new(FilterKind::Class).build(&sizes()), Err(CriteriaError::Missing { .. })));
        assert!(matches!(
            FilterSpec::new(FilterKind::Stat).build(&sizes()),
            Err(CriteriaError::Missing { field: "Stat Type" })
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse_filter_spec("[filter]\nkind = \"name\"\nbogus = 1\n").is_err());
        assert!(parse_filter_spec("[filter]\nkind = \"regex\"\n").is_err());
    }

    #[test]
    fn catalogue_order_and_defaults() {
        let names: Vec<_> = FilterKind::all().iter().map(|k| default_criteria(*k).0).collect();
        assert_eq!(names, vec!["File Name Search", "Text File Search", "Java Class/Package Search", "File Statistics"]);
        assert_eq!("CLASS".parse::<FilterKind>().unwrap(), FilterKind::Class);

        for kind in [FilterKind::Name, FilterKind::Stat] {
            let filter = default_filter(kind, &sizes()).unwrap();
            assert_eq!(filter.criteria(), default_criteria(kind).1);
        }
    }

    #[test]
    fn load_reports_path_on_failure() {
        let err = load_filter_spec(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.toml"));
    }
}
