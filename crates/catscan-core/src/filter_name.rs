//! 文件名匹配
use std::io;

use crate::entry::Entry;
use crate::filter::{Criteria, EntryMatcher};
use crate::pattern::PatternSet;
use crate::types::MatchNode;

/// 按文件名通配模式匹配；其余匹配器都先经过它做名称预筛
#[derive(Debug, Clone)]
pub struct NameFilter {
    names: PatternSet,
}

impl NameFilter {
    pub const DEFAULT_NAMES: &'static str = "*.*";
    pub const DEFAULT_ARCHIVES: &'static str = "*.zip";

    pub fn new(names: PatternSet) -> Self {
        Self { names }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.names
    }

    pub fn accepts(&self, name: &str) -> bool {
        self.names.matches(name)
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::new(PatternSet::parse(Self::DEFAULT_NAMES))
    }
}

impl EntryMatcher for NameFilter {
    fn name(&self) -> &'static str {
        "File Name Search"
    }

    fn criteria(&self) -> Criteria {
        vec![("File Name Pattern(s)", self.names.as_str().to_string())]
    }

    fn search_entry(&mut self, entry: &Entry) -> io::Result<Option<Vec<MatchNode>>> {
        Ok(self.accepts(entry.name()).then(Vec::new))
    }
}
