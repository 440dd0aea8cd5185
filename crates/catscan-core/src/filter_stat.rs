//! 文件统计（有界 Top-K）
//!
//! 工作集最多保留 K 个候选，并维护一个“临界值”（当前最差的入选值）：
//! - 未满时无条件加入；
//! - 已满时只有严格优于临界值的候选才能加入，加入后淘汰第一个等于旧临界值的成员
//!   （同值按到达顺序先进先出），再全量重算临界值。
//!
//! 每个被接纳的候选 O(K)，被拒绝的候选 O(1)；K 上限为 500。
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dir_size::DirectorySizeCache;
use crate::entry::Entry;
use crate::error::CriteriaError;
use crate::filter::{Comparative, Criteria, EntryMatcher};
use crate::filter_name::NameFilter;
use crate::pattern::PatternSet;
use crate::types::MatchNode;

pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const MAX_RESULTS_LIMIT: usize = 500;

const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M";

/// 统计类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    LargestFiles,
    SmallestFiles,
    LargestDirectories,
    SmallestDirectories,
    OldestFiles,
    NewestFiles,
    LongestPathNames,
}

impl StatKind {
    pub const ALL: [StatKind; 7] = [
        StatKind::LargestFiles,
        StatKind::SmallestFiles,
        StatKind::LargestDirectories,
        StatKind::SmallestDirectories,
        StatKind::OldestFiles,
        StatKind::NewestFiles,
        StatKind::LongestPathNames,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StatKind::LargestFiles => "Largest Files",
            StatKind::SmallestFiles => "Smallest Files",
            StatKind::LargestDirectories => "Largest Directories",
            StatKind::SmallestDirectories => "Smallest Directories",
            StatKind::OldestFiles => "Oldest Files",
            StatKind::NewestFiles => "Newest Files",
            StatKind::LongestPathNames => "Longest Path Names",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::LargestFiles => "largest_files",
            StatKind::SmallestFiles => "smallest_files",
            StatKind::LargestDirectories => "largest_directories",
            StatKind::SmallestDirectories => "smallest_directories",
            StatKind::OldestFiles => "oldest_files",
            StatKind::NewestFiles => "newest_files",
            StatKind::LongestPathNames => "longest_path_names",
        }
    }

    /// 候选是目录（进入目录时评估）还是文件
    pub fn is_directory_search(&self) -> bool {
        matches!(self, StatKind::LargestDirectories | StatKind::SmallestDirectories)
    }

    /// 值越大越优先
    fn larger_wins(&self) -> bool {
        matches!(
            self,
            StatKind::LargestFiles | StatKind::LargestDirectories | StatKind::NewestFiles | StatKind::LongestPathNames
        )
    }

    fn is_temporal(&self) -> bool {
        matches!(self, StatKind::OldestFiles | StatKind::NewestFiles)
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatKind {
    type Err = CriteriaError;

    /// 接受 `largest_files`、`largest-files` 或展示标签 `Largest Files`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        StatKind::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| CriteriaError::Unknown { field: "Stat Type", value: s.to_string() })
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    value: i64,
}

/// 统计过滤器：扫描中只收集候选，`end_scan` 时输出排序后的汇总节点
#[derive(Debug, Clone)]
pub struct StatFilter {
    names: NameFilter,
    kind: StatKind,
    max_results: usize,
    sizes: Arc<DirectorySizeCache>,
    members: Vec<Candidate>,
    critical: i64,
    root: PathBuf,
}

impl StatFilter {
    pub fn new(
        names: PatternSet,
        kind: StatKind,
        max_results: usize,
        sizes: Arc<DirectorySizeCache>,
    ) -> Result<Self, CriteriaError> {
        validate_max_results(i64::try_from(max_results).unwrap_or(i64::MAX))?;
        let mut filter = Self {
            names: NameFilter::new(names),
            kind,
            max_results,
            sizes,
            members: Vec::with_capacity(max_results),
            critical: 0,
            root: PathBuf::new(),
        };
        filter.reset(Path::new(""));
        Ok(filter)
    }

    pub fn kind(&self) -> StatKind {
        self.kind
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// 当前工作集（按到达顺序）
    pub fn working_set(&self) -> Vec<(&Path, i64)> {
        self.members.iter().map(|c| (c.path.as_path(), c.value)).collect()
    }

    pub fn critical_value(&self) -> i64 {
        self.critical
    }

    fn reset(&mut self, root: &Path) {
        self.members.clear();
        self.root = root.to_path_buf();
        // 初始临界值取该排序方向上最差的可表示值
        self.critical = if self.kind.larger_wins() { i64::MIN } else { i64::MAX };
    }

    fn beats(&self, a: i64, b: i64) -> bool {
        if self.kind.larger_wins() { a > b } else { a < b }
    }

    /// 两者中较差的一个
    fn worse(&self, a: i64, b: i64) -> i64 {
        if self.beats(a, b) { b } else { a }
    }

    fn offer(&mut self, path: PathBuf, value: i64) {
        if self.members.len() < self.max_results {
            self.critical = if self.members.is_empty() { value } else { self.worse(self.critical, value) };
            self.members.push(Candidate { path, value });
            return;
        }
        if !self.beats(value, self.critical) {
            return;
        }
        if let Some(pos) = self.members.iter().position(|c| c.value == self.critical) {
            self.members.remove(pos);
        }
        self.members.push(Candidate { path, value });
        let mut critical = self.members[0].value;
        for c in &self.members[1..] {
            critical = self.worse(critical, c.value);
        }
        self.critical = critical;
    }

    fn file_value(&self, entry: &Entry) -> io::Result<i64> {
        match self.kind {
            StatKind::LargestFiles | StatKind::SmallestFiles => Ok(to_i64(entry.len()?)),
            StatKind::OldestFiles | StatKind::NewestFiles => Ok(millis_since_epoch(entry.modified()?)),
            StatKind::LongestPathNames => Ok(to_i64(entry.path().to_string_lossy().chars().count() as u64)),
            StatKind::LargestDirectories | StatKind::SmallestDirectories => Ok(to_i64(self.sizes.size_of(entry.path()))),
        }
    }

    fn summary_label(&self, c: &Candidate) -> String {
        let value = if self.kind.is_temporal() {
            format_timestamp(c.value)
        } else if self.kind == StatKind::LongestPathNames {
            format!("{} chars", c.value)
        } else {
            format_size(u64::try_from(c.value).unwrap_or(0))
        };
        format!("{value} -- {}", self.display_path(&c.path))
    }

    /// 位于扫描根目录之下的路径显示为相对路径
    fn display_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
            _ => path.display().to_string(),
        }
    }
}

impl EntryMatcher for StatFilter {
    fn name(&self) -> &'static str {
        "File Statistics"
    }

    fn criteria(&self) -> Criteria {
        let mut c = self.names.criteria();
        c.push(("Stat Type", self.kind.label().to_string()));
        c.push(("Max Results", self.max_results.to_string()));
        c
    }

    fn entering_directory(&mut self, dir: &Path) {
        if !self.kind.is_directory_search() {
            return;
        }
        let name = dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if self.names.accepts(&name) {
            let size = self.sizes.size_of(dir);
            self.offer(dir.to_path_buf(), to_i64(size));
        }
    }

    fn search_entry(&mut self, entry: &Entry) -> io::Result<Option<Vec<MatchNode>>> {
        if !self.kind.is_directory_search() && self.names.accepts(entry.name()) {
            let value = self.file_value(entry)?;
            self.offer(entry.path().to_path_buf(), value);
        }
        Ok(None)
    }

    fn comparative(&mut self) -> Option<&mut dyn Comparative> {
        Some(self)
    }
}

impl Comparative for StatFilter {
    fn begin_scan(&mut self, root: &Path) {
        self.reset(root);
    }

    fn end_scan(&mut self) -> Option<Vec<MatchNode>> {
        if self.members.is_empty() {
            return None;
        }
        // 稳定排序：同值保持到达顺序
        if self.kind.larger_wins() {
            self.members.sort_by(|a, b| b.value.cmp(&a.value));
        } else {
            self.members.sort_by(|a, b| a.value.cmp(&b.value));
        }
        Some(
            self.members
                .iter()
                .map(|c| MatchNode::with_file(self.summary_label(c), c.path.clone()))
                .collect(),
        )
    }
}

pub(crate) fn validate_max_results(value: i64) -> Result<usize, CriteriaError> {
    let max = MAX_RESULTS_LIMIT as i64;
    if (1..=max).contains(&value) {
        Ok(value as usize)
    } else {
        Err(CriteriaError::OutOfRange { field: "Max Results", value, min: 1, max })
    }
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn millis_since_epoch(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

/// 二进制单位（1024 进制），最大到 GiB
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => "unknown time".to_string(),
    }
}
