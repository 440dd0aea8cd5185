//! 过滤器能力接口
//!
//! - `EntryMatcher`：条目级匹配（文件名 / 文本 / 类名 / 统计），只关心单个条目；
//! - `ArchiveWalker<M>`（见 archive.rs）把任意 `EntryMatcher` 包装为 `SearchFilter`，
//!   负责归档下钻；
//! - `Comparative`：需要在整棵树走完后才产出结果的过滤器（统计类）。
use std::io;
use std::path::Path;

use crate::entry::Entry;
use crate::types::MatchNode;

/// 有序的“标签 -> 取值”列表，用于展示扫描条件
pub type Criteria = Vec<(&'static str, String)>;

/// 扫描引擎使用的过滤器接口
///
/// `search` 的返回约定：
/// - `None`：不命中；
/// - `Some(vec![])`：命中，无额外明细；
/// - `Some(nodes)`：命中，附带明细节点。
pub trait SearchFilter: Send {
    fn name(&self) -> &'static str;

    fn criteria(&self) -> Criteria;

    /// 进入目录前调用；除目录统计外不影响匹配
    fn entering_directory(&mut self, dir: &Path);

    fn search(&mut self, path: &Path) -> io::Result<Option<Vec<MatchNode>>>;

    fn comparative(&mut self) -> Option<&mut dyn Comparative> {
        None
    }

    /// 条件相同、状态独立的新实例
    fn clone_box(&self) -> Box<dyn SearchFilter>;
}

impl Clone for Box<dyn SearchFilter> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// 比较型过滤器：整次扫描结束后一次性给出汇总节点
pub trait Comparative {
    fn begin_scan(&mut self, root: &Path);
    fn end_scan(&mut self) -> Option<Vec<MatchNode>>;
}

/// 条目级匹配器
pub trait EntryMatcher: Clone + Send + 'static {
    fn name(&self) -> &'static str;

    fn criteria(&self) -> Criteria;

    fn entering_directory(&mut self, _dir: &Path) {}

    /// 归档成员是否需要先解压到临时文件
    fn needs_content(&self, _entry: &Entry) -> bool {
        false
    }

    fn search_entry(&mut self, entry: &Entry) -> io::Result<Option<Vec<MatchNode>>>;

    fn comparative(&mut self) -> Option<&mut dyn Comparative> {
        None
    }
}

