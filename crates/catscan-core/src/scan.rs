//! 目录遍历
//!
//! 深度优先、单线程；同一层内文件排在目录之前（稳定重排）。
//! 目录只有在其下至少一个条目命中时才会以容器节点出现：
//! 命中节点连同其所在的目录标签链一起交给 `TraversalSink`，由接收方按需创建容器。
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;

use crate::filter::SearchFilter;
use crate::options::ScanStats;
use crate::types::MatchNode;

/// 遍历结果的接收方
pub trait TraversalSink {
    /// 即将检查的非目录条目
    fn examining(&mut self, path: &Path);

    /// 命中节点；`containers` 为根目录到其父目录的目录名链（不含根）
    fn attach(&mut self, containers: &[String], node: MatchNode);
}

struct Child {
    path: PathBuf,
    is_dir: bool,
}

/// 把非目录条目稳定地排到目录之前
pub fn order_files_before_dirs<T>(items: &mut [T], is_dir: impl Fn(&T) -> bool) {
    items.sort_by_key(|item| is_dir(item));
}

pub struct TraversalEngine<'a> {
    filter: &'a mut dyn SearchFilter,
    cancel: &'a AtomicBool,
    stats: ScanStats,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(filter: &'a mut dyn SearchFilter, cancel: &'a AtomicBool) -> Self {
        Self { filter, cancel, stats: ScanStats::default() }
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn into_stats(self) -> ScanStats {
        self.stats
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// 遍历 `root`；返回 false 表示中途被取消
    pub fn walk(&mut self, root: &Path, sink: &mut dyn TraversalSink) -> bool {
        let mut containers = Vec::new();
        self.walk_dir(root, &mut containers, sink);
        !self.cancelled()
    }

    fn walk_dir(&mut self, dir: &Path, containers: &mut Vec<String>, sink: &mut dyn TraversalSink) {
        if self.cancelled() {
            return;
        }
        self.filter.entering_directory(dir);
        self.stats.directories_entered += 1;
        tracing::debug!(dir = %dir.display(), "entering directory");

        let mut children = self.list_children(dir);
        order_files_before_dirs(&mut children, |c| c.is_dir);

        for child in children {
            if self.cancelled() {
                return;
            }
            if child.is_dir {
                containers.push(file_label(&child.path));
                self.walk_dir(&child.path, containers, sink);
                containers.pop();
                continue;
            }
            sink.examining(&child.path);
            self.stats.files_examined += 1;
            match self.filter.search(&child.path) {
                Ok(Some(details)) => {
                    let mut node = MatchNode::for_path(&child.path);
                    node.extend(details);
                    sink.attach(containers, node);
                }
                Ok(None) => {}
                Err(err) => {
                    self.stats.errors += 1;
                    tracing::warn!(path = %child.path.display(), %err, "failed to search entry");
                }
            }
        }
    }

    fn list_children(&mut self, dir: &Path) -> Vec<Child> {
        let mut children = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    self.stats.errors += 1;
                    tracing::warn!(dir = %dir.display(), %err, "failed to list directory");
                    continue;
                }
            };
            let file_type = entry.file_type();
            // 不跟随指向目录的符号链接
            if file_type.is_symlink() && entry.path().is_dir() {
                continue;
            }
            children.push(Child { is_dir: file_type.is_dir(), path: entry.into_path() });
        }
        children
    }
}

/// 条目的展示名（最后一段路径）
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
