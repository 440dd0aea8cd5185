//! 结果树节点（对外暴露）
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// 节点标识：创建时分配，深拷贝后保持不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 节点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// 命中项、命中明细或容器（目录 / 归档）
    Match,
    /// 说明性节点（扫描条件、无结果提示），不计入命中数
    Metadata,
}

/// 结果树节点
///
/// - 带 `file` 的节点对应一个命中的文件系统条目，在过滤语义上是叶子；
///   其子节点只用于描述命中细节（例如行号/列号）。
/// - `Clone` 为深拷贝，保留全部 `NodeId`，快照即由此得到。
#[derive(Debug, Clone, Serialize)]
pub struct MatchNode {
    id: NodeId,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    kind: NodeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<MatchNode>,
}

impl MatchNode {
    /// 纯文本节点（容器、命中明细）
    pub fn new(label: impl Into<String>) -> Self {
        Self { id: NodeId::next(), label: label.into(), file: None, kind: NodeKind::Match, children: Vec::new() }
    }

    /// 指向具体条目的节点
    pub fn with_file(label: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self { file: Some(file.into()), ..Self::new(label) }
    }

    /// 以文件名作为标签的条目节点
    pub fn for_path(path: &Path) -> Self {
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::with_file(label, path)
    }

    pub fn metadata(label: impl Into<String>) -> Self {
        Self { kind: NodeKind::Metadata, ..Self::new(label) }
    }

    pub fn id(&self) -> NodeId { self.id }
    pub fn label(&self) -> &str { &self.label }
    pub fn file(&self) -> Option<&Path> { self.file.as_deref() }
    pub fn kind(&self) -> NodeKind { self.kind }
    pub fn is_metadata(&self) -> bool { self.kind == NodeKind::Metadata }
    pub fn children(&self) -> &[MatchNode] { &self.children }
    pub fn is_leaf(&self) -> bool { self.children.is_empty() }

    pub fn push(&mut self, child: MatchNode) {
        self.children.push(child);
    }

    pub fn extend<I: IntoIterator<Item = MatchNode>>(&mut self, children: I) {
        self.children.extend(children);
    }

    /// 命中数：非说明性叶子节点的个数（说明性子树整体跳过）
    pub fn match_count(&self) -> usize {
        if self.is_metadata() {
            return 0;
        }
        if self.is_leaf() {
            return 1;
        }
        self.children.iter().map(MatchNode::match_count).sum()
    }

    /// 沿容器标签链下行（缺失的容器按需创建），把 `node` 挂到末端
    pub fn insert_at(&mut self, containers: &[String], node: MatchNode) {
        let mut cursor = self;
        for label in containers {
            let pos = match cursor.children.iter().position(|c| c.is_container() && c.label == *label) {
                Some(pos) => pos,
                None => {
                    cursor.children.push(MatchNode::new(label.clone()));
                    cursor.children.len() - 1
                }
            };
            cursor = &mut cursor.children[pos];
        }
        cursor.children.push(node);
    }

    fn is_container(&self) -> bool {
        self.kind == NodeKind::Match && self.file.is_none()
    }

    /// 按标签查找直接子节点
    pub fn child(&self, label: &str) -> Option<&MatchNode> {
        self.children.iter().find(|c| c.label == label)
    }

    /// 先序遍历全部节点（含自身）
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a MatchNode, usize)) {
        fn go<'a>(node: &'a MatchNode, depth: usize, visit: &mut dyn FnMut(&'a MatchNode, usize)) {
            visit(node, depth);
            for c in &node.children {
                go(c, depth + 1, visit);
            }
        }
        go(self, 0, visit);
    }

    /// 缩进文本形式（每层两个空格）
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.walk(&mut |node, depth| {
            let _ = writeln!(out, "{:indent$}{}", "", node.label, indent = depth * 2);
        });
        out
    }
}
