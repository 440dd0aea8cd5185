//! 扫描会话与并发调度
//!
//! - 每次扫描是固定大小 rayon 线程池上的一个后台任务，扫描内部顺序遍历；
//! - 进行中的结果树由一把 `Mutex` 保护，只在修改和拷贝快照时持锁，从不跨 I/O；
//! - 消费方通过 crossbeam 通道接收 `ScanEvent`，每次扫描恰好收到一个 `Finished`；
//! - 取消是协作式的：`AtomicBool` 在每个目录和每个条目处检查。
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::ScanError;
use crate::filter::SearchFilter;
use crate::options::ScanOptions;
use crate::scan::{file_label, TraversalEngine, TraversalSink};
use crate::types::MatchNode;

/// 无结果时追加到根节点下的提示
pub const NO_MATCHES: &str = "No matches found.";

/// 推送给消费方的事件
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// 正在检查的条目名（节流后）
    Examining { name: String },
    /// 结果树的深拷贝
    Snapshot(Arc<MatchNode>),
    Finished(ScanOutcome),
}

/// 扫描的最终状态
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed { tree: Arc<MatchNode>, matches: usize, errors: usize },
    Cancelled,
    Failed { message: String },
}

impl ScanOutcome {
    pub fn summary_line(&self) -> String {
        match self {
            ScanOutcome::Completed { matches, errors, .. } => {
                let noun = if *matches == 1 { "match" } else { "matches" };
                let mut line = format!("Search complete - {matches} {noun}.");
                if *errors > 0 {
                    line.push_str(&format!("  {errors} error(s) during search."));
                }
                line
            }
            ScanOutcome::Cancelled => "Search cancelled.".to_string(),
            ScanOutcome::Failed { .. } => "Search could not be completed due to an error.".to_string(),
        }
    }

    pub fn tree(&self) -> Option<&Arc<MatchNode>> {
        match self {
            ScanOutcome::Completed { tree, .. } => Some(tree),
            _ => None,
        }
    }

    /// JSON 报告；`include_tree` 为 false 时只保留汇总字段
    pub fn to_json(&self, root: &Path, include_tree: bool) -> serde_json::Value {
        let (status, matches, errors) = match self {
            ScanOutcome::Completed { matches, errors, .. } => ("completed", Some(*matches), Some(*errors)),
            ScanOutcome::Cancelled => ("cancelled", None, None),
            ScanOutcome::Failed { .. } => ("failed", None, None),
        };
        let tree = if include_tree { self.tree().map(|t| t.as_ref()) } else { None };
        serde_json::json!({
            "root": root.display().to_string(),
            "status": status,
            "summary": self.summary_line(),
            "matches": matches,
            "errors": errors,
            "tree": tree,
        })
    }
}

/// 单次扫描：根目录 + 过滤器实例 + 取消标志 + 事件出口
pub struct ScanSession {
    root: PathBuf,
    filter: Box<dyn SearchFilter>,
    cancel: Arc<AtomicBool>,
    events: Sender<ScanEvent>,
    options: ScanOptions,
}

impl ScanSession {
    pub fn new(
        root: PathBuf,
        filter: Box<dyn SearchFilter>,
        cancel: Arc<AtomicBool>,
        events: Sender<ScanEvent>,
        options: ScanOptions,
    ) -> Self {
        Self { root, filter, cancel, events, options }
    }

    /// 在当前线程执行整次扫描；结束时发送 `Finished` 并返回同一结果
    pub fn run(mut self) -> ScanOutcome {
        let started = Instant::now();
        tracing::info!(root = %self.root.display(), filter = self.filter.name(), "scan started");
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.execute())) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(root = %self.root.display(), %message, "scan task panicked");
                ScanOutcome::Failed { message }
            }
        };
        tracing::info!(
            root = %self.root.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            summary = %outcome.summary_line(),
            "scan finished"
        );
        let _ = self.events.send(ScanEvent::Finished(outcome.clone()));
        outcome
    }

    fn execute(&mut self) -> ScanOutcome {
        let mut tree = MatchNode::new(self.root.display().to_string());
        tree.push(criteria_node(self.filter.as_ref()));
        let tree = Arc::new(Mutex::new(tree));

        if let Some(c) = self.filter.comparative() {
            c.begin_scan(&self.root);
        }

        let mut publisher = Publisher::new(Arc::clone(&tree), self.events.clone(), &self.options);
        let mut engine = TraversalEngine::new(self.filter.as_mut(), &self.cancel);
        let finished = engine.walk(&self.root, &mut publisher);
        let stats = engine.into_stats();
        if !finished || self.cancel.load(Ordering::Relaxed) {
            return ScanOutcome::Cancelled;
        }

        if let Some(summary) = self.filter.comparative().and_then(|c| c.end_scan()) {
            let mut live = lock(&tree);
            live.extend(summary);
        }

        let snapshot = {
            let mut live = lock(&tree);
            if live.match_count() == 0 {
                live.push(MatchNode::metadata(NO_MATCHES));
            }
            Arc::new(live.clone())
        };
        let matches = snapshot.match_count();
        let _ = self.events.send(ScanEvent::Snapshot(Arc::clone(&snapshot)));
        tracing::debug!(
            files = stats.files_examined,
            directories = stats.directories_entered,
            errors = stats.errors,
            "traversal stats"
        );
        ScanOutcome::Completed { tree: snapshot, matches, errors: stats.errors }
    }
}

/// “<过滤器名> Criteria” 说明节点，每个条件一个子节点
fn criteria_node(filter: &dyn SearchFilter) -> MatchNode {
    let mut node = MatchNode::metadata(format!("{} Criteria", filter.name()));
    for (label, value) in filter.criteria() {
        node.push(MatchNode::metadata(format!("{label}: {value}")));
    }
    node
}

fn lock(tree: &Mutex<MatchNode>) -> std::sync::MutexGuard<'_, MatchNode> {
    tree.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "scan task panicked".to_string()
    }
}

/// 遍历接收方：写入共享结果树，并按间隔节流发布进度
struct Publisher {
    tree: Arc<Mutex<MatchNode>>,
    events: Sender<ScanEvent>,
    examining_interval: Duration,
    publish_interval: Duration,
    last_examining: Option<Instant>,
    last_publish: Instant,
    published_matches: usize,
    live_matches: usize,
}

impl Publisher {
    fn new(tree: Arc<Mutex<MatchNode>>, events: Sender<ScanEvent>, options: &ScanOptions) -> Self {
        Self {
            tree,
            events,
            examining_interval: options.examining_interval,
            publish_interval: options.publish_interval,
            last_examining: None,
            last_publish: Instant::now(),
            published_matches: 0,
            live_matches: 0,
        }
    }

    /// 命中数自上次发布后有增长且已过发布间隔时，发送一份快照
    fn maybe_publish(&mut self) {
        if self.live_matches <= self.published_matches || self.last_publish.elapsed() < self.publish_interval {
            return;
        }
        let snapshot = Arc::new(lock(&self.tree).clone());
        self.published_matches = self.live_matches;
        self.last_publish = Instant::now();
        tracing::debug!(matches = self.live_matches, "publishing snapshot");
        let _ = self.events.send(ScanEvent::Snapshot(snapshot));
    }
}

impl TraversalSink for Publisher {
    fn examining(&mut self, path: &Path) {
        let due = self.last_examining.map_or(true, |t| t.elapsed() >= self.examining_interval);
        if due {
            self.last_examining = Some(Instant::now());
            let _ = self.events.send(ScanEvent::Examining { name: file_label(path) });
        }
        self.maybe_publish();
    }

    fn attach(&mut self, containers: &[String], node: MatchNode) {
        self.live_matches += node.match_count();
        lock(&self.tree).insert_at(containers, node);
        self.maybe_publish();
    }
}

/// 扫描调度器：持有固定大小的工作线程池
pub struct Scanner {
    pool: rayon::ThreadPool,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Result<Self, ScanError> {
        let workers = options.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("catscan-worker-{i}"))
            .build()?;
        tracing::debug!(workers, "scan pool ready");
        Ok(Self { pool, options })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// 校验根目录并在线程池上启动扫描；过滤器按原型克隆，各扫描状态独立
    pub fn launch(&self, root: &Path, filter: &dyn SearchFilter) -> Result<ScanHandle, ScanError> {
        let root = validate_root(root)?;
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();
        let session = ScanSession::new(root.clone(), filter.clone_box(), Arc::clone(&cancel), tx, self.options.clone());
        self.pool.spawn(move || {
            session.run();
        });
        Ok(ScanHandle { root, cancel, events: rx })
    }
}

fn validate_root(root: &Path) -> Result<PathBuf, ScanError> {
    if !root.exists() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    Ok(std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf()))
}

/// 运行中扫描的句柄
pub struct ScanHandle {
    root: PathBuf,
    cancel: Arc<AtomicBool>,
    events: Receiver<ScanEvent>,
}

impl ScanHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 请求取消；扫描在下一个检查点结束
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// 阻塞直到扫描结束，丢弃中间事件
    pub fn wait(&self) -> ScanOutcome {
        self.wait_until(None)
    }

    /// 到达截止时间仍未结束则取消，再等待最终结果
    pub fn wait_until(&self, deadline: Option<Instant>) -> ScanOutcome {
        let mut deadline = deadline;
        loop {
            let event = match deadline {
                Some(d) => match self.events.recv_deadline(d) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::info!(root = %self.root.display(), "time limit reached, cancelling scan");
                        self.cancel();
                        deadline = None;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return disconnected(),
                },
                None => match self.events.recv() {
                    Ok(event) => event,
                    Err(_) => return disconnected(),
                },
            };
            if let ScanEvent::Finished(outcome) = event {
                return outcome;
            }
        }
    }
}

fn disconnected() -> ScanOutcome {
    ScanOutcome::Failed { message: "scan task ended without reporting a result".to_string() }
}
