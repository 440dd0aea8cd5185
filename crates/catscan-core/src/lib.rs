//! 文件搜索核心库
//!
//! 设计要点：
//! - 匹配策略分两层：条目级 `EntryMatcher`（文件名 / 文本 / 类名 / 统计）
//!   与扫描级 `SearchFilter`；`ArchiveWalker<M>` 负责把前者包装成后者并下钻 zip 归档。
//! - 遍历深度优先、同层文件先于目录；目录只在有命中后代时才出现在结果树中。
//! - 每次扫描在固定大小的线程池上运行，通过通道推送进度、快照与最终结果。
//! - 统计类过滤器维护有界 Top-K 工作集，扫描结束时一次性输出。

mod archive;
mod criteria;
mod desktop;
mod dir_size;
mod entry;
mod error;
mod filter;
mod filter_class;
mod filter_name;
mod filter_stat;
mod filter_text;
mod options;
mod pattern;
mod scan;
mod session;
mod types;

pub use archive::{ArchiveWalker, ClassSearch, NameSearch, StatSearch, TextSearch};
pub use criteria::{default_criteria, default_filter, load_filter_spec, parse_filter_spec, FilterKind, FilterSpec};
pub use desktop::{launch, DesktopAction, DesktopLauncher};
pub use dir_size::DirectorySizeCache;
pub use entry::{Entry, EntryOrigin};
pub use error::{CriteriaError, ScanError};
pub use filter::{Comparative, Criteria, EntryMatcher, SearchFilter};
pub use filter_class::ClassFilter;
pub use filter_name::NameFilter;
pub use filter_stat::{format_size, StatFilter, StatKind, DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT};
pub use filter_text::TextFilter;
pub use options::{ScanOptions, ScanStats, DEFAULT_WORKERS};
pub use pattern::PatternSet;
pub use scan::{order_files_before_dirs, TraversalEngine, TraversalSink};
pub use session::{ScanEvent, ScanHandle, ScanOutcome, ScanSession, Scanner, NO_MATCHES};
pub use types::{MatchNode, NodeId, NodeKind};
