//! 扫描选项与统计信息（模块）
use std::time::Duration;

/// 默认并发扫描数（与 CPU 核数取小）
pub const DEFAULT_WORKERS: usize = 3;

/// 扫描选项
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// 工作线程数：None 表示自动（`min(3, CPU 核数)`）
    pub workers: Option<usize>,
    /// “正在检查”通知的最小间隔（仅为显示节流，不影响正确性）
    pub examining_interval: Duration,
    /// 两次快照发布之间的最小间隔
    pub publish_interval: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: None,
            examining_interval: Duration::from_millis(100),
            publish_interval: Duration::from_millis(250),
        }
    }
}

impl ScanOptions {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n >= 1 => n,
            _ => DEFAULT_WORKERS.min(num_cpus::get()).max(1),
        }
    }
}

/// 单次扫描的计数
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub files_examined: usize,
    pub directories_entered: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_worker_count_wins() {
        let opts = ScanOptions { workers: Some(7), ..ScanOptions::default() };
        assert_eq!(opts.worker_count(), 7);
    }

    #[test]
    fn auto_worker_count_is_bounded() {
        let n = ScanOptions::default().worker_count();
        assert!((1..=DEFAULT_WORKERS).contains(&n));
        let zero = ScanOptions { workers: Some(0), ..ScanOptions::default() };
        assert_eq!(zero.worker_count(), n);
    }
}
