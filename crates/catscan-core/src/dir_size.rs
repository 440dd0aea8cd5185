//! 目录大小缓存（递归求和 + 进程内记忆化）
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

/// 目录递归大小缓存
///
/// 以规范化路径为键；每个子目录的结果也会被记住，
/// 因此按深度优先顺序依次查询父、子目录时，每个目录只会被真正统计一次。
/// 通过 `Arc` 在多个扫描之间共享，生命周期与进程一致。
#[derive(Debug, Default)]
pub struct DirectorySizeCache {
    sizes: Mutex<HashMap<PathBuf, u64>>,
}

impl DirectorySizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 目录下全部文件的字节数之和（不跟随符号链接，不可读的子项按 0 计）
    pub fn size_of(&self, dir: &Path) -> u64 {
        let key = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        self.size_of_canonical(&key)
    }

    pub fn cached_entries(&self) -> usize {
        self.lock().len()
    }

    fn size_of_canonical(&self, dir: &Path) -> u64 {
        if let Some(size) = self.lock().get(dir) {
            return *size;
        }
        // 统计期间不持锁
        let mut total = 0u64;
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::debug!(dir = %dir.display(), %err, "skipping unreadable entry while sizing");
                    continue;
                }
            };
            let file_type = entry.file_type();
            if file_type.is_dir() {
                total = total.saturating_add(self.size_of_canonical(entry.path()));
            } else if file_type.is_file() {
                total = total.saturating_add(entry.metadata().map(|m| m.len()).unwrap_or(0));
            }
        }
        self.lock().insert(dir.to_path_buf(), total);
        total
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, u64>> {
        self.sizes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn sums_nested_files_and_memoizes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.bin"), vec![0u8; 10]).unwrap();
        fs::write(root.join("a/one.bin"), vec![0u8; 100]).unwrap();
        fs::write(root.join("a/b/two.bin"), vec![0u8; 1000]).unwrap();

        let cache = DirectorySizeCache::new();
        assert_eq!(cache.size_of(root), 1110);
        assert_eq!(cache.size_of(&root.join("a")), 1100);
        assert_eq!(cache.size_of(&root.join("a/b")), 1000);
        // root、a、a/b 各一条
        assert_eq!(cache.cached_entries(), 3);

        // 记忆化：文件变化后结果保持不变
        fs::write(root.join("a/b/three.bin"), vec![0u8; 5]).unwrap();
        assert_eq!(cache.size_of(&root.join("a/b")), 1000);
    }

    #[test]
    fn empty_directory_is_zero() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(DirectorySizeCache::new().size_of(tmp.path()), 0);
    }
}
