//! 被检查的条目：文件系统文件或归档成员
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// 条目来源
#[derive(Debug, Clone)]
pub enum EntryOrigin {
    Filesystem,
    /// 归档成员：大小与修改时间取自归档头
    ArchiveMember { member: String, len: u64, modified: Option<SystemTime> },
}

/// 过滤器看到的统一条目视图
///
/// `content` 指向可读取的内容：文件系统条目即其自身路径，
/// 归档成员则是解压出的临时文件（仅在过滤器需要内容时才存在）。
#[derive(Debug, Clone)]
pub struct Entry {
    path: PathBuf,
    name: String,
    origin: EntryOrigin,
    content: Option<PathBuf>,
}

impl Entry {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path: path.to_path_buf(), name, origin: EntryOrigin::Filesystem, content: Some(path.to_path_buf()) }
    }

    /// 逻辑路径为 `<归档路径>/<成员路径>`
    pub fn archive_member(archive: &Path, member: &str, len: u64, modified: Option<SystemTime>) -> Self {
        Self {
            path: archive.join(member),
            name: member_base_name(member).to_string(),
            origin: EntryOrigin::ArchiveMember { member: member.to_string(), len, modified },
            content: None,
        }
    }

    pub fn with_content(mut self, content: &Path) -> Self {
        self.content = Some(content.to_path_buf());
        self
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn name(&self) -> &str { &self.name }
    pub fn origin(&self) -> &EntryOrigin { &self.origin }
    pub fn content(&self) -> Option<&Path> { self.content.as_deref() }

    /// 归档内的成员路径（文件系统条目为 None）
    pub fn member(&self) -> Option<&str> {
        match &self.origin {
            EntryOrigin::ArchiveMember { member, .. } => Some(member),
            EntryOrigin::Filesystem => None,
        }
    }

    pub fn len(&self) -> io::Result<u64> {
        match &self.origin {
            EntryOrigin::Filesystem => Ok(std::fs::metadata(&self.path)?.len()),
            EntryOrigin::ArchiveMember { len, .. } => Ok(*len),
        }
    }

    pub fn modified(&self) -> io::Result<SystemTime> {
        match &self.origin {
            EntryOrigin::Filesystem => std::fs::metadata(&self.path)?.modified(),
            EntryOrigin::ArchiveMember { modified, .. } => {
                modified.ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "archive member has no timestamp"))
            }
        }
    }

    pub fn open_content(&self) -> io::Result<File> {
        match &self.content {
            Some(p) => File::open(p),
            None => Err(io::Error::new(io::ErrorKind::NotFound, format!("no content staged for {}", self.path.display()))),
        }
    }
}

/// 成员路径的最后一段
pub(crate) fn member_base_name(member: &str) -> &str {
    member.trim_end_matches('/').rsplit('/').next().unwrap_or(member)
}
