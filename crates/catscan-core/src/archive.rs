//! 归档下钻
//!
//! `ArchiveWalker<M>` 把条目级匹配器包装成扫描引擎使用的 `SearchFilter`：
//! 名称命中归档模式的文件经中央目录打开，成员按目录顺序逐个读取；
//! 嵌套归档读入内存后同样打开并深度优先递归，其余成员交给被包装的匹配器。
use chrono::{Local, NaiveDate, TimeZone};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::time::SystemTime;
use zip::read::ZipFile;
use zip::ZipArchive;

use crate::entry::{member_base_name, Entry};
use crate::filter::{Comparative, Criteria, EntryMatcher, SearchFilter};
use crate::filter_class::ClassFilter;
use crate::filter_name::NameFilter;
use crate::filter_stat::StatFilter;
use crate::filter_text::TextFilter;
use crate::pattern::PatternSet;
use crate::types::MatchNode;

pub type NameSearch = ArchiveWalker<NameFilter>;
pub type TextSearch = ArchiveWalker<TextFilter>;
pub type ClassSearch = ArchiveWalker<ClassFilter>;
pub type StatSearch = ArchiveWalker<StatFilter>;

/// 归档感知的过滤器
///
/// 归档模式为空时不做任何下钻（统计过滤器的默认配置）。
#[derive(Debug, Clone)]
pub struct ArchiveWalker<M> {
    matcher: M,
    archives: PatternSet,
}

impl<M: EntryMatcher> ArchiveWalker<M> {
    pub fn new(matcher: M, archives: PatternSet) -> Self {
        Self { matcher, archives }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    pub fn archives(&self) -> &PatternSet {
        &self.archives
    }

    fn is_archive(&self, name: &str) -> bool {
        self.archives.matches(name)
    }

    fn walk_archive(&mut self, path: &Path) -> io::Result<Option<Vec<MatchNode>>> {
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?)).map_err(to_io)?;
        let mut holder = MatchNode::new(String::new());
        self.walk_zip(&mut zip, path, &mut holder)?;
        let children = holder.children().to_vec();
        Ok((!children.is_empty()).then_some(children))
    }

    /// 按中央目录顺序遍历成员；匹配结果挂到 `parent` 下
    ///
    /// 大小来自中央目录，带数据描述符（jar 工具的输出）的成员也能读取。
    fn walk_zip<R: Read + Seek>(&mut self, zip: &mut ZipArchive<R>, archive: &Path, parent: &mut MatchNode) -> io::Result<()> {
        for index in 0..zip.len() {
            let mut member = zip.by_index(index).map_err(to_io)?;
            if member.is_dir() {
                continue;
            }
            let member_name = member.name().to_string();
            let base_name = member_base_name(&member_name).to_string();

            if self.is_archive(&base_name) {
                let mut bytes = Vec::new();
                member.read_to_end(&mut bytes)?;
                let mut inner = ZipArchive::new(Cursor::new(bytes)).map_err(to_io)?;
                let mut nested = MatchNode::new(member_name.clone());
                self.walk_zip(&mut inner, &archive.join(&member_name), &mut nested)?;
                if !nested.is_leaf() {
                    parent.push(nested);
                }
                continue;
            }

            let entry = Entry::archive_member(archive, &member_name, member.size(), member_modified(&member));
            let found = if self.matcher.needs_content(&entry) {
                let staged = stage_member(&mut member, &base_name)?;
                self.matcher.search_entry(&entry.with_content(staged.path()))?
            } else {
                self.matcher.search_entry(&entry)?
            };
            if let Some(details) = found {
                let mut node = MatchNode::new(member_name);
                node.extend(details);
                parent.push(node);
            }
        }
        Ok(())
    }
}

impl<M: EntryMatcher> SearchFilter for ArchiveWalker<M> {
    fn name(&self) -> &'static str {
        self.matcher.name()
    }

    fn criteria(&self) -> Criteria {
        let mut c = vec![("Archive Name Pattern(s)", self.archives.as_str().to_string())];
        c.extend(self.matcher.criteria());
        c
    }

    fn entering_directory(&mut self, dir: &Path) {
        self.matcher.entering_directory(dir);
    }

    fn search(&mut self, path: &Path) -> io::Result<Option<Vec<MatchNode>>> {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if self.is_archive(&name) {
            self.walk_archive(path)
        } else {
            self.matcher.search_entry(&Entry::from_path(path))
        }
    }

    fn comparative(&mut self) -> Option<&mut dyn Comparative> {
        self.matcher.comparative()
    }

    fn clone_box(&self) -> Box<dyn SearchFilter> {
        Box::new(self.clone())
    }
}

/// 解压到临时文件，随返回值一起删除
fn stage_member(member: &mut ZipFile<'_>, base_name: &str) -> io::Result<tempfile::NamedTempFile> {
    let suffix = Path::new(base_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut staged = tempfile::Builder::new().prefix("catscan-").suffix(&suffix).tempfile()?;
    io::copy(member, staged.as_file_mut())?;
    Ok(staged)
}

/// zip 头中的 DOS 时间按本地时区解释
fn member_modified(member: &ZipFile<'_>) -> Option<SystemTime> {
    let t = member.last_modified();
    let naive = NaiveDate::from_ymd_opt(i32::from(t.year()), u32::from(t.month()), u32::from(t.day()))?
        .and_hms_opt(u32::from(t.hour()), u32::from(t.minute()), u32::from(t.second()))?;
    let local = Local.from_local_datetime(&naive).earliest()?;
    Some(SystemTime::from(local))
}

fn to_io(err: zip::result::ZipError) -> io::Error {
    match err {
        zip::result::ZipError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut w = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            if name.ends_with('/') {
                w.add_directory(name.trim_end_matches('/'), FileOptions::default()).unwrap();
            } else {
                w.start_file(*name, FileOptions::default()).unwrap();
                w.write_all(data).unwrap();
            }
        }
        w.finish().unwrap().into_inner()
    }

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = !0u32;
        for &b in data {
            crc ^= u32::from(b);
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    /// 不回写本地头的 zip（标志位 3）：本地头里 CRC 与大小为 0，真实值在数据描述符和中央目录
    fn build_streamed_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        for (name, data) in entries {
            let offset = out.len() as u32;
            let (crc, len) = (crc32(data), data.len() as u32);
            out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
            out.extend_from_slice(&[20, 0, 0x08, 0, 0, 0, 0, 0, 0x21, 0]);
            out.extend_from_slice(&[0u8; 12]);
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(data);
            out.extend_from_slice(&0x0807_4b50u32.to_le_bytes());
            for v in [crc, len, len] {
                out.extend_from_slice(&v.to_le_bytes());
            }

            central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
            central.extend_from_slice(&[20, 0, 20, 0, 0x08, 0, 0, 0, 0, 0, 0x21, 0]);
            for v in [crc, len, len] {
                central.extend_from_slice(&v.to_le_bytes());
            }
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0u8; 12]);
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }
        let central_offset = out.len() as u32;
        out.extend_from_slice(&central);
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&central_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    fn labels(nodes: &[MatchNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.label()).collect()
    }

    #[test]
    fn name_search_inside_zip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("bundle.zip");
        std::fs::write(&zip_path, build_zip(&[("docs/", b""), ("docs/a.txt", b"x"), ("b.log", b"y")])).unwrap();

        let mut f = NameSearch::new(NameFilter::new(PatternSet::parse("*.txt")), PatternSet::parse("*.zip"));
        let nodes = f.search(&zip_path).unwrap().unwrap();
        assert_eq!(labels(&nodes), vec!["docs/a.txt"]);
        assert!(nodes[0].is_leaf());
    }

    #[test]
    fn text_search_stages_member_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("notes.zip");
        std::fs::write(&zip_path, build_zip(&[("n.txt", b"one\nhas needle\n"), ("skip.bin", b"needle")])).unwrap();

        let text = TextFilter::new(PatternSet::parse("*.txt"), "needle", false).unwrap();
        let mut f = TextSearch::new(text, PatternSet::parse("*.zip"));
        let nodes = f.search(&zip_path).unwrap().unwrap();
        assert_eq!(labels(&nodes), vec!["n.txt"]);
        assert_eq!(labels(nodes[0].children()), vec!["Line 2, Column 4: has needle"]);
    }

    #[test]
    fn nested_archives_are_walked_depth_first() {
        let inner = build_zip(&[("deep/hit.txt", b"z"), ("miss.dat", b"z")]);
        let empty_inner = build_zip(&[("nothing.dat", b"z")]);
        let outer = build_zip(&[("inner.zip", inner.as_slice()), ("other.zip", empty_inner.as_slice()), ("top.dat", b"z")]);
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("outer.zip");
        std::fs::write(&zip_path, outer).unwrap();

        let mut f = NameSearch::new(NameFilter::new(PatternSet::parse("*.txt")), PatternSet::parse("*.zip"));
        let nodes = f.search(&zip_path).unwrap().unwrap();
        // 没有命中的嵌套层被丢弃
        assert_eq!(labels(&nodes), vec!["inner.zip"]);
        assert_eq!(labels(nodes[0].children()), vec!["deep/hit.txt"]);
    }

    #[test]
    fn data_descriptor_members_are_read() {
        let jar = build_streamed_zip(&[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"), ("com/foo/Bar.class", b"\xca\xfe\xba\xbe")]);
        assert_eq!(jar[6] & 0x08, 0x08);
        let tmp = tempfile::TempDir::new().unwrap();
        let jar_path = tmp.path().join("app.jar");
        std::fs::write(&jar_path, jar).unwrap();

        let class = ClassFilter::new(PatternSet::parse(ClassFilter::DEFAULT_NAMES), "com.foo.Bar", false).unwrap();
        let mut f = ClassSearch::new(class, PatternSet::parse(ClassFilter::DEFAULT_ARCHIVES));
        let nodes = f.search(&jar_path).unwrap().unwrap();
        assert_eq!(labels(&nodes), vec!["com/foo/Bar.class"]);

        // 内容同样可读（校验 CRC）
        let text = TextFilter::new(PatternSet::parse("*.MF"), "Version", true).unwrap();
        let mut t = TextSearch::new(text, PatternSet::parse("*.jar"));
        let nodes = t.search(&jar_path).unwrap().unwrap();
        assert_eq!(labels(nodes[0].children()), vec!["Line 1, Column 9: Manifest-Version: 1.0"]);
    }

    #[test]
    fn nested_streamed_archive_is_walked() {
        let inner = build_streamed_zip(&[("lib/hit.txt", b"z")]);
        let outer = build_streamed_zip(&[("inner.jar", inner.as_slice()), ("top.dat", b"z")]);
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("outer.zip");
        std::fs::write(&zip_path, outer).unwrap();

        let mut f = NameSearch::new(NameFilter::new(PatternSet::parse("*.txt")), PatternSet::parse("*.zip,*.jar"));
        let nodes = f.search(&zip_path).unwrap().unwrap();
        assert_eq!(labels(&nodes), vec!["inner.jar"]);
        assert_eq!(labels(nodes[0].children()), vec!["lib/hit.txt"]);
    }

    #[test]
    fn archive_without_matches_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("x.zip");
        std::fs::write(&zip_path, build_zip(&[("a.dat", b"1")])).unwrap();
        let mut f = NameSearch::new(NameFilter::new(PatternSet::parse("*.txt")), PatternSet::parse("*.zip"));
        assert!(f.search(&zip_path).unwrap().is_none());
    }

    #[test]
    fn empty_archive_set_disables_descent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("x.zip");
        std::fs::write(&zip_path, build_zip(&[("a.txt", b"1")])).unwrap();
        let mut f = NameSearch::new(NameFilter::new(PatternSet::parse("*.zip")), PatternSet::empty());
        // 归档本身按普通文件匹配
        let hit = f.search(&zip_path).unwrap().unwrap();
        assert!(hit.is_empty());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let zip_path = tmp.path().join("bad.zip");
        std::fs::write(&zip_path, b"PK\x03\x04garbage").unwrap();
        let mut f = NameSearch::new(NameFilter::default(), PatternSet::parse("*.zip"));
        assert!(f.search(&zip_path).is_err());
    }

    #[test]
    fn criteria_lists_archive_patterns_first() {
        let f = NameSearch::new(NameFilter::default(), PatternSet::parse(NameFilter::DEFAULT_ARCHIVES));
        assert_eq!(
            f.criteria(),
            vec![("Archive Name Pattern(s)", "*.zip".to_string()), ("File Name Pattern(s)", "*.*".to_string())]
        );
    }
}
