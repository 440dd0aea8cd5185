//! 结果条目的桌面打开方式
use std::io;
use std::path::Path;

/// 脚本类文件交给编辑器，其余交给系统默认程序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopAction {
    Open,
    Edit,
}

const EDIT_EXTENSIONS: [&str; 3] = ["bat", "cmd", "sh"];

impl DesktopAction {
    pub fn for_path(path: &Path) -> Self {
        let is_script = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .map_or(false, |e| EDIT_EXTENSIONS.contains(&e.as_str()));
        if is_script { DesktopAction::Edit } else { DesktopAction::Open }
    }
}

/// 由宿主（CLI / GUI）实现的打开能力
pub trait DesktopLauncher {
    fn open(&self, path: &Path) -> io::Result<()>;
    fn edit(&self, path: &Path) -> io::Result<()>;
}

/// 按扩展名路由到 `open` 或 `edit`
pub fn launch(launcher: &dyn DesktopLauncher, path: &Path) -> io::Result<DesktopAction> {
    let action = DesktopAction::for_path(path);
    match action {
        DesktopAction::Open => launcher.open(path)?,
        DesktopAction::Edit => launcher.edit(path)?,
    }
    tracing::debug!(path = %path.display(), ?action, "launched desktop action");
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<String>>,
    }

    impl DesktopLauncher for Recorder {
        fn open(&self, path: &Path) -> io::Result<()> {
            self.calls.borrow_mut().push(format!("open {}", path.display()));
            Ok(())
        }
        fn edit(&self, path: &Path) -> io::Result<()> {
            self.calls.borrow_mut().push(format!("edit {}", path.display()));
            Ok(())
        }
    }

    #[test]
    fn scripts_are_edited() {
        assert_eq!(DesktopAction::for_path(Path::new("run.sh")), DesktopAction::Edit);
        assert_eq!(DesktopAction::for_path(Path::new("BUILD.BAT")), DesktopAction::Edit);
        assert_eq!(DesktopAction::for_path(Path::new("x.cmd")), DesktopAction::Edit);
        assert_eq!(DesktopAction::for_path(Path::new("report.pdf")), DesktopAction::Open);
        assert_eq!(DesktopAction::for_path(Path::new("Makefile")), DesktopAction::Open);
    }

    #[test]
    fn launch_routes_to_launcher() {
        let r = Recorder::default();
        assert_eq!(launch(&r, Path::new("/t/a.sh")).unwrap(), DesktopAction::Edit);
        assert_eq!(launch(&r, Path::new("/t/b.txt")).unwrap(), DesktopAction::Open);
        assert_eq!(*r.calls.borrow(), vec!["edit /t/a.sh", "open /t/b.txt"]);
    }
}
