use anyhow::{bail, Context, Result};
use catscan_core::{
    default_criteria, launch, load_filter_spec, DesktopLauncher, DirectorySizeCache, FilterKind, FilterSpec,
    ScanHandle, ScanOptions, ScanOutcome, Scanner, StatKind,
};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "catscan", version, about = "递归文件搜索（含 zip/jar 归档）")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描一个或多个目录并输出结果树
    Scan {
        /// 根目录；多个根目录并发扫描
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// 过滤器：name / text / class / stat
        #[arg(long, value_parser = FilterKind::from_str)]
        filter: Option<FilterKind>,

        /// 条件文件（TOML，`[filter]` 表）；命令行参数覆盖其中的同名字段
        #[arg(long)]
        criteria: Option<PathBuf>,

        /// 文件名模式，逗号分隔
        #[arg(long)]
        names: Option<String>,

        /// 归档名模式，逗号分隔；传空串关闭归档下钻
        #[arg(long)]
        archives: Option<String>,

        /// 要查找的文本（text 过滤器）
        #[arg(long)]
        text: Option<String>,

        /// 类或包名，例如 com.foo.Bar（class 过滤器）
        #[arg(long)]
        class: Option<String>,

        #[arg(long)]
        case_sensitive: bool,

        /// 统计类型（stat 过滤器），例如 largest-files
        #[arg(long, value_parser = StatKind::from_str)]
        stat: Option<StatKind>,

        /// 统计结果条数上限（1..=500）
        #[arg(long)]
        max_results: Option<i64>,

        /// 工作线程数（"auto" = min(3, CPU 核数)）
        #[arg(long, default_value = "auto")]
        workers: String,

        /// 超时（秒）后取消扫描
        #[arg(long)]
        time_limit: Option<u64>,

        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,

        /// 只输出汇总行
        #[arg(long)]
        quiet: bool,
    },

    /// 列出可用过滤器及其默认条件
    Filters,

    /// 用系统默认方式打开结果条目（脚本文件交给编辑器）
    Open { path: PathBuf },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            roots,
            filter,
            criteria,
            names,
            archives,
            text,
            class,
            case_sensitive,
            stat,
            max_results,
            workers,
            time_limit,
            json,
            quiet,
        } => {
            let mut spec = match &criteria {
                Some(path) => load_filter_spec(path)?,
                None => FilterSpec::new(filter.unwrap_or(FilterKind::Name)),
            };
            if let Some(kind) = filter {
                spec.kind = kind;
            }
            spec.name_patterns = names.or(spec.name_patterns);
            spec.archive_patterns = archives.or(spec.archive_patterns);
            spec.search_text = text.or(spec.search_text);
            spec.class_name = class.or(spec.class_name);
            spec.stat = stat.or(spec.stat);
            spec.max_results = max_results.or(spec.max_results);
            if case_sensitive {
                spec.case_sensitive = Some(true);
            }

            let sizes = Arc::new(DirectorySizeCache::new());
            let prototype = spec.build(&sizes).context("invalid search criteria")?;
            let opts = ScanOptions { workers: parse_threads(&workers), ..ScanOptions::default() };
            let scanner = Scanner::new(opts).context("failed to start scan pool")?;
            info!(filter = prototype.name(), roots = roots.len(), workers = scanner.workers(), "starting scan");

            let handles = roots
                .iter()
                .map(|root| scanner.launch(root, prototype.as_ref()).with_context(|| format!("cannot scan {}", root.display())))
                .collect::<Result<Vec<ScanHandle>>>()?;
            let deadline = time_limit.map(|secs| Instant::now() + Duration::from_secs(secs));

            let mut failed = 0usize;
            for handle in &handles {
                let outcome = handle.wait_until(deadline);
                if let ScanOutcome::Failed { message } = &outcome {
                    error!(root = %handle.root().display(), %message, "scan failed");
                    failed += 1;
                }
                report(handle.root(), &outcome, json, quiet)?;
            }
            if failed > 0 {
                bail!("{failed} scan(s) could not be completed");
            }
        }
        Commands::Filters => {
            for kind in FilterKind::all() {
                let (name, criteria) = default_criteria(*kind);
                println!("{kind}: {name}");
                for (label, value) in criteria {
                    println!("  {label}: {value}");
                }
            }
        }
        Commands::Open { path } => {
            let action = launch(&SystemLauncher, &path).with_context(|| format!("failed to open {}", path.display()))?;
            info!(path = %path.display(), ?action, "opened");
        }
    }

    Ok(())
}

fn report(root: &Path, outcome: &ScanOutcome, json: bool, quiet: bool) -> Result<()> {
    if json {
        let item = outcome.to_json(root, !quiet);
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }
    if !quiet {
        if let Some(tree) = outcome.tree() {
            print!("{}", tree.render());
        }
    }
    println!("{}", outcome.summary_line());
    Ok(())
}

/// 桌面打开：默认程序走 `open`，编辑优先使用 $VISUAL / $EDITOR
struct SystemLauncher;

impl DesktopLauncher for SystemLauncher {
    fn open(&self, path: &Path) -> io::Result<()> {
        open::that(path)
    }

    fn edit(&self, path: &Path) -> io::Result<()> {
        match std::env::var("VISUAL").or_else(|_| std::env::var("EDITOR")) {
            Ok(editor) if !editor.trim().is_empty() => open::with(path, editor.trim()),
            _ => open::that(path),
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    // 支持通过环境变量 RUST_LOG 控制日志等级，如：RUST_LOG=debug
    // 日志写 stderr，stdout 只留给结果
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_writer(io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}
