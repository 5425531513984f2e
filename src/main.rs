//! treesplit - Split a directory tree into size-balanced buckets.
//!
//! Usage:
//!   tsplit split [PATH] -b 8          Write 8 rsync filter files for PATH
//!   tsplit split [PATH] -m paths      Write flat path lists instead
//!   tsplit export [PATH] -o tree.json Scan once, split later with --snapshot
//!   tsplit verify --snapshot FILE ... Check that bucket files cover the tree
//!   tsplit --help                     Show help

use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use treesplit_core::{FileTree, Metric, OutputMode, PartitionConfig, PathStyle, ScanConfig};
use treesplit_partition::{
    CoverageReport, DEFAULT_RULES_BASENAME, PartitionReport, Partitioner, RuleSet,
    verify_coverage, verify_paths, verify_rules, write_buckets,
};
use treesplit_scan::{JwalkScanner, TreeSource, load_snapshot, save_snapshot};

#[derive(Parser)]
#[command(
    name = "treesplit",
    version,
    about = "Split a directory tree into size-balanced buckets for parallel copies",
    long_about = "treesplit divides the tree below a root into N buckets of roughly equal \
                  size (or file count) and writes one file per bucket: either rsync \
                  filter rules (`rsync --filter='merge FILE'`) or a flat list of paths.\n\n\
                  Entries created after their directory was scanned are not covered; \
                  re-run the split right before copying."
)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Partition a tree and write one file per bucket
    Split(SplitArgs),

    /// Scan a tree and save it as a JSON snapshot
    Export {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Check that bucket files cover every leaf exactly once
    Verify {
        /// Bucket files, in bucket order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Snapshot the files were generated from
        #[arg(long, conflicts_with = "scan_path")]
        snapshot: Option<PathBuf>,

        /// Scan this path instead of loading a snapshot
        #[arg(long = "scan", value_name = "PATH")]
        scan_path: Option<PathBuf>,

        /// Subtree the files were generated for
        #[arg(long, default_value = "/")]
        root: String,

        /// Kind of bucket files
        #[arg(short, long, default_value = "rules")]
        mode: ModeArg,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,
    },
}

#[derive(Args)]
struct SplitArgs {
    /// Path to split (with --snapshot: subtree inside the snapshot)
    path: Option<PathBuf>,

    /// Number of buckets
    #[arg(short, long, default_value = "2")]
    buckets: usize,

    /// Aggregate used to balance buckets
    #[arg(short, long, default_value = "capacity")]
    aggregate: AggregateArg,

    /// What each bucket file contains
    #[arg(short, long, default_value = "rules")]
    mode: ModeArg,

    /// Basename for bucket files (default: rsync-filter, or treesplit_<time> for paths)
    #[arg(short = 'o', long)]
    filter_basename: Option<String>,

    /// Directory to write bucket files into
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,

    /// Visit every item instead of claiming directory remainders with a wildcard
    #[arg(long)]
    no_wildcards: bool,

    /// Maximum children listed per directory query in rules mode (0 = unlimited)
    #[arg(long, default_value_t = TreeSource::DEFAULT_MAX_ENTRIES)]
    max_entries: usize,

    /// Partition a snapshot written by `export` instead of scanning
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Render paths for robocopy below this UNC prefix (e.g. \\server\share)
    #[arg(long, value_name = "PREFIX")]
    robocopy: Option<String>,

    /// Don't write bucket files, only report
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Replay the buckets against the tree after splitting
    #[arg(long)]
    verify: bool,

    /// Report format
    #[arg(short, long, default_value = "text")]
    format: ReportFormat,

    #[command(flatten)]
    scan: ScanArgs,
}

#[derive(Args, Default)]
struct ScanArgs {
    /// Follow symbolic links while scanning
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Descend into other filesystems
    #[arg(long)]
    cross_filesystems: bool,

    /// Skip hidden files and directories
    #[arg(long)]
    no_hidden: bool,

    /// Glob of entry names to skip (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Number of scan threads (0 = auto)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AggregateArg {
    /// Bytes on disk
    Capacity,
    /// Number of files
    Files,
}

impl From<AggregateArg> for Metric {
    fn from(arg: AggregateArg) -> Self {
        match arg {
            AggregateArg::Capacity => Metric::Capacity,
            AggregateArg::Files => Metric::Files,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// rsync include/exclude rules
    Rules,
    /// One path per line
    Paths,
}

impl From<ModeArg> for OutputMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Rules => OutputMode::Rules,
            ModeArg::Paths => OutputMode::Paths,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum ReportFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Split(args) => run_split(args),
        Command::Export { path, output, scan } => run_export(&path, output, &scan),
        Command::Verify {
            files,
            snapshot,
            scan_path,
            root,
            mode,
            format,
        } => run_verify(&files, snapshot, scan_path, &root, mode.into(), format),
    }
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("treesplit=debug,tsplit=debug,warn")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("treesplit=info,tsplit=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Split a scanned or snapshotted tree and write the bucket files.
fn run_split(args: SplitArgs) -> Result<()> {
    let (tree, root) = match &args.snapshot {
        Some(snapshot) => {
            let tree = load_snapshot(snapshot)
                .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
            let scanned_at = chrono::DateTime::<chrono::Local>::from(tree.scanned_at);
            info!(
                scanned_at = %scanned_at.format("%Y-%m-%d %H:%M"),
                "Loaded snapshot {}",
                snapshot.display()
            );
            let root = args
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| "/".to_string());
            (tree, root)
        }
        None => {
            let path = args.path.clone().unwrap_or_else(|| PathBuf::from("."));
            (scan_tree(&path, &args.scan)?, "/".to_string())
        }
    };

    let mode: OutputMode = args.mode.into();
    let path_style = match &args.robocopy {
        Some(prefix) => PathStyle::Windows {
            prefix: prefix.clone(),
        },
        None => PathStyle::Posix,
    };
    let config = PartitionConfig::builder()
        .buckets(args.buckets)
        .metric(Metric::from(args.aggregate))
        .mode(mode)
        .wildcards(!args.no_wildcards)
        .path_style(path_style)
        .build()
        .context("Invalid partition settings")?;

    let source = TreeSource::new(tree).with_max_entries(args.max_entries);
    let partition = Partitioner::new(&source, config)
        .run(&root)
        .context("Partitioning failed")?;

    let files = if args.dry_run {
        Vec::new()
    } else {
        let basename = args
            .filter_basename
            .clone()
            .unwrap_or_else(|| default_basename(mode));
        write_buckets(&partition, &args.output_dir, &basename)
            .context("Failed to write bucket files")?
    };

    let coverage = if args.verify {
        let leaves = subtree_leaves(source.tree(), &root)?;
        Some(verify_coverage(&partition, &leaves)?)
    } else {
        None
    };

    let report = PartitionReport::new(&partition, &files);
    match args.format {
        ReportFormat::Text => {
            print_report(&report);
            if let Some(coverage) = &coverage {
                print_coverage(coverage);
            }
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(coverage) = &coverage {
                println!("{}", serde_json::to_string_pretty(coverage)?);
            }
        }
    }

    if coverage.as_ref().is_some_and(|c| !c.is_exact()) {
        bail!("Bucket files do not cover the tree exactly once");
    }
    Ok(())
}

/// Scan a local path, logging progress at debug level.
fn scan_tree(path: &Path, args: &ScanArgs) -> Result<FileTree> {
    let path = path.canonicalize().context("Invalid path")?;
    let config = ScanConfig::builder()
        .root(path.clone())
        .follow_symlinks(args.follow_symlinks)
        .cross_filesystems(args.cross_filesystems)
        .include_hidden(!args.no_hidden)
        .ignore_patterns(args.ignore.clone())
        .threads(args.threads)
        .build()
        .context("Invalid scan settings")?;

    info!("Scanning {}", path.display());

    let scanner = JwalkScanner::new();
    let mut progress = scanner.subscribe();
    let reporter = thread::spawn(move || loop {
        match progress.blocking_recv() {
            Ok(p) => debug!(
                files = p.files_scanned,
                dirs = p.dirs_scanned,
                bytes = p.bytes_scanned,
                "Scanning {}",
                p.current_path.display()
            ),
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    });

    let result = scanner.scan(&config);
    drop(scanner);
    if reporter.join().is_err() {
        warn!("Progress reporter panicked");
    }
    let tree = result.context("Scan failed")?;

    info!(
        "Scanned {} in {} files, {} directories ({:.2}s)",
        format_size(tree.stats.total_size),
        tree.stats.total_files,
        tree.stats.total_dirs,
        tree.scan_duration.as_secs_f64()
    );
    if tree.has_warnings() {
        warn!("{} warning(s) during scan", tree.warnings.len());
    }
    Ok(tree)
}

/// Export scan results to JSON.
fn run_export(path: &Path, output: Option<PathBuf>, args: &ScanArgs) -> Result<()> {
    let tree = scan_tree(path, args)?;

    match output {
        Some(output_path) => {
            save_snapshot(&tree, &output_path).context("Failed to write snapshot")?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => {
            println!("{}", serde_json::to_string(&tree)?);
        }
    }

    Ok(())
}

/// Replay bucket files against a tree.
fn run_verify(
    files: &[PathBuf],
    snapshot: Option<PathBuf>,
    scan_path: Option<PathBuf>,
    root: &str,
    mode: OutputMode,
    format: ReportFormat,
) -> Result<()> {
    let tree = match (snapshot, scan_path) {
        (Some(snapshot), _) => load_snapshot(&snapshot)
            .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?,
        (None, Some(path)) => scan_tree(&path, &ScanArgs::default())?,
        (None, None) => bail!("Either --snapshot or --scan is required"),
    };
    let leaves = subtree_leaves(&tree, root)?;

    let mut contents = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        contents.push(text);
    }

    let report = match mode {
        OutputMode::Rules => {
            let rule_sets = files
                .iter()
                .zip(&contents)
                .map(|(file, text)| {
                    RuleSet::parse(text).with_context(|| format!("Invalid rules in {}", file.display()))
                })
                .collect::<Result<Vec<_>>>()?;
            verify_rules(&leaves, &rule_sets)
        }
        OutputMode::Paths => {
            let lists: Vec<Vec<String>> = contents
                .iter()
                .map(|text| {
                    text.lines()
                        .filter(|line| !line.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .collect();
            verify_paths(&leaves, &lists)
        }
    };

    match format {
        ReportFormat::Text => print_coverage(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.is_exact() {
        bail!("Bucket files do not cover the tree exactly once");
    }
    Ok(())
}

/// Leaves below a slash-delimited subtree of the tree.
fn subtree_leaves(tree: &FileTree, root: &str) -> Result<Vec<String>> {
    let node = tree
        .root
        .descendant(root.split('/').filter(|p| !p.is_empty()))
        .ok_or_else(|| eyre!("{root} not found in tree"))?;
    Ok(node.leaves())
}

/// Default bucket file basename for a mode.
fn default_basename(mode: OutputMode) -> String {
    match mode {
        OutputMode::Rules => DEFAULT_RULES_BASENAME.to_string(),
        OutputMode::Paths => format!("treesplit_{}", chrono::Local::now().format("%Y%m%d%H%M")),
    }
}

fn print_report(report: &PartitionReport) {
    let amount = |value: u64| match report.metric {
        Metric::Capacity => format_size(value),
        Metric::Files => format!("{value} files"),
    };

    println!();
    println!("{}", "─".repeat(70));
    println!(
        " {} split into {} buckets by {} (target {} each)",
        report.root,
        report.requested,
        report.metric,
        amount(report.capacity)
    );
    println!("{}", "─".repeat(70));

    for bucket in &report.buckets {
        let name = bucket
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(|| format!("bucket {}", bucket.index));
        let lines = match bucket.rules {
            Some(rules) => format!("{rules} rules"),
            None => format!("{} paths", bucket.entries),
        };
        let overflow = if bucket.overflow > 0 {
            format!("  (+{} over)", amount(bucket.overflow))
        } else {
            String::new()
        };
        println!(
            " {:<32} {:>12} / {:<12} {:>10}{}",
            name,
            amount(bucket.used),
            amount(bucket.capacity),
            lines,
            overflow
        );
    }

    if !report.warnings.is_empty() {
        println!();
        println!(" {} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            println!("   {}: {}", warning.path, warning.message);
        }
    }
    println!();
}

fn print_coverage(report: &CoverageReport) {
    if report.is_exact() {
        println!(" Coverage: all {} leaves in exactly one bucket", report.leaves);
        return;
    }

    println!(
        " Coverage: {} of {} leaves uncovered, {} duplicated",
        report.uncovered.len(),
        report.leaves,
        report.duplicated.len()
    );
    for path in &report.uncovered {
        println!("   missing   {path}");
    }
    for dup in &report.duplicated {
        println!("   duplicate {} (buckets {:?})", dup.path, dup.buckets);
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
