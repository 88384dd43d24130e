//! Demo CLI driving the propagator between two local directories
//!
//! Exercises the library end to end with the reference
//! [`propagator::drivers::LocalFsDriver`] standing in for both replicas
//! (a "remote" reachable over a real object-store driver is out of scope
//! for this binary; the propagator itself is agnostic to what `R` is).
//! Grounded on the teacher's CLI: `clap` derive with flattened
//! functional-group structs, `tracing-subscriber` wired from a verbosity
//! count, and `anyhow` for top-level error reporting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use propagator::{
    drivers::LocalFsDriver, engine, Direction as SyncDirection, EntryType, FileStat,
    InMemoryStateDb, Instruction, Progress, ProgressCallback, ProgressKind, PropagateContext,
    Replica, ReplicaKind,
};

#[derive(Parser, Debug)]
#[command(name = "propagate", about = "Apply a reconciled sync plan between two local directory trees")]
struct Args {
    #[command(flatten)]
    paths: PathConfig,

    #[command(flatten)]
    output: OutputConfig,
}

#[derive(clap::Args, Debug)]
struct PathConfig {
    /// The LOCAL replica's root directory.
    local: PathBuf,

    /// The REMOTE replica's root directory (a plain directory in this
    /// demo; a production deployment would point this at a real remote
    /// driver instead).
    remote: PathBuf,

    /// Which side is the source for this run.
    #[arg(long, value_enum, default_value_t = DirectionArg::LocalToRemote)]
    direction: DirectionArg,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DirectionArg {
    LocalToRemote,
    RemoteToLocal,
}

impl From<DirectionArg> for SyncDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::LocalToRemote => SyncDirection::LocalToRemote,
            DirectionArg::RemoteToLocal => SyncDirection::RemoteToLocal,
        }
    }
}

#[derive(clap::Args, Debug)]
struct OutputConfig {
    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Increase log verbosity; may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl OutputConfig {
    fn filter(&self) -> EnvFilter {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("propagator={level}")))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(args.output.filter())
        .init();

    if !args.paths.local.is_dir() {
        bail!("local path {:?} is not a directory", args.paths.local);
    }
    if !args.paths.remote.is_dir() {
        bail!("remote path {:?} is not a directory", args.paths.remote);
    }

    let direction: SyncDirection = args.paths.direction.into();
    let (source_root, dest_root) = match direction {
        SyncDirection::LocalToRemote => (&args.paths.local, &args.paths.remote),
        SyncDirection::RemoteToLocal => (&args.paths.remote, &args.paths.local),
    };

    let source_tree = scan_and_reconcile(source_root, dest_root)
        .with_context(|| format!("scanning {source_root:?} against {dest_root:?}"))?;

    let mut local = Replica::new(ReplicaKind::Local, args.paths.local.display().to_string());
    let mut remote = Replica::new(ReplicaKind::Remote, args.paths.remote.display().to_string());
    match direction {
        SyncDirection::LocalToRemote => local.tree = source_tree,
        SyncDirection::RemoteToLocal => remote.tree = source_tree,
    }

    let mut ctx = PropagateContext::new(local, remote, direction);
    if args.output.progress {
        ctx.callback = Some(Box::new(BarCallback::new()));
    }

    let local_driver = LocalFsDriver::new();
    let remote_driver = LocalFsDriver::new();
    let statedb = InMemoryStateDb::new();

    engine::init_progress(&mut ctx);
    engine::propagate_files(&mut ctx, &local_driver, &remote_driver, &statedb)
        .context("propagate_files failed")?;
    engine::finalize_progress(&mut ctx);

    info!(
        transferred_bytes = ctx.overall_progress.byte_current,
        files = ctx.overall_progress.current_file_no,
        "sync complete"
    );
    Ok(())
}

/// Build a tree over `source_root`, comparing each entry against the
/// matching path under `dest_root` to assign a minimal NEW/SYNC
/// instruction. Standing in for the out-of-scope reconciler.
fn scan_and_reconcile(source_root: &Path, dest_root: &Path) -> Result<propagator::Tree> {
    let mut tree = propagator::Tree::new();
    for entry in walkdir::WalkDir::new(source_root)
        .min_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let rel = entry
            .path()
            .strip_prefix(source_root)
            .expect("walkdir yields paths under source_root")
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");

        let meta = entry.metadata().context("reading entry metadata")?;
        let entry_type = if meta.is_dir() {
            EntryType::Dir
        } else if meta.file_type().is_symlink() {
            EntryType::Slink
        } else {
            EntryType::File
        };

        let dest_path = dest_root.join(&rel);
        let instruction = classify(&entry.path().to_path_buf(), &dest_path, entry_type)?;

        let mut st = FileStat::new(rel, entry_type, instruction);
        st.size = meta.len();
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            st.mode = meta.mode();
            st.uid = meta.uid();
            st.gid = meta.gid();
            st.inode = meta.ino();
        }
        let modtime = filetime::FileTime::from_last_modification_time(&meta);
        st.modtime = modtime.unix_seconds();

        tree.insert(st);
    }
    Ok(tree)
}

fn classify(source_path: &Path, dest_path: &Path, entry_type: EntryType) -> Result<Instruction> {
    if !dest_path.exists() {
        return Ok(Instruction::New);
    }
    if entry_type == EntryType::Dir {
        return Ok(Instruction::Sync);
    }
    let source_meta = std::fs::metadata(source_path)?;
    let dest_meta = std::fs::metadata(dest_path)?;
    if source_meta.len() != dest_meta.len() {
        return Ok(Instruction::Sync);
    }
    let source_mtime = filetime::FileTime::from_last_modification_time(&source_meta);
    let dest_mtime = filetime::FileTime::from_last_modification_time(&dest_meta);
    if source_mtime != dest_mtime {
        return Ok(Instruction::Sync);
    }
    Ok(Instruction::None)
}

struct BarCallback {
    bar: ProgressBar,
}

impl BarCallback {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {bytes}/{total_bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(200));
        Self { bar }
    }
}

impl ProgressCallback for BarCallback {
    fn on_progress(&self, progress: &Progress) {
        match progress.kind {
            ProgressKind::StartSyncSequence => {
                self.bar.set_length(progress.overall_transmission_size);
            }
            ProgressKind::StartUpload | ProgressKind::StartDownload => {
                self.bar.set_message(progress.path.clone());
            }
            ProgressKind::FinishedUpload | ProgressKind::FinishedDownload => {
                self.bar.set_position(progress.current_overall_bytes + progress.file_size);
            }
            ProgressKind::FinishedSyncSequence => {
                self.bar.finish_with_message("done");
            }
            _ => {}
        }
    }
}
