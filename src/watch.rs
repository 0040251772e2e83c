//! Watch mode for automatic recompiles on file changes
//!
//! [`SourceWatcher`] turns filesystem notifications into discrete change sets
//! for the source directory; [`watch`] runs the compile operation once per
//! change set until the watcher is stopped through its [`StopHandle`].

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::build::{BuildPipeline, BuildResult, BuildStatus, DiscoveryError, SourceMatcher};
use crate::config::schema::{SourcesConfig, WatchConfig};

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    Channel(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// The source patterns could not be compiled
    #[error(transparent)]
    Patterns(#[from] DiscoveryError),
}

/// Message delivered to the watch loop.
enum WatchSignal {
    Fs(DebounceEventResult),
    Stop,
}

/// Paths that changed since the previous change set, relative to the
/// source directory and sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub paths: Vec<PathBuf>,
}

/// Stops a [`SourceWatcher`] from another thread (e.g. a Ctrl+C handler).
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<WatchSignal>,
}

impl StopHandle {
    /// Make the watcher's next [`SourceWatcher::next_change`] return `None`.
    pub fn stop(&self) {
        // The watcher is already gone if the send fails
        let _ = self.tx.send(WatchSignal::Stop);
    }
}

impl std::fmt::Debug for WatchSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchSignal::Fs(_) => write!(f, "Fs"),
            WatchSignal::Stop => write!(f, "Stop"),
        }
    }
}

/// Decides which changed paths should trigger a run.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    src_dir: PathBuf,
    matcher: SourceMatcher,
    extensions: Vec<String>,
    partials: bool,
}

impl ChangeFilter {
    /// Build a filter for `src_dir`.
    ///
    /// Without `partials` only members of the source set count. With it, any
    /// file carrying a source extension counts, including those under
    /// excluded directories.
    pub fn new(
        src_dir: PathBuf,
        sources: &SourcesConfig,
        partials: bool,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self {
            src_dir,
            matcher: SourceMatcher::new(sources)?,
            extensions: sources.extensions(),
            partials,
        })
    }

    /// The changed path relative to the source directory, if it is relevant.
    pub fn relevant(&self, path: &Path) -> Option<PathBuf> {
        let relative = self.relative_path(path)?;
        let relevant = if self.partials {
            relative
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| self.extensions.contains(&ext))
        } else {
            self.matcher.matches(&relative)
        };
        relevant.then_some(relative)
    }

    fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        if let Ok(relative) = path.strip_prefix(&self.src_dir) {
            return Some(relative.to_path_buf());
        }
        // Deleted files cannot be canonicalized, their parent usually can
        let canonical = path.canonicalize().ok().or_else(|| {
            let parent = path.parent()?.canonicalize().ok()?;
            Some(parent.join(path.file_name()?))
        })?;
        canonical.strip_prefix(&self.src_dir).ok().map(Path::to_path_buf)
    }
}

/// Whether the source set can only be reached through subdirectories.
fn needs_recursive_watch(sources: &SourcesConfig) -> bool {
    sources.include.iter().any(|p| p.contains('/') || p.contains("**"))
}

/// Watches the source directory and yields change sets.
pub struct SourceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: Receiver<WatchSignal>,
    tx: Sender<WatchSignal>,
    filter: ChangeFilter,
}

impl SourceWatcher {
    /// Start watching `src_dir`.
    ///
    /// The directory itself is watched non-recursively unless partial
    /// watching is on or an include pattern reaches into subdirectories.
    pub fn new(
        src_dir: &Path,
        sources: &SourcesConfig,
        config: &WatchConfig,
    ) -> Result<Self, WatchError> {
        if !src_dir.is_dir() {
            return Err(WatchError::SourceNotFound(src_dir.to_path_buf()));
        }
        let src_dir = src_dir
            .canonicalize()
            .map_err(|_| WatchError::SourceNotFound(src_dir.to_path_buf()))?;
        let filter = ChangeFilter::new(src_dir.clone(), sources, config.partials)?;

        let (tx, rx) = channel();
        let fs_tx = tx.clone();
        let debounce = Duration::from_millis(u64::from(config.debounce_ms));
        let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
            let _ = fs_tx.send(WatchSignal::Fs(result));
        })
        .map_err(WatchError::WatcherInit)?;

        let mode = if config.partials || needs_recursive_watch(sources) {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer.watcher().watch(&src_dir, mode).map_err(WatchError::WatchPath)?;
        debug!(dir = %src_dir.display(), ?mode, "watching");

        Ok(Self { _debouncer: debouncer, rx, tx, filter })
    }

    /// The (canonical) directory being watched.
    pub fn src_dir(&self) -> &Path {
        &self.filter.src_dir
    }

    /// A handle that stops this watcher.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { tx: self.tx.clone() }
    }

    /// Block until relevant paths change.
    ///
    /// Everything already queued behind the first relevant event is merged
    /// into the same change set. Returns `None` once stopped.
    pub fn next_change(&self) -> Result<Option<ChangeSet>, WatchError> {
        loop {
            let signal = self.rx.recv().map_err(|e| WatchError::Channel(e.to_string()))?;
            let mut changed = BTreeSet::new();
            if !self.absorb(signal, &mut changed) {
                return Ok(None);
            }
            while let Ok(signal) = self.rx.try_recv() {
                if !self.absorb(signal, &mut changed) {
                    return Ok(None);
                }
            }
            if !changed.is_empty() {
                return Ok(Some(ChangeSet { paths: changed.into_iter().collect() }));
            }
        }
    }

    /// Collect relevant paths from `signal`; false on stop.
    fn absorb(&self, signal: WatchSignal, changed: &mut BTreeSet<PathBuf>) -> bool {
        match signal {
            WatchSignal::Stop => false,
            WatchSignal::Fs(Ok(events)) => {
                changed.extend(
                    events
                        .iter()
                        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                        .filter_map(|e| self.filter.relevant(&e.path)),
                );
                true
            }
            WatchSignal::Fs(Err(e)) => {
                // Non-fatal, keep watching
                warn!("watch error: {:?}", e);
                true
            }
        }
    }
}

/// Tracks sources that failed across runs for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Sources that failed in an earlier run and have not compiled since
    failing: HashSet<PathBuf>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a new run, returns the sources that now compile.
    ///
    /// A source skipped by a fail-fast stop keeps its previous state.
    pub fn update(&mut self, result: &BuildResult) -> Vec<PathBuf> {
        let mut fixed = Vec::new();
        for target in &result.targets {
            match target.status {
                BuildStatus::Success => {
                    if self.failing.remove(&target.source) {
                        fixed.push(target.source.clone());
                    }
                }
                BuildStatus::Failed(_) => {
                    self.failing.insert(target.source.clone());
                }
                BuildStatus::Skipped => {}
            }
        }
        fixed.sort();
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of sources with errors
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    use std::io::Write;
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
    let _ = std::io::stdout().flush();
}

/// Run the compile operation once and report the outcome.
fn run_once(pipeline: &BuildPipeline, config: &WatchConfig, tracker: &mut ErrorTracker) {
    if config.clear_screen {
        clear_screen();
    }

    match pipeline.build() {
        Ok(result) => {
            for fixed in tracker.update(&result) {
                info!("fixed: {}", fixed.display());
            }
            if result.is_success() {
                info!("{}", result.summary());
            } else {
                error!("{}", result.summary());
            }
            if tracker.has_errors() {
                warn!("{} source(s) still failing", tracker.error_count());
            }
        }
        // A failed run never ends watch mode
        Err(e) => error!("run aborted: {}", e),
    }
}

/// Recompile on every change until `watcher` is stopped.
///
/// Returns the number of runs performed.
///
/// # Example
/// ```ignore
/// let watcher = SourceWatcher::new(&context.src_dir(), &config.sources, &config.watch)?;
/// let stop = watcher.stop_handle();
/// ctrlc::set_handler(move || stop.stop())?;
/// let runs = watch(&BuildPipeline::new(context), &watcher)?;
/// ```
pub fn watch(pipeline: &BuildPipeline, watcher: &SourceWatcher) -> Result<usize, WatchError> {
    let config = &pipeline.context().config().watch;
    let mut tracker = ErrorTracker::new();
    let mut runs = 0;

    if config.initial_build {
        run_once(pipeline, config, &mut tracker);
        runs += 1;
    }

    info!("watching {} for changes", watcher.src_dir().display());
    while let Some(changes) = watcher.next_change()? {
        for path in &changes.paths {
            info!("changed: {}", path.display());
        }
        run_once(pipeline, config, &mut tracker);
        runs += 1;
        debug!(runs, "waiting for changes");
    }

    info!("watch stopped after {} run{}", runs, if runs == 1 { "" } else { "s" });
    Ok(runs)
}
