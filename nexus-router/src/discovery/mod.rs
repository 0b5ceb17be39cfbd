//! Procedure discovery
//!
//! Walks a source tree, parses every candidate Rust file and extracts the
//! modules tagged `#[procedures]`:
//!
//! ```rust,ignore
//! #[procedures]
//! pub mod users {
//!     use super::*;
//!
//!     #[query(get = "/users/:id")]
//!     pub async fn get_user(ctx: Context<AppContext>, input: GetUser) -> RpcResult<User> { .. }
//! }
//! ```
//!
//! Per-file problems never abort a scan. They are collected as
//! [`DiscoveryWarning`]s next to the accepted collections, except that the
//! [`OnInvalidExport::Error`] policy turns the first invalid export into a
//! fatal [`DiscoveryError`] for [`scan`] (but not for [`scan_verbose`]).
//!
//! Files are loaded on the blocking pool with bounded fan-out, and results are
//! consumed in sorted path order, so two scans of the same tree always agree.

mod loader;
mod validate;

pub use loader::{ExportShape, RawExport, module_path_of};
pub use validate::validate;

use crate::error::{DiscoveryError, DiscoveryErrorKind};
use crate::procedure::ProcedureCollection;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Symbolic reference to a discovered handler function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerRef {
    /// Module path of the defining file, relative to the scan root.
    pub file_module: Vec<String>,
    /// Inline modules inside the file, ending with the tagged module.
    pub module_path: Vec<String>,
    pub function: String,
    /// Whether the procedure asked for input validation.
    pub validated: bool,
}

impl HandlerRef {
    /// Full Rust path of the function below `root` (e.g. `crate::procedures`).
    pub fn rust_path(&self, root: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !root.is_empty() {
            parts.push(root);
        }
        parts.extend(self.file_module.iter().map(String::as_str));
        parts.extend(self.module_path.iter().map(String::as_str));
        parts.push(&self.function);
        parts.join("::")
    }
}

/// What to do with exports that carry a marker but are not valid collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnInvalidExport {
    /// Record a warning and keep scanning.
    #[default]
    Warn,
    /// Fail the scan (or record an error-severity warning in verbose mode).
    Error,
    /// Drop silently.
    Ignore,
}

impl FromStr for OnInvalidExport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "ignore" => Ok(Self::Ignore),
            other => Err(format!(
                "unknown invalid-export policy '{}' (expected warn, error or ignore)",
                other
            )),
        }
    }
}

impl fmt::Display for OnInvalidExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A recoverable problem met during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWarning {
    pub kind: DiscoveryErrorKind,
    pub severity: Severity,
    pub path: PathBuf,
    pub message: String,
}

impl DiscoveryWarning {
    fn warning(
        kind: DiscoveryErrorKind,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.path.display(), self.message)
    }
}

#[derive(Clone)]
enum FilterKind {
    RustSources,
    Glob(glob::Pattern),
    Custom(Arc<dyn Fn(&Path) -> bool + Send + Sync>),
}

/// Decides which files are candidates. Paths are relative to the scan root.
#[derive(Clone)]
pub struct FileFilter {
    kind: FilterKind,
}

impl FileFilter {
    /// Rust sources under a glob, e.g. `procedures/**/*.rs`.
    pub fn glob(pattern: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            kind: FilterKind::Glob(glob::Pattern::new(pattern)?),
        })
    }

    /// Arbitrary predicate. Replaces the default rules entirely.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: FilterKind::Custom(Arc::new(predicate)),
        }
    }

    pub fn accepts(&self, relative: &Path) -> bool {
        match &self.kind {
            FilterKind::RustSources => is_rust_source(relative),
            FilterKind::Glob(pattern) => {
                is_rust_source(relative) && pattern.matches_path(relative)
            }
            FilterKind::Custom(predicate) => predicate(relative),
        }
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            kind: FilterKind::RustSources,
        }
    }
}

impl fmt::Debug for FileFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FilterKind::RustSources => write!(f, "FileFilter(rust sources)"),
            FilterKind::Glob(pattern) => write!(f, "FileFilter(glob {})", pattern.as_str()),
            FilterKind::Custom(_) => write!(f, "FileFilter(custom)"),
        }
    }
}

/// `.rs` files that are not tests, build scripts or hidden.
fn is_rust_source(relative: &Path) -> bool {
    let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name.strip_suffix(".rs") else {
        return false;
    };
    !(name.starts_with('.')
        || stem.is_empty()
        || stem == "tests"
        || stem == "build"
        || stem.ends_with("_test")
        || stem.ends_with("_tests"))
}

/// Cooperative cancellation for a running scan.
#[derive(Debug, Default)]
pub struct CancellationSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancelled
    pub async fn cancelled(&self) {
        // Register before checking the flag so a concurrent cancel() is not missed.
        let mut notified = std::pin::pin!(self.notify.notified());
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Scan options.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    pub on_invalid_export: OnInvalidExport,
    pub file_filter: FileFilter,
    /// Maximum number of files loaded concurrently.
    pub concurrency: usize,
    pub cancellation: Option<Arc<CancellationSignal>>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            on_invalid_export: OnInvalidExport::Warn,
            file_filter: FileFilter::default(),
            concurrency: 8,
            cancellation: None,
        }
    }
}

impl DiscoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn on_invalid_export(mut self, policy: OnInvalidExport) -> Self {
        self.on_invalid_export = policy;
        self
    }

    #[must_use]
    pub fn file_filter(mut self, filter: FileFilter) -> Self {
        self.file_filter = filter;
        self
    }

    /// Clamped to at least 1.
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn cancellation(mut self, signal: Arc<CancellationSignal>) -> Self {
        self.cancellation = Some(signal);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|signal| signal.is_cancelled())
    }
}

/// Everything one scan produced.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    /// Accepted collections, in path order then source order.
    pub collections: Vec<ProcedureCollection<HandlerRef>>,
    /// Every candidate file, in path order.
    pub scanned_files: Vec<PathBuf>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl DiscoveryResult {
    pub fn procedure_count(&self) -> usize {
        self.collections.iter().map(ProcedureCollection::len).sum()
    }

    /// Whether any warning has error severity.
    pub fn has_errors(&self) -> bool {
        self.warnings.iter().any(|w| w.severity == Severity::Error)
    }
}

/// Scan `root` for procedure collections.
///
/// Fails for a missing or unreadable root, on cancellation, and on the first
/// invalid export under [`OnInvalidExport::Error`].
pub async fn scan(
    root: impl AsRef<Path>,
    options: &DiscoveryOptions,
) -> Result<DiscoveryResult, DiscoveryError> {
    run_scan(root.as_ref(), options, true).await
}

/// Like [`scan`], but the `error` policy records error-severity warnings
/// instead of failing.
pub async fn scan_verbose(
    root: impl AsRef<Path>,
    options: &DiscoveryOptions,
) -> Result<DiscoveryResult, DiscoveryError> {
    run_scan(root.as_ref(), options, false).await
}

/// Load a single, explicitly targeted file.
///
/// A file rejected by the filter yields an `invalidFileType` warning.
pub async fn scan_file(
    path: impl AsRef<Path>,
    options: &DiscoveryOptions,
) -> Result<DiscoveryResult, DiscoveryError> {
    let path = path.as_ref();
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| DiscoveryError::from_root_io(path, e))?;
    if !metadata.is_file() {
        return Err(DiscoveryError::not_found(path));
    }

    let root = path.parent().unwrap_or(Path::new("")).to_path_buf();
    let relative = PathBuf::from(path.file_name().unwrap_or(path.as_os_str()));

    let mut collector = Collector::new(options, true);
    if !options.file_filter.accepts(&relative) {
        collector.warn(DiscoveryWarning::warning(
            DiscoveryErrorKind::InvalidFileType,
            path,
            "file does not pass the file filter",
        ));
        return Ok(collector.finish(path));
    }

    let outcome = load_blocking(root.clone(), relative).await;
    collector.absorb(path.to_path_buf(), outcome)?;
    Ok(collector.finish(path))
}

async fn run_scan(
    root: &Path,
    options: &DiscoveryOptions,
    strict: bool,
) -> Result<DiscoveryResult, DiscoveryError> {
    let metadata = tokio::fs::metadata(root)
        .await
        .map_err(|e| DiscoveryError::from_root_io(root, e))?;
    if !metadata.is_dir() {
        return Err(DiscoveryError::not_found(root));
    }

    let walk_root = root.to_path_buf();
    let recursive = options.recursive;
    let filter = options.file_filter.clone();
    let (candidates, walk_warnings) =
        tokio::task::spawn_blocking(move || walk(&walk_root, recursive, &filter))
            .await
            .map_err(|e| DiscoveryError::Io {
                path: root.to_path_buf(),
                source: std::io::Error::other(e),
            })??;

    debug!(root = %root.display(), files = candidates.len(), "collected candidate files");

    if options.is_cancelled() {
        return Err(DiscoveryError::Cancelled);
    }

    let mut collector = Collector::new(options, strict);
    for warning in walk_warnings {
        collector.warn(warning);
    }

    let loads = stream::iter(candidates)
        .map(|relative| {
            let root = root.to_path_buf();
            async move {
                let path = root.join(&relative);
                (path, load_blocking(root, relative).await)
            }
        })
        .buffered(options.concurrency.max(1));

    collector.absorb_all(loads, root).await?;

    let result = collector.finish(root);
    info!(
        root = %root.display(),
        files = result.scanned_files.len(),
        collections = result.collections.len(),
        procedures = result.procedure_count(),
        warnings = result.warnings.len(),
        "scan finished"
    );
    Ok(result)
}

type LoadOutcome = Result<Vec<loader::ExportOutcome>, String>;

async fn load_blocking(root: PathBuf, relative: PathBuf) -> LoadOutcome {
    tokio::task::spawn_blocking(move || loader::load_file(&root, &relative))
        .await
        .unwrap_or_else(|e| Err(format!("loader task failed: {}", e)))
}

/// Enumerate candidate files below `root`, sorted by path.
fn walk(
    root: &Path,
    recursive: bool,
    filter: &FileFilter,
) -> Result<(Vec<PathBuf>, Vec<DiscoveryWarning>), DiscoveryError> {
    let mut candidates = Vec::new();
    let mut warnings = Vec::new();

    let walker = WalkDir::new(root)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop at scan root"));
                return Err(DiscoveryError::from_root_io(root, source));
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                warn!(path = %path.display(), error = %e, "unreadable directory entry");
                warnings.push(DiscoveryWarning::warning(
                    DiscoveryErrorKind::FileLoadError,
                    path,
                    e.to_string(),
                ));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        if filter.accepts(&relative) {
            candidates.push(relative);
        }
    }

    candidates.sort();
    Ok((candidates, warnings))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || name == "target"
}

/// Single-threaded sink the ordered load results are folded into.
struct Collector<'a> {
    options: &'a DiscoveryOptions,
    strict: bool,
    collections: Vec<ProcedureCollection<HandlerRef>>,
    scanned_files: Vec<PathBuf>,
    warnings: Vec<DiscoveryWarning>,
}

impl<'a> Collector<'a> {
    fn new(options: &'a DiscoveryOptions, strict: bool) -> Self {
        Self {
            options,
            strict,
            collections: Vec::new(),
            scanned_files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: DiscoveryWarning) {
        warn!(kind = %warning.kind, path = %warning.path.display(), "{}", warning.message);
        self.warnings.push(warning);
    }

    fn absorb(&mut self, path: PathBuf, outcome: LoadOutcome) -> Result<(), DiscoveryError> {
        self.scanned_files.push(path.clone());

        let exports = match outcome {
            Ok(exports) => exports,
            Err(cause) => {
                self.warn(DiscoveryWarning::warning(
                    DiscoveryErrorKind::FileLoadError,
                    path,
                    cause,
                ));
                return Ok(());
            }
        };

        debug!(path = %path.display(), exports = exports.len(), "loaded file");
        for export in exports {
            match export {
                Ok(collection) => {
                    debug!(
                        namespace = %collection.namespace,
                        procedures = collection.len(),
                        "accepted collection"
                    );
                    self.collections.push(collection);
                }
                Err(invalid) => match self.options.on_invalid_export {
                    OnInvalidExport::Ignore => {
                        debug!(path = %path.display(), error = %invalid, "ignoring invalid export");
                    }
                    OnInvalidExport::Warn => {
                        self.warn(DiscoveryWarning::warning(
                            DiscoveryErrorKind::InvalidExport,
                            path.clone(),
                            invalid.to_string(),
                        ));
                    }
                    OnInvalidExport::Error if self.strict => {
                        return Err(DiscoveryError::InvalidExport {
                            path,
                            error: invalid,
                        });
                    }
                    OnInvalidExport::Error => {
                        self.warn(DiscoveryWarning {
                            kind: DiscoveryErrorKind::InvalidExport,
                            severity: Severity::Error,
                            path: path.clone(),
                            message: invalid.to_string(),
                        });
                    }
                },
            }
        }
        Ok(())
    }

    /// Absorb loads in path order. Cancellation is checked after every file.
    async fn absorb_all<S>(&mut self, loads: S, root: &Path) -> Result<(), DiscoveryError>
    where
        S: Stream<Item = (PathBuf, LoadOutcome)>,
    {
        let mut loads = std::pin::pin!(loads);
        while let Some((path, outcome)) = loads.next().await {
            self.absorb(path, outcome)?;
            if self.options.is_cancelled() {
                info!(root = %root.display(), "scan cancelled");
                return Err(DiscoveryError::Cancelled);
            }
        }
        Ok(())
    }

    fn finish(mut self, root: &Path) -> DiscoveryResult {
        if self.collections.is_empty() {
            self.warn(DiscoveryWarning::warning(
                DiscoveryErrorKind::NoProceduresFound,
                root,
                "no procedure collections found",
            ));
        }
        DiscoveryResult {
            collections: self.collections,
            scanned_files: self.scanned_files,
            warnings: self.warnings,
        }
    }
}
