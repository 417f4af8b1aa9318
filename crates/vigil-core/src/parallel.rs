//! Parallel source analysis over a fixed worker pool
//!
//! Files are split into contiguous chunks, one per worker. Every worker owns
//! its own copy of the rule set and its own result buffer, and talks to the
//! caller only through a channel. A file that fails to analyze is reported
//! and skipped; a worker that panics fails the whole scan.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam::channel::{self, Sender};
use tracing::{debug, error, warn};

use crate::analyzer::{AnalysisError, FileAnalyzer};
use crate::finding::ScanFinding;
use crate::patterns::PatternSet;
use crate::scanner::{FileError, ScanError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    pub path: PathBuf,
}

#[derive(Debug, Default)]
pub struct ParallelScanReport {
    pub findings: Vec<ScanFinding>,
    pub file_errors: Vec<FileError>,
}

enum WorkerMessage {
    Progress { path: PathBuf },
    FileFailed(FileError),
    Finished { worker: usize, findings: Vec<ScanFinding> },
}

#[derive(Debug, Clone)]
pub struct ParallelScanner {
    patterns: PatternSet,
    custom_rules: Option<PathBuf>,
    workers: usize,
}

impl ParallelScanner {
    pub fn new(patterns: PatternSet, workers: usize) -> Self {
        Self {
            patterns,
            custom_rules: None,
            workers: workers.max(1),
        }
    }

    /// Custom rules each worker appends to its copy of the rule set.
    pub fn with_custom_rules(mut self, path: PathBuf) -> Self {
        self.custom_rules = Some(path);
        self
    }

    pub fn scan<F>(&self, files: &[PathBuf], on_progress: F) -> Result<ParallelScanReport, ScanError>
    where
        F: FnMut(&ScanProgress),
    {
        self.scan_with(files, on_progress, |analyzer, path| analyzer.analyze_path(path))
    }

    /// Runs `analyze` for every file on the pool. Blocks until every worker has exited.
    fn scan_with<F, A>(
        &self,
        files: &[PathBuf],
        mut on_progress: F,
        analyze: A,
    ) -> Result<ParallelScanReport, ScanError>
    where
        F: FnMut(&ScanProgress),
        A: Fn(&FileAnalyzer, &Path) -> Result<Vec<ScanFinding>, AnalysisError> + Sync,
    {
        if files.is_empty() {
            return Ok(ParallelScanReport::default());
        }

        let size = chunk_size(files.len(), self.workers);
        let total = files.len();
        let (tx, rx) = channel::unbounded();

        thread::scope(|scope| {
            let mut handles = Vec::new();
            let mut spawn_error = None;

            for (index, chunk) in files.chunks(size).enumerate() {
                let tx = tx.clone();
                let analyze = &analyze;
                let spawned = thread::Builder::new()
                    .name(format!("vigil-worker-{index}"))
                    .spawn_scoped(scope, move || self.run_worker(index, chunk, &tx, analyze));
                match spawned {
                    Ok(handle) => handles.push((index, handle)),
                    Err(source) => {
                        spawn_error = Some(ScanError::WorkerSpawn {
                            worker: index,
                            source,
                        });
                        break;
                    }
                }
            }
            drop(tx);
            debug!(
                workers = handles.len(),
                configured = self.workers,
                files = total,
                chunk = size,
                "scan workers started"
            );

            let mut report = ParallelScanReport::default();
            let mut completed = 0;
            for message in rx.iter() {
                match message {
                    WorkerMessage::Progress { path } => {
                        completed += 1;
                        on_progress(&ScanProgress {
                            completed,
                            total,
                            path,
                        });
                    }
                    WorkerMessage::FileFailed(file_error) => report.file_errors.push(file_error),
                    WorkerMessage::Finished { worker, findings } => {
                        debug!(worker, findings = findings.len(), "scan worker finished");
                        report.findings.extend(findings);
                    }
                }
            }

            let mut crashed = None;
            for (index, handle) in handles {
                if let Err(payload) = handle.join() {
                    let message = panic_message(payload.as_ref());
                    error!(worker = index, panic = %message, "scan worker crashed");
                    crashed.get_or_insert(ScanError::WorkerCrashed {
                        worker: index,
                        message,
                    });
                }
            }

            match spawn_error.or(crashed) {
                Some(e) => Err(e),
                None => Ok(report),
            }
        })
    }

    fn run_worker<A>(&self, index: usize, chunk: &[PathBuf], tx: &Sender<WorkerMessage>, analyze: &A)
    where
        A: Fn(&FileAnalyzer, &Path) -> Result<Vec<ScanFinding>, AnalysisError>,
    {
        let mut patterns = self.patterns.clone();
        if let Some(path) = &self.custom_rules {
            if let Err(e) = patterns.extend_from_file(path) {
                warn!(worker = index, error = %e, "custom rules unavailable");
            }
        }
        let analyzer = FileAnalyzer::new(patterns);

        let mut findings = Vec::new();
        for path in chunk {
            match analyze(&analyzer, path) {
                Ok(file_findings) => findings.extend(file_findings),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to analyze file");
                    // The receiver outlives every worker.
                    let _ = tx.send(WorkerMessage::FileFailed(FileError::new(path, &e)));
                }
            }
            let _ = tx.send(WorkerMessage::Progress { path: path.clone() });
        }

        let _ = tx.send(WorkerMessage::Finished {
            worker: index,
            findings,
        });
    }
}

/// Files per worker so that `workers` contiguous chunks cover `total` files.
fn chunk_size(total: usize, workers: usize) -> usize {
    total.div_ceil(workers.max(1)).max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
