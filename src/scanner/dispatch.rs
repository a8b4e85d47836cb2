//! Parallel job dispatcher: one worker per target directory.
//!
//! Fan-out is a named OS thread per target; fan-in is a crossbeam channel the
//! workers push their outcomes into. The dispatcher joins every worker before
//! reporting, so no walker (and no verifier child) outlives a run. Outcomes
//! are reported in spawn order regardless of completion order.
//!
//! A worker failure never aborts its siblings. A thread-spawn failure stops
//! the spawn loop, but already-spawned workers still run to completion and
//! their outcomes are reported alongside the failure.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel as channel;
use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::errors::{Result, SnwError};
use crate::logger::jsonl::{AuditEntry, AuditLog, EventType, Severity};
use crate::scanner::heuristic::ContentHeuristic;
use crate::scanner::quarantine::QuarantineManager;
use crate::scanner::walker::{DirectoryWalker, WalkerConfig};
use crate::snapshot::writer::{snapshot_file_name, SnapshotWriter};

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Completed,
    /// The walk finished but its segment could not be persisted.
    SnapshotFailed(String),
}

/// Summary of one worker's run, reported after join.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub target: PathBuf,
    pub status: WorkerStatus,
    /// Snapshot file this worker's segment went to.
    pub snapshot_path: PathBuf,
    pub entries: usize,
    pub quarantined: usize,
    pub escalated: usize,
    pub recovered_failures: usize,
    pub duration: Duration,
}

/// Everything one dispatcher run produced.
#[derive(Debug)]
pub struct DispatchReport {
    /// Per-worker outcomes, in spawn order.
    pub outcomes: Vec<WorkerOutcome>,
    /// Spawn failure that stopped fan-out early, if any. Workers spawned
    /// before it still ran and appear in `outcomes`.
    pub spawn_failure: Option<SnwError>,
}

/// Where a worker's segment lands.
#[derive(Clone)]
enum SnapshotSink {
    /// All workers append to one file, serialized by the mutex.
    Shared(Arc<Mutex<SnapshotWriter>>),
    /// Each target gets its own `Snapshot_<target>.txt` in the output dir.
    PerTarget(PathBuf),
}

/// Fans a scan out across targets and gathers the per-worker outcomes.
pub struct JobDispatcher {
    config: Config,
    output_dir: PathBuf,
    isolation_dir: PathBuf,
    audit: AuditLog,
}

impl JobDispatcher {
    #[must_use]
    pub fn new(config: Config, output_dir: PathBuf, isolation_dir: PathBuf, audit: AuditLog) -> Self {
        Self {
            config,
            output_dir,
            isolation_dir,
            audit,
        }
    }

    /// Run one worker per target and report their outcomes in spawn order.
    ///
    /// `Err` is reserved for failures before any worker starts (the shared
    /// snapshot file cannot be opened). A spawn failure mid fan-out is
    /// carried in the report so already-running workers still get joined
    /// and reported.
    pub fn run(&self, targets: &[PathBuf]) -> Result<DispatchReport> {
        let sink = if self.config.snapshot.shared {
            let path = self.output_dir.join(&self.config.snapshot.shared_file_name);
            SnapshotSink::Shared(Arc::new(Mutex::new(SnapshotWriter::open(&path)?)))
        } else {
            SnapshotSink::PerTarget(self.output_dir.clone())
        };

        let heuristic = Arc::new(ContentHeuristic::from_config(&self.config.heuristic));
        let quarantine = Arc::new(QuarantineManager::new(
            self.isolation_dir.clone(),
            self.config.quarantine.verifier.clone(),
        ));

        // The scan must never descend into its own output or isolation dirs.
        let mut excluded: HashSet<PathBuf> =
            self.config.scanner.excluded_paths.iter().cloned().collect();
        excluded.insert(self.isolation_dir.clone());
        excluded.insert(self.output_dir.clone());

        let mut started = AuditEntry::new(EventType::ScanStarted, Severity::Info);
        started.details = Some(format!("{} target(s)", targets.len()));
        self.audit.record(&started);

        let (tx, rx) = channel::unbounded::<(usize, WorkerOutcome)>();
        let mut handles = Vec::with_capacity(targets.len());
        let mut spawn_failure: Option<SnwError> = None;

        for (index, target) in targets.iter().enumerate() {
            let worker = Worker {
                index,
                target: target.clone(),
                walker_config: WalkerConfig {
                    root: target.clone(),
                    max_depth: self.config.scanner.max_depth,
                    follow_symlinks: self.config.scanner.follow_symlinks,
                    excluded_paths: excluded.clone(),
                },
                heuristic: Arc::clone(&heuristic),
                quarantine: Arc::clone(&quarantine),
                sink: sink.clone(),
                audit: self.audit.clone(),
                tx: tx.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("snw-worker-{index}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    spawn_failure = Some(SnwError::Spawn {
                        target: target.clone(),
                        details: source.to_string(),
                    });
                    break;
                }
            }
        }
        drop(tx);

        for handle in handles {
            // A panicked worker simply never sent an outcome.
            let _ = handle.join();
        }
        if let Some(err) = &spawn_failure {
            eprintln!("snw: {err}");
            let mut entry = AuditEntry::new(EventType::Error, Severity::Critical);
            entry.error_code = Some(err.code().to_string());
            entry.error_message = Some(err.to_string());
            self.audit.record(&entry);
        }

        let mut outcomes: Vec<(usize, WorkerOutcome)> = rx.iter().collect();
        outcomes.sort_by_key(|(index, _)| *index);

        let mut completed = AuditEntry::new(EventType::ScanCompleted, Severity::Info);
        completed.details = Some(format!(
            "{} worker(s), {} quarantined",
            outcomes.len(),
            outcomes.iter().map(|(_, o)| o.quarantined).sum::<usize>()
        ));
        self.audit.record(&completed);
        self.audit.flush();

        Ok(DispatchReport {
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
            spawn_failure,
        })
    }
}

struct Worker {
    index: usize,
    target: PathBuf,
    walker_config: WalkerConfig,
    heuristic: Arc<ContentHeuristic>,
    quarantine: Arc<QuarantineManager>,
    sink: SnapshotSink,
    audit: AuditLog,
    tx: channel::Sender<(usize, WorkerOutcome)>,
}

impl Worker {
    fn run(self) {
        let started_at = Instant::now();
        // The walker consumes its config; keep `self` intact for persistence.
        let report = DirectoryWalker::new(
            self.walker_config.clone(),
            &self.heuristic,
            &self.quarantine,
            self.audit.clone(),
        )
        .walk();

        let (snapshot_path, status) = match self.persist(&report.segment) {
            Ok(path) => (path, WorkerStatus::Completed),
            Err(err) => {
                eprintln!("snw: {err}");
                let mut entry = AuditEntry::new(EventType::SnapshotWriteFailed, Severity::Critical);
                entry.target = Some(self.target.display().to_string());
                entry.error_code = Some(err.code().to_string());
                entry.error_message = Some(err.to_string());
                self.audit.record(&entry);
                (self.snapshot_path(), WorkerStatus::SnapshotFailed(err.code().to_string()))
            }
        };

        let outcome = WorkerOutcome {
            target: self.target.clone(),
            status,
            snapshot_path,
            entries: report.segment.len(),
            quarantined: report.quarantined.len(),
            escalated: report.escalated,
            recovered_failures: report.recovered_failures,
            duration: started_at.elapsed(),
        };

        let mut finished = AuditEntry::new(EventType::WorkerFinished, Severity::Info);
        finished.target = Some(self.target.display().to_string());
        finished.details = Some(format!(
            "{} entries, {} quarantined, {} recovered failures",
            outcome.entries, outcome.quarantined, outcome.recovered_failures
        ));
        self.audit.record(&finished);

        // The dispatcher holds the receiver until every worker is joined.
        let _ = self.tx.send((self.index, outcome));
    }

    fn snapshot_path(&self) -> PathBuf {
        match &self.sink {
            SnapshotSink::Shared(writer) => writer.lock().path().to_path_buf(),
            SnapshotSink::PerTarget(dir) => dir.join(snapshot_file_name(&self.target)),
        }
    }

    fn persist(&self, segment: &[crate::scanner::probe::Entry]) -> Result<PathBuf> {
        match &self.sink {
            SnapshotSink::Shared(writer) => {
                let mut writer = writer.lock();
                writer.append_segment(segment)?;
                Ok(writer.path().to_path_buf())
            }
            SnapshotSink::PerTarget(dir) => {
                let path = dir.join(snapshot_file_name(&self.target));
                let mut writer = SnapshotWriter::open(&path)?;
                writer.append_segment(segment)?;
                Ok(path)
            }
        }
    }
}
