use super::dicomdir::{DicomdirParser, IndexEntry};
use super::grouping::group_records;
use super::parser::{ParseOutcome, RecordParser};
use super::walker::{absolute_root, DirectoryWalker, ScanSource};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::store::{Collection, DocumentStore, EntityStore};
use crate::types::{IngestEvent, IngestPhase, ParsedRecord, StudyDocument};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Receives the events of an ingestion run
pub trait EventSink {
    /// Delivers one event; `false` means the consumer has gone away
    fn emit(&mut self, event: IngestEvent) -> bool;
}

impl EventSink for Vec<IngestEvent> {
    fn emit(&mut self, event: IngestEvent) -> bool {
        self.push(event);
        true
    }
}

impl EventSink for Sender<IngestEvent> {
    fn emit(&mut self, event: IngestEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Cooperative cancellation flag shared between a run and its caller
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub studies: Vec<StudyDocument>,
    pub total_files: usize,
    pub total_processed: usize,
    pub total_succeeded: usize,
    /// Stopped before every file was attempted
    pub cancelled: bool,
}

/// One file to attempt, with its index entry when read through a DICOMDIR
struct WorkItem {
    path: PathBuf,
    entry: Option<IndexEntry>,
}

struct Progress {
    total: usize,
    processed: usize,
    records: Vec<ParsedRecord>,
    cancelled: bool,
}

/// Drives whole ingestion runs
///
/// Runs share the document store and the configuration; everything else
/// (parser state, worker pool, progress) belongs to a single run.
///
/// # Example
///
/// ```no_run
/// use neuroimg_core::ingest::Ingestor;
/// use neuroimg_core::store::MemoryStore;
/// use neuroimg_core::{IngestConfig, IngestEvent};
/// use std::sync::Arc;
///
/// let ingestor = Ingestor::new(Arc::new(IngestConfig::default()), Arc::new(MemoryStore::new()));
/// for event in ingestor.ingest("/data/dicom") {
///     if let IngestEvent::Processing { percentage, .. } = event {
///         println!("{:.0}%", percentage);
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Ingestor {
    config: Arc<IngestConfig>,
    store: EntityStore,
}

impl Ingestor {
    pub fn new(config: Arc<IngestConfig>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            store: EntityStore::new(store),
        }
    }

    /// Starts a run on a background thread
    ///
    /// Events arrive on a bounded channel; dropping the handle cancels the run.
    pub fn ingest(&self, root: impl Into<PathBuf>) -> IngestHandle {
        let (tx, rx) = bounded(self.config.channel_capacity);
        let cancel = CancelToken::new();

        let ingestor = self.clone();
        let token = cancel.clone();
        let root = root.into();
        let handle = thread::spawn(move || {
            let mut sink = tx;
            ingestor.run(&root, &token, &mut sink)
        });

        IngestHandle {
            events: rx,
            cancel,
            handle,
        }
    }

    /// Runs an ingestion on the calling thread
    ///
    /// Always ends the event stream with exactly one `complete` or `failed`
    /// event. Cancellation is not an error: the records gathered so far are
    /// saved and `complete` reports fewer processed files than the total.
    pub fn run(
        &self,
        root: &Path,
        cancel: &CancelToken,
        sink: &mut dyn EventSink,
    ) -> Result<IngestSummary> {
        match self.try_run(root, cancel, sink) {
            Ok(summary) => {
                info!(
                    "Ingestion {}: {} studies, {}/{} files succeeded",
                    if summary.cancelled { "cancelled" } else { "complete" },
                    summary.studies.len(),
                    summary.total_succeeded,
                    summary.total_processed
                );
                sink.emit(IngestEvent::Complete {
                    studies: summary.studies.clone(),
                    total_processed: summary.total_processed,
                    total_succeeded: summary.total_succeeded,
                });
                Ok(summary)
            }
            Err(e) => {
                error!("Ingestion of {} failed: {}", root.display(), e);
                sink.emit(IngestEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn try_run(
        &self,
        root: &Path,
        cancel: &CancelToken,
        sink: &mut dyn EventSink,
    ) -> Result<IngestSummary> {
        let root = absolute_root(root)?;
        info!("{} {}", IngestPhase::Scanning, root.display());

        let work = self.scan(&root)?;
        let total = work.len();
        if !sink.emit(IngestEvent::Scanning { total_files: total }) {
            cancel.cancel();
        }

        info!("{} {} files", IngestPhase::Processing, total);
        let progress = self.process(&work, cancel, sink)?;
        let succeeded = progress.records.len();

        info!("{} {} records", IngestPhase::Saving, succeeded);
        let studies = self.save(&progress.records)?;

        Ok(IngestSummary {
            studies,
            total_files: progress.total,
            total_processed: progress.processed,
            total_succeeded: succeeded,
            cancelled: progress.cancelled,
        })
    }

    fn scan(&self, root: &Path) -> Result<Vec<WorkItem>> {
        let walker = DirectoryWalker::new(Arc::clone(&self.config));
        let work = match walker.plan(root)? {
            ScanSource::Index(index_path) => DicomdirParser::new(Arc::clone(&self.config))
                .read(&index_path)?
                .entries
                .into_iter()
                .map(|entry| WorkItem {
                    path: entry.path.clone(),
                    entry: Some(entry),
                })
                .collect(),
            ScanSource::Files(files) => files
                .into_iter()
                .map(|path| WorkItem { path, entry: None })
                .collect(),
        };
        Ok(work)
    }

    fn worker_pool(&self) -> Result<Option<ThreadPool>> {
        if self.config.workers <= 1 {
            return Ok(None);
        }
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("neuroimg-decode-{}", i))
            .build()
            .map(Some)
            .map_err(|e| IngestError::ConfigError(format!("cannot start decode workers: {}", e)))
    }

    /// Attempts every file in order, emitting progress as it goes
    ///
    /// Headers of a batch may be decoded in parallel; entity resolution and
    /// events follow file order.
    fn process(
        &self,
        work: &[WorkItem],
        cancel: &CancelToken,
        sink: &mut dyn EventSink,
    ) -> Result<Progress> {
        let pool = self.worker_pool()?;
        let mut parser = RecordParser::new(Arc::clone(&self.config), self.store.clone());
        let interval = self.config.progress_interval.max(1);
        let mut progress = Progress {
            total: work.len(),
            processed: 0,
            records: Vec::new(),
            cancelled: false,
        };

        'batches: for batch in work.chunks(self.config.batch_size.max(1)) {
            if cancel.is_cancelled() {
                progress.cancelled = true;
                break;
            }

            let extract = |item: &WorkItem| {
                parser.extract(&item.path, item.entry.as_ref().map(|e| &e.attributes))
            };
            let extracted: Vec<ParseOutcome> = match &pool {
                Some(pool) => pool.install(|| batch.par_iter().map(extract).collect()),
                None => batch.iter().map(extract).collect(),
            };

            for (item, outcome) in batch.iter().zip(extracted) {
                if cancel.is_cancelled() {
                    progress.cancelled = true;
                    break 'batches;
                }

                if let ParseOutcome::Parsed(record) = parser.resolve(outcome)? {
                    if let Some(entry) = &item.entry {
                        entry.check_reference(&record);
                    }
                    progress.records.push(record);
                }
                progress.processed += 1;
                debug!(
                    "Processed {} ({}/{})",
                    item.path.display(),
                    progress.processed,
                    progress.total
                );

                if progress.processed % interval == 0 || progress.processed == progress.total {
                    let event = IngestEvent::processing(
                        progress.processed,
                        progress.total,
                        item.path.to_string_lossy(),
                    );
                    if !sink.emit(event) {
                        debug!("Event consumer gone, cancelling");
                        cancel.cancel();
                    }
                }
            }
        }

        if progress.cancelled {
            info!(
                "Cancelled after {} of {} files",
                progress.processed, progress.total
            );
        }
        Ok(progress)
    }

    /// Groups the records and writes the end-of-run documents
    ///
    /// Patients, series and studies are upserted, so the last run to save
    /// a key determines its stored fields.
    fn save(&self, records: &[ParsedRecord]) -> Result<Vec<StudyDocument>> {
        let grouped = group_records(records);

        for patient in &grouped.patients {
            self.store
                .upsert(Collection::Patients, &patient.patient_id, patient)?;
        }
        for series in &grouped.series {
            self.store
                .upsert(Collection::Series, &series.series_uid, series)?;
        }
        for study in &grouped.studies {
            self.store
                .upsert(Collection::Studies, &study.study_instance_uid, study)?;
        }
        self.store.flush()?;

        Ok(grouped.studies)
    }
}

/// A run executing on a background thread
///
/// Iterating yields events until the terminal one.
pub struct IngestHandle {
    events: Receiver<IngestEvent>,
    cancel: CancelToken,
    handle: JoinHandle<Result<IngestSummary>>,
}

impl IngestHandle {
    /// Asks the run to stop after the current file
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to finish, discarding undelivered events
    ///
    /// The run is not cancelled; call [`IngestHandle::cancel`] first to
    /// stop it early.
    pub fn join(self) -> Result<IngestSummary> {
        for _ in self.events.iter() {}
        self.handle.join().map_err(|_| IngestError::WorkerPanicked)?
    }
}

impl Iterator for IngestHandle {
    type Item = IngestEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.recv().ok()
    }
}
