//! Full-corpus indexing.
//!
//! A producer feeds first-level folders into a bounded job queue. A fixed
//! pool of workers takes one folder at a time, decides which of its files
//! need (re)indexing, and commits them through a batch owned by that folder
//! alone. Per-file outcomes flow back over a bounded result queue that a
//! supervisor closes once every worker has exited.

use std::path::Path;

use crossbeam_channel::{Receiver, Sender, bounded};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::doc_key::DocumentKey;
use crate::error::Result;
use crate::events::{EventSink, IndexEvent};
use crate::markdown;
use crate::schema::{
    AttachmentDocument,
    FolderDocument,
    IndexDocument,
    NoteDocument,
};
use crate::tantivy_index::{Batch, DocumentIndexInfo, SearchIndex};
use crate::walker::{CorpusFolder, FileKind, list_folder_files, list_folders};

/// Operations per batch before it is flushed mid-folder.
pub const DEFAULT_BATCH_SIZE: usize = 750;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Tuning knobs for a full indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub batch_size: usize,
    /// Re-index notes even when their freshness marker is unchanged.
    pub force: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        // Indexing is I/O bound, so oversubscribe the cores.
        let workers = std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(4);
        Self {
            workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            force: false,
        }
    }
}

/// What happened to one entry of the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Indexed(DocumentKey),
    Unchanged(DocumentKey),
    Failed { path: String, error: String },
    FolderFailed { folder: String, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Folders listed and committed without error.
    pub folders: usize,
    /// Documents written to the index.
    pub written: usize,
    /// Documents skipped because the index was already fresh.
    pub unchanged: usize,
    /// Files or folders that could not be processed.
    pub failed: usize,
    #[serde(skip)]
    failed_folders: usize,
    /// Live documents in the index after the run.
    pub documents: u64,
}

impl IndexStats {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Indexed(_) => self.written += 1,
            Outcome::Unchanged(_) => self.unchanged += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::FolderFailed { .. } => {
                self.failed += 1;
                self.failed_folders += 1;
            }
        }
    }
}

/// Freshness rule for notes: a missing document is always indexed; a
/// present one is re-indexed when forced, when either freshness marker is
/// missing, or when the markers differ.
pub fn needs_reindex(
    info: &DocumentIndexInfo,
    current: Option<&str>,
    force: bool,
) -> bool {
    if !info.exists || force {
        return true;
    }
    match (current, info.last_updated.as_deref()) {
        (Some(current), Some(stored)) => {
            current.is_empty() || stored.is_empty() || current != stored
        }
        _ => true,
    }
}

/// Queue the note at `path` if it needs indexing. Returns its key and
/// whether it was queued.
pub fn add_note_to_batch(
    index: &SearchIndex,
    batch: &mut Batch,
    path: &Path,
    folder: &str,
    file_name: &str,
    force: bool,
) -> Result<(DocumentKey, bool)> {
    let bytes = std::fs::read(path)?;
    let markdown = String::from_utf8_lossy(&bytes);
    let key = DocumentKey::file(folder, file_name);

    let info = index.document_info(&key);
    let current = markdown::last_updated(&markdown);
    if !needs_reindex(&info, current.as_deref(), force) {
        return Ok((key, false));
    }

    let doc = NoteDocument::from_markdown(&markdown, folder, file_name);
    batch.index(key.clone(), IndexDocument::Note(doc));
    Ok((key, true))
}

/// Queue an attachment unless it is already present.
pub fn add_attachment_to_batch(
    index: &SearchIndex,
    batch: &mut Batch,
    folder: &str,
    file_name: &str,
) -> (DocumentKey, bool) {
    let doc = AttachmentDocument::new(folder, file_name);
    let key = doc.key();
    if index.document_info(&key).exists {
        return (key, false);
    }
    batch.index(key.clone(), IndexDocument::Attachment(doc));
    (key, true)
}

/// Queue a folder document unless it is already present.
pub fn add_folder_to_batch(
    index: &SearchIndex,
    batch: &mut Batch,
    folder: &str,
) -> (DocumentKey, bool) {
    let doc = FolderDocument::new(folder);
    let key = doc.key();
    if index.document_info(&key).exists {
        return (key, false);
    }
    batch.index(key.clone(), IndexDocument::Folder(doc));
    (key, true)
}

/// Index a folder document and every file directly inside it through
/// `batch`, flushing at `options.batch_size` and at the end.
///
/// Unreadable files are reported as [`Outcome::Failed`] and skipped.
/// [`Outcome::Indexed`] is reported only once the write is committed. An
/// error is returned only when the folder cannot be listed or a commit
/// fails.
pub fn index_folder(
    index: &SearchIndex,
    folder: &CorpusFolder,
    batch: &mut Batch,
    options: &IndexOptions,
    report: &mut dyn FnMut(Outcome),
) -> Result<()> {
    let files = list_folder_files(&folder.path)?;
    let mut pending = Vec::new();

    let (key, written) = add_folder_to_batch(index, batch, &folder.name);
    hold(&mut pending, report, key, written);

    for file in files {
        let queued = match file.kind {
            FileKind::Note => add_note_to_batch(
                index,
                batch,
                &file.path,
                &folder.name,
                &file.name,
                options.force,
            ),
            FileKind::Attachment => Ok(add_attachment_to_batch(
                index,
                batch,
                &folder.name,
                &file.name,
            )),
        };
        match queued {
            Ok((key, written)) => hold(&mut pending, report, key, written),
            Err(e) => {
                warn!(
                    path = %file.path.display(),
                    error = %e,
                    "failed to index note"
                );
                report(Outcome::Failed {
                    path: file.path.display().to_string(),
                    error: e.to_string(),
                });
            }
        }

        if batch.size() >= options.batch_size {
            index.commit(batch)?;
            pending.drain(..).for_each(&mut *report);
        }
    }

    index.commit(batch)?;
    pending.drain(..).for_each(report);
    Ok(())
}

/// Report an unchanged entry now; hold a queued one until its commit.
fn hold(
    pending: &mut Vec<Outcome>,
    report: &mut dyn FnMut(Outcome),
    key: DocumentKey,
    written: bool,
) {
    if written {
        pending.push(Outcome::Indexed(key));
    } else {
        report(Outcome::Unchanged(key));
    }
}

fn run_worker(
    index: &SearchIndex,
    jobs: Receiver<CorpusFolder>,
    results: Sender<Outcome>,
    options: &IndexOptions,
) {
    for folder in jobs.iter() {
        let mut batch = index.new_batch();
        let mut report = |outcome: Outcome| {
            // The receiver outlives every worker, so a send only fails
            // if the caller stopped draining.
            let _ = results.send(outcome);
        };

        if let Err(e) =
            index_folder(index, &folder, &mut batch, options, &mut report)
        {
            warn!(folder = %folder.name, error = %e, "skipping folder");
            let _ = results.send(Outcome::FolderFailed {
                folder: folder.name.clone(),
                error: e.to_string(),
            });
        } else {
            debug!(folder = %folder.name, "folder indexed");
        }
    }
}

/// Index every folder and file under `notes_root`.
///
/// A missing root is an empty corpus. Fails only when the root exists but
/// cannot be listed.
pub fn index_all(
    index: &SearchIndex,
    notes_root: &Path,
    options: &IndexOptions,
    sink: &dyn EventSink,
) -> Result<IndexStats> {
    let folders = list_folders(notes_root)?;
    let folder_count = folders.len();
    let workers = options.workers.max(1);
    let capacity = options.queue_capacity.max(1);

    info!(
        root = %notes_root.display(),
        folders = folder_count,
        workers,
        "indexing corpus"
    );

    let (job_tx, job_rx) = bounded::<CorpusFolder>(capacity);
    let (result_tx, result_rx) = bounded::<Outcome>(capacity);

    let mut stats = IndexStats::default();
    std::thread::scope(|s| {
        s.spawn(move || {
            for folder in folders {
                if job_tx.send(folder).is_err() {
                    break;
                }
            }
            // job_tx dropped here: workers exit once the queue drains.
        });

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                s.spawn(move || run_worker(index, jobs, results, options))
            })
            .collect();
        drop(job_rx);

        s.spawn(move || {
            for handle in handles {
                if handle.join().is_err() {
                    warn!("indexing worker panicked");
                }
            }
            drop(result_tx);
        });

        for outcome in result_rx.iter() {
            stats.record(&outcome);
        }
    });

    stats.folders = folder_count.saturating_sub(stats.failed_folders);
    stats.documents = index.doc_count();
    info!(
        documents = stats.documents,
        written = stats.written,
        unchanged = stats.unchanged,
        failed = stats.failed,
        "indexing complete"
    );
    sink.emit(IndexEvent::IndexingComplete {
        documents: stats.documents,
    });

    Ok(stats)
}
