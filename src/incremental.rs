use std::path::PathBuf;

use tracing::{debug, warn};

use crate::doc_key::DocumentKey;
use crate::error::Result;
use crate::events::{EventSink, IndexEvent};
use crate::indexing::{
    IndexOptions,
    Outcome,
    add_attachment_to_batch,
    add_note_to_batch,
    index_folder,
};
use crate::schema::{AttachmentDocument, IndexDocument, NoteDocument};
use crate::tantivy_index::{Batch, SearchIndex};
use crate::walker::CorpusFolder;

/// A file inside a corpus folder, as named by a change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRef {
    pub folder: String,
    pub file_name: String,
}

impl NoteRef {
    pub fn new(
        folder: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            file_name: file_name.into(),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::file(&self.folder, &self.file_name)
    }

    fn is_valid(&self) -> bool {
        !self.folder.is_empty() && !self.file_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename<T> {
    pub old: T,
    pub new: T,
}

/// Applies file-watcher and mutation notifications to the index.
///
/// Every call uses a single batch, commits it, and emits
/// [`IndexEvent::DocumentsChanged`] with the keys it touched. Entries that
/// fail are logged and skipped.
pub struct IndexUpdater<'a> {
    index: &'a SearchIndex,
    notes_root: PathBuf,
    sink: &'a dyn EventSink,
    options: IndexOptions,
}

impl<'a> IndexUpdater<'a> {
    pub fn new(
        index: &'a SearchIndex,
        notes_root: impl Into<PathBuf>,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            index,
            notes_root: notes_root.into(),
            sink,
            options: IndexOptions::default(),
        }
    }

    fn path_of(&self, note: &NoteRef) -> PathBuf {
        self.notes_root.join(&note.folder).join(&note.file_name)
    }

    fn finish(
        &self,
        mut batch: Batch,
        mut touched: Vec<DocumentKey>,
    ) -> Result<Vec<DocumentKey>> {
        touched.extend(batch.keys().cloned());
        self.index.commit(&mut batch)?;

        touched.sort();
        touched.dedup();
        if !touched.is_empty() {
            self.sink.emit(IndexEvent::DocumentsChanged {
                keys: touched.clone(),
            });
        }
        Ok(touched)
    }

    fn add_notes(
        &self,
        notes: &[NoteRef],
        force: bool,
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        for note in notes {
            if !note.is_valid() {
                warn!(?note, "skipping note event with missing name");
                continue;
            }
            let path = self.path_of(note);
            match add_note_to_batch(
                self.index,
                &mut batch,
                &path,
                &note.folder,
                &note.file_name,
                force,
            ) {
                Ok((key, false)) => debug!(%key, "note already fresh"),
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to index note"
                    )
                }
            }
        }
        self.finish(batch, Vec::new())
    }

    pub fn notes_created(
        &self,
        notes: &[NoteRef],
    ) -> Result<Vec<DocumentKey>> {
        self.add_notes(notes, false)
    }

    /// Re-index notes whose content changed, subject to the freshness rule.
    pub fn notes_updated(
        &self,
        notes: &[NoteRef],
    ) -> Result<Vec<DocumentKey>> {
        self.add_notes(notes, false)
    }

    /// Re-index notes unconditionally after their tags were edited.
    pub fn tags_changed(
        &self,
        notes: &[NoteRef],
    ) -> Result<Vec<DocumentKey>> {
        self.add_notes(notes, true)
    }

    pub fn notes_deleted(
        &self,
        notes: &[NoteRef],
    ) -> Result<Vec<DocumentKey>> {
        self.delete_files(notes)
    }

    pub fn notes_renamed(
        &self,
        renames: &[Rename<NoteRef>],
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        for rename in renames {
            if !rename.old.is_valid() || !rename.new.is_valid() {
                warn!(?rename, "skipping note rename with missing name");
                continue;
            }

            batch.delete(rename.old.key());
            let path = self.path_of(&rename.new);
            let markdown = match std::fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to read renamed note"
                    );
                    continue;
                }
            };

            let doc = NoteDocument::from_markdown(
                &markdown,
                &rename.new.folder,
                &rename.new.file_name,
            );
            batch.index(rename.new.key(), IndexDocument::Note(doc));
        }
        self.finish(batch, Vec::new())
    }

    pub fn attachments_created(
        &self,
        attachments: &[NoteRef],
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        for attachment in attachments {
            if !attachment.is_valid() {
                warn!(
                    ?attachment,
                    "skipping attachment event with missing name"
                );
                continue;
            }
            add_attachment_to_batch(
                self.index,
                &mut batch,
                &attachment.folder,
                &attachment.file_name,
            );
        }
        self.finish(batch, Vec::new())
    }

    pub fn attachments_deleted(
        &self,
        attachments: &[NoteRef],
    ) -> Result<Vec<DocumentKey>> {
        self.delete_files(attachments)
    }

    pub fn attachments_renamed(
        &self,
        renames: &[Rename<NoteRef>],
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        for rename in renames {
            if !rename.old.is_valid() || !rename.new.is_valid() {
                warn!(?rename, "skipping attachment rename with missing name");
                continue;
            }
            batch.delete(rename.old.key());
            let doc = AttachmentDocument::new(
                &rename.new.folder,
                &rename.new.file_name,
            );
            batch.index(rename.new.key(), IndexDocument::Attachment(doc));
        }
        self.finish(batch, Vec::new())
    }

    fn delete_files(&self, files: &[NoteRef]) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        for file in files {
            if !file.is_valid() {
                warn!(?file, "skipping delete event with missing name");
                continue;
            }
            batch.delete(file.key());
        }
        self.finish(batch, Vec::new())
    }

    /// Index new folders together with any files already inside them.
    pub fn folders_created(
        &self,
        folders: &[String],
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        let mut touched = Vec::new();
        for name in folders {
            self.index_folder_into(name, &mut batch, &mut touched);
        }
        self.finish(batch, touched)
    }

    /// Remove every document stored under each folder.
    pub fn folders_deleted(
        &self,
        folders: &[String],
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        for name in folders {
            if name.is_empty() {
                warn!("skipping folder delete with missing name");
                continue;
            }
            self.queue_folder_delete(name, &mut batch);
        }
        self.finish(batch, Vec::new())
    }

    pub fn folders_renamed(
        &self,
        renames: &[Rename<String>],
    ) -> Result<Vec<DocumentKey>> {
        let mut batch = self.index.new_batch();
        let mut touched = Vec::new();
        for rename in renames {
            if rename.old.is_empty() || rename.new.is_empty() {
                warn!(?rename, "skipping folder rename with missing name");
                continue;
            }
            self.queue_folder_delete(&rename.old, &mut batch);
            self.index_folder_into(&rename.new, &mut batch, &mut touched);
        }
        self.finish(batch, touched)
    }

    fn queue_folder_delete(&self, folder: &str, batch: &mut Batch) {
        match self.index.keys_in_folder(folder) {
            Ok(keys) => {
                debug!(folder, count = keys.len(), "deleting folder documents");
                for key in keys {
                    batch.delete(key);
                }
            }
            Err(e) => {
                warn!(folder, error = %e, "failed to look up folder documents")
            }
        }
    }

    fn index_folder_into(
        &self,
        name: &str,
        batch: &mut Batch,
        touched: &mut Vec<DocumentKey>,
    ) {
        if name.is_empty() {
            warn!("skipping folder event with missing name");
            return;
        }
        // Keys still pending in the batch are committed by index_folder.
        touched.extend(batch.keys().cloned());

        let folder = CorpusFolder {
            name: name.to_string(),
            path: self.notes_root.join(name),
        };
        let mut report = |outcome: Outcome| {
            if let Outcome::Indexed(key) = outcome {
                touched.push(key);
            }
        };
        if let Err(e) =
            index_folder(self.index, &folder, batch, &self.options, &mut report)
        {
            warn!(folder = name, error = %e, "failed to index folder");
        }
    }
}
