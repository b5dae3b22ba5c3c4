use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tantivy::{
    Index,
    IndexReader,
    IndexSettings,
    IndexWriter,
    ReloadPolicy,
    TantivyDocument,
    Term,
    aggregation::{
        AggregationCollector,
        agg_req::Aggregations,
        agg_result::AggregationResults,
    },
    collector::{DocSetCollector, TopDocs},
    directory::MmapDirectory,
    query::{AllQuery, Query, TermQuery},
    schema::*,
    snippet::SnippetGenerator,
    tokenizer::TextAnalyzer,
};
use tracing::{debug, info, warn};

use crate::data_dir::ProjectDir;
use crate::doc_key::DocumentKey;
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::indexing::{IndexOptions, IndexStats, index_all};
use crate::schema::{
    IndexDocument,
    SchemaFields,
    build_schema,
    fields,
    register_tokenizers,
};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;
const SNIPPET_MAX_CHARS: usize = 150;
const MARK_OPEN: &str = "<mark>";
const MARK_CLOSE: &str = "</mark>";

/// Stored fields copied into every [`RawHit`].
const RESULT_FIELDS: [&str; 8] = [
    fields::ID,
    fields::TYPE,
    fields::FOLDER,
    fields::FILE_NAME,
    fields::FILE_EXTENSION,
    fields::TAGS,
    fields::LAST_UPDATED,
    fields::CREATED_DATE,
];

/// Default number of hits returned by a search.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// The persistent document index for a note project.
///
/// Owns the only `IndexWriter`, so every mutation goes through
/// [`SearchIndex::commit`]. Reads never block on writes.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    schema: Schema,
    fields: SchemaFields,
    dir: Option<PathBuf>,
}

/// Presence and freshness of a stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIndexInfo {
    pub exists: bool,
    pub last_updated: Option<String>,
}

/// A search hit before it is shaped into a typed result.
#[derive(Debug, Clone, Default)]
pub struct RawHit {
    pub score: f32,
    /// Stored values keyed by field name.
    pub fields: BTreeMap<String, Vec<String>>,
    /// Rendered highlight fragments keyed by field name. Matches are
    /// wrapped in `<mark>` tags and the surrounding text is HTML-escaped.
    pub fragments: BTreeMap<String, Vec<String>>,
}

impl RawHit {
    pub fn first(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn all(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Index(DocumentKey, IndexDocument),
    Delete(DocumentKey),
}

/// A buffered set of index mutations, applied together by
/// [`SearchIndex::commit`].
///
/// A batch is owned by exactly one call path and is never shared.
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn index(&mut self, key: DocumentKey, doc: IndexDocument) {
        self.ops.push(BatchOp::Index(key, doc));
    }

    pub fn delete(&mut self, key: DocumentKey) {
        self.ops.push(BatchOp::Delete(key));
    }

    pub fn size(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Keys touched by this batch, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &DocumentKey> {
        self.ops.iter().map(|op| match op {
            BatchOp::Index(key, _) | BatchOp::Delete(key) => key,
        })
    }
}

impl SearchIndex {
    /// Open the index stored in `dir`, creating it if it does not exist.
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = MmapDirectory::open(dir)?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(mmap_dir, build_schema(), IndexSettings::default())?
        };

        Self::from_index(index, Some(dir.to_path_buf()))
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()), None)
    }

    fn from_index(index: Index, dir: Option<PathBuf>) -> Result<Self> {
        register_tokenizers(&index);

        let schema = index.schema();
        let fields = SchemaFields::resolve(&schema)?;
        let writer = index.writer(WRITER_MEMORY_BUDGET)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            schema,
            fields,
            dir,
        })
    }

    pub fn fields(&self) -> SchemaFields {
        self.fields
    }

    /// Storage directory, `None` for in-memory indexes.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// The analyzer registered for `field`, used to analyze query text the
    /// same way the field was indexed.
    pub fn analyzer_for(&self, field: Field) -> Result<TextAnalyzer> {
        Ok(self.index.tokenizer_for_field(field)?)
    }

    pub fn new_batch(&self) -> Batch {
        Batch::default()
    }

    /// Apply and commit every operation in `batch`, then clear it.
    ///
    /// Index operations replace any document stored under the same key.
    /// Returns the number of operations applied; an empty batch is a no-op.
    pub fn commit(&self, batch: &mut Batch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut writer = self.writer.lock().map_err(|_| {
            Error::IndexUnavailable("index writer lock poisoned".into())
        })?;

        let applied = batch.size();
        for op in batch.ops.drain(..) {
            match op {
                BatchOp::Index(key, doc) => {
                    writer.delete_term(self.key_term(&key));
                    let added =
                        writer.add_document(doc.to_tantivy(&key, &self.fields));
                    if let Err(e) = added {
                        writer.rollback()?;
                        return Err(e.into());
                    }
                }
                BatchOp::Delete(key) => {
                    writer.delete_term(self.key_term(&key));
                }
            }
        }
        writer.commit()?;
        drop(writer);

        self.reader.reload()?;
        debug!(applied, "committed batch");
        Ok(applied)
    }

    fn key_term(&self, key: &DocumentKey) -> Term {
        Term::from_field_text(self.fields.id, key.as_str())
    }

    /// Point lookup by key. Any lookup failure reports the document as
    /// absent, which makes callers (re)index it.
    pub fn document_info(&self, key: &DocumentKey) -> DocumentIndexInfo {
        match self.lookup(key) {
            Ok(Some(doc)) => DocumentIndexInfo {
                exists: true,
                last_updated: doc
                    .get_first(self.fields.last_updated)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            },
            Ok(None) => DocumentIndexInfo::default(),
            Err(e) => {
                debug!(key = %key, error = %e, "document lookup failed");
                DocumentIndexInfo::default()
            }
        }
    }

    fn lookup(&self, key: &DocumentKey) -> Result<Option<TantivyDocument>> {
        let searcher = self.reader.searcher();
        let query =
            TermQuery::new(self.key_term(key), IndexRecordOption::Basic);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top.first() {
            Some((_, address)) => Ok(Some(searcher.doc(*address)?)),
            None => Ok(None),
        }
    }

    /// Execute `query` and return up to `limit` hits with their stored
    /// fields and highlight fragments for `highlight` fields.
    pub fn search(
        &self,
        query: &dyn Query,
        limit: usize,
        highlight: &[Field],
    ) -> Result<Vec<RawHit>> {
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query, &TopDocs::with_limit(limit))?;

        let mut generators = Vec::with_capacity(highlight.len());
        for &field in highlight {
            let mut generator =
                SnippetGenerator::create(&searcher, query, field)?;
            generator.set_max_num_chars(SNIPPET_MAX_CHARS);
            generators.push((field, generator));
        }

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;

            let mut stored = BTreeMap::new();
            for name in RESULT_FIELDS {
                let field = self.schema.get_field(name)?;
                let values: Vec<String> = doc
                    .get_all(field)
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                if !values.is_empty() {
                    stored.insert(name.to_string(), values);
                }
            }

            let mut fragments = BTreeMap::new();
            for (field, generator) in &generators {
                let rendered: Vec<String> = doc
                    .get_all(self.highlight_source(*field))
                    .filter_map(|v| v.as_str())
                    .map(|text| generator.snippet(text))
                    .filter(|snippet| !snippet.highlighted().is_empty())
                    .map(|mut snippet| {
                        snippet.set_snippet_prefix_postfix(
                            MARK_OPEN, MARK_CLOSE,
                        );
                        snippet.to_html()
                    })
                    .collect();
                if !rendered.is_empty() {
                    fragments.insert(
                        self.schema.get_field_name(*field).to_string(),
                        rendered,
                    );
                }
            }

            hits.push(RawHit {
                score,
                fields: stored,
                fragments,
            });
        }

        Ok(hits)
    }

    /// The stored field holding the text a highlight field was built from.
    fn highlight_source(&self, field: Field) -> Field {
        if field == self.fields.text_content_ngram {
            self.fields.text_content
        } else {
            field
        }
    }

    /// Distinct values of a fast keyword field across all live documents,
    /// with their document counts, capped at `limit` terms.
    pub fn facet_terms(
        &self,
        field_name: &str,
        limit: usize,
    ) -> Result<Vec<(String, u64)>> {
        let request: Aggregations = serde_json::from_value(serde_json::json!({
            "facet": { "terms": { "field": field_name, "size": limit } }
        }))?;
        let collector =
            AggregationCollector::from_aggs(request, Default::default());

        let searcher = self.reader.searcher();
        let results: AggregationResults =
            searcher.search(&AllQuery, &collector)?;
        let value = serde_json::to_value(results)?;

        let buckets = value["facet"]["buckets"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(buckets
            .iter()
            .filter_map(|bucket| {
                let key = bucket["key"].as_str()?.to_string();
                let count = bucket["doc_count"].as_u64().unwrap_or(0);
                Some((key, count))
            })
            .collect())
    }

    /// Keys of every live document stored under `folder`, including the
    /// folder document itself.
    pub fn keys_in_folder(&self, folder: &str) -> Result<Vec<DocumentKey>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.fields.folder, folder);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let addresses = searcher.search(&query, &DocSetCollector)?;

        let mut keys = Vec::with_capacity(addresses.len());
        for address in addresses {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(id) =
                doc.get_first(self.fields.id).and_then(|v| v.as_str())
            {
                keys.push(DocumentKey::from(id));
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Release the writer and its directory lock.
    pub fn close(self) -> Result<()> {
        let writer = self.writer.into_inner().map_err(|_| {
            Error::IndexUnavailable("index writer lock poisoned".into())
        })?;
        writer.wait_merging_threads()?;
        Ok(())
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Throw away the index stored for `project` and build a fresh one from the
/// corpus.
///
/// The old index is gone before re-indexing starts, so a failed run is
/// reported as [`Error::IndexUnavailable`]; the caller must rebuild again.
pub fn rebuild(
    index: SearchIndex,
    project: &ProjectDir,
    options: &IndexOptions,
    sink: &dyn EventSink,
) -> Result<(SearchIndex, IndexStats)> {
    let dir = index
        .dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| project.index_dir());

    if let Err(e) = index.close() {
        warn!(error = %e, "failed to close index before rebuild, continuing");
    }

    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    info!(dir = %dir.display(), "rebuilding search index");

    let fresh = SearchIndex::open_or_create(&dir)?;
    match index_all(&fresh, &project.notes_dir(), options, sink) {
        Ok(stats) => Ok((fresh, stats)),
        Err(e) => {
            if let Err(close_err) = fresh.close() {
                warn!(
                    error = %close_err,
                    "failed to close index after failed rebuild"
                );
            }
            Err(Error::IndexUnavailable(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use tantivy::query::{BooleanQuery, Occur};

    use super::*;
    use crate::schema::{AttachmentDocument, FolderDocument, NoteDocument};

    fn note(folder: &str, file: &str, markdown: &str) -> IndexDocument {
        IndexDocument::Note(NoteDocument::from_markdown(markdown, folder, file))
    }

    fn add(idx: &SearchIndex, doc: IndexDocument) {
        let mut batch = idx.new_batch();
        batch.index(doc.key(), doc);
        idx.commit(&mut batch).unwrap();
    }

    fn text_query(idx: &SearchIndex, word: &str) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(idx.fields().text_content, word),
            IndexRecordOption::WithFreqsAndPositions,
        )
    }

    #[test]
    fn commit_makes_documents_visible() {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut batch = idx.new_batch();
        let doc = note("notes", "hello.md", "hello world");
        batch.index(doc.key(), doc);
        batch.index(
            DocumentKey::folder("notes"),
            IndexDocument::Folder(FolderDocument::new("notes")),
        );
        assert_eq!(batch.size(), 2);

        assert_eq!(idx.commit(&mut batch).unwrap(), 2);
        assert!(batch.is_empty());
        assert_eq!(idx.doc_count(), 2);

        let hits = idx.search(&text_query(&idx, "hello"), 10, &[]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].first(fields::ID), Some("notes/hello.md"));
        assert_eq!(hits[0].first(fields::TYPE), Some("note"));
        assert_eq!(hits[0].first(fields::FILE_EXTENSION), Some(".md"));
    }

    #[test]
    fn empty_batch_is_noop() {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut batch = idx.new_batch();
        assert_eq!(idx.commit(&mut batch).unwrap(), 0);
        assert_eq!(idx.doc_count(), 0);
    }

    #[test]
    fn index_replaces_same_key() {
        let idx = SearchIndex::open_in_ram().unwrap();
        add(&idx, note("a", "x.md", "---\nlastUpdated: '1'\n---\nold content"));
        add(&idx, note("a", "x.md", "---\nlastUpdated: '2'\n---\nnew content"));

        assert_eq!(idx.doc_count(), 1);
        let info = idx.document_info(&DocumentKey::file("a", "x.md"));
        assert!(info.exists);
        assert_eq!(info.last_updated.as_deref(), Some("2"));
        assert!(idx.search(&text_query(&idx, "old"), 10, &[]).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_document() {
        let idx = SearchIndex::open_in_ram().unwrap();
        add(&idx, note("a", "x.md", "hello"));

        let mut batch = idx.new_batch();
        batch.delete(DocumentKey::file("a", "x.md"));
        idx.commit(&mut batch).unwrap();

        assert_eq!(idx.doc_count(), 0);
        assert!(!idx.document_info(&DocumentKey::file("a", "x.md")).exists);
    }

    #[test]
    fn document_info_for_missing_and_unmarked() {
        let idx = SearchIndex::open_in_ram().unwrap();
        assert_eq!(
            idx.document_info(&DocumentKey::file("a", "none.md")),
            DocumentIndexInfo::default()
        );

        add(&idx, note("a", "plain.md", "no front matter"));
        let info = idx.document_info(&DocumentKey::file("a", "plain.md"));
        assert!(info.exists);
        assert_eq!(info.last_updated, None);
    }

    #[test]
    fn highlights_are_marked_and_escaped() {
        let idx = SearchIndex::open_in_ram().unwrap();
        add(&idx, note("a", "x.md", "5 < 6 and hello there"));

        let query = text_query(&idx, "hello");
        let f = idx.fields();
        let hits = idx.search(&query, 10, &[f.text_content]).unwrap();
        let fragments = &hits[0].fragments[fields::TEXT_CONTENT];
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].contains("<mark>hello</mark>"));
        assert!(fragments[0].contains("5 &lt; 6"));
    }

    #[test]
    fn ngram_highlight_marks_prefix() {
        let idx = SearchIndex::open_in_ram().unwrap();
        add(&idx, note("a", "x.md", "greetings everyone"));

        let f = idx.fields();
        let query = TermQuery::new(
            Term::from_field_text(f.text_content_ngram, "gree"),
            IndexRecordOption::WithFreqsAndPositions,
        );
        let hits = idx.search(&query, 10, &[f.text_content_ngram]).unwrap();
        assert_eq!(hits.len(), 1);
        let fragments = &hits[0].fragments[fields::TEXT_CONTENT_NGRAM];
        assert!(fragments[0].contains("<mark>gree</mark>tings"));
    }

    #[test]
    fn facet_terms_counts_live_documents() {
        let idx = SearchIndex::open_in_ram().unwrap();
        add(&idx, note("a", "1.md", "---\ntags: [rust, search]\n---\none"));
        add(&idx, note("a", "2.md", "---\ntags: [rust]\n---\ntwo"));
        add(&idx, note("a", "3.md", "---\ntags: [gone]\n---\nthree"));

        let mut batch = idx.new_batch();
        batch.delete(DocumentKey::file("a", "3.md"));
        idx.commit(&mut batch).unwrap();

        let mut tags = idx.facet_terms(fields::TAGS, 1000).unwrap();
        tags.sort();
        assert_eq!(
            tags,
            vec![("rust".to_string(), 2), ("search".to_string(), 1)]
        );
    }

    #[test]
    fn keys_in_folder_is_exact() {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut batch = idx.new_batch();
        for doc in [
            IndexDocument::Folder(FolderDocument::new("docs")),
            note("docs", "a.md", "a"),
            IndexDocument::Attachment(AttachmentDocument::new("docs", "img.png")),
            IndexDocument::Folder(FolderDocument::new("Docs")),
            note("docs2", "b.md", "b"),
        ] {
            batch.index(doc.key(), doc);
        }
        idx.commit(&mut batch).unwrap();

        let keys = idx.keys_in_folder("docs").unwrap();
        let keys: Vec<&str> = keys.iter().map(DocumentKey::as_str).collect();
        assert_eq!(keys, vec!["docs", "docs/a.md", "docs/img.png"]);
    }

    #[test]
    fn persistent_index_reopens() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("index");

        let idx = SearchIndex::open_or_create(&dir).unwrap();
        add(&idx, note("a", "x.md", "persisted words"));
        idx.close().unwrap();

        let idx = SearchIndex::open_or_create(&dir).unwrap();
        assert_eq!(idx.doc_count(), 1);
        let query = BooleanQuery::new(vec![(
            Occur::Must,
            Box::new(text_query(&idx, "persisted")) as Box<dyn Query>,
        )]);
        assert_eq!(idx.search(&query, 10, &[]).unwrap().len(), 1);
    }

    #[test]
    fn overlapping_ngram_highlights_collapse_into_one_mark() {
        let idx = SearchIndex::open_in_ram().unwrap();
        add(&idx, note("a", "x.md", "greetings & everyone"));

        let f = idx.fields();
        let grams: Vec<(Occur, Box<dyn Query>)> = ["gre", "gree", "greet"]
            .into_iter()
            .map(|gram| {
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(f.text_content_ngram, gram),
                    IndexRecordOption::WithFreqsAndPositions,
                ));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(grams);

        let hits = idx.search(&query, 10, &[f.text_content_ngram]).unwrap();
        let fragment = &hits[0].fragments[fields::TEXT_CONTENT_NGRAM][0];
        assert!(fragment.contains("<mark>greet</mark>ings &amp; everyone"));
        assert_eq!(fragment.matches("<mark>").count(), 1);
    }
}
