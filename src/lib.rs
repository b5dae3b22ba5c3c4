//! notesearch - search and indexing for a local markdown note corpus.
//!
//! A project keeps its notes in a two-level tree (`notes/<folder>/<file>`)
//! and a persistent [Tantivy](https://github.com/quickwit-oss/tantivy) index
//! next to it. The index covers notes, attachments and folders, and answers
//! a small query language with boolean operators, exact phrases, fuzzy
//! prefix matching, tag and file-name filters. A separate trigram matcher
//! serves instant file-name lookups without touching the index.
//!
//! # Quick start
//!
//! ```no_run
//! use notesearch::{ProjectDir, SearchIndex};
//! use notesearch::events::NoopSink;
//! use notesearch::indexing::{self, IndexOptions};
//! use notesearch::search;
//!
//! let project = ProjectDir::resolve(None).unwrap();
//! let index = SearchIndex::open_or_create(&project.index_dir()).unwrap();
//! indexing::index_all(
//!     &index,
//!     &project.notes_dir(),
//!     &IndexOptions::default(),
//!     &NoopSink,
//! )
//! .unwrap();
//!
//! for r in search::execute_search(&index, "#rust f:work/", 50).unwrap() {
//!     println!("{} ({})", r.path(), r.kind);
//! }
//! ```

pub mod cli;
pub mod data_dir;
pub mod doc_key;
pub mod error;
pub mod events;
pub mod incremental;
pub mod indexing;
pub mod markdown;
pub mod palette;
pub mod query;
pub mod results;
pub mod saved_searches;
pub mod schema;
pub mod search;
pub mod tantivy_index;
pub mod tokens;
pub mod walker;

pub use data_dir::ProjectDir;
pub use doc_key::DocumentKey;
pub use error::{Error, Result};
pub use tantivy_index::SearchIndex;
