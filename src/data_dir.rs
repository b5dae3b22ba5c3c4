use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const NOTES_DIR: &str = "notes";
const SEARCH_DIR: &str = "search";
const INDEX_DIR: &str = "index";
const SAVED_SEARCHES_FILE: &str = "saved-searches.json";

/// The on-disk layout of a note project.
///
/// ```text
/// <root>/notes/<folder>/<file>        the corpus
/// <root>/search/index/                the persistent search index
/// <root>/search/saved-searches.json   named queries
/// ```
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    /// Resolve the project directory from, in order of priority:
    /// 1. An explicit path (from --project)
    /// 2. The NOTESEARCH_PROJECT environment variable
    /// 3. The XDG data directory (~/.local/share/notesearch/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("NOTESEARCH_PROJECT") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("notesearch")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::ProjectDir(root.clone()))?;

        Ok(Self { root })
    }

    /// Wrap an existing directory without touching the filesystem.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root of the two-level corpus. May not exist yet.
    pub fn notes_dir(&self) -> PathBuf {
        self.root.join(NOTES_DIR)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(SEARCH_DIR).join(INDEX_DIR)
    }

    pub fn saved_searches(&self) -> PathBuf {
        self.root.join(SEARCH_DIR).join(SAVED_SEARCHES_FILE)
    }
}
