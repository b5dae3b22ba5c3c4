use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    data_dir::ProjectDir,
    error::{Error, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedSearchFile {
    #[serde(default)]
    searches: Vec<SavedSearch>,
}

/// Named queries persisted as JSON inside the project.
pub struct SavedSearches {
    path: PathBuf,
}

impl SavedSearches {
    pub fn new(project: &ProjectDir) -> Self {
        Self::at(project.saved_searches())
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<SavedSearchFile> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&data) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable saved searches"
                );
                None
            }
        }
    }

    fn write(&self, file: &SavedSearchFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    /// Every saved search in insertion order. A missing or malformed file
    /// reads as empty.
    pub fn list(&self) -> Vec<SavedSearch> {
        self.read().map(|file| file.searches).unwrap_or_default()
    }

    pub fn add(&self, name: &str, query: &str) -> Result<()> {
        let mut file = self.read().unwrap_or_default();
        if file.searches.iter().any(|s| s.name == name) {
            return Err(Error::Duplicate {
                kind: "saved search",
                name: name.to_string(),
            });
        }

        file.searches.push(SavedSearch {
            name: name.to_string(),
            query: query.to_string(),
        });
        self.write(&file)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let not_found = || Error::NotFound {
            kind: "saved search",
            name: name.to_string(),
        };

        let mut file = self.read().ok_or_else(not_found)?;
        let position = file
            .searches
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(not_found)?;
        file.searches.remove(position);
        self.write(&file)
    }
}
