use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// A first-level folder under the notes root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFolder {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Note,
    Attachment,
}

/// A file directly inside a corpus folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub name: String,
    pub path: PathBuf,
    pub kind: FileKind,
}

impl FileKind {
    /// Markdown notes are `.md` files; everything else is an attachment.
    pub fn of(file_name: &str) -> Self {
        if file_name.ends_with(".md") {
            FileKind::Note
        } else {
            FileKind::Attachment
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// List the first-level folders of the corpus, sorted by name.
///
/// A missing root is an empty corpus, not an error. Hidden folders and plain
/// files at the top level are skipped.
pub fn list_folders(notes_root: &Path) -> Result<Vec<CorpusFolder>> {
    let entries = match std::fs::read_dir(notes_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            folders.push(CorpusFolder { name, path });
        }
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// List the files directly inside `folder`, sorted by name.
///
/// The corpus is two levels deep, so nested directories are ignored.
pub fn list_folder_files(folder: &Path) -> Result<Vec<CorpusFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        files.push(CorpusFile {
            kind: FileKind::of(&name),
            name,
            path,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Every `folder/file` path in the corpus. Folders that cannot be listed
/// are logged and skipped.
pub fn corpus_paths(notes_root: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for folder in list_folders(notes_root)? {
        match list_folder_files(&folder.path) {
            Ok(files) => paths.extend(
                files
                    .into_iter()
                    .map(|file| format!("{}/{}", folder.name, file.name)),
            ),
            Err(e) => {
                warn!(
                    folder = %folder.name,
                    error = %e,
                    "skipping unreadable folder"
                );
            }
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("zeta")).unwrap();
        std::fs::create_dir_all(root.join("alpha/nested")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("alpha/note.md"), "hello").unwrap();
        std::fs::write(root.join("alpha/image.png"), "binary").unwrap();
        std::fs::write(root.join("alpha/.draft.md"), "secret").unwrap();
        std::fs::write(root.join("alpha/nested/deep.md"), "deep").unwrap();
        std::fs::write(root.join("zeta/b.md"), "b").unwrap();
        std::fs::write(root.join("loose.md"), "top level").unwrap();
        tmp
    }

    #[test]
    fn lists_visible_folders_sorted() {
        let tmp = corpus();
        let folders = list_folders(tmp.path()).unwrap();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn lists_direct_children_only() {
        let tmp = corpus();
        let files = list_folder_files(&tmp.path().join("alpha")).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["image.png", "note.md"]);
        assert_eq!(files[0].kind, FileKind::Attachment);
        assert_eq!(files[1].kind, FileKind::Note);
    }

    #[test]
    fn missing_root_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let folders = list_folders(&tmp.path().join("does-not-exist")).unwrap();
        assert!(folders.is_empty());
    }

    #[test]
    fn missing_folder_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_folder_files(&tmp.path().join("gone")).is_err());
    }

    #[test]
    fn corpus_paths_are_two_level() {
        let tmp = corpus();
        let paths = corpus_paths(tmp.path()).unwrap();
        assert_eq!(paths, vec!["alpha/image.png", "alpha/note.md", "zeta/b.md"]);
    }
}
