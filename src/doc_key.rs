/// The identity of a document in the search index.
///
/// Files (notes and attachments) are keyed by `folder/file_name`; folders by
/// their bare name. A key never changes for the lifetime of a document, so a
/// rename is always a delete of the old key followed by an add of the new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Key for a note or attachment inside `folder`.
    pub fn file(folder: &str, file_name: &str) -> Self {
        Self(format!("{folder}/{file_name}"))
    }

    /// Key for a first-level folder.
    pub fn folder(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
