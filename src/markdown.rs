//! Content extraction from markdown notes.
//!
//! Pulls out what the search index needs from a note: front matter fields
//! (tags, freshness marker, creation date), the prose with markup removed,
//! and the contents of fenced code blocks.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;

static FRONTMATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A---(.*?)---\s*").unwrap());
static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```|~~~.*?~~~").unwrap());
static CODE_BLOCK_WITH_LANG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:([a-zA-Z0-9_+-]+)[^\n]*)?\n(.*?)```").unwrap()
});
static DRAWING_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```drawing[^\n]*\n(.*?)```").unwrap());
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[.*?\]\((.*?)\)").unwrap());
static VIDEO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[video\]\(.*?\)").unwrap());
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+[ \t]*").unwrap());

/// Languages that get their own code array and flag in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLanguage {
    Go,
    Java,
    Python,
    Javascript,
}

impl CodeLanguage {
    pub const ALL: [CodeLanguage; 4] = [
        CodeLanguage::Go,
        CodeLanguage::Java,
        CodeLanguage::Python,
        CodeLanguage::Javascript,
    ];

    /// Info-string names that select this language.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            CodeLanguage::Go => &["go"],
            CodeLanguage::Java => &["java"],
            CodeLanguage::Python => &["python"],
            CodeLanguage::Javascript => &["javascript", "js"],
        }
    }
}

/// Parsed YAML front matter of a note.
#[derive(Debug, Clone, Default)]
pub struct FrontMatter {
    values: serde_yaml::Mapping,
}

impl FrontMatter {
    /// Parse the leading `---` block. Returns `None` when there is no block
    /// or it is not a YAML mapping.
    pub fn parse(markdown: &str) -> Option<Self> {
        let caps = FRONTMATTER.captures(markdown)?;
        let yaml = caps.get(1)?.as_str().trim();
        match serde_yaml::from_str::<Value>(yaml).ok()? {
            Value::Mapping(values) => Some(Self { values }),
            _ => None,
        }
    }

    fn scalar(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Tagged(tagged) => match &tagged.value {
                Value::String(s) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn last_updated(&self) -> Option<String> {
        self.scalar("lastUpdated")
    }

    pub fn created_date(&self) -> Option<String> {
        self.scalar("createdDate")
    }

    /// Tags as a list. A lone string is treated as a single tag; non-string
    /// list entries are ignored.
    pub fn tags(&self) -> Vec<String> {
        match self.values.get("tags") {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(tag)) => vec![tag.clone()],
            _ => Vec::new(),
        }
    }
}

/// The freshness marker used to decide whether a note must be re-indexed.
pub fn last_updated(markdown: &str) -> Option<String> {
    FrontMatter::parse(markdown).and_then(|fm| fm.last_updated())
}

/// Prose content with front matter, code blocks, media embeds, HTML tags
/// and heading markers removed. Links are replaced by their text.
pub fn prose_text(markdown: &str) -> String {
    let content = FRONTMATTER.replace(markdown, "");
    let content = CODE_BLOCK.replace_all(content.trim(), "");
    let content = IMAGE.replace_all(content.trim(), "");
    let content = VIDEO.replace_all(&content, "");
    let content = LINK.replace_all(&content, "$1");
    let content = HTML_TAG.replace_all(&content, "");
    let content = HEADING.replace_all(&content, "");
    content.trim().to_string()
}

/// Contents of every fenced code block, regardless of language.
pub fn code_blocks(markdown: &str) -> Vec<String> {
    CODE_BLOCK_WITH_LANG
        .captures_iter(markdown)
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|code| !code.is_empty())
        .collect()
}

/// Contents of fenced code blocks tagged with `language`.
pub fn code_blocks_for(markdown: &str, language: CodeLanguage) -> Vec<String> {
    CODE_BLOCK_WITH_LANG
        .captures_iter(markdown)
        .filter(|caps| {
            caps.get(1).is_some_and(|lang| {
                language
                    .aliases()
                    .iter()
                    .any(|alias| lang.as_str().eq_ignore_ascii_case(alias))
            })
        })
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|code| !code.is_empty())
        .collect()
}

pub fn has_drawing(markdown: &str) -> bool {
    DRAWING_BLOCK.is_match(markdown)
}
