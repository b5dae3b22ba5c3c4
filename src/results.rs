use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::schema::{DocumentType, fields};
use crate::tantivy_index::RawHit;

static FIRST_MARK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<mark>(.*?)</mark>").unwrap());

/// Fields highlighted on every search, in result order.
pub const HIGHLIGHT_FIELDS: [&str; 3] = [
    fields::TEXT_CONTENT,
    fields::TEXT_CONTENT_NGRAM,
    fields::CODE_CONTENT,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    /// HTML fragment with matches wrapped in `<mark>`.
    pub content: String,
    pub is_code: bool,
    /// Text of the first marked span.
    pub highlighted_term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: DocumentType,
    pub title: String,
    pub folder: String,
    /// File name; empty for folders.
    pub note: String,
    pub last_updated: String,
    pub created: String,
    pub tags: Vec<String>,
    pub highlights: Vec<Highlight>,
    pub score: f32,
}

impl SearchResult {
    /// `folder/file` for files, the bare name for folders.
    pub fn path(&self) -> String {
        if self.note.is_empty() {
            self.folder.clone()
        } else {
            format!("{}/{}", self.folder, self.note)
        }
    }
}

fn highlighted_term(fragment: &str) -> String {
    FIRST_MARK
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Marked fragments of a hit, deduplicated. N-gram fragments only stand in
/// when the prose field matched nothing, since they mark word prefixes.
fn highlights(hit: &RawHit) -> Vec<Highlight> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for field in HIGHLIGHT_FIELDS {
        let Some(fragments) = hit.fragments.get(field) else {
            continue;
        };
        if field == fields::TEXT_CONTENT_NGRAM && !out.is_empty() {
            continue;
        }
        for fragment in fragments {
            if !seen.insert(fragment.as_str()) || !fragment.contains("<mark>") {
                continue;
            }
            out.push(Highlight {
                content: fragment.clone(),
                is_code: field == fields::CODE_CONTENT,
                highlighted_term: highlighted_term(fragment),
            });
        }
    }
    out
}

/// Shape one hit. Returns `None` when the hit lacks a field its type
/// requires.
pub fn format_hit(hit: &RawHit) -> Option<SearchResult> {
    let kind: DocumentType = hit.first(fields::TYPE)?.parse().ok()?;
    let folder = hit.first(fields::FOLDER)?.to_string();

    let result = match kind {
        DocumentType::Folder => SearchResult {
            kind,
            title: folder.clone(),
            folder,
            note: String::new(),
            last_updated: String::new(),
            created: String::new(),
            tags: Vec::new(),
            highlights: Vec::new(),
            score: hit.score,
        },
        DocumentType::Attachment => {
            let file_name = hit.first(fields::FILE_NAME)?.to_string();
            SearchResult {
                kind,
                title: file_name.clone(),
                folder,
                note: file_name,
                last_updated: String::new(),
                created: String::new(),
                tags: Vec::new(),
                highlights: Vec::new(),
                score: hit.score,
            }
        }
        DocumentType::Note => {
            let file_name = hit.first(fields::FILE_NAME)?.to_string();
            SearchResult {
                kind,
                title: file_name.clone(),
                folder,
                note: file_name,
                last_updated: hit
                    .first(fields::LAST_UPDATED)
                    .unwrap_or_default()
                    .to_string(),
                created: hit
                    .first(fields::CREATED_DATE)
                    .unwrap_or_default()
                    .to_string(),
                tags: hit.all(fields::TAGS).to_vec(),
                highlights: highlights(hit),
                score: hit.score,
            }
        }
    };
    Some(result)
}

/// Shape every hit, silently dropping malformed ones.
pub fn format_hits(hits: &[RawHit]) -> Vec<SearchResult> {
    hits.iter().filter_map(format_hit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(pairs: &[(&str, &[&str])]) -> RawHit {
        let mut raw = RawHit {
            score: 1.0,
            ..Default::default()
        };
        for (field, values) in pairs {
            raw.fields.insert(
                field.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        raw
    }

    #[test]
    fn note_result_with_highlights() {
        let mut raw = hit(&[
            (fields::TYPE, &["note"]),
            (fields::FOLDER, &["work"]),
            (fields::FILE_NAME, &["plan.md"]),
            (fields::TAGS, &["a", "b"]),
            (fields::LAST_UPDATED, &["2024-05-01"]),
        ]);
        raw.fragments.insert(
            fields::TEXT_CONTENT.into(),
            vec!["the <mark>plan</mark> is <mark>set</mark>".into(), "no marks".into()],
        );
        raw.fragments.insert(
            fields::TEXT_CONTENT_NGRAM.into(),
            vec!["the <mark>plan</mark> is <mark>set</mark>".into()],
        );
        raw.fragments.insert(
            fields::CODE_CONTENT.into(),
            vec!["<mark>let x = 1;</mark>".into()],
        );

        let result = format_hit(&raw).unwrap();
        assert_eq!(result.kind, DocumentType::Note);
        assert_eq!(result.title, "plan.md");
        assert_eq!(result.path(), "work/plan.md");
        assert_eq!(result.tags, vec!["a", "b"]);
        assert_eq!(result.last_updated, "2024-05-01");
        assert_eq!(result.created, "");
        assert_eq!(
            result.highlights,
            vec![
                Highlight {
                    content: "the <mark>plan</mark> is <mark>set</mark>".into(),
                    is_code: false,
                    highlighted_term: "plan".into(),
                },
                Highlight {
                    content: "<mark>let x = 1;</mark>".into(),
                    is_code: true,
                    highlighted_term: "let x = 1;".into(),
                },
            ]
        );
    }

    #[test]
    fn ngram_fragments_yield_to_prose_matches() {
        let mut raw = hit(&[
            (fields::TYPE, &["note"]),
            (fields::FOLDER, &["work"]),
            (fields::FILE_NAME, &["i18n.md"]),
        ]);
        raw.fragments.insert(
            fields::TEXT_CONTENT.into(),
            vec!["<mark>internationalization</mark> notes".into()],
        );
        raw.fragments.insert(
            fields::TEXT_CONTENT_NGRAM.into(),
            vec!["<mark>internatio</mark>nalization notes".into()],
        );
        let terms: Vec<String> = format_hit(&raw)
            .unwrap()
            .highlights
            .into_iter()
            .map(|h| h.highlighted_term)
            .collect();
        assert_eq!(terms, vec!["internationalization"]);

        raw.fragments.remove(fields::TEXT_CONTENT);
        let terms: Vec<String> = format_hit(&raw)
            .unwrap()
            .highlights
            .into_iter()
            .map(|h| h.highlighted_term)
            .collect();
        assert_eq!(terms, vec!["internatio"]);
    }

    #[test]
    fn folder_and_attachment_shapes() {
        let folder = format_hit(&hit(&[
            (fields::TYPE, &["folder"]),
            (fields::FOLDER, &["work"]),
        ]))
        .unwrap();
        assert_eq!(folder.title, "work");
        assert_eq!(folder.note, "");
        assert_eq!(folder.path(), "work");

        let attachment = format_hit(&hit(&[
            (fields::TYPE, &["attachment"]),
            (fields::FOLDER, &["work"]),
            (fields::FILE_NAME, &["chart.png"]),
            (fields::TAGS, &["ignored"]),
        ]))
        .unwrap();
        assert_eq!(attachment.kind, DocumentType::Attachment);
        assert!(attachment.tags.is_empty());
    }

    #[test]
    fn malformed_hits_are_skipped() {
        let hits = vec![
            hit(&[(fields::TYPE, &["note"]), (fields::FOLDER, &["work"])]),
            hit(&[(fields::FOLDER, &["no-type"])]),
            hit(&[(fields::TYPE, &["folder"]), (fields::FOLDER, &["ok"])]),
        ];
        let results = format_hits(&hits);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].folder, "ok");
    }

    #[test]
    fn serializes_camel_case() {
        let result = format_hit(&hit(&[
            (fields::TYPE, &["folder"]),
            (fields::FOLDER, &["work"]),
        ]))
        .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "folder");
        assert!(json.get("lastUpdated").is_some());
    }
}
