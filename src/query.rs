use tantivy::{
    Term,
    query::{
        BooleanQuery,
        BoostQuery,
        EmptyQuery,
        Occur,
        PhraseQuery,
        Query,
        RegexQuery,
        TermQuery,
    },
    schema::{Field, IndexRecordOption},
    tokenizer::TokenStream,
};
use tracing::debug;

use crate::schema::{DocumentType, SchemaFields};
use crate::tantivy_index::SearchIndex;
use crate::tokens::{Operator, SearchToken, normalize_quotes, tokenize};

const EXACT_BOOST: f32 = 2.0;
const NGRAM_BOOST: f32 = 1.0;

const FILENAME_PREFIXES: [&str; 2] = ["file:", "f:"];
const TYPE_PREFIXES: [&str; 2] = ["type:", "t:"];
const TAG_PREFIX: char = '#';

/// What a single token asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind<'a> {
    Filename(String),
    Type(String),
    Tag(&'a str),
    Exact(&'a str),
    Fuzzy(&'a str),
}

fn strip_any<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| text.strip_prefix(p))
}

/// Classify a token by its prefix. Prefixes win over quoting.
pub fn classify(token: &SearchToken) -> TokenKind<'_> {
    let text = token.text.as_str();
    if let Some(name) = strip_any(text, &FILENAME_PREFIXES) {
        let name = name.trim_matches('"').trim().to_lowercase();
        return TokenKind::Filename(name);
    }
    if let Some(kind) = strip_any(text, &TYPE_PREFIXES) {
        return TokenKind::Type(kind.trim_matches('"').trim().to_lowercase());
    }
    if let Some(tag) = text.strip_prefix(TAG_PREFIX) {
        return TokenKind::Tag(tag);
    }
    if token.is_exact {
        TokenKind::Exact(text)
    } else {
        TokenKind::Fuzzy(text)
    }
}

/// Compiles search box input into a tantivy query.
///
/// Compilation never fails: a token that cannot be turned into a query
/// matches nothing, and input without tokens matches nothing.
pub struct QueryCompiler<'a> {
    index: &'a SearchIndex,
    fields: SchemaFields,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(index: &'a SearchIndex) -> Self {
        Self {
            index,
            fields: index.fields(),
        }
    }

    pub fn compile(&self, input: &str) -> Box<dyn Query> {
        let tokens = tokenize(&normalize_quotes(input));
        let Some((first, rest)) = tokens.split_first() else {
            return Box::new(EmptyQuery);
        };

        let mut query = self.token_query(first);
        let mut operator = first.operator;
        for token in rest {
            let next = self.token_query(token);
            let occur = match operator {
                Operator::Or => Occur::Should,
                Operator::And => Occur::Must,
            };
            let clauses = vec![(occur, query), (occur, next)];
            query = Box::new(BooleanQuery::new(clauses));
            operator = token.operator;
        }
        query
    }

    fn token_query(&self, token: &SearchToken) -> Box<dyn Query> {
        match classify(token) {
            TokenKind::Filename(name) => self.filename_query(&name),
            TokenKind::Type(kind) => self.type_query(&kind),
            TokenKind::Tag(tag) => self.prefix_query(self.fields.tags, tag),
            TokenKind::Exact(text) => self.exact_query(text),
            TokenKind::Fuzzy(text) => self.fuzzy_query(text),
        }
    }

    /// `f:` lookups. `folder/file` requires both prefixes. With only one
    /// part present (`work`, `work/`, `/work`) it matches either a folder
    /// or a file. An empty name matches every folder document.
    fn filename_query(&self, name: &str) -> Box<dyn Query> {
        if name.is_empty() {
            return self.type_query(DocumentType::Folder.as_str());
        }

        let folder = |p: &str| self.prefix_query(self.fields.folder_lc, p);
        let file = |p: &str| self.prefix_query(self.fields.file_name_lc, p);

        match name.split_once('/') {
            Some((dir, base)) if !dir.is_empty() && !base.is_empty() => {
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, folder(dir)),
                    (Occur::Must, file(base)),
                ]))
            }
            _ => {
                let part = name.trim_matches('/');
                if part.is_empty() {
                    return self.type_query(DocumentType::Folder.as_str());
                }
                Box::new(BooleanQuery::new(vec![
                    (Occur::Should, folder(part)),
                    (Occur::Should, file(part)),
                ]))
            }
        }
    }

    fn type_query(&self, kind: &str) -> Box<dyn Query> {
        Box::new(TermQuery::new(
            Term::from_field_text(self.fields.doc_type, kind),
            IndexRecordOption::Basic,
        ))
    }

    fn prefix_query(&self, field: Field, prefix: &str) -> Box<dyn Query> {
        let pattern = format!("{}.*", regex::escape(prefix));
        match RegexQuery::from_pattern(&pattern, field) {
            Ok(query) => Box::new(query),
            Err(e) => {
                debug!(pattern, error = %e, "unusable prefix pattern");
                Box::new(EmptyQuery)
            }
        }
    }

    /// Quoted tokens: a phrase in the prose, or a whole code block.
    fn exact_query(&self, text: &str) -> Box<dyn Query> {
        let prose = self.phrase_query(self.fields.text_content, text);
        let code: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(self.fields.code_content, text),
            IndexRecordOption::Basic,
        ));
        Box::new(BooleanQuery::new(vec![
            (Occur::Should, prose),
            (Occur::Should, code),
        ]))
    }

    /// Unquoted tokens: whole-word matches outrank word-prefix matches.
    fn fuzzy_query(&self, text: &str) -> Box<dyn Query> {
        let words: Box<dyn Query> = Box::new(BoostQuery::new(
            self.match_query(self.fields.text_content, text),
            EXACT_BOOST,
        ));
        let grams: Box<dyn Query> = Box::new(BoostQuery::new(
            self.match_query(self.fields.text_content_ngram, text),
            NGRAM_BOOST,
        ));
        Box::new(BooleanQuery::new(vec![
            (Occur::Should, words),
            (Occur::Should, grams),
        ]))
    }

    fn analyze(&self, field: Field, text: &str) -> Vec<Term> {
        let mut analyzer = match self.index.analyzer_for(field) {
            Ok(analyzer) => analyzer,
            Err(e) => {
                debug!(error = %e, "no analyzer for field");
                return Vec::new();
            }
        };

        let mut terms = Vec::new();
        let mut stream = analyzer.token_stream(text);
        stream.process(&mut |token| {
            terms.push(Term::from_field_text(field, &token.text));
        });
        terms
    }

    /// Any of the analyzed terms of `text`.
    fn match_query(&self, field: Field, text: &str) -> Box<dyn Query> {
        let terms = self.analyze(field, text);
        if terms.is_empty() {
            return Box::new(EmptyQuery);
        }
        Box::new(BooleanQuery::new(
            terms
                .into_iter()
                .map(|term| {
                    let query: Box<dyn Query> = Box::new(TermQuery::new(
                        term,
                        IndexRecordOption::WithFreqs,
                    ));
                    (Occur::Should, query)
                })
                .collect(),
        ))
    }

    /// All analyzed terms of `text`, adjacent and in order.
    fn phrase_query(&self, field: Field, text: &str) -> Box<dyn Query> {
        let mut terms = self.analyze(field, text);
        match terms.len() {
            0 => Box::new(EmptyQuery),
            1 => Box::new(TermQuery::new(
                terms.remove(0),
                IndexRecordOption::WithFreqs,
            )),
            _ => Box::new(PhraseQuery::new(terms)),
        }
    }
}

/// Compile `input` against `index`.
pub fn build_query(index: &SearchIndex, input: &str) -> Box<dyn Query> {
    QueryCompiler::new(index).compile(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        AttachmentDocument,
        FolderDocument,
        IndexDocument,
        NoteDocument,
    };
    use crate::tantivy_index::RawHit;

    fn fixture() -> SearchIndex {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut batch = idx.new_batch();
        let docs = [
            IndexDocument::Folder(FolderDocument::new("Recipes")),
            IndexDocument::Folder(FolderDocument::new("work")),
            IndexDocument::Note(NoteDocument::from_markdown(
                "---\ntags: [Cooking, cook-book]\n---\nBest pancake recipe with syrup",
                "Recipes",
                "Pancakes.md",
            )),
            IndexDocument::Note(NoteDocument::from_markdown(
                "---\ntags: [meeting]\n---\nWeekly sync notes\n\n```python\nprint('x')\n```",
                "work",
                "README.md",
            )),
            IndexDocument::Attachment(AttachmentDocument::new("work", "Bob's chart.png")),
        ];
        for doc in docs {
            batch.index(doc.key(), doc);
        }
        idx.commit(&mut batch).unwrap();
        idx
    }

    fn ids(idx: &SearchIndex, input: &str) -> Vec<String> {
        let query = build_query(idx, input);
        let hits: Vec<RawHit> = idx.search(query.as_ref(), 50, &[]).unwrap();
        let mut ids: Vec<String> = hits
            .iter()
            .filter_map(|h| h.first(crate::schema::fields::ID).map(str::to_string))
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn classify_prefixes() {
        let tokens = tokenize(r#"f:Read file:"x" t:Note #tag "exact" plain"#);
        let kinds: Vec<_> = tokens.iter().map(classify).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Filename("read".into()),
                TokenKind::Filename("x".into()),
                TokenKind::Type("note".into()),
                TokenKind::Tag("tag"),
                TokenKind::Exact("exact"),
                TokenKind::Fuzzy("plain"),
            ]
        );
    }

    #[test]
    fn no_tokens_match_nothing() {
        let idx = fixture();
        assert!(ids(&idx, "").is_empty());
        assert!(ids(&idx, r#""unclosed"#).is_empty());
    }

    #[test]
    fn fuzzy_matches_words_and_prefixes() {
        let idx = fixture();
        assert_eq!(ids(&idx, "pancake"), vec!["Recipes/Pancakes.md"]);
        assert_eq!(ids(&idx, "pan"), vec!["Recipes/Pancakes.md"]);
        assert_eq!(ids(&idx, "WEEKLY"), vec!["work/README.md"]);
        assert!(ids(&idx, "zzz").is_empty());
    }

    #[test]
    fn exact_requires_adjacent_words() {
        let idx = fixture();
        assert_eq!(ids(&idx, r#""pancake recipe""#), vec!["Recipes/Pancakes.md"]);
        assert!(ids(&idx, r#""recipe pancake""#).is_empty());
        assert_eq!(ids(&idx, r#""print('x')""#), vec!["work/README.md"]);
    }

    #[test]
    fn boolean_operators_fold_left() {
        let idx = fixture();
        assert_eq!(
            ids(&idx, "pancake OR weekly"),
            vec!["Recipes/Pancakes.md", "work/README.md"]
        );
        assert!(ids(&idx, "pancake weekly").is_empty());
        assert!(ids(&idx, "pancake AND weekly").is_empty());
        assert_eq!(ids(&idx, "pancake OR weekly AND sync"), vec!["work/README.md"]);
    }

    #[test]
    fn filename_lookups() {
        let idx = fixture();
        assert_eq!(ids(&idx, "f:pan"), vec!["Recipes/Pancakes.md"]);
        assert_eq!(
            ids(&idx, "f:rec"),
            vec!["Recipes", "Recipes/Pancakes.md"]
        );
        assert_eq!(ids(&idx, "file:work/read"), vec!["work/README.md"]);
        assert!(ids(&idx, "f:work/pan").is_empty());
        assert_eq!(ids(&idx, "f:bob's"), vec!["work/Bob's chart.png"]);
        assert_eq!(ids(&idx, "f:"), vec!["Recipes", "work"]);
    }

    #[test]
    fn filename_with_one_part_matches_folder_or_file() {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut batch = idx.new_batch();
        let docs = [
            IndexDocument::Folder(FolderDocument::new("work")),
            IndexDocument::Folder(FolderDocument::new("x")),
            IndexDocument::Attachment(AttachmentDocument::new("x", "workplan.png")),
        ];
        for doc in docs {
            batch.index(doc.key(), doc);
        }
        idx.commit(&mut batch).unwrap();

        let both = vec!["work", "x/workplan.png"];
        assert_eq!(ids(&idx, "f:work"), both);
        assert_eq!(ids(&idx, "f:work/"), both);
        assert_eq!(ids(&idx, "f:/work"), both);
        assert_eq!(ids(&idx, "f:/"), vec!["work", "x"]);
    }

    #[test]
    fn tag_lookups_are_case_sensitive_prefixes() {
        let idx = fixture();
        assert_eq!(ids(&idx, "#Cook"), vec!["Recipes/Pancakes.md"]);
        assert_eq!(ids(&idx, "#cook-"), vec!["Recipes/Pancakes.md"]);
        assert!(ids(&idx, "#cooking").is_empty());
        assert_eq!(ids(&idx, "#meet"), vec!["work/README.md"]);
    }

    #[test]
    fn type_filter() {
        let idx = fixture();
        assert_eq!(ids(&idx, "t:attachment"), vec!["work/Bob's chart.png"]);
        assert_eq!(ids(&idx, "type:folder"), vec!["Recipes", "work"]);
        assert_eq!(ids(&idx, "t:note f:work"), vec!["work/README.md"]);
        assert!(ids(&idx, "t:unknown").is_empty());
    }
}
