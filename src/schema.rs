use std::str::FromStr;

use tantivy::{
    Index,
    TantivyDocument,
    schema::*,
    tokenizer::{
        LowerCaser,
        RawTokenizer,
        SimpleTokenizer,
        TextAnalyzer,
        Token,
        TokenStream,
        Tokenizer,
    },
};

use crate::doc_key::DocumentKey;
use crate::error::Result;
use crate::markdown::{self, CodeLanguage};

/// Field names used in the schema.
pub mod fields {
    pub const ID: &str = "id";
    pub const TYPE: &str = "type";
    pub const FOLDER: &str = "folder";
    pub const FOLDER_LC: &str = "folder_lc";
    pub const FILE_NAME: &str = "file_name";
    pub const FILE_NAME_LC: &str = "file_name_lc";
    pub const FILE_EXTENSION: &str = "file_extension";
    pub const TEXT_CONTENT: &str = "text_content";
    pub const TEXT_CONTENT_NGRAM: &str = "text_content_ngram";
    pub const CODE_CONTENT: &str = "code_content";
    pub const GO_CODE_CONTENT: &str = "go_code_content";
    pub const JAVA_CODE_CONTENT: &str = "java_code_content";
    pub const PYTHON_CODE_CONTENT: &str = "python_code_content";
    pub const JAVASCRIPT_CODE_CONTENT: &str = "javascript_code_content";
    pub const HAS_DRAWING: &str = "has_drawing";
    pub const HAS_CODE: &str = "has_code";
    pub const HAS_GO_CODE: &str = "has_go_code";
    pub const HAS_JAVA_CODE: &str = "has_java_code";
    pub const HAS_PYTHON_CODE: &str = "has_python_code";
    pub const HAS_JAVASCRIPT_CODE: &str = "has_javascript_code";
    pub const TAGS: &str = "tags";
    pub const LAST_UPDATED: &str = "last_updated";
    pub const CREATED_DATE: &str = "created_date";
}

/// Analyzer names registered on every index.
pub mod analyzers {
    pub const SIMPLE: &str = "simple";
    pub const EDGE_NGRAM: &str = "edge_ngram";
    pub const FILENAME: &str = "filename";
    pub const KEYWORD: &str = "raw";
}

const NGRAM_MIN: usize = 3;
const NGRAM_MAX: usize = 10;

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFields {
    pub id: Field,
    pub doc_type: Field,
    pub folder: Field,
    pub folder_lc: Field,
    pub file_name: Field,
    pub file_name_lc: Field,
    pub file_extension: Field,
    pub text_content: Field,
    pub text_content_ngram: Field,
    pub code_content: Field,
    pub go_code_content: Field,
    pub java_code_content: Field,
    pub python_code_content: Field,
    pub javascript_code_content: Field,
    pub has_drawing: Field,
    pub has_code: Field,
    pub has_go_code: Field,
    pub has_java_code: Field,
    pub has_python_code: Field,
    pub has_javascript_code: Field,
    pub tags: Field,
    pub last_updated: Field,
    pub created_date: Field,
}

impl SchemaFields {
    /// Look every field up by name. Fails if the index on disk was built with
    /// a different schema.
    pub fn resolve(schema: &Schema) -> Result<Self> {
        let f = |name: &str| schema.get_field(name);
        Ok(Self {
            id: f(fields::ID)?,
            doc_type: f(fields::TYPE)?,
            folder: f(fields::FOLDER)?,
            folder_lc: f(fields::FOLDER_LC)?,
            file_name: f(fields::FILE_NAME)?,
            file_name_lc: f(fields::FILE_NAME_LC)?,
            file_extension: f(fields::FILE_EXTENSION)?,
            text_content: f(fields::TEXT_CONTENT)?,
            text_content_ngram: f(fields::TEXT_CONTENT_NGRAM)?,
            code_content: f(fields::CODE_CONTENT)?,
            go_code_content: f(fields::GO_CODE_CONTENT)?,
            java_code_content: f(fields::JAVA_CODE_CONTENT)?,
            python_code_content: f(fields::PYTHON_CODE_CONTENT)?,
            javascript_code_content: f(fields::JAVASCRIPT_CODE_CONTENT)?,
            has_drawing: f(fields::HAS_DRAWING)?,
            has_code: f(fields::HAS_CODE)?,
            has_go_code: f(fields::HAS_GO_CODE)?,
            has_java_code: f(fields::HAS_JAVA_CODE)?,
            has_python_code: f(fields::HAS_PYTHON_CODE)?,
            has_javascript_code: f(fields::HAS_JAVASCRIPT_CODE)?,
            tags: f(fields::TAGS)?,
            last_updated: f(fields::LAST_UPDATED)?,
            created_date: f(fields::CREATED_DATE)?,
        })
    }

    fn code_field(&self, language: CodeLanguage) -> Field {
        match language {
            CodeLanguage::Go => self.go_code_content,
            CodeLanguage::Java => self.java_code_content,
            CodeLanguage::Python => self.python_code_content,
            CodeLanguage::Javascript => self.javascript_code_content,
        }
    }

    fn has_code_field(&self, language: CodeLanguage) -> Field {
        match language {
            CodeLanguage::Go => self.has_go_code,
            CodeLanguage::Java => self.has_java_code,
            CodeLanguage::Python => self.has_python_code,
            CodeLanguage::Javascript => self.has_javascript_code,
        }
    }
}

fn analyzed_text(tokenizer: &str, stored: bool) -> TextOptions {
    let opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(tokenizer)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    if stored { opts.set_stored() } else { opts }
}

/// Build the schema shared by every document type. Fields a type does not
/// use are simply left empty on its documents.
pub fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::ID, STRING | STORED);
    builder.add_text_field(fields::TYPE, STRING | STORED);
    builder.add_text_field(fields::FOLDER, STRING | STORED);
    builder.add_text_field(
        fields::FOLDER_LC,
        analyzed_text(analyzers::FILENAME, false),
    );
    builder.add_text_field(fields::FILE_NAME, STRING | STORED);
    builder.add_text_field(
        fields::FILE_NAME_LC,
        analyzed_text(analyzers::FILENAME, false),
    );
    builder.add_text_field(fields::FILE_EXTENSION, STRING | STORED);

    builder.add_text_field(
        fields::TEXT_CONTENT,
        analyzed_text(analyzers::SIMPLE, true),
    );
    // Highlighting reads the stored prose, so the n-gram copy is index-only.
    builder.add_text_field(
        fields::TEXT_CONTENT_NGRAM,
        analyzed_text(analyzers::EDGE_NGRAM, false),
    );

    builder.add_text_field(fields::CODE_CONTENT, STRING | STORED);
    builder.add_text_field(fields::GO_CODE_CONTENT, STRING);
    builder.add_text_field(fields::JAVA_CODE_CONTENT, STRING);
    builder.add_text_field(fields::PYTHON_CODE_CONTENT, STRING);
    builder.add_text_field(fields::JAVASCRIPT_CODE_CONTENT, STRING);

    for flag in [
        fields::HAS_DRAWING,
        fields::HAS_CODE,
        fields::HAS_GO_CODE,
        fields::HAS_JAVA_CODE,
        fields::HAS_PYTHON_CODE,
        fields::HAS_JAVASCRIPT_CODE,
    ] {
        builder.add_bool_field(flag, INDEXED | STORED);
    }

    builder.add_text_field(fields::TAGS, STRING | STORED | FAST);
    builder.add_text_field(fields::LAST_UPDATED, STRING | STORED);
    builder.add_text_field(fields::CREATED_DATE, STRING | STORED);

    builder.build()
}

/// Register the custom analyzers. Must run on every open: tantivy persists
/// analyzer names in the schema, not the analyzers themselves.
pub fn register_tokenizers(index: &Index) {
    let simple = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(analyzers::SIMPLE, simple);

    let edge_ngram = TextAnalyzer::builder(EdgeNgramTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(analyzers::EDGE_NGRAM, edge_ngram);

    let filename = TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build();
    index.tokenizers().register(analyzers::FILENAME, filename);
}

/// Splits text into alphanumeric words and emits the leading 3 to 10
/// characters of each word as separate grams.
///
/// All grams of a word share the word's position, and their offsets span
/// from the start of the word to the end of the gram, so a highlighted gram
/// marks the matching prefix of the original word.
#[derive(Clone, Default)]
pub struct EdgeNgramTokenizer;

struct Gram {
    text: String,
    offset_from: usize,
    offset_to: usize,
    position: usize,
}

impl Tokenizer for EdgeNgramTokenizer {
    type TokenStream<'a> = EdgeNgramTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let mut grams = Vec::new();
        let mut position = 0;
        let mut chars = text.char_indices().peekable();

        while let Some(&(start, ch)) = chars.peek() {
            if !ch.is_alphanumeric() {
                chars.next();
                continue;
            }

            // Byte offsets of every character end within the word.
            let mut ends = Vec::new();
            while let Some(&(idx, c)) = chars.peek() {
                if !c.is_alphanumeric() {
                    break;
                }
                ends.push(idx + c.len_utf8());
                chars.next();
            }

            for len in NGRAM_MIN..=NGRAM_MAX.min(ends.len()) {
                let end = ends[len - 1];
                grams.push(Gram {
                    text: text[start..end].to_string(),
                    offset_from: start,
                    offset_to: end,
                    position,
                });
            }
            position += 1;
        }

        EdgeNgramTokenStream {
            grams,
            index: 0,
            token: Token::default(),
        }
    }
}

pub struct EdgeNgramTokenStream {
    grams: Vec<Gram>,
    index: usize,
    token: Token,
}

impl TokenStream for EdgeNgramTokenStream {
    fn advance(&mut self) -> bool {
        let Some(gram) = self.grams.get(self.index) else {
            return false;
        };
        self.token = Token {
            offset_from: gram.offset_from,
            offset_to: gram.offset_to,
            position: gram.position,
            text: gram.text.clone(),
            position_length: 1,
        };
        self.index += 1;
        true
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

/// Discriminator stored in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Note,
    Attachment,
    Folder,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Note => "note",
            DocumentType::Attachment => "attachment",
            DocumentType::Folder => "folder",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = std::convert::Infallible;

    /// Unknown type strings fall back to the note mapping.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "attachment" => DocumentType::Attachment,
            "folder" => DocumentType::Folder,
            _ => DocumentType::Note,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteDocument {
    pub folder: String,
    pub file_name: String,
    pub text_content: String,
    pub code_content: Vec<String>,
    /// Per-language code blocks, in `CodeLanguage::ALL` order.
    pub language_code: Vec<(CodeLanguage, Vec<String>)>,
    pub has_drawing: bool,
    pub tags: Vec<String>,
    pub last_updated: Option<String>,
    pub created_date: Option<String>,
}

impl NoteDocument {
    pub fn from_markdown(
        markdown: &str,
        folder: &str,
        file_name: &str,
    ) -> Self {
        let front = markdown::FrontMatter::parse(markdown);
        Self {
            folder: folder.to_string(),
            file_name: file_name.to_string(),
            text_content: markdown::prose_text(markdown),
            code_content: markdown::code_blocks(markdown),
            language_code: CodeLanguage::ALL
                .iter()
                .map(|&lang| (lang, markdown::code_blocks_for(markdown, lang)))
                .collect(),
            has_drawing: markdown::has_drawing(markdown),
            tags: front.as_ref().map(|f| f.tags()).unwrap_or_default(),
            last_updated: front.as_ref().and_then(|f| f.last_updated()),
            created_date: front.as_ref().and_then(|f| f.created_date()),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::file(&self.folder, &self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentDocument {
    pub folder: String,
    pub file_name: String,
    /// Extension including the leading dot, empty if the file has none.
    pub extension: String,
}

impl AttachmentDocument {
    pub fn new(folder: &str, file_name: &str) -> Self {
        Self {
            folder: folder.to_string(),
            file_name: file_name.to_string(),
            extension: file_extension(file_name),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::file(&self.folder, &self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDocument {
    pub folder: String,
}

impl FolderDocument {
    pub fn new(folder: &str) -> Self {
        Self {
            folder: folder.to_string(),
        }
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::folder(&self.folder)
    }
}

/// Any document that can be written to the index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexDocument {
    Note(NoteDocument),
    Attachment(AttachmentDocument),
    Folder(FolderDocument),
}

impl IndexDocument {
    pub fn doc_type(&self) -> DocumentType {
        match self {
            IndexDocument::Note(_) => DocumentType::Note,
            IndexDocument::Attachment(_) => DocumentType::Attachment,
            IndexDocument::Folder(_) => DocumentType::Folder,
        }
    }

    pub fn key(&self) -> DocumentKey {
        match self {
            IndexDocument::Note(d) => d.key(),
            IndexDocument::Attachment(d) => d.key(),
            IndexDocument::Folder(d) => d.key(),
        }
    }

    /// Convert into a tantivy document carrying the given key.
    pub fn to_tantivy(
        &self,
        key: &DocumentKey,
        f: &SchemaFields,
    ) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(f.id, key.as_str());
        doc.add_text(f.doc_type, self.doc_type().as_str());

        match self {
            IndexDocument::Note(note) => {
                add_file_fields(
                    &mut doc,
                    f,
                    &note.folder,
                    &note.file_name,
                    ".md",
                );
                doc.add_text(f.text_content, &note.text_content);
                doc.add_text(f.text_content_ngram, &note.text_content);
                for code in &note.code_content {
                    doc.add_text(f.code_content, code);
                }
                for (lang, blocks) in &note.language_code {
                    for code in blocks {
                        doc.add_text(f.code_field(*lang), code);
                    }
                    doc.add_bool(f.has_code_field(*lang), !blocks.is_empty());
                }
                doc.add_bool(f.has_drawing, note.has_drawing);
                doc.add_bool(f.has_code, !note.code_content.is_empty());
                for tag in &note.tags {
                    doc.add_text(f.tags, tag);
                }
                if let Some(last_updated) = &note.last_updated {
                    doc.add_text(f.last_updated, last_updated);
                }
                if let Some(created) = &note.created_date {
                    doc.add_text(f.created_date, created);
                }
            }
            IndexDocument::Attachment(att) => {
                add_file_fields(
                    &mut doc,
                    f,
                    &att.folder,
                    &att.file_name,
                    &att.extension,
                );
            }
            IndexDocument::Folder(folder) => {
                doc.add_text(f.folder, &folder.folder);
                doc.add_text(f.folder_lc, &folder.folder);
            }
        }

        doc
    }
}

fn add_file_fields(
    doc: &mut TantivyDocument,
    f: &SchemaFields,
    folder: &str,
    file_name: &str,
    extension: &str,
) {
    doc.add_text(f.folder, folder);
    doc.add_text(f.folder_lc, folder);
    doc.add_text(f.file_name, file_name);
    doc.add_text(f.file_name_lc, file_name);
    doc.add_text(f.file_extension, extension);
}

/// The extension of `file_name` including its dot, or an empty string.
pub fn file_extension(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => file_name[idx..].to_string(),
        _ => String::new(),
    }
}
