use serde::Serialize;

use crate::{
    error::Result,
    query,
    results::{self, SearchResult},
    schema::fields,
    tantivy_index::SearchIndex,
};

/// Upper bound on distinct tags returned by [`list_tags`].
pub const TAG_LIMIT: usize = 1000;

/// A tag and the number of notes carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// Run a search-box query and shape the hits for display.
///
/// 1. Compile the query text
/// 2. Retrieve the top `limit` hits with highlight fragments
/// 3. Drop malformed hits and format the rest
pub fn execute_search(
    index: &SearchIndex,
    input: &str,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let query = query::build_query(index, input);
    let f = index.fields();
    let highlight = [f.text_content, f.text_content_ngram, f.code_content];

    let hits = index.search(query.as_ref(), limit, &highlight)?;
    tracing::debug!(query = input, hits = hits.len(), "search complete");

    Ok(results::format_hits(&hits))
}

/// Every distinct tag across live notes, most used first.
pub fn list_tags(index: &SearchIndex) -> Result<Vec<TagCount>> {
    let mut tags: Vec<TagCount> = index
        .facet_terms(fields::TAGS, TAG_LIMIT)?
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    Ok(tags)
}

/// Strip `<mark>` tags for plain terminal output.
fn plain(fragment: &str) -> String {
    fragment
        .replace("<mark>", "")
        .replace("</mark>", "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        println!(
            "{:>3}. [{:.3}] {} ({})",
            i + 1,
            r.score,
            r.path(),
            r.kind
        );
        if !r.tags.is_empty() {
            println!("     tags: {}", r.tags.join(", "));
        }
        for h in &r.highlights {
            let marker = if h.is_code { "code" } else { "text" };
            println!("     {marker}: {}", plain(&h.content).trim());
        }
    }
    println!("\n{} result(s)", results.len());
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [SearchResult],
}

/// Format results as JSON output.
pub fn format_json(results: &[SearchResult], query: &str) -> Result<()> {
    let output = SearchOutput {
        query,
        result_count: results.len(),
        results,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}
