//! Instant filename matching for the command palette.
//!
//! Two independent paths, neither touching the persistent index: a trigram
//! posting map built per session from the live corpus listing, and a
//! Jaro-Winkler scan over the same listing.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;

use crate::{error::Result, walker};

/// Minimum Jaro-Winkler similarity kept by [`search_by_similarity`].
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

const WINKLER_PREFIX_MAX: usize = 4;
const WINKLER_SCALING: f64 = 0.05;

/// Overlapping 3-character windows of `word`.
pub fn generate_trigrams(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .windows(3)
        .map(|window| window.iter().collect())
        .collect()
}

/// `folder/file` with the file extension removed.
fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrigramMatch {
    /// `folder/file` without the extension, original case.
    pub path: String,
    pub score: u32,
}

/// Trigram to path to occurrence count.
#[derive(Debug, Default)]
pub struct TrigramIndex {
    postings: HashMap<String, HashMap<String, u32>>,
}

impl TrigramIndex {
    /// Build from the live corpus under `notes_root`.
    pub fn build(notes_root: &Path) -> Result<Self> {
        let paths = walker::corpus_paths(notes_root)?;
        let index = Self::from_paths(paths);
        tracing::debug!(trigrams = index.len(), "built trigram index");
        Ok(index)
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for path in paths {
            let key = strip_extension(path.as_ref());
            for trigram in generate_trigrams(&key.to_lowercase()) {
                *index
                    .postings
                    .entry(trigram)
                    .or_default()
                    .entry(key.to_string())
                    .or_default() += 1;
            }
        }
        index
    }

    /// Number of distinct trigrams.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Paths for one trigram with their counts.
    pub fn postings(&self, trigram: &str) -> Option<&HashMap<String, u32>> {
        self.postings.get(trigram)
    }

    /// Rank paths by the summed counts of the query's trigrams, best first.
    /// Equal scores order by path.
    pub fn search(&self, query: &str) -> Vec<TrigramMatch> {
        let mut scores: HashMap<&str, u32> = HashMap::new();
        for trigram in generate_trigrams(&query.to_lowercase()) {
            let Some(files) = self.postings.get(&trigram) else {
                continue;
            };
            for (path, count) in files {
                *scores.entry(path.as_str()).or_default() += count;
            }
        }

        let mut matches: Vec<TrigramMatch> = scores
            .into_iter()
            .map(|(path, score)| TrigramMatch {
                path: path.to_string(),
                score,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path))
        });
        matches
    }
}

/// Jaro similarity of two strings, compared by character.
pub fn jaro_distance(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut a_matched = vec![false; a.len()];
    let mut b_matched = vec![false; b.len()];
    let mut matches = 0usize;

    for (i, ch) in a.iter().enumerate() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(b.len());
        for j in start..end {
            if b_matched[j] || b[j] != *ch {
                continue;
            }
            a_matched[i] = true;
            b_matched[j] = true;
            matches += 1;
            break;
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut transpositions = 0usize;
    let mut k = 0;
    for (i, ch) in a.iter().enumerate() {
        if !a_matched[i] {
            continue;
        }
        while !b_matched[k] {
            k += 1;
        }
        if *ch != b[k] {
            transpositions += 1;
        }
        k += 1;
    }
    let transpositions = transpositions / 2;

    let m = matches as f64;
    (m / a.len() as f64 + m / b.len() as f64 + (m - transpositions as f64) / m)
        / 3.0
}

/// Jaro similarity boosted by up to four shared leading characters.
pub fn jaro_winkler_similarity(s1: &str, s2: &str) -> f64 {
    let jaro = jaro_distance(s1, s2);
    let prefix = s1
        .chars()
        .zip(s2.chars())
        .take(WINKLER_PREFIX_MAX)
        .take_while(|(a, b)| a == b)
        .count();
    jaro + prefix as f64 * WINKLER_SCALING * (1.0 - jaro)
}

/// Corpus paths whose file name or folder name is at least
/// [`SIMILARITY_THRESHOLD`] similar to `query`, ranked by file name
/// similarity.
pub fn search_by_similarity(
    notes_root: &Path,
    query: &str,
) -> Result<Vec<String>> {
    let paths = walker::corpus_paths(notes_root)?;
    Ok(rank_by_similarity(&paths, query))
}

fn rank_by_similarity(paths: &[String], query: &str) -> Vec<String> {
    let query = query.to_lowercase();

    let mut scored: Vec<(f64, &String)> = paths
        .par_iter()
        .filter_map(|path| {
            let (folder, note) = path.split_once('/')?;
            let note_similarity =
                jaro_winkler_similarity(&query, &note.to_lowercase());
            let folder_similarity =
                jaro_winkler_similarity(&query, &folder.to_lowercase());
            (note_similarity >= SIMILARITY_THRESHOLD
                || folder_similarity >= SIMILARITY_THRESHOLD)
                .then_some((note_similarity, path))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, path)| path.clone()).collect()
}
