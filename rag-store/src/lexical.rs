//! Lexical scoring used by the keyword branch.
//!
//! The store's full-text index narrows the candidate set; the final keyword
//! ranking is computed here over every page scanned, so it does not depend on
//! scroll order.

use std::collections::BTreeSet;
use std::future::Future;

use tracing::trace;

use crate::record::StoreHit;

/// Function words that match almost every chunk and carry no topic.
const STOP_WORDS: &[&str] = &[
    "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how", "if",
    "in", "is", "it", "its", "of", "on", "or", "so", "that", "the", "then", "there", "this", "to",
    "was", "what", "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Lowercased query terms, deduplicated, at least two characters long.
///
/// Stop words are dropped unless the query consists of nothing else.
pub fn query_terms(query: &str) -> Vec<String> {
    let terms: BTreeSet<String> = query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect();

    let content: Vec<String> = terms
        .iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    if content.is_empty() {
        terms.into_iter().collect()
    } else {
        content
    }
}

/// Term-frequency score of `text` for `terms`.
///
/// Each term found contributes `1 + ln(tf)`; the sum is damped by document
/// length so that long chunks do not win on repetition alone. Zero when no
/// term occurs.
pub fn term_frequency_score(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let words: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return 0.0;
    }

    let mut score = 0.0f32;
    for term in terms {
        let tf = words.iter().filter(|w| *w == term).count();
        if tf > 0 {
            score += 1.0 + (tf as f32).ln();
        }
    }
    score / (1.0 + (words.len() as f32).ln()).sqrt()
}

/// One page of a keyword scan and the cursor of the page after it.
pub struct ScanPage<C> {
    pub hits: Vec<StoreHit>,
    pub next: Option<C>,
}

/// Scores every scanned hit with [`term_frequency_score`] and keeps the best
/// `fetch`, following `next_page` until the source is exhausted or at least
/// `max_scanned` hits were seen.
///
/// Ties are broken by chunk id.
///
/// # Errors
/// The first error returned by `next_page`.
pub async fn scan_ranked<C, E, F, Fut>(
    terms: &[String],
    fetch: usize,
    max_scanned: usize,
    mut next_page: F,
) -> Result<Vec<StoreHit>, E>
where
    F: FnMut(Option<C>) -> Fut,
    Fut: Future<Output = Result<ScanPage<C>, E>>,
{
    let mut kept: Vec<StoreHit> = Vec::new();
    let mut scanned = 0usize;
    let mut pages = 0usize;
    let mut cursor: Option<C> = None;

    loop {
        let page = next_page(cursor.take()).await?;
        pages += 1;
        let seen = page.hits.len();
        scanned += seen;

        kept.extend(page.hits.into_iter().filter_map(|mut h| {
            h.score = term_frequency_score(terms, &h.text);
            (h.score > 0.0).then_some(h)
        }));
        kept.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        kept.truncate(fetch);

        match page.next {
            Some(next) if seen > 0 && scanned < max_scanned => cursor = Some(next),
            _ => break,
        }
    }
    trace!("lexical::scan_ranked pages={pages} scanned={scanned} kept={}", kept.len());
    Ok(kept)
}
