use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::archive::index::MetadataIndex;
use crate::archive::ArticleId;

/// Outcome of validating a raw request list against the metadata index.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Valid, known, deduplicated article ids in first-seen request order.
    pub resolved: Vec<ArticleId>,
    /// Tokens that were not empty but did not name a known article.
    pub unrecognized: Vec<String>,
}

/// Validate `raw_tokens` against the index.
///
/// Tokens are trimmed; empty tokens are ignored without being reported.
/// Duplicates collapse before validation. When `known_results` is given
/// (append mode), ids already present there are removed from consideration
/// silently. Anything that fails to parse as an id, or parses but is absent
/// from the index, lands in `unrecognized`.
pub fn resolve(
    raw_tokens: &[String],
    index: &MetadataIndex,
    known_results: Option<&BTreeMap<ArticleId, String>>,
) -> Resolution {
    let mut seen_tokens = BTreeSet::new();
    let mut accepted = BTreeSet::new();
    let mut resolved = Vec::new();
    let mut unrecognized = Vec::new();

    for token in raw_tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !seen_tokens.insert(token.to_string()) {
            continue;
        }
        let Ok(id) = token.parse::<ArticleId>() else {
            unrecognized.push(token.to_string());
            continue;
        };
        if known_results.is_some_and(|known| known.contains_key(&id)) {
            continue;
        }
        if index.contains(id) {
            if accepted.insert(id) {
                resolved.push(id);
            }
        } else {
            unrecognized.push(token.to_string());
        }
    }

    Resolution {
        resolved,
        unrecognized,
    }
}

/// Presentation order for a review session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DisplayOrder {
    #[default]
    Chronological,
    Reverse,
}

/// Order article ids for presentation.
///
/// `Reverse` flips the publication-date key only; the start-page tie-break
/// stays ascending in both orders. The sort is stable, so full ties keep
/// their input order.
pub fn sort_for_display(
    ids: &[ArticleId],
    index: &MetadataIndex,
    order: DisplayOrder,
) -> Vec<ArticleId> {
    let mut keyed: Vec<(NaiveDate, u32, ArticleId)> = ids
        .iter()
        .filter_map(|id| {
            index
                .get(*id)
                .map(|record| (record.pub_date, record.start_page, *id))
        })
        .collect();

    match order {
        DisplayOrder::Chronological => keyed.sort_by_key(|(date, page, _)| (*date, *page)),
        DisplayOrder::Reverse => keyed.sort_by_key(|(date, page, _)| (Reverse(*date), *page)),
    }

    keyed.into_iter().map(|(_, _, id)| id).collect()
}
