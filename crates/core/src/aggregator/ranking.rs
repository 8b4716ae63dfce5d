//! Size filtering and ranking of deduplicated results.

use std::cmp::Ordering;

use crate::provider::SearchResult;

/// Drop results whose known size exceeds `max_size_bytes`.
pub fn filter_by_size(results: Vec<SearchResult>, max_size_bytes: u64) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.size_bytes.map(|s| s <= max_size_bytes).unwrap_or(true))
        .collect()
}

/// Rank results in place.
///
/// Direct-fetch results come first by seeders descending, provider
/// priority breaking ties. The rest follow in provider-priority order, then
/// by seeders. The sort is stable, so equal results keep their input order.
pub fn rank<F>(results: &mut [SearchResult], priority_of: F)
where
    F: Fn(&str) -> u32,
{
    results.sort_by(|a, b| compare(a, b, &priority_of));
}

fn compare<F>(a: &SearchResult, b: &SearchResult, priority_of: &F) -> Ordering
where
    F: Fn(&str) -> u32,
{
    match (a.is_direct(), b.is_direct()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => b
            .seeder_score()
            .cmp(&a.seeder_score())
            .then_with(|| priority_of(&a.provider).cmp(&priority_of(&b.provider))),
        (false, false) => priority_of(&a.provider)
            .cmp(&priority_of(&b.provider))
            .then_with(|| b.seeder_score().cmp(&a.seeder_score())),
    }
}
