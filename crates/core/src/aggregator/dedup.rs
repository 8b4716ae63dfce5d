//! Deduplication of provider results.

use std::collections::HashMap;

use crate::provider::release::normalize_title;
use crate::provider::SearchResult;

/// Identity of a result across providers.
///
/// Season and episode are part of the key so that the synthetic results
/// expanded from one range release do not collapse into each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    title: String,
    year: Option<u16>,
    quality: String,
    season: Option<u32>,
    episode: Option<u32>,
}

impl DedupKey {
    pub fn of(result: &SearchResult) -> Self {
        Self {
            title: normalize_title(&result.title),
            year: result.year,
            quality: result.quality.trim().to_lowercase(),
            season: result.season,
            episode: result.episode,
        }
    }
}

/// Whether `candidate` should replace `existing` under the same key.
///
/// A direct fetch path beats an indirect one; otherwise more seeders win
/// (absent counts as -1). Ties keep the existing result.
fn replaces(existing: &SearchResult, candidate: &SearchResult) -> bool {
    match (existing.is_direct(), candidate.is_direct()) {
        (false, true) => true,
        (true, false) => false,
        _ => candidate.seeder_score() > existing.seeder_score(),
    }
}

/// Collapse results sharing a `DedupKey`, keeping first-seen order of keys.
pub fn deduplicate(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut index: HashMap<DedupKey, usize> = HashMap::new();
    let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());

    for result in results {
        let key = DedupKey::of(&result);
        match index.get(&key) {
            Some(&i) => {
                if replaces(&kept[i], &result) {
                    kept[i] = result;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(result);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(title: &str, provider: &str, fetch_ref: &str, seeders: Option<u32>) -> SearchResult {
        let mut r = SearchResult::new(title, provider, fetch_ref);
        r.year = Some(2010);
        r.quality = "1080p".to_string();
        r.seeders = seeders;
        r
    }

    #[test]
    fn test_direct_beats_indirect_regardless_of_seeders() {
        let indirect = make("Inception", "a", "https://site/page/1", Some(50));
        let direct = make("Inception", "b", "https://site/f.torrent", Some(5));

        let out = deduplicate(vec![indirect, direct]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].provider, "b");
        assert_eq!(out[0].seeders, Some(5));
    }

    #[test]
    fn test_indirect_never_replaces_direct() {
        let direct = make("Inception", "a", "magnet:?xt=1", Some(1));
        let indirect = make("Inception", "b", "https://site/page", Some(900));

        let out = deduplicate(vec![direct, indirect]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].provider, "a");
    }

    #[test]
    fn test_same_kind_keeps_higher_seeders() {
        let low = make("Inception", "a", "magnet:?xt=1", Some(10));
        let high = make("INCEPTION!", "b", "magnet:?xt=2", Some(20));
        let unknown = make("inception", "c", "magnet:?xt=3", None);

        let out = deduplicate(vec![low, high, unknown]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].provider, "b");
    }

    #[test]
    fn test_tie_keeps_first() {
        let first = make("Inception", "a", "magnet:?xt=1", Some(10));
        let second = make("Inception", "b", "magnet:?xt=2", Some(10));

        let out = deduplicate(vec![first, second]);
        assert_eq!(out[0].provider, "a");
    }

    #[test]
    fn test_distinct_keys_survive() {
        let a = make("Inception", "a", "magnet:?xt=1", Some(10));
        let mut b = make("Inception", "a", "magnet:?xt=2", Some(10));
        b.quality = "720p".to_string();
        let mut c = make("Inception", "a", "magnet:?xt=3", Some(10));
        c.year = None;

        let out = deduplicate(vec![a, b, c]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_episodes_do_not_collapse() {
        let mut e3 = make("Show S01E03-E05", "a", "magnet:?xt=1", Some(10));
        e3.season = Some(1);
        e3.episode = Some(3);
        let mut e4 = e3.clone();
        e4.episode = Some(4);

        let out = deduplicate(vec![e3, e4]);
        assert_eq!(out.len(), 2);
    }
}
