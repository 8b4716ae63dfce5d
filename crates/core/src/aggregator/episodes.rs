//! Episode-aware expansion of serial releases.

use crate::provider::release::{parse_episode_span, EpisodeSpan};
use crate::provider::SearchResult;

/// Longest range expanded into per-episode results.
const MAX_RANGE_LEN: u32 = 64;

/// Annotate serial results with their episode span.
///
/// Ranges become one synthetic result per episode sharing `fetch_ref`;
/// complete-season releases are flagged `season_pack`. Results for another
/// season than `season` (when given) are dropped.
pub fn expand_episodes(results: Vec<SearchResult>, season: Option<u32>) -> Vec<SearchResult> {
    let mut out = Vec::with_capacity(results.len());

    for mut result in results {
        let span = parse_episode_span(&result.title, season.or(result.season));
        if let (Some(span), Some(wanted)) = (span, season) {
            if span.season() != wanted {
                continue;
            }
        }

        match span {
            Some(EpisodeSpan::Single { season, episode }) => {
                result.season = Some(season);
                result.episode = Some(episode);
                result.season_pack = false;
                out.push(result);
            }
            Some(EpisodeSpan::Range {
                season,
                first,
                last,
            }) => {
                let last = last.min(first.saturating_add(MAX_RANGE_LEN - 1));
                for episode in first..=last {
                    let mut copy = result.clone();
                    copy.season = Some(season);
                    copy.episode = Some(episode);
                    copy.season_pack = false;
                    out.push(copy);
                }
            }
            Some(EpisodeSpan::SeasonPack { season }) => {
                result.season = Some(season);
                result.episode = None;
                result.season_pack = true;
                out.push(result);
            }
            None => out.push(result),
        }
    }

    out
}
