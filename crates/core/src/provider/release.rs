//! Release-title parsing: normalized titles, quality tags, years and
//! episode spans.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160|1080|720|576|480|360)[pi]\b").unwrap());
static UHD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(4k|uhd)\b").unwrap());
static CAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(cam|camrip|hdcam|hqcam)\b").unwrap());
static TELESYNC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(ts|telesync|hdts|tc|telecine)\b").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

static SXXEYY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bS(\d{1,2})\s*E(\d{1,3})(?:\s*-\s*(?:S\d{1,2})?E?(\d{1,3}))?\b").unwrap()
});
static NXNN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b").unwrap());
static E_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bE(\d{1,3})\s*-\s*E?(\d{1,3})\b").unwrap());
static SEASON_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bS(\d{1,2})\b").unwrap());
static SEASON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bseason\s*(\d{1,2})\b").unwrap());
static COMPLETE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bcomplete\b").unwrap());

/// Lowercase, replace anything that is not alphanumeric with a space, and
/// collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quality tag found in a release title, or an empty string.
pub fn parse_quality(title: &str) -> String {
    if let Some(caps) = RESOLUTION.captures(title) {
        return format!("{}p", &caps[1]);
    }
    if UHD.is_match(title) {
        return "2160p".to_string();
    }
    if CAM.is_match(title) {
        return "cam".to_string();
    }
    if TELESYNC.is_match(title) {
        return "ts".to_string();
    }
    String::new()
}

/// Vertical resolution a quality tag stands for.
///
/// Theater rips rank 0; an unknown tag has no rank and fails any floor.
pub fn quality_rank(quality: &str) -> Option<u32> {
    let q = quality.trim().to_lowercase();
    match q.as_str() {
        "4k" | "uhd" => Some(2160),
        "cam" | "ts" => Some(0),
        _ => q
            .strip_suffix('p')
            .or_else(|| q.strip_suffix('i'))
            .and_then(|n| n.parse().ok()),
    }
}

/// Whether `quality` is at or above `floor` (vertical lines).
pub fn meets_quality_floor(quality: &str, floor: u32) -> bool {
    quality_rank(quality).map(|r| r >= floor).unwrap_or(false)
}

/// Release year, taking the last plausible year in the title.
pub fn parse_year(title: &str) -> Option<u16> {
    YEAR.captures_iter(title)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Episode coverage of a serial release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpisodeSpan {
    Single { season: u32, episode: u32 },
    Range { season: u32, first: u32, last: u32 },
    SeasonPack { season: u32 },
}

impl EpisodeSpan {
    pub fn season(&self) -> u32 {
        match *self {
            EpisodeSpan::Single { season, .. }
            | EpisodeSpan::Range { season, .. }
            | EpisodeSpan::SeasonPack { season } => season,
        }
    }
}

/// Parse the episode span of a release title.
///
/// `default_season` fills in titles that only carry episode numbers
/// (`E03-E05`) or only say "complete".
pub fn parse_episode_span(title: &str, default_season: Option<u32>) -> Option<EpisodeSpan> {
    if let Some(caps) = SXXEYY.captures(title) {
        let season = caps[1].parse().ok()?;
        let first: u32 = caps[2].parse().ok()?;
        return Some(match caps.get(3).and_then(|m| m.as_str().parse::<u32>().ok()) {
            Some(last) if last > first => EpisodeSpan::Range {
                season,
                first,
                last,
            },
            _ => EpisodeSpan::Single {
                season,
                episode: first,
            },
        });
    }

    if let Some(caps) = NXNN.captures(title) {
        return Some(EpisodeSpan::Single {
            season: caps[1].parse().ok()?,
            episode: caps[2].parse().ok()?,
        });
    }

    if let (Some(caps), Some(season)) = (E_RANGE.captures(title), default_season) {
        let first: u32 = caps[1].parse().ok()?;
        let last: u32 = caps[2].parse().ok()?;
        if last > first {
            return Some(EpisodeSpan::Range {
                season,
                first,
                last,
            });
        }
    }

    if let Some(caps) = SEASON_TAG.captures(title).or_else(|| SEASON_WORD.captures(title)) {
        return Some(EpisodeSpan::SeasonPack {
            season: caps[1].parse().ok()?,
        });
    }

    match default_season {
        Some(season) if COMPLETE.is_match(title) => Some(EpisodeSpan::SeasonPack { season }),
        _ => None,
    }
}
