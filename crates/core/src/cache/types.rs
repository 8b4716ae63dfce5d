use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How a cached file was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Torrent,
    Streaming,
    TorrentFile,
    #[serde(other)]
    Unknown,
}

/// One resolved file.
///
/// Serialized with the persisted index field names (`file_id`,
/// `downloadedAt`, ...). Entries are replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "file_id", deserialize_with = "string_or_number")]
    pub file_ref: String,
    #[serde(
        rename = "message_id",
        default,
        deserialize_with = "opt_string_or_number"
    )]
    pub message_ref: Option<String>,
    #[serde(rename = "downloadedAt")]
    pub created_at: DateTime<Utc>,
    pub source_type: SourceType,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(rename = "file_size", default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub channel_id: Option<String>,
}

impl CacheEntry {
    pub fn new(file_ref: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            file_ref: file_ref.into(),
            message_ref: None,
            created_at: Utc::now(),
            source_type,
            source_url: None,
            file_size_bytes: None,
            channel_id: None,
        }
    }

    pub fn is_expired_at(&self, ttl: Option<chrono::Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => now - self.created_at >= ttl,
            None => false,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    /// Entries not yet expired.
    pub active: usize,
    pub expired: usize,
    pub total_size_bytes: u64,
    /// Resolutions currently in flight.
    pub in_flight: usize,
}

/// Normalized cache key for a request title.
pub fn cache_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Cache key for one episode of a serial title (`"<title> s01e05"`).
pub fn episode_key(title: &str, season: u32, episode: u32) -> String {
    format!("{} s{:02}e{:02}", cache_key(title), season, episode)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(v: StringOrNumber) -> Self {
        match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    StringOrNumber::deserialize(d).map(String::from)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Option::<StringOrNumber>::deserialize(d).map(|v| v.map(String::from))
}
