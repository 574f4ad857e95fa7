//! Catalog models for SQLite-backed storage.
//!
//! Entities are keyed by their Spotify base62 id; internal integer rowids
//! are used for joins but never leave the store layer.

use serde::Serialize;

/// Artist entity
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Empty until cover-art enrichment has run.
    pub cover_url: String,
}

/// Album entity
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub cover_url: String,
}

/// Track entity
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub name: String,
    /// None until enrichment resolves the track's album.
    pub album_id: Option<String>,
}

/// Row shape fed to the bulk listening-history insert: the track is already
/// resolved to its internal rowid, the timestamp is unix epoch milliseconds.
#[derive(Clone, Debug)]
pub struct ListeningEventRow {
    pub track_rowid: i64,
    pub played_at: i64,
    pub ms_played: i64,
}

// =============================================================================
// Statistics rows
// =============================================================================

/// One entry of a top-artists/albums/tracks ranking.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RankedEntry {
    pub id: String,
    pub name: String,
    pub total_ms_played: i64,
    pub play_count: i64,
}

/// Whole-history listening summary for one user.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ListeningSummary {
    pub total_ms_played: i64,
    pub total_mins_played: f64,
    pub total_hours_played: f64,
    pub total_tracks_played: i64,
    pub unique_tracks: i64,
    pub unique_artists: i64,
    pub unique_albums: i64,
    pub average_ms_played: f64,
    /// Unix epoch milliseconds; None when the user has no history.
    pub first_play: Option<i64>,
    pub last_play: Option<i64>,
}

/// Bucket granularity for listening-activity queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityGranularity {
    Yearly,
    Monthly,
    Daily,
}

impl ActivityGranularity {
    /// SQLite strftime pattern producing the bucket label.
    pub fn strftime_pattern(&self) -> &'static str {
        match self {
            ActivityGranularity::Yearly => "%Y",
            ActivityGranularity::Monthly => "%Y-%m",
            ActivityGranularity::Daily => "%Y-%m-%d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "yearly" => Some(ActivityGranularity::Yearly),
            "monthly" => Some(ActivityGranularity::Monthly),
            "daily" => Some(ActivityGranularity::Daily),
            _ => None,
        }
    }
}

/// One activity bucket (a year, month or day of listening).
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ActivityBucket {
    pub period: String,
    pub total_ms_played: i64,
    pub play_count: i64,
}
