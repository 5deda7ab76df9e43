//! Data models for the Spotify Web API and the aggregated snapshot
//!
//! Two families of types live here:
//! - the public domain shapes served on `/api` ([`Track`], [`Artist`],
//!   [`CurrentlyPlaying`], [`TopArtists`], [`TopTracks`], [`RecentlyPlayed`],
//!   [`Snapshot`]),
//! - the crate-private wire shapes decoded from Spotify responses, which only
//!   keep the fields the domain needs.

use crate::error::SpotifyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Request parameters
// ============================================================================

/// Time window over which Spotify computes top artists and tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Roughly the last 4 weeks
    #[default]
    ShortTerm,
    /// Roughly the last 6 months
    MediumTerm,
    /// Several years of history
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::ShortTerm => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = SpotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short_term" => Ok(TimeRange::ShortTerm),
            "medium_term" => Ok(TimeRange::MediumTerm),
            "long_term" => Ok(TimeRange::LongTerm),
            other => Err(SpotifyError::configuration(format!(
                "invalid time_range '{}', expected short_term, medium_term or long_term",
                other
            ))),
        }
    }
}

/// Number of items requested per list, always within `1..=50`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Limit(u8);

impl Limit {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 50;
    pub const DEFAULT: Limit = Limit(5);

    /// Clamps any integer into the accepted range
    pub fn clamped(value: i64) -> Self {
        Limit(value.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Domain shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    pub spotify_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub artists: Vec<Artist>,
    pub spotify_url: Option<String>,
}

/// Playback state; `track` is `None` when Spotify reports no item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentlyPlaying {
    pub progress_ms: u64,
    pub track: Option<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopArtists {
    pub artists: Vec<Artist>,
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTracks {
    pub tracks: Vec<Track>,
    pub time_range: TimeRange,
}

/// Most recent first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentlyPlayed {
    pub tracks: Vec<Track>,
}

/// Result of one aggregation pass
///
/// Each field is independently nullable. Fields serialize in declaration
/// order, so two equal snapshots always produce identical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub top_artists: Option<TopArtists>,
    pub top_tracks: Option<TopTracks>,
    pub currently_playing: Option<CurrentlyPlaying>,
    pub recently_played: Option<RecentlyPlayed>,
    #[serde(skip)]
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Number of populated fields
    pub fn populated(&self) -> usize {
        [
            self.top_artists.is_some(),
            self.top_tracks.is_some(),
            self.currently_playing.is_some(),
            self.recently_played.is_some(),
        ]
        .into_iter()
        .filter(|p| *p)
        .count()
    }
}

// ============================================================================
// Wire shapes (Spotify Web API)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct SpotifyArtist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub external_urls: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpotifyTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub external_urls: Option<HashMap<String, String>>,
}

/// Paging object wrapping every list endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct SpotifyPaging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpotifyPlayHistory {
    pub track: SpotifyTrack,
    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpotifyCurrentlyPlaying {
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<SpotifyTrack>,
}

fn spotify_url(urls: Option<HashMap<String, String>>) -> Option<String> {
    urls.and_then(|mut urls| urls.remove("spotify"))
        .filter(|url| !url.is_empty())
}

impl From<SpotifyArtist> for Artist {
    fn from(artist: SpotifyArtist) -> Self {
        Artist {
            name: artist.name,
            spotify_url: spotify_url(artist.external_urls),
        }
    }
}

impl From<SpotifyTrack> for Track {
    fn from(track: SpotifyTrack) -> Self {
        Track {
            name: track.name,
            artists: track.artists.into_iter().map(Artist::from).collect(),
            spotify_url: spotify_url(track.external_urls),
        }
    }
}

impl From<SpotifyCurrentlyPlaying> for CurrentlyPlaying {
    fn from(playing: SpotifyCurrentlyPlaying) -> Self {
        CurrentlyPlaying {
            progress_ms: playing.progress_ms.unwrap_or(0),
            track: playing.item.map(Track::from),
        }
    }
}
