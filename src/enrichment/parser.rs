//! Parsing of raw Spotify Web API payloads into normalized metadata.
//!
//! Pure transformations: no network, no persistence. Entities missing an
//! id or name are dropped by returning `None`.

use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedArtist {
    pub id: String,
    pub name: String,
    pub cover_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedAlbum {
    pub id: String,
    pub name: String,
    pub cover_url: String,
    pub artists: Vec<ParsedArtist>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTrack {
    pub id: String,
    pub name: String,
    pub album: Option<ParsedAlbum>,
    pub artists: Vec<ParsedArtist>,
}

pub fn parse_artist(data: &JsonValue) -> Option<ParsedArtist> {
    Some(ParsedArtist {
        id: data.get("id")?.as_str()?.to_string(),
        name: data.get("name")?.as_str()?.to_string(),
        cover_url: extract_cover_url(data),
    })
}

pub fn parse_album(data: &JsonValue) -> Option<ParsedAlbum> {
    Some(ParsedAlbum {
        id: data.get("id")?.as_str()?.to_string(),
        name: data.get("name")?.as_str()?.to_string(),
        cover_url: extract_cover_url(data),
        artists: parse_artist_list(data.get("artists")),
    })
}

pub fn parse_track(data: &JsonValue) -> Option<ParsedTrack> {
    Some(ParsedTrack {
        id: data.get("id")?.as_str()?.to_string(),
        name: data.get("name")?.as_str()?.to_string(),
        album: data.get("album").and_then(parse_album),
        artists: parse_artist_list(data.get("artists")),
    })
}

fn parse_artist_list(data: Option<&JsonValue>) -> Vec<ParsedArtist> {
    data.and_then(JsonValue::as_array)
        .map(|artists| artists.iter().filter_map(parse_artist).collect())
        .unwrap_or_default()
}

/// First image url if an `images` list is present and non-empty, else empty.
fn extract_cover_url(data: &JsonValue) -> String {
    data.get("images")
        .and_then(JsonValue::as_array)
        .and_then(|images| images.first())
        .and_then(|image| image.get("url"))
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string()
}
