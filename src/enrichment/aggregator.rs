//! Accumulation of parsed metadata across API-response batches.
//!
//! Entities are deduplicated by external id (last write wins within a run)
//! and relationship pairs are kept as sets, so feeding the same payload
//! twice flushes to the identical result. Unparsable entries are skipped.

use super::parser::{parse_artist, parse_track, ParsedArtist};
use crate::catalog_store::{
    AlbumArtistPair, AlbumUpsert, ArtistUpsert, EnrichmentData, TrackAlbumPair, TrackArtistPair,
};
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
pub struct MetadataAggregator {
    artists: HashMap<String, ArtistUpsert>,
    albums: HashMap<String, AlbumUpsert>,
    // keyed by track id: only the track → album link is recorded
    track_albums: HashMap<String, TrackAlbumPair>,
    album_artists: BTreeSet<AlbumArtistPair>,
    track_artists: BTreeSet<TrackArtistPair>,
}

impl MetadataAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one "get several tracks" response payload.
    pub fn add_tracks(&mut self, tracks: &[JsonValue]) {
        for track_data in tracks {
            self.add_track(track_data);
        }
    }

    fn add_track(&mut self, track_data: &JsonValue) {
        let track = match parse_track(track_data) {
            Some(track) => track,
            None => return,
        };

        if let Some(album) = &track.album {
            self.albums.insert(
                album.id.clone(),
                AlbumUpsert {
                    id: album.id.clone(),
                    name: album.name.clone(),
                    cover_url: album.cover_url.clone(),
                },
            );
            self.track_albums.insert(
                track.id.clone(),
                TrackAlbumPair {
                    track_id: track.id.clone(),
                    album_id: album.id.clone(),
                },
            );

            for artist in &album.artists {
                self.insert_artist(artist);
                self.album_artists.insert(AlbumArtistPair {
                    album_id: album.id.clone(),
                    artist_id: artist.id.clone(),
                });
            }
        }

        for artist in &track.artists {
            self.insert_artist(artist);
            self.track_artists.insert(TrackArtistPair {
                track_id: track.id.clone(),
                artist_id: artist.id.clone(),
            });
        }
    }

    /// Feed one "get several artists" response payload.
    pub fn add_artists(&mut self, artists: &[JsonValue]) {
        for artist_data in artists {
            if let Some(artist) = parse_artist(artist_data) {
                self.insert_artist(&artist);
            }
        }
    }

    fn insert_artist(&mut self, artist: &ParsedArtist) {
        self.artists.insert(
            artist.id.clone(),
            ArtistUpsert {
                id: artist.id.clone(),
                name: artist.name.clone(),
                cover_url: artist.cover_url.clone(),
            },
        );
    }

    /// Return everything accumulated so far as plain collections, ordered
    /// by external id for determinism. The aggregator is left empty.
    pub fn flush(&mut self) -> EnrichmentData {
        let mut artists: Vec<ArtistUpsert> = std::mem::take(&mut self.artists).into_values().collect();
        artists.sort_by(|a, b| a.id.cmp(&b.id));

        let mut albums: Vec<AlbumUpsert> = std::mem::take(&mut self.albums).into_values().collect();
        albums.sort_by(|a, b| a.id.cmp(&b.id));

        let mut track_albums: Vec<TrackAlbumPair> =
            std::mem::take(&mut self.track_albums).into_values().collect();
        track_albums.sort_by(|a, b| a.track_id.cmp(&b.track_id));

        EnrichmentData {
            artists,
            albums,
            track_albums,
            album_artists: std::mem::take(&mut self.album_artists).into_iter().collect(),
            track_artists: std::mem::take(&mut self.track_artists).into_iter().collect(),
        }
    }
}
