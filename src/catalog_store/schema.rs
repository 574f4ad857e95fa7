//! SQLite schema for the catalog database.
//!
//! Spotify base62 ids are the natural keys; every bulk write relies on the
//! UNIQUE constraints below for idempotency (`INSERT OR IGNORE`).
//! Junction tables enforce pair uniqueness so duplicate relationship rows
//! are a no-op rather than an error.

pub const CATALOG_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS artists (
    rowid INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    cover_url TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_artists_id ON artists(id);
CREATE INDEX IF NOT EXISTS idx_artists_cover ON artists(cover_url);

CREATE TABLE IF NOT EXISTS albums (
    rowid INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    cover_url TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_albums_id ON albums(id);

CREATE TABLE IF NOT EXISTS tracks (
    rowid INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    album_rowid INTEGER REFERENCES albums(rowid)
);
CREATE INDEX IF NOT EXISTS idx_tracks_id ON tracks(id);
CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_rowid);

CREATE TABLE IF NOT EXISTS album_artists (
    album_rowid INTEGER NOT NULL REFERENCES albums(rowid),
    artist_rowid INTEGER NOT NULL REFERENCES artists(rowid),
    UNIQUE(album_rowid, artist_rowid)
);
CREATE INDEX IF NOT EXISTS idx_album_artists_album ON album_artists(album_rowid);
CREATE INDEX IF NOT EXISTS idx_album_artists_artist ON album_artists(artist_rowid);

CREATE TABLE IF NOT EXISTS track_artists (
    track_rowid INTEGER NOT NULL REFERENCES tracks(rowid),
    artist_rowid INTEGER NOT NULL REFERENCES artists(rowid),
    UNIQUE(track_rowid, artist_rowid)
);
CREATE INDEX IF NOT EXISTS idx_track_artists_track ON track_artists(track_rowid);
CREATE INDEX IF NOT EXISTS idx_track_artists_artist ON track_artists(artist_rowid);

CREATE TABLE IF NOT EXISTS listening_history (
    rowid INTEGER PRIMARY KEY,
    user_id TEXT NOT NULL,
    track_rowid INTEGER NOT NULL REFERENCES tracks(rowid),
    played_at INTEGER NOT NULL,
    ms_played INTEGER NOT NULL,
    UNIQUE(user_id, played_at)
);
CREATE INDEX IF NOT EXISTS idx_history_user ON listening_history(user_id);
CREATE INDEX IF NOT EXISTS idx_history_track ON listening_history(track_rowid);
"#;
