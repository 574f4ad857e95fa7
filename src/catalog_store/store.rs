//! SQLite-backed catalog store.
//!
//! Owns every write to the track/album/artist tables and the listening
//! history. All bulk operations are idempotent: existing ids are filtered
//! out before insert, and `INSERT OR IGNORE` against the unique natural
//! keys acts as a second safety net under concurrent or repeated calls.

use super::models::*;
use super::schema::CATALOG_SCHEMA_SQL;
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Maximum number of ids bound into a single `IN (...)` clause.
const ID_CHUNK_SIZE: usize = 500;

/// New artist row produced by enrichment (cover arrives in the backfill pass).
#[derive(Clone, Debug)]
pub struct ArtistUpsert {
    pub id: String,
    pub name: String,
    pub cover_url: String,
}

/// New album row produced by enrichment.
#[derive(Clone, Debug)]
pub struct AlbumUpsert {
    pub id: String,
    pub name: String,
    pub cover_url: String,
}

/// Track → album pointer resolved by enrichment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackAlbumPair {
    pub track_id: String,
    pub album_id: String,
}

/// Album ↔ artist relationship keyed by external ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlbumArtistPair {
    pub album_id: String,
    pub artist_id: String,
}

/// Track ↔ artist relationship keyed by external ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackArtistPair {
    pub track_id: String,
    pub artist_id: String,
}

/// Everything one enrichment run wants persisted, in plain collections.
#[derive(Clone, Debug, Default)]
pub struct EnrichmentData {
    pub artists: Vec<ArtistUpsert>,
    pub albums: Vec<AlbumUpsert>,
    pub track_albums: Vec<TrackAlbumPair>,
    pub album_artists: Vec<AlbumArtistPair>,
    pub track_artists: Vec<TrackArtistPair>,
}

impl EnrichmentData {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
            && self.albums.is_empty()
            && self.track_albums.is_empty()
            && self.album_artists.is_empty()
            && self.track_artists.is_empty()
    }
}

/// SQLite-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Open or create a catalog database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open catalog database: {:?}", path.as_ref()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Create an in-memory catalog database (used by tests).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(CATALOG_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // =========================================================================
    // Internal Helper Methods
    // =========================================================================

    /// Query which of `ids` already exist in `table` (chunked `IN` lookups).
    fn existing_ids(conn: &Connection, table: &str, ids: &[&str]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("SELECT id FROM {} WHERE id IN ({})", table, placeholders);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |r| r.get::<_, String>(0))?;
            for row in rows {
                found.insert(row?);
            }
        }
        Ok(found)
    }

    /// Resolve external ids to internal rowids for `table`. Unknown ids are
    /// simply absent from the returned map.
    fn rowid_map(conn: &Connection, table: &str, ids: &[&str]) -> Result<HashMap<String, i64>> {
        let mut map = HashMap::new();
        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT id, rowid FROM {} WHERE id IN ({})",
                table, placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (id, rowid) = row?;
                map.insert(id, rowid);
            }
        }
        Ok(map)
    }

    // =========================================================================
    // Ingestion-side Writes
    // =========================================================================

    /// Create track stubs (id + name) for ids not yet in the catalog.
    /// Returns the number of rows actually inserted.
    pub fn create_track_stubs(&self, stubs: &[(String, String)]) -> Result<usize> {
        if stubs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = {
            let ids: Vec<&str> = stubs.iter().map(|(id, _)| id.as_str()).collect();
            let existing = Self::existing_ids(&tx, "tracks", &ids)?;
            let mut stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO tracks (id, name) VALUES (?1, ?2)")?;
            let mut inserted = 0;
            for (id, name) in stubs {
                if existing.contains(id) {
                    continue;
                }
                inserted += stmt.execute(params![id, name])?;
            }
            inserted
        };
        tx.commit()?;
        if inserted > 0 {
            info!("Created {} new track stubs", inserted);
        }
        Ok(inserted)
    }

    /// Resolve track external ids to rowids.
    pub fn track_rowids(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let conn = self.conn.lock().unwrap();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        Self::rowid_map(&conn, "tracks", &refs)
    }

    /// Bulk-insert listening events for one user, ignoring conflicts on the
    /// (user, played_at) uniqueness. Re-inserting the same export is a no-op.
    /// Returns the number of events actually inserted.
    pub fn insert_listening_events(
        &self,
        user_id: &str,
        rows: &[ListeningEventRow],
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO listening_history (user_id, track_rowid, played_at, ms_played)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut inserted = 0;
            for row in rows {
                inserted +=
                    stmt.execute(params![user_id, row.track_rowid, row.played_at, row.ms_played])?;
            }
            inserted
        };
        tx.commit()?;
        info!("Inserted {} listening events", inserted);
        Ok(inserted)
    }

    // =========================================================================
    // Enrichment-side Writes
    // =========================================================================

    fn create_artists_tx(tx: &Transaction, artists: &[ArtistUpsert]) -> Result<usize> {
        let ids: Vec<&str> = artists.iter().map(|a| a.id.as_str()).collect();
        let existing = Self::existing_ids(tx, "artists", &ids)?;
        let mut stmt =
            tx.prepare_cached("INSERT OR IGNORE INTO artists (id, name) VALUES (?1, ?2)")?;
        let mut inserted = 0;
        for artist in artists {
            if existing.contains(&artist.id) {
                continue;
            }
            inserted += stmt.execute(params![artist.id, artist.name])?;
        }
        Ok(inserted)
    }

    fn create_albums_tx(tx: &Transaction, albums: &[AlbumUpsert]) -> Result<usize> {
        let ids: Vec<&str> = albums.iter().map(|a| a.id.as_str()).collect();
        let existing = Self::existing_ids(tx, "albums", &ids)?;
        let mut stmt = tx
            .prepare_cached("INSERT OR IGNORE INTO albums (id, name, cover_url) VALUES (?1, ?2, ?3)")?;
        let mut inserted = 0;
        for album in albums {
            if existing.contains(&album.id) {
                continue;
            }
            inserted += stmt.execute(params![album.id, album.name, album.cover_url])?;
        }
        Ok(inserted)
    }

    fn update_track_albums_tx(tx: &Transaction, pairs: &[TrackAlbumPair]) -> Result<usize> {
        let album_ids: Vec<&str> = pairs.iter().map(|p| p.album_id.as_str()).collect();
        let albums = Self::rowid_map(tx, "albums", &album_ids)?;
        let mut stmt =
            tx.prepare_cached("UPDATE tracks SET album_rowid = ?1 WHERE id = ?2")?;
        let mut updated = 0;
        for pair in pairs {
            // Skip pairs whose album never made it into the catalog.
            let album_rowid = match albums.get(&pair.album_id) {
                Some(rowid) => *rowid,
                None => continue,
            };
            updated += stmt.execute(params![album_rowid, pair.track_id])?;
        }
        Ok(updated)
    }

    fn link_album_artists_tx(tx: &Transaction, pairs: &[AlbumArtistPair]) -> Result<usize> {
        let album_ids: Vec<&str> = pairs.iter().map(|p| p.album_id.as_str()).collect();
        let artist_ids: Vec<&str> = pairs.iter().map(|p| p.artist_id.as_str()).collect();
        let albums = Self::rowid_map(tx, "albums", &album_ids)?;
        let artists = Self::rowid_map(tx, "artists", &artist_ids)?;
        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO album_artists (album_rowid, artist_rowid) VALUES (?1, ?2)",
        )?;
        let mut inserted = 0;
        for pair in pairs {
            // Either side missing from the resolved map: skip, never fail.
            let (album, artist) = match (albums.get(&pair.album_id), artists.get(&pair.artist_id)) {
                (Some(album), Some(artist)) => (*album, *artist),
                _ => continue,
            };
            inserted += stmt.execute(params![album, artist])?;
        }
        Ok(inserted)
    }

    fn link_track_artists_tx(tx: &Transaction, pairs: &[TrackArtistPair]) -> Result<usize> {
        let track_ids: Vec<&str> = pairs.iter().map(|p| p.track_id.as_str()).collect();
        let artist_ids: Vec<&str> = pairs.iter().map(|p| p.artist_id.as_str()).collect();
        let tracks = Self::rowid_map(tx, "tracks", &track_ids)?;
        let artists = Self::rowid_map(tx, "artists", &artist_ids)?;
        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO track_artists (track_rowid, artist_rowid) VALUES (?1, ?2)",
        )?;
        let mut inserted = 0;
        for pair in pairs {
            let (track, artist) = match (tracks.get(&pair.track_id), artists.get(&pair.artist_id)) {
                (Some(track), Some(artist)) => (*track, *artist),
                _ => continue,
            };
            inserted += stmt.execute(params![track, artist])?;
        }
        Ok(inserted)
    }

    /// Create artists not yet in the catalog.
    pub fn create_artists(&self, artists: &[ArtistUpsert]) -> Result<usize> {
        if artists.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = Self::create_artists_tx(&tx, artists)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Create albums not yet in the catalog.
    pub fn create_albums(&self, albums: &[AlbumUpsert]) -> Result<usize> {
        if albums.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = Self::create_albums_tx(&tx, albums)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Set cover urls on existing artists. Unknown ids are skipped.
    pub fn update_artist_covers(&self, artists: &[ArtistUpsert]) -> Result<usize> {
        if artists.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let updated = {
            let mut stmt =
                tx.prepare_cached("UPDATE artists SET cover_url = ?1 WHERE id = ?2")?;
            let mut updated = 0;
            for artist in artists {
                updated += stmt.execute(params![artist.cover_url, artist.id])?;
            }
            updated
        };
        tx.commit()?;
        if updated > 0 {
            info!("Updated covers for {} artists", updated);
        }
        Ok(updated)
    }

    /// Point tracks at their albums. Pairs with an unresolved album are skipped.
    pub fn update_track_albums(&self, pairs: &[TrackAlbumPair]) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let updated = Self::update_track_albums_tx(&tx, pairs)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Link albums to artists. Pairs with either side unresolved are skipped.
    pub fn link_album_artists(&self, pairs: &[AlbumArtistPair]) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = Self::link_album_artists_tx(&tx, pairs)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Link tracks to artists. Pairs with either side unresolved are skipped.
    pub fn link_track_artists(&self, pairs: &[TrackArtistPair]) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = Self::link_track_artists_tx(&tx, pairs)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Persist one enrichment run in a single transaction, with the stage
    /// ordering the relationship rows depend on: artists and albums must
    /// exist before anything links to them.
    pub fn save_enrichment(&self, data: &EnrichmentData) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let new_artists = Self::create_artists_tx(&tx, &data.artists)?;
        let new_albums = Self::create_albums_tx(&tx, &data.albums)?;
        let tracks_updated = Self::update_track_albums_tx(&tx, &data.track_albums)?;
        let album_links = Self::link_album_artists_tx(&tx, &data.album_artists)?;
        let track_links = Self::link_track_artists_tx(&tx, &data.track_artists)?;

        tx.commit().context("Failed to commit enrichment data")?;
        info!(
            "Saved enrichment: {} artists, {} albums, {} track albums, {} album links, {} track links",
            new_artists, new_albums, tracks_updated, album_links, track_links
        );
        Ok(())
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Ids of artists whose cover art has not been fetched yet.
    pub fn artists_missing_cover(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT id FROM artists WHERE cover_url = ''")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// All track external ids currently in the catalog.
    pub fn all_track_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT id FROM tracks")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT id, name, cover_url FROM artists WHERE id = ?1")?;
        let artist = stmt
            .query_row(params![id], |r| {
                Ok(Artist {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    cover_url: r.get(2)?,
                })
            })
            .optional()?;
        Ok(artist)
    }

    pub fn get_album(&self, id: &str) -> Result<Option<Album>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT id, name, cover_url FROM albums WHERE id = ?1")?;
        let album = stmt
            .query_row(params![id], |r| {
                Ok(Album {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    cover_url: r.get(2)?,
                })
            })
            .optional()?;
        Ok(album)
    }

    pub fn get_track(&self, id: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT t.id, t.name, a.id FROM tracks t
             LEFT JOIN albums a ON a.rowid = t.album_rowid
             WHERE t.id = ?1",
        )?;
        let track = stmt
            .query_row(params![id], |r| {
                Ok(Track {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    album_id: r.get(2)?,
                })
            })
            .optional()?;
        Ok(track)
    }

    fn count(&self, table: &str) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get::<_, i64>(0)
        })
        .unwrap_or(0) as usize
    }

    pub fn get_artists_count(&self) -> usize {
        self.count("artists")
    }

    pub fn get_albums_count(&self) -> usize {
        self.count("albums")
    }

    pub fn get_tracks_count(&self) -> usize {
        self.count("tracks")
    }

    pub fn get_history_count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM listening_history WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    // =========================================================================
    // Statistics Queries
    // =========================================================================

    /// Artists ranked by total listening time for one user.
    pub fn top_artists(&self, user_id: &str, limit: usize) -> Result<Vec<RankedEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT a.id, a.name, SUM(lh.ms_played), COUNT(lh.rowid)
             FROM listening_history lh
             JOIN track_artists ta ON ta.track_rowid = lh.track_rowid
             JOIN artists a ON a.rowid = ta.artist_rowid
             WHERE lh.user_id = ?1
             GROUP BY a.rowid
             ORDER BY SUM(lh.ms_played) DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], Self::parse_ranked_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Albums ranked by total listening time for one user.
    pub fn top_albums(&self, user_id: &str, limit: usize) -> Result<Vec<RankedEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT al.id, al.name, SUM(lh.ms_played), COUNT(lh.rowid)
             FROM listening_history lh
             JOIN tracks t ON t.rowid = lh.track_rowid
             JOIN albums al ON al.rowid = t.album_rowid
             WHERE lh.user_id = ?1
             GROUP BY al.rowid
             ORDER BY SUM(lh.ms_played) DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], Self::parse_ranked_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Tracks ranked by total listening time for one user.
    pub fn top_tracks(&self, user_id: &str, limit: usize) -> Result<Vec<RankedEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT t.id, t.name, SUM(lh.ms_played), COUNT(lh.rowid)
             FROM listening_history lh
             JOIN tracks t ON t.rowid = lh.track_rowid
             WHERE lh.user_id = ?1
             GROUP BY t.rowid
             ORDER BY SUM(lh.ms_played) DESC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], Self::parse_ranked_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn parse_ranked_row(row: &rusqlite::Row) -> rusqlite::Result<RankedEntry> {
        Ok(RankedEntry {
            id: row.get(0)?,
            name: row.get(1)?,
            total_ms_played: row.get(2)?,
            play_count: row.get(3)?,
        })
    }

    /// Whole-history summary for one user.
    pub fn listening_summary(&self, user_id: &str) -> Result<ListeningSummary> {
        let conn = self.conn.lock().unwrap();

        let (total_ms, total_events, unique_tracks, average_ms, first_play, last_play) = conn
            .query_row(
                "SELECT COALESCE(SUM(ms_played), 0), COUNT(*), COUNT(DISTINCT track_rowid),
                        COALESCE(AVG(ms_played), 0), MIN(played_at), MAX(played_at)
                 FROM listening_history WHERE user_id = ?1",
                params![user_id],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, i64>(1)?,
                        r.get::<_, i64>(2)?,
                        r.get::<_, f64>(3)?,
                        r.get::<_, Option<i64>>(4)?,
                        r.get::<_, Option<i64>>(5)?,
                    ))
                },
            )?;

        let unique_artists: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT ta.artist_rowid)
             FROM listening_history lh
             JOIN track_artists ta ON ta.track_rowid = lh.track_rowid
             WHERE lh.user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;

        let unique_albums: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT t.album_rowid)
             FROM listening_history lh
             JOIN tracks t ON t.rowid = lh.track_rowid
             WHERE lh.user_id = ?1 AND t.album_rowid IS NOT NULL",
            params![user_id],
            |r| r.get(0),
        )?;

        Ok(ListeningSummary {
            total_ms_played: total_ms,
            total_mins_played: round2(total_ms as f64 / 1000.0 / 60.0),
            total_hours_played: round2(total_ms as f64 / 1000.0 / 60.0 / 60.0),
            total_tracks_played: total_events,
            unique_tracks,
            unique_artists,
            unique_albums,
            average_ms_played: average_ms,
            first_play,
            last_play,
        })
    }

    /// Listening activity bucketed by period.
    pub fn listening_activity(
        &self,
        user_id: &str,
        granularity: ActivityGranularity,
    ) -> Result<Vec<ActivityBucket>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT strftime('{}', datetime(played_at / 1000, 'unixepoch')) AS period,
                    SUM(ms_played), COUNT(*)
             FROM listening_history
             WHERE user_id = ?1
             GROUP BY period
             ORDER BY period",
            granularity.strftime_pattern()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user_id], |r| {
                Ok(ActivityBucket {
                    period: r.get(0)?,
                    total_ms_played: r.get(1)?,
                    play_count: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_tracks(stubs: &[(&str, &str)]) -> SqliteCatalogStore {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let stubs: Vec<(String, String)> = stubs
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        store.create_track_stubs(&stubs).unwrap();
        store
    }

    fn artist(id: &str, name: &str) -> ArtistUpsert {
        ArtistUpsert {
            id: id.to_string(),
            name: name.to_string(),
            cover_url: String::new(),
        }
    }

    fn album(id: &str, name: &str, cover: &str) -> AlbumUpsert {
        AlbumUpsert {
            id: id.to_string(),
            name: name.to_string(),
            cover_url: cover.to_string(),
        }
    }

    #[test]
    fn test_create_track_stubs_is_idempotent() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let stubs = vec![
            ("t1".to_string(), "One".to_string()),
            ("t2".to_string(), "Two".to_string()),
        ];

        assert_eq!(store.create_track_stubs(&stubs).unwrap(), 2);
        assert_eq!(store.create_track_stubs(&stubs).unwrap(), 0);
        assert_eq!(store.get_tracks_count(), 2);
    }

    #[test]
    fn test_track_stub_does_not_overwrite_name() {
        let store = store_with_tracks(&[("t1", "Original")]);
        store
            .create_track_stubs(&[("t1".to_string(), "Renamed".to_string())])
            .unwrap();
        assert_eq!(store.get_track("t1").unwrap().unwrap().name, "Original");
    }

    #[test]
    fn test_insert_listening_events_deduplicates_on_user_and_timestamp() {
        let store = store_with_tracks(&[("t1", "One")]);
        let rowid = store.track_rowids(&["t1".to_string()]).unwrap()["t1"];
        let rows = vec![
            ListeningEventRow {
                track_rowid: rowid,
                played_at: 1_000,
                ms_played: 5000,
            },
            ListeningEventRow {
                track_rowid: rowid,
                played_at: 2_000,
                ms_played: 6000,
            },
        ];

        assert_eq!(store.insert_listening_events("alice", &rows).unwrap(), 2);
        // Re-ingesting the same export is a safe no-op.
        assert_eq!(store.insert_listening_events("alice", &rows).unwrap(), 0);
        // A different user's identical timestamps are distinct events.
        assert_eq!(store.insert_listening_events("bob", &rows).unwrap(), 2);
        assert_eq!(store.get_history_count("alice").unwrap(), 2);
    }

    #[test]
    fn test_create_artists_does_not_overwrite_existing() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        store.create_artists(&[artist("a1", "First Name")]).unwrap();
        store
            .create_artists(&[artist("a1", "Changed Name"), artist("a2", "Other")])
            .unwrap();

        assert_eq!(store.get_artist("a1").unwrap().unwrap().name, "First Name");
        assert_eq!(store.get_artists_count(), 2);
    }

    #[test]
    fn test_update_artist_covers_overwrites_and_skips_unknown() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        store.create_artists(&[artist("a1", "Artist")]).unwrap();

        let mut update = artist("a1", "Artist");
        update.cover_url = "http://img/1".to_string();
        let missing = ArtistUpsert {
            id: "ghost".to_string(),
            name: String::new(),
            cover_url: "http://img/2".to_string(),
        };

        assert_eq!(
            store.update_artist_covers(&[update, missing]).unwrap(),
            1
        );
        assert_eq!(
            store.get_artist("a1").unwrap().unwrap().cover_url,
            "http://img/1"
        );
    }

    #[test]
    fn test_link_track_artists_skips_unresolved_pairs() {
        let store = store_with_tracks(&[("t1", "One")]);
        store.create_artists(&[artist("a1", "Artist")]).unwrap();

        let pairs = vec![
            TrackArtistPair {
                track_id: "t1".to_string(),
                artist_id: "a1".to_string(),
            },
            TrackArtistPair {
                track_id: "t1".to_string(),
                artist_id: "missing".to_string(),
            },
        ];

        // The unresolved pair yields zero rows, the valid one still links.
        assert_eq!(store.link_track_artists(&pairs).unwrap(), 1);
        // Duplicate links are a no-op, never an error.
        assert_eq!(store.link_track_artists(&pairs).unwrap(), 0);
    }

    #[test]
    fn test_save_enrichment_creates_entities_before_links() {
        let store = store_with_tracks(&[("t1", "One"), ("t2", "Two")]);
        let data = EnrichmentData {
            artists: vec![artist("a1", "Artist")],
            albums: vec![album("al1", "Album", "http://img/al1")],
            track_albums: vec![
                TrackAlbumPair {
                    track_id: "t1".to_string(),
                    album_id: "al1".to_string(),
                },
                TrackAlbumPair {
                    track_id: "t2".to_string(),
                    album_id: "unknown-album".to_string(),
                },
            ],
            album_artists: vec![AlbumArtistPair {
                album_id: "al1".to_string(),
                artist_id: "a1".to_string(),
            }],
            track_artists: vec![TrackArtistPair {
                track_id: "t1".to_string(),
                artist_id: "a1".to_string(),
            }],
        };

        store.save_enrichment(&data).unwrap();

        assert_eq!(store.get_artists_count(), 1);
        assert_eq!(store.get_albums_count(), 1);
        assert_eq!(
            store.get_track("t1").unwrap().unwrap().album_id.as_deref(),
            Some("al1")
        );
        // Pair pointing at an unknown album was skipped.
        assert_eq!(store.get_track("t2").unwrap().unwrap().album_id, None);

        // Whole payload is idempotent.
        store.save_enrichment(&data).unwrap();
        assert_eq!(store.get_artists_count(), 1);
        assert_eq!(store.get_albums_count(), 1);
    }

    #[test]
    fn test_artists_missing_cover() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        store
            .create_artists(&[artist("a1", "One"), artist("a2", "Two")])
            .unwrap();
        let mut covered = artist("a1", "One");
        covered.cover_url = "http://img/1".to_string();
        store.update_artist_covers(&[covered]).unwrap();

        assert_eq!(store.artists_missing_cover().unwrap(), vec!["a2"]);
    }

    #[test]
    fn test_top_tracks_and_artists_rankings() {
        let store = store_with_tracks(&[("t1", "One"), ("t2", "Two")]);
        store
            .create_artists(&[artist("a1", "Artist One"), artist("a2", "Artist Two")])
            .unwrap();
        store
            .link_track_artists(&[
                TrackArtistPair {
                    track_id: "t1".to_string(),
                    artist_id: "a1".to_string(),
                },
                TrackArtistPair {
                    track_id: "t2".to_string(),
                    artist_id: "a2".to_string(),
                },
            ])
            .unwrap();

        let rowids = store
            .track_rowids(&["t1".to_string(), "t2".to_string()])
            .unwrap();
        store
            .insert_listening_events(
                "alice",
                &[
                    ListeningEventRow {
                        track_rowid: rowids["t1"],
                        played_at: 1_000,
                        ms_played: 1_000,
                    },
                    ListeningEventRow {
                        track_rowid: rowids["t2"],
                        played_at: 2_000,
                        ms_played: 9_000,
                    },
                    ListeningEventRow {
                        track_rowid: rowids["t2"],
                        played_at: 3_000,
                        ms_played: 1_000,
                    },
                ],
            )
            .unwrap();

        let tracks = store.top_tracks("alice", 10).unwrap();
        assert_eq!(tracks[0].id, "t2");
        assert_eq!(tracks[0].total_ms_played, 10_000);
        assert_eq!(tracks[0].play_count, 2);
        assert_eq!(tracks[1].id, "t1");

        let artists = store.top_artists("alice", 10).unwrap();
        assert_eq!(artists[0].id, "a2");
        assert_eq!(artists[1].id, "a1");

        // Other users see nothing.
        assert!(store.top_tracks("bob", 10).unwrap().is_empty());
    }

    #[test]
    fn test_listening_summary_empty_history() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let summary = store.listening_summary("nobody").unwrap();
        assert_eq!(summary.total_ms_played, 0);
        assert_eq!(summary.total_tracks_played, 0);
        assert_eq!(summary.first_play, None);
        assert_eq!(summary.last_play, None);
    }

    #[test]
    fn test_listening_summary_totals() {
        let store = store_with_tracks(&[("t1", "One")]);
        let rowid = store.track_rowids(&["t1".to_string()]).unwrap()["t1"];
        store
            .insert_listening_events(
                "alice",
                &[
                    ListeningEventRow {
                        track_rowid: rowid,
                        played_at: 1_000,
                        ms_played: 60_000,
                    },
                    ListeningEventRow {
                        track_rowid: rowid,
                        played_at: 2_000,
                        ms_played: 120_000,
                    },
                ],
            )
            .unwrap();

        let summary = store.listening_summary("alice").unwrap();
        assert_eq!(summary.total_ms_played, 180_000);
        assert_eq!(summary.total_mins_played, 3.0);
        assert_eq!(summary.total_tracks_played, 2);
        assert_eq!(summary.unique_tracks, 1);
        assert_eq!(summary.average_ms_played, 90_000.0);
        assert_eq!(summary.first_play, Some(1_000));
        assert_eq!(summary.last_play, Some(2_000));
    }

    #[test]
    fn test_listening_activity_buckets_by_granularity() {
        let store = store_with_tracks(&[("t1", "One")]);
        let rowid = store.track_rowids(&["t1".to_string()]).unwrap()["t1"];
        // 2024-07-25T12:00:00Z and 2024-08-01T00:00:00Z
        let july = 1_721_908_800_000_i64;
        let august = 1_722_470_400_000_i64;
        store
            .insert_listening_events(
                "alice",
                &[
                    ListeningEventRow {
                        track_rowid: rowid,
                        played_at: july,
                        ms_played: 1_000,
                    },
                    ListeningEventRow {
                        track_rowid: rowid,
                        played_at: august,
                        ms_played: 2_000,
                    },
                ],
            )
            .unwrap();

        let yearly = store
            .listening_activity("alice", ActivityGranularity::Yearly)
            .unwrap();
        assert_eq!(yearly.len(), 1);
        assert_eq!(yearly[0].period, "2024");
        assert_eq!(yearly[0].total_ms_played, 3_000);

        let monthly = store
            .listening_activity("alice", ActivityGranularity::Monthly)
            .unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].period, "2024-07");
        assert_eq!(monthly[1].period, "2024-08");
    }
}
