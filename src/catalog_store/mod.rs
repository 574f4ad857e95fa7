mod models;
mod schema;
mod store;

pub use models::{
    ActivityBucket, ActivityGranularity, Album, Artist, ListeningEventRow, ListeningSummary,
    RankedEntry, Track,
};
pub use store::{
    AlbumArtistPair, AlbumUpsert, ArtistUpsert, EnrichmentData, SqliteCatalogStore,
    TrackAlbumPair, TrackArtistPair,
};
