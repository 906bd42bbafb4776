//! Imports a user's recently played tracks into the catalog.
//!
//! The upstream service sits behind [`RecentlyPlayedSource`] so the import can
//! run against the real API ([`spotify::SpotifyClient`]) or an in-process
//! stand-in.

pub mod spotify;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::catalog::CatalogStore;

/// Number of plays requested from the upstream service per import
pub const RECENTLY_PLAYED_LIMIT: u32 = 50;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid access token: {0}")]
    InvalidCredential(String),

    #[error("Access token rejected by the streaming service ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Streaming service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Streaming service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Could not reach the streaming service: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response from the streaming service: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Bearer credential, checked before any request goes out
#[derive(Clone)]
pub struct Credential {
    header: HeaderValue,
}

impl Credential {
    /// Accepts a bare token or a value already carrying the `Bearer ` scheme
    pub fn parse(raw: &str) -> Result<Self, ImportError> {
        let raw = raw.trim();
        let token = match raw.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            None if raw.eq_ignore_ascii_case("bearer") => "",
            _ => raw,
        };

        if token.is_empty() {
            return Err(ImportError::InvalidCredential("token is empty".to_string()));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(ImportError::InvalidCredential(
                "token contains whitespace".to_string(),
            ));
        }

        let mut header = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ImportError::InvalidCredential("token contains invalid characters".to_string())
        })?;
        header.set_sensitive(true);

        Ok(Self { header })
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Source of a user's recent listening history
#[async_trait]
pub trait RecentlyPlayedSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch one page of recently played tracks, most recent first
    async fn recently_played(
        &self,
        credential: &Credential,
        limit: u32,
    ) -> Result<serde_json::Value, ImportError>;
}

/// One play reduced to what the catalog stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
    pub song_name: String,
    pub artist_name: String,
}

#[derive(Debug, Default)]
pub struct ExtractedPlays {
    pub plays: Vec<Play>,
    pub skipped: usize,
}

#[derive(Deserialize)]
struct PlayHistoryItem {
    track: TrackObject,
}

#[derive(Deserialize)]
struct TrackObject {
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
}

#[derive(Deserialize)]
struct ArtistObject {
    name: String,
}

/// Pull song and first-artist names out of a recently played page.
///
/// Items with missing or blank names are skipped, not fatal. A page without an
/// `items` array is.
pub fn extract_plays(page: &serde_json::Value) -> Result<ExtractedPlays, ImportError> {
    let items = page
        .get("items")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| ImportError::InvalidResponse("missing `items` array".to_string()))?;

    let mut extracted = ExtractedPlays::default();
    for (index, item) in items.iter().enumerate() {
        let parsed = match PlayHistoryItem::deserialize(item) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Skipping play {}: {}", index, e);
                extracted.skipped += 1;
                continue;
            }
        };

        let track = parsed.track;
        let artist_name = track.artists.into_iter().next().map(|a| a.name);
        match artist_name {
            Some(artist_name)
                if !artist_name.trim().is_empty() && !track.name.trim().is_empty() =>
            {
                extracted.plays.push(Play {
                    song_name: track.name,
                    artist_name,
                });
            }
            _ => {
                tracing::warn!("Skipping play {}: track or artist name missing", index);
                extracted.skipped += 1;
            }
        }
    }

    Ok(extracted)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub artists_created: usize,
    pub songs_created: usize,
}

/// Fetches recent plays and upserts their artists and songs
#[derive(Clone)]
pub struct HistoryImporter {
    source: Arc<dyn RecentlyPlayedSource>,
    catalog: CatalogStore,
    page_size: u32,
}

impl HistoryImporter {
    pub fn new(source: Arc<dyn RecentlyPlayedSource>, catalog: CatalogStore) -> Self {
        Self {
            source,
            catalog,
            page_size: RECENTLY_PLAYED_LIMIT,
        }
    }

    /// Run one import. Any upstream failure aborts before the catalog is touched.
    pub async fn import(&self, raw_credential: &str) -> Result<ImportSummary, ImportError> {
        let credential = Credential::parse(raw_credential)?;

        tracing::debug!(
            "Fetching up to {} recent plays from {}",
            self.page_size,
            self.source.name()
        );
        let page = self
            .source
            .recently_played(&credential, self.page_size)
            .await?;
        let extracted = extract_plays(&page)?;

        let mut summary = ImportSummary {
            fetched: extracted.plays.len() + extracted.skipped,
            skipped: extracted.skipped,
            ..Default::default()
        };

        let mut session = self.catalog.session().await?;
        for play in &extracted.plays {
            let artist = session.upsert_artist(&play.artist_name).await?;
            let song = session.upsert_song(&play.song_name, artist.row.id).await?;

            if artist.created {
                summary.artists_created += 1;
            }
            if song.created {
                summary.songs_created += 1;
            }
        }

        tracing::info!(
            "Imported {} plays from {}: {} new artists, {} new songs, {} skipped",
            summary.fetched,
            self.source.name(),
            summary.artists_created,
            summary.songs_created,
            summary.skipped
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, Table};
    use serde_json::json;
    use std::sync::Mutex;

    struct StaticSource {
        page: serde_json::Value,
        seen: Mutex<Vec<(String, u32)>>,
    }

    impl StaticSource {
        fn new(page: serde_json::Value) -> Self {
            Self {
                page,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RecentlyPlayedSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn recently_played(
            &self,
            credential: &Credential,
            limit: u32,
        ) -> Result<serde_json::Value, ImportError> {
            let header = credential.header_value().to_str().unwrap().to_string();
            self.seen.lock().unwrap().push((header, limit));
            Ok(self.page.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl RecentlyPlayedSource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn recently_played(
            &self,
            _credential: &Credential,
            _limit: u32,
        ) -> Result<serde_json::Value, ImportError> {
            Err(ImportError::Unauthorized {
                status: 401,
                message: "The access token expired".to_string(),
            })
        }
    }

    fn play(song: &str, artist: &str) -> serde_json::Value {
        json!({ "track": { "name": song, "artists": [{ "name": artist }] } })
    }

    #[test]
    fn test_credential_adds_bearer_scheme() {
        let bare = Credential::parse("  abc123 ").unwrap();
        assert_eq!(bare.header_value().to_str().unwrap(), "Bearer abc123");

        let prefixed = Credential::parse("bearer abc123").unwrap();
        assert_eq!(prefixed.header_value().to_str().unwrap(), "Bearer abc123");
        assert!(prefixed.header_value().is_sensitive());
    }

    #[test]
    fn test_malformed_credentials_are_rejected() {
        for raw in ["", "   ", "Bearer ", "two words", "tab\there", "bad\u{7f}"] {
            assert!(
                matches!(Credential::parse(raw), Err(ImportError::InvalidCredential(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let credential = Credential::parse("secret").unwrap();
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }

    #[test]
    fn test_extract_uses_first_artist() {
        let page = json!({ "items": [{
            "track": { "name": "Under Pressure", "artists": [{ "name": "Queen" }, { "name": "David Bowie" }] }
        }]});

        let extracted = extract_plays(&page).unwrap();
        assert_eq!(
            extracted.plays,
            vec![Play {
                song_name: "Under Pressure".to_string(),
                artist_name: "Queen".to_string(),
            }]
        );
        assert_eq!(extracted.skipped, 0);
    }

    #[test]
    fn test_extract_skips_malformed_items() {
        let page = json!({ "items": [
            play("Good", "Artist"),
            { "track": { "name": "No Artists", "artists": [] } },
            { "track": { "artists": [{ "name": "Nameless" }] } },
            { "track": { "name": 7, "artists": [{ "name": "Typed" }] } },
            { "played_at": "2024-01-01T00:00:00Z" },
            { "track": { "name": "", "artists": [{ "name": "Empty" }] } },
            { "track": { "name": "  ", "artists": [{ "name": " " }] } },
            { "track": { "name": "Blank Artist", "artists": [{ "name": " \t" }] } },
            "not an object",
            play("Also Good", "Artist"),
        ]});

        let extracted = extract_plays(&page).unwrap();
        let songs: Vec<&str> = extracted.plays.iter().map(|p| p.song_name.as_str()).collect();
        assert_eq!(songs, vec!["Good", "Also Good"]);
        assert_eq!(extracted.skipped, 8);
    }

    #[test]
    fn test_extract_requires_items_array() {
        let err = extract_plays(&json!({ "error": "nope" })).unwrap_err();
        assert!(matches!(err, ImportError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("i.db")).await.unwrap();
        let source = Arc::new(StaticSource::new(json!({ "items": [play("X", "Y")] })));
        let importer = HistoryImporter::new(source.clone(), CatalogStore::new(&db));

        let first = importer.import("token").await.unwrap();
        assert_eq!(
            first,
            ImportSummary {
                fetched: 1,
                skipped: 0,
                artists_created: 1,
                songs_created: 1,
            }
        );

        let second = importer.import("token").await.unwrap();
        assert_eq!(second.artists_created, 0);
        assert_eq!(second.songs_created, 0);

        assert_eq!(db.count_rows(Table::Artists).await.unwrap(), 1);
        assert_eq!(db.count_rows(Table::Songs).await.unwrap(), 1);

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen[0], ("Bearer token".to_string(), RECENTLY_PLAYED_LIMIT));
    }

    #[tokio::test]
    async fn test_repeated_artist_in_one_batch() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("i.db")).await.unwrap();
        let page = json!({ "items": [play("One", "Band"), play("Two", "Band"), play("One", "Band")] });
        let importer =
            HistoryImporter::new(Arc::new(StaticSource::new(page)), CatalogStore::new(&db));

        let summary = importer.import("token").await.unwrap();
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.artists_created, 1);
        assert_eq!(summary.songs_created, 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("i.db")).await.unwrap();
        let importer = HistoryImporter::new(Arc::new(FailingSource), CatalogStore::new(&db));

        let err = importer.import("token").await.unwrap_err();
        assert!(matches!(err, ImportError::Unauthorized { status: 401, .. }));
        assert_eq!(db.count_rows(Table::Artists).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_credential_skips_upstream_call() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("i.db")).await.unwrap();
        let source = Arc::new(StaticSource::new(json!({ "items": [] })));
        let importer = HistoryImporter::new(source.clone(), CatalogStore::new(&db));

        let err = importer.import("   ").await.unwrap_err();
        assert!(matches!(err, ImportError::InvalidCredential(_)));
        assert!(source.seen.lock().unwrap().is_empty());
    }
}
