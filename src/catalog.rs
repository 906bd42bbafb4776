//! Artists and songs gathered from everyone's listening history.
//!
//! Both tables are keyed by name through conditional inserts: a row is only
//! written when no row with the same name exists. Song names are treated as
//! globally unique, so the artist seen first for a song name keeps it.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};

use crate::db::Database;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artist {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Song {
    pub id: i64,
    pub name: String,
    pub artist_id: i64,
}

/// An artist together with every song attributed to it
#[derive(Debug, Clone, Serialize)]
pub struct ArtistSongs {
    pub artist: Artist,
    pub songs: Vec<Song>,
}

/// Row returned by a conditional insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted<T> {
    pub row: T,
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Hold one pooled connection for a batch of writes.
    ///
    /// The connection goes back to the pool when the session is dropped.
    pub async fn session(&self) -> Result<CatalogSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire catalog connection")?;
        Ok(CatalogSession { conn })
    }

    /// Find an artist by exact (case-sensitive) name
    pub async fn find_artist(&self, name: &str) -> Result<Option<Artist>> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM artists WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch artist")?;

        Ok(row.map(|(id, name)| Artist { id, name }))
    }

    /// Songs attributed to the named artist, or `None` when the artist is unknown
    pub async fn songs_by_artist(&self, name: &str) -> Result<Option<ArtistSongs>> {
        let Some(artist) = self.find_artist(name).await? else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, name, artist_id FROM songs WHERE artist_id = ? ORDER BY id",
        )
        .bind(artist.id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch songs for artist")?;

        let songs = rows
            .into_iter()
            .map(|(id, name, artist_id)| Song {
                id,
                name,
                artist_id,
            })
            .collect();

        Ok(Some(ArtistSongs { artist, songs }))
    }

    /// All artists in the order they were first imported
    pub async fn list_artists(&self) -> Result<Vec<Artist>> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM artists ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch artists")?;

        Ok(rows.into_iter().map(|(id, name)| Artist { id, name }).collect())
    }
}

/// Write access to the catalog over a single connection
pub struct CatalogSession {
    conn: PoolConnection<Sqlite>,
}

impl CatalogSession {
    /// Insert the artist unless one with the same name exists
    pub async fn upsert_artist(&mut self, name: &str) -> Result<Upserted<Artist>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO artists (name)
            SELECT ?
            WHERE NOT EXISTS (SELECT 1 FROM artists WHERE name = ?)
            "#,
        )
        .bind(name)
        .bind(name)
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert artist")?
        .rows_affected();

        let (id, name) = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, name FROM artists WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to fetch artist after insert")?;

        Ok(Upserted {
            row: Artist { id, name },
            created: inserted > 0,
        })
    }

    /// Insert the song for `artist_id` unless a song with the same name exists.
    ///
    /// An existing song keeps its original artist.
    pub async fn upsert_song(&mut self, name: &str, artist_id: i64) -> Result<Upserted<Song>> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO songs (name, artist_id)
            SELECT ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM songs WHERE name = ?)
            "#,
        )
        .bind(name)
        .bind(artist_id)
        .bind(name)
        .execute(&mut *self.conn)
        .await
        .context("Failed to insert song")?
        .rows_affected();

        let (id, name, stored_artist_id) = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, name, artist_id FROM songs WHERE name = ? ORDER BY id LIMIT 1",
        )
        .bind(name)
        .fetch_one(&mut *self.conn)
        .await
        .context("Failed to fetch song after insert")?;

        if inserted == 0 && stored_artist_id != artist_id {
            tracing::debug!(
                "Song {} already belongs to artist {}, ignoring artist {}",
                name,
                stored_artist_id,
                artist_id
            );
        }

        Ok(Upserted {
            row: Song {
                id,
                name,
                artist_id: stored_artist_id,
            },
            created: inserted > 0,
        })
    }
}
