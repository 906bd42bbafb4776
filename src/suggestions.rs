use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::Database;
use crate::forms::NewSuggestion;

/// A user-submitted recommendation. Names are free text, not catalog references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: i64,
    pub song_name: String,
    pub artist_name: String,
    pub description: String,
    pub created_at: String,
}

/// Append-only list of suggestions
#[derive(Debug, Clone)]
pub struct SuggestionLedger {
    pool: SqlitePool,
}

impl SuggestionLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Append a suggestion; identical submissions are stored again
    pub async fn append(&self, new: &NewSuggestion) -> Result<Suggestion> {
        let now = chrono::Utc::now().to_rfc3339();

        let id = sqlx::query(
            r#"
            INSERT INTO suggestions (song_name, artist_name, description, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&new.song_name)
        .bind(&new.artist_name)
        .bind(&new.description)
        .bind(&now)
        .execute(&self.pool)
        .await
        .context("Failed to insert suggestion")?
        .last_insert_rowid();

        tracing::info!(
            "Recorded suggestion {}: {} by {}",
            id,
            new.song_name,
            new.artist_name
        );

        Ok(Suggestion {
            id,
            song_name: new.song_name.clone(),
            artist_name: new.artist_name.clone(),
            description: new.description.clone(),
            created_at: now,
        })
    }

    /// Every suggestion in submission order
    pub async fn list(&self) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String)>(
            r#"
            SELECT id, song_name, artist_name, description, created_at
            FROM suggestions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch suggestions")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, song_name, artist_name, description, created_at)| Suggestion {
                    id,
                    song_name,
                    artist_name,
                    description,
                    created_at,
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(song: &str) -> NewSuggestion {
        NewSuggestion {
            song_name: song.to_string(),
            artist_name: "Someone".to_string(),
            description: "great hook".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_returns_submission_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("s.db")).await.unwrap();
        let ledger = SuggestionLedger::new(&db);

        for song in ["First", "Second", "Third"] {
            ledger.append(&suggestion(song)).await.unwrap();
        }

        let songs: Vec<String> = ledger
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.song_name)
            .collect();
        assert_eq!(songs, vec!["First", "Second", "Third"]);
    }

    #[tokio::test]
    async fn test_duplicates_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("s.db")).await.unwrap();
        let ledger = SuggestionLedger::new(&db);

        let a = ledger.append(&suggestion("Same")).await.unwrap();
        let b = ledger.append(&suggestion("Same")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(ledger.list().await.unwrap().len(), 2);
    }
}
