use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::Database;
use crate::forms::NewIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub display_name: String,
    pub username: String,
    pub created_at: String,
}

/// Outcome of a registration attempt
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub identity: Identity,
    /// False when an identity with the same display name already existed
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct IdentityRegistry {
    pool: SqlitePool,
}

impl IdentityRegistry {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Register a display name, reusing the existing row when the name is known.
    ///
    /// The username of an existing identity is left untouched.
    pub async fn register(&self, new: &NewIdentity) -> Result<Registration> {
        let now = chrono::Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO identities (display_name, username, created_at)
            SELECT ?, ?, ?
            WHERE NOT EXISTS (SELECT 1 FROM identities WHERE display_name = ?)
            "#,
        )
        .bind(&new.display_name)
        .bind(&new.username)
        .bind(&now)
        .bind(&new.display_name)
        .execute(&self.pool)
        .await
        .context("Failed to insert identity")?
        .rows_affected();

        let identity = self
            .find_by_display_name(&new.display_name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Identity vanished after insert"))?;

        if inserted > 0 {
            tracing::info!(
                "Registered identity {} ({})",
                identity.display_name,
                identity.id
            );
        } else {
            tracing::debug!("Identity {} already registered", identity.display_name);
        }

        Ok(Registration {
            identity,
            created: inserted > 0,
        })
    }

    /// Look up an identity by its exact display name
    pub async fn find_by_display_name(&self, display_name: &str) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, (i64, String, String, String)>(
            r#"
            SELECT id, display_name, username, created_at
            FROM identities
            WHERE display_name = ?
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch identity")?;

        Ok(row.map(|(id, display_name, username, created_at)| Identity {
            id,
            display_name,
            username,
            created_at,
        }))
    }

    /// All identities in registration order
    pub async fn list(&self) -> Result<Vec<Identity>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String)>(
            "SELECT id, display_name, username, created_at FROM identities ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch identities")?;

        Ok(rows
            .into_iter()
            .map(|(id, display_name, username, created_at)| Identity {
                id,
                display_name,
                username,
                created_at,
            })
            .collect())
    }
}
