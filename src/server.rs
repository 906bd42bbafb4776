use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::{Artist, ArtistSongs, CatalogStore};
use crate::db::Database;
use crate::error::AppError;
use crate::forms::{ArtistSearchQuery, IdentityForm, SuggestionForm};
use crate::identity::{Identity, IdentityRegistry, Registration};
use crate::importer::{HistoryImporter, ImportSummary, RecentlyPlayedSource};
use crate::suggestions::{Suggestion, SuggestionLedger};

pub const ARTIST_NOT_FOUND: &str = "Artist not in users' listening history, try another artist!";

#[derive(Clone)]
pub struct AppState {
    pub identities: IdentityRegistry,
    pub catalog: CatalogStore,
    pub suggestions: SuggestionLedger,
    pub importer: HistoryImporter,
}

impl AppState {
    pub fn new(db: &Database, source: Arc<dyn RecentlyPlayedSource>) -> Self {
        let catalog = CatalogStore::new(db);
        Self {
            identities: IdentityRegistry::new(db),
            importer: HistoryImporter::new(source, catalog.clone()),
            catalog,
            suggestions: SuggestionLedger::new(db),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/identities", get(list_identities).post(register_identity))
        .route("/artists", get(list_artists))
        .route("/artists/search", get(search_artist))
        .route("/suggestions", get(list_suggestions).post(submit_suggestion))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Listen Log API v0.1.0"
}

/// Fallback for unmatched routes
async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::warn!("No route for {}", uri);
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub registration: Registration,
    /// Present only when an access token was submitted
    pub import: Option<ImportSummary>,
}

/// Register a display name and, given an access token, import recent plays
async fn register_identity(
    State(state): State<AppState>,
    Form(form): Form<IdentityForm>,
) -> Result<Json<RegistrationResponse>, AppError> {
    let new = form.validate()?;
    tracing::debug!("Registering identity: {}", new.display_name);

    let registration = state.identities.register(&new).await?;

    let import = match &new.access_token {
        Some(token) => {
            tracing::debug!(
                "Importing listening history for {}",
                registration.identity.display_name
            );
            Some(state.importer.import(token).await?)
        }
        None => None,
    };

    Ok(Json(RegistrationResponse {
        registration,
        import,
    }))
}

/// List all registered identities
async fn list_identities(State(state): State<AppState>) -> Result<Json<Vec<Identity>>, AppError> {
    tracing::debug!("Fetching all identities");
    let identities = state.identities.list().await?;
    tracing::debug!("Returning {} identities", identities.len());
    Ok(Json(identities))
}

/// List all artists in the catalog
async fn list_artists(State(state): State<AppState>) -> Result<Json<Vec<Artist>>, AppError> {
    tracing::debug!("Fetching all artists");
    let artists = state.catalog.list_artists().await?;
    tracing::debug!("Returning {} artists", artists.len());
    Ok(Json(artists))
}

/// Songs listened to for one artist, matched by exact name
async fn search_artist(
    State(state): State<AppState>,
    Query(query): Query<ArtistSearchQuery>,
) -> Result<Json<ArtistSongs>, AppError> {
    let name = query.validate()?;
    tracing::debug!("Searching songs for artist: {}", name);

    let found = state
        .catalog
        .songs_by_artist(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(ARTIST_NOT_FOUND.to_string()))?;

    tracing::debug!("Artist {} has {} songs", name, found.songs.len());
    Ok(Json(found))
}

/// List all suggestions
async fn list_suggestions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    tracing::debug!("Fetching all suggestions");
    Ok(Json(state.suggestions.list().await?))
}

/// Append a suggestion and return the whole ledger
async fn submit_suggestion(
    State(state): State<AppState>,
    Form(form): Form<SuggestionForm>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    let new = form.validate()?;
    state.suggestions.append(&new).await?;

    let suggestions = state.suggestions.list().await?;
    tracing::debug!("Returning {} suggestions", suggestions.len());
    Ok(Json(suggestions))
}
