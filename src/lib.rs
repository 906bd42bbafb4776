//! Listen Log - shared listening history and song suggestions
//!
//! This library provides the core functionality for the Listen Log server:
//! registering display names, importing recently played tracks from a
//! streaming service into an artist/song catalog, browsing that catalog by
//! artist, and keeping a ledger of song suggestions.

pub mod catalog;
pub mod db;
pub mod error;
pub mod forms;
pub mod identity;
pub mod importer;
pub mod server;
pub mod suggestions;
