//! Form payloads and their validation.
//!
//! Validation never raises: each form turns into either a validated value or a
//! [`FieldErrors`] map that the caller renders back to the user.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const REQUIRED: &str = "This field is required.";
pub const NAME_STARTS_WITH_DIGIT: &str = "Name started with number, try again!";

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// Check a required field, recording an error when it is blank
    fn require<'a>(&mut self, field: &'static str, value: Option<&'a str>) -> Option<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                self.add(field, REQUIRED);
                None
            }
        }
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Submitted on the home form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityForm {
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub display_name: String,
    pub username: String,
    /// Raw credential for the history import, absent when left blank
    pub access_token: Option<String>,
}

impl IdentityForm {
    pub fn validate(self) -> Result<NewIdentity, FieldErrors> {
        let mut errors = FieldErrors::new();

        let display_name = errors.require("display_name", self.display_name.as_deref());
        if let Some(name) = display_name {
            if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                errors.add("display_name", NAME_STARTS_WITH_DIGIT);
            }
        }
        let username = errors.require("username", self.username.as_deref());

        let display_name = display_name.unwrap_or_default().to_string();
        let username = username.unwrap_or_default().to_string();
        let access_token = self.access_token.filter(|t| !t.trim().is_empty());

        errors.into_result(|| NewIdentity {
            display_name,
            username,
            access_token,
        })
    }
}

/// Song suggestion form
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SuggestionForm {
    pub song_name: Option<String>,
    pub artist_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSuggestion {
    pub song_name: String,
    pub artist_name: String,
    pub description: String,
}

impl SuggestionForm {
    pub fn validate(self) -> Result<NewSuggestion, FieldErrors> {
        let mut errors = FieldErrors::new();

        let song_name = errors.require("song_name", self.song_name.as_deref());
        let artist_name = errors.require("artist_name", self.artist_name.as_deref());
        let description = errors.require("description", self.description.as_deref());

        let (song_name, artist_name, description) = (
            song_name.unwrap_or_default().to_string(),
            artist_name.unwrap_or_default().to_string(),
            description.unwrap_or_default().to_string(),
        );

        errors.into_result(|| NewSuggestion {
            song_name,
            artist_name,
            description,
        })
    }
}

/// Query string of the artist search page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistSearchQuery {
    pub artist: Option<String>,
}

impl ArtistSearchQuery {
    /// The artist name exactly as submitted; lookups are case-sensitive
    pub fn validate(self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let artist = errors
            .require("artist", self.artist.as_deref())
            .unwrap_or_default()
            .to_string();
        errors.into_result(|| artist)
    }
}
