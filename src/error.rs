//! Error handling for FridgeFriend

use std::fmt;
use thiserror::Error;

use fridgefriend_auth::AuthError;
use fridgefriend_email::EmailError;
use fridgefriend_postgrest::PostgrestError;
use fridgefriend_realtime::RealtimeError;
use fridgefriend_recipes::RecipeError;

/// Unified error type for FridgeFriend
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Table read or write rejected by the backend
    #[error("Database error: {0}")]
    Database(#[from] PostgrestError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation needs a signed-in user
    #[error("Not signed in")]
    NotAuthenticated,

    /// The user has no accepted household membership
    #[error("{0}")]
    NoHousehold(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected before any request was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Error::NotFound(msg.to_string())
    }

    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Error::InvalidInput(msg.to_string())
    }

    pub fn no_household<T: fmt::Display>(msg: T) -> Self {
        Error::NoHousehold(msg.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
